//! Domain types shared by every pipeline stage.
//!
//! Nothing in here talks to the OS. The Windows message encoding lives in
//! [`message`] as plain bit manipulation so it can be tested on any platform.
//!
//! # The three shapes of a keystroke (for beginners)
//!
//! 1. [`message::NativeKeyMessage`]: what the host window procedure received.
//! 2. [`occurrence::RawKeyOccurrence`] / [`occurrence::ComposedKey`]: a key
//!    message numbered for dispatch, with its composed character attached.
//! 3. [`event::NormalizedKeyEvent`]: what the framework is told.

pub mod event;
pub mod message;
pub mod occurrence;
