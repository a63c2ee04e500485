//! Framework-side adapters: where normalized events, channel messages and
//! committed text end up.
//!
//! The real framework engine lives outside this crate. The pipeline only sees
//! it through three ports defined next to the code that uses them:
//! [`KeyEventSink`](crate::application::embedder::KeyEventSink),
//! [`BinaryMessenger`](crate::application::channel::BinaryMessenger) and
//! [`TextInputSink`](crate::application::pipeline::TextInputSink).
//!
//! # Testability
//!
//! - [`mock`]: recording doubles with a configurable answer policy, used by
//!   the unit and integration tests.
//! - [`simulator`]: a stand-in framework that answers from tokio tasks after
//!   a delay, used by the `keyrelay-replay` binary.

pub mod mock;
pub mod simulator;
