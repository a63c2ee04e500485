//! Application layer of the Windows keyboard pipeline.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! types (`keyrelay_core`) and the infrastructure (Win32 calls, files,
//! framework bindings). Code in this layer owns the state machines, depends
//! on traits rather than concrete adapters, and makes no OS calls.
//!
//! # Sub-modules
//!
//! - **`pipeline`**: the window procedure's entry point; wires everything
//!   below together.
//! - **`composition`**: pairs key-downs with the characters the host
//!   generates for them, including dead keys and surrogate pairs.
//! - **`dispatcher`**: fans each composed key out to every delegate and
//!   aggregates their asynchronous answers.
//! - **`embedder`**: translates composed keys into normalized key events and
//!   keeps the framework's pressed-key records.
//! - **`critical_keys`**: synthesizes events that bring modifier and lock
//!   state back in line with the host.
//! - **`channel`**: the legacy JSON channel delegate.
//! - **`redispatch`**: re-injects unhandled messages and recognizes them when
//!   they come back.

pub mod channel;
pub mod composition;
pub mod critical_keys;
pub mod dispatcher;
pub mod embedder;
pub mod pipeline;
pub mod redispatch;
