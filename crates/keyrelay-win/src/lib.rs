//! keyrelay-win library entry point.
//!
//! The Windows side of the KeyRelay keyboard pipeline. Re-exports all public
//! modules so that integration tests in `tests/`, the benches, and the
//! `keyrelay-replay` binary share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::pipeline::{
    Collaborators, KeyboardPipeline, MessageDisposition, TextInputSink,
};
