//! The host's keyboard message queue.
//!
//! Messages reach the pipeline one at a time from the window procedure, in
//! arrival order. Besides delivering them, the queue must support two
//! operations the pipeline relies on:
//!
//! - **peek**: look at the next queued keyboard message without removing it,
//!   so a key-down can wait for the `WM_CHAR` that `TranslateMessage` queued
//!   right behind it;
//! - **inject**: put a message back into the queue so it is delivered again,
//!   in order, after everything already queued. Redispatched and forged
//!   messages travel this way.
//!
//! # Testability
//!
//! [`scripted::ScriptedMessageSource`] is an in-memory queue that also plays
//! the host's `TranslateMessage` for replayed key-downs.

use keyrelay_core::NativeKeyMessage;

pub mod scripted;

#[cfg(target_os = "windows")]
pub mod windows;

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to post keyboard message to the host window: {0}")]
    PostFailed(String),
    #[error("message source has been closed")]
    Closed,
}

/// Access to the host's keyboard message queue.
pub trait NativeMessageSource {
    /// The next queued keyboard message, left in the queue.
    fn peek_next(&self) -> Option<NativeKeyMessage>;

    /// Appends `message` to the queue.
    fn inject(&self, message: NativeKeyMessage) -> Result<(), SourceError>;
}
