//! Infrastructure layer of the Windows keyboard pipeline.
//!
//! Contains the adapters the application layer talks to through traits:
//! host key state and layout queries, the host message queue, framework
//! doubles, configuration storage, and the trace replay driver.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keyrelay_core`, but the application layer only sees the traits declared
//! in `key_state` and `message_source`.

pub mod framework;
pub mod key_state;
pub mod message_source;
pub mod replay;
pub mod storage;
