//! # keyrelay-core
//!
//! Platform-independent building blocks of the KeyRelay keyboard pipeline:
//! key identity tables, the decoded form of native keyboard messages, the
//! normalized key events handed to the framework, and the legacy JSON channel
//! protocol.
//!
//! This crate makes no OS calls. The Windows adapter crate (`keyrelay-win`)
//! feeds it decoded messages and owns all state machines.
//!
//! # Layout (for beginners)
//!
//! - **`keymap`**: compile-time tables mapping scan codes and virtual keys to
//!   the 64-bit physical and logical key ids the framework understands.
//! - **`domain`**: native messages, key occurrences, key state and normalized
//!   events.
//! - **`protocol`**: the legacy channel's JSON shapes and the sequence counter
//!   that numbers occurrences.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::event::{KeyEventType, NormalizedKeyEvent};
pub use domain::message::{MessageClass, MessageError, MessageOrigin, NativeKeyMessage};
pub use domain::occurrence::{ComposedKey, KeyState, RawKeyOccurrence};
pub use keymap::hid::HidKeyCode;
pub use keymap::{KeyMapper, WINDOWS_KEYMAP};
pub use protocol::channel::ProtocolError;
pub use protocol::sequence::SequenceCounter;
