//! Wire protocols spoken with the framework.
//!
//! - [`channel`]: the legacy JSON key channel (`flutter/keyevent`).
//! - [`sequence`]: ids that tie delegate answers to key occurrences.
//!
//! The normalized event stream itself is described by
//! [`crate::domain::event::NormalizedKeyEvent`].

pub mod channel;
pub mod sequence;

pub use channel::{
    decode_reply, encode_message, ChannelEventType, ChannelModifiers, KeyChannelMessage,
    KeyChannelReply, ProtocolError, DEFAULT_CHANNEL_NAME,
};
pub use sequence::SequenceCounter;
