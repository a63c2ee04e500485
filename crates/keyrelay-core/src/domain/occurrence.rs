//! Key occurrences: one key message, numbered and ready for dispatch.

use serde::{Deserialize, Serialize};

use super::message::{MessageClass, MessageOrigin, NativeKeyMessage};
use crate::keymap::windows_vk::vk::VK_PROCESSKEY;

/// A single key-down or key-up as seen by the pipeline.
///
/// Created once per key message and consumed exactly once by the dispatcher.
/// `sequence_id` is unique for the lifetime of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawKeyOccurrence {
    pub virtual_key: u16,
    pub scan_code: u16,
    pub class: MessageClass,
    pub extended: bool,
    pub was_already_down: bool,
    pub sequence_id: u64,
    /// The IME claimed this keystroke (`VK_PROCESSKEY`).
    pub ime_owned: bool,
    pub origin: MessageOrigin,
}

impl RawKeyOccurrence {
    /// Builds an occurrence from a key message; character messages give `None`.
    pub fn from_message(message: &NativeKeyMessage, sequence_id: u64) -> Option<Self> {
        if !message.class.is_key() {
            return None;
        }
        Some(Self {
            virtual_key: message.code,
            scan_code: message.scan_code,
            class: message.class,
            extended: message.extended,
            was_already_down: message.was_already_down,
            sequence_id,
            ime_owned: message.code == VK_PROCESSKEY,
            origin: message.origin,
        })
    }

    /// Reconstructs the native message this occurrence was built from.
    pub fn to_message(&self, origin: MessageOrigin) -> NativeKeyMessage {
        NativeKeyMessage::key(
            self.class,
            self.virtual_key,
            self.scan_code,
            self.extended,
            self.was_already_down,
        )
        .with_origin(origin)
    }

    pub fn is_down(&self) -> bool {
        self.class.is_down()
    }
}

/// An occurrence together with the character composition resolved for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedKey {
    pub occurrence: RawKeyOccurrence,
    /// The character typed by this key-down, if any.
    pub character: Option<char>,
}

impl ComposedKey {
    pub fn new(occurrence: RawKeyOccurrence, character: Option<char>) -> Self {
        Self {
            occurrence,
            character,
        }
    }

    pub fn sequence_id(&self) -> u64 {
        self.occurrence.sequence_id
    }
}

/// Live state of one virtual key as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyState {
    pub pressed: bool,
    /// Lock keys only: the toggle is on.
    pub toggled: bool,
}

impl KeyState {
    pub const RELEASED: KeyState = KeyState {
        pressed: false,
        toggled: false,
    };

    pub fn new(pressed: bool, toggled: bool) -> Self {
        Self { pressed, toggled }
    }
}
