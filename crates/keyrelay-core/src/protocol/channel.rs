//! The legacy key channel: one JSON map per key message, answered with
//! `{"handled": bool}`.
//!
//! ```json
//! {"keyCode":65,"scanCode":30,"characterCodePoint":97,
//!  "keymap":"windows","modifiers":0,"type":"keydown"}
//! ```
//!
//! Older framework code listens on this channel instead of the normalized
//! event stream. A missing (`null`) reply means "not handled".

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::occurrence::KeyState;
use crate::keymap::windows_vk::vk::*;

/// Channel the legacy messages are sent on unless configured otherwise.
pub const DEFAULT_CHANNEL_NAME: &str = "flutter/keyevent";

/// Errors encoding messages or decoding replies.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode key channel message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode key channel reply: {0}")]
    Decode(#[source] serde_json::Error),
}

/// `"type"` field of a channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelEventType {
    #[serde(rename = "keydown")]
    KeyDown,
    #[serde(rename = "keyup")]
    KeyUp,
}

/// One legacy channel message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyChannelMessage {
    /// Sided virtual key.
    pub key_code: u16,
    /// Scan code with the `0xE000` prefix for extended keys.
    pub scan_code: u16,
    /// Composed character, 0 when none.
    pub character_code_point: u32,
    pub keymap: String,
    pub modifiers: u32,
    #[serde(rename = "type")]
    pub event_type: ChannelEventType,
}

/// Reply to a [`KeyChannelMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChannelReply {
    pub handled: bool,
}

/// Modifier bitmask reported on the legacy channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelModifiers(pub u32);

impl ChannelModifiers {
    pub const SHIFT: u32 = 1 << 0;
    pub const SHIFT_LEFT: u32 = 1 << 1;
    pub const SHIFT_RIGHT: u32 = 1 << 2;
    pub const CONTROL: u32 = 1 << 3;
    pub const CONTROL_LEFT: u32 = 1 << 4;
    pub const CONTROL_RIGHT: u32 = 1 << 5;
    pub const ALT: u32 = 1 << 6;
    pub const ALT_LEFT: u32 = 1 << 7;
    pub const ALT_RIGHT: u32 = 1 << 8;
    pub const WIN_LEFT: u32 = 1 << 9;
    pub const WIN_RIGHT: u32 = 1 << 10;
    pub const CAPS_LOCK: u32 = 1 << 11;
    pub const NUM_LOCK: u32 = 1 << 12;
    pub const SCROLL_LOCK: u32 = 1 << 13;

    /// Builds the mask from live key states.
    ///
    /// Held modifiers are read from the pressed bit, lock keys from the
    /// toggled bit.
    pub fn from_key_states(mut key_state: impl FnMut(u16) -> KeyState) -> Self {
        const PRESSED: &[(u16, u32)] = &[
            (VK_SHIFT, ChannelModifiers::SHIFT),
            (VK_LSHIFT, ChannelModifiers::SHIFT_LEFT),
            (VK_RSHIFT, ChannelModifiers::SHIFT_RIGHT),
            (VK_CONTROL, ChannelModifiers::CONTROL),
            (VK_LCONTROL, ChannelModifiers::CONTROL_LEFT),
            (VK_RCONTROL, ChannelModifiers::CONTROL_RIGHT),
            (VK_MENU, ChannelModifiers::ALT),
            (VK_LMENU, ChannelModifiers::ALT_LEFT),
            (VK_RMENU, ChannelModifiers::ALT_RIGHT),
            (VK_LWIN, ChannelModifiers::WIN_LEFT),
            (VK_RWIN, ChannelModifiers::WIN_RIGHT),
        ];
        const TOGGLED: &[(u16, u32)] = &[
            (VK_CAPITAL, ChannelModifiers::CAPS_LOCK),
            (VK_NUMLOCK, ChannelModifiers::NUM_LOCK),
            (VK_SCROLL, ChannelModifiers::SCROLL_LOCK),
        ];

        let mut bits = 0;
        for &(virtual_key, bit) in PRESSED {
            if key_state(virtual_key).pressed {
                bits |= bit;
            }
        }
        for &(virtual_key, bit) in TOGGLED {
            if key_state(virtual_key).toggled {
                bits |= bit;
            }
        }
        Self(bits)
    }

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit == bit
    }
}

/// Serializes a channel message to UTF-8 JSON.
///
/// # Errors
///
/// [`ProtocolError::Encode`] if serialization fails.
pub fn encode_message(message: &KeyChannelMessage) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(message).map_err(ProtocolError::Encode)
}

/// Parses a reply. A JSON `null` decodes to `None`.
///
/// # Errors
///
/// [`ProtocolError::Decode`] if the payload is neither `null` nor a reply map.
pub fn decode_reply(payload: &[u8]) -> Result<Option<KeyChannelReply>, ProtocolError> {
    serde_json::from_slice(payload).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_uses_legacy_field_names() {
        // Arrange
        let message = KeyChannelMessage {
            key_code: 0x41,
            scan_code: 0x1E,
            character_code_point: 'a' as u32,
            keymap: "windows".to_string(),
            modifiers: ChannelModifiers::SHIFT | ChannelModifiers::SHIFT_LEFT,
            event_type: ChannelEventType::KeyDown,
        };

        // Act
        let bytes = encode_message(&message).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        // Assert
        assert_eq!(
            value,
            serde_json::json!({
                "keyCode": 65,
                "scanCode": 30,
                "characterCodePoint": 97,
                "keymap": "windows",
                "modifiers": 3,
                "type": "keydown",
            })
        );
    }

    #[test]
    fn test_decode_reply_reads_handled_flag() {
        assert_eq!(
            decode_reply(br#"{"handled":true}"#).unwrap(),
            Some(KeyChannelReply { handled: true })
        );
    }

    #[test]
    fn test_decode_reply_maps_null_to_none() {
        assert_eq!(decode_reply(b"null").unwrap(), None);
    }

    #[test]
    fn test_decode_reply_rejects_garbage() {
        assert!(matches!(decode_reply(b"{oops"), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_modifiers_read_pressed_and_toggled_bits() {
        // Arrange – right control held, caps lock toggled on but not held
        let states = |virtual_key: u16| match virtual_key {
            VK_CONTROL | VK_RCONTROL => KeyState::new(true, false),
            VK_CAPITAL => KeyState::new(false, true),
            _ => KeyState::RELEASED,
        };

        // Act
        let modifiers = ChannelModifiers::from_key_states(states);

        // Assert
        assert_eq!(
            modifiers.0,
            ChannelModifiers::CONTROL | ChannelModifiers::CONTROL_RIGHT | ChannelModifiers::CAPS_LOCK
        );
        assert!(!modifiers.contains(ChannelModifiers::CONTROL_LEFT));
    }
}
