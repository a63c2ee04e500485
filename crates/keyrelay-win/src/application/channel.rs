//! Legacy channel delegate: composed keys as JSON maps on a binary channel.
//!
//! Older framework code listens for raw Windows key data on the
//! `flutter/keyevent` channel instead of the normalized event stream. This
//! delegate sends one [`KeyChannelMessage`] per composed key and turns the
//! reply into an answer. Anything other than `{"handled": true}` (a `null`
//! reply, no reply, a reply that does not decode) counts as unhandled.

use std::sync::Arc;

use keyrelay_core::keymap::scan_code::combined_scan_code;
use keyrelay_core::keymap::windows_vk::resolve_sided_key;
use keyrelay_core::protocol::{
    decode_reply, encode_message, ChannelEventType, ChannelModifiers, KeyChannelMessage,
};
use keyrelay_core::{ComposedKey, KeyMapper};
use tracing::warn;

use super::dispatcher::{KeyHandlerDelegate, Responder};
use crate::infrastructure::key_state::KeyStateOracle;

/// Called once with the raw reply payload, `None` when nobody replied.
pub type ReplyHandler = Box<dyn FnOnce(Option<Vec<u8>>) + Send>;

/// A named binary message channel to the framework.
pub trait BinaryMessenger {
    fn send(&self, channel: &str, payload: Vec<u8>, reply: ReplyHandler);
}

/// Delegate speaking the legacy JSON key protocol.
pub struct ChannelDelegate {
    messenger: Arc<dyn BinaryMessenger>,
    oracle: Arc<dyn KeyStateOracle>,
    keymap: &'static KeyMapper,
    channel_name: String,
}

impl ChannelDelegate {
    pub fn new(
        messenger: Arc<dyn BinaryMessenger>,
        oracle: Arc<dyn KeyStateOracle>,
        keymap: &'static KeyMapper,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            messenger,
            oracle,
            keymap,
            channel_name: channel_name.into(),
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// The message sent for `key`.
    pub fn build_message(&self, key: &ComposedKey) -> KeyChannelMessage {
        let occurrence = &key.occurrence;
        let oracle = self.oracle.as_ref();
        KeyChannelMessage {
            key_code: resolve_sided_key(
                occurrence.virtual_key,
                occurrence.scan_code,
                occurrence.extended,
            ),
            scan_code: combined_scan_code(occurrence.scan_code, occurrence.extended),
            character_code_point: key.character.map_or(0, u32::from),
            keymap: self.keymap.name().to_string(),
            modifiers: ChannelModifiers::from_key_states(|vk| oracle.key_state(vk)).0,
            event_type: if occurrence.is_down() {
                ChannelEventType::KeyDown
            } else {
                ChannelEventType::KeyUp
            },
        }
    }
}

impl KeyHandlerDelegate for ChannelDelegate {
    fn handle_key(&mut self, key: &ComposedKey, responder: Responder) {
        let message = self.build_message(key);
        let payload = match encode_message(&message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "could not encode key channel message");
                responder.respond(false);
                return;
            }
        };
        let channel = self.channel_name.clone();
        self.messenger.send(
            &self.channel_name,
            payload,
            Box::new(move |reply| {
                let handled = match reply.as_deref().map(decode_reply) {
                    Some(Ok(Some(reply))) => reply.handled,
                    Some(Ok(None)) | None => false,
                    Some(Err(e)) => {
                        warn!(%channel, error = %e, "undecodable key channel reply");
                        false
                    }
                };
                responder.respond(handled);
            }),
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use keyrelay_core::keymap::windows_vk::vk::*;
    use keyrelay_core::protocol::DEFAULT_CHANNEL_NAME;
    use keyrelay_core::{
        KeyState, MessageClass, NativeKeyMessage, RawKeyOccurrence, WINDOWS_KEYMAP,
    };

    use super::*;
    use crate::application::dispatcher::KeyDispatcher;
    use crate::infrastructure::key_state::scripted::ScriptedKeyboard;

    /// Replies immediately with a fixed payload and keeps what was sent.
    struct FixedReplyMessenger {
        reply: Option<Vec<u8>>,
        sent: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl FixedReplyMessenger {
        fn new(reply: Option<&[u8]>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(<[u8]>::to_vec),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    impl BinaryMessenger for FixedReplyMessenger {
        fn send(&self, channel: &str, payload: Vec<u8>, reply: ReplyHandler) {
            self.sent
                .lock()
                .expect("lock poisoned")
                .push((channel.to_string(), payload));
            reply(self.reply.clone());
        }
    }

    fn key(
        class: MessageClass,
        virtual_key: u16,
        scan: u16,
        extended: bool,
        character: Option<char>,
    ) -> ComposedKey {
        let message = NativeKeyMessage::key(class, virtual_key, scan, extended, false);
        ComposedKey::new(RawKeyOccurrence::from_message(&message, 1).unwrap(), character)
    }

    /// Runs one key through a single-delegate dispatcher and returns the
    /// aggregated `handled` flag.
    fn handled_with_reply(reply: Option<&[u8]>) -> bool {
        let messenger = FixedReplyMessenger::new(reply);
        let keyboard = Arc::new(ScriptedKeyboard::new());
        let delegate =
            ChannelDelegate::new(messenger, keyboard, &WINDOWS_KEYMAP, DEFAULT_CHANNEL_NAME);
        let mut dispatcher = KeyDispatcher::new(vec![delegate], 10);
        let result = std::rc::Rc::new(std::cell::Cell::new(None));
        let sink = result.clone();
        dispatcher.dispatch(
            key(MessageClass::KeyDown, 0x41, 0x1E, false, Some('a')),
            Box::new(move |r| sink.set(Some(r.handled))),
        );
        result.get().expect("reply answered synchronously")
    }

    #[test]
    fn test_message_carries_sided_key_and_extended_scan_code() {
        // Arrange
        let keyboard = Arc::new(ScriptedKeyboard::new());
        keyboard.press(VK_RCONTROL);
        keyboard.set(VK_CAPITAL, KeyState::new(false, true));
        let delegate = ChannelDelegate::new(
            FixedReplyMessenger::new(None),
            keyboard,
            &WINDOWS_KEYMAP,
            DEFAULT_CHANNEL_NAME,
        );

        // Act
        let message =
            delegate.build_message(&key(MessageClass::KeyDown, VK_CONTROL, 0x1D, true, None));

        // Assert
        assert_eq!(message.key_code, VK_RCONTROL);
        assert_eq!(message.scan_code, 0xE01D);
        assert_eq!(message.character_code_point, 0);
        assert_eq!(message.keymap, "windows");
        assert_eq!(message.event_type, ChannelEventType::KeyDown);
        let modifiers = ChannelModifiers(message.modifiers);
        assert!(modifiers.contains(ChannelModifiers::CONTROL | ChannelModifiers::CONTROL_RIGHT));
        assert!(modifiers.contains(ChannelModifiers::CAPS_LOCK));
        assert!(!modifiers.contains(ChannelModifiers::SHIFT));
    }

    #[test]
    fn test_key_up_message_type() {
        let keyboard = Arc::new(ScriptedKeyboard::new());
        let delegate = ChannelDelegate::new(
            FixedReplyMessenger::new(None),
            keyboard,
            &WINDOWS_KEYMAP,
            "custom",
        );
        let message = delegate.build_message(&key(MessageClass::KeyUp, 0x41, 0x1E, false, None));
        assert_eq!(message.event_type, ChannelEventType::KeyUp);
        assert_eq!(delegate.channel_name(), "custom");
    }

    #[test]
    fn test_sends_json_on_configured_channel() {
        // Arrange
        let messenger = FixedReplyMessenger::new(Some(br#"{"handled":true}"#));
        let keyboard = Arc::new(ScriptedKeyboard::new());
        let delegate = ChannelDelegate::new(
            messenger.clone(),
            keyboard,
            &WINDOWS_KEYMAP,
            DEFAULT_CHANNEL_NAME,
        );
        let composed = key(MessageClass::KeyDown, 0x41, 0x1E, false, Some('a'));
        let expected = delegate.build_message(&composed);
        let mut dispatcher = KeyDispatcher::new(vec![delegate], 10);

        // Act
        dispatcher.dispatch(composed, Box::new(|_| {}));

        // Assert
        let sent = messenger.sent.lock().expect("lock poisoned");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "flutter/keyevent");
        let decoded: KeyChannelMessage = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(decoded, expected);
        assert_eq!(decoded.character_code_point, 'a' as u32);
    }

    #[test]
    fn test_reply_decoding() {
        assert!(handled_with_reply(Some(br#"{"handled":true}"#)));
        assert!(!handled_with_reply(Some(br#"{"handled":false}"#)));
        assert!(!handled_with_reply(Some(b"null")));
        assert!(!handled_with_reply(Some(b"not json")));
        assert!(!handled_with_reply(None));
    }
}
