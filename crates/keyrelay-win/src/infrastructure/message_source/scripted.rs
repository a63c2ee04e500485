//! In-memory message queue.
//!
//! Tests and the replay binary push hardware messages, pop them one at a
//! time into the pipeline, and hand every message the pipeline returns as
//! "host default" back through [`ScriptedMessageSource::host_default`], which
//! plays the part of `TranslateMessage` for replayed key-downs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use keyrelay_core::{MessageClass, MessageOrigin, NativeKeyMessage};

use super::{NativeMessageSource, SourceError};

/// A FIFO queue of native messages with injection bookkeeping.
pub struct ScriptedMessageSource {
    queue: Mutex<VecDeque<NativeKeyMessage>>,
    injected: Mutex<Vec<NativeKeyMessage>>,
    translations: Mutex<HashMap<u16, String>>,
    reject_injections: AtomicBool,
}

impl ScriptedMessageSource {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            injected: Mutex::new(Vec::new()),
            translations: Mutex::new(HashMap::new()),
            reject_injections: AtomicBool::new(false),
        }
    }

    /// Queues a message as if the host had received it.
    pub fn push(&self, message: NativeKeyMessage) {
        self.queue.lock().expect("lock poisoned").push_back(message);
    }

    pub fn push_all(&self, messages: impl IntoIterator<Item = NativeKeyMessage>) {
        self.queue.lock().expect("lock poisoned").extend(messages);
    }

    /// Removes and returns the next message.
    pub fn pop(&self) -> Option<NativeKeyMessage> {
        self.queue.lock().expect("lock poisoned").pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every message the pipeline injected, in order.
    pub fn injected(&self) -> Vec<NativeKeyMessage> {
        self.injected.lock().expect("lock poisoned").clone()
    }

    /// Sets the text the host's translation step produces for a replayed
    /// key-down of `virtual_key`.
    pub fn set_host_translation(&self, virtual_key: u16, text: &str) {
        self.translations
            .lock()
            .expect("lock poisoned")
            .insert(virtual_key, text.to_string());
    }

    /// Makes every following [`inject`](NativeMessageSource::inject) fail.
    pub fn reject_injections(&self, reject: bool) {
        self.reject_injections.store(reject, Ordering::Relaxed);
    }

    /// Host default processing for a message the pipeline passed on.
    ///
    /// A replayed `WM_KEYDOWN` goes through translation again, so its
    /// characters are queued at the front, ahead of anything else.
    pub fn host_default(&self, message: &NativeKeyMessage) {
        if message.class != MessageClass::KeyDown || message.origin != MessageOrigin::Redispatched {
            return;
        }
        let Some(text) = self
            .translations
            .lock()
            .expect("lock poisoned")
            .get(&message.code)
            .cloned()
        else {
            return;
        };
        let units: Vec<u16> = text.encode_utf16().collect();
        let mut queue = self.queue.lock().expect("lock poisoned");
        for &unit in units.iter().rev() {
            queue.push_front(NativeKeyMessage::character(
                MessageClass::Char,
                unit,
                message.scan_code,
            ));
        }
    }
}

impl Default for ScriptedMessageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeMessageSource for ScriptedMessageSource {
    fn peek_next(&self) -> Option<NativeKeyMessage> {
        self.queue.lock().expect("lock poisoned").front().copied()
    }

    fn inject(&self, message: NativeKeyMessage) -> Result<(), SourceError> {
        if self.reject_injections.load(Ordering::Relaxed) {
            return Err(SourceError::PostFailed("injection rejected by script".to_string()));
        }
        self.injected.lock().expect("lock poisoned").push(message);
        self.queue.lock().expect("lock poisoned").push_back(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_down(virtual_key: u16, scan_code: u16) -> NativeKeyMessage {
        NativeKeyMessage::key(MessageClass::KeyDown, virtual_key, scan_code, false, false)
    }

    #[test]
    fn test_peek_leaves_message_queued() {
        // Arrange
        let source = ScriptedMessageSource::new();
        source.push(key_down(0x41, 0x1E));

        // Act
        let peeked = source.peek_next();

        // Assert
        assert_eq!(peeked, Some(key_down(0x41, 0x1E)));
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_inject_appends_behind_queued_messages() {
        // Arrange
        let source = ScriptedMessageSource::new();
        source.push(key_down(0x41, 0x1E));
        let replay = key_down(0x42, 0x30).with_origin(MessageOrigin::Redispatched);

        // Act
        source.inject(replay).unwrap();

        // Assert
        assert_eq!(source.pop().map(|m| m.code), Some(0x41));
        assert_eq!(source.pop(), Some(replay));
        assert_eq!(source.injected(), vec![replay]);
    }

    #[test]
    fn test_rejected_injection_reports_error() {
        let source = ScriptedMessageSource::new();
        source.reject_injections(true);
        let result = source.inject(key_down(0x41, 0x1E));
        assert!(matches!(result, Err(SourceError::PostFailed(_))));
        assert!(source.is_empty());
    }

    #[test]
    fn test_host_default_translates_replayed_key_down_only() {
        // Arrange
        let source = ScriptedMessageSource::new();
        source.set_host_translation(0x41, "a");
        source.push(key_down(0x42, 0x30));

        // Act
        source.host_default(&key_down(0x41, 0x1E));
        source.host_default(&key_down(0x41, 0x1E).with_origin(MessageOrigin::Redispatched));

        // Assert – one char, ahead of the queued key-down
        let first = source.pop().unwrap();
        assert_eq!(first.class, MessageClass::Char);
        assert_eq!(first.code, 'a' as u16);
        assert_eq!(source.pop().map(|m| m.code), Some(0x42));
        assert!(source.is_empty());
    }

    #[test]
    fn test_host_default_queues_surrogate_halves_in_order() {
        // Arrange
        let source = ScriptedMessageSource::new();
        source.set_host_translation(0x41, "\u{1F600}");
        let replay = key_down(0x41, 0x1E).with_origin(MessageOrigin::Redispatched);

        // Act
        source.host_default(&replay);

        // Assert
        let units: Vec<u16> = std::iter::from_fn(|| source.pop()).map(|m| m.code).collect();
        assert_eq!(units, vec![0xD83D, 0xDE00]);
    }
}
