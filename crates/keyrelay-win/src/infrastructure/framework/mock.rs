//! Recording framework doubles.
//!
//! Each double keeps everything it receives and answers according to a
//! policy. With [`AnswerPolicy::Hold`] / [`ReplyPolicy::Hold`] the answers are
//! parked so a test can deliver them later, in any order, or from another
//! thread.

use std::collections::VecDeque;
use std::sync::Mutex;

use keyrelay_core::protocol::KeyChannelMessage;
use keyrelay_core::NormalizedKeyEvent;

use crate::application::channel::{BinaryMessenger, ReplyHandler};
use crate::application::dispatcher::Responder;
use crate::application::embedder::KeyEventSink;
use crate::application::pipeline::TextInputSink;

/// How [`RecordingEventSink`] answers real events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPolicy {
    Handled,
    Unhandled,
    /// Park the responder until [`RecordingEventSink::answer_next`].
    Hold,
}

// ── Key event sink ────────────────────────────────────────────────────────────

pub struct RecordingEventSink {
    policy: Mutex<AnswerPolicy>,
    events: Mutex<Vec<NormalizedKeyEvent>>,
    held: Mutex<VecDeque<Responder>>,
}

impl RecordingEventSink {
    pub fn new(policy: AnswerPolicy) -> Self {
        Self {
            policy: Mutex::new(policy),
            events: Mutex::new(Vec::new()),
            held: Mutex::new(VecDeque::new()),
        }
    }

    pub fn set_policy(&self, policy: AnswerPolicy) {
        *self.policy.lock().expect("lock poisoned") = policy;
    }

    /// Every event received, synthesized ones included.
    pub fn events(&self) -> Vec<NormalizedKeyEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    pub fn real_events(&self) -> Vec<NormalizedKeyEvent> {
        self.events()
            .into_iter()
            .filter(|e| !e.synthesized)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().expect("lock poisoned").clear();
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().expect("lock poisoned").len()
    }

    /// Answers the oldest parked responder. Returns `false` if none is parked.
    pub fn answer_next(&self, handled: bool) -> bool {
        let responder = self.held.lock().expect("lock poisoned").pop_front();
        match responder {
            Some(responder) => {
                responder.respond(handled);
                true
            }
            None => false,
        }
    }

    /// Takes every parked responder, oldest first.
    pub fn take_held(&self) -> Vec<Responder> {
        self.held.lock().expect("lock poisoned").drain(..).collect()
    }
}

impl KeyEventSink for RecordingEventSink {
    fn send_key_event(&self, event: NormalizedKeyEvent, responder: Option<Responder>) {
        self.events.lock().expect("lock poisoned").push(event);
        let Some(responder) = responder else {
            return;
        };
        let policy = *self.policy.lock().expect("lock poisoned");
        match policy {
            AnswerPolicy::Handled => responder.respond(true),
            AnswerPolicy::Unhandled => responder.respond(false),
            AnswerPolicy::Hold => self.held.lock().expect("lock poisoned").push_back(responder),
        }
    }
}

// ── Binary messenger ──────────────────────────────────────────────────────────

/// How [`RecordingMessenger`] replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPolicy {
    /// `{"handled":true}`
    Handled,
    /// `{"handled":false}`
    Unhandled,
    /// `null`
    Null,
    /// No reply at all.
    NoReply,
    /// Park the reply handler until [`RecordingMessenger::answer_next`].
    Hold,
}

pub struct RecordingMessenger {
    policy: Mutex<ReplyPolicy>,
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    held: Mutex<VecDeque<ReplyHandler>>,
}

impl RecordingMessenger {
    pub fn new(policy: ReplyPolicy) -> Self {
        Self {
            policy: Mutex::new(policy),
            sent: Mutex::new(Vec::new()),
            held: Mutex::new(VecDeque::new()),
        }
    }

    pub fn set_policy(&self, policy: ReplyPolicy) {
        *self.policy.lock().expect("lock poisoned") = policy;
    }

    /// Channel names messages were sent on, in order.
    pub fn channels(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    /// Sent payloads decoded as channel messages. Payloads that do not
    /// decode are skipped.
    pub fn messages(&self) -> Vec<KeyChannelMessage> {
        self.sent
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }

    /// Replies to the oldest parked message with a raw payload.
    pub fn answer_next(&self, reply: Option<Vec<u8>>) -> bool {
        let handler = self.held.lock().expect("lock poisoned").pop_front();
        match handler {
            Some(handler) => {
                handler(reply);
                true
            }
            None => false,
        }
    }
}

impl BinaryMessenger for RecordingMessenger {
    fn send(&self, channel: &str, payload: Vec<u8>, reply: ReplyHandler) {
        self.sent
            .lock()
            .expect("lock poisoned")
            .push((channel.to_string(), payload));
        let policy = *self.policy.lock().expect("lock poisoned");
        match policy {
            ReplyPolicy::Handled => reply(Some(br#"{"handled":true}"#.to_vec())),
            ReplyPolicy::Unhandled => reply(Some(br#"{"handled":false}"#.to_vec())),
            ReplyPolicy::Null => reply(Some(b"null".to_vec())),
            ReplyPolicy::NoReply => reply(None),
            ReplyPolicy::Hold => self.held.lock().expect("lock poisoned").push_back(reply),
        }
    }
}

// ── Text input sink ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTextSink {
    texts: Mutex<Vec<String>>,
}

impl RecordingTextSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().expect("lock poisoned").clone()
    }
}

impl TextInputSink for RecordingTextSink {
    fn on_text(&self, text: &str) {
        self.texts
            .lock()
            .expect("lock poisoned")
            .push(text.to_string());
    }
}
