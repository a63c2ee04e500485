//! A stand-in framework for replaying keyboard traces.
//!
//! [`SimulatedFramework`] implements all three framework ports. It writes a
//! transcript of everything it receives and answers real key events (and
//! legacy channel messages) from tokio tasks after a configurable delay, the
//! way a framework running on its own thread would.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use keyrelay_core::protocol::{KeyChannelMessage, KeyChannelReply};
use keyrelay_core::NormalizedKeyEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::application::channel::{BinaryMessenger, ReplyHandler};
use crate::application::dispatcher::Responder;
use crate::application::embedder::KeyEventSink;
use crate::application::pipeline::TextInputSink;

/// Which keys the simulated framework claims, and how fast it answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkPolicy {
    /// Logical ids the framework handles; everything else is unhandled.
    #[serde(default)]
    pub handled_logical_keys: Vec<u64>,
    /// Virtual keys the legacy channel handler claims.
    #[serde(default)]
    pub handled_channel_key_codes: Vec<u16>,
    /// Delay before each answer. Zero answers synchronously.
    #[serde(default)]
    pub answer_delay_ms: u64,
}

/// One entry of the simulator's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    KeyEvent(NormalizedKeyEvent),
    ChannelMessage {
        channel: String,
        message: KeyChannelMessage,
    },
    Text {
        text: String,
    },
}

pub struct SimulatedFramework {
    handled_logical: HashSet<u64>,
    handled_key_codes: HashSet<u16>,
    delay: Duration,
    transcript: Mutex<Vec<TranscriptEntry>>,
}

impl SimulatedFramework {
    pub fn new(policy: &FrameworkPolicy) -> Self {
        Self {
            handled_logical: policy.handled_logical_keys.iter().copied().collect(),
            handled_key_codes: policy.handled_channel_key_codes.iter().copied().collect(),
            delay: Duration::from_millis(policy.answer_delay_ms),
            transcript: Mutex::new(Vec::new()),
        }
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.lock().expect("lock poisoned").clone()
    }

    fn record(&self, entry: TranscriptEntry) {
        self.transcript.lock().expect("lock poisoned").push(entry);
    }

    /// Runs `answer` after the configured delay, on a tokio task when a
    /// runtime is available.
    fn answer_later(&self, answer: impl FnOnce() + Send + 'static) {
        if self.delay.is_zero() {
            answer();
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let delay = self.delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    answer();
                });
            }
            Err(_) => {
                warn!("no tokio runtime, answering without delay");
                answer();
            }
        }
    }
}

impl KeyEventSink for SimulatedFramework {
    fn send_key_event(&self, event: NormalizedKeyEvent, responder: Option<Responder>) {
        info!(
            event_type = ?event.event_type,
            physical = format_args!("{:#x}", event.physical),
            logical = format_args!("{:#x}", event.logical),
            character = event.character.as_deref().unwrap_or(""),
            synthesized = event.synthesized,
            "key event"
        );
        let handled = self.handled_logical.contains(&event.logical);
        self.record(TranscriptEntry::KeyEvent(event));
        if let Some(responder) = responder {
            self.answer_later(move || responder.respond(handled));
        }
    }
}

impl BinaryMessenger for SimulatedFramework {
    fn send(&self, channel: &str, payload: Vec<u8>, reply: ReplyHandler) {
        let message: KeyChannelMessage = match serde_json::from_slice(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(%channel, error = %e, "simulator could not read channel message");
                reply(None);
                return;
            }
        };
        debug!(%channel, key_code = message.key_code, "channel message");
        let handled = self.handled_key_codes.contains(&message.key_code);
        self.record(TranscriptEntry::ChannelMessage {
            channel: channel.to_string(),
            message,
        });
        let payload = serde_json::to_vec(&KeyChannelReply { handled }).ok();
        self.answer_later(move || reply(payload));
    }
}

impl TextInputSink for SimulatedFramework {
    fn on_text(&self, text: &str) {
        info!(text, "text input");
        self.record(TranscriptEntry::Text {
            text: text.to_string(),
        });
    }
}
