//! KeyboardPipeline: the window procedure's single entry point.
//!
//! The host calls [`KeyboardPipeline::handle_message`] for every keyboard
//! message, in order, on the UI thread, and needs an immediate answer: did
//! we consume it, or should it get default processing? Everything else (the
//! framework's verdict, redispatching) happens later, as answers arrive.
//!
//! # One message, step by step
//!
//! 1. Apply any delegate answers that arrived since the last message.
//! 2. A replay we injected ourselves goes straight back to the host.
//! 3. Key messages become numbered occurrences; character messages feed the
//!    composition accumulator.
//! 4. Composed keys are dispatched to the delegates; loose text goes to the
//!    text-input sink.
//! 5. A held key-down whose character is not next in the queue is released.
//! 6. Resolved occurrences are handed to the redispatch gate.
//!
//! # Ownership
//!
//! The pipeline owns every state machine. Completion callbacks cannot borrow
//! the redispatch gate while the dispatcher is running them, so they only
//! queue `(occurrence, resolution)` pairs into a shared list that
//! [`KeyboardPipeline::pump_answers`] hands to the gate afterwards.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use keyrelay_core::keymap::windows_vk::vk::VK_PACKET;
use keyrelay_core::{
    NativeKeyMessage, RawKeyOccurrence, SequenceCounter, WINDOWS_KEYMAP,
};
use tracing::{trace, warn};

use super::channel::{BinaryMessenger, ChannelDelegate};
use super::composition::{Composed, CompositionAccumulator};
use super::critical_keys::PressingRecords;
use super::dispatcher::{KeyDelegate, KeyDispatcher, Resolution};
use super::embedder::{EmbedderDelegate, EmbedderTranslator, KeyEventSink};
use super::redispatch::{RedispatchGate, RedispatchRecord};
use crate::infrastructure::key_state::{KeyStateOracle, KeyboardLayout};
use crate::infrastructure::message_source::NativeMessageSource;
use crate::infrastructure::storage::config::PipelineConfig;

/// Receives committed text that is not attached to a key event.
pub trait TextInputSink {
    fn on_text(&self, text: &str);
}

/// What the host should do with the message it just passed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    /// The pipeline took the message; skip default processing.
    Consumed,
    /// Run the host's default processing (`DefWindowProc`, translation).
    HostDefault,
}

/// The host-side collaborators a pipeline talks to.
pub struct Collaborators {
    pub source: Arc<dyn NativeMessageSource>,
    pub oracle: Arc<dyn KeyStateOracle>,
    pub layout: Arc<dyn KeyboardLayout>,
    pub event_sink: Arc<dyn KeyEventSink>,
    pub messenger: Arc<dyn BinaryMessenger>,
    pub text_sink: Arc<dyn TextInputSink>,
}

type ResolvedQueue = Rc<RefCell<VecDeque<(RawKeyOccurrence, Resolution)>>>;

pub struct KeyboardPipeline {
    source: Arc<dyn NativeMessageSource>,
    oracle: Arc<dyn KeyStateOracle>,
    text_sink: Arc<dyn TextInputSink>,
    sequence: SequenceCounter,
    composer: CompositionAccumulator,
    dispatcher: KeyDispatcher<KeyDelegate>,
    gate: RedispatchGate,
    resolved: ResolvedQueue,
}

impl KeyboardPipeline {
    pub fn new(config: &PipelineConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            source,
            oracle,
            layout,
            event_sink,
            messenger,
            text_sink,
        } = collaborators;

        let translator = EmbedderTranslator::new(&WINDOWS_KEYMAP, oracle.clone(), layout);
        let mut delegates = vec![KeyDelegate::Embedder(EmbedderDelegate::new(
            translator, event_sink,
        ))];
        if config.legacy_channel {
            delegates.push(KeyDelegate::Channel(ChannelDelegate::new(
                messenger,
                oracle.clone(),
                &WINDOWS_KEYMAP,
                config.channel_name.clone(),
            )));
        }

        Self {
            gate: RedispatchGate::new(
                source.clone(),
                config.backlog_warning_threshold,
                config.forge_altgr_control_release,
            ),
            dispatcher: KeyDispatcher::new(delegates, config.backlog_warning_threshold),
            source,
            oracle,
            text_sink,
            sequence: SequenceCounter::new(),
            composer: CompositionAccumulator::new(),
            resolved: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Handles a raw Win32 keyboard message.
    ///
    /// Messages that cannot be decoded are logged and left to the host.
    pub fn handle_win32(&mut self, msg: u32, wparam: usize, lparam: isize) -> MessageDisposition {
        match NativeKeyMessage::from_win32(msg, wparam, lparam) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                warn!(msg, wparam, error = %e, "dropping undecodable keyboard message");
                MessageDisposition::HostDefault
            }
        }
    }

    /// Handles one decoded keyboard message.
    pub fn handle_message(&mut self, message: NativeKeyMessage) -> MessageDisposition {
        self.pump_answers();

        if self.gate.consume_replay(&message) {
            return MessageDisposition::HostDefault;
        }
        if message.class.is_key() && message.code == VK_PACKET {
            // Injected Unicode input; the host turns it into WM_CHAR.
            trace!("VK_PACKET left to the host");
            return MessageDisposition::HostDefault;
        }

        let outputs = match RawKeyOccurrence::from_message(&message, self.sequence.next()) {
            Some(occurrence) => {
                self.gate.observe_fresh_key(&occurrence, self.oracle.as_ref());
                let next = self.source.peek_next();
                self.composer.accept_key(occurrence, next.as_ref())
            }
            None => self.composer.accept_character(&message),
        };
        self.emit(outputs);

        let next = self.source.peek_next();
        if let Some(orphan) = self.composer.release_orphan(next.as_ref()) {
            self.emit(vec![orphan]);
        }
        self.pump_answers();

        if message.class.is_sys() {
            MessageDisposition::HostDefault
        } else {
            MessageDisposition::Consumed
        }
    }

    fn emit(&mut self, outputs: Vec<Composed>) {
        for output in outputs {
            match output {
                Composed::Key(key) => {
                    let occurrence = key.occurrence;
                    let resolved = Rc::clone(&self.resolved);
                    self.dispatcher.dispatch(
                        key,
                        Box::new(move |resolution| {
                            resolved.borrow_mut().push_back((occurrence, resolution));
                        }),
                    );
                }
                Composed::Text(text) => self.text_sink.on_text(&text),
            }
        }
    }

    /// Applies arrived answers and redispatches what came back unhandled.
    pub fn pump_answers(&mut self) {
        self.dispatcher.drain_answers();
        loop {
            let next = self.resolved.borrow_mut().pop_front();
            let Some((occurrence, resolution)) = next else {
                break;
            };
            self.gate.on_occurrence_resolved(&occurrence, &resolution);
        }
    }

    /// Waits for the next delegate answer, then pumps.
    ///
    /// Returns `false` without waiting when no occurrence is pending.
    pub async fn wait_for_answer(&mut self) -> bool {
        let got = self.dispatcher.wait_for_answer().await;
        self.pump_answers();
        got
    }

    /// Physical → logical ids the framework currently believes are down.
    pub fn pressed_keys(&self) -> PressingRecords {
        self.dispatcher
            .delegates()
            .iter()
            .find_map(|d| match d {
                KeyDelegate::Embedder(embedder) => {
                    Some(embedder.translator().pressed_state().clone())
                }
                KeyDelegate::Channel(_) => None,
            })
            .unwrap_or_default()
    }

    /// Occurrences still waiting for a delegate answer.
    pub fn pending_events(&self) -> usize {
        self.dispatcher.pending_count()
    }

    /// Redispatched messages that have not come back yet.
    pub fn outstanding_redispatches(&self) -> &[RedispatchRecord] {
        self.gate.outstanding()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
