//! Embedder delegate: composed keys to normalized key events.
//!
//! The [`EmbedderTranslator`] owns the framework-facing key model, the
//! pressing records (which physical keys the framework believes are down, and
//! with which logical key) plus the critical key synchronizer. For every
//! composed key it produces the ordered list of events the framework should
//! see:
//!
//! ```text
//!   [synthesized corrections…]  [the real event, if any]  [synthesized settle…]
//! ```
//!
//! The [`EmbedderDelegate`] sends that list to a [`KeyEventSink`]. Only the
//! real event carries the occurrence's [`Responder`]; synthesized events
//! expect no answer. When there is no real event to send (IME keystroke,
//! duplicate press, orphan release) the delegate answers "handled" itself so
//! the occurrence is neither stuck nor redispatched.
//!
//! # Following the physical key
//!
//! Records are keyed by physical id and every Repeat and Up reuses the
//! logical id recorded at press time. A numpad key pressed as `Numpad4` and
//! released after NumLock flipped (so the host now calls it `ArrowLeft`) is
//! still released as `Numpad4`.

use std::sync::Arc;

use keyrelay_core::keymap::logical::is_printable;
use keyrelay_core::keymap::windows_vk::{resolve_sided_key, vk::VK_RSHIFT};
use keyrelay_core::{ComposedKey, KeyEventType, KeyMapper, NormalizedKeyEvent};
use tracing::{debug, trace};

use super::critical_keys::{CriticalKeySynchronizer, EventKey, PressingRecords};
use super::dispatcher::{KeyHandlerDelegate, Responder};
use crate::infrastructure::key_state::{KeyStateOracle, KeyboardLayout};

/// Receives normalized key events on behalf of the framework.
///
/// Infrastructure implementations forward to the framework engine; test
/// implementations record calls. A `responder` accompanies real events only
/// and must be answered exactly once.
pub trait KeyEventSink {
    fn send_key_event(&self, event: NormalizedKeyEvent, responder: Option<Responder>);
}

/// The events produced for one composed key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Translation {
    /// Synthesized and real events, in delivery order. At most one has
    /// `synthesized == false`.
    pub events: Vec<NormalizedKeyEvent>,
    /// The occurrence must never be redispatched.
    pub never_redispatch: bool,
}

impl Translation {
    pub fn real_event(&self) -> Option<&NormalizedKeyEvent> {
        self.events.iter().find(|e| !e.synthesized)
    }
}

/// Turns composed keys into normalized events and tracks pressed keys.
pub struct EmbedderTranslator {
    keymap: &'static KeyMapper,
    oracle: Arc<dyn KeyStateOracle>,
    layout: Arc<dyn KeyboardLayout>,
    pressing_records: PressingRecords,
    critical_keys: CriticalKeySynchronizer,
}

impl EmbedderTranslator {
    pub fn new(
        keymap: &'static KeyMapper,
        oracle: Arc<dyn KeyStateOracle>,
        layout: Arc<dyn KeyboardLayout>,
    ) -> Self {
        let critical_keys = CriticalKeySynchronizer::new(keymap, layout.as_ref(), oracle.as_ref());
        Self {
            keymap,
            oracle,
            layout,
            pressing_records: PressingRecords::new(),
            critical_keys,
        }
    }

    /// Physical → logical ids of every key the framework believes is down.
    pub fn pressed_state(&self) -> &PressingRecords {
        &self.pressing_records
    }

    pub fn critical_keys(&self) -> &CriticalKeySynchronizer {
        &self.critical_keys
    }

    pub fn translate(&mut self, key: &ComposedKey) -> Translation {
        let occurrence = &key.occurrence;
        let virtual_key =
            resolve_sided_key(occurrence.virtual_key, occurrence.scan_code, occurrence.extended);
        let is_down = occurrence.is_down();
        let never_redispatch = occurrence.class.is_sys() || (is_down && virtual_key == VK_RSHIFT);

        if occurrence.ime_owned {
            trace!(sequence_id = occurrence.sequence_id, "IME keystroke, no events");
            return Translation {
                events: Vec::new(),
                never_redispatch,
            };
        }

        let physical = self
            .keymap
            .physical_key(occurrence.scan_code, occurrence.extended);
        let logical = self
            .keymap
            .logical_key(virtual_key, self.layout.character_for(virtual_key));
        self.critical_keys
            .update_last_seen(virtual_key, physical, logical);

        let event_key = EventKey {
            virtual_key,
            physical,
            is_down,
            was_already_down: occurrence.was_already_down,
        };
        let mut events = self.critical_keys.reconcile(
            &event_key,
            &mut self.pressing_records,
            self.oracle.as_ref(),
        );

        let character = key.character.filter(|c| is_printable(*c));
        let recorded = self.pressing_records.get(&physical).copied();
        let real = match (is_down, recorded) {
            (true, None) => {
                self.pressing_records.insert(physical, logical);
                Some(NormalizedKeyEvent::real(
                    KeyEventType::Down,
                    physical,
                    logical,
                    character,
                ))
            }
            (true, Some(recorded_logical)) if occurrence.was_already_down => {
                Some(NormalizedKeyEvent::real(
                    KeyEventType::Repeat,
                    physical,
                    recorded_logical,
                    character,
                ))
            }
            (true, Some(_)) => {
                debug!(physical, "duplicate press of a held key, ignoring");
                None
            }
            (false, Some(recorded_logical)) => {
                self.pressing_records.remove(&physical);
                Some(NormalizedKeyEvent::real(
                    KeyEventType::Up,
                    physical,
                    recorded_logical,
                    None,
                ))
            }
            (false, None) => {
                debug!(physical, "release of a key that is not down, dropping");
                None
            }
        };
        events.extend(real);
        events.extend(self.critical_keys.settle_after_event(
            &event_key,
            &mut self.pressing_records,
            self.oracle.as_ref(),
        ));

        Translation {
            events,
            never_redispatch,
        }
    }
}

/// Delegate that feeds the framework's key event stream.
pub struct EmbedderDelegate {
    translator: EmbedderTranslator,
    sink: Arc<dyn KeyEventSink>,
}

impl EmbedderDelegate {
    pub fn new(translator: EmbedderTranslator, sink: Arc<dyn KeyEventSink>) -> Self {
        Self { translator, sink }
    }

    pub fn translator(&self) -> &EmbedderTranslator {
        &self.translator
    }
}

impl KeyHandlerDelegate for EmbedderDelegate {
    fn handle_key(&mut self, key: &ComposedKey, responder: Responder) {
        let translation = self.translator.translate(key);
        let mut responder = Some(if translation.never_redispatch {
            responder.never_redispatch()
        } else {
            responder
        });

        for event in translation.events {
            if event.synthesized {
                self.sink.send_key_event(event, None);
            } else {
                self.sink.send_key_event(event, responder.take());
            }
        }
        if let Some(unused) = responder {
            unused.respond(true);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
