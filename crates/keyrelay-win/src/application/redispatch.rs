//! Redispatch gate: giving unhandled keys back to the host.
//!
//! When no delegate handles an occurrence, the host should still get to do
//! its default work with it: type the character into a native text field,
//! run a menu accelerator, move focus. The gate rebuilds the native message,
//! tags it [`MessageOrigin::Redispatched`] and injects it into the message
//! queue. When it comes back around, [`RedispatchGate::consume_replay`]
//! recognizes it and the pipeline passes it to the host untouched.
//!
//! # Recognizing replays
//!
//! A replay is recognized by its origin tag *and* a structural hash over
//! `(virtual key, scan code, class, extended, was_already_down)`. A real
//! keystroke identical to an outstanding replay carries no tag, so it is a
//! fresh occurrence. Each record is consumed by the first matching replay.
//!
//! # AltGr
//!
//! On layouts with AltGr, Windows reports the key as a fake left-control down
//! followed by a right-alt down. If the window loses the matching control
//! release, the framework believes control is stuck. When AltGr is released
//! while the host still reports left control down, the gate forges a
//! left-control key-up tagged [`MessageOrigin::Forged`]; it is processed as a
//! brand new occurrence when it arrives.

use std::sync::Arc;

use keyrelay_core::keymap::windows_vk::{
    resolve_sided_key,
    vk::{VK_CONTROL, VK_LCONTROL, VK_RMENU},
};
use keyrelay_core::{MessageClass, MessageOrigin, NativeKeyMessage, RawKeyOccurrence};
use tracing::{debug, error, warn};

use super::dispatcher::Resolution;
use crate::infrastructure::key_state::KeyStateOracle;
use crate::infrastructure::message_source::NativeMessageSource;

/// Scan code of the left control key, also used by the fake AltGr control.
const CONTROL_LEFT_SCAN_CODE: u16 = 0x1D;

/// A redispatched message we expect to see again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedispatchRecord {
    pub hash: u64,
    pub virtual_key: u16,
    pub class: MessageClass,
}

#[derive(Debug, Default, Clone, Copy)]
struct AltGrTracker {
    /// The previous key was a left-control press, possibly AltGr's fake one.
    control_candidate: bool,
    /// Right alt is down as AltGr.
    active: bool,
}

pub struct RedispatchGate {
    source: Arc<dyn NativeMessageSource>,
    outstanding: Vec<RedispatchRecord>,
    backlog_warning_threshold: usize,
    forge_altgr_control_release: bool,
    altgr: AltGrTracker,
}

impl RedispatchGate {
    pub fn new(
        source: Arc<dyn NativeMessageSource>,
        backlog_warning_threshold: usize,
        forge_altgr_control_release: bool,
    ) -> Self {
        Self {
            source,
            outstanding: Vec::new(),
            backlog_warning_threshold,
            forge_altgr_control_release,
            altgr: AltGrTracker::default(),
        }
    }

    pub fn outstanding(&self) -> &[RedispatchRecord] {
        &self.outstanding
    }

    /// `true` if `message` is one of our replays; its record is consumed.
    pub fn consume_replay(&mut self, message: &NativeKeyMessage) -> bool {
        if message.origin != MessageOrigin::Redispatched {
            return false;
        }
        let hash = message.structural_hash();
        match self.outstanding.iter().position(|r| r.hash == hash) {
            Some(index) => {
                let record = self.outstanding.remove(index);
                debug!(
                    virtual_key = record.virtual_key,
                    class = ?record.class,
                    "replayed message returned to host"
                );
                true
            }
            None => {
                warn!(
                    virtual_key = message.code,
                    "tagged replay with no outstanding record, treating as fresh"
                );
                false
            }
        }
    }

    /// Redispatches `occurrence` unless it was handled or must stay consumed.
    pub fn on_occurrence_resolved(&mut self, occurrence: &RawKeyOccurrence, resolution: &Resolution) {
        if resolution.handled || resolution.suppress_redispatch {
            return;
        }
        let message = occurrence.to_message(MessageOrigin::Redispatched);
        let record = RedispatchRecord {
            hash: message.structural_hash(),
            virtual_key: message.code,
            class: message.class,
        };
        self.outstanding.push(record);
        if let Err(e) = self.source.inject(message) {
            error!(
                sequence_id = occurrence.sequence_id,
                error = %e,
                "failed to redispatch unhandled key"
            );
            if let Some(index) = self.outstanding.iter().rposition(|r| *r == record) {
                self.outstanding.remove(index);
            }
            return;
        }
        debug!(
            sequence_id = occurrence.sequence_id,
            virtual_key = occurrence.virtual_key,
            "redispatched unhandled key"
        );
        if self.outstanding.len() > self.backlog_warning_threshold {
            warn!(
                outstanding = self.outstanding.len(),
                threshold = self.backlog_warning_threshold,
                "redispatched messages are not coming back"
            );
        }
    }

    /// Watches fresh key occurrences for AltGr and forges the missing
    /// left-control release when needed.
    pub fn observe_fresh_key(&mut self, occurrence: &RawKeyOccurrence, oracle: &dyn KeyStateOracle) {
        if !self.forge_altgr_control_release {
            return;
        }
        let virtual_key =
            resolve_sided_key(occurrence.virtual_key, occurrence.scan_code, occurrence.extended);
        let is_down = occurrence.is_down();

        match virtual_key {
            VK_LCONTROL if is_down => {
                self.altgr.control_candidate =
                    occurrence.scan_code == CONTROL_LEFT_SCAN_CODE && !occurrence.extended;
                return;
            }
            VK_RMENU if is_down => {
                if self.altgr.control_candidate {
                    self.altgr.active = true;
                }
            }
            VK_RMENU => {
                if self.altgr.active {
                    self.altgr.active = false;
                    if oracle.key_state(VK_LCONTROL).pressed {
                        self.forge_control_release();
                    }
                }
            }
            _ => {}
        }
        self.altgr.control_candidate = false;
    }

    fn forge_control_release(&self) {
        let forged = NativeKeyMessage::key(
            MessageClass::KeyUp,
            VK_CONTROL,
            CONTROL_LEFT_SCAN_CODE,
            false,
            true,
        )
        .with_origin(MessageOrigin::Forged);
        match self.source.inject(forged) {
            Ok(()) => debug!("forged left control release after AltGr"),
            Err(e) => error!(error = %e, "failed to forge left control release"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use keyrelay_core::keymap::windows_vk::vk::VK_MENU;

    use super::*;
    use crate::infrastructure::key_state::scripted::ScriptedKeyboard;
    use crate::infrastructure::message_source::scripted::ScriptedMessageSource;

    fn a_down(id: u64) -> RawKeyOccurrence {
        let message = NativeKeyMessage::key(MessageClass::KeyDown, 0x41, 0x1E, false, false);
        RawKeyOccurrence::from_message(&message, id).unwrap()
    }

    fn resolution(handled: bool, suppress_redispatch: bool) -> Resolution {
        Resolution {
            sequence_id: 1,
            handled,
            suppress_redispatch,
        }
    }

    fn gate() -> (Arc<ScriptedMessageSource>, RedispatchGate) {
        let source = Arc::new(ScriptedMessageSource::new());
        let gate = RedispatchGate::new(source.clone(), 100, true);
        (source, gate)
    }

    #[test]
    fn test_unhandled_occurrence_is_injected_once() {
        // Arrange
        let (source, mut gate) = gate();

        // Act
        gate.on_occurrence_resolved(&a_down(1), &resolution(false, false));

        // Assert
        let injected = source.injected();
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].origin, MessageOrigin::Redispatched);
        assert_eq!(injected[0].code, 0x41);
        assert_eq!(gate.outstanding().len(), 1);
    }

    #[test]
    fn test_handled_or_suppressed_occurrence_is_not_injected() {
        let (source, mut gate) = gate();
        gate.on_occurrence_resolved(&a_down(1), &resolution(true, false));
        gate.on_occurrence_resolved(&a_down(2), &resolution(false, true));
        assert!(source.injected().is_empty());
        assert!(gate.outstanding().is_empty());
    }

    #[test]
    fn test_replay_is_consumed_exactly_once() {
        // Arrange
        let (source, mut gate) = gate();
        gate.on_occurrence_resolved(&a_down(1), &resolution(false, false));
        let replay = source.pop().unwrap();

        // Act
        let first = gate.consume_replay(&replay);
        let second = gate.consume_replay(&replay);

        // Assert
        assert!(first);
        assert!(!second);
        assert!(gate.outstanding().is_empty());
    }

    #[test]
    fn test_identical_real_message_is_not_a_replay() {
        let (_source, mut gate) = gate();
        gate.on_occurrence_resolved(&a_down(1), &resolution(false, false));

        let real = a_down(2).to_message(MessageOrigin::Hardware);

        assert!(!gate.consume_replay(&real));
        assert_eq!(gate.outstanding().len(), 1);
    }

    #[test]
    fn test_failed_injection_drops_record() {
        let (source, mut gate) = gate();
        source.reject_injections(true);

        gate.on_occurrence_resolved(&a_down(1), &resolution(false, false));

        assert!(gate.outstanding().is_empty());
    }

    fn key(class: MessageClass, virtual_key: u16, scan: u16, extended: bool) -> RawKeyOccurrence {
        let message = NativeKeyMessage::key(class, virtual_key, scan, extended, false);
        RawKeyOccurrence::from_message(&message, 1).unwrap()
    }

    #[test]
    fn test_altgr_release_forges_control_up() {
        // Arrange
        let (source, mut gate) = gate();
        let keyboard = ScriptedKeyboard::new();
        keyboard.press(VK_LCONTROL);
        gate.observe_fresh_key(&key(MessageClass::KeyDown, VK_CONTROL, 0x1D, false), &keyboard);
        gate.observe_fresh_key(&key(MessageClass::SysKeyDown, VK_MENU, 0x38, true), &keyboard);

        // Act
        gate.observe_fresh_key(&key(MessageClass::KeyUp, VK_MENU, 0x38, true), &keyboard);

        // Assert
        let injected = source.injected();
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].origin, MessageOrigin::Forged);
        assert_eq!(injected[0].class, MessageClass::KeyUp);
        assert_eq!(injected[0].code, VK_CONTROL);
        assert_eq!(injected[0].scan_code, 0x1D);
        assert!(!gate.consume_replay(&injected[0]));
    }

    #[test]
    fn test_altgr_release_with_control_up_forges_nothing() {
        let (source, mut gate) = gate();
        let keyboard = ScriptedKeyboard::new();
        gate.observe_fresh_key(&key(MessageClass::KeyDown, VK_CONTROL, 0x1D, false), &keyboard);
        gate.observe_fresh_key(&key(MessageClass::KeyDown, VK_MENU, 0x38, true), &keyboard);
        gate.observe_fresh_key(&key(MessageClass::KeyUp, VK_MENU, 0x38, true), &keyboard);
        assert!(source.injected().is_empty());
    }

    #[test]
    fn test_plain_right_alt_release_forges_nothing() {
        // Right alt without the fake control in front is not AltGr.
        let (source, mut gate) = gate();
        let keyboard = ScriptedKeyboard::new();
        keyboard.press(VK_LCONTROL);
        gate.observe_fresh_key(&key(MessageClass::KeyDown, VK_MENU, 0x38, true), &keyboard);
        gate.observe_fresh_key(&key(MessageClass::KeyUp, VK_MENU, 0x38, true), &keyboard);
        assert!(source.injected().is_empty());
    }

    #[test]
    fn test_forging_can_be_disabled() {
        let source = Arc::new(ScriptedMessageSource::new());
        let mut gate = RedispatchGate::new(source.clone(), 100, false);
        let keyboard = ScriptedKeyboard::new();
        keyboard.press(VK_LCONTROL);
        gate.observe_fresh_key(&key(MessageClass::KeyDown, VK_CONTROL, 0x1D, false), &keyboard);
        gate.observe_fresh_key(&key(MessageClass::KeyDown, VK_MENU, 0x38, true), &keyboard);
        gate.observe_fresh_key(&key(MessageClass::KeyUp, VK_MENU, 0x38, true), &keyboard);
        assert!(source.injected().is_empty());
    }
}
