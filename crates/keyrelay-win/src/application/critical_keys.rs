//! Critical key synchronization: keeping modifier and lock keys honest.
//!
//! The framework learns about shift, control, alt, meta and the three lock
//! keys only through the events we send it. If the window misses a message
//! (focus moved while the key was held, another app toggled CapsLock), the
//! framework's idea of the keyboard drifts from the host's. Before every real
//! event we compare our model against the [`KeyStateOracle`] and synthesize
//! the events that bring the framework back in line.
//!
//! # The lock key cycle (for beginners)
//!
//! A lock key has two bits of state, pressed and toggled, and a physical key
//! can only move through them in one order:
//!
//! ```text
//!   0 Released/Off ──Down──▶ 1 Pressed/On ──Up──▶ 2 Released/On
//!        ▲                                              │
//!        └────────Up──── 3 Pressed/Off ◀──Down──────────┘
//! ```
//!
//! To repair a lock key we walk this cycle forward from the phase we believe
//! the key is in to the phase the host reports, emitting one synthesized
//! Down or Up per step. The walk is at most three steps long.

use std::collections::BTreeMap;

use keyrelay_core::keymap::windows_vk::hid_to_vk;
use keyrelay_core::{HidKeyCode, KeyEventType, KeyMapper, NormalizedKeyEvent};
use tracing::debug;

use crate::infrastructure::key_state::{KeyStateOracle, KeyboardLayout};

/// Keys the framework currently believes are down: physical id → logical id.
pub type PressingRecords = BTreeMap<u64, u64>;

/// `(usage, extended)` for every tracked key, in synthesis order.
///
/// All of them are checked for the pressed state; lock keys also for the
/// toggle.
const CRITICAL_KEYS: &[(HidKeyCode, bool)] = &[
    (HidKeyCode::ShiftLeft, false),
    (HidKeyCode::ShiftRight, false),
    (HidKeyCode::ControlLeft, false),
    (HidKeyCode::ControlRight, true),
    (HidKeyCode::AltLeft, false),
    (HidKeyCode::AltRight, true),
    (HidKeyCode::MetaLeft, true),
    (HidKeyCode::MetaRight, true),
    (HidKeyCode::CapsLock, false),
    (HidKeyCode::ScrollLock, false),
    (HidKeyCode::NumLock, true),
];

// ── Lock phases ───────────────────────────────────────────────────────────────

/// Position of a lock key in its four-phase cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPhase {
    ReleasedOff = 0,
    PressedOn = 1,
    ReleasedOn = 2,
    PressedOff = 3,
}

impl LockPhase {
    pub const ALL: [LockPhase; 4] = [
        LockPhase::ReleasedOff,
        LockPhase::PressedOn,
        LockPhase::ReleasedOn,
        LockPhase::PressedOff,
    ];

    pub fn from_state(pressed: bool, toggled: bool) -> Self {
        match (pressed, toggled) {
            (false, false) => LockPhase::ReleasedOff,
            (true, true) => LockPhase::PressedOn,
            (false, true) => LockPhase::ReleasedOn,
            (true, false) => LockPhase::PressedOff,
        }
    }

    pub fn is_pressed(self) -> bool {
        matches!(self, LockPhase::PressedOn | LockPhase::PressedOff)
    }

    pub fn is_toggled(self) -> bool {
        matches!(self, LockPhase::PressedOn | LockPhase::ReleasedOn)
    }

    pub fn next(self) -> Self {
        LockPhase::ALL[(self as usize + 1) % 4]
    }

    /// The event that moves a key out of this phase.
    pub fn step_event(self) -> KeyEventType {
        if self.is_pressed() {
            KeyEventType::Up
        } else {
            KeyEventType::Down
        }
    }

    /// Events that walk the cycle forward from `self` to `target`.
    pub fn path_to(self, target: LockPhase) -> Vec<KeyEventType> {
        let steps = (target as usize + 4 - self as usize) % 4;
        let mut phase = self;
        let mut path = Vec::with_capacity(steps);
        for _ in 0..steps {
            path.push(phase.step_event());
            phase = phase.next();
        }
        path
    }
}

// ── Model ─────────────────────────────────────────────────────────────────────

/// Our model of one tracked key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalKey {
    pub virtual_key: u16,
    /// Physical id most recently seen for this virtual key.
    pub physical: u64,
    /// Logical id most recently seen for this virtual key.
    pub logical: u64,
    pub check_pressed: bool,
    pub check_toggled: bool,
    /// Lock keys: what we last told the framework about the toggle.
    pub toggled_on: bool,
}

/// The real event being translated, as the synchronizer needs to see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventKey {
    /// Sided virtual key.
    pub virtual_key: u16,
    pub physical: u64,
    pub is_down: bool,
    pub was_already_down: bool,
}

/// Tracks the critical keys and emits corrective events.
#[derive(Debug, Clone)]
pub struct CriticalKeySynchronizer {
    keys: Vec<CriticalKey>,
}

impl CriticalKeySynchronizer {
    /// Seeds ids from the layout and lock toggles from the oracle.
    pub fn new(
        keymap: &KeyMapper,
        layout: &dyn KeyboardLayout,
        oracle: &dyn KeyStateOracle,
    ) -> Self {
        let keys = CRITICAL_KEYS
            .iter()
            .filter_map(|&(usage, extended)| {
                let virtual_key = hid_to_vk(usage)?;
                let check_toggled = usage.is_lock();
                let scan_code = layout.scan_code_for(virtual_key, extended);
                Some(CriticalKey {
                    virtual_key,
                    physical: keymap.physical_key(scan_code, extended),
                    logical: keymap.logical_key(virtual_key, 0),
                    check_pressed: true,
                    check_toggled,
                    toggled_on: check_toggled && oracle.key_state(virtual_key).toggled,
                })
            })
            .collect();
        Self { keys }
    }

    pub fn keys(&self) -> &[CriticalKey] {
        &self.keys
    }

    pub fn key(&self, virtual_key: u16) -> Option<&CriticalKey> {
        self.keys.iter().find(|k| k.virtual_key == virtual_key)
    }

    /// Remembers the ids the observed key was last reported with.
    pub fn update_last_seen(&mut self, virtual_key: u16, physical: u64, logical: u64) {
        if let Some(key) = self.keys.iter_mut().find(|k| k.virtual_key == virtual_key) {
            key.physical = physical;
            key.logical = logical;
        }
    }

    /// Events to emit before `event` so the framework's view matches the
    /// host's. Lock toggles are repaired first, then pressed states.
    pub fn reconcile(
        &mut self,
        event: &EventKey,
        records: &mut PressingRecords,
        oracle: &dyn KeyStateOracle,
    ) -> Vec<NormalizedKeyEvent> {
        let mut out = self.sync_toggled(event, records, oracle);
        out.extend(self.sync_pressed(event, records, oracle));
        out
    }

    fn sync_toggled(
        &mut self,
        event: &EventKey,
        records: &mut PressingRecords,
        oracle: &dyn KeyStateOracle,
    ) -> Vec<NormalizedKeyEvent> {
        let mut out = Vec::new();
        for key in self.keys.iter_mut().filter(|k| k.check_toggled) {
            let truth = oracle.key_state(key.virtual_key);
            let is_event_key = key.virtual_key == event.virtual_key;
            let toggles_now = is_event_key && event.is_down && !event.was_already_down;
            // The oracle already reflects the event being processed, so a
            // fresh press shows the toggle it is about to cause.
            let target_toggled = if toggles_now {
                !truth.toggled
            } else {
                truth.toggled
            };

            if key.toggled_on != target_toggled {
                let present = records.contains_key(&key.physical);
                let target_pressed = if is_event_key {
                    if event.is_down {
                        event.was_already_down
                    } else {
                        present
                    }
                } else {
                    truth.pressed
                };
                let from = LockPhase::from_state(present, key.toggled_on);
                let to = LockPhase::from_state(target_pressed, target_toggled);
                debug!(
                    virtual_key = key.virtual_key,
                    ?from,
                    ?to,
                    "lock key out of sync, walking toggle cycle"
                );
                for step in from.path_to(to) {
                    out.push(synthesize(step, key, records));
                }
            }
            key.toggled_on = truth.toggled;
        }
        out
    }

    fn sync_pressed(
        &self,
        event: &EventKey,
        records: &mut PressingRecords,
        oracle: &dyn KeyStateOracle,
    ) -> Vec<NormalizedKeyEvent> {
        let mut out = Vec::new();
        for key in self.keys.iter().filter(|k| k.check_pressed) {
            let is_event_key = if event.is_down {
                key.virtual_key == event.virtual_key
            } else {
                key.physical == event.physical
            };
            if is_event_key {
                continue;
            }
            let pressed = oracle.key_state(key.virtual_key).pressed;
            let present = records.contains_key(&key.physical);
            if pressed != present {
                let step = if pressed {
                    KeyEventType::Down
                } else {
                    KeyEventType::Up
                };
                debug!(
                    virtual_key = key.virtual_key,
                    ?step,
                    "modifier out of sync"
                );
                out.push(synthesize(step, key, records));
            }
        }
        out
    }

    /// Events to emit after `event`.
    ///
    /// A fresh lock key press the host already reports as released is
    /// followed by a synthesized Up, so the framework does not hold the key
    /// down forever.
    pub fn settle_after_event(
        &self,
        event: &EventKey,
        records: &mut PressingRecords,
        oracle: &dyn KeyStateOracle,
    ) -> Vec<NormalizedKeyEvent> {
        if !event.is_down || event.was_already_down {
            return Vec::new();
        }
        let Some(key) = self
            .keys
            .iter()
            .find(|k| k.check_toggled && k.virtual_key == event.virtual_key)
        else {
            return Vec::new();
        };
        if oracle.key_state(key.virtual_key).pressed || !records.contains_key(&event.physical) {
            return Vec::new();
        }
        let logical = records.remove(&event.physical).unwrap_or(key.logical);
        vec![NormalizedKeyEvent::synthesized(
            KeyEventType::Up,
            event.physical,
            logical,
        )]
    }
}

/// Builds one synthesized event and applies it to the records.
fn synthesize(
    step: KeyEventType,
    key: &CriticalKey,
    records: &mut PressingRecords,
) -> NormalizedKeyEvent {
    match step {
        KeyEventType::Up => {
            let logical = records.remove(&key.physical).unwrap_or(key.logical);
            NormalizedKeyEvent::synthesized(KeyEventType::Up, key.physical, logical)
        }
        _ => {
            records.insert(key.physical, key.logical);
            NormalizedKeyEvent::synthesized(KeyEventType::Down, key.physical, key.logical)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
