//! Composition accumulator: attaches characters to the key-downs that typed
//! them.
//!
//! Windows reports a keystroke as a `WM_KEYDOWN` followed, after the host's
//! translation step, by zero or more `WM_CHAR` / `WM_DEADCHAR` messages. The
//! framework wants one key event carrying its character, so a key-down whose
//! next queued message is a character is *held* until that character
//! arrives.
//!
//! # States (for beginners)
//!
//! - **Idle**: nothing in progress.
//! - **AwaitingDeadKeyCombination { mark }**: a dead key (`´`, `¨`, …) was
//!   typed. The next character tells us whether it combined: a character other
//!   than the mark (`é`) means it did; the mark itself means it did not, and
//!   the base character follows as a second `WM_CHAR`.
//! - **AwaitingLowSurrogate { high }**: the first half of a UTF-16 surrogate
//!   pair arrived; the second half completes one scalar value.
//!
//! Key messages that are not followed by a character pass straight through
//! and never reset the composition state. Between the two halves of a
//! surrogate pair they also leave the held key-down in place, so the pair
//! still lands on the key that typed it. Characters with no held key-down
//! (the host translated a redispatched key, or an input method committed
//! text) come out as text for the text-input sink.

use keyrelay_core::keymap::logical::is_printable;
use keyrelay_core::{ComposedKey, MessageClass, NativeKeyMessage, RawKeyOccurrence};
use tracing::{debug, warn};

const HIGH_SURROGATES: std::ops::RangeInclusive<u16> = 0xD800..=0xDBFF;
const LOW_SURROGATES: std::ops::RangeInclusive<u16> = 0xDC00..=0xDFFF;

/// Output of the accumulator, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composed {
    /// A key occurrence ready for dispatch.
    Key(ComposedKey),
    /// Committed text not attached to any key-down.
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositionState {
    #[default]
    Idle,
    AwaitingDeadKeyCombination {
        mark: char,
    },
    AwaitingLowSurrogate {
        high: u16,
    },
}

#[derive(Debug, Default)]
pub struct CompositionAccumulator {
    state: CompositionState,
    held: Option<RawKeyOccurrence>,
}

impl CompositionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CompositionState {
        self.state
    }

    /// The key-down waiting for its character, if any.
    pub fn held(&self) -> Option<&RawKeyOccurrence> {
        self.held.as_ref()
    }

    /// Accepts a key message. `next` is the message queued right behind it.
    pub fn accept_key(
        &mut self,
        occurrence: RawKeyOccurrence,
        next: Option<&NativeKeyMessage>,
    ) -> Vec<Composed> {
        let mut out = Vec::new();
        if self.splitting_surrogate_pair() {
            debug!(
                sequence_id = occurrence.sequence_id,
                "key between surrogate halves passes through"
            );
            out.push(Composed::Key(ComposedKey::new(occurrence, None)));
            return out;
        }
        if let Some(held) = self.held.take() {
            debug!(
                sequence_id = held.sequence_id,
                "held key-down superseded before its character"
            );
            out.push(Composed::Key(ComposedKey::new(held, None)));
        }
        if occurrence.is_down() && next.is_some_and(|m| m.class.is_character()) {
            self.held = Some(occurrence);
        } else {
            out.push(Composed::Key(ComposedKey::new(occurrence, None)));
        }
        out
    }

    /// Accepts a `WM_CHAR` or `WM_DEADCHAR`.
    pub fn accept_character(&mut self, message: &NativeKeyMessage) -> Vec<Composed> {
        let unit = message.code;
        if message.class == MessageClass::DeadChar {
            return self.accept_dead_char(unit);
        }

        if HIGH_SURROGATES.contains(&unit) {
            if let CompositionState::AwaitingLowSurrogate { high } = self.state {
                warn!(high, "high surrogate replaced by another high surrogate");
            }
            self.state = CompositionState::AwaitingLowSurrogate { high: unit };
            return Vec::new();
        }

        if LOW_SURROGATES.contains(&unit) {
            let CompositionState::AwaitingLowSurrogate { high } = self.state else {
                warn!(low = unit, "orphan low surrogate dropped");
                return self.release_held();
            };
            self.state = CompositionState::Idle;
            return match char::decode_utf16([high, unit]).next() {
                Some(Ok(c)) => self.attach(c),
                _ => self.release_held(),
            };
        }

        let Some(c) = char::from_u32(u32::from(unit)) else {
            return self.release_held();
        };
        match self.state {
            CompositionState::AwaitingDeadKeyCombination { mark } => {
                if c == mark {
                    debug!(%mark, "dead key did not combine");
                } else {
                    debug!(%mark, composed = %c, "dead key combined");
                }
            }
            CompositionState::AwaitingLowSurrogate { high } => {
                warn!(high, "high surrogate without its low half dropped");
            }
            CompositionState::Idle => {}
        }
        self.state = CompositionState::Idle;
        self.attach(c)
    }

    /// Releases a held key-down whose character will not come.
    ///
    /// Call after every message with the message now at the head of the
    /// queue.
    pub fn release_orphan(&mut self, next: Option<&NativeKeyMessage>) -> Option<Composed> {
        match next {
            Some(m) if m.class.is_character() => return None,
            Some(_) if self.splitting_surrogate_pair() => return None,
            _ => {}
        }
        self.held
            .take()
            .map(|held| Composed::Key(ComposedKey::new(held, None)))
    }

    /// A key-down is held and only the high half of its character is in.
    fn splitting_surrogate_pair(&self) -> bool {
        self.held.is_some() && matches!(self.state, CompositionState::AwaitingLowSurrogate { .. })
    }

    fn accept_dead_char(&mut self, unit: u16) -> Vec<Composed> {
        match char::from_u32(u32::from(unit)) {
            Some(mark) => {
                self.state = CompositionState::AwaitingDeadKeyCombination { mark };
            }
            None => warn!(unit, "dead char is not a scalar value"),
        }
        // The dead key's own down carries no character.
        self.release_held()
    }

    fn attach(&mut self, c: char) -> Vec<Composed> {
        match self.held.take() {
            Some(held) => {
                let character = Some(c).filter(|c| is_printable(*c));
                vec![Composed::Key(ComposedKey::new(held, character))]
            }
            None if is_printable(c) => vec![Composed::Text(c.to_string())],
            None => Vec::new(),
        }
    }

    fn release_held(&mut self) -> Vec<Composed> {
        self.held
            .take()
            .map(|held| Composed::Key(ComposedKey::new(held, None)))
            .into_iter()
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
