//! Normalized key events delivered to the framework.

use serde::{Deserialize, Serialize};

/// The transition a normalized event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEventType {
    Down,
    Repeat,
    Up,
}

/// One key event in the framework's protocol.
///
/// Serializes as
/// `{"type":"down","physical":458756,"logical":97,"character":"a","synthesized":false}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedKeyEvent {
    #[serde(rename = "type")]
    pub event_type: KeyEventType,
    pub physical: u64,
    pub logical: u64,
    pub character: Option<String>,
    /// Produced by state synchronization rather than by a host message.
    /// Synthesized events expect no answer.
    pub synthesized: bool,
}

impl NormalizedKeyEvent {
    /// A corrective event produced by the critical key synchronizer.
    pub fn synthesized(event_type: KeyEventType, physical: u64, logical: u64) -> Self {
        Self {
            event_type,
            physical,
            logical,
            character: None,
            synthesized: true,
        }
    }

    /// The event for a real host message.
    pub fn real(
        event_type: KeyEventType,
        physical: u64,
        logical: u64,
        character: Option<char>,
    ) -> Self {
        Self {
            event_type,
            physical,
            logical,
            character: character.map(String::from),
            synthesized: false,
        }
    }
}
