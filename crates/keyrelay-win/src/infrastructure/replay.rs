//! Keyboard trace files and the loop that replays them.
//!
//! A trace is a TOML file describing a keyboard session: the initial key
//! states, the layout's dead keys, what the host's translation step types
//! for replayed key-downs, how the framework answers, and the hardware
//! messages in arrival order.
//!
//! ```toml
//! [framework]
//! handled_logical_keys = [0x61]
//! answer_delay_ms = 2
//!
//! [[key_states]]
//! virtual_key = 0x14
//! toggled = true
//!
//! [[host_translations]]
//! virtual_key = 0x42
//! text = "b"
//!
//! [[messages]]
//! class = "key_down"
//! code = 0x41
//! scan_code = 0x1E
//!
//! [[messages]]
//! class = "char"
//! code = 0x61
//! scan_code = 0x1E
//! ```
//!
//! # How a replay runs (for beginners)
//!
//! [`run_trace`] plays the part of a Win32 message loop. It pops one message
//! at a time from a [`ScriptedMessageSource`], hands it to the pipeline, and
//! gives everything the pipeline leaves to the host back to the source, which
//! turns replayed key-downs into character messages. When the queue runs dry
//! while answers are still outstanding, it waits for the simulated framework
//! to answer, the way a real window would keep pumping messages.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use keyrelay_core::keymap::windows_vk::resolve_sided_key;
use keyrelay_core::keymap::windows_vk::vk::{VK_CAPITAL, VK_NUMLOCK, VK_SCROLL};
use keyrelay_core::{KeyState, MessageClass, MessageOrigin, NativeKeyMessage};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::framework::simulator::{FrameworkPolicy, SimulatedFramework, TranscriptEntry};
use super::key_state::scripted::ScriptedKeyboard;
use super::key_state::KeyStateOracle;
use super::message_source::scripted::ScriptedMessageSource;
use super::storage::config::PipelineConfig;
use crate::application::pipeline::{Collaborators, KeyboardPipeline, MessageDisposition};

/// Grace period added to the framework's answer delay before a replay stops
/// waiting for answers.
const ANSWER_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("I/O error reading trace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse trace TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("dead key 0x{virtual_key:02X} must have exactly one mark character, got {mark:?}")]
    BadDeadKey { virtual_key: u16, mark: String },
}

// ── Trace schema ──────────────────────────────────────────────────────────────

/// A whole trace file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub framework: FrameworkPolicy,
    /// Update the scripted key states as key messages are replayed, the way
    /// `GetKeyState` follows the message being processed. Turn it off to
    /// replay sessions where the host state was changed behind our back.
    #[serde(default = "default_true")]
    pub track_key_state: bool,
    #[serde(default)]
    pub key_states: Vec<TraceKeyState>,
    #[serde(default)]
    pub dead_keys: Vec<TraceDeadKey>,
    #[serde(default)]
    pub host_translations: Vec<TraceTranslation>,
    #[serde(default)]
    pub messages: Vec<TraceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceKeyState {
    pub virtual_key: u16,
    #[serde(default)]
    pub pressed: bool,
    #[serde(default)]
    pub toggled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceDeadKey {
    pub virtual_key: u16,
    pub mark: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceTranslation {
    pub virtual_key: u16,
    pub text: String,
}

/// One hardware message. `code` is the virtual key for key classes and the
/// UTF-16 code unit for character classes.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TraceMessage {
    pub class: MessageClass,
    pub code: u16,
    #[serde(default)]
    pub scan_code: u16,
    #[serde(default)]
    pub extended: bool,
    #[serde(default)]
    pub was_already_down: bool,
}

impl TraceMessage {
    pub fn to_message(self) -> NativeKeyMessage {
        if self.class.is_character() {
            NativeKeyMessage::character(self.class, self.code, self.scan_code)
        } else {
            NativeKeyMessage::key(
                self.class,
                self.code,
                self.scan_code,
                self.extended,
                self.was_already_down,
            )
        }
    }
}

fn default_true() -> bool {
    true
}

/// Parses a trace from TOML text.
///
/// # Errors
///
/// Returns [`TraceError::Parse`] if the TOML is malformed.
pub fn parse_trace(content: &str) -> Result<Trace, TraceError> {
    Ok(toml::from_str(content)?)
}

/// Reads and parses the trace at `path`.
///
/// # Errors
///
/// Returns [`TraceError::Io`] if the file cannot be read and
/// [`TraceError::Parse`] if it is malformed.
pub fn load_trace(path: &Path) -> Result<Trace, TraceError> {
    let content = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_trace(&content)
}

// ── Replay ────────────────────────────────────────────────────────────────────

/// What a replay produced.
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    /// Everything the simulated framework received, in order.
    pub transcript: Vec<TranscriptEntry>,
    /// Every message the pipeline injected (redispatches and forged
    /// releases), in order.
    pub injected: Vec<NativeKeyMessage>,
    /// Messages the pipeline left to the host.
    pub host_default_count: usize,
    /// Occurrences that never got an answer.
    pub unanswered: usize,
}

/// Replays `trace` through a fresh pipeline built from `config`.
///
/// # Errors
///
/// Returns [`TraceError::BadDeadKey`] if a dead key entry is malformed.
pub async fn run_trace(trace: &Trace, config: &PipelineConfig) -> Result<ReplayReport, TraceError> {
    let keyboard = Arc::new(ScriptedKeyboard::new());
    for state in &trace.key_states {
        keyboard.set(state.virtual_key, KeyState::new(state.pressed, state.toggled));
    }
    for dead in &trace.dead_keys {
        let mut chars = dead.mark.chars();
        let (Some(mark), None) = (chars.next(), chars.next()) else {
            return Err(TraceError::BadDeadKey {
                virtual_key: dead.virtual_key,
                mark: dead.mark.clone(),
            });
        };
        keyboard.add_dead_key(dead.virtual_key, mark);
    }

    let source = Arc::new(ScriptedMessageSource::new());
    for translation in &trace.host_translations {
        source.set_host_translation(translation.virtual_key, &translation.text);
    }
    source.push_all(trace.messages.iter().map(|m| m.to_message()));

    let framework = Arc::new(SimulatedFramework::new(&trace.framework));
    let mut pipeline = KeyboardPipeline::new(
        config,
        Collaborators {
            source: source.clone(),
            oracle: keyboard.clone(),
            layout: keyboard.clone(),
            event_sink: framework.clone(),
            messenger: framework.clone(),
            text_sink: framework.clone(),
        },
    );

    info!(messages = trace.messages.len(), "replaying trace");
    let patience = Duration::from_millis(trace.framework.answer_delay_ms) + ANSWER_GRACE;
    let mut host_default_count = 0;
    loop {
        if let Some(message) = source.pop() {
            if trace.track_key_state {
                track_key_state(&keyboard, &message);
            }
            if pipeline.handle_message(message) == MessageDisposition::HostDefault {
                host_default_count += 1;
                source.host_default(&message);
            }
            continue;
        }
        if pipeline.pending_events() == 0 {
            break;
        }
        match tokio::time::timeout(patience, pipeline.wait_for_answer()).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(_) => {
                warn!(
                    pending = pipeline.pending_events(),
                    "framework stopped answering, ending replay"
                );
                break;
            }
        }
    }

    let report = ReplayReport {
        transcript: framework.transcript(),
        injected: source.injected(),
        host_default_count,
        unanswered: pipeline.pending_events(),
    };
    debug!(
        injected = report.injected.len(),
        host_default = report.host_default_count,
        "replay finished"
    );
    Ok(report)
}

/// Mirrors a hardware key message into the scripted key states.
fn track_key_state(keyboard: &ScriptedKeyboard, message: &NativeKeyMessage) {
    if !message.class.is_key() || message.origin != MessageOrigin::Hardware {
        return;
    }
    let sided = resolve_sided_key(message.code, message.scan_code, message.extended);
    if message.class.is_down() {
        if !message.was_already_down && matches!(sided, VK_CAPITAL | VK_NUMLOCK | VK_SCROLL) {
            let toggled = keyboard.key_state(sided).toggled;
            keyboard.set_toggled(sided, !toggled);
        }
        keyboard.press(sided);
    } else {
        keyboard.release(sided);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use keyrelay_core::keymap::windows_vk::vk::VK_LSHIFT;
    use keyrelay_core::KeyEventType;

    use super::*;

    #[test]
    fn test_parse_minimal_trace() {
        // Arrange
        let toml_str = r#"
[[messages]]
class = "key_down"
code = 0x41
scan_code = 0x1E
"#;

        // Act
        let trace = parse_trace(toml_str).expect("parse");

        // Assert
        assert!(trace.track_key_state);
        assert_eq!(trace.messages.len(), 1);
        let message = trace.messages[0].to_message();
        assert_eq!(message.class, MessageClass::KeyDown);
        assert_eq!(message.code, 0x41);
        assert_eq!(message.origin, MessageOrigin::Hardware);
    }

    #[test]
    fn test_unknown_message_class_is_a_parse_error() {
        let toml_str = r#"
[[messages]]
class = "sys_char"
code = 0x61
"#;
        assert!(matches!(parse_trace(toml_str), Err(TraceError::Parse(_))));
    }

    #[test]
    fn test_load_trace_missing_file_is_io_error() {
        let result = load_trace(Path::new("/nonexistent/keyrelay/trace.toml"));
        assert!(matches!(result, Err(TraceError::Io { .. })));
    }

    #[test]
    fn test_track_key_state_follows_shift_and_toggles_caps() {
        // Arrange
        let keyboard = ScriptedKeyboard::new();
        let shift_down = NativeKeyMessage::key(MessageClass::KeyDown, 0x10, 0x2A, false, false);
        let caps_down = NativeKeyMessage::key(MessageClass::KeyDown, VK_CAPITAL, 0x3A, false, false);
        let caps_repeat = NativeKeyMessage::key(MessageClass::KeyDown, VK_CAPITAL, 0x3A, false, true);

        // Act
        track_key_state(&keyboard, &shift_down);
        track_key_state(&keyboard, &caps_down);
        track_key_state(&keyboard, &caps_repeat);

        // Assert
        assert!(keyboard.key_state(VK_LSHIFT).pressed);
        assert!(keyboard.key_state(VK_CAPITAL).toggled, "a repeat must not toggle again");
    }

    #[tokio::test]
    async fn test_bad_dead_key_is_rejected() {
        let trace = Trace {
            dead_keys: vec![TraceDeadKey {
                virtual_key: 0xDE,
                mark: "ab".to_string(),
            }],
            ..Trace::default()
        };
        let result = run_trace(&trace, &PipelineConfig::default()).await;
        assert!(matches!(result, Err(TraceError::BadDeadKey { .. })));
    }

    #[tokio::test]
    async fn test_unhandled_key_replays_as_text() {
        // Arrange
        let toml_str = r#"
[[host_translations]]
virtual_key = 0x42
text = "b"

[[messages]]
class = "key_down"
code = 0x42
scan_code = 0x30

[[messages]]
class = "char"
code = 0x62
scan_code = 0x30
"#;
        let trace = parse_trace(toml_str).unwrap();
        let config = PipelineConfig {
            legacy_channel: false,
            ..PipelineConfig::default()
        };

        // Act
        let report = run_trace(&trace, &config).await.unwrap();

        // Assert
        assert_eq!(report.unanswered, 0);
        assert_eq!(report.injected.len(), 1);
        assert_eq!(report.injected[0].origin, MessageOrigin::Redispatched);
        let key_events: Vec<_> = report
            .transcript
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::KeyEvent(event) => Some(event),
                _ => None,
            })
            .collect();
        assert_eq!(key_events.len(), 1);
        assert_eq!(key_events[0].event_type, KeyEventType::Down);
        assert_eq!(key_events[0].character.as_deref(), Some("b"));
        assert!(report.transcript.contains(&TranscriptEntry::Text {
            text: "b".to_string()
        }));
    }

    #[tokio::test]
    async fn test_delayed_answers_are_awaited() {
        // Arrange
        let toml_str = r#"
[framework]
handled_logical_keys = [0x61]
answer_delay_ms = 5

[[messages]]
class = "key_down"
code = 0x41
scan_code = 0x1E

[[messages]]
class = "char"
code = 0x61
scan_code = 0x1E

[[messages]]
class = "key_up"
code = 0x41
scan_code = 0x1E
"#;
        let trace = parse_trace(toml_str).unwrap();
        let config = PipelineConfig {
            legacy_channel: false,
            ..PipelineConfig::default()
        };

        // Act
        let report = run_trace(&trace, &config).await.unwrap();

        // Assert
        assert_eq!(report.unanswered, 0);
        assert!(report.injected.is_empty(), "handled keys are not redispatched");
    }
}
