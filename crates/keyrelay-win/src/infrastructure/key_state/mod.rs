//! Live keyboard state and layout queries.
//!
//! The pipeline asks the host two kinds of questions while it processes a
//! message:
//!
//! - *Is this key down / toggled right now?* ([`KeyStateOracle`]). On Windows
//!   this is `GetKeyState`, which reflects the thread's input state as of the
//!   message currently being processed.
//! - *What does this key type, and where is it?* ([`KeyboardLayout`]). On
//!   Windows this is `MapVirtualKeyW`.
//!
//! Both are traits so tests can script the answers with
//! [`scripted::ScriptedKeyboard`].

use keyrelay_core::KeyState;

pub mod scripted;

#[cfg(target_os = "windows")]
pub mod windows;

/// Reports the host's live state for a virtual key.
pub trait KeyStateOracle {
    fn key_state(&self, virtual_key: u16) -> KeyState;
}

/// Layout queries used to derive logical keys and seed critical key ids.
#[cfg_attr(test, mockall::automock)]
pub trait KeyboardLayout {
    /// The character the key types with no modifiers held, 0 for none.
    /// Dead keys report their mark.
    fn character_for(&self, virtual_key: u16) -> u32;

    /// The scan code the key is reported with, without the extended prefix.
    fn scan_code_for(&self, virtual_key: u16, extended: bool) -> u16;
}
