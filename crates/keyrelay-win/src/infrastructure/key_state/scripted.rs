//! A keyboard whose state is set by hand.
//!
//! Used by the unit and integration tests and by the `keyrelay-replay`
//! binary, which reads the initial key states from a trace file.

use std::collections::HashMap;
use std::sync::Mutex;

use keyrelay_core::keymap::windows_vk::vk::*;
use keyrelay_core::{KeyState, WINDOWS_KEYMAP};

use super::{KeyStateOracle, KeyboardLayout};

/// Scriptable oracle and US-English layout.
///
/// Querying a generic modifier (`VK_SHIFT`, `VK_CONTROL`, `VK_MENU`) reports
/// it pressed when either side is, the way `GetKeyState` does.
pub struct ScriptedKeyboard {
    states: Mutex<HashMap<u16, KeyState>>,
    dead_keys: Mutex<HashMap<u16, char>>,
}

impl ScriptedKeyboard {
    /// All keys released, all locks off.
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            dead_keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, virtual_key: u16, state: KeyState) {
        self.states
            .lock()
            .expect("lock poisoned")
            .insert(virtual_key, state);
    }

    pub fn press(&self, virtual_key: u16) {
        let mut states = self.states.lock().expect("lock poisoned");
        states.entry(virtual_key).or_default().pressed = true;
    }

    pub fn release(&self, virtual_key: u16) {
        let mut states = self.states.lock().expect("lock poisoned");
        states.entry(virtual_key).or_default().pressed = false;
    }

    pub fn set_toggled(&self, virtual_key: u16, toggled: bool) {
        let mut states = self.states.lock().expect("lock poisoned");
        states.entry(virtual_key).or_default().toggled = toggled;
    }

    /// Makes `virtual_key` a dead key typing `mark`.
    pub fn add_dead_key(&self, virtual_key: u16, mark: char) {
        self.dead_keys
            .lock()
            .expect("lock poisoned")
            .insert(virtual_key, mark);
    }

    fn raw_state(&self, virtual_key: u16) -> KeyState {
        self.states
            .lock()
            .expect("lock poisoned")
            .get(&virtual_key)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for ScriptedKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStateOracle for ScriptedKeyboard {
    fn key_state(&self, virtual_key: u16) -> KeyState {
        let sides = match virtual_key {
            VK_SHIFT => Some((VK_LSHIFT, VK_RSHIFT)),
            VK_CONTROL => Some((VK_LCONTROL, VK_RCONTROL)),
            VK_MENU => Some((VK_LMENU, VK_RMENU)),
            _ => None,
        };
        match sides {
            Some((left, right)) => {
                let pressed = self.raw_state(virtual_key).pressed
                    || self.raw_state(left).pressed
                    || self.raw_state(right).pressed;
                KeyState::new(pressed, false)
            }
            None => self.raw_state(virtual_key),
        }
    }
}

impl KeyboardLayout for ScriptedKeyboard {
    fn character_for(&self, virtual_key: u16) -> u32 {
        if let Some(mark) = self.dead_keys.lock().expect("lock poisoned").get(&virtual_key) {
            return u32::from(*mark);
        }
        us_character(virtual_key).map_or(0, u32::from)
    }

    fn scan_code_for(&self, virtual_key: u16, _extended: bool) -> u16 {
        WINDOWS_KEYMAP
            .vk_to_scan_code(virtual_key)
            .map_or(0, |(scan, _)| scan)
    }
}

/// Unshifted characters of the US layout, as `MAPVK_VK_TO_CHAR` reports them
/// (letters come back upper case).
fn us_character(virtual_key: u16) -> Option<char> {
    let c = match virtual_key {
        0x30..=0x39 | 0x41..=0x5A => char::from(virtual_key as u8),
        VK_NUMPAD0..=VK_NUMPAD9 => char::from(b'0' + (virtual_key - VK_NUMPAD0) as u8),
        VK_BACK => '\u{8}',
        VK_TAB => '\t',
        VK_RETURN => '\r',
        VK_ESCAPE => '\u{1B}',
        VK_SPACE => ' ',
        VK_MULTIPLY => '*',
        VK_ADD => '+',
        VK_SUBTRACT => '-',
        VK_DECIMAL => '.',
        VK_DIVIDE => '/',
        0xBA => ';',
        0xBB => '=',
        0xBC => ',',
        0xBD => '-',
        0xBE => '.',
        0xBF => '/',
        0xC0 => '`',
        0xDB => '[',
        0xDC => '\\',
        0xDD => ']',
        0xDE => '\'',
        _ => return None,
    };
    Some(c)
}
