//! USB HID Usage IDs (page 0x07, Keyboard/Keypad page) and physical key ids.
//!
//! A *physical key id* identifies a key by its position on the keyboard,
//! independent of layout and modifiers. KeyRelay uses the HID usage on page 7
//! tagged with the page number, so the id of the A key is `0x0007_0004`.
//!
//! # Why HID usages? (for beginners)
//!
//! The USB HID standard gives every key position one number. Windows scan
//! codes are also positional, but they come in two flavours (plain and
//! `0xE0`-prefixed "extended") and differ between keyboards for some keys.
//! Translating scan codes into HID usages at the boundary gives the framework
//! a single, stable numbering:
//!
//! | Key          | Scan code | HID usage | Physical id   |
//! |--------------|-----------|-----------|---------------|
//! | Letter A     | 0x1E      | 0x04      | 0x0007_0004   |
//! | Enter        | 0x1C      | 0x28      | 0x0007_0028   |
//! | Numpad Enter | 0xE01C    | 0x58      | 0x0007_0058   |
//! | Right Ctrl   | 0xE01D    | 0xE4      | 0x0007_00E4   |
//!
//! Scan codes with no HID counterpart get an id in the Windows plane instead
//! (see [`crate::keymap::WINDOWS_PLANE`]).

use serde::{Deserialize, Serialize};

/// Usage page number of the Keyboard/Keypad page, pre-shifted into the
/// position it occupies inside a physical key id.
pub const KEYBOARD_USAGE_PAGE: u64 = 0x0007_0000;

/// USB HID Usage ID for keyboard keys (page 0x07).
///
/// The numeric value of each variant is its usage on the keyboard/keypad page.
/// [`HidKeyCode::Unknown`] marks table slots with no mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum HidKeyCode {
    // Letters (HID 0x04–0x1D)
    KeyA = 0x04,
    KeyB = 0x05,
    KeyC = 0x06,
    KeyD = 0x07,
    KeyE = 0x08,
    KeyF = 0x09,
    KeyG = 0x0A,
    KeyH = 0x0B,
    KeyI = 0x0C,
    KeyJ = 0x0D,
    KeyK = 0x0E,
    KeyL = 0x0F,
    KeyM = 0x10,
    KeyN = 0x11,
    KeyO = 0x12,
    KeyP = 0x13,
    KeyQ = 0x14,
    KeyR = 0x15,
    KeyS = 0x16,
    KeyT = 0x17,
    KeyU = 0x18,
    KeyV = 0x19,
    KeyW = 0x1A,
    KeyX = 0x1B,
    KeyY = 0x1C,
    KeyZ = 0x1D,

    // Digit row (HID 0x1E–0x27)
    Digit1 = 0x1E,
    Digit2 = 0x1F,
    Digit3 = 0x20,
    Digit4 = 0x21,
    Digit5 = 0x22,
    Digit6 = 0x23,
    Digit7 = 0x24,
    Digit8 = 0x25,
    Digit9 = 0x26,
    Digit0 = 0x27,

    // Editing and punctuation (HID 0x28–0x38)
    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equal = 0x2E,
    BracketLeft = 0x2F,
    BracketRight = 0x30,
    Backslash = 0x31,
    Semicolon = 0x33,
    Quote = 0x34,
    Backquote = 0x35,
    Comma = 0x36,
    Period = 0x37,
    Slash = 0x38,

    CapsLock = 0x39,

    // Function row (HID 0x3A–0x45)
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    // Navigation cluster (HID 0x46–0x52)
    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    ArrowRight = 0x4F,
    ArrowLeft = 0x50,
    ArrowDown = 0x51,
    ArrowUp = 0x52,

    // Keypad (HID 0x53–0x63, 0x67)
    NumLock = 0x53,
    NumpadDivide = 0x54,
    NumpadMultiply = 0x55,
    NumpadSubtract = 0x56,
    NumpadAdd = 0x57,
    NumpadEnter = 0x58,
    Numpad1 = 0x59,
    Numpad2 = 0x5A,
    Numpad3 = 0x5B,
    Numpad4 = 0x5C,
    Numpad5 = 0x5D,
    Numpad6 = 0x5E,
    Numpad7 = 0x5F,
    Numpad8 = 0x60,
    Numpad9 = 0x61,
    Numpad0 = 0x62,
    NumpadDecimal = 0x63,
    NumpadEqual = 0x67,

    // ISO / JIS extras
    IntlBackslash = 0x64,
    ContextMenu = 0x65,
    IntlRo = 0x87,
    KanaMode = 0x88,
    IntlYen = 0x89,
    Convert = 0x8A,
    NonConvert = 0x8B,

    // Modifiers (HID 0xE0–0xE7)
    ControlLeft = 0xE0,
    ShiftLeft = 0xE1,
    AltLeft = 0xE2,
    MetaLeft = 0xE3,
    ControlRight = 0xE4,
    ShiftRight = 0xE5,
    AltRight = 0xE6,
    MetaRight = 0xE7,

    /// Sentinel for table slots with no HID mapping.
    Unknown = 0x0000,
}

impl HidKeyCode {
    /// Every mapped variant, in usage order. `Unknown` is not included.
    pub const ALL: &'static [HidKeyCode] = {
        use HidKeyCode::*;
        &[
            KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM,
            KeyN, KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
            Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9, Digit0,
            Enter, Escape, Backspace, Tab, Space, Minus, Equal, BracketLeft, BracketRight,
            Backslash, Semicolon, Quote, Backquote, Comma, Period, Slash, CapsLock,
            F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
            PrintScreen, ScrollLock, Pause, Insert, Home, PageUp, Delete, End, PageDown,
            ArrowRight, ArrowLeft, ArrowDown, ArrowUp,
            NumLock, NumpadDivide, NumpadMultiply, NumpadSubtract, NumpadAdd, NumpadEnter,
            Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7, Numpad8,
            Numpad9, Numpad0, NumpadDecimal, IntlBackslash, ContextMenu, NumpadEqual,
            IntlRo, KanaMode, IntlYen, Convert, NonConvert,
            ControlLeft, ShiftLeft, AltLeft, MetaLeft,
            ControlRight, ShiftRight, AltRight, MetaRight,
        ]
    };

    /// Returns the raw usage value.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Looks a usage value up; unassigned usages give [`HidKeyCode::Unknown`].
    pub fn from_u16(value: u16) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_u16() == value)
            .unwrap_or(HidKeyCode::Unknown)
    }

    /// The physical key id: usage page 7 in bits 16..32, usage below.
    ///
    /// Returns `None` for [`HidKeyCode::Unknown`]; callers fall back to a
    /// Windows-plane id built from the scan code.
    pub fn physical_key(self) -> Option<u64> {
        match self {
            HidKeyCode::Unknown => None,
            code => Some(KEYBOARD_USAGE_PAGE | u64::from(code.as_u16())),
        }
    }

    /// `true` for keys that carry a host-side toggle state.
    pub fn is_lock(self) -> bool {
        matches!(
            self,
            HidKeyCode::CapsLock | HidKeyCode::NumLock | HidKeyCode::ScrollLock
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_key_tags_usage_with_keyboard_page() {
        // Arrange / Act
        let a = HidKeyCode::KeyA.physical_key();
        let right_ctrl = HidKeyCode::ControlRight.physical_key();

        // Assert
        assert_eq!(a, Some(0x0007_0004));
        assert_eq!(right_ctrl, Some(0x0007_00E4));
    }

    #[test]
    fn test_unknown_has_no_physical_key() {
        assert_eq!(HidKeyCode::Unknown.physical_key(), None);
    }

    #[test]
    fn test_all_contains_each_usage_once() {
        let mut usages: Vec<u16> = HidKeyCode::ALL.iter().map(|c| c.as_u16()).collect();
        let total = usages.len();
        usages.sort_unstable();
        usages.dedup();
        assert_eq!(usages.len(), total, "duplicate usage in HidKeyCode::ALL");
        assert!(!HidKeyCode::ALL.contains(&HidKeyCode::Unknown));
    }

    #[test]
    fn test_unassigned_usages_map_to_unknown() {
        for unassigned in [0x00u16, 0x01, 0x32, 0x66, 0xA0, 0xFF] {
            assert_eq!(
                HidKeyCode::from_u16(unassigned),
                HidKeyCode::Unknown,
                "0x{unassigned:02X} should map to Unknown"
            );
        }
    }

    #[test]
    fn test_lock_classification() {
        assert!(!HidKeyCode::ShiftRight.is_lock());
        assert!(HidKeyCode::CapsLock.is_lock());
        assert!(HidKeyCode::NumLock.is_lock());
        assert!(!HidKeyCode::Numpad0.is_lock());
    }
}
