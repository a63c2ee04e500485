//! Windows virtual-key codes and their HID equivalents.
//!
//! A virtual-key (VK) code names the *meaning* Windows assigns to a key under
//! the active layout; the A key on an AZERTY keyboard reports `VK_Q`. The
//! pipeline therefore never derives physical identity from a VK code. It uses
//! VK codes for three things only:
//!
//! - resolving the generic `VK_SHIFT` / `VK_CONTROL` / `VK_MENU` into a sided
//!   code ([`resolve_sided_key`]),
//! - deriving the logical key for keys that do not produce characters
//!   (see [`crate::keymap::logical`]),
//! - querying the key state oracle for the critical keys.
//!
//! [`vk_to_hid`] is kept for diagnostics and for reverse lookups
//! (HID → VK → layout scan code) in test keyboards.

use super::hid::HidKeyCode;

/// Virtual-key constants from `winuser.h` used by the pipeline.
pub mod vk {
    pub const VK_BACK: u16 = 0x08;
    pub const VK_TAB: u16 = 0x09;
    pub const VK_RETURN: u16 = 0x0D;
    pub const VK_SHIFT: u16 = 0x10;
    pub const VK_CONTROL: u16 = 0x11;
    pub const VK_MENU: u16 = 0x12;
    pub const VK_PAUSE: u16 = 0x13;
    pub const VK_CAPITAL: u16 = 0x14;
    pub const VK_ESCAPE: u16 = 0x1B;
    pub const VK_SPACE: u16 = 0x20;
    pub const VK_PRIOR: u16 = 0x21;
    pub const VK_NEXT: u16 = 0x22;
    pub const VK_END: u16 = 0x23;
    pub const VK_HOME: u16 = 0x24;
    pub const VK_LEFT: u16 = 0x25;
    pub const VK_UP: u16 = 0x26;
    pub const VK_RIGHT: u16 = 0x27;
    pub const VK_DOWN: u16 = 0x28;
    pub const VK_SNAPSHOT: u16 = 0x2C;
    pub const VK_INSERT: u16 = 0x2D;
    pub const VK_DELETE: u16 = 0x2E;
    pub const VK_LWIN: u16 = 0x5B;
    pub const VK_RWIN: u16 = 0x5C;
    pub const VK_APPS: u16 = 0x5D;
    pub const VK_NUMPAD0: u16 = 0x60;
    pub const VK_NUMPAD9: u16 = 0x69;
    pub const VK_MULTIPLY: u16 = 0x6A;
    pub const VK_ADD: u16 = 0x6B;
    pub const VK_SUBTRACT: u16 = 0x6D;
    pub const VK_DECIMAL: u16 = 0x6E;
    pub const VK_DIVIDE: u16 = 0x6F;
    pub const VK_F1: u16 = 0x70;
    pub const VK_F12: u16 = 0x7B;
    pub const VK_NUMLOCK: u16 = 0x90;
    pub const VK_SCROLL: u16 = 0x91;
    pub const VK_LSHIFT: u16 = 0xA0;
    pub const VK_RSHIFT: u16 = 0xA1;
    pub const VK_LCONTROL: u16 = 0xA2;
    pub const VK_RCONTROL: u16 = 0xA3;
    pub const VK_LMENU: u16 = 0xA4;
    pub const VK_RMENU: u16 = 0xA5;
    /// Reported while an IME owns the keystroke.
    pub const VK_PROCESSKEY: u16 = 0xE5;
    /// Unicode characters injected through `SendInput(KEYEVENTF_UNICODE)`.
    pub const VK_PACKET: u16 = 0xE7;
}

use vk::*;

/// Set-1 scan code of the right shift key. Windows reports both shifts as
/// `VK_SHIFT` and neither as extended, so the scan code is the only tell.
pub const RIGHT_SHIFT_SCAN_CODE: u16 = 0x36;

/// Replaces a generic modifier VK with its sided variant.
///
/// Shift is told apart by scan code, control and alt by the extended bit.
/// Any other code is returned unchanged.
pub fn resolve_sided_key(virtual_key: u16, scan_code: u16, extended: bool) -> u16 {
    match virtual_key {
        VK_SHIFT if scan_code == RIGHT_SHIFT_SCAN_CODE => VK_RSHIFT,
        VK_SHIFT => VK_LSHIFT,
        VK_CONTROL if extended => VK_RCONTROL,
        VK_CONTROL => VK_LCONTROL,
        VK_MENU if extended => VK_RMENU,
        VK_MENU => VK_LMENU,
        other => other,
    }
}

/// Translates a VK code to a HID usage. Codes above 0xFF and codes with no
/// keyboard equivalent give [`HidKeyCode::Unknown`].
pub fn vk_to_hid(virtual_key: u16) -> HidKeyCode {
    VK_TO_HID_TABLE
        .get(usize::from(virtual_key))
        .copied()
        .unwrap_or(HidKeyCode::Unknown)
}

/// Reverse of [`vk_to_hid`] for the mapped subset.
pub fn hid_to_vk(hid: HidKeyCode) -> Option<u16> {
    if hid == HidKeyCode::Unknown {
        return None;
    }
    VK_TO_HID_TABLE
        .iter()
        .position(|&mapped| mapped == hid)
        .map(|index| index as u16)
}

/// VK → HID table indexed by VK code (0x00–0xFF), US layout positions.
///
/// Only sided modifier codes are mapped; generic `VK_SHIFT` etc. must go
/// through [`resolve_sided_key`] first.
const VK_TO_HID_TABLE: [HidKeyCode; 256] = {
    use HidKeyCode::*;
    let mut t = [Unknown; 256];

    // ── Letters and digits share their ASCII code points ─────────────────────
    let letters = [
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN,
        KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
    ];
    let mut i = 0;
    while i < letters.len() {
        t[0x41 + i] = letters[i];
        i += 1;
    }
    t[0x30] = Digit0;
    let digits = [Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9];
    let mut i = 0;
    while i < digits.len() {
        t[0x31 + i] = digits[i];
        i += 1;
    }

    // ── Editing and locks ────────────────────────────────────────────────────
    t[VK_BACK as usize] = Backspace;
    t[VK_TAB as usize] = Tab;
    t[VK_RETURN as usize] = Enter;
    t[VK_PAUSE as usize] = Pause;
    t[VK_CAPITAL as usize] = CapsLock;
    t[VK_ESCAPE as usize] = Escape;
    t[VK_SPACE as usize] = Space;
    t[VK_NUMLOCK as usize] = NumLock;
    t[VK_SCROLL as usize] = ScrollLock;

    // ── Navigation ───────────────────────────────────────────────────────────
    t[VK_PRIOR as usize] = PageUp;
    t[VK_NEXT as usize] = PageDown;
    t[VK_END as usize] = End;
    t[VK_HOME as usize] = Home;
    t[VK_LEFT as usize] = ArrowLeft;
    t[VK_UP as usize] = ArrowUp;
    t[VK_RIGHT as usize] = ArrowRight;
    t[VK_DOWN as usize] = ArrowDown;
    t[VK_SNAPSHOT as usize] = PrintScreen;
    t[VK_INSERT as usize] = Insert;
    t[VK_DELETE as usize] = Delete;
    t[VK_APPS as usize] = ContextMenu;

    // ── Keypad ───────────────────────────────────────────────────────────────
    let numpad = [
        Numpad0, Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,
    ];
    let mut i = 0;
    while i < numpad.len() {
        t[VK_NUMPAD0 as usize + i] = numpad[i];
        i += 1;
    }
    t[VK_MULTIPLY as usize] = NumpadMultiply;
    t[VK_ADD as usize] = NumpadAdd;
    t[VK_SUBTRACT as usize] = NumpadSubtract;
    t[VK_DECIMAL as usize] = NumpadDecimal;
    t[VK_DIVIDE as usize] = NumpadDivide;

    // ── Function row ─────────────────────────────────────────────────────────
    let functions = [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12];
    let mut i = 0;
    while i < functions.len() {
        t[VK_F1 as usize + i] = functions[i];
        i += 1;
    }

    // ── OEM punctuation (US positions) ───────────────────────────────────────
    t[0xBA] = Semicolon; // VK_OEM_1
    t[0xBB] = Equal; // VK_OEM_PLUS
    t[0xBC] = Comma; // VK_OEM_COMMA
    t[0xBD] = Minus; // VK_OEM_MINUS
    t[0xBE] = Period; // VK_OEM_PERIOD
    t[0xBF] = Slash; // VK_OEM_2
    t[0xC0] = Backquote; // VK_OEM_3
    t[0xDB] = BracketLeft; // VK_OEM_4
    t[0xDC] = Backslash; // VK_OEM_5
    t[0xDD] = BracketRight; // VK_OEM_6
    t[0xDE] = Quote; // VK_OEM_7
    t[0xE2] = IntlBackslash; // VK_OEM_102

    // ── Sided modifiers ──────────────────────────────────────────────────────
    t[VK_LSHIFT as usize] = ShiftLeft;
    t[VK_RSHIFT as usize] = ShiftRight;
    t[VK_LCONTROL as usize] = ControlLeft;
    t[VK_RCONTROL as usize] = ControlRight;
    t[VK_LMENU as usize] = AltLeft;
    t[VK_RMENU as usize] = AltRight;
    t[VK_LWIN as usize] = MetaLeft;
    t[VK_RWIN as usize] = MetaRight;

    t
};
