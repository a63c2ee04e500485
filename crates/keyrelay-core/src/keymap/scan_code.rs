//! PC/AT set-1 scan codes (as reported in `lParam` bits 16..24) to HID usages.
//!
//! Windows splits scan codes into a plain range and an *extended* range whose
//! make codes are prefixed with `0xE0` on the wire. The extended bit in the
//! message (`lParam` bit 24) selects the second table. The combined form
//! `0xE000 | scan` is what the Windows-plane fallback ids and the layout's
//! `MAPVK_VK_TO_VSC_EX` mapping use.

use super::hid::HidKeyCode;

/// Prefix marking an extended scan code in its combined 16-bit form.
pub const EXTENDED_PREFIX: u16 = 0xE000;

/// Combines a scan code and the extended bit into the 16-bit form.
pub fn combined_scan_code(scan_code: u16, extended: bool) -> u16 {
    if extended {
        EXTENDED_PREFIX | (scan_code & 0xFF)
    } else {
        scan_code & 0xFF
    }
}

/// Translates a scan code to a HID usage.
pub fn scan_code_to_hid(scan_code: u16, extended: bool) -> HidKeyCode {
    let table = if extended { &EXTENDED_TABLE } else { &PLAIN_TABLE };
    table[usize::from(scan_code & 0xFF)]
}

/// Reverse lookup: the scan code and extended bit a HID usage is reported with.
pub fn hid_to_scan_code(hid: HidKeyCode) -> Option<(u16, bool)> {
    if hid == HidKeyCode::Unknown {
        return None;
    }
    if let Some(scan) = PLAIN_TABLE.iter().position(|&mapped| mapped == hid) {
        return Some((scan as u16, false));
    }
    EXTENDED_TABLE
        .iter()
        .position(|&mapped| mapped == hid)
        .map(|scan| (scan as u16, true))
}

const PLAIN_TABLE: [HidKeyCode; 256] = {
    use HidKeyCode::*;
    let mut t = [Unknown; 256];

    t[0x01] = Escape;
    // Digit row 0x02..=0x0D
    let row = [
        Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9, Digit0, Minus,
        Equal, Backspace, Tab,
    ];
    let mut i = 0;
    while i < row.len() {
        t[0x02 + i] = row[i];
        i += 1;
    }
    // Top letter row 0x10..=0x1C
    let row = [
        KeyQ, KeyW, KeyE, KeyR, KeyT, KeyY, KeyU, KeyI, KeyO, KeyP, BracketLeft, BracketRight,
        Enter, ControlLeft,
    ];
    let mut i = 0;
    while i < row.len() {
        t[0x10 + i] = row[i];
        i += 1;
    }
    // Home row 0x1E..=0x2B
    let row = [
        KeyA, KeyS, KeyD, KeyF, KeyG, KeyH, KeyJ, KeyK, KeyL, Semicolon, Quote, Backquote,
        ShiftLeft, Backslash,
    ];
    let mut i = 0;
    while i < row.len() {
        t[0x1E + i] = row[i];
        i += 1;
    }
    // Bottom row 0x2C..=0x39
    let row = [
        KeyZ, KeyX, KeyC, KeyV, KeyB, KeyN, KeyM, Comma, Period, Slash, ShiftRight,
        NumpadMultiply, AltLeft, Space,
    ];
    let mut i = 0;
    while i < row.len() {
        t[0x2C + i] = row[i];
        i += 1;
    }
    t[0x3A] = CapsLock;
    let functions = [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10];
    let mut i = 0;
    while i < functions.len() {
        t[0x3B + i] = functions[i];
        i += 1;
    }
    t[0x45] = Pause;
    t[0x46] = ScrollLock;
    // Keypad 0x47..=0x53 in its physical order
    let keypad = [
        Numpad7, Numpad8, Numpad9, NumpadSubtract, Numpad4, Numpad5, Numpad6, NumpadAdd, Numpad1,
        Numpad2, Numpad3, Numpad0, NumpadDecimal,
    ];
    let mut i = 0;
    while i < keypad.len() {
        t[0x47 + i] = keypad[i];
        i += 1;
    }
    t[0x56] = IntlBackslash;
    t[0x57] = F11;
    t[0x58] = F12;
    t[0x59] = NumpadEqual;
    t[0x70] = KanaMode;
    t[0x73] = IntlRo;
    t[0x79] = Convert;
    t[0x7B] = NonConvert;
    t[0x7D] = IntlYen;

    t
};

const EXTENDED_TABLE: [HidKeyCode; 256] = {
    use HidKeyCode::*;
    let mut t = [Unknown; 256];

    t[0x1C] = NumpadEnter;
    t[0x1D] = ControlRight;
    t[0x35] = NumpadDivide;
    t[0x37] = PrintScreen;
    t[0x38] = AltRight;
    t[0x45] = NumLock;
    t[0x47] = Home;
    t[0x48] = ArrowUp;
    t[0x49] = PageUp;
    t[0x4B] = ArrowLeft;
    t[0x4D] = ArrowRight;
    t[0x4F] = End;
    t[0x50] = ArrowDown;
    t[0x51] = PageDown;
    t[0x52] = Insert;
    t[0x53] = Delete;
    t[0x5B] = MetaLeft;
    t[0x5C] = MetaRight;
    t[0x5D] = ContextMenu;

    t
};
