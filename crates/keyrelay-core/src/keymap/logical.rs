//! Logical key ids: what a key *means* under the active layout.
//!
//! Ids live in planes (see [`crate::keymap`]): keys that type a character use
//! the lowercase code point in the Unicode plane, named keys use fixed ids in
//! the unprintable plane, sided modifiers and keypad keys use the
//! framework plane, and anything else falls back to `WINDOWS_PLANE | vk`.

use super::windows_vk::vk::*;
use super::{FLUTTER_PLANE, UNICODE_PLANE, UNPRINTABLE_PLANE, WINDOWS_PLANE};

// ── Well-known ids ────────────────────────────────────────────────────────────

pub const BACKSPACE: u64 = UNPRINTABLE_PLANE | 0x08;
pub const TAB: u64 = UNPRINTABLE_PLANE | 0x09;
pub const ENTER: u64 = UNPRINTABLE_PLANE | 0x0D;
pub const ESCAPE: u64 = UNPRINTABLE_PLANE | 0x1B;
pub const DELETE: u64 = UNPRINTABLE_PLANE | 0x7F;
pub const CAPS_LOCK: u64 = UNPRINTABLE_PLANE | 0x104;
pub const NUM_LOCK: u64 = UNPRINTABLE_PLANE | 0x10A;
pub const SCROLL_LOCK: u64 = UNPRINTABLE_PLANE | 0x10C;
pub const ARROW_DOWN: u64 = UNPRINTABLE_PLANE | 0x301;
pub const ARROW_LEFT: u64 = UNPRINTABLE_PLANE | 0x302;
pub const ARROW_RIGHT: u64 = UNPRINTABLE_PLANE | 0x303;
pub const ARROW_UP: u64 = UNPRINTABLE_PLANE | 0x304;
pub const END: u64 = UNPRINTABLE_PLANE | 0x305;
pub const HOME: u64 = UNPRINTABLE_PLANE | 0x306;
pub const PAGE_DOWN: u64 = UNPRINTABLE_PLANE | 0x307;
pub const PAGE_UP: u64 = UNPRINTABLE_PLANE | 0x308;
pub const INSERT: u64 = UNPRINTABLE_PLANE | 0x407;
pub const CONTEXT_MENU: u64 = UNPRINTABLE_PLANE | 0x505;
pub const PAUSE: u64 = UNPRINTABLE_PLANE | 0x509;
pub const PRINT_SCREEN: u64 = UNPRINTABLE_PLANE | 0x608;
pub const F1: u64 = UNPRINTABLE_PLANE | 0x801;

pub const CONTROL_LEFT: u64 = FLUTTER_PLANE | 0x100;
pub const CONTROL_RIGHT: u64 = FLUTTER_PLANE | 0x101;
pub const SHIFT_LEFT: u64 = FLUTTER_PLANE | 0x102;
pub const SHIFT_RIGHT: u64 = FLUTTER_PLANE | 0x103;
pub const ALT_LEFT: u64 = FLUTTER_PLANE | 0x104;
pub const ALT_RIGHT: u64 = FLUTTER_PLANE | 0x105;
pub const META_LEFT: u64 = FLUTTER_PLANE | 0x106;
pub const META_RIGHT: u64 = FLUTTER_PLANE | 0x107;
pub const NUMPAD_MULTIPLY: u64 = FLUTTER_PLANE | 0x22A;
pub const NUMPAD_ADD: u64 = FLUTTER_PLANE | 0x22B;
pub const NUMPAD_SUBTRACT: u64 = FLUTTER_PLANE | 0x22D;
pub const NUMPAD_DECIMAL: u64 = FLUTTER_PLANE | 0x22E;
pub const NUMPAD_DIVIDE: u64 = FLUTTER_PLANE | 0x22F;
pub const NUMPAD_0: u64 = FLUTTER_PLANE | 0x230;

pub const SPACE: u64 = UNICODE_PLANE | 0x20;

/// Logical id of a key that has a fixed name regardless of layout.
///
/// Expects a sided VK (see
/// [`resolve_sided_key`](super::windows_vk::resolve_sided_key)).
pub fn named_logical_key(virtual_key: u16) -> Option<u64> {
    let id = match virtual_key {
        VK_BACK => BACKSPACE,
        VK_TAB => TAB,
        VK_RETURN => ENTER,
        VK_ESCAPE => ESCAPE,
        VK_SPACE => SPACE,
        VK_DELETE => DELETE,
        VK_CAPITAL => CAPS_LOCK,
        VK_NUMLOCK => NUM_LOCK,
        VK_SCROLL => SCROLL_LOCK,
        VK_DOWN => ARROW_DOWN,
        VK_LEFT => ARROW_LEFT,
        VK_RIGHT => ARROW_RIGHT,
        VK_UP => ARROW_UP,
        VK_END => END,
        VK_HOME => HOME,
        VK_NEXT => PAGE_DOWN,
        VK_PRIOR => PAGE_UP,
        VK_INSERT => INSERT,
        VK_APPS => CONTEXT_MENU,
        VK_PAUSE => PAUSE,
        VK_SNAPSHOT => PRINT_SCREEN,
        VK_F1..=VK_F12 => F1 + u64::from(virtual_key - VK_F1),
        VK_LCONTROL => CONTROL_LEFT,
        VK_RCONTROL => CONTROL_RIGHT,
        VK_LSHIFT => SHIFT_LEFT,
        VK_RSHIFT => SHIFT_RIGHT,
        VK_LMENU => ALT_LEFT,
        VK_RMENU => ALT_RIGHT,
        VK_LWIN => META_LEFT,
        VK_RWIN => META_RIGHT,
        VK_NUMPAD0..=VK_NUMPAD9 => NUMPAD_0 + u64::from(virtual_key - VK_NUMPAD0),
        VK_MULTIPLY => NUMPAD_MULTIPLY,
        VK_ADD => NUMPAD_ADD,
        VK_SUBTRACT => NUMPAD_SUBTRACT,
        VK_DECIMAL => NUMPAD_DECIMAL,
        VK_DIVIDE => NUMPAD_DIVIDE,
        _ => return None,
    };
    Some(id)
}

/// Derives the logical id of a key.
///
/// `character` is the code point the layout assigns to the key with no
/// modifiers, or 0 when it produces none.
pub fn logical_key(virtual_key: u16, character: u32) -> u64 {
    if let Some(named) = named_logical_key(virtual_key) {
        return named;
    }
    match char::from_u32(character).filter(|c| is_printable(*c)) {
        Some(c) => UNICODE_PLANE | u64::from(u32::from(to_single_lowercase(c))),
        None => WINDOWS_PLANE | u64::from(virtual_key),
    }
}

/// `true` for characters the framework receives as text: no C0/C1 controls
/// and no DEL.
pub fn is_printable(c: char) -> bool {
    !c.is_control()
}

fn to_single_lowercase(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_keys_use_lowercase_code_point() {
        // Arrange – US layout reports 'A' for VK_A
        let vk_a = 0x41;

        // Act
        let logical = logical_key(vk_a, 'A' as u32);

        // Assert
        assert_eq!(logical, 0x61);
    }

    #[test]
    fn test_named_keys_ignore_the_layout_character() {
        assert_eq!(logical_key(VK_RETURN, '\r' as u32), ENTER);
        assert_eq!(logical_key(VK_SPACE, ' ' as u32), SPACE);
        assert_eq!(logical_key(VK_NUMPAD0 + 4, '4' as u32), NUMPAD_0 + 4);
    }

    #[test]
    fn test_function_keys_are_contiguous() {
        assert_eq!(named_logical_key(VK_F1), Some(0x01_0000_0801));
        assert_eq!(named_logical_key(VK_F12), Some(0x01_0000_080C));
    }

    #[test]
    fn test_sided_modifiers_live_in_the_framework_plane() {
        assert_eq!(named_logical_key(VK_RSHIFT), Some(0x02_0000_0103));
        assert_eq!(named_logical_key(VK_LCONTROL), Some(0x02_0000_0100));
        assert_eq!(named_logical_key(VK_SHIFT), None);
    }

    #[test]
    fn test_unmapped_keys_fall_back_to_windows_plane() {
        // VK_VOLUME_MUTE produces no character and has no fixed name here.
        assert_eq!(logical_key(0xAD, 0), 0x15_0000_00AD);
        // Control characters do not count as printable.
        assert_eq!(logical_key(0xAD, 0x1B), 0x15_0000_00AD);
    }

    #[test]
    fn test_printable_rejects_controls() {
        assert!(is_printable('a'));
        assert!(is_printable('é'));
        assert!(!is_printable('\u{1}'));
        assert!(!is_printable('\u{7F}'));
        assert!(!is_printable('\u{85}'));
    }
}
