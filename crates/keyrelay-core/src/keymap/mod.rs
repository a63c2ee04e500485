//! Key identity tables.
//!
//! Every normalized key event carries two 64-bit ids:
//!
//! - a **physical** id (where the key is), derived from the scan code, and
//! - a **logical** id (what the key means), derived from the virtual key and
//!   the character the layout assigns to it.
//!
//! Both ids are partitioned into *planes* by bits 32..40 so ids from different
//! sources can never collide:
//!
//! ```text
//!  0x00_xxxx_xxxx  Unicode plane       (logical: lowercase code point)
//!  0x01_xxxx_xxxx  unprintable plane   (logical: Enter, arrows, F-keys …)
//!  0x02_xxxx_xxxx  framework plane     (logical: sided modifiers, keypad)
//!  0x15_xxxx_xxxx  Windows plane       (either: raw VK or scan code fallback)
//! ```
//!
//! All tables are `const` data, built at compile time and shared through the
//! process-wide [`WINDOWS_KEYMAP`].

pub mod hid;
pub mod logical;
pub mod scan_code;
pub mod windows_vk;

pub use hid::HidKeyCode;

/// Bits of a key id that hold the value inside its plane.
pub const VALUE_MASK: u64 = 0x00_FFFF_FFFF;
/// Bits of a key id that select its plane.
pub const PLANE_MASK: u64 = 0xFF_0000_0000;
pub const UNICODE_PLANE: u64 = 0x00_0000_0000;
pub const UNPRINTABLE_PLANE: u64 = 0x01_0000_0000;
pub const FLUTTER_PLANE: u64 = 0x02_0000_0000;
pub const WINDOWS_PLANE: u64 = 0x15_0000_0000;

/// Translation entry points over the static tables.
///
/// The mapper holds no state; it exists so translators can take the tables by
/// reference (`&'static KeyMapper`) instead of reaching for free functions.
#[derive(Debug)]
pub struct KeyMapper {
    name: &'static str,
}

/// The table set for Windows virtual keys and set-1 scan codes.
pub static WINDOWS_KEYMAP: KeyMapper = KeyMapper { name: "windows" };

impl KeyMapper {
    /// Keymap name reported on the legacy channel (`"keymap": "windows"`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Physical id for a scan code.
    ///
    /// Scan codes with no HID counterpart get `WINDOWS_PLANE | (0xE000|scan)`
    /// so distinct keys still get distinct ids.
    pub fn physical_key(&self, scan_code: u16, extended: bool) -> u64 {
        scan_code::scan_code_to_hid(scan_code, extended)
            .physical_key()
            .unwrap_or_else(|| {
                WINDOWS_PLANE | u64::from(scan_code::combined_scan_code(scan_code, extended))
            })
    }

    /// Logical id for a sided virtual key.
    ///
    /// `character` is the unmodified character from the layout, 0 for none.
    pub fn logical_key(&self, virtual_key: u16, character: u32) -> u64 {
        logical::logical_key(virtual_key, character)
    }

    /// HID usage for a virtual key, for diagnostics.
    pub fn vk_to_hid(&self, virtual_key: u16) -> HidKeyCode {
        windows_vk::vk_to_hid(virtual_key)
    }

    /// The scan code a US keyboard reports for a virtual key, or `None` when
    /// the key has no fixed position.
    pub fn vk_to_scan_code(&self, virtual_key: u16) -> Option<(u16, bool)> {
        scan_code::hid_to_scan_code(windows_vk::vk_to_hid(virtual_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_key_uses_hid_for_known_scan_codes() {
        // Arrange
        let mapper = &WINDOWS_KEYMAP;

        // Act
        let a = mapper.physical_key(0x1E, false);
        let numpad_enter = mapper.physical_key(0x1C, true);

        // Assert
        assert_eq!(a, 0x0007_0004);
        assert_eq!(numpad_enter, 0x0007_0058);
    }

    #[test]
    fn test_physical_key_falls_back_to_windows_plane() {
        // 0x6F has no entry in either table.
        let id = WINDOWS_KEYMAP.physical_key(0x6F, true);
        assert_eq!(id, WINDOWS_PLANE | 0xE06F);
        assert_eq!(id & PLANE_MASK, WINDOWS_PLANE);
    }

    #[test]
    fn test_vk_to_scan_code_goes_through_hid() {
        assert_eq!(WINDOWS_KEYMAP.vk_to_scan_code(0x41), Some((0x1E, false)));
        assert_eq!(
            WINDOWS_KEYMAP.vk_to_scan_code(windows_vk::vk::VK_RCONTROL),
            Some((0x1D, true))
        );
        assert_eq!(WINDOWS_KEYMAP.vk_to_scan_code(windows_vk::vk::VK_PROCESSKEY), None);
    }

    #[test]
    fn test_keymap_name_is_windows() {
        assert_eq!(WINDOWS_KEYMAP.name(), "windows");
    }
}
