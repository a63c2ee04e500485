//! `GetKeyState` / `MapVirtualKeyW` backed keyboard queries.
//!
//! # Safety
//!
//! Both calls are plain value-in/value-out Win32 functions with no pointers;
//! the `unsafe` blocks exist only because every FFI call is `unsafe`.

#![cfg(target_os = "windows")]

use keyrelay_core::KeyState;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyState, MapVirtualKeyW, MAPVK_VK_TO_CHAR, MAPVK_VK_TO_VSC, MAPVK_VK_TO_VSC_EX,
};

use super::{KeyStateOracle, KeyboardLayout};

/// High bit of `GetKeyState`: the key is down.
const PRESSED_MASK: u16 = 0x8000;
/// Low bit of `GetKeyState`: the key's toggle is on.
const TOGGLED_MASK: u16 = 0x0001;
/// `MAPVK_VK_TO_CHAR` sets the top bit for dead keys.
const DEAD_KEY_MASK: u32 = 0x8000_0000;

/// The calling thread's keyboard, as seen by the window procedure.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Keyboard;

impl Win32Keyboard {
    pub fn new() -> Self {
        Self
    }
}

impl KeyStateOracle for Win32Keyboard {
    fn key_state(&self, virtual_key: u16) -> KeyState {
        // SAFETY: GetKeyState takes a key code by value and has no
        // preconditions beyond being called on a thread with a message queue.
        let raw = unsafe { GetKeyState(i32::from(virtual_key)) } as u16;
        KeyState::new(raw & PRESSED_MASK != 0, raw & TOGGLED_MASK != 0)
    }
}

impl KeyboardLayout for Win32Keyboard {
    fn character_for(&self, virtual_key: u16) -> u32 {
        // SAFETY: MapVirtualKeyW is a pure lookup in the active layout.
        let raw = unsafe { MapVirtualKeyW(u32::from(virtual_key), MAPVK_VK_TO_CHAR) };
        raw & !DEAD_KEY_MASK
    }

    fn scan_code_for(&self, virtual_key: u16, extended: bool) -> u16 {
        let map_type = if extended {
            MAPVK_VK_TO_VSC_EX
        } else {
            MAPVK_VK_TO_VSC
        };
        // SAFETY: MapVirtualKeyW is a pure lookup in the active layout.
        let raw = unsafe { MapVirtualKeyW(u32::from(virtual_key), map_type) };
        // MAPVK_VK_TO_VSC_EX reports extended keys as 0xE0xx.
        (raw & 0xFF) as u16
    }
}
