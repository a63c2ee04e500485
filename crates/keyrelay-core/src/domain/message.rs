//! Native keyboard messages as the host window receives them.
//!
//! A Windows window procedure sees keyboard input as a `(msg, wParam, lParam)`
//! triple. [`NativeKeyMessage`] is the decoded form of that triple, restricted
//! to the six message kinds the pipeline handles.
//!
//! # `lParam` layout (for beginners)
//!
//! ```text
//!  bits  0..16  repeat count (always 1 for messages we build)
//!  bits 16..24  scan code
//!  bit  24      extended key (0xE0-prefixed scan code)
//!  bits 25..29  reserved; KeyRelay stores the message origin in 25..27
//!  bit  29      context code (ALT held; set for WM_SYS* messages)
//!  bit  30      previous key state ("was already down")
//!  bit  31      transition state (1 for key-up)
//! ```
//!
//! Re-injected messages need to be told apart from hardware input when they
//! come back through the queue, so their origin rides in the reserved bits.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Win32 message ids for the supported classes.
pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_CHAR: u32 = 0x0102;
pub const WM_DEADCHAR: u32 = 0x0103;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;

const SCAN_CODE_SHIFT: u32 = 16;
const EXTENDED_BIT: isize = 1 << 24;
const ORIGIN_SHIFT: u32 = 25;
const ORIGIN_MASK: isize = 0b11 << ORIGIN_SHIFT;
const CONTEXT_BIT: isize = 1 << 29;
const PREVIOUS_STATE_BIT: isize = 1 << 30;
const TRANSITION_BIT: isize = 1 << 31;

/// Errors produced while decoding a raw Win32 message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// The message id is not one of the six keyboard classes.
    #[error("unsupported keyboard message id 0x{0:04X}")]
    UnsupportedMessage(u32),

    /// A key message carried a virtual key above 0xFF.
    #[error("virtual key 0x{0:X} out of range")]
    VirtualKeyOutOfRange(usize),

    /// A character message carried a wParam that is not a UTF-16 code unit.
    #[error("character message wParam 0x{0:X} is not a UTF-16 code unit")]
    CodeUnitOutOfRange(usize),
}

/// The kind of keyboard message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageClass {
    KeyDown,
    KeyUp,
    SysKeyDown,
    SysKeyUp,
    Char,
    DeadChar,
}

impl MessageClass {
    /// The `WM_*` id of this class.
    pub fn win32_id(self) -> u32 {
        match self {
            MessageClass::KeyDown => WM_KEYDOWN,
            MessageClass::KeyUp => WM_KEYUP,
            MessageClass::SysKeyDown => WM_SYSKEYDOWN,
            MessageClass::SysKeyUp => WM_SYSKEYUP,
            MessageClass::Char => WM_CHAR,
            MessageClass::DeadChar => WM_DEADCHAR,
        }
    }

    pub fn from_win32_id(id: u32) -> Option<Self> {
        match id {
            WM_KEYDOWN => Some(MessageClass::KeyDown),
            WM_KEYUP => Some(MessageClass::KeyUp),
            WM_SYSKEYDOWN => Some(MessageClass::SysKeyDown),
            WM_SYSKEYUP => Some(MessageClass::SysKeyUp),
            WM_CHAR => Some(MessageClass::Char),
            WM_DEADCHAR => Some(MessageClass::DeadChar),
            _ => None,
        }
    }

    /// Key transitions, as opposed to character messages.
    pub fn is_key(self) -> bool {
        !self.is_character()
    }

    pub fn is_character(self) -> bool {
        matches!(self, MessageClass::Char | MessageClass::DeadChar)
    }

    pub fn is_down(self) -> bool {
        matches!(self, MessageClass::KeyDown | MessageClass::SysKeyDown)
    }

    pub fn is_up(self) -> bool {
        matches!(self, MessageClass::KeyUp | MessageClass::SysKeyUp)
    }

    /// System key messages (ALT held or F10) that the host must always see.
    pub fn is_sys(self) -> bool {
        matches!(self, MessageClass::SysKeyDown | MessageClass::SysKeyUp)
    }
}

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// Delivered by the host from real input.
    #[default]
    Hardware,
    /// Re-injected by the redispatch gate after the framework declined it.
    Redispatched,
    /// Synthesized by the pipeline to repair host modifier state.
    Forged,
}

impl MessageOrigin {
    fn to_bits(self) -> isize {
        let tag: isize = match self {
            MessageOrigin::Hardware => 0,
            MessageOrigin::Redispatched => 1,
            MessageOrigin::Forged => 2,
        };
        tag << ORIGIN_SHIFT
    }

    fn from_bits(lparam: isize) -> Self {
        match (lparam & ORIGIN_MASK) >> ORIGIN_SHIFT {
            1 => MessageOrigin::Redispatched,
            2 => MessageOrigin::Forged,
            _ => MessageOrigin::Hardware,
        }
    }
}

/// One decoded keyboard message.
///
/// `code` is the virtual key for key classes and the UTF-16 code unit for
/// character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeKeyMessage {
    pub class: MessageClass,
    pub code: u16,
    pub scan_code: u16,
    pub extended: bool,
    pub was_already_down: bool,
    #[serde(default)]
    pub origin: MessageOrigin,
}

impl NativeKeyMessage {
    /// A hardware key message.
    pub fn key(
        class: MessageClass,
        virtual_key: u16,
        scan_code: u16,
        extended: bool,
        was_already_down: bool,
    ) -> Self {
        Self {
            class,
            code: virtual_key,
            scan_code,
            extended,
            was_already_down,
            origin: MessageOrigin::Hardware,
        }
    }

    /// A hardware `WM_CHAR` or `WM_DEADCHAR` carrying one UTF-16 code unit.
    pub fn character(class: MessageClass, code_unit: u16, scan_code: u16) -> Self {
        Self {
            class,
            code: code_unit,
            scan_code,
            extended: false,
            was_already_down: false,
            origin: MessageOrigin::Hardware,
        }
    }

    pub fn with_origin(mut self, origin: MessageOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Decodes a window-procedure triple.
    ///
    /// # Errors
    ///
    /// [`MessageError::UnsupportedMessage`] for ids outside the six keyboard
    /// classes, and the range errors for out-of-range `wParam` values.
    pub fn from_win32(msg: u32, wparam: usize, lparam: isize) -> Result<Self, MessageError> {
        let class = MessageClass::from_win32_id(msg).ok_or(MessageError::UnsupportedMessage(msg))?;
        let code = if class.is_key() {
            if wparam > 0xFF {
                return Err(MessageError::VirtualKeyOutOfRange(wparam));
            }
            wparam as u16
        } else {
            u16::try_from(wparam).map_err(|_| MessageError::CodeUnitOutOfRange(wparam))?
        };
        Ok(Self {
            class,
            code,
            scan_code: ((lparam >> SCAN_CODE_SHIFT) & 0xFF) as u16,
            extended: lparam & EXTENDED_BIT != 0,
            was_already_down: lparam & PREVIOUS_STATE_BIT != 0,
            origin: MessageOrigin::from_bits(lparam),
        })
    }

    /// Encodes the message back into a `(msg, wParam, lParam)` triple.
    pub fn to_win32(&self) -> (u32, usize, isize) {
        let mut lparam: isize = 1;
        lparam |= ((self.scan_code & 0xFF) as isize) << SCAN_CODE_SHIFT;
        if self.extended {
            lparam |= EXTENDED_BIT;
        }
        lparam |= self.origin.to_bits();
        if self.class.is_sys() {
            lparam |= CONTEXT_BIT;
        }
        if self.was_already_down || self.class.is_up() {
            lparam |= PREVIOUS_STATE_BIT;
        }
        if self.class.is_up() {
            lparam |= TRANSITION_BIT;
        }
        (self.class.win32_id(), usize::from(self.code), lparam)
    }

    /// Hash over the fields that identify a keystroke, ignoring the origin.
    ///
    /// Two messages with equal hashes are the same keystroke as far as the
    /// redispatch gate is concerned.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        (
            self.code,
            self.scan_code,
            self.class,
            self.extended,
            self.was_already_down,
        )
            .hash(&mut hasher);
        hasher.finish()
    }
}
