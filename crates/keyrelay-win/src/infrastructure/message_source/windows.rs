//! The real message queue of a host window.
//!
//! # Safety
//!
//! `PeekMessageW` writes into a stack-allocated `MSG` we own and
//! `PostMessageW` only copies its arguments. Both are annotated with
//! `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::ffi::c_void;

use keyrelay_core::NativeKeyMessage;
use tracing::trace;
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    PeekMessageW, PostMessageW, MSG, PM_NOREMOVE, WM_KEYFIRST, WM_KEYLAST,
};

use super::{NativeMessageSource, SourceError};

/// Message queue of the window whose procedure feeds the pipeline.
///
/// The handle is kept as an integer so the source can be stored anywhere; it
/// is only turned back into an `HWND` for the duration of a call.
#[derive(Debug, Clone, Copy)]
pub struct Win32MessageSource {
    hwnd: isize,
}

impl Win32MessageSource {
    pub fn new(hwnd: isize) -> Self {
        Self { hwnd }
    }

    fn window(&self) -> HWND {
        HWND(self.hwnd as *mut c_void)
    }
}

impl NativeMessageSource for Win32MessageSource {
    fn peek_next(&self) -> Option<NativeKeyMessage> {
        let mut msg = MSG::default();
        // SAFETY: msg is a valid, writable MSG; PM_NOREMOVE leaves the queue
        // untouched.
        let found = unsafe {
            PeekMessageW(
                &mut msg,
                Some(self.window()),
                WM_KEYFIRST,
                WM_KEYLAST,
                PM_NOREMOVE,
            )
        };
        if !found.as_bool() {
            return None;
        }
        // Messages in the key range we do not model (WM_SYSCHAR, WM_UNICHAR)
        // read as "no character follows".
        NativeKeyMessage::from_win32(msg.message, msg.wParam.0, msg.lParam.0).ok()
    }

    fn inject(&self, message: NativeKeyMessage) -> Result<(), SourceError> {
        let (id, wparam, lparam) = message.to_win32();
        trace!(id, wparam, lparam, "posting keyboard message");
        // SAFETY: PostMessageW copies its arguments into the target queue.
        unsafe {
            PostMessageW(
                Some(self.window()),
                id,
                WPARAM(wparam),
                LPARAM(lparam),
            )
        }
        .map_err(|e| SourceError::PostFailed(e.to_string()))
    }
}
