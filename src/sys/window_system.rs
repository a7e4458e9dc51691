//! The boundary between the container tree and the native windowing system.
//!
//! Nothing in this crate talks to the OS directly. A platform layer implements
//! [`WindowSystem`] and feeds raw lifecycle notifications in as reactor events.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::sys::geometry::Rect;

/// Opaque native window handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:#x}", self.0) }
}

impl FromStr for WindowHandle {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).map(WindowHandle),
            None => s.parse().map(WindowHandle),
        }
    }
}

bitflags! {
    /// Subset of native window styles the tree cares about.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct WindowStyle: u32 {
        const RESIZABLE = 1 << 0;
        const MAXIMIZABLE = 1 << 1;
        const POPUP = 1 << 2;
        const TOOL_WINDOW = 1 << 3;
        const TOPMOST = 1 << 4;
        const CHILD = 1 << 5;
    }
}

/// Native show state of a window, as reported by the OS.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

pub trait WindowSystem: Send {
    /// Whether the window should be managed at all.
    fn is_manageable(&self, handle: WindowHandle) -> bool;

    fn window_style(&self, handle: WindowHandle) -> WindowStyle;

    fn show_state(&self, handle: WindowHandle) -> ShowState;

    fn window_rect(&self, handle: WindowHandle) -> Option<Rect>;

    fn set_window_rect(&mut self, handle: WindowHandle, rect: Rect);

    fn show_window(&mut self, handle: WindowHandle);

    fn hide_window(&mut self, handle: WindowHandle);

    fn foreground_window(&self) -> Option<WindowHandle>;

    fn set_foreground_window(&mut self, handle: WindowHandle);
}

/// Lets a caller keep a handle on the window system after giving it to the reactor.
impl<T: WindowSystem> WindowSystem for Arc<Mutex<T>> {
    fn is_manageable(&self, handle: WindowHandle) -> bool { self.lock().is_manageable(handle) }

    fn window_style(&self, handle: WindowHandle) -> WindowStyle { self.lock().window_style(handle) }

    fn show_state(&self, handle: WindowHandle) -> ShowState { self.lock().show_state(handle) }

    fn window_rect(&self, handle: WindowHandle) -> Option<Rect> { self.lock().window_rect(handle) }

    fn set_window_rect(&mut self, handle: WindowHandle, rect: Rect) {
        self.lock().set_window_rect(handle, rect)
    }

    fn show_window(&mut self, handle: WindowHandle) { self.lock().show_window(handle) }

    fn hide_window(&mut self, handle: WindowHandle) { self.lock().hide_window(handle) }

    fn foreground_window(&self) -> Option<WindowHandle> { self.lock().foreground_window() }

    fn set_foreground_window(&mut self, handle: WindowHandle) {
        self.lock().set_foreground_window(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trips_through_hex() {
        let handle = WindowHandle(0x1f4);
        assert_eq!("0x1f4", handle.to_string());
        assert_eq!(Ok(handle), "0x1f4".parse());
        assert_eq!(Ok(WindowHandle(500)), "500".parse());
        assert!("0xzz".parse::<WindowHandle>().is_err());
    }
}
