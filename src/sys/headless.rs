//! An in-memory window system.
//!
//! Used by tests and by `arbor replay`, where there is no real display server.
//! Every request is recorded so callers can assert on what the tree asked for.

use serde::{Deserialize, Serialize};

use crate::common::collections::HashMap;
use crate::sys::geometry::Rect;
use crate::sys::window_system::{ShowState, WindowHandle, WindowStyle, WindowSystem};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadlessWindow {
    pub rect: Rect,
    pub style: WindowStyle,
    pub show_state: ShowState,
    pub visible: bool,
    pub manageable: bool,
}

impl Default for HeadlessWindow {
    fn default() -> Self {
        HeadlessWindow {
            rect: Rect::new(100, 100, 800, 600),
            style: WindowStyle::RESIZABLE | WindowStyle::MAXIMIZABLE,
            show_state: ShowState::Normal,
            visible: true,
            manageable: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    SetRect(WindowHandle, Rect),
    Show(WindowHandle),
    Hide(WindowHandle),
    Focus(WindowHandle),
}

#[derive(Default, Debug)]
pub struct HeadlessWindowSystem {
    pub windows: HashMap<WindowHandle, HeadlessWindow>,
    pub foreground: Option<WindowHandle>,
    requests: Vec<Request>,
}

impl HeadlessWindowSystem {
    pub fn new() -> Self { Self::default() }

    pub fn add_window(&mut self, handle: WindowHandle, window: HeadlessWindow) {
        self.windows.insert(handle, window);
    }

    pub fn remove_window(&mut self, handle: WindowHandle) -> Option<HeadlessWindow> {
        self.windows.remove(&handle)
    }

    pub fn window_mut(&mut self, handle: WindowHandle) -> Option<&mut HeadlessWindow> {
        self.windows.get_mut(&handle)
    }

    /// Drains the requests issued since the last call.
    pub fn requests(&mut self) -> Vec<Request> { std::mem::take(&mut self.requests) }
}

impl WindowSystem for HeadlessWindowSystem {
    fn is_manageable(&self, handle: WindowHandle) -> bool {
        self.windows.get(&handle).is_some_and(|w| w.manageable)
    }

    fn window_style(&self, handle: WindowHandle) -> WindowStyle {
        self.windows.get(&handle).map(|w| w.style).unwrap_or_default()
    }

    fn show_state(&self, handle: WindowHandle) -> ShowState {
        self.windows.get(&handle).map(|w| w.show_state).unwrap_or_default()
    }

    fn window_rect(&self, handle: WindowHandle) -> Option<Rect> {
        self.windows.get(&handle).map(|w| w.rect)
    }

    fn set_window_rect(&mut self, handle: WindowHandle, rect: Rect) {
        if let Some(window) = self.windows.get_mut(&handle) {
            window.rect = rect;
        }
        self.requests.push(Request::SetRect(handle, rect));
    }

    fn show_window(&mut self, handle: WindowHandle) {
        if let Some(window) = self.windows.get_mut(&handle) {
            window.visible = true;
        }
        self.requests.push(Request::Show(handle));
    }

    fn hide_window(&mut self, handle: WindowHandle) {
        if let Some(window) = self.windows.get_mut(&handle) {
            window.visible = false;
        }
        self.requests.push(Request::Hide(handle));
    }

    fn foreground_window(&self) -> Option<WindowHandle> { self.foreground }

    fn set_foreground_window(&mut self, handle: WindowHandle) {
        self.foreground = Some(handle);
        self.requests.push(Request::Focus(handle));
    }
}
