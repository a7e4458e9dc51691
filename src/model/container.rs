use serde::{Deserialize, Serialize};

use crate::layout_engine::Layout;
use crate::model::tree::ContainerId;
use crate::sys::geometry::{Rect, RectDelta};
use crate::sys::window_system::WindowHandle;

/// The closed set of node variants in the container tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ContainerKind {
    Root,
    Monitor(Monitor),
    Workspace(Workspace),
    Split(SplitContainer),
    Window(Window),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub device_name: String,
    /// Full bounds of the display.
    pub rect: Rect,
    /// Bounds minus OS reserved areas such as a taskbar.
    pub working_rect: Rect,
    pub scale_factor: f32,
    /// One of this monitor's own children. Never owning.
    pub displayed_workspace: Option<ContainerId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub layout: Layout,
    pub is_monocle: bool,
    pub keep_alive: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitContainer {
    pub layout: Layout,
    pub size_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub handle: WindowHandle,
    pub state: WindowState,
    /// Placement used verbatim when the window is not tiled.
    pub floating_placement: Rect,
    pub border_delta: RectDelta,
    pub has_pending_dpi_adjustment: bool,
}

/// The state a window returns to when it leaves minimized, maximized or
/// fullscreen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestoreState {
    Tiling,
    Floating,
}

/// What a minimized window was before it was minimized. Maximized and
/// fullscreen keep the state they in turn came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinimizedFrom {
    Tiling,
    Floating,
    Maximized { previous: RestoreState },
    Fullscreen { previous: RestoreState },
}

impl MinimizedFrom {
    /// The tiling or floating state underneath.
    pub fn base(self) -> RestoreState {
        match self {
            MinimizedFrom::Tiling => RestoreState::Tiling,
            MinimizedFrom::Floating => RestoreState::Floating,
            MinimizedFrom::Maximized { previous } | MinimizedFrom::Fullscreen { previous } => {
                previous
            }
        }
    }

    pub fn container_type(self) -> ContainerType {
        match self {
            MinimizedFrom::Tiling => ContainerType::TilingWindow,
            MinimizedFrom::Floating => ContainerType::FloatingWindow,
            MinimizedFrom::Maximized { .. } => ContainerType::MaximizedWindow,
            MinimizedFrom::Fullscreen { .. } => ContainerType::FullscreenWindow,
        }
    }
}

impl RestoreState {
    pub fn container_type(self) -> ContainerType {
        match self {
            RestoreState::Tiling => ContainerType::TilingWindow,
            RestoreState::Floating => ContainerType::FloatingWindow,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum WindowState {
    Tiling { size_percentage: f64 },
    Floating,
    Minimized { previous: MinimizedFrom },
    Maximized { previous: RestoreState },
    Fullscreen { previous: RestoreState },
}

impl WindowState {
    pub fn kind(&self) -> WindowStateKind {
        match self {
            WindowState::Tiling { .. } => WindowStateKind::Tiling,
            WindowState::Floating => WindowStateKind::Floating,
            WindowState::Minimized { .. } => WindowStateKind::Minimized,
            WindowState::Maximized { .. } => WindowStateKind::Maximized,
            WindowState::Fullscreen { .. } => WindowStateKind::Fullscreen,
        }
    }

    /// The tiling or floating state this window eventually returns to.
    pub fn previous(&self) -> Option<RestoreState> {
        match *self {
            WindowState::Minimized { previous } => Some(previous.base()),
            WindowState::Maximized { previous } | WindowState::Fullscreen { previous } => {
                Some(previous)
            }
            WindowState::Tiling { .. } | WindowState::Floating => None,
        }
    }

    /// The type of the state a restore rebuilds.
    pub fn previous_type(&self) -> Option<ContainerType> {
        match *self {
            WindowState::Minimized { previous } => Some(previous.container_type()),
            WindowState::Maximized { previous } | WindowState::Fullscreen { previous } => {
                Some(previous.container_type())
            }
            WindowState::Tiling { .. } | WindowState::Floating => None,
        }
    }

    /// What minimizing a window in this state records.
    pub fn minimized_from(&self) -> MinimizedFrom {
        match *self {
            WindowState::Tiling { .. } => MinimizedFrom::Tiling,
            WindowState::Floating => MinimizedFrom::Floating,
            WindowState::Maximized { previous } => MinimizedFrom::Maximized { previous },
            WindowState::Fullscreen { previous } => MinimizedFrom::Fullscreen { previous },
            WindowState::Minimized { previous } => previous,
        }
    }

    /// What a window in this state should come back as after being minimized,
    /// maximized or made fullscreen.
    pub fn restore_target(&self) -> RestoreState {
        match *self {
            WindowState::Tiling { .. } => RestoreState::Tiling,
            WindowState::Floating => RestoreState::Floating,
            WindowState::Minimized { previous } => previous.base(),
            WindowState::Maximized { previous } | WindowState::Fullscreen { previous } => previous,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WindowStateKind {
    Tiling,
    Floating,
    Minimized,
    Maximized,
    Fullscreen,
}

/// Names used for `Type` in the recovery cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum ContainerType {
    RootContainer,
    Monitor,
    Workspace,
    SplitContainer,
    TilingWindow,
    FloatingWindow,
    MinimizedWindow,
    MaximizedWindow,
    FullscreenWindow,
}

impl ContainerKind {
    pub fn container_type(&self) -> ContainerType {
        match self {
            ContainerKind::Root => ContainerType::RootContainer,
            ContainerKind::Monitor(_) => ContainerType::Monitor,
            ContainerKind::Workspace(_) => ContainerType::Workspace,
            ContainerKind::Split(_) => ContainerType::SplitContainer,
            ContainerKind::Window(window) => match window.state.kind() {
                WindowStateKind::Tiling => ContainerType::TilingWindow,
                WindowStateKind::Floating => ContainerType::FloatingWindow,
                WindowStateKind::Minimized => ContainerType::MinimizedWindow,
                WindowStateKind::Maximized => ContainerType::MaximizedWindow,
                WindowStateKind::Fullscreen => ContainerType::FullscreenWindow,
            },
        }
    }

    /// Resizable containers take part in proportional sizing among their
    /// siblings: split containers and tiling windows.
    pub fn is_resizable(&self) -> bool { self.size_percentage().is_some() }

    pub fn size_percentage(&self) -> Option<f64> {
        match self {
            ContainerKind::Split(split) => Some(split.size_percentage),
            ContainerKind::Window(Window {
                state: WindowState::Tiling { size_percentage },
                ..
            }) => Some(*size_percentage),
            _ => None,
        }
    }

    /// Returns `false` if the container is not resizable.
    pub fn set_size_percentage(&mut self, value: f64) -> bool {
        match self {
            ContainerKind::Split(split) => split.size_percentage = value,
            ContainerKind::Window(Window {
                state: WindowState::Tiling { size_percentage },
                ..
            }) => *size_percentage = value,
            _ => return false,
        }
        true
    }

    /// Tiling direction of containers that lay out children.
    pub fn layout(&self) -> Option<Layout> {
        match self {
            ContainerKind::Workspace(ws) => Some(ws.layout),
            ContainerKind::Split(split) => Some(split.layout),
            _ => None,
        }
    }

    pub fn set_layout(&mut self, layout: Layout) -> bool {
        match self {
            ContainerKind::Workspace(ws) => ws.layout = layout,
            ContainerKind::Split(split) => split.layout = layout,
            _ => return false,
        }
        true
    }

    pub fn is_workspace(&self) -> bool { matches!(self, ContainerKind::Workspace(_)) }

    pub fn is_split(&self) -> bool { matches!(self, ContainerKind::Split(_)) }

    pub fn is_monitor(&self) -> bool { matches!(self, ContainerKind::Monitor(_)) }

    pub fn is_window(&self) -> bool { matches!(self, ContainerKind::Window(_)) }

    pub fn is_tiling_window(&self) -> bool {
        self.window_state().is_some_and(|s| s.kind() == WindowStateKind::Tiling)
    }

    pub fn is_floating_window(&self) -> bool {
        self.window_state().is_some_and(|s| s.kind() == WindowStateKind::Floating)
    }

    pub fn window_state(&self) -> Option<&WindowState> { self.as_window().map(|w| &w.state) }

    pub fn as_window(&self) -> Option<&Window> {
        match self {
            ContainerKind::Window(window) => Some(window),
            _ => None,
        }
    }

    pub fn as_window_mut(&mut self) -> Option<&mut Window> {
        match self {
            ContainerKind::Window(window) => Some(window),
            _ => None,
        }
    }

    pub fn as_workspace(&self) -> Option<&Workspace> {
        match self {
            ContainerKind::Workspace(ws) => Some(ws),
            _ => None,
        }
    }

    pub fn as_workspace_mut(&mut self) -> Option<&mut Workspace> {
        match self {
            ContainerKind::Workspace(ws) => Some(ws),
            _ => None,
        }
    }

    pub fn as_monitor(&self) -> Option<&Monitor> {
        match self {
            ContainerKind::Monitor(monitor) => Some(monitor),
            _ => None,
        }
    }

    pub fn as_monitor_mut(&mut self) -> Option<&mut Monitor> {
        match self {
            ContainerKind::Monitor(monitor) => Some(monitor),
            _ => None,
        }
    }

    /// Whether a container of this kind may be a child of `parent`.
    pub fn can_be_child_of(&self, parent: &ContainerKind) -> bool {
        match self {
            ContainerKind::Root => false,
            ContainerKind::Monitor(_) => matches!(parent, ContainerKind::Root),
            ContainerKind::Workspace(_) => parent.is_monitor(),
            ContainerKind::Split(_) | ContainerKind::Window(_) => {
                parent.is_workspace() || parent.is_split()
            }
        }
    }
}

impl Window {
    pub fn new(handle: WindowHandle, state: WindowState, floating_placement: Rect) -> Self {
        Window {
            handle,
            state,
            floating_placement,
            border_delta: RectDelta::default(),
            has_pending_dpi_adjustment: false,
        }
    }
}
