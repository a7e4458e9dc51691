//! The bus every stimulus goes through.
//!
//! OS notifications and user commands arrive as [`Event`]s. Each one is fully
//! handled before the next, after which the reactor syncs focus with the OS,
//! writes out pending geometry and, in debug builds, checks the tree.

mod error;
mod events;
mod replay;


use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

pub use error::{CommandError, CommandResult};
use events::command::CommandEventHandler;
use events::monitor::MonitorEventHandler;
use events::window::WindowEventHandler;
use events::workspace::WorkspaceEventHandler;
use parking_lot::{Mutex, MutexGuard};
pub use replay::{Record, replay};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::actor::broadcast::{BroadcastEvent, BroadcastSender};
use crate::actor::{self};
use crate::common::collections::HashSet;
use crate::common::config::Config;
use crate::layout_engine::{Direction, Layout, LayoutCommand, LayoutEngine};
use crate::model::container::WindowState;
use crate::model::snapshot::CacheNode;
use crate::model::tree::ContainerId;
use crate::sys::geometry::Rect;
use crate::sys::window_system::{WindowHandle, WindowSystem};

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MonitorInfo {
    pub device_name: String,
    pub rect: Rect,
    pub working_rect: Rect,
    pub scale_factor: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// The complete current set of monitors, in OS order.
    MonitorsChanged(Vec<MonitorInfo>),
    WindowShown(WindowHandle),
    WindowHidden(WindowHandle),
    WindowDestroyed(WindowHandle),
    WindowMinimized(WindowHandle),
    WindowMinimizeEnded(WindowHandle),
    /// Moved, resized, or its show state changed.
    WindowLocationChanged(WindowHandle),
    WindowFocused(WindowHandle),
    WindowTitleChanged(WindowHandle),
    Command(Command),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Layout(LayoutCommand),
    Tree(TreeCommand),
    Window(WindowCommand),
    Workspace(WorkspaceCommand),
    Reactor(ReactorCommand),
}

/// The structural primitives, addressed by container id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TreeCommand {
    AttachContainer {
        child: ContainerId,
        parent: ContainerId,
        index: usize,
    },
    DetachContainer {
        child: ContainerId,
    },
    MoveContainerWithinTree {
        container: ContainerId,
        target_parent: ContainerId,
        target_index: usize,
        adjust_size: bool,
    },
    ReplaceContainer {
        replacement: ContainerId,
        target_parent: ContainerId,
        index: usize,
    },
    ResizeContainer {
        container: ContainerId,
        percent_delta: f64,
    },
    FlattenSplitContainer {
        container: ContainerId,
    },
    SetFocusedDescendant {
        target: ContainerId,
        stop_ancestor: Option<ContainerId>,
    },
    ChangeContainerLayout {
        container: ContainerId,
        layout: Layout,
    },
    RedrawContainers,
}

/// A missing handle means the focused window.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WindowCommand {
    Manage { handle: WindowHandle },
    Unmanage { handle: WindowHandle },
    SetFloating { handle: Option<WindowHandle> },
    SetTiling { handle: Option<WindowHandle> },
    SetMinimized { handle: Option<WindowHandle> },
    SetMaximized { handle: Option<WindowHandle> },
    SetFullscreen { handle: Option<WindowHandle> },
    Restore { handle: Option<WindowHandle> },
    ToggleFloating { handle: Option<WindowHandle> },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceCommand {
    /// `monitor` is an index into the monitors in OS order.
    Activate { name: String, monitor: Option<usize> },
    Deactivate { name: String },
    Focus { name: String },
    MoveWindowToWorkspace { name: String },
    MoveWorkspaceInDirection { direction: Direction },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReactorCommand {
    Debug,
    SaveRecoveryCache { path: Option<PathBuf> },
    EnableBindingMode { name: String },
    DisableBindingMode { name: String },
}

pub struct Reactor {
    config: Config,
    layout_engine: LayoutEngine,
    window_system: Box<dyn WindowSystem>,
    broadcast_tx: BroadcastSender,
    record: Record,
    active_binding_modes: Vec<String>,
    /// Windows the reactor itself hid because their workspace is not shown.
    hidden_by_wm: HashSet<WindowHandle>,
}

static_assertions::assert_impl_all!(Reactor: Send);

impl Reactor {
    pub fn new(
        config: Config,
        layout_engine: LayoutEngine,
        window_system: Box<dyn WindowSystem>,
        mut record: Record,
        broadcast_tx: BroadcastSender,
    ) -> Reactor {
        record.start(&config, &layout_engine);
        Reactor {
            config,
            layout_engine,
            window_system,
            broadcast_tx,
            record,
            active_binding_modes: Vec::new(),
            hidden_by_wm: HashSet::default(),
        }
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn layout_engine(&self) -> &LayoutEngine { &self.layout_engine }

    pub fn active_binding_modes(&self) -> &[String] { &self.active_binding_modes }

    #[instrument(name = "reactor::handle_event", skip(self))]
    pub fn handle_event(&mut self, event: Event) -> CommandResult {
        self.record.on_event(&event);
        let focused_before = self.layout_engine.focused();
        let result = self.dispatch(event);
        let result = result.and(self.finish(focused_before));
        if let Err(err) = &result {
            if err.is_internal() {
                error!(%err, "internal bug");
            } else {
                warn!(%err, "command failed");
            }
        }
        result
    }

    fn dispatch(&mut self, event: Event) -> CommandResult {
        match event {
            Event::MonitorsChanged(monitors) => {
                MonitorEventHandler::handle_monitors_changed(self, monitors)
            }
            Event::WindowShown(handle) => WindowEventHandler::handle_window_shown(self, handle),
            Event::WindowHidden(handle) => WindowEventHandler::handle_window_hidden(self, handle),
            Event::WindowDestroyed(handle) => {
                WindowEventHandler::handle_window_destroyed(self, handle)
            }
            Event::WindowMinimized(handle) => {
                WindowEventHandler::handle_window_minimized(self, handle)
            }
            Event::WindowMinimizeEnded(handle) => {
                WindowEventHandler::handle_window_minimize_ended(self, handle)
            }
            Event::WindowLocationChanged(handle) => {
                WindowEventHandler::handle_window_location_changed(self, handle)
            }
            Event::WindowFocused(handle) => WindowEventHandler::handle_window_focused(self, handle),
            Event::WindowTitleChanged(handle) => {
                debug!(%handle, "title changed");
                Ok(())
            }
            Event::Command(Command::Layout(cmd)) => {
                CommandEventHandler::handle_command_layout(self, cmd)
            }
            Event::Command(Command::Tree(cmd)) => CommandEventHandler::handle_command_tree(self, cmd),
            Event::Command(Command::Window(cmd)) => {
                WindowEventHandler::handle_command_window(self, cmd)
            }
            Event::Command(Command::Workspace(cmd)) => {
                WorkspaceEventHandler::handle_command_workspace(self, cmd)
            }
            Event::Command(Command::Reactor(cmd)) => {
                CommandEventHandler::handle_command_reactor(self, cmd)
            }
        }
    }

    fn finish(&mut self, focused_before: Option<ContainerId>) -> CommandResult {
        self.release_detached_windows()?;
        self.sync_focus(focused_before)?;
        self.redraw_containers()?;
        if cfg!(debug_assertions) {
            self.layout_engine.verify_invariants()?;
        }
        Ok(())
    }

    /// Frees windows a command left outside the tree. They are no longer
    /// managed, so a later show can manage them afresh.
    fn release_detached_windows(&mut self) -> CommandResult {
        let tree = self.layout_engine.tree();
        let detached = tree.detached_windows();
        let mut tops: Vec<ContainerId> = detached
            .iter()
            .filter_map(|&(id, _)| tree.self_and_ancestors(id).last())
            .collect();
        tops.sort_unstable();
        tops.dedup();
        for top in tops {
            self.layout_engine.remove_container(top)?;
        }
        for (_, handle) in detached {
            self.hidden_by_wm.remove(&handle);
            info!(%handle, "detached window released");
            self.broadcast(BroadcastEvent::WindowUnmanaged { handle });
        }
        Ok(())
    }

    fn sync_focus(&mut self, focused_before: Option<ContainerId>) -> CommandResult {
        let Some(focused) = self.layout_engine.focused() else { return Ok(()) };
        if Some(focused) == focused_before {
            return Ok(());
        }
        if let Some(window) = self.layout_engine.tree().kind(focused)?.as_window()
            && !matches!(window.state, WindowState::Minimized { .. })
        {
            self.window_system.set_foreground_window(window.handle);
        }
        let container = self.snapshot(focused)?;
        self.broadcast(BroadcastEvent::FocusChanged { container });
        Ok(())
    }

    /// Writes geometry for every window under a container marked for redraw.
    pub(super) fn redraw_containers(&mut self) -> CommandResult {
        for id in self.layout_engine.take_redraw_windows() {
            let tree = self.layout_engine.tree();
            let Some(window) = tree.kind(id)?.as_window() else { continue };
            let handle = window.handle;
            if !tree.is_displayed(id) {
                if self.hidden_by_wm.insert(handle) {
                    trace!(%handle, "hide");
                    self.window_system.hide_window(handle);
                }
                continue;
            }
            if matches!(window.state, WindowState::Minimized { .. }) {
                continue;
            }
            let border = window.border_delta;
            let pending_dpi = window.has_pending_dpi_adjustment;
            let rect = self.layout_engine.container_rect(id)?.outset(&border);
            trace!(%handle, ?rect, "set rect");
            self.window_system.set_window_rect(handle, rect);
            if pending_dpi {
                // The first write lands the window on the new monitor; the
                // second sizes it at that monitor's scale.
                self.window_system.set_window_rect(handle, rect);
                self.layout_engine.window_mut(id)?.has_pending_dpi_adjustment = false;
            }
            if self.hidden_by_wm.remove(&handle) {
                trace!(%handle, "show");
                self.window_system.show_window(handle);
            }
        }
        Ok(())
    }

    pub(super) fn broadcast(&self, event: BroadcastEvent) { self.broadcast_tx.send(event) }

    pub(super) fn snapshot(&self, id: ContainerId) -> CommandResult<CacheNode> {
        Ok(CacheNode::capture(&self.layout_engine, id)?)
    }

    pub(super) fn focused_workspace(&self) -> Option<ContainerId> {
        let focused = self.layout_engine.focused()?;
        self.layout_engine.tree().workspace_of(focused)
    }

    pub(super) fn focused_monitor(&self) -> Option<ContainerId> {
        let focused = self.layout_engine.focused()?;
        self.layout_engine.tree().monitor_of(focused)
    }

    /// The managed window for `handle`, or the focused window.
    pub(super) fn window_for(&self, handle: Option<WindowHandle>) -> CommandResult<ContainerId> {
        let tree = self.layout_engine.tree();
        match handle {
            Some(handle) => {
                tree.window_by_handle(handle).ok_or(CommandError::WindowNotManaged(handle))
            }
            None => self
                .layout_engine
                .focused()
                .filter(|&id| tree[id].kind.is_window())
                .ok_or(CommandError::NoFocusedWindow),
        }
    }

    /// Focuses `target` and shows its workspace if it is hidden.
    pub(super) fn focus_container(&mut self, target: ContainerId) -> CommandResult {
        self.layout_engine.set_focused_descendant(target, None)?;
        let tree = self.layout_engine.tree();
        if tree.is_displayed(target) {
            return Ok(());
        }
        let (Some(workspace), Some(monitor)) = (tree.workspace_of(target), tree.monitor_of(target))
        else {
            return Ok(());
        };
        let previous = self.layout_engine.set_displayed_workspace(monitor, workspace)?;
        if let Some(previous) = previous
            && previous != workspace
        {
            WorkspaceEventHandler::deactivate_if_unused(self, previous)?;
        }
        Ok(())
    }
}

/// The process-wide lock around the reactor. Every producer of events
/// (hotkeys, window hooks, IPC) goes through one of these.
#[derive(Clone)]
pub struct SharedReactor(Arc<Mutex<Reactor>>);

static_assertions::assert_impl_all!(SharedReactor: Send, Sync);

impl SharedReactor {
    pub fn new(reactor: Reactor) -> Self { SharedReactor(Arc::new(Mutex::new(reactor))) }

    pub fn handle_event(&self, event: Event) -> CommandResult { self.0.lock().handle_event(event) }

    pub fn lock(&self) -> MutexGuard<'_, Reactor> { self.0.lock() }

    /// Starts a thread that feeds a mailbox through the lock. The thread ends
    /// once every clone of the returned sender is dropped.
    pub fn spawn_event_loop(&self) -> std::io::Result<(Sender, JoinHandle<()>)> {
        let (tx, mut rx) = actor::channel();
        let this = self.clone();
        let handle = std::thread::Builder::new().name("reactor".to_string()).spawn(move || {
            while let Some((span, event)) = rx.blocking_recv() {
                let _guard = span.enter();
                // Failures are logged by the reactor.
                _ = this.handle_event(event);
            }
        })?;
        Ok((tx, handle))
    }
}
