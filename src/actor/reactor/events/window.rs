use tracing::{debug, info};

use crate::actor::broadcast::BroadcastEvent;
use crate::actor::reactor::events::workspace::WorkspaceEventHandler;
use crate::actor::reactor::{CommandError, CommandResult, Reactor, WindowCommand};
use crate::layout_engine::LayoutEngine;
use crate::model::container::WindowState;
use crate::model::tree::{ContainerId, TreeError, TreeResult};
use crate::sys::geometry::Rect;
use crate::sys::window_system::{ShowState, WindowHandle, WindowStyle};

type StateTransition = fn(&mut LayoutEngine, ContainerId) -> TreeResult<bool>;

pub struct WindowEventHandler;

impl WindowEventHandler {
    pub fn handle_window_shown(reactor: &mut Reactor, handle: WindowHandle) -> CommandResult {
        if reactor.layout_engine.tree().window_by_handle(handle).is_some() {
            return Ok(());
        }
        if !reactor.window_system.is_manageable(handle) {
            debug!(%handle, "not manageable");
            return Ok(());
        }
        Self::manage_window(reactor, handle)
    }

    pub fn handle_window_hidden(reactor: &mut Reactor, handle: WindowHandle) -> CommandResult {
        if reactor.hidden_by_wm.contains(&handle) {
            return Ok(());
        }
        if reactor.layout_engine.tree().window_by_handle(handle).is_none() {
            return Ok(());
        }
        Self::unmanage_window(reactor, handle)
    }

    pub fn handle_window_destroyed(reactor: &mut Reactor, handle: WindowHandle) -> CommandResult {
        reactor.hidden_by_wm.remove(&handle);
        if reactor.layout_engine.tree().window_by_handle(handle).is_none() {
            return Ok(());
        }
        Self::unmanage_window(reactor, handle)
    }

    pub fn handle_window_minimized(reactor: &mut Reactor, handle: WindowHandle) -> CommandResult {
        let Some(window) = reactor.layout_engine.tree().window_by_handle(handle) else {
            return Ok(());
        };
        reactor.layout_engine.set_minimized(window)?;
        Ok(())
    }

    pub fn handle_window_minimize_ended(
        reactor: &mut Reactor,
        handle: WindowHandle,
    ) -> CommandResult {
        let tree = reactor.layout_engine.tree();
        let Some(window) = tree.window_by_handle(handle) else { return Ok(()) };
        if !matches!(tree[window].kind.window_state(), Some(WindowState::Minimized { .. })) {
            return Ok(());
        }
        reactor.layout_engine.restore(window)?;
        Ok(())
    }

    /// Picks up maximize and restore done through the OS, and follows
    /// floating windows the user dragged.
    pub fn handle_window_location_changed(
        reactor: &mut Reactor,
        handle: WindowHandle,
    ) -> CommandResult {
        let tree = reactor.layout_engine.tree();
        let Some(window) = tree.window_by_handle(handle) else { return Ok(()) };
        let Some(&state) = tree[window].kind.window_state() else { return Ok(()) };

        match (reactor.window_system.show_state(handle), state) {
            (ShowState::Minimized, _)
            | (ShowState::Maximized, WindowState::Maximized { .. })
            | (ShowState::Maximized, WindowState::Fullscreen { .. })
            | (ShowState::Maximized, WindowState::Minimized { .. }) => return Ok(()),
            (ShowState::Maximized, _) => {
                reactor.layout_engine.set_maximized(window)?;
                return Ok(());
            }
            (ShowState::Normal, WindowState::Maximized { .. }) => {
                reactor.layout_engine.restore(window)?;
                return Ok(());
            }
            (ShowState::Normal, _) => {}
        }

        if state != WindowState::Floating {
            return Ok(());
        }
        let Some(rect) = reactor.window_system.window_rect(handle) else { return Ok(()) };
        reactor.layout_engine.window_mut(window)?.floating_placement = rect;
        Self::follow_to_monitor(reactor, window, rect)
    }

    pub fn handle_window_focused(reactor: &mut Reactor, handle: WindowHandle) -> CommandResult {
        let Some(window) = reactor.layout_engine.tree().window_by_handle(handle) else {
            return Ok(());
        };
        if reactor.layout_engine.focused() == Some(window) {
            return Ok(());
        }
        reactor.focus_container(window)
    }

    pub fn handle_command_window(reactor: &mut Reactor, cmd: WindowCommand) -> CommandResult {
        debug!(?cmd);
        let (handle, transition): (Option<WindowHandle>, StateTransition) = match cmd {
            WindowCommand::Manage { handle } => {
                if reactor.layout_engine.tree().window_by_handle(handle).is_some() {
                    return Ok(());
                }
                return Self::manage_window(reactor, handle);
            }
            WindowCommand::Unmanage { handle } => return Self::unmanage_window(reactor, handle),
            WindowCommand::SetFloating { handle } => (handle, LayoutEngine::set_floating),
            WindowCommand::SetTiling { handle } => (handle, LayoutEngine::set_tiling),
            WindowCommand::SetMinimized { handle } => (handle, LayoutEngine::set_minimized),
            WindowCommand::SetMaximized { handle } => (handle, LayoutEngine::set_maximized),
            WindowCommand::SetFullscreen { handle } => (handle, LayoutEngine::set_fullscreen),
            WindowCommand::Restore { handle } => (handle, LayoutEngine::restore),
            WindowCommand::ToggleFloating { handle } => (handle, LayoutEngine::toggle_floating),
        };
        let window = reactor.window_for(handle)?;
        let changed = transition(&mut reactor.layout_engine, window)?;
        debug!(?window, changed, "window state");
        Ok(())
    }

    /// Adds a window next to the last focused tiling window of the focused
    /// workspace. Windows that cannot be resized float.
    pub(in crate::actor::reactor) fn manage_window(
        reactor: &mut Reactor,
        handle: WindowHandle,
    ) -> CommandResult {
        let workspace = reactor.focused_workspace().ok_or(CommandError::MonitorNotFound)?;
        let style = reactor.window_system.window_style(handle);
        let floating =
            !style.contains(WindowStyle::RESIZABLE) || style.contains(WindowStyle::POPUP);
        let rect = reactor.window_system.window_rect(handle).unwrap_or_default();
        let show_state = reactor.window_system.show_state(handle);

        let engine = &mut reactor.layout_engine;
        let window = if floating {
            let placement = if reactor.config.general.center_new_floating {
                rect.centered_in(&engine.container_rect(workspace)?)
            } else {
                rect
            };
            let window = engine.create_window(handle, WindowState::Floating, placement);
            let end = engine.tree().children(workspace).len();
            engine.attach_container(window, workspace, end)?;
            window
        } else {
            let (parent, index) = engine.insertion_target(workspace);
            let window =
                engine.create_window(handle, WindowState::Tiling { size_percentage: 0.0 }, rect);
            engine.attach_container(window, parent, index)?;
            window
        };
        match show_state {
            ShowState::Normal => {}
            ShowState::Maximized => {
                engine.set_maximized(window)?;
            }
            ShowState::Minimized => {
                engine.set_minimized(window)?;
            }
        }
        if reactor.config.general.focus_follows_new_window && show_state != ShowState::Minimized {
            engine.set_focused_descendant(window, None)?;
        }
        engine.mark_for_redraw(workspace);

        info!(%handle, floating, "window managed");
        let snapshot = reactor.snapshot(window)?;
        reactor.broadcast(BroadcastEvent::WindowManaged { window: snapshot });
        Ok(())
    }

    pub(in crate::actor::reactor) fn unmanage_window(
        reactor: &mut Reactor,
        handle: WindowHandle,
    ) -> CommandResult {
        let tree = reactor.layout_engine.tree();
        let window = tree.window_by_handle(handle).ok_or(CommandError::WindowNotManaged(handle))?;
        let workspace = tree.workspace_of(window);
        if tree.parent(window).is_some() {
            reactor.layout_engine.detach_container(window)?;
        }
        reactor.layout_engine.remove_container(window)?;
        reactor.hidden_by_wm.remove(&handle);

        info!(%handle, "window unmanaged");
        reactor.broadcast(BroadcastEvent::WindowUnmanaged { handle });
        if let Some(workspace) = workspace {
            WorkspaceEventHandler::deactivate_if_unused(reactor, workspace)?;
        }
        Ok(())
    }

    /// Moves a floating window into the workspace shown on the monitor its
    /// center ended up on.
    fn follow_to_monitor(reactor: &mut Reactor, window: ContainerId, rect: Rect) -> CommandResult {
        let tree = reactor.layout_engine.tree();
        let current = tree.monitor_of(window).ok_or(TreeError::AlreadyDetached(window))?;
        let center = rect.center();
        let Some(target) = tree.monitors().iter().copied().find(|&m| {
            tree[m].kind.as_monitor().is_some_and(|data| data.rect.contains(center))
        }) else {
            return Ok(());
        };
        if target == current {
            return Ok(());
        }
        let Some(workspace) = tree.displayed_workspace(target) else { return Ok(()) };
        let scale = |m: ContainerId| tree[m].kind.as_monitor().map(|data| data.scale_factor);
        let scale_changed = scale(current) != scale(target);
        let end = tree.children(workspace).len();

        reactor.layout_engine.move_container_within_tree(window, workspace, end, false)?;
        if scale_changed {
            reactor.layout_engine.window_mut(window)?.has_pending_dpi_adjustment = true;
        }
        debug!(?window, ?workspace, scale_changed, "floating window changed monitor");
        Ok(())
    }
}
