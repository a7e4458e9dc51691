use tracing::{debug, info};

use crate::actor::broadcast::BroadcastEvent;
use crate::actor::reactor::{CommandError, CommandResult, Reactor, WorkspaceCommand};
use crate::common::config::WorkspaceConfig;
use crate::layout_engine::{Direction, Layout};
use crate::model::container::WindowState;
use crate::model::tree::{ContainerId, TreeError};

pub struct WorkspaceEventHandler;

impl WorkspaceEventHandler {
    pub fn handle_command_workspace(reactor: &mut Reactor, cmd: WorkspaceCommand) -> CommandResult {
        debug!(?cmd);
        match cmd {
            WorkspaceCommand::Activate { name, monitor } => {
                Self::activate_configured(reactor, &name, monitor).map(|_| ())
            }
            WorkspaceCommand::Deactivate { name } => Self::deactivate(reactor, &name),
            WorkspaceCommand::Focus { name } => Self::focus_workspace(reactor, &name),
            WorkspaceCommand::MoveWindowToWorkspace { name } => {
                Self::move_window_to_workspace(reactor, &name)
            }
            WorkspaceCommand::MoveWorkspaceInDirection { direction } => {
                Self::move_workspace_in_direction(reactor, direction)
            }
        }
    }

    /// Returns the workspace called `name`, activating it from the config if
    /// it is not active yet. An explicit monitor index wins over the
    /// configured binding, which wins over the focused monitor.
    fn activate_configured(
        reactor: &mut Reactor,
        name: &str,
        monitor_index: Option<usize>,
    ) -> CommandResult<ContainerId> {
        let tree = reactor.layout_engine.tree();
        if let Some(existing) = tree.workspace_by_name(name) {
            return Ok(existing);
        }
        let config = reactor
            .config
            .workspace(name)
            .ok_or_else(|| CommandError::WorkspaceNotFound(name.to_string()))?;
        let monitors = tree.monitors();
        let monitor = match monitor_index {
            Some(index) => *monitors.get(index).ok_or(CommandError::MonitorNotFound)?,
            None => config
                .bind_to_monitor
                .and_then(|index| monitors.get(index).copied())
                .or_else(|| reactor.focused_monitor())
                .or_else(|| monitors.first().copied())
                .ok_or(CommandError::MonitorNotFound)?,
        };
        Self::activate_workspace(reactor, name, monitor)
    }

    /// Creates and attaches a workspace. Siblings are kept in config order.
    pub(in crate::actor::reactor) fn activate_workspace(
        reactor: &mut Reactor,
        name: &str,
        monitor: ContainerId,
    ) -> CommandResult<ContainerId> {
        let config = &reactor.config;
        let keep_alive = config.workspace(name).is_some_and(|ws| ws.keep_alive);
        let position = |name: &str| {
            config.workspaces.iter().position(|ws| ws.name == name).unwrap_or(usize::MAX)
        };
        let tree = reactor.layout_engine.tree();
        let own = position(name);
        let index = tree
            .children(monitor)
            .iter()
            .filter(|&&ws| {
                tree[ws].kind.as_workspace().is_some_and(|data| position(&data.name) <= own)
            })
            .count();

        let workspace =
            reactor.layout_engine.create_workspace(name.to_string(), Layout::Horizontal, keep_alive);
        reactor.layout_engine.attach_container(workspace, monitor, index)?;
        info!(name, "workspace activated");
        let snapshot = reactor.snapshot(workspace)?;
        reactor.broadcast(BroadcastEvent::WorkspaceActivated { workspace: snapshot });
        Ok(workspace)
    }

    fn deactivate(reactor: &mut Reactor, name: &str) -> CommandResult {
        let tree = reactor.layout_engine.tree();
        let workspace = tree
            .workspace_by_name(name)
            .ok_or_else(|| CommandError::WorkspaceNotFound(name.to_string()))?;
        if !tree.children(workspace).is_empty() {
            return Err(CommandError::WorkspaceNotEmpty(name.to_string()));
        }
        let monitor = tree.parent(workspace).ok_or(TreeError::AlreadyDetached(workspace))?;
        if tree.children(monitor).len() == 1 {
            return Err(CommandError::LastWorkspace(name.to_string()));
        }
        Self::remove_workspace(reactor, workspace)
    }

    /// Removes `workspace` if it is empty, hidden and not kept alive.
    pub(in crate::actor::reactor) fn deactivate_if_unused(
        reactor: &mut Reactor,
        workspace: ContainerId,
    ) -> CommandResult {
        let tree = reactor.layout_engine.tree();
        if !tree.is_attached(workspace) {
            return Ok(());
        }
        let Some(data) = tree[workspace].kind.as_workspace() else { return Ok(()) };
        if data.keep_alive || !tree.children(workspace).is_empty() || tree.is_displayed(workspace)
        {
            return Ok(());
        }
        Self::remove_workspace(reactor, workspace)
    }

    fn remove_workspace(reactor: &mut Reactor, workspace: ContainerId) -> CommandResult {
        let snapshot = reactor.snapshot(workspace)?;
        reactor.layout_engine.detach_container(workspace)?;
        reactor.layout_engine.remove_container(workspace)?;
        info!(name = snapshot.name.as_deref().unwrap_or_default(), "workspace deactivated");
        reactor.broadcast(BroadcastEvent::WorkspaceDeactivated { workspace: snapshot });
        Ok(())
    }

    fn focus_workspace(reactor: &mut Reactor, name: &str) -> CommandResult {
        let workspace = Self::activate_configured(reactor, name, None)?;
        let target = reactor.layout_engine.tree().last_focused_descendant(workspace);
        reactor.focus_container(target.unwrap_or(workspace))
    }

    /// Sends the focused window to `name`. Focus stays in the source
    /// workspace.
    fn move_window_to_workspace(reactor: &mut Reactor, name: &str) -> CommandResult {
        let window = reactor.window_for(None)?;
        let source = reactor
            .layout_engine
            .tree()
            .workspace_of(window)
            .ok_or(TreeError::AlreadyDetached(window))?;
        let target = Self::activate_configured(reactor, name, None)?;
        if target == source {
            return Ok(());
        }

        let engine = &mut reactor.layout_engine;
        let tree = engine.tree();
        let state = tree[window].kind.window_state().copied();
        let (source_monitor, target_monitor) = (tree.monitor_of(source), tree.monitor_of(target));
        let scale = |m: Option<ContainerId>| {
            m.and_then(|m| tree[m].kind.as_monitor()).map(|data| data.scale_factor)
        };
        let scale_changed = scale(source_monitor) != scale(target_monitor);
        let (parent, index) = match state {
            Some(WindowState::Tiling { .. }) => engine.insertion_target(target),
            _ => (target, tree.children(target).len()),
        };

        engine.move_container_within_tree(window, parent, index, true)?;
        if state == Some(WindowState::Floating) && source_monitor != target_monitor {
            let area = engine.container_rect(target)?;
            let data = engine.window_mut(window)?;
            data.floating_placement = data.floating_placement.centered_in(&area);
        }
        if scale_changed {
            engine.window_mut(window)?.has_pending_dpi_adjustment = true;
        }
        let next = engine.tree().last_focused_descendant(source).unwrap_or(source);
        debug!(?window, name, "moved window to workspace");
        reactor.focus_container(next)
    }

    /// Moves the focused workspace to the monitor in `direction` and shows
    /// it there. A monitor left without workspaces gets a fresh one.
    fn move_workspace_in_direction(reactor: &mut Reactor, direction: Direction) -> CommandResult {
        let workspace = reactor.focused_workspace().ok_or(CommandError::MonitorNotFound)?;
        let tree = reactor.layout_engine.tree();
        let source = tree.monitor_of(workspace).ok_or(TreeError::AlreadyDetached(workspace))?;
        let target = reactor
            .layout_engine
            .monitor_in_direction(source, direction)
            .ok_or(CommandError::MonitorNotFound)?;
        let device = |m: ContainerId| {
            tree[m].kind.as_monitor().map(|data| data.device_name.clone()).unwrap_or_default()
        };
        let (source_device, target_device) = (device(source), device(target));
        let source_index = tree.monitors().iter().position(|&m| m == source).unwrap_or_default();
        let end = tree.children(target).len();

        reactor.layout_engine.move_container_within_tree(workspace, target, end, false)?;
        let previous = reactor.layout_engine.set_displayed_workspace(target, workspace)?;
        reactor.layout_engine.mark_for_redraw(workspace);
        if reactor.layout_engine.tree().children(source).is_empty() {
            let name = Self::free_workspace_name(reactor, source_index);
            Self::activate_workspace(reactor, &name, source)?;
        }
        if let Some(previous) = previous
            && previous != workspace
        {
            Self::deactivate_if_unused(reactor, previous)?;
        }
        let focus = reactor.layout_engine.tree().last_focused_descendant(workspace);
        reactor.focus_container(focus.unwrap_or(workspace))?;

        let snapshot = reactor.snapshot(workspace)?;
        info!(
            name = snapshot.name.as_deref().unwrap_or_default(),
            from = %source_device,
            to = %target_device,
            "workspace moved"
        );
        reactor.broadcast(BroadcastEvent::WorkspaceDetached {
            workspace: snapshot.clone(),
            monitor: source_device,
        });
        reactor.broadcast(BroadcastEvent::WorkspaceAttached {
            workspace: snapshot,
            monitor: target_device,
        });
        Ok(())
    }

    /// The workspace a monitor at `monitor_index` should show when it has
    /// none: the first inactive one bound to it, else the first inactive
    /// unbound one, else the lowest unused number.
    pub(in crate::actor::reactor) fn free_workspace_name(
        reactor: &Reactor,
        monitor_index: usize,
    ) -> String {
        let tree = reactor.layout_engine.tree();
        let configured = &reactor.config.workspaces;
        let inactive = |ws: &&WorkspaceConfig| tree.workspace_by_name(&ws.name).is_none();
        configured
            .iter()
            .filter(inactive)
            .find(|ws| ws.bind_to_monitor == Some(monitor_index))
            .or_else(|| configured.iter().filter(inactive).find(|ws| ws.bind_to_monitor.is_none()))
            .map(|ws| ws.name.clone())
            .or_else(|| {
                (1usize..).map(|i| i.to_string()).find(|name| tree.workspace_by_name(name).is_none())
            })
            .unwrap_or_default()
    }
}
