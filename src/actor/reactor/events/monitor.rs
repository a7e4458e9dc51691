use tracing::{info, warn};

use crate::actor::broadcast::BroadcastEvent;
use crate::actor::reactor::events::workspace::WorkspaceEventHandler;
use crate::actor::reactor::{CommandResult, MonitorInfo, Reactor};
use crate::model::tree::ContainerId;

pub struct MonitorEventHandler;

impl MonitorEventHandler {
    pub fn handle_monitors_changed(
        reactor: &mut Reactor,
        monitors: Vec<MonitorInfo>,
    ) -> CommandResult {
        if monitors.is_empty() {
            // Happens transiently while displays sleep.
            warn!("no monitors reported; keeping the current tree");
            return Ok(());
        }

        for (index, info) in monitors.iter().enumerate() {
            match Self::monitor_by_device(reactor, &info.device_name) {
                Some(monitor) => reactor.layout_engine.set_monitor_geometry(
                    monitor,
                    info.rect,
                    info.working_rect,
                    info.scale_factor,
                )?,
                None => Self::add_monitor(reactor, index, info)?,
            }
        }

        let tree = reactor.layout_engine.tree();
        let (kept, removed): (Vec<ContainerId>, Vec<ContainerId>) =
            tree.monitors().iter().partition(|&&m| {
                tree[m]
                    .kind
                    .as_monitor()
                    .is_some_and(|data| monitors.iter().any(|i| i.device_name == data.device_name))
            });
        if let Some(&target) = kept.first() {
            for monitor in removed {
                Self::remove_monitor(reactor, monitor, target)?;
            }
        }
        Ok(())
    }

    fn monitor_by_device(reactor: &Reactor, device_name: &str) -> Option<ContainerId> {
        let tree = reactor.layout_engine.tree();
        tree.monitors().iter().copied().find(|&m| {
            tree[m].kind.as_monitor().is_some_and(|data| data.device_name == device_name)
        })
    }

    fn add_monitor(reactor: &mut Reactor, index: usize, info: &MonitorInfo) -> CommandResult {
        let engine = &mut reactor.layout_engine;
        let monitor = engine.create_monitor(
            info.device_name.clone(),
            info.rect,
            info.working_rect,
            info.scale_factor,
        );
        let root = engine.tree().root();
        let end = engine.tree().monitors().len();
        engine.attach_container(monitor, root, end)?;
        info!(device = %info.device_name, rect = ?info.rect, "monitor added");

        let name = WorkspaceEventHandler::free_workspace_name(reactor, index);
        WorkspaceEventHandler::activate_workspace(reactor, &name, monitor)?;
        Ok(())
    }

    /// Moves every workspace of `monitor` onto `target`, then drops it.
    /// Moved workspaces that are empty and not kept alive are deactivated.
    fn remove_monitor(
        reactor: &mut Reactor,
        monitor: ContainerId,
        target: ContainerId,
    ) -> CommandResult {
        let tree = reactor.layout_engine.tree();
        let device = |m: ContainerId| {
            tree[m].kind.as_monitor().map(|data| data.device_name.clone()).unwrap_or_default()
        };
        let (source_device, target_device) = (device(monitor), device(target));
        let workspaces = tree.children(monitor).to_vec();

        for &workspace in &workspaces {
            let end = reactor.layout_engine.tree().children(target).len();
            reactor.layout_engine.move_container_within_tree(workspace, target, end, false)?;
            reactor.layout_engine.mark_for_redraw(workspace);
            let snapshot = reactor.snapshot(workspace)?;
            reactor.broadcast(BroadcastEvent::WorkspaceDetached {
                workspace: snapshot.clone(),
                monitor: source_device.clone(),
            });
            reactor.broadcast(BroadcastEvent::WorkspaceAttached {
                workspace: snapshot,
                monitor: target_device.clone(),
            });
        }
        reactor.layout_engine.detach_container(monitor)?;
        reactor.layout_engine.remove_container(monitor)?;
        info!(device = %source_device, "monitor removed");
        for workspace in workspaces {
            WorkspaceEventHandler::deactivate_if_unused(reactor, workspace)?;
        }

        let tree = reactor.layout_engine.tree();
        if let Some(focused) = reactor.layout_engine.focused()
            && !tree.is_displayed(focused)
            && let Some(shown) = tree.displayed_workspace(target)
        {
            let focus = tree.last_focused_descendant(shown).unwrap_or(shown);
            reactor.focus_container(focus)?;
        }
        Ok(())
    }
}
