use std::fs::{self, File};
use std::io::{BufWriter, Write};

use tracing::{debug, info};

use crate::actor::broadcast::BroadcastEvent;
use crate::actor::reactor::{CommandError, CommandResult, Reactor, ReactorCommand, TreeCommand};
use crate::layout_engine::{LayoutCommand, ResizeAmount};
use crate::model::snapshot::CacheNode;
use crate::model::tree::ContainerId;

pub struct CommandEventHandler;

impl CommandEventHandler {
    pub fn handle_command_layout(reactor: &mut Reactor, cmd: LayoutCommand) -> CommandResult {
        info!(?cmd);
        match cmd {
            LayoutCommand::FocusInDirection(direction) => {
                let Some(origin) = reactor.layout_engine.focused() else { return Ok(()) };
                match reactor.layout_engine.focus_target_in_direction(origin, direction)? {
                    Some(target) => reactor.focus_container(target),
                    None => Ok(()),
                }
            }
            LayoutCommand::FocusInCycle(cycle) => {
                let Some(origin) = reactor.layout_engine.focused() else { return Ok(()) };
                match reactor.layout_engine.focus_target_in_cycle(origin, cycle)? {
                    Some(target) => reactor.focus_container(target),
                    None => Ok(()),
                }
            }
            LayoutCommand::ChangeTilingDirection(direction) => {
                let focused = reactor.layout_engine.focused().ok_or(CommandError::NoFocusedWindow)?;
                if reactor.layout_engine.change_tiling_direction(focused, direction)?.is_some() {
                    reactor.broadcast(BroadcastEvent::TilingDirectionChanged { direction });
                }
                Ok(())
            }
            LayoutCommand::ToggleContainerLayout => {
                let focused = reactor.layout_engine.focused().ok_or(CommandError::NoFocusedWindow)?;
                if let Some(container) = reactor.layout_engine.toggle_container_layout(focused)? {
                    Self::broadcast_layout(reactor, container)?;
                }
                Ok(())
            }
            LayoutCommand::ToggleMonocle => {
                let workspace = reactor.focused_workspace().ok_or(CommandError::MonitorNotFound)?;
                let monocle = reactor.layout_engine.toggle_monocle(workspace)?;
                debug!(?workspace, monocle);
                Ok(())
            }
            LayoutCommand::ResizeFocused { dimension, amount } => {
                let amount = Self::resize_amount(reactor, &amount)?;
                let window = reactor.window_for(None)?;
                let changed = reactor.layout_engine.resize_in_dimension(window, dimension, amount)?;
                debug!(?window, changed, "resized");
                Ok(())
            }
        }
    }

    pub fn handle_command_tree(reactor: &mut Reactor, cmd: TreeCommand) -> CommandResult {
        debug!(?cmd);
        let engine = &mut reactor.layout_engine;
        match cmd {
            TreeCommand::AttachContainer { child, parent, index } => {
                engine.attach_container(child, parent, index)?
            }
            TreeCommand::DetachContainer { child } => engine.detach_container(child)?,
            TreeCommand::MoveContainerWithinTree {
                container,
                target_parent,
                target_index,
                adjust_size,
            } => engine.move_container_within_tree(
                container,
                target_parent,
                target_index,
                adjust_size,
            )?,
            TreeCommand::ReplaceContainer { replacement, target_parent, index } => {
                engine.replace_container(replacement, target_parent, index)?
            }
            TreeCommand::ResizeContainer { container, percent_delta } => {
                if !percent_delta.is_finite() {
                    return Err(CommandError::InvalidArgument(format!(
                        "percent_delta must be finite, got {percent_delta}"
                    )));
                }
                engine.resize_container(container, percent_delta)?
            }
            TreeCommand::FlattenSplitContainer { container } => {
                engine.flatten_split_container(container)?
            }
            TreeCommand::SetFocusedDescendant { target, stop_ancestor } => {
                engine.set_focused_descendant(target, stop_ancestor)?
            }
            TreeCommand::ChangeContainerLayout { container, layout } => {
                if let Some(changed) = engine.change_container_layout(container, layout)? {
                    Self::broadcast_layout(reactor, changed)?;
                }
            }
            TreeCommand::RedrawContainers => reactor.redraw_containers()?,
        }
        Ok(())
    }

    pub fn handle_command_reactor(reactor: &mut Reactor, cmd: ReactorCommand) -> CommandResult {
        info!(?cmd);
        match cmd {
            ReactorCommand::Debug => {
                info!("container tree:\n{}", reactor.layout_engine.draw_tree());
            }
            ReactorCommand::SaveRecoveryCache { path } => {
                let path = path.unwrap_or_else(|| reactor.config.recovery_path());
                if let Some(dir) = path.parent()
                    && !dir.as_os_str().is_empty()
                {
                    fs::create_dir_all(dir)?;
                }
                let snapshot = CacheNode::capture_tree(&reactor.layout_engine)?;
                let mut file = BufWriter::new(File::create(&path)?);
                snapshot.write_to(&mut file)?;
                file.flush()?;
                info!(path = %path.display(), "recovery cache saved");
            }
            ReactorCommand::EnableBindingMode { name } => {
                if !reactor.config.has_binding_mode(&name) {
                    return Err(CommandError::UnknownBindingMode(name));
                }
                if !reactor.active_binding_modes.contains(&name) {
                    reactor.active_binding_modes.push(name);
                }
                Self::broadcast_binding_modes(reactor);
            }
            ReactorCommand::DisableBindingMode { name } => {
                if !reactor.config.has_binding_mode(&name) {
                    return Err(CommandError::UnknownBindingMode(name));
                }
                reactor.active_binding_modes.retain(|mode| *mode != name);
                Self::broadcast_binding_modes(reactor);
            }
        }
        Ok(())
    }

    /// `"grow"` and `"shrink"` step by the configured resize step.
    fn resize_amount(reactor: &Reactor, amount: &str) -> CommandResult<ResizeAmount> {
        let invalid = |text: &str| CommandError::InvalidResizeAmount(text.to_string());
        let step = &reactor.config.general.resize_step;
        match amount {
            "grow" => step.parse().map_err(|_| invalid(step)),
            "shrink" => step.parse::<ResizeAmount>().map(ResizeAmount::negated).map_err(|_| invalid(step)),
            _ => amount.parse().map_err(|_| invalid(amount)),
        }
    }

    fn broadcast_layout(reactor: &mut Reactor, container: ContainerId) -> CommandResult {
        let Some(layout) = reactor.layout_engine.tree().kind(container)?.layout() else {
            return Ok(());
        };
        let snapshot = reactor.snapshot(container)?;
        reactor.broadcast(BroadcastEvent::LayoutChanged { container: snapshot, layout });
        Ok(())
    }

    fn broadcast_binding_modes(reactor: &Reactor) {
        reactor.broadcast(BroadcastEvent::BindingModeChanged {
            active: reactor.active_binding_modes.clone(),
        });
    }
}
