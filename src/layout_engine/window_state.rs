//! Transitions between tiling, floating, minimized, maximized and fullscreen.
//!
//! The window keeps its id through every transition. Only moves into or out
//! of tiling change where the window sits in the tree.

use tracing::debug;

use super::LayoutEngine;
use crate::model::container::{MinimizedFrom, RestoreState, WindowState};
use crate::model::tree::{ContainerId, TreeError, TreeResult};

impl LayoutEngine {
    fn window_state_of(&self, window: ContainerId) -> TreeResult<WindowState> {
        self.tree
            .kind(window)?
            .window_state()
            .copied()
            .ok_or_else(|| TreeError::Invariant(format!("{window:?} is not a window")))
    }

    fn workspace_for(&self, window: ContainerId) -> TreeResult<ContainerId> {
        self.tree.workspace_of(window).ok_or(TreeError::AlreadyDetached(window))
    }

    fn end_of(&self, workspace: ContainerId) -> usize { self.tree.children(workspace).len() }

    /// Returns whether the state changed.
    pub fn set_floating(&mut self, window: ContainerId) -> TreeResult<bool> {
        let state = self.window_state_of(window)?;
        if state == WindowState::Floating {
            return Ok(false);
        }
        let workspace = self.workspace_for(window)?;
        let was_focused = self.focused() == Some(window);

        if let WindowState::Tiling { .. } = state {
            let area = self.container_rect(workspace)?;
            self.detach_container(window)?;
            let data = self.window_mut(window)?;
            data.state = WindowState::Floating;
            data.floating_placement = data.floating_placement.centered_in(&area);
            let end = self.end_of(workspace);
            self.attach_container(window, workspace, end)?;
        } else {
            self.replace_window_state(window, WindowState::Floating)?;
            if self.tree.parent(window) != Some(workspace) {
                let end = self.end_of(workspace);
                self.move_container_within_tree(window, workspace, end, true)?;
            }
        }

        if was_focused {
            self.set_focused_descendant(window, None)?;
        }
        debug!(?window, from = %state.kind(), "now floating");
        self.mark_for_redraw(workspace);
        Ok(true)
    }

    pub fn set_tiling(&mut self, window: ContainerId) -> TreeResult<bool> {
        let state = self.window_state_of(window)?;
        if let WindowState::Tiling { .. } = state {
            return Ok(false);
        }
        let workspace = self.workspace_for(window)?;
        let was_focused = self.focused() == Some(window);
        self.reinsert_as_tiling(window, workspace)?;
        if was_focused {
            self.set_focused_descendant(window, None)?;
        }
        debug!(?window, from = %state.kind(), "now tiling");
        self.mark_for_redraw(workspace);
        Ok(true)
    }

    pub fn toggle_floating(&mut self, window: ContainerId) -> TreeResult<bool> {
        match self.window_state_of(window)? {
            WindowState::Floating => self.set_tiling(window),
            _ => self.set_floating(window),
        }
    }

    /// Minimizes `window` in place. When it held focus, focus passes to the
    /// most recently focused window of the workspace that is not minimized.
    pub fn set_minimized(&mut self, window: ContainerId) -> TreeResult<bool> {
        let state = self.window_state_of(window)?;
        if let WindowState::Minimized { .. } = state {
            return Ok(false);
        }
        let workspace = self.workspace_for(window)?;
        let parent = self.tree.parent(window).ok_or(TreeError::AlreadyDetached(window))?;
        let was_focused = self.focused() == Some(window);

        let previous = state.minimized_from();
        self.replace_window_state(window, WindowState::Minimized { previous })?;

        if was_focused
            && let Some(next) = self.tree.last_focused_descendant_matching(workspace, |id, kind| {
                id != window
                    && kind.window_state().is_none_or(|s| !matches!(s, WindowState::Minimized { .. }))
            })
        {
            self.set_focused_descendant(next, None)?;
        }
        debug!(?window, "minimized");
        self.mark_for_redraw(parent);
        Ok(true)
    }

    pub fn set_maximized(&mut self, window: ContainerId) -> TreeResult<bool> {
        let state = self.window_state_of(window)?;
        if let WindowState::Maximized { .. } = state {
            return Ok(false);
        }
        self.replace_window_state(window, WindowState::Maximized { previous: state.restore_target() })?;
        self.mark_for_redraw(self.workspace_for(window)?);
        Ok(true)
    }

    pub fn set_fullscreen(&mut self, window: ContainerId) -> TreeResult<bool> {
        let state = self.window_state_of(window)?;
        if let WindowState::Fullscreen { .. } = state {
            return Ok(false);
        }
        self.replace_window_state(window, WindowState::Fullscreen { previous: state.restore_target() })?;
        self.mark_for_redraw(self.workspace_for(window)?);
        Ok(true)
    }

    /// Rebuilds the state a minimized, maximized or fullscreen window came
    /// from. A window coming back from minimized is reinserted and focused.
    pub fn restore(&mut self, window: ContainerId) -> TreeResult<bool> {
        let state = self.window_state_of(window)?;
        let workspace = self.workspace_for(window)?;
        match state {
            WindowState::Tiling { .. } | WindowState::Floating => return Ok(false),
            WindowState::Minimized { previous } => {
                match previous {
                    MinimizedFrom::Tiling => self.reinsert_as_tiling(window, workspace)?,
                    MinimizedFrom::Floating => {
                        self.detach_container(window)?;
                        self.window_mut(window)?.state = WindowState::Floating;
                        let end = self.end_of(workspace);
                        self.attach_container(window, workspace, end)?;
                    }
                    MinimizedFrom::Maximized { previous } => {
                        self.replace_window_state(window, WindowState::Maximized { previous })?;
                    }
                    MinimizedFrom::Fullscreen { previous } => {
                        self.replace_window_state(window, WindowState::Fullscreen { previous })?;
                    }
                }
                self.set_focused_descendant(window, None)?;
            }
            WindowState::Maximized { previous } | WindowState::Fullscreen { previous } => {
                let restored = match previous {
                    RestoreState::Tiling => WindowState::Tiling { size_percentage: 0.0 },
                    RestoreState::Floating => WindowState::Floating,
                };
                self.replace_window_state(window, restored)?;
            }
        }
        debug!(?window, from = %state.kind(), "restored");
        self.mark_for_redraw(workspace);
        Ok(true)
    }

    fn reinsert_as_tiling(&mut self, window: ContainerId, workspace: ContainerId) -> TreeResult<()> {
        self.detach_container(window)?;
        self.window_mut(window)?.state = WindowState::Tiling { size_percentage: 0.0 };
        let (parent, index) = self.insertion_target(workspace);
        self.attach_container(window, parent, index)
    }
}
