use serde::{Deserialize, Serialize};
use tracing::debug;

use super::resize::{container_rect, resizable_length, resize_container};
use super::{CycleDirection, Dimension, Direction, Layout, ResizeAmount};
use crate::common::collections::HashSet;
use crate::common::config::GapSettings;
use crate::model::container::{
    ContainerKind, Monitor, SplitContainer, Window, WindowState, Workspace,
};
use crate::model::tree::{ContainerId, ContainerTree, TreeError, TreeResult};
use crate::sys::geometry::Rect;
use crate::sys::window_system::WindowHandle;

/// Commands that rearrange or navigate the focused part of the tree.
#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LayoutCommand {
    FocusInDirection(Direction),
    FocusInCycle(CycleDirection),
    /// Sets the tiling direction of the focused container's parent.
    ChangeTilingDirection(Layout),
    ToggleContainerLayout,
    ToggleMonocle,
    ResizeFocused {
        dimension: Dimension,
        /// `"+10%"`, `"-5%"` or `"20px"`.
        amount: String,
    },
}

/// The container tree plus everything needed to turn it into geometry.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LayoutEngine {
    pub(crate) tree: ContainerTree,
    #[serde(skip)]
    pending_redraw: Vec<ContainerId>,
    gaps: GapSettings,
}

impl LayoutEngine {
    pub fn new(gaps: GapSettings) -> Self {
        LayoutEngine {
            tree: ContainerTree::new(),
            pending_redraw: Vec::new(),
            gaps,
        }
    }

    pub fn tree(&self) -> &ContainerTree { &self.tree }

    pub fn gaps(&self) -> &GapSettings { &self.gaps }

    pub fn set_gaps(&mut self, gaps: GapSettings) {
        self.gaps = gaps;
        self.mark_for_redraw(self.tree.root());
    }

    pub fn focused(&self) -> Option<ContainerId> { self.tree.focused() }

    pub fn mark_for_redraw(&mut self, id: ContainerId) {
        if !self.pending_redraw.contains(&id) {
            self.pending_redraw.push(id);
        }
    }

    pub fn has_pending_redraw(&self) -> bool { !self.pending_redraw.is_empty() }

    /// Drains the pending set, returning every live window under a marked
    /// container.
    pub fn take_redraw_windows(&mut self) -> Vec<ContainerId> {
        let pending = std::mem::take(&mut self.pending_redraw);
        let mut seen = HashSet::default();
        let mut windows = Vec::new();
        for id in pending {
            if !self.tree.is_attached(id) {
                continue;
            }
            for window in self.tree.windows_under(id) {
                if seen.insert(window) {
                    windows.push(window);
                }
            }
        }
        windows
    }

    pub fn container_rect(&self, id: ContainerId) -> TreeResult<Rect> {
        container_rect(&self.tree, id, &self.gaps)
    }

    pub fn verify_invariants(&self) -> TreeResult<()> { self.tree.verify_invariants() }

    pub fn draw_tree(&self) -> String { self.tree.draw_tree(self.tree.root()) }

    pub fn create_monitor(
        &mut self,
        device_name: String,
        rect: Rect,
        working_rect: Rect,
        scale_factor: f32,
    ) -> ContainerId {
        self.tree.insert(ContainerKind::Monitor(Monitor {
            device_name,
            rect,
            working_rect,
            scale_factor,
            displayed_workspace: None,
        }))
    }

    pub fn create_workspace(&mut self, name: String, layout: Layout, keep_alive: bool) -> ContainerId {
        self.tree.insert(ContainerKind::Workspace(Workspace {
            name,
            layout,
            is_monocle: false,
            keep_alive,
        }))
    }

    pub fn create_split(&mut self, layout: Layout) -> ContainerId {
        self.tree.insert(ContainerKind::Split(SplitContainer { layout, size_percentage: 1.0 }))
    }

    pub fn create_window(
        &mut self,
        handle: WindowHandle,
        state: WindowState,
        floating_placement: Rect,
    ) -> ContainerId {
        self.tree.insert(ContainerKind::Window(Window::new(handle, state, floating_placement)))
    }

    /// Frees a detached container and its subtree.
    pub fn remove_container(&mut self, id: ContainerId) -> TreeResult<ContainerKind> {
        self.tree.remove(id)
    }

    pub(crate) fn window_mut(&mut self, id: ContainerId) -> TreeResult<&mut Window> {
        self.tree
            .kind_mut(id)?
            .as_window_mut()
            .ok_or_else(|| TreeError::Invariant(format!("{id:?} is not a window")))
    }

    pub fn set_monitor_geometry(
        &mut self,
        monitor: ContainerId,
        rect: Rect,
        working_rect: Rect,
        scale_factor: f32,
    ) -> TreeResult<()> {
        let data = self
            .tree
            .kind_mut(monitor)?
            .as_monitor_mut()
            .ok_or_else(|| TreeError::Invariant(format!("{monitor:?} is not a monitor")))?;
        data.rect = rect;
        data.working_rect = working_rect;
        data.scale_factor = scale_factor;
        self.mark_for_redraw(monitor);
        Ok(())
    }

    pub fn set_displayed_workspace(
        &mut self,
        monitor: ContainerId,
        workspace: ContainerId,
    ) -> TreeResult<Option<ContainerId>> {
        if self.tree.parent(workspace) != Some(monitor) {
            return Err(TreeError::InvalidParent { child: workspace, parent: monitor });
        }
        let data = self
            .tree
            .kind_mut(monitor)?
            .as_monitor_mut()
            .ok_or_else(|| TreeError::Invariant(format!("{monitor:?} is not a monitor")))?;
        let previous = data.displayed_workspace.replace(workspace);
        if previous != Some(workspace) {
            if let Some(previous) = previous {
                self.mark_for_redraw(previous);
            }
            self.mark_for_redraw(workspace);
        }
        Ok(previous)
    }

    /// Where a new tiling window in `workspace` goes: right after the
    /// workspace's most recently focused tiling window.
    pub fn insertion_target(&self, workspace: ContainerId) -> (ContainerId, usize) {
        match self.tree.last_focused_descendant_matching(workspace, |_, k| k.is_resizable()) {
            Some(leaf) => match (self.tree.parent(leaf), self.tree.index_of(leaf)) {
                (Some(parent), Some(index)) => (parent, index + 1),
                _ => (workspace, self.tree.children(workspace).len()),
            },
            None => (workspace, self.tree.children(workspace).len()),
        }
    }

    /// Sets the layout of `container`, or of the parent of a window. Returns
    /// the container whose layout changed.
    pub fn change_container_layout(
        &mut self,
        container: ContainerId,
        layout: Layout,
    ) -> TreeResult<Option<ContainerId>> {
        let target = if self.tree.kind(container)?.layout().is_some() {
            container
        } else {
            match self.tree.parent(container) {
                Some(parent) if self.tree[parent].kind.layout().is_some() => parent,
                _ => return Ok(None),
            }
        };
        if self.tree[target].kind.layout() == Some(layout) {
            return Ok(None);
        }
        self.tree.kind_mut(target)?.set_layout(layout);
        debug!(?target, %layout, "layout changed");
        self.mark_for_redraw(target);
        Ok(Some(target))
    }

    pub fn toggle_container_layout(
        &mut self,
        container: ContainerId,
    ) -> TreeResult<Option<ContainerId>> {
        let current = match self.tree.kind(container)?.layout() {
            Some(layout) => layout,
            None => match self.tree.parent(container).and_then(|p| self.tree[p].kind.layout()) {
                Some(layout) => layout,
                None => return Ok(None),
            },
        };
        self.change_container_layout(container, current.toggled())
    }

    /// Changes the direction new windows next to `focused` are tiled in.
    ///
    /// A workspace or split changes its own layout, and so does the parent of
    /// a window with at most one tiling sibling. Otherwise the window and its
    /// neighbour are wrapped in a new split with the requested layout.
    pub fn change_tiling_direction(
        &mut self,
        focused: ContainerId,
        layout: Layout,
    ) -> TreeResult<Option<ContainerId>> {
        let kind = self.tree.kind(focused)?;
        if kind.layout().is_some() {
            return self.change_container_layout(focused, layout);
        }
        if !kind.is_tiling_window() {
            return Ok(None);
        }
        let parent = self.tree.parent(focused).ok_or(TreeError::AlreadyDetached(focused))?;
        if self.tree[parent].kind.layout() == Some(layout) {
            return Ok(None);
        }
        if self.tree.resizable_siblings(focused).len() <= 1 {
            return self.change_container_layout(parent, layout);
        }

        let partner = self
            .tree
            .next_sibling_matching(focused, ContainerKind::is_resizable)
            .or_else(|| self.tree.prev_sibling_matching(focused, ContainerKind::is_resizable))
            .ok_or(TreeError::NotResizable(focused))?;
        let focused_index = self.tree.index_of(focused).unwrap_or_default();
        let partner_index = self.tree.index_of(partner).unwrap_or_default();
        let (first, second) =
            if focused_index < partner_index { (focused, partner) } else { (partner, focused) };
        let second_share = self.tree[second].kind.size_percentage().unwrap_or_default();

        let split = self.create_split(layout);
        let first_index = focused_index.min(partner_index);
        self.replace_container(split, parent, first_index)?;
        self.attach_container(first, split, 0)?;
        // The pair's combined share moves into the split.
        self.tree.unlink(second)?;
        let split_share = self.tree[split].kind.size_percentage().unwrap_or_default();
        self.tree.kind_mut(split)?.set_size_percentage(split_share + second_share);
        self.attach_container(second, split, 1)?;
        self.set_focused_descendant(focused, None)?;
        debug!(?split, %layout, "wrapped in split");
        self.mark_for_redraw(parent);
        Ok(Some(split))
    }

    pub fn toggle_monocle(&mut self, workspace: ContainerId) -> TreeResult<bool> {
        let ws = self
            .tree
            .kind_mut(workspace)?
            .as_workspace_mut()
            .ok_or_else(|| TreeError::Invariant(format!("{workspace:?} is not a workspace")))?;
        ws.is_monocle = !ws.is_monocle;
        let monocle = ws.is_monocle;
        self.mark_for_redraw(workspace);
        Ok(monocle)
    }

    /// Resizes `container` along `dimension`. Tiling containers trade space
    /// with the nearest siblings laid out along that axis; floating windows
    /// change their placement. Returns whether anything changed.
    pub fn resize_in_dimension(
        &mut self,
        container: ContainerId,
        dimension: Dimension,
        amount: ResizeAmount,
    ) -> TreeResult<bool> {
        let axis = dimension.layout();
        if self.tree.kind(container)?.is_floating_window() {
            return self.resize_floating(container, dimension, amount);
        }
        let target = self.tree.self_and_ancestors(container).find(|&c| {
            self.tree[c].kind.is_resizable()
                && self.tree.parent(c).and_then(|p| self.tree[p].kind.layout()) == Some(axis)
                && !self.tree.resizable_siblings(c).is_empty()
        });
        let Some(target) = target else { return Ok(false) };
        let parent = self.tree.parent(target).ok_or(TreeError::AlreadyDetached(target))?;
        let length = resizable_length(&self.tree, parent, axis, &self.gaps)?;
        resize_container(&mut self.tree, target, amount.as_fraction(length))?;
        self.mark_for_redraw(parent);
        Ok(true)
    }

    fn resize_floating(
        &mut self,
        window: ContainerId,
        dimension: Dimension,
        amount: ResizeAmount,
    ) -> TreeResult<bool> {
        let monitor = self.tree.monitor_of(window).ok_or(TreeError::AlreadyDetached(window))?;
        let working =
            self.tree[monitor].kind.as_monitor().map(|m| m.working_rect).unwrap_or_default();
        let data = self.window_mut(window)?;
        let placement = &mut data.floating_placement;
        let (length, full) = match dimension {
            Dimension::Width => (&mut placement.width, working.width),
            Dimension::Height => (&mut placement.height, working.height),
        };
        let delta = (amount.as_fraction(full) * f64::from(full)).round() as i32;
        let resized = (*length + delta).max(1);
        let changed = resized != *length;
        *length = resized;
        self.mark_for_redraw(window);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout_engine::tests::{Harness, sizes};
    use crate::sys::geometry::SameAs;

    #[test]
    fn insertion_target_follows_focus() {
        let mut h = Harness::new();
        assert_eq!((h.workspace, 0), h.engine.insertion_target(h.workspace));
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let _c = h.tiling(split);
        h.engine.set_focused_descendant(b, None).unwrap();
        assert_eq!((split, 1), h.engine.insertion_target(h.workspace));
        h.engine.set_focused_descendant(a, None).unwrap();
        assert_eq!((h.workspace, 1), h.engine.insertion_target(h.workspace));
    }

    #[test]
    fn change_tiling_direction_on_pair_rotates_parent() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let _b = h.tiling(h.workspace);
        assert_eq!(Ok(Some(h.workspace)), h.engine.change_tiling_direction(a, Layout::Vertical));
        assert_eq!(Some(Layout::Vertical), h.engine.tree()[h.workspace].kind.layout());
        assert_eq!(Ok(None), h.engine.change_tiling_direction(a, Layout::Vertical));
    }

    #[test]
    fn change_tiling_direction_wraps_with_neighbour() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        h.set_size(a, 0.5);
        h.set_size(b, 0.25);
        h.set_size(c, 0.25);
        let split = h.engine.change_tiling_direction(b, Layout::Vertical).unwrap().unwrap();
        assert_eq!(&[a, split], h.engine.tree().children(h.workspace));
        assert_eq!(&[b, c], h.engine.tree().children(split));
        assert!(h.engine.tree()[split].kind.size_percentage().unwrap().same_as(0.5));
        assert!(h.engine.tree()[a].kind.size_percentage().unwrap().same_as(0.5));
        assert_eq!(Some(b), h.engine.focused());
        h.verify();
    }

    #[test]
    fn toggle_layout_targets_parent_of_window() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        assert_eq!(Ok(Some(h.workspace)), h.engine.toggle_container_layout(a));
        assert_eq!(Some(Layout::Vertical), h.engine.tree()[h.workspace].kind.layout());
    }

    #[test]
    fn resize_in_dimension_finds_matching_ancestor() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let _c = h.tiling(split);
        // Width of b is governed by the split, a horizontal sibling of a.
        assert!(h.engine.resize_in_dimension(b, Dimension::Width, ResizeAmount::Percent(0.1)).unwrap());
        let s = sizes(&h, &[a, split]);
        assert!(s[1].same_as(0.6));
        assert!(s[0].same_as(0.4));
        // The workspace is 1000px wide: 100px is another 10%.
        assert!(h.engine.resize_in_dimension(b, Dimension::Width, ResizeAmount::Pixels(100)).unwrap());
        assert!(sizes(&h, &[split])[0].same_as(0.7));
        h.verify();
    }

    #[test]
    fn resize_alone_is_noop() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        assert_eq!(Ok(false), h.engine.resize_in_dimension(a, Dimension::Height, ResizeAmount::Percent(0.1)));
    }

    #[test]
    fn resize_floating_changes_placement() {
        let mut h = Harness::new();
        let w = h.window(WindowState::Floating);
        h.engine.attach_container(w, h.workspace, 0).unwrap();
        h.engine.window_mut(w).unwrap().floating_placement = Rect::new(10, 10, 200, 100);
        assert_eq!(Ok(true), h.engine.resize_in_dimension(w, Dimension::Width, ResizeAmount::Pixels(50)));
        assert_eq!(250, h.engine.container_rect(w).unwrap().width);
    }

    #[test]
    fn toggle_monocle_flips_flag() {
        let mut h = Harness::new();
        assert_eq!(Ok(true), h.engine.toggle_monocle(h.workspace));
        assert_eq!(Ok(false), h.engine.toggle_monocle(h.workspace));
        assert!(h.engine.toggle_monocle(h.monitor).is_err());
    }

    #[test]
    fn redraw_collects_windows_once() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        h.engine.take_redraw_windows();
        h.engine.mark_for_redraw(h.workspace);
        h.engine.mark_for_redraw(b);
        assert_eq!(vec![a, b, c], h.engine.take_redraw_windows());
        assert!(!h.engine.has_pending_redraw());
    }
}
