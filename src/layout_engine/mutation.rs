//! Structural edits of the container tree.
//!
//! Every operation checks its preconditions before the first write, so a
//! failing call leaves the tree untouched.

use tracing::trace;

use super::LayoutEngine;
use super::resize::{distribute_evenly, normalize_sizes, resize_container, resize_to};
use crate::model::container::{ContainerKind, WindowState};
use crate::model::tree::{ContainerId, TreeError, TreeResult};

impl LayoutEngine {
    /// Inserts the detached `child` under `parent` at `index`.
    ///
    /// A resizable child takes an even share of the parent, which its
    /// resizable siblings give up.
    pub fn attach_container(
        &mut self,
        child: ContainerId,
        parent: ContainerId,
        index: usize,
    ) -> TreeResult<()> {
        self.tree.check_can_link(child, parent)?;
        let len = self.tree.children(parent).len();
        if index > len {
            return Err(TreeError::IndexOutOfBounds { parent, index, len });
        }
        let resizable = self.tree.kind(child)?.is_resizable();
        if resizable {
            self.tree.kind_mut(child)?.set_size_percentage(0.0);
        }
        self.tree.link(child, parent, index)?;
        if resizable {
            self.settle_new_share(child)?;
        }

        if let Some(monitor) = self.tree.kind_mut(parent)?.as_monitor_mut()
            && monitor.displayed_workspace.is_none()
        {
            monitor.displayed_workspace = Some(child);
        }
        trace!(?child, ?parent, index, "attached");
        self.mark_for_redraw(parent);
        Ok(())
    }

    /// Attaches `child` and then sizes it towards `share` of its parent.
    ///
    /// The share is clamped so the child can never exceed the whole parent.
    pub fn attach_and_resize_container(
        &mut self,
        child: ContainerId,
        parent: ContainerId,
        index: usize,
        share: f64,
    ) -> TreeResult<()> {
        self.attach_container(child, parent, index)?;
        if self.tree.kind(child)?.is_resizable() && !self.tree.resizable_siblings(child).is_empty()
        {
            resize_to(&mut self.tree, child, share)?;
        }
        Ok(())
    }

    /// Removes `child` from the tree, leaving it in the arena.
    ///
    /// The freed share goes to the remaining resizable siblings in equal
    /// parts. A split left empty is detached and freed in turn, and a split
    /// left with a single child is flattened into its parent.
    pub fn detach_container(&mut self, child: ContainerId) -> TreeResult<()> {
        let parent = self.detach_raw(child)?;
        self.tidy_after_detach(parent)
    }

    /// Equal-share crediting already covers the cascade case: an emptied split
    /// hands its own share to its siblings when it is detached.
    pub fn detach_and_resize_container(&mut self, child: ContainerId) -> TreeResult<()> {
        self.detach_container(child)
    }

    /// Puts the detached `replacement` in place of the child of
    /// `target_parent` at `index`. The old child is left detached.
    pub fn replace_container(
        &mut self,
        replacement: ContainerId,
        target_parent: ContainerId,
        index: usize,
    ) -> TreeResult<()> {
        let len = self.tree.get(target_parent)?.children().len();
        let old = *self
            .tree
            .children(target_parent)
            .get(index)
            .ok_or(TreeError::IndexOutOfBounds { parent: target_parent, index, len })?;
        let old_size = self.tree.kind(old)?.size_percentage();
        self.tree.swap_child(target_parent, index, replacement)?;
        self.settle_replaced_share(replacement, old_size)?;

        if let Some(monitor) = self.tree.kind_mut(target_parent)?.as_monitor_mut()
            && monitor.displayed_workspace == Some(old)
        {
            monitor.displayed_workspace = Some(replacement);
        }
        trace!(?old, ?replacement, ?target_parent, "replaced");
        self.mark_for_redraw(target_parent);
        Ok(())
    }

    /// Changes the state of `window` without moving it. Sizes of its
    /// siblings are settled the way [`Self::replace_container`] settles them.
    pub(crate) fn replace_window_state(
        &mut self,
        window: ContainerId,
        state: WindowState,
    ) -> TreeResult<()> {
        let kind = self.tree.kind(window)?;
        let old_size = kind.size_percentage();
        if !kind.is_window() {
            return Err(TreeError::Invariant(format!("{window:?} is not a window")));
        }
        if let Some(data) = self.tree.kind_mut(window)?.as_window_mut() {
            data.state = state;
        }
        if self.tree.parent(window).is_some() {
            self.settle_replaced_share(window, old_size)?;
        }
        Ok(())
    }

    /// Moves an attached `container` to `target_parent` at `target_index`.
    ///
    /// With `adjust_size` the container takes an even share at its
    /// destination; otherwise it keeps its previous share where possible.
    pub fn move_container_within_tree(
        &mut self,
        container: ContainerId,
        target_parent: ContainerId,
        target_index: usize,
        adjust_size: bool,
    ) -> TreeResult<()> {
        let current_parent =
            self.tree.get(container)?.parent().ok_or(TreeError::AlreadyDetached(container))?;
        let target_kind = &self.tree.get(target_parent)?.kind;
        if !self.tree[container].kind.can_be_child_of(target_kind)
            || self.tree.self_and_ancestors(target_parent).any(|a| a == container)
        {
            return Err(TreeError::InvalidParent { child: container, parent: target_parent });
        }
        if !self.tree.is_attached(target_parent) {
            return Err(TreeError::AlreadyDetached(target_parent));
        }

        let len = self.tree.children(target_parent).len();
        if current_parent == target_parent {
            if target_index > len {
                return Err(TreeError::IndexOutOfBounds { parent: target_parent, index: target_index, len });
            }
            let current_index = self.tree.index_of(container).unwrap_or_default();
            let index = if target_index > current_index { target_index - 1 } else { target_index };
            self.tree.shift_child(container, index)?;
            self.mark_for_redraw(target_parent);
            return Ok(());
        }
        if target_index > len {
            return Err(TreeError::IndexOutOfBounds { parent: target_parent, index: target_index, len });
        }

        let lca = self.tree.lowest_common_ancestor(container, target_parent)?;
        let previous_share = self.tree[container].kind.size_percentage();
        let source_ancestor =
            self.tree.child_towards(lca, container).ok_or(TreeError::Disconnected(container, lca))?;
        let source_focus = self.tree.focus_index(source_ancestor).unwrap_or_default();

        if target_parent == lca {
            let old_parent = self.detach_raw(container)?;
            self.reattach(container, target_parent, target_index, adjust_size, previous_share)?;
            self.tree.shift_focus(container, source_focus)?;
            self.tidy_after_detach(old_parent)?;
        } else {
            let target_ancestor = self
                .tree
                .child_towards(lca, target_parent)
                .ok_or(TreeError::Disconnected(target_parent, lca))?;
            let target_focus = self.tree.focus_index(target_ancestor).unwrap_or_default();
            let inherits_focus = source_focus < target_focus;

            let old_parent = self.detach_raw(container)?;
            self.reattach(container, target_parent, target_index, adjust_size, previous_share)?;
            if inherits_focus {
                self.set_focused_descendant(container, Some(target_ancestor))?;
                self.tree.shift_focus(target_ancestor, source_focus)?;
            }
            self.tidy_after_detach(old_parent)?;
        }
        trace!(?container, ?target_parent, target_index, "moved");
        Ok(())
    }

    /// Grows `container` by `delta` of its parent, taken from its resizable
    /// siblings.
    pub fn resize_container(&mut self, container: ContainerId, delta: f64) -> TreeResult<()> {
        resize_container(&mut self.tree, container, delta)?;
        if let Some(parent) = self.tree.parent(container) {
            self.mark_for_redraw(parent);
        }
        Ok(())
    }

    /// Replaces a split container with its children, scaled by the split's
    /// own share. The children keep their relative focus order and take the
    /// split's focus slot.
    pub fn flatten_split_container(&mut self, split: ContainerId) -> TreeResult<()> {
        let ContainerKind::Split(data) = self.tree.kind(split)? else {
            return Err(TreeError::Invariant(format!("{split:?} is not a split container")));
        };
        let (layout, share) = (data.layout, data.size_percentage);
        let parent = self.tree.parent(split).ok_or(TreeError::AlreadyDetached(split))?;
        let index = self.tree.index_of(split).unwrap_or_default();
        let focus_index = self.tree.focus_index(split).unwrap_or_default();
        let children = self.tree.children(split).to_vec();
        let child_focus = self.tree.child_focus_order(split).to_vec();
        let only_child = self.tree.children(parent).len() == 1;

        self.tree.unlink(split)?;
        for (offset, &child) in children.iter().enumerate() {
            self.tree.unlink(child)?;
            let kind = self.tree.kind_mut(child)?;
            if let Some(size) = kind.size_percentage() {
                kind.set_size_percentage(size * share);
            }
            self.tree.link(child, parent, index + offset)?;
        }

        let mut order: Vec<_> = self
            .tree
            .child_focus_order(parent)
            .iter()
            .copied()
            .filter(|c| !children.contains(c))
            .collect();
        let at = focus_index.min(order.len());
        order.splice(at..at, child_focus);
        self.tree.set_focus_order(parent, order)?;

        if only_child {
            self.tree.kind_mut(parent)?.set_layout(layout);
        }
        self.tree.remove(split)?;
        normalize_sizes(&mut self.tree, parent)?;
        trace!(?split, ?parent, "flattened");
        self.mark_for_redraw(parent);
        Ok(())
    }

    fn reattach(
        &mut self,
        container: ContainerId,
        parent: ContainerId,
        index: usize,
        adjust_size: bool,
        previous_share: Option<f64>,
    ) -> TreeResult<()> {
        match previous_share {
            Some(share) if !adjust_size => {
                self.attach_and_resize_container(container, parent, index, share)
            }
            _ => self.attach_container(container, parent, index),
        }
    }

    /// Unlinks `child` and credits its share to its siblings. Returns the
    /// former parent, which may now need tidying.
    fn detach_raw(&mut self, child: ContainerId) -> TreeResult<ContainerId> {
        let parent = self.tree.get(child)?.parent().ok_or(TreeError::AlreadyDetached(child))?;
        let freed = self.tree[child].kind.size_percentage();
        self.tree.unlink(child)?;
        if let Some(freed) = freed {
            distribute_evenly(&mut self.tree, parent, freed)?;
        }

        let next = self.tree.child_focus_order(parent).first().copied();
        if let Some(monitor) = self.tree.kind_mut(parent)?.as_monitor_mut()
            && monitor.displayed_workspace == Some(child)
        {
            monitor.displayed_workspace = next;
        }
        trace!(?child, ?parent, "detached");
        self.mark_for_redraw(parent);
        Ok(parent)
    }

    fn tidy_after_detach(&mut self, parent: ContainerId) -> TreeResult<()> {
        let Ok(node) = self.tree.get(parent) else { return Ok(()) };
        if node.kind.is_split()
            && let Some(grandparent) = node.parent()
        {
            match node.children().len() {
                0 => {
                    self.detach_raw(parent)?;
                    self.tree.remove(parent)?;
                    return self.tidy_after_detach(grandparent);
                }
                1 => {
                    self.flatten_split_container(parent)?;
                    return self.collapse_single_split_child(grandparent);
                }
                _ => {}
            }
        }
        self.collapse_single_split_child(parent)
    }

    /// Flattens the only child of `parent` if it is a split container.
    fn collapse_single_split_child(&mut self, parent: ContainerId) -> TreeResult<()> {
        let children = self.tree.children(parent);
        if children.len() == 1 && self.tree[children[0]].kind.is_split() {
            let only = children[0];
            self.flatten_split_container(only)?;
        }
        Ok(())
    }

    /// Sizes a freshly linked resizable child to an even share.
    fn settle_new_share(&mut self, child: ContainerId) -> TreeResult<()> {
        let siblings = self.tree.resizable_siblings(child).len();
        if siblings == 0 {
            self.tree.kind_mut(child)?.set_size_percentage(1.0);
            Ok(())
        } else {
            self.tree.kind_mut(child)?.set_size_percentage(0.0);
            resize_container(&mut self.tree, child, 1.0 / (siblings + 1) as f64)
        }
    }

    fn settle_replaced_share(
        &mut self,
        replacement: ContainerId,
        old_size: Option<f64>,
    ) -> TreeResult<()> {
        let parent = self.tree.parent(replacement).ok_or(TreeError::AlreadyDetached(replacement))?;
        let resizable = self.tree.kind(replacement)?.is_resizable();
        match (old_size, resizable) {
            (Some(size), true) => {
                self.tree.kind_mut(replacement)?.set_size_percentage(size);
                Ok(())
            }
            (Some(size), false) => distribute_evenly(&mut self.tree, parent, size),
            (None, true) => self.settle_new_share(replacement),
            (None, false) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout_engine::Layout;
    use crate::layout_engine::tests::{Harness, sizes};
    use crate::sys::geometry::SameAs;

    #[test]
    fn attach_gives_even_share() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        assert_eq!(vec![1.0], sizes(&h, &[a]));
        let b = h.tiling(h.workspace);
        let c = h.tiling(h.workspace);
        for size in sizes(&h, &[a, b, c]) {
            assert!(size.same_as(1.0 / 3.0));
        }
        h.verify();
    }

    #[test]
    fn attach_rejects_attached_child() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        assert_eq!(Err(TreeError::AlreadyAttached(a)), h.engine.attach_container(a, h.workspace, 0));
        h.verify();
    }

    #[test]
    fn attach_and_resize_never_overshoots() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let b = h.window(WindowState::Tiling { size_percentage: 1.0 });
        h.engine.attach_and_resize_container(b, h.workspace, 1, 1.0).unwrap();
        let s = sizes(&h, &[a, b]);
        assert!(s[1] <= 1.0);
        assert!((s[0] + s[1]).same_as(1.0));
        h.verify();
    }

    #[test]
    fn detach_credits_siblings_evenly() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        h.engine.detach_container(b).unwrap();
        assert_eq!(&[a, c], h.engine.tree().children(h.workspace));
        for size in sizes(&h, &[a, c]) {
            assert!(size.same_as(0.5));
        }
        assert_eq!(Err(TreeError::AlreadyDetached(b)), h.engine.detach_container(b));
        h.verify();
    }

    #[test]
    fn detaching_last_split_child_flattens_and_adopts_layout() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let c = h.tiling(split);
        h.engine.detach_container(a).unwrap();
        // The workspace is left with only the split, which collapses.
        assert!(!h.engine.tree().contains(split));
        assert_eq!(&[b, c], h.engine.tree().children(h.workspace));
        assert_eq!(Some(Layout::Vertical), h.engine.tree()[h.workspace].kind.layout());
        h.verify();
    }

    #[test]
    fn emptied_split_cascades() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let outer = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(outer);
        let inner = h.split(outer, Layout::Horizontal);
        let c = h.tiling(inner);
        let d = h.tiling(inner);
        h.engine.detach_container(c).unwrap();
        // inner collapsed into outer.
        assert!(!h.engine.tree().contains(inner));
        assert_eq!(&[b, d], h.engine.tree().children(outer));
        h.engine.detach_container(d).unwrap();
        // outer left with one child, flattened into the workspace.
        assert!(!h.engine.tree().contains(outer));
        assert_eq!(&[a, b], h.engine.tree().children(h.workspace));
        h.verify();
    }

    #[test]
    fn replace_copies_share() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        h.set_size(a, 0.5);
        h.set_size(b, 0.25);
        h.set_size(c, 0.25);
        let replacement = h.engine.create_split(Layout::Vertical);
        h.engine.replace_container(replacement, h.workspace, 0).unwrap();
        assert_eq!(Some(0.5), h.engine.tree()[replacement].kind.size_percentage());
        assert_eq!(None, h.engine.tree().parent(a));
        assert_eq!(Some(0), h.engine.tree().focus_index(replacement));
        let d = h.tiling(replacement);
        let e = h.tiling(replacement);
        assert_eq!(&[d, e], h.engine.tree().children(replacement));
        h.verify();
    }

    #[test]
    fn replace_with_non_resizable_frees_share() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        let floating = h.window(WindowState::Floating);
        h.engine.replace_container(floating, h.workspace, 1).unwrap();
        assert_eq!(&[a, floating, c], h.engine.tree().children(h.workspace));
        assert_eq!(None, h.engine.tree().parent(b));
        for size in sizes(&h, &[a, c]) {
            assert!(size.same_as(0.5));
        }
        h.verify();
    }

    #[test]
    fn replace_rejects_attached_replacement() {
        let mut h = Harness::new();
        let [a, b, _] = h.tilings_in(h.workspace);
        assert_eq!(
            Err(TreeError::AlreadyAttached(b)),
            h.engine.replace_container(b, h.workspace, 0)
        );
        assert_eq!(Some(h.workspace), h.engine.tree().parent(a));
    }

    #[test]
    fn move_within_parent_keeps_focus_order() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        let focus_before = h.engine.tree().child_focus_order(h.workspace).to_vec();
        h.engine.move_container_within_tree(a, h.workspace, 3, true).unwrap();
        assert_eq!(&[b, c, a], h.engine.tree().children(h.workspace));
        assert_eq!(focus_before, h.engine.tree().child_focus_order(h.workspace));
        h.engine.move_container_within_tree(a, h.workspace, 0, true).unwrap();
        assert_eq!(&[a, b, c], h.engine.tree().children(h.workspace));
    }

    #[test]
    fn move_to_ancestor_takes_focus_slot() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let c = h.tiling(split);
        let d = h.tiling(split);
        h.engine.set_focused_descendant(c, None).unwrap();
        // Focus order of the workspace is [split, a].
        h.engine.move_container_within_tree(c, h.workspace, 0, true).unwrap();
        assert_eq!(&[c, a, split], h.engine.tree().children(h.workspace));
        assert_eq!(&[c, split, a], h.engine.tree().child_focus_order(h.workspace));
        assert_eq!(&[b, d], h.engine.tree().children(split));
        assert_eq!(Some(c), h.engine.focused());
        h.verify();
    }

    #[test]
    fn move_into_sibling_subtree_inherits_focus() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let c = h.tiling(split);
        h.engine.set_focused_descendant(b, None).unwrap();
        h.engine.set_focused_descendant(a, None).unwrap();
        // a is focused; workspace focus order is [a, split].
        h.engine.move_container_within_tree(a, split, 2, true).unwrap();
        // The workspace is left holding only the split, which collapses.
        assert!(!h.engine.tree().contains(split));
        assert_eq!(&[b, c, a], h.engine.tree().children(h.workspace));
        assert_eq!(Some(a), h.engine.focused());
        h.verify();
    }

    #[test]
    fn move_between_splits_keeps_share_without_adjust() {
        let mut h = Harness::new();
        let left = h.split(h.workspace, Layout::Vertical);
        let l1 = h.tiling(left);
        let l2 = h.tiling(left);
        let l3 = h.tiling(left);
        let right = h.split(h.workspace, Layout::Vertical);
        let r1 = h.tiling(right);
        let r2 = h.tiling(right);
        h.set_size(l1, 0.2);
        h.set_size(l2, 0.4);
        h.set_size(l3, 0.4);
        h.engine.move_container_within_tree(l1, right, 0, false).unwrap();
        assert_eq!(&[l1, r1, r2], h.engine.tree().children(right));
        assert!(h.engine.tree()[l1].kind.size_percentage().unwrap().same_as(0.2));
        h.verify();
        h.engine.move_container_within_tree(l2, right, 3, true).unwrap();
        for size in sizes(&h, &[l1, r1, r2, l2]) {
            assert!(size > 0.0);
        }
        h.verify();
    }

    #[test]
    fn move_rejects_own_descendant() {
        let mut h = Harness::new();
        let _a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let _b = h.tiling(split);
        let _c = h.tiling(split);
        assert_eq!(
            Err(TreeError::InvalidParent { child: split, parent: split }),
            h.engine.move_container_within_tree(split, split, 0, true)
        );
        h.verify();
    }

    #[test]
    fn flatten_restores_focus_slot_and_scales() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let c = h.tiling(split);
        h.engine.set_focused_descendant(c, None).unwrap();
        h.engine.set_focused_descendant(a, None).unwrap();
        h.engine.flatten_split_container(split).unwrap();
        assert_eq!(&[a, b, c], h.engine.tree().children(h.workspace));
        assert_eq!(&[a, c, b], h.engine.tree().child_focus_order(h.workspace));
        for size in sizes(&h, &[b, c]) {
            assert!(size.same_as(0.25));
        }
        h.verify();
    }

    #[test]
    fn flatten_singleton_equals_replace() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let c = h.tiling(split);
        h.engine.set_focused_descendant(b, None).unwrap();
        h.engine.detach_container(c).unwrap();
        // Detaching c leaves split with one child, which is flattened.
        assert!(!h.engine.tree().contains(split));
        assert_eq!(&[a, b], h.engine.tree().children(h.workspace));
        assert_eq!(&[b, a], h.engine.tree().child_focus_order(h.workspace));
        assert!(h.engine.tree()[b].kind.size_percentage().unwrap().same_as(0.5));
        h.verify();
    }
}
