use super::{CycleDirection, Direction, LayoutEngine};
use crate::model::container::ContainerKind;
use crate::model::tree::{ContainerId, TreeError, TreeResult};
use crate::sys::geometry::Rect;

impl LayoutEngine {
    /// Makes `target` the most recently focused child at every level up to
    /// the root, or up to (not including) `stop`.
    pub fn set_focused_descendant(
        &mut self,
        target: ContainerId,
        stop: Option<ContainerId>,
    ) -> TreeResult<()> {
        self.tree.get(target)?;
        if !self.tree.is_attached(target) {
            return Err(TreeError::AlreadyDetached(target));
        }
        let mut current = target;
        while let Some(parent) = self.tree.parent(current) {
            self.tree.move_to_front(current)?;
            if Some(parent) == stop {
                break;
            }
            current = parent;
        }
        Ok(())
    }

    /// The container focus moves to from `origin` in `direction`, if any.
    pub fn focus_target_in_direction(
        &self,
        origin: ContainerId,
        direction: Direction,
    ) -> TreeResult<Option<ContainerId>> {
        let kind = self.tree.kind(origin)?;
        let local = if kind.is_floating_window() {
            self.floating_sibling(origin, direction.into())
        } else {
            self.tiling_target_in_direction(origin, direction)
        };
        if local.is_some() {
            return Ok(local);
        }
        Ok(self.target_on_adjacent_monitor(origin, direction))
    }

    /// The container focus moves to from `origin` when cycling.
    pub fn focus_target_in_cycle(
        &self,
        origin: ContainerId,
        cycle: CycleDirection,
    ) -> TreeResult<Option<ContainerId>> {
        let kind = self.tree.kind(origin)?;
        if kind.is_floating_window() {
            if let Some(sibling) = self.floating_sibling(origin, cycle) {
                return Ok(Some(sibling));
            }
            return Ok(self.target_on_adjacent_monitor(origin, cycle.monitor_direction()));
        }

        let mut current = origin;
        while let Some(parent) = self.tree.parent(current) {
            let parent_kind = &self.tree[parent].kind;
            if parent_kind.layout().is_none() {
                break;
            }
            let sibling = match cycle {
                CycleDirection::Next => {
                    self.tree.next_sibling_matching(current, ContainerKind::is_resizable)
                }
                CycleDirection::Prev => {
                    self.tree.prev_sibling_matching(current, ContainerKind::is_resizable)
                }
            };
            if let Some(sibling) = sibling {
                return Ok(Some(self.descendant_in_cycle(sibling, cycle)));
            }
            if parent_kind.is_workspace() {
                break;
            }
            current = parent;
        }

        // Wrap around inside the workspace.
        if let Some(workspace) = self.tree.workspace_of(origin) {
            let children = self.tree.resizable_children(workspace);
            let edge = match cycle {
                CycleDirection::Next => children.first(),
                CycleDirection::Prev => children.last(),
            };
            if let Some(&edge) = edge {
                let wrapped = self.descendant_in_cycle(edge, cycle);
                if wrapped != origin {
                    return Ok(Some(wrapped));
                }
            }
        }
        Ok(self.target_on_adjacent_monitor(origin, cycle.monitor_direction()))
    }

    fn tiling_target_in_direction(
        &self,
        origin: ContainerId,
        direction: Direction,
    ) -> Option<ContainerId> {
        let axis = direction.layout();
        let mut current = origin;
        loop {
            let parent = self.tree.parent(current)?;
            let parent_kind = &self.tree[parent].kind;
            let layout = parent_kind.layout()?;
            if layout == axis {
                let sibling = if direction.is_backward() {
                    self.tree.prev_sibling_matching(current, ContainerKind::is_resizable)
                } else {
                    self.tree.next_sibling_matching(current, ContainerKind::is_resizable)
                };
                if let Some(sibling) = sibling {
                    return Some(self.descendant_in_direction(sibling, direction));
                }
            }
            if parent_kind.is_workspace() {
                return None;
            }
            current = parent;
        }
    }

    /// Descends from `origin` to the leaf that is closest when entering it
    /// while moving in `direction`. Children along the same axis are entered
    /// at the near edge, otherwise the last focused one is taken.
    pub fn descendant_in_direction(&self, origin: ContainerId, direction: Direction) -> ContainerId {
        let mut current = origin;
        loop {
            let Some(layout) = self.tree[current].kind.layout() else { return current };
            let children = self.tree.resizable_children(current);
            let next = if layout == direction.layout() {
                if direction.is_backward() { children.last() } else { children.first() }.copied()
            } else {
                self.tree
                    .child_focus_order(current)
                    .iter()
                    .copied()
                    .find(|&c| self.tree[c].kind.is_resizable())
            };
            match next {
                Some(next) => current = next,
                None => return current,
            }
        }
    }

    /// Descends through first (next) or last (previous) resizable children.
    pub fn descendant_in_cycle(&self, origin: ContainerId, cycle: CycleDirection) -> ContainerId {
        let mut current = origin;
        loop {
            let children = self.tree.resizable_children(current);
            let next = match cycle {
                CycleDirection::Next => children.first(),
                CycleDirection::Prev => children.last(),
            };
            match next {
                Some(&next) => current = next,
                None => return current,
            }
        }
    }

    /// The next floating window next to `origin` within its parent,
    /// wrapping at the ends.
    pub fn floating_sibling(&self, origin: ContainerId, cycle: CycleDirection) -> Option<ContainerId> {
        let parent = self.tree.parent(origin)?;
        let floating: Vec<_> = self
            .tree
            .children(parent)
            .iter()
            .copied()
            .filter(|&c| self.tree[c].kind.is_floating_window())
            .collect();
        if floating.len() < 2 {
            return None;
        }
        let index = floating.iter().position(|&c| c == origin)?;
        Some(floating[cycle.step(index, floating.len())])
    }

    /// The nearest monitor that lies entirely past `monitor`'s edge in
    /// `direction`. Monitors overlapping on the perpendicular axis win.
    pub fn monitor_in_direction(
        &self,
        monitor: ContainerId,
        direction: Direction,
    ) -> Option<ContainerId> {
        let from = self.tree.get(monitor).ok()?.kind.as_monitor()?.rect;
        self.tree
            .monitors()
            .iter()
            .copied()
            .filter(|&m| m != monitor)
            .filter_map(|m| Some((m, self.tree[m].kind.as_monitor()?.rect)))
            .filter(|(_, rect)| is_past_edge(&from, rect, direction))
            .min_by_key(|(_, rect)| {
                let (gap, offset, overlaps) = edge_distance(&from, rect, direction);
                (!overlaps, gap, offset)
            })
            .map(|(m, _)| m)
    }

    fn target_on_adjacent_monitor(
        &self,
        origin: ContainerId,
        direction: Direction,
    ) -> Option<ContainerId> {
        let monitor = self.tree.monitor_of(origin)?;
        let target = self.monitor_in_direction(monitor, direction)?;
        let workspace = self.tree.displayed_workspace(target)?;
        let entered = self.descendant_in_direction(workspace, direction);
        if entered != workspace {
            return Some(entered);
        }
        Some(self.tree.last_focused_descendant(workspace).unwrap_or(workspace))
    }
}

fn is_past_edge(from: &Rect, to: &Rect, direction: Direction) -> bool {
    match direction {
        Direction::Left => to.right() <= from.left(),
        Direction::Right => to.left() >= from.right(),
        Direction::Up => to.bottom() <= from.top(),
        Direction::Down => to.top() >= from.bottom(),
    }
}

/// Gap along `direction`, offset of the centers across it, and whether the
/// two rects overlap across it.
fn edge_distance(from: &Rect, to: &Rect, direction: Direction) -> (i32, i32, bool) {
    let (fc, tc) = (from.center(), to.center());
    match direction {
        Direction::Left => (from.left() - to.right(), (fc.y - tc.y).abs(), overlaps(from.top(), from.bottom(), to.top(), to.bottom())),
        Direction::Right => (to.left() - from.right(), (fc.y - tc.y).abs(), overlaps(from.top(), from.bottom(), to.top(), to.bottom())),
        Direction::Up => (from.top() - to.bottom(), (fc.x - tc.x).abs(), overlaps(from.left(), from.right(), to.left(), to.right())),
        Direction::Down => (to.top() - from.bottom(), (fc.x - tc.x).abs(), overlaps(from.left(), from.right(), to.left(), to.right())),
    }
}

fn overlaps(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout_engine::Layout;
    use crate::layout_engine::tests::Harness;
    use crate::model::container::WindowState;

    #[test]
    fn set_focused_descendant_moves_every_level() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let c = h.tiling(split);
        h.engine.set_focused_descendant(c, None).unwrap();
        h.engine.set_focused_descendant(a, None).unwrap();
        assert_eq!(Some(a), h.engine.focused());
        h.engine.set_focused_descendant(b, None).unwrap();
        assert_eq!(&[b, c], h.engine.tree().child_focus_order(split));
        assert_eq!(&[split, a], h.engine.tree().child_focus_order(h.workspace));
    }

    #[test]
    fn set_focused_descendant_respects_stop() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let _b = h.tiling(split);
        let c = h.tiling(split);
        h.engine.set_focused_descendant(a, None).unwrap();
        h.engine.set_focused_descendant(c, Some(split)).unwrap();
        assert_eq!(c, h.engine.tree().child_focus_order(split)[0]);
        assert_eq!(Some(a), h.engine.focused());
    }

    #[test]
    fn set_focused_descendant_rejects_detached() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let b = h.tiling(h.workspace);
        h.engine.set_focused_descendant(a, None).unwrap();
        h.engine.detach_container(b).unwrap();
        assert_eq!(Err(TreeError::AlreadyDetached(b)), h.engine.set_focused_descendant(b, None));
        let loose = h.window(WindowState::Floating);
        assert_eq!(
            Err(TreeError::AlreadyDetached(loose)),
            h.engine.set_focused_descendant(loose, None)
        );
        assert_eq!(Some(a), h.engine.focused());
    }

    #[test]
    fn focus_on_split_reads_its_last_focused_leaf() {
        let mut h = Harness::new();
        let _a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let _c = h.tiling(split);
        h.engine.set_focused_descendant(b, None).unwrap();
        h.engine.set_focused_descendant(split, None).unwrap();
        assert_eq!(Some(b), h.engine.focused());
    }

    #[test]
    fn direction_enters_split_at_near_edge() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Horizontal);
        let b = h.tiling(split);
        let c = h.tiling(split);
        // Split directly under a horizontal workspace would be flattened in
        // normal use; here it only serves as a nested horizontal group.
        assert_eq!(Ok(Some(b)), h.engine.focus_target_in_direction(a, Direction::Right));
        assert_eq!(Ok(Some(a)), h.engine.focus_target_in_direction(b, Direction::Left));
        assert_eq!(Ok(Some(c)), h.engine.focus_target_in_direction(b, Direction::Right));
        assert_eq!(Ok(None), h.engine.focus_target_in_direction(c, Direction::Right));
    }

    #[test]
    fn direction_uses_last_focused_across_axis() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let c = h.tiling(split);
        h.engine.set_focused_descendant(c, None).unwrap();
        assert_eq!(Ok(Some(c)), h.engine.focus_target_in_direction(a, Direction::Right));
        assert_eq!(Ok(Some(b)), h.engine.focus_target_in_direction(c, Direction::Up));
        assert_eq!(Ok(Some(a)), h.engine.focus_target_in_direction(b, Direction::Left));
        assert_eq!(Ok(None), h.engine.focus_target_in_direction(a, Direction::Up));
    }

    #[test]
    fn floating_cycles_among_floating_siblings() {
        let mut h = Harness::new();
        let _t = h.tiling(h.workspace);
        let f1 = h.window(WindowState::Floating);
        let f2 = h.window(WindowState::Floating);
        h.engine.attach_container(f1, h.workspace, 1).unwrap();
        h.engine.attach_container(f2, h.workspace, 2).unwrap();
        assert_eq!(Ok(Some(f2)), h.engine.focus_target_in_direction(f1, Direction::Right));
        assert_eq!(Ok(Some(f1)), h.engine.focus_target_in_direction(f2, Direction::Right));
        assert_eq!(Ok(Some(f2)), h.engine.focus_target_in_cycle(f1, CycleDirection::Prev));
    }

    #[test]
    fn cycle_wraps_within_workspace() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let c = h.tiling(split);
        assert_eq!(Ok(Some(b)), h.engine.focus_target_in_cycle(a, CycleDirection::Next));
        assert_eq!(Ok(Some(c)), h.engine.focus_target_in_cycle(b, CycleDirection::Next));
        assert_eq!(Ok(Some(a)), h.engine.focus_target_in_cycle(c, CycleDirection::Next));
        assert_eq!(Ok(Some(c)), h.engine.focus_target_in_cycle(a, CycleDirection::Prev));
    }

    #[test]
    fn lonely_window_falls_back_to_other_monitor() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let (_right, right_ws) = h.add_monitor("DISPLAY2", Rect::new(1000, 0, 1000, 600));
        let b = h.tiling(right_ws);
        let c = h.tiling(right_ws);
        assert_eq!(Ok(Some(b)), h.engine.focus_target_in_direction(a, Direction::Right));
        assert_eq!(Ok(Some(b)), h.engine.focus_target_in_cycle(a, CycleDirection::Next));
        assert_eq!(Ok(None), h.engine.focus_target_in_direction(a, Direction::Down));
        assert_eq!(Ok(Some(a)), h.engine.focus_target_in_direction(b, Direction::Left));
        assert_eq!(Ok(Some(c)), h.engine.focus_target_in_direction(b, Direction::Right));
    }

    #[test]
    fn empty_workspace_on_target_monitor_is_focused_itself() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let (_below, below_ws) = h.add_monitor("DISPLAY2", Rect::new(0, 600, 1000, 600));
        assert_eq!(Ok(Some(below_ws)), h.engine.focus_target_in_direction(a, Direction::Down));
        assert_eq!(Ok(Some(a)), h.engine.focus_target_in_direction(below_ws, Direction::Up));
    }

    #[test]
    fn monitor_in_direction_prefers_overlap() {
        let mut h = Harness::new();
        let (near_diag, _) = h.add_monitor("DIAG", Rect::new(1000, 600, 1000, 600));
        let (beside, _) = h.add_monitor("BESIDE", Rect::new(1500, 0, 1000, 600));
        assert_eq!(Some(beside), h.engine.monitor_in_direction(h.monitor, Direction::Right));
        assert_eq!(Some(near_diag), h.engine.monitor_in_direction(h.monitor, Direction::Down));
        assert_eq!(None, h.engine.monitor_in_direction(h.monitor, Direction::Left));
    }
}
