use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::common::config::GapSettings;
use crate::layout_engine::{CycleDirection, Direction, Layout, LayoutEngine, MIN_SIZE_PERCENTAGE};
use crate::model::container::{ContainerKind, WindowState};
use crate::model::tree::{ContainerId, SIZE_EPSILON};
use crate::sys::geometry::{IsWithin, Rect, SameAs};
use crate::sys::window_system::WindowHandle;

/// A tree with one 1000x600 monitor showing one horizontal workspace.
pub(crate) struct Harness {
    pub engine: LayoutEngine,
    pub monitor: ContainerId,
    pub workspace: ContainerId,
    next_handle: u64,
}

impl Harness {
    pub fn new() -> Self { Self::with_gaps(GapSettings::default()) }

    pub fn with_gaps(gaps: GapSettings) -> Self {
        let mut engine = LayoutEngine::new(gaps);
        let rect = Rect::new(0, 0, 1000, 600);
        let root = engine.tree().root();
        let monitor = engine.create_monitor("DISPLAY1".into(), rect, rect, 1.0);
        engine.attach_container(monitor, root, 0).unwrap();
        let workspace = engine.create_workspace("1".into(), Layout::Horizontal, false);
        engine.attach_container(workspace, monitor, 0).unwrap();
        Harness { engine, monitor, workspace, next_handle: 1 }
    }

    pub fn next_handle(&mut self) -> WindowHandle {
        let handle = WindowHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// A detached window.
    pub fn window(&mut self, state: WindowState) -> ContainerId {
        let handle = self.next_handle();
        self.engine.create_window(handle, state, Rect::new(0, 0, 400, 300))
    }

    /// A tiling window appended to `parent`.
    pub fn tiling(&mut self, parent: ContainerId) -> ContainerId {
        let window = self.window(WindowState::Tiling { size_percentage: 0.0 });
        let end = self.engine.tree().children(parent).len();
        self.engine.attach_container(window, parent, end).unwrap();
        window
    }

    /// An empty split appended to `parent`. Callers fill it before checking
    /// invariants.
    pub fn split(&mut self, parent: ContainerId, layout: Layout) -> ContainerId {
        let split = self.engine.create_split(layout);
        let end = self.engine.tree().children(parent).len();
        self.engine.attach_container(split, parent, end).unwrap();
        split
    }

    pub fn tilings_in(&mut self, parent: ContainerId) -> [ContainerId; 3] {
        [self.tiling(parent), self.tiling(parent), self.tiling(parent)]
    }

    pub fn set_size(&mut self, id: ContainerId, size: f64) {
        assert!(self.engine.tree.kind_mut(id).unwrap().set_size_percentage(size));
    }

    /// Adds a monitor at `rect` with one workspace and returns both.
    pub fn add_monitor(&mut self, name: &str, rect: Rect) -> (ContainerId, ContainerId) {
        let root = self.engine.tree().root();
        let index = self.engine.tree().children(root).len();
        let monitor = self.engine.create_monitor(name.into(), rect, rect, 1.0);
        self.engine.attach_container(monitor, root, index).unwrap();
        let workspace =
            self.engine.create_workspace(format!("{name}-1"), Layout::Horizontal, false);
        self.engine.attach_container(workspace, monitor, 0).unwrap();
        (monitor, workspace)
    }

    #[track_caller]
    pub fn verify(&self) {
        if let Err(e) = self.engine.verify_invariants() {
            panic!("{e}\n{}", self.engine.draw_tree());
        }
    }
}

pub(crate) fn sizes(h: &Harness, ids: &[ContainerId]) -> Vec<f64> {
    ids.iter()
        .map(|&id| h.engine.tree()[id].kind.size_percentage().unwrap())
        .collect()
}

mod scenarios {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn resize_then_detach_credits_evenly() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        let third = 1.0 / 3.0;
        assert!(sizes(&h, &[a, b, c]).iter().all(|s| s.same_as(third)));

        crate::layout_engine::resize::resize_container(&mut h.engine.tree, a, 0.1).unwrap();
        let s = sizes(&h, &[a, b, c]);
        assert!(s[0].is_within(1e-9, third + 0.1));
        assert!(s[1].is_within(1e-9, third - 0.05));
        assert!(s[2].is_within(1e-9, third - 0.05));
        assert!(s.iter().sum::<f64>().same_as(1.0));

        h.engine.detach_container(b).unwrap();
        assert_eq!(&[a, c], h.engine.tree().children(h.workspace));
        let s = sizes(&h, &[a, c]);
        assert!(s[0].is_within(1e-9, third + 0.1 + (third - 0.05) / 2.0));
        assert!(s[1].is_within(1e-9, third - 0.05 + (third - 0.05) / 2.0));
        assert!(s[0].is_within(1e-3, 0.575));
        assert!(s[1].is_within(1e-3, 0.425));
        assert!(s.iter().sum::<f64>().same_as(1.0));
        h.verify();
    }

    #[test]
    fn focus_right_moves_to_next_and_reorders() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        assert_eq!(&[a, b, c], h.engine.tree().child_focus_order(h.workspace));

        let target = h.engine.focus_target_in_direction(a, Direction::Right).unwrap();
        assert_eq!(Some(b), target);
        h.engine.set_focused_descendant(b, None).unwrap();
        assert_eq!(Some(b), h.engine.tree().focused());
        assert_eq!(&[b, a, c], h.engine.tree().child_focus_order(h.workspace));
    }

    #[test]
    fn floating_attach_keeps_tiling_sizes() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let b = h.tiling(h.workspace);
        h.set_size(a, 0.7);
        h.set_size(b, 0.3);
        let floating = h.window(WindowState::Floating);
        h.engine.attach_container(floating, h.workspace, 1).unwrap();
        assert_eq!(vec![0.7, 0.3], sizes(&h, &[a, b]));
        h.engine.detach_container(floating).unwrap();
        assert_eq!(vec![0.7, 0.3], sizes(&h, &[a, b]));
        h.verify();
    }

    #[test]
    fn attach_then_detach_restores_even_siblings() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        let children = h.engine.tree().children(h.workspace).to_vec();
        let focus = h.engine.tree().child_focus_order(h.workspace).to_vec();
        let before = sizes(&h, &[a, b, c]);

        let d = h.window(WindowState::Tiling { size_percentage: 0.0 });
        h.engine.attach_container(d, h.workspace, 1).unwrap();
        h.engine.detach_container(d).unwrap();

        assert_eq!(children, h.engine.tree().children(h.workspace));
        assert_eq!(focus, h.engine.tree().child_focus_order(h.workspace));
        for (after, before) in sizes(&h, &[a, b, c]).into_iter().zip(before) {
            assert!(after.same_as(before));
        }
    }

    #[test]
    fn attach_then_detach_evens_out_uneven_siblings() {
        let mut h = Harness::new();
        let [a, b, c] = h.tilings_in(h.workspace);
        h.set_size(a, 0.5);
        h.set_size(b, 0.3);
        h.set_size(c, 0.2);

        // The newcomer's quarter is taken in proportion to what each sibling
        // can spare, then handed back in equal parts.
        let d = h.window(WindowState::Tiling { size_percentage: 0.0 });
        h.engine.attach_container(d, h.workspace, 1).unwrap();
        h.engine.detach_container(d).unwrap();

        let spare = 1.0 - 3.0 * MIN_SIZE_PERCENTAGE;
        let expected = [0.5, 0.3, 0.2]
            .map(|size| size - 0.25 * (size - MIN_SIZE_PERCENTAGE) / spare + 0.25 / 3.0);
        let s = sizes(&h, &[a, b, c]);
        for (after, expected) in s.iter().zip(expected) {
            assert!(after.is_within(1e-9, expected));
        }
        assert!(s[0].is_within(1e-3, 0.457));
        assert!(s[1].is_within(1e-3, 0.309));
        assert!(s[2].is_within(1e-3, 0.234));
        assert!(s.iter().sum::<f64>().same_as(1.0));
        h.verify();
    }

    #[test]
    fn focus_follows_last_focused_descendant() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let b = h.tiling(split);
        let c = h.tiling(split);

        for leaf in [a, b, c] {
            h.engine.set_focused_descendant(leaf, None).unwrap();
            assert_eq!(Some(leaf), h.engine.tree().focused());
        }
        h.engine.set_focused_descendant(a, None).unwrap();
        h.engine.set_focused_descendant(split, None).unwrap();
        assert_eq!(Some(c), h.engine.tree().focused());

        let (_, empty) = h.add_monitor("DISPLAY2", Rect::new(1000, 0, 800, 600));
        h.engine.set_focused_descendant(empty, None).unwrap();
        assert_eq!(Some(empty), h.engine.tree().focused());
    }

    #[test]
    fn cycle_crosses_monitors_from_lonely_window() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let (_, other) = h.add_monitor("DISPLAY2", Rect::new(1000, 0, 800, 600));
        let b = h.tiling(other);
        assert_eq!(Ok(Some(b)), h.engine.focus_target_in_cycle(a, CycleDirection::Next));
        assert_eq!(Ok(None), h.engine.focus_target_in_cycle(a, CycleDirection::Prev));
    }

    #[test]
    fn gaps_are_applied_between_and_around() {
        let mut gaps = GapSettings { inner: 10, ..GapSettings::default() };
        gaps.outer.left = 5;
        gaps.outer.right = 5;
        let mut h = Harness::with_gaps(gaps);
        let a = h.tiling(h.workspace);
        let b = h.tiling(h.workspace);
        let ra = h.engine.container_rect(a).unwrap();
        let rb = h.engine.container_rect(b).unwrap();
        assert_eq!(Rect::new(5, 0, 490, 600), ra);
        assert_eq!(Rect::new(505, 0, 490, 600), rb);
    }
}

#[derive(Debug, Clone)]
enum Op {
    AddTiling { parent: usize, index: usize },
    AddFloating,
    Detach(usize),
    Replace { target: usize, floating: bool },
    Move { container: usize, parent: usize, index: usize, adjust_size: bool },
    Flatten(usize),
    Resize { container: usize, delta: f64 },
    Wrap { container: usize, layout: Layout },
    Focus(usize),
    Minimize(usize),
    Restore(usize),
}

fn arbitrary_layout() -> impl Strategy<Value = Layout> {
    prop_oneof![Just(Layout::Horizontal), Just(Layout::Vertical)]
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<usize>(), any::<usize>())
            .prop_map(|(parent, index)| Op::AddTiling { parent, index }),
        1 => Just(Op::AddFloating),
        2 => any::<usize>().prop_map(Op::Detach),
        1 => (any::<usize>(), any::<bool>())
            .prop_map(|(target, floating)| Op::Replace { target, floating }),
        2 => (any::<usize>(), any::<usize>(), any::<usize>(), any::<bool>()).prop_map(
            |(container, parent, index, adjust_size)| Op::Move {
                container,
                parent,
                index,
                adjust_size,
            }
        ),
        1 => any::<usize>().prop_map(Op::Flatten),
        2 => (any::<usize>(), -0.6..0.6f64)
            .prop_map(|(container, delta)| Op::Resize { container, delta }),
        2 => (any::<usize>(), arbitrary_layout())
            .prop_map(|(container, layout)| Op::Wrap { container, layout }),
        1 => any::<usize>().prop_map(Op::Focus),
        1 => any::<usize>().prop_map(Op::Minimize),
        1 => any::<usize>().prop_map(Op::Restore),
    ]
}

fn pick(candidates: &[ContainerId], n: usize) -> Option<ContainerId> {
    (!candidates.is_empty()).then(|| candidates[n % candidates.len()])
}

fn attached_where(
    h: &Harness,
    pred: impl Fn(&ContainerKind) -> bool,
) -> Vec<ContainerId> {
    let tree = h.engine.tree();
    let mut ids: Vec<_> = tree.descendants(h.workspace).filter(|&c| pred(&tree[c].kind)).collect();
    ids.sort();
    ids
}

impl Op {
    fn apply(self, h: &mut Harness) {
        let parents = attached_where(h, |k| k.layout().is_some());
        let parents: Vec<_> = std::iter::once(h.workspace).chain(parents).collect();
        let nodes = attached_where(h, |k| k.is_window() || k.is_split());
        let windows = attached_where(h, ContainerKind::is_window);
        let splits = attached_where(h, ContainerKind::is_split);

        match self {
            Op::AddTiling { parent, index } => {
                let Some(parent) = pick(&parents, parent) else { return };
                let index = index % (h.engine.tree().children(parent).len() + 1);
                let window = h.window(WindowState::Tiling { size_percentage: 0.0 });
                h.engine.attach_container(window, parent, index).unwrap();
            }
            Op::AddFloating => {
                let window = h.window(WindowState::Floating);
                let end = h.engine.tree().children(h.workspace).len();
                h.engine.attach_container(window, h.workspace, end).unwrap();
            }
            Op::Detach(n) => {
                let Some(node) = pick(&nodes, n) else { return };
                h.engine.detach_container(node).unwrap();
                h.engine.remove_container(node).unwrap();
            }
            Op::Replace { target, floating } => {
                let Some(old) = pick(&nodes, target) else { return };
                let parent = h.engine.tree().parent(old).unwrap();
                let index = h.engine.tree().index_of(old).unwrap();
                let state = if floating {
                    WindowState::Floating
                } else {
                    WindowState::Tiling { size_percentage: 0.0 }
                };
                let replacement = h.window(state);
                h.engine.replace_container(replacement, parent, index).unwrap();
                h.engine.remove_container(old).unwrap();
            }
            Op::Move { container, parent, index, adjust_size } => {
                let (Some(container), Some(parent)) = (pick(&nodes, container), pick(&parents, parent))
                else {
                    return;
                };
                let tree = h.engine.tree();
                if tree.self_and_ancestors(parent).any(|a| a == container)
                    || !tree[container].kind.can_be_child_of(&tree[parent].kind)
                {
                    assert!(h.engine.move_container_within_tree(container, parent, 0, adjust_size).is_err());
                    return;
                }
                let index = index % (tree.children(parent).len() + 1);
                h.engine.move_container_within_tree(container, parent, index, adjust_size).unwrap();
            }
            Op::Flatten(n) => {
                let Some(split) = pick(&splits, n) else { return };
                h.engine.flatten_split_container(split).unwrap();
            }
            Op::Resize { container, delta } => {
                let resizable = attached_where(h, ContainerKind::is_resizable);
                let Some(target) = pick(&resizable, container) else { return };
                crate::layout_engine::resize::resize_container(&mut h.engine.tree, target, delta)
                    .unwrap();
            }
            Op::Wrap { container, layout } => {
                let Some(window) = pick(&windows, container) else { return };
                h.engine.change_tiling_direction(window, layout).unwrap();
            }
            Op::Focus(n) => {
                let Some(node) = pick(&nodes, n) else { return };
                h.engine.set_focused_descendant(node, None).unwrap();
            }
            Op::Minimize(n) => {
                let Some(window) = pick(&windows, n) else { return };
                h.engine.set_minimized(window).unwrap();
            }
            Op::Restore(n) => {
                let Some(window) = pick(&windows, n) else { return };
                h.engine.restore(window).unwrap();
            }
        }
    }
}

fn check_sizes(h: &Harness) {
    let tree = h.engine.tree();
    for parent in tree.self_and_descendants(h.workspace) {
        let resizable = tree.resizable_children(parent);
        if resizable.is_empty() {
            continue;
        }
        let total: f64 = resizable.iter().map(|&c| tree[c].kind.size_percentage().unwrap()).sum();
        assert!(total.is_within(SIZE_EPSILON, 1.0), "{total}\n{}", h.engine.draw_tree());
        for &c in &resizable {
            let size = tree[c].kind.size_percentage().unwrap();
            assert!(size >= MIN_SIZE_PERCENTAGE - SIZE_EPSILON, "{size}");
        }
    }
}

#[test]
fn wrapped_windows_survive_detach_of_partner() {
    let mut h = Harness::new();
    let [a, b, c] = h.tilings_in(h.workspace);
    let split = h.engine.change_tiling_direction(b, Layout::Vertical).unwrap().unwrap();
    h.verify();
    h.engine.detach_container(c).unwrap();
    // The split is left with one child and flattened back into the workspace.
    assert!(!h.engine.tree().contains(split));
    assert_eq!(&[a, b], h.engine.tree().children(h.workspace));
    h.verify();
    check_sizes(&h);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    #[test]
    fn random_tree_operations_keep_invariants(ops in prop::collection::vec(arbitrary_op(), 1..40)) {
        let mut h = Harness::new();
        for op in ops {
            op.apply(&mut h);
            h.verify();
            check_sizes(&h);
        }
    }
}
