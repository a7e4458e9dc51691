use std::collections::VecDeque;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use thiserror::Error;

use crate::common::collections::HashSet;
use crate::layout_engine::MIN_SIZE_PERCENTAGE;
use crate::model::container::ContainerKind;
use crate::sys::geometry::IsWithin;
use crate::sys::window_system::WindowHandle;

slotmap::new_key_type! {
    /// Stable identity of a container. Survives variant swaps.
    pub struct ContainerId;
}

/// Tolerance used when checking that sibling sizes sum to one.
pub const SIZE_EPSILON: f64 = 1e-9;

/// Errors that can only come from a bug in the tree code itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("internal error: container {0:?} is already attached")]
    AlreadyAttached(ContainerId),
    #[error("internal error: container {0:?} is already detached")]
    AlreadyDetached(ContainerId),
    #[error("internal error: container {0:?} is not resizable")]
    NotResizable(ContainerId),
    #[error("internal error: containers {0:?} and {1:?} have no common ancestor")]
    Disconnected(ContainerId, ContainerId),
    #[error("internal error: unknown container {0:?}")]
    UnknownContainer(ContainerId),
    #[error("internal error: {child:?} cannot be a child of {parent:?}")]
    InvalidParent { child: ContainerId, parent: ContainerId },
    #[error("internal error: index {index} is out of bounds for {parent:?} ({len} children)")]
    IndexOutOfBounds { parent: ContainerId, index: usize, len: usize },
    #[error("internal error: size change {0} is not a finite number")]
    NonFiniteSize(f64),
    #[error("internal error: tree invariant violated: {0}")]
    Invariant(String),
}

pub type TreeResult<T> = Result<T, TreeError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub kind: ContainerKind,
    parent: Option<ContainerId>,
    children: Vec<ContainerId>,
    /// Same elements as `children`, most recently focused first.
    focus_order: Vec<ContainerId>,
}

impl Container {
    fn new(kind: ContainerKind) -> Self {
        Container {
            kind,
            parent: None,
            children: Vec::new(),
            focus_order: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<ContainerId> { self.parent }

    pub fn children(&self) -> &[ContainerId] { &self.children }

    pub fn child_focus_order(&self) -> &[ContainerId] { &self.focus_order }
}

/// Arena holding every container. Detached containers stay in the arena
/// until [`ContainerTree::remove`] is called on them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerTree {
    map: SlotMap<ContainerId, Container>,
    root: ContainerId,
}

impl Default for ContainerTree {
    fn default() -> Self { Self::new() }
}

impl Index<ContainerId> for ContainerTree {
    type Output = Container;

    fn index(&self, index: ContainerId) -> &Self::Output { &self.map[index] }
}

impl ContainerTree {
    pub fn new() -> Self {
        let mut map = SlotMap::with_key();
        let root = map.insert(Container::new(ContainerKind::Root));
        ContainerTree { map, root }
    }

    pub fn root(&self) -> ContainerId { self.root }

    /// Creates a detached container.
    pub fn insert(&mut self, kind: ContainerKind) -> ContainerId {
        self.map.insert(Container::new(kind))
    }

    /// Frees a detached container and its whole subtree.
    pub fn remove(&mut self, id: ContainerId) -> TreeResult<ContainerKind> {
        let node = self.get(id)?;
        if node.parent.is_some() || id == self.root {
            return Err(TreeError::AlreadyAttached(id));
        }
        let subtree: Vec<_> = self.self_and_descendants(id).collect();
        let mut removed = None;
        for node in subtree {
            if let Some(container) = self.map.remove(node)
                && node == id
            {
                removed = Some(container.kind);
            }
        }
        removed.ok_or(TreeError::UnknownContainer(id))
    }

    pub fn contains(&self, id: ContainerId) -> bool { self.map.contains_key(id) }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn get(&self, id: ContainerId) -> TreeResult<&Container> {
        self.map.get(id).ok_or(TreeError::UnknownContainer(id))
    }

    pub fn kind(&self, id: ContainerId) -> TreeResult<&ContainerKind> { Ok(&self.get(id)?.kind) }

    pub fn kind_mut(&mut self, id: ContainerId) -> TreeResult<&mut ContainerKind> {
        self.map.get_mut(id).map(|c| &mut c.kind).ok_or(TreeError::UnknownContainer(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContainerId, &Container)> + '_ { self.map.iter() }

    pub fn parent(&self, id: ContainerId) -> Option<ContainerId> {
        self.map.get(id).and_then(|c| c.parent)
    }

    pub fn children(&self, id: ContainerId) -> &[ContainerId] {
        self.map.get(id).map(|c| c.children.as_slice()).unwrap_or_default()
    }

    pub fn child_focus_order(&self, id: ContainerId) -> &[ContainerId] {
        self.map.get(id).map(|c| c.focus_order.as_slice()).unwrap_or_default()
    }

    /// Position of `id` within its parent's children.
    pub fn index_of(&self, id: ContainerId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Position of `id` within its parent's focus order.
    pub fn focus_index(&self, id: ContainerId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.child_focus_order(parent).iter().position(|&c| c == id)
    }

    /// Whether `id` is reachable from the root.
    pub fn is_attached(&self, id: ContainerId) -> bool {
        self.contains(id) && self.self_and_ancestors(id).last() == Some(self.root)
    }

    // Link primitives. These keep invariants 1 and 2 and the parent rules,
    // but know nothing about sizes.

    /// Inserts a detached `child` under `parent` at `index`, appending it to
    /// the end of the parent's focus order.
    pub(crate) fn link(
        &mut self,
        child: ContainerId,
        parent: ContainerId,
        index: usize,
    ) -> TreeResult<()> {
        self.check_can_link(child, parent)?;
        let len = self.children(parent).len();
        if index > len {
            return Err(TreeError::IndexOutOfBounds { parent, index, len });
        }
        let parent_node = &mut self.map[parent];
        parent_node.children.insert(index, child);
        parent_node.focus_order.push(child);
        self.map[child].parent = Some(parent);
        Ok(())
    }

    pub(crate) fn check_can_link(&self, child: ContainerId, parent: ContainerId) -> TreeResult<()> {
        let child_node = self.get(child)?;
        let parent_node = self.get(parent)?;
        if child_node.parent.is_some() || child == self.root {
            return Err(TreeError::AlreadyAttached(child));
        }
        if !child_node.kind.can_be_child_of(&parent_node.kind)
            || self.self_and_ancestors(parent).any(|a| a == child)
        {
            return Err(TreeError::InvalidParent { child, parent });
        }
        Ok(())
    }

    /// Removes `child` from its parent. Returns the former parent.
    pub(crate) fn unlink(&mut self, child: ContainerId) -> TreeResult<ContainerId> {
        let parent = self.get(child)?.parent.ok_or(TreeError::AlreadyDetached(child))?;
        let parent_node = &mut self.map[parent];
        parent_node.children.retain(|&c| c != child);
        parent_node.focus_order.retain(|&c| c != child);
        self.map[child].parent = None;
        Ok(parent)
    }

    /// Puts the detached `replacement` in place of the child at `index`,
    /// taking over its focus-order slot. Returns the replaced child, which is
    /// left detached.
    pub(crate) fn swap_child(
        &mut self,
        parent: ContainerId,
        index: usize,
        replacement: ContainerId,
    ) -> TreeResult<ContainerId> {
        let len = self.get(parent)?.children.len();
        let old = *self
            .children(parent)
            .get(index)
            .ok_or(TreeError::IndexOutOfBounds { parent, index, len })?;
        if self.get(replacement)?.parent.is_some() || replacement == self.root {
            return Err(TreeError::AlreadyAttached(replacement));
        }
        if !self.map[replacement].kind.can_be_child_of(&self.map[parent].kind)
            || self.self_and_ancestors(parent).any(|a| a == replacement)
        {
            return Err(TreeError::InvalidParent { child: replacement, parent });
        }
        let parent_node = &mut self.map[parent];
        parent_node.children[index] = replacement;
        for slot in parent_node.focus_order.iter_mut().filter(|c| **c == old) {
            *slot = replacement;
        }
        self.map[old].parent = None;
        self.map[replacement].parent = Some(parent);
        Ok(old)
    }

    /// Moves `child` to the front of its parent's focus order.
    pub(crate) fn move_to_front(&mut self, child: ContainerId) -> TreeResult<()> {
        self.shift_focus(child, 0)
    }

    /// Moves `child` to `index` in its parent's focus order, clamped to the end.
    pub(crate) fn shift_focus(&mut self, child: ContainerId, index: usize) -> TreeResult<()> {
        let parent = self.get(child)?.parent.ok_or(TreeError::AlreadyDetached(child))?;
        let order = &mut self.map[parent].focus_order;
        order.retain(|&c| c != child);
        let index = index.min(order.len());
        order.insert(index, child);
        Ok(())
    }

    /// Moves `child` to `index` among its siblings, clamped to the end.
    pub(crate) fn shift_child(&mut self, child: ContainerId, index: usize) -> TreeResult<()> {
        let parent = self.get(child)?.parent.ok_or(TreeError::AlreadyDetached(child))?;
        let children = &mut self.map[parent].children;
        children.retain(|&c| c != child);
        let index = index.min(children.len());
        children.insert(index, child);
        Ok(())
    }

    /// Replaces the focus order of `parent`. `order` must be a permutation of
    /// its children.
    pub(crate) fn set_focus_order(
        &mut self,
        parent: ContainerId,
        order: Vec<ContainerId>,
    ) -> TreeResult<()> {
        let node = self.get(parent)?;
        let expected: HashSet<_> = node.children.iter().copied().collect();
        let actual: HashSet<_> = order.iter().copied().collect();
        if expected != actual || order.len() != node.children.len() {
            return Err(TreeError::Invariant(format!(
                "focus order for {parent:?} is not a permutation of its children"
            )));
        }
        self.map[parent].focus_order = order;
        Ok(())
    }

    // Queries.

    /// Ancestors of `id`, nearest first, not including `id`.
    pub fn ancestors(&self, id: ContainerId) -> impl Iterator<Item = ContainerId> + '_ {
        self.self_and_ancestors(id).skip(1)
    }

    pub fn self_and_ancestors(&self, id: ContainerId) -> impl Iterator<Item = ContainerId> + '_ {
        let mut next = self.contains(id).then_some(id);
        std::iter::from_fn(move || {
            let node = next;
            next = node.and_then(|n| self.parent(n));
            node
        })
    }

    /// Breadth-first, not including `id`.
    pub fn descendants(&self, id: ContainerId) -> impl Iterator<Item = ContainerId> + '_ {
        self.self_and_descendants(id).skip(1)
    }

    pub fn self_and_descendants(&self, id: ContainerId) -> impl Iterator<Item = ContainerId> + '_ {
        let mut queue: VecDeque<_> = self.contains(id).then_some(id).into_iter().collect();
        std::iter::from_fn(move || {
            let node = queue.pop_front()?;
            queue.extend(self.children(node).iter().copied());
            Some(node)
        })
    }

    /// Siblings in index order, not including `id`.
    pub fn siblings(&self, id: ContainerId) -> impl Iterator<Item = ContainerId> + '_ {
        self.parent(id)
            .map(|p| self.children(p))
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(move |&c| c != id)
    }

    pub fn siblings_matching<'a>(
        &'a self,
        id: ContainerId,
        pred: impl Fn(&ContainerKind) -> bool + 'a,
    ) -> impl Iterator<Item = ContainerId> + 'a {
        self.siblings(id).filter(move |&c| pred(&self.map[c].kind))
    }

    pub fn resizable_siblings(&self, id: ContainerId) -> Vec<ContainerId> {
        self.siblings_matching(id, ContainerKind::is_resizable).collect()
    }

    pub fn resizable_children(&self, id: ContainerId) -> Vec<ContainerId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.map[c].kind.is_resizable())
            .collect()
    }

    pub fn next_sibling_matching(
        &self,
        id: ContainerId,
        pred: impl Fn(&ContainerKind) -> bool,
    ) -> Option<ContainerId> {
        let index = self.index_of(id)?;
        let parent = self.parent(id)?;
        self.children(parent)[index + 1..]
            .iter()
            .copied()
            .find(|&c| pred(&self.map[c].kind))
    }

    pub fn prev_sibling_matching(
        &self,
        id: ContainerId,
        pred: impl Fn(&ContainerKind) -> bool,
    ) -> Option<ContainerId> {
        let index = self.index_of(id)?;
        let parent = self.parent(id)?;
        self.children(parent)[..index]
            .iter()
            .rev()
            .copied()
            .find(|&c| pred(&self.map[c].kind))
    }

    /// Follows the first entry of each focus order down to a childless node.
    /// Returns `None` if `id` itself is childless.
    pub fn last_focused_descendant(&self, id: ContainerId) -> Option<ContainerId> {
        let mut current = *self.child_focus_order(id).first()?;
        while let Some(&next) = self.child_focus_order(current).first() {
            current = next;
        }
        Some(current)
    }

    /// Most recently focused leaf under `id` that satisfies `pred`, searched
    /// depth first in focus order.
    pub fn last_focused_descendant_matching(
        &self,
        id: ContainerId,
        pred: impl Fn(ContainerId, &ContainerKind) -> bool,
    ) -> Option<ContainerId> {
        let mut stack: Vec<_> = self.child_focus_order(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            let focus_order = self.child_focus_order(node);
            if focus_order.is_empty() {
                if pred(node, &self.map[node].kind) {
                    return Some(node);
                }
            } else {
                stack.extend(focus_order.iter().rev().copied());
            }
        }
        None
    }

    pub fn last_focused_descendant_excluding(
        &self,
        id: ContainerId,
        excluded: ContainerId,
    ) -> Option<ContainerId> {
        self.last_focused_descendant_matching(id, |node, _| node != excluded)
    }

    pub fn lowest_common_ancestor(
        &self,
        a: ContainerId,
        b: ContainerId,
    ) -> TreeResult<ContainerId> {
        let b_chain: Vec<_> = self.self_and_ancestors(b).collect();
        self.self_and_ancestors(a)
            .find(|ancestor| b_chain.contains(ancestor))
            .ok_or(TreeError::Disconnected(a, b))
    }

    /// The container on the path from `id` up to `ancestor` whose parent is
    /// `ancestor`.
    pub fn child_towards(&self, ancestor: ContainerId, id: ContainerId) -> Option<ContainerId> {
        self.self_and_ancestors(id).find(|&node| self.parent(node) == Some(ancestor))
    }

    pub fn ancestor_matching(
        &self,
        id: ContainerId,
        pred: impl Fn(&ContainerKind) -> bool,
    ) -> Option<ContainerId> {
        self.self_and_ancestors(id).find(|&node| pred(&self.map[node].kind))
    }

    pub fn workspace_of(&self, id: ContainerId) -> Option<ContainerId> {
        self.ancestor_matching(id, ContainerKind::is_workspace)
    }

    pub fn monitor_of(&self, id: ContainerId) -> Option<ContainerId> {
        self.ancestor_matching(id, ContainerKind::is_monitor)
    }

    pub fn monitors(&self) -> &[ContainerId] { self.children(self.root) }

    pub fn workspaces(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.monitors().iter().flat_map(|&m| self.children(m).iter().copied())
    }

    pub fn workspace_by_name(&self, name: &str) -> Option<ContainerId> {
        self.workspaces()
            .find(|&ws| self.map[ws].kind.as_workspace().is_some_and(|w| w.name == name))
    }

    /// The attached window for `handle`. Detached windows are not managed.
    pub fn window_by_handle(&self, handle: WindowHandle) -> Option<ContainerId> {
        self.map
            .iter()
            .find(|&(id, c)| {
                c.kind.as_window().is_some_and(|w| w.handle == handle) && self.is_attached(id)
            })
            .map(|(id, _)| id)
    }

    /// Windows still in the arena but unreachable from the root.
    pub fn detached_windows(&self) -> Vec<(ContainerId, WindowHandle)> {
        self.map
            .iter()
            .filter_map(|(id, c)| Some((id, c.kind.as_window()?.handle)))
            .filter(|&(id, _)| !self.is_attached(id))
            .collect()
    }

    /// Every window under `id`, breadth first.
    pub fn windows_under(&self, id: ContainerId) -> impl Iterator<Item = ContainerId> + '_ {
        self.self_and_descendants(id).filter(|&c| self.map[c].kind.is_window())
    }

    /// The globally focused container.
    pub fn focused(&self) -> Option<ContainerId> { self.last_focused_descendant(self.root) }

    /// The workspace shown on `monitor`.
    pub fn displayed_workspace(&self, monitor: ContainerId) -> Option<ContainerId> {
        self.map.get(monitor)?.kind.as_monitor()?.displayed_workspace
    }

    /// Whether `id` sits inside a workspace that its monitor currently shows.
    pub fn is_displayed(&self, id: ContainerId) -> bool {
        let Some(workspace) = self.workspace_of(id) else { return false };
        self.monitor_of(workspace)
            .is_some_and(|m| self.displayed_workspace(m) == Some(workspace))
    }

    pub fn verify_invariants(&self) -> TreeResult<()> {
        let fail = |msg: String| Err(TreeError::Invariant(msg));
        if self.map[self.root].parent.is_some() {
            return fail("root has a parent".into());
        }
        for (id, node) in self.map.iter() {
            for &child in &node.children {
                if self.parent(child) != Some(id) {
                    return fail(format!("{child:?} is a child of {id:?} but not linked back"));
                }
            }
            if let Some(parent) = node.parent
                && !self.children(parent).contains(&id)
            {
                return fail(format!("{id:?} points at parent {parent:?} which does not own it"));
            }
            let children: HashSet<_> = node.children.iter().collect();
            let focus: HashSet<_> = node.focus_order.iter().collect();
            if children.len() != node.children.len()
                || focus.len() != node.focus_order.len()
                || children != focus
            {
                return fail(format!("focus order of {id:?} is not a permutation of its children"));
            }
            if self.ancestors(id).take(self.map.len() + 1).count() > self.map.len() {
                return fail(format!("{id:?} is part of a cycle"));
            }
        }

        for id in self.self_and_descendants(self.root) {
            let node = &self.map[id];
            for &child in &node.children {
                if !self.map[child].kind.can_be_child_of(&node.kind) {
                    return fail(format!("{child:?} cannot be a child of {id:?}"));
                }
            }

            let sizes: Vec<f64> =
                node.children.iter().filter_map(|&c| self.map[c].kind.size_percentage()).collect();
            if !sizes.is_empty() {
                let total: f64 = sizes.iter().sum();
                if !total.is_within(SIZE_EPSILON, 1.0) {
                    return fail(format!("sizes under {id:?} sum to {total}"));
                }
                if let Some(small) = sizes.iter().find(|&&s| s < MIN_SIZE_PERCENTAGE - SIZE_EPSILON)
                {
                    return fail(format!("a child of {id:?} is sized {small}"));
                }
            }

            if node.kind.is_split() && node.children.len() < 2 {
                return fail(format!("split {id:?} has {} children", node.children.len()));
            }

            if let Some(monitor) = node.kind.as_monitor()
                && let Some(displayed) = monitor.displayed_workspace
                && !node.children.contains(&displayed)
            {
                return fail(format!("{id:?} displays {displayed:?} which it does not own"));
            }
        }
        Ok(())
    }

    pub fn draw_tree(&self, id: ContainerId) -> String {
        let tree = self.ascii_tree(id);
        let mut out = String::new();
        // Writing to a String cannot fail.
        _ = ascii_tree::write_tree(&mut out, &tree);
        out
    }

    fn ascii_tree(&self, id: ContainerId) -> ascii_tree::Tree {
        let Some(node) = self.map.get(id) else {
            return ascii_tree::Tree::Leaf(vec![format!("{id:?} (missing)")]);
        };
        let mut desc = format!("{:?} {}", id, node.kind.container_type());
        match &node.kind {
            ContainerKind::Monitor(m) => desc.push_str(&format!(" {}", m.device_name)),
            ContainerKind::Workspace(ws) => {
                desc.push_str(&format!(" {:?} {}", ws.name, ws.layout));
                if ws.is_monocle {
                    desc.push_str(" monocle");
                }
            }
            ContainerKind::Split(split) => {
                desc.push_str(&format!(" {} {:.3}", split.layout, split.size_percentage))
            }
            ContainerKind::Window(window) => {
                desc.push_str(&format!(" {}", window.handle));
                if let Some(size) = node.kind.size_percentage() {
                    desc.push_str(&format!(" {size:.3}"));
                }
            }
            ContainerKind::Root => {}
        }
        if node.children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            let children = node.children.iter().map(|&c| self.ascii_tree(c)).collect();
            ascii_tree::Tree::Node(desc, children)
        }
    }
}
