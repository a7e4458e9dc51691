//! Proportional sizing of resizable siblings and the geometry derived from it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::common::config::GapSettings;
use crate::layout_engine::Layout;
use crate::model::container::{ContainerKind, WindowState};
use crate::model::tree::{ContainerId, ContainerTree, TreeError, TreeResult};
use crate::sys::geometry::Rect;

/// No resizable container may be squeezed below this share of its parent.
pub const MIN_SIZE_PERCENTAGE: f64 = 0.01;

fn size_of(tree: &ContainerTree, id: ContainerId) -> f64 {
    tree[id].kind.size_percentage().unwrap_or_default()
}

fn set_size(tree: &mut ContainerTree, id: ContainerId, value: f64) -> TreeResult<()> {
    if tree.kind_mut(id)?.set_size_percentage(value) {
        Ok(())
    } else {
        Err(TreeError::NotResizable(id))
    }
}

/// Grows `target` by `delta` (negative shrinks), taking the space from or
/// giving it to its resizable siblings.
///
/// Growth is taken from siblings in proportion to how far each is above the
/// minimum. Shrinking hands the freed space out equally.
pub fn resize_container(tree: &mut ContainerTree, target: ContainerId, delta: f64) -> TreeResult<()> {
    if !delta.is_finite() {
        return Err(TreeError::NonFiniteSize(delta));
    }
    let current = tree.kind(target)?.size_percentage().ok_or(TreeError::NotResizable(target))?;
    if tree.parent(target).is_none() {
        return Err(TreeError::AlreadyDetached(target));
    }
    let siblings = tree.resizable_siblings(target);
    if siblings.is_empty() {
        return Ok(());
    }

    let available: f64 =
        siblings.iter().map(|&s| size_of(tree, s) - MIN_SIZE_PERCENTAGE).sum::<f64>().max(0.0);
    let lower = (MIN_SIZE_PERCENTAGE - current).min(available);
    let clamped = delta.clamp(lower, available);
    trace!(?target, delta, clamped, available, "resize");

    set_size(tree, target, current + clamped)?;
    if clamped > 0.0 && available > 0.0 {
        for &sibling in &siblings {
            let size = size_of(tree, sibling);
            let share = (size - MIN_SIZE_PERCENTAGE) / available;
            set_size(tree, sibling, size - clamped * share)?;
        }
    } else {
        let each = clamped / siblings.len() as f64;
        for &sibling in &siblings {
            let size = size_of(tree, sibling);
            set_size(tree, sibling, size - each)?;
        }
    }
    Ok(())
}

/// Resizes `target` towards an absolute share, clamped to what its siblings
/// can give up.
pub fn resize_to(tree: &mut ContainerTree, target: ContainerId, share: f64) -> TreeResult<()> {
    let current = tree.kind(target)?.size_percentage().ok_or(TreeError::NotResizable(target))?;
    let share = share.clamp(MIN_SIZE_PERCENTAGE, 1.0);
    resize_container(tree, target, share - current)
}

/// Gives `freed` to the resizable children of `parent` in equal parts.
pub(crate) fn distribute_evenly(
    tree: &mut ContainerTree,
    parent: ContainerId,
    freed: f64,
) -> TreeResult<()> {
    let children = tree.resizable_children(parent);
    if children.is_empty() {
        return Ok(());
    }
    let each = freed / children.len() as f64;
    for child in children {
        let size = size_of(tree, child);
        set_size(tree, child, size + each)?;
    }
    Ok(())
}

/// Rescales the resizable children of `parent` so they sum to one with none
/// under the minimum.
pub(crate) fn normalize_sizes(tree: &mut ContainerTree, parent: ContainerId) -> TreeResult<()> {
    let children = tree.resizable_children(parent);
    if children.is_empty() {
        return Ok(());
    }
    let total: f64 = children.iter().map(|&c| size_of(tree, c)).sum();
    let mut sizes: Vec<f64> = if total > 0.0 {
        children.iter().map(|&c| size_of(tree, c) / total).collect()
    } else {
        vec![1.0 / children.len() as f64; children.len()]
    };

    let deficit: f64 = sizes.iter().map(|&s| (MIN_SIZE_PERCENTAGE - s).max(0.0)).sum();
    if deficit > 0.0 {
        let surplus: f64 = sizes.iter().map(|&s| (s - MIN_SIZE_PERCENTAGE).max(0.0)).sum();
        for size in &mut sizes {
            if *size < MIN_SIZE_PERCENTAGE {
                *size = MIN_SIZE_PERCENTAGE;
            } else if surplus > 0.0 {
                *size -= deficit * (*size - MIN_SIZE_PERCENTAGE) / surplus;
            }
        }
    }
    for (child, size) in children.into_iter().zip(sizes) {
        set_size(tree, child, size)?;
    }
    Ok(())
}

/// A user-facing resize request: `"+10%"`, `"-5%"`, `"20px"`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeAmount {
    /// Fraction of the parent, e.g. `0.1` for `"10%"`.
    Percent(f64),
    Pixels(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid resize amount {0:?}, expected something like \"+5%\" or \"-20px\"")]
pub struct ParseResizeAmountError(pub String);

impl FromStr for ResizeAmount {
    type Err = ParseResizeAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseResizeAmountError(s.to_string());
        let trimmed = s.trim();
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if let Some(number) = unsigned.strip_suffix('%') {
            let value: f64 = number.trim().parse().map_err(|_| err())?;
            if !value.is_finite() {
                return Err(err());
            }
            Ok(ResizeAmount::Percent(value / 100.0))
        } else if let Some(number) = unsigned.strip_suffix("px") {
            number.trim().parse().map(ResizeAmount::Pixels).map_err(|_| err())
        } else {
            Err(err())
        }
    }
}

impl ResizeAmount {
    pub fn negated(self) -> ResizeAmount {
        match self {
            ResizeAmount::Percent(p) => ResizeAmount::Percent(-p),
            ResizeAmount::Pixels(px) => ResizeAmount::Pixels(-px),
        }
    }

    /// Converts to a share of a parent whose resizable space along the axis is
    /// `parent_length` pixels.
    pub fn as_fraction(self, parent_length: i32) -> f64 {
        match self {
            ResizeAmount::Percent(p) => p,
            ResizeAmount::Pixels(_) if parent_length <= 0 => 0.0,
            ResizeAmount::Pixels(px) => f64::from(px) / f64::from(parent_length),
        }
    }
}

fn along(rect: &Rect, layout: Layout) -> (i32, i32) {
    match layout {
        Layout::Horizontal => (rect.x, rect.width),
        Layout::Vertical => (rect.y, rect.height),
    }
}

/// The rectangle `id` occupies on screen.
pub fn container_rect(tree: &ContainerTree, id: ContainerId, gaps: &GapSettings) -> TreeResult<Rect> {
    let node = tree.get(id)?;
    let monitor_rect = |full: bool| -> TreeResult<Rect> {
        let monitor = tree.monitor_of(id).ok_or(TreeError::AlreadyDetached(id))?;
        let data = tree[monitor].kind.as_monitor().ok_or(TreeError::UnknownContainer(monitor))?;
        Ok(if full { data.rect } else { data.working_rect })
    };

    match &node.kind {
        ContainerKind::Root => Ok(Rect::default()),
        ContainerKind::Monitor(monitor) => Ok(monitor.rect),
        ContainerKind::Workspace(_) => Ok(monitor_rect(false)?.inset(&gaps.outer.as_delta())),
        ContainerKind::Window(window) => match window.state {
            WindowState::Tiling { .. } => tiled_rect(tree, id, gaps),
            WindowState::Floating | WindowState::Minimized { .. } => Ok(window.floating_placement),
            WindowState::Maximized { .. } => monitor_rect(false),
            WindowState::Fullscreen { .. } => monitor_rect(true),
        },
        ContainerKind::Split(_) => tiled_rect(tree, id, gaps),
    }
}

fn tiled_rect(tree: &ContainerTree, id: ContainerId, gaps: &GapSettings) -> TreeResult<Rect> {
    let parent = tree.parent(id).ok_or(TreeError::AlreadyDetached(id))?;
    let parent_rect = container_rect(tree, parent, gaps)?;
    let parent_kind = &tree[parent].kind;
    if parent_kind.as_workspace().is_some_and(|ws| ws.is_monocle) {
        return Ok(parent_rect);
    }
    let layout = parent_kind.layout().ok_or(TreeError::InvalidParent { child: id, parent })?;

    let siblings = tree.resizable_children(parent);
    let position = siblings.iter().position(|&s| s == id).ok_or(TreeError::NotResizable(id))?;
    let gap_total = gaps.inner * (siblings.len() as i32 - 1);
    let (origin, length) = along(&parent_rect, layout);
    let available = f64::from((length - gap_total).max(0));

    let before: f64 = siblings[..position].iter().map(|&s| size_of(tree, s)).sum();
    let own = size_of(tree, id);
    let offset = gaps.inner * position as i32;
    let start = origin + (before * available).round() as i32 + offset;
    let end = origin + ((before + own) * available).round() as i32 + offset;

    Ok(match layout {
        Layout::Horizontal => Rect::new(start, parent_rect.y, end - start, parent_rect.height),
        Layout::Vertical => Rect::new(parent_rect.x, start, parent_rect.width, end - start),
    })
}

/// Length in pixels a resizable child of `parent` shares with its siblings
/// along `layout`. Used to convert pixel resize amounts.
pub fn resizable_length(
    tree: &ContainerTree,
    parent: ContainerId,
    layout: Layout,
    gaps: &GapSettings,
) -> TreeResult<i32> {
    let rect = container_rect(tree, parent, gaps)?;
    let count = tree.resizable_children(parent).len() as i32;
    Ok(along(&rect, layout).1 - gaps.inner * (count - 1).max(0))
}
