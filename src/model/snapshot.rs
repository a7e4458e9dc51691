//! Serializable view of the container tree.
//!
//! Written to the recovery cache and carried by broadcast events. Keys are
//! PascalCase and must stay stable for external readers.

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::layout_engine::{Layout, LayoutEngine};
use crate::model::container::{ContainerKind, ContainerType};
use crate::model::tree::{ContainerId, TreeResult};
use crate::sys::geometry::{Rect, RectDelta};

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CacheNode {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(rename = "Type")]
    pub container_type: ContainerType,
    pub focus_index: usize,
    pub device_name: Option<String>,
    pub name: Option<String>,
    pub layout: Option<Layout>,
    pub is_monocle: Option<bool>,
    pub size_percentage: Option<f64>,
    pub floating_placement: Option<Rect>,
    pub border_delta: Option<RectDelta>,
    /// Hex formatted, e.g. `0x1f4`.
    pub handle: Option<String>,
    pub previous_state: Option<ContainerType>,
    pub children: Vec<CacheNode>,
}

impl CacheNode {
    pub fn capture(engine: &LayoutEngine, id: ContainerId) -> TreeResult<CacheNode> {
        let tree = engine.tree();
        let node = tree.get(id)?;
        let rect = engine.container_rect(id)?;
        let mut snapshot = CacheNode {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            container_type: node.kind.container_type(),
            focus_index: tree.focus_index(id).unwrap_or_default(),
            device_name: None,
            name: None,
            layout: None,
            is_monocle: None,
            size_percentage: None,
            floating_placement: None,
            border_delta: None,
            handle: None,
            previous_state: None,
            children: Vec::with_capacity(node.children().len()),
        };

        match &node.kind {
            ContainerKind::Root => {}
            ContainerKind::Monitor(monitor) => {
                snapshot.device_name = Some(monitor.device_name.clone());
            }
            ContainerKind::Workspace(workspace) => {
                snapshot.name = Some(workspace.name.clone());
                snapshot.layout = Some(workspace.layout);
                snapshot.is_monocle = Some(workspace.is_monocle);
            }
            ContainerKind::Split(split) => {
                snapshot.layout = Some(split.layout);
                snapshot.size_percentage = Some(split.size_percentage);
            }
            ContainerKind::Window(window) => {
                snapshot.floating_placement = Some(window.floating_placement);
                snapshot.border_delta = Some(window.border_delta);
                snapshot.handle = Some(window.handle.to_string());
                snapshot.size_percentage = node.kind.size_percentage();
                snapshot.previous_state = window.state.previous_type();
            }
        }

        for &child in node.children() {
            snapshot.children.push(CacheNode::capture(engine, child)?);
        }
        Ok(snapshot)
    }

    /// Snapshot of the whole tree.
    pub fn capture_tree(engine: &LayoutEngine) -> TreeResult<CacheNode> {
        CacheNode::capture(engine, engine.tree().root())
    }

    pub fn write_to(&self, writer: impl Write) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::layout_engine::tests::Harness;
    use crate::model::container::WindowState;

    #[test]
    fn recovery_json_uses_stable_names() {
        let mut h = Harness::new();
        let a = h.tiling(h.workspace);
        let split = h.split(h.workspace, Layout::Vertical);
        let _b = h.tiling(split);
        let c = h.tiling(split);
        h.engine.set_minimized(c).unwrap();
        h.engine.set_focused_descendant(a, None).unwrap();

        let snapshot = CacheNode::capture_tree(&h.engine).unwrap();
        let mut buf = Vec::new();
        snapshot.write_to(&mut buf).unwrap();
        let value: Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(json!("RootContainer"), value["Type"]);
        assert_eq!(json!(0), value["FocusIndex"]);
        let monitor = &value["Children"][0];
        assert_eq!(json!("Monitor"), monitor["Type"]);
        assert_eq!(json!("DISPLAY1"), monitor["DeviceName"]);
        let workspace = &monitor["Children"][0];
        assert_eq!(json!("1"), workspace["Name"]);
        assert_eq!(json!("horizontal"), workspace["Layout"]);
        assert_eq!(json!(false), workspace["IsMonocle"]);

        let window = &workspace["Children"][0];
        assert_eq!(json!("TilingWindow"), window["Type"]);
        assert_eq!(json!("0x1"), window["Handle"]);
        assert_eq!(json!(0), window["FocusIndex"]);
        assert_eq!(json!(0), window["X"]);
        assert_eq!(json!(500), window["Width"]);
        assert_eq!(json!(400), window["FloatingPlacement"]["Width"]);
        assert!(window.get("PreviousState").is_none());
        assert!(window.get("DeviceName").is_none());

        let split = &workspace["Children"][1];
        assert_eq!(json!("SplitContainer"), split["Type"]);
        assert_eq!(json!("vertical"), split["Layout"]);
        assert_eq!(json!(0.5), split["SizePercentage"]);
        let minimized = &split["Children"][1];
        assert_eq!(json!("MinimizedWindow"), minimized["Type"]);
        assert_eq!(json!("TilingWindow"), minimized["PreviousState"]);
        assert!(minimized.get("SizePercentage").is_none());
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut h = Harness::new();
        let f = h.window(WindowState::Floating);
        h.engine.attach_container(f, h.workspace, 0).unwrap();
        let snapshot = CacheNode::capture(&h.engine, h.workspace).unwrap();
        let text = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(snapshot, serde_json::from_str::<CacheNode>(&text).unwrap());
        assert_eq!(ContainerType::FloatingWindow, snapshot.children[0].container_type);
    }
}
