use serde::{Deserialize, Serialize};

use crate::layout_engine::Layout;
use crate::model::snapshot::CacheNode;
use crate::sys::window_system::WindowHandle;

/// Notifications for bars and other external consumers. Each carries
/// enough of the tree to update without querying it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum BroadcastEvent {
    FocusChanged { container: CacheNode },
    LayoutChanged { container: CacheNode, layout: Layout },
    TilingDirectionChanged { direction: Layout },
    WorkspaceActivated { workspace: CacheNode },
    WorkspaceDeactivated { workspace: CacheNode },
    WorkspaceAttached { workspace: CacheNode, monitor: String },
    WorkspaceDetached { workspace: CacheNode, monitor: String },
    BindingModeChanged { active: Vec<String> },
    WindowManaged { window: CacheNode },
    WindowUnmanaged { handle: WindowHandle },
}

pub type BroadcastSender = crate::actor::Sender<BroadcastEvent>;
pub type BroadcastReceiver = crate::actor::Receiver<BroadcastEvent>;
