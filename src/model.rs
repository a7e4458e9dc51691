pub mod container;
pub mod snapshot;
pub mod tree;

pub use container::{ContainerKind, WindowState};
pub use snapshot::CacheNode;
pub use tree::{ContainerId, ContainerTree, TreeError, TreeResult};
