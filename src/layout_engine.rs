pub mod engine;
mod focus;
pub(crate) mod graph;
mod mutation;
pub mod resize;
mod window_state;

pub use engine::{LayoutCommand, LayoutEngine};
pub use graph::{CycleDirection, Dimension, Direction, Layout};
pub use resize::{MIN_SIZE_PERCENTAGE, ParseResizeAmountError, ResizeAmount};

#[cfg(test)]
pub(crate) mod tests;
