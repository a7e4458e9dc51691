pub mod geometry;
pub mod headless;
pub mod window_system;
