pub mod command;
pub mod monitor;
pub mod window;
pub mod workspace;
