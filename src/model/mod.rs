pub mod buffer;
pub mod config;
pub mod cursor;
pub mod diagnostic;
pub mod mode;
pub mod state;
