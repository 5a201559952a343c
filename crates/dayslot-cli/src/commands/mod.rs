pub mod config;
pub mod item;
pub mod now;
pub mod refresh;
pub mod source;
