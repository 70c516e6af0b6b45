pub mod api;
pub mod cache;
pub mod config;
pub mod prompt;
pub mod tui;
