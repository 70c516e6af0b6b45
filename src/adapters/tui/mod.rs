pub mod app;
pub mod event;
pub mod md;
pub mod thread_view;
pub mod widgets;

pub use app::{run_tui, App};
