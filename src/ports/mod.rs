pub mod cache;
pub mod comment_repository;
pub mod config_store;
pub mod confirm;

pub use cache::*;
pub use comment_repository::*;
pub use config_store::*;
pub use confirm::*;
