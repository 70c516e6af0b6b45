pub mod comment_service;
pub mod comment_thread;
pub mod error;

pub use comment_service::*;
pub use comment_thread::*;
pub use error::*;
