pub mod client;
pub mod comment_repo;
pub mod dto;

pub use client::*;
pub use comment_repo::*;
pub use dto::*;
