pub mod article;
pub mod comment;
pub mod error;
pub mod thread;
pub mod user;

pub use article::*;
pub use comment::*;
pub use error::*;
pub use thread::*;
pub use user::*;
