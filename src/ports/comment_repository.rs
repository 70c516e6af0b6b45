use crate::domain::{Article, ArticleId, Comment, CommentId, NewComment, UserId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {}", .0.as_deref().unwrap_or("no detail"))]
    Authentication(Option<String>),

    #[error("Forbidden: {}", .0.as_deref().unwrap_or("no detail"))]
    Forbidden(Option<String>),

    #[error("Not found: {}", .0.as_deref().unwrap_or("no detail"))]
    NotFound(Option<String>),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimit(u64),

    #[error("API error (HTTP {status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Api { status: u16, detail: Option<String> },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RepositoryError::Authentication(_))
    }

    /// The server-supplied `detail` text, if the failure carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            RepositoryError::Api { detail, .. }
            | RepositoryError::Authentication(detail)
            | RepositoryError::Forbidden(detail)
            | RepositoryError::NotFound(detail) => detail.as_deref(),
            _ => None,
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone, PartialEq)]
pub struct CommentQuery {
    pub article: ArticleId,
    /// Asks the server to annotate `is_liked` for this user.
    pub include_likes: Option<UserId>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn list_comments(&self, query: &CommentQuery) -> RepositoryResult<Vec<Comment>>;
    async fn create_comment(&self, comment: &NewComment) -> RepositoryResult<Comment>;
    async fn toggle_like(&self, id: CommentId) -> RepositoryResult<()>;
    async fn delete_comment(&self, id: CommentId) -> RepositoryResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn get_article(&self, id: ArticleId) -> RepositoryResult<Article>;
}
