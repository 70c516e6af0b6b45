use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::*;
use crate::ports::RepositoryError;

// Error body shape used by the site's API
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: Option<String>,
}

// DTOs for API communication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorDto {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub is_staff: bool,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentDto {
    pub id: u64,
    pub article: u64,
    pub author: AuthorDto,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    pub likes_count: u32,
    pub is_liked: Option<bool>,
    pub parent: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleDto {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub author: ArticleAuthorDto,
    pub created_at: String,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub views_count: u64,
    #[serde(default)]
    pub likes_count: u64,
    pub is_liked: Option<bool>,
}

/// Articles come back either with a nested author object or a bare username.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleAuthorDto {
    Named { username: String },
    Plain(String),
}

// Request DTOs
#[derive(Debug, Serialize)]
pub struct CommentCreateDto {
    pub article: u64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct LikeDto {
    pub comment_id: u64,
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Serialization(format!("Invalid {field} '{value}': {e}")))
}

// Conversion implementations
impl TryFrom<CommentDto> for Comment {
    type Error = RepositoryError;

    fn try_from(dto: CommentDto) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CommentId(dto.id),
            article: ArticleId(dto.article),
            author: dto.author.into(),
            content: dto.content,
            created_at: parse_timestamp("created_at", &dto.created_at)?,
            likes_count: dto.likes_count,
            is_liked: dto.is_liked,
            parent: dto.parent.map(CommentId),
        })
    }
}

impl From<AuthorDto> for CommentAuthor {
    fn from(dto: AuthorDto) -> Self {
        Self {
            id: UserId(dto.id),
            username: dto.username,
            is_staff: dto.is_staff,
            avatar: dto.avatar,
        }
    }
}

impl TryFrom<ArticleDto> for Article {
    type Error = RepositoryError;

    fn try_from(dto: ArticleDto) -> Result<Self, Self::Error> {
        let created_at = parse_timestamp("created_at", &dto.created_at)?;
        let updated_at = match dto.updated_at.as_deref() {
            Some(value) => parse_timestamp("updated_at", value)?,
            None => created_at,
        };

        Ok(Self {
            id: ArticleId(dto.id),
            title: dto.title,
            content: dto.content,
            author: match dto.author {
                ArticleAuthorDto::Named { username } => username,
                ArticleAuthorDto::Plain(name) => name,
            },
            created_at,
            updated_at,
            views_count: dto.views_count,
            likes_count: dto.likes_count,
            is_liked: dto.is_liked,
        })
    }
}

impl From<&NewComment> for CommentCreateDto {
    fn from(comment: &NewComment) -> Self {
        Self {
            article: comment.article.0,
            content: comment.content.clone(),
            parent: comment.parent.map(|p| p.0),
        }
    }
}
