use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ArticleId, DomainError, DomainResult, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub u64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CommentId {
    fn from(id: u64) -> Self {
        CommentId(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: UserId,
    pub username: String,
    pub is_staff: bool,
    pub avatar: Option<String>,
}

/// A single comment as returned by the API. Structure (which comment is a
/// reply of which) lives in [`super::CommentTree`], not on the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub article: ArticleId,
    pub author: CommentAuthor,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub likes_count: u32,
    /// Only present when the list was requested on behalf of a viewer.
    pub is_liked: Option<bool>,
    pub parent: Option<CommentId>,
}

impl Comment {
    /// Format the time since creation for display
    pub fn time_since_created(&self) -> String {
        self.time_since(Utc::now())
    }

    pub fn time_since(&self, now: DateTime<Utc>) -> String {
        let duration = now.signed_duration_since(self.created_at);

        if duration.num_days() > 0 {
            plural(duration.num_days(), "day")
        } else if duration.num_hours() > 0 {
            plural(duration.num_hours(), "hour")
        } else if duration.num_minutes() > 0 {
            plural(duration.num_minutes(), "minute")
        } else {
            "Just now".to_string()
        }
    }

    /// Flip the like flag and move the counter by one in the same direction.
    pub fn apply_like_toggle(&mut self) {
        let liked = !self.is_liked.unwrap_or(false);
        self.is_liked = Some(liked);
        self.likes_count = if liked {
            self.likes_count.saturating_add(1)
        } else {
            self.likes_count.saturating_sub(1)
        };
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Request payload for creating a root comment or a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub article: ArticleId,
    pub content: String,
    pub parent: Option<CommentId>,
}

/// Trims comment text and rejects it when nothing is left.
pub fn validate_content(text: &str) -> DomainResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DomainError::EmptyContent);
    }
    Ok(trimmed.to_string())
}
