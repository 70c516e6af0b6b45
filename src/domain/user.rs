use serde::{Deserialize, Serialize};
use std::fmt;

use super::Comment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        UserId(id)
    }
}

/// The authenticated user of this client, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: UserId,
    pub is_staff: bool,
}

impl Viewer {
    pub fn new(id: impl Into<UserId>, is_staff: bool) -> Self {
        Self {
            id: id.into(),
            is_staff,
        }
    }

    /// Authors may edit and delete their own comments; staff may touch any.
    pub fn can_modify(&self, comment: &Comment) -> bool {
        self.is_staff || comment.author.id == self.id
    }
}

/// What a viewer may do with one comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommentActions {
    pub can_like: bool,
    pub can_reply: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl CommentActions {
    pub fn for_comment(viewer: Option<&Viewer>, comment: &Comment, is_root: bool) -> Self {
        let can_modify = viewer.is_some_and(|v| v.can_modify(comment));
        Self {
            // likes are a top-level affordance only
            can_like: viewer.is_some() && is_root,
            can_reply: true,
            can_edit: can_modify,
            can_delete: can_modify,
        }
    }
}
