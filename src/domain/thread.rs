use serde::Serialize;
use std::collections::HashMap;

use super::{Comment, CommentId};

/// Two-level comment thread rebuilt from the flat list the API returns.
///
/// Comments live in an arena and the thread structure only holds indices into
/// it, so a reply never owns (or is owned by) its parent. Nesting is capped at
/// one level: a reply to a reply is attached to the root it descends from.
#[derive(Debug, Clone, Default)]
pub struct CommentTree {
    arena: Vec<Comment>,
    index: HashMap<CommentId, usize>,
    slots: Vec<ThreadSlot>,
    /// Arena index -> slot index, set for roots only.
    slot_of: Vec<Option<usize>>,
}

#[derive(Debug, Clone)]
struct ThreadSlot {
    root: usize,
    replies: Vec<usize>,
}

impl CommentTree {
    pub fn build(comments: Vec<Comment>) -> Self {
        let mut index = HashMap::with_capacity(comments.len());
        for (i, comment) in comments.iter().enumerate() {
            index.entry(comment.id).or_insert(i);
        }

        let ancestors: Vec<Option<usize>> = (0..comments.len())
            .map(|i| root_ancestor(&comments, &index, i))
            .collect();

        let mut slots = Vec::new();
        let mut slot_of = vec![None; comments.len()];
        for (i, ancestor) in ancestors.iter().enumerate() {
            if ancestor.is_none() {
                slot_of[i] = Some(slots.len());
                slots.push(ThreadSlot {
                    root: i,
                    replies: Vec::new(),
                });
            }
        }
        for (i, ancestor) in ancestors.iter().enumerate() {
            if let Some(slot) = ancestor.and_then(|root| slot_of[root]) {
                slots[slot].replies.push(i);
            }
        }

        // Newest first everywhere; the sort is stable so ties keep input order.
        let newest_first = |a: &usize, b: &usize| comments[*b].created_at.cmp(&comments[*a].created_at);
        slots.sort_by(|a, b| newest_first(&a.root, &b.root));
        for slot in &mut slots {
            slot.replies.sort_by(newest_first);
        }
        for (position, slot) in slots.iter().enumerate() {
            slot_of[slot.root] = Some(position);
        }

        Self {
            arena: comments,
            index,
            slots,
            slot_of,
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = ThreadView<'_>> {
        self.slots.iter().map(move |slot| ThreadView { tree: self, slot })
    }

    pub fn thread(&self, root: CommentId) -> Option<ThreadView<'_>> {
        let slot = self.slot_index(root)?;
        Some(ThreadView {
            tree: self,
            slot: &self.slots[slot],
        })
    }

    /// Total number of comments, roots and replies alike.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn root_count(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.index.get(&id).map(|&i| &self.arena[i])
    }

    pub fn get_mut(&mut self, id: CommentId) -> Option<&mut Comment> {
        self.index.get(&id).map(|&i| &mut self.arena[i])
    }

    /// Whether `id` is shown at the top level, which includes orphans.
    pub fn is_root(&self, id: CommentId) -> bool {
        self.slot_index(id).is_some()
    }

    /// Serializable nested form, roots carrying their replies.
    pub fn to_nested(&self) -> Vec<CommentNode> {
        self.roots()
            .map(|thread| CommentNode {
                comment: thread.comment().clone(),
                replies: thread.replies().cloned().collect(),
            })
            .collect()
    }

    fn slot_index(&self, id: CommentId) -> Option<usize> {
        self.index.get(&id).and_then(|&i| self.slot_of[i])
    }
}

/// Follows parent links from `start` to the top-most comment it hangs under.
/// Returns `None` when `start` itself is top-level: no parent, a parent that is
/// not in the list, or a parent chain that loops.
fn root_ancestor(
    comments: &[Comment],
    index: &HashMap<CommentId, usize>,
    start: usize,
) -> Option<usize> {
    let mut current = start;
    for _ in 0..comments.len() {
        let Some(parent) = comments[current]
            .parent
            .and_then(|id| index.get(&id).copied())
        else {
            return (current != start).then_some(current);
        };
        if parent == start {
            return None;
        }
        current = parent;
    }
    None
}

/// One root comment together with its replies.
#[derive(Clone, Copy)]
pub struct ThreadView<'a> {
    tree: &'a CommentTree,
    slot: &'a ThreadSlot,
}

impl<'a> ThreadView<'a> {
    pub fn comment(&self) -> &'a Comment {
        &self.tree.arena[self.slot.root]
    }

    pub fn replies(&self) -> impl Iterator<Item = &'a Comment> + 'a {
        let arena = &self.tree.arena;
        self.slot.replies.iter().map(move |&i| &arena[i])
    }

    pub fn reply_count(&self) -> usize {
        self.slot.replies.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}
