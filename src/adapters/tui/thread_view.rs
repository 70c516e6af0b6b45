use chrono::{DateTime, Utc};
use ratatui::prelude::*;

use crate::application::CommentThread;
use crate::domain::{Comment, CommentActions, CommentId, CommentTree};

pub const EMPTY_STATE: &str = "No comments yet. Be the first to comment!";

/// A selectable row of the thread, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub id: CommentId,
    pub is_reply: bool,
}

pub struct RenderedThread {
    pub lines: Vec<Line<'static>>,
    /// Line index at which each visible entry starts.
    pub entry_offsets: Vec<(CommentId, usize)>,
}

impl RenderedThread {
    pub fn offset_of(&self, id: CommentId) -> Option<usize> {
        self.entry_offsets
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, offset)| *offset)
    }
}

/// Roots in order, each followed by its replies unless collapsed.
pub fn visible_entries(tree: &CommentTree, thread: &CommentThread) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(tree.len());
    for root in tree.roots() {
        let id = root.comment().id;
        entries.push(Entry {
            id,
            is_reply: false,
        });
        if thread.is_expanded(id) {
            entries.extend(root.replies().map(|reply| Entry {
                id: reply.id,
                is_reply: true,
            }));
        }
    }
    entries
}

pub fn action_hints(actions: CommentActions) -> Vec<&'static str> {
    let mut hints = Vec::new();
    if actions.can_reply {
        hints.push("[r]eply");
    }
    if actions.can_like {
        hints.push("[l]ike");
    }
    if actions.can_edit {
        hints.push("[e]dit");
    }
    if actions.can_delete {
        hints.push("[d]elete");
    }
    hints
}

pub fn render_thread(
    tree: &CommentTree,
    thread: &CommentThread,
    selected: Option<CommentId>,
    now: DateTime<Utc>,
) -> RenderedThread {
    let mut rendered = RenderedThread {
        lines: Vec::new(),
        entry_offsets: Vec::new(),
    };

    if tree.is_empty() {
        rendered.lines.push(Line::from(Span::styled(
            EMPTY_STATE,
            Style::default().fg(Color::Gray),
        )));
        return rendered;
    }

    for root in tree.roots() {
        let comment = root.comment();
        let reply_count = root.reply_count();
        let expanded = thread.is_expanded(comment.id);

        rendered.entry_offsets.push((comment.id, rendered.lines.len()));
        let mut hints = action_hints(CommentActions::for_comment(thread.viewer(), comment, true))
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        if reply_count > 2 {
            let verb = if expanded { "hide" } else { "show" };
            hints.push(format!("[t] {verb} {reply_count} replies"));
        }
        push_comment(&mut rendered.lines, thread, comment, 0, hints, selected, now);

        if expanded {
            for reply in root.replies() {
                rendered.entry_offsets.push((reply.id, rendered.lines.len()));
                let hints = action_hints(CommentActions::for_comment(thread.viewer(), reply, false))
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                push_comment(&mut rendered.lines, thread, reply, 1, hints, selected, now);
            }
        } else {
            rendered.lines.push(Line::from(Span::styled(
                format!("    … {reply_count} replies hidden"),
                Style::default().fg(Color::DarkGray),
            )));
        }

        rendered.lines.push(Line::from(""));
    }

    rendered
}

fn push_comment(
    lines: &mut Vec<Line<'static>>,
    thread: &CommentThread,
    comment: &Comment,
    depth: usize,
    hints: Vec<String>,
    selected: Option<CommentId>,
    now: DateTime<Utc>,
) {
    let indent = "    ".repeat(depth);
    let is_selected = selected == Some(comment.id);

    let marker = if is_selected { "▶ " } else { "  " };
    let mut name_style = Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD);
    if is_selected {
        name_style = name_style.add_modifier(Modifier::REVERSED);
    }

    let mut header = vec![
        Span::raw(format!("{indent}{marker}")),
        Span::styled(comment.author.username.clone(), name_style),
    ];
    if comment.author.is_staff {
        header.push(Span::styled(" [staff]", Style::default().fg(Color::Magenta)));
    }
    header.push(Span::styled(
        format!(" • {}", comment.time_since(now)),
        Style::default().fg(Color::Gray),
    ));
    // Like counts belong to top-level comments only.
    if depth == 0 {
        let liked = comment.is_liked.unwrap_or(false);
        let (heart, color) = if liked {
            ("♥", Color::Red)
        } else {
            ("♡", Color::Gray)
        };
        header.push(Span::styled(
            format!("  {heart} {}", comment.likes_count),
            Style::default().fg(color),
        ));
        if thread.is_liking(comment.id) {
            header.push(Span::styled(" …", Style::default().fg(Color::DarkGray)));
        }
    }
    lines.push(Line::from(header));

    for text in comment.content.lines() {
        lines.push(Line::from(format!("{indent}    {text}")));
    }

    let mut footer = hints.join(" ");
    if thread.is_deleting(comment.id) {
        footer.push_str(" (deleting…)");
    }
    if !footer.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("{indent}    {footer}"),
            Style::default().fg(Color::DarkGray),
        )));
    }
}
