use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::domain::CommentId;

/// Single-line comment input. The cursor counts chars, not bytes.
pub struct ComposerInput {
    text: String,
    cursor_position: usize,
    is_focused: bool,
}

impl ComposerInput {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            cursor_position: 0,
            is_focused: false,
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor_position = self.text.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_index = self.byte_index();
        self.text.insert(byte_index, c);
        self.cursor_position += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        self.cursor_position -= 1;
        let byte_index = self.byte_index();
        self.text.remove(byte_index);
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor_position = 0;
    }

    fn byte_index(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        reply_to: Option<CommentId>,
        editing: Option<CommentId>,
    ) {
        let title = match (editing, reply_to) {
            (Some(id), _) => format!("Editing #{id} (posts as a new comment)"),
            (None, Some(id)) => format!("Replying to #{id}"),
            (None, None) => "New comment".to_string(),
        };

        let border_style = if self.is_focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style);

        let (content, style) = if self.text.is_empty() {
            let hint = if self.is_focused {
                "Write a comment, Enter to post, Esc to cancel"
            } else {
                "Press c to comment, r to reply"
            };
            (hint, Style::default().fg(Color::DarkGray))
        } else {
            (self.text.as_str(), Style::default())
        };

        let paragraph = Paragraph::new(content)
            .block(block)
            .style(style)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);

        if self.is_focused {
            let cursor_x = area.x + 1 + self.cursor_position as u16;
            let cursor_y = area.y + 1;

            if cursor_x < area.x + area.width.saturating_sub(1) {
                frame.set_cursor_position(ratatui::layout::Position {
                    x: cursor_x,
                    y: cursor_y,
                });
            }
        }
    }
}

impl Default for ComposerInput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editing_multibyte_text() {
        let mut input = ComposerInput::new();
        for c in "héllo".chars() {
            input.insert_char(c);
        }
        input.delete_char();
        input.delete_char();
        assert_eq!(input.text(), "hél");

        input.set_text("ñandú");
        input.insert_char('!');
        assert_eq!(input.text(), "ñandú!");

        input.clear();
        input.delete_char();
        assert_eq!(input.text(), "");
    }
}
