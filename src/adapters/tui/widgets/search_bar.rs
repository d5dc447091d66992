use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

/// Single-line text input. Used for the project search and for typing notes.
pub struct SearchBar {
    title: &'static str,
    placeholder: &'static str,
    query: String,
    // In characters, not bytes.
    cursor_position: usize,
    is_focused: bool,
}

impl SearchBar {
    pub fn new(title: &'static str, placeholder: &'static str) -> Self {
        Self {
            title,
            placeholder,
            query: String::new(),
            cursor_position: 0,
            is_focused: false,
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    pub fn is_focused(&self) -> bool {
        self.is_focused
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.query
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.query.len())
    }

    pub fn insert_char(&mut self, c: char) {
        let index = self.byte_index(self.cursor_position);
        self.query.insert(index, c);
        self.cursor_position += 1;
    }

    /// Backspace.
    pub fn delete_char(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        let index = self.byte_index(self.cursor_position - 1);
        self.query.remove(index);
        self.cursor_position -= 1;
    }

    /// Delete the character under the cursor.
    pub fn delete_forward(&mut self) {
        if self.cursor_position < self.query.chars().count() {
            let index = self.byte_index(self.cursor_position);
            self.query.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.cursor_position = 0;
    }

    /// Empty the input and hand back what was typed.
    pub fn take(&mut self) -> String {
        self.cursor_position = 0;
        std::mem::take(&mut self.query)
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let title = if self.is_focused {
            format!("{} (focused)", self.title)
        } else {
            self.title.to_string()
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

        let (text, text_style) = if self.query.is_empty() {
            (self.placeholder, Style::default().fg(Color::DarkGray))
        } else {
            (self.query.as_str(), Style::default())
        };

        frame.render_widget(Paragraph::new(text).block(block).style(text_style), area);

        if self.is_focused {
            let cursor_x = area.x + 1 + self.cursor_position as u16;
            let cursor_y = area.y + 1;

            if cursor_x < area.x + area.width.saturating_sub(1) {
                frame.set_cursor_position(ratatui::layout::Position { x: cursor_x, y: cursor_y });
            }
        }
    }
}
