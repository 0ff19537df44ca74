use ropey::Rope;

use super::cursor::{CursorState, Direction};

/// Viewport state for scroll tracking.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub top_line: usize,
    pub height: u16,
    pub scroll_off: u16,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            top_line: 0,
            height: 24,
            scroll_off: 3,
        }
    }
}

/// A text buffer backed by a Rope, with a single cursor.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    pub rope: Rope,
    pub cursor: CursorState,
    pub viewport: Viewport,
}

impl Buffer {
    pub fn from_text(text: &str, scroll_off: u16) -> Self {
        Self {
            rope: Rope::from_str(text),
            cursor: CursorState::default(),
            viewport: Viewport {
                scroll_off,
                ..Viewport::default()
            },
        }
    }

    /// Total number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Get the text of a specific line (without trailing newline).
    pub fn line_text(&self, idx: usize) -> Option<String> {
        if idx >= self.rope.len_lines() {
            return None;
        }
        let line = self.rope.line(idx);
        let mut s: String = line.chunks().collect();
        if s.ends_with('\n') {
            s.pop();
        }
        if s.ends_with('\r') {
            s.pop();
        }
        Some(s)
    }

    fn line_len(&self, idx: usize) -> usize {
        self.line_text(idx).map(|l| l.len()).unwrap_or(0)
    }

    /// Insert text at the cursor position.
    pub fn insert_str(&mut self, text: &str) {
        let char_idx = self.rope.byte_to_char(self.cursor_byte_offset());
        self.rope.insert(char_idx, text);
        let end = self.cursor_byte_offset() + text.len();
        self.move_cursor_to_byte(end);
    }

    /// Delete the character before the cursor (backspace).
    pub fn delete_char_before(&mut self) -> bool {
        if self.cursor.col == 0 && self.cursor.row == 0 {
            return false;
        }

        let char_idx = self.rope.byte_to_char(self.cursor_byte_offset());
        // Removing the char before a line start joins with the previous line.
        let mut start = char_idx - 1;
        if start > 0 && self.is_crlf_at(start - 1) {
            start -= 1;
        }
        self.rope.remove(start..char_idx);
        let byte_idx = self.rope.char_to_byte(start);
        self.move_cursor_to_byte(byte_idx);
        true
    }

    /// Delete the character under the cursor.
    pub fn delete_char_after(&mut self) -> bool {
        let char_idx = self.rope.byte_to_char(self.cursor_byte_offset());
        if char_idx >= self.rope.len_chars() {
            return false;
        }
        let end = if self.is_crlf_at(char_idx) {
            char_idx + 2
        } else {
            char_idx + 1
        };
        self.rope.remove(char_idx..end);
        true
    }

    /// A `\r\n` pair starts at `char_idx`.
    fn is_crlf_at(&self, char_idx: usize) -> bool {
        char_idx + 1 < self.rope.len_chars()
            && self.rope.char(char_idx) == '\r'
            && self.rope.char(char_idx + 1) == '\n'
    }

    /// Remove the bytes in `start..end` and park the cursor at `start`.
    pub fn remove_bytes(&mut self, start: usize, end: usize) {
        let from = self.rope.byte_to_char(start);
        let to = self.rope.byte_to_char(end);
        self.rope.remove(from..to);
        self.move_cursor_to_byte(start);
    }

    /// Compute the byte offset in the rope for the current cursor position.
    pub fn cursor_byte_offset(&self) -> usize {
        let line_start = self.rope.line_to_byte(self.cursor.row);
        line_start + self.cursor.col
    }

    /// Place the cursor on an absolute byte offset, snapped to a char boundary.
    pub fn move_cursor_to_byte(&mut self, byte_idx: usize) {
        let byte_idx = byte_idx.min(self.rope.len_bytes());
        let byte_idx = self.rope.char_to_byte(self.rope.byte_to_char(byte_idx));
        let row = self.rope.byte_to_line(byte_idx);
        let col = byte_idx - self.rope.line_to_byte(row);
        self.cursor.move_to(row, col);
        self.clamp_cursor();
    }

    pub fn move_cursor(&mut self, dir: Direction) {
        match dir {
            Direction::Up => {
                if self.cursor.row > 0 {
                    self.cursor.row -= 1;
                    self.cursor.col = self.cursor.desired_col;
                }
            }
            Direction::Down => {
                if self.cursor.row < self.line_count().saturating_sub(1) {
                    self.cursor.row += 1;
                    self.cursor.col = self.cursor.desired_col;
                }
            }
            Direction::Left => {
                if self.cursor.col > 0 {
                    let line = self.line_text(self.cursor.row).unwrap_or_default();
                    self.cursor.col = line[..self.cursor.col]
                        .char_indices()
                        .next_back()
                        .map_or(0, |(i, _)| i);
                    self.cursor.desired_col = self.cursor.col;
                }
            }
            Direction::Right => {
                let line = self.line_text(self.cursor.row).unwrap_or_default();
                if let Some(ch) = line[self.cursor.col..].chars().next() {
                    self.cursor.col += ch.len_utf8();
                    self.cursor.desired_col = self.cursor.col;
                }
            }
            Direction::LineStart => {
                self.cursor.col = 0;
                self.cursor.desired_col = 0;
            }
            Direction::LineEnd => {
                let line_len = self.line_len(self.cursor.row);
                self.cursor.col = line_len;
                self.cursor.desired_col = line_len;
            }
        }
        self.clamp_cursor();
    }

    /// Ensure the cursor stays within valid bounds and on a char boundary.
    pub fn clamp_cursor(&mut self) {
        let max_row = self.rope.len_lines().saturating_sub(1);
        self.cursor.row = self.cursor.row.min(max_row);

        let line = self.line_text(self.cursor.row).unwrap_or_default();
        self.cursor.col = crate::editor::floor_char_boundary(&line, self.cursor.col);
    }

    /// Ensure the viewport keeps the cursor visible.
    pub fn scroll_to_cursor(&mut self) {
        let height = self.viewport.height as usize;
        let off = (self.viewport.scroll_off as usize).min(height.saturating_sub(1) / 2);

        if self.cursor.row < self.viewport.top_line + off {
            self.viewport.top_line = self.cursor.row.saturating_sub(off);
        }
        if height > 0 && self.cursor.row + off >= self.viewport.top_line + height {
            self.viewport.top_line = self.cursor.row + off + 1 - height;
        }
    }
}
