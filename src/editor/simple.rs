use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::widgets::Paragraph;

use super::{
    ByteRange, EditingSurface, SurfaceEvent, floor_char_boundary, is_execute_key, is_typed_char,
};

/// A plain textarea: one `String`, a byte caret and an optional selection.
#[derive(Debug, Clone)]
pub struct SimpleEditor {
    text: String,
    caret: usize,
    selection: Option<ByteRange>,
    tab_width: u16,
    top_line: usize,
}

impl SimpleEditor {
    pub fn new(text: &str, tab_width: u16) -> Self {
        Self {
            text: text.to_string(),
            caret: 0,
            selection: None,
            tab_width,
            top_line: 0,
        }
    }

    fn line_start(&self, offset: usize) -> usize {
        self.text[..offset].rfind('\n').map_or(0, |i| i + 1)
    }

    fn line_end(&self, offset: usize) -> usize {
        self.text[offset..]
            .find('\n')
            .map_or(self.text.len(), |i| offset + i)
    }

    fn row_of(&self, offset: usize) -> usize {
        self.text[..offset].matches('\n').count()
    }

    fn prev_boundary(&self, offset: usize) -> usize {
        self.text[..offset]
            .char_indices()
            .next_back()
            .map_or(0, |(i, _)| i)
    }

    fn next_boundary(&self, offset: usize) -> usize {
        self.text[offset..]
            .chars()
            .next()
            .map_or(offset, |c| offset + c.len_utf8())
    }

    /// Remove the selected text, if any, leaving the caret where it was.
    fn delete_selection(&mut self) -> bool {
        match self.selection.take() {
            Some(sel) if !sel.is_caret() => {
                self.text.replace_range(sel.start..sel.end, "");
                self.caret = sel.start;
                true
            }
            _ => false,
        }
    }

    fn insert_str(&mut self, s: &str) {
        self.delete_selection();
        self.text.insert_str(self.caret, s);
        self.caret += s.len();
    }

    fn backspace(&mut self) -> bool {
        if self.delete_selection() {
            return true;
        }
        if self.caret == 0 {
            return false;
        }
        let start = self.prev_boundary(self.caret);
        self.text.replace_range(start..self.caret, "");
        self.caret = start;
        true
    }

    fn delete_forward(&mut self) -> bool {
        if self.delete_selection() {
            return true;
        }
        let end = self.next_boundary(self.caret);
        if end == self.caret {
            return false;
        }
        self.text.replace_range(self.caret..end, "");
        true
    }

    fn move_vertical(&mut self, down: bool) {
        let start = self.line_start(self.caret);
        let column = self.caret - start;

        let target_start = if down {
            let end = self.line_end(self.caret);
            if end == self.text.len() {
                return;
            }
            end + 1
        } else {
            if start == 0 {
                return;
            }
            self.line_start(start - 1)
        };

        let target_end = self.line_end(target_start);
        let line = &self.text[target_start..target_end];
        self.caret = target_start + floor_char_boundary(line, column);
    }

    /// Collapse the selection toward one side, textarea style.
    fn collapse_selection(&mut self, to_end: bool) -> bool {
        match self.selection.take() {
            Some(sel) if !sel.is_caret() => {
                self.caret = if to_end { sel.end } else { sel.start };
                true
            }
            _ => false,
        }
    }

    fn scroll_to_caret(&mut self, height: usize) {
        let row = self.row_of(self.caret);
        if row < self.top_line {
            self.top_line = row;
        } else if height > 0 && row >= self.top_line + height {
            self.top_line = row + 1 - height;
        }
    }
}

impl EditingSurface for SimpleEditor {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn replace_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.caret = floor_char_boundary(&self.text, self.caret);
        self.selection = None;
    }

    fn set_selection(&mut self, range: ByteRange) {
        let range = range.clamp(self.text.len());
        let start = floor_char_boundary(&self.text, range.start);
        let end = floor_char_boundary(&self.text, range.end);
        self.selection = Some(ByteRange::new(start, end));
        self.caret = end;
    }

    fn selection(&self) -> Option<ByteRange> {
        self.selection
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<SurfaceEvent> {
        if is_execute_key(&key) {
            return Some(SurfaceEvent::Execute);
        }

        let edited = match key.code {
            KeyCode::Char(ch) if is_typed_char(&key) => {
                let mut buf = [0; 4];
                self.insert_str(ch.encode_utf8(&mut buf));
                true
            }
            KeyCode::Enter => {
                self.insert_str("\n");
                true
            }
            KeyCode::Tab => {
                self.insert_str(&" ".repeat(self.tab_width as usize));
                true
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete_forward(),
            KeyCode::Left => {
                if !self.collapse_selection(false) {
                    self.caret = self.prev_boundary(self.caret);
                }
                false
            }
            KeyCode::Right => {
                if !self.collapse_selection(true) {
                    self.caret = self.next_boundary(self.caret);
                }
                false
            }
            KeyCode::Up => {
                self.selection = None;
                self.move_vertical(false);
                false
            }
            KeyCode::Down => {
                self.selection = None;
                self.move_vertical(true);
                false
            }
            KeyCode::Home => {
                self.selection = None;
                self.caret = self.line_start(self.caret);
                false
            }
            KeyCode::End => {
                self.selection = None;
                self.caret = self.line_end(self.caret);
                false
            }
            _ => false,
        };

        edited.then_some(SurfaceEvent::Edited)
    }

    fn view(&mut self, frame: &mut Frame, area: Rect, focused: bool) {
        let height = area.height as usize;
        self.scroll_to_caret(height);

        let mut line_start = 0;
        let lines: Vec<_> = self
            .text
            .split('\n')
            .enumerate()
            .filter_map(|(row, line)| {
                let start = line_start;
                line_start += line.len() + 1;
                (row >= self.top_line && row < self.top_line + height)
                    .then(|| super::render_line(line, start, self.selection))
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), area);

        if focused {
            let start = self.line_start(self.caret);
            let x = self.text[start..self.caret].chars().count() as u16;
            let y = (self.row_of(self.caret) - self.top_line) as u16;
            if x < area.width && y < area.height {
                frame.set_cursor_position((area.x + x, area.y + y));
            }
        }
    }
}
