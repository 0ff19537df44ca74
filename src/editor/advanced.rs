use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use super::{ByteRange, EditingSurface, SurfaceEvent, is_execute_key, is_typed_char, render_line};
use crate::model::buffer::Buffer;
use crate::model::config::EditorConfig;
use crate::model::cursor::Direction;

/// Rope-backed editor with a line-number gutter, scroll-off and crate-name
/// completion on Ctrl+Space.
#[derive(Debug, Clone)]
pub struct AdvancedEditor {
    buffer: Buffer,
    selection: Option<ByteRange>,
    crates: Vec<String>,
    tab_width: u16,
    line_numbers: bool,
}

impl AdvancedEditor {
    pub fn new(text: &str, config: &EditorConfig) -> Self {
        Self {
            buffer: Buffer::from_text(text, config.scroll_off),
            selection: None,
            crates: Vec::new(),
            tab_width: config.tab_width,
            line_numbers: config.line_numbers,
        }
    }

    fn delete_selection(&mut self) -> bool {
        match self.selection.take() {
            Some(sel) if !sel.is_caret() => {
                self.buffer.remove_bytes(sel.start, sel.end);
                true
            }
            _ => false,
        }
    }

    fn insert(&mut self, text: &str) {
        self.delete_selection();
        self.buffer.insert_str(text);
    }

    fn move_cursor(&mut self, dir: Direction) {
        self.selection = None;
        self.buffer.move_cursor(dir);
    }

    /// Complete the identifier before the cursor with the first crate name
    /// that extends it.
    fn complete_crate(&mut self) -> bool {
        let line = self.buffer.line_text(self.buffer.cursor.row).unwrap_or_default();
        let before = &line[..self.buffer.cursor.col];
        let word_start = before
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
            .last()
            .map_or(before.len(), |(i, _)| i);
        let prefix = &before[word_start..];
        if prefix.is_empty() {
            return false;
        }

        let Some(rest) = self
            .crates
            .iter()
            .find(|name| name.len() > prefix.len() && name.starts_with(prefix))
            .map(|name| name[prefix.len()..].to_string())
        else {
            return false;
        };

        tracing::debug!(prefix, completion = %rest, "completing crate name");
        self.insert(&rest);
        true
    }

    fn gutter_width(&self) -> usize {
        if self.line_numbers {
            self.buffer.line_count().to_string().len() + 1
        } else {
            0
        }
    }
}

impl EditingSurface for AdvancedEditor {
    fn text(&self) -> String {
        self.buffer.rope.to_string()
    }

    fn replace_text(&mut self, text: &str) {
        let offset = self.buffer.cursor_byte_offset();
        self.buffer.rope = ropey::Rope::from_str(text);
        self.buffer.move_cursor_to_byte(offset);
        self.selection = None;
    }

    fn set_selection(&mut self, range: ByteRange) {
        let range = range.clamp(self.buffer.rope.len_bytes());
        self.buffer.move_cursor_to_byte(range.start);
        let start = self.buffer.cursor_byte_offset();
        self.buffer.move_cursor_to_byte(range.end);
        let end = self.buffer.cursor_byte_offset();

        self.selection = Some(ByteRange::new(start, end));
        self.buffer.scroll_to_cursor();
    }

    fn selection(&self) -> Option<ByteRange> {
        self.selection
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<SurfaceEvent> {
        if is_execute_key(&key) {
            return Some(SurfaceEvent::Execute);
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let edited = match key.code {
            KeyCode::Char(' ') if ctrl => self.complete_crate(),
            KeyCode::Char(ch) if is_typed_char(&key) => {
                let mut buf = [0; 4];
                self.insert(ch.encode_utf8(&mut buf));
                true
            }
            KeyCode::Enter => {
                self.insert("\n");
                true
            }
            KeyCode::Tab => {
                self.insert(&" ".repeat(self.tab_width as usize));
                true
            }
            KeyCode::Backspace => self.delete_selection() || self.buffer.delete_char_before(),
            KeyCode::Delete => self.delete_selection() || self.buffer.delete_char_after(),
            KeyCode::Left => {
                self.move_cursor(Direction::Left);
                false
            }
            KeyCode::Right => {
                self.move_cursor(Direction::Right);
                false
            }
            KeyCode::Up => {
                self.move_cursor(Direction::Up);
                false
            }
            KeyCode::Down => {
                self.move_cursor(Direction::Down);
                false
            }
            KeyCode::Home => {
                self.move_cursor(Direction::LineStart);
                false
            }
            KeyCode::End => {
                self.move_cursor(Direction::LineEnd);
                false
            }
            _ => false,
        };

        self.buffer.scroll_to_cursor();
        edited.then_some(SurfaceEvent::Edited)
    }

    fn set_crates(&mut self, crates: &[String]) {
        self.crates = crates.to_vec();
    }

    fn view(&mut self, frame: &mut Frame, area: Rect, focused: bool) {
        self.buffer.viewport.height = area.height;
        self.buffer.scroll_to_cursor();

        let gutter = self.gutter_width();
        let top = self.buffer.viewport.top_line;
        let bottom = (top + area.height as usize).min(self.buffer.line_count());

        let lines: Vec<Line<'static>> = (top..bottom)
            .map(|i| {
                let text = self.buffer.line_text(i).unwrap_or_default();
                let start = self.buffer.rope.line_to_byte(i);
                let mut line = render_line(&text, start, self.selection);
                if gutter > 0 {
                    let number = Span::styled(
                        format!("{:>width$} ", i + 1, width = gutter - 1),
                        Style::default().fg(Color::DarkGray),
                    );
                    line.spans.insert(0, number);
                }
                line
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), area);

        if focused {
            let cursor = self.buffer.cursor;
            let line = self.buffer.line_text(cursor.row).unwrap_or_default();
            let x = (gutter + line[..cursor.col].chars().count()) as u16;
            let y = (cursor.row - top) as u16;
            if x < area.width && y < area.height {
                frame.set_cursor_position((area.x + x, area.y + y));
            }
        }
    }
}
