pub mod advanced;
pub mod offsets;
pub mod simple;
pub mod sync;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::model::config::EditorConfig;
use crate::model::state::EditorKind;

pub use advanced::AdvancedEditor;
pub use offsets::ByteRange;
pub use simple::SimpleEditor;
pub use sync::PositionSync;

/// What a surface reports back after handling a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The text content changed; read it back with [`EditingSurface::text`].
    Edited,
    /// The primary-action chord was pressed.
    Execute,
}

/// A text-input widget that owns the visible code area.
///
/// Selection offsets are UTF-8 byte offsets into [`EditingSurface::text`].
pub trait EditingSurface {
    fn text(&self) -> String;

    /// Replace the whole content, e.g. after the file changed on disk.
    fn replace_text(&mut self, text: &str);

    fn set_selection(&mut self, range: ByteRange);

    fn selection(&self) -> Option<ByteRange>;

    fn handle_key(&mut self, key: KeyEvent) -> Option<SurfaceEvent>;

    /// Dependency names available to the snippet. Surfaces may ignore them.
    fn set_crates(&mut self, _crates: &[String]) {}

    fn view(&mut self, frame: &mut Frame, area: Rect, focused: bool);
}

impl<S: EditingSurface + ?Sized> EditingSurface for Box<S> {
    fn text(&self) -> String {
        (**self).text()
    }

    fn replace_text(&mut self, text: &str) {
        (**self).replace_text(text);
    }

    fn set_selection(&mut self, range: ByteRange) {
        (**self).set_selection(range);
    }

    fn selection(&self) -> Option<ByteRange> {
        (**self).selection()
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<SurfaceEvent> {
        (**self).handle_key(key)
    }

    fn set_crates(&mut self, crates: &[String]) {
        (**self).set_crates(crates);
    }

    fn view(&mut self, frame: &mut Frame, area: Rect, focused: bool) {
        (**self).view(frame, area, focused);
    }
}

/// Build the surface variant for `kind`, loaded with `code`.
pub fn surface_for(
    kind: EditorKind,
    code: &str,
    crates: &[String],
    config: &EditorConfig,
) -> Box<dyn EditingSurface> {
    let mut surface: Box<dyn EditingSurface> = match kind {
        EditorKind::Simple => Box::new(SimpleEditor::new(code, config.tab_width)),
        EditorKind::Advanced => Box::new(AdvancedEditor::new(code, config)),
    };
    surface.set_crates(crates);
    surface
}

/// Ctrl/Cmd+Enter runs the primary action. F5 too, since many terminals
/// never report a modified Enter.
pub fn is_execute_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Enter => key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER | KeyModifiers::META),
        KeyCode::F(5) => true,
        _ => false,
    }
}

/// A character key that types text: no modifier besides Shift.
pub(crate) fn is_typed_char(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char(_))
        && (key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT)
}

/// Largest char boundary of `text` at or before `offset`.
pub(crate) fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// One display line, with the part inside `selection` shown reversed.
/// `line_start` is the byte offset of `line` within the whole text.
pub(crate) fn render_line(
    line: &str,
    line_start: usize,
    selection: Option<ByteRange>,
) -> Line<'static> {
    let line_end = line_start + line.len();
    let Some(sel) = selection.filter(|s| s.start < line_end && s.end > line_start) else {
        return Line::raw(line.to_string());
    };

    let from = floor_char_boundary(line, sel.start.saturating_sub(line_start));
    let to = floor_char_boundary(line, sel.end.min(line_end) - line_start);
    Line::from(vec![
        Span::raw(line[..from].to_string()),
        Span::styled(
            line[from..to].to_string(),
            Style::default().add_modifier(Modifier::REVERSED),
        ),
        Span::raw(line[to..].to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_enter_executes() {
        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL);
        assert!(is_execute_key(&key));
    }

    #[test]
    fn plain_enter_does_not_execute() {
        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert!(!is_execute_key(&key));
    }

    #[test]
    fn only_plain_or_shifted_chars_type() {
        assert!(is_typed_char(&KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE)));
        assert!(is_typed_char(&KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT)));
        assert!(!is_typed_char(&KeyEvent::new(KeyCode::Char('a'), KeyModifiers::ALT)));
        assert!(!is_typed_char(&KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL)));
        assert!(!is_typed_char(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
    }

    #[test]
    fn f5_executes() {
        assert!(is_execute_key(&KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE)));
    }

    #[test]
    fn render_line_marks_selected_part() {
        let line = render_line("let x = 1;", 10, Some(ByteRange::new(14, 15)));
        let parts: Vec<&str> = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(parts, ["let ", "x", " = 1;"]);
    }

    #[test]
    fn render_line_ignores_selection_elsewhere() {
        let line = render_line("abc", 0, Some(ByteRange::new(5, 9)));
        assert_eq!(line.spans.len(), 1);
    }

    #[test]
    fn floor_boundary_steps_back_inside_multibyte_char() {
        let text = "aé";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(floor_char_boundary(text, 3), 3);
        assert_eq!(floor_char_boundary(text, 99), 3);
    }
}
