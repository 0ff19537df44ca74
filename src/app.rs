use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::editor::{self, EditingSurface, PositionSync, SurfaceEvent};
use crate::model::config::AppConfig;
use crate::model::diagnostic::Level;
use crate::model::mode::Mode;
use crate::model::state::{Action, BuildStatus, Position, State};
use crate::msg::Msg;
use crate::runner::{BuildReport, Runner};

/// Watcher events this soon after our own save are echoes of it.
const SAVE_ECHO_WINDOW: Duration = Duration::from_millis(1200);

pub struct App {
    pub mode: Mode,
    pub state: State,
    sync: PositionSync<Box<dyn EditingSurface>>,
    pub config: AppConfig,
    source_path: PathBuf,
    runner: Runner,
    pub should_quit: bool,
    event_tx: mpsc::Sender<Msg>,
    output_selected: usize,
    build_output: String,
    dirty: bool,
    save_debounce: Option<Instant>,
    last_saved: Option<Instant>,
    quit_confirm_until: Option<Instant>,
    notifications: VecDeque<String>,
}

impl App {
    pub fn new(config: AppConfig, source_path: PathBuf, event_tx: mpsc::Sender<Msg>) -> Result<Self> {
        let code = std::fs::read_to_string(&source_path)?;
        let state = State::new(code, config.editor.kind, config.crates.available.clone());
        let runner = Runner::new(&config.build, config.build_dir());

        let mut app = Self {
            mode: Mode::Editor,
            state,
            sync: PositionSync::new(),
            config,
            source_path,
            runner,
            should_quit: false,
            event_tx,
            output_selected: 0,
            build_output: String::new(),
            dirty: false,
            save_debounce: None,
            last_saved: None,
            quit_confirm_until: None,
            notifications: VecDeque::new(),
        };
        app.mount_surface();
        Ok(app)
    }

    pub fn surface(&self) -> Option<&dyn EditingSurface> {
        self.sync.surface().map(|s| &**s)
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Key(key) => self.handle_key(key)?,
            Msg::FileChanged(path) => self.handle_file_changed(&path)?,
            Msg::BuildFinished(report) => self.handle_build_finished(report)?,
            Msg::Tick => self.handle_tick()?,
            // Layout is recomputed on every draw.
            Msg::Resize => {}
        }
        Ok(())
    }

    /// Apply `action` to the store, then bring the editor selection in line
    /// with the resulting position.
    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        let previous = self.state.position;

        match action {
            Action::PerformPrimaryAction => self.perform_primary_action()?,
            Action::SetEditor(kind) => {
                self.state.reduce(Action::SetEditor(kind));
                self.mount_surface();
            }
            other => self.state.reduce(other),
        }

        self.sync_position(previous.as_ref());
        Ok(())
    }

    fn sync_position(&mut self, previous: Option<&Position>) {
        let outcome =
            self.sync
                .on_position_update(previous, self.state.position.as_ref(), &self.state.code);
        if outcome.touched_surface() {
            tracing::debug!(?outcome, "selection moved");
        } else {
            tracing::trace!(?outcome, "selection kept");
        }
    }

    fn mount_surface(&mut self) {
        let surface = editor::surface_for(
            self.state.editor,
            &self.state.code,
            &self.state.crates,
            &self.config.editor,
        );
        if self.sync.mount(surface).is_some() {
            tracing::info!("switched to {} editor", self.state.editor.label());
        }
    }

    fn perform_primary_action(&mut self) -> Result<()> {
        if self.state.build == BuildStatus::Running {
            self.push_notification("build already running".to_string());
            return Ok(());
        }

        if !self.save_now() {
            self.push_notification("build skipped: source not saved".to_string());
            return Ok(());
        }
        self.state.reduce(Action::BuildStarted);
        self.build_output.clear();
        self.output_selected = 0;
        self.runner
            .spawn(self.source_path.clone(), self.event_tx.clone());
        Ok(())
    }

    fn handle_build_finished(&mut self, report: BuildReport) -> Result<()> {
        let first_error = report
            .diagnostics
            .iter()
            .position(|d| d.level == Level::Error);

        self.build_output = report.output;
        self.dispatch(Action::BuildFinished {
            success: report.success,
            diagnostics: report.diagnostics,
        })?;

        if let Some(idx) = first_error {
            self.output_selected = idx;
            if self.config.general.jump_to_first_error {
                self.goto_diagnostic(idx)?;
            }
        }
        Ok(())
    }

    fn goto_diagnostic(&mut self, idx: usize) -> Result<()> {
        let Some(diagnostic) = self.state.diagnostics.get(idx) else {
            return Ok(());
        };
        let action = Action::GotoPosition {
            line: diagnostic.line,
            column: diagnostic.column,
        };
        self.dispatch(action)
    }

    fn push_notification(&mut self, message: String) {
        self.notifications.push_back(message);
        while self.notifications.len() > 8 {
            self.notifications.pop_front();
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') if ctrl => {
                self.request_quit();
                return Ok(());
            }
            KeyCode::Char('s') if ctrl => {
                self.save_now();
                return Ok(());
            }
            KeyCode::Char('o') if ctrl => {
                self.mode = self.mode.toggled();
                return Ok(());
            }
            KeyCode::F(2) => return self.dispatch(Action::SetEditor(self.state.editor.toggled())),
            _ => {}
        }

        match self.mode {
            Mode::Editor => self.handle_key_editor(key),
            Mode::Output => self.handle_key_output(key),
        }
    }

    fn handle_key_editor(&mut self, key: KeyEvent) -> Result<()> {
        let Some(surface) = self.sync.surface_mut() else {
            return Ok(());
        };

        match surface.handle_key(key) {
            Some(SurfaceEvent::Edited) => {
                let code = surface.text();
                self.dispatch(Action::EditCode(code))?;
                self.schedule_auto_save();
            }
            Some(SurfaceEvent::Execute) => self.dispatch(Action::PerformPrimaryAction)?,
            None => {}
        }
        Ok(())
    }

    fn handle_key_output(&mut self, key: KeyEvent) -> Result<()> {
        let count = self.state.diagnostics.len();
        match key.code {
            KeyCode::Esc => self.mode = Mode::Editor,
            KeyCode::Char('k') | KeyCode::Up => {
                self.output_selected = self.output_selected.saturating_sub(1);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if self.output_selected + 1 < count {
                    self.output_selected += 1;
                }
            }
            KeyCode::Enter if count > 0 => {
                self.goto_diagnostic(self.output_selected)?;
                self.mode = Mode::Editor;
            }
            _ => {}
        }
        Ok(())
    }

    fn schedule_auto_save(&mut self) {
        self.dirty = true;
        let debounce_ms = self.config.general.auto_save_debounce_ms;
        self.save_debounce = Some(Instant::now() + Duration::from_millis(debounce_ms));
    }

    fn handle_tick(&mut self) -> Result<()> {
        let now = Instant::now();

        if self.quit_confirm_until.is_some_and(|until| now >= until) {
            self.quit_confirm_until = None;
        }

        if self.save_debounce.is_some_and(|deadline| now >= deadline) {
            self.save_now();
        }
        Ok(())
    }

    /// Save unsaved edits and quit. If the save fails, a second Ctrl+Q
    /// within two seconds quits anyway.
    fn request_quit(&mut self) {
        let confirmed = self
            .quit_confirm_until
            .is_some_and(|until| Instant::now() < until);

        if self.dirty && !self.save_now() && !confirmed {
            self.quit_confirm_until = Some(Instant::now() + Duration::from_secs(2));
            self.push_notification("unsaved: Ctrl+Q again to quit anyway".to_string());
            return;
        }

        self.sync.unmount();
        self.should_quit = true;
    }

    /// Write the code out on the update thread. Failures are reported and
    /// leave the edits marked unsaved.
    fn save_now(&mut self) -> bool {
        self.save_debounce = None;
        match write_source(&self.source_path, &self.state.code) {
            Ok(()) => {
                self.dirty = false;
                self.last_saved = Some(Instant::now());
                true
            }
            Err(e) => {
                tracing::error!("save failed: {e}");
                self.dirty = true;
                self.push_notification(format!("save failed: {e}"));
                false
            }
        }
    }

    fn should_reload(&self, path: &Path) -> bool {
        if !same_file_path(path, &self.source_path) || self.dirty {
            return false;
        }

        let recently_saved = self
            .last_saved
            .is_some_and(|saved_at| saved_at.elapsed() <= SAVE_ECHO_WINDOW);
        !recently_saved
    }

    fn handle_file_changed(&mut self, path: &Path) -> Result<()> {
        if !self.should_reload(path) {
            return Ok(());
        }
        // Half-written files land here too.
        let Ok(text) = std::fs::read_to_string(&self.source_path) else {
            return Ok(());
        };
        if text == self.state.code {
            return Ok(());
        }

        tracing::info!("reloading {} after external change", self.source_path.display());
        if let Some(surface) = self.sync.surface_mut() {
            surface.replace_text(&text);
        }
        self.dispatch(Action::EditCode(text))?;
        self.push_notification("reloaded from disk".to_string());
        Ok(())
    }

    // ── MVU: View ────────────────────────────────────────────────

    pub fn view(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),         // editor
                Constraint::Percentage(30), // output
                Constraint::Length(1),      // status bar
            ])
            .split(frame.area());

        self.render_editor(frame, chunks[0]);
        self.render_output(frame, chunks[1]);
        self.render_status_bar(frame, chunks[2]);
    }

    fn render_editor(&mut self, frame: &mut Frame, area: Rect) {
        let file_name = self
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "[scratch]".to_string());
        let focused = self.mode == Mode::Editor;

        let block = Block::default()
            .title(format!(" {file_name} "))
            .borders(Borders::ALL)
            .border_style(border_style(focused));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if let Some(surface) = self.sync.surface_mut() {
            surface.view(frame, inner, focused);
        }
    }

    fn render_output(&self, frame: &mut Frame, area: Rect) {
        let title = match self.state.build {
            BuildStatus::Idle => " Output ".to_string(),
            BuildStatus::Running => " Output (building…) ".to_string(),
            BuildStatus::Finished { success: true } => " Output (ok) ".to_string(),
            BuildStatus::Finished { success: false } => {
                format!(" Output ({} diagnostics) ", self.state.diagnostics.len())
            }
        };
        let focused = self.mode == Mode::Output;

        let lines: Vec<Line> = if self.state.diagnostics.is_empty() {
            self.build_output
                .lines()
                .map(|l| Line::raw(l.to_string()))
                .collect()
        } else {
            self.state
                .diagnostics
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    let color = match d.level {
                        Level::Error => Color::Red,
                        Level::Warning => Color::Yellow,
                        Level::Note | Level::Help => Color::Cyan,
                    };
                    let mut style = Style::default().fg(color);
                    if focused && i == self.output_selected {
                        style = style.add_modifier(Modifier::REVERSED);
                    }
                    Line::from(Span::styled(d.summary(), style))
                })
                .collect()
        };

        let height = area.height.saturating_sub(2) as usize;
        let scroll = self.output_selected.saturating_sub(height.saturating_sub(1));
        let output = Paragraph::new(lines)
            .scroll((scroll as u16, 0))
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(border_style(focused)),
            );
        frame.render_widget(output, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let mode_style = match self.mode {
            Mode::Editor => Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            Mode::Output => Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        };
        let mode_span = Span::styled(format!(" {} ", self.mode.label()), mode_style);

        let dirty_marker = if self.dirty { " [+]" } else { "" };
        let position = self
            .state
            .position
            .map(|p| format!("  {}:{}", p.line, p.column))
            .unwrap_or_default();
        let selection = self
            .surface()
            .and_then(|s| s.selection())
            .filter(|r| !r.is_caret())
            .map(|r| format!("  sel {}..{}", r.start, r.end))
            .unwrap_or_default();
        let note = self
            .notifications
            .back()
            .map(|n| format!(" | {n}"))
            .unwrap_or_default();

        let info = Span::styled(
            format!(
                " {}{dirty_marker}{position}{selection}  ^Enter run  ^O output  F2 editor  ^Q quit{note} ",
                self.state.editor.label()
            ),
            Style::default().fg(Color::Gray).bg(Color::DarkGray),
        );

        let bar = Line::from(vec![mode_span, info]);
        let status = Paragraph::new(bar).style(Style::default().bg(Color::DarkGray));
        frame.render_widget(status, area);
    }
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn same_file_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }

    let a_canon = std::fs::canonicalize(a);
    let b_canon = std::fs::canonicalize(b);
    matches!((a_canon, b_canon), (Ok(ca), Ok(cb)) if ca == cb)
}

fn write_source(path: &Path, code: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, code)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::ByteRange;
    use crate::model::diagnostic::Diagnostic;
    use crate::model::state::EditorKind;
    use pretty_assertions::assert_eq;

    struct Fixture {
        app: App,
        path: PathBuf,
        _rx: mpsc::Receiver<Msg>,
        _dir: tempfile::TempDir,
    }

    fn fixture(code: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rs");
        std::fs::write(&path, code).unwrap();

        let config = AppConfig::from_layers(None).unwrap();
        let (tx, rx) = mpsc::channel();
        let app = App::new(config, path.clone(), tx).unwrap();
        Fixture {
            app,
            path,
            _rx: rx,
            _dir: dir,
        }
    }

    fn key(code: KeyCode) -> Msg {
        Msg::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn selection(app: &App) -> Option<ByteRange> {
        app.surface().and_then(|s| s.selection())
    }

    fn error_at(line: usize) -> Diagnostic {
        Diagnostic {
            level: Level::Error,
            code: None,
            message: "boom".to_string(),
            line,
            column: 1,
        }
    }

    #[test]
    fn goto_position_selects_line() {
        let mut f = fixture("fn main() {\n    println!();\n}");
        f.app
            .dispatch(Action::GotoPosition { line: 2, column: 5 })
            .unwrap();
        assert_eq!(selection(&f.app), Some(ByteRange::new(12, 27)));
    }

    #[test]
    fn stale_position_after_external_shrink_is_ignored() {
        let mut f = fixture("a\nb\nc\nd\ne");
        f.app
            .dispatch(Action::GotoPosition { line: 2, column: 1 })
            .unwrap();

        std::fs::write(&f.path, "a\nb").unwrap();
        f.app.update(Msg::FileChanged(f.path.clone())).unwrap();
        assert_eq!(f.app.state.code, "a\nb");

        f.app
            .dispatch(Action::GotoPosition { line: 5, column: 1 })
            .unwrap();
        assert_eq!(selection(&f.app), None);

        // Editing still works.
        f.app.update(key(KeyCode::Char('z'))).unwrap();
        assert_eq!(f.app.state.code, "a\nbz");
    }

    #[test]
    fn typing_dispatches_edit_code() {
        let mut f = fixture("");
        f.app.update(key(KeyCode::Char('h'))).unwrap();
        f.app.update(key(KeyCode::Char('i'))).unwrap();
        assert_eq!(f.app.state.code, "hi");
    }

    #[test]
    fn unrelated_updates_do_not_reselect() {
        let mut f = fixture("one\ntwo\nthree");
        f.app
            .dispatch(Action::GotoPosition { line: 3, column: 1 })
            .unwrap();
        f.app.update(key(KeyCode::Left)).unwrap();
        assert_eq!(selection(&f.app), None);

        f.app.update(Msg::Tick).unwrap();
        f.app.dispatch(Action::ClearPosition).unwrap();
        assert_eq!(selection(&f.app), None);
    }

    #[test]
    fn switching_editor_keeps_code() {
        let mut f = fixture("let x = 1;");
        f.app.update(key(KeyCode::F(2))).unwrap();

        assert_eq!(f.app.state.editor, EditorKind::Advanced);
        assert_eq!(f.app.surface().unwrap().text(), "let x = 1;");
    }

    #[test]
    fn build_errors_jump_to_first_error() {
        let mut f = fixture("fn main() {\n    let x: i32 = \"\";\n}");
        let report = BuildReport {
            success: false,
            diagnostics: vec![
                Diagnostic {
                    level: Level::Warning,
                    ..error_at(1)
                },
                error_at(2),
            ],
            output: String::new(),
        };

        f.app.update(Msg::BuildFinished(report)).unwrap();

        assert_eq!(f.app.state.build, BuildStatus::Finished { success: false });
        assert_eq!(f.app.state.position.map(|p| p.line), Some(2));
        assert_eq!(selection(&f.app), Some(ByteRange::new(12, 32)));
    }

    #[test]
    fn output_pane_enter_jumps_to_selected_diagnostic() {
        let mut f = fixture("a\nbb\nccc");
        f.app.config.general.jump_to_first_error = false;
        let report = BuildReport {
            success: false,
            diagnostics: vec![error_at(1), error_at(3)],
            output: String::new(),
        };
        f.app.update(Msg::BuildFinished(report)).unwrap();
        assert_eq!(selection(&f.app), None);

        f.app.mode = Mode::Output;
        f.app.update(key(KeyCode::Down)).unwrap();
        f.app.update(key(KeyCode::Enter)).unwrap();

        assert_eq!(f.app.mode, Mode::Editor);
        assert_eq!(selection(&f.app), Some(ByteRange::new(5, 8)));
    }

    #[test]
    fn ctrl_s_writes_source() {
        let mut f = fixture("old");
        f.app.update(key(KeyCode::End)).unwrap();
        f.app.update(key(KeyCode::Char('!'))).unwrap();
        f.app
            .update(Msg::Key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)))
            .unwrap();

        assert_eq!(std::fs::read_to_string(&f.path).unwrap(), "old!");
    }

    fn ctrl(ch: char) -> Msg {
        Msg::Key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
    }

    #[test]
    fn failed_save_keeps_session_and_edits() {
        let mut f = fixture("old");
        // The atomic write goes through `main.tmp`; a directory there blocks it.
        std::fs::create_dir(f.path.with_extension("tmp")).unwrap();
        f.app.update(key(KeyCode::End)).unwrap();
        f.app.update(key(KeyCode::Char('!'))).unwrap();

        f.app.update(ctrl('s')).unwrap();
        assert_eq!(f.app.state.code, "old!");
        assert!(f.app.dirty);
        assert_eq!(std::fs::read_to_string(&f.path).unwrap(), "old");
        assert!(f.app.notifications.back().unwrap().starts_with("save failed"));

        f.app
            .update(Msg::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL)))
            .unwrap();
        assert_eq!(f.app.state.build, BuildStatus::Idle);

        f.app.update(ctrl('q')).unwrap();
        assert!(!f.app.should_quit);
        f.app.update(ctrl('q')).unwrap();
        assert!(f.app.should_quit);
    }

    #[test]
    fn debounced_save_writes_on_tick() {
        let mut f = fixture("a");
        f.app.update(key(KeyCode::Char('b'))).unwrap();
        f.app.save_debounce = Some(Instant::now());

        f.app.update(Msg::Tick).unwrap();

        assert!(!f.app.dirty);
        assert_eq!(f.app.save_debounce, None);
        assert_eq!(std::fs::read_to_string(&f.path).unwrap(), "ba");
    }

    #[test]
    fn watcher_echo_of_own_save_is_not_reloaded() {
        let mut f = fixture("old");
        f.app.update(key(KeyCode::Char('x'))).unwrap();
        f.app.update(ctrl('s')).unwrap();

        std::fs::write(&f.path, "stale snapshot").unwrap();
        f.app.update(Msg::FileChanged(f.path.clone())).unwrap();
        assert_eq!(f.app.state.code, "xold");

        f.app.last_saved = Instant::now().checked_sub(SAVE_ECHO_WINDOW * 2);
        f.app.update(Msg::FileChanged(f.path.clone())).unwrap();
        assert_eq!(f.app.state.code, "stale snapshot");
    }
}
