use serde::Deserialize;

use crate::model::diagnostic::Diagnostic;

/// Where the editor selection should go. `line` is 1-based.
///
/// `serial` is issued by [`State`] on every request, so asking for the same
/// line twice yields two distinct positions while a plain re-render keeps
/// comparing equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub serial: u64,
}

/// Which editing surface is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    #[default]
    Simple,
    Advanced,
}

impl EditorKind {
    pub fn label(&self) -> &'static str {
        match self {
            EditorKind::Simple => "SIMPLE",
            EditorKind::Advanced => "ADVANCED",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            EditorKind::Simple => EditorKind::Advanced,
            EditorKind::Advanced => EditorKind::Simple,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildStatus {
    #[default]
    Idle,
    Running,
    Finished {
        success: bool,
    },
}

/// Everything the dispatcher can ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Run the configured build over the current code.
    PerformPrimaryAction,
    /// Replace the code with new text.
    EditCode(String),
    GotoPosition { line: usize, column: usize },
    ClearPosition,
    SetEditor(EditorKind),
    BuildStarted,
    BuildFinished {
        success: bool,
        diagnostics: Vec<Diagnostic>,
    },
}

/// The application store. Mutated only through [`State::reduce`].
#[derive(Debug, Clone, Default)]
pub struct State {
    pub code: String,
    pub position: Option<Position>,
    pub editor: EditorKind,
    pub crates: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub build: BuildStatus,
    next_serial: u64,
}

impl State {
    pub fn new(code: String, editor: EditorKind, crates: Vec<String>) -> Self {
        Self {
            code,
            editor,
            crates,
            ..Default::default()
        }
    }

    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::EditCode(code) => self.code = code,
            Action::GotoPosition { line, column } => {
                self.next_serial += 1;
                self.position = Some(Position {
                    line,
                    column,
                    serial: self.next_serial,
                });
            }
            Action::ClearPosition => self.position = None,
            Action::SetEditor(kind) => self.editor = kind,
            Action::BuildStarted => {
                self.build = BuildStatus::Running;
                self.diagnostics.clear();
            }
            Action::BuildFinished {
                success,
                diagnostics,
            } => {
                self.build = BuildStatus::Finished { success };
                self.diagnostics = diagnostics;
            }
            // Side effects only; handled by the dispatcher.
            Action::PerformPrimaryAction => {}
        }
    }
}
