/// Which pane receives key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Keys go to the mounted editing surface.
    #[default]
    Editor,
    /// Keys browse the diagnostics list.
    Output,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Editor => "EDIT",
            Mode::Output => "OUTPUT",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Mode::Editor => Mode::Output,
            Mode::Output => Mode::Editor,
        }
    }
}
