use crossterm::event::KeyEvent;
use std::path::PathBuf;

use crate::runner::BuildReport;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize,

    // -- File I/O
    FileChanged(PathBuf),

    // -- Build
    BuildFinished(BuildReport),

    // -- System
    Tick,
}
