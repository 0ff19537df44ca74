/// Cursor position within a rope buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorState {
    /// Current line (0-indexed).
    pub row: usize,
    /// Current column (0-indexed, byte offset within line).
    pub col: usize,
    /// Desired column for vertical movement ("sticky" column).
    pub desired_col: usize,
}

impl CursorState {
    pub fn move_to(&mut self, row: usize, col: usize) {
        self.row = row;
        self.col = col;
        self.desired_col = col;
    }
}

/// Direction for cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    LineStart,
    LineEnd,
}
