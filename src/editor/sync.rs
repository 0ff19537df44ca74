use crate::editor::EditingSurface;
use crate::editor::offsets::{ByteRange, CodeByteOffsets, OffsetError};
use crate::model::state::Position;

/// What a position update did to the mounted surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No target position.
    NoTarget,
    /// No surface is mounted.
    Unmounted,
    /// The position is the one already applied.
    Unchanged,
    /// The line no longer exists in the current code; selection left alone.
    Stale { line: usize, line_count: usize },
    Selected(ByteRange),
}

impl SyncOutcome {
    pub fn touched_surface(&self) -> bool {
        matches!(self, SyncOutcome::Selected(_))
    }
}

/// Keeps the mounted surface's selection on the current target position.
///
/// Owns the surface between [`mount`](Self::mount) and
/// [`unmount`](Self::unmount). The previous position is not cached here;
/// callers pass it on every update.
#[derive(Debug)]
pub struct PositionSync<S> {
    surface: Option<S>,
}

impl<S> Default for PositionSync<S> {
    fn default() -> Self {
        Self { surface: None }
    }
}

impl<S: EditingSurface> PositionSync<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `surface`, handing back whatever was mounted before.
    pub fn mount(&mut self, surface: S) -> Option<S> {
        self.surface.replace(surface)
    }

    pub fn unmount(&mut self) -> Option<S> {
        self.surface.take()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    pub fn on_position_update(
        &mut self,
        old: Option<&Position>,
        new: Option<&Position>,
        code: &str,
    ) -> SyncOutcome {
        let Some(new) = new else {
            return SyncOutcome::NoTarget;
        };
        let Some(surface) = self.surface.as_mut() else {
            return SyncOutcome::Unmounted;
        };
        if old == Some(new) {
            return SyncOutcome::Unchanged;
        }

        match CodeByteOffsets::new(code).line_to_offsets(new.line) {
            Ok(range) => {
                tracing::debug!(line = new.line, ?range, "moving selection");
                surface.set_selection(range);
                SyncOutcome::Selected(range)
            }
            Err(OffsetError::OutOfRange { line, line_count }) => {
                tracing::warn!(line, line_count, "ignoring stale position");
                SyncOutcome::Stale { line, line_count }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;
    use pretty_assertions::assert_eq;
    use ratatui::Frame;
    use ratatui::layout::Rect;

    use crate::editor::SurfaceEvent;

    #[derive(Debug, Default)]
    struct RecordingSurface {
        text: String,
        selections: Vec<ByteRange>,
    }

    impl EditingSurface for RecordingSurface {
        fn text(&self) -> String {
            self.text.clone()
        }

        fn replace_text(&mut self, text: &str) {
            self.text = text.to_string();
        }

        fn set_selection(&mut self, range: ByteRange) {
            self.selections.push(range);
        }

        fn selection(&self) -> Option<ByteRange> {
            self.selections.last().copied()
        }

        fn handle_key(&mut self, _key: KeyEvent) -> Option<SurfaceEvent> {
            None
        }

        fn view(&mut self, _frame: &mut Frame, _area: Rect, _focused: bool) {}
    }

    fn pos(line: usize, serial: u64) -> Position {
        Position {
            line,
            column: 1,
            serial,
        }
    }

    fn mounted() -> PositionSync<RecordingSurface> {
        let mut sync = PositionSync::new();
        sync.mount(RecordingSurface::default());
        sync
    }

    fn selections(sync: &PositionSync<RecordingSurface>) -> &[ByteRange] {
        &sync.surface().unwrap().selections
    }

    #[test]
    fn new_position_selects_its_line() {
        let mut sync = mounted();
        let code = "fn main() {\n    println!();\n}";

        let outcome = sync.on_position_update(None, Some(&pos(2, 1)), code);

        assert_eq!(outcome, SyncOutcome::Selected(ByteRange::new(12, 27)));
        assert_eq!(selections(&sync), &[ByteRange::new(12, 27)]);
    }

    #[test]
    fn same_position_is_a_no_op() {
        let mut sync = mounted();
        let p = pos(3, 7);

        for code in ["", "a\nb\nc", "x"] {
            let outcome = sync.on_position_update(Some(&p), Some(&p), code);
            assert_eq!(outcome, SyncOutcome::Unchanged);
        }
        assert!(selections(&sync).is_empty());
    }

    #[test]
    fn absent_position_is_a_no_op() {
        let mut sync = mounted();
        let old = pos(1, 1);

        assert_eq!(
            sync.on_position_update(Some(&old), None, "a\nb"),
            SyncOutcome::NoTarget
        );
        assert_eq!(sync.on_position_update(None, None, "a\nb"), SyncOutcome::NoTarget);
        assert!(selections(&sync).is_empty());
    }

    #[test]
    fn unmounted_sync_does_nothing() {
        let mut sync: PositionSync<RecordingSurface> = PositionSync::new();
        let outcome = sync.on_position_update(None, Some(&pos(1, 1)), "a");
        assert_eq!(outcome, SyncOutcome::Unmounted);
        assert!(!outcome.touched_surface());
    }

    #[test]
    fn re_requesting_the_same_line_selects_again() {
        let mut sync = mounted();
        let first = pos(2, 1);
        let second = pos(2, 2);

        sync.on_position_update(None, Some(&first), "a\nbb");
        sync.on_position_update(Some(&first), Some(&second), "a\nbb");

        assert_eq!(selections(&sync), &[ByteRange::new(2, 4), ByteRange::new(2, 4)]);
    }

    #[test]
    fn stale_position_leaves_selection_alone() {
        let mut sync = mounted();
        let outcome = sync.on_position_update(Some(&pos(1, 1)), Some(&pos(5, 2)), "one\ntwo");

        assert_eq!(
            outcome,
            SyncOutcome::Stale {
                line: 5,
                line_count: 2
            }
        );
        assert!(selections(&sync).is_empty());

        // Still usable afterwards.
        let outcome = sync.on_position_update(Some(&pos(5, 2)), Some(&pos(2, 3)), "one\ntwo");
        assert_eq!(outcome, SyncOutcome::Selected(ByteRange::new(4, 7)));
    }

    #[test]
    fn mount_hands_back_previous_surface() {
        let mut sync = mounted();
        sync.surface_mut().unwrap().replace_text("old");

        let previous = sync.mount(RecordingSurface::default()).unwrap();
        assert_eq!(previous.text, "old");

        assert!(sync.unmount().is_some());
        assert!(sync.surface().is_none());
    }
}
