use thiserror::Error;

/// A span of bytes inside a source snapshot, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "byte range start {start} past end {end}");
        Self { start, end }
    }

    pub fn is_caret(&self) -> bool {
        self.start == self.end
    }

    /// Shrink the range so it fits inside a buffer of `len` bytes.
    pub fn clamp(self, len: usize) -> Self {
        let end = self.end.min(len);
        Self {
            start: self.start.min(end),
            end,
        }
    }
}

impl From<std::ops::Range<usize>> for ByteRange {
    fn from(r: std::ops::Range<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

impl From<ByteRange> for std::ops::Range<usize> {
    fn from(r: ByteRange) -> Self {
        r.start..r.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OffsetError {
    #[error("line {line} is out of range (source has {line_count} lines)")]
    OutOfRange { line: usize, line_count: usize },
}

/// Maps 1-based line numbers of one source snapshot onto byte ranges.
///
/// The source is split on `'\n'` once, at construction. Offsets are counted
/// in UTF-8 bytes, the unit both editing surfaces accept for selections.
#[derive(Debug, Clone)]
pub struct CodeByteOffsets<'a> {
    lines: Vec<&'a str>,
}

impl<'a> CodeByteOffsets<'a> {
    pub fn new(code: &'a str) -> Self {
        // `split` rather than `lines`: a trailing empty line and any `\r`
        // must survive so the lines rejoin to exactly `code`.
        Self {
            lines: code.split('\n').collect(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Byte range covering the content of `line` (1-based), newline excluded.
    pub fn line_to_offsets(&self, line: usize) -> Result<ByteRange, OffsetError> {
        let idx = self.zero_based(line)?;
        let preceding = self.bytes_before_line(idx);
        let highlighted = self.lines[idx].len();

        Ok(ByteRange::new(preceding, preceding + highlighted))
    }

    fn zero_based(&self, line: usize) -> Result<usize, OffsetError> {
        match line.checked_sub(1) {
            Some(idx) if idx < self.lines.len() => Ok(idx),
            _ => Err(OffsetError::OutOfRange {
                line,
                line_count: self.lines.len(),
            }),
        }
    }

    fn bytes_before_line(&self, idx: usize) -> usize {
        // +1 puts back the newline removed by the split. An empty prefix
        // (the first line) sums to 0.
        self.lines[..idx].iter().map(|l| l.len() + 1).sum()
    }
}
