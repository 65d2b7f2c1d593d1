use serde::Serialize;

pub mod source_map;
pub use source_map::{Location, SourceMap};

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const UNKNOWN: Span = Span { start: 0, end: 0 };

    pub fn new(start: usize, len: usize) -> Self {
        Span { start, end: start + len }
    }

    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }
}
