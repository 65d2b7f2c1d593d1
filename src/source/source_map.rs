use super::Span;

/// Where a span sits in its source, ready for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'src> {
    /// 1-based.
    pub line: usize,
    /// 1-based, counted in characters.
    pub col: usize,
    /// The whole line, without its terminator.
    pub text: &'src str,
    /// Characters of the span that fall on this line; at least 1.
    pub width: usize,
}

/// Line index over a source buffer.
pub struct SourceMap<'src> {
    source: &'src str,
    line_starts: Vec<usize>,
}

impl<'src> SourceMap<'src> {
    pub fn new(source: &'src str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        SourceMap { source, line_starts }
    }

    pub fn locate(&self, span: Span) -> Location<'src> {
        let offset = span.start.min(self.source.len());
        let line = self.line_starts.partition_point(|&start| start <= offset).saturating_sub(1);
        let start = self.line_starts.get(line).copied().unwrap_or(0);
        let end = self
            .line_starts
            .get(line + 1)
            .map_or(self.source.len(), |&next| next - 1);

        let chars = |from: usize, to: usize| self.source.get(from..to).map_or(0, |s| s.chars().count());
        let text = self.source.get(start..end).unwrap_or("").trim_end_matches('\r');
        let col = chars(start, offset) + 1;
        let width = chars(offset, span.end.min(start + text.len()).max(offset)).max(1);

        Location { line: line + 1, col, text, width }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(src: &str, start: usize, end: usize) -> Location<'_> {
        SourceMap::new(src).locate(Span { start, end })
    }

    #[test]
    fn single_line() {
        let src = "let x = 5;";
        let loc = at(src, 4, 5);
        assert_eq!((loc.line, loc.col, loc.width), (1, 5, 1));
        assert_eq!(loc.text, src);
        assert_eq!(at(src, 0, 3).col, 1);
    }

    #[test]
    fn multi_line() {
        let src = "let a = 1;\nlet b = 2;\na + b";
        let loc = at(src, 11, 14);
        assert_eq!((loc.line, loc.col, loc.width), (2, 1, 3));
        assert_eq!(loc.text, "let b = 2;");
        assert_eq!(at(src, 22, 23).text, "a + b");
    }

    #[test]
    fn newline_belongs_to_the_line_it_ends() {
        let src = "a;\nb;\nc";
        assert_eq!((at(src, 2, 3).line, at(src, 2, 3).col), (1, 3));
        assert_eq!((at(src, 3, 4).line, at(src, 3, 4).col), (2, 1));
        assert_eq!(at(src, 6, 7).line, 3);
    }

    #[test]
    fn columns_count_characters() {
        let src = "let s = \"héllo\" + x;";
        // `x` sits after a two-byte character
        let x = src.find('x').unwrap();
        let loc = at(src, x, x + 1);
        assert_eq!(loc.col, 19);
        let loc = at(src, 9, 15);
        assert_eq!(loc.width, 5);
    }

    #[test]
    fn width_stops_at_end_of_line() {
        let src = "let s = \"abc\nmore";
        let loc = at(src, 8, src.len());
        assert_eq!(loc.text, "let s = \"abc");
        assert_eq!(loc.width, 4);
    }

    #[test]
    fn empty_span_and_empty_source() {
        let loc = at("1 +", 3, 3);
        assert_eq!((loc.col, loc.width), (4, 1));
        let loc = at("", 0, 0);
        assert_eq!((loc.line, loc.col, loc.text), (1, 1, ""));
    }

    #[test]
    fn crlf_trimmed() {
        let src = "1 + 2;\r\nx";
        assert_eq!(at(src, 0, 1).text, "1 + 2;");
        // the terminator itself still reports on its own line
        assert_eq!((at(src, 7, 8).line, at(src, 7, 8).width), (1, 1));
        assert_eq!(at(src, 8, 9).line, 2);
    }

    #[test]
    fn offset_past_end_clamps() {
        let loc = at("exit;", 99, 100);
        assert_eq!((loc.line, loc.col), (1, 6));
    }
}
