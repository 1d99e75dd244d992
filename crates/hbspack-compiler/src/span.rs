use std::fmt;

/// Location of a template construct.
///
/// `start`/`end` are byte offsets into the template source. Lines are
/// 1-based and columns 0-based, matching the `loc` objects the Handlebars
/// runtime reports in its exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }

    pub fn with_end(mut self, end_line: u32, end_column: u32) -> Self {
        self.end_line = end_line;
        self.end_column = end_column;
        self
    }

    pub fn dummy() -> Self {
        Self::new(0, 0, 1, 0)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps byte offsets back to line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    /// Returns `(line, column)` for `offset`; the column counts chars, not bytes.
    pub fn locate(&self, source: &str, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = source
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(0);
        (line as u32 + 1, column as u32)
    }

    pub fn span(&self, source: &str, start: usize, end: usize) -> Span {
        let (line, column) = self.locate(source, start);
        let (end_line, end_column) = self.locate(source, end);
        Span::new(start, end, line, column).with_end(end_line, end_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_first_line() {
        let source = "hello {{name}}";
        let index = LineIndex::new(source);
        assert_eq!(index.locate(source, 0), (1, 0));
        assert_eq!(index.locate(source, 6), (1, 6));
    }

    #[test]
    fn test_locate_after_newlines() {
        let source = "a\nbb\n{{x}}";
        let index = LineIndex::new(source);
        assert_eq!(index.locate(source, 2), (2, 0));
        assert_eq!(index.locate(source, 5), (3, 0));
        assert_eq!(index.locate(source, 7), (3, 2));
    }

    #[test]
    fn test_span_display() {
        let span = Span::new(0, 4, 3, 7);
        assert_eq!(span.to_string(), "3:7");
    }
}
