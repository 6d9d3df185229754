use crate::model::{Position, Range};

/// Read-only view of one document's text, addressed by offset or by line/column.
///
/// Offsets and columns are byte based. Line text never includes the line
/// terminator (`\n` or `\r\n`).
pub trait TextBuffer {
    fn full_text(&self) -> &str;
    /// Text of `line`, or `""` past the end of the document.
    fn line_text(&self, line: usize) -> &str;
    fn line_count(&self) -> usize;
    fn offset_to_position(&self, offset: usize) -> Position;
    fn position_to_offset(&self, position: Position) -> usize;
    /// Identifier-like word under (or immediately left of) `position`.
    fn word_range_at(&self, position: Position) -> Option<Range>;
    /// Column of the first non-whitespace byte; the line length for blank lines.
    fn first_non_whitespace_column(&self, line: usize) -> usize;

    fn text_in(&self, range: Range) -> &str {
        let start = self.position_to_offset(range.start);
        let end = self.position_to_offset(range.end).max(start);
        self.full_text().get(start..end).unwrap_or("")
    }

    fn is_blank_line(&self, line: usize) -> bool {
        self.line_text(line).trim().is_empty()
    }
}

pub(crate) fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// In-memory document with a precomputed line-start table.
#[derive(Debug, Clone)]
pub struct SourceText {
    text: String,
    /// Byte offset where each line starts; always non-empty.
    line_starts: Vec<usize>,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0usize];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { text, line_starts }
    }

    /// Byte range of `line` without its terminator.
    fn line_bounds(&self, line: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line)?;
        let mut end = match self.line_starts.get(line + 1) {
            Some(next) => next - 1,
            None => self.text.len(),
        };
        if end > start && self.text.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        Some((start, end))
    }
}

impl TextBuffer for SourceText {
    fn full_text(&self) -> &str {
        &self.text
    }

    fn line_text(&self, line: usize) -> &str {
        match self.line_bounds(line) {
            Some((start, end)) => &self.text[start..end],
            None => "",
        }
    }

    fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_at) => insert_at - 1,
        };
        Position::new(line, offset - self.line_starts[line])
    }

    fn position_to_offset(&self, position: Position) -> usize {
        match self.line_bounds(position.line) {
            Some((start, end)) => start + position.column.min(end - start),
            None => self.text.len(),
        }
    }

    fn word_range_at(&self, position: Position) -> Option<Range> {
        let line = self.line_text(position.line);
        let col = position.column.min(line.len());
        if !line.is_char_boundary(col) {
            return None;
        }

        let mut start = col;
        for (i, c) in line[..col].char_indices().rev() {
            if !is_word_char(c) {
                break;
            }
            start = i;
        }

        let mut end = col;
        for (i, c) in line[col..].char_indices() {
            if !is_word_char(c) {
                break;
            }
            end = col + i + c.len_utf8();
        }

        if start == end {
            return None;
        }
        Some(Range::on_line(position.line, start, end - start))
    }

    fn first_non_whitespace_column(&self, line: usize) -> usize {
        let text = self.line_text(line);
        text.find(|c: char| !c.is_whitespace()).unwrap_or(text.len())
    }
}
