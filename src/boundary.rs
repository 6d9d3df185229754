//! Definition Boundary Resolver: where a function body starts and ends.
//!
//! Resolution never fails loudly. A missing or malformed body is `None`,
//! which callers treat as "no calls".

use crate::buffer::TextBuffer;
use crate::language::{BlockStyle, LanguageDriver};
use crate::model::{Position, Range, SymbolItem};

/// Byte span of a body inside its document's full text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodySpan {
    pub start: usize,
    pub end: usize,
}

impl BodySpan {
    pub fn text<'a>(&self, buffer: &'a dyn TextBuffer) -> &'a str {
        buffer.full_text().get(self.start..self.end).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

pub fn resolve_body(
    buffer: &dyn TextBuffer,
    definition: &SymbolItem,
    driver: &dyn LanguageDriver,
) -> Option<BodySpan> {
    match driver.block_style() {
        BlockStyle::Indentation => {
            resolve_indented_body(buffer, definition.selection_range.start.line)
        }
        BlockStyle::Braces => resolve_braced_body(buffer, definition.selection_range),
    }
}

/// Body of the definition on `def_line`: from the first non-blank line after it
/// through the last line before something dedents below that first line.
pub fn resolve_indented_body(buffer: &dyn TextBuffer, def_line: usize) -> Option<BodySpan> {
    let line_count = buffer.line_count();
    let def_indent = buffer.first_non_whitespace_column(def_line);

    let Some(body_start) = (def_line + 1..line_count).find(|&l| !buffer.is_blank_line(l)) else {
        crate::debug_log!("[callscope] no body after definition on line {}", def_line + 1);
        return None;
    };

    let body_indent = buffer.first_non_whitespace_column(body_start);
    if body_indent <= def_indent {
        crate::debug_log!(
            "[callscope] malformed block at line {}: body indent {} <= definition indent {}",
            def_line + 1,
            body_indent,
            def_indent
        );
        return None;
    }

    let mut body_end = body_start;
    for line in body_start..line_count {
        if !buffer.is_blank_line(line) && buffer.first_non_whitespace_column(line) < body_indent {
            break;
        }
        body_end = line;
    }

    let start = buffer.position_to_offset(Position::new(body_start, 0));
    let end = buffer.position_to_offset(Position::new(body_end, buffer.line_text(body_end).len()));
    Some(BodySpan { start, end })
}

/// Text strictly between the first `{` after `selection` and its matching `}`.
/// Unbalanced braces run the body to end of file.
pub fn resolve_braced_body(buffer: &dyn TextBuffer, selection: Range) -> Option<BodySpan> {
    let text = buffer.full_text();
    let from = buffer.position_to_offset(selection.end);

    let Some(open) = text.get(from..).and_then(|rest| rest.find('{')).map(|i| from + i) else {
        crate::debug_log!(
            "[callscope] no opening brace after line {}",
            selection.end.line + 1
        );
        return None;
    };

    let mut depth = 0usize;
    let mut close = None;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }

    let end = close.unwrap_or_else(|| {
        crate::debug_log!(
            "[callscope] unbalanced braces after line {}; body runs to end of file",
            selection.end.line + 1
        );
        text.len()
    });

    Some(BodySpan { start: open + 1, end })
}
