//! Scope Locator: what is under the cursor, and which definition encloses a position.

use crate::buffer::TextBuffer;
use crate::language::{BlockStyle, LanguageDriver};
use crate::model::{FileHandle, Position, Range, SymbolItem};

/// Definition symbol declared on `line`, named by whatever that line defines.
pub fn definition_at_line(
    buffer: &dyn TextBuffer,
    line: usize,
    driver: &dyn LanguageDriver,
    file: &FileHandle,
) -> Option<SymbolItem> {
    let text = buffer.line_text(line);
    let (name, start, end) = driver.definition_on_line(text)?;
    Some(SymbolItem::definition(
        name,
        Range::on_line(line, start, end - start),
        file.clone(),
    ))
}

/// True only when the word at `position` is the name a definition line declares.
pub fn is_cursor_on_definition(
    buffer: &dyn TextBuffer,
    position: Position,
    driver: &dyn LanguageDriver,
) -> bool {
    let Some(word) = buffer.word_range_at(position) else {
        return false;
    };
    match driver.definition_on_line(buffer.line_text(position.line)) {
        Some((_, start, end)) => word.start.column == start && word.end.column == end,
        None => false,
    }
}

/// Symbol the analysis is about.
///
/// On a definition line whose name is under the cursor this is the definition;
/// on any other word it is a reference-site item spanning that word. `None`
/// when the cursor is not on a word.
pub fn prepare_symbol(
    buffer: &dyn TextBuffer,
    position: Position,
    driver: &dyn LanguageDriver,
    file: &FileHandle,
) -> Option<SymbolItem> {
    let word = buffer.word_range_at(position)?;

    if is_cursor_on_definition(buffer, position, driver) {
        return definition_at_line(buffer, position.line, driver, file);
    }

    Some(SymbolItem::reference_site(buffer.text_in(word), word, file.clone()))
}

/// Nearest definition structurally enclosing `position`, or `None` at module scope.
///
/// The found definition is returned as-is, whatever it is named.
pub fn find_nearest_enclosing_definition(
    buffer: &dyn TextBuffer,
    position: Position,
    driver: &dyn LanguageDriver,
    file: &FileHandle,
) -> Option<SymbolItem> {
    match driver.block_style() {
        BlockStyle::Indentation => enclosing_by_indentation(buffer, position.line, driver, file),
        BlockStyle::Braces => enclosing_by_braces(buffer, position, driver, file),
    }
}

fn enclosing_by_indentation(
    buffer: &dyn TextBuffer,
    start_line: usize,
    driver: &dyn LanguageDriver,
    file: &FileHandle,
) -> Option<SymbolItem> {
    let mut current_indent = buffer.first_non_whitespace_column(start_line);
    let mut line = start_line;

    while line > 0 && current_indent > 0 {
        line -= 1;
        if buffer.is_blank_line(line) {
            continue;
        }
        let indent = buffer.first_non_whitespace_column(line);
        if indent >= current_indent {
            continue;
        }
        if let Some(item) = definition_at_line(buffer, line, driver, file) {
            return Some(item);
        }
        current_indent = indent;
    }
    None
}

fn enclosing_by_braces(
    buffer: &dyn TextBuffer,
    position: Position,
    driver: &dyn LanguageDriver,
    file: &FileHandle,
) -> Option<SymbolItem> {
    let bytes = buffer.full_text().as_bytes();
    let mut i = buffer.position_to_offset(position);
    let mut depth = 0usize;

    while i > 0 {
        i -= 1;
        match bytes[i] {
            b'}' => depth += 1,
            b'{' if depth > 0 => depth -= 1,
            b'{' => {
                let opener = buffer.offset_to_position(i);
                if let Some(item) = definition_for_block_opener(buffer, opener, driver, file) {
                    return Some(item);
                }
            }
            _ => {}
        }
    }
    None
}

/// Definition owning the block opened at `brace`: the brace's own line, else the
/// nearest definition line above it. The upward scan gives up at a line ending
/// in `;` or `}` (a finished statement or block) and at a non-definition line
/// ending in `{`. This covers Allman braces and wrapped parameter lists.
fn definition_for_block_opener(
    buffer: &dyn TextBuffer,
    brace: Position,
    driver: &dyn LanguageDriver,
    file: &FileHandle,
) -> Option<SymbolItem> {
    if let Some(item) = definition_at_line(buffer, brace.line, driver, file) {
        return Some(item);
    }

    for line in (0..brace.line).rev() {
        let text = buffer.line_text(line).trim_end();
        if text.ends_with(&[';', '}'][..]) {
            return None;
        }
        if let Some(item) = definition_at_line(buffer, line, driver, file) {
            return Some(item);
        }
        if text.ends_with('{') {
            return None;
        }
    }
    None
}

/// Line defining `name`: `near_line` itself, else the closest one above it,
/// else the first one anywhere in the document.
pub fn find_definition_line(
    buffer: &dyn TextBuffer,
    name: &str,
    near_line: usize,
    driver: &dyn LanguageDriver,
) -> Option<usize> {
    let is_def = |line: usize| driver.is_definition_of(buffer.line_text(line), name);
    let near_line = near_line.min(buffer.line_count().saturating_sub(1));

    (0..=near_line)
        .rev()
        .find(|&l| is_def(l))
        .or_else(|| (0..buffer.line_count()).find(|&l| is_def(l)))
}
