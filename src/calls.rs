//! Call-Site Scanner: `identifier (` occurrences in a body or a whole file.

use regex::Regex;
use std::sync::OnceLock;

use crate::buffer::TextBuffer;
use crate::model::Range;

/// A call-like token. `offset` is relative to the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMatch {
    pub name: String,
    pub offset: usize,
}

fn any_call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap())
}

/// Every call-like token in `text`, left to right, except calls to `exclude_name`.
pub fn find_calls(text: &str, exclude_name: &str) -> Vec<CallMatch> {
    any_call_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter(|m| m.as_str() != exclude_name)
        .map(|m| CallMatch {
            name: m.as_str().to_string(),
            offset: m.start(),
        })
        .collect()
}

/// Offsets of calls to exactly `name` in `text`, left to right.
pub fn find_calls_named(text: &str, name: &str) -> Vec<usize> {
    if name.is_empty() || !text.contains(name) {
        return vec![];
    }
    let pattern = format!(r"\b{}\s*\(", regex::escape(name));
    let Ok(re) = Regex::new(&pattern) else {
        return vec![];
    };
    re.find_iter(text).map(|m| m.start()).collect()
}

/// Range of a call whose name starts at `offset` in `buffer`'s full text:
/// the enclosing word when there is one, else `name_len` bytes from `offset`.
pub fn site_range(buffer: &dyn TextBuffer, offset: usize, name_len: usize) -> Range {
    let pos = buffer.offset_to_position(offset);
    buffer
        .word_range_at(pos)
        .unwrap_or_else(|| Range::on_line(pos.line, pos.column, name_len))
}
