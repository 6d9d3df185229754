use serde::Serialize;
use std::path::PathBuf;

/// Caller name used for call sites that are not inside any located function.
pub const MODULE_SCOPE_LABEL: &str = "<module>";

/// Zero-indexed line/column. Columns are byte offsets within the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Single-line span `[column, column + len)` on `line`.
    pub fn on_line(line: usize, column: usize, len: usize) -> Self {
        Self {
            start: Position::new(line, column),
            end: Position::new(line, column + len),
        }
    }

    pub fn contains(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A workspace file as seen by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    pub abs_path: PathBuf,
    /// Workspace-relative path with forward slashes (what the report shows).
    pub rel_path: String,
}

impl FileHandle {
    pub fn new(abs_path: PathBuf, rel_path: impl Into<String>) -> Self {
        Self {
            abs_path,
            rel_path: rel_path.into().replace('\\', "/"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// The identifier on a definition line.
    Definition,
    /// A word somewhere else (usually a call); no definition was located for it.
    ReferenceSite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolItem {
    pub name: String,
    pub kind: SymbolKind,
    pub definition_range: Range,
    /// Always on `definition_range`'s line.
    pub selection_range: Range,
    pub file: FileHandle,
}

impl SymbolItem {
    pub fn definition(name: impl Into<String>, range: Range, file: FileHandle) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Definition,
            definition_range: range,
            selection_range: range,
            file,
        }
    }

    pub fn reference_site(name: impl Into<String>, range: Range, file: FileHandle) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::ReferenceSite,
            definition_range: range,
            selection_range: range,
            file,
        }
    }

    pub fn is_definition(&self) -> bool {
        self.kind == SymbolKind::Definition
    }
}

/// One side of a call edge. `ModuleScope` is not a symbol and never compares
/// equal to one, whatever the symbol is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Symbol(SymbolItem),
    ModuleScope,
}

impl Endpoint {
    pub fn name(&self) -> &str {
        match self {
            Endpoint::Symbol(item) => &item.name,
            Endpoint::ModuleScope => MODULE_SCOPE_LABEL,
        }
    }

    pub fn as_symbol(&self) -> Option<&SymbolItem> {
        match self {
            Endpoint::Symbol(item) => Some(item),
            Endpoint::ModuleScope => None,
        }
    }

    pub fn is_module_scope(&self) -> bool {
        matches!(self, Endpoint::ModuleScope)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEdge {
    pub caller: Endpoint,
    pub callee: Endpoint,
    /// Where the call happens.
    pub site_range: Range,
    /// File holding `site_range` (the caller's file, even for module-level callers).
    pub site_file: FileHandle,
}

/// Request-scoped analysis result. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHierarchyResult {
    pub target: SymbolItem,
    pub incoming: Vec<CallEdge>,
    pub outgoing: Vec<CallEdge>,
    /// Self-calls found in the target's own body. They never appear as edges.
    pub recursive_sites: Vec<Range>,
}

impl CallHierarchyResult {
    /// Convert to the serialized record. Lines become 1-indexed here and nowhere else.
    pub fn to_report(&self) -> HierarchyReport {
        let incoming = self
            .incoming
            .iter()
            .map(|edge| IncomingEntry {
                from: edge.caller.name().to_string(),
                file_path: edge.site_file.rel_path.clone(),
                line: edge.site_range.start.line + 1,
                caller_line: edge
                    .caller
                    .as_symbol()
                    .map(|s| s.definition_range.start.line + 1),
            })
            .collect();

        let outgoing = self
            .outgoing
            .iter()
            .map(|edge| OutgoingEntry {
                to: edge.callee.name().to_string(),
                file_path: edge.site_file.rel_path.clone(),
                line: edge.site_range.start.line + 1,
            })
            .collect();

        HierarchyReport {
            function: self.target.name.clone(),
            current_file: self.target.file.rel_path.clone(),
            line: self.target.definition_range.start.line + 1,
            incoming,
            outgoing,
            recursive: !self.recursive_sites.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomingEntry {
    pub from: String,
    pub file_path: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEntry {
    pub to: String,
    pub file_path: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyReport {
    pub function: String,
    pub current_file: String,
    pub line: usize,
    pub incoming: Vec<IncomingEntry>,
    pub outgoing: Vec<OutgoingEntry>,
    pub recursive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(rel: &str) -> FileHandle {
        FileHandle::new(PathBuf::from("/ws").join(rel), rel)
    }

    #[test]
    fn module_scope_is_not_a_symbol_named_module() {
        let fake = Endpoint::Symbol(SymbolItem::definition(
            MODULE_SCOPE_LABEL,
            Range::on_line(0, 4, 8),
            handle("a.py"),
        ));
        assert_ne!(fake, Endpoint::ModuleScope);
        assert!(Endpoint::ModuleScope.is_module_scope());
        assert!(!fake.is_module_scope());
    }

    #[test]
    fn report_converts_lines_to_one_indexed() {
        let file = handle("pkg/main.py");
        let target = SymbolItem::definition("run", Range::on_line(0, 4, 3), file.clone());
        let main = SymbolItem::definition("main", Range::on_line(4, 4, 4), file.clone());
        let result = CallHierarchyResult {
            target: target.clone(),
            incoming: vec![
                CallEdge {
                    caller: Endpoint::Symbol(main),
                    callee: Endpoint::Symbol(target.clone()),
                    site_range: Range::on_line(5, 4, 3),
                    site_file: file.clone(),
                },
                CallEdge {
                    caller: Endpoint::ModuleScope,
                    callee: Endpoint::Symbol(target.clone()),
                    site_range: Range::on_line(9, 0, 3),
                    site_file: file.clone(),
                },
            ],
            outgoing: vec![CallEdge {
                caller: Endpoint::Symbol(target.clone()),
                callee: Endpoint::Symbol(SymbolItem::reference_site(
                    "add",
                    Range::on_line(1, 4, 3),
                    file.clone(),
                )),
                site_range: Range::on_line(1, 4, 3),
                site_file: file,
            }],
            recursive_sites: vec![],
        };

        let report = result.to_report();
        assert_eq!(report.function, "run");
        assert_eq!(report.current_file, "pkg/main.py");
        assert_eq!(report.line, 1);
        assert_eq!(report.incoming[0].from, "main");
        assert_eq!(report.incoming[0].line, 6);
        assert_eq!(report.incoming[0].caller_line, Some(5));
        assert_eq!(report.incoming[1].from, "<module>");
        assert_eq!(report.incoming[1].caller_line, None);
        assert_eq!(report.outgoing[0].to, "add");
        assert_eq!(report.outgoing[0].line, 2);
        assert!(!report.recursive);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["incoming"][1].get("caller_line").is_none());
        assert_eq!(json["incoming"][0]["file_path"], "pkg/main.py");
    }

    #[test]
    fn range_containment() {
        let outer = Range::on_line(3, 0, 20);
        assert!(outer.contains(&Range::on_line(3, 4, 3)));
        assert!(!outer.contains(&Range::on_line(4, 4, 3)));
    }
}
