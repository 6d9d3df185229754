//! Hierarchy Assembler: turns a cursor position into incoming and outgoing call edges.
//!
//! Outgoing calls come from the target's own body. Incoming calls come from
//! scanning every candidate file of the same language for `name(` and
//! attributing each site to its nearest enclosing definition.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::boundary::resolve_body;
use crate::buffer::{SourceText, TextBuffer};
use crate::calls::{find_calls, find_calls_named, site_range};
use crate::language::{LanguageConfig, LanguageDriver};
use crate::locator::{
    definition_at_line, find_definition_line, find_nearest_enclosing_definition, prepare_symbol,
};
use crate::model::{
    CallEdge, CallHierarchyResult, Endpoint, FileHandle, Position, Range, SymbolItem,
};
use crate::workspace::{FsWorkspace, Workspace};

pub const DEFAULT_EXCLUDE_GLOB: &str = "**/node_modules/**";

/// Cooperative cancellation shared between a request and whoever may abort it.
/// Checked before each file of the incoming scan.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outgoing edges plus the self-calls that were kept out of them.
#[derive(Debug, Default)]
pub struct OutgoingCalls {
    pub edges: Vec<CallEdge>,
    pub recursive_sites: Vec<Range>,
}

/// Stateless per request; one analyzer may serve concurrent requests.
pub struct Analyzer<'a, W: Workspace> {
    workspace: &'a W,
    languages: &'a LanguageConfig,
    exclude_glob: String,
}

impl<'a, W: Workspace> Analyzer<'a, W> {
    pub fn new(workspace: &'a W, languages: &'a LanguageConfig) -> Self {
        Self {
            workspace,
            languages,
            exclude_glob: DEFAULT_EXCLUDE_GLOB.to_string(),
        }
    }

    /// `Ok(None)` when there is no word under the cursor or the file's language
    /// is not supported. `Err` only when the workspace cannot be enumerated.
    pub async fn analyze(
        &self,
        document: &SourceText,
        file: &FileHandle,
        position: Position,
        cancel: &CancelFlag,
    ) -> Result<Option<CallHierarchyResult>> {
        let Some(driver) = self.languages.driver_for_path(&file.abs_path) else {
            crate::debug_log!("[callscope] unsupported file type: {}", file.rel_path);
            return Ok(None);
        };
        let Some(target) = prepare_symbol(document, position, driver, file) else {
            return Ok(None);
        };
        crate::debug_log!(
            "[callscope] target `{}` ({:?}) in {}",
            target.name,
            target.kind,
            file.rel_path
        );

        let (incoming, outgoing) = tokio::join!(
            self.incoming_calls(&target, document, driver, cancel),
            async { outgoing_calls(&target, document, driver) },
        );

        Ok(Some(CallHierarchyResult {
            target,
            incoming: incoming?,
            outgoing: outgoing.edges,
            recursive_sites: outgoing.recursive_sites,
        }))
    }

    /// Calls to `target` across the workspace. `target_document` stands in for
    /// the target's own file so unsaved text is what gets scanned.
    pub async fn incoming_calls(
        &self,
        target: &SymbolItem,
        target_document: &SourceText,
        driver: &dyn LanguageDriver,
        cancel: &CancelFlag,
    ) -> Result<Vec<CallEdge>> {
        let files = self
            .workspace
            .find_files(&driver.file_glob(), &self.exclude_glob)
            .await
            .context("Failed to enumerate workspace files")?;

        let mut edges = Vec::new();
        for file in files {
            if cancel.is_cancelled() {
                crate::debug_log!(
                    "[callscope] cancelled; returning {} incoming so far",
                    edges.len()
                );
                break;
            }
            let Some(file_driver) = self.languages.driver_for_path(&file.abs_path) else {
                continue;
            };

            if file.rel_path == target.file.rel_path {
                edges.extend(incoming_in_document(target_document, &file, target, file_driver));
                continue;
            }
            match self.workspace.open_document(&file).await {
                Ok(doc) => edges.extend(incoming_in_document(&doc, &file, target, file_driver)),
                Err(e) => {
                    crate::debug_log!("[callscope] skipping {}: {e:#}", file.rel_path);
                }
            }
        }
        Ok(edges)
    }
}

/// Incoming edges contributed by one document, in text order.
pub fn incoming_in_document(
    document: &dyn TextBuffer,
    file: &FileHandle,
    target: &SymbolItem,
    driver: &dyn LanguageDriver,
) -> Vec<CallEdge> {
    let mut edges = Vec::new();
    for offset in find_calls_named(document.full_text(), &target.name) {
        let at = document.offset_to_position(offset);
        // `def run(` matches `run(` too.
        if driver.is_definition_of(document.line_text(at.line), &target.name) {
            continue;
        }

        let caller = find_nearest_enclosing_definition(document, at, driver, file);
        if caller.as_ref().is_some_and(|c| c.name == target.name) {
            continue;
        }

        edges.push(CallEdge {
            caller: caller.map(Endpoint::Symbol).unwrap_or(Endpoint::ModuleScope),
            callee: Endpoint::Symbol(target.clone()),
            site_range: site_range(document, offset, target.name.len()),
            site_file: file.clone(),
        });
    }
    edges
}

/// Calls made from `target`'s body. A reference-site target is first resolved
/// to a definition of the same name in `document`; without one there are none.
pub fn outgoing_calls(
    target: &SymbolItem,
    document: &dyn TextBuffer,
    driver: &dyn LanguageDriver,
) -> OutgoingCalls {
    let definition = if target.is_definition() {
        Some(target.clone())
    } else {
        find_definition_line(document, &target.name, target.selection_range.start.line, driver)
            .and_then(|line| definition_at_line(document, line, driver, &target.file))
    };
    let Some(definition) = definition else {
        crate::debug_log!(
            "[callscope] no definition of `{}` in {}",
            target.name,
            target.file.rel_path
        );
        return OutgoingCalls::default();
    };
    let Some(body) = resolve_body(document, &definition, driver) else {
        return OutgoingCalls::default();
    };
    let body_text = body.text(document);

    let edges = find_calls(body_text, &target.name)
        .into_iter()
        .filter(|call| !driver.is_keyword(&call.name))
        .map(|call| {
            let site = site_range(document, body.start + call.offset, call.name.len());
            let callee = SymbolItem::reference_site(call.name, site, target.file.clone());
            CallEdge {
                caller: Endpoint::Symbol(target.clone()),
                callee: Endpoint::Symbol(callee),
                site_range: site,
                site_file: target.file.clone(),
            }
        })
        .collect();

    let recursive_sites = find_calls_named(body_text, &target.name)
        .into_iter()
        .map(|offset| site_range(document, body.start + offset, target.name.len()))
        .collect();

    OutgoingCalls {
        edges,
        recursive_sites,
    }
}

/// One-shot analysis of a file on disk, as the CLI and MCP server run it.
///
/// `file` may be absolute or relative to `root`; `position` is 0-indexed.
pub async fn analyze_path(
    root: &Path,
    file: &Path,
    position: Position,
    cancel: &CancelFlag,
) -> Result<Option<CallHierarchyResult>> {
    let config = crate::config::load_config(root);
    let languages = LanguageConfig::with_rules(&config.languages)
        .context("Invalid language rule in config")?;
    let workspace = FsWorkspace::new(root, config);

    let handle = workspace.file_handle(file)?;
    let document = workspace
        .open_document(&handle)
        .await
        .with_context(|| format!("Failed to open target file {}", handle.rel_path))?;

    Analyzer::new(&workspace, &languages)
        .analyze(&document, &handle, position, cancel)
        .await
}
