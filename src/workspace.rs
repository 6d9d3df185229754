//! Workspace access for the analyzer: enumerating candidate files and opening them.
//!
//! The analyzer only sees the [`Workspace`] trait. [`FsWorkspace`] is the on-disk
//! implementation used by the CLI and the MCP server.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::buffer::SourceText;
use crate::config::Config;
use crate::model::FileHandle;
use crate::scanner::{path_relative_to, scan_workspace, ScanOptions};

pub trait Workspace: Sync {
    /// Files matching `include_glob` and not matching `exclude_glob`, sorted by
    /// relative path.
    fn find_files(
        &self,
        include_glob: &str,
        exclude_glob: &str,
    ) -> impl Future<Output = Result<Vec<FileHandle>>> + Send;

    /// Whole-file text. An error here means "skip this file".
    fn open_document(&self, file: &FileHandle) -> impl Future<Output = Result<SourceText>> + Send;
}

#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
    config: Config,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Handle for `path`, which may be absolute or relative to the root.
    pub fn file_handle(&self, path: &Path) -> Result<FileHandle> {
        let abs_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let rel_path = path_relative_to(&abs_path, &self.root)?;
        Ok(FileHandle::new(abs_path, rel_path))
    }

    fn scan_options(&self, include_glob: &str, exclude_glob: &str) -> ScanOptions {
        let scan = &self.config.scan;
        let mut exclude_globs = scan.exclude_globs.clone();
        if !exclude_glob.is_empty() && !exclude_globs.iter().any(|g| g == exclude_glob) {
            exclude_globs.push(exclude_glob.to_string());
        }
        ScanOptions {
            root: self.root.clone(),
            include_glob: include_glob.to_string(),
            exclude_globs,
            exclude_dir_names: scan.exclude_dir_names.clone(),
            max_file_bytes: scan.effective_max_file_bytes(),
            respect_gitignore: scan.respect_gitignore,
        }
    }
}

impl Workspace for FsWorkspace {
    async fn find_files(&self, include_glob: &str, exclude_glob: &str) -> Result<Vec<FileHandle>> {
        let opts = self.scan_options(include_glob, exclude_glob);
        tokio::task::spawn_blocking(move || scan_workspace(&opts))
            .await
            .context("workspace scan task panicked")?
    }

    async fn open_document(&self, file: &FileHandle) -> Result<SourceText> {
        let bytes = tokio::fs::read(&file.abs_path)
            .await
            .with_context(|| format!("Failed to read {}", file.abs_path.display()))?;
        decode_source(bytes).with_context(|| format!("Failed to decode {}", file.rel_path))
    }
}

/// UTF-8 text with an optional BOM stripped. NUL bytes mark a binary file.
pub fn decode_source(bytes: Vec<u8>) -> Result<SourceText> {
    if bytes.contains(&0) {
        anyhow::bail!("binary content");
    }
    let text = String::from_utf8(bytes).context("not valid UTF-8")?;
    let text = match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    };
    Ok(SourceText::new(text))
}
