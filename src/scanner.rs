use anyhow::{Context, Result};
use glob::Pattern;
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::model::FileHandle;

/// Dependency, vendor and build directories never searched for callers.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "vendor",
    "__pycache__",
    ".venv",
    "venv",
    "site-packages",
    ".callscope",
];

fn walk_overrides(
    root: &Path,
    include_glob: &str,
    exclude_dir_names: &[String],
) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // Plain globs whitelist; anything not matching one is skipped (directories
    // are still descended into).
    ob.add(include_glob)
        .with_context(|| format!("invalid include glob `{include_glob}`"))?;

    // Both the directory entry and everything below it.
    let dirs = DEFAULT_EXCLUDED_DIRS
        .iter()
        .map(|d| d.to_string())
        .chain(exclude_dir_names.iter().cloned());
    for d in dirs {
        let d = d.trim().trim_matches('/').to_string();
        if d.is_empty() {
            continue;
        }
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    /// e.g. `**/*.{ts,js}`.
    pub include_glob: String,
    /// Matched against workspace-relative paths.
    pub exclude_globs: Vec<String>,
    pub exclude_dir_names: Vec<String>,
    pub max_file_bytes: u64,
    pub respect_gitignore: bool,
}

/// Candidate files under `opts.root`, sorted by relative path.
///
/// Oversized and empty files are left out; a bad glob or a missing root is an error.
pub fn scan_workspace(opts: &ScanOptions) -> Result<Vec<FileHandle>> {
    let meta = std::fs::metadata(&opts.root)
        .with_context(|| format!("Workspace root does not exist: {}", opts.root.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("Workspace root is not a directory: {}", opts.root.display());
    }

    let excludes = opts
        .exclude_globs
        .iter()
        .map(|g| Pattern::new(g).with_context(|| format!("invalid exclude glob `{g}`")))
        .collect::<Result<Vec<_>>>()?;

    let overrides = walk_overrides(&opts.root, &opts.include_glob, &opts.exclude_dir_names)?;
    let walker = WalkBuilder::new(&opts.root)
        .standard_filters(opts.respect_gitignore) // .gitignore, .ignore, etc.
        .hidden(true)
        .overrides(overrides)
        .build();

    let mut entries = Vec::new();
    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_) => continue,
        };

        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let abs_path = dent.into_path();
        let bytes = match std::fs::metadata(&abs_path).map(|m| m.len()) {
            Ok(b) => b,
            Err(_) => continue,
        };
        if bytes == 0 || bytes > opts.max_file_bytes {
            crate::debug_log!("[callscope] skipping {} ({} bytes)", abs_path.display(), bytes);
            continue;
        }

        let rel_path = path_relative_to(&abs_path, &opts.root)?;
        if excludes.iter().any(|p| p.matches(&rel_path)) {
            continue;
        }

        entries.push(FileHandle::new(abs_path, rel_path));
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}

pub fn path_relative_to(path: &Path, base: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(base)
        .with_context(|| format!("{} is not under {}", path.display(), base.display()))?;
    Ok(rel.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, content).unwrap();
    }

    fn opts(root: &Path, include: &str) -> ScanOptions {
        ScanOptions {
            root: root.to_path_buf(),
            include_glob: include.to_string(),
            exclude_globs: vec!["**/node_modules/**".into()],
            exclude_dir_names: vec![],
            max_file_bytes: 1024,
            respect_gitignore: true,
        }
    }

    fn rels(files: &[FileHandle]) -> Vec<&str> {
        files.iter().map(|f| f.rel_path.as_str()).collect()
    }

    #[test]
    fn include_glob_selects_language_and_sorts() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "z.py", "def z():\n    pass\n");
        write(tmp.path(), "pkg/a.py", "a()\n");
        write(tmp.path(), "pkg/b.pyi", "def b(): ...\n");
        write(tmp.path(), "web/app.ts", "run();\n");

        let files = scan_workspace(&opts(tmp.path(), "**/*.{py,pyi}")).unwrap();
        assert_eq!(rels(&files), vec!["pkg/a.py", "pkg/b.pyi", "z.py"]);
        assert!(files[0].abs_path.ends_with("pkg/a.py"));
    }

    #[test]
    fn dependency_dirs_and_excludes_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "main.py", "run()\n");
        write(tmp.path(), "node_modules/lib/x.py", "run()\n");
        write(tmp.path(), ".venv/lib/site.py", "run()\n");
        write(tmp.path(), "generated/gen.py", "run()\n");
        write(tmp.path(), "docs/conf.py", "run()\n");

        let mut o = opts(tmp.path(), "**/*.py");
        o.exclude_dir_names = vec!["generated/".into()];
        o.exclude_globs.push("docs/**".into());
        let files = scan_workspace(&o).unwrap();
        assert_eq!(rels(&files), vec!["main.py"]);
    }

    #[test]
    fn oversized_and_empty_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "big.py", &"x = f()\n".repeat(500));
        write(tmp.path(), "empty.py", "");
        write(tmp.path(), "ok.py", "f()\n");
        let files = scan_workspace(&opts(tmp.path(), "**/*.py")).unwrap();
        assert_eq!(rels(&files), vec!["ok.py"]);
    }

    #[test]
    fn missing_root_or_bad_glob_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(scan_workspace(&opts(&tmp.path().join("nope"), "**/*.py")).is_err());

        let mut o = opts(tmp.path(), "**/*.py");
        o.exclude_globs = vec!["[".into()];
        assert!(scan_workspace(&o).is_err());
    }
}
