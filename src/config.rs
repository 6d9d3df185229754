use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::language::LanguageRuleConfig;

pub const CONFIG_FILE_NAME: &str = ".callscope.json";

/// Hard safety ceiling: files larger than this are **always** skipped, regardless of config.
/// Minified bundles and generated tables are not worth regex-scanning.
pub const ABSOLUTE_MAX_FILE_BYTES: u64 = 1_000_000; // 1 MB

/// Controls which candidate files incoming-call search visits.
///
/// Note: `.gitignore` is respected by default; dependency and vendor
/// directories are always skipped (see `scanner::DEFAULT_EXCLUDED_DIRS`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Extra directory *names* to skip anywhere in the tree (e.g. "generated", "tmp").
    ///
    /// These are compared against path components, not full paths.
    pub exclude_dir_names: Vec<String>,

    /// Extra exclude globs, matched against workspace-relative paths.
    pub exclude_globs: Vec<String>,

    /// Larger files are skipped like unreadable ones.
    pub max_file_bytes: u64,

    pub respect_gitignore: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dir_names: vec![],
            exclude_globs: vec!["**/node_modules/**".to_string()],
            // 512 KB.
            max_file_bytes: 512 * 1024,
            respect_gitignore: true,
        }
    }
}

impl ScanConfig {
    pub fn effective_max_file_bytes(&self) -> u64 {
        self.max_file_bytes.min(ABSOLUTE_MAX_FILE_BYTES)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where `--write` puts `callHierarchy.json`, relative to the workspace root.
    pub output_dir: PathBuf,
    /// Settings that govern file discovery and exclusion.
    pub scan: ScanConfig,
    /// Extra language rules; a rule overrides a built-in one for the same extension.
    pub languages: Vec<LanguageRuleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".callscope"),
            scan: ScanConfig::default(),
            languages: vec![],
        }
    }
}

pub fn load_config(repo_root: &Path) -> Config {
    let primary = repo_root.join(CONFIG_FILE_NAME);

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
        crate::debug_log!("[callscope] ignoring {}: {e}", primary.display());
        Config::default()
    })
}
