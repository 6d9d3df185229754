use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

/// How a language delimits function bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStyle {
    Indentation,
    Braces,
}

/// Per-language rules the analyzer is parameterized by.
///
/// A driver only has to recognize *definition lines*; everything else
/// (call scanning, enclosing-definition walks, body boundaries) is shared.
pub trait LanguageDriver: Send + Sync {
    fn name(&self) -> &str;
    /// File extensions handled by this driver (lowercase, without dot).
    fn extensions(&self) -> &[String];
    fn block_style(&self) -> BlockStyle;
    /// Matches a definition line; capture group 1 is the defined name.
    fn definition_pattern(&self) -> &Regex;
    /// Syntax that looks like `word(` but is not a call.
    fn is_keyword(&self, _word: &str) -> bool {
        false
    }

    /// Name defined on `line` and its byte span within the line, if `line` is a definition line.
    fn definition_on_line<'a>(&self, line: &'a str) -> Option<(&'a str, usize, usize)> {
        let caps = self.definition_pattern().captures(line)?;
        let m = caps.get(1)?;
        Some((m.as_str(), m.start(), m.end()))
    }

    fn is_definition_of(&self, line: &str, name: &str) -> bool {
        self.definition_on_line(line).is_some_and(|(n, _, _)| n == name)
    }

    /// Glob selecting every candidate file of this language, e.g. `**/*.{py,pyi}`.
    fn file_glob(&self) -> String {
        match self.extensions() {
            [one] => format!("**/*.{one}"),
            many => format!("**/*.{{{}}}", many.join(",")),
        }
    }
}

/// Table-driven driver; every built-in language and every configured one is an instance.
pub struct RuleDriver {
    name: String,
    extensions: Vec<String>,
    block_style: BlockStyle,
    definition: Regex,
    keywords: Vec<String>,
}

impl RuleDriver {
    pub fn new(
        name: &str,
        extensions: &[&str],
        block_style: BlockStyle,
        definition_pattern: &str,
        keywords: &[&str],
    ) -> Result<Self> {
        let definition = Regex::new(definition_pattern)
            .with_context(|| format!("invalid definition pattern for language `{name}`"))?;
        if definition.captures_len() < 2 {
            return Err(anyhow!(
                "definition pattern for language `{name}` needs a capture group for the name"
            ));
        }
        Ok(Self {
            name: name.to_string(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            block_style,
            definition,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        })
    }
}

impl LanguageDriver for RuleDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn block_style(&self) -> BlockStyle {
        self.block_style
    }

    fn definition_pattern(&self) -> &Regex {
        &self.definition
    }

    fn is_keyword(&self, word: &str) -> bool {
        self.keywords.iter().any(|k| k == word)
    }
}

/// A language rule declared in `.callscope.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageRuleConfig {
    pub name: String,
    pub extensions: Vec<String>,
    pub definition_pattern: String,
    pub block_style: BlockStyle,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl LanguageRuleConfig {
    fn to_driver(&self) -> Result<RuleDriver> {
        let exts: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
        let kws: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        RuleDriver::new(&self.name, &exts, self.block_style, &self.definition_pattern, &kws)
    }
}

const PYTHON_DEF: &str = r"^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(";
const PYTHON_KEYWORDS: &[&str] = &[
    "if", "elif", "while", "for", "return", "and", "or", "not", "in", "is", "assert", "del",
    "yield", "await", "lambda", "with", "except", "raise",
];

const TYPESCRIPT_DEF: &str = concat!(
    r"^\s*(?:export\s+)?(?:declare\s+)?(?:default\s+)?(?:async\s+)?function(?:\s*\*\s*|\s+)([A-Za-z_$][A-Za-z0-9_$]*)\s*[<(]",
    r"|^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][A-Za-z0-9_$]*\s*=>)",
    // Class methods: `name(args) {` alone on its line, optional modifiers.
    r"|^\s*(?:(?:public|private|protected|static|async|override|get|set)\s+)*\*?([A-Za-z_$][A-Za-z0-9_$]*)\s*(?:<[^>]*>)?\s*\([^)]*\)\s*(?::\s*[^{;=]+)?\{\s*$",
);
const BRACE_KEYWORDS: &[&str] = &[
    "if", "else", "while", "for", "switch", "catch", "return", "typeof", "sizeof", "new",
    "function", "await", "yield", "void", "delete", "throw", "match", "loop", "in", "of",
    "super", "import", "select", "defer", "go", "func", "fn",
];

const RUST_DEF: &str = r#"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?(?:default\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+(?:"[^"]*"\s+)?)?fn\s+([A-Za-z_][A-Za-z0-9_]*)"#;

const GO_DEF: &str = r"^\s*func\s+(?:\([^)]*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*[\[(]";

/// Driver that picks whichever capture group matched; the TypeScript pattern
/// has one group per alternative. Keywords never count as defined names
/// (`if (ready) {` has the shape of a method).
struct AlternationDriver(RuleDriver);

impl LanguageDriver for AlternationDriver {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn extensions(&self) -> &[String] {
        self.0.extensions()
    }

    fn block_style(&self) -> BlockStyle {
        self.0.block_style()
    }

    fn definition_pattern(&self) -> &Regex {
        self.0.definition_pattern()
    }

    fn is_keyword(&self, word: &str) -> bool {
        self.0.is_keyword(word)
    }

    fn definition_on_line<'a>(&self, line: &'a str) -> Option<(&'a str, usize, usize)> {
        let caps = self.0.definition_pattern().captures(line)?;
        let (group, m) = caps
            .iter()
            .enumerate()
            .skip(1)
            .find_map(|(i, g)| g.map(|g| (i, g)))?;
        if self.0.is_keyword(m.as_str()) {
            return None;
        }
        // `run(function () {` and `on("x", () => {` have the shape of a method.
        if group == METHOD_GROUP && passes_callback(&line[m.end()..]) {
            return None;
        }
        Some((m.as_str(), m.start(), m.end()))
    }
}

/// Capture group of the class-method alternative in `TYPESCRIPT_DEF`.
const METHOD_GROUP: usize = 3;

fn passes_callback(after_name: &str) -> bool {
    after_name.contains("=>")
        || after_name
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
            .any(|word| word == "function")
}

fn builtin_drivers() -> Vec<Box<dyn LanguageDriver>> {
    let table: Vec<Result<Box<dyn LanguageDriver>>> = vec![
        RuleDriver::new(
            "python",
            &["py", "pyi"],
            BlockStyle::Indentation,
            PYTHON_DEF,
            PYTHON_KEYWORDS,
        )
        .map(|d| Box::new(d) as Box<dyn LanguageDriver>),
        RuleDriver::new(
            "typescript",
            &["ts", "tsx", "js", "jsx", "mjs", "cjs"],
            BlockStyle::Braces,
            TYPESCRIPT_DEF,
            BRACE_KEYWORDS,
        )
        .map(|d| Box::new(AlternationDriver(d)) as Box<dyn LanguageDriver>),
        RuleDriver::new("rust", &["rs"], BlockStyle::Braces, RUST_DEF, BRACE_KEYWORDS)
            .map(|d| Box::new(d) as Box<dyn LanguageDriver>),
        RuleDriver::new("go", &["go"], BlockStyle::Braces, GO_DEF, BRACE_KEYWORDS)
            .map(|d| Box::new(d) as Box<dyn LanguageDriver>),
    ];

    // Built-in patterns are constants; `all_builtin_drivers_compile` covers them.
    table.into_iter().filter_map(Result::ok).collect()
}

fn path_ext_lower(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Registry of language drivers, looked up by file extension.
pub struct LanguageConfig {
    drivers: Vec<Box<dyn LanguageDriver>>,
    by_ext: HashMap<String, usize>,
}

impl LanguageConfig {
    fn from_drivers(drivers: Vec<Box<dyn LanguageDriver>>) -> Self {
        let mut cfg = Self {
            drivers,
            by_ext: HashMap::new(),
        };
        // Later drivers win, so configured rules override built-ins.
        for (idx, d) in cfg.drivers.iter().enumerate() {
            for ext in d.extensions() {
                cfg.by_ext.insert(ext.clone(), idx);
            }
        }
        cfg
    }

    /// Built-in drivers plus rules declared in configuration.
    pub fn with_rules(rules: &[LanguageRuleConfig]) -> Result<Self> {
        let mut drivers = builtin_drivers();
        for rule in rules {
            drivers.push(Box::new(rule.to_driver()?));
        }
        Ok(Self::from_drivers(drivers))
    }

    pub fn driver_for_path(&self, path: &Path) -> Option<&dyn LanguageDriver> {
        let ext = path_ext_lower(path);
        let idx = *self.by_ext.get(&ext)?;
        self.drivers.get(idx).map(|d| d.as_ref())
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self::from_drivers(builtin_drivers())
    }
}

pub fn language_config() -> &'static LanguageConfig {
    static CFG: OnceLock<LanguageConfig> = OnceLock::new();
    CFG.get_or_init(LanguageConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(ext: &str) -> &'static dyn LanguageDriver {
        language_config()
            .driver_for_path(Path::new(&format!("x.{ext}")))
            .unwrap()
    }

    #[test]
    fn all_builtin_drivers_compile() {
        assert_eq!(builtin_drivers().len(), 4);
    }

    #[test]
    fn python_definition_lines() {
        let py = driver("py");
        assert_eq!(py.block_style(), BlockStyle::Indentation);
        assert_eq!(py.definition_on_line("def run():").map(|d| d.0), Some("run"));
        assert_eq!(
            py.definition_on_line("    async def fetch_all (x, y):"),
            Some(("fetch_all", 14, 23))
        );
        assert!(py.definition_on_line("run()").is_none());
        assert!(py.definition_on_line("class Run:").is_none());
        assert!(py.definition_on_line("    undef = define(1)").is_none());
        assert!(py.is_definition_of("def fact(n): return n * fact(n-1)", "fact"));
        assert!(!py.is_definition_of("def fact(n):", "fac"));
    }

    fn def_name<'a>(d: &dyn LanguageDriver, line: &'a str) -> Option<&'a str> {
        d.definition_on_line(line).map(|(name, _, _)| name)
    }

    #[test]
    fn typescript_definition_lines() {
        let ts = driver("tsx");
        assert_eq!(ts.block_style(), BlockStyle::Braces);
        assert_eq!(def_name(ts, "export async function load(url) {"), Some("load"));
        assert_eq!(def_name(ts, "function* gen() {"), Some("gen"));
        assert_eq!(def_name(ts, "declare function ext(a: number): void;"), Some("ext"));
        assert_eq!(def_name(ts, "function id<T>(x: T): T {"), Some("id"));
        assert_eq!(def_name(ts, "const handler = async (req, res) => {"), Some("handler"));
        assert_eq!(def_name(ts, "let f = function () {"), Some("f"));
        assert_eq!(def_name(ts, "const sq = x => x * x;"), Some("sq"));
        assert!(def_name(ts, "const total = sum(a, b);").is_none());
        assert!(def_name(ts, "  if (ready) {").is_none());
        assert!(def_name(ts, "  while (i < n) {").is_none());
        assert_eq!(def_name(ts, "  async process(item: Item): Promise<void> {"), Some("process"));
        assert_eq!(def_name(ts, "  constructor(private db: Db) {"), Some("constructor"));
        assert!(def_name(ts, "  describe(\"suite\", () => {").is_none());
        assert!(def_name(ts, "  run(task);").is_none());
        assert!(ts.is_keyword("if"));
        assert!(!ts.is_keyword("load"));
    }

    #[test]
    fn typescript_call_with_callback_is_not_a_method() {
        let ts = driver("ts");
        assert!(def_name(ts, "  run(function () {").is_none());
        assert!(def_name(ts, "setTimeout(function tick() {").is_none());
        assert!(def_name(ts, "  describe(\"x\", function () {").is_none());
        assert!(def_name(ts, "  on(evt => {").is_none());
        // A parameter merely named like the keyword is still a method.
        assert_eq!(def_name(ts, "  register(functionName: string) {"), Some("register"));
        // `function` declarations are not subject to the callback check.
        assert_eq!(def_name(ts, "function run(cb = function () {}) {"), Some("run"));
    }

    #[test]
    fn rust_and_go_definition_lines() {
        let rs = driver("rs");
        assert_eq!(def_name(rs, "pub(crate) async fn spawn_worker("), Some("spawn_worker"));
        assert_eq!(def_name(rs, r#"pub extern "C" fn ffi() {"#), Some("ffi"));
        assert_eq!(def_name(rs, "    fn helper<T>(x: T) {"), Some("helper"));
        assert!(def_name(rs, "let f = |x| x + 1;").is_none());

        let go = driver("go");
        assert_eq!(def_name(go, "func (s *Server) Run(ctx context.Context) error {"), Some("Run"));
        assert_eq!(def_name(go, "func Map[T any](xs []T) {"), Some("Map"));
        assert!(def_name(go, "go func() {").is_none());
    }

    #[test]
    fn file_glob_lists_every_extension() {
        assert_eq!(driver("py").file_glob(), "**/*.{py,pyi}");
        assert_eq!(driver("rs").file_glob(), "**/*.rs");
    }

    #[test]
    fn configured_rule_overrides_builtin_extension() {
        let rules = vec![LanguageRuleConfig {
            name: "starlark".into(),
            extensions: vec!["py".into(), ".bzl".into()],
            definition_pattern: r"^\s*def\s+(\w+)\s*\(".into(),
            block_style: BlockStyle::Indentation,
            keywords: vec!["load".into()],
        }];
        let cfg = LanguageConfig::with_rules(&rules).unwrap();
        let d = cfg.driver_for_path(Path::new("BUILD.bzl")).unwrap();
        assert_eq!(d.name(), "starlark");
        assert_eq!(cfg.driver_for_path(Path::new("a.PY")).unwrap().name(), "starlark");
        assert!(d.is_keyword("load"));
        assert!(cfg.driver_for_path(Path::new("a.pyi")).is_some());
        assert!(cfg.driver_for_path(Path::new("notes.txt")).is_none());
    }

    #[test]
    fn configured_rule_without_capture_group_is_rejected() {
        let rules = vec![LanguageRuleConfig {
            name: "broken".into(),
            extensions: vec!["zz".into()],
            definition_pattern: r"^\s*proc\s+\w+".into(),
            block_style: BlockStyle::Braces,
            keywords: vec![],
        }];
        assert!(LanguageConfig::with_rules(&rules).is_err());
    }
}
