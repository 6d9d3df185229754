use anyhow::{Context, Result};
use serde_json::json;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::hierarchy::{analyze_path, CancelFlag};
use crate::model::Position;

pub struct ServerState {
    repo_root: Option<PathBuf>,
    runtime: tokio::runtime::Runtime,
}

impl ServerState {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        Ok(Self {
            repo_root: None,
            runtime,
        })
    }

    fn repo_root_from_params(&mut self, params: &serde_json::Value) -> PathBuf {
        let repo_root = params
            .get("repoPath")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .or_else(|| self.repo_root.clone())
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        self.repo_root = Some(repo_root.clone());
        repo_root
    }

    fn tool_list(&self, id: serde_json::Value) -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "tools": [
                    {
                        "name": "call_hierarchy",
                        "description": "Shows who calls the function at a cursor position (incoming, searched across the workspace) and what that function calls (outgoing, from its own body). Lexical and language-agnostic: no build or language server needed.",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "repoPath": { "type": "string", "description": "Absolute path to the workspace root" },
                                "path": { "type": "string", "description": "Source file (relative to repoPath or absolute)" },
                                "line": { "type": "integer", "description": "1-based cursor line" },
                                "column": { "type": "integer", "description": "1-based cursor column (bytes)" }
                            },
                            "required": ["path", "line", "column"]
                        }
                    }
                ]
            }
        })
    }

    fn tool_call(
        &mut self,
        id: serde_json::Value,
        params: &serde_json::Value,
    ) -> serde_json::Value {
        let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        let ok = |text: String| {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{"type":"text","text": text }], "isError": false }
            })
        };

        let err = |msg: String| {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{"type":"text","text": msg }], "isError": true }
            })
        };

        match name {
            "call_hierarchy" => {
                let repo_root = self.repo_root_from_params(&args);
                let Some(p) = args.get("path").and_then(|v| v.as_str()) else {
                    return err("Missing path".to_string());
                };
                let positive = |key: &str| args.get(key).and_then(|v| v.as_u64()).filter(|&n| n >= 1);
                let Some(line) = positive("line") else {
                    return err("Missing line (1-based integer)".to_string());
                };
                let Some(column) = positive("column") else {
                    return err("Missing column (1-based integer)".to_string());
                };

                let file = resolve_path(&repo_root, p);
                let position = Position::new(line as usize - 1, column as usize - 1);
                match self.call_hierarchy(&repo_root, &file, position) {
                    Ok(Some(text)) => ok(text),
                    Ok(None) => ok(format!("No function found at {p}:{line}:{column}")),
                    Err(e) => err(format!("call_hierarchy failed: {e:#}")),
                }
            }
            _ => err(format!("Tool not found: {name}")),
        }
    }

    fn call_hierarchy(
        &self,
        repo_root: &Path,
        file: &Path,
        position: Position,
    ) -> Result<Option<String>> {
        let cancel = CancelFlag::new();
        let result = self
            .runtime
            .block_on(analyze_path(repo_root, file, position, &cancel))?;
        let Some(result) = result else { return Ok(None) };
        Ok(Some(serde_json::to_string_pretty(&result.to_report())?))
    }
}

/// Resolve a path parameter: if absolute, use as-is; otherwise join to repo_root.
fn resolve_path(repo_root: &Path, p: &str) -> PathBuf {
    let pb = PathBuf::from(p);
    if pb.is_absolute() { pb } else { repo_root.join(p) }
}

pub fn run_stdio_server() -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    let mut state = ServerState::new()?;

    for line in stdin.lock().lines() {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }

        let msg: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        // Notifications carry no id and get no reply.
        if msg.get("id").is_none() {
            continue;
        }

        let id = msg.get("id").cloned().unwrap_or(json!(null));
        let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("");

        let reply = match method {
            "initialize" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": msg.get("params").and_then(|p| p.get("protocolVersion")).cloned().unwrap_or(json!("2024-11-05")),
                    "capabilities": { "tools": { "listChanged": true } },
                    "serverInfo": { "name": "callscope", "version": env!("CARGO_PKG_VERSION") }
                }
            }),
            "ping" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {}
            }),
            "tools/list" => state.tool_list(id),
            "tools/call" => {
                let params = msg.get("params").cloned().unwrap_or(json!({}));
                state.tool_call(id, &params)
            }
            "resources/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "resources": [] }
            }),
            "prompts/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "prompts": [] }
            }),
            _ => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {method}") }
            }),
        };

        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }

    Ok(())
}
