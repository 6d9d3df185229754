use anyhow::{Context, Result};
use callscope::config::load_config;
use callscope::hierarchy::{analyze_path, CancelFlag};
use callscope::model::Position;
use callscope::server::run_stdio_server;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "callscope")]
#[command(version)]
#[command(about = "Lexical call hierarchy for any language (CLI + MCP server)")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Incoming and outgoing calls of the function at FILE:LINE:COLUMN
    Analyze {
        /// Source file containing the cursor
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// 1-based cursor line
        #[arg(long, short = 'l', value_parser = clap::value_parser!(u64).range(1..))]
        line: u64,

        /// 1-based cursor column, in bytes
        #[arg(long, short = 'c', value_parser = clap::value_parser!(u64).range(1..))]
        column: u64,

        /// Workspace root searched for callers (defaults to the current directory)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Also write {output_dir}/callHierarchy.json under the root
        #[arg(long)]
        write: bool,

        /// Pretty-print the JSON on stdout
        #[arg(long)]
        pretty: bool,
    },
    /// Start MCP stdio server
    Mcp,
}

fn absolute(cwd: &Path, p: PathBuf) -> PathBuf {
    if p.is_absolute() { p } else { cwd.join(p) }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Command::Analyze { file, line, column, root, write, pretty } = cli.cmd else {
        return run_stdio_server();
    };

    let cwd = std::env::current_dir().context("Failed to get current dir")?;
    let repo_root = absolute(&cwd, root.unwrap_or_else(|| cwd.clone()));
    let file = absolute(&cwd, file);
    let position = Position::new(line as usize - 1, column as usize - 1);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message("searching for calls...");

    let cancel = CancelFlag::new();
    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        // Ctrl-C stops the caller search; whatever was found so far is still reported.
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });
        analyze_path(&repo_root, &file, position, &cancel).await
    });

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    let Some(result) = result else {
        spinner.finish_and_clear();
        eprintln!("No function found at {}:{line}:{column}", file.display());
        return Ok(());
    };
    spinner.finish_with_message(format!(
        "{} incoming, {} outgoing{}",
        result.incoming.len(),
        result.outgoing.len(),
        if cancel.is_cancelled() { " (interrupted)" } else { "" }
    ));

    let report = result.to_report();
    if write {
        let cfg = load_config(&repo_root);
        let out_dir = repo_root.join(&cfg.output_dir);
        std::fs::create_dir_all(&out_dir)?;
        let out_path = out_dir.join("callHierarchy.json");
        std::fs::write(&out_path, serde_json::to_vec_pretty(&report)?)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        eprintln!("Wrote {}", out_path.display());
    }

    if pretty {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", serde_json::to_string(&report)?);
    }

    Ok(())
}
