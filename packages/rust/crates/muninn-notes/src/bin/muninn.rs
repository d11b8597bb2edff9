#![allow(missing_docs)]

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use muninn_notes::{BacklinkGroup, CacheConfig, Notebook, PersistentCache};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "muninn";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Parser, Debug)]
#[command(
    name = "muninn",
    about = "Muninn notes CLI: cached markdown scan and backlinks",
    arg_required_else_help = true
)]
struct Cli {
    /// Notes root directory (overrides `dir` from the config file).
    #[arg(long, short = 'r', value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    /// Explicit config file (default: `<config dir>/muninn/config.json`).
    #[arg(long = "conf", short = 'c', value_name = "FILE", global = true)]
    config_file: Option<PathBuf>,

    /// Cache snapshot file (default: `<cache dir>/muninn/cache.json`).
    #[arg(long = "cache-file", value_name = "FILE", global = true)]
    cache_file: Option<PathBuf>,

    /// Output format.
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Json, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find all notes referencing the given file.
    Backlinks {
        /// Target note (absolute, or relative to the notes root).
        #[arg(long)]
        file: PathBuf,
    },
    /// Scan the notes root and report cache usage.
    Scan,
    /// Clear the cache; it is rebuilt on the next command.
    ClearCache,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
    /// Quickfix lines: `file:line:col:text`.
    Vim,
}

#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    dir: Option<PathBuf>,
}

fn load_user_config(explicit: Option<&Path>) -> Result<UserConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir() {
            Some(dir) => dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
            None => return Ok(UserConfig::default()),
        },
    };
    match std::fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
            Ok(UserConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read config file {}", path.display())),
    }
}

fn resolve_cache_config(cli: &Cli) -> Result<CacheConfig> {
    match &cli.cache_file {
        Some(path) => Ok(CacheConfig::new(path)),
        None => CacheConfig::default_location()
            .ok_or_else(|| anyhow!("no platform cache directory; pass --cache-file")),
    }
}

fn resolve_root(cli: &Cli) -> Result<PathBuf> {
    if let Some(root) = &cli.root {
        return Ok(root.clone());
    }
    load_user_config(cli.config_file.as_deref())?
        .dir
        .ok_or_else(|| {
            anyhow!("no notes directory configured; pass --root or set `dir` in the config file")
        })
}

fn emit<T: Serialize>(value: &T, output: OutputFormat) -> Result<()> {
    let text = match output {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Json | OutputFormat::Vim => serde_json::to_string(value)?,
    };
    println!("{text}");
    Ok(())
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn print_quickfix(root: &Path, groups: &[BacklinkGroup]) {
    for group in groups {
        let path = root.join(&group.source);
        for backlink in &group.backlinks {
            let (line, column) = backlink
                .node
                .position
                .map_or((1, 1), |pos| (pos.start.line, pos.start.column));
            let text = backlink
                .context
                .as_ref()
                .unwrap_or(&backlink.node)
                .plain_text();
            println!("{}:{line}:{column}:{}", path.display(), one_line(&text));
        }
    }
}

fn run_backlinks(cli: &Cli, file: &Path) -> Result<()> {
    let root = resolve_root(cli)?;
    let mut notebook = Notebook::open(&root, resolve_cache_config(cli)?)
        .with_context(|| format!("cannot open notes root {}", root.display()))?;
    let target = notebook
        .relative_target(file)
        .ok_or_else(|| anyhow!("{} is not inside {}", file.display(), notebook.root().display()))?;
    notebook.scan();
    let groups = notebook.backlinks(&target);
    match cli.output {
        OutputFormat::Vim => print_quickfix(notebook.root(), &groups),
        output => emit(&json!({ "file": target, "groups": groups }), output)?,
    }
    notebook.store().context("failed to save cache")?;
    Ok(())
}

fn run_scan(cli: &Cli) -> Result<()> {
    let root = resolve_root(cli)?;
    let mut notebook = Notebook::open(&root, resolve_cache_config(cli)?)
        .with_context(|| format!("cannot open notes root {}", root.display()))?;
    let report = notebook.scan();
    emit(&report.stats(), cli.output)?;
    notebook.store().context("failed to save cache")?;
    Ok(())
}

fn run_clear_cache(cli: &Cli) -> Result<()> {
    let cache = PersistentCache::open(resolve_cache_config(cli)?);
    let removed = cache.clear().context("failed to clear cache")?;
    emit(
        &json!({ "cleared": removed, "snapshot": cache.snapshot_path() }),
        cli.output,
    )
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Backlinks { file } => run_backlinks(&cli, file),
        Command::Scan => run_scan(&cli),
        Command::ClearCache => run_clear_cache(&cli),
    }
}
