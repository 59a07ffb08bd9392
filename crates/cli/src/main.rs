//! gbwf command-line tool.
//!
//! Bootstraps a project workspace from a base template and a set of plugins,
//! each living in its own git repository, and folds their histories together
//! with the core merge engine.

mod init;
mod select;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use gbwf_core::errors::MergeError;
use gbwf_core::git::GitClient;
use gbwf_core::manifest::{Base, Manifest, DEFAULT_REF};
use gbwf_core::merge::{MergeOptions, MergeState, MergeStrategy};
use gbwf_core::GbwfConfig;

/// Exit status when a merge stops with conflicts.
const EXIT_CONFLICT: u8 = 2;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Compose a project workspace from a base template and plugins.
#[derive(Parser, Debug)]
#[command(name = "gbwf", version, about = "Bootstrap a workspace from a base and plugins")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless GBWF_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a workspace from a base and optional plugins.
    Init {
        /// Target directory (defaults to the current directory).
        dir: Option<PathBuf>,

        /// Manifest source (http://, https:// or file://).
        #[arg(short, long)]
        manifest: Option<String>,

        /// Vanilla base URL, used when no manifest is configured.
        #[arg(long)]
        vanilla: Option<String>,

        /// Limit fetches to N commits (0 fetches full history).
        #[arg(short, long)]
        depth: Option<u32>,

        /// Merge strategy: ff-only, ff or ort.
        #[arg(short, long)]
        strategy: Option<String>,

        /// Create the repository without asking.
        #[arg(short, long)]
        yes: bool,
    },

    /// List the bases and plugins offered by a manifest.
    List {
        /// Manifest source (http://, https:// or file://).
        #[arg(short, long)]
        manifest: Option<String>,
    },

    /// Merge a reference into the current branch.
    Merge {
        /// Branch, remote-tracking branch or full ref name.
        reference: String,

        /// Merge strategy: ff-only, ff or ort.
        #[arg(short, long)]
        strategy: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match GbwfConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let default_level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GBWF_LOG").unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<MergeError>() {
            Some(MergeError::Conflict { paths }) => {
                report_conflicts(paths);
                ExitCode::from(EXIT_CONFLICT)
            }
            _ => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli, config: &GbwfConfig) -> Result<()> {
    match cli.command {
        Commands::Init {
            dir,
            manifest,
            vanilla,
            depth,
            strategy,
            yes,
        } => {
            let args = init::InitArgs {
                dir,
                manifest,
                vanilla,
                depth,
                strategy,
                yes,
            };
            init::run_init(config, args).await
        }
        Commands::List { manifest } => cmd_list(config, manifest).await,
        Commands::Merge {
            reference,
            strategy,
        } => {
            let cwd = std::env::current_dir().context("failed to get current directory")?;
            cmd_merge(config, &cwd, &reference, strategy.as_deref())
        }
    }
}

/// Strategy from the flag if given, else from the configuration.
pub(crate) fn resolve_strategy(flag: Option<&str>, config: &GbwfConfig) -> Result<MergeStrategy> {
    match flag {
        Some(name) => name.parse().context("invalid --strategy"),
        None => config.strategy().context("invalid merge strategy in configuration"),
    }
}

fn report_conflicts(paths: &[String]) {
    eprintln!();
    eprintln!(
        "{}",
        style::error(&format!("Merge stopped with {} conflicted path(s):", paths.len()))
    );
    for path in paths {
        eprintln!("    {}", path);
    }
    eprintln!();
    eprintln!(
        "{}",
        style::dim("Fix the conflicts, `git add` the files, then `git commit` to finish the merge.")
    );
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_list(config: &GbwfConfig, manifest: Option<String>) -> Result<()> {
    let source = manifest
        .or_else(|| config.manifest.clone())
        .context("no manifest configured; pass --manifest or set `manifest` in the config file")?;

    let manifest = Manifest::load(&source)
        .await
        .with_context(|| format!("failed to load manifest from {source}"))?;

    if manifest.base.is_empty() && manifest.plugins.is_empty() {
        println!("{}", style::warn("The manifest is empty"));
        return Ok(());
    }

    println!();
    println!("{}", style::header(&format!("Manifest {}", source)));
    println!();
    println!("{}", manifest_table(&manifest));
    println!();
    Ok(())
}

fn manifest_table(manifest: &Manifest) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Kind", "Name", "Source", "Ref"]);

    let rows = manifest
        .base
        .iter()
        .map(|base| ("base", base))
        .chain(manifest.plugins.iter().map(|plugin| ("plugin", plugin)));

    for (kind, entry) in rows {
        table.add_row(vec![
            Cell::new(kind),
            Cell::new(style::entry(&entry.name, &entry.color)),
            Cell::new(&entry.remote.source),
            Cell::new(entry_ref(entry)),
        ]);
    }
    table
}

fn entry_ref(entry: &Base) -> &str {
    if entry.remote.git_ref.is_empty() {
        DEFAULT_REF
    } else {
        &entry.remote.git_ref
    }
}

fn cmd_merge(
    config: &GbwfConfig,
    repo_dir: &Path,
    reference: &str,
    strategy: Option<&str>,
) -> Result<()> {
    let options = MergeOptions {
        strategy: resolve_strategy(strategy, config)?,
        ours_label: config.merge.ours_label.clone(),
        theirs_label: config.merge.theirs_label.clone(),
    };

    let client = GitClient::open(repo_dir).context("failed to open git repository")?;
    if !client.is_clean()? {
        anyhow::bail!("working tree has uncommitted changes; commit or stash them first");
    }

    let mut stdout = std::io::stdout();
    let report = client
        .merge(reference, &options, Some(&mut stdout))
        .with_context(|| format!("failed to merge {reference}"))?;

    let summary = match report.state {
        MergeState::UpToDate => "Nothing to merge".to_string(),
        MergeState::FastForwarded => format!("Fast-forwarded to {}", report.head),
        _ => format!("Created merge commit {}", report.head),
    };
    println!("{}", style::success(&summary));
    Ok(())
}
