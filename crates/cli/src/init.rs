//! `gbwf init`: compose a workspace from a base and plugins.
//!
//! Each chosen source gets its own remote and is fetched into a tracking
//! ref. The first one is checked out as the initial HEAD; every later one is
//! merged on top with the configured strategy.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tracing::{debug, info};

use gbwf_core::errors::GitError;
use gbwf_core::git::{GitClient, TransferProgress};
use gbwf_core::manifest::{Base, Manifest, Remote};
use gbwf_core::merge::{MergeOptions, MergeState};
use gbwf_core::GbwfConfig;

use crate::{select, style};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Flags of `gbwf init`; `None` falls back to the configuration.
#[derive(Debug, Default)]
pub struct InitArgs {
    pub dir: Option<PathBuf>,
    pub manifest: Option<String>,
    pub vanilla: Option<String>,
    pub depth: Option<u32>,
    pub strategy: Option<String>,
    pub yes: bool,
}

/// One remote to install, with everything derived up front.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Source {
    name: String,
    remote: String,
    url: String,
    refspec: String,
    tracking_ref: String,
}

impl Source {
    fn from_base(base: &Base) -> Self {
        let remote = base.remote_name();
        Self {
            name: base.name.clone(),
            url: base.remote.source.clone(),
            refspec: base.remote.refspec(&remote),
            tracking_ref: base.remote.tracking_ref(&remote),
            remote,
        }
    }

    /// The built-in base used when no manifest is configured.
    fn vanilla(config: &GbwfConfig, url: Option<String>) -> Self {
        let base = Base {
            name: "vanilla".into(),
            color: String::new(),
            remote: Remote {
                source: url.unwrap_or_else(|| config.vanilla.url.clone()),
                name: config.vanilla.remote_name.clone(),
                git_ref: config.vanilla.git_ref.clone(),
            },
        };
        Self::from_base(&base)
    }
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

pub async fn run_init(config: &GbwfConfig, args: InitArgs) -> Result<()> {
    // Reject a bad strategy before the repository is touched.
    let options = MergeOptions {
        strategy: crate::resolve_strategy(args.strategy.as_deref(), config)?,
        ours_label: config.merge.ours_label.clone(),
        theirs_label: config.merge.theirs_label.clone(),
    };
    let depth = args.depth.unwrap_or(config.fetch.depth);
    let dir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to get current directory")?,
    };

    let Some(client) = open_or_init(&dir, args.yes)? else {
        println!("{}", style::warn("Repository initialization cancelled"));
        return Ok(());
    };
    println!(
        "{}",
        style::success(&format!("Git repository ready at {}", dir.display()))
    );

    let sources = match args.manifest.or_else(|| config.manifest.clone()) {
        None => vec![Source::vanilla(config, args.vanilla)],
        Some(src) => {
            let manifest = Manifest::load(&src)
                .await
                .with_context(|| format!("failed to load manifest from {src}"))?;
            match choose(&manifest)? {
                Some(sources) => sources,
                None => {
                    println!("{}", style::warn("Init cancelled. Nothing was fetched."));
                    return Ok(());
                }
            }
        }
    };

    info!(count = sources.len(), depth, strategy = %options.strategy, "installing sources");
    for source in &sources {
        install(&client, source, depth, &options)?;
    }

    println!();
    println!("{}", style::success("Workspace ready"));
    Ok(())
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Open the repository in `dir`, offering to create one. `None` when the
/// user declines.
fn open_or_init(dir: &Path, yes: bool) -> Result<Option<GitClient>> {
    match GitClient::open(dir.join(".git")) {
        Ok(client) => Ok(Some(client)),
        Err(GitError::RepositoryNotFound(_)) => {
            if !yes
                && !select::confirm("gbwf needs a git repository, do you want to initialize one?")?
            {
                return Ok(None);
            }
            let client = GitClient::init(dir).context("failed to initialize git repository")?;
            Ok(Some(client))
        }
        Err(e) => Err(e).context("failed to open git repository"),
    }
}

/// Base first, then plugins in manifest order. `None` if a menu was cancelled.
fn choose(manifest: &Manifest) -> Result<Option<Vec<Source>>> {
    let Some(base) = select::select_base(&manifest.base)? else {
        return Ok(None);
    };
    let Some(plugins) = select::select_plugins(&manifest.plugins)? else {
        return Ok(None);
    };

    Ok(Some(
        std::iter::once(base)
            .chain(plugins)
            .map(Source::from_base)
            .collect(),
    ))
}

fn install(client: &GitClient, source: &Source, depth: u32, options: &MergeOptions) -> Result<()> {
    println!();
    println!(
        "{} {}",
        style::header(&source.name),
        style::dim(&source.url)
    );

    client
        .ensure_remote(&source.remote, &source.url)
        .with_context(|| format!("failed to configure remote '{}'", source.remote))?;
    fetch(client, source, depth)?;

    let target = client
        .resolve_ref(&source.tracking_ref)
        .with_context(|| format!("{} did not provide {}", source.url, source.tracking_ref))?;

    if client.head_commit()?.is_none() {
        client
            .adopt(target)
            .with_context(|| format!("failed to check out {}", source.name))?;
        println!("{}", style::success(&format!("Checked out {}", source.name)));
        return Ok(());
    }

    if !client.is_clean()? {
        anyhow::bail!(
            "working tree has uncommitted changes; commit or stash them before adding {}",
            source.name
        );
    }

    let mut stdout = std::io::stdout();
    let report = client
        .merge(&source.tracking_ref, options, Some(&mut stdout))
        .with_context(|| format!("failed to merge {}", source.name))?;
    debug!(state = %report.state, head = %report.head, "merge finished");

    let msg = match report.state {
        MergeState::UpToDate => format!("{} already included", source.name),
        _ => format!("Merged {}", source.name),
    };
    println!("{}", style::success(&msg));
    Ok(())
}

fn fetch(client: &GitClient, source: &Source, depth: u32) -> Result<()> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
            .context("invalid progress template")?
            .progress_chars("=> "),
    );
    bar.set_message(format!("Fetching {}", source.remote));

    let result = client.fetch(
        &source.remote,
        &source.refspec,
        depth,
        &mut |progress: TransferProgress| {
            bar.set_length(progress.total_objects as u64);
            bar.set_position(progress.received_objects as u64);
            bar.set_message(format!(
                "Fetching {} {}",
                source.remote,
                HumanBytes(progress.received_bytes as u64)
            ));
        },
    );
    bar.finish_and_clear();

    result.with_context(|| format!("failed to fetch {}", source.url))
}
