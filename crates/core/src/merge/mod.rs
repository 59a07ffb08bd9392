//! Merge engine: fast-forward detection and the three-way merge strategy.
//!
//! A merge runs top to bottom against one ancestor/ours/theirs triple:
//! 1. **Ancestry** -- decide whether the target simply descends from HEAD.
//! 2. **Planning** -- diff the merge base against both sides and pair the
//!    changes by path.
//! 3. **Content merging** -- line-based three-way merge where both sides
//!    changed the same file differently.
//! 4. **Materializing** -- write the result into the working tree and index,
//!    then commit it, or record the conflict and stop.
//!
//! The engine assumes exclusive use of the working tree and index for the
//! duration of a call. Nothing is rolled back on error; the merge commit,
//! when one is made, is always the last step.

pub mod ancestry;
pub mod materialize;
pub mod plan;
pub mod text;

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use git2::build::CheckoutBuilder;
use git2::{Oid, Reference, Repository};
use tracing::{debug, info, instrument, warn};

use crate::errors::MergeError;

pub use materialize::{Labels, PathOutcome};
pub use plan::{Change, ChangeAction, ChangePair, MergeCase, MergePlan};
pub use text::{merge_text, MergeResult};

// ---------------------------------------------------------------------------
// Strategy & options
// ---------------------------------------------------------------------------

/// How a merge may combine the two histories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Only move the reference forward; fail if the histories diverged.
    FastForwardOnly,
    /// Fast-forward when possible, otherwise merge three-way.
    #[default]
    FastForwardMerge,
    /// Three-way merge of diverged histories.
    OrtMerge,
}

impl FromStr for MergeStrategy {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ff-only" | "fast-forward-only" | "fastforwardonly" => Ok(Self::FastForwardOnly),
            "ff" | "fast-forward-merge" | "fastforwardmerge" => Ok(Self::FastForwardMerge),
            "ort" | "ort-merge" | "ortmerge" => Ok(Self::OrtMerge),
            _ => Err(MergeError::UnsupportedStrategy(s.to_owned())),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FastForwardOnly => write!(f, "ff-only"),
            Self::FastForwardMerge => write!(f, "ff"),
            Self::OrtMerge => write!(f, "ort"),
        }
    }
}

/// Options for a single [`merge`] call.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    /// Label after `<<<<<<<`; defaults to the HEAD branch name.
    pub ours_label: Option<String>,
    /// Label after `>>>>>>>`; defaults to the target reference name.
    pub theirs_label: Option<String>,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// States a merge passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Initial,
    FastForwardCheck,
    FastForwarded,
    ThreeWayInProgress,
    Conflicted,
    Committed,
    /// Clean three-way merge whose result equals HEAD; nothing committed.
    UpToDate,
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::FastForwardCheck => write!(f, "fast_forward_check"),
            Self::FastForwarded => write!(f, "fast_forwarded"),
            Self::ThreeWayInProgress => write!(f, "three_way_in_progress"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Committed => write!(f, "committed"),
            Self::UpToDate => write!(f, "up_to_date"),
        }
    }
}

/// Successful end state of a merge.
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// One of `FastForwarded`, `Committed` or `UpToDate`.
    pub state: MergeState,
    /// Commit HEAD points at afterwards.
    pub head: Oid,
    /// Per-path outcomes of a three-way merge, ordered by path.
    pub paths: Vec<PathOutcome>,
}

/// Human-readable progress lines; never consulted for control flow.
struct Progress<'a>(Option<&'a mut dyn Write>);

impl Progress<'_> {
    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Some(sink) = self.0.as_mut() {
            if let Err(e) = writeln!(sink, "{args}") {
                debug!(error = %e, "progress sink write failed");
            }
        }
    }
}

struct Machine {
    state: MergeState,
}

impl Machine {
    fn advance(&mut self, next: MergeState) {
        debug!(from = %self.state, to = %next, "merge state transition");
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Merge `target` into the current HEAD of `repo`.
///
/// Returns [`MergeError::Conflict`] when paths need manual resolution; the
/// working tree keeps the conflicted files with markers, everything else is
/// staged, and `MERGE_HEAD` records the incoming commit.
#[instrument(skip_all, fields(target = target.name().unwrap_or("<non-utf8>"), strategy = %options.strategy))]
pub fn merge(
    repo: &Repository,
    target: &Reference<'_>,
    options: &MergeOptions,
    progress: Option<&mut dyn Write>,
) -> Result<MergeReport, MergeError> {
    let mut progress = Progress(progress);
    let mut machine = Machine {
        state: MergeState::Initial,
    };

    let head = repo.head()?;
    let ours = head.peel_to_commit()?;
    let theirs = target.peel_to_commit()?;

    let shallow = ancestry::shallow_commits(repo)?.into_iter().next();

    machine.advance(MergeState::FastForwardCheck);
    let ff = ancestry::is_fast_forward(repo, ours.id(), theirs.id(), shallow)?;
    debug!(ff, ?shallow, "fast-forward check finished");

    if ff {
        return fast_forward(repo, &head, &ours, &theirs, &mut machine, &mut progress);
    }
    if options.strategy == MergeStrategy::FastForwardOnly {
        info!(ours = %ours.id(), theirs = %theirs.id(), "histories diverged, refusing to merge");
        return Err(MergeError::FastForwardNotPossible);
    }

    let labels = Labels {
        ours: options
            .ours_label
            .clone()
            .or_else(|| head.shorthand().map(str::to_owned))
            .unwrap_or_else(|| "HEAD".to_owned()),
        theirs: options
            .theirs_label
            .clone()
            .or_else(|| target.shorthand().map(str::to_owned))
            .unwrap_or_else(|| theirs.id().to_string()),
    };

    machine.advance(MergeState::ThreeWayInProgress);
    three_way(repo, &ours, &theirs, &labels, &mut machine, &mut progress)
}

fn fast_forward(
    repo: &Repository,
    head: &Reference<'_>,
    ours: &git2::Commit<'_>,
    theirs: &git2::Commit<'_>,
    machine: &mut Machine,
    progress: &mut Progress<'_>,
) -> Result<MergeReport, MergeError> {
    if ours.id() == theirs.id() {
        progress.line(format_args!("Already up to date."));
        machine.advance(MergeState::UpToDate);
        return Ok(MergeReport {
            state: machine.state,
            head: ours.id(),
            paths: Vec::new(),
        });
    }

    // Bring the working tree along before moving the reference so the
    // checkout compares against the old HEAD.
    if repo.workdir().is_some() {
        repo.checkout_tree(theirs.as_object(), Some(CheckoutBuilder::new().safe()))?;
    }

    let msg = format!("merge {}: Fast-forward", theirs.id());
    if head.is_branch() {
        let name = head
            .name()
            .ok_or_else(|| git2::Error::from_str("HEAD branch name is not valid UTF-8"))?;
        repo.reference(name, theirs.id(), true, &msg)?;
    } else {
        repo.set_head_detached(theirs.id())?;
    }

    progress.line(format_args!(
        "Fast-forward {}..{}",
        short(ours.id()),
        short(theirs.id())
    ));
    info!(from = %ours.id(), to = %theirs.id(), "fast-forwarded");
    machine.advance(MergeState::FastForwarded);

    Ok(MergeReport {
        state: machine.state,
        head: theirs.id(),
        paths: Vec::new(),
    })
}

fn three_way(
    repo: &Repository,
    ours: &git2::Commit<'_>,
    theirs: &git2::Commit<'_>,
    labels: &Labels,
    machine: &mut Machine,
    progress: &mut Progress<'_>,
) -> Result<MergeReport, MergeError> {
    let base = ancestry::merge_base(repo, ours.id(), theirs.id())?;
    debug!(%base, "merge base");

    let base_tree = repo.find_commit(base)?.tree()?;
    let ours_tree = ours.tree()?;
    let theirs_tree = theirs.tree()?;

    let plan = plan::build_merge_plan(repo, &base_tree, &ours_tree, &theirs_tree)?;
    let mut worktree = materialize::Worktree::open(repo)?;
    let mut paths = Vec::with_capacity(plan.len());

    for (path, pair) in &plan {
        let Some(outcome) = worktree.resolve(path, pair, labels)? else {
            continue;
        };
        if outcome.conflict {
            progress.line(format_args!("CONFLICT (content): Merge conflict in {path}"));
        } else if outcome.text_merged {
            progress.line(format_args!("Auto-merging {path}"));
        }
        paths.push(outcome);
    }

    let message = merge_message(labels, ours.id(), theirs.id());
    let conflicted: Vec<String> = paths
        .iter()
        .filter(|outcome| outcome.conflict)
        .map(|outcome| outcome.path.clone())
        .collect();

    if !conflicted.is_empty() {
        worktree.write_index()?;
        materialize::record_conflict(repo, theirs.id(), &message, &conflicted)?;
        progress.line(format_args!(
            "Automatic merge failed; fix conflicts and then commit the result."
        ));
        warn!(count = conflicted.len(), "merge stopped with conflicts");
        machine.advance(MergeState::Conflicted);
        return Err(MergeError::Conflict { paths: conflicted });
    }

    let tree = worktree.write_tree()?;
    if tree == ours_tree.id() {
        progress.line(format_args!("Already up to date."));
        info!("merge produced no changes");
        machine.advance(MergeState::UpToDate);
        return Ok(MergeReport {
            state: machine.state,
            head: ours.id(),
            paths,
        });
    }

    let commit = materialize::commit_merge(repo, tree, ours, theirs, &message)?;
    repo.cleanup_state()?;

    progress.line(format_args!("Merge made by the 'ort' strategy."));
    info!(sha = %commit, paths = paths.len(), "created merge commit");
    machine.advance(MergeState::Committed);

    Ok(MergeReport {
        state: machine.state,
        head: commit,
        paths,
    })
}

/// Commit message naming both endpoints.
pub fn merge_message(labels: &Labels, ours: Oid, theirs: Oid) -> String {
    format!(
        "Merge {} ({}) into {} ({})",
        labels.theirs,
        short(theirs),
        labels.ours,
        short(ours)
    )
}

fn short(oid: Oid) -> String {
    let mut s = oid.to_string();
    s.truncate(7);
    s
}
