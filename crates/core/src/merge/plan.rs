//! Pairing of base→ours and base→theirs changes into a per-path merge plan.

use std::collections::BTreeMap;

use git2::{Delta, DiffDelta, DiffFile, FileMode, Oid, Repository, Tree};
use tracing::{debug, warn};

/// What happened to a path between two tree snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Insert,
    Modify,
    Delete,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Modify => write!(f, "modify"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// One side of a [`Change`]: where the file lived and which blob it held.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    pub path: String,
    pub id: Oid,
    pub mode: FileMode,
}

impl ChangeEntry {
    fn from_diff_file(file: &DiffFile<'_>) -> Option<Self> {
        let path = file.path_bytes()?;
        Some(Self {
            path: String::from_utf8_lossy(path).into_owned(),
            id: file.id(),
            mode: file.mode(),
        })
    }
}

/// A single path's transition between two tree snapshots.
#[derive(Debug, Clone)]
pub struct Change {
    pub action: ChangeAction,
    /// Entry in the old tree; absent for inserts.
    pub from: Option<ChangeEntry>,
    /// Entry in the new tree; absent for deletes.
    pub to: Option<ChangeEntry>,
}

impl Change {
    /// Convert a tree-to-tree diff delta. Returns `None` for statuses a
    /// tree diff without rename detection does not produce, and for
    /// submodule entries, which carry no blob content.
    pub fn from_delta(delta: &DiffDelta<'_>) -> Option<Self> {
        let action = match delta.status() {
            Delta::Added => ChangeAction::Insert,
            Delta::Modified | Delta::Typechange => ChangeAction::Modify,
            Delta::Deleted => ChangeAction::Delete,
            other => {
                debug!(status = ?other, "skipping unsupported delta status");
                return None;
            }
        };

        let from = match action {
            ChangeAction::Insert => None,
            ChangeAction::Modify | ChangeAction::Delete => {
                ChangeEntry::from_diff_file(&delta.old_file())
            }
        };
        let to = match action {
            ChangeAction::Delete => None,
            ChangeAction::Insert | ChangeAction::Modify => {
                ChangeEntry::from_diff_file(&delta.new_file())
            }
        };

        let is_submodule = [&from, &to]
            .into_iter()
            .flatten()
            .any(|entry| entry.mode == FileMode::Commit);
        if is_submodule {
            warn!(?from, ?to, "skipping submodule change");
            return None;
        }

        Some(Self { action, from, to })
    }

    /// The logical path: the post-change path, or the pre-change path for
    /// deletions. Empty when the delta carried no path at all.
    pub fn path(&self) -> &str {
        self.to
            .as_ref()
            .or(self.from.as_ref())
            .map(|entry| entry.path.as_str())
            .unwrap_or_default()
    }

    /// Blob id of the resulting content, if the path still exists.
    pub fn content_id(&self) -> Option<Oid> {
        self.to.as_ref().map(|entry| entry.id)
    }
}

/// The merge cases a [`ChangePair`] can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeCase {
    /// Only ours changed the path.
    OursOnly,
    /// Only theirs changed the path.
    TheirsOnly,
    /// Both inserted or modified the path.
    BothChanged,
    /// Both deleted the path.
    BothDeleted,
    /// Ours changed it, theirs deleted it; ours is kept.
    OursOverDelete,
    /// Ours deleted it, theirs changed it; theirs is kept.
    TheirsOverDelete,
}

impl std::fmt::Display for MergeCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OursOnly => write!(f, "ours_only"),
            Self::TheirsOnly => write!(f, "theirs_only"),
            Self::BothChanged => write!(f, "both_changed"),
            Self::BothDeleted => write!(f, "both_deleted"),
            Self::OursOverDelete => write!(f, "ours_over_delete"),
            Self::TheirsOverDelete => write!(f, "theirs_over_delete"),
        }
    }
}

/// Changes to one path on each side relative to the merge base.
#[derive(Debug, Clone, Default)]
pub struct ChangePair {
    pub ours: Option<Change>,
    pub theirs: Option<Change>,
}

impl ChangePair {
    /// Pair the two sides up with the action the merge must take.
    /// `None` when neither side is populated.
    pub fn resolution(&self) -> Option<Resolution<'_>> {
        use ChangeAction::{Delete, Insert, Modify};

        let resolution = match (&self.ours, &self.theirs) {
            (None, None) => return None,
            (Some(ours), None) => Resolution::OursOnly(ours),
            (None, Some(theirs)) => Resolution::TheirsOnly(theirs),
            (Some(ours), Some(theirs)) => match (ours.action, theirs.action) {
                (Insert | Modify, Insert | Modify) => Resolution::BothChanged { ours, theirs },
                (Delete, Delete) => Resolution::BothDeleted,
                (Insert | Modify, Delete) => Resolution::KeepOurs(ours),
                (Delete, Insert | Modify) => Resolution::KeepTheirs(theirs),
            },
        };
        Some(resolution)
    }

    /// Classify the pair; `None` when neither side is populated.
    pub fn case(&self) -> Option<MergeCase> {
        self.resolution().map(|resolution| resolution.case())
    }
}

/// A classified [`ChangePair`] borrowing the change(s) that decide it.
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    OursOnly(&'a Change),
    TheirsOnly(&'a Change),
    BothChanged { ours: &'a Change, theirs: &'a Change },
    BothDeleted,
    /// Ours changed the path that theirs deleted.
    KeepOurs(&'a Change),
    /// Theirs changed the path that ours deleted.
    KeepTheirs(&'a Change),
}

impl Resolution<'_> {
    pub fn case(&self) -> MergeCase {
        match self {
            Self::OursOnly(_) => MergeCase::OursOnly,
            Self::TheirsOnly(_) => MergeCase::TheirsOnly,
            Self::BothChanged { .. } => MergeCase::BothChanged,
            Self::BothDeleted => MergeCase::BothDeleted,
            Self::KeepOurs(_) => MergeCase::OursOverDelete,
            Self::KeepTheirs(_) => MergeCase::TheirsOverDelete,
        }
    }
}

/// The per-path merge plan, ordered by path.
pub type MergePlan = BTreeMap<String, ChangePair>;

/// Structural diff between two trees, one [`Change`] per file.
pub fn diff_trees(repo: &Repository, from: &Tree<'_>, to: &Tree<'_>) -> Result<Vec<Change>, git2::Error> {
    let diff = repo.diff_tree_to_tree(Some(from), Some(to), None)?;
    Ok(diff
        .deltas()
        .filter_map(|delta| Change::from_delta(&delta))
        .collect())
}

/// Diff `base` against both sides and pair the changes by path.
///
/// Every path changed on either side appears exactly once.
pub fn build_merge_plan(
    repo: &Repository,
    base: &Tree<'_>,
    ours: &Tree<'_>,
    theirs: &Tree<'_>,
) -> Result<MergePlan, git2::Error> {
    let ours_changes = diff_trees(repo, base, ours)?;
    let theirs_changes = diff_trees(repo, base, theirs)?;
    debug!(
        ours = ours_changes.len(),
        theirs = theirs_changes.len(),
        "diffed both sides against merge base"
    );
    Ok(pair_changes(ours_changes, theirs_changes))
}

/// Key both change lists by logical path into one plan.
pub fn pair_changes(ours: Vec<Change>, theirs: Vec<Change>) -> MergePlan {
    let mut plan = MergePlan::new();
    for change in ours {
        let key = change.path().to_owned();
        plan.entry(key).or_default().ours = Some(change);
    }
    for change in theirs {
        let key = change.path().to_owned();
        plan.entry(key).or_default().theirs = Some(change);
    }
    plan.remove("");
    plan.retain(|_, pair| pair.ours.is_some() || pair.theirs.is_some());
    plan
}
