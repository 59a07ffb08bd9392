//! Fast-forward detection and merge-base lookup.

use std::collections::HashSet;
use std::io::ErrorKind;

use git2::{ErrorCode, Oid, Repository};
use tracing::{debug, warn};

use crate::errors::MergeError;

/// Whether `new` descends from `old`, walking `new`'s history parent-first.
///
/// When `shallow_boundary` is given, that commit's parents are never visited:
/// they are not present in a depth-limited clone. If the pull depth is smaller
/// than the number of new commits, `old` lies beyond the boundary and this
/// returns `false` even though the histories are linear. Without the missing
/// commits there is no way to tell, so callers fall back to a three-way merge.
pub fn is_fast_forward(
    repo: &Repository,
    old: Oid,
    new: Oid,
    shallow_boundary: Option<Oid>,
) -> Result<bool, git2::Error> {
    let ignored: HashSet<Oid> = match shallow_boundary {
        Some(boundary) => repo.find_commit(boundary)?.parent_ids().collect(),
        None => HashSet::new(),
    };

    let mut stack = vec![new];
    let mut seen = HashSet::new();

    while let Some(oid) = stack.pop() {
        if !seen.insert(oid) {
            continue;
        }
        if oid == old {
            debug!(%old, %new, "found old commit in new history");
            return Ok(true);
        }

        let commit = repo.find_commit(oid)?;
        let parents: Vec<Oid> = commit
            .parent_ids()
            .filter(|parent| !ignored.contains(parent))
            .collect();
        // Reversed so the first parent is popped first.
        stack.extend(parents.into_iter().rev());
    }

    Ok(false)
}

/// All lowest common ancestors of `ours` and `theirs`; empty when unrelated.
pub fn merge_bases(repo: &Repository, ours: Oid, theirs: Oid) -> Result<Vec<Oid>, git2::Error> {
    match repo.merge_bases(ours, theirs) {
        Ok(bases) => Ok(bases.iter().copied().collect()),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// The merge base used for a three-way merge: the first one the object
/// store reports. Criss-cross histories with several bases are not merged
/// recursively.
pub fn merge_base(repo: &Repository, ours: Oid, theirs: Oid) -> Result<Oid, MergeError> {
    let bases = merge_bases(repo, ours, theirs)?;
    match bases.as_slice() {
        [] => Err(MergeError::NoCommonAncestor {
            ours: ours.to_string(),
            theirs: theirs.to_string(),
        }),
        [base] => Ok(*base),
        [base, ..] => {
            warn!(count = bases.len(), chosen = %base, "multiple merge bases, using the first");
            Ok(*base)
        }
    }
}

/// Commits listed in the repository's `shallow` file, in file order.
///
/// A repository that was never fetched with a depth has no such file and
/// yields an empty list.
pub fn shallow_commits(repo: &Repository) -> Result<Vec<Oid>, MergeError> {
    let path = repo.path().join("shallow");
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut commits = Vec::new();
    for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
        commits.push(Oid::from_str(line)?);
    }
    Ok(commits)
}
