//! Applying a merge plan to the working tree and index.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use git2::{ErrorCode, FileMode, Index, Oid, Repository};
use tracing::{debug, warn};

use super::plan::{Change, ChangeAction, ChangePair, MergeCase, Resolution};
use super::text::merge_text;
use crate::errors::MergeError;

/// Outcome of resolving one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOutcome {
    pub path: String,
    pub case: MergeCase,
    /// The three-way text merger ran for this path.
    pub text_merged: bool,
    /// The written file contains conflict markers and was left unstaged.
    pub conflict: bool,
}

/// Branch labels written after the conflict markers.
#[derive(Debug, Clone)]
pub struct Labels {
    pub ours: String,
    pub theirs: String,
}

/// Working copy plus index of a non-bare repository.
pub struct Worktree<'r> {
    repo: &'r Repository,
    root: PathBuf,
    index: Index,
}

impl<'r> Worktree<'r> {
    pub fn open(repo: &'r Repository) -> Result<Self, MergeError> {
        let root = repo.workdir().ok_or(MergeError::BareRepository)?.to_path_buf();
        let index = repo.index()?;
        Ok(Self { repo, root, index })
    }

    /// Write `content` to `path`, creating parent directories. For
    /// [`FileMode::Link`] the content is the link target.
    ///
    /// An existing symlink at `path` is replaced, never written through.
    pub fn create(&self, path: &str, content: &[u8], mode: FileMode) -> Result<(), MergeError> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if mode == FileMode::Link || full.is_symlink() {
            self.remove(path)?;
        }
        if mode == FileMode::Link {
            create_symlink(content, &full)?;
            return Ok(());
        }
        std::fs::write(&full, content)?;
        set_executable(&full, mode == FileMode::BlobExecutable)?;
        Ok(())
    }

    /// Remove `path` from disk; a file that is already gone is fine.
    pub fn remove(&self, path: &str) -> Result<(), MergeError> {
        match std::fs::remove_file(self.root.join(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path, "file already absent from working tree");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stage the working-tree version of `path`.
    pub fn add(&mut self, path: &str) -> Result<(), MergeError> {
        self.index.add_path(Path::new(path))?;
        Ok(())
    }

    /// Drop `path` from the index; a missing entry is fine.
    pub fn unstage(&mut self, path: &str) -> Result<(), MergeError> {
        match self.index.remove_path(Path::new(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(path, "entry already absent from index");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the index to disk.
    pub fn write_index(&mut self) -> Result<(), MergeError> {
        self.index.write()?;
        Ok(())
    }

    /// Persist the index and write it out as a tree.
    pub fn write_tree(&mut self) -> Result<Oid, MergeError> {
        self.index.write()?;
        Ok(self.index.write_tree()?)
    }

    /// Resolve one path of the plan, mutating working tree and index.
    pub fn resolve(
        &mut self,
        path: &str,
        pair: &ChangePair,
        labels: &Labels,
    ) -> Result<Option<PathOutcome>, MergeError> {
        let Some(resolution) = pair.resolution() else {
            return Ok(None);
        };
        let case = resolution.case();
        debug!(path, %case, "resolving path");

        let mut outcome = PathOutcome {
            path: path.to_owned(),
            case,
            text_merged: false,
            conflict: false,
        };

        match resolution {
            Resolution::OursOnly(change) | Resolution::TheirsOnly(change) => {
                self.apply(path, change)?;
            }
            Resolution::BothDeleted => self.delete(path)?,
            Resolution::KeepOurs(kept) | Resolution::KeepTheirs(kept) => {
                debug!(path, "modification wins over deletion");
                self.keep(path, kept)?;
            }
            Resolution::BothChanged { ours, theirs } => {
                if ours.content_id() == theirs.content_id() {
                    debug!(path, "identical content on both sides");
                    self.keep(path, ours)?;
                } else {
                    outcome.text_merged = true;
                    outcome.conflict = self.merge_contents(path, ours, theirs, labels)?;
                }
            }
        }

        Ok(Some(outcome))
    }

    fn apply(&mut self, path: &str, change: &Change) -> Result<(), MergeError> {
        match change.action {
            ChangeAction::Insert | ChangeAction::Modify => self.keep(path, change),
            ChangeAction::Delete => self.delete(path),
        }
    }

    fn delete(&mut self, path: &str) -> Result<(), MergeError> {
        self.remove(path)?;
        self.unstage(path)
    }

    /// Write the change's resulting blob and stage it.
    fn keep(&mut self, path: &str, change: &Change) -> Result<(), MergeError> {
        let Some(entry) = &change.to else {
            return self.delete(path);
        };
        let blob = self.repo.find_blob(entry.id)?;
        self.create(path, blob.content(), entry.mode)?;
        self.add(path)
    }

    /// Three-way merge both sides' contents. Returns whether the written
    /// file holds conflict markers; only clean results are staged.
    fn merge_contents(
        &mut self,
        path: &str,
        ours: &Change,
        theirs: &Change,
        labels: &Labels,
    ) -> Result<bool, MergeError> {
        let base_id = ours.from.as_ref().or(theirs.from.as_ref()).map(|e| e.id);
        let base = self.read_text(base_id)?;
        let ours_text = self.read_text(ours.content_id())?;
        let theirs_text = self.read_text(theirs.content_id())?;

        let merged = merge_text(&ours_text, &base, &theirs_text, &labels.ours, &labels.theirs);

        let mode = match merged_mode(ours, theirs) {
            // Markers are not a link target.
            FileMode::Link if merged.has_conflict => FileMode::Blob,
            mode => mode,
        };
        self.create(path, merged.content.as_bytes(), mode)?;

        if merged.has_conflict {
            warn!(path, regions = merged.conflicts, "content conflict");
        } else {
            self.add(path)?;
        }
        Ok(merged.has_conflict)
    }

    /// Blob content as text; an absent blob reads as empty.
    fn read_text(&self, id: Option<Oid>) -> Result<String, MergeError> {
        let Some(id) = id else {
            return Ok(String::new());
        };
        let blob = self.repo.find_blob(id)?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }
}

/// Mode of a text-merged path: the side that changed it relative to the
/// base wins, ours when both did.
fn merged_mode(ours: &Change, theirs: &Change) -> FileMode {
    let base = ours.from.as_ref().or(theirs.from.as_ref()).map(|e| e.mode);
    let ours_mode = ours.to.as_ref().map(|e| e.mode);
    let theirs_mode = theirs.to.as_ref().map(|e| e.mode);
    match (ours_mode, theirs_mode) {
        (Some(o), Some(t)) if Some(o) == base => t,
        (Some(o), _) => o,
        (None, Some(t)) => t,
        (None, None) => FileMode::Blob,
    }
}

#[cfg(unix)]
fn create_symlink(target: &[u8], link: &Path) -> std::io::Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    std::os::unix::fs::symlink(OsStr::from_bytes(target), link)
}

#[cfg(not(unix))]
fn create_symlink(target: &[u8], link: &Path) -> std::io::Result<()> {
    std::fs::write(link, target)
}

#[cfg(unix)]
fn set_executable(path: &Path, executable: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    let mode = if executable {
        perms.mode() | 0o111
    } else {
        perms.mode() & !0o111
    };
    perms.set_mode(mode);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path, _executable: bool) -> std::io::Result<()> {
    Ok(())
}

/// Create the merge commit on HEAD with parents `[ours, theirs]`, reusing
/// the author and committer of `ours`.
pub fn commit_merge(
    repo: &Repository,
    tree: Oid,
    ours: &git2::Commit<'_>,
    theirs: &git2::Commit<'_>,
    message: &str,
) -> Result<Oid, MergeError> {
    let tree = repo.find_tree(tree)?;
    let oid = repo.commit(
        Some("HEAD"),
        &ours.author(),
        &ours.committer(),
        message,
        &tree,
        &[ours, theirs],
    )?;
    Ok(oid)
}

/// Record an unfinished merge: `MERGE_HEAD` names the incoming commit and
/// `MERGE_MSG` holds the message to use once conflicts are resolved.
pub fn record_conflict(
    repo: &Repository,
    theirs: Oid,
    message: &str,
    paths: &[String],
) -> Result<(), MergeError> {
    repo.reference("MERGE_HEAD", theirs, true, "merge: conflicts recorded")?;

    let mut msg = format!("{message}\n\n# Conflicts:\n");
    for path in paths {
        msg.push_str("#\t");
        msg.push_str(path);
        msg.push('\n');
    }
    std::fs::write(repo.path().join("MERGE_MSG"), msg)?;
    Ok(())
}
