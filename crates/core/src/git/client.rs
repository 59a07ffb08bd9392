//! Local Git repository operations via `git2`.

use std::io::Write;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{ErrorCode, FetchOptions, Oid, RemoteCallbacks, Repository, StatusOptions};
use tracing::{debug, info, instrument};

use crate::errors::{GitError, MergeError};
use crate::merge::{self, ancestry, MergeOptions, MergeReport};

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

/// Snapshot of a running fetch, handed to the progress callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub received_objects: usize,
    pub total_objects: usize,
    pub received_bytes: usize,
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Create an empty repository at `repo_path`.
    pub fn init<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        std::fs::create_dir_all(path)?;
        let repo = Repository::init(path)?;
        info!(path = %path.display(), "initialized empty repository");
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Make sure a remote called `name` points at `url`, creating it if needed.
    #[instrument(skip(self))]
    pub fn ensure_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => {
                let existing = remote.url().unwrap_or_default();
                if existing != url {
                    return Err(GitError::RemoteMismatch {
                        name: name.to_owned(),
                        existing: existing.to_owned(),
                        wanted: url.to_owned(),
                    });
                }
                debug!("remote already configured");
                Ok(())
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                self.repo.remote(name, url)?;
                info!("remote added");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch `refspec` from `remote_name`. A non-zero `depth` asks for a
    /// shallow fetch of that many commits.
    #[instrument(skip(self, progress))]
    pub fn fetch(
        &self,
        remote_name: &str,
        refspec: &str,
        depth: u32,
        progress: &mut dyn FnMut(TransferProgress),
    ) -> Result<(), GitError> {
        info!(remote = remote_name, "fetching");
        let mut remote = self.repo.find_remote(remote_name)?;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(|stats| {
            progress(TransferProgress {
                received_objects: stats.received_objects(),
                total_objects: stats.total_objects(),
                received_bytes: stats.received_bytes(),
            });
            true
        });

        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(callbacks);
        if depth > 0 {
            fetch_opts.depth(i32::try_from(depth).unwrap_or(i32::MAX));
        }

        remote.fetch(&[refspec], Some(&mut fetch_opts), None)?;
        debug!("fetch completed");
        Ok(())
    }

    /// Resolve a reference name or revision expression to a commit.
    pub fn resolve_ref(&self, name: &str) -> Result<Oid, GitError> {
        let object = self
            .repo
            .revparse_single(name)
            .map_err(|_| GitError::RefNotFound(name.to_owned()))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| GitError::RefNotFound(name.to_owned()))?;
        Ok(commit.id())
    }

    /// Commit HEAD points at; `None` while the current branch is unborn.
    pub fn head_commit(&self) -> Result<Option<Oid>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?.id())),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Point an unborn HEAD at `oid` and check its tree out.
    #[instrument(skip(self))]
    pub fn adopt(&self, oid: Oid) -> Result<(), GitError> {
        if self.head_commit()?.is_some() {
            return Err(GitError::HeadAlreadyBorn);
        }

        let commit = self.repo.find_commit(oid)?;
        self.repo
            .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;

        let head = self.repo.find_reference("HEAD")?;
        match head.symbolic_target() {
            Some(branch) => {
                self.repo
                    .reference(branch, oid, false, &format!("gbwf: adopt {oid}"))?;
            }
            None => self.repo.set_head_detached(oid)?,
        }

        info!(%oid, "adopted commit as initial HEAD");
        Ok(())
    }

    /// No staged or unstaged changes to tracked files.
    pub fn is_clean(&self) -> Result<bool, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        let dirty = statuses
            .iter()
            .filter(|entry| !entry.status().is_empty())
            .count();
        debug!(dirty, "working tree status");
        Ok(dirty == 0)
    }

    /// First commit of the repository's shallow boundary, if it is shallow.
    pub fn shallow_boundary(&self) -> Result<Option<Oid>, MergeError> {
        Ok(ancestry::shallow_commits(&self.repo)?.into_iter().next())
    }

    /// Merge the reference `name` into HEAD.
    pub fn merge(
        &self,
        name: &str,
        options: &MergeOptions,
        progress: Option<&mut dyn Write>,
    ) -> Result<MergeReport, MergeError> {
        let target = self.repo.resolve_reference_from_short_name(name)?;
        merge::merge(&self.repo, &target, options, progress)
    }
}
