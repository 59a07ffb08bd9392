//! Error types for the gbwf core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local repository (git2) operations outside the merge engine.
#[derive(Debug, Error)]
pub enum GitError {
    /// The path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, tag, SHA) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// A remote with this name exists but points somewhere else.
    #[error("remote '{name}' already exists with url '{existing}' (wanted '{wanted}')")]
    RemoteMismatch {
        name: String,
        existing: String,
        wanted: String,
    },

    /// `adopt` was called on a repository whose HEAD already has a commit.
    #[error("HEAD already points at a commit; refusing to overwrite it")]
    HeadAlreadyBorn,

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors from the merge engine.
///
/// [`MergeError::Conflict`] is an expected terminal outcome rather than a
/// failure: the working tree and index are left inspectable and `MERGE_HEAD`
/// records the incoming commit.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The strategy selector was not recognized.
    #[error("unsupported merge strategy: {0}")]
    UnsupportedStrategy(String),

    /// Fast-forward only was requested but the histories have diverged.
    #[error("fast-forward merge is not possible")]
    FastForwardNotPossible,

    /// The two commits share no history.
    #[error("no common ancestor between {ours} and {theirs}")]
    NoCommonAncestor { ours: String, theirs: String },

    /// One or more paths need manual resolution.
    #[error("merge conflict in {} path(s): {}", paths.len(), paths.join(", "))]
    Conflict { paths: Vec<String> },

    /// The repository has no working tree to materialize into.
    #[error("repository has no working tree")]
    BareRepository,

    /// Object-store failure (missing object, unreadable blob, ...).
    #[error(transparent)]
    Git(#[from] git2::Error),

    /// Working-tree I/O failure.
    #[error("working tree I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MergeError {
    /// `true` for the conflict outcome, which leaves the repository resumable.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

/// Errors from resolving a `scheme://path` source string.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The string has no `://` separator.
    #[error("invalid source format '{0}', expected \"source://path\"")]
    InvalidFormat(String),

    /// The scheme is not one of the supported drivers.
    #[error("invalid source driver '{0}'")]
    UnsupportedDriver(String),

    /// HTTP-level transport error.
    #[error("source HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("source {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Reading a `file://` source failed.
    #[error("source I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Manifest errors
// ---------------------------------------------------------------------------

/// Errors from decoding and validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest could not be fetched.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The manifest body is not valid TOML or JSON.
    #[error("manifest parse error: {0}")]
    ParseError(String),

    /// A remote has an empty `source`.
    #[error("remote.source cannot be empty (entry '{0}')")]
    EmptySource(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = GitError::RepositoryNotFound("/tmp/repo".into());
        assert_eq!(err.to_string(), "git repository not found at '/tmp/repo'");

        let err = MergeError::Conflict {
            paths: vec!["a.txt".into(), "b/c.txt".into()],
        };
        assert_eq!(
            err.to_string(),
            "merge conflict in 2 path(s): a.txt, b/c.txt"
        );

        let err = SourceError::UnsupportedDriver("ftp".into());
        assert!(err.to_string().contains("ftp"));

        let err = ManifestError::EmptySource("vanilla".into());
        assert!(err.to_string().contains("vanilla"));
    }

    #[test]
    fn test_conflict_is_distinguishable() {
        assert!(MergeError::Conflict { paths: vec![] }.is_conflict());
        assert!(!MergeError::FastForwardNotPossible.is_conflict());
        assert!(!MergeError::UnsupportedStrategy("octopus".into()).is_conflict());
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = MergeError::FastForwardNotPossible.into();
        assert!(matches!(core_err, CoreError::Merge(_)));

        let core_err: CoreError = SourceError::InvalidFormat("x".into()).into();
        assert!(matches!(core_err, CoreError::Source(_)));
    }
}
