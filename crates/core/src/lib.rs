//! gbwf core library.
//!
//! This crate provides the pieces behind the `gbwf` bootstrapper: source
//! resolution, manifest decoding, configuration, repository glue, and the
//! three-way merge engine that folds a template's history into a workspace.

pub mod config;
pub mod errors;
pub mod git;
pub mod manifest;
pub mod merge;
pub mod source;

// Re-exports for convenience.
pub use config::GbwfConfig;
pub use errors::CoreError;
pub use git::GitClient;
pub use manifest::Manifest;
pub use merge::{merge, MergeOptions, MergeReport, MergeState, MergeStrategy};
