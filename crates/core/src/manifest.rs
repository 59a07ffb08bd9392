//! The manifest of available bases and plugins.
//!
//! Manifests are YAML:
//!
//! ```yaml
//! base:
//!   - name: Vanilla
//!     color: cyan
//!     remote:
//!       source: https://github.com/gbwf-dev/vanilla.git
//!       ref: main
//! plugins:
//!   - name: Auth
//!     remote:
//!       source: https://github.com/gbwf-dev/auth.git
//!       name: auth
//! ```
//!
//! The same layout is accepted as TOML or JSON when the source ends in
//! `.toml` or `.json`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ManifestError;
use crate::source;

/// Branch fetched when a remote does not name a ref.
pub const DEFAULT_REF: &str = "main";

/// Anything that can check its own consistency after decoding.
pub trait Validate {
    fn validate(&self) -> Result<(), ManifestError>;
}

/// Where a base or plugin is fetched from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    /// Git URL of the repository.
    pub source: String,

    /// Name of the git remote to create; derived from the entry name if empty.
    #[serde(default)]
    pub name: String,

    /// Branch or full ref to fetch.
    #[serde(default, rename = "ref")]
    pub git_ref: String,
}

impl Remote {
    /// Name for the git remote: the explicit `name`, or a slug of `fallback`.
    pub fn remote_name(&self, fallback: &str) -> String {
        if self.name.is_empty() {
            slug(fallback)
        } else {
            self.name.clone()
        }
    }

    /// The ref fetched on the remote side.
    pub fn source_ref(&self) -> String {
        let git_ref = if self.git_ref.is_empty() {
            DEFAULT_REF
        } else {
            &self.git_ref
        };
        if git_ref.starts_with("refs/") {
            git_ref.to_owned()
        } else {
            format!("refs/heads/{git_ref}")
        }
    }

    /// Local ref the fetched commit is stored under.
    pub fn tracking_ref(&self, remote_name: &str) -> String {
        let source_ref = self.source_ref();
        let short = source_ref
            .strip_prefix("refs/heads/")
            .or_else(|| source_ref.strip_prefix("refs/"))
            .unwrap_or(&source_ref);
        format!("refs/remotes/{remote_name}/{short}")
    }

    /// Forced refspec mapping [`source_ref`](Self::source_ref) onto
    /// [`tracking_ref`](Self::tracking_ref).
    pub fn refspec(&self, remote_name: &str) -> String {
        format!("+{}:{}", self.source_ref(), self.tracking_ref(remote_name))
    }
}

impl Validate for Remote {
    fn validate(&self) -> Result<(), ManifestError> {
        if self.source.trim().is_empty() {
            return Err(ManifestError::EmptySource(self.name.clone()));
        }
        Ok(())
    }
}

/// A selectable base template or plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    pub name: String,

    /// Terminal color used when listing the entry (name or 0-255 index).
    #[serde(default)]
    pub color: String,

    pub remote: Remote,
}

impl Base {
    pub fn remote_name(&self) -> String {
        self.remote.remote_name(&self.name)
    }
}

impl Validate for Base {
    fn validate(&self) -> Result<(), ManifestError> {
        self.remote
            .validate()
            .map_err(|_| ManifestError::EmptySource(self.name.clone()))
    }
}

/// Every base and plugin on offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub base: Vec<Base>,

    #[serde(default)]
    pub plugins: Vec<Base>,
}

impl Validate for Manifest {
    fn validate(&self) -> Result<(), ManifestError> {
        self.base
            .iter()
            .chain(&self.plugins)
            .try_for_each(Validate::validate)
    }
}

impl Manifest {
    /// Decode a manifest body. `hint` is the source it came from; a `.toml`
    /// or `.json` suffix selects that format, anything else is read as YAML.
    pub fn decode(bytes: &[u8], hint: &str) -> Result<Self, ManifestError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ManifestError::ParseError(format!("manifest is not UTF-8: {e}")))?;

        let manifest: Manifest = if text.trim().is_empty() {
            Manifest::default()
        } else if hint.ends_with(".json") {
            serde_json::from_str(text).map_err(|e| ManifestError::ParseError(e.to_string()))?
        } else if hint.ends_with(".toml") {
            toml::from_str(text).map_err(|e| ManifestError::ParseError(e.to_string()))?
        } else {
            serde_yaml::from_str(text).map_err(|e| ManifestError::ParseError(e.to_string()))?
        };

        debug!(
            bases = manifest.base.len(),
            plugins = manifest.plugins.len(),
            "manifest decoded"
        );
        Ok(manifest)
    }

    /// Fetch, decode, and validate the manifest behind a source string.
    pub async fn load(source: &str) -> Result<Self, ManifestError> {
        info!(source, "loading manifest");
        let bytes = source::resolve(source).await?;
        let manifest = Self::decode(&bytes, source)?;
        manifest.validate()?;
        Ok(manifest)
    }
}

/// Lowercase, with runs of non-alphanumerics collapsed to `-`.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
