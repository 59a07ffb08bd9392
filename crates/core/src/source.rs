//! `scheme://path` source strings and how to read them.
//!
//! Manifests can live on the network (`http://`, `https://`) or on disk
//! (`file://`).

use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::errors::SourceError;

/// Supported source drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Http,
    Https,
    File,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
            Self::File => write!(f, "file"),
        }
    }
}

/// A raw source string split into its driver and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Driver {
    pub raw: String,
    pub source: Source,
    pub path: String,
}

impl Driver {
    /// Parse `raw` as `source://path`.
    pub fn extract(raw: &str) -> Result<Self, SourceError> {
        let (scheme, path) = raw
            .split_once("://")
            .ok_or_else(|| SourceError::InvalidFormat(raw.to_owned()))?;

        let source = match scheme {
            "http" => Source::Http,
            "https" => Source::Https,
            "file" => Source::File,
            other => return Err(SourceError::UnsupportedDriver(other.to_owned())),
        };

        Ok(Self {
            raw: raw.to_owned(),
            source,
            path: path.to_owned(),
        })
    }

    /// Local filesystem path of a `file://` source, with `~/` expanded.
    pub fn local_path(&self) -> PathBuf {
        match self.path.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.path)),
            None => PathBuf::from(&self.path),
        }
    }
}

/// Read the full contents behind a source string.
#[instrument(fields(source = %raw))]
pub async fn resolve(raw: &str) -> Result<Vec<u8>, SourceError> {
    let driver = Driver::extract(raw)?;

    let bytes = match driver.source {
        Source::Http | Source::Https => {
            let response = reqwest::get(&driver.raw).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::HttpStatus {
                    url: driver.raw,
                    status: status.as_u16(),
                });
            }
            response.bytes().await?.to_vec()
        }
        Source::File => tokio::fs::read(driver.local_path()).await?,
    };

    debug!(bytes = bytes.len(), "source resolved");
    Ok(bytes)
}
