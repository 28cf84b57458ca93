/// Update check: fetch the published version manifest and compare it with the
/// running build.
use crate::config::UpdateConfig;
use crate::version::{compare_version, Version, VersionError};
use serde::Deserialize;
use std::cmp::Ordering;
use std::time::Duration;

/// JSON document published alongside releases.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UpdateManifest {
    pub version: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Outcome of comparing the published version with the running one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// A newer version is published.
    Available {
        version: String,
        download_url: Option<String>,
        notes: Option<String>,
    },
    UpToDate,
    /// The running build is newer than what is published.
    Ahead { version: String },
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("failed to build HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to fetch update manifest from {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("update manifest request to {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Decide whether `manifest` describes an update relative to `running`.
pub fn evaluate(
    manifest: &UpdateManifest,
    running: &Version,
) -> Result<UpdateStatus, VersionError> {
    let status = match compare_version(&manifest.version, running)? {
        Ordering::Greater => UpdateStatus::Available {
            version: manifest.version.clone(),
            download_url: manifest.download_url.clone(),
            notes: manifest.notes.clone(),
        },
        Ordering::Equal => UpdateStatus::UpToDate,
        Ordering::Less => UpdateStatus::Ahead {
            version: manifest.version.clone(),
        },
    };
    Ok(status)
}

/// Fetches update manifests over HTTP.
pub struct UpdateChecker {
    client: reqwest::Client,
}

impl UpdateChecker {
    pub fn new(config: &UpdateConfig) -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("lifeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpdateError::Client { source: e })?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Result<UpdateManifest, UpdateError> {
        tracing::debug!(url, "fetching update manifest");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::Http {
                url: url.to_string(),
                source: e,
            })?;

        if !resp.status().is_success() {
            return Err(UpdateError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }

        resp.json::<UpdateManifest>()
            .await
            .map_err(|e| UpdateError::Http {
                url: url.to_string(),
                source: e,
            })
    }

    /// Fetch the manifest at `url` and evaluate it against `running`.
    pub async fn check(
        &self,
        url: &str,
        running: &Version,
    ) -> Result<UpdateStatus, UpdateError> {
        let manifest = self.fetch(url).await?;
        let status = evaluate(&manifest, running)?;
        tracing::info!(
            published = %manifest.version,
            running = %running,
            status = ?status,
            "update check complete"
        );
        Ok(status)
    }
}
