//! Release manifest fetching.
//!
//! Thin wrapper around the GitHub releases API: fetch the latest (or a
//! pinned) release and hand its asset catalog to the selection engine.
//! No decision logic lives here.

use serde::Deserialize;

use crate::error::{InstallError, Result};

/// GitHub repository that publishes remembrances-mcp releases.
const RELEASES_REPO: &str = "remembrances-mcp/remembrances-mcp";

/// Environment variable overriding the API base URL (used by tests).
const BASE_URL_ENV: &str = "REMEMBRANCES_RELEASES_BASE";

/// One downloadable file attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// A published release: tag plus asset catalog. The catalog may be
/// incomplete for any given platform/variant combination.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseManifest {
    #[serde(rename = "tag_name")]
    pub tag: String,
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseManifest {
    /// Find the first asset whose name ends with the given filename.
    pub fn find_by_suffix(&self, filename: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name.ends_with(filename))
    }
}

/// Fetch release metadata: the latest release, or a specific tag when
/// the user pinned one.
pub fn fetch_manifest(tag: Option<&str>) -> Result<ReleaseManifest> {
    let base = std::env::var(BASE_URL_ENV)
        .unwrap_or_else(|_| "https://api.github.com".to_string());
    let url = match tag {
        Some(tag) => format!("{base}/repos/{RELEASES_REPO}/releases/tags/{tag}"),
        None => format!("{base}/repos/{RELEASES_REPO}/releases/latest"),
    };

    tracing::debug!("Fetching release manifest from {url}");

    let client = http_client()?;
    let response = client
        .get(&url)
        .send()
        .map_err(|e| InstallError::ManifestFetch {
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(InstallError::ManifestFetch {
            message: format!("{url} returned HTTP {}", response.status()),
        });
    }

    let manifest: ReleaseManifest =
        response.json().map_err(|e| InstallError::ManifestFetch {
            message: format!("invalid release metadata: {e}"),
        })?;

    tracing::info!(
        "Release {} with {} assets",
        manifest.tag,
        manifest.assets.len()
    );
    Ok(manifest)
}

/// Blocking HTTP client used for all installer requests.
pub fn http_client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("remembrances-install/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| InstallError::ManifestFetch {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_by_suffix_matches_exact_name() {
        let manifest = ReleaseManifest {
            tag: "v1.0.0".into(),
            assets: vec![ReleaseAsset {
                name: "remembrances-mcp-darwin-aarch64-embedded.zip".into(),
                browser_download_url: "https://example.com/a.zip".into(),
            }],
        };
        assert!(manifest
            .find_by_suffix("remembrances-mcp-darwin-aarch64-embedded.zip")
            .is_some());
        assert!(manifest.find_by_suffix("missing.zip").is_none());
    }

    #[test]
    fn find_by_suffix_first_match_wins() {
        let manifest = ReleaseManifest {
            tag: "v1.0.0".into(),
            assets: vec![
                ReleaseAsset {
                    name: "first-app.zip".into(),
                    browser_download_url: "https://example.com/1".into(),
                },
                ReleaseAsset {
                    name: "second-app.zip".into(),
                    browser_download_url: "https://example.com/2".into(),
                },
            ],
        };
        let found = manifest.find_by_suffix("app.zip").unwrap();
        assert_eq!(found.name, "first-app.zip");
    }

    #[test]
    fn manifest_deserializes_github_release_shape() {
        let json = r#"{
            "tag_name": "v0.4.2",
            "name": "Release 0.4.2",
            "assets": [
                {
                    "name": "remembrances-mcp-cpu-linux-x86_64.zip",
                    "browser_download_url": "https://example.com/dl.zip",
                    "size": 12345
                }
            ]
        }"#;
        let manifest: ReleaseManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.tag, "v0.4.2");
        assert_eq!(manifest.assets.len(), 1);
        assert!(manifest.assets[0].browser_download_url.contains("dl.zip"));
    }
}
