//! CUDA runtime remediation.
//!
//! When post-install validation finds unresolvable CUDA libraries, the
//! planner fetches a supplemental runtime bundle, copies its shared
//! objects into a user-writable library directory, and reports that the
//! dynamic loader's search path must be extended to include it. The
//! main application install is never rolled back: a failed remediation
//! only means GPU acceleration stays unavailable.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::download::{download, extract, find_shared_objects};
use crate::error::{InstallError, Result};
use crate::manifest::ReleaseManifest;

/// Asset name of the runtime-library bundle in the release catalog.
pub const BUNDLE_ASSET_NAME: &str = "cudart-linux-x86_64.zip";

/// Pinned bundle location used when a release does not carry the asset.
const BUNDLE_FALLBACK_URL: &str =
    "https://github.com/remembrances-mcp/remembrances-mcp/releases/download/cudart-12.4/cudart-linux-x86_64.zip";

/// A decided remediation: where the bundle comes from and where its
/// libraries go.
#[derive(Debug, Clone)]
pub struct RemediationPlan {
    pub bundle_url: String,
    pub lib_dir: PathBuf,
}

/// What a completed remediation changed on disk.
#[derive(Debug, Clone)]
pub struct RemediationReport {
    /// Number of shared objects copied into the library directory.
    pub installed_libs: usize,
    /// Directory the dynamic loader must be able to search. The shell
    /// environment collaborator appends it to LD_LIBRARY_PATH.
    pub lib_dir: PathBuf,
}

/// The user-writable directory remediation installs libraries into.
pub fn user_lib_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("remembrances-mcp")
        .join("lib")
}

/// Decide the remediation for the given missing libraries: bundle from
/// the current release when published there, else the pinned URL.
pub fn plan(manifest: &ReleaseManifest, missing: &[String]) -> RemediationPlan {
    tracing::info!(
        "Planning CUDA runtime remediation for missing libraries: {}",
        missing.join(", ")
    );

    let bundle_url = manifest
        .find_by_suffix(BUNDLE_ASSET_NAME)
        .map(|a| a.browser_download_url.clone())
        .unwrap_or_else(|| {
            tracing::debug!("Release has no {BUNDLE_ASSET_NAME}; using pinned bundle URL");
            BUNDLE_FALLBACK_URL.to_string()
        });

    RemediationPlan {
        bundle_url,
        lib_dir: user_lib_dir(),
    }
}

/// Execute a remediation plan: download, extract, and copy every shared
/// object into the plan's library directory.
///
/// A bundle that extracts to zero shared objects is logged as a warning
/// and reported as such, not treated as fatal; download or extraction
/// failure is fatal for this step only.
pub fn execute(plan: &RemediationPlan) -> Result<RemediationReport> {
    let staging = TempDir::new().map_err(|e| InstallError::RemediationFailed {
        message: format!("could not create staging directory: {e}"),
    })?;

    let archive = download(&plan.bundle_url, BUNDLE_ASSET_NAME, staging.path()).map_err(|e| {
        InstallError::RemediationFailed {
            message: format!("bundle download failed: {e}"),
        }
    })?;

    let extracted = staging.path().join("extracted");
    extract(&archive, &extracted).map_err(|e| InstallError::RemediationFailed {
        message: format!("bundle extraction failed: {e}"),
    })?;

    copy_bundle_libs(&extracted, &plan.lib_dir)
}

/// Copy every shared object under `extracted` into `lib_dir`. A bundle
/// with zero shared objects is a warning, not a failure. Split out from
/// [`execute`] so the copy phase is testable without a download.
pub fn copy_bundle_libs(extracted: &Path, lib_dir: &Path) -> Result<RemediationReport> {
    let libs = find_shared_objects(extracted);
    if libs.is_empty() {
        tracing::warn!("Runtime bundle contained no shared objects");
        return Ok(RemediationReport {
            installed_libs: 0,
            lib_dir: lib_dir.to_path_buf(),
        });
    }

    fs::create_dir_all(lib_dir)?;
    for lib in &libs {
        let name = lib
            .file_name()
            .ok_or_else(|| InstallError::RemediationFailed {
                message: format!("bundle entry has no filename: {}", lib.display()),
            })?;
        fs::copy(lib, lib_dir.join(name))?;
    }

    tracing::info!(
        "Installed {} CUDA runtime libraries into {}",
        libs.len(),
        lib_dir.display()
    );

    Ok(RemediationReport {
        installed_libs: libs.len(),
        lib_dir: lib_dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ReleaseAsset;

    fn manifest_with(names: &[&str]) -> ReleaseManifest {
        ReleaseManifest {
            tag: "v0.4.2".into(),
            assets: names
                .iter()
                .map(|n| ReleaseAsset {
                    name: n.to_string(),
                    browser_download_url: format!("https://example.com/{n}"),
                })
                .collect(),
        }
    }

    #[test]
    fn plan_prefers_release_bundle() {
        let manifest = manifest_with(&["remembrances-mcp-cpu-linux-x86_64.zip", BUNDLE_ASSET_NAME]);
        let plan = plan(&manifest, &["libcudart.so.12".into()]);
        assert_eq!(
            plan.bundle_url,
            format!("https://example.com/{BUNDLE_ASSET_NAME}")
        );
    }

    #[test]
    fn plan_falls_back_to_pinned_url() {
        let manifest = manifest_with(&["remembrances-mcp-cpu-linux-x86_64.zip"]);
        let plan = plan(&manifest, &["libcudart.so.12".into()]);
        assert_eq!(plan.bundle_url, BUNDLE_FALLBACK_URL);
    }

    #[test]
    fn empty_bundle_is_degraded_not_fatal() {
        let extracted = tempfile::TempDir::new().unwrap();
        std::fs::write(extracted.path().join("README.txt"), b"no libs here").unwrap();
        let lib_dir = tempfile::TempDir::new().unwrap();

        let report = copy_bundle_libs(extracted.path(), lib_dir.path()).unwrap();
        assert_eq!(report.installed_libs, 0);
        assert_eq!(report.lib_dir, lib_dir.path());
    }

    #[test]
    fn copy_bundle_libs_installs_shared_objects() {
        let extracted = tempfile::TempDir::new().unwrap();
        let nested = extracted.path().join("cudart/lib");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("libcudart.so.12.4.1"), b"elf").unwrap();
        std::fs::write(nested.join("libcublas.so.12"), b"elf").unwrap();
        std::fs::write(extracted.path().join("LICENSE"), b"text").unwrap();

        let lib_dir = tempfile::TempDir::new().unwrap();
        let dest = lib_dir.path().join("lib");

        let report = copy_bundle_libs(extracted.path(), &dest).unwrap();
        assert_eq!(report.installed_libs, 2);
        assert!(dest.join("libcudart.so.12.4.1").exists());
        assert!(dest.join("libcublas.so.12").exists());
        assert!(!dest.join("LICENSE").exists());
    }

    #[test]
    fn lib_dir_is_under_app_data_dir() {
        let dir = user_lib_dir();
        let s = dir.to_string_lossy();
        assert!(s.contains("remembrances-mcp"));
        assert!(s.ends_with("lib"));
    }
}
