//! Error types for installer operations.
//!
//! This module defines [`InstallError`], the primary error type used
//! throughout the installer, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `InstallError` for terminal conditions that abort the run
//! - Probing never errors: a missing signal degrades to a safe default
//!   and is logged as a warning, it does not produce an `InstallError`
//! - Use `anyhow::Error` (via `InstallError::Other`) for unexpected errors
//! - All errors should provide actionable messages for users

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for installer operations.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Host OS/architecture combination has no published build.
    #[error("Unsupported platform: {os}/{arch} (supported: linux/amd64, darwin/aarch64)")]
    UnsupportedPlatform { os: String, arch: String },

    /// The release catalog has no asset for the selected (and fallback) filename.
    #[error("No downloadable asset matching '{filename}' in release {tag}")]
    NoMatchingAsset { filename: String, tag: String },

    /// Fetching release metadata failed.
    #[error("Failed to fetch release metadata: {message}")]
    ManifestFetch { message: String },

    /// Downloading an archive failed.
    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    /// Downloaded archive did not match its published checksum.
    #[error("Checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// No archive extraction tool found on the host.
    #[error("No archive tool available (need one of: unzip, bsdtar, tar)")]
    NoArchiveTool,

    /// Archive extraction command ran but failed.
    #[error("Failed to extract {archive}: {message}")]
    ExtractionFailed { archive: PathBuf, message: String },

    /// The extracted tree does not contain the application binary.
    #[error("No '{binary}' binary found inside the extracted archive")]
    BinaryNotFound { binary: String },

    /// CUDA runtime remediation failed. The main install is unaffected.
    #[error("CUDA runtime setup failed: {message}")]
    RemediationFailed { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for installer operations.
pub type Result<T> = std::result::Result<T, InstallError>;
