//! Archive download and extraction.
//!
//! I/O wrapper around the selection engine's output: stream the chosen
//! asset to disk with a progress bar, verify its checksum when the
//! release publishes a `.sha256` sidecar, and extract it with whichever
//! archive tool the host has. No selection decisions are made here.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};

use crate::error::{InstallError, Result};
use crate::manifest::{http_client, ReleaseManifest};

/// Archive tools accepted for extraction, in preference order.
const ARCHIVE_TOOLS: &[&str] = &["unzip", "bsdtar", "tar"];

/// Download `url` into `dest_dir`, returning the path of the downloaded
/// file. Shows a progress bar when the response carries a length.
pub fn download(url: &str, filename: &str, dest_dir: &Path) -> Result<PathBuf> {
    let client = http_client()?;
    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| InstallError::DownloadFailed {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    let total = response.content_length();
    let bar = match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message(filename.to_string());
            bar
        }
        None => ProgressBar::new_spinner().with_message(filename.to_string()),
    };

    fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(filename);
    let mut file = fs::File::create(&dest)?;

    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = response
            .read(&mut buf)
            .map_err(|e| InstallError::DownloadFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if n == 0 {
            break;
        }
        std::io::Write::write_all(&mut file, &buf[..n])?;
        bar.inc(n as u64);
    }
    bar.finish_and_clear();

    tracing::info!("Downloaded {} to {}", filename, dest.display());
    Ok(dest)
}

/// Verify `archive` against a `<name>.sha256` sidecar asset when the
/// release publishes one. A release without a sidecar passes.
pub fn verify_checksum(archive: &Path, asset_name: &str, manifest: &ReleaseManifest) -> Result<()> {
    let sidecar_name = format!("{asset_name}.sha256");
    let Some(sidecar) = manifest.find_by_suffix(&sidecar_name) else {
        tracing::debug!("No checksum sidecar for {asset_name}");
        return Ok(());
    };

    let client = http_client()?;
    let body = client
        .get(&sidecar.browser_download_url)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.text())
        .map_err(|e| InstallError::DownloadFailed {
            url: sidecar.browser_download_url.clone(),
            message: e.to_string(),
        })?;

    // Sidecar format: "<hex digest>  <filename>" or just the digest.
    let expected = body.split_whitespace().next().unwrap_or("").to_lowercase();
    let actual = sha256_file(archive)?;

    if expected != actual {
        return Err(InstallError::ChecksumMismatch {
            filename: asset_name.to_string(),
            expected,
            actual,
        });
    }

    tracing::debug!("Checksum verified for {asset_name}");
    Ok(())
}

/// SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Find the first available archive tool on PATH.
pub fn find_archive_tool() -> Option<&'static str> {
    ARCHIVE_TOOLS
        .iter()
        .copied()
        .find(|tool| tool_available(tool))
}

fn tool_available(tool: &str) -> bool {
    std::env::var_os("PATH")
        .map(|path| {
            std::env::split_paths(&path).any(|dir| is_executable(&dir.join(tool)))
        })
        .unwrap_or(false)
}

/// Check whether a file has executable permission bits set.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Extract `archive` into `dest_dir` using the first available archive
/// tool. Fatal when no tool exists or the tool fails.
pub fn extract(archive: &Path, dest_dir: &Path) -> Result<()> {
    let tool = find_archive_tool().ok_or(InstallError::NoArchiveTool)?;
    fs::create_dir_all(dest_dir)?;

    let mut cmd = Command::new(tool);
    match tool {
        "unzip" => cmd
            .arg("-o")
            .arg(archive)
            .arg("-d")
            .arg(dest_dir),
        // bsdtar and GNU tar both read zip archives with -xf
        _ => cmd.arg("-xf").arg(archive).arg("-C").arg(dest_dir),
    };

    tracing::debug!("Extracting {} with {}", archive.display(), tool);
    let output = cmd.output()?;
    if !output.status.success() {
        return Err(InstallError::ExtractionFailed {
            archive: archive.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Recursively find a file named `name` inside `root`, preferring
/// executables. Used to locate the app binary and the native libraries
/// inside an extracted archive.
pub fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    let mut stack = vec![root.to_path_buf()];
    let mut non_executable_match = None;

    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.file_name().is_some_and(|f| f == name) {
                if is_executable(&path) {
                    return Some(path);
                }
                non_executable_match.get_or_insert(path);
            }
        }
    }
    non_executable_match
}

/// Collect every shared-object file (`*.so` or `*.so.*`) under `root`.
pub fn find_shared_objects(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_shared_object(&path) {
                found.push(path);
            }
        }
    }
    found
}

fn is_shared_object(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|f| f.to_str()) else {
        return false;
    };
    name.ends_with(".so") || name.contains(".so.")
}
