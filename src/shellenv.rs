//! Shell startup-file environment setup.
//!
//! Appends PATH and LD_LIBRARY_PATH lines to the user's shell rc file so
//! the installed binary is found and, after CUDA remediation, the
//! dynamic loader can search the user library directory. Appends are
//! guarded by a marker comment so repeat installs never duplicate lines.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Marker comment identifying installer-managed rc lines.
const MARKER: &str = "# added by remembrances-install";

/// Known shell types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    Unknown,
}

impl ShellType {
    /// Parse shell type from the SHELL executable path.
    pub fn from_executable(exe: &str) -> Self {
        let name = Path::new(exe)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match name.as_str() {
            "bash" => ShellType::Bash,
            "zsh" => ShellType::Zsh,
            "fish" => ShellType::Fish,
            _ => ShellType::Unknown,
        }
    }

    /// The rc file this installer appends to, relative to home.
    fn rc_file(&self) -> Option<&'static str> {
        match self {
            ShellType::Bash => Some(".bashrc"),
            ShellType::Zsh => Some(".zshrc"),
            ShellType::Fish => Some(".config/fish/config.fish"),
            ShellType::Unknown => None,
        }
    }

    /// Render an export line extending a path-list variable.
    fn export_line(&self, var: &str, dir: &Path) -> String {
        match self {
            ShellType::Fish => {
                format!("set -gx {var} {} ${var}", dir.display())
            }
            _ => format!("export {var}=\"{}:${{{var}}}\"", dir.display()),
        }
    }
}

/// Detect the current shell from $SHELL.
pub fn detect_shell() -> ShellType {
    std::env::var("SHELL")
        .map(|s| ShellType::from_executable(&s))
        .unwrap_or(ShellType::Unknown)
}

/// What the installer needs future shells to see.
#[derive(Debug, Clone, Default)]
pub struct EnvRequirements {
    /// Directory holding the installed binary, added to PATH when not
    /// already on it.
    pub bin_dir: Option<PathBuf>,
    /// Library directory the dynamic loader must search, added to
    /// LD_LIBRARY_PATH after CUDA remediation.
    pub lib_dir: Option<PathBuf>,
}

impl EnvRequirements {
    pub fn is_empty(&self) -> bool {
        self.bin_dir.is_none() && self.lib_dir.is_none()
    }
}

/// Apply the requirements to the detected shell's rc file. Returns the
/// rc file touched, or `None` when there was nothing to write or the
/// shell is unknown (the caller prints manual instructions instead).
pub fn apply(requirements: &EnvRequirements) -> Result<Option<PathBuf>> {
    if requirements.is_empty() {
        return Ok(None);
    }
    let shell = detect_shell();
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    apply_to(requirements, shell, &home)
}

/// Apply against an explicit shell and home directory. Split out for
/// testability.
pub fn apply_to(
    requirements: &EnvRequirements,
    shell: ShellType,
    home: &Path,
) -> Result<Option<PathBuf>> {
    let Some(rc_rel) = shell.rc_file() else {
        tracing::warn!("Unknown shell; PATH/LD_LIBRARY_PATH must be configured manually");
        return Ok(None);
    };
    let rc_path = home.join(rc_rel);

    let existing = fs::read_to_string(&rc_path).unwrap_or_default();
    let mut additions = Vec::new();

    if let Some(bin_dir) = &requirements.bin_dir {
        if !dir_on_path(bin_dir) {
            push_if_absent(&existing, &mut additions, shell.export_line("PATH", bin_dir));
        }
    }
    if let Some(lib_dir) = &requirements.lib_dir {
        push_if_absent(
            &existing,
            &mut additions,
            shell.export_line("LD_LIBRARY_PATH", lib_dir),
        );
    }

    if additions.is_empty() {
        return Ok(None);
    }

    if let Some(parent) = rc_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut block = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        block.push('\n');
    }
    for line in &additions {
        block.push_str(&format!("{line} {MARKER}\n"));
    }

    fs::write(&rc_path, existing + &block)?;
    tracing::info!("Updated {}", rc_path.display());
    Ok(Some(rc_path))
}

/// Skip lines already present (marker-guarded or hand-written).
fn push_if_absent(existing: &str, additions: &mut Vec<String>, line: String) {
    let already = existing
        .lines()
        .any(|l| l.trim_start().starts_with(&line) || (l.contains(MARKER) && l.contains(&line)));
    if !already {
        additions.push(line);
    }
}

/// Whether a directory is already on the current PATH.
fn dir_on_path(dir: &Path) -> bool {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|p| p == dir))
        .unwrap_or(false)
}
