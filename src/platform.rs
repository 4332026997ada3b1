//! Host platform identification.
//!
//! Classifies raw OS and machine-architecture strings into the closed
//! set of platforms that have published builds. Classification is pure;
//! [`identify`] reads the process environment once and everything
//! downstream works from the resulting [`PlatformTuple`].

use crate::error::{InstallError, Result};

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    Darwin,
    Unsupported,
}

impl Os {
    /// Classify a raw OS name by case-insensitive family prefix.
    ///
    /// Anything beginning "linux" is Linux, "darwin" is Darwin. This
    /// intentionally accepts kernel-version suffixes ("Linux 6.8.0").
    pub fn from_raw(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("linux") {
            Os::Linux
        } else if lower.starts_with("darwin") || lower.starts_with("macos") {
            Os::Darwin
        } else {
            Os::Unsupported
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Unsupported => "unsupported",
        }
    }
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Amd64,
    Aarch64,
    Unsupported,
}

impl Arch {
    /// Classify a raw machine-architecture string.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "x86_64" | "amd64" => Arch::Amd64,
            "arm64" | "aarch64" => Arch::Aarch64,
            _ => Arch::Unsupported,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Aarch64 => "aarch64",
            Arch::Unsupported => "unsupported",
        }
    }
}

/// Normalized host platform.
///
/// Only two tuples have published builds: (linux, amd64) and
/// (darwin, aarch64). Everything else is terminal for the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformTuple {
    pub os: Os,
    pub arch: Arch,
}

impl PlatformTuple {
    /// Classify raw OS and architecture strings into a tuple.
    pub fn from_raw(raw_os: &str, raw_arch: &str) -> Self {
        Self {
            os: Os::from_raw(raw_os),
            arch: Arch::from_raw(raw_arch),
        }
    }

    /// Whether this tuple has a published build.
    pub fn is_supported(&self) -> bool {
        matches!(
            (self.os, self.arch),
            (Os::Linux, Arch::Amd64) | (Os::Darwin, Arch::Aarch64)
        )
    }

    /// Whether hardware capability probing applies to this tuple.
    ///
    /// Only the linux/amd64 build ships GPU and SIMD variants; darwin
    /// always uses the single embedded build.
    pub fn wants_probing(&self) -> bool {
        matches!((self.os, self.arch), (Os::Linux, Arch::Amd64))
    }
}

impl std::fmt::Display for PlatformTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os.name(), self.arch.name())
    }
}

/// Identify the host platform from the process environment.
///
/// Returns an error for any tuple without a published build, including
/// the cross combinations (darwin/amd64, linux/aarch64).
pub fn identify() -> Result<PlatformTuple> {
    identify_from(std::env::consts::OS, std::env::consts::ARCH)
}

/// Identify from explicit raw strings. Split out for testability.
pub fn identify_from(raw_os: &str, raw_arch: &str) -> Result<PlatformTuple> {
    let tuple = PlatformTuple::from_raw(raw_os, raw_arch);
    tracing::debug!("Detected platform: {}", tuple);

    if !tuple.is_supported() {
        return Err(InstallError::UnsupportedPlatform {
            os: raw_os.to_string(),
            arch: raw_arch.to_string(),
        });
    }

    Ok(tuple)
}
