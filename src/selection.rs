//! Asset variant selection.
//!
//! Maps the host platform plus the user's variant preference to a single
//! release-asset filename, then resolves that filename against the
//! fetched catalog. The mapping is a total function over a closed set of
//! variants; "no mapping" and "not in catalog" are distinct, typed
//! outcomes rather than empty strings.

use crate::capability::CapabilityProfile;
use crate::error::{InstallError, Result};
use crate::manifest::{ReleaseAsset, ReleaseManifest};
use crate::platform::{Arch, Os, PlatformTuple};

/// Application name used as the asset filename prefix.
pub const APP_NAME: &str = "remembrances-mcp";

/// A three-valued override: unset, or an explicit yes/no from a flag or
/// environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Override {
    #[default]
    Unset,
    Yes,
    No,
}

impl Override {
    /// Apply on top of a computed value; `Unset` keeps it.
    pub fn apply(self, value: bool) -> bool {
        match self {
            Override::Unset => value,
            Override::Yes => true,
            Override::No => false,
        }
    }

    /// Build from a pair of mutually exclusive flags.
    pub fn from_flags(yes: bool, no: bool) -> Self {
        match (yes, no) {
            (true, _) => Override::Yes,
            (_, true) => Override::No,
            _ => Override::Unset,
        }
    }
}

/// Finalized variant choice. Built from capability defaults, then fixed
/// before selection; read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantPreference {
    /// Install the CUDA-accelerated build.
    pub want_nvidia: bool,
    /// Install the broad-compatibility (non-AVX-512) build.
    pub want_portable: bool,
}

impl VariantPreference {
    /// Defaults derived from the probed profile: CUDA iff a working GPU
    /// was seen; the narrower non-portable build only when the CPU has
    /// AVX-512 (unknown counts as absent).
    pub fn defaults_for(profile: &CapabilityProfile) -> Self {
        Self {
            want_nvidia: profile.has_nvidia_gpu,
            want_portable: !profile.has_avx512,
        }
    }

    /// Apply explicit overrides (flags/env beat computed defaults).
    pub fn with_overrides(self, nvidia: Override, portable: Override) -> Self {
        Self {
            want_nvidia: nvidia.apply(self.want_nvidia),
            want_portable: portable.apply(self.want_portable),
        }
    }
}

/// The closed set of release variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetVariant {
    /// Single darwin/aarch64 build, Metal-accelerated, always embedded.
    DarwinEmbedded,
    /// linux/amd64 CUDA build, portable instruction baseline.
    LinuxCudaPortable,
    /// linux/amd64 CUDA build, AVX-512 baseline.
    LinuxCuda,
    /// linux/amd64 CPU build with bundled runtime libraries.
    LinuxCpuEmbedded,
    /// linux/amd64 CPU build without bundled libraries. Only ever used
    /// as the fallback when the embedded variant is missing upstream.
    LinuxCpu,
}

impl AssetVariant {
    /// Total mapping from platform and preference to a variant.
    /// `None` means no published build exists for the tuple.
    pub fn select(tuple: &PlatformTuple, pref: &VariantPreference) -> Option<Self> {
        match (tuple.os, tuple.arch) {
            (Os::Darwin, Arch::Aarch64) => Some(AssetVariant::DarwinEmbedded),
            (Os::Linux, Arch::Amd64) => Some(match (pref.want_nvidia, pref.want_portable) {
                (true, true) => AssetVariant::LinuxCudaPortable,
                (true, false) => AssetVariant::LinuxCuda,
                (false, _) => AssetVariant::LinuxCpuEmbedded,
            }),
            _ => None,
        }
    }

    /// Release-asset filename for this variant.
    pub fn filename(&self) -> String {
        match self {
            AssetVariant::DarwinEmbedded => format!("{APP_NAME}-darwin-aarch64-embedded.zip"),
            AssetVariant::LinuxCudaPortable => {
                format!("{APP_NAME}-embedded-cuda-portable-linux-x86_64.zip")
            }
            AssetVariant::LinuxCuda => format!("{APP_NAME}-embedded-cuda-linux-x86_64.zip"),
            AssetVariant::LinuxCpuEmbedded => format!("{APP_NAME}-embedded-cpu-linux-x86_64.zip"),
            AssetVariant::LinuxCpu => format!("{APP_NAME}-cpu-linux-x86_64.zip"),
        }
    }

    /// The single defined fallback: embedded CPU → plain CPU. Every
    /// other variant resolves exactly once or fails.
    pub fn fallback(&self) -> Option<Self> {
        match self {
            AssetVariant::LinuxCpuEmbedded => Some(AssetVariant::LinuxCpu),
            _ => None,
        }
    }

    /// Whether this variant links against the CUDA runtime and needs
    /// post-install dependency validation.
    pub fn needs_cuda(&self) -> bool {
        matches!(self, AssetVariant::LinuxCuda | AssetVariant::LinuxCudaPortable)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            AssetVariant::DarwinEmbedded => "macOS (Apple Silicon, Metal)",
            AssetVariant::LinuxCudaPortable => "Linux CUDA (portable build)",
            AssetVariant::LinuxCuda => "Linux CUDA (AVX-512 build)",
            AssetVariant::LinuxCpuEmbedded => "Linux CPU (embedded)",
            AssetVariant::LinuxCpu => "Linux CPU",
        }
    }
}

/// Variant plus the catalog entry it resolved to.
#[derive(Debug, Clone)]
pub struct SelectedAsset {
    pub variant: AssetVariant,
    pub asset: ReleaseAsset,
}

/// Pick the variant for this platform/preference. Callers gate on
/// platform support before this, so `None` here is a programming error
/// surfaced as UnsupportedPlatform.
pub fn select_variant(tuple: &PlatformTuple, pref: &VariantPreference) -> Result<AssetVariant> {
    AssetVariant::select(tuple, pref).ok_or_else(|| InstallError::UnsupportedPlatform {
        os: tuple.os.name().to_string(),
        arch: tuple.arch.name().to_string(),
    })
}

/// Resolve a variant against the release catalog by filename suffix
/// match, applying the single defined fallback when the primary is
/// absent. First match wins; the catalog lists at most one asset per
/// filename.
pub fn resolve_asset(manifest: &ReleaseManifest, variant: AssetVariant) -> Result<SelectedAsset> {
    let filename = variant.filename();
    if let Some(asset) = manifest.find_by_suffix(&filename) {
        return Ok(SelectedAsset {
            variant,
            asset: asset.clone(),
        });
    }

    if let Some(fallback) = variant.fallback() {
        let fb_name = fallback.filename();
        tracing::warn!("'{filename}' not in release catalog; trying '{fb_name}'");
        if let Some(asset) = manifest.find_by_suffix(&fb_name) {
            return Ok(SelectedAsset {
                variant: fallback,
                asset: asset.clone(),
            });
        }
    }

    Err(InstallError::NoMatchingAsset {
        filename,
        tag: manifest.tag.clone(),
    })
}
