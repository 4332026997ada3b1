//! Install orchestration.
//!
//! Strictly sequential pipeline: platform identification → capability
//! probing → preference resolution (overrides beat the interactive
//! answer, which beats the computed default) → asset selection →
//! download and extraction → file placement → config generation →
//! validation → optional remediation → shell environment setup.
//!
//! The platform tuple and capability profile are computed once and
//! passed by value; nothing downstream mutates them. Any fatal
//! condition aborts the run; already-copied files are not rolled back.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::appconfig;
use crate::capability::{self, CapabilityProfile};
use crate::download::{download, extract, find_file, find_shared_objects, verify_checksum};
use crate::error::{InstallError, Result};
use crate::manifest::{fetch_manifest, ReleaseManifest};
use crate::platform::{self, PlatformTuple};
use crate::remediation;
use crate::selection::{
    resolve_asset, select_variant, AssetVariant, Override, SelectedAsset, VariantPreference,
    APP_NAME,
};
use crate::shellenv::{self, EnvRequirements};
use crate::ui::Ui;
use crate::validation::{self, ValidationOutcome};

/// Filename of the CUDA-dependent native library inside the CUDA
/// variants, used as the validation target after install.
pub const CUDA_LIBRARY_NAME: &str = "libggml-cuda.so";

/// User-tunable knobs for a run, resolved by the CLI layer.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Force the CUDA or CPU variant.
    pub nvidia: Override,
    /// Force the portable or AVX-512 build.
    pub portable: Override,
    /// Install a specific release tag instead of the latest.
    pub tag: Option<String>,
    /// Destination for the binary (default: ~/.local/bin).
    pub install_dir: Option<PathBuf>,
    /// Skip CUDA runtime remediation even if validation fails.
    pub skip_cuda_setup: bool,
    /// Accept all prompts with their defaults.
    pub assume_yes: bool,
}

/// Everything a completed run changed or verified.
#[derive(Debug)]
pub struct InstallSummary {
    pub variant: AssetVariant,
    pub tag: String,
    pub binary_path: PathBuf,
    pub gpu_ready: Option<bool>,
}

pub struct Installer {
    ui: Ui,
    options: InstallOptions,
}

impl Installer {
    pub fn new(ui: Ui, options: InstallOptions) -> Self {
        Self { ui, options }
    }

    /// Run the full install pipeline.
    pub fn run(&self) -> Result<InstallSummary> {
        let tuple = platform::identify()?;
        self.ui.message(&format!("Platform: {tuple}"));

        let profile = capability::probe(&tuple);
        let pref = self.resolve_preference(&tuple, &profile)?;
        let variant = select_variant(&tuple, &pref)?;
        self.ui
            .message(&format!("Selected variant: {}", variant.describe()));

        let manifest = fetch_manifest(self.options.tag.as_deref())?;
        let selected = resolve_asset(&manifest, variant)?;
        self.ui.message(&format!(
            "Installing {} from release {}",
            selected.asset.name, manifest.tag
        ));
        self.ui
            .detail(&format!("Asset URL: {}", selected.asset.browser_download_url));

        let staging = TempDir::new()?;
        let extracted = self.fetch_and_extract(&selected, &manifest, staging.path())?;
        let (binary_path, lib_dir) = self.place_files(&extracted)?;

        let config_written = appconfig::write_config(
            &appconfig::config_path(),
            &binary_path,
            &data_dir(),
            selected.variant,
        )?;
        if config_written {
            self.ui
                .success(&format!("Config written to {}", appconfig::config_path().display()));
        }

        let mut env = EnvRequirements::default();
        if let Some(parent) = binary_path.parent() {
            env.bin_dir = Some(parent.to_path_buf());
        }

        let gpu_ready = if selected.variant.needs_cuda() {
            Some(self.validate_and_remediate(&selected.variant, &lib_dir, &manifest, &mut env)?)
        } else {
            None
        };

        if let Some(rc) = shellenv::apply(&env)? {
            self.ui.message(&format!(
                "Updated {}; restart your shell to pick up the changes",
                rc.display()
            ));
        }

        self.ui
            .success(&format!("{APP_NAME} {} installed", manifest.tag));
        if gpu_ready == Some(false) {
            self.ui
                .warning("GPU acceleration is not available; the server will run on CPU");
        }

        Ok(InstallSummary {
            variant: selected.variant,
            tag: manifest.tag,
            binary_path,
            gpu_ready,
        })
    }

    /// Finalize the variant preference: computed default, then the
    /// interactive answer, then explicit overrides, in ascending
    /// precedence.
    fn resolve_preference(
        &self,
        tuple: &PlatformTuple,
        profile: &CapabilityProfile,
    ) -> Result<VariantPreference> {
        let mut pref = VariantPreference::defaults_for(profile);
        if !tuple.wants_probing() {
            return Ok(pref);
        }

        let ask = self.ui.is_interactive() && !self.options.assume_yes;

        if ask && self.options.nvidia == Override::Unset && profile.has_nvidia_gpu {
            pref.want_nvidia = self
                .ui
                .confirm("NVIDIA GPU detected. Install the CUDA-accelerated build?", true)?;
        }
        if ask && self.options.portable == Override::Unset && pref.want_nvidia {
            let idx = self.ui.select(
                "Which CUDA build?",
                &[
                    "portable (works on any x86-64 CPU)",
                    "AVX-512 (faster, needs a recent CPU)",
                ],
                if pref.want_portable { 0 } else { 1 },
            )?;
            pref.want_portable = idx == 0;
        }

        Ok(pref.with_overrides(self.options.nvidia, self.options.portable))
    }

    /// Download, checksum, and extract the selected asset; returns the
    /// extraction root.
    fn fetch_and_extract(
        &self,
        selected: &SelectedAsset,
        manifest: &ReleaseManifest,
        staging: &Path,
    ) -> Result<PathBuf> {
        let archive = download(
            &selected.asset.browser_download_url,
            &selected.asset.name,
            staging,
        )?;
        verify_checksum(&archive, &selected.asset.name, manifest)?;

        let extracted = staging.join("extracted");
        extract(&archive, &extracted)?;
        Ok(extracted)
    }

    /// Copy the binary and any bundled shared objects out of the
    /// extracted tree. Returns (binary path, library directory).
    fn place_files(&self, extracted: &Path) -> Result<(PathBuf, PathBuf)> {
        let binary_src =
            find_file(extracted, APP_NAME).ok_or_else(|| InstallError::BinaryNotFound {
                binary: APP_NAME.to_string(),
            })?;

        let bin_dir = self
            .options
            .install_dir
            .clone()
            .unwrap_or_else(default_bin_dir);
        fs::create_dir_all(&bin_dir)?;
        let binary_path = bin_dir.join(APP_NAME);
        fs::copy(&binary_src, &binary_path)?;
        set_executable(&binary_path)?;
        self.ui
            .detail(&format!("Binary installed at {}", binary_path.display()));

        let lib_dir = data_dir().join("lib");
        let bundled = find_shared_objects(extracted);
        if !bundled.is_empty() {
            fs::create_dir_all(&lib_dir)?;
            for lib in &bundled {
                if let Some(name) = lib.file_name() {
                    fs::copy(lib, lib_dir.join(name))?;
                }
            }
            tracing::debug!("Copied {} bundled libraries", bundled.len());
        }

        Ok((binary_path, lib_dir))
    }

    /// Validate CUDA dependency resolution and remediate when needed.
    /// Returns whether GPU acceleration is expected to work.
    fn validate_and_remediate(
        &self,
        variant: &AssetVariant,
        lib_dir: &Path,
        manifest: &ReleaseManifest,
        env: &mut EnvRequirements,
    ) -> Result<bool> {
        debug_assert!(variant.needs_cuda());

        let cuda_lib = lib_dir.join(CUDA_LIBRARY_NAME);
        match validation::validate(&cuda_lib) {
            ValidationOutcome::Resolvable => {
                self.ui.success("CUDA runtime libraries resolved");
                Ok(true)
            }
            ValidationOutcome::Indeterminate => {
                self.ui
                    .warning("Could not verify CUDA runtime libraries; continuing");
                Ok(true)
            }
            ValidationOutcome::UnresolvableMissingLibs(missing) => {
                self.ui.warning(&format!(
                    "Missing CUDA runtime libraries: {}",
                    missing.join(", ")
                ));
                if self.options.skip_cuda_setup {
                    self.ui
                        .message("CUDA runtime setup skipped (--skip-cuda-setup)");
                    return Ok(false);
                }

                let plan = remediation::plan(manifest, &missing);
                match remediation::execute(&plan) {
                    Ok(report) if report.installed_libs > 0 => {
                        env.lib_dir = Some(report.lib_dir);
                        self.ui.success(&format!(
                            "Installed {} CUDA runtime libraries",
                            report.installed_libs
                        ));
                        Ok(true)
                    }
                    Ok(_) => Ok(false),
                    Err(e) => {
                        // Fatal for remediation only; the app install stands.
                        self.ui.error(&e.to_string());
                        Ok(false)
                    }
                }
            }
        }
    }
}

/// Run capability detection and report what would be installed, without
/// touching the network or writing anything. Probing still reads local
/// signals (nvidia-smi, ldconfig, /proc/cpuinfo).
pub fn detect_report(ui: &Ui, options: &InstallOptions) -> Result<()> {
    let tuple = platform::identify()?;
    ui.message(&format!("Platform: {tuple}"));

    let profile = capability::probe(&tuple);
    if tuple.wants_probing() {
        ui.message(&format!("NVIDIA GPU: {}", profile.has_nvidia_gpu));
        ui.message(&format!(
            "CUDA version: {}",
            profile
                .cuda_major
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown".into())
        ));
        ui.message(&format!("AVX2: {}", profile.has_avx2));
        ui.message(&format!("AVX-512: {}", profile.has_avx512));
    }

    let pref = VariantPreference::defaults_for(&profile)
        .with_overrides(options.nvidia, options.portable);
    let variant = select_variant(&tuple, &pref)?;
    ui.message(&format!("Would install: {}", variant.filename()));
    Ok(())
}

/// Re-validate an existing install's CUDA dependencies.
pub fn validate_report(ui: &Ui) -> Result<()> {
    let cuda_lib = data_dir().join("lib").join(CUDA_LIBRARY_NAME);
    match validation::validate(&cuda_lib) {
        ValidationOutcome::Resolvable => {
            ui.success("CUDA runtime libraries resolved");
            Ok(())
        }
        ValidationOutcome::Indeterminate => {
            ui.warning("Could not determine CUDA library resolution");
            Ok(())
        }
        ValidationOutcome::UnresolvableMissingLibs(missing) => {
            ui.error(&format!("Missing: {}", missing.join(", ")));
            Err(InstallError::RemediationFailed {
                message: format!(
                    "missing CUDA runtime libraries: {}; re-run 'remembrances-install install'",
                    missing.join(", ")
                ),
            })
        }
    }
}

/// Default binary destination (~/.local/bin, or the platform's
/// executable dir when it defines one).
pub fn default_bin_dir() -> PathBuf {
    dirs::executable_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("bin")
    })
}

/// Application data directory.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
