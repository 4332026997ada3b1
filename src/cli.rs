//! Command-line interface and dispatch.
//!
//! Defines all CLI arguments with clap's derive macros and maps the
//! parsed values onto [`InstallOptions`]. Variant overrides are
//! tri-state: a pair of conflicting flags, with an environment variable
//! consulted when neither flag is given.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::error::Result;
use crate::installer::{detect_report, validate_report, InstallOptions, Installer};
use crate::selection::Override;
use crate::ui::{is_ci, stdin_is_terminal, OutputMode, Ui};

/// Installer for the remembrances-mcp server.
#[derive(Debug, Parser)]
#[command(name = "remembrances-install")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Never prompt; use computed defaults and overrides
    #[arg(long, global = true)]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download and install remembrances-mcp (default)
    Install(InstallArgs),

    /// Show the detected platform, capabilities, and chosen asset
    Detect(DetectArgs),

    /// Re-check CUDA runtime dependencies of an existing install
    Validate,
}

/// Variant override flags shared by install and detect.
#[derive(Debug, Clone, Default, Args)]
pub struct VariantArgs {
    /// Force the CUDA-accelerated build
    #[arg(long, conflicts_with = "cpu")]
    pub gpu: bool,

    /// Force the CPU build
    #[arg(long, conflicts_with = "gpu")]
    pub cpu: bool,

    /// Force the portable (broad-compatibility) build
    #[arg(long, conflicts_with = "no_portable")]
    pub portable: bool,

    /// Force the AVX-512 build
    #[arg(long, conflicts_with = "portable")]
    pub no_portable: bool,
}

impl VariantArgs {
    /// Resolve the NVIDIA override: flags beat the environment.
    pub fn nvidia_override(&self, env_variant: Option<&str>) -> Override {
        let from_flags = Override::from_flags(self.gpu, self.cpu);
        if from_flags != Override::Unset {
            return from_flags;
        }
        match env_variant.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("cuda") => Override::Yes,
            Some(v) if v.eq_ignore_ascii_case("cpu") => Override::No,
            Some(other) if !other.is_empty() => {
                tracing::warn!("Ignoring unknown REMEMBRANCES_VARIANT value '{other}'");
                Override::Unset
            }
            _ => Override::Unset,
        }
    }

    /// Resolve the portability override: flags beat the environment.
    pub fn portable_override(&self, env_portable: Option<&str>) -> Override {
        let from_flags = Override::from_flags(self.portable, self.no_portable);
        if from_flags != Override::Unset {
            return from_flags;
        }
        match env_portable.map(str::trim) {
            Some("1") | Some("true") | Some("yes") => Override::Yes,
            Some("0") | Some("false") | Some("no") => Override::No,
            _ => Override::Unset,
        }
    }
}

/// Arguments for the `install` command.
#[derive(Debug, Clone, Default, Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub variant: VariantArgs,

    /// Install a specific release tag instead of the latest
    #[arg(long)]
    pub tag: Option<String>,

    /// Directory to install the binary into
    #[arg(long)]
    pub install_dir: Option<PathBuf>,

    /// Skip CUDA runtime remediation
    #[arg(long)]
    pub skip_cuda_setup: bool,

    /// Accept all prompts with their defaults
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the `detect` command.
#[derive(Debug, Clone, Default, Args)]
pub struct DetectArgs {
    #[command(flatten)]
    pub variant: VariantArgs,
}

impl InstallArgs {
    pub fn to_options(&self) -> InstallOptions {
        InstallOptions {
            nvidia: self
                .variant
                .nvidia_override(std::env::var("REMEMBRANCES_VARIANT").ok().as_deref()),
            portable: self
                .variant
                .portable_override(std::env::var("REMEMBRANCES_PORTABLE").ok().as_deref()),
            tag: self.tag.clone(),
            install_dir: self.install_dir.clone(),
            skip_cuda_setup: self.skip_cuda_setup,
            assume_yes: self.yes,
        }
    }
}

/// Map the verbosity flags onto an output mode; quiet wins.
pub fn output_mode(quiet: bool, verbose: bool) -> OutputMode {
    if quiet {
        OutputMode::Quiet
    } else if verbose {
        OutputMode::Verbose
    } else {
        OutputMode::Normal
    }
}

/// Dispatch the parsed CLI.
pub fn run(cli: Cli) -> Result<()> {
    let mode = output_mode(cli.quiet, cli.verbose);
    let interactive = !cli.non_interactive && !is_ci() && stdin_is_terminal();
    let ui = Ui::new(mode, interactive);

    match cli.command.unwrap_or(Commands::Install(InstallArgs::default())) {
        Commands::Install(args) => {
            let installer = Installer::new(ui, args.to_options());
            installer.run().map(|_| ())
        }
        Commands::Detect(args) => {
            let options = InstallOptions {
                nvidia: args
                    .variant
                    .nvidia_override(std::env::var("REMEMBRANCES_VARIANT").ok().as_deref()),
                portable: args
                    .variant
                    .portable_override(std::env::var("REMEMBRANCES_PORTABLE").ok().as_deref()),
                ..Default::default()
            };
            detect_report(&ui, &options)
        }
        Commands::Validate => validate_report(&ui),
    }
}
