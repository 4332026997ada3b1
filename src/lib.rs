//! remembrances-install - platform-aware installer for remembrances-mcp.
//!
//! The hard part of installing a native application with optional GPU
//! acceleration is not copying files, it is deciding which prebuilt
//! variant to fetch and whether this machine can actually run it. The
//! crate is organized around that decision engine:
//!
//! - [`platform`] - OS/architecture identification and gating
//! - [`capability`] - GPU, CUDA version, and SIMD probing
//! - [`selection`] - variant preference and asset filename resolution
//! - [`validation`] - post-install CUDA dependency validation
//! - [`remediation`] - supplemental CUDA runtime installation
//!
//! The surrounding I/O is deliberately thin:
//!
//! - [`manifest`] - release metadata fetching
//! - [`download`] - archive download and extraction
//! - [`appconfig`] - initial config generation
//! - [`shellenv`] - shell startup-file PATH/LD_LIBRARY_PATH setup
//! - [`installer`] - the sequential pipeline tying it all together
//! - [`cli`] - argument parsing and dispatch
//! - [`ui`] - prompts and terminal output
//! - [`error`] - error types and result alias
//!
//! # Example
//!
//! ```
//! use remembrances_install::platform::PlatformTuple;
//! use remembrances_install::selection::{AssetVariant, VariantPreference};
//!
//! let tuple = PlatformTuple::from_raw("Linux", "x86_64");
//! let pref = VariantPreference { want_nvidia: true, want_portable: true };
//! let variant = AssetVariant::select(&tuple, &pref).unwrap();
//! assert_eq!(
//!     variant.filename(),
//!     "remembrances-mcp-embedded-cuda-portable-linux-x86_64.zip"
//! );
//! ```

pub mod appconfig;
pub mod capability;
pub mod cli;
pub mod download;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod platform;
pub mod remediation;
pub mod selection;
pub mod shellenv;
pub mod ui;
pub mod validation;

pub use error::{InstallError, Result};
