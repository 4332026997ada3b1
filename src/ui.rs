//! Terminal output and interactive prompts.
//!
//! Prompts fall back to their defaults when stdin is not a terminal or a
//! CI environment is detected, so the installer always completes
//! unattended with the computed choice.

use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};

use crate::error::{InstallError, Result};

/// Output verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Terminal output helper.
#[derive(Debug, Clone, Copy)]
pub struct Ui {
    mode: OutputMode,
    interactive: bool,
}

impl Ui {
    pub fn new(mode: OutputMode, interactive: bool) -> Self {
        Self { mode, interactive }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn message(&self, msg: &str) {
        if self.mode != OutputMode::Quiet {
            println!("{msg}");
        }
    }

    /// Extra detail shown only in verbose mode.
    pub fn detail(&self, msg: &str) {
        if self.mode == OutputMode::Verbose {
            println!("{}", style(msg).dim());
        }
    }

    pub fn success(&self, msg: &str) {
        if self.mode != OutputMode::Quiet {
            println!("{} {msg}", style("✓").green());
        }
    }

    pub fn warning(&self, msg: &str) {
        if self.mode != OutputMode::Quiet {
            eprintln!("{} {msg}", style("!").yellow());
        }
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{} {msg}", style("✗").red());
    }

    /// Yes/no confirmation. Returns `default` without pausing when not
    /// interactive.
    pub fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        if !self.interactive {
            tracing::debug!("Non-interactive: '{question}' defaults to {default}");
            return Ok(default);
        }

        Confirm::with_theme(&prompt_theme())
            .with_prompt(question)
            .default(default)
            .interact_on(&Term::stderr())
            .map_err(map_dialoguer_err)
    }

    /// Select one of `options`. Returns `default_idx` without pausing
    /// when not interactive.
    pub fn select(&self, question: &str, options: &[&str], default_idx: usize) -> Result<usize> {
        if !self.interactive {
            tracing::debug!(
                "Non-interactive: '{question}' defaults to '{}'",
                options.get(default_idx).unwrap_or(&"")
            );
            return Ok(default_idx);
        }

        Select::with_theme(&prompt_theme())
            .with_prompt(question)
            .items(options)
            .default(default_idx)
            .interact_on(&Term::stderr())
            .map_err(map_dialoguer_err)
    }
}

/// Convert dialoguer errors to InstallError.
fn map_dialoguer_err(e: dialoguer::Error) -> InstallError {
    InstallError::Io(e.into())
}

/// Dialoguer theme without the default yellow `?` prefix.
fn prompt_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("".to_string()),
        ..ColorfulTheme::default()
    }
}

/// Check if running in a CI environment. Used to force non-interactive
/// mode so prompts resolve to defaults.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("CIRCLECI").is_ok()
        || std::env::var("JENKINS_URL").is_ok()
}

/// Whether an interactive terminal is attached to stdin.
pub fn stdin_is_terminal() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}
