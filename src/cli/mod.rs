//! Command-line interface.
//!
//! Three subcommands cover the pipeline:
//!
//! - `render` composes templates into targets and materializes the result
//!   as a directory or tar(.gz) archive,
//! - `diff` is a read-only three-way comparison of an artifact against a
//!   live directory,
//! - `apply` reconciles a destination directory with an artifact, refusing
//!   to clobber manual drift unless forced.
//!
//! Global logging flags are backed by `GOK_`-prefixed environment
//! variables, so `GOK_LOG_LEVEL=debug gok render ...` and
//! `gok render --log-level debug ...` are equivalent.

mod apply;
mod diff;
mod render;

pub use apply::ApplyCommand;
pub use diff::DiffCommand;
pub use render::RenderCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::core::Cancellation;
use crate::logging::LogOptions;

/// Layered configuration renderer.
#[derive(Debug, Parser)]
#[command(
    name = "gok",
    version,
    about = "Render layered configuration templates, diff against live state, apply safely"
)]
pub struct Cli {
    /// Log level: trace, debug, info, warn, error.
    #[arg(long, global = true, env = "GOK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format: console or json.
    #[arg(long, global = true, env = "GOK_LOG_FORMAT", default_value = "console")]
    pub log_format: String,

    /// Disable colored log output.
    #[arg(long, global = true, env = "GOK_LOG_NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render targets from a manifest into a directory or archive.
    Render(RenderCommand),
    /// Compare a rendered artifact with a live directory (read-only).
    Diff(DiffCommand),
    /// Apply a rendered artifact to a destination directory.
    Apply(ApplyCommand),
}

impl Cli {
    /// The logging configuration carried by the global flags.
    #[must_use]
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            level: self.log_level.clone(),
            format: self.log_format.clone(),
            no_color: self.no_color,
        }
    }

    /// Execute the selected subcommand.
    pub async fn execute(self, cancel: &Cancellation) -> Result<()> {
        match self.command {
            Commands::Render(cmd) => cmd.execute(cancel).await,
            Commands::Diff(cmd) => cmd.execute(cancel).await,
            Commands::Apply(cmd) => cmd.execute(cancel).await,
        }
    }
}
