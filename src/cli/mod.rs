//! Command-line interface for subwrap
//!
//! The CLI is a thin orchestrator around the [`Resolver`]: it parses
//! arguments, initializes logging, runs a single resolution, and prints the
//! resolved directory name. The build system embedding this crate calls
//! [`Resolver::resolve`] directly instead.
//!
//! # Usage
//!
//! ```bash
//! # Resolve one subproject, downloading it if required
//! subwrap resolve zlib
//!
//! # Resolve against a non-default subprojects directory
//! subwrap resolve zlib --subprojects third_party
//!
//! # Forbid wrap-based downloads (git submodules still initialize)
//! subwrap resolve zlib --wrap-mode nodownload
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use crate::core::WrapMode;
use crate::resolver::Resolver;

/// Top-level CLI definition.
#[derive(Parser)]
#[command(
    name = "subwrap",
    about = "Resolve and acquire external subproject sources",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (equivalent to RUST_LOG=debug).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress everything but errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a named subproject into a build-ready source tree.
    Resolve(ResolveCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();
        match self.command {
            Commands::Resolve(cmd) => cmd.execute().await,
        }
    }

    fn init_logging(&self) {
        let default_level = if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));
        // Ignore the error if a subscriber is already installed (tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}

/// Arguments for `subwrap resolve`.
#[derive(Args)]
pub struct ResolveCommand {
    /// Name of the dependency to resolve (looks up <name>.wrap).
    name: String,

    /// Subprojects root directory.
    #[arg(long, default_value = "subprojects")]
    subprojects: PathBuf,

    /// Download-permission mode: default, nofallback, or nodownload.
    #[arg(long, default_value = "default", value_parser = WrapMode::from_str)]
    wrap_mode: WrapMode,
}

impl ResolveCommand {
    /// Run one resolution and print the resolved directory name.
    pub async fn execute(self) -> Result<()> {
        let resolver = Resolver::new(&self.subprojects, self.wrap_mode);
        let directory = resolver.resolve(&self.name).await?;
        println!("{directory}");
        Ok(())
    }
}
