//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug output
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// review-follow - keep review changes in sync with a moving target
#[derive(Parser, Debug)]
#[command(name = "review-follow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if review-follow was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a new change for an existing commit
    Create {
        /// Numeric change id
        id: u64,
        /// Commit or ref the first revision points at
        commit: String,
        /// Destination branch (defaults to the configured review branch)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Show a change and what an update would do
    Status {
        /// Numeric change id
        id: u64,
    },

    /// Synchronize a change's tree toward its review target
    Update {
        /// Numeric change id
        id: u64,
        /// Review target to use instead of the commit's trailer
        #[arg(long)]
        target: Option<String>,
        /// Filter rule lines to use instead of the commit's trailers
        /// (newline-separated)
        #[arg(long)]
        files: Option<String>,
        /// Report what would change without creating a revision
        #[arg(long)]
        dry_run: bool,
    },

    /// Bring the paths a change touched to a followed branch's state
    Follow {
        /// Numeric change id
        id: u64,
        /// Reference to follow instead of the configured follow branch
        #[arg(long)]
        reference: Option<String>,
        /// Report what would change without creating a revision
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether a change's tree matches its review-target policy
    Check {
        /// Numeric change id
        id: u64,
    },
}
