//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the orchestrator or change store
//! 3. Formats and displays output
//!
//! Handlers do NOT perform repository mutations directly.

mod check;
mod create;
mod follow;
mod status;
mod update_cmd;

pub use check::check;
pub use create::create;
pub use follow::follow;
pub use status::status;
pub use update_cmd::update;

use anyhow::{Context as _, Result};

use crate::cli::args::Command;
use crate::cli::Context;
use crate::core::config::Configuration;
use crate::git::Git;
use crate::ui;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Create { id, commit, branch } => create(ctx, id, &commit, branch.as_deref()),
        Command::Status { id } => status(ctx, id),
        Command::Update {
            id,
            target,
            files,
            dry_run,
        } => update(ctx, id, target, files, dry_run),
        Command::Follow {
            id,
            reference,
            dry_run,
        } => follow(ctx, id, reference, dry_run),
        Command::Check { id } => check(ctx, id),
    }
}

/// Open the repository and load configuration for a command.
pub(crate) fn open_env(ctx: &Context) -> Result<(Git, Configuration)> {
    let cwd = match &ctx.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let git = Git::open(&cwd).context("Failed to open repository")?;
    let cfg = Configuration::load(Some(git.git_dir())).context("Failed to load configuration")?;
    ui::debug(
        format!("repository: {}", git.git_dir().display()),
        ctx.verbosity,
    );
    Ok((git, cfg))
}
