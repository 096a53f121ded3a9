//! follow command - Bring a change's touched paths to a followed branch

use anyhow::Result;

use crate::change::{ChangeStore, RefChangeStore};
use crate::cli::Context;
use crate::ui;
use crate::ui::output::format_paths;
use crate::update::{FollowRequest, Updater};

use super::open_env;

/// Follow the configured branch (or `reference`) for change `id`.
pub fn follow(ctx: &Context, id: u64, reference: Option<String>, dry_run: bool) -> Result<()> {
    let (git, cfg) = open_env(ctx)?;
    let store = RefChangeStore::new(&git);
    let change = store.load(id)?;

    let req = FollowRequest {
        do_update: !dry_run,
        reference,
    };

    let updater = Updater::new(&git, &store, &cfg);
    let outcome = updater.run_follow(&change, &req)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if !outcome.on_review_branch {
        ui::print("change is not on the review branch, nothing to do", ctx.verbosity);
        return Ok(());
    }
    if !outcome.valid_review_target {
        ui::warn("followed reference does not resolve, nothing to do", ctx.verbosity);
        return Ok(());
    }

    if let Some(label) = &outcome.follow_label {
        ui::print(format!("follow version: {label}"), ctx.verbosity);
    }
    let listing = format_paths("M", &outcome.changed_paths);
    if !listing.is_empty() {
        ui::print(listing.trim_end_matches('\n'), ctx.verbosity);
    }

    match outcome.new_revision {
        Some(number) => ui::print(format!("created revision {number}"), ctx.verbosity),
        None if !outcome.can_update => ui::print("already up to date", ctx.verbosity),
        None => ui::print("dry run, no revision created", ctx.verbosity),
    }

    Ok(())
}
