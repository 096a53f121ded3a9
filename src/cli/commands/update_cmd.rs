//! update command - Synchronize a change's tree toward its review target

use anyhow::Result;

use crate::change::{ChangeStore, RefChangeStore};
use crate::cli::Context;
use crate::ui;
use crate::ui::output::format_paths;
use crate::update::{FollowOutcome, UpdateRequest, Updater};

use super::open_env;

/// Run the review-target update for change `id`.
pub fn update(
    ctx: &Context,
    id: u64,
    target: Option<String>,
    files: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let (git, cfg) = open_env(ctx)?;
    let store = RefChangeStore::new(&git);
    let change = store.load(id)?;

    let req = UpdateRequest {
        do_update: !dry_run,
        new_review_target: target,
        new_review_files: files,
    };

    let updater = Updater::new(&git, &store, &cfg);
    let outcome = updater.run_update(&change, &req)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    report(ctx, &outcome, dry_run);

    Ok(())
}

fn report(ctx: &Context, outcome: &FollowOutcome, dry_run: bool) {
    if !outcome.on_review_branch {
        ui::print("change is not on the review branch, nothing to do", ctx.verbosity);
        return;
    }
    if !outcome.valid_review_target {
        ui::print("no valid review target, nothing to do", ctx.verbosity);
        return;
    }

    if let Some(label) = &outcome.target_label {
        ui::print(format!("review target version: {label}"), ctx.verbosity);
    }
    if outcome.rebased {
        ui::print("parent advanced, rebasing onto new base", ctx.verbosity);
    }

    let mut listing = String::new();
    listing.push_str(&format_paths("A", &outcome.added_paths));
    listing.push_str(&format_paths("M", &outcome.updated_paths));
    listing.push_str(&format_paths("D", &outcome.removed_paths));
    if !listing.is_empty() {
        ui::print(listing.trim_end_matches('\n'), ctx.verbosity);
    }

    match outcome.new_revision {
        Some(number) => ui::print(format!("created revision {number}"), ctx.verbosity),
        None if dry_run => ui::print("dry run, no revision created", ctx.verbosity),
        None => ui::print("already up to date", ctx.verbosity),
    }
}
