//! status command - Show a change and what an update would do

use anyhow::Result;
use serde::Serialize;

use crate::change::{Change, ChangeStore, RefChangeStore};
use crate::cli::Context;
use crate::ui;
use crate::update::{FollowOutcome, UpdateRequest, Updater};

use super::open_env;

#[derive(Serialize)]
struct StatusReport {
    change: Change,
    revisions: Vec<(u32, String)>,
    matches_review_target: bool,
    outcome: FollowOutcome,
}

/// Show change `id`: its revisions and a dry-run update report.
pub fn status(ctx: &Context, id: u64) -> Result<()> {
    let (git, cfg) = open_env(ctx)?;
    let store = RefChangeStore::new(&git);
    let change = store.load(id)?;

    let revisions: Vec<(u32, String)> = store
        .revisions(&change)?
        .into_iter()
        .map(|(n, oid)| (n, oid.short(12).to_string()))
        .collect();

    let updater = Updater::new(&git, &store, &cfg);
    let outcome = updater.run_update(&change, &UpdateRequest::default())?;
    let matches = updater.check_review_target(&change);

    if ctx.json {
        let report = StatusReport {
            change,
            revisions,
            matches_review_target: matches,
            outcome,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    ui::print(
        format!("change {} ({:?}) -> {}", change.id, change.status, change.dest_branch),
        ctx.verbosity,
    );
    for (number, oid) in &revisions {
        ui::print(format!("  revision {number}: {oid}"), ctx.verbosity);
    }

    if !outcome.on_review_branch {
        ui::print("not on the review branch, updates do not apply", ctx.verbosity);
        return Ok(());
    }
    match (&outcome.review_target, outcome.valid_review_target) {
        (Some(target), true) => {
            ui::print(format!("review target: {target}"), ctx.verbosity);
            if let Some(label) = &outcome.target_label {
                ui::print(format!("target version: {label}"), ctx.verbosity);
            }
            if let Some(label) = &outcome.follow_label {
                ui::print(format!("follow version: {label}"), ctx.verbosity);
            }
            ui::print(
                format!("tree matches review target: {matches}"),
                ctx.verbosity,
            );
        }
        (Some(target), false) => {
            ui::print(
                format!("review target '{target}' does not resolve"),
                ctx.verbosity,
            );
        }
        (None, _) => {
            ui::print("no valid review-target trailer", ctx.verbosity);
        }
    }

    Ok(())
}
