//! check command - Check whether a change matches its review-target policy

use anyhow::Result;

use crate::change::{ChangeStore, RefChangeStore};
use crate::cli::Context;
use crate::ui;
use crate::update::Updater;

use super::open_env;

/// Report whether change `id`'s current tree matches its policy.
pub fn check(ctx: &Context, id: u64) -> Result<()> {
    let (git, cfg) = open_env(ctx)?;
    let store = RefChangeStore::new(&git);
    let change = store.load(id)?;

    let updater = Updater::new(&git, &store, &cfg);
    let matches = updater.check_review_target(&change);

    if ctx.json {
        println!("{}", serde_json::json!({ "matches_review_target": matches }));
    } else if matches {
        ui::print("tree matches the review-target policy", ctx.verbosity);
    } else {
        ui::print("tree does not match the review-target policy", ctx.verbosity);
    }

    Ok(())
}
