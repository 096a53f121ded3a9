//! create command - Register a new change for an existing commit

use anyhow::{bail, Context as _, Result};

use crate::change::RefChangeStore;
use crate::cli::Context;
use crate::core::types::RefName;
use crate::ui;

use super::open_env;

/// Register change `id` pointing at `commit`.
pub fn create(ctx: &Context, id: u64, commit: &str, branch: Option<&str>) -> Result<()> {
    let (git, cfg) = open_env(ctx)?;

    let Some(oid) = git.try_resolve_name(commit)? else {
        bail!("'{}' does not resolve to a commit", commit);
    };

    let dest_branch = match branch {
        Some(name) => RefName::new(name).context("Invalid destination branch")?,
        None => cfg.review_branch.clone(),
    };

    let store = RefChangeStore::new(&git);
    let change = store.create_change(id, dest_branch, &oid)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&change)?);
    } else {
        ui::print(
            format!(
                "created change {} on {} at {}",
                change.id,
                change.dest_branch,
                oid.short(12)
            ),
            ctx.verbosity,
        );
    }

    Ok(())
}
