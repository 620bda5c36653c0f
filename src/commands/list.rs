//! `<type> list`: show the branches of a type.

use color_print::cformat;

use crate::git::Repository;
use crate::styling::{hint_message, println};

use super::require_initialized;

pub fn handle_list(repo: &Repository, ty_name: &str, verbose: bool) -> anyhow::Result<()> {
    let registry = require_initialized(repo)?;
    let ty = registry.require(ty_name)?;

    let current = repo.current_branch()?;
    let branches: Vec<String> = repo
        .local_branches()?
        .into_iter()
        .filter(|branch| {
            ty.owns(branch)
                && registry
                    .type_of_branch(branch)
                    .is_some_and(|owner| owner.name == ty.name)
        })
        .collect();

    if branches.is_empty() {
        println!(
            "{}",
            hint_message(format!(
                "No {} branches exist; start one with 'git-flow {} start <name>'",
                ty.name, ty.name
            ))
        );
        return Ok(());
    }

    let parent_branch = registry.parent_branch(ty).ok();
    for branch in branches {
        let marker = if current.as_deref() == Some(branch.as_str()) {
            "*"
        } else {
            " "
        };
        let short = ty.short_name(&branch);
        if verbose && let Some(parent) = parent_branch.as_deref() {
            let comparison = repo.compare(&branch, parent)?;
            println!("{marker} {}", cformat!("<bold>{short}</> ({comparison})"));
        } else {
            println!("{marker} {short}");
        }
    }
    Ok(())
}
