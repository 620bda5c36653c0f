//! `<type> rebase <name>`: rebase a branch onto its parent.

use color_print::cformat;

use crate::errors::FlowError;
use crate::git::Repository;
use crate::styling::{println, success_message};

use super::{require_initialized, validate_name};

pub fn handle_rebase(
    repo: &Repository,
    ty_name: &str,
    name: &str,
    preserve_merges: bool,
) -> anyhow::Result<()> {
    let registry = require_initialized(repo)?;
    let ty = registry.require(ty_name)?;
    validate_name(name)?;

    let full_branch = ty.full_branch(name);
    if !repo.branch_exists(&full_branch)? {
        return Err(FlowError::BranchNotFound {
            branch: full_branch,
        }
        .into());
    }
    let parent_branch = registry.parent_branch(ty)?;

    repo.checkout(&full_branch)
        .map_err(|e| FlowError::vcs(format!("checkout {full_branch}"), e))?;
    repo.rebase(&parent_branch, preserve_merges).map_err(|e| {
        if e.is_conflict() {
            // Not a managed finish: git's own rebase machinery owns the
            // resume/abort here
            FlowError::MergeConflict {
                branch: full_branch.clone(),
                into: parent_branch.clone(),
                resume_command: "git rebase --continue".into(),
            }
            .into()
        } else {
            anyhow::Error::from(FlowError::vcs(
                format!("rebase {full_branch} onto {parent_branch}"),
                e,
            ))
        }
    })?;

    println!(
        "{}",
        success_message(cformat!(
            "Rebased <bold>{full_branch}</> onto <bold>{parent_branch}</>"
        ))
    );
    Ok(())
}
