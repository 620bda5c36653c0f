//! `update [<name>]`: bring a branch up to date with its parent.
//!
//! The operand is a full branch name (defaults to the current branch); its
//! type is derived from the registry, and the parent is integrated into it
//! with the strategy of the parent→branch edge.

use color_print::cformat;

use crate::errors::FlowError;
use crate::git::{MergeRequest, Repository};
use crate::branch_type::Strategy;
use crate::hooks::{HookAction, HookContext, Hooks};
use crate::styling::{println, success_message};

use super::{origin_name, require_initialized};

pub fn handle_update(repo: &Repository, name: Option<&str>) -> anyhow::Result<()> {
    let registry = require_initialized(repo)?;

    let full_branch = match name {
        Some(name) => name.to_string(),
        None => repo
            .current_branch()?
            .ok_or_else(|| FlowError::invalid_input("Not on a branch (detached HEAD)"))?,
    };
    if !repo.branch_exists(&full_branch)? {
        return Err(FlowError::BranchNotFound {
            branch: full_branch,
        }
        .into());
    }

    let ty = registry
        .type_of_branch(&full_branch)
        .ok_or_else(|| {
            FlowError::invalid_input(format!(
                "Branch {full_branch:?} does not belong to any configured branch type"
            ))
        })?;
    let parent_branch = registry.parent_branch(ty)?;
    if !repo.branch_exists(&parent_branch)? {
        return Err(FlowError::BranchNotFound {
            branch: parent_branch,
        }
        .into());
    }

    let parent_ty = ty
        .parent
        .as_deref()
        .and_then(|p| registry.get(p))
        .unwrap_or(ty);
    let strategy = registry.edge_strategy(parent_ty, ty);

    let origin = origin_name(repo)?;
    let short = ty.short_name(&full_branch);
    let hooks = Hooks::new(repo);
    let ctx = HookContext {
        branch: &full_branch,
        branch_name: short,
        branch_type: &ty.name,
        base_branch: &parent_branch,
        origin: &origin,
        version: None,
    };
    hooks.run_pre(
        HookAction::Update,
        &[short, &origin, &full_branch, &parent_branch],
        &ctx,
    )?;

    repo.checkout(&full_branch)
        .map_err(|e| FlowError::vcs(format!("checkout {full_branch}"), e))?;
    let result = match strategy {
        Strategy::Merge => repo.merge(
            &parent_branch,
            MergeRequest {
                no_ff: false,
                message: None,
            },
        ),
        Strategy::Rebase => repo.rebase(&parent_branch, false),
        Strategy::Squash => repo
            .merge_squash(&parent_branch)
            .and_then(|()| repo.commit(&format!("Squashed update from branch '{parent_branch}'"))),
    };
    result.map_err(|e| -> anyhow::Error {
        if e.is_conflict() {
            FlowError::MergeConflict {
                branch: parent_branch.clone(),
                into: full_branch.clone(),
                resume_command: match strategy {
                    Strategy::Rebase => "git rebase --continue".into(),
                    _ => "git commit".into(),
                },
            }
            .into()
        } else {
            FlowError::vcs(format!("update {full_branch}"), e).into()
        }
    })?;

    hooks.run_post(
        HookAction::Update,
        &[short, &origin, &full_branch, &parent_branch],
        &ctx,
        0,
    );

    println!(
        "{}",
        success_message(cformat!(
            "Updated <bold>{full_branch}</> from <bold>{parent_branch}</> ({strategy})"
        ))
    );
    Ok(())
}
