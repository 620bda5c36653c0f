//! `<type> delete <name>`: delete a branch of a type, locally and
//! optionally on the remote.

use color_print::cformat;

use crate::errors::FlowError;
use crate::git::Repository;
use crate::hooks::{HookAction, HookContext, Hooks};
use crate::styling::{info_message, println, success_message};

use super::{origin_name, require_initialized, validate_name};

pub fn handle_delete(
    repo: &Repository,
    ty_name: &str,
    name: &str,
    force: bool,
    remote: bool,
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

    // Trunk branches anchor the topology; deleting one strands every type
    // below it
    for trunk in registry.iter() {
        if registry.branch_for(&trunk.name).as_deref() != Some(full_branch.as_str()) {
            continue;
        }
        let dependents: Vec<String> = registry
            .children(&trunk.name)
            .iter()
            .map(|t| t.name.clone())
            .collect();
        if !dependents.is_empty() {
            return Err(FlowError::HasDependents {
                branch: full_branch,
                dependents,
            }
            .into());
        }
    }

    if repo.current_branch()?.as_deref() == Some(full_branch.as_str()) {
        // Move off the branch before deleting it
        let parent_branch = registry.parent_branch(ty)?;
        repo.checkout(&parent_branch)
            .map_err(|e| FlowError::vcs(format!("checkout {parent_branch}"), e))?;
    }

    let origin = origin_name(repo)?;
    let base_branch = registry.parent_branch(ty).unwrap_or_default();
    let hooks = Hooks::new(repo);
    let ctx = HookContext {
        branch: &full_branch,
        branch_name: name,
        branch_type: &ty.name,
        base_branch: &base_branch,
        origin: &origin,
        version: None,
    };
    hooks.run_pre(HookAction::Delete, &[name, &origin, &full_branch], &ctx)?;

    let deleted = repo
        .delete_branch(&full_branch, force)
        .map_err(|e| FlowError::vcs(format!("delete {full_branch}"), e))?;
    if remote && repo.remote_branch_exists(&origin, &full_branch)? {
        repo.push_delete(&origin, &full_branch)
            .map_err(|e| FlowError::vcs(format!("delete {full_branch} on {origin}"), e))?;
    }

    hooks.run_post(HookAction::Delete, &[name, &origin, &full_branch], &ctx, 0);

    if deleted {
        println!(
            "{}",
            success_message(cformat!("Deleted branch <bold>{full_branch}</>"))
        );
    } else {
        println!(
            "{}",
            info_message(cformat!("Branch <bold>{full_branch}</> was already gone"))
        );
    }
    Ok(())
}
