//! `<type> track <name>`: check out a branch published on the remote.

use color_print::cformat;

use crate::errors::FlowError;
use crate::git::Repository;
use crate::hooks::{HookAction, HookContext, Hooks};
use crate::styling::{println, success_message};

use super::{origin_name, require_initialized, validate_name};

pub fn handle_track(repo: &Repository, ty_name: &str, name: &str) -> anyhow::Result<()> {
    let registry = require_initialized(repo)?;
    let ty = registry.require(ty_name)?;
    validate_name(name)?;

    let full_branch = ty.full_branch(name);
    if repo.branch_exists(&full_branch)? {
        return Err(FlowError::BranchExists {
            branch: full_branch,
        }
        .into());
    }

    let origin = origin_name(repo)?;
    repo.fetch(&origin)
        .map_err(|e| FlowError::vcs(format!("fetch {origin}"), e))?;
    if !repo.remote_branch_exists(&origin, &full_branch)? {
        return Err(FlowError::RemoteBranchNotFound {
            remote: origin,
            branch: full_branch,
        }
        .into());
    }

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
    hooks.run_pre(HookAction::Track, &[name, &origin, &full_branch], &ctx)?;

    repo.checkout_new(&full_branch, &format!("{origin}/{full_branch}"))
        .map_err(|e| FlowError::vcs(format!("track {full_branch}"), e))?;

    hooks.run_post(HookAction::Track, &[name, &origin, &full_branch], &ctx, 0);

    println!(
        "{}",
        success_message(cformat!(
            "Tracking <bold>{full_branch}</> from <bold>{origin}</>"
        ))
    );
    Ok(())
}
