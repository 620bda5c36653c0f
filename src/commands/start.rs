//! `<type> start <name>`: create a branch of a type from its start point.

use color_print::cformat;

use crate::errors::FlowError;
use crate::git::Repository;
use crate::hooks::{HookAction, HookContext, Hooks};
use crate::styling::{hint_message, println, success_message};

use super::{origin_name, require_initialized, validate_name};

pub fn handle_start(
    repo: &Repository,
    ty_name: &str,
    name: &str,
    base: Option<&str>,
    fetch: bool,
) -> anyhow::Result<()> {
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
    if fetch {
        repo.fetch(&origin)
            .map_err(|e| FlowError::vcs(format!("fetch {origin}"), e))?;
    }

    // Explicit base beats the type's configured start point
    let base_branch = match base {
        Some(base) => base.to_string(),
        None => {
            let start = ty.start_point.as_deref().ok_or_else(|| {
                FlowError::invalid_input(format!(
                    "Branch type {:?} has no start point configured",
                    ty.name
                ))
            })?;
            registry.resolve_branch(start)
        }
    };
    if !repo.branch_exists(&base_branch)? {
        return Err(FlowError::BranchNotFound {
            branch: base_branch,
        }
        .into());
    }

    let hooks = Hooks::new(repo);
    // The version filter may rewrite the name-derived version before hooks
    // and branch creation see it
    let version = hooks.run_filter(
        HookAction::Start,
        "version",
        name,
        &[name],
        &HookContext {
            branch: &full_branch,
            branch_name: name,
            branch_type: &ty.name,
            base_branch: &base_branch,
            origin: &origin,
            version: None,
        },
    )?;
    let ctx = HookContext {
        branch: &full_branch,
        branch_name: name,
        branch_type: &ty.name,
        base_branch: &base_branch,
        origin: &origin,
        version: Some(&version),
    };

    hooks.run_pre(
        HookAction::Start,
        &[name, &origin, &full_branch, &base_branch],
        &ctx,
    )?;

    repo.checkout_new(&full_branch, &base_branch)
        .map_err(|e| FlowError::vcs(format!("create {full_branch}"), e))?;

    hooks.run_post(
        HookAction::Start,
        &[name, &origin, &full_branch, &base_branch],
        &ctx,
        0,
    );

    println!(
        "{}",
        success_message(cformat!(
            "Created branch <bold>{full_branch}</> from <bold>{base_branch}</>"
        ))
    );
    println!(
        "{}",
        hint_message(format!(
            "When done, finish it with 'git-flow {} finish {}'",
            ty.name, name
        ))
    );
    Ok(())
}
