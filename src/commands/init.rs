//! `init`: write the gitflow configuration into the repository and make
//! sure the trunk branches exist.

use color_print::cformat;

use crate::branch_type::{Registry, is_initialized};
use crate::errors::FlowError;
use crate::git::Repository;
use crate::styling::{println, success_message};

pub fn handle_init(repo: &Repository, force: bool, defaults: bool) -> anyhow::Result<()> {
    if is_initialized(repo)? && !force {
        return Err(FlowError::AlreadyInitialized.into());
    }

    // The production branch keeps its existing name when the repository
    // already uses `master`
    let main_branch = if !repo.branch_exists("main")? && repo.branch_exists("master")? {
        "master".to_string()
    } else {
        "main".to_string()
    };
    if !repo.branch_exists(&main_branch)? {
        return Err(FlowError::BranchNotFound {
            branch: main_branch,
        }
        .into());
    }

    repo.config_set("gitflow.branch.main", &main_branch)?;
    repo.config_set("gitflow.branch.develop", "develop")?;

    if defaults {
        clear_policy_overrides(repo)?;
    }
    for ty in Registry::builtin().iter() {
        if ty.prefix.is_empty() {
            continue;
        }
        let key = format!("gitflow.prefix.{}", ty.name);
        // A stored prefix survives a plain re-init; --defaults cleared it
        if repo.config_get(&key)?.is_none() {
            repo.config_set(&key, &ty.prefix)?;
        }
    }
    if repo.config_get("gitflow.prefix.versiontag")?.is_none() {
        repo.config_set("gitflow.prefix.versiontag", "v")?;
    }

    if !repo.branch_exists("develop")? {
        repo.create_branch("develop", &main_branch)
            .map_err(|e| FlowError::vcs("create develop", e))?;
        println!(
            "{}",
            success_message(cformat!(
                "Created branch <bold>develop</> from <bold>{main_branch}</>"
            ))
        );
    }

    // Loading validates the resulting configuration end to end
    Registry::load(repo)?;

    println!(
        "{}",
        success_message(cformat!(
            "Initialized gitflow (production: <bold>{main_branch}</>, integration: <bold>develop</>)"
        ))
    );
    Ok(())
}

/// Remove every stored branch-type policy override so the built-in
/// defaults apply cleanly: `gitflow.prefix.*` plus the per-type attribute
/// keys (`gitflow.<type>.<attr>`). Deeper per-action option keys and the
/// trunk branch names are left alone.
fn clear_policy_overrides(repo: &Repository) -> anyhow::Result<()> {
    for (key, _) in repo.config_entries("gitflow.")? {
        let segments: Vec<&str> = key.split('.').collect();
        let [_, middle, _] = segments[..] else {
            continue;
        };
        if middle == "prefix" {
            repo.config_unset(&key)?;
            continue;
        }
        if matches!(middle, "branch" | "path") {
            continue;
        }
        repo.config_unset(&key)?;
    }
    Ok(())
}
