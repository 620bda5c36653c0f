//! Command handlers, one per CLI verb.

mod config;
mod delete;
mod finish;
mod init;
mod list;
mod publish;
mod rebase;
mod start;
mod track;
mod update;

pub use config::{ConfigAction, handle_config};
pub use delete::handle_delete;
pub use finish::{FinishOptions, handle_finish};
pub use init::handle_init;
pub use list::handle_list;
pub use publish::handle_publish;
pub use rebase::handle_rebase;
pub use start::handle_start;
pub use track::handle_track;
pub use update::handle_update;

use crate::branch_type::{self, Registry};
use crate::errors::FlowError;
use crate::git::Repository;

/// The remote every publish/track/push operation targets.
///
/// Stored under `gitflow.origin`; defaults to `origin`.
pub fn origin_name(repo: &Repository) -> anyhow::Result<String> {
    Ok(repo
        .config_get("gitflow.origin")?
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "origin".to_string()))
}

/// Load the branch-type registry, failing if the repository has not been
/// initialized.
pub fn require_initialized(repo: &Repository) -> anyhow::Result<Registry> {
    if !branch_type::is_initialized(repo)? {
        return Err(FlowError::NotInitialized.into());
    }
    Ok(Registry::load(repo)?)
}

/// Validate a user-supplied short branch name.
///
/// Rejects empty names and characters git refuses in ref names. The check
/// mirrors `git check-ref-format` closely enough for early feedback; git
/// itself remains the final arbiter.
pub fn validate_name(name: &str) -> Result<(), FlowError> {
    if name.is_empty() {
        return Err(FlowError::EmptyName);
    }
    let invalid = name.starts_with('-')
        || name.starts_with('/')
        || name.ends_with('/')
        || name.ends_with('.')
        || name.ends_with(".lock")
        || name.contains("..")
        || name.contains("@{")
        || name.contains("//")
        || name
            .chars()
            .any(|c| c.is_control() || " ~^:?*[\\".contains(c));
    if invalid {
        return Err(FlowError::InvalidName { name: name.into() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_accepts_typical_names() {
        for name in ["login", "1.0.0", "fix-crash", "nested/topic", "a_b"] {
            validate_name(name).unwrap_or_else(|_| panic!("{name} should be valid"));
        }
    }

    #[test]
    fn test_validate_name_rejects_empty() {
        assert!(matches!(validate_name(""), Err(FlowError::EmptyName)));
    }

    #[test]
    fn test_validate_name_rejects_bad_characters() {
        for name in [
            "has space",
            "a..b",
            "tilde~1",
            "caret^2",
            "colon:x",
            "quest?",
            "star*",
            "brack[et",
            "back\\slash",
            "-leading-dash",
            "trailing/",
            "/leading",
            "dot.",
            "x.lock",
            "at@{brace",
            "double//slash",
        ] {
            assert!(
                matches!(validate_name(name), Err(FlowError::InvalidName { .. })),
                "{name} should be invalid"
            );
        }
    }
}
