//! The option resolver: three precedence layers folded into one effective
//! finish profile.
//!
//! For each option, later layers override earlier ones:
//!
//! 1. the branch-type default from the registry,
//! 2. stored repository config under `gitflow.<type>.<action>.<option>`
//!    (an explicit negative key beats the positive one),
//! 3. the caller's tri-state override from the parsed command line, where
//!    `Some(true)`, `Some(false)`, and `None` are distinct and `None`
//!    leaves the stored layer in effect.
//!
//! The resolver is pure: resolving the same (type, stored config, caller
//! overrides) twice yields identical profiles.

use std::path::PathBuf;

use crate::branch_type::{BranchType, Strategy};
use crate::errors::FlowError;
use crate::git::Repository;

/// Caller overrides for one finish invocation (layer 3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinishOverrides {
    pub tag: Option<bool>,
    pub tag_name: Option<String>,
    pub sign: Option<bool>,
    pub signing_key: Option<String>,
    pub message: Option<String>,
    pub message_file: Option<PathBuf>,
    pub keep: Option<bool>,
    pub keep_local: Option<bool>,
    pub keep_remote: Option<bool>,
    pub force_delete: Option<bool>,
    pub rebase: Option<bool>,
    pub preserve_merges: Option<bool>,
    pub squash: Option<bool>,
    pub no_ff: Option<bool>,
    /// Absolute strategy override; replaces whatever the sub-flags resolved to
    pub strategy: Option<String>,
    pub fetch: Option<bool>,
    pub push: Option<bool>,
}

/// The effective options for one finish invocation. Produced once per
/// command; immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishProfile {
    pub tag: bool,
    pub tag_name: String,
    pub sign: bool,
    pub signing_key: Option<String>,
    /// Caller-supplied tag/merge message; None means the default template
    pub message: Option<String>,
    pub message_file: Option<PathBuf>,
    pub keep: bool,
    pub keep_local: bool,
    pub keep_remote: bool,
    pub force_delete: bool,
    pub strategy: Strategy,
    pub preserve_merges: bool,
    pub no_ff: bool,
    pub fetch: bool,
    pub push: bool,
}

impl FinishProfile {
    /// The tag message to use when none was supplied, per branch short name.
    pub fn default_message(short_name: &str) -> String {
        format!("Tagging version {short_name}")
    }

    /// The resolved base message before filter hooks run.
    pub fn base_message(&self, short_name: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| Self::default_message(short_name))
    }

    /// The squash commit message: the caller's message when given, else a
    /// synthesized summary. Shares the message field's layering, so like
    /// the tag message it has no stored layer.
    pub fn squash_message(&self, full_branch: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("Squashed commit of branch '{full_branch}'"))
    }
}

/// Read a stored boolean option for `gitflow.<type>.<action>.<option>`,
/// honoring the explicit negative form.
///
/// When the negative key (`no_key`) is present and true, the option is force
/// disabled regardless of the positive key. A negative key set to false has
/// no effect.
fn stored_flag(
    repo: &Repository,
    ty: &str,
    action: &str,
    option: &str,
    negative: &str,
) -> Result<Option<bool>, FlowError> {
    let positive_key = format!("gitflow.{ty}.{action}.{option}");
    let negative_key = format!("gitflow.{ty}.{action}.{negative}");
    let positive = repo
        .config_bool(&positive_key)
        .map_err(|e| FlowError::vcs(format!("read {positive_key}"), e))?;
    let negative = repo
        .config_bool(&negative_key)
        .map_err(|e| FlowError::vcs(format!("read {negative_key}"), e))?;
    Ok(match (positive, negative) {
        (_, Some(true)) => Some(false),
        (value, _) => value,
    })
}

/// Read a stored string option for `gitflow.<type>.<action>.<option>`.
fn stored_value(
    repo: &Repository,
    ty: &str,
    action: &str,
    option: &str,
) -> Result<Option<String>, FlowError> {
    let key = format!("gitflow.{ty}.{action}.{option}");
    repo.config_get(&key)
        .map_err(|e| FlowError::vcs(format!("read {key}"), e))
}

/// Resolve the effective finish profile for one invocation.
pub fn resolve_finish(
    repo: &Repository,
    ty: &BranchType,
    short_name: &str,
    overrides: &FinishOverrides,
) -> Result<FinishProfile, FlowError> {
    let action = "finish";
    let name = ty.name.as_str();

    // Tag policy: type default, inverted by a stored `notag`, replaced by
    // the caller's tri-state.
    let tag = overrides
        .tag
        .or(stored_flag(repo, name, action, "tag", "notag")?)
        .unwrap_or(ty.tag_on_finish);

    let sign = overrides
        .sign
        .or(stored_flag(repo, name, action, "sign", "no-sign")?)
        .unwrap_or(false);
    let signing_key = overrides
        .signing_key
        .clone()
        .or(stored_value(repo, name, action, "signingkey")?);

    let keep = overrides
        .keep
        .or(stored_flag(repo, name, action, "keep", "no-keep")?)
        .unwrap_or(false);
    let keep_local = overrides
        .keep_local
        .or(stored_flag(repo, name, action, "keep-local", "no-keep-local")?)
        .unwrap_or(false);
    let keep_remote = overrides
        .keep_remote
        .or(stored_flag(
            repo,
            name,
            action,
            "keep-remote",
            "no-keep-remote",
        )?)
        .unwrap_or(false);
    let force_delete = overrides
        .force_delete
        .or(stored_flag(
            repo,
            name,
            action,
            "force-delete",
            "no-force-delete",
        )?)
        .unwrap_or(false);

    // Integration strategy: three mutually-exclusive sub-flags with
    // squash > rebase > default-merge, then the absolute string override.
    let rebase = overrides
        .rebase
        .or(stored_flag(repo, name, action, "rebase", "no-rebase")?)
        .unwrap_or(ty.upstream_strategy == Strategy::Rebase);
    let squash = overrides
        .squash
        .or(stored_flag(repo, name, action, "squash", "no-squash")?)
        .unwrap_or(ty.upstream_strategy == Strategy::Squash);
    let mut strategy = if squash {
        Strategy::Squash
    } else if rebase {
        Strategy::Rebase
    } else {
        Strategy::Merge
    };
    if let Some(explicit) = overrides.strategy.as_deref() {
        strategy = Strategy::parse(explicit)?;
    }

    let preserve_merges = overrides
        .preserve_merges
        .or(stored_flag(
            repo,
            name,
            action,
            "preserve-merges",
            "no-preserve-merges",
        )?)
        .unwrap_or(false);
    // `--ff` is the negative of `--no-ff`. A finish marks an integration
    // point, so the merge commit is kept even when fast-forward would be
    // possible, unless fast-forward is explicitly allowed.
    let no_ff = overrides
        .no_ff
        .or(stored_flag(repo, name, action, "no-ff", "ff")?)
        .unwrap_or(true);

    let fetch = overrides
        .fetch
        .or(stored_flag(repo, name, action, "fetch", "no-fetch")?)
        .unwrap_or(false);
    let push = overrides
        .push
        .or(stored_flag(repo, name, action, "push", "no-push")?)
        .unwrap_or(false);

    // Tag name: type default <tagPrefix><branchName>; no stored layer; the
    // caller's string replaces it entirely. Same shape for the message.
    let tag_name = overrides
        .tag_name
        .clone()
        .unwrap_or_else(|| format!("{}{}", ty.tag_prefix, short_name));

    Ok(FinishProfile {
        tag,
        tag_name,
        sign,
        signing_key,
        message: overrides.message.clone(),
        message_file: overrides.message_file.clone(),
        keep,
        keep_local,
        keep_remote,
        force_delete,
        strategy,
        preserve_merges,
        no_ff,
        fetch,
        push,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch_type::Registry;
    use crate::shell_exec::Cmd;
    use rstest::rstest;
    use tempfile::TempDir;

    fn scratch_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        for args in [
            vec!["init", "-q"],
            vec!["config", "user.name", "Flow Test"],
            vec!["config", "user.email", "flow@example.invalid"],
        ] {
            let output = Cmd::new("git")
                .args(args.iter().copied())
                .current_dir(dir.path())
                .run()
                .unwrap();
            assert!(output.status.success());
        }
        let repo = Repository::discover(dir.path()).unwrap();
        (dir, repo)
    }

    fn feature() -> BranchType {
        Registry::builtin().get("feature").unwrap().clone()
    }

    fn release() -> BranchType {
        Registry::builtin().get("release").unwrap().clone()
    }

    #[test]
    fn test_layer1_defaults() {
        let (_dir, repo) = scratch_repo();
        let profile =
            resolve_finish(&repo, &feature(), "login", &FinishOverrides::default()).unwrap();
        assert!(!profile.tag);
        assert_eq!(profile.strategy, Strategy::Merge);
        assert!(!profile.keep);
        assert!(!profile.push);
        assert!(profile.no_ff, "finish keeps the merge commit by default");
        assert_eq!(profile.tag_name, "login");

        let profile =
            resolve_finish(&repo, &release(), "1.0.0", &FinishOverrides::default()).unwrap();
        assert!(profile.tag);
        assert_eq!(profile.tag_name, "v1.0.0");
    }

    #[test]
    fn test_layer2_overrides_layer1() {
        let (_dir, repo) = scratch_repo();
        repo.config_set("gitflow.feature.finish.rebase", "true")
            .unwrap();
        repo.config_set("gitflow.release.finish.notag", "true")
            .unwrap();

        let profile =
            resolve_finish(&repo, &feature(), "login", &FinishOverrides::default()).unwrap();
        assert_eq!(profile.strategy, Strategy::Rebase);

        let profile =
            resolve_finish(&repo, &release(), "1.0.0", &FinishOverrides::default()).unwrap();
        assert!(!profile.tag, "stored notag inverts the type default");
    }

    #[test]
    fn test_stored_negative_beats_stored_positive() {
        let (_dir, repo) = scratch_repo();
        repo.config_set("gitflow.feature.finish.rebase", "true")
            .unwrap();
        repo.config_set("gitflow.feature.finish.no-rebase", "true")
            .unwrap();

        let profile =
            resolve_finish(&repo, &feature(), "login", &FinishOverrides::default()).unwrap();
        assert_eq!(profile.strategy, Strategy::Merge, "negative forces disabled");
    }

    #[test]
    fn test_layer3_tristate_none_leaves_layer2() {
        let (_dir, repo) = scratch_repo();
        repo.config_set("gitflow.feature.finish.keep", "true")
            .unwrap();

        // None leaves the stored value in effect
        let profile =
            resolve_finish(&repo, &feature(), "login", &FinishOverrides::default()).unwrap();
        assert!(profile.keep);

        // Some(false) is distinct from None and wins over stored true
        let overrides = FinishOverrides {
            keep: Some(false),
            ..Default::default()
        };
        let profile = resolve_finish(&repo, &feature(), "login", &overrides).unwrap();
        assert!(!profile.keep);

        // Some(true) also passes through
        let overrides = FinishOverrides {
            keep: Some(true),
            ..Default::default()
        };
        let profile = resolve_finish(&repo, &feature(), "login", &overrides).unwrap();
        assert!(profile.keep);
    }

    #[test]
    fn test_ff_opts_out_of_merge_commit() {
        let (_dir, repo) = scratch_repo();
        let overrides = FinishOverrides {
            no_ff: Some(false),
            ..Default::default()
        };
        let profile = resolve_finish(&repo, &feature(), "login", &overrides).unwrap();
        assert!(!profile.no_ff);

        // Stored `ff = true` is the negative form of no-ff
        repo.config_set("gitflow.feature.finish.ff", "true").unwrap();
        let profile =
            resolve_finish(&repo, &feature(), "login", &FinishOverrides::default()).unwrap();
        assert!(!profile.no_ff);
    }

    #[rstest]
    // squash beats rebase when both sub-flags are set
    #[case(Some(true), Some(true), None, Strategy::Squash)]
    // rebase alone
    #[case(Some(true), None, None, Strategy::Rebase)]
    // neither: default merge
    #[case(None, None, None, Strategy::Merge)]
    // the strategy string is an absolute override
    #[case(Some(true), Some(true), Some("merge"), Strategy::Merge)]
    #[case(None, None, Some("squash"), Strategy::Squash)]
    #[case(Some(false), None, Some("rebase"), Strategy::Rebase)]
    fn test_strategy_subflag_policy(
        #[case] rebase: Option<bool>,
        #[case] squash: Option<bool>,
        #[case] strategy: Option<&str>,
        #[case] expected: Strategy,
    ) {
        let (_dir, repo) = scratch_repo();
        let overrides = FinishOverrides {
            rebase,
            squash,
            strategy: strategy.map(String::from),
            ..Default::default()
        };
        let profile = resolve_finish(&repo, &feature(), "login", &overrides).unwrap();
        assert_eq!(profile.strategy, expected);
    }

    #[test]
    fn test_invalid_strategy_is_invalid_input() {
        let (_dir, repo) = scratch_repo();
        let overrides = FinishOverrides {
            strategy: Some("octopus".into()),
            ..Default::default()
        };
        let err = resolve_finish(&repo, &feature(), "login", &overrides).unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_tag_name_and_message_resolution() {
        let (_dir, repo) = scratch_repo();
        let overrides = FinishOverrides {
            tag_name: Some("rc-1".into()),
            message: Some("Release %b".into()),
            ..Default::default()
        };
        let profile = resolve_finish(&repo, &release(), "1.0.0", &overrides).unwrap();
        assert_eq!(profile.tag_name, "rc-1");
        assert_eq!(profile.base_message("1.0.0"), "Release %b");

        let profile =
            resolve_finish(&repo, &release(), "1.0.0", &FinishOverrides::default()).unwrap();
        assert_eq!(profile.base_message("1.0.0"), "Tagging version 1.0.0");
    }

    #[test]
    fn test_squash_message_follows_the_message_field() {
        let (_dir, repo) = scratch_repo();
        let profile =
            resolve_finish(&repo, &feature(), "bulk", &FinishOverrides::default()).unwrap();
        assert_eq!(
            profile.squash_message("feature/bulk"),
            "Squashed commit of branch 'feature/bulk'"
        );

        let overrides = FinishOverrides {
            message: Some("Land %b".into()),
            ..Default::default()
        };
        let profile = resolve_finish(&repo, &feature(), "bulk", &overrides).unwrap();
        assert_eq!(profile.squash_message("feature/bulk"), "Land %b");
    }

    #[test]
    fn test_resolver_is_pure() {
        let (_dir, repo) = scratch_repo();
        repo.config_set("gitflow.feature.finish.squash", "true")
            .unwrap();
        let overrides = FinishOverrides {
            push: Some(true),
            ..Default::default()
        };
        let first = resolve_finish(&repo, &feature(), "login", &overrides).unwrap();
        let second = resolve_finish(&repo, &feature(), "login", &overrides).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_type_default_rebase_disabled_by_explicit_negative() {
        let (_dir, repo) = scratch_repo();
        let mut ty = feature();
        ty.upstream_strategy = Strategy::Rebase;

        let profile = resolve_finish(&repo, &ty, "login", &FinishOverrides::default()).unwrap();
        assert_eq!(profile.strategy, Strategy::Rebase);

        let overrides = FinishOverrides {
            rebase: Some(false),
            ..Default::default()
        };
        let profile = resolve_finish(&repo, &ty, "login", &overrides).unwrap();
        assert_eq!(profile.strategy, Strategy::Merge);
    }
}
