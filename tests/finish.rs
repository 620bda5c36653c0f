//! End-to-end finish scenarios against scratch repositories.

mod common;

use common::FlowRepo;
use gitflow::commands::{FinishOptions, handle_finish, handle_start};
use gitflow::errors::{EXIT_CONFLICT, FlowError, exit_code};
use gitflow::resolve::FinishOverrides;
use gitflow::state::{FinishPhase, StateStore};

fn finish_fresh(overrides: FinishOverrides) -> FinishOptions {
    FinishOptions {
        resume: false,
        abort: false,
        overrides,
    }
}

fn finish_continue() -> FinishOptions {
    FinishOptions {
        resume: true,
        abort: false,
        overrides: FinishOverrides::default(),
    }
}

fn finish_abort() -> FinishOptions {
    FinishOptions {
        resume: false,
        abort: true,
        overrides: FinishOverrides::default(),
    }
}

#[test]
fn default_finish_merges_and_cleans_up() {
    let flow = FlowRepo::new();
    handle_start(&flow.repo, "feature", "login", None, false).unwrap();
    flow.commit_file("login.rs", "fn login() {}\n", "add login");

    let develop_before = flow.rev("develop");
    handle_finish(
        &flow.repo,
        "feature",
        "login",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap();

    // develop advanced with a merge commit
    assert_ne!(flow.rev("develop"), develop_before);
    assert_eq!(flow.parent_count("develop"), 2, "merge commit expected");
    // the feature branch is gone locally
    assert!(!flow.repo.branch_exists("feature/login").unwrap());
    // no tag was created
    assert!(flow.git(&["tag", "-l"]).trim().is_empty());
    // no merge state is left behind
    assert!(!StateStore::open(&flow.repo).unwrap().in_progress());
    // the user lands on the parent
    assert_eq!(
        flow.repo.current_branch().unwrap().as_deref(),
        Some("develop")
    );
}

#[test]
fn conflicted_finish_is_resumable() {
    let flow = FlowRepo::new();
    flow.commit_file_on("develop", "shared.txt", "base\n", "base");
    handle_start(&flow.repo, "feature", "clash", None, false).unwrap();
    flow.commit_file("shared.txt", "feature side\n", "feature change");
    flow.commit_file_on("develop", "shared.txt", "develop side\n", "develop change");

    let err = handle_finish(
        &flow.repo,
        "feature",
        "clash",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap_err();

    // Classified as the resumable conflict kind
    assert_eq!(exit_code(&err), Some(EXIT_CONFLICT));
    assert!(matches!(
        err.downcast_ref::<FlowError>(),
        Some(FlowError::MergeConflict { .. })
    ));

    // The merge state on disk records the interrupted phase
    let store = StateStore::open(&flow.repo).unwrap();
    let state = store.load().unwrap().expect("state should be saved");
    assert_eq!(state.phase, FinishPhase::MergeIntoParent);
    assert_eq!(state.full_branch, "feature/clash");
    assert_eq!(state.parent_branch, "develop");

    // A second fresh finish is refused while the state exists
    let err = handle_finish(
        &flow.repo,
        "feature",
        "clash",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FlowError>(),
        Some(FlowError::OperationInProgress)
    ));

    // Resolve and continue
    std::fs::write(flow.dir.path().join("shared.txt"), "resolved\n").unwrap();
    flow.git(&["add", "shared.txt"]);
    handle_finish(&flow.repo, "feature", "clash", finish_continue()).unwrap();

    assert!(!store.in_progress());
    assert!(!flow.repo.branch_exists("feature/clash").unwrap());
    assert_eq!(
        std::fs::read_to_string(flow.dir.path().join("shared.txt")).unwrap(),
        "resolved\n"
    );
}

#[test]
fn continue_with_unresolved_paths_is_refused() {
    let flow = FlowRepo::new();
    flow.commit_file_on("develop", "shared.txt", "base\n", "base");
    handle_start(&flow.repo, "feature", "clash", None, false).unwrap();
    flow.commit_file("shared.txt", "feature side\n", "feature change");
    flow.commit_file_on("develop", "shared.txt", "develop side\n", "develop change");

    handle_finish(
        &flow.repo,
        "feature",
        "clash",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap_err();

    // Continue without resolving: refused, state kept
    let err = handle_finish(&flow.repo, "feature", "clash", finish_continue()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FlowError>(),
        Some(FlowError::UnresolvedConflicts { .. })
    ));
    assert!(StateStore::open(&flow.repo).unwrap().in_progress());
}

#[test]
fn conflicted_finish_can_be_aborted() {
    let flow = FlowRepo::new();
    flow.commit_file_on("develop", "shared.txt", "base\n", "base");
    let develop_before = flow.rev("develop");
    handle_start(&flow.repo, "feature", "clash", None, false).unwrap();
    flow.commit_file("shared.txt", "feature side\n", "feature change");
    flow.commit_file_on("develop", "shared.txt", "develop side\n", "develop change");
    let develop_tip = flow.rev("develop");
    assert_ne!(develop_before, develop_tip);

    handle_finish(
        &flow.repo,
        "feature",
        "clash",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap_err();

    handle_finish(&flow.repo, "feature", "clash", finish_abort()).unwrap();

    // The merge is gone, develop is back at its pre-finish tip, the branch
    // survives, and the state is cleared
    assert!(!flow.repo.is_merging().unwrap());
    assert_eq!(flow.rev("develop"), develop_tip);
    assert!(flow.repo.branch_exists("feature/clash").unwrap());
    assert!(!StateStore::open(&flow.repo).unwrap().in_progress());
}

#[test]
fn abort_without_state_is_refused() {
    let flow = FlowRepo::new();
    let err = handle_finish(&flow.repo, "feature", "x", finish_abort()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FlowError>(),
        Some(FlowError::NoOperationInProgress)
    ));

    let err = handle_finish(&flow.repo, "feature", "x", finish_continue()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FlowError>(),
        Some(FlowError::NoOperationInProgress)
    ));
}

#[test]
fn release_finish_tags_with_expanded_message() {
    let flow = FlowRepo::new();
    handle_start(&flow.repo, "release", "1.0.0", None, false).unwrap();
    flow.commit_file("version.txt", "1.0.0\n", "bump version");

    let overrides = FinishOverrides {
        message: Some("Release %b".into()),
        ..Default::default()
    };
    handle_finish(&flow.repo, "release", "1.0.0", finish_fresh(overrides)).unwrap();

    // release default policy: tag on finish with prefix v
    let tags = flow.git(&["tag", "-l"]);
    assert_eq!(tags.trim(), "v1.0.0");
    let subject = flow.git(&["tag", "-l", "--format=%(contents:subject)", "v1.0.0"]);
    assert_eq!(subject.trim(), "Release 1.0.0");

    // the tag points at main's tip
    assert_eq!(flow.rev("v1.0.0^{commit}"), flow.rev("main"));
    // develop was refreshed from main after the release landed
    let behind = flow.git(&["rev-list", "--count", "develop..main"]);
    assert_eq!(behind.trim(), "0");
    assert!(!flow.repo.branch_exists("release/1.0.0").unwrap());
}

#[test]
fn strategy_override_squashes_to_one_commit() {
    let flow = FlowRepo::new();
    handle_start(&flow.repo, "feature", "bulk", None, false).unwrap();
    flow.commit_file("a.txt", "a\n", "first");
    flow.commit_file("b.txt", "b\n", "second");

    let develop_before_count = flow.git(&["rev-list", "--count", "develop"]);
    let overrides = FinishOverrides {
        strategy: Some("squash".into()),
        ..Default::default()
    };
    handle_finish(&flow.repo, "feature", "bulk", finish_fresh(overrides)).unwrap();

    let develop_after_count = flow.git(&["rev-list", "--count", "develop"]);
    assert_eq!(
        develop_after_count.trim().parse::<usize>().unwrap(),
        develop_before_count.trim().parse::<usize>().unwrap() + 1,
        "exactly one new commit on the parent"
    );
    assert_eq!(flow.parent_count("develop"), 1, "not a merge commit");
    assert!(std::fs::read_to_string(flow.dir.path().join("a.txt")).is_ok());
    assert!(!flow.repo.branch_exists("feature/bulk").unwrap());
}

#[test]
fn finish_updates_sibling_feature_branches() {
    let flow = FlowRepo::new();
    handle_start(&flow.repo, "feature", "other", None, false).unwrap();
    flow.commit_file("other.txt", "other\n", "other work");
    handle_start(&flow.repo, "feature", "login", None, false).unwrap();
    flow.commit_file("login.txt", "login\n", "login work");

    handle_finish(
        &flow.repo,
        "feature",
        "login",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap();

    // The sibling received develop's new tip
    let missing = flow.git(&["rev-list", "--count", "feature/other..develop"]);
    assert_eq!(missing.trim(), "0", "sibling should contain develop");
    // Its own work is still there
    flow.git(&["checkout", "-q", "feature/other"]);
    assert!(flow.dir.path().join("other.txt").exists());
    assert!(flow.dir.path().join("login.txt").exists());
}

#[test]
fn keep_retains_the_branch() {
    let flow = FlowRepo::new();
    handle_start(&flow.repo, "feature", "kept", None, false).unwrap();
    flow.commit_file("kept.txt", "kept\n", "kept work");

    let overrides = FinishOverrides {
        keep: Some(true),
        ..Default::default()
    };
    handle_finish(&flow.repo, "feature", "kept", finish_fresh(overrides)).unwrap();

    assert!(flow.repo.branch_exists("feature/kept").unwrap());
    assert_eq!(flow.parent_count("develop"), 2);
}

#[test]
fn stored_config_drives_the_finish() {
    let flow = FlowRepo::new();
    // Squash every feature finish via stored configuration
    flow.git(&["config", "gitflow.feature.finish.squash", "true"]);
    handle_start(&flow.repo, "feature", "cfg", None, false).unwrap();
    flow.commit_file("cfg1.txt", "1\n", "one");
    flow.commit_file("cfg2.txt", "2\n", "two");

    handle_finish(
        &flow.repo,
        "feature",
        "cfg",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap();

    assert_eq!(flow.parent_count("develop"), 1, "squash commit expected");
}

#[test]
fn merge_states_are_disjoint_across_worktrees() {
    let flow = FlowRepo::new();
    let wt_path = flow.dir.path().join("linked-wt");
    flow.git(&[
        "worktree",
        "add",
        "-q",
        "-b",
        "linked-side",
        wt_path.to_str().unwrap(),
        "main",
    ]);
    let linked = gitflow::Repository::discover(&wt_path).unwrap();

    let main_store = StateStore::open(&flow.repo).unwrap();
    let linked_store = StateStore::open(&linked).unwrap();

    // Saving in the linked worktree must not leak into the main worktree
    let state = gitflow::state::MergeState {
        action: "finish".into(),
        branch_type: "feature".into(),
        branch_name: "x".into(),
        full_branch: "feature/x".into(),
        parent_branch: "develop".into(),
        strategy: gitflow::branch_type::Strategy::Merge,
        phase: FinishPhase::MergeIntoParent,
        child_branches: vec![],
        updated_branches: vec![],
        current_child: None,
        child_strategies: Default::default(),
        squash_message: None,
    };
    linked_store.save(&state).unwrap();

    assert!(linked_store.in_progress());
    assert!(!main_store.in_progress());

    linked_store.clear().unwrap();
    assert!(!linked_store.in_progress());
}

#[cfg(unix)]
#[test]
fn pre_finish_hook_blocks_the_operation() {
    use std::os::unix::fs::PermissionsExt;

    let flow = FlowRepo::new();
    handle_start(&flow.repo, "feature", "guarded", None, false).unwrap();
    flow.commit_file("guarded.txt", "g\n", "guarded work");

    let hooks_dir = flow.repo.git_dir().unwrap().join("hooks");
    std::fs::create_dir_all(&hooks_dir).unwrap();
    let hook = hooks_dir.join("pre-flow-feature-finish");
    std::fs::write(&hook, "#!/bin/sh\necho not today >&2\nexit 1\n").unwrap();
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

    let develop_before = flow.rev("develop");
    let err = handle_finish(
        &flow.repo,
        "feature",
        "guarded",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<FlowError>(),
        Some(FlowError::HookFailed { exit_code: 1, .. })
    ));
    // The underlying operation never started
    assert_eq!(flow.rev("develop"), develop_before);
    assert!(flow.repo.branch_exists("feature/guarded").unwrap());
    assert!(!StateStore::open(&flow.repo).unwrap().in_progress());
}

#[cfg(unix)]
#[test]
fn tag_message_filter_transforms_the_message() {
    use std::os::unix::fs::PermissionsExt;

    let flow = FlowRepo::new();
    handle_start(&flow.repo, "release", "2.0.0", None, false).unwrap();
    flow.commit_file("v2.txt", "2\n", "v2 work");

    let hooks_dir = flow.repo.git_dir().unwrap().join("hooks");
    std::fs::create_dir_all(&hooks_dir).unwrap();
    let hook = hooks_dir.join("filter-flow-release-finish-tag-message");
    // $1 is the tag name, $2 the base message
    std::fs::write(&hook, "#!/bin/sh\necho \"[$1] $2\"\n").unwrap();
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

    handle_finish(
        &flow.repo,
        "release",
        "2.0.0",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap();

    let subject = flow.git(&["tag", "-l", "--format=%(contents:subject)", "v2.0.0"]);
    assert_eq!(subject.trim(), "[v2.0.0] Tagging version 2.0.0");
}

#[test]
fn work_list_cardinality_is_constant_across_updates() {
    let flow = FlowRepo::new();
    // Two siblings that will both need updating, one of them conflicting
    handle_start(&flow.repo, "feature", "calm", None, false).unwrap();
    flow.commit_file("calm.txt", "calm\n", "calm work");
    flow.commit_file_on("develop", "clash.txt", "base\n", "base for clash");
    handle_start(&flow.repo, "feature", "edgy", None, false).unwrap();
    flow.commit_file("clash.txt", "edgy side\n", "edgy work");
    handle_start(&flow.repo, "feature", "subject", None, false).unwrap();
    flow.commit_file("clash.txt", "subject side\n", "subject work");

    let err = handle_finish(
        &flow.repo,
        "feature",
        "subject",
        finish_fresh(FinishOverrides::default()),
    )
    .unwrap_err();
    assert_eq!(exit_code(&err), Some(EXIT_CONFLICT));

    let store = StateStore::open(&flow.repo).unwrap();
    let state = store.load().unwrap().unwrap();
    let initial_size = state.work_list_size();
    assert_eq!(state.phase, FinishPhase::UpdateChildren);
    assert_eq!(state.current_child.as_deref(), Some("feature/edgy"));

    // Resolve the child conflict and continue
    std::fs::write(flow.dir.path().join("clash.txt"), "resolved\n").unwrap();
    flow.git(&["add", "clash.txt"]);
    handle_finish(&flow.repo, "feature", "subject", finish_continue()).unwrap();

    // The last persisted state before clearing kept the union stable
    assert_eq!(initial_size, 2);
    assert!(!store.in_progress());
    let missing = flow.git(&["rev-list", "--count", "feature/calm..develop"]);
    assert_eq!(missing.trim(), "0");
}
