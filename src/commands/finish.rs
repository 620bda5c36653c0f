//! The finish orchestrator: integrate a branch into its parent, propagate
//! the result to dependent branches, tag, delete, publish.
//!
//! Finish is a five-phase state machine persisted through
//! [`StateStore`](crate::state::StateStore):
//!
//! ```text
//! merge_into_parent -> update_children -> tag -> delete_branch -> done
//! ```
//!
//! Phases strictly advance and the state is saved before and after every
//! mutation, so a conflicted merge (or an interrupt) leaves a resumable
//! record on disk. `--continue` completes the in-flight integration the
//! user resolved and carries on; `--abort` discards the in-progress merge
//! or rebase and clears the record.

use color_print::cformat;

use crate::branch_type::{BranchType, Registry, Strategy};
use crate::errors::FlowError;
use crate::git::{GitError, MergeRequest, Repository, TagRequest};
use crate::hooks::{HookAction, HookContext, Hooks};
use crate::resolve::{FinishOverrides, FinishProfile, resolve_finish};
use crate::state::{FinishPhase, MergeState, StateStore};
use crate::styling::{println, progress_message, success_message};

use super::{origin_name, require_initialized, validate_name};

/// Entry-dispatch options for one finish invocation.
#[derive(Debug, Default)]
pub struct FinishOptions {
    /// Resume a conflicted finish at its recorded phase
    pub resume: bool,
    /// Discard the in-progress finish
    pub abort: bool,
    pub overrides: FinishOverrides,
}

pub fn handle_finish(
    repo: &Repository,
    ty_name: &str,
    name: &str,
    opts: FinishOptions,
) -> anyhow::Result<()> {
    let registry = require_initialized(repo)?;
    let ty = registry.require(ty_name)?.clone();
    let store = StateStore::open(repo)?;

    if opts.resume && opts.abort {
        return Err(FlowError::invalid_input("--continue and --abort are mutually exclusive").into());
    }
    if opts.abort {
        return abort_finish(repo, &store);
    }
    if opts.resume {
        let state = store
            .load()?
            .ok_or(FlowError::NoOperationInProgress)?;
        let ty = registry.require(&state.branch_type)?.clone();
        let profile = resolve_finish(repo, &ty, &state.branch_name, &opts.overrides)?;
        let origin = origin_name(repo)?;
        let mut run = FinishRun {
            repo,
            store,
            profile,
            origin,
            state,
            resume: true,
        };
        return run.drive();
    }

    // Fresh start
    validate_name(name)?;
    if store.in_progress() {
        return Err(FlowError::OperationInProgress.into());
    }

    let full_branch = ty.full_branch(name);
    let parent_branch = registry.parent_branch(&ty)?;
    if !repo.branch_exists(&full_branch)? {
        return Err(FlowError::BranchNotFound {
            branch: full_branch,
        }
        .into());
    }
    if !repo.branch_exists(&parent_branch)? {
        return Err(FlowError::BranchNotFound {
            branch: parent_branch,
        }
        .into());
    }

    let profile = resolve_finish(repo, &ty, name, &opts.overrides)?;
    let origin = origin_name(repo)?;

    if profile.fetch && repo.tracked_upstream(&parent_branch)?.is_some() {
        println!(
            "{}",
            progress_message(cformat!("Fetching <bold>{origin}</>"))
        );
        repo.fetch(&origin)
            .map_err(|e| FlowError::vcs(format!("fetch {origin}"), e))?;
        refresh_parent(repo, &origin, &parent_branch)?;
    }

    let hooks = Hooks::new(repo);
    let ctx = HookContext {
        branch: &full_branch,
        branch_name: name,
        branch_type: &ty.name,
        base_branch: &parent_branch,
        origin: &origin,
        version: None,
    };
    hooks.run_pre(HookAction::Finish, &[name, &origin, &full_branch], &ctx)?;

    let (child_branches, child_strategies) =
        compute_child_work_list(repo, &registry, &ty, &full_branch)?;

    let squash_message = (profile.strategy == Strategy::Squash).then(|| {
        expand_placeholders(
            &profile.squash_message(&full_branch),
            name,
            &full_branch,
            &parent_branch,
        )
    });

    let state = MergeState {
        action: "finish".into(),
        branch_type: ty.name.clone(),
        branch_name: name.to_string(),
        full_branch: full_branch.clone(),
        parent_branch: parent_branch.clone(),
        strategy: profile.strategy,
        phase: FinishPhase::MergeIntoParent,
        child_branches,
        updated_branches: Vec::new(),
        current_child: None,
        child_strategies,
        squash_message,
    };

    let mut run = FinishRun {
        repo,
        store,
        profile,
        origin,
        state,
        resume: false,
    };
    run.drive()
}

/// Discard the in-progress finish: abort whatever git operation is pending
/// and clear the saved state.
fn abort_finish(repo: &Repository, store: &StateStore) -> anyhow::Result<()> {
    let state = store
        .load()?
        .ok_or(FlowError::NoOperationInProgress)?;
    if repo.is_merging()? {
        repo.abort_merge()
            .map_err(|e| FlowError::vcs("abort merge", e))?;
    }
    if repo.is_rebasing()? {
        repo.abort_rebase()
            .map_err(|e| FlowError::vcs("abort rebase", e))?;
    }
    if !repo.unresolved_paths()?.is_empty() {
        // A stopped squash merge has no MERGE_HEAD to abort
        repo.reset_merge()
            .map_err(|e| FlowError::vcs("reset conflicted index", e))?;
    }
    store.clear()?;
    println!(
        "{}",
        success_message(cformat!(
            "Aborted finish of <bold>{}</>",
            state.full_branch
        ))
    );
    Ok(())
}

/// After a fetch, fast-forward the local parent if the remote moved ahead.
fn refresh_parent(repo: &Repository, origin: &str, parent: &str) -> anyhow::Result<()> {
    let remote_ref = format!("{origin}/{parent}");
    if !repo.remote_branch_exists(origin, parent)? {
        return Ok(());
    }
    if let crate::git::BranchComparison::Behind(_) = repo.compare(parent, &remote_ref)? {
        repo.checkout(parent)
            .and_then(|()| repo.fast_forward(&remote_ref))
            .map_err(|e| FlowError::vcs(format!("fast-forward {parent}"), e))?;
    }
    Ok(())
}

/// The child branches that must be refreshed after the parent advances:
/// every local branch whose type is an auto-updating descendant of the
/// parent type, in topological-then-lexicographic order, with the per-edge
/// strategy recorded alongside.
fn compute_child_work_list(
    repo: &Repository,
    registry: &Registry,
    ty: &BranchType,
    subject: &str,
) -> anyhow::Result<(Vec<String>, std::collections::BTreeMap<String, Strategy>)> {
    let parent_type = ty.parent.as_deref().unwrap_or_default();
    let local = repo.local_branches()?;

    let mut children = Vec::new();
    let mut strategies = std::collections::BTreeMap::new();
    for child_ty in registry.auto_update_descendants(parent_type) {
        // Edge is from the child's own parent type down to the child
        let edge_parent = child_ty
            .parent
            .as_deref()
            .and_then(|p| registry.get(p))
            .unwrap_or(child_ty);
        let strategy = registry.edge_strategy(edge_parent, child_ty);

        let mut of_type: Vec<&String> = local
            .iter()
            .filter(|branch| {
                child_ty.owns(branch)
                    && registry
                        .type_of_branch(branch)
                        .is_some_and(|owner| owner.name == child_ty.name)
            })
            .collect();
        of_type.sort();
        for branch in of_type {
            if branch == subject {
                continue;
            }
            strategies.insert(branch.clone(), strategy);
            children.push(branch.clone());
        }
    }
    Ok((children, strategies))
}

/// Expand `%b`, `%B`, `%p`, `%P`, and `%%` in a tag/merge message.
///
/// A single left-to-right scan, so escapes are processed before
/// placeholders: `%%b` yields the literal `%b`, not the branch name.
pub fn expand_placeholders(input: &str, short: &str, full_branch: &str, parent: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('b') => out.push_str(short),
            Some('B') => {
                out.push_str("refs/heads/");
                out.push_str(full_branch);
            }
            Some('p') => out.push_str(parent),
            Some('P') => {
                out.push_str("refs/heads/");
                out.push_str(parent);
            }
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// One finish invocation driving the phase machine.
struct FinishRun<'a> {
    repo: &'a Repository,
    store: StateStore,
    profile: FinishProfile,
    origin: String,
    state: MergeState,
    /// True while completing an integration the user resolved by hand
    resume: bool,
}

impl FinishRun<'_> {
    fn hook_context(&self) -> HookContext<'_> {
        HookContext {
            branch: &self.state.full_branch,
            branch_name: &self.state.branch_name,
            branch_type: &self.state.branch_type,
            base_branch: &self.state.parent_branch,
            origin: &self.origin,
            version: None,
        }
    }

    fn resume_command(&self) -> String {
        format!(
            "git-flow {} finish {} --continue",
            self.state.branch_type, self.state.branch_name
        )
    }

    /// Consume the resume flag; true on the first phase entered after
    /// `--continue`.
    fn take_resume(&mut self) -> bool {
        std::mem::take(&mut self.resume)
    }

    fn drive(&mut self) -> anyhow::Result<()> {
        if self.resume {
            // Refuse to continue while git still reports unmerged paths
            let unresolved = self.repo.unresolved_paths()?;
            if !unresolved.is_empty() {
                return Err(FlowError::UnresolvedConflicts { paths: unresolved }.into());
            }
        } else {
            println!(
                "{}",
                progress_message(cformat!(
                    "Finishing <bold>{}</> into <bold>{}</>",
                    self.state.full_branch,
                    self.state.parent_branch
                ))
            );
            // Persist before the first mutation so a crash mid-merge is
            // recoverable
            self.store.save(&self.state)?;
        }

        loop {
            match self.state.phase {
                FinishPhase::MergeIntoParent => self.merge_into_parent()?,
                FinishPhase::UpdateChildren => self.update_children()?,
                FinishPhase::Tag => self.tag()?,
                FinishPhase::DeleteBranch => self.delete_branch()?,
                FinishPhase::Done => break,
            }
        }

        self.store.clear()?;
        let ctx = self.hook_context();
        Hooks::new(self.repo).run_post(
            HookAction::Finish,
            &[
                &self.state.branch_name,
                &self.origin,
                &self.state.full_branch,
            ],
            &ctx,
            0,
        );
        println!(
            "{}",
            success_message(cformat!(
                "Finished <bold>{}</> into <bold>{}</>",
                self.state.full_branch,
                self.state.parent_branch
            ))
        );
        Ok(())
    }

    fn advance(&mut self) -> anyhow::Result<()> {
        self.state.phase = self.state.phase.next();
        self.store.save(&self.state)
    }

    /// Map a conflict to the resumable error, leaving the persisted state
    /// at the current phase; other git failures are wrapped as-is (the
    /// state also stays on disk so `--abort` still works).
    fn integration_error(&self, into: &str, source: &str, error: GitError) -> anyhow::Error {
        if error.is_conflict() {
            FlowError::MergeConflict {
                branch: source.to_string(),
                into: into.to_string(),
                resume_command: self.resume_command(),
            }
            .into()
        } else {
            FlowError::vcs(format!("integrate {source} into {into}"), error).into()
        }
    }

    // =========================================================================
    // Phase: merge_into_parent
    // =========================================================================

    fn merge_into_parent(&mut self) -> anyhow::Result<()> {
        let parent = self.state.parent_branch.clone();
        let full = self.state.full_branch.clone();

        if self.take_resume() {
            self.complete_parent_integration(&parent, &full)?;
        } else {
            self.start_parent_integration(&parent, &full)?;
        }
        self.advance()
    }

    fn start_parent_integration(&mut self, parent: &str, full: &str) -> anyhow::Result<()> {
        let result = match self.state.strategy {
            Strategy::Merge => {
                let message = self.profile.message.as_deref().map(|m| {
                    expand_placeholders(m, &self.state.branch_name, full, parent)
                });
                self.repo.checkout(parent).and_then(|()| {
                    self.repo.merge(
                        full,
                        MergeRequest {
                            no_ff: self.profile.no_ff,
                            message: message.as_deref(),
                        },
                    )
                })
            }
            Strategy::Rebase => self
                .repo
                .checkout(full)
                .and_then(|()| self.repo.rebase(parent, self.profile.preserve_merges))
                .and_then(|()| self.repo.checkout(parent))
                .and_then(|()| self.repo.fast_forward(full)),
            Strategy::Squash => {
                // Recorded at state creation; the profile fallback covers a
                // hand-edited state file
                let squash_message = self
                    .state
                    .squash_message
                    .clone()
                    .unwrap_or_else(|| self.profile.squash_message(full));
                self.repo
                    .checkout(parent)
                    .and_then(|()| self.repo.merge_squash(full))
                    .and_then(|()| self.repo.commit(&squash_message))
            }
        };
        result.map_err(|e| self.integration_error(parent, full, e))
    }

    /// Finish the parent integration the user resolved by hand.
    fn complete_parent_integration(&mut self, parent: &str, full: &str) -> anyhow::Result<()> {
        match self.state.strategy {
            Strategy::Merge => {
                if self.repo.is_merging()? {
                    self.repo
                        .commit_in_progress_merge()
                        .map_err(|e| self.integration_error(parent, full, e))?;
                }
            }
            Strategy::Rebase => {
                if self.repo.is_rebasing()? {
                    self.repo
                        .rebase_continue()
                        .map_err(|e| self.integration_error(parent, full, e))?;
                }
                self.repo
                    .checkout(parent)
                    .and_then(|()| self.repo.fast_forward(full))
                    .map_err(|e| self.integration_error(parent, full, e))?;
            }
            Strategy::Squash => {
                // A conflicted squash leaves the resolution staged; conclude
                // it with the recorded message
                let squash_message = self
                    .state
                    .squash_message
                    .clone()
                    .unwrap_or_else(|| self.profile.squash_message(full));
                if !self.repo.is_clean()? {
                    self.repo
                        .commit(&squash_message)
                        .map_err(|e| self.integration_error(parent, full, e))?;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Phase: update_children
    // =========================================================================

    fn update_children(&mut self) -> anyhow::Result<()> {
        let parent = self.state.parent_branch.clone();

        if self.take_resume()
            && let Some(child) = self.state.current_child.clone()
        {
            self.complete_child_integration(&child, &parent)?;
            self.mark_child_updated(&child);
            self.store.save(&self.state)?;
        }

        while let Some(child) = self.state.child_branches.first().cloned() {
            let strategy = self
                .state
                .child_strategies
                .get(&child)
                .copied()
                .unwrap_or(Strategy::Merge);
            self.state.current_child = Some(child.clone());
            self.store.save(&self.state)?;

            println!(
                "{}",
                progress_message(cformat!(
                    "Updating <bold>{child}</> from <bold>{parent}</> ({strategy})"
                ))
            );
            self.integrate_child(&child, &parent, strategy)
                .map_err(|e| self.integration_error(&child, &parent, e))?;

            self.mark_child_updated(&child);
            self.store.save(&self.state)?;
        }

        self.advance()
    }

    fn integrate_child(&self, child: &str, parent: &str, strategy: Strategy) -> Result<(), GitError> {
        match strategy {
            Strategy::Merge => self.repo.checkout(child).and_then(|()| {
                self.repo.merge(
                    parent,
                    MergeRequest {
                        no_ff: false,
                        message: None,
                    },
                )
            }),
            Strategy::Rebase => self
                .repo
                .checkout(child)
                .and_then(|()| self.repo.rebase(parent, false)),
            Strategy::Squash => self
                .repo
                .checkout(child)
                .and_then(|()| self.repo.merge_squash(parent))
                .and_then(|()| {
                    self.repo
                        .commit(&format!("Squashed update from branch '{parent}'"))
                }),
        }
    }

    fn complete_child_integration(&mut self, child: &str, parent: &str) -> anyhow::Result<()> {
        let strategy = self
            .state
            .child_strategies
            .get(child)
            .copied()
            .unwrap_or(Strategy::Merge);
        match strategy {
            Strategy::Merge => {
                if self.repo.is_merging()? {
                    self.repo
                        .commit_in_progress_merge()
                        .map_err(|e| self.integration_error(child, parent, e))?;
                }
            }
            Strategy::Rebase => {
                if self.repo.is_rebasing()? {
                    self.repo
                        .rebase_continue()
                        .map_err(|e| self.integration_error(child, parent, e))?;
                }
            }
            Strategy::Squash => {
                if !self.repo.is_clean()? {
                    self.repo
                        .commit(&format!("Squashed update from branch '{parent}'"))
                        .map_err(|e| self.integration_error(child, parent, e))?;
                }
            }
        }
        Ok(())
    }

    fn mark_child_updated(&mut self, child: &str) {
        self.state.child_branches.retain(|b| b != child);
        self.state.updated_branches.push(child.to_string());
        self.state.current_child = None;
    }

    // =========================================================================
    // Phase: tag
    // =========================================================================

    fn tag(&mut self) -> anyhow::Result<()> {
        if !self.profile.tag {
            return self.advance();
        }

        let short = self.state.branch_name.clone();
        let parent = self.state.parent_branch.clone();
        let full = self.state.full_branch.clone();
        let tag_name = self.profile.tag_name.clone();

        // The message file is authoritative when present; the filter only
        // sees inline messages
        let message = if self.profile.message_file.is_some() {
            None
        } else {
            let base = expand_placeholders(&self.profile.base_message(&short), &short, &full, &parent);
            let ctx = self.hook_context();
            Some(Hooks::new(self.repo).run_filter(
                HookAction::Finish,
                "tag-message",
                &base,
                &[&tag_name, &base],
                &ctx,
            )?)
        };

        if self.repo.tag_exists(&tag_name)? {
            // A resumed finish may have created the tag before the interrupt
            log::debug!("tag {tag_name} already exists, keeping it");
        } else {
            self.repo
                .create_tag(
                    &tag_name,
                    &parent,
                    TagRequest {
                        sign: self.profile.sign,
                        signing_key: self.profile.signing_key.as_deref(),
                        message: message.as_deref(),
                        message_file: self.profile.message_file.as_deref(),
                    },
                )
                .map_err(|e| FlowError::vcs(format!("create tag {tag_name}"), e))?;
            println!(
                "{}",
                success_message(cformat!("Tagged <bold>{parent}</> as <bold>{tag_name}</>"))
            );
        }

        self.advance()
    }

    // =========================================================================
    // Phase: delete_branch
    // =========================================================================

    fn delete_branch(&mut self) -> anyhow::Result<()> {
        let parent = self.state.parent_branch.clone();
        let full = self.state.full_branch.clone();

        // Land the user on the parent; also required before deleting the
        // branch that might still be checked out
        self.repo
            .checkout(&parent)
            .map_err(|e| FlowError::vcs(format!("checkout {parent}"), e))?;

        if !self.profile.keep {
            if !self.profile.keep_local {
                // A squashed branch is never "merged" in git's eyes
                let force =
                    self.profile.force_delete || self.state.strategy == Strategy::Squash;
                self.repo
                    .delete_branch(&full, force)
                    .map_err(|e| FlowError::vcs(format!("delete {full}"), e))?;
            }
            if !self.profile.keep_remote && self.repo.remote_branch_exists(&self.origin, &full)? {
                self.repo
                    .push_delete(&self.origin, &full)
                    .map_err(|e| FlowError::vcs(format!("delete {full} on {}", self.origin), e))?;
            }
        }

        if self.profile.push {
            self.repo
                .push(&self.origin, &parent)
                .map_err(|e| FlowError::vcs(format!("push {parent}"), e))?;
            let tag_name = &self.profile.tag_name;
            if self.profile.tag && self.repo.tag_exists(tag_name)? {
                self.repo
                    .push(&self.origin, &format!("refs/tags/{tag_name}"))
                    .map_err(|e| FlowError::vcs(format!("push tag {tag_name}"), e))?;
            }
        }

        self.advance()
    }
}
