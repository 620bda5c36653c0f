//! Repository - git repository operations.
//!
//! [`Repository`] is a handle on one working tree of a git repository. All
//! operations shell out to git through [`Cmd`](crate::shell_exec::Cmd) and
//! classify failures into [`GitError`] variants.
//!
//! The per-worktree git directory is re-queried on every
//! [`git_dir()`](Repository::git_dir) call rather than cached: linked
//! worktrees each have their own state directory, and a cached "the state
//! dir is `.git`" assumption is wrong the moment one is in use.

use std::path::{Path, PathBuf};
use std::process::Output;

use dunce::canonicalize;

use crate::shell_exec::Cmd;

use super::error::classify;
use super::{BranchComparison, GitError};

/// What kind of integration to perform for [`Repository::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRequest<'a> {
    /// Force a merge commit even when fast-forward is possible
    pub no_ff: bool,
    /// Override the merge commit message
    pub message: Option<&'a str>,
}

/// Options for [`Repository::create_tag`].
#[derive(Debug, Clone, Default)]
pub struct TagRequest<'a> {
    /// Sign the tag (`-s`); with a key, `-u <key>`
    pub sign: bool,
    pub signing_key: Option<&'a str>,
    /// Inline message (`-m`); ignored when `message_file` is set
    pub message: Option<&'a str>,
    /// Read the message from a file (`-F`); takes precedence over `message`
    pub message_file: Option<&'a Path>,
}

/// Handle on one working tree of a git repository.
///
/// # Examples
///
/// ```no_run
/// use gitflow::git::Repository;
///
/// let repo = Repository::discover(".")?;
/// if let Some(branch) = repo.current_branch()? {
///     println!("on {branch}");
/// }
/// # Ok::<(), gitflow::git::GitError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Repository {
    /// Root of the working tree; every git command runs from here.
    work_root: PathBuf,
}

impl Repository {
    /// Discover the repository containing `path`.
    pub fn discover(path: impl Into<PathBuf>) -> Result<Self, GitError> {
        let path = path.into();
        let output = Cmd::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(&path)
            .run()
            .map_err(|e| GitError::CommandFailed {
                command: "git rev-parse --show-toplevel".into(),
                output: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(classify("git rev-parse --show-toplevel".into(), &output));
        }
        let top = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let work_root = canonicalize(PathBuf::from(top)).map_err(|e| GitError::CommandFailed {
            command: "canonicalize worktree root".into(),
            output: e.to_string(),
        })?;
        Ok(Self { work_root })
    }

    /// The root of this working tree.
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Short display name for logging context.
    fn logging_context(&self) -> String {
        self.work_root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(".")
            .to_string()
    }

    /// Run a git command in this worktree and return the raw Output.
    ///
    /// Use this when a non-zero exit is not an error condition (config
    /// probes, ref existence checks).
    pub fn run_git_raw(&self, args: &[&str]) -> Result<Output, GitError> {
        Cmd::new("git")
            .args(args.iter().copied())
            .current_dir(&self.work_root)
            .context(self.logging_context())
            .run()
            .map_err(|e| GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                output: e.to_string(),
            })
    }

    /// Run a git command in this worktree and return stdout, classifying failures.
    pub fn run_git(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run_git_raw(args)?;
        if !output.status.success() {
            return Err(classify(format!("git {}", args.join(" ")), &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    // =========================================================================
    // Repository inspection
    // =========================================================================

    /// The per-worktree git directory (state area).
    ///
    /// For linked worktrees this is `.git/worktrees/<name>`, distinct from
    /// the shared object store. Queried from git on every call.
    pub fn git_dir(&self) -> Result<PathBuf, GitError> {
        let stdout = self.run_git(&["rev-parse", "--git-dir"])?;
        let path = PathBuf::from(stdout.trim());
        let absolute = if path.is_relative() {
            self.work_root.join(path)
        } else {
            path
        };
        canonicalize(&absolute).map_err(|e| GitError::CommandFailed {
            command: "canonicalize git dir".into(),
            output: e.to_string(),
        })
    }

    /// The branch checked out in this worktree, or None for detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        let stdout = self.run_git(&["branch", "--show-current"])?;
        let branch = stdout.trim();
        Ok((!branch.is_empty()).then(|| branch.to_string()))
    }

    /// Whether a local branch exists.
    pub fn branch_exists(&self, branch: &str) -> Result<bool, GitError> {
        let output = self.run_git_raw(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ])?;
        Ok(output.status.success())
    }

    /// Whether a branch exists on the named remote (local knowledge only;
    /// does not contact the remote).
    pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool, GitError> {
        let output = self.run_git_raw(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/remotes/{remote}/{branch}"),
        ])?;
        Ok(output.status.success())
    }

    /// Whether a tag exists.
    pub fn tag_exists(&self, tag: &str) -> Result<bool, GitError> {
        let output =
            self.run_git_raw(&["show-ref", "--verify", "--quiet", &format!("refs/tags/{tag}")])?;
        Ok(output.status.success())
    }

    /// All local branch names, sorted by refname.
    pub fn local_branches(&self) -> Result<Vec<String>, GitError> {
        let stdout = self.run_git(&[
            "for-each-ref",
            "--format=%(refname:short)",
            "--sort=refname",
            "refs/heads",
        ])?;
        Ok(stdout.lines().map(|l| l.trim().to_string()).collect())
    }

    /// Resolve a ref to its commit id.
    pub fn rev_parse(&self, reference: &str) -> Result<String, GitError> {
        let stdout = self.run_git(&["rev-parse", "--verify", &format!("{reference}^{{commit}}")])?;
        Ok(stdout.trim().to_string())
    }

    /// The upstream tracking ref of a branch (e.g. `origin/develop`), if configured.
    pub fn tracked_upstream(&self, branch: &str) -> Result<Option<String>, GitError> {
        let output = self.run_git_raw(&[
            "rev-parse",
            "--abbrev-ref",
            "--symbolic-full-name",
            &format!("{branch}@{{upstream}}"),
        ])?;
        if !output.status.success() {
            return Ok(None); // No upstream configured
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!name.is_empty()).then_some(name))
    }

    /// Whether the working tree has no uncommitted changes.
    pub fn is_clean(&self) -> Result<bool, GitError> {
        let stdout = self.run_git(&["status", "--porcelain"])?;
        Ok(stdout.trim().is_empty())
    }

    /// Whether a merge is in progress in this worktree.
    pub fn is_merging(&self) -> Result<bool, GitError> {
        Ok(self.git_dir()?.join("MERGE_HEAD").exists())
    }

    /// Whether a rebase is in progress in this worktree.
    pub fn is_rebasing(&self) -> Result<bool, GitError> {
        let git_dir = self.git_dir()?;
        Ok(git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists())
    }

    /// Paths git still reports as unmerged.
    pub fn unresolved_paths(&self) -> Result<Vec<String>, GitError> {
        let stdout = self.run_git(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(stdout
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    // =========================================================================
    // Branch operations
    // =========================================================================

    /// Create a branch at `base` without checking it out.
    pub fn create_branch(&self, branch: &str, base: &str) -> Result<(), GitError> {
        self.run_git(&["branch", "--no-track", branch, base])?;
        Ok(())
    }

    /// Check out a branch.
    pub fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.run_git(&["checkout", branch])?;
        Ok(())
    }

    /// Create a branch and check it out.
    pub fn checkout_new(&self, branch: &str, base: &str) -> Result<(), GitError> {
        self.run_git(&["checkout", "-b", branch, base])?;
        Ok(())
    }

    /// Delete a local branch. Returns Ok(false) if it was already gone.
    pub fn delete_branch(&self, branch: &str, force: bool) -> Result<bool, GitError> {
        let flag = if force { "-D" } else { "-d" };
        let output = self.run_git_raw(&["branch", flag, branch])?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not found") {
            return Ok(false); // Already gone
        }
        Err(classify(format!("git branch {flag} {branch}"), &output))
    }

    /// Fetch a remote.
    pub fn fetch(&self, remote: &str) -> Result<(), GitError> {
        self.run_git(&["fetch", "-q", remote])?;
        Ok(())
    }

    /// Push a ref to a remote.
    pub fn push(&self, remote: &str, refspec: &str) -> Result<(), GitError> {
        self.run_git(&["push", remote, refspec])?;
        Ok(())
    }

    /// Push a branch and set it as upstream.
    pub fn push_set_upstream(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run_git(&["push", "-u", remote, &format!("{branch}:refs/heads/{branch}")])?;
        Ok(())
    }

    /// Delete a branch on a remote. Returns Ok(false) if it was already gone.
    pub fn push_delete(&self, remote: &str, branch: &str) -> Result<bool, GitError> {
        let refspec = format!(":refs/heads/{branch}");
        let output = self.run_git_raw(&["push", remote, &refspec])?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("remote ref does not exist") {
            return Ok(false); // Already gone
        }
        Err(classify(format!("git push {remote} {refspec}"), &output))
    }

    /// Fast-forward the current branch to `target`. Fails if not a fast-forward.
    pub fn fast_forward(&self, target: &str) -> Result<(), GitError> {
        self.run_git(&["merge", "--ff-only", target])?;
        Ok(())
    }

    // =========================================================================
    // Integration
    // =========================================================================

    /// Merge `source` into the current branch.
    ///
    /// Conflicts surface as [`GitError::MergeConflict`]; the merge is left
    /// in progress for the user to resolve or abort.
    pub fn merge(&self, source: &str, request: MergeRequest<'_>) -> Result<(), GitError> {
        let mut args = vec!["merge", "--no-edit"];
        if request.no_ff {
            args.push("--no-ff");
        }
        if let Some(message) = request.message {
            args.push("-m");
            args.push(message);
        }
        args.push(source);
        self.run_git(&args)?;
        Ok(())
    }

    /// Stage a squashed copy of `source` onto the current branch (no commit).
    pub fn merge_squash(&self, source: &str) -> Result<(), GitError> {
        self.run_git(&["merge", "--squash", source])?;
        Ok(())
    }

    /// Commit the index with a message.
    pub fn commit(&self, message: &str) -> Result<(), GitError> {
        self.run_git(&["commit", "--no-verify", "-m", message])?;
        Ok(())
    }

    /// Conclude an in-progress merge keeping the prepared message.
    pub fn commit_in_progress_merge(&self) -> Result<(), GitError> {
        self.run_git(&["commit", "--no-edit", "--no-verify"])?;
        Ok(())
    }

    /// Rebase the current branch onto `target`.
    pub fn rebase(&self, target: &str, preserve_merges: bool) -> Result<(), GitError> {
        let mut args = vec!["rebase"];
        if preserve_merges {
            args.push("--rebase-merges");
        }
        args.push(target);
        self.run_git(&args)?;
        Ok(())
    }

    /// Continue an interrupted rebase after the user resolved conflicts.
    pub fn rebase_continue(&self) -> Result<(), GitError> {
        // GIT_EDITOR=true keeps git from opening an editor for the
        // replayed commit messages.
        let output = Cmd::new("git")
            .args(["rebase", "--continue"])
            .current_dir(&self.work_root)
            .context(self.logging_context())
            .env("GIT_EDITOR", "true")
            .run()
            .map_err(|e| GitError::CommandFailed {
                command: "git rebase --continue".into(),
                output: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(classify("git rebase --continue".into(), &output));
        }
        Ok(())
    }

    /// Abort an in-progress merge.
    pub fn abort_merge(&self) -> Result<(), GitError> {
        self.run_git(&["merge", "--abort"])?;
        Ok(())
    }

    /// Abort an in-progress rebase.
    pub fn abort_rebase(&self) -> Result<(), GitError> {
        self.run_git(&["rebase", "--abort"])?;
        Ok(())
    }

    /// Reset away a conflicted index that has no MERGE_HEAD (a stopped
    /// squash merge leaves one behind).
    pub fn reset_merge(&self) -> Result<(), GitError> {
        self.run_git(&["reset", "--merge"])?;
        Ok(())
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Create an annotated (optionally signed) tag at `target`.
    pub fn create_tag(
        &self,
        name: &str,
        target: &str,
        request: TagRequest<'_>,
    ) -> Result<(), GitError> {
        let mut args: Vec<String> = vec!["tag".into()];
        if let Some(key) = request.signing_key {
            args.push("-u".into());
            args.push(key.into());
        } else if request.sign {
            args.push("-s".into());
        } else {
            args.push("-a".into());
        }
        // Message file takes precedence over an inline message
        if let Some(file) = request.message_file {
            args.push("-F".into());
            args.push(file.to_string_lossy().into_owned());
        } else if let Some(message) = request.message {
            args.push("-m".into());
            args.push(message.into());
        }
        args.push(name.into());
        args.push(target.into());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_git(&arg_refs)?;
        Ok(())
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    /// Classify `local` against `remote_ref` using the ref graph.
    pub fn compare(&self, local: &str, remote_ref: &str) -> Result<BranchComparison, GitError> {
        let range = format!("{local}...{remote_ref}");
        let stdout = self.run_git(&["rev-list", "--left-right", "--count", &range])?;
        let mut parts = stdout.split_whitespace();
        let ahead: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| GitError::CommandFailed {
                command: format!("git rev-list --left-right --count {range}"),
                output: stdout.clone(),
            })?;
        let behind: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| GitError::CommandFailed {
                command: format!("git rev-list --left-right --count {range}"),
                output: stdout.clone(),
            })?;
        Ok(match (ahead, behind) {
            (0, 0) => BranchComparison::Equal,
            (a, 0) => BranchComparison::Ahead(a),
            (0, b) => BranchComparison::Behind(b),
            (a, b) => BranchComparison::Diverged {
                ahead: a,
                behind: b,
            },
        })
    }

    /// Number of commits reachable from `reference`.
    pub fn commit_count(&self, reference: &str) -> Result<usize, GitError> {
        let stdout = self.run_git(&["rev-list", "--count", reference])?;
        stdout
            .trim()
            .parse()
            .map_err(|_| GitError::CommandFailed {
                command: format!("git rev-list --count {reference}"),
                output: stdout,
            })
    }
}
