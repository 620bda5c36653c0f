//! Hook and filter execution.
//!
//! gitflow invokes external scripts at well-defined lifecycle points:
//!
//! - `pre-flow-<type>-<action>` may block the operation (nonzero exit),
//! - `post-flow-<type>-<action>` observes the outcome and can never fail it,
//! - `filter-flow-<type>-<action>-<subject>` transforms a value (version
//!   string, tag message) via stdout.
//!
//! Process spawning is centralized here so the three policy rules (the
//! executable-bit skip, per-class exit-code handling, and trailing-newline
//! trimming) are applied uniformly.

use std::path::{Path, PathBuf};

use crate::errors::FlowError;
use crate::git::{GitError, Repository};
use crate::shell_exec::Cmd;
use crate::styling::{eprint, format_with_gutter, warning_message};

/// Lifecycle actions hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum HookAction {
    Start,
    Finish,
    Publish,
    Track,
    Delete,
    Update,
}

/// The canonical environment passed to every hook, in addition to the
/// inherited environment.
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    /// Full branch name, e.g. `feature/login`
    pub branch: &'a str,
    /// Short branch name, e.g. `login`
    pub branch_name: &'a str,
    /// Branch type name, e.g. `feature`
    pub branch_type: &'a str,
    /// The branch this one is based on / integrates into
    pub base_branch: &'a str,
    /// The remote name, e.g. `origin`
    pub origin: &'a str,
    /// Version string, where meaningful
    pub version: Option<&'a str>,
}

/// Outcome of locating and running one hook executable.
#[derive(Debug)]
pub enum HookOutcome {
    /// No file at the candidate path: not an error, no transformation
    Absent,
    /// File exists but is not executable: silently skipped, matching git's
    /// own hook dispatch policy
    NotExecutable,
    /// The hook ran to completion
    Ran {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

/// Locator and executor for the hooks of one repository.
pub struct Hooks<'a> {
    repo: &'a Repository,
}

impl<'a> Hooks<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    /// The effective hooks directory, in discovery order:
    ///
    /// 1. `gitflow.path.hooks` (absolute, or relative to the worktree root),
    /// 2. `core.hooksPath` with the same rule,
    /// 3. the default hooks directory inside the git state area.
    pub fn dir(&self) -> Result<PathBuf, GitError> {
        for key in ["gitflow.path.hooks", "core.hooksPath"] {
            if let Some(configured) = self.repo.config_get(key)?
                && !configured.is_empty()
            {
                return Ok(self.resolve_dir(&configured));
            }
        }
        Ok(self.repo.git_dir()?.join("hooks"))
    }

    fn resolve_dir(&self, configured: &str) -> PathBuf {
        let expanded = shellexpand::tilde(configured);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo.work_root().join(path)
        }
    }

    /// Run one hook executable with the canonical environment and argument
    /// vector, capturing its output.
    fn invoke(
        &self,
        hook_name: &str,
        args: &[&str],
        ctx: &HookContext<'_>,
        exit_code: Option<i32>,
    ) -> Result<HookOutcome, FlowError> {
        let dir = self
            .dir()
            .map_err(|e| FlowError::vcs("locate hooks directory", e))?;
        let path = dir.join(hook_name);

        if !path.exists() {
            return Ok(HookOutcome::Absent);
        }
        if !is_executable(&path) {
            log::debug!("hook {} exists but is not executable, skipping", hook_name);
            return Ok(HookOutcome::NotExecutable);
        }

        let mut cmd = Cmd::new(path.to_string_lossy().into_owned())
            .args(args.iter().copied())
            .current_dir(self.repo.work_root())
            .env("BRANCH", ctx.branch)
            .env("BRANCH_NAME", ctx.branch_name)
            .env("BRANCH_TYPE", ctx.branch_type)
            .env("BASE_BRANCH", ctx.base_branch)
            .env("ORIGIN", ctx.origin);
        if let Some(version) = ctx.version {
            cmd = cmd.env("VERSION", version);
        }
        if let Some(code) = exit_code {
            cmd = cmd.env("EXIT_CODE", code.to_string());
        }

        let output = cmd.run().map_err(|e| {
            FlowError::vcs(
                format!("run hook {hook_name}"),
                GitError::CommandFailed {
                    command: hook_name.to_string(),
                    output: e.to_string(),
                },
            )
        })?;

        Ok(HookOutcome::Ran {
            exit_code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run `pre-flow-<type>-<action>`. A nonzero exit blocks the operation.
    pub fn run_pre(
        &self,
        action: HookAction,
        args: &[&str],
        ctx: &HookContext<'_>,
    ) -> Result<(), FlowError> {
        let hook_name = format!("pre-flow-{}-{}", ctx.branch_type, action);
        match self.invoke(&hook_name, args, ctx, None)? {
            HookOutcome::Absent | HookOutcome::NotExecutable => Ok(()),
            HookOutcome::Ran {
                exit_code, stderr, ..
            } => {
                if exit_code == 0 {
                    Ok(())
                } else {
                    // Show the hook's own complaint before the error
                    if !stderr.trim().is_empty() {
                        eprint!("{}", format_with_gutter(stderr.trim(), "", None));
                    }
                    Err(FlowError::HookFailed {
                        hook: hook_name,
                        exit_code,
                        stderr,
                    })
                }
            }
        }
    }

    /// Run `post-flow-<type>-<action>`. The exit code is reported but NEVER
    /// promoted to a failure of the overall operation.
    pub fn run_post(
        &self,
        action: HookAction,
        args: &[&str],
        ctx: &HookContext<'_>,
        operation_exit_code: i32,
    ) {
        let hook_name = format!("post-flow-{}-{}", ctx.branch_type, action);
        match self.invoke(&hook_name, args, ctx, Some(operation_exit_code)) {
            Ok(HookOutcome::Ran {
                exit_code, stderr, ..
            }) if exit_code != 0 => {
                eprint!(
                    "{}\n",
                    warning_message(format!("Hook {hook_name} exited with code {exit_code}"))
                );
                if !stderr.trim().is_empty() {
                    eprint!("{}", format_with_gutter(stderr.trim(), "", None));
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::debug!("post hook {hook_name} could not be run: {e}");
            }
        }
    }

    /// Run `filter-flow-<type>-<action>-<subject>` on a value.
    ///
    /// `args` is the full argument vector (for most subjects the value to
    /// transform is argument 1; the tag-message filter gets the tag name
    /// first and the base message second). An absent or non-executable hook
    /// keeps `original`; so does a zero-exit hook with empty stdout.
    /// Nonempty stdout (trimmed of one trailing newline) replaces the
    /// value. A nonzero exit is a hard failure.
    pub fn run_filter(
        &self,
        action: HookAction,
        subject: &str,
        original: &str,
        args: &[&str],
        ctx: &HookContext<'_>,
    ) -> Result<String, FlowError> {
        let hook_name = format!("filter-flow-{}-{}-{}", ctx.branch_type, action, subject);
        match self.invoke(&hook_name, args, ctx, None)? {
            HookOutcome::Absent | HookOutcome::NotExecutable => Ok(original.to_string()),
            HookOutcome::Ran {
                exit_code,
                stdout,
                stderr,
            } => {
                if exit_code != 0 {
                    return Err(FlowError::HookFailed {
                        hook: hook_name,
                        exit_code,
                        stderr,
                    });
                }
                let transformed = trim_trailing_newline(&stdout);
                if transformed.is_empty() {
                    Ok(original.to_string())
                } else {
                    Ok(transformed.to_string())
                }
            }
        }
    }
}

/// Strip exactly one trailing newline (`\n` or `\r\n`).
fn trim_trailing_newline(text: &str) -> &str {
    text.strip_suffix('\n')
        .map(|t| t.strip_suffix('\r').unwrap_or(t))
        .unwrap_or(text)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

// Windows has no executable bit; existence is enough, matching git.
#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}
