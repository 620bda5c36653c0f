//! Flow-level error kinds and their stable exit codes.
//!
//! Every failure a command can surface is one of these variants, each mapped
//! to a stable exit code so scripts can react:
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | not initialized |
//! | 2 | invalid input |
//! | 3 | underlying git failure |
//! | 4 | branch already exists |
//! | 5 | branch not found |
//! | 6 | validation failure |
//! | 7 | conflict: user action required (resumable) |

use crate::git::GitError;

/// Exit code for "conflict: user action required". Scripts detect the
/// resumable state by this code.
pub const EXIT_CONFLICT: i32 = 7;

#[derive(Debug)]
pub enum FlowError {
    /// The repository has no gitflow configuration
    NotInitialized,
    /// Bad flag combination, unknown branch type, invalid strategy name
    InvalidInput { message: String },
    /// A branch name was required but missing
    EmptyName,
    /// A branch name contains characters git refuses
    InvalidName { name: String },
    /// Creating a branch that already exists
    BranchExists { branch: String },
    /// An operand branch is absent
    BranchNotFound { branch: String },
    /// Publish target already exists on the remote
    RemoteBranchExists { remote: String, branch: String },
    /// Track target does not exist on the remote
    RemoteBranchNotFound { remote: String, branch: String },
    /// Integration stopped on conflicts; the merge state is preserved
    MergeConflict {
        branch: String,
        into: String,
        /// What the user should run after resolving
        resume_command: String,
    },
    /// A fresh finish was attempted while a merge state exists
    OperationInProgress,
    /// `--continue` or `--abort` without a saved merge state
    NoOperationInProgress,
    /// `--continue` while git still reports unmerged paths
    UnresolvedConflicts { paths: Vec<String> },
    /// The branch-type configuration contains a parent cycle
    CircularDependency { branch_type: String },
    /// The operand is a branch other branch types depend on
    HasDependents {
        branch: String,
        dependents: Vec<String>,
    },
    /// `init` without `--force` on an initialized repository
    AlreadyInitialized,
    /// A pre- or filter-hook exited nonzero
    HookFailed {
        hook: String,
        exit_code: i32,
        stderr: String,
    },
    /// Wrapped underlying git failure with the operation that hit it
    Vcs { operation: String, source: GitError },
}

impl FlowError {
    /// Shorthand for [`FlowError::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        FlowError::InvalidInput {
            message: message.into(),
        }
    }

    /// Wrap a git failure. Promoting conflicts to the resumable kind is the
    /// orchestrator's job, not this constructor's.
    pub fn vcs(operation: impl Into<String>, source: GitError) -> Self {
        FlowError::Vcs {
            operation: operation.into(),
            source,
        }
    }

    /// The stable exit code for this kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            FlowError::NotInitialized => 1,
            FlowError::InvalidInput { .. } => 2,
            FlowError::Vcs { .. } => 3,
            FlowError::BranchExists { .. } | FlowError::RemoteBranchExists { .. } => 4,
            FlowError::BranchNotFound { .. } | FlowError::RemoteBranchNotFound { .. } => 5,
            FlowError::EmptyName
            | FlowError::InvalidName { .. }
            | FlowError::OperationInProgress
            | FlowError::NoOperationInProgress
            | FlowError::CircularDependency { .. }
            | FlowError::HasDependents { .. }
            | FlowError::AlreadyInitialized
            | FlowError::HookFailed { .. } => 6,
            FlowError::MergeConflict { .. } | FlowError::UnresolvedConflicts { .. } => {
                EXIT_CONFLICT
            }
        }
    }
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::styling::{
            ERROR, ERROR_BOLD, ERROR_EMOJI, HINT, HINT_EMOJI, format_with_gutter,
        };

        match self {
            FlowError::NotInitialized => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Not a gitflow-enabled repository{ERROR:#}\n\n{HINT_EMOJI} {HINT}Run 'git-flow init' first{HINT:#}"
                )
            }
            FlowError::InvalidInput { message } => {
                write!(f, "{ERROR_EMOJI} {ERROR}{message}{ERROR:#}")
            }
            FlowError::EmptyName => {
                write!(f, "{ERROR_EMOJI} {ERROR}A branch name is required{ERROR:#}")
            }
            FlowError::InvalidName { name } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Branch name {ERROR_BOLD}{name}{ERROR_BOLD:#}{ERROR} is not a valid ref name{ERROR:#}"
                )
            }
            FlowError::BranchExists { branch } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Branch {ERROR_BOLD}{branch}{ERROR_BOLD:#}{ERROR} already exists{ERROR:#}"
                )
            }
            FlowError::BranchNotFound { branch } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Branch {ERROR_BOLD}{branch}{ERROR_BOLD:#}{ERROR} does not exist locally{ERROR:#}"
                )
            }
            FlowError::RemoteBranchExists { remote, branch } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Branch {ERROR_BOLD}{branch}{ERROR_BOLD:#}{ERROR} already exists on {ERROR_BOLD}{remote}{ERROR_BOLD:#}{ERROR:#}"
                )
            }
            FlowError::RemoteBranchNotFound { remote, branch } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Branch {ERROR_BOLD}{branch}{ERROR_BOLD:#}{ERROR} does not exist on {ERROR_BOLD}{remote}{ERROR_BOLD:#}{ERROR:#}\n\n{HINT_EMOJI} {HINT}Fetch first, or check the name{HINT:#}"
                )
            }
            FlowError::MergeConflict {
                branch,
                into,
                resume_command,
            } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Conflicts while integrating {ERROR_BOLD}{branch}{ERROR_BOLD:#}{ERROR} into {ERROR_BOLD}{into}{ERROR_BOLD:#}{ERROR:#}\n\n{HINT_EMOJI} {HINT}Resolve the conflicts, stage the files, then run '{resume_command}'{HINT:#}\n{HINT_EMOJI} {HINT}Or discard the whole operation with '--abort'{HINT:#}"
                )
            }
            FlowError::OperationInProgress => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}A finish is already in progress{ERROR:#}\n\n{HINT_EMOJI} {HINT}Use --continue to resume it or --abort to discard it{HINT:#}"
                )
            }
            FlowError::NoOperationInProgress => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}No operation in progress{ERROR:#}"
                )
            }
            FlowError::UnresolvedConflicts { paths } => {
                writeln!(
                    f,
                    "{ERROR_EMOJI} {ERROR}There are still unresolved conflicts:{ERROR:#}"
                )?;
                write!(f, "{}", format_with_gutter(&paths.join("\n"), "", None))?;
                write!(
                    f,
                    "\n{HINT_EMOJI} {HINT}Resolve them and stage the files, then run --continue again{HINT:#}"
                )
            }
            FlowError::CircularDependency { branch_type } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Branch type {ERROR_BOLD}{branch_type}{ERROR_BOLD:#}{ERROR} is its own ancestor: the parent configuration forms a cycle{ERROR:#}"
                )
            }
            FlowError::HasDependents { branch, dependents } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Branch {ERROR_BOLD}{branch}{ERROR_BOLD:#}{ERROR} cannot be deleted: {} depend on it{ERROR:#}",
                    dependents.join(", ")
                )
            }
            FlowError::AlreadyInitialized => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Repository is already initialized{ERROR:#}\n\n{HINT_EMOJI} {HINT}Use --force to overwrite the existing configuration{HINT:#}"
                )
            }
            FlowError::HookFailed {
                hook,
                exit_code,
                stderr,
            } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Hook {ERROR_BOLD}{hook}{ERROR_BOLD:#}{ERROR} rejected the operation (exit code {exit_code}){ERROR:#}"
                )?;
                if !stderr.trim().is_empty() {
                    writeln!(f)?;
                    write!(f, "{}", format_with_gutter(stderr.trim(), "", None))?;
                }
                Ok(())
            }
            FlowError::Vcs { operation, source } => {
                write!(f, "{source}\n{HINT_EMOJI} {HINT}while: {operation}{HINT:#}")
            }
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlowError::Vcs { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Walk an anyhow error chain looking for a flow or git error and return the
/// exit code the process should use.
pub fn exit_code(error: &anyhow::Error) -> Option<i32> {
    for cause in error.chain() {
        if let Some(flow) = cause.downcast_ref::<FlowError>() {
            return Some(flow.exit_code());
        }
        if let Some(git) = cause.downcast_ref::<GitError>() {
            return Some(if git.is_conflict() { EXIT_CONFLICT } else { 3 });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(FlowError::NotInitialized.exit_code(), 1);
        assert_eq!(FlowError::invalid_input("x").exit_code(), 2);
        assert_eq!(
            FlowError::vcs(
                "merge",
                GitError::CommandFailed {
                    command: "git merge".into(),
                    output: String::new()
                }
            )
            .exit_code(),
            3
        );
        assert_eq!(
            FlowError::BranchExists {
                branch: "feature/x".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(
            FlowError::BranchNotFound {
                branch: "feature/x".into()
            }
            .exit_code(),
            5
        );
        assert_eq!(FlowError::AlreadyInitialized.exit_code(), 6);
        assert_eq!(
            FlowError::MergeConflict {
                branch: "feature/x".into(),
                into: "develop".into(),
                resume_command: "git-flow feature finish x --continue".into()
            }
            .exit_code(),
            EXIT_CONFLICT
        );
        assert_eq!(
            FlowError::UnresolvedConflicts { paths: vec![] }.exit_code(),
            EXIT_CONFLICT
        );
    }

    #[test]
    fn test_exit_code_walks_anyhow_chain() {
        let err = anyhow::Error::from(FlowError::NotInitialized).context("while finishing");
        assert_eq!(exit_code(&err), Some(1));

        let err = anyhow::Error::from(GitError::MergeConflict {
            output: "CONFLICT".into(),
        })
        .context("integrating");
        assert_eq!(exit_code(&err), Some(EXIT_CONFLICT));

        let err = anyhow::anyhow!("opaque");
        assert_eq!(exit_code(&err), None);
    }
}
