//! Git error types, classification, and formatting

use std::process::Output;

/// A classified failure from the underlying git invocation.
///
/// Every git command goes through [`classify`] so callers can match on the
/// failure class instead of scraping stderr themselves.
#[derive(Debug)]
pub enum GitError {
    /// Remote/transport failure (network, auth, missing remote)
    Transport { operation: String, output: String },
    /// A ref the operation needed does not exist
    RefNotFound { reference: String },
    /// Merge, rebase, or squash stopped on conflicts
    MergeConflict { output: String },
    /// The working tree has local changes the operation refuses to touch
    DirtyWorkingTree { output: String },
    /// Filesystem or object-store permission failure
    PermissionDenied { output: String },
    /// A config value could not be interpreted (e.g. a non-boolean where
    /// "true"/"false" is required)
    ConfigValue { key: String, value: String },
    /// Anything git reported that we could not classify
    CommandFailed { command: String, output: String },
}

impl GitError {
    /// Whether this failure is a merge/rebase conflict the user can resolve.
    pub fn is_conflict(&self) -> bool {
        matches!(self, GitError::MergeConflict { .. })
    }
}

/// Classify a failed git invocation into a [`GitError`].
///
/// `command` is the command line for the fallback variant; classification
/// looks at stderr first, then stdout (git prints conflict notices to
/// stdout for `merge`).
pub fn classify(command: String, output: &Output) -> GitError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let combined = format!("{}\n{}", stdout.trim(), stderr.trim());
    let text = combined.trim().to_string();

    if is_conflict_output(&combined) {
        return GitError::MergeConflict { output: text };
    }
    if combined.contains("unknown revision or path not in the working tree")
        || combined.contains("not a valid ref")
        || combined.contains("no such ref")
        || combined.contains("couldn't find remote ref")
        || combined.contains("did not match any file(s) known to git")
    {
        return GitError::RefNotFound {
            reference: extract_quoted(&combined).unwrap_or_else(|| text.clone()),
        };
    }
    if combined.contains("Could not read from remote repository")
        || combined.contains("unable to access")
        || combined.contains("Connection refused")
        || combined.contains("Could not resolve host")
        || combined.contains("does not appear to be a git repository")
    {
        return GitError::Transport {
            operation: command,
            output: text,
        };
    }
    if combined.contains("Permission denied") || combined.contains("insufficient permission") {
        return GitError::PermissionDenied { output: text };
    }
    if combined.contains("Your local changes to the following files would be overwritten")
        || combined.contains("working tree is not clean")
        || combined.contains("cannot pull with rebase: You have unstaged changes")
        || combined.contains("Please commit your changes or stash them")
    {
        return GitError::DirtyWorkingTree { output: text };
    }

    GitError::CommandFailed {
        command,
        output: text,
    }
}

fn is_conflict_output(text: &str) -> bool {
    text.contains("CONFLICT (")
        || text.contains("Automatic merge failed")
        || text.contains("could not apply")
        || text.contains("fix conflicts and then commit the result")
        || text.contains("Resolve all conflicts manually")
}

/// Pull the first 'single-quoted' token out of a git message, if any.
fn extract_quoted(text: &str) -> Option<String> {
    let start = text.find('\'')?;
    let rest = &text[start + 1..];
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::styling::{
            ERROR, ERROR_BOLD, ERROR_EMOJI, HINT, HINT_EMOJI, format_with_gutter,
        };

        match self {
            GitError::Transport { operation, output } => {
                writeln!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Remote operation failed: {ERROR_BOLD}{operation}{ERROR_BOLD:#}{ERROR:#}"
                )?;
                write!(f, "{}", format_with_gutter(output, "", None))
            }
            GitError::RefNotFound { reference } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Ref {ERROR_BOLD}{reference}{ERROR_BOLD:#}{ERROR} not found{ERROR:#}"
                )
            }
            GitError::MergeConflict { output } => {
                writeln!(f, "{ERROR_EMOJI} {ERROR}Merge stopped on conflicts{ERROR:#}")?;
                write!(f, "{}", format_with_gutter(output, "", None))
            }
            GitError::DirtyWorkingTree { output } => {
                writeln!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Working tree has local changes{ERROR:#}"
                )?;
                if !output.is_empty() {
                    write!(f, "{}", format_with_gutter(output, "", None))?;
                }
                write!(
                    f,
                    "\n{HINT_EMOJI} {HINT}Commit or stash them first{HINT:#}"
                )
            }
            GitError::PermissionDenied { output } => {
                writeln!(f, "{ERROR_EMOJI} {ERROR}Permission denied{ERROR:#}")?;
                write!(f, "{}", format_with_gutter(output, "", None))
            }
            GitError::ConfigValue { key, value } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Config key {ERROR_BOLD}{key}{ERROR_BOLD:#}{ERROR} has invalid boolean value {ERROR_BOLD}{value:?}{ERROR_BOLD:#}{ERROR} (expected \"true\" or \"false\"){ERROR:#}"
                )
            }
            GitError::CommandFailed { command, output } => {
                writeln!(
                    f,
                    "{ERROR_EMOJI} {ERROR}git command failed: {ERROR_BOLD}{command}{ERROR_BOLD:#}{ERROR:#}"
                )?;
                write!(f, "{}", format_with_gutter(output, "", None))
            }
        }
    }
}

impl std::error::Error for GitError {}
