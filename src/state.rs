//! Persistence for the in-progress finish operation.
//!
//! A finish that stops on conflicts must survive the process exiting: the
//! state is written to `gitflow/state/merge.toml` inside the *per-worktree*
//! git directory, so two worktrees of the same repository have disjoint
//! merge states. Saves are atomic (temp file + rename) so a crash mid-write
//! never leaves a torn file.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::branch_type::Strategy;
use crate::git::Repository;

/// The phases of a finish, in execution order. Transitions are monotonic;
/// only `--abort` leaves the sequence, via the discard path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishPhase {
    MergeIntoParent,
    UpdateChildren,
    Tag,
    DeleteBranch,
    Done,
}

impl FinishPhase {
    /// The next phase in the total order.
    pub fn next(self) -> Self {
        match self {
            FinishPhase::MergeIntoParent => FinishPhase::UpdateChildren,
            FinishPhase::UpdateChildren => FinishPhase::Tag,
            FinishPhase::Tag => FinishPhase::DeleteBranch,
            FinishPhase::DeleteBranch => FinishPhase::Done,
            FinishPhase::Done => FinishPhase::Done,
        }
    }
}

/// Persistent record of an in-progress finish. Field names are an external
/// contract: they appear verbatim in the on-disk TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeState {
    /// Operation tag; currently always `finish`
    pub action: String,
    /// Branch type name
    pub branch_type: String,
    /// Short branch name
    pub branch_name: String,
    /// Full branch name (with prefix)
    pub full_branch: String,
    /// The branch being integrated into
    pub parent_branch: String,
    /// Integration strategy for the parent merge
    pub strategy: Strategy,
    /// Current phase
    pub phase: FinishPhase,
    /// Children still needing the post-integration update, in order
    pub child_branches: Vec<String>,
    /// Children already updated
    pub updated_branches: Vec<String>,
    /// The child currently being integrated, if mid-update
    pub current_child: Option<String>,
    /// Per-child effective strategy
    pub child_strategies: BTreeMap<String, Strategy>,
    /// Message for the squash commit, when the strategy is squash
    pub squash_message: Option<String>,
}

impl MergeState {
    /// Invariant check: every recorded child is either pending or updated,
    /// and the union is stable across phase transitions.
    pub fn work_list_size(&self) -> usize {
        self.child_branches.len() + self.updated_branches.len()
    }
}

/// Store for the merge state of one worktree.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open the store for a repository, resolving the per-worktree state
    /// directory through the VCS driver (never assuming `.git`).
    pub fn open(repo: &Repository) -> anyhow::Result<Self> {
        let dir = repo
            .git_dir()
            .context("Failed to resolve the git state directory")?
            .join("gitflow")
            .join("state");
        Ok(Self { dir })
    }

    /// Store rooted at an explicit directory (tests).
    #[doc(hidden)]
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file(&self) -> PathBuf {
        self.dir.join("merge.toml")
    }

    /// Atomically persist the state, creating parent directories as needed.
    pub fn save(&self, state: &MergeState) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let serialized = toml::to_string_pretty(state).context("Failed to serialize merge state")?;

        // Write to a temp file in the same directory so the rename is atomic
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .context("Failed to create temporary state file")?;
        tmp.write_all(serialized.as_bytes())
            .context("Failed to write merge state")?;
        tmp.persist(self.file())
            .context("Failed to move merge state into place")?;
        Ok(())
    }

    /// Load the saved state, or None when no operation is in progress.
    pub fn load(&self) -> anyhow::Result<Option<MergeState>> {
        let path = self.file();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        let state = toml::from_str(&raw)
            .with_context(|| format!("Merge state at {} is corrupt", path.display()))?;
        Ok(Some(state))
    }

    /// Remove the saved state. Not-found is success.
    pub fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(self.file()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove merge state"),
        }
    }

    /// Whether an operation is in progress, without parsing the file.
    /// Cheap enough to run on every command.
    pub fn in_progress(&self) -> bool {
        self.file().exists()
    }
}
