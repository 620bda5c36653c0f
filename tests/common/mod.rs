//! Scratch-repository fixture for end-to-end tests.

// Each integration-test binary compiles this module separately and uses a
// different subset of the helpers.
#![allow(dead_code)]

use std::path::Path;

use gitflow::Repository;
use gitflow::commands::handle_init;
use gitflow::shell_exec::Cmd;
use tempfile::TempDir;

/// A temporary repository initialized for gitflow: `main` with one commit,
/// `develop` created by init, deterministic identity and no signing.
pub struct FlowRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl FlowRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        git_in(dir.path(), &["init", "-q"]);
        // Pin the initial branch name regardless of the host's git config
        git_in(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git_in(dir.path(), &["config", "user.name", "Flow Test"]);
        git_in(dir.path(), &["config", "user.email", "flow@example.invalid"]);
        git_in(dir.path(), &["config", "commit.gpgsign", "false"]);
        git_in(dir.path(), &["config", "tag.gpgsign", "false"]);
        std::fs::write(dir.path().join("README.md"), "scratch\n").unwrap();
        git_in(dir.path(), &["add", "README.md"]);
        git_in(dir.path(), &["commit", "-q", "-m", "root"]);

        let repo = Repository::discover(dir.path()).unwrap();
        handle_init(&repo, false, false).unwrap();
        FlowRepo { dir, repo }
    }

    /// Run git in the repository, asserting success, returning stdout.
    pub fn git(&self, args: &[&str]) -> String {
        git_in(self.dir.path(), args)
    }

    /// Commit `content` to `path` on the currently checked-out branch.
    pub fn commit_file(&self, path: &str, content: &str, message: &str) {
        std::fs::write(self.dir.path().join(path), content).unwrap();
        self.git(&["add", path]);
        self.git(&["commit", "-q", "-m", message]);
    }

    /// Check out `branch`, then commit `content` to `path`.
    pub fn commit_file_on(&self, branch: &str, path: &str, content: &str, message: &str) {
        self.git(&["checkout", "-q", branch]);
        self.commit_file(path, content, message);
    }

    /// The commit id of a ref.
    pub fn rev(&self, reference: &str) -> String {
        self.git(&["rev-parse", reference]).trim().to_string()
    }

    /// Number of parents of a ref's commit.
    pub fn parent_count(&self, reference: &str) -> usize {
        self.git(&["rev-list", "--parents", "-n1", reference])
            .split_whitespace()
            .count()
            .saturating_sub(1)
    }
}

fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = Cmd::new("git")
        .args(args.iter().copied())
        .current_dir(dir)
        .run()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}
