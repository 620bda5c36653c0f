//! External process execution.
//!
//! Every external command gitflow runs, git itself and user hooks alike, goes
//! through [`Cmd`] so logging and tracing stay uniform:
//!
//! ```text
//! $ git merge --no-ff feature/login [myrepo]    # with context
//! $ pre-flow-feature-finish login origin ...    # hooks
//! [flow-trace] context=myrepo cmd="..." dur=12.3ms ok=true
//! ```
//!
//! The `context` is typically the repository directory name for git
//! commands, or `None` for hook executables.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::Instant;

/// Builder for executing commands with logging and tracing.
///
/// # Examples
///
/// ```ignore
/// let output = Cmd::new("git")
///     .args(["status", "--porcelain"])
///     .current_dir(&repo_path)
///     .context("myrepo")
///     .run()?;
/// ```
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    context: Option<String>,
    envs: Vec<(String, String)>,
    env_removes: Vec<String>,
}

impl Cmd {
    /// Create a new command builder for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            context: None,
            envs: Vec::new(),
            env_removes: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory for the command.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set the logging context (typically the repository name for git commands).
    pub fn context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.envs.push((key.into(), val.into()));
        self
    }

    /// Remove an environment variable.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_removes.push(key.into());
        self
    }

    /// The full command line, for error messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Execute the command, blocking until it exits, and capture its output.
    pub fn run(self) -> std::io::Result<Output> {
        let cmd_str = self.display();

        match &self.context {
            Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
            None => log::debug!("$ {}", cmd_str),
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, val) in &self.envs {
            cmd.env(key, val);
        }
        for key in &self.env_removes {
            cmd.env_remove(key);
        }

        let t0 = Instant::now();
        let result = cmd.output();
        let duration_ms = t0.elapsed().as_secs_f64() * 1000.0;

        match (&result, &self.context) {
            (Ok(output), Some(ctx)) => {
                log::debug!(
                    "[flow-trace] context={} cmd=\"{}\" dur={:.1}ms ok={}",
                    ctx,
                    cmd_str,
                    duration_ms,
                    output.status.success()
                );
            }
            (Ok(output), None) => {
                log::debug!(
                    "[flow-trace] cmd=\"{}\" dur={:.1}ms ok={}",
                    cmd_str,
                    duration_ms,
                    output.status.success()
                );
            }
            (Err(e), Some(ctx)) => {
                log::debug!(
                    "[flow-trace] context={} cmd=\"{}\" dur={:.1}ms err=\"{}\"",
                    ctx,
                    cmd_str,
                    duration_ms,
                    e
                );
            }
            (Err(e), None) => {
                log::debug!(
                    "[flow-trace] cmd=\"{}\" dur={:.1}ms err=\"{}\"",
                    cmd_str,
                    duration_ms,
                    e
                );
            }
        }

        result
    }
}
