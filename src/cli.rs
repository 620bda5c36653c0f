//! Command-line surface.
//!
//! Paired `--flag` / `--no-flag` options fold into tri-state
//! `Option<bool>` values: `Some(true)`, `Some(false)`, or `None` when
//! neither was given. The distinction is preserved all the way into the
//! option resolver, where `None` leaves the stored configuration in effect.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::resolve::FinishOverrides;

#[derive(Parser, Debug)]
#[command(
    name = "git-flow",
    version,
    about = "Branching workflows on git: feature/release/hotfix branches with resumable finishes",
    max_term_width = 100
)]
pub struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', long = "directory", global = true, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Show every git command being run
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize gitflow in this repository
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
        /// Re-apply the built-in branch-type defaults, discarding stored
        /// policy overrides
        #[arg(short = 'd', long)]
        defaults: bool,
    },
    /// Manage feature branches
    Feature {
        #[command(subcommand)]
        action: TypeCommand,
    },
    /// Manage bugfix branches
    Bugfix {
        #[command(subcommand)]
        action: TypeCommand,
    },
    /// Manage release branches
    Release {
        #[command(subcommand)]
        action: TypeCommand,
    },
    /// Manage hotfix branches
    Hotfix {
        #[command(subcommand)]
        action: TypeCommand,
    },
    /// Manage support branches
    Support {
        #[command(subcommand)]
        action: TypeCommand,
    },
    /// Bring a branch up to date with its parent
    Update {
        /// Full branch name (defaults to the current branch)
        name: Option<String>,
    },
    /// Inspect or edit the stored gitflow settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Print the version
    Version,
}

impl Commands {
    /// The branch-type name for the typed subcommands.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            Commands::Feature { .. } => Some("feature"),
            Commands::Bugfix { .. } => Some("bugfix"),
            Commands::Release { .. } => Some("release"),
            Commands::Hotfix { .. } => Some("hotfix"),
            Commands::Support { .. } => Some("support"),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum TypeCommand {
    /// Create a branch of this type and check it out
    Start {
        name: String,
        /// Base branch to start from (defaults to the type's start point)
        base: Option<String>,
        /// Fetch the remote before branching
        #[arg(long)]
        fetch: bool,
    },
    /// Integrate a branch into its parent and clean up
    Finish(FinishArgs),
    /// Push a branch to the remote and track it
    Publish { name: String },
    /// Check out a branch published on the remote
    Track { name: String },
    /// Delete a branch of this type
    Delete {
        name: String,
        /// Delete even if unmerged
        #[arg(short = 'f', long)]
        force: bool,
        /// Also delete the remote branch
        #[arg(short = 'r', long)]
        remote: bool,
    },
    /// List branches of this type
    List {
        /// Show ahead/behind counts against the parent
        #[arg(short = 'v', long)]
        verbose: bool,
    },
    /// Rebase a branch onto its parent
    Rebase {
        name: String,
        /// Keep merge commits while rebasing
        #[arg(short = 'p', long)]
        preserve_merges: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct FinishArgs {
    /// Short branch name (without the type prefix)
    #[arg(default_value = "")]
    pub name: String,

    // --- tagging ---
    /// Tag the parent after the merge
    #[arg(long)]
    pub tag: bool,
    /// Do not tag
    #[arg(long = "no-tag", alias = "notag")]
    pub no_tag: bool,
    /// Use this tag name instead of <tagprefix><name>
    #[arg(long, value_name = "NAME")]
    pub tagname: Option<String>,
    /// Sign the tag
    #[arg(long)]
    pub sign: bool,
    #[arg(long = "no-sign", hide = true)]
    pub no_sign: bool,
    /// Sign the tag with this key
    #[arg(long, value_name = "KEY")]
    pub signingkey: Option<String>,
    /// Tag (and merge) message; supports %b %B %p %P placeholders
    #[arg(short = 'm', long, value_name = "MESSAGE")]
    pub message: Option<String>,
    /// Read the tag message from a file
    #[arg(long, value_name = "PATH")]
    pub messagefile: Option<PathBuf>,

    // --- retention ---
    /// Keep the branch after finishing
    #[arg(short = 'k', long)]
    pub keep: bool,
    #[arg(long = "no-keep", hide = true)]
    pub no_keep: bool,
    /// Keep the local branch
    #[arg(long)]
    pub keep_local: bool,
    #[arg(long = "no-keep-local", hide = true)]
    pub no_keep_local: bool,
    /// Keep the remote branch
    #[arg(long)]
    pub keep_remote: bool,
    #[arg(long = "no-keep-remote", hide = true)]
    pub no_keep_remote: bool,
    /// Force-delete the branch
    #[arg(short = 'D', long)]
    pub force_delete: bool,
    #[arg(long = "no-force-delete", hide = true)]
    pub no_force_delete: bool,

    // --- strategy ---
    /// Integrate with a merge commit (disables rebase and squash)
    #[arg(long)]
    pub merge: bool,
    /// Rebase instead of merging
    #[arg(long)]
    pub rebase: bool,
    #[arg(long = "no-rebase", hide = true)]
    pub no_rebase: bool,
    /// Squash into a single commit on the parent
    #[arg(long)]
    pub squash: bool,
    #[arg(long = "no-squash", hide = true)]
    pub no_squash: bool,
    /// Integration strategy: merge, rebase, or squash (overrides the flags)
    #[arg(long, value_name = "NAME")]
    pub strategy: Option<String>,
    /// Keep merge commits while rebasing
    #[arg(long)]
    pub preserve_merges: bool,
    #[arg(long = "no-preserve-merges", hide = true)]
    pub no_preserve_merges: bool,
    /// Force a merge commit even when fast-forward is possible
    #[arg(long = "no-ff")]
    pub no_ff: bool,
    /// Allow fast-forward merges
    #[arg(long = "ff", hide = true)]
    pub ff: bool,

    // --- control ---
    /// Fetch the remote before finishing
    #[arg(long)]
    pub fetch: bool,
    #[arg(long = "no-fetch", hide = true)]
    pub no_fetch: bool,
    /// Push the parent (and tag) to the remote afterwards
    #[arg(long)]
    pub push: bool,
    #[arg(long = "no-push", hide = true)]
    pub no_push: bool,
    /// Resume a conflicted finish
    #[arg(long = "continue", conflicts_with = "abort")]
    pub resume: bool,
    /// Discard the in-progress finish
    #[arg(long)]
    pub abort: bool,
}

/// Fold a `--flag` / `--no-flag` pair into a tri-state value.
fn flag_pair(positive: bool, negative: bool) -> Option<bool> {
    match (positive, negative) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl FinishArgs {
    /// The caller-override layer for the resolver.
    pub fn overrides(&self) -> FinishOverrides {
        // --merge is an explicit "plain merge": it disables both sub-flags
        let (rebase, squash) = if self.merge {
            (Some(false), Some(false))
        } else {
            (
                flag_pair(self.rebase, self.no_rebase),
                flag_pair(self.squash, self.no_squash),
            )
        };
        FinishOverrides {
            tag: flag_pair(self.tag, self.no_tag),
            tag_name: self.tagname.clone(),
            sign: flag_pair(self.sign, self.no_sign),
            signing_key: self.signingkey.clone(),
            message: self.message.clone(),
            message_file: self.messagefile.clone(),
            keep: flag_pair(self.keep, self.no_keep),
            keep_local: flag_pair(self.keep_local, self.no_keep_local),
            keep_remote: flag_pair(self.keep_remote, self.no_keep_remote),
            force_delete: flag_pair(self.force_delete, self.no_force_delete),
            rebase,
            preserve_merges: flag_pair(self.preserve_merges, self.no_preserve_merges),
            squash,
            no_ff: flag_pair(self.no_ff, self.ff),
            strategy: self.strategy.clone(),
            fetch: flag_pair(self.fetch, self.no_fetch),
            push: flag_pair(self.push, self.no_push),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show all gitflow settings
    List,
    /// Print one setting
    Get { key: String },
    /// Store a setting
    Set { key: String, value: String },
    /// Remove a setting
    Unset { key: String },
}
