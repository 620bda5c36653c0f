//! Git config access for Repository.
//!
//! gitflow keeps all persisted settings in the repository's own git config
//! under the `gitflow.` prefix. Every read re-runs `git config`; no value
//! is cached past a single call, so concurrent edits by the user are always
//! observed (and a command never acts on a stale snapshot it read earlier).

use super::error::classify;
use super::{GitError, Repository};

impl Repository {
    /// Get a single config value.
    ///
    /// Distinguishes "key absent" (`Ok(None)`) from "key present with an
    /// empty value" (`Ok(Some(""))`): git exits 1 for a missing key but 0
    /// with empty stdout for an empty one.
    pub fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        let output = self.run_git_raw(&["config", "--get", key])?;
        if !output.status.success() {
            // Exit code 1 = key not present; anything else is a real failure
            if output.status.code() == Some(1) {
                return Ok(None);
            }
            return Err(classify(format!("git config --get {key}"), &output));
        }
        let value = String::from_utf8_lossy(&output.stdout);
        Ok(Some(value.trim_end_matches('\n').to_string()))
    }

    /// Get all values of a multi-valued key, in insertion order.
    pub fn config_get_all(&self, key: &str) -> Result<Vec<String>, GitError> {
        let output = self.run_git_raw(&["config", "--get-all", key])?;
        if !output.status.success() {
            if output.status.code() == Some(1) {
                return Ok(Vec::new());
            }
            return Err(classify(format!("git config --get-all {key}"), &output));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().map(str::to_string).collect())
    }

    /// Get a boolean config value.
    ///
    /// Only the strings `"true"` and `"false"` are accepted; anything else
    /// is a [`GitError::ConfigValue`] at the point of access, not at storage.
    pub fn config_bool(&self, key: &str) -> Result<Option<bool>, GitError> {
        match self.config_get(key)? {
            None => Ok(None),
            Some(value) => match value.as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(GitError::ConfigValue {
                    key: key.to_string(),
                    value,
                }),
            },
        }
    }

    /// Set a config value, replacing any existing value.
    pub fn config_set(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.run_git(&["config", key, value])?;
        Ok(())
    }

    /// Append a value to a multi-valued key.
    pub fn config_add(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.run_git(&["config", "--add", key, value])?;
        Ok(())
    }

    /// Unset a config key. Returns Ok(false) if the key was not present.
    pub fn config_unset(&self, key: &str) -> Result<bool, GitError> {
        let output = self.run_git_raw(&["config", "--unset-all", key])?;
        if output.status.success() {
            return Ok(true);
        }
        // Exit code 5 = key did not exist
        if output.status.code() == Some(5) {
            return Ok(false);
        }
        Err(classify(format!("git config --unset-all {key}"), &output))
    }

    /// Enumerate `(key, value)` pairs whose key starts with `prefix`.
    pub fn config_entries(&self, prefix: &str) -> Result<Vec<(String, String)>, GitError> {
        let pattern = format!("^{}", regex_escape(prefix));
        let output = self.run_git_raw(&["config", "--get-regexp", &pattern])?;
        if !output.status.success() {
            if output.status.code() == Some(1) {
                return Ok(Vec::new());
            }
            return Err(classify(format!("git config --get-regexp {pattern}"), &output));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter_map(|line| {
                // Format: "gitflow.feature.finish.notag true"; a key with no
                // value has no separator at all.
                match line.split_once(' ') {
                    Some((key, value)) => Some((key.to_string(), value.to_string())),
                    None if !line.is_empty() => Some((line.to_string(), String::new())),
                    None => None,
                }
            })
            .collect())
    }
}

/// Escape regex metacharacters so a dotted config prefix matches literally.
fn regex_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if ".^$*+?()[]{}|\\".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
