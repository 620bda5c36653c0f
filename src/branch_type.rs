//! Branch types: the registry of branch categories and their topology.
//!
//! Each branch type (feature, release, hotfix, ...) carries the defaults
//! that drive its lifecycle: the name prefix, the parent type it finishes
//! into, the integration strategy, and the tagging policy. Types form a
//! rooted forest; the parent relation is validated for cycles at load time
//! so downstream code can assume acyclicity.
//!
//! The registry is populated in three steps: built-in baseline, legacy
//! flat-key synthesis (`gitflow.prefix.<type>`, `gitflow.branch.master`),
//! then the modern `gitflow.<type>.*` overlay. It is read-only for the
//! rest of the command invocation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::FlowError;
use crate::git::Repository;

/// How changes are carried across a topology edge.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Merge,
    Rebase,
    Squash,
}

impl Strategy {
    /// Parse a user-supplied strategy name, rejecting anything outside the
    /// three valid values.
    pub fn parse(name: &str) -> Result<Self, FlowError> {
        name.parse().map_err(|_| {
            FlowError::invalid_input(format!(
                "Invalid strategy {name:?} (expected merge, rebase, or squash)"
            ))
        })
    }
}

/// One category of branches. Immutable after registry load.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchType {
    /// Identifier, e.g. `feature`
    pub name: String,
    /// Prepended to user-supplied names to form the full branch name.
    /// Empty for trunk types (`main`, `develop`).
    pub prefix: String,
    /// Concrete branch name for trunk types. `None` for prefixed types.
    pub branch: Option<String>,
    /// The type this one integrates into on finish. `None` for roots.
    pub parent: Option<String>,
    /// Default creation base (a type name or branch name)
    pub start_point: Option<String>,
    /// Whether branches of this type receive parent commits on finish
    pub auto_update: bool,
    /// Default strategy for integrating INTO this type
    pub upstream_strategy: Strategy,
    /// Optional override when changes propagate OUT of this type
    pub downstream_strategy: Option<Strategy>,
    /// Whether finishing a branch of this type creates a tag by default
    pub tag_on_finish: bool,
    /// Prepended to the branch name to form the tag name
    pub tag_prefix: String,
}

impl BranchType {
    fn trunk(name: &str, parent: Option<&str>, auto_update: bool) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            branch: Some(name.into()),
            parent: parent.map(Into::into),
            start_point: parent.map(Into::into),
            auto_update,
            upstream_strategy: Strategy::Merge,
            downstream_strategy: None,
            tag_on_finish: false,
            tag_prefix: String::new(),
        }
    }

    fn topic(
        name: &str,
        parent: &str,
        start_point: &str,
        auto_update: bool,
        tag_on_finish: bool,
        tag_prefix: &str,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: format!("{name}/"),
            branch: None,
            parent: Some(parent.into()),
            start_point: Some(start_point.into()),
            auto_update,
            upstream_strategy: Strategy::Merge,
            downstream_strategy: None,
            tag_on_finish,
            tag_prefix: tag_prefix.into(),
        }
    }

    /// The full branch name for a user-supplied short name.
    pub fn full_branch(&self, short: &str) -> String {
        format!("{}{}", self.prefix, short)
    }

    /// Whether `branch` belongs to this type.
    pub fn owns(&self, branch: &str) -> bool {
        if self.prefix.is_empty() {
            self.branch.as_deref() == Some(branch)
        } else {
            branch.starts_with(&self.prefix)
        }
    }

    /// Strip this type's prefix off a full branch name.
    pub fn short_name<'a>(&self, branch: &'a str) -> &'a str {
        branch.strip_prefix(&self.prefix).unwrap_or(branch)
    }
}

/// Immutable map of branch-type name → policy, plus the derived topology.
#[derive(Debug, Clone)]
pub struct Registry {
    types: IndexMap<String, BranchType>,
}

impl Registry {
    /// The built-in baseline: the recognized type names with their stock
    /// policies, before any repository configuration is applied.
    pub fn builtin() -> Self {
        let mut types = IndexMap::new();
        for ty in [
            BranchType::trunk("main", None, false),
            BranchType::trunk("develop", Some("main"), true),
            BranchType::topic("feature", "develop", "develop", true, false, ""),
            BranchType::topic("bugfix", "develop", "develop", true, false, ""),
            BranchType::topic("release", "main", "develop", false, true, "v"),
            BranchType::topic("hotfix", "main", "main", false, true, "v"),
            BranchType::topic("support", "main", "main", false, false, "v"),
        ] {
            types.insert(ty.name.clone(), ty);
        }
        Self { types }
    }

    /// Load the effective registry for a repository: baseline, legacy
    /// flat keys, then the `gitflow.<type>.*` namespace, then validation.
    pub fn load(repo: &Repository) -> anyhow::Result<Self> {
        let mut registry = Self::builtin();
        registry.apply_legacy_keys(repo)?;
        registry.apply_typed_keys(repo)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Synthesize modern entries from the older flat key set so downstream
    /// components see a uniform model.
    fn apply_legacy_keys(&mut self, repo: &Repository) -> anyhow::Result<()> {
        // gitflow.branch.master / gitflow.branch.main name the production
        // branch; gitflow.branch.develop names the integration branch.
        let production = match repo.config_get("gitflow.branch.main")? {
            Some(v) => Some(v),
            None => repo.config_get("gitflow.branch.master")?,
        };
        if let Some(name) = production
            && !name.is_empty()
            && let Some(main) = self.types.get_mut("main")
        {
            main.branch = Some(name);
        }
        if let Some(name) = repo.config_get("gitflow.branch.develop")?
            && !name.is_empty()
            && let Some(develop) = self.types.get_mut("develop")
        {
            develop.branch = Some(name);
        }

        // gitflow.prefix.<type> overrides the name prefix of a topic type
        for (key, value) in repo.config_entries("gitflow.prefix.")? {
            let Some(ty_name) = key.strip_prefix("gitflow.prefix.") else {
                continue;
            };
            if ty_name == "versiontag" {
                // Shared tag prefix for every tagging type
                for ty in self.types.values_mut() {
                    if ty.tag_on_finish || !ty.tag_prefix.is_empty() {
                        ty.tag_prefix = value.clone();
                    }
                }
                continue;
            }
            if let Some(ty) = self.types.get_mut(ty_name) {
                ty.prefix = value.clone();
            }
        }
        Ok(())
    }

    /// Overlay `gitflow.<type>.<attribute>` values. Unknown type names
    /// create new entries so repositories can define their own categories.
    fn apply_typed_keys(&mut self, repo: &Repository) -> anyhow::Result<()> {
        for (key, value) in repo.config_entries("gitflow.")? {
            let segments: Vec<&str> = key.split('.').collect();
            // Type attributes are exactly gitflow.<type>.<attr>; deeper keys
            // (gitflow.<type>.<action>.<option>) belong to the resolver and
            // gitflow.branch.* / gitflow.prefix.* / gitflow.path.* are
            // reserved namespaces handled elsewhere.
            let [_, ty_name, attr] = segments[..] else {
                continue;
            };
            if matches!(ty_name, "branch" | "prefix" | "path") {
                continue;
            }
            let ty = self
                .types
                .entry(ty_name.to_string())
                .or_insert_with(|| BranchType {
                    name: ty_name.to_string(),
                    prefix: format!("{ty_name}/"),
                    branch: None,
                    parent: None,
                    start_point: None,
                    auto_update: false,
                    upstream_strategy: Strategy::Merge,
                    downstream_strategy: None,
                    tag_on_finish: false,
                    tag_prefix: String::new(),
                });
            match attr {
                "prefix" => ty.prefix = value,
                "branch" => ty.branch = Some(value),
                "parent" => ty.parent = (!value.is_empty()).then_some(value),
                "start" => ty.start_point = (!value.is_empty()).then_some(value),
                "autoupdate" => {
                    ty.auto_update = parse_bool(&key, &value)?;
                }
                "strategy" => ty.upstream_strategy = Strategy::parse(&value)?,
                "downstream" => ty.downstream_strategy = Some(Strategy::parse(&value)?),
                "tag" => ty.tag_on_finish = parse_bool(&key, &value)?,
                "tagprefix" => ty.tag_prefix = value,
                _ => {} // Unknown attribute: ignore, forward compatibility
            }
        }
        Ok(())
    }

    /// Refuse configurations with unknown parents or parent cycles, and
    /// require at least one root.
    fn validate(&self) -> Result<(), FlowError> {
        let mut has_root = false;
        for ty in self.types.values() {
            match &ty.parent {
                None => has_root = true,
                Some(parent) => {
                    if !self.types.contains_key(parent) {
                        return Err(FlowError::invalid_input(format!(
                            "Branch type {:?} names unknown parent {parent:?}",
                            ty.name
                        )));
                    }
                }
            }
        }
        if !has_root {
            return Err(FlowError::invalid_input(
                "Branch type configuration has no root type",
            ));
        }
        // Walk the parent chain from every type; revisiting the start or
        // exceeding the type count means a cycle.
        for ty in self.types.values() {
            let mut seen = 0;
            let mut cursor = ty.parent.as_deref();
            while let Some(parent) = cursor {
                if parent == ty.name {
                    return Err(FlowError::CircularDependency {
                        branch_type: ty.name.clone(),
                    });
                }
                seen += 1;
                if seen > self.types.len() {
                    return Err(FlowError::CircularDependency {
                        branch_type: ty.name.clone(),
                    });
                }
                cursor = self.types.get(parent).and_then(|p| p.parent.as_deref());
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&BranchType> {
        self.types.get(name)
    }

    /// Look up a type, rejecting unknown names as invalid input.
    pub fn require(&self, name: &str) -> Result<&BranchType, FlowError> {
        self.get(name).ok_or_else(|| {
            FlowError::invalid_input(format!("Unknown branch type {name:?}"))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &BranchType> {
        self.types.values()
    }

    /// The concrete branch name for a type (trunk types only).
    pub fn branch_for(&self, ty_name: &str) -> Option<String> {
        let ty = self.types.get(ty_name)?;
        ty.branch
            .clone()
            .or_else(|| ty.prefix.is_empty().then(|| ty.name.clone()))
    }

    /// Resolve a start-point or parent reference: a trunk type name maps to
    /// its branch, anything else is taken as a literal branch name.
    pub fn resolve_branch(&self, name_or_type: &str) -> String {
        self.branch_for(name_or_type)
            .unwrap_or_else(|| name_or_type.to_string())
    }

    /// The branch a finished branch of `ty` integrates into.
    pub fn parent_branch(&self, ty: &BranchType) -> Result<String, FlowError> {
        let parent = ty.parent.as_deref().ok_or_else(|| {
            FlowError::invalid_input(format!(
                "Branch type {:?} has no parent to finish into",
                ty.name
            ))
        })?;
        self.branch_for(parent).ok_or_else(|| {
            FlowError::invalid_input(format!(
                "Parent type {parent:?} of {:?} has no concrete branch",
                ty.name
            ))
        })
    }

    /// Direct children of a type, in registry order.
    pub fn children(&self, ty_name: &str) -> Vec<&BranchType> {
        self.types
            .values()
            .filter(|ty| ty.parent.as_deref() == Some(ty_name))
            .collect()
    }

    /// Types reachable from `ty_name` by following edges to auto-updating
    /// children, breadth-first: the topological order used for the finish
    /// work list.
    pub fn auto_update_descendants(&self, ty_name: &str) -> Vec<&BranchType> {
        let mut out: Vec<&BranchType> = Vec::new();
        let mut frontier = vec![ty_name.to_string()];
        while let Some(current) = frontier.pop() {
            for child in self.children(&current) {
                if child.auto_update && !out.iter().any(|t| t.name == child.name) {
                    out.push(child);
                    frontier.insert(0, child.name.clone());
                }
            }
        }
        out
    }

    /// The effective strategy for the edge `parent` → `child`: the parent's
    /// downstream preference when set, else the child's upstream default.
    pub fn edge_strategy(&self, parent: &BranchType, child: &BranchType) -> Strategy {
        parent
            .downstream_strategy
            .unwrap_or(child.upstream_strategy)
    }

    /// Find the type owning a full branch name. Prefixed types win over
    /// trunk types; the longest matching prefix wins among prefixed types.
    pub fn type_of_branch(&self, branch: &str) -> Option<&BranchType> {
        self.types
            .values()
            .filter(|ty| ty.owns(branch))
            .max_by_key(|ty| ty.prefix.len())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, FlowError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(FlowError::invalid_input(format!(
            "Config key {key} has invalid boolean value {value:?}"
        ))),
    }
}

/// Whether a repository has been initialized for gitflow.
///
/// The sentinel is the pair of trunk branch keys `init` writes.
pub fn is_initialized(repo: &Repository) -> anyhow::Result<bool> {
    let main = repo.config_get("gitflow.branch.main")?;
    let master = repo.config_get("gitflow.branch.master")?;
    let develop = repo.config_get("gitflow.branch.develop")?;
    Ok((main.is_some() || master.is_some()) && develop.is_some())
}
