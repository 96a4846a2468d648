//! Validator Registry (C4.3): the catalog of tool descriptors and the
//! selection/subgraph queries the scheduler drives from it.
pub mod builtin;
pub mod descriptor;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::error::ConfigError;
pub use descriptor::{ArgvToken, Category, ToolDescriptor, ToolName};

/// Which tools are eligible for selection, independent of file applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionProfile {
    /// A small, fast subset (formatters and the quickest linters).
    Fast,
    /// Every registered tool.
    All,
    /// Exactly the set named in configuration.
    Configured,
}

/// A dependency graph restricted to a chosen set of tool names.
///
/// Dependencies pointing outside the selected set are pruned — a selected
/// tool whose dependency was not selected is treated as having no
/// prerequisite for this run (`spec.md` §4.3).
#[derive(Debug, Clone)]
pub struct Dag {
    /// Tool names in the restricted graph.
    pub nodes: Vec<ToolName>,
    /// Each node's pruned dependency list.
    pub edges: HashMap<ToolName, Vec<ToolName>>,
}

/// The immutable catalog of tool descriptors, built once at process start.
#[derive(Debug)]
pub struct Registry {
    tools: HashMap<ToolName, ToolDescriptor>,
    /// Insertion order, used to break selection ties deterministically
    /// alongside `(category, name)`.
    order: Vec<ToolName>,
}

impl Registry {
    /// Construct a registry from a set of descriptors, validating the
    /// invariants from `spec.md` §3/§4.3.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDependency`] if a `depends_on` entry
    /// names a tool not present in `descriptors`, or
    /// [`ConfigError::CyclicDependency`] if the dependency relation contains
    /// a cycle.
    pub fn new(descriptors: Vec<ToolDescriptor>) -> Result<Self, ConfigError> {
        let order: Vec<ToolName> = descriptors.iter().map(|d| d.name.clone()).collect();
        let tools: HashMap<ToolName, ToolDescriptor> =
            descriptors.into_iter().map(|d| (d.name.clone(), d)).collect();

        for tool in tools.values() {
            for dep in &tool.depends_on {
                if !tools.contains_key(dep) {
                    return Err(ConfigError::UnknownDependency {
                        tool: tool.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if has_cycle(&tools) {
            let names = order.join(", ");
            return Err(ConfigError::CyclicDependency(names));
        }

        Ok(Self { tools, order })
    }

    /// Look up a single descriptor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// All registered tool names, in registration order.
    #[must_use]
    pub fn names(&self) -> &[ToolName] {
        &self.order
    }

    /// Select the ordered subset of tools applicable to `files` under `profile`.
    ///
    /// Order is deterministic: by `(category, name)`.
    #[must_use]
    pub fn select(
        &self,
        files: &[PathBuf],
        profile: SelectionProfile,
        configured: Option<&HashSet<ToolName>>,
    ) -> Vec<ToolName> {
        let mut selected: Vec<&ToolDescriptor> = self
            .order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .filter(|tool| self.permitted_by_profile(tool, profile, configured))
            .filter(|tool| files.iter().any(|f| tool.matches(f)))
            .collect();

        selected.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        selected.into_iter().map(|t| t.name.clone()).collect()
    }

    fn permitted_by_profile(
        &self,
        tool: &ToolDescriptor,
        profile: SelectionProfile,
        configured: Option<&HashSet<ToolName>>,
    ) -> bool {
        match profile {
            SelectionProfile::All => true,
            SelectionProfile::Fast => matches!(tool.category, Category::Formatter | Category::Linter),
            SelectionProfile::Configured => {
                configured.is_none_or(|set| set.contains(&tool.name))
            }
        }
    }

    /// Build a [`Dag`] restricted to `names`, pruning edges to tools outside
    /// the set.
    #[must_use]
    pub fn subgraph(&self, names: &[ToolName]) -> Dag {
        let selected: HashSet<&ToolName> = names.iter().collect();
        let edges = names
            .iter()
            .map(|name| {
                let deps = self
                    .tools
                    .get(name)
                    .map(|t| {
                        t.depends_on
                            .iter()
                            .filter(|d| selected.contains(d))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                (name.clone(), deps)
            })
            .collect();
        Dag {
            nodes: names.to_vec(),
            edges,
        }
    }
}

/// Detect cycles in the tool dependency graph using Kahn's algorithm.
///
/// Generalized from the teacher's `TypeId`-keyed `tasks::graph::has_cycle`
/// to a name-keyed graph, since tools are configuration entries rather than
/// Rust structs with stable `TypeId`s.
fn has_cycle(tools: &HashMap<ToolName, ToolDescriptor>) -> bool {
    let mut in_degree: HashMap<&ToolName, usize> = tools
        .keys()
        .map(|name| {
            let count = tools
                .get(name)
                .map_or(0, |t| t.depends_on.iter().filter(|d| tools.contains_key(*d)).count());
            (name, count)
        })
        .collect();

    let mut reverse_deps: HashMap<&ToolName, Vec<&ToolName>> =
        tools.keys().map(|name| (name, Vec::new())).collect();
    for (name, tool) in tools {
        for dep in &tool.depends_on {
            if let Some(rd) = reverse_deps.get_mut(dep) {
                rd.push(name);
            }
        }
    }

    let mut queue: Vec<&ToolName> = in_degree
        .iter()
        .filter_map(|(name, &d)| if d == 0 { Some(*name) } else { None })
        .collect();
    let mut processed = 0usize;

    while let Some(name) = queue.pop() {
        processed += 1;
        if let Some(dependents) = reverse_deps.get(name) {
            for &dependent in dependents {
                if let Some(count) = in_degree.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push(dependent);
                    }
                }
            }
        }
    }

    processed != tools.len()
}
