// src/recipe/graph.rs

//! Dependency expansion and build ordering
//!
//! [`DependencyWalker::expand`] turns a root recipe into a leveled list of
//! [`DependencyNode`]s, breadth first. A node reachable through several
//! parents appears once, with every parent recorded. Its level is one more
//! than the deepest parent seen, so in a diamond
//!
//! ```text
//! root -> a -> c
//! root -> b -> c
//! ```
//!
//! `c` sits at level 2 with parents `{a, b}`.
//!
//! Levels alone are not a build order, so [`BuildGraph`] sorts the expanded
//! edges topologically (dependencies first).
//!
//! # Example
//!
//! ```ignore
//! use kiln::recipe::graph::{BuildGraph, DependencyWalker};
//!
//! let nodes = DependencyWalker::default().expand("kivy", &mut registry)?;
//! let order = BuildGraph::from_nodes(&nodes).topological_sort()?;
//! ```

use crate::error::{Error, Result};
use crate::recipe::parser::split_version;
use crate::recipe::registry::RecipeRegistry;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

/// Dependency every recipe is assumed to have
pub const DEFAULT_IMPLICIT: &str = "python";

/// One recipe in an expanded dependency tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub name: String,
    /// Distance from the root; the root is 0
    pub level: usize,
    pub parents: BTreeSet<String>,
    /// Direct dependencies in declaration order
    pub children: Vec<String>,
    /// Always-satisfied dependency that is never loaded or built
    pub implicit: bool,
}

#[derive(Debug)]
struct Visit {
    level: usize,
    order: usize,
    parents: BTreeSet<String>,
    children: Vec<String>,
}

/// Breadth-first expansion of recipe dependencies
#[derive(Debug, Clone)]
pub struct DependencyWalker {
    implicit: BTreeSet<String>,
}

impl Default for DependencyWalker {
    fn default() -> Self {
        Self::new([DEFAULT_IMPLICIT])
    }
}

impl DependencyWalker {
    pub fn new<I, S>(implicit: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            implicit: implicit.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_implicit(&self, name: &str) -> bool {
        self.implicit.contains(name)
    }

    /// Expand `root` into its transitive dependencies
    ///
    /// Fails on the first dependency the registry cannot load, naming the
    /// recipes that referenced it, and on any dependency cycle.
    pub fn expand(&self, root: &str, registry: &mut RecipeRegistry) -> Result<Vec<DependencyNode>> {
        let (root_name, _) = split_version(root);
        if !self.is_implicit(root_name) && registry.get(root).is_none() {
            return Err(Error::NotFound(format!("recipe '{}'", root_name)));
        }

        if let Some(cycle) = self.find_cycle(root, registry) {
            return Err(Error::CircularDependency { cycle });
        }

        let mut visits: HashMap<String, Visit> = HashMap::new();
        visits.insert(
            root_name.to_string(),
            Visit {
                level: 0,
                order: 0,
                parents: BTreeSet::new(),
                children: Vec::new(),
            },
        );

        let mut queue: VecDeque<String> = VecDeque::from([root.to_string()]);
        while let Some(spec) = queue.pop_front() {
            let (name, _) = split_version(&spec);
            if self.is_implicit(name) {
                continue;
            }

            let recipe = registry.get(&spec).ok_or_else(|| Error::MissingDependency {
                name: name.to_string(),
                referrers: visits
                    .get(name)
                    .map(|v| v.parents.iter().cloned().collect())
                    .unwrap_or_default(),
            })?;

            let level = visits.get(name).map_or(0, |v| v.level);
            for dep in recipe.depends() {
                let (dep_name, _) = split_version(dep);
                let next_order = visits.len();

                let enqueue = match visits.get_mut(dep_name) {
                    Some(visit) => {
                        visit.parents.insert(name.to_string());
                        if visit.level < level + 1 {
                            visit.level = level + 1;
                            true
                        } else {
                            false
                        }
                    }
                    None => {
                        visits.insert(
                            dep_name.to_string(),
                            Visit {
                                level: level + 1,
                                order: next_order,
                                parents: BTreeSet::from([name.to_string()]),
                                children: Vec::new(),
                            },
                        );
                        true
                    }
                };

                if let Some(parent) = visits.get_mut(name) {
                    if !parent.children.iter().any(|c| c == dep_name) {
                        parent.children.push(dep_name.to_string());
                    }
                }

                if enqueue {
                    queue.push_back(dep.clone());
                }
            }
        }

        let mut nodes: Vec<(usize, DependencyNode)> = visits
            .into_iter()
            .map(|(name, visit)| {
                let implicit = self.is_implicit(&name);
                (
                    visit.order,
                    DependencyNode {
                        name,
                        level: visit.level,
                        parents: visit.parents,
                        children: visit.children,
                        implicit,
                    },
                )
            })
            .collect();
        nodes.sort_by_key(|(order, node)| (node.level, *order));

        debug!("expanded {} into {} node(s)", root_name, nodes.len());
        Ok(nodes.into_iter().map(|(_, node)| node).collect())
    }

    /// Depth-first search for a cycle reachable from `root`
    ///
    /// Missing recipes are skipped here; the breadth-first pass reports them
    /// with their referrers.
    fn find_cycle(&self, root: &str, registry: &mut RecipeRegistry) -> Option<Vec<String>> {
        let mut done = HashSet::new();
        let mut path = Vec::new();
        self.find_cycle_dfs(root, registry, &mut done, &mut path)
    }

    fn find_cycle_dfs(
        &self,
        spec: &str,
        registry: &mut RecipeRegistry,
        done: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        let (name, _) = split_version(spec);

        if let Some(start) = path.iter().position(|p| p == name) {
            let mut cycle = path[start..].to_vec();
            cycle.push(name.to_string());
            return Some(cycle);
        }
        if done.contains(name) || self.is_implicit(name) {
            return None;
        }

        let recipe = registry.get(spec)?;
        path.push(name.to_string());
        for dep in recipe.depends() {
            if let Some(cycle) = self.find_cycle_dfs(dep, registry, done, path) {
                return Some(cycle);
            }
        }
        path.pop();
        done.insert(name.to_string());
        None
    }
}

/// Directed graph of recipes used to compute a build order
#[derive(Debug, Default)]
pub struct BuildGraph {
    /// Recipe names in insertion order, used to break ties
    order: Vec<String>,
    /// Key: recipe name, Value: recipes it depends on
    edges: HashMap<String, BTreeSet<String>>,
    /// Key: recipe name, Value: recipes depending on it
    reverse_edges: HashMap<String, BTreeSet<String>>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph of the non-implicit nodes of one or more expansions
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a DependencyNode>) -> Self {
        let nodes: Vec<&DependencyNode> = nodes.into_iter().filter(|n| !n.implicit).collect();
        let real: HashSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();

        let mut graph = Self::new();
        for node in &nodes {
            let deps: Vec<&str> = node
                .children
                .iter()
                .map(String::as_str)
                .filter(|c| real.contains(c))
                .collect();
            graph.add_recipe(&node.name, &deps);
        }
        graph
    }

    fn ensure_node(&mut self, name: &str) {
        if !self.edges.contains_key(name) {
            self.order.push(name.to_string());
            self.edges.insert(name.to_string(), BTreeSet::new());
            self.reverse_edges.insert(name.to_string(), BTreeSet::new());
        }
    }

    /// Add a recipe with its dependencies, merging with existing edges
    pub fn add_recipe(&mut self, name: &str, dependencies: &[&str]) {
        self.ensure_node(name);
        for dep in dependencies {
            self.ensure_node(dep);
            if let Some(deps) = self.edges.get_mut(name) {
                deps.insert(dep.to_string());
            }
            if let Some(rdeps) = self.reverse_edges.get_mut(*dep) {
                rdeps.insert(name.to_string());
            }
        }
    }

    pub fn recipe_count(&self) -> usize {
        self.order.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    pub fn dependencies(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(name)
    }

    /// Kahn's algorithm; dependencies come before their dependents and
    /// ties go to the recipe added first
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let index: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();

        let mut in_degrees: HashMap<&str, usize> = self
            .edges
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();

        let mut ready: BTreeSet<(usize, &str)> = in_degrees
            .iter()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(name, _)| (index[name], *name))
            .collect();

        let mut result = Vec::with_capacity(self.order.len());
        while let Some(next) = ready.pop_first() {
            let (_, node) = next;
            result.push(node.to_string());

            if let Some(dependents) = self.reverse_edges.get(node) {
                for dependent in dependents {
                    if let Some(deg) = in_degrees.get_mut(dependent.as_str()) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            ready.insert((index[dependent.as_str()], dependent.as_str()));
                        }
                    }
                }
            }
        }

        if result.len() != self.order.len() {
            let cycle = self.find_cycles().into_iter().next().unwrap_or_else(|| {
                self.order
                    .iter()
                    .filter(|n| !result.contains(n))
                    .cloned()
                    .collect()
            });
            return Err(Error::CircularDependency { cycle });
        }

        Ok(result)
    }

    /// Find all cycles in the graph
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for start in &self.order {
            if !visited.contains(start.as_str()) {
                self.find_cycles_dfs(start, &mut visited, &mut rec_stack, &mut path, &mut cycles);
            }
        }

        cycles
    }

    fn find_cycles_dfs(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if !visited.contains(dep) {
                    self.find_cycles_dfs(dep, visited, rec_stack, path, cycles);
                } else if rec_stack.contains(dep) {
                    if let Some(start) = path.iter().position(|x| x == dep) {
                        let mut cycle = path[start..].to_vec();
                        cycle.push(dep.clone());
                        cycles.push(cycle);
                    }
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
    }
}
