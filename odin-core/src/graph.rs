//! Graph - Dependency analysis between template resources
//!
//! Edges come from intrinsic references (`Ref`, `Fn::GetAtt`) and from
//! explicit `DependsOn` entries. Parameters and pseudo parameters are not
//! nodes.

use std::collections::{BTreeMap, BTreeSet};

use crate::resource::Resource;

/// How a dependency was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// A property value references the target
    Reference,
    /// Listed in `DependsOn`
    Explicit,
}

/// Dependency between resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Logical id of the resource depended on
    pub target: String,
    pub kind: DependencyKind,
}

/// Dependency graph for the resources of one template
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    /// Resource -> list of dependencies
    edges: BTreeMap<String, Vec<Dependency>>,
    /// Reverse edges: target -> resources that depend on it
    reverse_edges: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a set of resources, ignoring references that
    /// do not name one of them
    pub fn from_resources<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> Self {
        let resources: Vec<&Resource> = resources.into_iter().collect();
        let mut graph = Self::new();
        for resource in &resources {
            graph.add_node(resource.id.name.clone());
        }
        for resource in &resources {
            let explicit = &resource.depends_on;
            for target in resource.references() {
                if !graph.nodes.contains(&target) {
                    continue;
                }
                let kind = if explicit.contains(&target) {
                    DependencyKind::Explicit
                } else {
                    DependencyKind::Reference
                };
                graph.add_edge(resource.id.name.clone(), Dependency { target, kind });
            }
        }
        graph
    }

    pub fn add_node(&mut self, name: String) {
        self.nodes.insert(name);
    }

    pub fn add_edge(&mut self, from: String, dependency: Dependency) {
        let target = dependency.target.clone();
        self.nodes.insert(from.clone());
        self.nodes.insert(target.clone());
        self.edges.entry(from.clone()).or_default().push(dependency);
        self.reverse_edges.entry(target).or_default().push(from);
    }

    pub fn nodes(&self) -> impl Iterator<Item = &String> {
        self.nodes.iter()
    }

    /// Direct dependencies of a resource
    pub fn dependencies_of(&self, resource: &str) -> &[Dependency] {
        self.edges.get(resource).map_or(&[], |v| v.as_slice())
    }

    /// Resources that depend on this resource
    pub fn dependents_of(&self, resource: &str) -> &[String] {
        self.reverse_edges
            .get(resource)
            .map_or(&[], |v| v.as_slice())
    }

    /// Everything a resource waits for, directly or through other resources
    pub fn transitive_dependencies(&self, resource: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<&str> = vec![resource];
        while let Some(node) = pending.pop() {
            for dep in self.dependencies_of(node) {
                if seen.insert(dep.target.clone()) {
                    pending.push(&dep.target);
                }
            }
        }
        seen
    }

    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Returns one cycle as a path that starts and ends on the same node
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = BTreeSet::new();
        let mut stack = Vec::new();

        for node in &self.nodes {
            if let Some(cycle) = self.find_cycle_from(node, &mut visited, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn find_cycle_from(
        &self,
        node: &str,
        visited: &mut BTreeSet<String>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = stack.iter().position(|n| n == node) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if visited.contains(node) {
            return None;
        }

        visited.insert(node.to_string());
        stack.push(node.to_string());

        for dep in self.dependencies_of(node) {
            if let Some(cycle) = self.find_cycle_from(&dep.target, visited, stack) {
                return Some(cycle);
            }
        }

        stack.pop();
        None
    }

    /// Dependencies-first order, ties broken by logical id
    ///
    /// Returns the nodes left over when the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut remaining: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| {
                let distinct: BTreeSet<&str> = self
                    .dependencies_of(n)
                    .iter()
                    .map(|d| d.target.as_str())
                    .collect();
                (n.as_str(), distinct.len())
            })
            .collect();

        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            remaining.remove(node);
            order.push(node.to_string());

            let dependents: BTreeSet<&str> =
                self.dependents_of(node).iter().map(String::as_str).collect();
            for dependent in dependents {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if remaining.is_empty() {
            Ok(order)
        } else {
            Err(remaining.keys().map(|n| n.to_string()).collect())
        }
    }
}
