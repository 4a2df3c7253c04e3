//! Reference resolution, cycle detection and topological ordering
//!
//! Edges point from a referrer to the item it references. A referenced name
//! that is not a node is kept as a dangling edge so the planner can report it
//! against the referring item.

use crate::kind::ResourceKind;
use crate::types::Item;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A reference to a name that is not declared in the same map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingEdge {
    pub referrer: String,
    pub field: &'static str,
    pub target: String,
}

/// Dependency graph over the items of one plural resource
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    /// referrer -> referents
    references: BTreeMap<String, BTreeSet<String>>,
    /// referent -> referrers
    referrers: BTreeMap<String, BTreeSet<String>>,
    dangling: BTreeMap<String, Vec<DanglingEdge>>,
}

impl DependencyGraph {
    /// Build the graph from a set of named items using the kind's reference fields
    pub fn resolve<'a, I>(kind: &ResourceKind, items: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Item)>,
    {
        let items: Vec<(&String, &Item)> = items.into_iter().collect();
        let mut graph = Self {
            nodes: items.iter().map(|(name, _)| (*name).clone()).collect(),
            ..Self::default()
        };

        for (name, item) in &items {
            for field in kind.reference_fields {
                for target in field.names(item) {
                    if graph.nodes.contains(&target) {
                        graph.add_edge(name, &target);
                    } else {
                        graph
                            .dangling
                            .entry((*name).clone())
                            .or_default()
                            .push(DanglingEdge {
                                referrer: (*name).clone(),
                                field: field.attribute,
                                target,
                            });
                    }
                }
            }
        }

        log::debug!(
            "Resolved {} graph: {} nodes, {} edges, {} dangling",
            kind.name,
            graph.nodes.len(),
            graph.edge_count(),
            graph.dangling.values().map(Vec::len).sum::<usize>()
        );
        graph
    }

    fn add_edge(&mut self, referrer: &str, referent: &str) {
        self.references
            .entry(referrer.to_string())
            .or_default()
            .insert(referent.to_string());
        self.referrers
            .entry(referent.to_string())
            .or_default()
            .insert(referrer.to_string());
    }

    /// All node names, sorted
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains(name)
    }

    /// Number of resolved edges
    pub fn edge_count(&self) -> usize {
        self.references.values().map(BTreeSet::len).sum()
    }

    /// Names referenced by `name`
    pub fn references(&self, name: &str) -> impl Iterator<Item = &str> {
        self.references
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Names that reference `name`
    pub fn referrers(&self, name: &str) -> impl Iterator<Item = &str> {
        self.referrers
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Dangling references made by `name`
    pub fn dangling(&self, name: &str) -> &[DanglingEdge] {
        self.dangling.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Find a reference cycle, returned as the ordered path that closes on itself
    ///
    /// A self-reference yields `[g, g]`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();

        for node in &self.nodes {
            if !visited.contains(node.as_str())
                && let Some(cycle) = self.cycle_from(node, &mut visited)
            {
                return Some(cycle);
            }
        }
        None
    }

    /// Depth-first walk from `root` using an explicit stack of edge iterators
    fn cycle_from<'a>(
        &'a self,
        root: &'a str,
        visited: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(root);
        let mut path: Vec<&str> = vec![root];
        let mut on_path: HashSet<&str> = HashSet::from([root]);
        let mut edges = vec![self.references(root)];

        while let Some(next) = edges.last_mut().map(Iterator::next) {
            let Some(next) = next else {
                edges.pop();
                if let Some(done) = path.pop() {
                    on_path.remove(done);
                }
                continue;
            };
            if on_path.contains(next) {
                let start = path.iter().position(|n| *n == next).unwrap_or_default();
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|s| (*s).to_string()).collect();
                cycle.push(next.to_string());
                return Some(cycle);
            }
            if visited.insert(next) {
                path.push(next);
                on_path.insert(next);
                edges.push(self.references(next));
            }
        }
        None
    }

    /// Order nodes so that every referent precedes its referrers
    ///
    /// Independent nodes come out in name order. Returns the cycle path if the
    /// graph is not acyclic.
    pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut pending: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.references(n).count()))
            .collect();
        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(name) = ready.pop_first() {
            order.push(name.to_string());
            for referrer in self.referrers(name) {
                if let Some(count) = pending.get_mut(referrer) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(referrer);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            Err(self.find_cycle().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{HOSTS, NETWORK_GROUPS};
    use crate::types::DesiredState;
    use serde_json::json;

    fn groups(edges: &[(&str, &[&str])]) -> DesiredState {
        edges.iter()
            .map(|(name, refs)| {
                (
                    (*name).to_string(),
                    Item::default().with("network_groups", json!(refs)),
                )
            })
            .collect()
    }

    #[test]
    fn test_resolve_edges_and_dangling() {
        let desired = groups(&[("g1", &["g2", "missing"]), ("g2", &[])]);
        let graph = DependencyGraph::resolve(&NETWORK_GROUPS, &desired);

        assert_eq!(graph.references("g1").collect::<Vec<_>>(), vec!["g2"]);
        assert_eq!(graph.referrers("g2").collect::<Vec<_>>(), vec!["g1"]);
        assert_eq!(graph.dangling("g1").len(), 1);
        assert_eq!(graph.dangling("g1")[0].target, "missing");
        assert!(graph.dangling("g2").is_empty());
    }

    #[test]
    fn test_kind_without_reference_fields_has_no_edges() {
        let desired = groups(&[("h1", &["h2"]), ("h2", &[])]);
        let graph = DependencyGraph::resolve(&HOSTS, &desired);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.dangling("h1").is_empty());
    }

    #[test]
    fn test_self_reference_cycle() {
        let desired = groups(&[("g1", &[]), ("g2", &["g2"])]);
        let graph = DependencyGraph::resolve(&NETWORK_GROUPS, &desired);
        assert_eq!(graph.find_cycle(), Some(vec!["g2".to_string(), "g2".to_string()]));
    }

    #[test]
    fn test_longer_cycle_path() {
        let desired = groups(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("d", &[])]);
        let graph = DependencyGraph::resolve(&NETWORK_GROUPS, &desired);
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle, vec!["a", "b", "c", "a"]);
        assert_eq!(graph.topological_order().unwrap_err(), cycle);
    }

    #[test]
    fn test_topological_order_referents_first() {
        let desired = groups(&[
            ("g1", &["g2", "g3"]),
            ("g2", &["g4"]),
            ("g3", &[]),
            ("g4", &[]),
            ("lone", &[]),
        ]);
        let graph = DependencyGraph::resolve(&NETWORK_GROUPS, &desired);
        assert!(graph.find_cycle().is_none());

        let order = graph.topological_order().unwrap();
        let pos = |n: &str| order.iter().position(|o| o == n).unwrap();
        assert!(pos("g4") < pos("g2"));
        assert!(pos("g2") < pos("g1"));
        assert!(pos("g3") < pos("g1"));
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let desired = groups(&[
            ("top", &["l", "r"]),
            ("l", &["base"]),
            ("r", &["base"]),
            ("base", &[]),
        ]);
        let graph = DependencyGraph::resolve(&NETWORK_GROUPS, &desired);
        assert!(graph.find_cycle().is_none());
        assert_eq!(graph.topological_order().unwrap().last().unwrap(), "top");
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let names: Vec<String> = (0..100_000).map(|i| format!("g{i:06}")).collect();
        let mut desired: DesiredState = names
            .windows(2)
            .map(|pair| {
                (
                    pair[0].clone(),
                    Item::default().with("network_groups", json!([pair[1]])),
                )
            })
            .collect();
        desired.insert(names[names.len() - 1].clone(), Item::default());
        let graph = DependencyGraph::resolve(&NETWORK_GROUPS, &desired);
        assert!(graph.find_cycle().is_none());
        assert_eq!(graph.topological_order().unwrap().len(), names.len());

        let last = names[names.len() - 1].clone();
        desired.insert(last, Item::default().with("network_groups", json!([names[0]])));
        let graph = DependencyGraph::resolve(&NETWORK_GROUPS, &desired);
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.len(), names.len() + 1);
        assert_eq!(cycle.first(), cycle.last());
    }
}
