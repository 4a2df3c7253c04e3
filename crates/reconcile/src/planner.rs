//! Execution planner - orders operations by item references

use crate::diff::{Diff, DiffSummary, compute_diff};
use crate::error::{ItemError, ReconcileError};
use crate::graph::DependencyGraph;
use crate::kind::ResourceKind;
use crate::types::{Attributes, DesiredState, Item, OperationKind, Phase, RemoteState};
use std::collections::{BTreeMap, BTreeSet};

/// One remote mutation in a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub kind: OperationKind,
    /// Remote identifier for updates and deletes
    pub remote_id: Option<String>,
    /// Full desired attributes (empty for deletes)
    pub attributes: Attributes,
    /// Resolvable sibling names per reference field
    pub references: BTreeMap<&'static str, Vec<String>>,
    /// Operations in this plan that must succeed before this one starts
    pub depends_on: Vec<String>,
    /// Set when the operation is known to fail before any remote call
    pub preflight: Option<ItemError>,
}

impl Operation {
    pub fn phase(&self) -> Phase {
        match self.kind {
            OperationKind::Create | OperationKind::Update => Phase::Apply,
            OperationKind::Delete => Phase::Delete,
        }
    }
}

/// Ordered operations for one apply of one plural resource
///
/// Creates and updates come first, referents before referrers; deletes follow,
/// referrers before referents.
#[derive(Debug, Clone)]
pub struct Plan {
    pub kind: ResourceKind,
    pub operations: Vec<Operation>,
    pub unchanged: Vec<String>,
    diff: Diff,
}

impl Plan {
    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Total number of operations in the plan
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Find the operation for an item
    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Position of an item's operation in plan order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.operations.iter().position(|op| op.name == name)
    }

    /// Operations belonging to a phase, in plan order
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(move |op| op.phase() == phase)
    }

    pub fn diff(&self) -> &Diff {
        &self.diff
    }

    pub fn summary(&self) -> DiffSummary {
        self.diff.summary()
    }
}

/// Build a plan from desired and remote state
///
/// Fails with [`ReconcileError::Cycle`] when the references form a cycle;
/// nothing has been sent to the remote at that point. Dangling references
/// do not fail the plan: the referring operation carries a pre-flight error.
pub fn build_plan(
    kind: &ResourceKind,
    desired: &DesiredState,
    remote: &RemoteState,
) -> Result<Plan, ReconcileError> {
    let graph = DependencyGraph::resolve(kind, desired);
    if let Some(path) = graph.find_cycle() {
        return Err(ReconcileError::Cycle {
            kind: kind.name,
            path,
        });
    }
    let order = graph
        .topological_order()
        .map_err(|path| ReconcileError::Cycle {
            kind: kind.name,
            path,
        })?;

    let mut diff = compute_diff(desired, remote);
    // An unchanged item whose referent is gone still has to surface the error
    let stale: Vec<String> = diff
        .unchanged
        .iter()
        .filter(|name| !graph.dangling(name).is_empty())
        .cloned()
        .collect();
    for name in stale {
        log::debug!("{} {name} is unchanged but has dangling references", kind.name);
        diff.unchanged.remove(&name);
        diff.updates.insert(name);
    }

    let mut operations = Vec::with_capacity(diff.summary().total());

    for name in &order {
        if !diff.is_upsert(name) {
            continue;
        }
        let item = &desired[name];
        let op_kind = if diff.creates.contains(name) {
            OperationKind::Create
        } else {
            OperationKind::Update
        };

        let references = kind
            .reference_fields
            .iter()
            .filter(|field| item.get(field.attribute).is_some())
            .map(|field| {
                let names: Vec<String> = field
                    .names(item)
                    .into_iter()
                    .filter(|n| graph.contains(n))
                    .collect();
                (field.attribute, names)
            })
            .collect();

        operations.push(Operation {
            name: name.clone(),
            kind: op_kind,
            remote_id: remote.get(name).map(|e| e.remote_id.clone()),
            attributes: item.attributes.clone(),
            references,
            depends_on: graph
                .references(name)
                .filter(|r| *r != name && diff.is_upsert(r))
                .map(str::to_string)
                .collect(),
            preflight: dangling_error(&graph, name, op_kind),
        });
    }

    if !diff.deletes.is_empty() {
        operations.extend(plan_deletes(kind, remote, &diff)?);
    }

    log::debug!(
        "Planned {} {} operation(s): {:?}",
        operations.len(),
        kind.name,
        operations
            .iter()
            .map(|op| format!("{} {}", op.kind, op.name))
            .collect::<Vec<_>>()
    );

    Ok(Plan {
        kind: *kind,
        operations,
        unchanged: diff.unchanged.iter().cloned().collect(),
        diff,
    })
}

/// Order deletes using the references recorded in remote state
///
/// A delete waits for every operation on an item that referenced it at the
/// last apply: either that item is deleted too, or its update drops the
/// reference.
fn plan_deletes(
    kind: &ResourceKind,
    remote: &RemoteState,
    diff: &Diff,
) -> Result<Vec<Operation>, ReconcileError> {
    let applied: BTreeMap<String, Item> = remote
        .iter()
        .map(|(name, entry)| (name.clone(), Item::new(entry.attributes.clone())))
        .collect();
    let graph = DependencyGraph::resolve(kind, &applied);
    let order = graph
        .topological_order()
        .map_err(|path| ReconcileError::Cycle {
            kind: kind.name,
            path,
        })?;

    let changing: BTreeSet<&str> = diff
        .creates
        .iter()
        .chain(&diff.updates)
        .chain(&diff.deletes)
        .map(String::as_str)
        .collect();

    Ok(order
        .iter()
        .rev()
        .filter(|name| diff.deletes.contains(*name))
        .map(|name| Operation {
            name: name.clone(),
            kind: OperationKind::Delete,
            remote_id: Some(remote[name].remote_id.clone()),
            attributes: Attributes::new(),
            references: BTreeMap::new(),
            depends_on: graph
                .referrers(name)
                .filter(|r| r != name && changing.contains(r))
                .map(str::to_string)
                .collect(),
            preflight: None,
        })
        .collect())
}

fn dangling_error(
    graph: &DependencyGraph,
    name: &str,
    operation: OperationKind,
) -> Option<ItemError> {
    let dangling = graph.dangling(name);
    if dangling.is_empty() {
        return None;
    }

    let fields: BTreeSet<&str> = dangling.iter().map(|d| d.field).collect();
    Some(ItemError::DanglingReference {
        name: name.to_string(),
        operation,
        field: fields.into_iter().collect::<Vec<_>>().join(", "),
        targets: dangling.iter().map(|d| d.target.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{HOSTS, NETWORK_GROUPS};
    use crate::types::RemoteEntry;
    use serde_json::json;

    fn group(refs: &[&str]) -> Item {
        Item::default()
            .with("network_groups", json!(refs))
            .with("literals", json!([{ "value": "10.0.0.0/8" }]))
    }

    fn applied(desired: &DesiredState) -> RemoteState {
        desired
            .iter()
            .map(|(name, item)| {
                (
                    name.clone(),
                    RemoteEntry::new(format!("id-{name}"), item.attributes.clone()),
                )
            })
            .collect()
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let desired: DesiredState = [("g2".to_string(), group(&["g2"]))].into();
        let err = build_plan(&NETWORK_GROUPS, &desired, &RemoteState::new()).unwrap_err();
        assert!(err.to_string().contains("Cycle in network_groups"));
        assert_eq!(
            err,
            ReconcileError::Cycle {
                kind: "network_groups",
                path: vec!["g2".into(), "g2".into()],
            }
        );
    }

    #[test]
    fn test_dangling_reference_is_preflight_failure() {
        let desired: DesiredState = [("g2".to_string(), group(&["no_such_group"]))].into();
        let plan = build_plan(&NETWORK_GROUPS, &desired, &RemoteState::new()).unwrap();

        let op = plan.get("g2").unwrap();
        assert_eq!(op.kind, OperationKind::Create);
        let err = op.preflight.as_ref().unwrap();
        assert!(err.to_string().contains("Failed to create"));
        assert!(op.references["network_groups"].is_empty());
    }

    #[test]
    fn test_referent_created_first() {
        let desired: DesiredState = [
            ("g1".to_string(), group(&["g2"])),
            ("g2".to_string(), group(&[])),
        ]
        .into();
        let plan = build_plan(&NETWORK_GROUPS, &desired, &RemoteState::new()).unwrap();

        assert!(plan.position("g2").unwrap() < plan.position("g1").unwrap());
        assert_eq!(plan.get("g1").unwrap().depends_on, vec!["g2"]);
        assert!(plan.get("g2").unwrap().depends_on.is_empty());
    }

    #[test]
    fn test_unchanged_referent_is_not_a_dependency() {
        let first: DesiredState = [("g2".to_string(), group(&[]))].into();
        let remote = applied(&first);
        let desired: DesiredState = [
            ("g1".to_string(), group(&["g2"])),
            ("g2".to_string(), group(&[])),
        ]
        .into();

        let plan = build_plan(&NETWORK_GROUPS, &desired, &remote).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.get("g1").unwrap().depends_on.is_empty());
        assert_eq!(plan.unchanged, vec!["g2"]);
    }

    #[test]
    fn test_deletes_follow_referrer_updates() {
        let first: DesiredState = [
            ("g1".to_string(), group(&["g2", "g3"])),
            ("g2".to_string(), group(&[])),
            ("g3".to_string(), group(&["g4"])),
            ("g4".to_string(), group(&[])),
        ]
        .into();
        let remote = applied(&first);
        let desired: DesiredState = [
            ("g1".to_string(), group(&["g2"])),
            ("g2".to_string(), group(&[])),
        ]
        .into();

        let plan = build_plan(&NETWORK_GROUPS, &desired, &remote).unwrap();
        let names: Vec<_> = plan.operations.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, vec!["g1", "g3", "g4"]);

        let g3 = plan.get("g3").unwrap();
        assert_eq!(g3.kind, OperationKind::Delete);
        assert_eq!(g3.remote_id.as_deref(), Some("id-g3"));
        assert_eq!(g3.depends_on, vec!["g1"]);
        assert_eq!(plan.get("g4").unwrap().depends_on, vec!["g3"]);
        assert_eq!(plan.phase(Phase::Delete).count(), 2);
    }

    #[test]
    fn test_unchanged_item_with_removed_referent() {
        let first: DesiredState = [
            ("g1".to_string(), group(&["g3"])),
            ("g3".to_string(), group(&[])),
        ]
        .into();
        let remote = applied(&first);
        let desired: DesiredState = [("g1".to_string(), group(&["g3"]))].into();

        let plan = build_plan(&NETWORK_GROUPS, &desired, &remote).unwrap();
        let names: Vec<_> = plan.operations.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, vec!["g1", "g3"]);
        assert!(plan.unchanged.is_empty());

        let g1 = plan.get("g1").unwrap();
        assert_eq!(g1.kind, OperationKind::Update);
        assert!(matches!(
            g1.preflight,
            Some(ItemError::DanglingReference { ref targets, .. }) if targets.as_slice() == ["g3"]
        ));
        assert_eq!(plan.get("g3").unwrap().depends_on, vec!["g1"]);
    }

    #[test]
    fn test_second_plan_is_empty() {
        let desired: DesiredState = [
            ("g1".to_string(), group(&["g2"])),
            ("g2".to_string(), group(&[])),
        ]
        .into();
        let plan = build_plan(&NETWORK_GROUPS, &desired, &applied(&desired)).unwrap();
        assert!(plan.is_empty());
        assert!(!plan.summary().has_changes());
    }

    #[test]
    fn test_hosts_have_no_dependencies() {
        let desired: DesiredState = [
            ("hosts_1".to_string(), Item::default().with("ip", json!("10.1.1.1"))),
            ("hosts_2".to_string(), Item::default().with("ip", json!("10.1.1.2"))),
        ]
        .into();
        let plan = build_plan(&HOSTS, &desired, &RemoteState::new()).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.operations.iter().all(|op| op.depends_on.is_empty()));
        assert!(plan.operations.iter().all(|op| op.references.is_empty()));
    }
}
