//! Result aggregation - folds operation outcomes into the new remote state

use crate::error::{ApplyError, ItemError};
use crate::planner::{Operation, Plan};
use crate::types::{ApplyResult, ExecuteSummary, OperationOutcome, RemoteEntry, RemoteState};

/// Collects outcomes while a plan executes
///
/// State only moves for operations that succeeded: a created item gains an
/// entry, an updated item gets its desired attributes, a deleted item loses
/// its entry. Failed and skipped items keep whatever they had before.
#[derive(Debug)]
pub struct Aggregator {
    kind: &'static str,
    state: RemoteState,
    outcomes: Vec<OperationOutcome>,
    summary: ExecuteSummary,
    unchanged: Vec<String>,
}

impl Aggregator {
    pub fn new(plan: &Plan, state: RemoteState) -> Self {
        Self {
            kind: plan.kind.name,
            state,
            outcomes: Vec::with_capacity(plan.len()),
            summary: ExecuteSummary {
                unchanged: plan.unchanged.len(),
                ..Default::default()
            },
            unchanged: plan.unchanged.clone(),
        }
    }

    /// Current remote id of an item, including items created so far
    pub fn remote_id(&self, name: &str) -> Option<&str> {
        self.state.get(name).map(|e| e.remote_id.as_str())
    }

    /// Result already recorded for an item
    pub fn result(&self, name: &str) -> Option<&ApplyResult> {
        self.outcomes
            .iter()
            .rev()
            .find(|o| o.name == name)
            .map(|o| &o.result)
    }

    /// Record the result of one operation
    pub fn record(&mut self, op: &Operation, result: ApplyResult) {
        match &result {
            ApplyResult::Created { remote_id } => {
                self.state.insert(
                    op.name.clone(),
                    RemoteEntry::new(remote_id.clone(), op.attributes.clone()),
                );
            }
            ApplyResult::Updated => {
                if let Some(entry) = self.state.get_mut(&op.name) {
                    entry.attributes.clone_from(&op.attributes);
                }
            }
            ApplyResult::Deleted => {
                self.state.remove(&op.name);
            }
            ApplyResult::Failed { error } | ApplyResult::Skipped { error } => {
                log::debug!("{}: {error}", self.kind);
            }
        }

        self.summary.add_result(&result);
        self.outcomes.push(OperationOutcome {
            name: op.name.clone(),
            kind: op.kind,
            result,
        });
    }

    /// Most recently recorded outcome
    pub fn last(&self) -> Option<&OperationOutcome> {
        self.outcomes.last()
    }

    pub fn finish(self) -> Reconciliation {
        Reconciliation {
            kind: self.kind,
            state: self.state,
            outcomes: self.outcomes,
            summary: self.summary,
            unchanged: self.unchanged,
        }
    }
}

/// Final result of reconciling one plural resource
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub kind: &'static str,
    /// Remote state after the apply, to be persisted
    pub state: RemoteState,
    /// One outcome per planned operation, in completion order
    pub outcomes: Vec<OperationOutcome>,
    pub summary: ExecuteSummary,
    pub unchanged: Vec<String>,
}

impl Reconciliation {
    /// A reconciliation with nothing to do
    pub fn unchanged(plan: &Plan, state: RemoteState) -> Self {
        Aggregator::new(plan, state).finish()
    }

    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }

    /// Errors of every failed or skipped operation, in completion order
    pub fn failures(&self) -> impl Iterator<Item = &ItemError> {
        self.outcomes.iter().filter_map(|o| o.result.error())
    }

    /// Combined error, if any item failed or was skipped
    pub fn error(&self) -> Option<ApplyError> {
        let failures: Vec<ItemError> = self.failures().cloned().collect();
        if failures.is_empty() {
            None
        } else {
            Some(ApplyError {
                kind: self.kind,
                failures,
            })
        }
    }

    pub fn outcome(&self, name: &str) -> Option<&OperationOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::kind::HOSTS;
    use crate::planner::build_plan;
    use crate::types::{DesiredState, Item, OperationKind};
    use serde_json::json;

    fn host(ip: &str) -> Item {
        Item::default().with("ip", json!(ip))
    }

    #[test]
    fn test_state_moves_only_on_success() {
        let desired: DesiredState = [
            ("hosts_1".to_string(), host("10.1.1.1")),
            ("hosts_2".to_string(), host("10.1.1.2")),
        ]
        .into();
        let plan = build_plan(&HOSTS, &desired, &RemoteState::new()).unwrap();
        let mut aggregator = Aggregator::new(&plan, RemoteState::new());

        aggregator.record(
            plan.get("hosts_1").unwrap(),
            ApplyResult::Created {
                remote_id: "id-1".into(),
            },
        );
        aggregator.record(
            plan.get("hosts_2").unwrap(),
            ApplyResult::Failed {
                error: ItemError::Remote {
                    name: "hosts_2".into(),
                    operation: OperationKind::Create,
                    attempts: 1,
                    source: RemoteError::validation("bad address"),
                },
            },
        );
        assert_eq!(aggregator.remote_id("hosts_1"), Some("id-1"));

        let result = aggregator.finish();
        assert_eq!(result.state.len(), 1);
        assert_eq!(result.state["hosts_1"].attributes["ip"], json!("10.1.1.1"));
        assert_eq!(result.summary.created, 1);
        assert_eq!(result.summary.failed, 1);

        let err = result.error().unwrap();
        assert_eq!(err.names(), vec!["hosts_2"]);
    }

    #[test]
    fn test_update_and_delete_move_state() {
        let remote: RemoteState = [
            (
                "hosts_1".to_string(),
                RemoteEntry::new("id-1", host("10.1.1.1").attributes),
            ),
            (
                "hosts_2".to_string(),
                RemoteEntry::new("id-2", host("10.1.1.2").attributes),
            ),
        ]
        .into();
        let desired: DesiredState = [("hosts_1".to_string(), host("10.9.9.9"))].into();
        let plan = build_plan(&HOSTS, &desired, &remote).unwrap();
        let mut aggregator = Aggregator::new(&plan, remote);

        aggregator.record(plan.get("hosts_1").unwrap(), ApplyResult::Updated);
        aggregator.record(plan.get("hosts_2").unwrap(), ApplyResult::Deleted);

        let result = aggregator.finish();
        assert!(result.is_success());
        assert!(result.error().is_none());
        assert_eq!(result.state.len(), 1);
        assert_eq!(result.state["hosts_1"].remote_id, "id-1");
        assert_eq!(result.state["hosts_1"].attributes["ip"], json!("10.9.9.9"));
    }
}
