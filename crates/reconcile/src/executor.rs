//! Execution engine - applies a plan in dependency waves with parallelism
//!
//! Each phase runs in waves. A wave holds every pending operation whose
//! dependencies have all succeeded; its remote calls run concurrently on a
//! bounded worker pool. Results are recorded from the calling thread between
//! waves, so ids of freshly created items are known before their referrers'
//! payloads are built.

use crate::aggregate::{Aggregator, Reconciliation};
use crate::client::{Payload, ResolvedReference};
use crate::context::{ProgressCallback, ReconcileContext};
use crate::error::{ItemError, ReconcileError};
use crate::planner::{Operation, Plan};
use crate::retry::{LogCallback, with_retry};
use crate::types::{ApplyResult, OperationKind, Phase, RemoteState};
use rayon::ThreadPool;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Execute a plan against the context's client
///
/// `state` is the remote state the plan was built from; the returned
/// [`Reconciliation`] carries it updated with every successful operation.
/// Item failures never abort execution; only an unusable worker pool does.
pub fn execute<P>(
    ctx: &ReconcileContext<'_>,
    plan: &Plan,
    state: RemoteState,
    progress: &mut P,
) -> Result<Reconciliation, ReconcileError>
where
    P: ProgressCallback + ?Sized,
{
    let mut aggregator = Aggregator::new(plan, state);
    if plan.is_empty() {
        return Ok(aggregator.finish());
    }

    let pool = if ctx.options.jobs > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(ctx.options.jobs)
                .build()
                .map_err(|e| ReconcileError::WorkerPool(e.to_string()))?,
        )
    } else {
        None
    };

    for phase in [Phase::Apply, Phase::Delete] {
        let ops: Vec<&Operation> = plan.phase(phase).collect();
        if ops.is_empty() {
            continue;
        }

        log::info!(
            "{}: {phase} phase, {} operation(s)",
            plan.kind.name,
            ops.len()
        );
        progress.on_phase_start(phase, ops.len());
        run_phase(ctx, pool.as_ref(), ops, &mut aggregator, progress);
        progress.on_phase_complete(phase);
    }

    Ok(aggregator.finish())
}

fn run_phase<P>(
    ctx: &ReconcileContext<'_>,
    pool: Option<&ThreadPool>,
    mut pending: Vec<&Operation>,
    aggregator: &mut Aggregator,
    progress: &mut P,
) where
    P: ProgressCallback + ?Sized,
{
    while !pending.is_empty() {
        if ctx.cancellation.is_cancelled() {
            log::warn!("Cancelled with {} operation(s) pending", pending.len());
            for op in pending.drain(..) {
                let error = ItemError::Cancelled {
                    name: op.name.clone(),
                    operation: op.kind,
                };
                record(aggregator, progress, op, ApplyResult::Skipped { error });
            }
            break;
        }

        let mut ready = Vec::new();
        let mut waiting = Vec::new();
        let mut resolved = false;

        for op in pending {
            match readiness(op, aggregator) {
                Readiness::Blocked(dependency) => {
                    let error = ItemError::DependencyFailed {
                        name: op.name.clone(),
                        operation: op.kind,
                        dependency,
                    };
                    record(aggregator, progress, op, ApplyResult::Skipped { error });
                    resolved = true;
                }
                Readiness::Waiting => waiting.push(op),
                Readiness::Ready => match &op.preflight {
                    Some(error) => {
                        let error = error.clone();
                        record(aggregator, progress, op, ApplyResult::Failed { error });
                        resolved = true;
                    }
                    None => ready.push(op),
                },
            }
        }
        pending = waiting;

        if ready.is_empty() {
            if resolved {
                continue;
            }
            // Unreachable for an acyclic plan; never spin.
            for op in pending.drain(..) {
                let dependency = op.depends_on.first().cloned().unwrap_or_default();
                let error = ItemError::DependencyFailed {
                    name: op.name.clone(),
                    operation: op.kind,
                    dependency,
                };
                record(aggregator, progress, op, ApplyResult::Skipped { error });
            }
            break;
        }

        let wave: Vec<(&Operation, Option<Payload>)> = ready
            .into_iter()
            .map(|op| (op, build_payload(op, aggregator)))
            .collect();
        log::debug!(
            "Wave of {}: {:?}",
            wave.len(),
            wave.iter().map(|(op, _)| &op.name).collect::<Vec<_>>()
        );

        let results = match pool {
            Some(pool) if wave.len() > 1 => pool.install(|| {
                wave.par_iter()
                    .map(|(op, payload)| apply_operation(ctx, op, payload.as_ref()))
                    .collect::<Vec<_>>()
            }),
            _ => wave
                .iter()
                .map(|(op, payload)| apply_operation(ctx, op, payload.as_ref()))
                .collect(),
        };

        for ((op, _), result) in wave.iter().zip(results) {
            record(aggregator, progress, op, result);
        }
    }
}

enum Readiness {
    Ready,
    Waiting,
    /// A dependency finished without succeeding
    Blocked(String),
}

fn readiness(op: &Operation, aggregator: &Aggregator) -> Readiness {
    let mut waiting = false;
    for dependency in &op.depends_on {
        match aggregator.result(dependency) {
            Some(result) if result.is_success() => {}
            Some(_) => return Readiness::Blocked(dependency.clone()),
            None => waiting = true,
        }
    }
    if waiting {
        Readiness::Waiting
    } else {
        Readiness::Ready
    }
}

fn record<P>(aggregator: &mut Aggregator, progress: &mut P, op: &Operation, result: ApplyResult)
where
    P: ProgressCallback + ?Sized,
{
    aggregator.record(op, result);
    if let Some(outcome) = aggregator.last() {
        progress.on_operation_complete(outcome);
    }
}

/// Payload for a create or update, with references resolved to remote ids
fn build_payload(op: &Operation, aggregator: &Aggregator) -> Option<Payload> {
    if op.kind == OperationKind::Delete {
        return None;
    }

    let mut attributes = op.attributes.clone();
    let mut references = BTreeMap::new();
    for (field, names) in &op.references {
        attributes.remove(*field);
        let resolved = names
            .iter()
            .filter_map(|name| {
                let remote_id = aggregator.remote_id(name);
                if remote_id.is_none() {
                    log::warn!("{}: no remote id known for referenced {name}", op.name);
                }
                remote_id.map(|id| ResolvedReference {
                    name: name.clone(),
                    remote_id: id.to_string(),
                })
            })
            .collect();
        references.insert((*field).to_string(), resolved);
    }

    Some(Payload {
        name: op.name.clone(),
        attributes,
        references,
    })
}

/// Issue the remote call for one operation, retrying transient errors
fn apply_operation(
    ctx: &ReconcileContext<'_>,
    op: &Operation,
    payload: Option<&Payload>,
) -> ApplyResult {
    let label = format!("{} {}", op.kind, op.name);
    let callback = LogCallback { label: &label };
    let remote_id = op.remote_id.as_deref().unwrap_or_default();
    let client = ctx.client;

    let outcome = match (op.kind, payload) {
        (OperationKind::Create, Some(payload)) => {
            with_retry(&ctx.retry, &ctx.cancellation, &callback, || client.create(payload))
                .map(|remote_id| ApplyResult::Created { remote_id })
        }
        (OperationKind::Update, Some(payload)) => with_retry(
            &ctx.retry,
            &ctx.cancellation,
            &callback,
            || client.update(remote_id, payload),
        )
        .map(|()| ApplyResult::Updated),
        _ => with_retry(&ctx.retry, &ctx.cancellation, &callback, || {
            match client.delete(remote_id) {
                Err(e) if e.is_ignorable() => {
                    log::debug!("{label}: already gone ({e})");
                    Ok(())
                }
                other => other,
            }
        })
        .map(|()| ApplyResult::Deleted),
    };

    match outcome {
        Ok(result) => {
            log::info!("{label}: ok");
            result
        }
        Err(failure) => {
            log::warn!("{label}: {}", failure.error);
            ApplyResult::Failed {
                error: ItemError::Remote {
                    name: op.name.clone(),
                    operation: op.kind,
                    attempts: failure.attempts,
                    source: failure.error,
                },
            }
        }
    }
}
