//! Top-level reconciliation entry points

use crate::aggregate::Reconciliation;
use crate::context::{ProgressCallback, ReconcileContext};
use crate::diff::refresh_state;
use crate::error::ReconcileError;
use crate::executor::execute;
use crate::kind::ResourceKind;
use crate::planner::{Plan, build_plan};
use crate::types::{DesiredState, RemoteState};

/// Re-read the remote and fold what it reports into `state`
///
/// A failed list aborts before anything is planned or mutated.
pub fn refresh(
    ctx: &ReconcileContext<'_>,
    kind: &ResourceKind,
    state: &RemoteState,
) -> Result<RemoteState, ReconcileError> {
    let listed = ctx.client.list().map_err(|source| ReconcileError::Refresh {
        kind: kind.name,
        source,
    })?;
    log::debug!("{}: remote lists {} object(s)", kind.name, listed.len());
    Ok(refresh_state(state, &listed))
}

/// Refresh (unless disabled), plan and execute in one go
///
/// Returns `Err` only when nothing was mutated: a failed refresh, a reference
/// cycle, or an unusable worker pool. Item failures are reported through
/// [`Reconciliation::error`].
pub fn reconcile<P>(
    ctx: &ReconcileContext<'_>,
    kind: &ResourceKind,
    desired: &DesiredState,
    state: RemoteState,
    progress: &mut P,
) -> Result<Reconciliation, ReconcileError>
where
    P: ProgressCallback + ?Sized,
{
    let state = if ctx.options.refresh {
        refresh(ctx, kind, &state)?
    } else {
        state
    };

    let plan = build_plan(kind, desired, &state)?;
    if plan.is_empty() {
        log::info!("{}: {} item(s) up to date", kind.name, plan.unchanged.len());
        return Ok(Reconciliation::unchanged(&plan, state));
    }

    execute(ctx, &plan, state, progress)
}

/// Plan without executing, refreshing first when enabled
pub fn preview(
    ctx: &ReconcileContext<'_>,
    kind: &ResourceKind,
    desired: &DesiredState,
    state: &RemoteState,
) -> Result<(Plan, RemoteState), ReconcileError> {
    let state = if ctx.options.refresh {
        refresh(ctx, kind, state)?
    } else {
        state.clone()
    };
    let plan = build_plan(kind, desired, &state)?;
    Ok((plan, state))
}
