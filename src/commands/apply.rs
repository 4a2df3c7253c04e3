use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{ExecuteOptions, ReconcileContext, build_plan, execute};

use super::Session;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::{BarProgress, confirm_proceed, display_plan, print_summary, simulate};
use crate::ui;

/// Reconcile FMC with a desired-state document
///
/// State is written after every executed apply, including partially failed
/// ones, so the next run only retries what did not succeed. Exits with an
/// error naming every failed or skipped item.
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let mut session = Session::load(ctx, &args.file)?;
    let kind = session.kind();
    let refresh = session.refresh_enabled(args.no_refresh);

    let client = if args.dry_run && !refresh {
        None
    } else {
        Some(session.client()?)
    };

    let state = match &client {
        Some(client) if refresh => session.refresh(ctx, client)?,
        _ => session.state.clone(),
    };

    let plan = build_plan(kind, &session.document.items, &state)?;
    display_plan(&plan, &state, &session.document.instance);

    if plan.is_empty() {
        if state != session.state && !args.dry_run {
            session.save(state)?;
            ui::dim("Recorded refreshed state");
        }
        return Ok(());
    }

    if args.dry_run {
        let result = simulate(kind, &session.document.items, &state)?;
        print_summary(&result);
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    if !args.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let Some(client) = client else {
        bail!("No FMC client available for {}", kind.name);
    };
    let jobs = args.jobs.unwrap_or(session.config.apply.jobs).max(1);
    let rctx = ReconcileContext::new(&client)
        .with_retry(session.config.retry.to_retry_config())
        .with_options(ExecuteOptions {
            jobs,
            refresh: false,
        })
        .with_cancellation(session.config.apply.cancellation());

    println!();
    println!(
        "  {} Applying {} operation(s) with {} worker(s)...",
        "→".cyan(),
        plan.len(),
        jobs
    );

    let mut progress = BarProgress::new(ctx.quiet);
    let result = execute(&rctx, &plan, state, &mut progress)?;
    session.save(result.state.clone())?;
    print_summary(&result);

    match result.error() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
