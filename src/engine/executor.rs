//! Execution front-end - progress, confirmation, summaries and dry runs

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use indicatif::ProgressBar;
use reconcile::{
    ApplyResult, DesiredState, ExecuteOptions, MemoryClient, NoProgress, OperationOutcome, Phase,
    ProgressCallback, ReconcileContext, Reconciliation, RemoteEntry, RemoteState, ResourceKind,
    RetryConfig, build_plan, execute,
};

use crate::progress;

/// Progress bar per phase; failures are printed above the bar
pub struct BarProgress {
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet, bar: None }
    }
}

impl ProgressCallback for BarProgress {
    fn on_phase_start(&mut self, phase: Phase, count: usize) {
        let bar = if self.quiet {
            progress::hidden()
        } else {
            let prefix = match phase {
                Phase::Apply => "Applying",
                Phase::Delete => "Deleting",
            };
            progress::bar(count as u64, prefix)
        };
        self.bar = Some(bar);
    }

    fn on_operation_complete(&mut self, outcome: &OperationOutcome) {
        let Some(bar) = &self.bar else {
            return;
        };
        let symbol = outcome_symbol(&outcome.result);
        match outcome.result.error() {
            Some(error) => bar.println(format!("    {symbol} {error}")),
            None => bar.set_message(format!("{symbol} {}", outcome.name)),
        }
        bar.inc(1);
    }

    fn on_phase_complete(&mut self, _phase: Phase) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn outcome_symbol(result: &ApplyResult) -> String {
    match result {
        ApplyResult::Created { .. } | ApplyResult::Updated | ApplyResult::Deleted => {
            "✓".green().to_string()
        }
        ApplyResult::Failed { .. } => "✗".red().to_string(),
        ApplyResult::Skipped { .. } => "⊘".yellow().to_string(),
    }
}

/// Confirm with user
pub fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Run a plan against an in-memory copy of the persisted state
///
/// Nothing is sent to FMC. Remote ids in the result are simulated and must
/// not be persisted.
pub fn simulate(
    kind: &ResourceKind,
    desired: &DesiredState,
    state: &RemoteState,
) -> Result<Reconciliation> {
    let client = MemoryClient::new(*kind);
    let seeded: RemoteState = state
        .iter()
        .map(|(name, entry)| {
            let id = client.seed(name, entry.attributes.clone());
            (name.clone(), RemoteEntry::new(id, entry.attributes.clone()))
        })
        .collect();

    let plan = build_plan(kind, desired, &seeded)?;
    let ctx = ReconcileContext::new(&client)
        .with_retry(RetryConfig::no_retry())
        .with_options(ExecuteOptions {
            jobs: 1,
            refresh: false,
        });
    execute(&ctx, &plan, seeded, &mut NoProgress).context("Simulation failed")
}

/// Print final summary
pub fn print_summary(result: &Reconciliation) {
    let summary = &result.summary;
    println!();
    if summary.is_success() {
        println!(
            "  {} {} reconciled successfully!",
            "✓".green().bold(),
            result.kind
        );
    } else {
        println!(
            "  {} {} reconciled with errors",
            "⚠".yellow().bold(),
            result.kind
        );
    }

    if summary.created > 0 {
        println!("    • {} items created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} items updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} items deleted", summary.deleted);
    }
    if summary.unchanged > 0 {
        println!("    • {} items unchanged", summary.unchanged);
    }
    if summary.skipped > 0 {
        println!("    • {} items skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "items".red());
    }
}
