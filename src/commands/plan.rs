use anyhow::Result;
use reconcile::build_plan;

use super::Session;
use crate::Context;
use crate::cli::PlanArgs;
use crate::engine::display_plan;
use crate::ui;

/// Show what `apply` would do, without mutating FMC or the state file
pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let session = Session::load(ctx, &args.file)?;
    let kind = session.kind();

    let state = if session.refresh_enabled(args.no_refresh) {
        let client = session.client()?;
        session.refresh(ctx, &client)?
    } else {
        ui::dim("Skipping refresh; planning against persisted state");
        session.state.clone()
    };

    let plan = build_plan(kind, &session.document.items, &state)?;
    display_plan(&plan, &state, &session.document.instance);

    if state != session.state && !ctx.quiet {
        println!();
        ui::info("FMC differs from the persisted state; apply will record the refreshed state");
    }
    Ok(())
}
