//! Step contract and installation orchestrator
//!
//! Every unit of installation work implements [`Step`]. The orchestrator runs
//! the fixed step list in order, skipping steps whose goal state is already
//! satisfied, and unwinds completed steps in exact reverse order when a run
//! fails. Execution is strictly sequential; there is no parallelism and no
//! timeout at this level.

use crate::context::InstallContext;
use crate::errors::InstallError;

/// A named unit of installation work.
///
/// Steps are stateless by contract: they are built fresh per invocation and
/// communicate with each other only through the context bag.
pub trait Step {
    /// Stable, unique identifier. Used for display and completion bookkeeping.
    fn name(&self) -> &'static str;

    /// Read-only idempotence predicate: true when `run` would be a no-op and
    /// the orchestrator should skip this step. Inspection failures must read
    /// as "not yet satisfied", never as an error. Always returning false is a
    /// valid policy for steps that are cheap or must re-verify every run.
    fn check(&self, _ctx: &InstallContext) -> bool {
        false
    }

    /// Perform the step's work. A returned error aborts the pipeline and
    /// triggers rollback of previously completed steps; recoverable failures
    /// are expected to be absorbed here and reported as warnings instead.
    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError>;

    /// Best-effort undo of `run`. Errors returned here are reported and
    /// swallowed by the orchestrator so unwinding always continues. The
    /// default no-op is the right choice for steps whose effects are too
    /// disruptive to undo automatically (global tool installs, preflight).
    fn rollback(&self, _ctx: &InstallContext) -> Result<(), InstallError> {
        Ok(())
    }
}

/// Human-facing step title ("shell_config" -> "Shell Config").
fn display_name(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Execute all steps in order against the context.
///
/// For each step: `check` true means skip; otherwise `run`, then mark the
/// step completed. Any error escaping `run` rolls back every previously
/// completed step in reverse order and is then propagated unchanged.
pub fn run_installation(
    ctx: &mut InstallContext,
    steps: &[Box<dyn Step>],
) -> Result<(), InstallError> {
    let ui = ctx.ui.clone();
    if let Some(ui) = &ui {
        ui.set_total_steps(steps.len());
    }

    for step in steps {
        if let Some(ui) = &ui {
            ui.step(&display_name(step.name()));
        }

        if step.check(ctx) {
            log::debug!("step {} already satisfied", step.name());
            if let Some(ui) = &ui {
                ui.info("Already complete, skipping");
            }
            continue;
        }

        match step.run(ctx) {
            Ok(()) => ctx.mark_completed(step.name()),
            Err(err) => {
                log::error!("step {} failed: {}", step.name(), err);
                if let Some(ui) = &ui {
                    ui.error(&format!("{} failed: {}", display_name(step.name()), err));
                }
                if ctx.needs_rollback() {
                    rollback_completed_steps(ctx, steps);
                }
                return Err(err);
            }
        }
    }

    Ok(())
}

/// Roll back every completed step, in exact reverse execution order.
///
/// Rollback is best-effort: a failure to undo one step is reported and never
/// prevents the remaining undo attempts.
pub fn rollback_completed_steps(ctx: &InstallContext, steps: &[Box<dyn Step>]) {
    let ui = ctx.ui.clone();
    if let Some(ui) = &ui {
        ui.warning("Rolling back installation...");
    }

    for step in steps.iter().rev() {
        if !ctx.is_completed(step.name()) {
            continue;
        }
        if let Some(ui) = &ui {
            ui.status(&format!("Rolling back {}...", step.name()));
        }
        if let Err(err) = step.rollback(ctx) {
            log::warn!("rollback failed for {}: {}", step.name(), err);
            if let Some(ui) = &ui {
                ui.error(&format!("Rollback failed for {}: {}", step.name(), err));
            }
        }
    }
}
