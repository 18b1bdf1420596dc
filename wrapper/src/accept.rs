//! `wrapper accept` - fold a verified step into the persisted state.
//!
//! Hard-gated on the ledger: the last verification must be a PASS for this
//! exact step id. On success the step is appended to `done_steps`,
//! verification success criteria become invariants, deviations the step
//! resolves are stamped, and the implementation plan (when present) is
//! updated with completion metadata.

use anyhow::{Context, Result};
use tracing::warn;

use crate::core::deviation::Deviations;
use crate::core::plan::Plan;
use crate::core::rules::STATE_DIR_PREFIX;
use crate::core::step::{Step, StepType};
use crate::core::text::strip_code_fences;
use crate::io::console::Console;
use crate::io::git::Git;
use crate::io::llm::{LlmClient, Role};
use crate::io::paths::WrapperPaths;
use crate::io::prompt::{PromptEngine, ResolveDeviationsInputs};
use crate::io::store::{
    load_json, load_ledger, load_yaml, now_timestamp, save_json, save_ledger,
};

/// Entry point for `wrapper accept`.
pub fn run(
    paths: &WrapperPaths,
    llm: Result<&dyn LlmClient, String>,
    console: &mut dyn Console,
) -> Result<bool> {
    let Some(step) = load_yaml::<Step>(&paths.step)? else {
        println!("Error: step.yaml not found.");
        return Ok(false);
    };

    let mut ledger = load_ledger(paths)?;

    if let Err(block) = ledger.accept_gate(&step.step_id) {
        println!("{}", "=".repeat(40));
        println!("ACCEPT BLOCKED");
        println!("{}", "=".repeat(40));
        println!();
        println!("{block}");
        println!();
        println!("You must run 'wrapper verify' and get PASS before accepting.");
        println!("This is non-negotiable.");
        return Ok(false);
    }

    println!("Accepting step: {}", step.step_id);

    // Re-accepting a step id duplicates ledger entries, so it is opt-in.
    if ledger.is_done(&step.step_id) {
        println!("Warning: Step '{}' already accepted.", step.step_id);
        if !console.ask_yes_no("Accept again?", Some(false))? {
            println!("Aborted.");
            return Ok(false);
        }
    }

    ledger.push_done(
        &step.step_id,
        &format!("{} completed", step.step_type),
        now_timestamp(),
    );
    save_ledger(paths, &ledger)?;

    if !step.goal.trim().is_empty() {
        let resolved = resolve_deviations(paths, &llm, &step)?;
        if resolved > 0 {
            println!("Marked {resolved} deviation(s) as resolved by this step");
        }
    }

    if step.step_type == StepType::Verification && !step.success_criteria.is_empty() {
        let added = ledger.merge_invariants(&step.success_criteria);
        save_ledger(paths, &ledger)?;
        println!("Added {added} invariant(s) from verification.");
    }

    let plan: Option<Plan> = load_json(&paths.implementation_plan)?;
    let mut plan_exists = false;
    if let Some(mut plan) = plan {
        plan_exists = true;
        let files_changed = changed_files_for_plan(paths);

        println!();
        println!("Implementation Notes (optional)");
        println!("   Add any comments about this implementation:");
        let notes = console.ask_text("   (Press Enter to skip, or type notes)", true)?;

        if plan.mark_completed(&step.step_id, now_timestamp(), files_changed.clone(), notes.clone())
        {
            save_json(paths, &paths.implementation_plan, &plan)?;
            println!("Updated implementation plan progress");
            if !files_changed.is_empty() {
                println!("Captured {} file(s) changed", files_changed.len());
            }
            if notes.is_some() {
                println!("Saved implementation notes");
            }
        }
        // A step id missing from the plan is silently skipped.
    }

    println!();
    println!("Step '{}' accepted.", step.step_id);
    println!();
    println!("State updated. You can now:");
    println!("  - Run 'wrapper propose' for next step");
    if plan_exists {
        println!("  - Check progress: wrapper plan status");
    } else {
        println!("  - Or manually create a new step.yaml");
    }

    let ledger = load_ledger(paths)?;
    println!();
    println!("Progress: {} steps completed", ledger.done_steps.len());
    println!("Invariants: {}", ledger.invariants.len());

    Ok(true)
}

/// Current changed-file set for plan bookkeeping; state-directory paths are
/// dropped and git trouble collapses to an empty list (accept never fails on
/// bookkeeping).
fn changed_files_for_plan(paths: &WrapperPaths) -> Vec<String> {
    let git = Git::new(&paths.root);
    match git.changed_files(false) {
        Ok(changed) => changed
            .into_iter()
            .filter(|path| !path.starts_with(STATE_DIR_PREFIX))
            .collect(),
        Err(err) => {
            warn!(error = %err, "could not capture changed files for plan");
            Vec::new()
        }
    }
}

/// Ask the model which unresolved deviations this step resolves and stamp
/// them. Any failure is reported as a note and skipped; accept never blocks
/// on this.
fn resolve_deviations(
    paths: &WrapperPaths,
    llm: &Result<&dyn LlmClient, String>,
    step: &Step,
) -> Result<usize> {
    let Some(mut deviations) = load_json::<Deviations>(&paths.deviations)? else {
        return Ok(0);
    };
    let unresolved = deviations.unresolved();
    if unresolved.is_empty() {
        return Ok(0);
    }

    let client = match llm {
        Ok(client) => *client,
        Err(message) => {
            println!("  Note: Could not auto-update deviations ({message})");
            return Ok(0);
        }
    };

    let unresolved_list = unresolved
        .iter()
        .map(|dev| {
            format!(
                "- {}: {}",
                dev.id,
                crate::core::text::clip(&dev.description, 100)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let resolved_ids = match query_resolved_ids(client, step, &unresolved_list) {
        Ok(ids) => ids,
        Err(err) => {
            println!("  Note: Could not auto-update deviations ({err:#})");
            return Ok(0);
        }
    };

    let updated = deviations.mark_resolved(&resolved_ids, &step.step_id);
    if updated > 0 {
        save_json(paths, &paths.deviations, &deviations)?;
    }
    Ok(updated)
}

fn query_resolved_ids(
    llm: &dyn LlmClient,
    step: &Step,
    unresolved_list: &str,
) -> Result<Vec<String>> {
    let prompt = PromptEngine::new().render_resolve_deviations(&ResolveDeviationsInputs {
        step_id: step.step_id.clone(),
        goal: step.goal.trim().to_string(),
        unresolved: unresolved_list.to_string(),
    })?;
    let response = llm
        .generate(&prompt, Role::Verifier)
        .context("deviation resolution model call")?;
    let cleaned = strip_code_fences(&response);
    let ids: Vec<String> =
        serde_json::from_str(&cleaned).context("parse deviation id array")?;
    Ok(ids)
}
