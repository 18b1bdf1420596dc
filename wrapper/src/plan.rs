//! `wrapper plan` - interactive implementation planning and progress views.
//!
//! `plan init` drives a model-assisted wizard: propose 4-6 phases, let the
//! user refine them (reorder, merge, remove, regenerate), then detail each
//! phase into 3-6 steps with optional non-functional requirements. Model
//! replies are JSON and are schema-validated before acceptance. `plan
//! status` and `plan show` are pure read-and-render views.

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;
use tracing::debug;

use crate::core::deviation::Deviations;
use crate::core::inventory::Snapshot;
use crate::core::plan::{Phase, Plan, PlanMetadata, PlanStep, Performance, Requirements, progress_bar};
use crate::core::session::PlanningSession;
use crate::core::step::RepoConfig;
use crate::core::text::{clip, strip_code_fences};
use crate::io::console::Console;
use crate::io::llm::{LlmClient, Role};
use crate::io::paths::WrapperPaths;
use crate::io::prompt::{PlanPhasesInputs, PlanStepsInputs, PromptEngine};
use crate::io::store::{load_json, load_ledger, load_text, load_yaml, now_timestamp, save_json};

const PHASES_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/plan_phases.schema.json"
));
const STEPS_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/plan_steps.schema.json"
));

const MAX_ARCHITECTURE_BYTES: usize = 2_000;
const PROGRESS_BAR_WIDTH: usize = 30;

/// Subcommand of `wrapper plan`; `status` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Init,
    Status,
    Show,
}

/// Entry point for `wrapper plan`.
pub fn run(
    paths: &WrapperPaths,
    llm: Result<&dyn LlmClient, String>,
    console: &mut dyn Console,
    action: PlanAction,
) -> Result<bool> {
    match action {
        PlanAction::Init => cmd_init(paths, llm, console),
        PlanAction::Status => cmd_status(paths),
        PlanAction::Show => cmd_show(paths),
    }
}

fn cmd_init(
    paths: &WrapperPaths,
    llm: Result<&dyn LlmClient, String>,
    console: &mut dyn Console,
) -> Result<bool> {
    header("INTERACTIVE PLANNING");

    if load_json::<Plan>(&paths.implementation_plan)?.is_some() {
        println!("Implementation plan already exists!");
        let choice = console.ask_choice(
            "What would you like to do?",
            &[
                "View existing plan status".to_string(),
                "Regenerate plan (overwrites current)".to_string(),
                "Cancel".to_string(),
            ],
        )?;
        match choice {
            0 => return cmd_status(paths),
            2 => {
                println!("Cancelled.");
                return Ok(false);
            }
            _ => {} // regenerate
        }
    }

    println!("Loading project data...");
    let Some(architecture) = load_text(&paths.architecture)? else {
        println!("architecture.md not found. Run 'wrapper init' first.");
        return Ok(false);
    };
    let Some(repo) = load_yaml::<RepoConfig>(&paths.repo_config)? else {
        println!("repo.yaml not found. Run 'wrapper init' first.");
        return Ok(false);
    };

    let llm = match llm {
        Ok(client) => client,
        Err(message) => {
            println!("Error: {message}");
            return Ok(false);
        }
    };

    let baseline: Option<Snapshot> = load_json(&paths.baseline_snapshot)?;
    let deviations: Option<Deviations> = load_json(&paths.deviations)?;

    if baseline.is_none() || deviations.is_none() {
        println!(
            "No baseline/deviations found. Run 'wrapper verify' first to capture baseline."
        );
        if !console.ask_yes_no("Continue anyway?", Some(false))? {
            return Ok(false);
        }
    }

    let mut session = PlanningSession::new(now_timestamp());
    session.phase = "phase_planning".to_string();
    save_session(paths, &mut session)?;

    println!("Repository Analysis:");
    if let Some(baseline) = &baseline {
        println!("  Files: {}", baseline.summary.total_files);
        println!("  Directories: {}", baseline.summary.total_directories);
    }
    if let Some(deviations) = &deviations {
        println!("  Deviations: {}", deviations.deviations.len());
        let high: Vec<_> = deviations
            .deviations
            .iter()
            .filter(|dev| dev.severity == "high")
            .collect();
        if !high.is_empty() {
            println!();
            println!("  High-severity issues:");
            for dev in high.iter().take(3) {
                println!("    - {}: {}", dev.id, clip(&dev.description, 60));
            }
        }
    }
    println!();

    if !console.ask_yes_no("Ready to create implementation plan?", Some(true))? {
        println!("Cancelled.");
        return Ok(false);
    }

    // Phase planning, with regeneration support.
    let mut phases = loop {
        let proposed = match generate_phases(
            llm,
            &architecture,
            baseline.as_ref(),
            deviations.as_ref(),
        ) {
            Ok(phases) => phases,
            Err(err) => {
                println!("Failed to generate phases: {err:#}");
                return Ok(false);
            }
        };
        match refine_phases(proposed, console, &mut session, paths)? {
            Refinement::Accepted(phases) => break phases,
            Refinement::Regenerate => continue,
            Refinement::Cancelled => {
                println!("Planning cancelled.");
                return Ok(false);
            }
        }
    };

    // Detail each phase into concrete steps.
    session.phase = "step_detailing".to_string();
    save_session(paths, &mut session)?;

    for index in 0..phases.len() {
        header(&format!("DETAILING PHASE {}: {}", index + 1, phases[index].name));
        session.current_phase_idx = index;
        save_session(paths, &mut session)?;

        let steps = match detail_phase(llm, &phases[index], &architecture, &session) {
            Ok(steps) => steps,
            Err(err) => {
                println!("Failed to detail phase {}: {err:#}", index + 1);
                return Ok(false);
            }
        };
        let steps = refine_steps(steps, &phases[index], console)?;

        phases[index].steps = steps;
        session.phases.push(phases[index].clone());
        save_session(paths, &mut session)?;
    }

    let plan = build_final_plan(phases, &repo, &session);
    save_json(paths, &paths.implementation_plan, &plan)?;
    session.phase = "complete".to_string();
    save_session(paths, &mut session)?;

    println!(
        "Implementation plan saved to: {}",
        paths.implementation_plan.display()
    );
    println!();
    println!("{}", "=".repeat(70));
    println!("PLANNING COMPLETE");
    println!("{}", "=".repeat(70));
    println!(
        "Total: {} phases, {} steps",
        plan.metadata.total_phases, plan.metadata.total_steps
    );
    println!("Estimated time: ~{:.0} hours", plan.metadata.estimated_hours);
    println!();
    println!("Next steps:");
    println!("  1. Review plan: wrapper plan show");
    println!("  2. Start execution: wrapper propose");
    println!("{}", "=".repeat(70));

    Ok(true)
}

fn save_session(paths: &WrapperPaths, session: &mut PlanningSession) -> Result<()> {
    session.last_updated = now_timestamp();
    save_json(paths, &paths.planning_session, session)
}

fn header(text: &str) {
    println!();
    println!("{}", "=".repeat(70));
    println!("{text}");
    println!("{}", "=".repeat(70));
}

/// Validate a model JSON reply against an embedded schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema_raw: &str) -> Result<()> {
    let schema: Value = serde_json::from_str(schema_raw).context("parse embedded schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

fn parse_model_json<T: serde::de::DeserializeOwned>(
    response: &str,
    schema_raw: &str,
) -> Result<T> {
    let cleaned = strip_code_fences(response);
    let instance: Value = serde_json::from_str(&cleaned)
        .with_context(|| format!("response is not valid JSON: {}", clip(&cleaned, 500)))?;
    validate_schema(&instance, schema_raw)?;
    serde_json::from_value(instance).context("deserialize validated response")
}

fn generate_phases(
    llm: &dyn LlmClient,
    architecture: &str,
    baseline: Option<&Snapshot>,
    deviations: Option<&Deviations>,
) -> Result<Vec<Phase>> {
    println!("Analyzing architecture and generating phase breakdown...");

    let baseline_summary = baseline
        .map(|snapshot| {
            format!(
                "{} files, {} directories",
                snapshot.summary.total_files, snapshot.summary.total_directories
            )
        })
        .unwrap_or_else(|| "No baseline captured yet".to_string());

    let deviations_summary = deviations
        .filter(|doc| !doc.deviations.is_empty())
        .map(|doc| {
            let count_with = |severity: &str| {
                doc.deviations
                    .iter()
                    .filter(|dev| dev.severity == severity)
                    .count()
            };
            format!(
                "{} total ({} high, {} medium, {} low)",
                doc.deviations.len(),
                count_with("high"),
                count_with("medium"),
                count_with("low")
            )
        })
        .unwrap_or_else(|| "No deviations captured yet".to_string());

    let prompt = PromptEngine::new().render_plan_phases(&PlanPhasesInputs {
        architecture: clip(architecture, MAX_ARCHITECTURE_BYTES),
        baseline_summary,
        deviations_summary,
    })?;
    let response = llm
        .generate(&prompt, Role::StepProposer)
        .context("phase proposal model call")?;
    let phases: Vec<Phase> = parse_model_json(&response, PHASES_SCHEMA)?;
    debug!(count = phases.len(), "model proposed phases");
    Ok(phases)
}

enum Refinement {
    Accepted(Vec<Phase>),
    Regenerate,
    Cancelled,
}

fn refine_phases(
    mut phases: Vec<Phase>,
    console: &mut dyn Console,
    session: &mut PlanningSession,
    paths: &WrapperPaths,
) -> Result<Refinement> {
    loop {
        header("PROPOSED PHASES");
        for (i, phase) in phases.iter().enumerate() {
            println!();
            println!(
                "{}. {} [{}]",
                i + 1,
                phase.name,
                phase.estimated_complexity.to_uppercase()
            );
            println!("   Goal: {}", clip(&phase.goal, 100));
            if !phase.deviations_addressed.is_empty() {
                println!("   Fixes: {} deviation(s)", phase.deviations_addressed.len());
            }
        }
        println!();

        let choice = console.ask_choice(
            "What would you like to do?",
            &[
                "Looks good, continue to detailed planning".to_string(),
                "Change phase order".to_string(),
                "Merge phases".to_string(),
                "Split a phase".to_string(),
                "Remove a phase".to_string(),
                "Regenerate phases".to_string(),
                "Cancel planning".to_string(),
            ],
        )?;

        match choice {
            0 => return Ok(Refinement::Accepted(phases)),
            1 => phases = reorder_phases(phases, console, session, paths)?,
            2 => phases = merge_phases(phases, console)?,
            3 => println!("Phase splitting not implemented yet. Edit plan file manually later."),
            4 => phases = remove_phase(phases, console)?,
            5 => {
                println!("Regeneration would lose current phases.");
                if console.ask_yes_no("Are you sure?", Some(false))? {
                    return Ok(Refinement::Regenerate);
                }
            }
            _ => return Ok(Refinement::Cancelled),
        }
    }
}

fn reorder_phases(
    phases: Vec<Phase>,
    console: &mut dyn Console,
    session: &mut PlanningSession,
    paths: &WrapperPaths,
) -> Result<Vec<Phase>> {
    println!();
    println!("Current order:");
    for (i, phase) in phases.iter().enumerate() {
        println!("  {}. {}", i + 1, phase.name);
    }

    let Some(order_str) = console.ask_text(
        "Enter new order as comma-separated numbers (e.g., 2,1,3,4)",
        true,
    )?
    else {
        return Ok(phases);
    };

    let indices: Vec<usize> = order_str
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .map(|n| n.wrapping_sub(1))
        .collect();
    let valid = indices.len() == phases.len()
        && indices.iter().all(|&i| i < phases.len())
        && indices.iter().collect::<BTreeSet<_>>().len() == indices.len();
    if !valid {
        println!("Invalid order");
        return Ok(phases);
    }

    let reordered: Vec<Phase> = indices.iter().map(|&i| phases[i].clone()).collect();

    let reasoning = console.ask_text("Why this order? (optional, helps guide planning)", true)?;
    if let Some(reasoning) = reasoning {
        session.add_context(
            "Phase order preference",
            &order_str,
            Some(reasoning.clone()),
            now_timestamp(),
        );
        session
            .user_preferences
            .insert("phase_order_reasoning".to_string(), reasoning);
        save_session(paths, session)?;
    }

    println!("Phase order updated");
    Ok(reordered)
}

fn merge_phases(phases: Vec<Phase>, console: &mut dyn Console) -> Result<Vec<Phase>> {
    println!();
    println!("Which phases to merge? (enter two numbers, e.g., 1,3)");
    for (i, phase) in phases.iter().enumerate() {
        println!("  {}. {}", i + 1, phase.name);
    }

    let Some(choice_str) = console.ask_text("Phases to merge", true)? else {
        return Ok(phases);
    };
    let indices: Vec<usize> = choice_str
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .map(|n| n.wrapping_sub(1))
        .collect();
    if indices.len() != 2 {
        println!("Must select exactly 2 phases");
        return Ok(phases);
    }
    let (first, second) = (indices[0].min(indices[1]), indices[0].max(indices[1]));
    if second >= phases.len() || first == second {
        println!("Invalid phase numbers");
        return Ok(phases);
    }

    let name = console
        .ask_text(
            &format!("Name for merged phase? [default: {}]", phases[first].name),
            true,
        )?
        .unwrap_or_else(|| phases[first].name.clone());

    let mut merged_devs: Vec<String> = phases[first]
        .deviations_addressed
        .iter()
        .chain(phases[second].deviations_addressed.iter())
        .cloned()
        .collect();
    merged_devs.sort();
    merged_devs.dedup();

    let merged = Phase {
        id: phases[first].id.clone(),
        name: name.clone(),
        goal: format!("{} AND {}", phases[first].goal, phases[second].goal),
        deviations_addressed: merged_devs,
        // Merged scope is by definition bigger.
        estimated_complexity: "high".to_string(),
        dependencies: Vec::new(),
        steps: Vec::new(),
    };

    let mut result: Vec<Phase> = phases
        .into_iter()
        .enumerate()
        .filter(|(i, _)| *i != first && *i != second)
        .map(|(_, phase)| phase)
        .collect();
    result.insert(first, merged);

    println!("Merged into: {name}");
    Ok(result)
}

fn remove_phase(phases: Vec<Phase>, console: &mut dyn Console) -> Result<Vec<Phase>> {
    println!();
    println!("Which phase to remove?");
    for (i, phase) in phases.iter().enumerate() {
        println!("  {}. {}", i + 1, phase.name);
    }

    let index = console.ask_number("Phase number", None, Some(1), Some(phases.len() as i64))?;
    let index = (index - 1) as usize;

    if console.ask_yes_no(&format!("Remove '{}'?", phases[index].name), Some(false))? {
        let mut result = phases;
        let removed = result.remove(index);
        println!("Removed: {}", removed.name);
        return Ok(result);
    }
    Ok(phases)
}

fn detail_phase(
    llm: &dyn LlmClient,
    phase: &Phase,
    architecture: &str,
    session: &PlanningSession,
) -> Result<Vec<PlanStep>> {
    println!("Generating steps for: {}...", phase.name);

    let prompt = PromptEngine::new().render_plan_steps(&PlanStepsInputs {
        phase_name: phase.name.clone(),
        phase_goal: phase.goal.clone(),
        phase_complexity: if phase.estimated_complexity.is_empty() {
            "medium".to_string()
        } else {
            phase.estimated_complexity.clone()
        },
        architecture: clip(architecture, 1_500),
        context_summary: session.context_summary(5),
    })?;
    let response = llm
        .generate(&prompt, Role::StepProposer)
        .context("step detailing model call")?;
    parse_model_json(&response, STEPS_SCHEMA)
}

fn refine_steps(
    mut steps: Vec<PlanStep>,
    phase: &Phase,
    console: &mut dyn Console,
) -> Result<Vec<PlanStep>> {
    println!();
    println!("Proposed steps for '{}':", phase.name);
    for (i, step) in steps.iter().enumerate() {
        println!();
        println!("  {}. {}", i + 1, step.name);
        println!("     Scope: {}", clip(&step.scope, 80));
        println!("     Files: {} file(s)", step.files_to_modify.len());
        println!("     Features: {}", step.features.len());
        println!(
            "     Time: ~{}h | Risk: {}",
            step.estimated_hours,
            if step.risk.is_empty() { "?" } else { &step.risk }
        );
    }
    println!();

    if !console.ask_yes_no(
        "Add non-functional requirements (security, performance, etc.)?",
        Some(true),
    )? {
        return Ok(steps);
    }

    for (i, step) in steps.iter_mut().enumerate() {
        println!();
        println!("{}", "-".repeat(70));
        println!("Step {}: {}", i + 1, step.name);
        println!("{}", "-".repeat(70));

        let requirements = gather_requirements(console)?;
        if !requirements.is_empty() {
            step.requirements = Some(requirements);
        }
    }

    println!("Non-functional requirements added to all steps");
    Ok(steps)
}

const SECURITY_OPTIONS: &[&str] = &[
    "Input validation required",
    "Password/secret hashing required",
    "Authorization/access control checks",
    "Rate limiting required",
    "SQL injection prevention (parameterized queries)",
    "XSS prevention (output escaping)",
    "CSRF protection",
    "Audit logging required",
];

const COST_OPTIONS: &[&str] = &[
    "Minimize API calls (use caching/batching)",
    "Minimize database queries (use joins, avoid N+1)",
    "Connection pooling required",
    "Batch operations where possible",
];

fn gather_requirements(console: &mut dyn Console) -> Result<Requirements> {
    let mut requirements = Requirements::default();

    if console.ask_yes_no("  Add security requirements?", Some(false))? {
        requirements.security = gather_checklist(console, "Security checklist", SECURITY_OPTIONS)?;
    }
    if console.ask_yes_no("  Add performance requirements?", Some(false))? {
        requirements.performance = Some(gather_performance(console)?);
    }
    if console.ask_yes_no("  Add cost optimization notes?", Some(false))? {
        requirements.cost = gather_checklist(console, "Cost optimization", COST_OPTIONS)?;
    }
    if console.ask_yes_no("  Add any other notes for the AI assistant?", Some(false))? {
        requirements.notes = console.ask_text("Additional requirements/notes (free-text)", true)?;
    }

    Ok(requirements)
}

fn gather_checklist(
    console: &mut dyn Console,
    title: &str,
    options: &[&str],
) -> Result<Vec<String>> {
    println!();
    println!("    {title} (select all that apply):");
    for (i, option) in options.iter().enumerate() {
        println!("      [{}] {option}", i + 1);
    }
    println!("      [{}] None of the above", options.len() + 1);

    let Some(choices) = console.ask_text("    Enter numbers (comma-separated, e.g., 1,2,5)", true)?
    else {
        return Ok(Vec::new());
    };

    Ok(choices
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= options.len())
        .map(|n| options[n - 1].to_string())
        .collect())
}

fn gather_performance(console: &mut dyn Console) -> Result<Performance> {
    let mut performance = Performance::default();

    if console.ask_yes_no("    Set latency target?", Some(false))? {
        let target = console.ask_number("      Max latency (ms)", Some(200), Some(1), None)?;
        performance.latency_target_ms = Some(target as u64);
    }
    if console.ask_yes_no("    Enable caching?", Some(false))? {
        let ttl = console.ask_number("      Cache TTL (seconds)", Some(60), Some(1), None)?;
        performance.cache_ttl_seconds = Some(ttl as u64);
    }
    performance.notes = console.ask_text("    Other performance notes? (optional)", true)?;

    Ok(performance)
}

fn build_final_plan(phases: Vec<Phase>, repo: &RepoConfig, session: &PlanningSession) -> Plan {
    let total_steps: usize = phases.iter().map(|phase| phase.steps.len()).sum();
    let estimated_hours: f64 = phases
        .iter()
        .flat_map(|phase| phase.steps.iter())
        .map(|step| step.estimated_hours)
        .sum();

    Plan {
        metadata: PlanMetadata {
            created: Some(session.started.clone()),
            repo_name: repo.name_or_unknown().to_string(),
            total_phases: phases.len(),
            total_steps,
            estimated_hours: (estimated_hours * 10.0).round() / 10.0,
            planning_context: session.context_summary(5),
        },
        phases,
    }
}

fn cmd_status(paths: &WrapperPaths) -> Result<bool> {
    let Some(plan) = load_json::<Plan>(&paths.implementation_plan)? else {
        println!("No implementation plan found. Run 'wrapper plan init' first.");
        return Ok(false);
    };
    let ledger = load_ledger(paths)?;
    let done_ids: BTreeSet<String> = ledger
        .done_steps
        .iter()
        .map(|step| step.step_id.clone())
        .collect();

    header("IMPLEMENTATION PLAN STATUS");
    println!(
        "Created: {}",
        plan.metadata.created.as_deref().unwrap_or("unknown")
    );
    println!("Repository: {}", plan.metadata.repo_name);
    println!();

    let mut total_steps = 0;
    let mut completed_steps = 0;

    for (i, phase) in plan.phases.iter().enumerate() {
        let (completed, total) = phase.completion(&done_ids);
        total_steps += total;
        completed_steps += completed;

        let marker = if total > 0 && completed == total {
            "[done]"
        } else if completed > 0 {
            "[....]"
        } else {
            "[    ]"
        };
        println!(
            "{marker} Phase {}: {} ({completed}/{total} complete)",
            i + 1,
            phase.name
        );
        for (j, step) in phase.steps.iter().enumerate() {
            let mark = if done_ids.contains(&step.step_id) { "x" } else { " " };
            println!("   [{mark}] {}. {}", j + 1, step.name);
        }
        println!();
    }

    if total_steps > 0 {
        let percent = completed_steps as f64 / total_steps as f64 * 100.0;
        let bar = progress_bar(completed_steps, total_steps, PROGRESS_BAR_WIDTH);
        println!("Progress: [{bar}] {percent:.0}% ({completed_steps}/{total_steps} steps)");

        let remaining = plan.metadata.estimated_hours * (1.0 - percent / 100.0);
        println!("Estimated time remaining: ~{remaining:.1} hours");
    }

    println!();
    println!("Next step:");
    println!("  wrapper propose");

    Ok(true)
}

fn cmd_show(paths: &WrapperPaths) -> Result<bool> {
    let Some(plan) = load_json::<Plan>(&paths.implementation_plan)? else {
        println!("No implementation plan found. Run 'wrapper plan init' first.");
        return Ok(false);
    };
    let ledger = load_ledger(paths)?;
    let done_ids: BTreeSet<String> = ledger
        .done_steps
        .iter()
        .map(|step| step.step_id.clone())
        .collect();

    header("IMPLEMENTATION PLAN");

    for (i, phase) in plan.phases.iter().enumerate() {
        let (completed, total) = phase.completion(&done_ids);
        let status = if total > 0 && completed == total {
            "COMPLETE".to_string()
        } else if completed > 0 {
            format!("IN PROGRESS {completed}/{total}")
        } else {
            "PENDING".to_string()
        };

        println!();
        println!("Phase {}: {} [{status}]", i + 1, phase.name);
        println!("   Goal: {}", phase.goal);
        println!("   Steps:");
        for (j, step) in phase.steps.iter().enumerate() {
            let mark = if done_ids.contains(&step.step_id) { "x" } else { " " };
            println!(
                "   [{mark}] {}. {} ({}h, {} risk)",
                j + 1,
                step.name,
                step.estimated_hours,
                if step.risk.is_empty() { "?" } else { &step.risk }
            );
        }
    }
    println!();

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_schema_accepts_model_shape() {
        let response = r#"[
            {"id": "phase-1", "name": "Cleanup", "goal": "Remove violations",
             "deviations_addressed": ["a"], "estimated_complexity": "low", "dependencies": []}
        ]"#;
        let phases: Vec<Phase> = parse_model_json(response, PHASES_SCHEMA).expect("parse");
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].id, "phase-1");
    }

    #[test]
    fn phases_schema_rejects_missing_goal() {
        let response = r#"[{"id": "phase-1", "name": "Cleanup"}]"#;
        let err = parse_model_json::<Vec<Phase>>(response, PHASES_SCHEMA).unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn steps_schema_accepts_fenced_json() {
        let response = "```json\n[{\"step_id\": \"s1\", \"name\": \"N\", \"scope\": \"S\",\n \"files_to_modify\": [], \"features\": [], \"estimated_hours\": 1.5, \"risk\": \"low\"}]\n```";
        let steps: Vec<PlanStep> = parse_model_json(response, STEPS_SCHEMA).expect("parse");
        assert_eq!(steps[0].step_id, "s1");
        assert!((steps[0].estimated_hours - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn non_json_response_is_a_contract_violation() {
        let err =
            parse_model_json::<Vec<Phase>>("sorry, I cannot do that", PHASES_SCHEMA).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }
}
