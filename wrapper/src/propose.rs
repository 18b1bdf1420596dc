//! `wrapper propose` - ask the model for the next step definition.
//!
//! The response must be exactly one YAML mapping containing `step_id`; it is
//! written verbatim (after fence stripping) to `step.yaml` so the human can
//! review and edit it before compiling.

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::deviation::Deviations;
use crate::core::inventory::Snapshot;
use crate::core::plan::Plan;
use crate::core::state::{ExternalState, Ledger};
use crate::core::step::{Dependency, ForbiddenItem, RepoConfig, Step};
use crate::core::text::strip_code_fences;
use crate::init;
use crate::io::console::Console;
use crate::io::llm::{LlmClient, Role};
use crate::io::paths::WrapperPaths;
use crate::io::prompt::{PromptEngine, ProposeInputs};
use crate::io::store::{load_json, load_ledger, load_text, load_yaml, save_text};

/// Entry point for `wrapper propose`.
pub fn run(
    paths: &WrapperPaths,
    llm: &dyn LlmClient,
    console: &mut dyn Console,
    no_plan: bool,
) -> Result<bool> {
    if !init::inputs_exist(paths)? {
        println!("Required files missing. Running init...");
        init::run_basic(paths)?;
        println!();
        println!("Please edit the template files and run 'wrapper propose' again.");
        return Ok(false);
    }

    println!("Loading configuration...");
    let architecture = load_text(&paths.architecture)?.unwrap_or_default();
    let repo: RepoConfig = load_yaml(&paths.repo_config)?.unwrap_or_default();
    let ledger = load_ledger(paths)?;
    let external: Option<ExternalState> = load_json(&paths.external_state)?;
    let baseline: Option<Snapshot> = load_json(&paths.baseline_snapshot)?;
    let deviations: Option<Deviations> = load_json(&paths.deviations)?;
    let plan: Option<Plan> = if no_plan {
        None
    } else {
        load_json(&paths.implementation_plan)?
    };

    if let Some(existing) = load_yaml::<Step>(&paths.step)? {
        println!("Warning: step.yaml already exists.");
        println!("Current step: {}", existing.step_id);
        if !console.ask_yes_no("Overwrite?", Some(false))? {
            println!("Aborted.");
            return Ok(false);
        }
    }

    println!("Generating step proposal...");
    if let Some(baseline) = &baseline {
        println!("  Using baseline snapshot from: {}", baseline.timestamp);
    }
    if let Some(deviations) = &deviations {
        if !deviations.deviations.is_empty() {
            println!("  Known deviations: {}", deviations.deviations.len());
        }
    }

    let inputs = build_inputs(
        &architecture,
        &repo,
        &ledger,
        external.as_ref(),
        baseline.as_ref(),
        deviations.as_ref(),
        plan.as_ref(),
    );
    let prompt = PromptEngine::new().render_propose(&inputs)?;
    debug!(bytes = prompt.len(), "propose prompt assembled");

    let response = llm
        .generate(&prompt, Role::StepProposer)
        .context("propose model call")?;
    let cleaned = strip_code_fences(&response);

    let step = match parse_step(&cleaned) {
        Ok(step) => step,
        Err(err) => {
            println!("Error: LLM returned invalid YAML: {err:#}");
            println!("Raw response:");
            println!("{cleaned}");
            return Ok(false);
        }
    };

    save_text(paths, &paths.step, &format!("{cleaned}\n"))?;

    println!();
    println!("Proposed step written to: {}", paths.step.display());
    println!();
    println!("Step ID: {}", step.step_id);
    println!("Type: {}", step.step_type);
    println!(
        "Goal: {}",
        crate::core::text::clip(step.goal.trim(), 100)
    );
    println!();
    println!("Review and edit step.yaml as needed, then run: wrapper compile");

    Ok(true)
}

/// The output contract: one YAML mapping with at least `step_id`.
fn parse_step(cleaned: &str) -> Result<Step> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(cleaned).context("response is not valid YAML")?;
    if !value.is_mapping() {
        anyhow::bail!("response is not a YAML mapping");
    }
    let step: Step = serde_yaml::from_value(value).context("response missing required fields")?;
    if step.step_id.trim().is_empty() {
        anyhow::bail!("missing step_id field");
    }
    Ok(step)
}

fn build_inputs(
    architecture: &str,
    repo: &RepoConfig,
    ledger: &Ledger,
    external: Option<&ExternalState>,
    baseline: Option<&Snapshot>,
    deviations: Option<&Deviations>,
    plan: Option<&Plan>,
) -> ProposeInputs {
    let done_summary = if ledger.done_steps.is_empty() {
        "None yet".to_string()
    } else {
        ledger
            .done_steps
            .iter()
            .map(|step| format!("- {}: {}", step.step_id, step.result))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let invariants = if ledger.invariants.is_empty() {
        "None yet".to_string()
    } else {
        ledger.invariants.join(", ")
    };

    let must_not = bullet_list(&repo.must_not);

    let external_summary = external
        .filter(|state| !state.is_empty())
        .map(|state| {
            state
                .iter()
                .map(|(name, info)| {
                    format!(
                        "- {name}: {} steps done, {} invariants{}",
                        info.done_steps.len(),
                        info.invariants.len(),
                        info.status
                            .as_deref()
                            .map(|status| format!(", status: {status}"))
                            .unwrap_or_default()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_else(|| "None configured".to_string());

    // Dependencies declared in repo.yaml whose synced state is not
    // baseline_verified hard-block feature work.
    let unverified_deps = external.and_then(|state| {
        let unverified: Vec<&str> = repo
            .depends_on
            .iter()
            .map(Dependency::repo_name)
            .filter(|name| {
                state
                    .get(*name)
                    .map(|info| !info.is_baseline_verified())
                    .unwrap_or(true)
            })
            .collect();
        if unverified.is_empty() {
            None
        } else {
            Some(unverified.join(", "))
        }
    });

    let baseline_block = baseline.map(|snapshot| {
        let file_types = snapshot
            .summary
            .file_types
            .iter()
            .take(8)
            .map(|(ext, count)| format!("{ext}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sample_files = snapshot
            .files
            .iter()
            .take(30)
            .map(|file| format!("  - {file}"))
            .collect::<Vec<_>>()
            .join("\n");
        let dirs = snapshot
            .directories
            .iter()
            .take(20)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "- Captured: {}\n- Total files: {}\n- Total directories: {}\n\
             - File types: {file_types}\n- Directories: {dirs}\n\nSample files:\n{sample_files}",
            snapshot.timestamp,
            snapshot.summary.total_files,
            snapshot.summary.total_directories,
        )
    });

    let deviations_block = deviations
        .filter(|doc| !doc.deviations.is_empty())
        .map(|doc| {
            let mut lines: Vec<String> = doc
                .deviations
                .iter()
                .take(10)
                .map(|dev| {
                    format!(
                        "  - [{}] {}: {}",
                        dev.severity.to_uppercase(),
                        dev.id,
                        crate::core::text::clip(&dev.description, 80)
                    )
                })
                .collect();
            if doc.deviations.len() > 10 {
                lines.push(format!("  ... and {} more", doc.deviations.len() - 10));
            }
            lines.join("\n")
        });

    let plan_hint = plan.and_then(Plan::next_open_step).map(|(phase, step)| {
        format!(
            "- Phase: {}\n- Step: {} ({})\n- Scope: {}\n- Files: {}",
            phase.name,
            step.step_id,
            step.name,
            step.scope,
            step.files_to_modify.join(", ")
        )
    });

    ProposeInputs {
        architecture: architecture.to_string(),
        repo_name: repo.name_or_unknown().to_string(),
        repo_role: repo.repo_role.trim().to_string(),
        must_not,
        done_summary,
        invariants,
        external_summary,
        unverified_deps,
        baseline: baseline_block,
        deviations: deviations_block,
        plan_hint,
    }
}

fn bullet_list(items: &[ForbiddenItem]) -> String {
    if items.is_empty() {
        return "- None specified".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item.normalized()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::ExternalRepo;

    #[test]
    fn parse_step_requires_mapping_with_step_id() {
        assert!(parse_step("step_id: fix-things\ntype: verification\n").is_ok());
        assert!(parse_step("- just\n- a list\n").is_err());
        assert!(parse_step("goal: no id here\n").is_err());
    }

    #[test]
    fn unverified_dependency_produces_warning() {
        let repo: RepoConfig =
            serde_yaml::from_str("repo_name: api\ndepends_on:\n  - ui\n").expect("repo");
        let mut external = ExternalState::new();
        external.insert("ui".to_string(), ExternalRepo::default());

        let inputs = build_inputs(
            "arch",
            &repo,
            &Ledger::new("api"),
            Some(&external),
            None,
            None,
            None,
        );
        assert_eq!(inputs.unverified_deps.as_deref(), Some("ui"));
    }

    #[test]
    fn verified_dependency_is_not_flagged() {
        let repo: RepoConfig =
            serde_yaml::from_str("repo_name: api\ndepends_on:\n  - ui\n").expect("repo");
        let mut external = ExternalState::new();
        external.insert(
            "ui".to_string(),
            ExternalRepo {
                status: Some("baseline_verified".to_string()),
                ..ExternalRepo::default()
            },
        );

        let inputs = build_inputs(
            "arch",
            &repo,
            &Ledger::new("api"),
            Some(&external),
            None,
            None,
            None,
        );
        assert_eq!(inputs.unverified_deps, None);
    }

    #[test]
    fn plan_hint_uses_first_open_step() {
        use crate::core::plan::{Phase, PlanStep};
        let plan = Plan {
            phases: vec![Phase {
                name: "Cleanup".to_string(),
                steps: vec![
                    PlanStep {
                        step_id: "done-step".to_string(),
                        completed: true,
                        ..PlanStep::default()
                    },
                    PlanStep {
                        step_id: "open-step".to_string(),
                        name: "Next".to_string(),
                        ..PlanStep::default()
                    },
                ],
                ..Phase::default()
            }],
            ..Plan::default()
        };

        let inputs = build_inputs(
            "arch",
            &RepoConfig::default(),
            &Ledger::new("x"),
            None,
            None,
            None,
            Some(&plan),
        );
        let hint = inputs.plan_hint.expect("hint");
        assert!(hint.contains("open-step"));
        assert!(!hint.contains("done-step"));
    }
}
