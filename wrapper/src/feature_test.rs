//! `wrapper test` - model-assisted feature testing of completed plan steps.
//!
//! Re-reads the files each completed step recorded in `files_changed` and
//! asks the model to judge, per declared feature, whether it is correctly
//! implemented. A step passes iff the response contains the literal
//! `TEST RESULT: PASS` token sequence.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::plan::{Phase, Plan, PlanStep, Requirements};
use crate::io::console::Console;
use crate::io::llm::{LlmClient, Role};
use crate::io::paths::WrapperPaths;
use crate::io::prompt::{FeatureTestInputs, PromptEngine};
use crate::io::store::load_json;

const MAX_FILE_LINES: usize = 500;

/// Entry point for `wrapper test`.
pub fn run(
    paths: &WrapperPaths,
    llm: &dyn LlmClient,
    console: &mut dyn Console,
    step_id: Option<&str>,
) -> Result<bool> {
    let Some(plan) = load_json::<Plan>(&paths.implementation_plan)? else {
        println!("No implementation plan found!");
        println!();
        println!("Run 'wrapper plan init' first to create a plan.");
        return Ok(false);
    };

    if let Some(step_id) = step_id {
        return test_step_by_id(paths, llm, &plan, step_id);
    }

    header("FEATURE TESTING");

    let completed = plan.completed_steps();
    if completed.is_empty() {
        println!("No completed steps to test!");
        println!();
        println!("Complete some steps using 'wrapper propose' and 'wrapper accept' first.");
        return Ok(false);
    }

    println!();
    println!("Total completed steps: {}", completed.len());
    println!();

    // Menu: one entry per phase with completed work, then the generic options.
    let mut options = Vec::new();
    let mut phase_for_option: Vec<&Phase> = Vec::new();
    for phase in &plan.phases {
        let done = phase.steps.iter().filter(|step| step.completed).count();
        if done > 0 {
            options.push(format!(
                "Test Phase: {} ({done}/{} done)",
                phase.name,
                phase.steps.len()
            ));
            phase_for_option.push(phase);
        }
    }
    options.push("Test specific step".to_string());
    options.push("Test ALL completed work".to_string());
    options.push("Cancel".to_string());

    let choice = console.ask_choice("What would you like to test?", &options)?;

    if choice == options.len() - 1 {
        println!("Cancelled.");
        return Ok(true);
    }

    if choice == options.len() - 2 {
        if !console.ask_yes_no("This will test ALL completed steps. Continue?", None)? {
            println!("Cancelled.");
            return Ok(true);
        }
        let mut all_passed = true;
        for phase in &plan.phases {
            if phase.steps.iter().any(|step| step.completed) && !test_phase(paths, llm, phase)? {
                all_passed = false;
            }
        }
        return Ok(all_passed);
    }

    if choice == options.len() - 3 {
        let step_options: Vec<String> = completed
            .iter()
            .map(|(phase, step)| {
                format!("{} - {} (in {})", step.step_id, clip_name(step), phase.name)
            })
            .collect();
        let step_choice = console.ask_choice("Which step to test?", &step_options)?;
        let (phase, step) = completed[step_choice];
        return test_step(paths, llm, phase, step);
    }

    test_phase(paths, llm, phase_for_option[choice])
}

fn clip_name(step: &PlanStep) -> &str {
    if step.scope.is_empty() {
        &step.name
    } else {
        &step.scope
    }
}

fn test_step_by_id(
    paths: &WrapperPaths,
    llm: &dyn LlmClient,
    plan: &Plan,
    step_id: &str,
) -> Result<bool> {
    let Some((phase, step)) = plan.find_step(step_id) else {
        println!("Step {step_id} not found in plan!");
        return Ok(false);
    };
    if !step.completed {
        println!("Step {step_id} is not completed yet!");
        return Ok(false);
    }
    test_step(paths, llm, phase, step)
}

fn test_phase(paths: &WrapperPaths, llm: &dyn LlmClient, phase: &Phase) -> Result<bool> {
    let completed: Vec<&PlanStep> = phase.steps.iter().filter(|step| step.completed).collect();
    if completed.is_empty() {
        println!("No completed steps in {}", phase.name);
        return Ok(true);
    }

    println!();
    header(&format!("TESTING PHASE: {}", phase.name));
    println!("Testing {} completed step(s)", completed.len());

    let mut passed = 0;
    let mut failed = 0;
    for (i, step) in completed.iter().enumerate() {
        println!();
        println!("--- Step {}/{} ---", i + 1, completed.len());
        if test_step(paths, llm, phase, step)? {
            passed += 1;
        } else {
            failed += 1;
        }
    }

    println!();
    println!("{}", "=".repeat(70));
    println!("PHASE TEST SUMMARY: {passed} passed, {failed} failed");
    println!("{}", "=".repeat(70));

    Ok(failed == 0)
}

fn test_step(
    paths: &WrapperPaths,
    llm: &dyn LlmClient,
    _phase: &Phase,
    step: &PlanStep,
) -> Result<bool> {
    println!();
    header(&format!("TESTING STEP: {}", step.step_id));
    println!("Scope: {}", step.scope);
    println!("Features: {}", step.features.len());
    println!("Files: {}", step.files_changed.len());
    println!();

    if step.features.is_empty() {
        println!("No features defined for this step - skipping test");
        return Ok(true);
    }
    if step.files_changed.is_empty() {
        println!("No files recorded - cannot test without code");
        println!("Tip: This step was completed before file tracking was added.");
        return Ok(true);
    }

    println!("Reading files...");
    let mut files_section = String::new();
    let mut readable = 0;
    for file in &step.files_changed {
        if file.starts_with(".wrapper/") {
            continue;
        }
        match read_file_limited(&paths.root.join(file), MAX_FILE_LINES) {
            Some(content) => {
                println!("  + {file} ({} chars)", content.len());
                files_section.push_str(&format!("\n\n--- FILE: {file} ---\n```\n{content}\n```"));
                readable += 1;
            }
            None => println!("  - {file} (not found or unreadable)"),
        }
    }
    if readable == 0 {
        println!("No files could be read - cannot test");
        return Ok(false);
    }

    println!();
    println!("Sending to LLM for testing...");
    let prompt = build_test_prompt(step, &files_section)?;
    let response = llm
        .generate(&prompt, Role::Verifier)
        .context("feature test model call")?;

    println!();
    println!("{}", "=".repeat(70));
    println!("TEST RESULTS");
    println!("{}", "=".repeat(70));
    println!("{response}");
    println!("{}", "=".repeat(70));
    println!();

    if response.to_uppercase().contains("TEST RESULT: PASS") {
        println!("Test PASSED");
        Ok(true)
    } else {
        println!("Test FAILED");
        Ok(false)
    }
}

fn build_test_prompt(step: &PlanStep, files_section: &str) -> Result<String> {
    let features = step
        .features
        .iter()
        .enumerate()
        .map(|(i, feature)| format!("  {}. {feature}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    let requirements = step.requirements.as_ref().and_then(format_requirements);

    PromptEngine::new().render_feature_test(&FeatureTestInputs {
        scope_name: format!("{}: {}", step.step_id, step.scope),
        features,
        requirements,
        notes: step.implementation_notes.clone(),
        files: files_section.to_string(),
    })
}

fn format_requirements(requirements: &Requirements) -> Option<String> {
    let mut lines = Vec::new();
    for requirement in &requirements.security {
        lines.push(format!("  [SECURITY] {requirement}"));
    }
    if let Some(performance) = &requirements.performance {
        if let Some(latency) = performance.latency_target_ms {
            lines.push(format!("  [PERFORMANCE] Latency < {latency}ms"));
        }
        if let Some(ttl) = performance.cache_ttl_seconds {
            lines.push(format!("  [PERFORMANCE] Caching enabled ({ttl}s TTL)"));
        }
        if let Some(notes) = &performance.notes {
            lines.push(format!("  [PERFORMANCE] {notes}"));
        }
    }
    for requirement in &requirements.cost {
        lines.push(format!("  [COST] {requirement}"));
    }
    if let Some(notes) = &requirements.notes {
        lines.push(format!("  [NOTES] {notes}"));
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Read a file capped at `max_lines` lines; `None` when missing or unreadable.
fn read_file_limited(path: &Path, max_lines: usize) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let mut lines: Vec<&str> = contents.lines().take(max_lines + 1).collect();
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        let mut capped = lines.join("\n");
        capped.push_str(&format!("\n... (truncated after {max_lines} lines) ..."));
        return Some(capped);
    }
    Some(lines.join("\n"))
}

fn header(text: &str) {
    println!();
    println!("{}", "=".repeat(70));
    println!("{text}");
    println!("{}", "=".repeat(70));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::Performance;

    #[test]
    fn requirements_section_formats_all_kinds() {
        let requirements = Requirements {
            security: vec!["Input validation required".to_string()],
            performance: Some(Performance {
                latency_target_ms: Some(200),
                cache_ttl_seconds: Some(60),
                notes: None,
            }),
            cost: vec!["Batch operations where possible".to_string()],
            notes: Some("keep it small".to_string()),
        };

        let formatted = format_requirements(&requirements).expect("formatted");
        assert!(formatted.contains("[SECURITY] Input validation required"));
        assert!(formatted.contains("Latency < 200ms"));
        assert!(formatted.contains("(60s TTL)"));
        assert!(formatted.contains("[COST]"));
        assert!(formatted.contains("[NOTES] keep it small"));
    }

    #[test]
    fn empty_requirements_format_to_none() {
        assert!(format_requirements(&Requirements::default()).is_none());
    }

    #[test]
    fn read_file_limited_caps_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("big.txt");
        let body: String = (0..20).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, body).expect("write");

        let content = read_file_limited(&path, 5).expect("read");
        assert!(content.contains("line 4"));
        assert!(!content.contains("line 7"));
        assert!(content.contains("truncated after 5 lines"));
        assert!(read_file_limited(&temp.path().join("missing"), 5).is_none());
    }
}
