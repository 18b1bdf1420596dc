//! `wrapper compile` - render the instruction prompt, checklist, and
//! transcript template for the current step.
//!
//! Only the instruction prompt involves a model call; the checklist and the
//! transcript template are derived deterministically from the step.

use anyhow::{Context, Result};

use crate::core::state::Ledger;
use crate::core::step::{ForbiddenItem, RepoConfig, Step, StepType};
use crate::core::text::{TRANSCRIPT_MARKER, strip_code_fences};
use crate::io::llm::{LlmClient, Role};
use crate::io::paths::WrapperPaths;
use crate::io::prompt::{CompileInputs, PromptEngine};
use crate::io::store::{load_ledger, load_text, load_yaml, save_text};

/// Entry point for `wrapper compile`.
pub fn run(paths: &WrapperPaths, llm: &dyn LlmClient) -> Result<bool> {
    let architecture = load_text(&paths.architecture)?;
    let repo: Option<RepoConfig> = load_yaml(&paths.repo_config)?;
    let step: Option<Step> = load_yaml(&paths.step)?;

    let mut missing = Vec::new();
    if architecture.is_none() {
        missing.push("architecture.md");
    }
    if repo.is_none() {
        missing.push("repo.yaml");
    }
    if step.is_none() {
        missing.push("step.yaml");
    }
    if !missing.is_empty() {
        println!("Missing required files: {}", missing.join(", "));
        if missing.contains(&"step.yaml") {
            println!("Run 'wrapper propose' first to create step.yaml");
        } else {
            println!("Run 'wrapper init' first to create templates");
        }
        return Ok(false);
    }
    let (Some(architecture), Some(repo), Some(step)) = (architecture, repo, step) else {
        return Ok(false);
    };

    println!("Loading configuration...");
    let ledger = load_ledger(paths)?;

    println!("Compiling step: {}", step.step_id);

    let inputs = build_inputs(&architecture, &repo, &ledger, &step);
    let prompt = PromptEngine::new().render_compile(&inputs)?;

    println!("Generating instruction prompt...");
    let response = llm
        .generate(&prompt, Role::PromptCompiler)
        .context("compile model call")?;
    let instruction_prompt = strip_code_fences(&response);

    let checklist = build_checklist(&step, &repo);
    let transcript = build_transcript_template(&step);

    save_text(paths, &paths.instruction_prompt, &instruction_prompt)?;
    save_text(paths, &paths.checklist, &checklist)?;
    save_text(paths, &paths.transcript, &transcript)?;

    println!();
    println!("Generated:");
    println!("  - {}", paths.instruction_prompt.display());
    println!("  - {}", paths.checklist.display());
    println!("  - {}", paths.transcript.display());
    println!();
    println!("Next steps:");
    println!("  1. Copy contents of instruction_prompt.txt to your AI assistant");
    println!("  2. Paste the assistant's response into transcript.txt");
    println!("  3. Run: wrapper verify");

    Ok(true)
}

fn build_inputs(
    architecture: &str,
    repo: &RepoConfig,
    ledger: &Ledger,
    step: &Step,
) -> CompileInputs {
    CompileInputs {
        architecture: architecture.to_string(),
        repo_name: repo.name_or_unknown().to_string(),
        repo_role: repo.repo_role.trim().to_string(),
        must_not: bullet_list_items(&repo.must_not, "- None specified"),
        done_count: ledger.done_steps.len(),
        invariants: bullet_list(&ledger.invariants, "- None established yet"),
        step_id: step.step_id.clone(),
        step_type: step.step_type.to_string(),
        goal: step.goal.trim().to_string(),
        allowed_files: bullet_list(&step.allowed_files, "- None (verification only)"),
        forbidden: bullet_list_items(&step.forbidden, "- None specified"),
        success_criteria: bullet_list(&step.success_criteria, "- None specified"),
    }
}

fn bullet_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullet_list_items(items: &[ForbiddenItem], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item.normalized()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deterministic verification checklist (`checklist.md`), no model involved.
pub fn build_checklist(step: &Step, repo: &RepoConfig) -> String {
    let mut lines = vec![
        format!("# Verification Checklist: {}", step.step_id),
        String::new(),
        format!("**Type:** {}", step.step_type),
        format!("**Goal:** {}", step.goal.trim()),
        String::new(),
        "## Files Check".to_string(),
        String::new(),
        "Only these files may be modified:".to_string(),
        String::new(),
    ];

    if step.allowed_files.is_empty() {
        lines.push("- [ ] No files should be modified (verification only)".to_string());
    } else {
        for file in &step.allowed_files {
            lines.push(format!("- [ ] `{file}`"));
        }
    }

    lines.extend([
        String::new(),
        "## Forbidden Actions Check".to_string(),
        String::new(),
        "None of these should be present:".to_string(),
        String::new(),
    ]);
    for item in crate::core::step::merged_forbidden(repo, step) {
        lines.push(format!("- [ ] {item}"));
    }

    lines.extend([String::new(), "## Success Criteria".to_string(), String::new()]);
    for criterion in &step.success_criteria {
        lines.push(format!("- [ ] {criterion}"));
    }

    lines.extend([
        String::new(),
        "## New Directories".to_string(),
        String::new(),
        "- [ ] No unexpected new directories created".to_string(),
        String::new(),
        "---".to_string(),
        String::new(),
        "*Run `wrapper verify` to automatically check these constraints.*".to_string(),
    ]);

    lines.join("\n")
}

/// Template for `transcript.txt` with the fixed paste marker.
pub fn build_transcript_template(step: &Step) -> String {
    let guidance = if step.step_type == StepType::Verification {
        "For VERIFICATION steps: Paste the analysis of repository state"
    } else {
        "For IMPLEMENTATION steps: Paste description of changes made"
    };

    format!(
        "{bar}\n\
         ASSISTANT TRANSCRIPT FILE\n\
         {bar}\n\n\
         Step: {step_id}\n\
         Type: {step_type}\n\n\
         INSTRUCTIONS:\n\
         After getting the AI assistant's response, paste it below, save this file,\n\
         then run: wrapper verify\n\n\
         {guidance}\n\n\
         {bar}\n\n\
         {marker}\n\n",
        bar = "=".repeat(80),
        step_id = step.step_id,
        step_type = step.step_type,
        guidance = guidance,
        marker = TRANSCRIPT_MARKER,
    )
}
