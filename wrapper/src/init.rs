//! `wrapper init` - scaffold the human-authored documents.
//!
//! Non-guided mode writes templates and never overwrites. Guided mode runs a
//! short interview and uses the model to format the answers into the
//! documents, falling back to the plain templates on any model error.

use anyhow::Result;
use tracing::warn;

use crate::io::config::CONFIG_TEMPLATE;
use crate::io::console::Console;
use crate::io::llm::{LlmClient, Role};
use crate::io::paths::WrapperPaths;
use crate::io::store::{load_text, save_text};

const ARCHITECTURE_TEMPLATE: &str = "\
# Architecture: {repo_name}

## Overview

Describe the TARGET architecture for this repository.
This is future-facing - what the repo SHOULD look like.

## Components

List the main components and their responsibilities.

## Boundaries

### This repo MUST:
- (list responsibilities)

### This repo MUST NOT:
- (list forbidden things)

## File Structure

Describe expected file organization.

## Known Deviations

List any current deviations from target architecture that are acknowledged
and will be addressed later. The verifier will allow these.

- None (baseline clean)

## Integration Points

How this repo interacts with other repos.
";

const REPO_YAML_TEMPLATE: &str = "\
# Repository Configuration
# This file defines the role and constraints for this repository.

repo_name: {repo_name}
repo_role: |
  Describe the core purpose of this repository in 1-2 sentences.

# Hard constraints - things this repo must NEVER do
must_not:
  - example: expose HTTP APIs (if not an API repo)
  - example: contain UI logic (if not a UI repo)
  - example: directly access database (if using a service layer)

# Dependencies - other repos this one interacts with
depends_on: []
  # - repo: ui
  #   via: REST API
  # - repo: llm
  #   via: function calls
";

/// Entry point for `wrapper init`.
pub fn run(
    paths: &WrapperPaths,
    llm: Result<&dyn LlmClient, String>,
    console: &mut dyn Console,
    guided: bool,
) -> Result<bool> {
    if guided {
        run_guided(paths, llm, console)
    } else {
        run_basic(paths)
    }
}

/// Write templates for any missing document; existing files are left alone.
pub fn run_basic(paths: &WrapperPaths) -> Result<bool> {
    let wrapper_dir = paths.ensure_dir()?.to_path_buf();
    println!("Initializing {}/", wrapper_dir.display());

    let repo_name = paths.inferred_repo_name();

    write_if_missing(
        paths,
        "architecture.md",
        &paths.architecture,
        &ARCHITECTURE_TEMPLATE.replace("{repo_name}", &repo_name),
    )?;
    write_if_missing(
        paths,
        "repo.yaml",
        &paths.repo_config,
        &REPO_YAML_TEMPLATE.replace("{repo_name}", &repo_name),
    )?;
    write_if_missing(paths, "config.yaml", &paths.config, CONFIG_TEMPLATE)?;

    println!();
    println!("Next steps:");
    println!("  1. Edit {} with your target architecture", paths.architecture.display());
    println!("  2. Edit {} with repo constraints", paths.repo_config.display());
    println!("  3. Set DEEPSEEK_API_KEY environment variable (or edit config.yaml)");
    println!("  4. Run: wrapper propose");

    Ok(true)
}

fn write_if_missing(
    paths: &WrapperPaths,
    label: &str,
    path: &std::path::Path,
    contents: &str,
) -> Result<()> {
    if path.exists() {
        println!("  {label} already exists, skipping");
        return Ok(());
    }
    save_text(paths, path, contents)?;
    println!("  Created {label}");
    Ok(())
}

fn run_guided(
    paths: &WrapperPaths,
    llm: Result<&dyn LlmClient, String>,
    console: &mut dyn Console,
) -> Result<bool> {
    paths.ensure_dir()?;
    if !paths.config.exists() {
        save_text(paths, &paths.config, CONFIG_TEMPLATE)?;
        println!("Created config.yaml");
        println!();
    }

    // Guided mode is model-assisted; bail out with the remediation text
    // before asking the user anything.
    let llm = match llm {
        Ok(client) => client,
        Err(message) => {
            println!("Guided mode requires an LLM API key to be configured.");
            println!();
            println!("{message}");
            println!();
            println!("After setting your API key, run: wrapper init --guided");
            return Ok(false);
        }
    };

    if paths.architecture.exists() || paths.repo_config.exists() {
        println!("architecture.md or repo.yaml already exist!");
        if !console.ask_yes_no("Overwrite existing files?", Some(false))? {
            println!("Aborted.");
            return Ok(false);
        }
    }

    println!("Guided Repository Setup");
    println!("{}", "=".repeat(60));
    println!("Answers to the questions below are formatted into");
    println!("architecture.md and repo.yaml.");
    println!();
    println!("Tip: Be specific and detailed in your answers.");
    println!("{}", "=".repeat(60));

    let answers = interview(console)?;

    println!();
    println!("Processing your answers...");
    println!();

    let formatted = match format_answers(llm, &answers) {
        Ok(formatted) => formatted,
        Err(err) => {
            warn!(error = %err, "guided formatting failed");
            println!("Error calling LLM: {err}");
            println!();
            println!("Falling back to non-guided init...");
            return run_basic(paths);
        }
    };

    let architecture = build_architecture(&formatted, &paths.inferred_repo_name(), &answers);
    let repo_yaml = build_repo_yaml(&formatted, &paths.inferred_repo_name(), &answers);

    println!("Generated content preview:");
    println!();
    println!("{}", "=".repeat(60));
    println!("architecture.md");
    println!("{}", "=".repeat(60));
    println!("{architecture}");
    println!("{}", "=".repeat(60));
    println!("repo.yaml");
    println!("{}", "=".repeat(60));
    println!("{repo_yaml}");
    println!("{}", "=".repeat(60));
    println!();

    if !console.ask_yes_no("Create files with this content?", Some(true))? {
        println!("Aborted. Run 'wrapper init --guided' again to retry.");
        return Ok(false);
    }

    save_text(paths, &paths.architecture, &architecture)?;
    println!("Created architecture.md");
    save_text(paths, &paths.repo_config, &repo_yaml)?;
    println!("Created repo.yaml");

    println!();
    println!("Setup complete!");
    println!();
    println!("Next steps:");
    println!("  1. Review and refine {}", paths.architecture.display());
    println!("  2. Review and refine {}", paths.repo_config.display());
    println!("  3. Run: wrapper propose");

    Ok(true)
}

#[derive(Debug, Default)]
struct Answers {
    purpose: String,
    components: String,
    must_do: String,
    must_not: String,
    integrations: Option<String>,
    role: String,
    constraints: Option<String>,
}

#[derive(Debug, Default)]
struct Formatted {
    overview: String,
    components: String,
    must_do: String,
    must_not: String,
    integrations: String,
    role: String,
    constraints_list: Vec<String>,
}

fn interview(console: &mut dyn Console) -> Result<Answers> {
    println!();
    println!("ARCHITECTURE QUESTIONS");
    println!("{}", "-".repeat(60));

    let required = |answer: Option<String>| answer.unwrap_or_default();

    let purpose = required(console.ask_text(
        "1/7: What is the PRIMARY PURPOSE of this repository?\n\
         \x20   (What problem does it solve? What is its main goal?)",
        false,
    )?);
    let components = required(console.ask_text(
        "2/7: What are the MAIN COMPONENTS or modules?\n\
         \x20   (e.g., API server, database layer, CLI tool, etc.)",
        false,
    )?);
    let must_do = required(console.ask_text(
        "3/7: What are the CORE RESPONSIBILITIES this repo MUST handle?\n\
         \x20   (List the things this repo is responsible for)",
        false,
    )?);
    let must_not = required(console.ask_text(
        "4/7: What should this repo NEVER do?\n\
         \x20   (List forbidden actions or out-of-scope concerns)",
        false,
    )?);
    let integrations = console.ask_text(
        "5/7: How does this repo interact with OTHER SYSTEMS or repos?\n\
         \x20   (APIs, databases, external services, etc.)",
        true,
    )?;

    println!();
    println!("REPOSITORY CONFIGURATION QUESTIONS");
    println!("{}", "-".repeat(60));

    let role = required(console.ask_text(
        "6/7: Describe the repository's ROLE in 1-2 sentences\n\
         \x20   (A concise summary of what this repo does)",
        false,
    )?);
    let constraints = console.ask_text(
        "7/7: List HARD CONSTRAINTS (things this repo must NEVER do)\n\
         \x20   (Separate multiple items with commas, or press Enter to skip)",
        true,
    )?;

    Ok(Answers {
        purpose,
        components,
        must_do,
        must_not,
        integrations,
        role,
        constraints,
    })
}

fn format_answers(llm: &dyn LlmClient, answers: &Answers) -> Result<Formatted> {
    let integrations_input = answers
        .integrations
        .clone()
        .unwrap_or_else(|| "No external integrations.".to_string());

    Ok(Formatted {
        overview: format_section(llm, &answers.purpose, SectionKind::Overview)?,
        components: format_section(llm, &answers.components, SectionKind::Components)?,
        must_do: format_section(llm, &answers.must_do, SectionKind::MustList)?,
        must_not: format_section(llm, &answers.must_not, SectionKind::MustNotList)?,
        integrations: format_section(llm, &integrations_input, SectionKind::Integrations)?,
        role: format_section(llm, &answers.role, SectionKind::RoleSummary)?,
        constraints_list: parse_comma_list(answers.constraints.as_deref().unwrap_or_default()),
    })
}

#[derive(Debug, Clone, Copy)]
enum SectionKind {
    Overview,
    Components,
    MustList,
    MustNotList,
    Integrations,
    RoleSummary,
}

impl SectionKind {
    fn instruction(self) -> &'static str {
        match self {
            Self::Overview => {
                "Format this repository purpose into a clear, professional overview \
                 paragraph (2-4 sentences)."
            }
            Self::Components => {
                "Format this into a clear bulleted list of components with their \
                 responsibilities. Use this format:\n\
                 - **Component Name**: Brief description of what it does"
            }
            Self::MustList => {
                "Format this into a clear bulleted list of core responsibilities. \
                 Each item should be a clear, actionable responsibility. \
                 Output only the bulleted list with '- ' prefix."
            }
            Self::MustNotList => {
                "Format this into a clear bulleted list of forbidden actions or \
                 out-of-scope concerns. Each item should be a clear prohibition. \
                 Output only the bulleted list with '- ' prefix."
            }
            Self::Integrations => {
                "Format this into a clear description of how this repository \
                 integrates with external systems. Use bullet points if multiple \
                 integrations exist."
            }
            Self::RoleSummary => {
                "Refine this repository role description to be clear and concise \
                 (1-2 sentences). Make it professional but keep the original meaning."
            }
        }
    }
}

fn format_section(
    llm: &dyn LlmClient,
    user_input: &str,
    kind: SectionKind,
) -> Result<String> {
    let prompt = format!(
        "{}\n\n\
         CRITICAL: Format ONLY what the user provided. DO NOT add examples, \
         suggestions, or invented content.\n\
         Use ONLY the user's words and meaning.\n\n\
         User input:\n{}\n\n\
         Output only the formatted text, no extra commentary.",
        kind.instruction(),
        user_input
    );
    let response = llm.generate(&prompt, Role::Assistant)?;
    Ok(response.trim().to_string())
}

fn parse_comma_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn build_architecture(formatted: &Formatted, repo_name: &str, answers: &Answers) -> String {
    format!(
        "<!--\n\
         RAW USER ANSWERS (for reference if you need to regenerate):\n\n\
         Purpose: {purpose}\n\n\
         Components: {components}\n\n\
         Must Do: {must_do}\n\n\
         Must Not: {must_not}\n\n\
         Integrations: {integrations}\n\
         -->\n\n\
         # Architecture: {repo_name}\n\n\
         ## Overview\n\n\
         {overview}\n\n\
         ## Components\n\n\
         {formatted_components}\n\n\
         ## Boundaries\n\n\
         ### This repo MUST:\n\
         {formatted_must}\n\n\
         ### This repo MUST NOT:\n\
         {formatted_must_not}\n\n\
         ## File Structure\n\n\
         (To be documented as the project evolves)\n\n\
         ## Known Deviations\n\n\
         List any current deviations from target architecture that are acknowledged\n\
         and will be addressed later. The verifier will allow these.\n\n\
         - None (baseline clean)\n\n\
         ## Integration Points\n\n\
         {formatted_integrations}\n",
        purpose = answers.purpose,
        components = answers.components,
        must_do = answers.must_do,
        must_not = answers.must_not,
        integrations = answers.integrations.as_deref().unwrap_or("N/A"),
        repo_name = repo_name,
        overview = formatted.overview,
        formatted_components = formatted.components,
        formatted_must = formatted.must_do,
        formatted_must_not = formatted.must_not,
        formatted_integrations = formatted.integrations,
    )
}

fn build_repo_yaml(formatted: &Formatted, repo_name: &str, answers: &Answers) -> String {
    let must_not_items = if formatted.constraints_list.is_empty() {
        "  # Add constraints as needed".to_string()
    } else {
        formatted
            .constraints_list
            .iter()
            .map(|item| format!("  - {item}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "# RAW USER ANSWERS (for reference if you need to regenerate):\n\
         # Role: {role}\n\
         # Constraints: {constraints}\n\n\
         # Repository Configuration\n\
         # This file defines the role and constraints for this repository.\n\n\
         repo_name: {repo_name}\n\
         repo_role: |\n\
         \x20 {formatted_role}\n\n\
         # Hard constraints - things this repo must NEVER do\n\
         must_not:\n\
         {must_not_items}\n\n\
         # Dependencies - other repos this one interacts with\n\
         depends_on: []\n\
         \x20 # - repo: other-repo-name\n\
         \x20 #   via: REST API / function calls / etc\n",
        role = answers.role,
        constraints = answers.constraints.as_deref().unwrap_or("N/A"),
        repo_name = repo_name,
        formatted_role = formatted.role,
        must_not_items = must_not_items,
    )
}

/// True when both human-authored inputs exist (propose's precondition).
pub fn inputs_exist(paths: &WrapperPaths) -> Result<bool> {
    Ok(load_text(&paths.architecture)?.is_some() && load_text(&paths.repo_config)?.is_some())
}
