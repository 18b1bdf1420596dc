//! Prompt rendering for every model call.
//!
//! Templates are embedded minijinja files under `src/io/prompts/`. The large
//! context-assembly prompts carry HTML comment section markers
//! (`<!-- section:KEY required|droppable -->`); when a rendered prompt
//! exceeds the byte budget, droppable sections are removed largest-first so
//! the constraint and output-contract sections always survive.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use std::sync::LazyLock;

const PROPOSE_TEMPLATE: &str = include_str!("prompts/propose.md");
const COMPILE_TEMPLATE: &str = include_str!("prompts/compile.md");
const VERIFY_TEMPLATE: &str = include_str!("prompts/verify.md");
const DEVIATION_SCAN_TEMPLATE: &str = include_str!("prompts/deviation_scan.md");
const RESOLVE_DEVIATIONS_TEMPLATE: &str = include_str!("prompts/resolve_deviations.md");
const PLAN_PHASES_TEMPLATE: &str = include_str!("prompts/plan_phases.md");
const PLAN_STEPS_TEMPLATE: &str = include_str!("prompts/plan_steps.md");
const FEATURE_TEST_TEMPLATE: &str = include_str!("prompts/feature_test.md");

/// Default byte budget for assembled prompts.
pub const DEFAULT_PROMPT_BUDGET: usize = 40_000;

/// Inputs for the propose prompt. Multi-line blocks are preformatted by the
/// caller so the template stays declarative.
#[derive(Debug, Clone, Default)]
pub struct ProposeInputs {
    pub architecture: String,
    pub repo_name: String,
    pub repo_role: String,
    pub must_not: String,
    pub done_summary: String,
    pub invariants: String,
    pub external_summary: String,
    pub unverified_deps: Option<String>,
    pub baseline: Option<String>,
    pub deviations: Option<String>,
    pub plan_hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompileInputs {
    pub architecture: String,
    pub repo_name: String,
    pub repo_role: String,
    pub must_not: String,
    pub done_count: usize,
    pub invariants: String,
    pub step_id: String,
    pub step_type: String,
    pub goal: String,
    pub allowed_files: String,
    pub forbidden: String,
    pub success_criteria: String,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyInputs {
    pub step_id: String,
    pub step_type: String,
    pub goal: String,
    pub allowed_files: String,
    pub forbidden: String,
    pub success_criteria: String,
    pub architecture: String,
    pub rule_issues: Option<String>,
    /// `GIT DIFF` or `PASTED TRANSCRIPT`.
    pub evidence_label: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeviationScanInputs {
    pub architecture: String,
    pub total_files: usize,
    pub total_directories: usize,
    pub directories: String,
    pub sample_files: String,
    pub file_types: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveDeviationsInputs {
    pub step_id: String,
    pub goal: String,
    pub unresolved: String,
}

#[derive(Debug, Clone, Default)]
pub struct PlanPhasesInputs {
    pub architecture: String,
    pub baseline_summary: String,
    pub deviations_summary: String,
}

#[derive(Debug, Clone, Default)]
pub struct PlanStepsInputs {
    pub phase_name: String,
    pub phase_goal: String,
    pub phase_complexity: String,
    pub architecture: String,
    pub context_summary: String,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureTestInputs {
    pub scope_name: String,
    pub features: String,
    pub requirements: Option<String>,
    pub notes: Option<String>,
    pub files: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
    budget: usize,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_PROMPT_BUDGET)
    }

    pub fn with_budget(budget: usize) -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("propose", PROPOSE_TEMPLATE),
            ("compile", COMPILE_TEMPLATE),
            ("verify", VERIFY_TEMPLATE),
            ("deviation_scan", DEVIATION_SCAN_TEMPLATE),
            ("resolve_deviations", RESOLVE_DEVIATIONS_TEMPLATE),
            ("plan_phases", PLAN_PHASES_TEMPLATE),
            ("plan_steps", PLAN_STEPS_TEMPLATE),
            ("feature_test", FEATURE_TEST_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("embedded template should be valid");
        }
        Self { env, budget }
    }

    pub fn render_propose(&self, inputs: &ProposeInputs) -> Result<String> {
        let template = self.env.get_template("propose").context("get template")?;
        let rendered = template.render(context! {
            architecture => &inputs.architecture,
            repo_name => &inputs.repo_name,
            repo_role => &inputs.repo_role,
            must_not => &inputs.must_not,
            done_summary => &inputs.done_summary,
            invariants => &inputs.invariants,
            external_summary => &inputs.external_summary,
            unverified_deps => &inputs.unverified_deps,
            baseline => &inputs.baseline,
            deviations => &inputs.deviations,
            plan_hint => &inputs.plan_hint,
        })?;
        Ok(enforce_budget(&rendered, self.budget))
    }

    pub fn render_compile(&self, inputs: &CompileInputs) -> Result<String> {
        let template = self.env.get_template("compile").context("get template")?;
        let rendered = template.render(context! {
            architecture => &inputs.architecture,
            repo_name => &inputs.repo_name,
            repo_role => &inputs.repo_role,
            must_not => &inputs.must_not,
            done_count => &inputs.done_count,
            invariants => &inputs.invariants,
            step_id => &inputs.step_id,
            step_type => &inputs.step_type,
            goal => &inputs.goal,
            allowed_files => &inputs.allowed_files,
            forbidden => &inputs.forbidden,
            success_criteria => &inputs.success_criteria,
        })?;
        Ok(enforce_budget(&rendered, self.budget))
    }

    pub fn render_verify(&self, inputs: &VerifyInputs) -> Result<String> {
        let template = self.env.get_template("verify").context("get template")?;
        let rendered = template.render(context! {
            step_id => &inputs.step_id,
            step_type => &inputs.step_type,
            goal => &inputs.goal,
            allowed_files => &inputs.allowed_files,
            forbidden => &inputs.forbidden,
            success_criteria => &inputs.success_criteria,
            architecture => &inputs.architecture,
            rule_issues => &inputs.rule_issues,
            evidence_label => &inputs.evidence_label,
            evidence => &inputs.evidence,
        })?;
        Ok(enforce_budget(&rendered, self.budget))
    }

    pub fn render_deviation_scan(&self, inputs: &DeviationScanInputs) -> Result<String> {
        let template = self
            .env
            .get_template("deviation_scan")
            .context("get template")?;
        let rendered = template.render(context! {
            architecture => &inputs.architecture,
            total_files => &inputs.total_files,
            total_directories => &inputs.total_directories,
            directories => &inputs.directories,
            sample_files => &inputs.sample_files,
            file_types => &inputs.file_types,
        })?;
        Ok(enforce_budget(&rendered, self.budget))
    }

    pub fn render_resolve_deviations(&self, inputs: &ResolveDeviationsInputs) -> Result<String> {
        let template = self
            .env
            .get_template("resolve_deviations")
            .context("get template")?;
        Ok(template.render(context! {
            step_id => &inputs.step_id,
            goal => &inputs.goal,
            unresolved => &inputs.unresolved,
        })?)
    }

    pub fn render_plan_phases(&self, inputs: &PlanPhasesInputs) -> Result<String> {
        let template = self
            .env
            .get_template("plan_phases")
            .context("get template")?;
        Ok(template.render(context! {
            architecture => &inputs.architecture,
            baseline_summary => &inputs.baseline_summary,
            deviations_summary => &inputs.deviations_summary,
        })?)
    }

    pub fn render_plan_steps(&self, inputs: &PlanStepsInputs) -> Result<String> {
        let template = self.env.get_template("plan_steps").context("get template")?;
        Ok(template.render(context! {
            phase_name => &inputs.phase_name,
            phase_goal => &inputs.phase_goal,
            phase_complexity => &inputs.phase_complexity,
            architecture => &inputs.architecture,
            context_summary => &inputs.context_summary,
        })?)
    }

    pub fn render_feature_test(&self, inputs: &FeatureTestInputs) -> Result<String> {
        let template = self
            .env
            .get_template("feature_test")
            .context("get template")?;
        Ok(template.render(context! {
            scope_name => &inputs.scope_name,
            features => &inputs.features,
            requirements => &inputs.requirements,
            notes => &inputs.notes,
            files => &inputs.files,
        })?)
    }
}

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").expect("valid section regex")
});

#[derive(Debug, Clone)]
struct Section {
    required: bool,
    content: String,
}

/// Parse section markers and drop droppable sections, largest first, until
/// the assembled prompt fits the budget. Text without markers passes through
/// untouched.
fn enforce_budget(rendered: &str, budget: usize) -> String {
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    if matches.is_empty() {
        return rendered.trim().to_string();
    }

    let mut sections = Vec::new();
    for (i, caps) in matches.iter().enumerate() {
        let required = caps
            .get(2)
            .is_some_and(|kind| kind.as_str() == "required");
        let start = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(rendered.len());
        sections.push(Section {
            required,
            content: rendered[start..end].trim().to_string(),
        });
    }

    let total = |sections: &[Option<Section>]| -> usize {
        sections
            .iter()
            .flatten()
            .map(|section| section.content.len() + 2)
            .sum()
    };

    let mut kept: Vec<Option<Section>> = sections.into_iter().map(Some).collect();
    while total(&kept) > budget {
        let largest = kept
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.as_ref()
                    .filter(|section| !section.required)
                    .map(|section| (i, section.content.len()))
            })
            .max_by_key(|(_, len)| *len);
        let Some((index, _)) = largest else {
            break; // only required sections remain
        };
        kept[index] = None;
    }

    kept.into_iter()
        .flatten()
        .map(|section| section.content)
        .collect::<Vec<_>>()
        .join("\n\n")
}
