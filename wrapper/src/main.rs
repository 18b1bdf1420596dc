//! AI-assisted development with architectural guardrails.
//!
//! A strict, boring CLI tool that proposes next steps from a declared
//! architecture, compiles strict assistant prompts, verifies git diffs
//! against constraints, and maintains explicit state under `.wrapper/`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use wrapper::io::console::{Aborted, StdioConsole};
use wrapper::io::llm::{LlmClient, resolve_client};
use wrapper::io::paths::WrapperPaths;
use wrapper::plan::PlanAction;
use wrapper::verify::VerifyOptions;

#[derive(Parser)]
#[command(
    name = "wrapper",
    about = "AI-assisted development with architectural guardrails",
    version = include_str!("../VERSION").trim(),
    disable_version_flag = true
)]
struct Cli {
    /// Print version.
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize .wrapper directory with templates.
    Init {
        /// Interactive Q&A setup with model-formatted documents.
        #[arg(long)]
        guided: bool,
    },
    /// Propose next step.yaml.
    Propose {
        /// Ignore the implementation plan when proposing.
        #[arg(long)]
        no_plan: bool,
    },
    /// Compile instruction_prompt.txt, checklist.md, and transcript.txt.
    Compile,
    /// Verify git diff against constraints.
    Verify {
        /// Check only staged changes (default: all uncommitted).
        #[arg(long)]
        staged: bool,
        /// Review the pasted transcript even without a diff.
        #[arg(long)]
        check_logic: bool,
    },
    /// Accept verified step into state.
    Accept,
    /// Sync external_state.json from other repos.
    SyncExternal {
        /// Path to another repo (can specify multiple times).
        #[arg(long = "from", value_name = "PATH", required = true)]
        from: Vec<PathBuf>,
    },
    /// Capture baseline snapshot of repository (usually auto-captured).
    Snapshot,
    /// Compare current repo state against baseline snapshot.
    DiffBaseline,
    /// Interactive implementation planning and progress views.
    Plan {
        #[command(subcommand)]
        action: Option<PlanCommand>,
    },
    /// Test implemented features against the plan.
    Test {
        /// Test a specific step by id.
        #[arg(long)]
        step: Option<String>,
    },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Generate an implementation plan interactively.
    Init,
    /// Show plan progress (default).
    Status,
    /// Show the full plan.
    Show,
}

fn main() {
    wrapper::logging::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            if err.root_cause().downcast_ref::<Aborted>().is_some() {
                eprintln!();
                eprintln!("Aborted.");
            } else {
                eprintln!("Error: {err:#}");
            }
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let cwd = std::env::current_dir().context("resolve working directory")?;
    let paths = WrapperPaths::new(cwd);
    let mut console = StdioConsole;

    match cli.command {
        Command::Init { guided } => {
            let client = model_access(&paths)?;
            wrapper::init::run(&paths, as_access(&client), &mut console, guided)
        }
        Command::Propose { no_plan } => {
            let client = model_access(&paths)?;
            let llm = as_access(&client).map_err(anyhow::Error::msg)?;
            wrapper::propose::run(&paths, llm, &mut console, no_plan)
        }
        Command::Compile => {
            let client = model_access(&paths)?;
            let llm = as_access(&client).map_err(anyhow::Error::msg)?;
            wrapper::compile::run(&paths, llm)
        }
        Command::Verify {
            staged,
            check_logic,
        } => {
            let client = model_access(&paths)?;
            wrapper::verify::run(
                &paths,
                as_access(&client),
                VerifyOptions {
                    staged,
                    check_logic,
                },
            )
        }
        Command::Accept => {
            let client = model_access(&paths)?;
            wrapper::accept::run(&paths, as_access(&client), &mut console)
        }
        Command::SyncExternal { from } => wrapper::sync_external::run(&paths, &from),
        Command::Snapshot => wrapper::snapshot::run(&paths),
        Command::DiffBaseline => wrapper::diff_baseline::run(&paths),
        Command::Plan { action } => {
            let client = model_access(&paths)?;
            let action = match action {
                Some(PlanCommand::Init) => PlanAction::Init,
                Some(PlanCommand::Show) => PlanAction::Show,
                Some(PlanCommand::Status) | None => PlanAction::Status,
            };
            wrapper::plan::run(&paths, as_access(&client), &mut console, action)
        }
        Command::Test { step } => {
            let client = model_access(&paths)?;
            let llm = as_access(&client).map_err(anyhow::Error::msg)?;
            wrapper::feature_test::run(&paths, llm, &mut console, step.as_deref())
        }
    }
}

/// Resolve the model backend once per invocation. Commands that can degrade
/// receive the error message instead of a client; commands that cannot turn
/// it into a hard failure at the call site.
fn model_access(paths: &WrapperPaths) -> Result<Result<Box<dyn LlmClient>, String>> {
    let config = wrapper::io::config::load_config(&paths.config)?;
    Ok(resolve_client(&config).map_err(|err| err.to_string()))
}

fn as_access(client: &Result<Box<dyn LlmClient>, String>) -> Result<&dyn LlmClient, String> {
    match client {
        Ok(client) => Ok(client.as_ref()),
        Err(message) => Err(message.clone()),
    }
}
