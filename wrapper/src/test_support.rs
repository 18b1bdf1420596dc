//! Test-only doubles: a git-initialized temp repository, a scripted model
//! client, and a scripted console.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::io::console::Console;
use crate::io::git::Git;
use crate::io::llm::{LlmClient, LlmError, Role};
use crate::io::paths::WrapperPaths;

/// Temp directory with an initialized git repository and an initial commit,
/// for driving command modules end to end.
pub struct TestRepo {
    temp: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let repo = Self { temp };
        repo.git_ok(&["init", "-q", "-b", "main"])?;
        repo.git_ok(&["config", "user.email", "dev@example.com"])?;
        repo.git_ok(&["config", "user.name", "Dev"])?;
        repo.write_file("README.md", "# test repo\n")?;
        repo.commit_all("initial commit")?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> WrapperPaths {
        WrapperPaths::new(self.root())
    }

    pub fn git(&self) -> Git {
        Git::new(self.root())
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git_ok(&["add", "-A"])?;
        self.git_ok(&["commit", "-q", "-m", message])
    }

    fn git_ok(&self, args: &[&str]) -> Result<()> {
        let status = Command::new("git")
            .args(args)
            .current_dir(self.root())
            .status()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !status.success() {
            return Err(anyhow!("git {} failed", args.join(" ")));
        }
        Ok(())
    }
}

/// Model client returning queued responses in order; records every call.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(Role, String)>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Prompts seen so far, with the role of each call.
    pub fn calls(&self) -> Vec<(Role, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl LlmClient for ScriptedLlm {
    fn generate(&self, prompt: &str, role: Role) -> Result<String, LlmError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((role, prompt.to_string()));
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .ok_or(LlmError::Transport {
                vendor: "Scripted",
                message: "no scripted response left".to_string(),
            })
    }
}

/// Model client that always fails, for degrade paths.
pub struct FailingLlm;

impl LlmClient for FailingLlm {
    fn generate(&self, _prompt: &str, _role: Role) -> Result<String, LlmError> {
        Err(LlmError::Transport {
            vendor: "Scripted",
            message: "scripted failure".to_string(),
        })
    }
}

/// Console answering from a queue. Yes/no answers are "y"/"n"/"" and
/// choices/numbers are given as the digits the user would type.
pub struct ScriptedConsole {
    answers: VecDeque<String>,
}

impl ScriptedConsole {
    pub fn new(answers: Vec<&str>) -> Self {
        Self {
            answers: answers.into_iter().map(str::to_string).collect(),
        }
    }

    fn next(&mut self, question: &str) -> Result<String> {
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer left for: {question}"))
    }
}

impl Console for ScriptedConsole {
    fn ask_text(&mut self, question: &str, optional: bool) -> Result<Option<String>> {
        let answer = self.next(question)?;
        if answer.is_empty() && optional {
            return Ok(None);
        }
        Ok(Some(answer))
    }

    fn ask_yes_no(&mut self, question: &str, default: Option<bool>) -> Result<bool> {
        let answer = self.next(question)?.to_lowercase();
        match answer.as_str() {
            "y" | "yes" => Ok(true),
            "n" | "no" => Ok(false),
            "" => default.ok_or_else(|| anyhow!("no default for: {question}")),
            other => Err(anyhow!("unexpected scripted answer '{other}' for: {question}")),
        }
    }

    fn ask_choice(&mut self, question: &str, options: &[String]) -> Result<usize> {
        let answer = self.next(question)?;
        let choice: usize = answer
            .parse()
            .with_context(|| format!("scripted choice '{answer}' is not a number"))?;
        if choice < 1 || choice > options.len() {
            return Err(anyhow!("scripted choice {choice} out of range for: {question}"));
        }
        Ok(choice - 1)
    }

    fn ask_number(
        &mut self,
        question: &str,
        default: Option<i64>,
        _min: Option<i64>,
        _max: Option<i64>,
    ) -> Result<i64> {
        let answer = self.next(question)?;
        if answer.is_empty() {
            return default.ok_or_else(|| anyhow!("no default for: {question}"));
        }
        answer
            .parse()
            .with_context(|| format!("scripted number '{answer}' is not a number"))
    }
}
