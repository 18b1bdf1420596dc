//! Transient state for the interactive plan wizard
//! (`planning_session.json`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::plan::Phase;

/// Scratch state for one planning run; cleared when a new session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningSession {
    pub started: String,
    /// One of `not_started`, `phase_planning`, `step_detailing`, `complete`.
    pub phase: String,
    pub current_phase_idx: usize,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub user_preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub planning_context: Vec<ContextEntry>,
    pub last_updated: String,
}

/// One recorded planning decision, fed back into later model prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub timestamp: String,
}

impl PlanningSession {
    pub fn new(now: String) -> Self {
        Self {
            started: now.clone(),
            phase: "not_started".to_string(),
            current_phase_idx: 0,
            phases: Vec::new(),
            user_preferences: BTreeMap::new(),
            planning_context: Vec::new(),
            last_updated: now,
        }
    }

    pub fn add_context(
        &mut self,
        question: &str,
        answer: &str,
        reasoning: Option<String>,
        timestamp: String,
    ) {
        self.planning_context.push(ContextEntry {
            question: question.to_string(),
            answer: answer.to_string(),
            reasoning,
            timestamp,
        });
    }

    /// Summary of the most recent decisions for model prompts.
    pub fn context_summary(&self, last_n: usize) -> String {
        let entries = &self.planning_context;
        if entries.is_empty() {
            return "No previous planning context".to_string();
        }
        let start = entries.len().saturating_sub(last_n);
        entries[start..]
            .iter()
            .map(|entry| {
                let mut line = format!("- {} -> {}", entry.question, entry.answer);
                if let Some(reasoning) = &entry.reasoning {
                    line.push_str(&format!(" ({reasoning})"));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_summary_keeps_last_n() {
        let mut session = PlanningSession::new("t0".to_string());
        for i in 0..7 {
            session.add_context(&format!("q{i}"), "a", None, "t".to_string());
        }
        let summary = session.context_summary(5);
        assert!(!summary.contains("q1"));
        assert!(summary.contains("q2"));
        assert!(summary.contains("q6"));
    }

    #[test]
    fn empty_context_has_placeholder() {
        let session = PlanningSession::new("t0".to_string());
        assert_eq!(session.context_summary(5), "No previous planning context");
    }

    #[test]
    fn reasoning_is_appended_when_present() {
        let mut session = PlanningSession::new("t0".to_string());
        session.add_context("order", "2,1", Some("risk first".to_string()), "t".to_string());
        assert!(session.context_summary(5).contains("(risk first)"));
    }
}
