//! Research session state
//!
//! One `ResearchSession` per run. The orchestrator is the only writer; presentation
//! layers read snapshots through a `SessionHandle`.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Stage of a run
///
/// `Idle → GeneratingQuestions → Researching → Synthesizing → Complete`, and any
/// non-terminal stage may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    Idle,
    GeneratingQuestions,
    Researching,
    Synthesizing,
    Complete,
    Failed,
}

impl ResearchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// A run is executing; a second run must not start
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            Self::GeneratingQuestions | Self::Researching | Self::Synthesizing
        )
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use ResearchStatus::*;
        match (self, next) {
            (Idle, GeneratingQuestions)
            | (GeneratingQuestions, Researching)
            | (Researching, Synthesizing)
            | (Synthesizing, Complete) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::GeneratingQuestions => "generating questions",
            Self::Researching => "researching",
            Self::Synthesizing => "synthesizing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Progress step during research
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchStep {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Research session state
///
/// `findings[i]` is the evidence collected for `questions[i]`. Once the status is
/// terminal, the session no longer changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSession {
    run_id: Uuid,
    topic: String,
    status: ResearchStatus,
    questions: Vec<String>,
    findings: Vec<String>,
    report: String,
    progress: Vec<ResearchStep>,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Default for ResearchSession {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl ResearchSession {
    /// Fresh session in `Idle`
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topic: topic.into(),
            status: ResearchStatus::Idle,
            questions: Vec::new(),
            findings: Vec::new(),
            report: String::new(),
            progress: Vec::new(),
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn status(&self) -> ResearchStatus {
        self.status
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn findings(&self) -> &[String] {
        &self.findings
    }

    pub fn report(&self) -> &str {
        &self.report
    }

    pub fn progress(&self) -> &[ResearchStep] {
        &self.progress
    }

    /// Description of the error that ended a failed run
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Latest progress message, for a one-line status display
    pub fn current_step(&self) -> Option<&str> {
        self.progress.last().map(|step| step.message.as_str())
    }

    /// Move to `next`; invalid transitions and changes after a terminal state are ignored
    pub(crate) fn advance(&mut self, next: ResearchStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!("Ignoring invalid transition {} -> {}", self.status, next);
            return false;
        }

        if self.status == ResearchStatus::Idle {
            self.started_at = Some(Utc::now());
        }
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.status = next;
        true
    }

    pub(crate) fn add_progress(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.progress.push(ResearchStep {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    pub(crate) fn set_questions(&mut self, questions: Vec<String>) {
        if self.status == ResearchStatus::GeneratingQuestions {
            self.questions = questions;
        }
    }

    pub(crate) fn push_finding(&mut self, evidence: String) {
        if self.status == ResearchStatus::Researching && self.findings.len() < self.questions.len()
        {
            self.findings.push(evidence);
        }
    }

    pub(crate) fn set_report(&mut self, report: String) {
        if self.status == ResearchStatus::Synthesizing {
            self.report = report;
        }
    }

    pub(crate) fn fail(&mut self, error: String) {
        if self.advance(ResearchStatus::Failed) {
            self.error = Some(error);
        }
    }
}

/// Shared read access to the current session
///
/// Cloning is cheap; all clones observe the same session, including across resets.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<ResearchSession>>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> ResearchSession {
        self.inner.read().clone()
    }

    pub fn status(&self) -> ResearchStatus {
        self.inner.read().status
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ResearchSession) -> R) -> R {
        f(&mut *self.inner.write())
    }
}
