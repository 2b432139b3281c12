//! Topic → questions → evidence → report

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::ResearchError;
use super::session::{ResearchSession, ResearchStatus, SessionHandle};
use crate::browser::BrowserSession;
use crate::completion::{GenerationOptions, TextCompletionClient};
use crate::evidence::EvidenceCollector;

/// Upper bound on sub-questions per run
pub const MAX_QUESTIONS: usize = 3;

pub fn question_prompt(topic: &str) -> String {
    format!("Generate {MAX_QUESTIONS} specific research questions about {topic}")
}

pub fn synthesis_prompt(topic: &str, findings: &[String]) -> String {
    format!(
        "Summarize these findings about {topic}:\n{}\n\nProvide a well-structured report with key points.",
        findings.join("\n")
    )
}

/// Non-empty trimmed lines of `response`, at most `MAX_QUESTIONS` of them
pub fn parse_questions(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(MAX_QUESTIONS)
        .map(str::to_string)
        .collect()
}

/// Drives one run at a time over an injected completion client and collector
///
/// The session is the single source of truth; read it with `session()` or share
/// `handle()` with a display. Runs are strictly sequential: questions are researched
/// in generation order, one page at a time.
pub struct ResearchOrchestrator<C: ?Sized, B> {
    client: Arc<C>,
    collector: EvidenceCollector<B>,
    options: GenerationOptions,
    session: SessionHandle,
    cancel: Mutex<CancellationToken>,
}

impl<C, B> ResearchOrchestrator<C, B>
where
    C: TextCompletionClient + ?Sized,
    B: BrowserSession,
{
    pub fn new(client: Arc<C>, collector: EvidenceCollector<B>, options: GenerationOptions) -> Self {
        Self {
            client,
            collector,
            options,
            session: SessionHandle::default(),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Snapshot of the current session
    pub fn session(&self) -> ResearchSession {
        self.session.snapshot()
    }

    /// Read handle that follows this orchestrator's session across runs
    pub fn handle(&self) -> SessionHandle {
        self.session.clone()
    }

    pub fn collector(&self) -> &EvidenceCollector<B> {
        &self.collector
    }

    /// Ask the running run to stop at its next checkpoint
    ///
    /// Checked before each question, before each result page and before synthesis.
    /// The run then ends as `Failed` with its partial state intact.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    /// Discard the current session and return to a fresh `Idle` one
    pub fn reset(&self) -> Result<(), ResearchError> {
        self.session.update(|session| {
            if session.status().is_in_progress() {
                return Err(ResearchError::RunInProgress);
            }
            *session = ResearchSession::default();
            Ok(())
        })
    }

    /// Execute a full run for `topic`
    ///
    /// Rejects an empty topic or an overlapping run without touching the session.
    /// Otherwise the session is replaced and driven to `Complete`, or to `Failed` with
    /// the error recorded on it and returned. Dropping the returned future before it
    /// finishes cancels the run and leaves the session `Failed` with "Research run aborted".
    pub async fn start_run(&self, topic: &str) -> Result<(), ResearchError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ResearchError::EmptyTopic);
        }

        let token = CancellationToken::new();
        let run_id = self.session.update(|session| {
            if session.status().is_in_progress() {
                return Err(ResearchError::RunInProgress);
            }
            *self.cancel.lock() = token.clone();
            *session = ResearchSession::new(topic);
            session.advance(ResearchStatus::GeneratingQuestions);
            Ok(session.run_id())
        })?;
        let mut guard = RunGuard {
            session: &self.session,
            run_id,
            token: token.clone(),
            armed: true,
        };

        info!("Starting research run for '{}'", topic);

        let outcome = self.execute(topic, &token).await;
        guard.armed = false;

        match outcome {
            Ok(()) => {
                self.session.update(|session| {
                    session.add_progress("Research complete!");
                    session.advance(ResearchStatus::Complete);
                });
                info!("Research run for '{}' complete", topic);
                Ok(())
            }
            Err(e) => {
                error!("Research run for '{}' failed: {}", topic, e);
                self.session.update(|session| session.fail(e.to_string()));
                Err(e)
            }
        }
    }

    async fn execute(&self, topic: &str, token: &CancellationToken) -> Result<(), ResearchError> {
        self.session
            .update(|session| session.add_progress("Generating research questions..."));

        let response = self
            .client
            .generate(&question_prompt(topic), &self.options)
            .await?;
        let questions = parse_questions(&response);
        if questions.len() < MAX_QUESTIONS {
            warn!(
                "Completion yielded {} usable questions, continuing with those",
                questions.len()
            );
        }

        self.session.update(|session| {
            session.set_questions(questions.clone());
            session.advance(ResearchStatus::Researching);
            session.add_progress("Researching each question...");
        });

        let total = questions.len();
        let mut findings = Vec::with_capacity(total);
        for (index, question) in questions.iter().enumerate() {
            if token.is_cancelled() {
                return Err(ResearchError::Cancelled);
            }

            self.session
                .update(|session| session.add_progress(format!("Researching: {question}")));

            let evidence = self.collector.gather(question, token).await;
            if evidence.is_failed() {
                warn!("Evidence collection failed for '{}', keeping marker", question);
            } else if evidence.as_str().is_empty() {
                warn!("No page text extracted for '{}'", question);
            }
            let evidence = evidence.into_string();

            self.session.update(|session| {
                session.push_finding(evidence.clone());
                session.add_progress(format!("Completed {}/{}", index + 1, total));
            });
            findings.push(evidence);
        }

        if token.is_cancelled() {
            return Err(ResearchError::Cancelled);
        }

        self.session.update(|session| {
            session.advance(ResearchStatus::Synthesizing);
            session.add_progress("Compiling final report...");
        });

        let report = self
            .client
            .generate(&synthesis_prompt(topic, &findings), &self.options)
            .await?;

        self.session.update(|session| session.set_report(report));
        Ok(())
    }
}

/// Fails the run if `start_run` is dropped before the outcome is recorded
struct RunGuard<'a> {
    session: &'a SessionHandle,
    run_id: Uuid,
    token: CancellationToken,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        warn!("Research run {} dropped before completion", self.run_id);
        self.token.cancel();
        self.session.update(|session| {
            if session.run_id() == self.run_id {
                session.fail("Research run aborted".to_string());
            }
        });
    }
}
