//! Research orchestration: session state and the pipeline that drives it

pub mod orchestrator;
pub mod session;

pub use orchestrator::{
    MAX_QUESTIONS, ResearchOrchestrator, parse_questions, question_prompt, synthesis_prompt,
};
pub use session::{ResearchSession, ResearchStatus, ResearchStep, SessionHandle};

use thiserror::Error;

use crate::completion::CompletionError;

/// Errors that end or prevent a run
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Research topic must not be empty")]
    EmptyTopic,

    #[error("A research run is already in progress")]
    RunInProgress,

    #[error("Completion service failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Research run cancelled")]
    Cancelled,
}
