// Research runner
//
// Runs one topic through the pipeline against a freshly launched browser and prints
// the questions and report. Ctrl-C cancels the run at its next checkpoint.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use kodegen_tools_research::evidence::EvidenceCollector;
use kodegen_tools_research::{
    BrowserManager, ChatCompletionsClient, ResearchError, ResearchOrchestrator, ResearchSession,
    load_yaml_config, load_yaml_config_from,
};

#[derive(Debug, Parser)]
#[command(name = "kodegen-research", about = "Turn a research topic into a structured report")]
struct Args {
    /// Research topic, e.g. "Latest advancements in renewable energy"
    topic: String,

    /// Config file (defaults to $RESEARCH_CONFIG, then ./config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => load_yaml_config_from(path)?,
        None => load_yaml_config()?,
    };
    if args.headed {
        config.browser.headless = false;
    }

    let client = Arc::new(ChatCompletionsClient::from_config(&config.completion)?);
    let manager = BrowserManager::new(config.browser.clone());

    let (session, outcome) = manager
        .with_session(|browser| async move {
            let collector = EvidenceCollector::new(browser, config.collector.to_options());
            let orchestrator = Arc::new(ResearchOrchestrator::new(
                client,
                collector,
                config.completion.generation_options(),
            ));

            let interrupt = {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("Interrupted, cancelling research run");
                        orchestrator.cancel();
                    }
                })
            };

            let outcome = orchestrator.start_run(&args.topic).await;
            interrupt.abort();
            (orchestrator.session(), outcome)
        })
        .await?;

    print!("{}", render(&session, outcome)?);
    Ok(())
}

/// Questions and report of a completed run; a failed or rejected run yields its error
fn render(session: &ResearchSession, outcome: Result<(), ResearchError>) -> Result<String> {
    let mut output = String::new();
    if !session.questions().is_empty() {
        output.push_str("Research Questions\n");
        for (i, question) in session.questions().iter().enumerate() {
            output.push_str(&format!("{}. {}\n", i + 1, question));
        }
    }

    match outcome {
        Ok(()) => {
            output.push_str(&format!("\nFinal Report\n{}\n", session.report()));
            Ok(output)
        }
        Err(e) => {
            if !output.is_empty() {
                eprint!("{output}");
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_run_reports_its_cause() {
        let session = ResearchSession::default();
        let err = render(&session, Err(ResearchError::EmptyTopic)).unwrap_err();
        assert_eq!(err.to_string(), "Research topic must not be empty");
    }

    #[test]
    fn completed_run_lists_questions_then_report() {
        let session = ResearchSession::default();
        let output = render(&session, Ok(())).unwrap();
        assert_eq!(output, "\nFinal Report\n\n");
    }
}
