mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeBrowser, GatedCompletion, ScriptedCompletion, fast_options};
use kodegen_tools_research::browser::{BrowserSession, SharedBrowser, shared};
use kodegen_tools_research::completion::{
    CompletionError, GenerationOptions, TextCompletionClient,
};
use kodegen_tools_research::evidence::{EvidenceCollector, is_failure_marker};
use kodegen_tools_research::research::{
    ResearchError, ResearchOrchestrator, ResearchStatus, question_prompt,
};

const QUESTIONS: &str = "  What are the main methods for solar panel recycling?  \n\
    How much does recycling cost?\n\n\
    Which policies drive solar recycling adoption?   \n";

fn research_browser() -> FakeBrowser {
    FakeBrowser::new()
        .with_results("methods", &["https://a.example/1", "https://a.example/2"])
        .with_results("cost", &["https://b.example/1"])
        .with_results("policies", &["https://c.example/1"])
        .with_page("https://a.example/1", "methods evidence one")
        .with_page("https://a.example/2", "methods evidence two")
        .with_page("https://b.example/1", "cost evidence")
        .with_page("https://c.example/1", "policy evidence")
}

fn build<C: TextCompletionClient + ?Sized>(
    client: Arc<C>,
    browser: FakeBrowser,
) -> (ResearchOrchestrator<C, FakeBrowser>, SharedBrowser<FakeBrowser>) {
    let browser = shared(browser);
    let collector = EvidenceCollector::new(browser.clone(), fast_options());
    let orchestrator = ResearchOrchestrator::new(client, collector, GenerationOptions::default());
    (orchestrator, browser)
}

fn ok(text: &str) -> Result<String, CompletionError> {
    Ok(text.to_string())
}

#[tokio::test]
async fn full_run_completes_with_aligned_findings() {
    let client = Arc::new(ScriptedCompletion::new(vec![ok(QUESTIONS), ok("# Report")]));
    let (orchestrator, browser) = build(client.clone(), research_browser());

    orchestrator.start_run("solar panel recycling").await.unwrap();

    let session = orchestrator.session();
    assert_eq!(session.status(), ResearchStatus::Complete);
    assert_eq!(session.topic(), "solar panel recycling");
    assert_eq!(
        session.questions(),
        [
            "What are the main methods for solar panel recycling?",
            "How much does recycling cost?",
            "Which policies drive solar recycling adoption?",
        ]
    );
    assert_eq!(
        session.findings(),
        [
            "methods evidence one\n\nmethods evidence two",
            "cost evidence",
            "policy evidence",
        ]
    );
    assert_eq!(session.report(), "# Report");
    assert!(session.error().is_none());
    assert!(session.finished_at() >= session.started_at());

    let prompts = client.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], question_prompt("solar panel recycling"));
    assert!(prompts[1].contains("methods evidence one\n\nmethods evidence two\ncost evidence\npolicy evidence"));

    let browser = browser.lock().await;
    assert_eq!(browser.navigations.len(), 3);
    assert_eq!(browser.tab_count(), 1);
}

#[tokio::test]
async fn extra_question_lines_are_dropped() {
    let client = Arc::new(ScriptedCompletion::new(vec![
        ok("q one\nq two\nq three\nq four\nq five"),
        ok("report"),
    ]));
    let (orchestrator, browser) = build(client, FakeBrowser::new());

    orchestrator.start_run("topic").await.unwrap();

    let session = orchestrator.session();
    assert_eq!(session.questions().len(), 3);
    assert_eq!(session.findings().len(), 3);
    assert_eq!(browser.lock().await.navigations.len(), 3);
}

#[tokio::test]
async fn single_question_still_runs_every_stage() {
    let client = Arc::new(ScriptedCompletion::new(vec![
        ok("\n  What are the methods?  \n\n"),
        ok("short report"),
    ]));
    let (orchestrator, browser) = build(client.clone(), research_browser());

    orchestrator.start_run("X").await.unwrap();

    let session = orchestrator.session();
    assert_eq!(session.status(), ResearchStatus::Complete);
    assert_eq!(session.questions(), ["What are the methods?"]);
    assert_eq!(session.findings().len(), 1);
    assert_eq!(browser.lock().await.navigations.len(), 1);

    let prompts = client.prompts();
    assert!(prompts[1].starts_with("Summarize these findings about X:\nmethods evidence one"));
    assert_eq!(session.report(), "short report");
}

#[tokio::test]
async fn synthesis_failure_keeps_gathered_state() {
    let client = Arc::new(ScriptedCompletion::new(vec![
        ok(QUESTIONS),
        Err(CompletionError::Api {
            status: 429,
            body: "rate limited".into(),
        }),
    ]));
    let (orchestrator, _browser) = build(client, research_browser());

    let err = orchestrator.start_run("solar panel recycling").await.unwrap_err();
    assert!(matches!(err, ResearchError::Completion(CompletionError::Api { status: 429, .. })));

    let session = orchestrator.session();
    assert_eq!(session.status(), ResearchStatus::Failed);
    assert_eq!(session.questions().len(), 3);
    assert_eq!(session.findings().len(), 3);
    assert_eq!(session.report(), "");
    assert!(session.error().unwrap().contains("rate limited"));
}

#[tokio::test]
async fn question_generation_failure_fails_the_run() {
    let client = Arc::new(ScriptedCompletion::new(vec![Err(CompletionError::Transport(
        "connection refused".into(),
    ))]));
    let (orchestrator, browser) = build(client, research_browser());

    assert!(orchestrator.start_run("topic").await.is_err());

    let session = orchestrator.session();
    assert_eq!(session.status(), ResearchStatus::Failed);
    assert!(session.questions().is_empty());
    assert!(session.findings().is_empty());
    assert!(browser.lock().await.navigations.is_empty());
}

#[tokio::test]
async fn failed_search_does_not_abort_the_run() {
    let client = Arc::new(ScriptedCompletion::new(vec![ok(QUESTIONS), ok("report")]));
    let (orchestrator, _browser) = build(client, research_browser().with_failing_search("cost"));

    orchestrator.start_run("solar panel recycling").await.unwrap();

    let session = orchestrator.session();
    assert_eq!(session.status(), ResearchStatus::Complete);
    assert_eq!(session.findings()[0], "methods evidence one\n\nmethods evidence two");
    assert!(is_failure_marker(&session.findings()[1]));
    assert_eq!(session.findings()[2], "policy evidence");
}

#[tokio::test]
async fn empty_evidence_is_kept_in_place() {
    let client = Arc::new(ScriptedCompletion::new(vec![ok(QUESTIONS), ok("report")]));
    let browser = research_browser().with_broken_page("https://b.example/1", "crashed");
    let (orchestrator, _browser) = build(client, browser);

    orchestrator.start_run("solar panel recycling").await.unwrap();

    let session = orchestrator.session();
    assert_eq!(session.findings().len(), 3);
    assert_eq!(session.findings()[1], "");
    assert_eq!(session.findings()[2], "policy evidence");
}

#[tokio::test]
async fn empty_topic_is_rejected_without_touching_session() {
    let client = Arc::new(ScriptedCompletion::new(vec![]));
    let (orchestrator, _browser) = build(client.clone(), FakeBrowser::new());
    let before = orchestrator.session().run_id();

    assert!(matches!(
        orchestrator.start_run("   ").await,
        Err(ResearchError::EmptyTopic)
    ));
    assert_eq!(orchestrator.session().run_id(), before);
    assert_eq!(orchestrator.session().status(), ResearchStatus::Idle);
    assert!(client.prompts().is_empty());
}

#[tokio::test]
async fn reset_and_rerun_start_from_clean_session() {
    let client = Arc::new(ScriptedCompletion::new(vec![
        ok(QUESTIONS),
        ok("first report"),
        ok("only question"),
        ok("second report"),
    ]));
    let (orchestrator, _browser) = build(client, research_browser());
    let handle = orchestrator.handle();

    orchestrator.start_run("first").await.unwrap();
    let first = handle.snapshot();

    orchestrator.reset().unwrap();
    let idle = handle.snapshot();
    assert_eq!(idle.status(), ResearchStatus::Idle);
    assert!(idle.questions().is_empty());
    assert!(idle.findings().is_empty());
    assert_eq!(idle.report(), "");

    orchestrator.start_run("second").await.unwrap();
    let second = handle.snapshot();
    assert_ne!(first.run_id(), second.run_id());
    assert_eq!(second.topic(), "second");
    assert_eq!(second.questions(), ["only question"]);
    assert_eq!(second.report(), "second report");
}

#[tokio::test]
async fn progress_mirrors_pipeline_stages() {
    let client = Arc::new(ScriptedCompletion::new(vec![ok("one question"), ok("report")]));
    let (orchestrator, _browser) = build(client, FakeBrowser::new());

    orchestrator.start_run("topic").await.unwrap();

    let session = orchestrator.session();
    let messages: Vec<&str> = session.progress().iter().map(|s| s.message.as_str()).collect();
    assert_eq!(
        messages,
        [
            "Generating research questions...",
            "Researching each question...",
            "Researching: one question",
            "Completed 1/1",
            "Compiling final report...",
            "Research complete!",
        ]
    );
    assert_eq!(session.current_step(), Some("Research complete!"));
}

#[tokio::test]
async fn overlapping_run_and_reset_are_rejected() {
    let client = Arc::new(GatedCompletion::new(vec![ok("q one"), ok("report")]));
    let (orchestrator, _browser) = build(client.clone(), research_browser());
    let orchestrator = Arc::new(orchestrator);

    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_run("first").await })
    };
    client.entered.notified().await;

    assert_eq!(orchestrator.session().status(), ResearchStatus::GeneratingQuestions);
    assert!(matches!(
        orchestrator.start_run("second").await,
        Err(ResearchError::RunInProgress)
    ));
    assert!(matches!(orchestrator.reset(), Err(ResearchError::RunInProgress)));

    client.release.notify_one();
    running.await.unwrap().unwrap();

    let session = orchestrator.session();
    assert_eq!(session.topic(), "first");
    assert_eq!(session.status(), ResearchStatus::Complete);
}

#[tokio::test]
async fn cancellation_fails_run_and_keeps_questions() {
    let client = Arc::new(GatedCompletion::new(vec![ok(QUESTIONS), ok("report")]));
    let (orchestrator, browser) = build(client.clone(), research_browser());
    let orchestrator = Arc::new(orchestrator);

    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_run("solar panel recycling").await })
    };
    client.entered.notified().await;
    orchestrator.cancel();
    client.release.notify_one();

    let result = running.await.unwrap();
    assert!(matches!(result, Err(ResearchError::Cancelled)));

    let session = orchestrator.session();
    assert_eq!(session.status(), ResearchStatus::Failed);
    assert_eq!(session.questions().len(), 3);
    assert!(session.findings().is_empty());
    assert_eq!(session.error(), Some("Research run cancelled"));
    assert!(browser.lock().await.navigations.is_empty());
}

#[tokio::test]
async fn works_behind_a_trait_object() {
    let client: Arc<dyn TextCompletionClient> =
        Arc::new(ScriptedCompletion::new(vec![ok("q"), ok("report")]));
    let (orchestrator, _browser) = build(client, FakeBrowser::new());

    orchestrator.start_run("topic").await.unwrap();
    assert_eq!(orchestrator.session().report(), "report");
}

#[tokio::test(start_paused = true)]
async fn dropped_run_fails_and_orchestrator_stays_usable() {
    let client = Arc::new(GatedCompletion::new(vec![ok("only question"), ok("second report")]));
    let (orchestrator, _browser) = build(client.clone(), FakeBrowser::new());

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        orchestrator.start_run("slow topic"),
    )
    .await;
    assert!(outcome.is_err());

    let session = orchestrator.session();
    assert_eq!(session.status(), ResearchStatus::Failed);
    assert_eq!(session.error(), Some("Research run aborted"));
    assert!(session.finished_at().is_some());

    orchestrator.reset().unwrap();
    assert_eq!(orchestrator.session().status(), ResearchStatus::Idle);

    orchestrator.start_run("next topic").await.unwrap();
    let session = orchestrator.session();
    assert_eq!(session.status(), ResearchStatus::Complete);
    assert_eq!(session.questions(), ["only question"]);
    assert_eq!(session.report(), "second report");
}

#[tokio::test]
async fn cancel_while_idle_does_not_affect_the_next_run() {
    let client = Arc::new(ScriptedCompletion::new(vec![ok("q"), ok("report")]));
    let (orchestrator, _browser) = build(client, FakeBrowser::new());

    orchestrator.cancel();
    orchestrator.start_run("topic").await.unwrap();

    assert_eq!(orchestrator.session().status(), ResearchStatus::Complete);
}
