//! Processing pipeline tests
//!
//! Exercises the response processor and the deferred trigger end to end
//! against fake providers, PDF engine and mail transport.

mod helpers;

use ffai_pipeline::db::{response_logs, submission_meta};
use ffai_pipeline::models::{ProcessingStatus, PromptDefinition, PromptMode, ResponseAction};
use ffai_pipeline::services::{
    ChannelDispatcher, DispatchOutcome, LoopbackDispatcher, TriggerError, TriggerWorkerPool,
};
use helpers::{
    contact_event, contact_fields, contact_form, wait_until, FakeMailTransport, FakePdfEngine, FakeProvider,
    Harness, RecordingDispatcher, ADMIN_EMAIL,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn contact_prompt() -> PromptDefinition {
    let mut prompt = PromptDefinition::new(3, "Contact reply");
    prompt.enable_logging = true;
    prompt
}

// ============================================================================
// Response processor
// ============================================================================

#[tokio::test]
async fn test_success_records_result_with_labeled_prompt() {
    let harness = Harness::new().await;
    let prompt = harness.save_prompt(contact_prompt()).await;

    let ok = harness
        .processor
        .process(prompt.id, &contact_fields(), 42, &contact_form())
        .await;
    assert!(ok);

    let request = harness.provider.last_request().unwrap();
    assert_eq!(request.user_prompt, "Email: ada@example.com\nYour question: How do engines work?");

    let logs = response_logs::results_for_submission(&harness.db, 42).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].result.status, ProcessingStatus::Success);
    assert_eq!(logs[0].result.response_text, "Thanks for asking.");
    assert_eq!(logs[0].result.provider, "openai");
    assert_eq!(logs[0].result.form_id, 3);
}

#[tokio::test]
async fn test_success_without_logging_writes_nothing() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.enable_logging = false;
    let prompt = harness.save_prompt(prompt).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);
    assert!(response_logs::results_for_submission(&harness.db, 42).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_template_mode_erases_unknown_placeholders() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.prompt_mode = PromptMode::Template;
    prompt.system_prompt = Some("You are helpful.".to_string());
    prompt.user_prompt_template = Some("Answer {question} for {email}{phone}".to_string());
    let prompt = harness.save_prompt(prompt).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);

    let request = harness.provider.last_request().unwrap();
    assert_eq!(request.user_prompt, "Answer How do engines work? for ada@example.com");
    assert_eq!(request.system_prompt.as_deref(), Some("You are helpful."));

    let logs = response_logs::results_for_submission(&harness.db, 42).await.unwrap();
    assert_eq!(
        logs[0].result.prompt_text,
        "You are helpful.\n\nAnswer How do engines work? for ada@example.com"
    );
}

#[tokio::test]
async fn test_provider_error_skips_side_effects() {
    let harness = Harness::builder()
        .provider(FakeProvider::failing("quota exceeded"))
        .build()
        .await;
    let mut prompt = contact_prompt();
    prompt.response_action = ResponseAction::Email;
    prompt.email.send_to_submitter = true;
    prompt.pdf.enabled = true;
    let prompt = harness.save_prompt(prompt).await;

    let ok = harness
        .processor
        .process(prompt.id, &contact_fields(), 42, &contact_form())
        .await;
    assert!(!ok);

    assert!(harness.mail.sent().is_empty());
    assert_eq!(harness.pdf_engine.calls(), 0);
    assert!(submission_meta::all_meta(&harness.db, 42).await.unwrap().is_empty());

    let logs = response_logs::results_for_submission(&harness.db, 42).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].result.status, ProcessingStatus::Error);
    assert!(logs[0].result.error_message.as_deref().unwrap().contains("quota exceeded"));
    assert!(harness.last_error.read().await.is_some());
}

#[tokio::test]
async fn test_missing_client_records_error() {
    let harness = Harness::builder().without_provider().build().await;
    let mut prompt = contact_prompt();
    prompt.enable_logging = false;
    let prompt = harness.save_prompt(prompt).await;

    assert!(!harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);

    let logs = response_logs::results_for_submission(&harness.db, 42).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].result.status, ProcessingStatus::Error);
    assert!(logs[0].result.error_message.as_deref().unwrap().contains("openai"));
}

#[tokio::test]
async fn test_disabled_or_unknown_prompt_is_skipped() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.enabled = false;
    let prompt = harness.save_prompt(prompt).await;

    assert!(!harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);
    assert!(!harness.processor.process(9999, &contact_fields(), 42, &contact_form()).await);
    assert_eq!(harness.provider.calls(), 0);
}

#[tokio::test]
async fn test_pdf_generated_and_recorded() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.pdf.enabled = true;
    let prompt = harness.save_prompt(prompt).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);

    let meta = submission_meta::all_meta(&harness.db, 42).await.unwrap();
    assert_eq!(meta["pdf_filename"], "ai-response-42.pdf");
    assert_eq!(meta["pdf_url"], "https://forms.example.com/pdfs/ai-response-42.pdf");

    let path = harness.pdf_dir.path().join("ai-response-42.pdf");
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
}

#[tokio::test]
async fn test_regenerating_pdf_overwrites_own_file() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.pdf.enabled = true;
    let prompt = harness.save_prompt(prompt).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);
    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);

    let files: Vec<_> = std::fs::read_dir(harness.pdf_dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn test_pdf_name_collision_gets_suffix() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.pdf.enabled = true;
    prompt.pdf.filename_template = "summary".to_string();
    let prompt = harness.save_prompt(prompt).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);
    assert!(harness.processor.process(prompt.id, &contact_fields(), 43, &contact_form()).await);

    assert_eq!(
        submission_meta::recorded_pdf_filename(&harness.db, 43).await.unwrap().as_deref(),
        Some("summary-1.pdf")
    );
}

#[tokio::test]
async fn test_undersized_pdf_is_rejected_without_failing_run() {
    let harness = Harness::builder().pdf_engine(FakePdfEngine::new(100)).build().await;
    let mut prompt = contact_prompt();
    prompt.pdf.enabled = true;
    let prompt = harness.save_prompt(prompt).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);

    assert_eq!(harness.pdf_engine.calls(), 1);
    assert!(submission_meta::recorded_pdf_path(&harness.db, 42).await.unwrap().is_none());
    assert_eq!(std::fs::read_dir(harness.pdf_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_pdf_disabled_never_calls_engine() {
    let harness = Harness::new().await;
    let prompt = harness.save_prompt(contact_prompt()).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);
    assert_eq!(harness.pdf_engine.calls(), 0);
}

#[tokio::test]
async fn test_email_goes_to_submitter_with_pdf_attached() {
    let harness = Harness::builder()
        .provider(FakeProvider::ok("Use <b>steam</b>.\nMostly."))
        .build()
        .await;
    let mut prompt = contact_prompt();
    prompt.response_action = ResponseAction::Email;
    prompt.email.send_to_submitter = true;
    prompt.email.attach_pdf = true;
    prompt.pdf.enabled = true;
    let prompt = harness.save_prompt(prompt).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);

    let sent = harness.mail.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].subject, "AI Response for Submission #42");
    assert!(sent[0].html_body.contains("Use &lt;b&gt;steam&lt;/b&gt;.<br>"));
    assert_eq!(sent[0].attachments, vec![harness.pdf_dir.path().join("ai-response-42.pdf")]);
}

#[tokio::test]
async fn test_email_falls_back_to_admin() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.response_action = ResponseAction::Email;
    prompt.email.additional_recipients = "not-an-address".to_string();
    let prompt = harness.save_prompt(prompt).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);

    let sent = harness.mail.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, ADMIN_EMAIL);
    assert!(sent[0].attachments.is_empty());
}

#[tokio::test]
async fn test_mail_failure_does_not_fail_run() {
    let harness = Harness::builder()
        .mail(FakeMailTransport::rejecting("ops@example.com"))
        .build()
        .await;
    let mut prompt = contact_prompt();
    prompt.response_action = ResponseAction::Email;
    prompt.email.additional_recipients = "ops@example.com, team@example.com".to_string();
    let prompt = harness.save_prompt(prompt).await;

    assert!(harness.processor.process(prompt.id, &contact_fields(), 42, &contact_form()).await);

    let sent = harness.mail.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "team@example.com");
    assert!(harness.last_error.read().await.as_deref().unwrap().contains("ops@example.com"));
}

// ============================================================================
// Deferred trigger
// ============================================================================

#[tokio::test]
async fn test_form_without_prompts_is_not_dispatched() {
    let harness = Harness::new().await;

    let outcome = harness.trigger.on_submission_received(&contact_event(42)).await;

    assert_eq!(outcome, DispatchOutcome::NoPrompts);
    assert!(harness.dispatcher.messages().is_empty());
    assert!(harness.trigger.store().is_empty().await);
}

#[tokio::test]
async fn test_dispatched_trigger_processes_once() {
    let harness = Harness::new().await;
    harness.save_prompt(contact_prompt()).await;

    let outcome = harness.trigger.on_submission_received(&contact_event(42)).await;
    assert_eq!(outcome, DispatchOutcome::Dispatched);
    assert_eq!(harness.provider.calls(), 0);

    let messages = harness.dispatcher.messages();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.token, harness.trigger.sign(&message.storage_key));

    let ack = harness
        .trigger
        .on_deferred_trigger(&message.token, &message.storage_key, 0)
        .await
        .unwrap();
    assert_eq!(ack.processed_inline, 1);
    assert_eq!(harness.provider.calls(), 1);

    let replay = harness
        .trigger
        .on_deferred_trigger(&message.token, &message.storage_key, 0)
        .await;
    assert!(matches!(replay, Err(TriggerError::SnapshotNotFound(_))));
    assert_eq!(harness.provider.calls(), 1);
}

#[tokio::test]
async fn test_forged_token_leaves_snapshot_consumable() {
    let harness = Harness::new().await;
    harness.save_prompt(contact_prompt()).await;
    harness.trigger.on_submission_received(&contact_event(42)).await;
    let message = harness.dispatcher.messages().remove(0);

    let forged = harness.trigger.on_deferred_trigger("deadbeef", &message.storage_key, 0).await;
    assert_eq!(forged.unwrap_err(), TriggerError::InvalidToken);
    assert_eq!(harness.trigger.store().len().await, 1);

    let missing = harness.trigger.on_deferred_trigger(&message.token, "", 0).await;
    assert_eq!(missing.unwrap_err(), TriggerError::MissingKey);

    let ack = harness
        .trigger
        .on_deferred_trigger(&message.token, &message.storage_key, 0)
        .await
        .unwrap();
    assert_eq!(ack.processed_inline, 1);
}

#[tokio::test]
async fn test_dispatch_failure_processes_inline() {
    let harness = Harness::builder()
        .dispatcher(RecordingDispatcher::refusing())
        .build()
        .await;
    harness.save_prompt(contact_prompt()).await;

    let outcome = harness.trigger.on_submission_received(&contact_event(42)).await;

    assert_eq!(outcome, DispatchOutcome::ProcessedInline);
    assert_eq!(harness.provider.calls(), 1);
    assert!(harness.trigger.store().is_empty().await);
}

#[tokio::test]
async fn test_loopback_trigger_processes_once_over_http() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let loopback = LoopbackDispatcher::new(Some(&url), Duration::from_secs(2)).unwrap();
    let harness = Harness::builder().transport(Arc::new(loopback)).build().await;
    harness.save_prompt(contact_prompt()).await;

    let app = ffai_pipeline::build_router(harness.state());
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let outcome = harness.trigger.on_submission_received(&contact_event(42)).await;
    assert_eq!(outcome, DispatchOutcome::Dispatched);

    assert!(wait_until(|| harness.provider.calls() == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.provider.calls(), 1);
    assert!(harness.trigger.store().is_empty().await);

    server.abort();
}

#[tokio::test]
async fn test_loopback_connect_failure_processes_inline() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let loopback = LoopbackDispatcher::new(Some(&url), Duration::from_millis(50)).unwrap();
    let harness = Harness::builder().transport(Arc::new(loopback)).build().await;
    harness.save_prompt(contact_prompt()).await;

    let outcome = harness.trigger.on_submission_received(&contact_event(42)).await;
    assert_eq!(outcome, DispatchOutcome::Dispatched);

    assert!(wait_until(|| harness.provider.calls() == 1).await);
    assert!(harness.trigger.store().is_empty().await);
}

#[tokio::test]
async fn test_worker_shutdown_abandons_queued_triggers() {
    let (channel, receiver) = ChannelDispatcher::new(4);
    let harness = Harness::builder().transport(Arc::new(channel)).build().await;
    harness.save_prompt(contact_prompt()).await;

    let outcome = harness.trigger.on_submission_received(&contact_event(42)).await;
    assert_eq!(outcome, DispatchOutcome::Dispatched);

    let cancel = CancellationToken::new();
    cancel.cancel();
    for worker in TriggerWorkerPool::spawn(2, receiver, harness.trigger.clone(), cancel) {
        worker.await.unwrap();
    }

    assert_eq!(harness.provider.calls(), 0);
    assert_eq!(harness.trigger.store().len().await, 1);

    let outcome = harness.trigger.on_submission_received(&contact_event(43)).await;
    assert_eq!(outcome, DispatchOutcome::ProcessedInline);
    assert_eq!(harness.provider.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() {
    let harness = Harness::new().await;
    harness.save_prompt(contact_prompt()).await;
    harness.trigger.on_submission_received(&contact_event(42)).await;
    let message = harness.dispatcher.messages().remove(0);

    let first = harness.trigger.claim(&message.token, &message.storage_key);
    let second = harness.trigger.claim(&message.token, &message.storage_key);
    let (first, second) = tokio::join!(first, second);

    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
}

#[tokio::test]
async fn test_background_prompt_is_scheduled() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.background.enabled = true;
    prompt.background.delay_seconds = 30;
    harness.save_prompt(prompt).await;
    harness.save_prompt(contact_prompt()).await;

    harness.trigger.on_submission_received(&contact_event(42)).await;
    let message = harness.dispatcher.messages().remove(0);
    let ack = harness
        .trigger
        .on_deferred_trigger(&message.token, &message.storage_key, 0)
        .await
        .unwrap();

    assert_eq!(ack.scheduled, 1);
    assert_eq!(ack.processed_inline, 1);
    assert_eq!(harness.provider.calls(), 1);
    assert_eq!(harness.job_queue.len().await, 1);
}

#[tokio::test]
async fn test_job_workers_run_scheduled_prompt() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.background.enabled = true;
    harness.save_prompt(prompt).await;

    let cancel = CancellationToken::new();
    let workers = harness
        .job_queue
        .clone()
        .spawn_workers(1, harness.processor.clone(), cancel.clone());

    harness.trigger.on_submission_received(&contact_event(42)).await;
    let message = harness.dispatcher.messages().remove(0);
    let ack = harness
        .trigger
        .on_deferred_trigger(&message.token, &message.storage_key, 0)
        .await
        .unwrap();
    assert_eq!(ack.scheduled, 1);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while harness.provider.calls() == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(harness.provider.calls(), 1);

    cancel.cancel();
    for worker in workers {
        worker.await.unwrap();
    }
}

#[tokio::test]
async fn test_shut_down_queue_falls_back_to_inline() {
    let harness = Harness::new().await;
    let mut prompt = contact_prompt();
    prompt.background.enabled = true;
    harness.save_prompt(prompt).await;
    harness.job_queue.shutdown().await;

    harness.trigger.on_submission_received(&contact_event(42)).await;
    let message = harness.dispatcher.messages().remove(0);
    let ack = harness
        .trigger
        .on_deferred_trigger(&message.token, &message.storage_key, 0)
        .await
        .unwrap();

    assert_eq!(ack.scheduled, 0);
    assert_eq!(ack.processed_inline, 1);
}
