//! Test Helper Utilities
//!
//! Fakes for every external collaborator plus a harness that wires them
//! into a real processor and trigger over an in-memory database.

#![allow(dead_code)]

use async_trait::async_trait;
use ffai_common::{FieldValue, FormFields};
use ffai_pipeline::models::{FormRef, PromptDefinition, SubmissionEvent};
use ffai_pipeline::providers::{
    AiProvider, CompletionRequest, ProviderError, ProviderKind, ProviderRegistry, ProviderReply,
};
use ffai_pipeline::services::{
    DeferredTrigger, Delivery, DispatchError, EmailDispatcher, JobQueue, MailError, MailTransport, OutgoingMail, PageSettings,
    PdfEngine, PdfError, PdfRenderer, ResponseProcessor, SiteInfo, SnapshotStore, SqliteAuditLog, TriggerDispatcher,
    TriggerMessage, TriggerSettings,
};
use ffai_pipeline::{new_last_error, AppState, LastError};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const SHARED_SECRET: i64 = 424242;
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Provider returning a canned reply or error
pub struct FakeProvider {
    reply: Result<String, String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeProvider {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AiProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<ProviderReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(text) => Ok(ProviderReply {
                text: text.clone(),
                usage: None,
            }),
            Err(message) => Err(ProviderError::Api {
                status: 500,
                message: message.clone(),
            }),
        }
    }
}

/// PDF engine producing `size` bytes of filler
pub struct FakePdfEngine {
    size: usize,
    calls: AtomicUsize,
}

impl FakePdfEngine {
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PdfEngine for FakePdfEngine {
    async fn render(&self, _html: &str, _page: &PageSettings) -> Result<Vec<u8>, PdfError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(self.size.max(bytes.len()), b'0');
        bytes.truncate(self.size);
        Ok(bytes)
    }
}

/// Transport recording every message; optionally rejects one address
#[derive(Default)]
pub struct FakeMailTransport {
    sent: Mutex<Vec<OutgoingMail>>,
    reject: Option<String>,
}

impl FakeMailTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(address: &str) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            reject: Some(address.to_string()),
        })
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for FakeMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if self.reject.as_deref() == Some(mail.to.as_str()) {
            return Err(MailError::Transport(format!("rejected {}", mail.to)));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// Dispatcher recording messages, or refusing them all
#[derive(Default)]
pub struct RecordingDispatcher {
    messages: Mutex<Vec<TriggerMessage>>,
    refuse: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
            refuse: true,
        })
    }

    pub fn messages(&self) -> Vec<TriggerMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl TriggerDispatcher for RecordingDispatcher {
    fn dispatch(&self, message: TriggerMessage) -> Result<Delivery, DispatchError> {
        if self.refuse {
            return Err(DispatchError::ChannelClosed);
        }
        self.messages.lock().unwrap().push(message);
        Ok(Delivery::Accepted)
    }
}

/// Fully wired pipeline over fakes
pub struct Harness {
    pub db: SqlitePool,
    pub provider: Arc<FakeProvider>,
    pub pdf_engine: Arc<FakePdfEngine>,
    pub mail: Arc<FakeMailTransport>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub job_queue: Arc<JobQueue>,
    pub processor: Arc<ResponseProcessor>,
    pub trigger: Arc<DeferredTrigger>,
    pub last_error: LastError,
    pub pdf_dir: TempDir,
}

pub struct HarnessBuilder {
    provider: Option<Arc<FakeProvider>>,
    pdf_engine: Arc<FakePdfEngine>,
    mail: Arc<FakeMailTransport>,
    dispatcher: Arc<RecordingDispatcher>,
    transport: Option<Arc<dyn TriggerDispatcher>>,
    trigger_delay_secs: u64,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            provider: Some(FakeProvider::ok("Thanks for asking.")),
            pdf_engine: FakePdfEngine::new(4096),
            mail: FakeMailTransport::new(),
            dispatcher: RecordingDispatcher::new(),
            transport: None,
            trigger_delay_secs: 0,
        }
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            self.db.clone(),
            self.trigger.clone(),
            self.pdf_dir.path().to_path_buf(),
            self.last_error.clone(),
        )
    }

    /// Store `prompt` and return it with its assigned id
    pub async fn save_prompt(&self, mut prompt: PromptDefinition) -> PromptDefinition {
        prompt.id = ffai_pipeline::db::prompts::save_prompt(&self.db, &prompt)
            .await
            .expect("save prompt");
        prompt
    }
}

impl HarnessBuilder {
    pub fn provider(mut self, provider: Arc<FakeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// No client registered for the active provider
    pub fn without_provider(mut self) -> Self {
        self.provider = None;
        self
    }

    pub fn pdf_engine(mut self, engine: Arc<FakePdfEngine>) -> Self {
        self.pdf_engine = engine;
        self
    }

    pub fn mail(mut self, mail: Arc<FakeMailTransport>) -> Self {
        self.mail = mail;
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<RecordingDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Real transport for the trigger; the recording dispatcher stays idle
    pub fn transport(mut self, transport: Arc<dyn TriggerDispatcher>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub async fn build(self) -> Harness {
        let db = ffai_pipeline::db::init_memory_pool().await.expect("memory pool");
        let pdf_dir = tempfile::tempdir().expect("pdf dir");
        let last_error = new_last_error();

        let provider = self.provider.clone().unwrap_or_else(|| FakeProvider::ok("unused"));
        let mut registry = ProviderRegistry::new();
        if self.provider.is_some() {
            registry.insert(ProviderKind::OpenAi, provider.clone());
        }

        let renderer = Arc::new(PdfRenderer::new(
            db.clone(),
            self.pdf_engine.clone(),
            pdf_dir.path().to_path_buf(),
            "https://forms.example.com",
        ));
        let email = Arc::new(EmailDispatcher::new(
            db.clone(),
            self.mail.clone(),
            SiteInfo {
                name: "Example Site".to_string(),
                url: "https://forms.example.com".to_string(),
                admin_email: ADMIN_EMAIL.to_string(),
            },
        ));
        let processor = Arc::new(
            ResponseProcessor::new(
                db.clone(),
                registry,
                Arc::new(SqliteAuditLog::new(db.clone())),
                last_error.clone(),
            )
            .with_hook(renderer)
            .with_email(email),
        );

        let job_queue = Arc::new(JobQueue::new(16));
        let transport = self
            .transport
            .clone()
            .unwrap_or_else(|| self.dispatcher.clone() as Arc<dyn TriggerDispatcher>);
        let trigger = Arc::new(
            DeferredTrigger::new(
                db.clone(),
                Arc::new(SnapshotStore::new()),
                SHARED_SECRET,
                transport,
                processor.clone(),
                TriggerSettings {
                    snapshot_ttl: Duration::from_secs(300),
                    delay_secs: self.trigger_delay_secs,
                },
            )
            .with_scheduler(job_queue.clone()),
        );

        Harness {
            db,
            provider,
            pdf_engine: self.pdf_engine,
            mail: self.mail,
            dispatcher: self.dispatcher,
            job_queue,
            processor,
            trigger,
            last_error,
            pdf_dir,
        }
    }
}

/// Poll `condition` every 10 ms for up to two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn contact_form() -> FormRef {
    let mut form = FormRef::new(3, "Contact");
    form.labels.insert("email".to_string(), "Email".to_string());
    form.labels.insert("question".to_string(), "Your question".to_string());
    form
}

pub fn contact_fields() -> FormFields {
    let mut fields = FormFields::new();
    fields.insert("email".to_string(), FieldValue::scalar("ada@example.com"));
    fields.insert("question".to_string(), FieldValue::scalar("How do engines work?"));
    fields
}

pub fn contact_event(submission_id: i64) -> SubmissionEvent {
    SubmissionEvent {
        submission_id,
        form: contact_form(),
        fields: contact_fields(),
    }
}
