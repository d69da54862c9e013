//! Pipeline services
//!
//! Leaf-first: prompt building, providers (see `crate::providers`), the
//! response processor with its PDF and email side effects, then the deferred
//! trigger with its snapshot store, dispatchers and job queue.

pub mod audit_log;
pub mod deferred_trigger;
pub mod dispatcher;
pub mod email_dispatcher;
pub mod html_cleaner;
pub mod job_queue;
pub mod mail_transport;
pub mod pdf_engine;
pub mod pdf_renderer;
pub mod prompt_builder;
pub mod response_processor;
pub mod snapshot_store;

pub use audit_log::{AuditLog, SqliteAuditLog};
pub use deferred_trigger::{DeferredTrigger, DispatchOutcome, TriggerAck, TriggerError, TriggerSettings};
pub use dispatcher::{
    abandon_queued, ChannelDispatcher, Delivery, DispatchError, LoopbackDispatcher, TriggerDispatcher, TriggerMessage,
    TriggerWorkerPool,
};
pub use email_dispatcher::{EmailDispatcher, SendReport, SiteInfo};
pub use job_queue::{JobHandler, JobId, JobPayload, JobQueue, JobScheduler, ScheduledJob};
pub use mail_transport::{HttpMailTransport, LogMailTransport, MailError, MailTransport, OutgoingMail};
pub use pdf_engine::{HttpPdfEngine, PageSettings, PdfEngine, PdfError, UnavailablePdfEngine};
pub use pdf_renderer::PdfRenderer;
pub use response_processor::{ResponseEvent, ResponseHook, ResponseProcessor};
pub use snapshot_store::{SnapshotStore, StoreError};
