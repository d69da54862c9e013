//! Service wiring
//!
//! Builds every collaborator from the bootstrap configuration and spawns
//! the background tasks (trigger workers, job workers, snapshot sweeper).

use ffai_common::api::load_shared_secret;
use ffai_common::config::{DispatchMode, RootLayout, TomlConfig};
use ffai_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::providers::ProviderRegistry;
use crate::services::{
    ChannelDispatcher, DeferredTrigger, EmailDispatcher, HttpMailTransport, HttpPdfEngine, JobQueue,
    LogMailTransport, LoopbackDispatcher, MailTransport, PdfEngine, PdfRenderer, ResponseProcessor, SiteInfo,
    SnapshotStore, SqliteAuditLog, TriggerDispatcher, TriggerSettings, TriggerWorkerPool, UnavailablePdfEngine,
};
use crate::{new_last_error, AppState};

/// Running pipeline: handler state plus background task handles
pub struct Pipeline {
    pub state: AppState,
    pub job_queue: Arc<JobQueue>,
    pub tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Wait for background tasks after `cancel` has fired
    pub async fn join(self) {
        self.job_queue.shutdown().await;
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
    }
}

/// Address the loopback dispatcher posts to
pub fn loopback_base_url(config: &TomlConfig) -> String {
    let host = match config.bind_address.as_str() {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    };
    format!("http://{}:{}", host, config.port)
}

/// Build the pipeline and start its background tasks
pub async fn start(config: &TomlConfig, layout: &RootLayout, cancel: CancellationToken) -> Result<Pipeline> {
    let db = crate::db::init_database_pool(&layout.database_path).await?;
    info!("Database: {}", layout.database_path.display());

    let shared_secret = load_shared_secret(&db)
        .await
        .map_err(|e| Error::Config(format!("Trigger secret unavailable: {}", e)))?;

    let keys = crate::config::resolve_all_provider_keys(&db, config).await?;
    let providers = ProviderRegistry::from_keys(keys)?;
    info!("Providers configured: {:?}", providers.configured());

    let last_error = new_last_error();
    let base_url = config.public_base_url();

    let engine: Arc<dyn PdfEngine> = match &config.pdf.engine_url {
        Some(url) => Arc::new(HttpPdfEngine::new(url.clone()).map_err(|e| Error::Config(e.to_string()))?),
        None => {
            warn!("No PDF engine configured (pdf.engine_url); PDF generation will fail");
            Arc::new(UnavailablePdfEngine)
        }
    };
    let pdf_renderer = Arc::new(PdfRenderer::new(db.clone(), engine, layout.pdf_dir.clone(), &base_url));

    let transport: Arc<dyn MailTransport> = match &config.mail.relay_url {
        Some(url) => Arc::new(
            HttpMailTransport::new(url.clone(), config.mail.from_address.clone())
                .map_err(|e| Error::Config(e.to_string()))?,
        ),
        None => {
            warn!("No mail relay configured (mail.relay_url); emails will only be logged");
            Arc::new(LogMailTransport)
        }
    };
    let email = Arc::new(EmailDispatcher::new(
        db.clone(),
        transport,
        SiteInfo {
            name: config.site_name.clone(),
            url: base_url.clone(),
            admin_email: config.admin_email.clone(),
        },
    ));

    let processor = Arc::new(
        ResponseProcessor::new(
            db.clone(),
            providers,
            Arc::new(SqliteAuditLog::new(db.clone())),
            last_error.clone(),
        )
        .with_hook(pdf_renderer)
        .with_email(email),
    );

    let pipeline_config = &config.pipeline;
    let mut tasks = Vec::new();

    let job_queue = Arc::new(JobQueue::new(pipeline_config.job_queue_capacity));
    tasks.extend(
        job_queue
            .clone()
            .spawn_workers(pipeline_config.job_workers, processor.clone(), cancel.clone()),
    );

    let store = Arc::new(SnapshotStore::new());
    tasks.push(store.clone().spawn_sweeper(
        Duration::from_secs(pipeline_config.sweep_interval_secs.max(1)),
        cancel.clone(),
    ));

    let (dispatcher, receiver) = match pipeline_config.dispatch_mode {
        DispatchMode::Channel => {
            let (dispatcher, receiver) = ChannelDispatcher::new(pipeline_config.channel_capacity);
            (Arc::new(dispatcher) as Arc<dyn TriggerDispatcher>, Some(receiver))
        }
        DispatchMode::Loopback => {
            let loopback_url = loopback_base_url(config);
            let dispatcher = LoopbackDispatcher::new(
                Some(loopback_url.as_str()),
                Duration::from_millis(pipeline_config.loopback_timeout_ms),
            )
            .map_err(|e| Error::Config(format!("Loopback client: {}", e)))?;
            (Arc::new(dispatcher) as Arc<dyn TriggerDispatcher>, None)
        }
    };

    let trigger = Arc::new(
        DeferredTrigger::new(
            db.clone(),
            store,
            shared_secret,
            dispatcher,
            processor,
            TriggerSettings {
                snapshot_ttl: Duration::from_secs(pipeline_config.snapshot_ttl_secs),
                delay_secs: pipeline_config.trigger_delay_secs,
            },
        )
        .with_scheduler(job_queue.clone()),
    );

    if let Some(receiver) = receiver {
        tasks.extend(TriggerWorkerPool::spawn(
            pipeline_config.worker_count,
            receiver,
            trigger.clone(),
            cancel.clone(),
        ));
    }
    info!(
        mode = ?pipeline_config.dispatch_mode,
        workers = pipeline_config.worker_count,
        job_workers = pipeline_config.job_workers,
        "Pipeline started"
    );

    let state = AppState::new(db, trigger, layout.pdf_dir.clone(), last_error);

    Ok(Pipeline { state, job_queue, tasks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_targets_localhost_for_wildcard_bind() {
        let mut config = TomlConfig::default();
        config.bind_address = "0.0.0.0".to_string();
        config.port = 6000;
        assert_eq!(loopback_base_url(&config), "http://127.0.0.1:6000");
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RootLayout::new(dir.path());
        layout.ensure_directories().unwrap();

        let cancel = CancellationToken::new();
        let pipeline = start(&TomlConfig::default(), &layout, cancel.clone()).await.unwrap();
        assert!(pipeline.state.trigger.store().is_empty().await);

        cancel.cancel();
        pipeline.join().await;
    }
}
