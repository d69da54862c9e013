//! Trigger dispatch: hand-off from submission intake to deferred processing
//!
//! Two transports:
//! - [`ChannelDispatcher`]: bounded mpsc channel drained by a
//!   [`TriggerWorkerPool`] (default)
//! - [`LoopbackDispatcher`]: fire-and-forget POST to this service's own
//!   `/api/deferred` endpoint
//!
//! Either way the caller never waits for processing. A dispatch error tells
//! the caller to process inline instead; so does a [`Delivery::InFlight`]
//! receiver that yields the message back.

use ffai_common::api::{DeferredTriggerRequest, DEFERRED_ACTION};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::deferred_trigger::DeferredTrigger;

/// Storage key plus signed token, the whole content of a trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMessage {
    pub storage_key: String,
    pub token: String,
    /// Seconds to wait before processing
    pub delay: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Trigger channel full")]
    ChannelFull,

    #[error("Trigger channel closed")]
    ChannelClosed,

    #[error("Loopback URL not configured")]
    NotConfigured,
}

/// What became of a message the dispatcher accepted
#[derive(Debug)]
pub enum Delivery {
    /// The transport owns the message
    Accepted,
    /// Delivery continues in the background; the message comes back on
    /// this receiver if it could not be delivered
    InFlight(oneshot::Receiver<TriggerMessage>),
}

pub trait TriggerDispatcher: Send + Sync {
    /// Hand off `message` without waiting for it to be processed
    fn dispatch(&self, message: TriggerMessage) -> Result<Delivery, DispatchError>;
}

/// Channel transport
pub struct ChannelDispatcher {
    sender: mpsc::Sender<TriggerMessage>,
}

impl ChannelDispatcher {
    /// Dispatcher plus the receiving end for the worker pool
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TriggerMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl TriggerDispatcher for ChannelDispatcher {
    fn dispatch(&self, message: TriggerMessage) -> Result<Delivery, DispatchError> {
        self.sender
            .try_send(message)
            .map(|()| Delivery::Accepted)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DispatchError::ChannelFull,
                mpsc::error::TrySendError::Closed(_) => DispatchError::ChannelClosed,
            })
    }
}

/// Workers consuming trigger messages from a [`ChannelDispatcher`]
pub struct TriggerWorkerPool;

impl TriggerWorkerPool {
    /// Spawn `count` workers sharing `receiver`
    ///
    /// Workers stop when `cancel` fires (between messages) or the channel
    /// closes. On cancellation the channel is closed and anything still
    /// queued is logged as abandoned.
    pub fn spawn(
        count: usize,
        receiver: mpsc::Receiver<TriggerMessage>,
        trigger: Arc<DeferredTrigger>,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let receiver = Arc::new(Mutex::new(receiver));

        (0..count.max(1))
            .map(|worker| {
                let receiver = receiver.clone();
                let trigger = trigger.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tracing::debug!(worker, "Trigger worker started");
                    loop {
                        let message = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                let mut queue = receiver.lock().await;
                                abandon_queued(&mut queue);
                                break;
                            }
                            message = async { receiver.lock().await.recv().await } => message,
                        };
                        let Some(message) = message else {
                            break;
                        };

                        match trigger
                            .on_deferred_trigger(&message.token, &message.storage_key, message.delay)
                            .await
                        {
                            Ok(ack) => tracing::info!(
                                worker,
                                storage_key = %message.storage_key,
                                processed_inline = ack.processed_inline,
                                scheduled = ack.scheduled,
                                failed = ack.failed,
                                "Deferred trigger processed"
                            ),
                            Err(e) => tracing::warn!(
                                worker,
                                storage_key = %message.storage_key,
                                error = %e,
                                "Deferred trigger rejected"
                            ),
                        }
                    }
                    tracing::debug!(worker, "Trigger worker stopped");
                })
            })
            .collect()
    }
}

/// Close `receiver` and drain it, logging each abandoned storage key
///
/// Returns the abandoned keys. Snapshots behind them stay in the store
/// until their TTL runs out.
pub fn abandon_queued(receiver: &mut mpsc::Receiver<TriggerMessage>) -> Vec<String> {
    receiver.close();
    let mut abandoned = Vec::new();
    while let Ok(message) = receiver.try_recv() {
        tracing::warn!(
            storage_key = %message.storage_key,
            "Trigger abandoned at shutdown; snapshot left for manual recovery"
        );
        abandoned.push(message.storage_key);
    }
    abandoned
}

/// HTTP loopback transport
pub struct LoopbackDispatcher {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl LoopbackDispatcher {
    /// `base_url` is this service's own address; None disables dispatch
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: base_url.map(|url| format!("{}/api/deferred", url.trim_end_matches('/'))),
        })
    }
}

impl TriggerDispatcher for LoopbackDispatcher {
    fn dispatch(&self, message: TriggerMessage) -> Result<Delivery, DispatchError> {
        let endpoint = self.endpoint.clone().ok_or(DispatchError::NotConfigured)?;
        let client = self.client.clone();
        let body = DeferredTriggerRequest {
            action: DEFERRED_ACTION.to_string(),
            storage_key: message.storage_key.clone(),
            signed_token: message.token.clone(),
            delay: message.delay,
        };
        let (failed, delivery) = oneshot::channel();

        tokio::spawn(async move {
            match client.post(&endpoint).form(&body).send().await {
                Ok(response) => tracing::debug!(status = %response.status(), "Loopback trigger acknowledged"),
                // Expected: the request is sent, the response is not awaited
                Err(e) if e.is_timeout() && !e.is_connect() => tracing::debug!("Loopback trigger sent"),
                Err(e) => {
                    tracing::error!(
                        storage_key = %body.storage_key,
                        error = %e,
                        "Loopback trigger failed; handing back for inline processing"
                    );
                    let _ = failed.send(message);
                }
            }
        });

        Ok(Delivery::InFlight(delivery))
    }
}
