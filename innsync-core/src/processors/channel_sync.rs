//! ChannelSyncWorker processor.
//!
//! Delivers pending outbound sync-log rows (the durable job outbox) to
//! channel push endpoints as signed HTTP POSTs. Lifecycle events received on
//! the channel are wakeups that trigger an immediate sweep; a periodic
//! background sweep picks up anything the wakeup missed, including rows left
//! over from a crash, so delivery never depends on the in-process queue.
//!
//! A sweep claims its batch in one atomic statement that also counts the
//! attempt, then performs the HTTP deliveries with no database locks held,
//! and records each outcome in its own statement. No lock ever spans the
//! network call to a channel, and a success recorded for one entry is never
//! rolled back because a later entry in the batch failed.

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entities::{Channel, SyncLogEntry};
use crate::events::StayEventReceiver;
use innsync_sdk::signature::{sign_body, SIGNATURE_HEADER};

/// How many pending rows one sweep claims.
const CLAIM_BATCH: i64 = 10;

/// How often the background sweep runs.
const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(10);

/// Errors that can occur during outbound job delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("channel not found: {0}")]
    ChannelNotFound(Uuid),

    /// The channel has no push endpoint to deliver to.
    #[error("channel {0} has no push endpoint")]
    NoEndpoint(Uuid),

    /// The endpoint answered with a non-success status.
    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers outbound sync jobs to external channels.
pub struct ChannelSyncWorker {
    pool: PgPool,
    stay_rx: StayEventReceiver,
    shutdown_rx: watch::Receiver<bool>,
    http_client: reqwest::Client,
    max_attempts: i32,
}

impl ChannelSyncWorker {
    pub fn new(
        pool: PgPool,
        stay_rx: StayEventReceiver,
        shutdown_rx: watch::Receiver<bool>,
        max_attempts: i32,
    ) -> Self {
        Self {
            pool,
            stay_rx,
            shutdown_rx,
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            max_attempts,
        }
    }

    /// Run the worker until shutdown.
    pub async fn run(mut self) {
        info!("ChannelSyncWorker started");

        let pool = self.pool.clone();
        let http_client = self.http_client.clone();
        let max_attempts = self.max_attempts;
        let mut sweep_shutdown_rx = self.shutdown_rx.clone();

        let sweep_handle = tokio::spawn(async move {
            Self::background_sweep_loop(pool, http_client, max_attempts, &mut sweep_shutdown_rx)
                .await;
        });

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("ChannelSyncWorker received shutdown signal");
                        break;
                    }
                }

                Some(event) = self.stay_rx.recv() => {
                    debug!(kind = event.kind(), stay_id = %event.stay_id(), "received stay event");

                    if !event.triggers_fanout() {
                        continue;
                    }
                    if let Err(e) =
                        Self::sweep_once(&self.pool, &self.http_client, self.max_attempts).await
                    {
                        error!(error = %e, "failed to process outbound sync jobs");
                    }
                }

                else => {
                    info!("stay event channel closed");
                    break;
                }
            }
        }

        let _ = sweep_handle.await;

        info!("ChannelSyncWorker shutdown complete");
    }

    /// Periodic sweep for rows whose backoff has elapsed, and for rows whose
    /// wakeup event was lost.
    async fn background_sweep_loop(
        pool: PgPool,
        http_client: reqwest::Client,
        max_attempts: i32,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        info!("outbound sync sweep loop started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("outbound sync sweep loop shutting down");
                        break;
                    }
                }

                _ = tokio::time::sleep(SWEEP_INTERVAL) => {
                    if let Err(e) = Self::sweep_once(&pool, &http_client, max_attempts).await {
                        error!(error = %e, "outbound sync sweep failed");
                    }
                }
            }
        }
    }

    /// Claim one batch of due rows (the claim statement counts the attempt
    /// and releases its locks at commit), deliver each over HTTP with no
    /// locks held, and record each outcome in its own statement so one
    /// entry's failure cannot undo another's recorded success.
    async fn sweep_once(
        pool: &PgPool,
        http_client: &reqwest::Client,
        max_attempts: i32,
    ) -> Result<(), sqlx::Error> {
        let entries = SyncLogEntry::claim_due_outbound(pool, max_attempts, CLAIM_BATCH).await?;

        for entry in entries {
            match Self::deliver(pool, http_client, &entry).await {
                Ok(()) => {
                    SyncLogEntry::mark_success(pool, entry.id).await?;
                    info!(
                        entry_id = %entry.id,
                        channel_id = %entry.channel_id,
                        event_type = %entry.event_type,
                        "outbound sync job delivered"
                    );
                }
                Err(DeliveryError::Database(e)) => return Err(e),
                Err(e) => {
                    SyncLogEntry::mark_attempt_failed(
                        pool,
                        entry.id,
                        max_attempts,
                        &e.to_string(),
                    )
                    .await?;
                    warn!(
                        entry_id = %entry.id,
                        channel_id = %entry.channel_id,
                        attempts = entry.attempts,
                        error = %e,
                        "outbound sync job delivery failed"
                    );
                }
            }
        }

        Ok(())
    }

    /// POST one job payload to its channel's push endpoint, signing the body
    /// when the channel has a shared secret.
    async fn deliver(
        pool: &PgPool,
        http_client: &reqwest::Client,
        entry: &SyncLogEntry,
    ) -> Result<(), DeliveryError> {
        let channel = Channel::get_by_id(pool, entry.channel_id)
            .await?
            .ok_or(DeliveryError::ChannelNotFound(entry.channel_id))?;
        let push_url = channel
            .push_url
            .as_deref()
            .ok_or(DeliveryError::NoEndpoint(channel.id))?;

        let body = entry.payload.to_string();

        let mut request = http_client
            .post(push_url)
            .header("Content-Type", "application/json");
        if let Some(secret) = channel.secret.as_deref() {
            request = request.header(SIGNATURE_HEADER, sign_body(body.as_bytes(), secret.as_bytes()));
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

