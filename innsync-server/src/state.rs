//! Application state shared across all request handlers.

use crate::config::file::FileConfig;
use innsync_core::lifecycle::StayService;
use innsync_core::processors::InboundSync;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc or
/// is itself a cheap handle).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Stay lifecycle orchestrator.
    pub service: StayService,
    /// Inbound webhook dispatcher.
    pub inbound: InboundSync,
    /// Loaded configuration (static for the process lifetime).
    pub config: Arc<FileConfig>,
}

impl AppState {
    pub fn new(db: PgPool, service: StayService, config: Arc<FileConfig>) -> Self {
        let inbound = InboundSync::new(service.clone());
        Self {
            db,
            service,
            inbound,
            config,
        }
    }

    /// The property this instance manages.
    pub fn property_id(&self) -> Uuid {
        self.config.property.id
    }
}
