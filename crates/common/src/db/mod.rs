//! Database layer for LitScout
//!
//! Provides:
//! - SeaORM entity models for the metadata tables
//! - `Store`, the single data-access façade every pipeline goes through
//! - Connection pool management

pub mod models;
pub mod normalized;
mod store;

pub use store::{AnnHit, ConceptPaperMatch, EntityId, EntityKind, Store};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

/// Single database connection pool.
///
/// The teacher's primary/replica split (`crates/common/src/db/mod.rs`) is
/// dropped — spec.md never mentions read replicas.
#[derive(Clone)]
pub struct DbPool {
    pub connection: DatabaseConnection,
}

impl DbPool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("connecting to database");

        let mut opts = ConnectOptions::new(config.connection_url());
        opts.max_connections(config.max_connections)
            .connect_timeout(config.connect_timeout())
            .sqlx_logging(false);

        let connection = Database::connect(opts)
            .await
            .map_err(|e| AppError::internal(format!("failed to connect to database: {e}")))?;

        info!("database connection established");

        Ok(Self { connection })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.connection
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::internal(format!("ping failed: {e}")))?;

        Ok(())
    }

    /// Sets the session-local ANN probe count. Must run inside the same
    /// connection/transaction as the subsequent SELECT (spec.md §4.1, §4.5.1).
    pub async fn set_local_probes(
        conn: &impl sea_orm::ConnectionTrait,
        probes: u32,
    ) -> Result<()> {
        use sea_orm::Statement;

        conn.execute(Statement::from_string(
            conn.get_database_backend(),
            format!("SET LOCAL ivfflat.probes = {probes}"),
        ))
        .await
        .map_err(AppError::from)?;

        Ok(())
    }
}
