//! Database connectivity.
//!
//! The relational schema (rooms, players, roles, actions) is owned by the
//! game-rules layer; the coordination core only holds a connection for
//! startup verification and the health probe.

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection as SeaOrmConnection};
use std::time::Duration;

/// Wrapper around a SeaORM database connection pool.
#[derive(Clone)]
pub struct DatabaseConnection {
    conn: SeaOrmConnection,
}

impl DatabaseConnection {
    /// Create a new database connection from config.
    ///
    /// Fails if the database is unreachable; callers treat that as fatal at
    /// process start.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut opt = ConnectOptions::new(&config.url);
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .sqlx_logging(false);

        let conn = Database::connect(opt)
            .await
            .map_err(|e| Error::Database(format!("failed to connect: {}", e)))?;

        tracing::info!(
            max_connections = config.max_connections,
            "database connection established"
        );

        Ok(Self { conn })
    }

    /// Ping the database to check connection health.
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .ping()
            .await
            .map_err(|e| Error::Database(format!("ping failed: {}", e)))
    }

    /// Close the database connection.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| Error::Database(format!("failed to close: {}", e)))?;
        tracing::info!("database connection closed");
        Ok(())
    }

    pub fn as_ref(&self) -> &SeaOrmConnection {
        &self.conn
    }
}
