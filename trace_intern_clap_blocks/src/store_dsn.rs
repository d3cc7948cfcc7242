//! Dimension-store-DSN-related configs.
use std::{sync::Arc, time::Duration};

use tracing::info;
use trace_intern::store::{
    DimensionStore, StoreError,
    mem::MemDimensionStore,
    postgres::{PostgresConnectionOptions, PostgresDimensionStore},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "Unknown dimension store DSN {dsn}. Expected a string like 'postgresql://postgres@localhost:5432/postgres' or 'memory'"
    )]
    UnknownStoreDsn { dsn: String },

    #[error(
        "Dimension store DSN not specified. Expected a string like 'postgresql://postgres@localhost:5432/postgres' or 'memory'"
    )]
    DsnNotSpecified,

    #[error("A dimension store error occurred: {0}")]
    Store(#[from] StoreError),
}

fn default_max_connections() -> &'static str {
    let s = PostgresConnectionOptions::DEFAULT_MAX_CONNS.to_string();
    Box::leak(Box::new(s))
}

fn default_connect_timeout() -> &'static str {
    let s =
        humantime::format_duration(PostgresConnectionOptions::DEFAULT_CONNECT_TIMEOUT).to_string();
    Box::leak(Box::new(s))
}

fn default_idle_timeout() -> &'static str {
    let s = humantime::format_duration(PostgresConnectionOptions::DEFAULT_IDLE_TIMEOUT).to_string();
    Box::leak(Box::new(s))
}

/// CLI config for the store handing out dimension identifiers.
#[derive(Debug, Clone, clap::Parser)]
pub struct StoreDsnConfig {
    /// Dimension store connection string.
    ///
    /// The dsn determines the type of store used.
    ///
    /// PostgreSQL: `postgresql://postgres@localhost:5432/postgres`
    ///
    /// Memory (ephemeral, only useful for testing): `memory`
    #[clap(long = "store-dsn", env = "TRACE_INTERN_STORE_DSN", action)]
    pub dsn: Option<String>,

    /// Maximum number of connections allowed to the store at any one time.
    #[clap(
        long = "store-max-connections",
        env = "TRACE_INTERN_STORE_MAX_CONNECTIONS",
        default_value = default_max_connections(),
        action,
    )]
    pub max_store_connections: u32,

    /// Schema holding the trace tables and their `put_*` functions.
    #[clap(
        long = "store-postgres-schema-name",
        env = "TRACE_INTERN_STORE_POSTGRES_SCHEMA_NAME",
        default_value = PostgresConnectionOptions::DEFAULT_SCHEMA_NAME,
        action,
    )]
    pub postgres_schema_name: String,

    /// Set the amount of time to attempt connecting to the database.
    #[clap(
        long = "store-connect-timeout",
        env = "TRACE_INTERN_STORE_CONNECT_TIMEOUT",
        default_value = default_connect_timeout(),
        value_parser = humantime::parse_duration,
    )]
    pub connect_timeout: Duration,

    /// Set a maximum idle duration for individual connections.
    #[clap(
        long = "store-idle-timeout",
        env = "TRACE_INTERN_STORE_IDLE_TIMEOUT",
        default_value = default_idle_timeout(),
        value_parser = humantime::parse_duration,
    )]
    pub idle_timeout: Duration,
}

impl StoreDsnConfig {
    /// Postgres connection options for `dsn`.
    pub fn connection_options(&self, app_name: &str, dsn: &str) -> PostgresConnectionOptions {
        PostgresConnectionOptions {
            app_name: app_name.to_string(),
            schema_name: self.postgres_schema_name.clone(),
            dsn: dsn.to_string(),
            max_conns: self.max_store_connections,
            connect_timeout: self.connect_timeout,
            idle_timeout: self.idle_timeout,
        }
    }

    /// Get config-dependent store.
    pub async fn get_store(&self, app_name: &str) -> Result<Arc<dyn DimensionStore>, Error> {
        let Some(dsn) = self.dsn.as_ref() else {
            return Err(Error::DsnNotSpecified);
        };

        if dsn.starts_with("postgres") {
            // do not log entire postgres dsn as it may contain credentials
            info!(postgres_schema_name=%self.postgres_schema_name, "Dimension store: Postgres");
            let options = self.connection_options(app_name, dsn);
            Ok(Arc::new(PostgresDimensionStore::connect(&options).await?))
        } else if dsn == "memory" {
            info!("Dimension store: In-memory");
            Ok(Arc::new(MemDimensionStore::new()))
        } else {
            Err(Error::UnknownStoreDsn { dsn: dsn.clone() })
        }
    }
}
