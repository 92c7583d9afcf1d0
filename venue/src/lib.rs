//! Venue fulfillment application.
//!
//! Wires the fulfillment engine to `PostgreSQL` and Prometheus from environment
//! configuration:
//!
//! ```rust,ignore
//! let config = Config::from_env();
//! let app = VenueApp::new(config).await?;
//! let receipt = app.engine().pay_order(order_id, None).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;

pub use config::{Config, CredentialConfig, DEFAULT_LOG_FILTER, PostgresConfig, ServerConfig};

use fulfillment_core::environment::SystemClock;
use fulfillment_core::error::StoreError;
use fulfillment_engine::metrics::{MetricsError, MetricsServer};
use fulfillment_engine::{ConfigError, FulfillmentEngine};
use fulfillment_postgres::PostgresStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while bootstrapping the application.
#[derive(Error, Debug)]
pub enum VenueError {
    /// Configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection or migration failed
    #[error("Database setup failed: {0}")]
    Database(#[from] sqlx::Error),

    /// Store rejected the setup
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Metrics exporter failed to install
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Engine backed by `PostgreSQL`.
pub type VenueEngine = FulfillmentEngine<PostgresStore>;

/// Running application: configured engine plus metrics exporter.
pub struct VenueApp {
    config: Config,
    engine: Arc<VenueEngine>,
    metrics: MetricsServer,
}

impl VenueApp {
    /// Connect, migrate and assemble the engine.
    ///
    /// # Errors
    ///
    /// Returns [`VenueError`] if configuration is invalid, the database is unreachable,
    /// migrations fail or the metrics recorder cannot be installed.
    pub async fn new(config: Config) -> Result<Self, VenueError> {
        let engine_config = config.engine_config()?;
        let metrics_addr = config.metrics_addr()?;

        info!(max_connections = config.postgres.max_connections, "Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(config.postgres.max_connections)
            .min_connections(config.postgres.min_connections)
            .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
            .idle_timeout(Duration::from_secs(config.postgres.idle_timeout))
            .connect(&config.postgres.url)
            .await?;

        let store = PostgresStore::from_pool(pool)
            .with_lock_timeout(Duration::from_millis(config.postgres.lock_timeout_ms));

        info!("Running migrations...");
        store.migrate().await?;

        let mut metrics = MetricsServer::new(metrics_addr);
        metrics.start()?;

        let verify_signatures = engine_config.verify_signatures;
        let default_ttl_secs = engine_config
            .default_credential_ttl
            .map(|ttl| ttl.num_seconds());
        let engine = FulfillmentEngine::new(store, Arc::new(SystemClock), engine_config)?;
        info!(verify_signatures, ?default_ttl_secs, "Fulfillment engine ready");

        Ok(Self {
            config,
            engine: Arc::new(engine),
            metrics,
        })
    }

    /// Shared engine handle
    #[must_use]
    pub fn engine(&self) -> Arc<VenueEngine> {
        Arc::clone(&self.engine)
    }

    /// Loaded configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Current metrics in Prometheus text format
    #[must_use]
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.render()
    }
}

/// Install the `tracing` subscriber with an `EnvFilter` and the `fmt` layer.
///
/// `filter` is an `EnvFilter` directive such as [`ServerConfig::log_level`]; an
/// unparseable directive falls back to [`DEFAULT_LOG_FILTER`].
pub fn init_tracing(filter: &str) {
    let (env_filter, rejected) = match tracing_subscriber::EnvFilter::try_new(filter) {
        Ok(env_filter) => (env_filter, None),
        Err(e) => (tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER), Some(e)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(error) = rejected {
        tracing::warn!(filter, %error, "Invalid log filter, using default");
    }
}
