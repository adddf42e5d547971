use crate::auth::JwtService;
use crate::config::AppConfig;
use anyhow::{Context, Result};
use database_layer::{DatabasePool, PgPharmacyStore, PharmacyStore};
use std::sync::Arc;
use std::time::Instant;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct PharmacyServer {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn PharmacyStore>,
    pub tokens: Arc<JwtService>,
    pub started_at: Instant,
}

impl PharmacyServer {
    /// Connect to Postgres, apply migrations when enabled, and build the state.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let pool = DatabasePool::new(&config.database.url, &config.database.pool_settings())
            .await
            .context("failed to connect to database")?;

        if config.database.run_migrations {
            pool.run_migrations()
                .await
                .context("failed to apply database migrations")?;
            tracing::info!("Database migrations applied");
        }

        Ok(Self::with_store(config, Arc::new(PgPharmacyStore::new(pool))))
    }

    /// Build the state around an existing store.
    pub fn with_store(config: AppConfig, store: Arc<dyn PharmacyStore>) -> Self {
        let tokens = Arc::new(JwtService::new(&config.auth));
        Self {
            config: Arc::new(config),
            store,
            tokens,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl std::fmt::Debug for PharmacyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PharmacyServer")
            .field("tokens", &self.tokens)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
