//! Postgres pool backed by sqlx.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde_json::json;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseSettings;
use crate::database::Database;
use crate::dependencies::Readiness;
use crate::error::BoxError;

/// Process-wide Postgres pool.
pub struct PgDatabase {
    settings: DatabaseSettings,
    pool: ArcSwapOption<PgPool>,
}

impl PgDatabase {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            pool: ArcSwapOption::empty(),
        }
    }

    fn current(&self) -> Result<Arc<PgPool>, BoxError> {
        self.pool
            .load_full()
            .ok_or_else(|| "database pool has not been warmed".into())
    }

    fn pool_detail(&self, pool: &PgPool) -> serde_json::Value {
        json!({
            "url": mask_database_url(&self.settings.url),
            "size": pool.size(),
            "idle": pool.num_idle(),
        })
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn warm_connections(&self) -> Result<Readiness, BoxError> {
        if !self.settings.enabled {
            return Ok(Readiness::Disabled(json!({ "disabled": true })));
        }

        let pool = match self.pool.load_full() {
            Some(pool) if !pool.is_closed() => pool,
            _ => {
                tracing::info!(url = %mask_database_url(&self.settings.url), "Connecting to database");
                let pool = PgPoolOptions::new()
                    .max_connections(self.settings.max_connections)
                    .min_connections(self.settings.min_connections)
                    .acquire_timeout(Duration::from_millis(self.settings.acquire_timeout_ms))
                    .connect(&self.settings.url)
                    .await?;
                let pool = Arc::new(pool);
                self.pool.store(Some(Arc::clone(&pool)));
                pool
            }
        };

        sqlx::query("SELECT 1").execute(pool.as_ref()).await?;
        Ok(Readiness::Ready(self.pool_detail(&pool)))
    }

    async fn bootstrap(&self) -> Result<Readiness, BoxError> {
        if !self.settings.enabled {
            return Ok(Readiness::Disabled(json!({ "disabled": true })));
        }

        let pool = self.current()?;
        sqlx::query("SELECT 1").execute(pool.as_ref()).await?;

        if self.settings.verify_migrations {
            let failed: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = false")
                    .fetch_one(pool.as_ref())
                    .await?;
            if failed > 0 {
                return Err(format!("{} database migration(s) recorded as failed", failed).into());
            }
        }

        Ok(Readiness::Ready(self.pool_detail(&pool)))
    }

    async fn drain_connections(&self) -> Result<(), BoxError> {
        if let Some(pool) = self.pool.load_full() {
            pool.close().await;
            tracing::info!("Database connections drained");
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        if let Some(pool) = self.pool.swap(None) {
            if !pool.is_closed() {
                pool.close().await;
            }
            tracing::info!("Database pool released");
        }
        Ok(())
    }
}

/// Hide the password part of a connection URL for logging.
pub fn mask_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{}://{}:***@{}", scheme, user, host)
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_password() {
        assert_eq!(
            mask_database_url("postgres://app:s3cret@db:5432/marketplace"),
            "postgres://app:***@db:5432/marketplace"
        );
        assert_eq!(mask_database_url("postgres://db/marketplace"), "postgres://db/marketplace");
    }

    #[tokio::test]
    async fn disabled_database_skips_connecting() {
        let db = PgDatabase::new(DatabaseSettings::default());
        assert!(matches!(db.warm_connections().await.unwrap(), Readiness::Disabled(_)));
        assert!(matches!(db.bootstrap().await.unwrap(), Readiness::Disabled(_)));
        db.drain_connections().await.unwrap();
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn bootstrap_requires_warm_pool() {
        let db = PgDatabase::new(DatabaseSettings {
            enabled: true,
            url: "postgres://app@127.0.0.1:1/marketplace".into(),
            ..DatabaseSettings::default()
        });
        assert!(db.bootstrap().await.is_err());
    }
}
