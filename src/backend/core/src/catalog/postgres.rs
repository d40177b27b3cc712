//! PostgreSQL plugin catalog.
//!
//! Reads the `plugins` table (see `migrations/`). Queries are plain runtime
//! queries; dropping an in-flight future abandons the query.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info};

use super::{CatalogError, PluginCatalog, PluginFilter, PluginInfo, PluginRecord, PluginRow};
use crate::config::DatabaseConfig;
use crate::identity::PluginCoordinate;

const SELECT_EXACT: &str = r#"
    SELECT id, group_name, name, version, config, created_at
    FROM plugins
    WHERE group_name = $1 AND name = $2 AND version = $3
"#;

const SELECT_LATEST: &str = r#"
    SELECT id, group_name, name, version, config, created_at
    FROM plugins
    WHERE group_name = $1 AND name = $2
    ORDER BY created_at DESC, id DESC
    LIMIT 1
"#;

const SELECT_FILTERED: &str = r#"
    SELECT id, group_name, name, version, NULL::jsonb AS config, created_at
    FROM plugins
    WHERE ($1::text IS NULL OR group_name = $1)
      AND ($2::text IS NULL OR name = $2)
      AND ($3::text IS NULL OR version = $3)
    ORDER BY group_name, name, created_at, id
"#;

/// Catalog backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Open a connection pool using `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, CatalogError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected to plugin catalog database"
        );
        Ok(Self { pool })
    }

    /// Apply the bundled migrations.
    pub async fn migrate(&self) -> Result<(), CatalogError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(sqlx::Error::Migrate(Box::new(e))))
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), CatalogError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PluginCatalog for PgCatalog {
    async fn get(&self, coordinate: &PluginCoordinate) -> Result<PluginRecord, CatalogError> {
        let row = if coordinate.is_latest() {
            sqlx::query_as::<_, PluginRow>(SELECT_LATEST)
                .bind(&coordinate.group)
                .bind(&coordinate.name)
                .fetch_optional(&self.pool)
                .await?
        } else {
            sqlx::query_as::<_, PluginRow>(SELECT_EXACT)
                .bind(&coordinate.group)
                .bind(&coordinate.name)
                .bind(&coordinate.version)
                .fetch_optional(&self.pool)
                .await?
        };

        let Some(row) = row else {
            debug!(plugin = %coordinate, "No catalog record");
            return Err(CatalogError::NotFound {
                coordinate: coordinate.to_string(),
            });
        };
        row.into_record()
    }

    async fn list(&self, filter: &PluginFilter) -> Result<Vec<PluginInfo>, CatalogError> {
        let rows = sqlx::query_as::<_, PluginRow>(SELECT_FILTERED)
            .bind(filter.group.as_deref())
            .bind(filter.name.as_deref())
            .bind(filter.version.as_deref())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| row.into_record().map(|r| r.info()))
            .collect()
    }
}
