//! # Plugin Catalog
//!
//! Durable store of plugin records: coordinate, sandbox configuration and
//! creation time. Records are written by an external publishing process and
//! are read-only here.
//!
//! ## Resolution
//!
//! - An exact version matches at most one record (coordinates are unique).
//! - `latest` picks the record with the greatest `created_at` among those
//!   sharing the group and name. Ties go to the greatest record id, so the
//!   answer is always exactly one record or [`CatalogError::NotFound`].
//!
//! Two backends share this contract: [`PgCatalog`] (PostgreSQL via sqlx) and
//! [`InMemoryCatalog`].

pub mod memory;
pub mod postgres;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::PluginCoordinate;
use crate::sandbox::{PluginConfig, SandboxConfig};

pub use memory::InMemoryCatalog;
pub use postgres::PgCatalog;

// ═══════════════════════════════════════════════════════════════════════════════
// Catalog Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("plugin not found: {coordinate}")]
    NotFound { coordinate: String },

    #[error("plugin already registered: {coordinate}")]
    Duplicate { coordinate: String },

    #[error("invalid sandbox config for {coordinate}: {source}")]
    InvalidConfig {
        coordinate: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("failed to read catalog file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════════════

/// A stored plugin, never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub id: Uuid,
    pub coordinate: PluginCoordinate,
    pub sandbox: SandboxConfig,
    pub created_at: DateTime<Utc>,
}

impl PluginRecord {
    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            id: self.id,
            group: self.coordinate.group.clone(),
            name: self.coordinate.name.clone(),
            version: self.coordinate.version.clone(),
            created_at: self.created_at,
        }
    }
}

/// Summary of a plugin record, as listed and as reported to metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: Uuid,
    pub group: String,
    pub name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
}

impl PluginInfo {
    pub fn coordinate(&self) -> PluginCoordinate {
        PluginCoordinate::new(&self.group, &self.name, &self.version)
    }
}

/// Equality filter for [`PluginCatalog::list`]; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFilter {
    pub group: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
}

impl PluginFilter {
    pub fn matches(&self, coordinate: &PluginCoordinate) -> bool {
        fn field(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |w| w == have)
        }
        field(&self.group, &coordinate.group)
            && field(&self.name, &coordinate.name)
            && field(&self.version, &coordinate.version)
    }
}

/// Id for a record stored without one: a UUIDv5 of its coordinate, stable
/// across loads.
pub fn derived_id(coordinate: &PluginCoordinate) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("protogen:plugin/{coordinate}").as_bytes())
}

/// Storage row shared by both backends. `config` is the raw JSON document.
#[derive(Debug, Clone, sqlx::FromRow, Deserialize)]
pub(crate) struct PluginRow {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(alias = "group")]
    pub group_name: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl PluginRow {
    pub fn into_record(self) -> Result<PluginRecord, CatalogError> {
        let coordinate = PluginCoordinate::new(self.group_name, self.name, self.version);
        let sandbox = match self.config {
            None | Some(serde_json::Value::Null) => SandboxConfig::default(),
            Some(doc) => serde_json::from_value::<PluginConfig>(doc)
                .map_err(|source| CatalogError::InvalidConfig {
                    coordinate: coordinate.to_string(),
                    source,
                })?
                .into_sandbox(),
        };
        Ok(PluginRecord {
            id: self.id.unwrap_or_else(|| derived_id(&coordinate)),
            coordinate,
            sandbox,
            created_at: self.created_at,
        })
    }
}

/// The newest record by `created_at`, ties broken by the greatest id.
pub fn select_latest<'a, I>(records: I) -> Option<&'a PluginRecord>
where
    I: IntoIterator<Item = &'a PluginRecord>,
{
    records
        .into_iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Catalog Trait
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait PluginCatalog: Send + Sync {
    /// Resolve a coordinate (exact or `latest`) to one record.
    async fn get(&self, coordinate: &PluginCoordinate) -> Result<PluginRecord, CatalogError>;

    /// Summaries of every record matching `filter`. Order is stable for a
    /// fixed catalog but otherwise unspecified.
    async fn list(&self, filter: &PluginFilter) -> Result<Vec<PluginInfo>, CatalogError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
