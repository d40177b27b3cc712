//! In-memory plugin catalog.
//!
//! Backed by a `Vec` behind a `tokio::sync::RwLock`; listing preserves
//! insertion order. Can be seeded from a JSON file holding an array of rows
//! shaped like the `plugins` table.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::{
    select_latest, CatalogError, PluginCatalog, PluginFilter, PluginInfo, PluginRecord, PluginRow,
};
use crate::identity::PluginCoordinate;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    records: Arc<RwLock<Vec<PluginRecord>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from `records`, rejecting duplicate coordinates.
    pub async fn from_records(
        records: impl IntoIterator<Item = PluginRecord>,
    ) -> Result<Self, CatalogError> {
        let catalog = Self::new();
        for record in records {
            catalog.insert(record).await?;
        }
        Ok(catalog)
    }

    /// Load a JSON array of rows:
    ///
    /// ```json
    /// [{"group_name": "acme", "name": "go", "version": "v1.0.0",
    ///   "created_at": "2024-01-01T00:00:00Z",
    ///   "config": {"docker": {"memory": "256m"}}}]
    /// ```
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| CatalogError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let rows: Vec<PluginRow> =
            serde_json::from_slice(&bytes).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let records = rows
            .into_iter()
            .map(PluginRow::into_record)
            .collect::<Result<Vec<_>, _>>()?;
        let catalog = Self::from_records(records).await?;
        info!(path = %path.display(), count = catalog.len().await, "Loaded plugin catalog");
        Ok(catalog)
    }

    /// Add a record. Fails if its exact coordinate is already present.
    pub async fn insert(&self, record: PluginRecord) -> Result<(), CatalogError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.coordinate == record.coordinate) {
            return Err(CatalogError::Duplicate {
                coordinate: record.coordinate.to_string(),
            });
        }
        records.push(record);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PluginCatalog for InMemoryCatalog {
    async fn get(&self, coordinate: &PluginCoordinate) -> Result<PluginRecord, CatalogError> {
        let records = self.records.read().await;

        let found = if coordinate.is_latest() {
            select_latest(records.iter().filter(|r| {
                r.coordinate.group == coordinate.group && r.coordinate.name == coordinate.name
            }))
        } else {
            records.iter().find(|r| &r.coordinate == coordinate)
        };

        found.cloned().ok_or_else(|| CatalogError::NotFound {
            coordinate: coordinate.to_string(),
        })
    }

    async fn list(&self, filter: &PluginFilter) -> Result<Vec<PluginInfo>, CatalogError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| filter.matches(&r.coordinate))
            .map(PluginRecord::info)
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxConfig;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use uuid::Uuid;

    fn record(group: &str, name: &str, version: &str, secs: i64) -> PluginRecord {
        PluginRecord {
            id: Uuid::new_v4(),
            coordinate: PluginCoordinate::new(group, name, version),
            sandbox: SandboxConfig::default(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    async fn seeded() -> InMemoryCatalog {
        InMemoryCatalog::from_records([
            record("acme", "go", "v1.0.0", 100),
            record("acme", "go", "v1.1.0", 300),
            record("acme", "go", "v0.9.9", 200),
            record("acme", "python", "v3.0.0", 50),
            record("grpc", "go", "v1.5.0", 400),
        ])
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_exact_lookup() {
        let catalog = seeded().await;
        let c = PluginCoordinate::new("acme", "go", "v1.0.0");
        assert_eq!(catalog.get(&c).await.unwrap().coordinate, c);
    }

    #[tokio::test]
    async fn test_latest_lookup_uses_created_at() {
        let catalog = seeded().await;
        let c = PluginCoordinate::parse("acme/go:latest").unwrap();
        assert_eq!(catalog.get(&c).await.unwrap().coordinate.version, "v1.1.0");
    }

    #[tokio::test]
    async fn test_not_found() {
        let catalog = seeded().await;
        for raw in ["acme/go:v2.0.0", "acme/rust:latest", "nobody/go:v1.0.0"] {
            let c = PluginCoordinate::parse(raw).unwrap();
            assert!(matches!(
                catalog.get(&c).await,
                Err(CatalogError::NotFound { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let catalog = seeded().await;
        let err = catalog
            .insert(record("acme", "go", "v1.0.0", 999))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate { .. }));
        assert_eq!(catalog.len().await, 5);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let catalog = seeded().await;

        let all = catalog.list(&PluginFilter::default()).await.unwrap();
        assert_eq!(all.len(), 5);

        let filter = PluginFilter {
            group: Some("acme".into()),
            name: Some("go".into()),
            ..Default::default()
        };
        let versions: Vec<_> = catalog
            .list(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.version)
            .collect();
        assert_eq!(versions, ["v1.0.0", "v1.1.0", "v0.9.9"]);

        let filter = PluginFilter {
            name: Some("go".into()),
            version: Some("v1.5.0".into()),
            ..Default::default()
        };
        let found = catalog.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].group, "grpc");
    }

    #[tokio::test]
    async fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"group_name": "acme", "name": "go", "version": "v1.0.0",
                  "created_at": "2024-01-01T00:00:00Z"}},
                {{"group": "acme", "name": "go", "version": "v1.1.0",
                  "created_at": "2024-02-01T00:00:00Z",
                  "config": {{"docker": {{"network": "bridge"}}}}}}
            ]"#
        )
        .unwrap();

        let catalog = InMemoryCatalog::from_json_file(file.path()).await.unwrap();
        assert_eq!(catalog.len().await, 2);

        let latest = catalog
            .get(&PluginCoordinate::parse("acme/go:latest").unwrap())
            .await
            .unwrap();
        assert_eq!(latest.coordinate.version, "v1.1.0");
        assert_eq!(latest.sandbox.network(), "bridge");
    }

    #[tokio::test]
    async fn test_latest_tie_is_stable_across_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"group": "acme", "name": "go", "version": "v1",
                  "created_at": "2024-01-01T00:00:00Z"}},
                {{"group": "acme", "name": "go", "version": "v2",
                  "created_at": "2024-01-01T00:00:00Z"}}
            ]"#
        )
        .unwrap();

        let latest = PluginCoordinate::parse("acme/go:latest").unwrap();
        let mut versions = std::collections::BTreeSet::new();
        for _ in 0..20 {
            let catalog = InMemoryCatalog::from_json_file(file.path()).await.unwrap();
            versions.insert(catalog.get(&latest).await.unwrap().coordinate.version);
        }
        assert_eq!(versions.len(), 1, "latest resolved to {versions:?}");
    }

    #[tokio::test]
    async fn test_from_missing_file() {
        let err = InMemoryCatalog::from_json_file("/nonexistent/catalog.json")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }
}
