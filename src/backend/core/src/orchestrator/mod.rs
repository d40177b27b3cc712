//! Generation orchestrator.
//!
//! Composes the pipeline for one request:
//! parse identity → catalog lookup → sandbox execute → metrics record.
//! Each step short-circuits the rest; nothing is retried and no partial
//! result is returned. Request and response stay serialized bytes the whole
//! way through. The catalog, executor and metrics sink are injected,
//! so tests can swap any of them for a fake.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::catalog::{PluginCatalog, PluginFilter, PluginInfo, PluginRecord};
use crate::error::{GenerateError, OperationContext, Result};
use crate::identity::PluginCoordinate;
use crate::sandbox::PluginExecutor;
use crate::telemetry::MetricsSink;

/// Runs code-generation plugins on behalf of callers.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    catalog: Arc<dyn PluginCatalog>,
    executor: Arc<dyn PluginExecutor>,
    metrics: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator").finish_non_exhaustive()
    }
}

impl GenerationOrchestrator {
    pub fn new(
        catalog: Arc<dyn PluginCatalog>,
        executor: Arc<dyn PluginExecutor>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            catalog,
            executor,
            metrics,
        }
    }

    /// Run the plugin named by `plugin_name` against the serialized
    /// `request` and return its serialized response.
    ///
    /// Cancelling `cancel` abandons an in-flight catalog lookup and tears
    /// down a running sandbox; a cancelled request never records a metric.
    #[instrument(skip_all, fields(plugin = %plugin_name))]
    pub async fn generate(
        &self,
        plugin_name: &str,
        request: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let started = Instant::now();
        let result = self.run_pipeline(plugin_name, request, cancel).await;

        match &result {
            Ok(response) => info!(
                bytes = response.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Code generated"
            ),
            Err(err) => err.log(),
        }
        result
    }

    async fn run_pipeline(
        &self,
        plugin_name: &str,
        request: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let record = self.resolve_with_cancel(plugin_name, cancel).await?;

        let response = self
            .executor
            .execute(&record, request, cancel)
            .await
            .during("sandbox.execute")?;

        self.metrics
            .generate_code(&record.info())
            .await
            .during("metrics.record")?;

        Ok(response)
    }

    /// Parse `plugin_name` and resolve it to a catalog record.
    pub async fn resolve(&self, plugin_name: &str) -> Result<PluginRecord> {
        self.resolve_with_cancel(plugin_name, &CancellationToken::new())
            .await
    }

    async fn resolve_with_cancel(
        &self,
        plugin_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PluginRecord> {
        let coordinate = PluginCoordinate::parse(plugin_name).during("identity.parse")?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerateError::cancelled("catalog.get")),
            record = self.catalog.get(&coordinate) => record.during("catalog.get"),
        }
    }

    /// Summaries of every catalog record matching `filter`.
    pub async fn list_plugins(&self, filter: &PluginFilter) -> Result<Vec<PluginInfo>> {
        self.catalog.list(filter).await.during("catalog.list")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, InMemoryCatalog};
    use crate::error::ErrorCode;
    use crate::sandbox::{ExecutionError, SandboxConfig};
    use crate::telemetry::MetricsError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct EchoExecutor;

    #[async_trait]
    impl PluginExecutor for EchoExecutor {
        async fn execute(
            &self,
            _record: &PluginRecord,
            request: &[u8],
            _cancel: &CancellationToken,
        ) -> std::result::Result<Vec<u8>, ExecutionError> {
            Ok(request.to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    #[async_trait]
    impl MetricsSink for RecordingSink {
        async fn generate_code(&self, info: &PluginInfo) -> std::result::Result<(), MetricsError> {
            self.0.lock().unwrap().push(info.coordinate().to_string());
            Ok(())
        }
    }

    async fn orchestrator(sink: Arc<RecordingSink>) -> GenerationOrchestrator {
        let catalog = InMemoryCatalog::new();
        catalog
            .insert(PluginRecord {
                id: Uuid::new_v4(),
                coordinate: PluginCoordinate::new("acme", "go", "v1.0.0"),
                sandbox: SandboxConfig::default(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        GenerationOrchestrator::new(Arc::new(catalog), Arc::new(EchoExecutor), sink)
    }

    #[tokio::test]
    async fn test_generate_records_one_event() {
        let sink = Arc::new(RecordingSink::default());
        let orch = orchestrator(sink.clone()).await;
        let request = b"\x12\x15paths=source_relative";

        let response = orch
            .generate("acme/go:latest", request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response, request);
        assert_eq!(*sink.0.lock().unwrap(), vec!["acme/go:v1.0.0".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_identity_short_circuits() {
        let sink = Arc::new(RecordingSink::default());
        let orch = orchestrator(sink.clone()).await;

        let err = orch
            .generate("acme-go", &[], &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidIdentity);
        assert_eq!(err.operation(), "identity.parse");
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let orch = orchestrator(Arc::new(RecordingSink::default())).await;
        let err = orch.resolve("acme/rust:v1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.operation(), "catalog.get");
        assert!(err.source_as::<CatalogError>().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_lookup() {
        let sink = Arc::new(RecordingSink::default());
        let orch = orchestrator(sink.clone()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orch
            .generate("acme/go:v1.0.0", &[], &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Cancelled);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_plugins_passes_filter_through() {
        let orch = orchestrator(Arc::new(RecordingSink::default())).await;
        let all = orch.list_plugins(&PluginFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);

        let none = orch
            .list_plugins(&PluginFilter {
                group: Some("other".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
