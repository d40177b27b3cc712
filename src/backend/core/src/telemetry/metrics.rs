//! Generation metrics.
//!
//! The orchestrator reports one event per successful generation through the
//! [`MetricsSink`] it was constructed with. [`PrometheusMetrics`] owns a
//! private Prometheus recorder; nothing is installed as the process-global
//! recorder, so several sinks can coexist (e.g. one per test).
//!
//! # Example
//!
//! ```rust,no_run
//! use protogen_core::telemetry::{MetricsConfig, PrometheusMetrics};
//!
//! let metrics = PrometheusMetrics::new(&MetricsConfig::default());
//! println!("{}", metrics.render());
//! ```

use async_trait::async_trait;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use serde::{Deserialize, Serialize};

use crate::catalog::PluginInfo;

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to record metric `{metric}`: {reason}")]
    Record { metric: String, reason: String },
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prefix for every metric name
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    "protogen".to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Metrics Sink
// ═══════════════════════════════════════════════════════════════════════════════

/// Receives one event per successful code generation.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn generate_code(&self, info: &PluginInfo) -> Result<(), MetricsError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Prometheus
// ═══════════════════════════════════════════════════════════════════════════════

/// Counts `<namespace>_generated_plugin_code_total{plugin="<group>/<name>:<version>"}`.
pub struct PrometheusMetrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    generated: String,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("generated", &self.generated)
            .finish()
    }
}

impl PrometheusMetrics {
    pub fn new(config: &MetricsConfig) -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let generated = format!("{}_generated_plugin_code_total", config.namespace);

        metrics::with_local_recorder(&recorder, || {
            describe_counter!(
                generated.clone(),
                "Total number of generated code requests by plugin."
            );
        });

        Self {
            recorder,
            handle,
            generated,
        }
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl MetricsSink for PrometheusMetrics {
    async fn generate_code(&self, info: &PluginInfo) -> Result<(), MetricsError> {
        let plugin = info.coordinate().to_string();
        metrics::with_local_recorder(&self.recorder, || {
            counter!(self.generated.clone(), "plugin" => plugin).increment(1);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn info(version: &str) -> PluginInfo {
        PluginInfo {
            id: Uuid::new_v4(),
            group: "acme".into(),
            name: "go".into(),
            version: version.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_counts_per_plugin() {
        let metrics = PrometheusMetrics::new(&MetricsConfig::default());
        metrics.generate_code(&info("v1.0.0")).await.unwrap();
        metrics.generate_code(&info("v1.0.0")).await.unwrap();
        metrics.generate_code(&info("v2.0.0")).await.unwrap();

        let rendered = metrics.render();
        assert!(rendered.contains(r#"protogen_generated_plugin_code_total{plugin="acme/go:v1.0.0"} 2"#));
        assert!(rendered.contains(r#"protogen_generated_plugin_code_total{plugin="acme/go:v2.0.0"} 1"#));
    }

    #[tokio::test]
    async fn test_sinks_are_independent() {
        let a = PrometheusMetrics::new(&MetricsConfig {
            namespace: "a".into(),
        });
        let b = PrometheusMetrics::new(&MetricsConfig {
            namespace: "b".into(),
        });
        a.generate_code(&info("v1")).await.unwrap();

        assert!(a.render().contains("a_generated_plugin_code_total"));
        assert!(!b.render().contains("generated_plugin_code_total{"));
    }
}
