//! Subcommands and the state they share.

pub mod config;
pub mod generate;
pub mod plugins;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use protogen_core::catalog::{InMemoryCatalog, PgCatalog, PluginCatalog};
use protogen_core::config::Config;
use protogen_core::orchestrator::GenerationOrchestrator;
use protogen_core::sandbox::ContainerExecutor;
use protogen_core::telemetry::PrometheusMetrics;
use tracing::debug;

/// Everything a subcommand needs, resolved from flags and configuration.
pub struct Context {
    pub config: Config,
    pub catalog_file: Option<PathBuf>,
}

/// A wired-up orchestrator plus handles the commands inspect directly.
pub struct Runtime {
    pub orchestrator: GenerationOrchestrator,
    pub executor: Arc<ContainerExecutor>,
    pub metrics: Arc<PrometheusMetrics>,
}

impl Context {
    /// Open the plugin catalog: the JSON file if one was given, otherwise the
    /// configured database.
    pub async fn catalog(&self) -> Result<Arc<dyn PluginCatalog>> {
        match &self.catalog_file {
            Some(path) => {
                debug!(path = %path.display(), "Using file catalog");
                let catalog = InMemoryCatalog::from_json_file(path)
                    .await
                    .with_context(|| format!("Failed to load catalog from {}", path.display()))?;
                let catalog: Arc<dyn PluginCatalog> = Arc::new(catalog);
                Ok(catalog)
            }
            None => {
                debug!("Using database catalog");
                let catalog: Arc<dyn PluginCatalog> = Arc::new(self.database().await?);
                Ok(catalog)
            }
        }
    }

    /// Connect to the configured database and check that it answers.
    pub async fn database(&self) -> Result<PgCatalog> {
        let catalog = PgCatalog::connect(&self.config.database)
            .await
            .context("Failed to connect to the plugin database")?;
        catalog
            .ping()
            .await
            .context("Plugin database is not responding")?;
        Ok(catalog)
    }

    pub async fn runtime(&self) -> Result<Runtime> {
        let catalog = self.catalog().await?;
        let executor = Arc::new(ContainerExecutor::new(&self.config.sandbox));
        let metrics = Arc::new(PrometheusMetrics::new(&self.config.metrics));
        let orchestrator = GenerationOrchestrator::new(catalog, executor.clone(), metrics.clone());

        Ok(Runtime {
            orchestrator,
            executor,
            metrics,
        })
    }
}
