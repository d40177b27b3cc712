//! # Protogen Core
//!
//! Sandboxed execution of protobuf code-generation plugins.
//!
//! ## Architecture
//!
//! - **Identity**: parses `<group>/<name>:<version>` plugin coordinates
//! - **Catalog**: plugin records with exact and `latest` resolution (PostgreSQL or in-memory)
//! - **Sandbox**: hardened container invocations speaking `CodeGeneratorRequest`/`CodeGeneratorResponse` over stdio
//! - **Orchestrator**: parse → resolve → execute → record, with cancellation
//! - **Telemetry**: structured logging and a Prometheus generation counter

pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod sandbox;
pub mod telemetry;

pub use error::{ErrorCode, ErrorSeverity, GenerateError, OperationContext, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{
        CatalogError, InMemoryCatalog, PgCatalog, PluginCatalog, PluginFilter, PluginInfo,
        PluginRecord,
    };
    pub use crate::config::{Config, DatabaseConfig, SandboxSettings};
    pub use crate::error::{ErrorCode, GenerateError, OperationContext, Result};
    pub use crate::identity::{IdentityError, PluginCoordinate, LATEST};
    pub use crate::orchestrator::GenerationOrchestrator;
    pub use crate::sandbox::protocol::{CodeGeneratorRequest, CodeGeneratorResponse};
    pub use crate::sandbox::{
        ContainerExecutor, ContainerInvocation, ExecutionError, PluginExecutor, SandboxConfig,
    };
    pub use crate::telemetry::{MetricsSink, PrometheusMetrics};
}
