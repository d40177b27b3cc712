//! Plugin execution sandbox.
//!
//! Every plugin runs as a fresh, auto-removed container. The stored
//! [`SandboxConfig`] may pick *which* limits apply (network mode, memory,
//! CPU, user, ...) but never removes them: an empty config means no network,
//! 128 MiB of memory and one CPU.
//!
//! - [`command`] turns a config into a concrete container invocation.
//! - [`executor`] runs that invocation with the request on stdin.
//! - [`protocol`] checks the `CodeGeneratorRequest` / `CodeGeneratorResponse` framing.

pub mod command;
pub mod executor;
pub mod protocol;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use command::{image_reference, ContainerInvocation};
pub use executor::{ContainerExecutor, ExecutionError, PluginExecutor};

/// Network mode used when the config does not name one.
pub const DEFAULT_NETWORK: &str = "none";
/// Memory ceiling used when the config does not name one.
pub const DEFAULT_MEMORY: &str = "128m";
/// CPU ceiling used when the config does not name one.
pub const DEFAULT_CPUS: &str = "1.0";

// ═══════════════════════════════════════════════════════════════════════════════
// Sandbox Config
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-plugin container settings, as stored in the catalog.
///
/// Empty strings are treated the same as absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,

    /// Environment variables passed into the container.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// tmpfs mounts, path -> mount options (may be empty).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tmpfs: BTreeMap<String, String>,
}

impl SandboxConfig {
    pub fn network(&self) -> &str {
        non_empty(&self.network).unwrap_or(DEFAULT_NETWORK)
    }

    pub fn memory(&self) -> &str {
        non_empty(&self.memory).unwrap_or(DEFAULT_MEMORY)
    }

    pub fn cpus(&self) -> &str {
        non_empty(&self.cpus).unwrap_or(DEFAULT_CPUS)
    }

    pub fn user(&self) -> Option<&str> {
        non_empty(&self.user)
    }

    pub fn working_dir(&self) -> Option<&str> {
        non_empty(&self.working_dir)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// The configuration document stored alongside each catalog record.
///
/// Container settings live under the `docker` key; other keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<SandboxConfig>,
}

impl PluginConfig {
    /// The sandbox settings, falling back to defaults when absent.
    pub fn into_sandbox(self) -> SandboxConfig {
        self.docker.unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.network(), "none");
        assert_eq!(config.memory(), "128m");
        assert_eq!(config.cpus(), "1.0");
        assert!(config.user().is_none());
        assert!(config.working_dir().is_none());
        assert!(!config.read_only);
    }

    #[test]
    fn test_empty_strings_fall_back_to_defaults() {
        let config = SandboxConfig {
            network: Some(String::new()),
            user: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.network(), "none");
        assert!(config.user().is_none());
    }

    #[test]
    fn test_document_shape() {
        let doc = serde_json::json!({
            "docker": {
                "network": "bridge",
                "memory": "256m",
                "read_only": true,
                "env": {"GOFLAGS": "-mod=mod"},
                "tmpfs": {"/tmp": "rw,size=64m", "/cache": ""}
            },
            "monitoring": {"ignored": true}
        });
        let config: PluginConfig = serde_json::from_value(doc).unwrap();
        let sandbox = config.into_sandbox();
        assert_eq!(sandbox.network(), "bridge");
        assert_eq!(sandbox.memory(), "256m");
        assert_eq!(sandbox.cpus(), "1.0");
        assert!(sandbox.read_only);
        assert_eq!(sandbox.env.get("GOFLAGS").map(String::as_str), Some("-mod=mod"));
        assert_eq!(sandbox.tmpfs.len(), 2);
    }

    #[test]
    fn test_missing_docker_key_means_defaults() {
        let config: PluginConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.into_sandbox(), SandboxConfig::default());
    }
}
