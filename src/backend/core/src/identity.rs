//! Plugin coordinates.
//!
//! A coordinate names one code-generation plugin as `<group>/<name>:<version>`,
//! e.g. `protobuf/go:v1.36.9`. The version may be the literal `latest`, which
//! the catalog resolves to the newest stored record for the group and name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Version token that asks the catalog for the newest record.
pub const LATEST: &str = "latest";

// ═══════════════════════════════════════════════════════════════════════════════
// Identity Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid plugin name: {raw}")]
    Invalid { raw: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Plugin Coordinate
// ═══════════════════════════════════════════════════════════════════════════════

/// The (group, name, version) triple identifying a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginCoordinate {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl PluginCoordinate {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse `<group>/<name>:<version>`.
    ///
    /// Exactly one `/` must separate the group from the rest, and exactly one
    /// `:` must separate the name from the version. Empty segments are
    /// rejected; character sets are not checked.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let invalid = || IdentityError::Invalid {
            raw: raw.to_string(),
        };

        let mut parts = raw.split('/');
        let (group, rest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(group), Some(rest), None) => (group, rest),
            _ => return Err(invalid()),
        };

        let mut parts = rest.split(':');
        let (name, version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(version), None) => (name, version),
            _ => return Err(invalid()),
        };

        if group.is_empty() || name.is_empty() || version.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(group, name, version))
    }

    /// Whether this coordinate asks for the newest record.
    pub fn is_latest(&self) -> bool {
        self.version == LATEST
    }
}

impl fmt::Display for PluginCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.group, self.name, self.version)
    }
}

impl FromStr for PluginCoordinate {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
