//! Aspect manifest parsing (weft.toml)
//!
//! A manifest declares join points outside of code. Rows apply to every
//! aspected type, or only to the types they list:
//!
//! ```toml
//! [[join]]
//! kind = "before"
//! pointcut = "Shop\\Cart->add*()"
//! advice = "audit\\record"
//!
//! [[join]]
//! kind = "throw"
//! pointcut = "Shop\\*->*()"
//! advice = "Audit\\Log::failure"
//! types = ["Shop\\Cart", "Shop\\Checkout"]
//! ```
//!
//! Manifest rows are added after a type's own registrations and follow
//! the same replacement rule. A manifest never makes a plain type
//! aspected.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advice::{AdviceRef, AdviceRegistry};
use crate::descriptor::PATH_SEPARATOR;
use crate::error::{AspectError, AspectResult};
use crate::join_point::JoinPointKind;
use crate::pointcut::Pointcut;
use crate::proxy::AspectProxy;

/// Default manifest file name
pub const MANIFEST_FILE: &str = "weft.toml";

/// Errors that can occur while loading a manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read manifest file
    #[error("Failed to read manifest file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("Failed to write manifest: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A row is invalid
    #[error("Invalid join #{index}: {source}")]
    InvalidJoin {
        /// Zero-based row index
        index: usize,
        /// Underlying pointcut or advice error
        source: AspectError,
    },
}

/// Aspect manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AspectManifest {
    /// Join point rows
    #[serde(default, rename = "join", skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinEntry>,
}

/// One manifest row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinEntry {
    /// When the advice fires
    pub kind: JoinPointKind,

    /// Pointcut text
    pub pointcut: String,

    /// Advice reference text
    pub advice: String,

    /// Types the row applies to; empty means every aspected type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
}

impl JoinEntry {
    /// Whether this row applies to a type
    pub fn applies_to(&self, type_name: &str) -> bool {
        let type_name = type_name.trim_start_matches(PATH_SEPARATOR);
        self.types.is_empty()
            || self
                .types
                .iter()
                .any(|t| t.trim_start_matches(PATH_SEPARATOR) == type_name)
    }

    /// Parse the pointcut and advice reference
    pub fn parse(&self) -> AspectResult<(Pointcut, AdviceRef)> {
        Ok((Pointcut::parse(&self.pointcut)?, AdviceRef::parse(&self.advice)?))
    }
}

impl AspectManifest {
    /// Load a manifest from disk
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse and validate a manifest
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let manifest: AspectManifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check that every pointcut and advice reference is well formed
    pub fn validate(&self) -> Result<(), ManifestError> {
        for (index, join) in self.joins.iter().enumerate() {
            join.parse()
                .map_err(|source| ManifestError::InvalidJoin { index, source })?;
        }
        Ok(())
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save a manifest to disk
    pub fn to_file(&self, path: &Path) -> Result<(), ManifestError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Rows that apply to a type
    pub fn joins_for<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a JoinEntry> + 'a {
        self.joins.iter().filter(move |j| j.applies_to(type_name))
    }

    /// Check that every advice reference resolves against a registry
    pub fn resolve_all(&self, registry: &AdviceRegistry) -> AspectResult<()> {
        for join in &self.joins {
            let (_, reference) = join.parse()?;
            registry.resolve(&reference)?;
        }
        Ok(())
    }

    /// Register the rows that apply to the proxy's type
    pub fn apply(&self, proxy: &mut AspectProxy) -> AspectResult<()> {
        let type_name = proxy.managed().descriptor().name().to_string();
        for join in self.joins_for(&type_name) {
            proxy.register(join.kind, &join.pointcut, &join.advice)?;
        }
        Ok(())
    }
}
