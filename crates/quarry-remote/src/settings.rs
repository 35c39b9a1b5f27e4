//! Backend settings.
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! [lifecycle]
//! strategy = "validate"
//!
//! [mapping.type_name]
//! strategy = "discriminator"
//!
//! [index.aliases]
//! read = "{base}-r"
//!
//! [client]
//! hosts = ["http://localhost:9200"]
//! version = "7"
//! timeout_ms = 30000
//!
//! [multi_tenancy]
//! enabled = false
//!
//! [analysis.normalizer.custom-normalizer]
//! filter = ["lowercase"]
//! ```
//!
//! or from flat dotted properties (`lifecycle.strategy=validate`). Every key
//! has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{HttpAdminClient, IndexAdminClient};
use crate::dialect::{Dialect, dialect_for_version};
use crate::emitter::MappingEmitter;
use crate::lifecycle::{LifecycleController, LifecycleStrategy};
use crate::names::IndexIdentity;
use crate::type_name::TypeNameMapping;
use quarry_core::{Error, Result};
use quarry_schema::analysis::{AnalysisConfigurer, AnalysisDefinitions};
use quarry_schema::registry::KindRegistry;

/// Property keys accepted by [`BackendSettings::from_properties`], besides
/// anything under `analysis.`.
pub const PROPERTY_KEYS: &[&str] = &[
    "lifecycle.strategy",
    "mapping.type_name.strategy",
    "index.aliases.read",
    "index.aliases.write",
    "client.hosts",
    "client.version",
    "client.timeout_ms",
    "multi_tenancy.enabled",
];

const ANALYSIS_PREFIX: &str = "analysis.";

// ============================================================================
// Sections
// ============================================================================

/// `[lifecycle]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    /// Strategy run on start and stop.
    pub strategy: LifecycleStrategy,
}

/// `[mapping.type_name]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeNameSettings {
    /// `index-name`, `discriminator`, or unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// `[mapping]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingSettings {
    /// Type-name mapping.
    pub type_name: TypeNameSettings,
}

/// `[index.aliases]`: alias templates, `{base}` standing for the base name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasSettings {
    /// Read alias template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
    /// Write alias template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<String>,
}

/// `[index]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Alias overrides.
    pub aliases: AliasSettings,
}

/// `[client]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Cluster URLs.
    pub hosts: Vec<String>,
    /// Cluster version; selects the protocol dialect.
    pub version: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            hosts: vec!["http://localhost:9200".to_string()],
            version: "7".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// `[multi_tenancy]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiTenancySettings {
    /// Whether documents carry a tenant id.
    pub enabled: bool,
}

// ============================================================================
// BackendSettings
// ============================================================================

/// All settings of a remote backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Lifecycle strategy.
    pub lifecycle: LifecycleSettings,
    /// Mapping options.
    pub mapping: MappingSettings,
    /// Index naming.
    pub index: IndexSettings,
    /// Declarative analysis definitions.
    #[serde(skip_serializing_if = "AnalysisDefinitions::is_empty")]
    pub analysis: AnalysisDefinitions,
    /// Cluster connection.
    pub client: ClientSettings,
    /// Multi-tenancy.
    pub multi_tenancy: MultiTenancySettings,
}

impl BackendSettings {
    /// Parse TOML settings and check enumerated values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(content).map_err(|e| Error::config(format!("Invalid backend settings: {e}")))?;
        settings.check()?;
        Ok(settings)
    }

    /// Load TOML settings from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading backend settings from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Build settings from flat dotted properties.
    ///
    /// `client.hosts` takes a comma-separated list. Unknown keys are logged
    /// and ignored.
    pub fn from_properties<I, K, V>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut root = toml::Value::Table(toml::map::Map::new());
        for (key, value) in properties {
            let (key, value) = (key.as_ref().trim(), value.as_ref().trim());
            if !PROPERTY_KEYS.contains(&key) && !key.starts_with(ANALYSIS_PREFIX) {
                log::warn!("Ignoring unknown backend property '{key}'");
                continue;
            }
            let value = match key {
                "client.hosts" => toml::Value::Array(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|h| !h.is_empty())
                        .map(|h| toml::Value::String(h.to_string()))
                        .collect(),
                ),
                "client.version" | "mapping.type_name.strategy" => toml::Value::String(value.to_string()),
                _ => parse_value(value),
            };
            set_nested_value(&mut root, key, value)?;
        }
        let settings: Self = root
            .try_into()
            .map_err(|e| Error::config(format!("Invalid backend properties: {e}")))?;
        settings.check()?;
        Ok(settings)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    fn check(&self) -> Result<()> {
        self.dialect()?;
        self.type_name_mapping()?;
        if self.client.hosts.is_empty() {
            return Err(Error::config("client.hosts must list at least one host"));
        }
        Ok(())
    }

    /// Protocol dialect for the configured cluster version.
    pub fn dialect(&self) -> Result<Arc<dyn Dialect>> {
        dialect_for_version(&self.client.version)
    }

    /// Kind registry using the dialect's date formats.
    pub fn registry(&self) -> Result<KindRegistry> {
        let dialect = self.dialect()?;
        Ok(KindRegistry::builder().date_formats(dialect.date_formats()).build())
    }

    /// Configured type-name mapping.
    pub fn type_name_mapping(&self) -> Result<TypeNameMapping> {
        TypeNameMapping::from_setting(self.mapping.type_name.strategy.as_deref())
    }

    /// Mapping emitter for the configured type-name mapping and tenancy.
    pub fn emitter(&self) -> Result<MappingEmitter> {
        Ok(MappingEmitter::new(self.type_name_mapping()?, self.multi_tenancy.enabled))
    }

    /// Names of the index `base`, honouring alias overrides.
    pub fn identity(&self, base: &str, mapped_type_name: &str) -> IndexIdentity {
        IndexIdentity::new(base, mapped_type_name)
            .with_alias_templates(self.index.aliases.read.as_deref(), self.index.aliases.write.as_deref())
    }

    /// Declarative analysis definitions, extended by `configurer`.
    pub fn analysis_definitions(&self, configurer: Option<&dyn AnalysisConfigurer>) -> AnalysisDefinitions {
        let mut definitions = self.analysis.clone();
        if let Some(configurer) = configurer {
            definitions.merge(AnalysisDefinitions::configured(configurer));
        }
        definitions
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.client.timeout_ms)
    }

    /// HTTP client for the configured hosts.
    pub fn http_client(&self) -> Result<HttpAdminClient> {
        HttpAdminClient::new(self.client.hosts.clone(), self.timeout())
    }

    /// A lifecycle controller with no indexes, sending through `client`.
    pub fn controller(
        &self,
        client: Arc<dyn IndexAdminClient>,
        analysis: AnalysisDefinitions,
    ) -> Result<LifecycleController> {
        Ok(LifecycleController::new(
            client,
            self.dialect()?,
            self.lifecycle.strategy,
            self.emitter()?,
            analysis,
        ))
    }
}

/// Set a value at a dotted key path, creating intermediate tables.
fn set_nested_value(root: &mut toml::Value, key: &str, value: toml::Value) -> Result<()> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let Some(last) = parts.pop() else {
        return Err(Error::config("Empty key path"));
    };
    let mut current = root;
    for part in parts {
        let table = current
            .as_table_mut()
            .ok_or_else(|| Error::config(format!("Cannot navigate into '{key}'")))?;
        current = table
            .entry(part)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
    current
        .as_table_mut()
        .ok_or_else(|| Error::config(format!("Cannot set '{key}' on a non-table value")))?
        .insert(last.to_string(), value);
    Ok(())
}

/// Priority: bool, integer, string.
fn parse_value(s: &str) -> toml::Value {
    match s {
        "true" => toml::Value::Boolean(true),
        "false" => toml::Value::Boolean(false),
        _ => s
            .parse::<i64>()
            .map(toml::Value::Integer)
            .unwrap_or_else(|_| toml::Value::String(s.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================
