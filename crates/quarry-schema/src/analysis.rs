//! Analysis definitions: named analyzers, normalizers, and their components.
//!
//! Definitions serialize directly into the `settings.analysis` block of an
//! index creation request, and deserialize from the `[analysis]` table of the
//! backend configuration. Programmatic definitions go through an
//! [`AnalysisConfigurer`].
//!
//! ```rust
//! use quarry_schema::analysis::{AnalysisConfigurationContext, AnalysisDefinitions};
//!
//! let definitions = AnalysisDefinitions::configured(&|ctx: &mut AnalysisConfigurationContext| {
//!     ctx.normalizer("custom-normalizer")
//!         .char_filters(["custom-char-mapping"])
//!         .token_filters(["custom-elision"]);
//!     ctx.char_filter("custom-char-mapping", "mapping")
//!         .param("mappings", serde_json::json!(["foo => bar"]));
//!     ctx.token_filter("custom-elision", "elision")
//!         .param("articles", serde_json::json!(["l", "d"]));
//! });
//! assert!(definitions.check_normalizer("custom-normalizer").is_ok());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use quarry_core::{Error, Result};

/// Analyzer names every backend knows without a definition.
pub const BUILTIN_ANALYZERS: &[&str] = &[
    "default",
    "standard",
    "simple",
    "whitespace",
    "keyword",
    "english",
    "stop",
];

/// Normalizer names every backend knows without a definition.
pub const BUILTIN_NORMALIZERS: &[&str] = &["lowercase"];

const CUSTOM: &str = "custom";

fn custom_type() -> String {
    CUSTOM.to_string()
}

/// An analyzer: a tokenizer with optional char filters and token filters, or
/// a parameterized built-in analyzer type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    /// `custom` or a built-in analyzer type.
    #[serde(rename = "type", default = "custom_type")]
    pub type_name: String,
    /// Tokenizer name, for custom analyzers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,
    /// Char filter names, applied in order.
    #[serde(rename = "char_filter", default, skip_serializing_if = "Vec::is_empty")]
    pub char_filters: Vec<String>,
    /// Token filter names, applied in order.
    #[serde(rename = "filter", default, skip_serializing_if = "Vec::is_empty")]
    pub token_filters: Vec<String>,
    /// Type-specific parameters.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Default for AnalyzerDefinition {
    fn default() -> Self {
        Self {
            type_name: custom_type(),
            tokenizer: None,
            char_filters: Vec::new(),
            token_filters: Vec::new(),
            params: Map::new(),
        }
    }
}

impl AnalyzerDefinition {
    /// Use a built-in analyzer type instead of `custom`.
    pub fn type_name(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.type_name = type_name.into();
        self
    }

    /// Set the tokenizer.
    pub fn tokenizer(&mut self, name: impl Into<String>) -> &mut Self {
        self.tokenizer = Some(name.into());
        self
    }

    /// Set the char filters.
    pub fn char_filters<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.char_filters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the token filters.
    pub fn token_filters<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.token_filters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set a type-specific parameter.
    pub fn param(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// A normalizer: char filters and token filters applied to a single token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerDefinition {
    /// Always `custom` for user-defined normalizers.
    #[serde(rename = "type", default = "custom_type")]
    pub type_name: String,
    /// Char filter names, applied in order.
    #[serde(rename = "char_filter", default, skip_serializing_if = "Vec::is_empty")]
    pub char_filters: Vec<String>,
    /// Token filter names, applied in order.
    #[serde(rename = "filter", default, skip_serializing_if = "Vec::is_empty")]
    pub token_filters: Vec<String>,
}

impl Default for NormalizerDefinition {
    fn default() -> Self {
        Self {
            type_name: custom_type(),
            char_filters: Vec::new(),
            token_filters: Vec::new(),
        }
    }
}

impl NormalizerDefinition {
    /// Set the char filters.
    pub fn char_filters<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.char_filters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the token filters.
    pub fn token_filters<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.token_filters = names.into_iter().map(Into::into).collect();
        self
    }
}

/// A tokenizer, char filter, or token filter: a type plus parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Component type (`mapping`, `elision`, `pattern`, ...).
    #[serde(rename = "type")]
    pub type_name: String,
    /// Type-specific parameters.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ComponentDefinition {
    /// A component of the given type with no parameters.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            params: Map::new(),
        }
    }

    /// Set a parameter.
    pub fn param(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// All analysis definitions of a backend, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDefinitions {
    /// Analyzers.
    #[serde(rename = "analyzer", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub analyzers: BTreeMap<String, AnalyzerDefinition>,
    /// Normalizers.
    #[serde(rename = "normalizer", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub normalizers: BTreeMap<String, NormalizerDefinition>,
    /// Tokenizers.
    #[serde(rename = "tokenizer", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tokenizers: BTreeMap<String, ComponentDefinition>,
    /// Char filters.
    #[serde(rename = "char_filter", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub char_filters: BTreeMap<String, ComponentDefinition>,
    /// Token filters.
    #[serde(rename = "filter", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub token_filters: BTreeMap<String, ComponentDefinition>,
}

impl AnalysisDefinitions {
    /// Run a configurer against empty definitions.
    pub fn configured(configurer: &dyn AnalysisConfigurer) -> Self {
        let mut context = AnalysisConfigurationContext::default();
        configurer.configure(&mut context);
        context.into_definitions()
    }

    /// Whether nothing is defined.
    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
            && self.normalizers.is_empty()
            && self.tokenizers.is_empty()
            && self.char_filters.is_empty()
            && self.token_filters.is_empty()
    }

    /// Add every definition of `other`, replacing same-named ones.
    pub fn merge(&mut self, other: AnalysisDefinitions) {
        self.analyzers.extend(other.analyzers);
        self.normalizers.extend(other.normalizers);
        self.tokenizers.extend(other.tokenizers);
        self.char_filters.extend(other.char_filters);
        self.token_filters.extend(other.token_filters);
    }

    /// Whether `name` is a defined or built-in analyzer.
    pub fn has_analyzer(&self, name: &str) -> bool {
        self.analyzers.contains_key(name) || BUILTIN_ANALYZERS.contains(&name)
    }

    /// Whether `name` is a defined or built-in normalizer.
    pub fn has_normalizer(&self, name: &str) -> bool {
        self.normalizers.contains_key(name) || BUILTIN_NORMALIZERS.contains(&name)
    }

    /// Fail with [`Error::UnknownAnalyzer`] if `name` is not an analyzer.
    pub fn check_analyzer(&self, name: &str) -> Result<()> {
        if self.has_analyzer(name) {
            Ok(())
        } else {
            Err(Error::UnknownAnalyzer {
                what: "analyzer",
                name: name.to_string(),
            })
        }
    }

    /// Fail with [`Error::UnknownAnalyzer`] if `name` is not a normalizer.
    pub fn check_normalizer(&self, name: &str) -> Result<()> {
        if self.has_normalizer(name) {
            Ok(())
        } else {
            Err(Error::UnknownAnalyzer {
                what: "normalizer",
                name: name.to_string(),
            })
        }
    }

    /// The `settings.analysis` JSON block.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Receives an [`AnalysisConfigurationContext`] and defines named analyzers
/// and normalizers in it.
///
/// Implemented for any `Fn(&mut AnalysisConfigurationContext)`.
pub trait AnalysisConfigurer: Send + Sync {
    /// Add definitions to `context`.
    fn configure(&self, context: &mut AnalysisConfigurationContext);
}

impl<F> AnalysisConfigurer for F
where
    F: Fn(&mut AnalysisConfigurationContext) + Send + Sync,
{
    fn configure(&self, context: &mut AnalysisConfigurationContext) {
        self(context)
    }
}

/// The context an [`AnalysisConfigurer`] defines things in.
#[derive(Debug, Default)]
pub struct AnalysisConfigurationContext {
    definitions: AnalysisDefinitions,
}

impl AnalysisConfigurationContext {
    /// Start from existing definitions.
    pub fn with_definitions(definitions: AnalysisDefinitions) -> Self {
        Self { definitions }
    }

    /// Define (or redefine) a custom analyzer.
    pub fn analyzer(&mut self, name: impl Into<String>) -> &mut AnalyzerDefinition {
        let slot = self.definitions.analyzers.entry(name.into()).or_default();
        *slot = AnalyzerDefinition::default();
        slot
    }

    /// Define (or redefine) a normalizer.
    pub fn normalizer(&mut self, name: impl Into<String>) -> &mut NormalizerDefinition {
        let slot = self.definitions.normalizers.entry(name.into()).or_default();
        *slot = NormalizerDefinition::default();
        slot
    }

    /// Define a tokenizer.
    pub fn tokenizer(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> &mut ComponentDefinition {
        insert_component(&mut self.definitions.tokenizers, name, type_name)
    }

    /// Define a char filter.
    pub fn char_filter(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> &mut ComponentDefinition {
        insert_component(&mut self.definitions.char_filters, name, type_name)
    }

    /// Define a token filter.
    pub fn token_filter(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> &mut ComponentDefinition {
        insert_component(&mut self.definitions.token_filters, name, type_name)
    }

    /// The definitions collected so far.
    pub fn into_definitions(self) -> AnalysisDefinitions {
        self.definitions
    }
}

fn insert_component(
    map: &mut BTreeMap<String, ComponentDefinition>,
    name: impl Into<String>,
    type_name: impl Into<String>,
) -> &mut ComponentDefinition {
    let slot = map
        .entry(name.into())
        .or_insert_with(|| ComponentDefinition::new(""));
    *slot = ComponentDefinition::new(type_name);
    slot
}

// ============================================================================
// Tests
// ============================================================================
