//! Field-type builder and the immutable field-type descriptor.
//!
//! A [`TypeFactory`] hands out one [`FieldTypeBuilder`] per kind. The builder
//! collects user options, then [`FieldTypeBuilder::build`] resolves them
//! against the kind's defaults and produces a frozen [`FieldType`].
//!
//! # Resolution rules
//!
//! - `DEFAULT` collapses to the kind default: searchable yes, sortable and
//!   projectable no, aggregable follows sortable for ordered kinds.
//! - An analyzer forces searchable and rules out sortable and aggregable.
//! - A normalizer forces searchable; sortable stays allowed.
//! - Analyzer and normalizer are mutually exclusive and string-only.
//! - The resolved mask drives the mapping: `index` mirrors searchable,
//!   `doc_values` is sortable or aggregable (never written on text), and
//!   `store` is only written when the backend needs it for projections.
//!
//! ```rust
//! use quarry_schema::analysis::AnalysisDefinitions;
//! use quarry_schema::field_type::{Toggle, TypeFactory};
//! use quarry_schema::registry::KindRegistry;
//!
//! let registry = KindRegistry::default();
//! let analysis = AnalysisDefinitions::default();
//! let factory = TypeFactory::new(&registry, &analysis);
//!
//! let field = factory.as_long().sortable(Toggle::Yes).build().unwrap();
//! assert!(field.capabilities().aggregable);
//! assert_eq!(field.mapping().doc_values, Some(true));
//! ```

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::AnalysisDefinitions;
use crate::codec::Codec;
use crate::converter::{Converter, ValueConvert};
use crate::kind::ValueKind;
use crate::mapping::{PropertyMapping, TEXT_TYPE};
use crate::registry::KindRegistry;
use crate::value::FieldValue;
use quarry_core::{Capabilities, Capability, Error, Result};

// ============================================================================
// Options
// ============================================================================

/// A tri-state capability option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    /// Enabled.
    Yes,
    /// Disabled.
    No,
    /// Whatever the kind defaults to.
    #[default]
    Default,
}

impl Toggle {
    /// Collapse to a boolean.
    pub fn resolve(self, default: bool) -> bool {
        match self {
            Toggle::Yes => true,
            Toggle::No => false,
            Toggle::Default => default,
        }
    }
}

impl From<bool> for Toggle {
    fn from(enabled: bool) -> Self {
        if enabled { Toggle::Yes } else { Toggle::No }
    }
}

/// Accepts `yes`/`no`/`default` in any case, or a boolean.
impl<'de> Deserialize<'de> for Toggle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(b.into()),
            Raw::Name(name) => match name.to_ascii_lowercase().as_str() {
                "yes" => Ok(Toggle::Yes),
                "no" => Ok(Toggle::No),
                "default" => Ok(Toggle::Default),
                other => Err(serde::de::Error::custom(format!(
                    "invalid toggle '{other}', expected yes, no or default"
                ))),
            },
        }
    }
}

/// The declarative part of a field-type configuration.
///
/// Converters are code and therefore only set through the builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldTypeOptions {
    /// Whether predicates may target the field.
    pub searchable: Toggle,
    /// Whether sorts may target the field.
    pub sortable: Toggle,
    /// Whether projections may return the field.
    pub projectable: Toggle,
    /// Whether aggregations may target the field.
    pub aggregable: Toggle,
    /// Analyzer name; strings only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    /// Normalizer name; strings only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalizer: Option<String>,
    /// Explicit `norms` setting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub norms: Option<bool>,
    /// Value indexed in place of `null`, as a wire literal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_null_as: Option<Value>,
}

// ============================================================================
// FieldType
// ============================================================================

/// The immutable descriptor of a leaf field.
#[derive(Debug, Clone)]
pub struct FieldType {
    kind: ValueKind,
    codec: Codec,
    mapping: PropertyMapping,
    capabilities: Capabilities,
    dsl_converter: Converter,
    projection_converter: Converter,
    raw_dsl_converter: Converter,
    raw_projection_converter: Converter,
    analyzer: Option<String>,
    normalizer: Option<String>,
    index_null_as: Option<FieldValue>,
}

impl FieldType {
    /// The value kind.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The codec.
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// The mapping fragment this field is declared with.
    pub fn mapping(&self) -> &PropertyMapping {
        &self.mapping
    }

    /// The resolved capability mask.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Analyzer name, if analyzed.
    pub fn analyzer(&self) -> Option<&str> {
        self.analyzer.as_deref()
    }

    /// Normalizer name, if normalized.
    pub fn normalizer(&self) -> Option<&str> {
        self.normalizer.as_deref()
    }

    /// The value indexed in place of `null`.
    pub fn index_null_as(&self) -> Option<&FieldValue> {
        self.index_null_as.as_ref()
    }

    /// Whether the field is an analyzed string.
    pub fn is_analyzed(&self) -> bool {
        self.analyzer.is_some()
    }

    /// The DSL-direction converter for `convert`.
    pub fn dsl_converter(&self, convert: ValueConvert) -> &Converter {
        match convert {
            ValueConvert::Yes => &self.dsl_converter,
            ValueConvert::No => &self.raw_dsl_converter,
        }
    }

    /// The projection-direction converter for `convert`.
    pub fn projection_converter(&self, convert: ValueConvert) -> &Converter {
        match convert {
            ValueConvert::Yes => &self.projection_converter,
            ValueConvert::No => &self.raw_projection_converter,
        }
    }

    /// Convert a DSL value and encode it for the wire.
    pub fn to_wire(&self, value: FieldValue, convert: ValueConvert) -> Result<Value> {
        let value = self.dsl_converter(convert).convert(value)?;
        self.codec.encode(&value)
    }

    /// Decode a wire value and convert it for projection.
    pub fn from_wire(&self, wire: &Value, convert: ValueConvert) -> Result<FieldValue> {
        let value = self.codec.decode(wire)?;
        self.projection_converter(convert).convert(value)
    }

    /// Codecs are compatible.
    pub fn has_compatible_codec(&self, other: &FieldType) -> bool {
        self.codec.is_compatible_with(&other.codec)
    }

    /// User DSL converters are compatible.
    pub fn has_compatible_dsl_converter(&self, other: &FieldType) -> bool {
        self.dsl_converter.is_compatible_with(&other.dsl_converter)
    }

    /// User projection converters are compatible.
    pub fn has_compatible_projection_converter(&self, other: &FieldType) -> bool {
        self.projection_converter
            .is_compatible_with(&other.projection_converter)
    }

    /// Analyzer and normalizer names are equal.
    pub fn has_compatible_analysis(&self, other: &FieldType) -> bool {
        self.analyzer == other.analyzer && self.normalizer == other.normalizer
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Hands out builders for every registered kind.
///
/// Holds the registry and analysis definitions of one backend; both are
/// borrowed, never copied.
#[derive(Debug, Clone, Copy)]
pub struct TypeFactory<'r> {
    registry: &'r KindRegistry,
    analysis: &'r AnalysisDefinitions,
}

impl<'r> TypeFactory<'r> {
    /// A factory over a backend's registry and analysis definitions.
    pub fn new(registry: &'r KindRegistry, analysis: &'r AnalysisDefinitions) -> Self {
        Self { registry, analysis }
    }

    /// The registry.
    pub fn registry(&self) -> &'r KindRegistry {
        self.registry
    }

    /// The analysis definitions.
    pub fn analysis(&self) -> &'r AnalysisDefinitions {
        self.analysis
    }

    /// A builder for an arbitrary kind.
    pub fn as_kind(&self, kind: ValueKind) -> FieldTypeBuilder<'r> {
        FieldTypeBuilder {
            factory: *self,
            kind,
            options: FieldTypeOptions::default(),
            dsl_converter: Converter::Passthrough,
            projection_converter: Converter::Passthrough,
            index_null_as: None,
        }
    }

    /// A builder for a logical type name.
    pub fn as_named(&self, logical_type: &str) -> Result<FieldTypeBuilder<'r>> {
        let definition = self.registry.kind_for(logical_type)?;
        Ok(self.as_kind(definition.kind))
    }

    /// `boolean` builder.
    pub fn as_boolean(&self) -> FieldTypeBuilder<'r> {
        self.as_kind(ValueKind::Boolean)
    }

    /// `integer` builder.
    pub fn as_integer(&self) -> FieldTypeBuilder<'r> {
        self.as_kind(ValueKind::Integer)
    }

    /// `long` builder.
    pub fn as_long(&self) -> FieldTypeBuilder<'r> {
        self.as_kind(ValueKind::Long)
    }

    /// `double` builder.
    pub fn as_double(&self) -> FieldTypeBuilder<'r> {
        self.as_kind(ValueKind::Double)
    }

    /// `local-date` builder.
    pub fn as_local_date(&self) -> FieldTypeBuilder<'r> {
        self.as_kind(ValueKind::LocalDate)
    }

    /// `instant` builder.
    pub fn as_instant(&self) -> FieldTypeBuilder<'r> {
        self.as_kind(ValueKind::Instant)
    }

    /// `string` builder.
    pub fn as_string(&self) -> FieldTypeBuilder<'r> {
        self.as_kind(ValueKind::String)
    }

    /// `geo-point` builder.
    pub fn as_geo_point(&self) -> FieldTypeBuilder<'r> {
        self.as_kind(ValueKind::GeoPoint)
    }
}

/// Collects options for one field type.
#[derive(Debug, Clone)]
pub struct FieldTypeBuilder<'r> {
    factory: TypeFactory<'r>,
    kind: ValueKind,
    options: FieldTypeOptions,
    dsl_converter: Converter,
    projection_converter: Converter,
    index_null_as: Option<FieldValue>,
}

impl<'r> FieldTypeBuilder<'r> {
    /// Replace all declarative options at once.
    pub fn options(mut self, options: FieldTypeOptions) -> Self {
        self.options = options;
        self
    }

    /// Set `searchable`.
    pub fn searchable(mut self, toggle: impl Into<Toggle>) -> Self {
        self.options.searchable = toggle.into();
        self
    }

    /// Set `sortable`.
    pub fn sortable(mut self, toggle: impl Into<Toggle>) -> Self {
        self.options.sortable = toggle.into();
        self
    }

    /// Set `projectable`.
    pub fn projectable(mut self, toggle: impl Into<Toggle>) -> Self {
        self.options.projectable = toggle.into();
        self
    }

    /// Set `aggregable`.
    pub fn aggregable(mut self, toggle: impl Into<Toggle>) -> Self {
        self.options.aggregable = toggle.into();
        self
    }

    /// Analyze the string with the named analyzer.
    pub fn analyzer(mut self, name: impl Into<String>) -> Self {
        self.options.analyzer = Some(name.into());
        self
    }

    /// Normalize the string with the named normalizer.
    pub fn normalizer(mut self, name: impl Into<String>) -> Self {
        self.options.normalizer = Some(name.into());
        self
    }

    /// Set `norms` explicitly.
    pub fn norms(mut self, enabled: bool) -> Self {
        self.options.norms = Some(enabled);
        self
    }

    /// Convert DSL values before encoding.
    pub fn dsl_converter(mut self, converter: Converter) -> Self {
        self.dsl_converter = converter;
        self
    }

    /// Convert decoded values before projecting.
    pub fn projection_converter(mut self, converter: Converter) -> Self {
        self.projection_converter = converter;
        self
    }

    /// Index this value in place of `null`.
    pub fn index_null_as(mut self, value: impl Into<FieldValue>) -> Self {
        self.index_null_as = Some(value.into());
        self
    }

    /// Resolve the options and freeze the descriptor.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedKind`] if the backend does not register the kind
    /// - [`Error::IllegalOption`] for contradictory or misplaced options
    /// - [`Error::UnknownAnalyzer`] for undefined analyzer/normalizer names
    pub fn build(self) -> Result<FieldType> {
        let definition = self.factory.registry.definition(self.kind)?;
        let kind = self.kind;
        let options = self.options;
        let illegal = |message: &str| Error::illegal_option(kind.as_str(), message);

        if (options.analyzer.is_some() || options.normalizer.is_some()) && !kind.is_textual() {
            return Err(illegal("analyzer and normalizer can only be set on string fields"));
        }
        if options.analyzer.is_some() && options.normalizer.is_some() {
            return Err(illegal(
                "an analyzer and a normalizer cannot be assigned to the same field",
            ));
        }
        if let Some(analyzer) = &options.analyzer {
            self.factory.analysis.check_analyzer(analyzer)?;
            if options.searchable == Toggle::No {
                return Err(illegal("an analyzed field is always searchable"));
            }
            if options.sortable == Toggle::Yes {
                return Err(illegal(
                    "an analyzed field cannot be sortable; use a normalizer instead",
                ));
            }
            if options.aggregable == Toggle::Yes {
                return Err(illegal(
                    "an analyzed field cannot be aggregable; use a normalizer instead",
                ));
            }
        }
        if let Some(normalizer) = &options.normalizer {
            self.factory.analysis.check_normalizer(normalizer)?;
            if options.searchable == Toggle::No {
                return Err(illegal("a normalized field is always searchable"));
            }
        }

        let allowed = definition.allowed;
        let defaults = definition.defaults;
        let analyzed = options.analyzer.is_some();

        let searchable = analyzed
            || options.normalizer.is_some()
            || options.searchable.resolve(defaults.searchable);
        let sortable = !analyzed && options.sortable.resolve(defaults.sortable);
        let projectable = options.projectable.resolve(defaults.projectable);
        let aggregable_default = if definition.aggregable_follows_sortable {
            sortable
        } else {
            defaults.aggregable
        };
        let aggregable = !analyzed && options.aggregable.resolve(aggregable_default);

        let capabilities = Capabilities {
            searchable,
            sortable,
            projectable,
            aggregable,
        };
        for capability in capabilities.iter() {
            if !allowed.has(capability) && options_toggle(&options, capability) == Toggle::Yes {
                return Err(illegal(&format!("{kind} fields cannot be {capability}")));
            }
        }
        let capabilities = Capabilities {
            searchable: searchable && allowed.searchable,
            sortable: sortable && allowed.sortable,
            projectable: projectable && allowed.projectable,
            aggregable: aggregable && allowed.aggregable,
        };

        let codec = definition.codec.clone();
        let index_null_as = match (self.index_null_as, &options.index_null_as) {
            (Some(value), _) => Some(value),
            (None, Some(wire)) => Some(codec.decode(wire).map_err(|e| {
                Error::illegal_option(kind.as_str(), format!("invalid index_null_as: {e}"))
            })?),
            (None, None) => None,
        };
        let null_value = index_null_as
            .as_ref()
            .map(|value| codec.encode(value))
            .transpose()
            .map_err(|e| {
                Error::illegal_option(kind.as_str(), format!("invalid index_null_as: {e}"))
            })?;

        let mut mapping = definition.default_mapping.clone();
        if analyzed {
            mapping.type_name = Some(TEXT_TYPE.to_string());
        }
        mapping.index = Some(capabilities.searchable);
        if !analyzed {
            mapping.doc_values = Some(capabilities.sortable || capabilities.aggregable);
        }
        if capabilities.projectable && self.factory.registry.stores_projections() {
            mapping.store = Some(true);
        }
        mapping.norms = options.norms;
        mapping.analyzer = options.analyzer.clone();
        mapping.normalizer = options.normalizer.clone();
        mapping.null_value = null_value;

        log::debug!("Built {kind} field type with capabilities {capabilities}");

        Ok(FieldType {
            kind,
            codec,
            mapping,
            capabilities,
            dsl_converter: self.dsl_converter,
            projection_converter: self.projection_converter,
            raw_dsl_converter: Converter::Passthrough,
            raw_projection_converter: Converter::Passthrough,
            analyzer: options.analyzer,
            normalizer: options.normalizer,
            index_null_as,
        })
    }
}

fn options_toggle(options: &FieldTypeOptions, capability: Capability) -> Toggle {
    match capability {
        Capability::Searchable => options.searchable,
        Capability::Sortable => options.sortable,
        Capability::Projectable => options.projectable,
        Capability::Aggregable => options.aggregable,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisConfigurationContext;
    use serde_json::json;

    fn with_factory<T>(f: impl FnOnce(TypeFactory<'_>) -> T) -> T {
        let registry = KindRegistry::default();
        let analysis = AnalysisDefinitions::configured(&|ctx: &mut AnalysisConfigurationContext| {
            ctx.normalizer("folding").token_filters(["lowercase", "asciifolding"]);
        });
        f(TypeFactory::new(&registry, &analysis))
    }

    #[test]
    fn test_defaults_for_plain_string() {
        let field = with_factory(|t| t.as_string().build()).unwrap();
        assert_eq!(
            field.capabilities(),
            Capabilities {
                searchable: true,
                sortable: false,
                projectable: false,
                aggregable: false,
            }
        );
        assert_eq!(
            field.mapping().to_json(),
            json!({ "type": "keyword", "index": true, "doc_values": false })
        );
    }

    #[test]
    fn test_aggregable_follows_sortable_for_ordered_kinds() {
        let date = with_factory(|t| t.as_local_date().sortable(Toggle::Yes).build()).unwrap();
        assert!(date.capabilities().aggregable);
        assert_eq!(
            date.mapping().to_json(),
            json!({
                "type": "date",
                "index": true,
                "doc_values": true,
                "format": "yyyy-MM-dd||yyyy-MM-dd'T'HH:mm:ssZ"
            })
        );

        let string = with_factory(|t| t.as_string().sortable(Toggle::Yes).build()).unwrap();
        assert!(!string.capabilities().aggregable);
    }

    #[test]
    fn test_analyzer_forces_text_and_searchable() {
        let field = with_factory(|t| t.as_string().analyzer("english").build()).unwrap();
        assert!(field.is_analyzed());
        assert!(field.capabilities().searchable);
        assert!(!field.capabilities().sortable);
        assert_eq!(
            field.mapping().to_json(),
            json!({ "type": "text", "index": true, "analyzer": "english" })
        );
    }

    #[test]
    fn test_analyzer_with_sortable_is_illegal() {
        let err = with_factory(|t| {
            t.as_string()
                .analyzer("english")
                .sortable(Toggle::Yes)
                .build()
        })
        .unwrap_err();
        assert!(matches!(err, Error::IllegalOption { .. }));
        assert!(err.to_string().contains("cannot be sortable"));
    }

    #[test]
    fn test_analyzer_and_normalizer_are_exclusive() {
        let err = with_factory(|t| {
            t.as_string()
                .analyzer("standard")
                .normalizer("lowercase")
                .build()
        })
        .unwrap_err();
        assert!(err.to_string().contains("cannot be assigned to the same field"));
    }

    #[test]
    fn test_analyzer_on_non_string_is_illegal() {
        let err = with_factory(|t| t.as_integer().analyzer("standard").build()).unwrap_err();
        assert!(err.to_string().contains("only be set on string fields"));
    }

    #[test]
    fn test_unknown_normalizer() {
        let err = with_factory(|t| t.as_string().normalizer("nope").build()).unwrap_err();
        assert!(matches!(err, Error::UnknownAnalyzer { what: "normalizer", .. }));
    }

    #[test]
    fn test_normalizer_keeps_sortable() {
        let field = with_factory(|t| {
            t.as_string()
                .normalizer("folding")
                .sortable(Toggle::Yes)
                .searchable(Toggle::Default)
                .build()
        })
        .unwrap();
        assert!(field.capabilities().searchable);
        assert!(field.capabilities().sortable);
        assert_eq!(field.mapping().normalizer.as_deref(), Some("folding"));
        assert_eq!(field.mapping().doc_values, Some(true));
    }

    #[test]
    fn test_geo_point_cannot_be_aggregable() {
        let err = with_factory(|t| t.as_geo_point().aggregable(Toggle::Yes).build()).unwrap_err();
        assert!(err.to_string().contains("geo-point fields cannot be aggregable"));

        let field = with_factory(|t| t.as_geo_point().sortable(Toggle::Yes).build()).unwrap();
        assert!(!field.capabilities().aggregable);
    }

    #[test]
    fn test_unsupported_kind_surfaces_at_build() {
        let registry = KindRegistry::builder().without(ValueKind::GeoPoint).build();
        let analysis = AnalysisDefinitions::default();
        let factory = TypeFactory::new(&registry, &analysis);
        assert!(matches!(
            factory.as_geo_point().build(),
            Err(Error::UnsupportedKind { .. })
        ));
    }

    #[test]
    fn test_store_only_when_backend_requires_it() {
        let analysis = AnalysisDefinitions::default();
        let remote = KindRegistry::default();
        let embedded = KindRegistry::builder().stores_projections(true).build();

        let field = TypeFactory::new(&remote, &analysis)
            .as_integer()
            .projectable(Toggle::Yes)
            .build()
            .unwrap();
        assert_eq!(field.mapping().store, None);

        let field = TypeFactory::new(&embedded, &analysis)
            .as_integer()
            .projectable(Toggle::Yes)
            .build()
            .unwrap();
        assert_eq!(field.mapping().store, Some(true));
    }

    #[test]
    fn test_index_null_as_is_encoded() {
        let field = with_factory(|t| t.as_integer().index_null_as(-1).build()).unwrap();
        assert_eq!(field.mapping().null_value, Some(json!(-1)));
        assert_eq!(field.index_null_as(), Some(&FieldValue::Int(-1)));

        let options = FieldTypeOptions {
            index_null_as: Some(json!("N/A")),
            ..FieldTypeOptions::default()
        };
        let field = with_factory(|t| t.as_string().options(options).build()).unwrap();
        assert_eq!(field.mapping().null_value, Some(json!("N/A")));
    }

    #[test]
    fn test_index_null_as_of_wrong_kind() {
        let err = with_factory(|t| t.as_boolean().index_null_as("maybe").build()).unwrap_err();
        assert!(matches!(err, Error::IllegalOption { .. }));
    }

    #[test]
    fn test_converters_are_selected_by_value_convert() {
        let field = with_factory(|t| {
            t.as_integer()
                .dsl_converter(Converter::from_fn("double-it", |v| match v {
                    FieldValue::Int(i) => Ok(FieldValue::Int(i * 2)),
                    other => Ok(other),
                }))
                .build()
        })
        .unwrap();
        assert_eq!(
            field.to_wire(FieldValue::Int(21), ValueConvert::Yes).unwrap(),
            json!(42)
        );
        assert_eq!(
            field.to_wire(FieldValue::Int(21), ValueConvert::No).unwrap(),
            json!(21)
        );
    }

    #[test]
    fn test_toggle_deserialization() {
        let options: FieldTypeOptions =
            serde_json::from_value(json!({ "sortable": "YES", "projectable": true })).unwrap();
        assert_eq!(options.sortable, Toggle::Yes);
        assert_eq!(options.projectable, Toggle::Yes);
        assert_eq!(options.aggregable, Toggle::Default);
        assert!(serde_json::from_value::<FieldTypeOptions>(json!({ "sortable": "maybe" })).is_err());
    }
}
