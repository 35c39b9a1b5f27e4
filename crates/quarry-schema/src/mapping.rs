//! Backend-native mapping fragments.
//!
//! A [`PropertyMapping`] describes one property of an index mapping, leaf or
//! object. Serialization is byte-stable: attributes are always written in the
//! canonical order
//!
//! ```text
//! type, index, store, doc_values, norms, analyzer, normalizer, format,
//! null_value, dynamic, properties
//! ```
//!
//! and properties in insertion order. Parsing is lenient: unknown attributes
//! are dropped and loosely typed values (`"true"` for `true`) are accepted,
//! since observed mappings come from a live cluster.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Mapping `type` of analyzed strings.
pub const TEXT_TYPE: &str = "text";
/// Mapping `type` of non-analyzed strings.
pub const KEYWORD_TYPE: &str = "keyword";
/// Mapping `type` of flattened objects.
pub const OBJECT_TYPE: &str = "object";
/// Mapping `type` of nested objects.
pub const NESTED_TYPE: &str = "nested";

/// The `dynamic` setting of an object mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicMapping {
    /// Unknown properties are added to the mapping.
    True,
    /// Unknown properties are kept in the source but not indexed.
    False,
    /// Unknown properties are rejected.
    Strict,
}

impl DynamicMapping {
    /// The JSON representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DynamicMapping::True => "true",
            DynamicMapping::False => "false",
            DynamicMapping::Strict => "strict",
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(DynamicMapping::True),
            Value::Bool(false) => Some(DynamicMapping::False),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(DynamicMapping::True),
                "false" => Some(DynamicMapping::False),
                "strict" => Some(DynamicMapping::Strict),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Renders as the constant name (`STRICT`), as failure reports do.
impl fmt::Display for DynamicMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DynamicMapping::True => "TRUE",
            DynamicMapping::False => "FALSE",
            DynamicMapping::Strict => "STRICT",
        })
    }
}

/// Child properties, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, PropertyMapping)>,
}

impl Properties {
    /// No properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property, keeping its original position on
    /// replacement.
    pub fn insert(&mut self, name: impl Into<String>, mapping: PropertyMapping) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = mapping,
            None => self.entries.push((name, mapping)),
        }
    }

    /// Look a property up by local name.
    pub fn get(&self, name: &str) -> Option<&PropertyMapping> {
        self.entries
            .iter()
            .find_map(|(n, m)| (n == name).then_some(m))
    }

    /// Remove a property.
    pub fn remove(&mut self, name: &str) -> Option<PropertyMapping> {
        let position = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(position).1)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyMapping)> {
        self.entries.iter().map(|(n, m)| (n.as_str(), m))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, mapping) in &self.entries {
            map.serialize_entry(name, mapping)?;
        }
        map.end()
    }
}

/// A mapping fragment for one property (or the root).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMapping {
    /// `type`; absent on the root and, when observed, on plain objects.
    pub type_name: Option<String>,
    /// `index`.
    pub index: Option<bool>,
    /// `store`.
    pub store: Option<bool>,
    /// `doc_values`.
    pub doc_values: Option<bool>,
    /// `norms`.
    pub norms: Option<bool>,
    /// `analyzer`.
    pub analyzer: Option<String>,
    /// `normalizer`.
    pub normalizer: Option<String>,
    /// `format`, for dates.
    pub format: Option<String>,
    /// `null_value`, already encoded for the wire.
    pub null_value: Option<Value>,
    /// `dynamic`, for objects.
    pub dynamic: Option<DynamicMapping>,
    /// `properties`, for objects.
    pub properties: Option<Properties>,
}

impl PropertyMapping {
    /// A leaf mapping of the given type.
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    /// An object mapping with strict dynamic and no properties yet.
    pub fn object(nested: bool) -> Self {
        Self {
            type_name: Some(if nested { NESTED_TYPE } else { OBJECT_TYPE }.to_string()),
            dynamic: Some(DynamicMapping::Strict),
            properties: Some(Properties::new()),
            ..Self::default()
        }
    }

    /// Whether this mapping describes an object (declares `properties` or an
    /// object type).
    pub fn is_object(&self) -> bool {
        self.properties.is_some()
            || matches!(self.type_name.as_deref(), Some(OBJECT_TYPE | NESTED_TYPE))
    }

    /// Child properties, creating the block if needed.
    pub fn properties_mut(&mut self) -> &mut Properties {
        self.properties.get_or_insert_with(Properties::new)
    }

    /// Serialize to a JSON value in canonical order.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parse an observed mapping fragment.
    pub fn from_json(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        let string = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        let flag = |key: &str| map.get(key).and_then(parse_flag);

        let properties = map.get("properties").and_then(Value::as_object).map(|props| {
            let mut properties = Properties::new();
            for (name, child) in props {
                properties.insert(name.clone(), PropertyMapping::from_json(child));
            }
            properties
        });

        Self {
            type_name: string("type"),
            index: flag("index"),
            store: flag("store"),
            doc_values: flag("doc_values"),
            norms: flag("norms"),
            analyzer: string("analyzer"),
            normalizer: string("normalizer"),
            format: string("format"),
            null_value: map.get("null_value").filter(|v| !v.is_null()).cloned(),
            dynamic: map.get("dynamic").and_then(DynamicMapping::from_json),
            properties,
        }
    }
}

fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl Serialize for PropertyMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(type_name) = &self.type_name {
            map.serialize_entry("type", type_name)?;
        }
        if let Some(index) = self.index {
            map.serialize_entry("index", &index)?;
        }
        if let Some(store) = self.store {
            map.serialize_entry("store", &store)?;
        }
        if let Some(doc_values) = self.doc_values {
            map.serialize_entry("doc_values", &doc_values)?;
        }
        if let Some(norms) = self.norms {
            map.serialize_entry("norms", &norms)?;
        }
        if let Some(analyzer) = &self.analyzer {
            map.serialize_entry("analyzer", analyzer)?;
        }
        if let Some(normalizer) = &self.normalizer {
            map.serialize_entry("normalizer", normalizer)?;
        }
        if let Some(format) = &self.format {
            map.serialize_entry("format", format)?;
        }
        if let Some(null_value) = &self.null_value {
            map.serialize_entry("null_value", null_value)?;
        }
        if let Some(dynamic) = self.dynamic {
            map.serialize_entry("dynamic", dynamic.as_str())?;
        }
        if let Some(properties) = &self.properties {
            map.serialize_entry("properties", properties)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PropertyMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(PropertyMapping::from_json(&value))
    }
}

// ============================================================================
// Tests
// ============================================================================
