//! Declarative schema descriptions.
//!
//! A [`SchemaDescription`] is the serializable form of a schema tree, read
//! from TOML or JSON. Value converters are code and cannot be described;
//! everything else a [`FieldTypeBuilder`](crate::field_type::FieldTypeBuilder)
//! accepts can.
//!
//! ```toml
//! [analysis.analyzer.folding]
//! tokenizer = "standard"
//! filter = ["lowercase", "asciifolding"]
//!
//! [[fields]]
//! name = "title"
//! type = "string"
//! analyzer = "folding"
//!
//! [[fields]]
//! name = "author"
//! type = "nested"
//!
//!   [[fields.fields]]
//!   name = "name"
//!   type = "string"
//!   sortable = "yes"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::AnalysisDefinitions;
use crate::field_type::FieldTypeOptions;
use crate::registry::KindRegistry;
use crate::tree::{ObjectStorage, SchemaElement, SchemaTree};
use quarry_core::{Error, Result};

const OBJECT_KIND: &str = "object";
const NESTED_KIND: &str = "nested";

/// A whole schema: analysis definitions plus root fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescription {
    /// Analysis definitions the fields may refer to.
    #[serde(default, skip_serializing_if = "AnalysisDefinitions::is_empty")]
    pub analysis: AnalysisDefinitions,
    /// Root fields in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDescription>,
}

/// One field of a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescription {
    /// Local name.
    pub name: String,
    /// A value kind name, or `object` / `nested`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Field-type options; leaves only.
    #[serde(flatten)]
    pub options: FieldTypeOptions,
    /// Children; objects only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDescription>,
}

impl FieldDescription {
    fn object_storage(&self) -> Option<ObjectStorage> {
        match self.kind.as_str() {
            OBJECT_KIND => Some(ObjectStorage::Flattened),
            NESTED_KIND => Some(ObjectStorage::Nested),
            _ => None,
        }
    }
}

impl SchemaDescription {
    /// Parse a TOML description.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source)
            .map_err(|e| Error::config(format!("Invalid schema description: {e}")))
    }

    /// Parse a JSON description.
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load a description file; `.json` files are JSON, anything else TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        log::debug!("Loading schema description from {}", path.display());
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&source),
            _ => Self::from_toml_str(&source),
        }
    }

    /// Build the tree against a backend's registry and analysis definitions.
    ///
    /// `analysis` must already contain this description's own definitions
    /// when the fields refer to them; see [`SchemaDescription::analysis`].
    pub fn build(&self, registry: &KindRegistry, analysis: &AnalysisDefinitions) -> Result<SchemaTree> {
        Ok(SchemaTree::builder(registry, analysis)
            .with_root(|root| declare(root, &self.fields))?
            .build())
    }
}

fn declare<'r>(element: SchemaElement<'r>, fields: &[FieldDescription]) -> Result<SchemaElement<'r>> {
    fields.iter().try_fold(element, |element, field| {
        match field.object_storage() {
            Some(storage) => {
                if field.options != FieldTypeOptions::default() {
                    return Err(Error::config(format!(
                        "Object field '{}' cannot carry field-type options",
                        field.name
                    )));
                }
                element.object_field(&field.name, storage, |child| declare(child, &field.fields))
            }
            None => {
                if !field.fields.is_empty() {
                    return Err(Error::config(format!(
                        "Value field '{}' of type '{}' cannot have children",
                        field.name, field.kind
                    )));
                }
                element.field(&field.name, |types| {
                    types
                        .as_named(&field.kind)?
                        .options(field.options.clone())
                        .build()
                })
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
