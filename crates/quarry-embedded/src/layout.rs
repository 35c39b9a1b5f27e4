//! Engine-neutral field layout of a schema tree.
//!
//! Each value field of a [`SchemaTree`] becomes one flat engine field named
//! after its absolute path. Options come from the capability mask:
//!
//! | Capability | Engine option |
//! |------------|---------------|
//! | searchable | indexed |
//! | projectable | stored |
//! | sortable, aggregable | fast (columnar) |
//!
//! The engine has no hidden per-object documents, so nested objects are
//! flattened like plain objects.

use std::collections::{BTreeMap, BTreeSet};

use quarry_core::{Error, Result, path};
use quarry_schema::{
    AnalysisDefinitions, Codec, FieldType, FieldValue, ObjectNode, ObjectStorage, SchemaNode, SchemaTree, ValueKind,
};

use crate::chain::AnalysisChain;

/// Engine field holding the document identifier.
pub const ID_FIELD: &str = "_id";

/// Tokenizer of strings that are neither analyzed nor normalized.
pub const RAW_TOKENIZER: &str = "raw";

/// Text-specific options of a string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayout {
    /// Tokenizer registered under the analyzer or normalizer name.
    pub tokenizer: String,
    /// Whether the field is analyzed (positions recorded for phrases).
    pub analyzed: bool,
    /// Whether field norms are recorded.
    pub norms: bool,
}

/// One engine field.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    /// Absolute path, also the engine field name.
    pub path: String,
    /// Codec decoding source values.
    pub codec: Codec,
    /// Whether the field is indexed.
    pub indexed: bool,
    /// Whether the original value is stored.
    pub stored: bool,
    /// Whether a columnar copy is kept for sorts and aggregations.
    pub fast: bool,
    /// Options of string fields.
    pub text: Option<TextLayout>,
    /// Value indexed in place of `null`.
    pub null_value: Option<FieldValue>,
}

impl FieldLayout {
    fn from_field(path: &str, field: &FieldType) -> Result<Self> {
        let capabilities = field.capabilities();
        let text = match field.kind() {
            ValueKind::GeoPoint => {
                return Err(Error::config(format!(
                    "Field '{path}' is a geo-point, which the embedded backend does not support"
                )));
            }
            ValueKind::String => Some(TextLayout {
                tokenizer: field
                    .analyzer()
                    .or(field.normalizer())
                    .unwrap_or(RAW_TOKENIZER)
                    .to_string(),
                analyzed: field.is_analyzed(),
                norms: field.mapping().norms.unwrap_or(field.is_analyzed()),
            }),
            _ => None,
        };
        Ok(Self {
            path: path.to_string(),
            codec: field.codec().clone(),
            indexed: capabilities.searchable,
            stored: capabilities.projectable,
            fast: capabilities.sortable || capabilities.aggregable,
            text,
            null_value: field.index_null_as().cloned(),
        })
    }

    /// The value kind.
    pub fn kind(&self) -> ValueKind {
        self.codec.kind()
    }
}

/// The flat engine layout of a schema tree.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedLayout {
    fields: Vec<FieldLayout>,
    objects: BTreeSet<String>,
}

impl EmbeddedLayout {
    /// Lay out every value field of `tree`, in declaration order.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Configuration`] for kinds the engine cannot index.
    pub fn from_tree(tree: &SchemaTree) -> Result<Self> {
        let mut layout = Self::default();
        layout.collect(None, tree.root())?;
        log::debug!("Laid out {} embedded field(s)", layout.fields.len());
        Ok(layout)
    }

    fn collect(&mut self, parent: Option<&str>, object: &ObjectNode) -> Result<()> {
        for (name, node) in object.children() {
            let path = path::join(parent, name);
            match node {
                SchemaNode::Leaf(field) => self.fields.push(FieldLayout::from_field(&path, field)?),
                SchemaNode::Object(child) => {
                    if child.storage() == ObjectStorage::Nested {
                        log::debug!("Flattening nested object '{path}'");
                    }
                    self.collect(Some(&path), child)?;
                    self.objects.insert(path);
                }
            }
        }
        Ok(())
    }

    /// Every field, in declaration order.
    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    /// The field at `path`.
    pub fn get(&self, path: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.path == path)
    }

    /// Whether `path` is an object of the tree.
    pub fn is_object(&self, path: &str) -> bool {
        self.objects.contains(path)
    }

    /// The analysis chain of every analyzer and normalizer the layout uses,
    /// keyed by tokenizer name.
    ///
    /// Only referenced names are resolved, so definitions the engine cannot
    /// express do no harm until a field uses them.
    pub fn analysis_chains(&self, definitions: &AnalysisDefinitions) -> Result<BTreeMap<String, AnalysisChain>> {
        let mut chains = BTreeMap::new();
        for text in self.fields.iter().filter_map(|f| f.text.as_ref()) {
            if text.tokenizer == RAW_TOKENIZER || chains.contains_key(&text.tokenizer) {
                continue;
            }
            let chain = if text.analyzed {
                AnalysisChain::analyzer(&text.tokenizer, definitions)?
            } else {
                AnalysisChain::normalizer(&text.tokenizer, definitions)?
            };
            chains.insert(text.tokenizer.clone(), chain);
        }
        Ok(chains)
    }
}

// ============================================================================
// Tests
// ============================================================================
