//! Mapping emitter.
//!
//! Serializes a schema tree into the root mapping sent on index creation:
//!
//! ```text
//! { "dynamic": "strict",
//!   "properties": { <metadata>..., <fields in declaration order>... } }
//! ```
//!
//! Output is byte-stable: properties keep declaration order and attributes
//! follow the canonical order of [`PropertyMapping`].

use serde_json::{Map, Value, json};

use crate::dialect::Dialect;
use crate::names::IndexIdentity;
use crate::type_name::{DISCRIMINATOR_FIELD, TypeNameMapping};
use crate::work::{self, Request};
use quarry_schema::analysis::AnalysisDefinitions;
use quarry_schema::mapping::{DynamicMapping, KEYWORD_TYPE, Properties, PropertyMapping};
use quarry_schema::tree::{ObjectNode, ObjectStorage, SchemaNode, SchemaTree};

/// Root property holding the tenant id when multi-tenancy is enabled.
pub const TENANT_ID_FIELD: &str = "_tenant_id";

/// Emits root mappings and index creation requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingEmitter {
    type_name_mapping: TypeNameMapping,
    multi_tenancy: bool,
}

impl MappingEmitter {
    /// An emitter for a type-name strategy and tenancy mode.
    pub fn new(type_name_mapping: TypeNameMapping, multi_tenancy: bool) -> Self {
        Self {
            type_name_mapping,
            multi_tenancy,
        }
    }

    /// The type-name strategy.
    pub fn type_name_mapping(&self) -> TypeNameMapping {
        self.type_name_mapping
    }

    /// Whether documents carry a tenant id.
    pub fn multi_tenancy(&self) -> bool {
        self.multi_tenancy
    }

    /// The root mapping for `tree`.
    pub fn emit(&self, tree: &SchemaTree) -> PropertyMapping {
        let mut properties = Properties::new();
        if self.type_name_mapping.requires_discriminator() {
            properties.insert(DISCRIMINATOR_FIELD, metadata_property(false));
        }
        if self.multi_tenancy {
            properties.insert(TENANT_ID_FIELD, metadata_property(true));
        }
        append_children(&mut properties, tree.root());

        PropertyMapping {
            dynamic: Some(DynamicMapping::Strict),
            properties: Some(properties),
            ..PropertyMapping::default()
        }
    }

    /// The root mapping as JSON.
    pub fn emit_json(&self, tree: &SchemaTree) -> Value {
        self.emit(tree).to_json()
    }

    /// The `PUT /<primary>` request creating an index for `tree`.
    pub fn create_index_request(
        &self,
        dialect: &dyn Dialect,
        identity: &IndexIdentity,
        tree: &SchemaTree,
        analysis: &AnalysisDefinitions,
    ) -> Request {
        log::debug!(
            "Building creation request for index '{}' ({} fields)",
            identity.primary(),
            tree.len()
        );
        work::create_index(
            dialect,
            identity.primary(),
            aliases(identity),
            self.emit_json(tree),
            index_settings(analysis),
        )
    }
}

/// The `aliases` block of a creation request.
pub fn aliases(identity: &IndexIdentity) -> Value {
    let mut aliases = Map::new();
    aliases.insert(
        identity.write_alias().to_string(),
        json!({ "is_write_index": true }),
    );
    aliases.insert(
        identity.read_alias().to_string(),
        json!({ "is_write_index": false }),
    );
    Value::Object(aliases)
}

/// The `settings` block of a creation request, if there is anything to set.
pub fn index_settings(analysis: &AnalysisDefinitions) -> Option<Value> {
    if analysis.is_empty() {
        return None;
    }
    Some(json!({ "index": { "analysis": analysis.to_json() } }))
}

fn metadata_property(indexed: bool) -> PropertyMapping {
    PropertyMapping {
        index: Some(indexed),
        ..PropertyMapping::of_type(KEYWORD_TYPE)
    }
}

fn append_children(properties: &mut Properties, object: &ObjectNode) {
    for (name, child) in object.children() {
        properties.insert(name, node_mapping(child));
    }
}

fn node_mapping(node: &SchemaNode) -> PropertyMapping {
    match node {
        SchemaNode::Leaf(field) => field.mapping().clone(),
        SchemaNode::Object(object) => {
            let mut mapping = PropertyMapping::object(object.storage() == ObjectStorage::Nested);
            append_children(mapping.properties_mut(), object);
            mapping
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Elastic7Dialect;
    use quarry_schema::field_type::Toggle;
    use quarry_schema::registry::KindRegistry;

    fn tree(registry: &KindRegistry, analysis: &AnalysisDefinitions) -> SchemaTree {
        SchemaTree::builder(registry, analysis)
            .field("title", |t| t.as_string().analyzer("english").build())
            .unwrap()
            .object_field("author", ObjectStorage::Nested, |o| {
                o.field("name", |t| t.as_string().sortable(Toggle::Yes).build())
            })
            .unwrap()
            .field("published", |t| t.as_local_date().build())
            .unwrap()
            .build()
    }

    #[test]
    fn test_emit_with_discriminator() {
        let registry = KindRegistry::default();
        let analysis = AnalysisDefinitions::default();
        let json = MappingEmitter::default()
            .emit_json(&tree(&registry, &analysis))
            .to_string();
        assert_eq!(
            json,
            concat!(
                r#"{"dynamic":"strict","properties":{"#,
                r#""_entity_type":{"type":"keyword","index":false},"#,
                r#""title":{"type":"text","index":true,"analyzer":"english"},"#,
                r#""author":{"type":"nested","dynamic":"strict","properties":{"#,
                r#""name":{"type":"keyword","index":true,"doc_values":true}}},"#,
                r#""published":{"type":"date","index":true,"doc_values":false,"#,
                r#""format":"yyyy-MM-dd||yyyy-MM-dd'T'HH:mm:ssZ"}}}"#
            )
        );
    }

    #[test]
    fn test_emit_without_discriminator() {
        let registry = KindRegistry::default();
        let analysis = AnalysisDefinitions::default();
        let emitter = MappingEmitter::new(TypeNameMapping::IndexName, false);
        let mapping = emitter.emit(&SchemaTree::empty());
        assert!(mapping.properties.as_ref().unwrap().is_empty());
        let mapping = emitter.emit(&tree(&registry, &analysis));
        assert!(mapping.properties.unwrap().get(DISCRIMINATOR_FIELD).is_none());
    }

    #[test]
    fn test_emit_with_tenant_id() {
        let emitter = MappingEmitter::new(TypeNameMapping::Discriminator, true);
        let json = emitter.emit_json(&SchemaTree::empty());
        assert_eq!(json["properties"][TENANT_ID_FIELD]["index"], true);
    }

    #[test]
    fn test_emit_is_deterministic() {
        let registry = KindRegistry::default();
        let analysis = AnalysisDefinitions::default();
        let first = MappingEmitter::default().emit_json(&tree(&registry, &analysis));
        let second = MappingEmitter::default().emit_json(&tree(&registry, &analysis));
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_metadata_properties_cannot_be_shadowed() {
        let registry = KindRegistry::default();
        let analysis = AnalysisDefinitions::default();
        let err = SchemaTree::builder(&registry, &analysis)
            .field(DISCRIMINATOR_FIELD, |t| t.as_integer().build())
            .unwrap_err();
        assert!(matches!(err, quarry_core::Error::InvalidFieldName { .. }));

        let tree = SchemaTree::builder(&registry, &analysis)
            .object_field("meta", ObjectStorage::Flattened, |o| {
                o.field(DISCRIMINATOR_FIELD, |t| t.as_integer().build())
            })
            .unwrap()
            .build();
        let mapping = MappingEmitter::new(TypeNameMapping::Discriminator, true).emit_json(&tree);
        assert_eq!(mapping["properties"][DISCRIMINATOR_FIELD]["type"], "keyword");
        assert_eq!(mapping["properties"][TENANT_ID_FIELD]["type"], "keyword");
        assert_eq!(
            mapping["properties"]["meta"]["properties"][DISCRIMINATOR_FIELD]["type"],
            "integer"
        );
    }

    #[test]
    fn test_create_request_carries_aliases_and_analysis() {
        let mut context = quarry_schema::analysis::AnalysisConfigurationContext::default();
        context
            .normalizer("custom-normalizer")
            .char_filters(["custom-char-mapping"])
            .token_filters(["custom-elision"]);
        context
            .char_filter("custom-char-mapping", "mapping")
            .param("mappings", json!(["foo => bar"]));
        context
            .token_filter("custom-elision", "elision")
            .param("articles", json!(["l", "d"]));
        let analysis = context.into_definitions();

        let identity = IndexIdentity::new("books", "Book");
        let request = MappingEmitter::default().create_index_request(
            &Elastic7Dialect,
            &identity,
            &SchemaTree::empty(),
            &analysis,
        );
        let body = request.body.unwrap();
        assert_eq!(request.path, "/books-000001");
        assert_eq!(body["aliases"]["books-write"]["is_write_index"], true);
        assert_eq!(body["aliases"]["books-read"]["is_write_index"], false);
        assert_eq!(
            body["settings"]["index"]["analysis"],
            json!({
                "normalizer": {"custom-normalizer": {
                    "type": "custom",
                    "char_filter": ["custom-char-mapping"],
                    "filter": ["custom-elision"]
                }},
                "char_filter": {"custom-char-mapping": {"type": "mapping", "mappings": ["foo => bar"]}},
                "filter": {"custom-elision": {"type": "elision", "articles": ["l", "d"]}}
            })
        );
    }
}
