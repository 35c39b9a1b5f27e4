//! Document indexing.
//!
//! [`DocumentBuilder`] turns field values into a `_source` document through
//! the codecs of the schema tree. [`IndexingPlan`] queues document writes
//! for one index and sends them, adding the metadata properties the mapping
//! emitter declared (entity type discriminator, tenant id).

use serde_json::{Map, Value};

use crate::client::IndexAdminClient;
use crate::dialect::Dialect;
use crate::emitter::{MappingEmitter, TENANT_ID_FIELD};
use crate::names::IndexIdentity;
use crate::type_name::DISCRIMINATOR_FIELD;
use crate::work::{self, Request};
use quarry_core::{Error, Result, path};
use quarry_schema::converter::ValueConvert;
use quarry_schema::tree::SchemaTree;
use quarry_schema::value::FieldValue;

// ============================================================================
// DocumentBuilder
// ============================================================================

/// Builds the `_source` of one document.
#[derive(Debug)]
pub struct DocumentBuilder<'t> {
    tree: &'t SchemaTree,
    convert: ValueConvert,
    source: Map<String, Value>,
}

impl<'t> DocumentBuilder<'t> {
    /// An empty document for `tree`.
    pub fn new(tree: &'t SchemaTree) -> Self {
        Self {
            tree,
            convert: ValueConvert::Yes,
            source: Map::new(),
        }
    }

    /// Skip user converters; values are already in index form.
    pub fn raw(mut self) -> Self {
        self.convert = ValueConvert::No;
        self
    }

    /// Set the value of the field at `path`.
    ///
    /// Setting a path twice turns its value into an array.
    pub fn value(mut self, field_path: &str, value: impl Into<FieldValue>) -> Result<Self> {
        let field = self.tree.field(field_path)?;
        let wire = field.field_type().to_wire(value.into(), self.convert)?;
        insert(&mut self.source, field_path, wire)?;
        Ok(self)
    }

    /// Set the field at `path` to null.
    ///
    /// Fields declared with `index_null_as` are indexed as that value.
    pub fn null(mut self, field_path: &str) -> Result<Self> {
        self.tree.field(field_path)?;
        insert(&mut self.source, field_path, Value::Null)?;
        Ok(self)
    }

    /// The finished `_source`.
    pub fn build(self) -> Value {
        Value::Object(self.source)
    }
}

fn insert(source: &mut Map<String, Value>, field_path: &str, wire: Value) -> Result<()> {
    let mut segments: Vec<&str> = path::segments(field_path).collect();
    let Some(leaf) = segments.pop() else {
        return Err(Error::UnknownField {
            path: field_path.to_string(),
        });
    };
    let mut current = source;
    for segment in segments {
        let child = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
        current = child.as_object_mut().ok_or_else(|| {
            Error::conversion(format!("'{segment}' in '{field_path}' already holds a value"))
        })?;
    }
    match current.get_mut(leaf) {
        Some(Value::Array(values)) => values.push(wire),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, wire]);
        }
        None => {
            current.insert(leaf.to_string(), wire);
        }
    }
    Ok(())
}

// ============================================================================
// IndexingPlan
// ============================================================================

/// Queued document writes for one index.
pub struct IndexingPlan<'a> {
    client: &'a dyn IndexAdminClient,
    dialect: &'a dyn Dialect,
    emitter: MappingEmitter,
    identity: &'a IndexIdentity,
    tenant_id: Option<String>,
    works: Vec<Request>,
}

impl<'a> IndexingPlan<'a> {
    /// An empty plan writing to `identity`'s write alias.
    pub fn new(
        client: &'a dyn IndexAdminClient,
        dialect: &'a dyn Dialect,
        emitter: MappingEmitter,
        identity: &'a IndexIdentity,
    ) -> Self {
        Self {
            client,
            dialect,
            emitter,
            identity,
            tenant_id: None,
            works: Vec::new(),
        }
    }

    /// Tag every document with a tenant id.
    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.works.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.works.is_empty()
    }

    /// Queue an add-or-update of document `id`.
    pub fn add(&mut self, id: &str, source: Value) -> Result<()> {
        let Value::Object(mut source) = source else {
            return Err(Error::conversion(format!(
                "Document '{id}' must be a JSON object"
            )));
        };
        if let Some(reserved) = [DISCRIMINATOR_FIELD, TENANT_ID_FIELD]
            .into_iter()
            .find(|name| source.contains_key(*name))
        {
            return Err(Error::conversion(format!(
                "Document '{id}' sets '{reserved}', which is reserved for index metadata"
            )));
        }
        if self.emitter.type_name_mapping().requires_discriminator() {
            source.insert(
                DISCRIMINATOR_FIELD.to_string(),
                Value::String(self.identity.mapped_type_name().to_string()),
            );
        }
        if self.emitter.multi_tenancy() {
            let tenant_id = self.tenant_id.as_ref().ok_or_else(|| {
                Error::config(format!(
                    "Multi-tenancy is enabled but no tenant id was given for document '{id}'"
                ))
            })?;
            source.insert(TENANT_ID_FIELD.to_string(), Value::String(tenant_id.clone()));
        }
        self.works.push(work::index_document(
            self.dialect,
            self.identity.write_alias(),
            id,
            None,
            Value::Object(source),
        ));
        Ok(())
    }

    /// Queue a delete of document `id`.
    pub fn delete(&mut self, id: &str) {
        self.works.push(work::delete_document(
            self.dialect,
            self.identity.write_alias(),
            id,
            None,
        ));
    }

    /// Send the queued writes in order, then refresh the index so they are
    /// visible to searches. Returns the number of writes sent.
    ///
    /// Deleting a document that does not exist is not an error.
    pub async fn execute(self) -> Result<usize> {
        let count = self.works.len();
        log::debug!(
            "Executing {count} write(s) on index '{}'",
            self.identity.write_alias()
        );
        for request in self.works {
            let response = self.client.execute(request.clone()).await?;
            if request.method == work::Method::Delete && response.is_not_found() {
                continue;
            }
            response.into_success(&request)?;
        }
        if count > 0 {
            let refresh = work::refresh(self.dialect, &[self.identity.write_alias()]);
            let response = self.client.execute(refresh.clone()).await?;
            response.into_success(&refresh)?;
        }
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Elastic7Dialect;
    use crate::memory::InMemoryCluster;
    use crate::type_name::TypeNameMapping;
    use quarry_schema::analysis::AnalysisDefinitions;
    use quarry_schema::registry::KindRegistry;
    use quarry_schema::tree::ObjectStorage;
    use serde_json::json;

    fn tree() -> SchemaTree {
        let registry = KindRegistry::default();
        let analysis = AnalysisDefinitions::default();
        SchemaTree::builder(&registry, &analysis)
            .field("title", |t| t.as_string().build())
            .unwrap()
            .object_field("author", ObjectStorage::Flattened, |o| {
                o.field("name", |t| t.as_string().build())?
                    .field("born", |t| t.as_local_date().build())
            })
            .unwrap()
            .field("tags", |t| t.as_string().build())
            .unwrap()
            .build()
    }

    #[test]
    fn test_document_builder_nests_objects() {
        let tree = tree();
        let born = chrono::NaiveDate::from_ymd_opt(1812, 2, 7).unwrap();
        let source = DocumentBuilder::new(&tree)
            .value("title", "Bleak House")
            .unwrap()
            .value("author.name", "Dickens")
            .unwrap()
            .value("author.born", born)
            .unwrap()
            .value("tags", "novel")
            .unwrap()
            .value("tags", "serial")
            .unwrap()
            .build();
        assert_eq!(
            source,
            json!({
                "title": "Bleak House",
                "author": {"name": "Dickens", "born": "1812-02-07"},
                "tags": ["novel", "serial"]
            })
        );
    }

    #[test]
    fn test_document_builder_rejects_unknown_and_object_paths() {
        let tree = tree();
        assert!(matches!(
            DocumentBuilder::new(&tree).value("isbn", "x").unwrap_err(),
            Error::UnknownField { .. }
        ));
        assert!(DocumentBuilder::new(&tree).value("author", "x").is_err());
    }

    #[tokio::test]
    async fn test_plan_adds_metadata_and_refreshes() {
        let cluster = InMemoryCluster::default();
        let identity = IndexIdentity::new("books", "Book");
        cluster
            .create_raw(
                identity.primary(),
                &[(identity.write_alias(), true), (identity.read_alias(), false)],
                None,
            )
            .unwrap();
        let emitter = MappingEmitter::new(TypeNameMapping::Discriminator, true);
        let mut plan = IndexingPlan::new(&cluster, &Elastic7Dialect, emitter, &identity).tenant("acme");
        plan.add("1", json!({"title": "Emma"})).unwrap();
        plan.delete("2");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.execute().await.unwrap(), 2);

        let log = cluster.request_log();
        assert_eq!(log.last().unwrap(), "POST /books-write/_refresh");
        let search = work::search(&Elastic7Dialect, &["books-read"], json!({"query": {"match_all": {}}}));
        let response = cluster.execute(search).await.unwrap();
        let source = &response.body["hits"]["hits"][0]["_source"];
        assert_eq!(source[DISCRIMINATOR_FIELD], "Book");
        assert_eq!(source[TENANT_ID_FIELD], "acme");
    }

    #[tokio::test]
    async fn test_plan_requires_tenant_when_enabled() {
        let cluster = InMemoryCluster::default();
        let identity = IndexIdentity::new("books", "Book");
        let emitter = MappingEmitter::new(TypeNameMapping::IndexName, true);
        let mut plan = IndexingPlan::new(&cluster, &Elastic7Dialect, emitter, &identity);
        let err = plan.add("1", json!({})).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_plan_rejects_sources_setting_metadata() {
        let cluster = InMemoryCluster::default();
        let identity = IndexIdentity::new("books", "Book");
        let emitter = MappingEmitter::new(TypeNameMapping::Discriminator, false);
        let mut plan = IndexingPlan::new(&cluster, &Elastic7Dialect, emitter, &identity);
        let err = plan
            .add("1", json!({"title": "Emma", DISCRIMINATOR_FIELD: 7}))
            .unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
        assert!(err.to_string().contains("'_entity_type'"));
        assert!(plan.is_empty());
    }
}
