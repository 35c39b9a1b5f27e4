//! An in-memory cluster.
//!
//! Answers the requests built by [`crate::work`] the way a real cluster
//! would, closely enough for lifecycle and type-name tests: indexes with
//! aliases, mappings (merged on `PUT _mapping`, strict dynamic enforced on
//! documents), settings, documents, and `match_all` searches.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::IndexAdminClient;
use crate::dialect::{Dialect, Elastic7Dialect};
use crate::work::{Method, Request, Response};
use quarry_core::{Error, Result};

const DEFAULT_SEARCH_SIZE: usize = 10;

#[derive(Debug, Default, Clone)]
struct StoredIndex {
    aliases: BTreeMap<String, bool>,
    mapping: Map<String, Value>,
    settings: Value,
    documents: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct ClusterState {
    indexes: BTreeMap<String, StoredIndex>,
}

impl ClusterState {
    fn resolve(&self, names: &str) -> Vec<String> {
        let mut primaries = Vec::new();
        for name in names.split(',') {
            if self.indexes.contains_key(name) {
                primaries.push(name.to_string());
                continue;
            }
            for (primary, index) in &self.indexes {
                if index.aliases.contains_key(name) && !primaries.contains(primary) {
                    primaries.push(primary.clone());
                }
            }
        }
        primaries
    }

    fn write_target(&self, name: &str) -> Option<String> {
        if self.indexes.contains_key(name) {
            return Some(name.to_string());
        }
        let candidates: Vec<(&String, bool)> = self
            .indexes
            .iter()
            .filter_map(|(primary, index)| index.aliases.get(name).map(|w| (primary, *w)))
            .collect();
        match candidates.as_slice() {
            [(primary, _)] => Some((*primary).clone()),
            many => many
                .iter()
                .find(|(_, is_write)| *is_write)
                .map(|(primary, _)| (*primary).clone()),
        }
    }

    fn alias_taken(&self, alias: &str) -> bool {
        self.indexes.contains_key(alias)
            || self
                .indexes
                .values()
                .any(|index| index.aliases.get(alias) == Some(&true))
    }
}

/// A cluster held in memory.
#[derive(Debug)]
pub struct InMemoryCluster {
    dialect: Arc<dyn Dialect>,
    state: Mutex<ClusterState>,
    log: Mutex<Vec<String>>,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new(Arc::new(Elastic7Dialect))
    }
}

impl InMemoryCluster {
    /// An empty cluster speaking `dialect`.
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            state: Mutex::new(ClusterState::default()),
            log: Mutex::new(Vec::new()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, ClusterState>> {
        self.state
            .lock()
            .map_err(|_| Error::transport("In-memory cluster state is poisoned"))
    }

    /// Create an index directly, bypassing the request surface.
    pub fn create_raw(&self, primary: &str, aliases: &[(&str, bool)], mapping: Option<Value>) -> Result<()> {
        let mut state = self.state()?;
        let index = StoredIndex {
            aliases: aliases
                .iter()
                .map(|(alias, is_write)| (alias.to_string(), *is_write))
                .collect(),
            mapping: mapping
                .and_then(|m| m.as_object().cloned())
                .unwrap_or_default(),
            settings: json!({}),
            documents: BTreeMap::new(),
        };
        state.indexes.insert(primary.to_string(), index);
        Ok(())
    }

    /// Replace the mapping of every index behind `name`.
    pub fn replace_mapping(&self, name: &str, mapping: Value) -> Result<()> {
        let mut state = self.state()?;
        let mapping = mapping.as_object().cloned().unwrap_or_default();
        for primary in state.resolve(name) {
            if let Some(index) = state.indexes.get_mut(&primary) {
                index.mapping = mapping.clone();
            }
        }
        Ok(())
    }

    /// The unwrapped mapping of the first index behind `name`.
    pub fn mapping(&self, name: &str) -> Option<Value> {
        let state = self.state().ok()?;
        let primary = state.resolve(name).into_iter().next()?;
        state
            .indexes
            .get(&primary)
            .map(|index| Value::Object(index.mapping.clone()))
    }

    /// The settings of the first index behind `name`.
    pub fn settings(&self, name: &str) -> Option<Value> {
        let state = self.state().ok()?;
        let primary = state.resolve(name).into_iter().next()?;
        state.indexes.get(&primary).map(|index| index.settings.clone())
    }

    /// Primary index names, sorted.
    pub fn index_names(&self) -> Vec<String> {
        self.state()
            .map(|state| state.indexes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Aliases of a primary index, sorted.
    pub fn aliases(&self, primary: &str) -> Vec<String> {
        self.state()
            .ok()
            .and_then(|state| {
                state
                    .indexes
                    .get(primary)
                    .map(|index| index.aliases.keys().cloned().collect())
            })
            .unwrap_or_default()
    }

    /// Number of documents behind `name`.
    pub fn document_count(&self, name: &str) -> usize {
        self.state()
            .map(|state| {
                state
                    .resolve(name)
                    .iter()
                    .filter_map(|primary| state.indexes.get(primary))
                    .map(|index| index.documents.len())
                    .sum()
            })
            .unwrap_or_default()
    }

    /// Every request received so far, rendered as `METHOD /path?query`.
    pub fn request_log(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn unwrap_mapping(&self, mappings: Option<&Value>) -> std::result::Result<Map<String, Value>, Response> {
        let Some(mappings) = mappings else {
            return Ok(Map::new());
        };
        let mappings = match self.dialect.type_name_for_mapping_api() {
            Some(type_name) => match mappings.as_object() {
                Some(m) if m.is_empty() => return Ok(Map::new()),
                Some(m) => m.get(type_name).ok_or_else(|| {
                    bad_request(
                        "illegal_argument_exception",
                        format!("mapping must be wrapped in type '{type_name}'"),
                    )
                })?,
                None => mappings,
            },
            None => mappings,
        };
        Ok(mappings.as_object().cloned().unwrap_or_default())
    }

    fn wrap_mapping(&self, mapping: &Map<String, Value>) -> Value {
        match self.dialect.type_name_for_mapping_api() {
            Some(_) if mapping.is_empty() => json!({}),
            Some(type_name) => json!({ type_name: mapping }),
            None => Value::Object(mapping.clone()),
        }
    }

    fn handle(&self, request: &Request) -> Result<Response> {
        let segments: Vec<&str> = request
            .path
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let keyword = self.dialect.type_keyword_for_non_mapping_api();
        let body = request.body.as_ref();

        let mut state = self.state()?;
        let response = match (request.method, segments.as_slice()) {
            (Method::Head, [name]) => {
                if state.resolve(name).is_empty() {
                    Response::new(404, Value::Null)
                } else {
                    Response::new(200, Value::Null)
                }
            }
            (Method::Get, [name]) => self.get_index(&state, name),
            (Method::Put, [name]) => self.create_index(&mut state, name, body),
            (Method::Delete, [name]) => delete_index(&mut state, name),
            (Method::Get, [name, "_mapping"]) => self.get_mapping(&state, name),
            (Method::Put, [name, "_mapping"]) => self.put_mapping(&mut state, name, body),
            (Method::Put, [name, kw, id]) if *kw == keyword => index_document(&mut state, name, id, body),
            (Method::Delete, [name, kw, id]) if *kw == keyword => delete_document(&mut state, name, id),
            (Method::Post, [names, "_refresh"]) => {
                if state.resolve(names).is_empty() {
                    not_found(names)
                } else {
                    Response::new(200, json!({"_shards": {"failed": 0}}))
                }
            }
            (Method::Post, [names, "_search"]) => self.search(&state, names, body),
            _ => bad_request(
                "unsupported_operation_exception",
                format!("{} is not supported by the in-memory cluster", request),
            ),
        };
        Ok(response)
    }

    fn get_index(&self, state: &ClusterState, name: &str) -> Response {
        let primaries = state.resolve(name);
        if primaries.is_empty() {
            return not_found(name);
        }
        let mut body = Map::new();
        for primary in primaries {
            if let Some(index) = state.indexes.get(&primary) {
                let aliases: Map<String, Value> = index
                    .aliases
                    .iter()
                    .map(|(alias, w)| (alias.clone(), json!({"is_write_index": w})))
                    .collect();
                body.insert(
                    primary,
                    json!({
                        "aliases": aliases,
                        "mappings": self.wrap_mapping(&index.mapping),
                        "settings": index.settings,
                    }),
                );
            }
        }
        Response::new(200, Value::Object(body))
    }

    fn create_index(&self, state: &mut ClusterState, name: &str, body: Option<&Value>) -> Response {
        if !state.resolve(name).is_empty() {
            return bad_request(
                "resource_already_exists_exception",
                format!("index [{name}] already exists"),
            );
        }
        let body = body.cloned().unwrap_or_else(|| json!({}));
        let mapping = match self.unwrap_mapping(body.get("mappings")) {
            Ok(mapping) => mapping,
            Err(response) => return response,
        };
        let mut aliases = BTreeMap::new();
        if let Some(requested) = body.get("aliases").and_then(Value::as_object) {
            for (alias, options) in requested {
                let is_write = options
                    .get("is_write_index")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if is_write && state.alias_taken(alias) {
                    return bad_request(
                        "illegal_state_exception",
                        format!("alias [{alias}] has more than one write index"),
                    );
                }
                aliases.insert(alias.clone(), is_write);
            }
        }
        state.indexes.insert(
            name.to_string(),
            StoredIndex {
                aliases,
                mapping,
                settings: body.get("settings").cloned().unwrap_or_else(|| json!({})),
                documents: BTreeMap::new(),
            },
        );
        Response::new(200, json!({"acknowledged": true, "index": name}))
    }

    fn get_mapping(&self, state: &ClusterState, name: &str) -> Response {
        let primaries = state.resolve(name);
        if primaries.is_empty() {
            return not_found(name);
        }
        let body: Map<String, Value> = primaries
            .into_iter()
            .filter_map(|primary| {
                let index = state.indexes.get(&primary)?;
                Some((primary, json!({"mappings": self.wrap_mapping(&index.mapping)})))
            })
            .collect();
        Response::new(200, Value::Object(body))
    }

    fn put_mapping(&self, state: &mut ClusterState, name: &str, body: Option<&Value>) -> Response {
        let primaries = state.resolve(name);
        if primaries.is_empty() {
            return not_found(name);
        }
        let update = match self.unwrap_mapping(body) {
            Ok(update) => update,
            Err(response) => return response,
        };
        for primary in &primaries {
            if let Some(index) = state.indexes.get(primary) {
                let mut merged = index.mapping.clone();
                if let Err(reason) = merge_mapping(&mut merged, &update, None) {
                    return bad_request("illegal_argument_exception", reason);
                }
                if let Some(index) = state.indexes.get_mut(primary) {
                    index.mapping = merged;
                }
            }
        }
        Response::new(200, json!({"acknowledged": true}))
    }

    fn search(&self, state: &ClusterState, names: &str, body: Option<&Value>) -> Response {
        let primaries = state.resolve(names);
        if primaries.is_empty() {
            return not_found(names);
        }
        let query = body.and_then(|b| b.get("query"));
        if let Some(query) = query {
            if query.get("match_all").is_none() {
                return bad_request(
                    "unsupported_operation_exception",
                    "only match_all queries are supported by the in-memory cluster",
                );
            }
        }
        let size = body
            .and_then(|b| b.get("size"))
            .and_then(Value::as_u64)
            .map_or(DEFAULT_SEARCH_SIZE, |s| s as usize);

        let mut hits = Vec::new();
        for primary in &primaries {
            if let Some(index) = state.indexes.get(primary) {
                for (id, source) in &index.documents {
                    let mut hit = json!({"_index": primary, "_id": id, "_score": 1.0, "_source": source});
                    if let Some(type_name) = self.dialect.type_name_for_mapping_api() {
                        hit["_type"] = json!(type_name);
                    }
                    hits.push(hit);
                }
            }
        }
        let total = hits.len();
        hits.truncate(size);
        Response::new(
            200,
            json!({"hits": {"total": {"value": total, "relation": "eq"}, "hits": hits}}),
        )
    }
}

#[async_trait]
impl IndexAdminClient for InMemoryCluster {
    async fn execute(&self, request: Request) -> Result<Response> {
        if let Ok(mut log) = self.log.lock() {
            log.push(request.to_string());
        }
        self.handle(&request)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

fn error_body(kind: &str, reason: impl Into<String>) -> Value {
    json!({"error": {"type": kind, "reason": reason.into()}})
}

fn bad_request(kind: &str, reason: impl Into<String>) -> Response {
    Response::new(400, error_body(kind, reason))
}

fn not_found(name: &str) -> Response {
    Response::new(
        404,
        error_body("index_not_found_exception", format!("no such index [{name}]")),
    )
}

fn delete_index(state: &mut ClusterState, name: &str) -> Response {
    if state.indexes.remove(name).is_some() {
        Response::new(200, json!({"acknowledged": true}))
    } else if !state.resolve(name).is_empty() {
        bad_request(
            "illegal_argument_exception",
            format!("The provided expression [{name}] matches an alias, specify the corresponding concrete indices instead."),
        )
    } else {
        not_found(name)
    }
}

fn index_document(state: &mut ClusterState, name: &str, id: &str, body: Option<&Value>) -> Response {
    let Some(primary) = state.write_target(name) else {
        return not_found(name);
    };
    let document = body.cloned().unwrap_or_else(|| json!({}));
    let Some(index) = state.indexes.get_mut(&primary) else {
        return not_found(name);
    };
    if let Some(field) = strict_violation(&index.mapping, &document, None) {
        return bad_request(
            "strict_dynamic_mapping_exception",
            format!("mapping set to strict, dynamic introduction of [{field}] is not allowed"),
        );
    }
    let (status, result) = match index.documents.insert(id.to_string(), document) {
        None => (201, "created"),
        Some(_) => (200, "updated"),
    };
    Response::new(status, json!({"_index": primary, "_id": id, "result": result}))
}

fn delete_document(state: &mut ClusterState, name: &str, id: &str) -> Response {
    let Some(primary) = state.write_target(name) else {
        return not_found(name);
    };
    match state
        .indexes
        .get_mut(&primary)
        .and_then(|index| index.documents.remove(id))
    {
        Some(_) => Response::new(200, json!({"_index": primary, "_id": id, "result": "deleted"})),
        None => Response::new(404, json!({"_index": primary, "_id": id, "result": "not_found"})),
    }
}

fn is_strict(mapping: &Map<String, Value>, inherited: bool) -> bool {
    match mapping.get("dynamic") {
        Some(Value::String(s)) => s == "strict",
        Some(_) => false,
        None => inherited,
    }
}

/// First document field a strict mapping does not declare.
fn strict_violation(mapping: &Map<String, Value>, document: &Value, prefix: Option<&str>) -> Option<String> {
    fn walk(mapping: &Map<String, Value>, document: &Value, prefix: Option<&str>, inherited: bool) -> Option<String> {
        let strict = is_strict(mapping, inherited);
        let properties = mapping.get("properties").and_then(Value::as_object);
        let fields = document.as_object()?;
        for (name, value) in fields {
            let path = quarry_core::path::join(prefix, name);
            match properties.and_then(|p| p.get(name)).and_then(Value::as_object) {
                Some(child) if child.contains_key("properties") => {
                    let values = match value {
                        Value::Array(items) => items.iter().collect(),
                        other => vec![other],
                    };
                    for item in values {
                        if let Some(found) = walk(child, item, Some(&path), strict) {
                            return Some(found);
                        }
                    }
                }
                Some(_) => {}
                None if strict => return Some(path),
                None => {}
            }
        }
        None
    }
    walk(mapping, document, prefix, false)
}

fn merge_mapping(
    target: &mut Map<String, Value>,
    update: &Map<String, Value>,
    prefix: Option<&str>,
) -> std::result::Result<(), String> {
    for (key, value) in update {
        if key != "properties" {
            if let (Some(existing), Some(new)) = (target.get("type"), value.as_str()) {
                if key == "type" && existing.as_str() != Some(new) {
                    return Err(format!(
                        "mapper [{}] cannot be changed from type [{}] to [{new}]",
                        prefix.unwrap_or_default(),
                        existing.as_str().unwrap_or_default()
                    ));
                }
            }
            if key == "dynamic" || !target.contains_key(key) {
                target.insert(key.clone(), value.clone());
            }
            continue;
        }
        let Some(new_properties) = value.as_object() else {
            continue;
        };
        let properties = target
            .entry("properties")
            .or_insert_with(|| json!({}));
        let Some(properties) = properties.as_object_mut() else {
            continue;
        };
        for (name, child) in new_properties {
            let path = quarry_core::path::join(prefix, name);
            match (properties.get_mut(name), child.as_object()) {
                (Some(Value::Object(existing)), Some(child)) => merge_mapping(existing, child, Some(&path))?,
                _ => {
                    properties.insert(name.clone(), child.clone());
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Elastic6Dialect;
    use crate::work;

    #[tokio::test]
    async fn test_create_and_resolve_aliases() {
        let cluster = InMemoryCluster::default();
        let request = work::create_index(
            &Elastic7Dialect,
            "books-000001",
            json!({"books-write": {"is_write_index": true}, "books-read": {"is_write_index": false}}),
            json!({"dynamic": "strict", "properties": {"title": {"type": "text"}}}),
            None,
        );
        let response = cluster.execute(request).await.unwrap();
        assert!(response.is_success());

        let exists = cluster
            .execute(work::index_exists(&Elastic7Dialect, "books-read"))
            .await
            .unwrap();
        assert_eq!(exists.status, 200);
        assert_eq!(cluster.aliases("books-000001"), vec!["books-read", "books-write"]);

        let again = work::create_index(&Elastic7Dialect, "books-000001", json!({}), json!({}), None);
        assert_eq!(cluster.execute(again).await.unwrap().status, 400);
    }

    #[tokio::test]
    async fn test_legacy_mapping_round_trip() {
        let cluster = InMemoryCluster::new(Arc::new(Elastic6Dialect));
        let request = work::create_index(
            &Elastic6Dialect,
            "books-000001",
            json!({"books-write": {"is_write_index": true}}),
            json!({"dynamic": "strict", "properties": {}}),
            None,
        );
        cluster.execute(request).await.unwrap();
        let response = cluster
            .execute(work::get_mapping(&Elastic6Dialect, "books-write"))
            .await
            .unwrap();
        let mapping = work::parse_mapping_response(&Elastic6Dialect, &response.body).unwrap();
        assert_eq!(mapping["dynamic"], "strict");
    }

    #[tokio::test]
    async fn test_put_mapping_merges_and_rejects_type_changes() {
        let cluster = InMemoryCluster::default();
        cluster
            .create_raw(
                "i-000001",
                &[("i-write", true)],
                Some(json!({"dynamic": false, "properties": {"a": {"type": "long"}}})),
            )
            .unwrap();
        let ok = work::put_mapping(
            &Elastic7Dialect,
            "i-write",
            json!({"dynamic": "strict", "properties": {"b": {"type": "keyword"}}}),
        );
        assert!(cluster.execute(ok).await.unwrap().is_success());
        let mapping = cluster.mapping("i-write").unwrap();
        assert_eq!(mapping["dynamic"], "strict");
        assert_eq!(mapping["properties"]["a"]["type"], "long");
        assert_eq!(mapping["properties"]["b"]["type"], "keyword");

        let conflict = work::put_mapping(
            &Elastic7Dialect,
            "i-write",
            json!({"properties": {"a": {"type": "integer"}}}),
        );
        let response = cluster.execute(conflict).await.unwrap();
        assert_eq!(response.status, 400);
        assert!(response.body.to_string().contains("cannot be changed from type [long] to [integer]"));
    }

    #[tokio::test]
    async fn test_documents_respect_strict_mapping() {
        let cluster = InMemoryCluster::default();
        cluster
            .create_raw(
                "i-000001",
                &[("i-write", true), ("i-read", false)],
                Some(json!({"dynamic": "strict", "properties": {"a": {"type": "long"}}})),
            )
            .unwrap();
        let ok = work::index_document(&Elastic7Dialect, "i-write", "1", None, json!({"a": 1}));
        assert_eq!(cluster.execute(ok).await.unwrap().status, 201);
        let bad = work::index_document(&Elastic7Dialect, "i-write", "2", None, json!({"b": 1}));
        let response = cluster.execute(bad).await.unwrap();
        assert_eq!(response.status, 400);
        assert!(response.body.to_string().contains("[b]"));
        assert_eq!(cluster.document_count("i-read"), 1);
    }

    #[tokio::test]
    async fn test_match_all_search_and_delete() {
        let cluster = InMemoryCluster::default();
        cluster.create_raw("a-000001", &[("a-read", false)], None).unwrap();
        cluster.create_raw("b-000001", &[("b-read", false)], None).unwrap();
        for (index, id) in [("a-000001", "1"), ("b-000001", "2")] {
            let request = work::index_document(&Elastic7Dialect, index, id, None, json!({}));
            cluster.execute(request).await.unwrap();
        }
        let search = work::search(&Elastic7Dialect, &["a-read", "b-read"], json!({"query": {"match_all": {}}}));
        let response = cluster.execute(search).await.unwrap();
        assert_eq!(response.body["hits"]["total"]["value"], 2);
        assert_eq!(response.body["hits"]["hits"][1]["_index"], "b-000001");

        let alias_delete = work::delete_index(&Elastic7Dialect, "a-read");
        assert_eq!(cluster.execute(alias_delete).await.unwrap().status, 400);
        let delete = work::delete_index(&Elastic7Dialect, "a-000001");
        assert!(cluster.execute(delete).await.unwrap().is_success());
        assert_eq!(cluster.index_names(), vec!["b-000001"]);
        assert_eq!(cluster.request_log().len(), 5);
    }
}
