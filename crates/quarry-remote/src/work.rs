//! Request builders.
//!
//! Pure functions producing the requests the lifecycle controller and the
//! indexing plan send. Each takes the [`Dialect`] explicitly: type names,
//! document keywords, and the `include_type_name` parameter all differ
//! between cluster versions and must never be folded into one constant.

use serde_json::{Map, Value, json};
use std::fmt;

use crate::dialect::Dialect;
use quarry_core::{Error, Result};

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `PUT`
    Put,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Method.
    pub method: Method,
    /// Path, starting with `/`.
    pub path: String,
    /// Query parameters in insertion order.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
}

impl Request {
    fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn include_type_name(self, dialect: &dyn Dialect) -> Self {
        match dialect.include_type_name() {
            Some(include) => self.param("include_type_name", include),
            None => self,
        }
    }

    /// A query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v.as_str()))
    }

    /// Path followed by the encoded query string.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self.query.iter().map(|(n, v)| format!("{n}={v}")).collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path_and_query())
    }
}

/// A response from the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status.
    pub status: u16,
    /// JSON body; `Null` when there is none.
    pub body: Value,
}

impl Response {
    /// A response with a body.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status is 404.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// The body of a successful response, or a protocol error naming the
    /// request.
    pub fn into_success(self, request: &Request) -> Result<Value> {
        if self.is_success() {
            return Ok(self.body);
        }
        Err(Error::RemoteProtocol {
            method: request.method.to_string(),
            path: request.path_and_query(),
            status: self.status,
            message: error_reason(&self.body),
        })
    }
}

fn error_reason(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(reason)) => reason.clone(),
        Some(error) => {
            let kind = error.get("type").and_then(Value::as_str);
            let reason = error.get("reason").and_then(Value::as_str);
            match (kind, reason) {
                (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
                (None, Some(reason)) => reason.to_string(),
                _ => error.to_string(),
            }
        }
        None if body.is_null() => "no response body".to_string(),
        None => body.to_string(),
    }
}

fn wrap_mapping(dialect: &dyn Dialect, mapping: Value) -> Value {
    match dialect.type_name_for_mapping_api() {
        Some(type_name) => json!({ type_name: mapping }),
        None => mapping,
    }
}

/// `PUT /<primary>` creating the index with its aliases, mapping, and settings.
pub fn create_index(
    dialect: &dyn Dialect,
    primary: &str,
    aliases: Value,
    mapping: Value,
    settings: Option<Value>,
) -> Request {
    let mut body = Map::new();
    body.insert("aliases".into(), aliases);
    body.insert("mappings".into(), wrap_mapping(dialect, mapping));
    if let Some(settings) = settings {
        body.insert("settings".into(), settings);
    }
    Request::new(Method::Put, format!("/{primary}"))
        .include_type_name(dialect)
        .body(Value::Object(body))
}

/// `HEAD /<name>`.
pub fn index_exists(_dialect: &dyn Dialect, name: &str) -> Request {
    Request::new(Method::Head, format!("/{name}"))
}

/// `GET /<name>`, answered with one entry per primary index behind `name`.
pub fn get_index(_dialect: &dyn Dialect, name: &str) -> Request {
    Request::new(Method::Get, format!("/{name}"))
}

/// `GET /<name>/_mapping`.
pub fn get_mapping(dialect: &dyn Dialect, name: &str) -> Request {
    Request::new(Method::Get, format!("/{name}/_mapping")).include_type_name(dialect)
}

/// Extract the root mapping from a `_mapping` response.
///
/// Returns `None` when the index has no mapping at all.
pub fn parse_mapping_response(dialect: &dyn Dialect, body: &Value) -> Option<Value> {
    let (_, index) = body.as_object()?.iter().next()?;
    let mappings = index.get("mappings")?.as_object()?;
    let mapping = match dialect.type_name_for_mapping_api() {
        Some(type_name) => mappings.get(type_name)?.as_object()?,
        None => mappings,
    };
    if mapping.is_empty() {
        return None;
    }
    Some(Value::Object(mapping.clone()))
}

/// `PUT /<name>/_mapping` with the full expected mapping.
pub fn put_mapping(dialect: &dyn Dialect, name: &str, mapping: Value) -> Request {
    Request::new(Method::Put, format!("/{name}/_mapping"))
        .include_type_name(dialect)
        .body(wrap_mapping(dialect, mapping))
}

/// `DELETE /<primary>`.
pub fn delete_index(_dialect: &dyn Dialect, primary: &str) -> Request {
    Request::new(Method::Delete, format!("/{primary}"))
}

/// `PUT /<index>/_doc/<id>` (or `/doc/<id>` on legacy clusters).
pub fn index_document(
    dialect: &dyn Dialect,
    index: &str,
    id: &str,
    routing: Option<&str>,
    document: Value,
) -> Request {
    let request = Request::new(
        Method::Put,
        format!("/{index}/{}/{id}", dialect.type_keyword_for_non_mapping_api()),
    );
    match routing {
        Some(routing) => request.param("routing", routing),
        None => request,
    }
    .body(document)
}

/// `DELETE /<index>/_doc/<id>` (or `/doc/<id>` on legacy clusters).
pub fn delete_document(dialect: &dyn Dialect, index: &str, id: &str, routing: Option<&str>) -> Request {
    let request = Request::new(
        Method::Delete,
        format!("/{index}/{}/{id}", dialect.type_keyword_for_non_mapping_api()),
    );
    match routing {
        Some(routing) => request.param("routing", routing),
        None => request,
    }
}

/// `POST /<a,b>/_refresh`.
pub fn refresh(_dialect: &dyn Dialect, indexes: &[&str]) -> Request {
    Request::new(Method::Post, format!("/{}/_refresh", indexes.join(",")))
}

/// `POST /<a,b>/_search`.
pub fn search(_dialect: &dyn Dialect, indexes: &[&str], body: Value) -> Request {
    Request::new(Method::Post, format!("/{}/_search", indexes.join(","))).body(body)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Elastic6Dialect, Elastic7Dialect};

    #[test]
    fn test_create_index_current() {
        let request = create_index(
            &Elastic7Dialect,
            "books-000001",
            json!({"books-write": {"is_write_index": true}}),
            json!({"dynamic": "strict", "properties": {}}),
            None,
        );
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path_and_query(), "/books-000001");
        let body = request.body.unwrap();
        assert_eq!(body["mappings"]["dynamic"], "strict");
        assert!(body.get("settings").is_none());
    }

    #[test]
    fn test_create_index_legacy_wraps_type() {
        let request = create_index(
            &Elastic6Dialect,
            "books-000001",
            json!({}),
            json!({"dynamic": "strict"}),
            Some(json!({"analysis": {}})),
        );
        assert_eq!(
            request.path_and_query(),
            "/books-000001?include_type_name=true"
        );
        let body = request.body.unwrap();
        assert_eq!(body["mappings"]["doc"]["dynamic"], "strict");
        assert!(body.get("settings").is_some());
    }

    #[test]
    fn test_document_paths_follow_dialect() {
        let current = index_document(&Elastic7Dialect, "books-write", "1", None, json!({}));
        let legacy = index_document(&Elastic6Dialect, "books-write", "1", Some("r"), json!({}));
        assert_eq!(current.path, "/books-write/_doc/1");
        assert_eq!(legacy.path_and_query(), "/books-write/doc/1?routing=r");
        let delete = delete_document(&Elastic7Dialect, "books-write", "1", None);
        assert_eq!(delete.to_string(), "DELETE /books-write/_doc/1");
    }

    #[test]
    fn test_parse_mapping_response() {
        let current = json!({"books-000001": {"mappings": {"dynamic": "strict", "properties": {}}}});
        assert_eq!(
            parse_mapping_response(&Elastic7Dialect, &current).unwrap()["dynamic"],
            "strict"
        );

        let legacy = json!({"books-000001": {"mappings": {"doc": {"dynamic": "strict"}}}});
        assert_eq!(
            parse_mapping_response(&Elastic6Dialect, &legacy).unwrap()["dynamic"],
            "strict"
        );

        let empty = json!({"books-000001": {"mappings": {}}});
        assert!(parse_mapping_response(&Elastic6Dialect, &empty).is_none());
        assert!(parse_mapping_response(&Elastic7Dialect, &empty).is_none());
    }

    #[test]
    fn test_search_and_refresh_paths() {
        let request = search(&Elastic7Dialect, &["a-read", "b-read"], json!({"query": {"match_all": {}}}));
        assert_eq!(request.path, "/a-read,b-read/_search");
        assert_eq!(request.method, Method::Post);
        assert_eq!(refresh(&Elastic7Dialect, &["a-write"]).path, "/a-write/_refresh");
    }

    #[test]
    fn test_error_response() {
        let request = delete_index(&Elastic7Dialect, "missing-000001");
        let response = Response::new(
            404,
            json!({"error": {"type": "index_not_found_exception", "reason": "no such index"}}),
        );
        let err = response.into_success(&request).unwrap_err();
        assert!(matches!(err, Error::RemoteProtocol { status: 404, .. }));
        assert!(err.to_string().contains("index_not_found_exception: no such index"));
        assert!(err.to_string().contains("DELETE /missing-000001"));
    }
}
