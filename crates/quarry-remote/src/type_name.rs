//! Type-name mapping: which entity type does a search hit belong to?
//!
//! Several entity types may share one query. Each hit must be traced back to
//! its entity type name, which is done in one of two ways:
//!
//! - **index-name**: the hit's `_index` is a primary index name; its base
//!   name identifies the index and thus the type. Only works when primary
//!   names follow the `<base>-NNNNNN` shape.
//! - **discriminator**: every document carries its type name in the
//!   `_entity_type` keyword property. Works whatever the index names are.
//!
//! A query targeting a single index needs neither: every hit belongs to the
//! one type mapped to that index.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::names::{IndexIdentity, base_from_primary};
use quarry_core::{Error, Result};

/// Root property holding the entity type name.
pub const DISCRIMINATOR_FIELD: &str = "_entity_type";

/// How hits are traced back to entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeNameMapping {
    /// Infer the type from the primary index name.
    IndexName,
    /// Read the type from the discriminator property.
    #[default]
    Discriminator,
}

impl TypeNameMapping {
    /// Resolve a configured value; `None` or `null` selects the default.
    pub fn from_setting(value: Option<&str>) -> Result<Self> {
        match value {
            None => Ok(Self::default()),
            Some(value) if value.is_empty() || value == "null" => Ok(Self::default()),
            Some(value) => value.parse(),
        }
    }

    /// External name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeNameMapping::IndexName => "index-name",
            TypeNameMapping::Discriminator => "discriminator",
        }
    }

    /// Whether documents and mappings carry the discriminator property.
    pub fn requires_discriminator(&self) -> bool {
        matches!(self, TypeNameMapping::Discriminator)
    }
}

impl fmt::Display for TypeNameMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeNameMapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index-name" => Ok(TypeNameMapping::IndexName),
            "discriminator" => Ok(TypeNameMapping::Discriminator),
            other => Err(Error::config(format!(
                "Invalid type name mapping strategy '{other}'. Valid strategies are: index-name, discriminator"
            ))),
        }
    }
}

/// A hit traced back to its entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentReference {
    /// Entity type name.
    pub type_name: String,
    /// Document id.
    pub id: String,
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.id)
    }
}

/// Turns hits into [`DocumentReference`]s for one query scope.
#[derive(Debug, Clone)]
pub struct TypeNameExtractor<'a> {
    strategy: TypeNameMapping,
    scope: Vec<&'a IndexIdentity>,
}

impl<'a> TypeNameExtractor<'a> {
    /// An extractor for the indexes a query targets.
    pub fn new(strategy: TypeNameMapping, scope: impl IntoIterator<Item = &'a IndexIdentity>) -> Self {
        Self {
            strategy,
            scope: scope.into_iter().collect(),
        }
    }

    /// The strategy in use.
    pub fn strategy(&self) -> TypeNameMapping {
        self.strategy
    }

    /// Reference for one hit.
    pub fn extract(&self, hit: &Value) -> Result<DocumentReference> {
        let id = hit
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::conversion("Search hit without an '_id'"))?
            .to_string();

        if let [single] = self.scope.as_slice() {
            return Ok(DocumentReference {
                type_name: single.mapped_type_name().to_string(),
                id,
            });
        }

        let type_name = match self.strategy {
            TypeNameMapping::Discriminator => hit
                .get("_source")
                .and_then(|s| s.get(DISCRIMINATOR_FIELD))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::conversion(format!(
                        "Search hit '{id}' has no '{DISCRIMINATOR_FIELD}' property; \
                         was it indexed with the discriminator strategy?"
                    ))
                })?
                .to_string(),
            TypeNameMapping::IndexName => {
                let index = hit.get("_index").and_then(Value::as_str).unwrap_or_default();
                self.type_name_from_index(index)?.to_string()
            }
        };
        Ok(DocumentReference { type_name, id })
    }

    /// References for every hit of a search response, in hit order.
    pub fn extract_all(&self, response: &Value) -> Result<Vec<DocumentReference>> {
        response
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(Value::as_array)
            .map(|hits| hits.iter().map(|hit| self.extract(hit)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn type_name_from_index(&self, index: &str) -> Result<&'a str> {
        base_from_primary(index)
            .and_then(|base| {
                self.scope
                    .iter()
                    .copied()
                    .find(|identity| identity.base() == base)
            })
            .map(|identity| identity.mapped_type_name())
            .ok_or_else(|| {
                Error::conversion(format!(
                    "Cannot infer the entity type of a hit from index name '{index}'. \
                     The index-name type mapping requires primary index names of the form \
                     '<base>-NNNNNN'; use the discriminator type mapping instead"
                ))
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identities() -> Vec<IndexIdentity> {
        vec![
            IndexIdentity::new("index1_name", "type1_name"),
            IndexIdentity::new("index2_name", "type2_name"),
        ]
    }

    #[test]
    fn test_setting_values() {
        assert_eq!(TypeNameMapping::from_setting(None).unwrap(), TypeNameMapping::Discriminator);
        assert_eq!(
            TypeNameMapping::from_setting(Some("null")).unwrap(),
            TypeNameMapping::Discriminator
        );
        assert_eq!(
            TypeNameMapping::from_setting(Some("index-name")).unwrap(),
            TypeNameMapping::IndexName
        );
        assert!(TypeNameMapping::from_setting(Some("type-field")).is_err());
    }

    #[test]
    fn test_discriminator_extraction() {
        let ids = identities();
        let extractor = TypeNameExtractor::new(TypeNameMapping::Discriminator, &ids);
        let hit = json!({
            "_index": "index1_name-000001-somesuffix-000001",
            "_id": "1",
            "_source": {"_entity_type": "type1_name"}
        });
        let reference = extractor.extract(&hit).unwrap();
        assert_eq!(reference.type_name, "type1_name");
        assert_eq!(reference.to_string(), "type1_name#1");
    }

    #[test]
    fn test_index_name_extraction() {
        let ids = identities();
        let extractor = TypeNameExtractor::new(TypeNameMapping::IndexName, &ids);
        let hit = json!({"_index": "index2_name-000001", "_id": "7"});
        assert_eq!(extractor.extract(&hit).unwrap().type_name, "type2_name");
    }

    #[test]
    fn test_index_name_fails_on_irregular_names() {
        let ids = identities();
        let extractor = TypeNameExtractor::new(TypeNameMapping::IndexName, &ids);
        let hit = json!({"_index": "index1_name-somesuffix", "_id": "1"});
        let err = extractor.extract(&hit).unwrap_err();
        assert!(err.to_string().contains("index1_name-somesuffix"));
    }

    #[test]
    fn test_single_index_bypasses_strategy() {
        let ids = identities();
        let extractor = TypeNameExtractor::new(TypeNameMapping::IndexName, &ids[..1]);
        let hit = json!({"_index": "index1_name-000001-somesuffix-000001", "_id": "1"});
        assert_eq!(extractor.extract(&hit).unwrap().type_name, "type1_name");
    }

    #[test]
    fn test_extract_all_in_hit_order() {
        let ids = identities();
        let extractor = TypeNameExtractor::new(TypeNameMapping::Discriminator, &ids);
        let response = json!({"hits": {"hits": [
            {"_id": "2", "_source": {"_entity_type": "type2_name"}},
            {"_id": "1", "_source": {"_entity_type": "type1_name"}}
        ]}});
        let refs = extractor.extract_all(&response).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "2");
        assert!(extractor.extract_all(&json!({})).unwrap().is_empty());
    }
}
