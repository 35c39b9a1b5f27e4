//! Capability-guarded builder factories for the query DSLs.
//!
//! A [`FieldRef`] pairs an absolute path with its [`FieldType`]. Each factory
//! on it checks the matching capability bit and fails with
//! [`Error::NotCapable`] naming the path when the bit is clear. The builders
//! produce backend JSON fragments; values go through the field's converter
//! and codec on the way in, and back through them on the way out.
//!
//! ```rust
//! use quarry_schema::analysis::AnalysisDefinitions;
//! use quarry_schema::dsl::{FieldRef, PredicateKind};
//! use quarry_schema::field_type::{Toggle, TypeFactory};
//! use quarry_schema::registry::KindRegistry;
//!
//! let registry = KindRegistry::default();
//! let analysis = AnalysisDefinitions::default();
//! let title = TypeFactory::new(&registry, &analysis)
//!     .as_string()
//!     .searchable(Toggle::No)
//!     .build()
//!     .unwrap();
//!
//! let err = FieldRef::new("book.title", &title)
//!     .predicate(PredicateKind::Wildcard)
//!     .unwrap_err();
//! assert!(err.to_string().contains("'book.title' is not searchable"));
//! ```

use serde_json::{Map, Value, json};
use std::fmt;

use crate::converter::ValueConvert;
use crate::field_type::FieldType;
use crate::kind::ValueKind;
use crate::value::{FieldValue, GeoPoint};
use quarry_core::{Capability, Error, Result, path};

/// A resolved field: absolute path plus descriptor.
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    path: &'a str,
    field: &'a FieldType,
}

impl<'a> FieldRef<'a> {
    /// Pair a path with its descriptor.
    pub fn new(path: &'a str, field: &'a FieldType) -> Self {
        Self { path, field }
    }

    /// Absolute path.
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Descriptor.
    pub fn field_type(&self) -> &'a FieldType {
        self.field
    }

    /// Fail with [`Error::NotCapable`] unless `capability` is set.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.field.capabilities().has(capability) {
            Ok(())
        } else {
            Err(Error::NotCapable {
                path: self.path.to_string(),
                capability,
            })
        }
    }

    fn unsupported(&self, what: impl fmt::Display) -> Error {
        Error::incompatible(
            self.path,
            format!(
                "{what} are not supported by fields of type '{}'",
                self.field.kind()
            ),
        )
    }

    /// A predicate builder of the given kind.
    pub fn predicate(&self, kind: PredicateKind) -> Result<PredicateBuilder<'a>> {
        self.require(Capability::Searchable)?;
        match kind {
            PredicateKind::Wildcard | PredicateKind::Phrase if !self.field.kind().is_textual() => {
                return Err(self.unsupported(format_args!("Text predicates ({kind})")));
            }
            PredicateKind::Range
                if matches!(self.field.kind(), ValueKind::GeoPoint | ValueKind::Boolean) =>
            {
                return Err(self.unsupported("Range predicates"));
            }
            _ => {}
        }
        Ok(PredicateBuilder {
            field: *self,
            kind,
            convert: ValueConvert::Yes,
            value: None,
            lower: None,
            upper: None,
            slop: 0,
            boost: None,
        })
    }

    /// A sort builder.
    pub fn sort(&self, order: SortOrder, mode: Option<SortMode>) -> Result<SortBuilder<'a>> {
        self.require(Capability::Sortable)?;
        if let Some(mode) = mode {
            let numeric = matches!(
                self.field.kind(),
                ValueKind::Integer | ValueKind::Long | ValueKind::Double
            );
            if mode.is_arithmetic() && !numeric {
                return Err(self.unsupported(format_args!("Sort mode '{mode}' sorts")));
            }
        }
        Ok(SortBuilder {
            field: *self,
            order,
            mode,
            missing: None,
            center: None,
            convert: ValueConvert::Yes,
        })
    }

    /// A projection builder.
    pub fn projection(&self) -> Result<ProjectionBuilder<'a>> {
        self.require(Capability::Projectable)?;
        Ok(ProjectionBuilder {
            field: *self,
            convert: ValueConvert::Yes,
        })
    }

    /// An aggregation builder.
    pub fn aggregation(&self) -> Result<AggregationBuilder<'a>> {
        self.require(Capability::Aggregable)?;
        Ok(AggregationBuilder {
            field: *self,
            convert: ValueConvert::Yes,
        })
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// Predicate families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    /// Full value (or analyzed text) match.
    Match,
    /// Bounded range.
    Range,
    /// The field has a value.
    Exists,
    /// `*`/`?` pattern match on strings.
    Wildcard,
    /// Phrase match on strings.
    Phrase,
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PredicateKind::Match => "match",
            PredicateKind::Range => "range",
            PredicateKind::Exists => "exists",
            PredicateKind::Wildcard => "wildcard",
            PredicateKind::Phrase => "phrase",
        })
    }
}

/// One end of a range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBound {
    /// Bound value.
    pub value: FieldValue,
    /// Whether the bound itself matches.
    pub inclusive: bool,
}

impl RangeBound {
    /// An inclusive bound.
    pub fn included(value: impl Into<FieldValue>) -> Self {
        Self {
            value: value.into(),
            inclusive: true,
        }
    }

    /// An exclusive bound.
    pub fn excluded(value: impl Into<FieldValue>) -> Self {
        Self {
            value: value.into(),
            inclusive: false,
        }
    }
}

/// Builds one predicate on one field.
#[derive(Debug, Clone)]
pub struct PredicateBuilder<'a> {
    field: FieldRef<'a>,
    kind: PredicateKind,
    convert: ValueConvert,
    value: Option<FieldValue>,
    lower: Option<RangeBound>,
    upper: Option<RangeBound>,
    slop: u32,
    boost: Option<f32>,
}

impl<'a> PredicateBuilder<'a> {
    /// Choose the converter pair.
    pub fn convert(mut self, convert: ValueConvert) -> Self {
        self.convert = convert;
        self
    }

    /// The value to match, or the pattern/phrase for text predicates.
    pub fn matching(mut self, value: impl Into<FieldValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Lower range bound.
    pub fn above(mut self, bound: RangeBound) -> Self {
        self.lower = Some(bound);
        self
    }

    /// Upper range bound.
    pub fn below(mut self, bound: RangeBound) -> Self {
        self.upper = Some(bound);
        self
    }

    /// Phrase slop.
    pub fn slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
    }

    /// Score boost.
    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Produce the predicate JSON.
    pub fn build(self) -> Result<Value> {
        let path = self.field.path;
        let mut body = Map::new();
        let query = match self.kind {
            PredicateKind::Match => {
                let value = self.required_value("value")?;
                body.insert("query".into(), self.field.field.to_wire(value, self.convert)?);
                "match"
            }
            PredicateKind::Range => {
                if self.lower.is_none() && self.upper.is_none() {
                    return Err(self.invalid("range", "at least one bound must be set"));
                }
                if let Some(lower) = &self.lower {
                    let key = if lower.inclusive { "gte" } else { "gt" };
                    body.insert(key.into(), self.field.field.to_wire(lower.value.clone(), self.convert)?);
                }
                if let Some(upper) = &self.upper {
                    let key = if upper.inclusive { "lte" } else { "lt" };
                    body.insert(key.into(), self.field.field.to_wire(upper.value.clone(), self.convert)?);
                }
                "range"
            }
            PredicateKind::Exists => {
                let mut exists = json!({ "exists": { "field": path } });
                if let Some(boost) = self.boost {
                    exists["exists"]["boost"] = json!(boost);
                }
                return Ok(exists);
            }
            // Patterns are not values of the field: converters never apply.
            PredicateKind::Wildcard => {
                let pattern = self.required_text("pattern")?;
                body.insert("value".into(), Value::String(pattern));
                "wildcard"
            }
            PredicateKind::Phrase => {
                let phrase = self.required_text("phrase")?;
                body.insert("query".into(), Value::String(phrase));
                if self.slop > 0 {
                    body.insert("slop".into(), json!(self.slop));
                }
                "match_phrase"
            }
        };
        if let Some(boost) = self.boost {
            body.insert("boost".into(), json!(boost));
        }
        log::debug!("Built {} predicate on '{path}'", self.kind);
        Ok(json!({ query: { path: body } }))
    }

    fn required_value(&self, what: &str) -> Result<FieldValue> {
        self.value
            .clone()
            .ok_or_else(|| self.invalid(what, "must be non-null"))
    }

    fn required_text(&self, what: &str) -> Result<String> {
        match &self.value {
            Some(FieldValue::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.invalid(what, &format!("must be a string, got '{other}'"))),
            None => Err(self.invalid(what, "must be non-null")),
        }
    }

    fn invalid(&self, what: &str, reason: &str) -> Error {
        Error::config(format!(
            "Invalid {what} for {} predicate on field '{}': {reason}",
            self.kind, self.field.path
        ))
    }
}

// ============================================================================
// Sorts
// ============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// How multi-valued fields collapse to one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortMode {
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Sum of values.
    Sum,
    /// Average of values.
    Avg,
    /// Median of values.
    Median,
}

impl SortMode {
    fn is_arithmetic(&self) -> bool {
        matches!(self, SortMode::Sum | SortMode::Avg | SortMode::Median)
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortMode::Min => "min",
            SortMode::Max => "max",
            SortMode::Sum => "sum",
            SortMode::Avg => "avg",
            SortMode::Median => "median",
        })
    }
}

/// Where documents without a value go.
#[derive(Debug, Clone, PartialEq)]
pub enum MissingValue {
    /// Before all others.
    First,
    /// After all others.
    Last,
    /// As if they had this value.
    Use(FieldValue),
}

/// Builds one sort on one field.
#[derive(Debug, Clone)]
pub struct SortBuilder<'a> {
    field: FieldRef<'a>,
    order: SortOrder,
    mode: Option<SortMode>,
    missing: Option<MissingValue>,
    center: Option<GeoPoint>,
    convert: ValueConvert,
}

impl<'a> SortBuilder<'a> {
    /// Choose the converter pair for the missing value.
    pub fn convert(mut self, convert: ValueConvert) -> Self {
        self.convert = convert;
        self
    }

    /// Placement of documents without a value.
    pub fn missing(mut self, missing: MissingValue) -> Self {
        self.missing = Some(missing);
        self
    }

    /// Sort by distance to `center`; geo-point fields only.
    pub fn distance_from(mut self, center: GeoPoint) -> Self {
        self.center = Some(center);
        self
    }

    /// Produce the sort JSON.
    pub fn build(self) -> Result<Value> {
        let path = self.field.path;
        let geo = self.field.field.kind() == ValueKind::GeoPoint;
        match (geo, self.center) {
            (true, Some(center)) => {
                let mut sort = json!({
                    "_geo_distance": {
                        path: { "lat": center.lat, "lon": center.lon },
                        "order": self.order.as_str(),
                        "unit": "m"
                    }
                });
                if let Some(mode) = self.mode {
                    sort["_geo_distance"]["mode"] = json!(mode.to_string());
                }
                return Ok(sort);
            }
            (true, None) => {
                return Err(Error::incompatible(
                    path,
                    "geo-point fields can only be sorted by distance; set a center",
                ));
            }
            (false, Some(_)) => {
                return Err(self.field.unsupported("Distance sorts"));
            }
            (false, None) => {}
        }

        let mut body = Map::new();
        body.insert("order".into(), json!(self.order.as_str()));
        if let Some(mode) = self.mode {
            body.insert("mode".into(), json!(mode.to_string()));
        }
        match self.missing {
            Some(MissingValue::First) => {
                body.insert("missing".into(), json!("_first"));
            }
            Some(MissingValue::Last) => {
                body.insert("missing".into(), json!("_last"));
            }
            Some(MissingValue::Use(value)) => {
                body.insert("missing".into(), self.field.field.to_wire(value, self.convert)?);
            }
            None => {}
        }
        Ok(json!({ path: body }))
    }
}

// ============================================================================
// Projections
// ============================================================================

/// Extracts one field's values from a document source.
#[derive(Debug, Clone)]
pub struct ProjectionBuilder<'a> {
    field: FieldRef<'a>,
    convert: ValueConvert,
}

impl<'a> ProjectionBuilder<'a> {
    /// Choose the converter pair.
    pub fn convert(mut self, convert: ValueConvert) -> Self {
        self.convert = convert;
        self
    }

    /// The `_source` include path for this projection.
    pub fn source_path(&self) -> &'a str {
        self.field.path
    }

    /// All values at the field's path, flattening arrays along the way.
    pub fn extract_all(&self, source: &Value) -> Result<Vec<FieldValue>> {
        let mut current = vec![source];
        for segment in path::segments(self.field.path) {
            current = current
                .into_iter()
                .filter_map(|node| node.get(segment))
                .flat_map(flatten)
                .collect();
        }
        current
            .into_iter()
            .filter(|v| !v.is_null())
            .map(|wire| self.field.field.from_wire(wire, self.convert))
            .collect()
    }

    /// The first value at the field's path.
    pub fn extract(&self, source: &Value) -> Result<Option<FieldValue>> {
        Ok(self.extract_all(source)?.into_iter().next())
    }
}

fn flatten(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

// ============================================================================
// Aggregations
// ============================================================================

/// Builds aggregations on one field.
#[derive(Debug, Clone)]
pub struct AggregationBuilder<'a> {
    field: FieldRef<'a>,
    convert: ValueConvert,
}

impl<'a> AggregationBuilder<'a> {
    /// Choose the converter pair.
    pub fn convert(mut self, convert: ValueConvert) -> Self {
        self.convert = convert;
        self
    }

    /// A `terms` aggregation.
    pub fn terms(&self, size: Option<u32>) -> Value {
        let mut body = json!({ "field": self.field.path });
        if let Some(size) = size {
            body["size"] = json!(size);
        }
        json!({ "terms": body })
    }

    /// A `range` aggregation over `[from, to)` buckets.
    pub fn range(&self, ranges: &[(Option<FieldValue>, Option<FieldValue>)]) -> Result<Value> {
        if !self.field.field.kind().is_ordered() {
            return Err(self.field.unsupported("Range aggregations"));
        }
        let mut buckets = Vec::with_capacity(ranges.len());
        for (from, to) in ranges {
            let mut bucket = Map::new();
            if let Some(from) = from {
                bucket.insert("from".into(), self.field.field.to_wire(from.clone(), self.convert)?);
            }
            if let Some(to) = to {
                bucket.insert("to".into(), self.field.field.to_wire(to.clone(), self.convert)?);
            }
            buckets.push(Value::Object(bucket));
        }
        Ok(json!({ "range": { "field": self.field.path, "ranges": buckets } }))
    }

    /// Decode a bucket key returned by the backend.
    pub fn decode_key(&self, key: &Value) -> Result<FieldValue> {
        self.field.field.from_wire(key, self.convert)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisDefinitions;
    use crate::converter::Converter;
    use crate::field_type::{Toggle, TypeFactory};
    use crate::registry::KindRegistry;
    use chrono::NaiveDate;

    fn build(f: impl FnOnce(TypeFactory<'_>) -> Result<FieldType>) -> FieldType {
        let registry = KindRegistry::default();
        let analysis = AnalysisDefinitions::default();
        f(TypeFactory::new(&registry, &analysis)).unwrap()
    }

    #[test]
    fn test_wildcard_on_unsearchable_field() {
        let field = build(|t| t.as_string().searchable(Toggle::No).build());
        let err = FieldRef::new("myObject.myField", &field)
            .predicate(PredicateKind::Wildcard)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("myObject.myField"));
        assert!(message.contains("is not searchable"));
        assert!(message.contains("Make sure the field is marked as searchable"));
    }

    #[test]
    fn test_text_predicates_on_non_string() {
        let field = build(|t| t.as_integer().build());
        let err = FieldRef::new("count", &field)
            .predicate(PredicateKind::Wildcard)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Text predicates"));
        assert!(message.contains("are not supported by"));
        assert!(message.contains("'count'"));
    }

    #[test]
    fn test_wildcard_skips_converter() {
        let field = build(|t| {
            t.as_string()
                .dsl_converter(Converter::from_fn("reject", |_| {
                    Err(Error::conversion("should not be called"))
                }))
                .build()
        });
        let predicate = FieldRef::new("code", &field)
            .predicate(PredicateKind::Wildcard)
            .unwrap()
            .matching("ab*")
            .build()
            .unwrap();
        assert_eq!(predicate, json!({ "wildcard": { "code": { "value": "ab*" } } }));
    }

    #[test]
    fn test_wildcard_without_pattern() {
        let field = build(|t| t.as_string().build());
        let err = FieldRef::new("code", &field)
            .predicate(PredicateKind::Wildcard)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Invalid pattern"));
        assert!(err.to_string().contains("must be non-null"));
    }

    #[test]
    fn test_match_encodes_through_codec() {
        let field = build(|t| t.as_local_date().build());
        let predicate = FieldRef::new("published", &field)
            .predicate(PredicateKind::Match)
            .unwrap()
            .matching(NaiveDate::from_ymd_opt(2001, 2, 3).unwrap())
            .build()
            .unwrap();
        assert_eq!(
            predicate,
            json!({ "match": { "published": { "query": "2001-02-03" } } })
        );
    }

    #[test]
    fn test_range_bounds() {
        let field = build(|t| t.as_long().build());
        let predicate = FieldRef::new("size", &field)
            .predicate(PredicateKind::Range)
            .unwrap()
            .above(RangeBound::included(10_i64))
            .below(RangeBound::excluded(20_i64))
            .build()
            .unwrap();
        assert_eq!(
            predicate,
            json!({ "range": { "size": { "gte": 10, "lt": 20 } } })
        );
    }

    #[test]
    fn test_range_on_geo_point_is_unsupported() {
        let field = build(|t| t.as_geo_point().build());
        assert!(matches!(
            FieldRef::new("location", &field).predicate(PredicateKind::Range),
            Err(Error::IncompatibleScope { .. })
        ));
    }

    #[test]
    fn test_sort_requires_sortable() {
        let field = build(|t| t.as_integer().build());
        let err = FieldRef::new("rank", &field)
            .sort(SortOrder::Asc, None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Field 'rank' is not sortable. Make sure the field is marked as sortable."
        );
    }

    #[test]
    fn test_sort_json() {
        let field = build(|t| t.as_integer().sortable(Toggle::Yes).build());
        let sort = FieldRef::new("rank", &field)
            .sort(SortOrder::Desc, Some(SortMode::Avg))
            .unwrap()
            .missing(MissingValue::Use(FieldValue::Int(0)))
            .build()
            .unwrap();
        assert_eq!(
            sort,
            json!({ "rank": { "order": "desc", "mode": "avg", "missing": 0 } })
        );
    }

    #[test]
    fn test_sort_mode_avg_on_string() {
        let field = build(|t| t.as_string().sortable(Toggle::Yes).build());
        assert!(
            FieldRef::new("name", &field)
                .sort(SortOrder::Asc, Some(SortMode::Avg))
                .is_err()
        );
    }

    #[test]
    fn test_geo_distance_sort() {
        let field = build(|t| t.as_geo_point().sortable(Toggle::Yes).build());
        let sort = FieldRef::new("location", &field)
            .sort(SortOrder::Asc, None)
            .unwrap()
            .distance_from(GeoPoint::new(1.5, 2.5))
            .build()
            .unwrap();
        assert_eq!(
            sort,
            json!({
                "_geo_distance": {
                    "location": { "lat": 1.5, "lon": 2.5 },
                    "order": "asc",
                    "unit": "m"
                }
            })
        );
    }

    #[test]
    fn test_projection_walks_nested_source() {
        let field = build(|t| {
            t.as_string()
                .projectable(Toggle::Yes)
                .projection_converter(Converter::from_fn("len", |v| {
                    Ok(FieldValue::Int(v.as_str().map_or(0, str::len) as i32))
                }))
                .build()
        });
        let source = json!({ "authors": [ { "name": "ab" }, { "name": "cde" } ] });
        let projection = FieldRef::new("authors.name", &field).projection().unwrap();

        assert_eq!(
            projection.extract_all(&source).unwrap(),
            vec![FieldValue::Int(2), FieldValue::Int(3)]
        );
        assert_eq!(
            projection
                .clone()
                .convert(ValueConvert::No)
                .extract(&source)
                .unwrap(),
            Some(FieldValue::from("ab"))
        );
        assert_eq!(projection.extract(&json!({})).unwrap(), None);
    }

    #[test]
    fn test_aggregations() {
        let field = build(|t| t.as_integer().sortable(Toggle::Yes).build());
        let aggregation = FieldRef::new("rank", &field).aggregation().unwrap();
        assert_eq!(
            aggregation.terms(Some(5)),
            json!({ "terms": { "field": "rank", "size": 5 } })
        );
        assert_eq!(
            aggregation
                .range(&[(None, Some(FieldValue::Int(10))), (Some(FieldValue::Int(10)), None)])
                .unwrap(),
            json!({ "range": { "field": "rank", "ranges": [ { "to": 10 }, { "from": 10 } ] } })
        );
        assert_eq!(aggregation.decode_key(&json!(7)).unwrap(), FieldValue::Int(7));
    }

    #[test]
    fn test_aggregation_requires_aggregable() {
        let field = build(|t| t.as_string().build());
        assert!(matches!(
            FieldRef::new("tag", &field).aggregation(),
            Err(Error::NotCapable {
                capability: Capability::Aggregable,
                ..
            })
        ));
    }
}
