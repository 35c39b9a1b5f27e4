//! Mapping validator.
//!
//! Compares the mapping observed on a live index with the mapping the
//! emitter would produce, and reports every discrepancy at once.
//!
//! # Rules
//!
//! - Only expected properties are checked; extra observed properties are
//!   ignored.
//! - `type`, `analyzer`, `normalizer`, `format`, and `null_value` must be
//!   equal, absent values standing for the cluster default (`object` for
//!   `type`, `default` for `analyzer`).
//! - `index`, `store`, `doc_values`, and `norms` only need to be enabled when
//!   enabled in the expected mapping; an absent value stands for the cluster
//!   default for the observed type.
//! - `dynamic` must be `strict` on the root and on every object; an object
//!   without its own setting inherits its parent's.
//! - A root metadata property (`_entity_type`, `_tenant_id`) of another type
//!   is reported as unexpected.
//! - Other attributes (`ignore_malformed`, `coerce`, `similarity`, ...) are
//!   never looked at.
//!
//! Records are ordered by field in depth-first declaration order, and within
//! a field by attribute in canonical order.

use serde_json::Value;
use std::fmt;

use crate::dialect::Dialect;
use quarry_core::failure::{ContextFrame, FailureCollector, FailureKind, FailureRecord, FailureReport};
use quarry_core::path;
use quarry_schema::mapping::{DynamicMapping, OBJECT_TYPE, Properties, PropertyMapping, TEXT_TYPE};
use quarry_schema::tree::METADATA_PREFIX;

/// Literal context frame of every validation record.
pub const SCHEMA_VALIDATION_CONTEXT: &str = "schema validation";
/// What is missing when an expected property is absent.
pub const PROPERTY_MAPPING: &str = "property mapping";
/// What is missing when the index has no mapping at all.
pub const TYPE_MAPPING: &str = "type mapping";

const DEFAULT_ANALYZER: &str = "default";
const NULL: &str = "null";

/// Validates observed mappings against expected ones.
#[derive(Debug, Clone, Copy)]
pub struct MappingValidator {
    empty_mapping_possible: bool,
}

impl MappingValidator {
    /// A validator for the given dialect.
    pub fn new(dialect: &dyn Dialect) -> Self {
        Self {
            empty_mapping_possible: dialect.is_empty_mapping_possible(),
        }
    }

    /// Validate one index. `observed` is `None` when the index has no
    /// mapping.
    pub fn validate(
        &self,
        index_name: &str,
        expected: &PropertyMapping,
        observed: Option<&PropertyMapping>,
    ) -> FailureReport {
        let mut collector = FailureCollector::new();
        collector.within(ContextFrame::index(index_name), |c| {
            c.within(ContextFrame::literal(SCHEMA_VALIDATION_CONTEXT), |c| {
                match observed {
                    Some(observed) => validate_root(c, expected, observed),
                    None if self.empty_mapping_possible => {
                        c.record(FailureKind::missing(TYPE_MAPPING))
                    }
                    None => validate_root(c, expected, &PropertyMapping::default()),
                }
            })
        });
        let report = collector.finish();
        if report.is_empty() {
            log::debug!("Mapping of index '{index_name}' is valid");
        } else {
            log::warn!(
                "Mapping of index '{index_name}' has {} discrepancies",
                report.len()
            );
        }
        report
    }

    /// Validate one index against a raw observed mapping.
    pub fn validate_json(
        &self,
        index_name: &str,
        expected: &PropertyMapping,
        observed: Option<&Value>,
    ) -> FailureReport {
        let observed = observed.map(PropertyMapping::from_json);
        self.validate(index_name, expected, observed.as_ref())
    }
}

/// Whether a `PUT _mapping` with the expected mapping fixes the record:
/// missing properties can be added and `dynamic` can be changed, anything
/// else requires recreating the index.
pub fn is_patchable(record: &FailureRecord) -> bool {
    match &record.kind {
        FailureKind::Missing { what } => what == PROPERTY_MAPPING || what == TYPE_MAPPING,
        FailureKind::InvalidValue { .. } => record.attribute() == Some("dynamic"),
        FailureKind::Unexpected { .. } => false,
    }
}

fn effective_dynamic(observed: &PropertyMapping, inherited: DynamicMapping) -> DynamicMapping {
    observed.dynamic.unwrap_or(inherited)
}

fn validate_root(c: &mut FailureCollector, expected: &PropertyMapping, observed: &PropertyMapping) {
    let dynamic = effective_dynamic(observed, DynamicMapping::True);
    check_dynamic(c, expected.dynamic, dynamic);
    if let Some(properties) = &expected.properties {
        validate_properties(c, None, properties, observed.properties.as_ref(), dynamic);
    }
}

fn validate_properties(
    c: &mut FailureCollector,
    prefix: Option<&str>,
    expected: &Properties,
    observed: Option<&Properties>,
    parent_dynamic: DynamicMapping,
) {
    for (name, expected) in expected.iter() {
        let absolute = path::join(prefix, name);
        let observed = observed.and_then(|o| o.get(name));
        c.within(ContextFrame::field(&absolute), |c| match observed {
            None => c.record(FailureKind::missing(PROPERTY_MAPPING)),
            Some(observed) if prefix.is_none() && name.starts_with(METADATA_PREFIX) => {
                validate_metadata(c, expected, observed, parent_dynamic)
            }
            Some(observed) => validate_attributes(c, expected, observed, parent_dynamic),
        });
        if let (Some(children), Some(observed)) = (&expected.properties, observed) {
            let dynamic = effective_dynamic(observed, parent_dynamic);
            validate_properties(
                c,
                Some(&absolute),
                children,
                observed.properties.as_ref(),
                dynamic,
            );
        } else if let Some(children) = &expected.properties {
            validate_properties(c, Some(&absolute), children, None, parent_dynamic);
        }
    }
}

/// Metadata properties (discriminator, tenant id) are reserved: an observed
/// mapping of another type belongs to something else entirely.
fn validate_metadata(
    c: &mut FailureCollector,
    expected: &PropertyMapping,
    observed: &PropertyMapping,
    parent_dynamic: DynamicMapping,
) {
    let observed_type = observed.type_name.as_deref().unwrap_or(OBJECT_TYPE);
    if expected.type_name.as_deref() != Some(observed_type) {
        c.record_attribute(
            "type",
            FailureKind::unexpected(format!("'{observed_type}' mapping of a metadata property")),
        );
        return;
    }
    validate_attributes(c, expected, observed, parent_dynamic);
}

fn validate_attributes(
    c: &mut FailureCollector,
    expected: &PropertyMapping,
    observed: &PropertyMapping,
    parent_dynamic: DynamicMapping,
) {
    let observed_type = observed
        .type_name
        .as_deref()
        .or(observed.properties.as_ref().map(|_| OBJECT_TYPE));
    check_equal(
        c,
        "type",
        expected.type_name.as_deref(),
        observed_type,
        Some(OBJECT_TYPE),
    );

    let text = observed_type == Some(TEXT_TYPE);
    check_enabled(c, "index", expected.index, observed.index, true);
    check_enabled(c, "store", expected.store, observed.store, false);
    check_enabled(c, "doc_values", expected.doc_values, observed.doc_values, !text);
    check_enabled(c, "norms", expected.norms, observed.norms, text);

    check_equal(
        c,
        "analyzer",
        expected.analyzer.as_deref(),
        observed.analyzer.as_deref(),
        Some(DEFAULT_ANALYZER),
    );
    check_equal(
        c,
        "normalizer",
        expected.normalizer.as_deref(),
        observed.normalizer.as_deref(),
        None,
    );
    check_equal(
        c,
        "format",
        expected.format.as_deref(),
        observed.format.as_deref(),
        None,
    );
    if expected.null_value != observed.null_value {
        c.record_attribute(
            "null_value",
            FailureKind::invalid_value(
                render_json(expected.null_value.as_ref()),
                render_json(observed.null_value.as_ref()),
            ),
        );
    }

    if expected.is_object() {
        check_dynamic(c, expected.dynamic, effective_dynamic(observed, parent_dynamic));
    } else if observed.properties.is_some() {
        c.record_attribute("properties", FailureKind::unexpected("properties"));
    }
}

fn check_dynamic(c: &mut FailureCollector, expected: Option<DynamicMapping>, observed: DynamicMapping) {
    if let Some(expected) = expected {
        if expected != observed {
            c.record_attribute("dynamic", FailureKind::invalid_value(expected, observed));
        }
    }
}

fn check_equal(
    c: &mut FailureCollector,
    attribute: &str,
    expected: Option<&str>,
    observed: Option<&str>,
    default: Option<&str>,
) {
    let expected = expected.or(default);
    let observed = observed.or(default);
    if expected != observed {
        c.record_attribute(
            attribute,
            FailureKind::invalid_value(Rendered(expected), Rendered(observed)),
        );
    }
}

fn check_enabled(
    c: &mut FailureCollector,
    attribute: &str,
    expected: Option<bool>,
    observed: Option<bool>,
    default: bool,
) {
    if expected == Some(true) {
        let observed = observed.unwrap_or(default);
        if !observed {
            c.record_attribute(attribute, FailureKind::invalid_value(true, observed));
        }
    }
}

struct Rendered<'a>(Option<&'a str>);

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.unwrap_or(NULL))
    }
}

fn render_json(value: Option<&Value>) -> String {
    match value {
        None => NULL.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
