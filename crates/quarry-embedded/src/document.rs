//! Codec-driven document conversion.
//!
//! Source documents are the same JSON the remote backend receives (see
//! `quarry_remote::DocumentBuilder`): nested objects following the schema
//! tree, arrays for multi-valued fields. Values are decoded through each
//! field's codec before being added to the Tantivy document.

use chrono::NaiveTime;
use serde_json::{Map, Value};
use tantivy::schema::Field;
use tantivy::{DateTime, TantivyDocument};

use quarry_core::{Error, Result, path};
use quarry_schema::FieldValue;

use crate::layout::FieldLayout;
use crate::schema::EmbeddedSchema;

/// Convert a JSON source document into a Tantivy document.
///
/// Properties starting with `_` are metadata and skipped; any other property
/// the schema does not declare is rejected.
pub fn to_document(schema: &EmbeddedSchema, id: &str, source: &Value) -> Result<TantivyDocument> {
    let root = source
        .as_object()
        .ok_or_else(|| Error::conversion(format!("Document '{id}' is not a JSON object")))?;
    check_declared(schema, None, root, id)?;

    let mut document = TantivyDocument::new();
    document.add_text(schema.id, id);
    for (field, layout) in schema.fields() {
        let mut values = Vec::new();
        collect_values(source, &path::segments(&layout.path).collect::<Vec<_>>(), &mut values);
        for value in values {
            add_value(&mut document, field, layout, value)?;
        }
    }
    Ok(document)
}

fn check_declared(schema: &EmbeddedSchema, parent: Option<&str>, object: &Map<String, Value>, id: &str) -> Result<()> {
    for (name, value) in object {
        if parent.is_none() && name.starts_with('_') {
            continue;
        }
        let path = path::join(parent, name);
        if schema.layout().is_object(&path) {
            for item in as_items(value) {
                if let Some(child) = item.as_object() {
                    check_declared(schema, Some(&path), child, id)?;
                }
            }
        } else if schema.field(&path).is_none() {
            return Err(Error::conversion(format!(
                "Document '{id}' has a value for undeclared field '{path}'"
            )));
        }
    }
    Ok(())
}

fn as_items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

/// Every value at `segments`, walking through arrays at any level.
fn collect_values<'v>(current: &'v Value, segments: &[&str], out: &mut Vec<&'v Value>) {
    match (current, segments.split_first()) {
        (Value::Array(items), _) => {
            for item in items {
                collect_values(item, segments, out);
            }
        }
        (Value::Object(object), Some((first, rest))) => {
            if let Some(child) = object.get(*first) {
                collect_values(child, rest, out);
            }
        }
        (value, None) => out.push(value),
        _ => {}
    }
}

fn add_value(document: &mut TantivyDocument, field: Field, layout: &FieldLayout, wire: &Value) -> Result<()> {
    let value = match (wire, &layout.null_value) {
        (Value::Null, Some(null_value)) => null_value.clone(),
        (Value::Null, None) => return Ok(()),
        (wire, _) => layout.codec.decode(wire)?,
    };
    match value {
        FieldValue::Bool(v) => document.add_bool(field, v),
        FieldValue::Int(v) => document.add_i64(field, i64::from(v)),
        FieldValue::Long(v) => document.add_i64(field, v),
        FieldValue::Double(v) => document.add_f64(field, v),
        FieldValue::LocalDate(date) => {
            let midnight = date.and_time(NaiveTime::MIN).and_utc();
            document.add_date(field, DateTime::from_timestamp_secs(midnight.timestamp()));
        }
        FieldValue::Instant(instant) => {
            document.add_date(field, DateTime::from_timestamp_millis(instant.timestamp_millis()));
        }
        FieldValue::String(v) => document.add_text(field, &v),
        FieldValue::GeoPoint(_) => {
            return Err(Error::conversion(format!(
                "Cannot index geo-point field '{}' in the embedded backend",
                layout.path
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
