//! Codecs between domain values and the backend's wire representation.
//!
//! Codecs are value-typed: two equal codecs produce interchangeable storage.
//! Date codecs carry the format patterns declared in the mapping, and two
//! date codecs are only compatible when those patterns match byte for byte.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value, json};

use crate::kind::ValueKind;
use crate::value::{FieldValue, GeoPoint};
use quarry_core::{Error, Result};

/// Separator between date format patterns in a mapping's `format`.
pub const FORMAT_SEPARATOR: &str = "||";

/// Date format patterns declared for the two temporal kinds.
///
/// Backends supply their own lists; the defaults accept plain ISO dates and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateFormats {
    /// Patterns for `local-date` fields.
    pub local_date: Vec<String>,
    /// Patterns for `instant` fields.
    pub instant: Vec<String>,
}

impl Default for DateFormats {
    fn default() -> Self {
        Self {
            local_date: vec![
                "yyyy-MM-dd".to_string(),
                "yyyy-MM-dd'T'HH:mm:ssZ".to_string(),
            ],
            instant: vec![
                "strict_date_optional_time".to_string(),
                "epoch_millis".to_string(),
            ],
        }
    }
}

impl DateFormats {
    /// The `local-date` patterns joined with `||`.
    pub fn concatenated_local_date(&self) -> String {
        self.local_date.join(FORMAT_SEPARATOR)
    }

    /// The `instant` patterns joined with `||`.
    pub fn concatenated_instant(&self) -> String {
        self.instant.join(FORMAT_SEPARATOR)
    }
}

/// The codec for one value kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Codec {
    /// JSON booleans.
    Boolean,
    /// JSON numbers in `i32` range.
    Integer,
    /// JSON numbers in `i64` range.
    Long,
    /// JSON floating point numbers.
    Double,
    /// `yyyy-MM-dd` strings.
    LocalDate {
        /// Declared format patterns.
        formats: Vec<String>,
    },
    /// RFC 3339 strings with millisecond precision, UTC.
    Instant {
        /// Declared format patterns.
        formats: Vec<String>,
    },
    /// JSON strings.
    String,
    /// `{"lat": .., "lon": ..}` objects.
    GeoPoint,
}

impl Codec {
    /// The codec for `kind`, using `formats` for temporal kinds.
    pub fn for_kind(kind: ValueKind, formats: &DateFormats) -> Self {
        match kind {
            ValueKind::Boolean => Codec::Boolean,
            ValueKind::Integer => Codec::Integer,
            ValueKind::Long => Codec::Long,
            ValueKind::Double => Codec::Double,
            ValueKind::LocalDate => Codec::LocalDate {
                formats: formats.local_date.clone(),
            },
            ValueKind::Instant => Codec::Instant {
                formats: formats.instant.clone(),
            },
            ValueKind::String => Codec::String,
            ValueKind::GeoPoint => Codec::GeoPoint,
        }
    }

    /// The kind this codec handles.
    pub fn kind(&self) -> ValueKind {
        match self {
            Codec::Boolean => ValueKind::Boolean,
            Codec::Integer => ValueKind::Integer,
            Codec::Long => ValueKind::Long,
            Codec::Double => ValueKind::Double,
            Codec::LocalDate { .. } => ValueKind::LocalDate,
            Codec::Instant { .. } => ValueKind::Instant,
            Codec::String => ValueKind::String,
            Codec::GeoPoint => ValueKind::GeoPoint,
        }
    }

    /// The mapping `format` attribute, for temporal codecs.
    pub fn format(&self) -> Option<String> {
        match self {
            Codec::LocalDate { formats } | Codec::Instant { formats } => {
                Some(formats.join(FORMAT_SEPARATOR))
            }
            _ => None,
        }
    }

    /// Whether values encoded by `self` and `other` are interchangeable.
    pub fn is_compatible_with(&self, other: &Codec) -> bool {
        self == other
    }

    /// Encode a domain value.
    ///
    /// Integer values are widened into `long` and `double` codecs; any other
    /// kind mismatch is a conversion error.
    pub fn encode(&self, value: &FieldValue) -> Result<Value> {
        match (self, value) {
            (Codec::Boolean, FieldValue::Bool(v)) => Ok(Value::Bool(*v)),
            (Codec::Integer, FieldValue::Int(v)) => Ok(json!(v)),
            (Codec::Long, FieldValue::Int(v)) => Ok(json!(i64::from(*v))),
            (Codec::Long, FieldValue::Long(v)) => Ok(json!(v)),
            (Codec::Double, FieldValue::Double(v)) => encode_double(*v),
            (Codec::Double, FieldValue::Int(v)) => encode_double(f64::from(*v)),
            (Codec::LocalDate { .. }, FieldValue::LocalDate(v)) => {
                Ok(Value::String(v.format("%Y-%m-%d").to_string()))
            }
            (Codec::Instant { .. }, FieldValue::Instant(v)) => Ok(Value::String(
                v.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            (Codec::String, FieldValue::String(v)) => Ok(Value::String(v.clone())),
            (Codec::GeoPoint, FieldValue::GeoPoint(p)) => {
                Ok(json!({ "lat": p.lat, "lon": p.lon }))
            }
            (codec, value) => Err(Error::conversion(format!(
                "Cannot encode a {} value with the {} codec",
                value.kind(),
                codec.kind()
            ))),
        }
    }

    /// Decode a wire value.
    ///
    /// Temporal codecs also accept epoch milliseconds, which is what the
    /// backend returns as aggregation keys.
    pub fn decode(&self, wire: &Value) -> Result<FieldValue> {
        let decoded = match self {
            Codec::Boolean => wire.as_bool().map(FieldValue::Bool),
            Codec::Integer => wire
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(FieldValue::Int),
            Codec::Long => wire.as_i64().map(FieldValue::Long),
            Codec::Double => wire.as_f64().map(FieldValue::Double),
            Codec::LocalDate { .. } => decode_local_date(wire).map(FieldValue::LocalDate),
            Codec::Instant { .. } => decode_instant(wire).map(FieldValue::Instant),
            Codec::String => wire.as_str().map(|s| FieldValue::String(s.to_string())),
            Codec::GeoPoint => decode_geo_point(wire).map(FieldValue::GeoPoint),
        };
        decoded.ok_or_else(|| {
            Error::conversion(format!(
                "Cannot decode '{wire}' with the {} codec",
                self.kind()
            ))
        })
    }
}

fn encode_double(v: f64) -> Result<Value> {
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| Error::conversion(format!("Cannot encode non-finite double {v}")))
}

fn decode_local_date(wire: &Value) -> Option<NaiveDate> {
    match wire {
        Value::String(s) => NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok(),
        Value::Number(n) => {
            DateTime::from_timestamp_millis(n.as_i64()?).map(|dt| dt.date_naive())
        }
        _ => None,
    }
}

fn decode_instant(wire: &Value) -> Option<DateTime<Utc>> {
    match wire {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        _ => None,
    }
}

fn decode_geo_point(wire: &Value) -> Option<GeoPoint> {
    match wire {
        Value::Object(map) => Some(GeoPoint::new(
            map.get("lat")?.as_f64()?,
            map.get("lon")?.as_f64()?,
        )),
        Value::String(s) => {
            let (lat, lon) = s.split_once(',')?;
            Some(GeoPoint::new(
                lat.trim().parse().ok()?,
                lon.trim().parse().ok()?,
            ))
        }
        // GeoJSON order.
        Value::Array(items) if items.len() == 2 => {
            Some(GeoPoint::new(items[1].as_f64()?, items[0].as_f64()?))
        }
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
