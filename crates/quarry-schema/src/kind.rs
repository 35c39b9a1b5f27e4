//! Logical value kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use quarry_core::{Error, Result};

/// A closed enumeration of logical value domains.
///
/// Each kind fixes a canonical storage representation, see
/// [`Codec`](crate::codec::Codec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// `true` / `false`.
    Boolean,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Long,
    /// 64-bit float.
    Double,
    /// A calendar date without time zone.
    LocalDate,
    /// A point on the UTC time line.
    Instant,
    /// A string; keyword by default, text when analyzed.
    String,
    /// A latitude/longitude pair.
    GeoPoint,
}

impl ValueKind {
    /// All kinds in declaration order.
    pub const ALL: [ValueKind; 8] = [
        ValueKind::Boolean,
        ValueKind::Integer,
        ValueKind::Long,
        ValueKind::Double,
        ValueKind::LocalDate,
        ValueKind::Instant,
        ValueKind::String,
        ValueKind::GeoPoint,
    ];

    /// The external name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Long => "long",
            ValueKind::Double => "double",
            ValueKind::LocalDate => "local-date",
            ValueKind::Instant => "instant",
            ValueKind::String => "string",
            ValueKind::GeoPoint => "geo-point",
        }
    }

    /// Whether values of this kind have a natural total order.
    ///
    /// For ordered kinds, aggregability defaults to sortability.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            ValueKind::Integer
                | ValueKind::Long
                | ValueKind::Double
                | ValueKind::LocalDate
                | ValueKind::Instant
        )
    }

    /// Whether this kind is a date or time kind.
    pub fn is_temporal(&self) -> bool {
        matches!(self, ValueKind::LocalDate | ValueKind::Instant)
    }

    /// Whether text predicates (wildcard, phrase) and analysis apply.
    pub fn is_textual(&self) -> bool {
        matches!(self, ValueKind::String)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ValueKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnsupportedKind {
                name: s.to_string(),
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_roundtrips_every_kind() {
        for kind in ValueKind::ALL {
            assert_eq!(kind.as_str().parse::<ValueKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_from_str_unknown() {
        let err = "uuid".parse::<ValueKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedKind { ref name } if name == "uuid"));
    }

    #[test]
    fn test_ordered_kinds() {
        assert!(ValueKind::Integer.is_ordered());
        assert!(ValueKind::Instant.is_ordered());
        assert!(!ValueKind::String.is_ordered());
        assert!(!ValueKind::Boolean.is_ordered());
        assert!(!ValueKind::GeoPoint.is_ordered());
    }

    #[test]
    fn test_serde_uses_external_names() {
        let json = serde_json::to_string(&ValueKind::LocalDate).unwrap();
        assert_eq!(json, "\"local-date\"");
        let kind: ValueKind = serde_json::from_str("\"geo-point\"").unwrap();
        assert_eq!(kind, ValueKind::GeoPoint);
    }
}
