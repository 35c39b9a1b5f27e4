//! Per-field capabilities.
//!
//! A field can independently be searchable, sortable, projectable and
//! aggregable. The [`Capabilities`] mask is what a field type resolves to once
//! user options have been collapsed against the defaults of its value kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four independently toggled field capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The field can be used in predicates.
    Searchable,
    /// The field can be used in sorts.
    Sortable,
    /// The field value can be returned in projections.
    Projectable,
    /// The field can be used in aggregations.
    Aggregable,
}

impl Capability {
    /// All capabilities, in canonical order.
    pub const ALL: [Capability; 4] = [
        Capability::Searchable,
        Capability::Sortable,
        Capability::Projectable,
        Capability::Aggregable,
    ];

    /// The lowercase adjective used in messages ("searchable", ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Searchable => "searchable",
            Capability::Sortable => "sortable",
            Capability::Projectable => "projectable",
            Capability::Aggregable => "aggregable",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved capability mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// The field can be used in predicates.
    pub searchable: bool,
    /// The field can be used in sorts.
    pub sortable: bool,
    /// The field value can be returned in projections.
    pub projectable: bool,
    /// The field can be used in aggregations.
    pub aggregable: bool,
}

impl Capabilities {
    /// A mask with every capability enabled.
    pub const fn all() -> Self {
        Self {
            searchable: true,
            sortable: true,
            projectable: true,
            aggregable: true,
        }
    }

    /// A mask with every capability disabled.
    pub const fn none() -> Self {
        Self {
            searchable: false,
            sortable: false,
            projectable: false,
            aggregable: false,
        }
    }

    /// Whether the given capability is enabled.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Searchable => self.searchable,
            Capability::Sortable => self.sortable,
            Capability::Projectable => self.projectable,
            Capability::Aggregable => self.aggregable,
        }
    }

    /// Return a copy with the given capability set to `enabled`.
    pub fn with(mut self, capability: Capability, enabled: bool) -> Self {
        match capability {
            Capability::Searchable => self.searchable = enabled,
            Capability::Sortable => self.sortable = enabled,
            Capability::Projectable => self.projectable = enabled,
            Capability::Aggregable => self.aggregable = enabled,
        }
        self
    }

    /// Iterate over the enabled capabilities in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.has(*c))
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|c| c.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_display() {
        assert_eq!(Capability::Searchable.to_string(), "searchable");
        assert_eq!(Capability::Aggregable.to_string(), "aggregable");
    }

    #[test]
    fn test_capabilities_with_and_has() {
        let mask = Capabilities::none()
            .with(Capability::Sortable, true)
            .with(Capability::Aggregable, true);
        assert!(!mask.has(Capability::Searchable));
        assert!(mask.has(Capability::Sortable));
        assert!(!mask.has(Capability::Projectable));
        assert!(mask.has(Capability::Aggregable));
    }

    #[test]
    fn test_capabilities_iter_canonical_order() {
        let names: Vec<_> = Capabilities::all().iter().collect();
        assert_eq!(names, Capability::ALL.to_vec());
        assert_eq!(Capabilities::none().iter().count(), 0);
    }

    #[test]
    fn test_capabilities_display() {
        let mask = Capabilities::none().with(Capability::Searchable, true);
        assert_eq!(mask.to_string(), "[searchable]");
    }

    #[test]
    fn test_capability_serialization() {
        let json = serde_json::to_string(&Capability::Projectable).unwrap();
        assert_eq!(json, "\"projectable\"");
    }
}
