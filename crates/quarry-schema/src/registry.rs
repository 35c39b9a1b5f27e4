//! Capability and codec registry.
//!
//! The registry is the catalog of supported value kinds: for each kind it
//! holds the codec, the default mapping fragment, the capability defaults and
//! the set of capabilities the kind allows at all. It is built once by the
//! backend at initialization and then passed by reference to every builder;
//! nothing in it changes afterwards.
//!
//! ```rust
//! use quarry_schema::registry::KindRegistry;
//!
//! let registry = KindRegistry::builder().build();
//! let definition = registry.kind_for("local-date").unwrap();
//! assert_eq!(definition.default_mapping.type_name.as_deref(), Some("date"));
//! assert!(registry.kind_for("uuid").is_err());
//! ```

use std::collections::HashMap;
use std::str::FromStr;

use crate::codec::{Codec, DateFormats};
use crate::kind::ValueKind;
use crate::mapping::{KEYWORD_TYPE, PropertyMapping};
use quarry_core::{Capabilities, Capability, Error, Result};

/// Everything the registry knows about one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindDefinition {
    /// The kind.
    pub kind: ValueKind,
    /// Its codec.
    pub codec: Codec,
    /// The mapping fragment before capabilities are applied.
    pub default_mapping: PropertyMapping,
    /// Capability values used when the user leaves an option at `DEFAULT`.
    pub defaults: Capabilities,
    /// Whether `aggregable` defaults to the resolved `sortable`.
    pub aggregable_follows_sortable: bool,
    /// Capabilities the kind can have at all.
    pub allowed: Capabilities,
}

impl KindDefinition {
    fn new(kind: ValueKind, formats: &DateFormats) -> Self {
        let codec = Codec::for_kind(kind, formats);
        let type_name = match kind {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Long => "long",
            ValueKind::Double => "double",
            ValueKind::LocalDate | ValueKind::Instant => "date",
            ValueKind::String => KEYWORD_TYPE,
            ValueKind::GeoPoint => "geo_point",
        };
        let mut default_mapping = PropertyMapping::of_type(type_name);
        default_mapping.format = codec.format();

        let allowed = match kind {
            ValueKind::GeoPoint => Capabilities::all().with(Capability::Aggregable, false),
            _ => Capabilities::all(),
        };

        Self {
            kind,
            codec,
            default_mapping,
            defaults: Capabilities::none().with(Capability::Searchable, true),
            aggregable_follows_sortable: kind.is_ordered(),
            allowed,
        }
    }
}

/// The process-wide, immutable kind catalog of one backend.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    kinds: HashMap<ValueKind, KindDefinition>,
    date_formats: DateFormats,
    stores_projections: bool,
}

impl KindRegistry {
    /// Start building a registry with every built-in kind registered.
    pub fn builder() -> KindRegistryBuilder {
        KindRegistryBuilder::default()
    }

    /// Resolve a logical type name.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedKind`] when the name is unknown or the kind is not
    /// registered with this backend.
    pub fn kind_for(&self, logical_type: &str) -> Result<&KindDefinition> {
        let kind = ValueKind::from_str(logical_type)?;
        self.definition(kind)
    }

    /// The definition of a registered kind.
    pub fn definition(&self, kind: ValueKind) -> Result<&KindDefinition> {
        self.kinds.get(&kind).ok_or_else(|| Error::UnsupportedKind {
            name: kind.as_str().to_string(),
        })
    }

    /// Whether `kind` is registered.
    pub fn supports(&self, kind: ValueKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// The date formats codecs were built with.
    pub fn date_formats(&self) -> &DateFormats {
        &self.date_formats
    }

    /// Whether projectable fields must be stored explicitly.
    pub fn stores_projections(&self) -> bool {
        self.stores_projections
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`KindRegistry`].
#[derive(Debug, Clone)]
pub struct KindRegistryBuilder {
    date_formats: DateFormats,
    stores_projections: bool,
    excluded: Vec<ValueKind>,
}

impl Default for KindRegistryBuilder {
    fn default() -> Self {
        Self {
            date_formats: DateFormats::default(),
            stores_projections: false,
            excluded: Vec::new(),
        }
    }
}

impl KindRegistryBuilder {
    /// Date formats for the temporal codecs.
    pub fn date_formats(mut self, formats: DateFormats) -> Self {
        self.date_formats = formats;
        self
    }

    /// Require `store: true` on projectable fields.
    pub fn stores_projections(mut self, enabled: bool) -> Self {
        self.stores_projections = enabled;
        self
    }

    /// Leave a kind out of the catalog.
    pub fn without(mut self, kind: ValueKind) -> Self {
        self.excluded.push(kind);
        self
    }

    /// Freeze the catalog.
    pub fn build(self) -> KindRegistry {
        let kinds = ValueKind::ALL
            .into_iter()
            .filter(|kind| !self.excluded.contains(kind))
            .map(|kind| (kind, KindDefinition::new(kind, &self.date_formats)))
            .collect();
        log::debug!(
            "Kind registry built (excluded: {:?}, stores projections: {})",
            self.excluded,
            self.stores_projections
        );
        KindRegistry {
            kinds,
            date_formats: self.date_formats,
            stores_projections: self.stores_projections,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
