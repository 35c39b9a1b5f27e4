//! Schema model for Quarry: value kinds, codecs, field types, and schema trees.
//!
//! This crate is backend-neutral. Backends contribute a [`KindRegistry`]
//! (which kinds they support, their default mappings and codecs) and an
//! [`AnalysisDefinitions`] set; everything else is built from those.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      quarry-schema                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  KindRegistry (kind → codec, default mapping, capabilities) │
//! │  AnalysisDefinitions (analyzers, normalizers, components)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TypeFactory → FieldTypeBuilder → FieldType                 │
//! │  SchemaTreeBuilder → SchemaTree (+ flat path index)         │
//! │  SchemaDescription (TOML / JSON form of a tree)             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FieldRef (per-field predicate/sort/projection/aggregation) │
//! │  SearchScope (cross-index compatibility checks)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use quarry_schema::{AnalysisDefinitions, KindRegistry, SchemaTree, Toggle};
//! use quarry_schema::dsl::PredicateKind;
//!
//! let registry = KindRegistry::default();
//! let analysis = AnalysisDefinitions::default();
//! let tree = SchemaTree::builder(&registry, &analysis)
//!     .field("title", |t| t.as_string().analyzer("english").build())?
//!     .field("year", |t| t.as_integer().sortable(Toggle::Yes).build())?
//!     .build();
//!
//! let query = tree
//!     .field("title")?
//!     .predicate(PredicateKind::Match)?
//!     .matching("rust")
//!     .build()?;
//! assert_eq!(query["match"]["title"]["query"], "rust");
//! # Ok::<(), quarry_core::Error>(())
//! ```

pub mod analysis;
pub mod codec;
pub mod converter;
pub mod description;
pub mod dsl;
pub mod field_type;
pub mod kind;
pub mod mapping;
pub mod registry;
pub mod scope;
pub mod tree;
pub mod value;

// Re-export key types at crate root for convenience
pub use analysis::{AnalysisConfigurationContext, AnalysisConfigurer, AnalysisDefinitions};
pub use codec::{Codec, DateFormats};
pub use converter::{Converter, ValueConvert, ValueConverter};
pub use description::{FieldDescription, SchemaDescription};
pub use dsl::FieldRef;
pub use field_type::{FieldType, FieldTypeBuilder, FieldTypeOptions, Toggle, TypeFactory};
pub use kind::ValueKind;
pub use mapping::{DynamicMapping, Properties, PropertyMapping};
pub use registry::{KindDefinition, KindRegistry};
pub use scope::{ScopedField, SearchScope};
pub use tree::{ObjectNode, ObjectStorage, SchemaElement, SchemaNode, SchemaTree, SchemaTreeBuilder};
pub use value::{FieldValue, GeoPoint};
