//! Embedded engine plug points for Quarry.
//!
//! This crate maps schema trees onto an in-process inverted index (Tantivy,
//! feature-gated). Layout and analysis chain resolution are engine-neutral
//! and always available; schema translation, tokenizer registration,
//! document conversion and the index wrapper need the engine.
//!
//! # Features
//!
//! - `embedded-tantivy`: Enable the Tantivy engine (default)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     quarry-embedded                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EmbeddedLayout (schema tree → flat engine fields)          │
//! │  AnalysisChain (analyzer/normalizer → tokenizer + filters)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EmbeddedSchema (Tantivy schema, fields by path)            │
//! │  register_tokenizers (chains → Tantivy text analyzers)      │
//! │  to_document (JSON source → codecs → Tantivy document)      │
//! │  EmbeddedIndex (writer, upsert by id, commit)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use quarry_embedded::EmbeddedLayout;
//! use quarry_schema::{AnalysisDefinitions, KindRegistry, SchemaTree, Toggle};
//!
//! let registry = KindRegistry::default();
//! let analysis = AnalysisDefinitions::default();
//! let tree = SchemaTree::builder(&registry, &analysis)
//!     .field("title", |t| t.as_string().analyzer("english").build())?
//!     .field("year", |t| t.as_integer().sortable(Toggle::Yes).build())?
//!     .build();
//!
//! let layout = EmbeddedLayout::from_tree(&tree)?;
//! assert!(layout.get("year").unwrap().fast);
//! assert!(layout.analysis_chains(&analysis)?.contains_key("english"));
//! # Ok::<(), quarry_core::Error>(())
//! ```

pub mod chain;
pub mod layout;

#[cfg(feature = "embedded-tantivy")]
pub mod document;
#[cfg(feature = "embedded-tantivy")]
pub mod index;
#[cfg(feature = "embedded-tantivy")]
pub mod schema;
#[cfg(feature = "embedded-tantivy")]
pub mod tokenizers;

// Re-exports
pub use chain::{AnalysisChain, FilterSpec, TokenizerSpec};
pub use layout::{EmbeddedLayout, FieldLayout, ID_FIELD, TextLayout};

#[cfg(feature = "embedded-tantivy")]
pub use document::to_document;
#[cfg(feature = "embedded-tantivy")]
pub use index::EmbeddedIndex;
#[cfg(feature = "embedded-tantivy")]
pub use schema::EmbeddedSchema;
#[cfg(feature = "embedded-tantivy")]
pub use tokenizers::{register_tokenizers, text_analyzer};
