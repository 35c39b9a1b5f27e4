//! Tantivy index wrapper for one schema tree.
//!
//! ```rust,ignore
//! use quarry_embedded::EmbeddedIndex;
//!
//! let mut index = EmbeddedIndex::create_in_dir(&path, tree, &analysis)?;
//! index.add_document("1", &json!({"title": "Dune"}))?;
//! index.commit()?;
//! assert_eq!(index.num_docs()?, 1);
//! ```

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tantivy::{Index, IndexWriter, Term};

use quarry_core::{Error, Result};
use quarry_schema::{AnalysisDefinitions, SchemaTree};

use crate::document::to_document;
use crate::layout::EmbeddedLayout;
use crate::schema::EmbeddedSchema;
use crate::tokenizers::register_tokenizers;

/// Index writer buffer size (50MB).
const WRITER_BUFFER_SIZE: usize = 50_000_000;

/// An embedded index built from a schema tree.
pub struct EmbeddedIndex {
    index: Index,
    writer: IndexWriter,
    schema: EmbeddedSchema,
    tree: Arc<SchemaTree>,
}

impl EmbeddedIndex {
    /// Create or open an index at `index_path`.
    ///
    /// An existing index is opened as is; its schema must have been built
    /// from the same tree.
    pub fn create_in_dir(
        index_path: &Path,
        tree: Arc<SchemaTree>,
        analysis: &AnalysisDefinitions,
    ) -> Result<Self> {
        if !index_path.exists() {
            std::fs::create_dir_all(index_path)?;
        }
        let schema = EmbeddedSchema::build(EmbeddedLayout::from_tree(&tree)?)?;

        let index = if index_path.join("meta.json").exists() {
            log::info!("Opening embedded index at {}", index_path.display());
            Index::open_in_dir(index_path)
                .map_err(|e| Error::engine(format!("Failed to open index: {e}")))?
        } else {
            log::info!("Creating embedded index at {}", index_path.display());
            Index::create_in_dir(index_path, schema.schema().clone())
                .map_err(|e| Error::engine(format!("Failed to create index: {e}")))?
        };
        if index.schema() != *schema.schema() {
            return Err(Error::engine(format!(
                "The index at {} was built from a different schema",
                index_path.display()
            )));
        }
        Self::open(index, schema, tree, analysis)
    }

    /// Create an in-memory index (for testing and dry runs).
    pub fn new_in_memory(tree: Arc<SchemaTree>, analysis: &AnalysisDefinitions) -> Result<Self> {
        let schema = EmbeddedSchema::build(EmbeddedLayout::from_tree(&tree)?)?;
        let index = Index::create_in_ram(schema.schema().clone());
        Self::open(index, schema, tree, analysis)
    }

    fn open(
        index: Index,
        schema: EmbeddedSchema,
        tree: Arc<SchemaTree>,
        analysis: &AnalysisDefinitions,
    ) -> Result<Self> {
        register_tokenizers(&index, schema.layout(), analysis)?;
        let writer = index
            .writer(WRITER_BUFFER_SIZE)
            .map_err(|e| Error::engine(format!("Failed to create index writer: {e}")))?;
        Ok(Self {
            index,
            writer,
            schema,
            tree,
        })
    }

    /// Add or replace the document `id`.
    ///
    /// The document is staged but not yet searchable until `commit()` is called.
    pub fn add_document(&mut self, id: &str, source: &Value) -> Result<()> {
        let document = to_document(&self.schema, id, source)?;
        self.writer
            .delete_term(Term::from_field_text(self.schema.id, id));
        self.writer
            .add_document(document)
            .map_err(|e| Error::engine(format!("Failed to add document: {e}")))?;
        Ok(())
    }

    /// Delete the document `id`, if present.
    pub fn delete_document(&mut self, id: &str) {
        self.writer
            .delete_term(Term::from_field_text(self.schema.id, id));
    }

    /// Commit staged changes to make them searchable.
    pub fn commit(&mut self) -> Result<()> {
        self.writer
            .commit()
            .map_err(|e| Error::engine(format!("Failed to commit index: {e}")))?;
        Ok(())
    }

    /// Clear all documents from the index.
    pub fn clear(&mut self) -> Result<()> {
        self.writer
            .delete_all_documents()
            .map_err(|e| Error::engine(format!("Failed to clear index: {e}")))?;
        self.commit()
    }

    /// Number of committed, searchable documents.
    pub fn num_docs(&self) -> Result<u64> {
        let reader = self
            .index
            .reader()
            .map_err(|e| Error::engine(format!("Failed to open index reader: {e}")))?;
        Ok(reader.searcher().num_docs())
    }

    /// Get reference to the underlying Tantivy index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Get the schema.
    pub fn schema(&self) -> &EmbeddedSchema {
        &self.schema
    }

    /// The schema tree the index was built from.
    pub fn tree(&self) -> &Arc<SchemaTree> {
        &self.tree
    }
}

impl std::fmt::Debug for EmbeddedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedIndex")
            .field("index", &"<tantivy::Index>")
            .field("schema", &self.schema)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
