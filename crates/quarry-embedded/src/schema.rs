//! Tantivy schema translation.
//!
//! Turns an [`EmbeddedLayout`] into a Tantivy [`Schema`] and keeps typed
//! access to the resulting fields by path.
//!
//! | Kind | Tantivy field |
//! |------|---------------|
//! | string | text, tokenizer named after the analyzer/normalizer |
//! | boolean | bool |
//! | integer, long | i64 |
//! | double | f64 |
//! | local-date, instant | date, millisecond precision |

use std::collections::BTreeMap;

use tantivy::schema::{
    DateOptions, DateTimePrecision, Field, IndexRecordOption, NumericOptions, STORED, STRING, Schema,
    SchemaBuilder, TextFieldIndexing, TextOptions,
};

use quarry_core::{Error, Result};
use quarry_schema::ValueKind;

use crate::layout::{EmbeddedLayout, FieldLayout, ID_FIELD, TextLayout};

/// A Tantivy schema built from a layout.
#[derive(Clone)]
pub struct EmbeddedSchema {
    schema: Schema,
    layout: EmbeddedLayout,
    /// Document identifier field.
    pub id: Field,
    fields: BTreeMap<String, Field>,
}

impl EmbeddedSchema {
    /// Build the Tantivy schema of `layout`.
    pub fn build(layout: EmbeddedLayout) -> Result<Self> {
        let mut builder = SchemaBuilder::new();
        let id = builder.add_text_field(ID_FIELD, STRING | STORED);

        let mut fields = BTreeMap::new();
        for field in layout.fields() {
            let handle = add_field(&mut builder, field)?;
            fields.insert(field.path.clone(), handle);
        }

        Ok(Self {
            schema: builder.build(),
            layout,
            id,
            fields,
        })
    }

    /// Get the underlying Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The layout the schema was built from.
    pub fn layout(&self) -> &EmbeddedLayout {
        &self.layout
    }

    /// The Tantivy field of `path`.
    pub fn field(&self, path: &str) -> Option<Field> {
        self.fields.get(path).copied()
    }

    /// Every value field with its layout, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, &FieldLayout)> {
        self.layout
            .fields()
            .iter()
            .filter_map(|layout| self.field(&layout.path).map(|f| (f, layout)))
    }
}

fn add_field(builder: &mut SchemaBuilder, field: &FieldLayout) -> Result<Field> {
    let name = field.path.as_str();
    let handle = match field.kind() {
        ValueKind::String => {
            let text = field.text.as_ref().ok_or_else(|| {
                Error::config(format!("String field '{name}' has no text layout"))
            })?;
            builder.add_text_field(name, text_options(field, text))
        }
        ValueKind::Boolean => builder.add_bool_field(name, numeric_options(field)),
        ValueKind::Integer | ValueKind::Long => builder.add_i64_field(name, numeric_options(field)),
        ValueKind::Double => builder.add_f64_field(name, numeric_options(field)),
        ValueKind::LocalDate | ValueKind::Instant => builder.add_date_field(name, date_options(field)),
        ValueKind::GeoPoint => {
            return Err(Error::config(format!(
                "Field '{name}' is a geo-point, which the embedded backend does not support"
            )));
        }
    };
    Ok(handle)
}

fn text_options(field: &FieldLayout, text: &TextLayout) -> TextOptions {
    let mut options = TextOptions::default();
    if field.indexed {
        let record = if text.analyzed {
            IndexRecordOption::WithFreqsAndPositions
        } else {
            IndexRecordOption::Basic
        };
        options = options.set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(&text.tokenizer)
                .set_index_option(record)
                .set_fieldnorms(text.norms),
        );
    }
    if field.stored {
        options = options.set_stored();
    }
    if field.fast {
        options = options.set_fast(Some(&text.tokenizer));
    }
    options
}

fn numeric_options(field: &FieldLayout) -> NumericOptions {
    let mut options = NumericOptions::default();
    if field.indexed {
        options = options.set_indexed();
    }
    if field.stored {
        options = options.set_stored();
    }
    if field.fast {
        options = options.set_fast();
    }
    options
}

fn date_options(field: &FieldLayout) -> DateOptions {
    let mut options = DateOptions::default().set_precision(DateTimePrecision::Milliseconds);
    if field.indexed {
        options = options.set_indexed();
    }
    if field.stored {
        options = options.set_stored();
    }
    if field.fast {
        options = options.set_fast();
    }
    options
}

impl std::fmt::Debug for EmbeddedSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedSchema")
            .field("field_count", &self.fields.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_schema::{AnalysisDefinitions, KindRegistry, ObjectStorage, SchemaTree, Toggle};

    fn schema() -> EmbeddedSchema {
        let registry = KindRegistry::default();
        let analysis = AnalysisDefinitions::default();
        let tree = SchemaTree::builder(&registry, &analysis)
            .field("title", |t| t.as_string().analyzer("english").build())
            .unwrap()
            .field("code", |t| t.as_string().sortable(Toggle::Yes).build())
            .unwrap()
            .field("rank", |t| t.as_long().sortable(Toggle::Yes).build())
            .unwrap()
            .field("secret", |t| t.as_string().projectable(Toggle::No).build())
            .unwrap()
            .object_field("author", ObjectStorage::Flattened, |o| {
                o.field("born", |t| t.as_local_date().build())?
                    .field("alive", |t| t.as_boolean().build())
            })
            .unwrap()
            .build();
        EmbeddedSchema::build(EmbeddedLayout::from_tree(&tree).unwrap()).unwrap()
    }

    #[test]
    fn test_field_names_are_paths() {
        let schema = schema();
        let tantivy_schema = schema.schema();
        for name in [ID_FIELD, "title", "code", "rank", "secret", "author.born", "author.alive"] {
            assert!(tantivy_schema.get_field(name).is_ok(), "{name}");
        }
        assert_eq!(schema.fields().count(), 6);
    }

    #[test]
    fn test_field_options() {
        let schema = schema();
        let tantivy_schema = schema.schema();

        let title = tantivy_schema.get_field_entry(schema.field("title").unwrap());
        assert!(title.is_indexed());
        assert!(!title.is_fast());

        let rank = tantivy_schema.get_field_entry(schema.field("rank").unwrap());
        assert!(rank.is_fast());

        let secret = tantivy_schema.get_field_entry(schema.field("secret").unwrap());
        assert!(!secret.is_stored());
        assert!(secret.is_indexed());
    }

    #[test]
    fn test_schema_debug() {
        let debug = format!("{:?}", schema());
        assert!(debug.contains("EmbeddedSchema"));
        assert!(debug.contains("field_count"));
    }
}
