//! The schema tree.
//!
//! A [`SchemaTree`] is a pure tree of [`SchemaNode`]s rooted at an anonymous
//! object, plus a flat index from absolute dot-separated path to leaf
//! descriptor. Children keep their declaration order. There are no parent
//! pointers: anything that needs a parent looks it up by path.
//!
//! ```rust
//! use quarry_schema::analysis::AnalysisDefinitions;
//! use quarry_schema::field_type::Toggle;
//! use quarry_schema::registry::KindRegistry;
//! use quarry_schema::tree::{ObjectStorage, SchemaTree};
//!
//! let registry = KindRegistry::default();
//! let analysis = AnalysisDefinitions::default();
//! let tree = SchemaTree::builder(&registry, &analysis)
//!     .field("title", |t| t.as_string().analyzer("english").build())?
//!     .object_field("author", ObjectStorage::Nested, |author| {
//!         author.field("name", |t| t.as_string().sortable(Toggle::Yes).build())
//!     })?
//!     .build();
//!
//! assert!(tree.field("author.name")?.field_type().capabilities().sortable);
//! assert_eq!(tree.object_storage("author"), Some(ObjectStorage::Nested));
//! # Ok::<(), quarry_core::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::analysis::AnalysisDefinitions;
use crate::dsl::FieldRef;
use crate::field_type::{FieldType, TypeFactory};
use crate::registry::KindRegistry;
use quarry_core::{Error, Result, path};

/// How an object's children are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStorage {
    /// Children are flattened into the parent document.
    #[default]
    Flattened,
    /// Each object is a separate hidden document.
    Nested,
}

/// A node of the schema tree.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// A value field.
    Leaf(Arc<FieldType>),
    /// An object field.
    Object(ObjectNode),
}

/// An object node: storage plus ordered children.
#[derive(Debug, Clone, Default)]
pub struct ObjectNode {
    storage: ObjectStorage,
    children: Vec<(String, SchemaNode)>,
}

impl ObjectNode {
    /// How the object is stored.
    pub fn storage(&self) -> ObjectStorage {
        self.storage
    }

    /// Children in declaration order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.children.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// A child by local name.
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.children
            .iter()
            .find_map(|(n, c)| (n == name).then_some(c))
    }

    /// Whether the object has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn contains(&self, name: &str) -> bool {
        self.children.iter().any(|(n, _)| n == name)
    }
}

/// A frozen schema tree with its flat path index.
#[derive(Debug, Clone, Default)]
pub struct SchemaTree {
    root: ObjectNode,
    paths: Vec<String>,
    fields: HashMap<String, Arc<FieldType>>,
    objects: HashMap<String, ObjectStorage>,
}

impl SchemaTree {
    /// A tree with no fields.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a tree.
    pub fn builder<'r>(
        registry: &'r KindRegistry,
        analysis: &'r AnalysisDefinitions,
    ) -> SchemaTreeBuilder<'r> {
        SchemaTreeBuilder {
            root: SchemaElement::new(TypeFactory::new(registry, analysis), None, ObjectStorage::Flattened),
        }
    }

    fn from_root(root: ObjectNode) -> Self {
        let mut tree = SchemaTree {
            root: ObjectNode::default(),
            paths: Vec::new(),
            fields: HashMap::new(),
            objects: HashMap::new(),
        };
        tree.index(&root, None);
        tree.root = root;
        tree
    }

    fn index(&mut self, object: &ObjectNode, prefix: Option<&str>) {
        for (name, child) in &object.children {
            let absolute = path::join(prefix, name);
            match child {
                SchemaNode::Leaf(field) => {
                    self.paths.push(absolute.clone());
                    self.fields.insert(absolute, Arc::clone(field));
                }
                SchemaNode::Object(inner) => {
                    self.objects.insert(absolute.clone(), inner.storage);
                    self.index(inner, Some(&absolute));
                }
            }
        }
    }

    /// The anonymous root object.
    pub fn root(&self) -> &ObjectNode {
        &self.root
    }

    /// Resolve an absolute path to a value field.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownField`] when nothing is declared at `path`, and
    /// [`Error::IncompatibleScope`] when `path` names an object field.
    pub fn field(&self, path: &str) -> Result<FieldRef<'_>> {
        match self.fields.get_key_value(path) {
            Some((key, field)) => Ok(FieldRef::new(key, field)),
            None if self.objects.contains_key(path) => Err(Error::incompatible(
                path,
                "this is an object field, not a value field",
            )),
            None => Err(Error::UnknownField {
                path: path.to_string(),
            }),
        }
    }

    /// Resolve `relative` against the object at `base` (`None` for the root).
    pub fn resolve(&self, base: Option<&str>, relative: &str) -> Result<FieldRef<'_>> {
        if let Some(base) = base {
            if !self.objects.contains_key(base) {
                return Err(Error::UnknownField {
                    path: base.to_string(),
                });
            }
        }
        self.field(&path::join(base, relative))
    }

    /// The descriptor at `path`, if any.
    pub fn get(&self, path: &str) -> Option<&FieldType> {
        self.fields.get(path).map(Arc::as_ref)
    }

    /// Storage of the object at `path`, if it is an object.
    pub fn object_storage(&self, path: &str) -> Option<ObjectStorage> {
        self.objects.get(path).copied()
    }

    /// Value fields in depth-first declaration order.
    pub fn fields(&self) -> impl Iterator<Item = FieldRef<'_>> {
        self.paths.iter().filter_map(|p| {
            self.fields
                .get(p)
                .map(|field| FieldRef::new(p.as_str(), field.as_ref()))
        })
    }

    /// Number of value fields.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no field is declared.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

/// Prefix of root-level names reserved for index metadata (discriminator,
/// tenant id, backend fields).
pub const METADATA_PREFIX: char = '_';

/// One object being declared: the root or an object field.
#[derive(Debug, Clone)]
pub struct SchemaElement<'r> {
    factory: TypeFactory<'r>,
    path: Option<String>,
    node: ObjectNode,
}

impl<'r> SchemaElement<'r> {
    fn new(factory: TypeFactory<'r>, path: Option<String>, storage: ObjectStorage) -> Self {
        Self {
            factory,
            path,
            node: ObjectNode {
                storage,
                children: Vec::new(),
            },
        }
    }

    /// Absolute path of this object (`None` for the root).
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The type factory fields are built with.
    pub fn factory(&self) -> &TypeFactory<'r> {
        &self.factory
    }

    fn child_path(&self, name: &str) -> Result<String> {
        path::check_segment(name)?;
        if self.path.is_none() && name.starts_with(METADATA_PREFIX) {
            return Err(Error::InvalidFieldName {
                name: name.to_string(),
                reason: format!("root field names starting with '{METADATA_PREFIX}' are reserved for index metadata"),
            });
        }
        let absolute = path::join(self.path.as_deref(), name);
        if self.node.contains(name) {
            return Err(Error::DuplicateField { path: absolute });
        }
        Ok(absolute)
    }

    /// Declare a value field built by `build_type`.
    pub fn field<F>(mut self, name: &str, build_type: F) -> Result<Self>
    where
        F: FnOnce(&TypeFactory<'r>) -> Result<FieldType>,
    {
        let absolute = self.child_path(name)?;
        let field_type = build_type(&self.factory).map_err(|e| at_path(e, &absolute))?;
        self.node
            .children
            .push((name.to_string(), SchemaNode::Leaf(Arc::new(field_type))));
        Ok(self)
    }

    /// Declare an already built value field.
    pub fn add_field(&mut self, name: &str, field_type: FieldType) -> Result<()> {
        self.child_path(name)?;
        self.node
            .children
            .push((name.to_string(), SchemaNode::Leaf(Arc::new(field_type))));
        Ok(())
    }

    /// Declare an object field whose children are declared by `declare`.
    pub fn object_field<F>(mut self, name: &str, storage: ObjectStorage, declare: F) -> Result<Self>
    where
        F: FnOnce(SchemaElement<'r>) -> Result<SchemaElement<'r>>,
    {
        let absolute = self.child_path(name)?;
        let child = declare(SchemaElement::new(self.factory, Some(absolute), storage))?;
        self.node
            .children
            .push((name.to_string(), SchemaNode::Object(child.node)));
        Ok(self)
    }
}

fn at_path(error: Error, absolute: &str) -> Error {
    match error {
        Error::IllegalOption { message, .. } => Error::IllegalOption {
            path: absolute.to_string(),
            message,
        },
        other => other,
    }
}

/// Builds a [`SchemaTree`] from the root down.
#[derive(Debug, Clone)]
pub struct SchemaTreeBuilder<'r> {
    root: SchemaElement<'r>,
}

impl<'r> SchemaTreeBuilder<'r> {
    /// Declare a root-level value field.
    pub fn field<F>(mut self, name: &str, build_type: F) -> Result<Self>
    where
        F: FnOnce(&TypeFactory<'r>) -> Result<FieldType>,
    {
        self.root = self.root.field(name, build_type)?;
        Ok(self)
    }

    /// Declare a root-level object field.
    pub fn object_field<F>(mut self, name: &str, storage: ObjectStorage, declare: F) -> Result<Self>
    where
        F: FnOnce(SchemaElement<'r>) -> Result<SchemaElement<'r>>,
    {
        self.root = self.root.object_field(name, storage, declare)?;
        Ok(self)
    }

    /// Declare root-level fields through the root element.
    pub fn with_root<F>(mut self, declare: F) -> Result<Self>
    where
        F: FnOnce(SchemaElement<'r>) -> Result<SchemaElement<'r>>,
    {
        self.root = declare(self.root)?;
        Ok(self)
    }

    /// Freeze the tree and compute the path index.
    pub fn build(self) -> SchemaTree {
        let tree = SchemaTree::from_root(self.root.node);
        log::debug!("Schema tree built with {} value fields", tree.len());
        tree
    }
}

// ============================================================================
// Tests
// ============================================================================
