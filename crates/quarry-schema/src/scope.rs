//! Multi-index search scopes.
//!
//! A query may target several indexes at once. A field referenced in such a
//! query must resolve to compatible descriptors in every index that declares
//! it, otherwise the query fails before anything is sent to the backend.

use crate::converter::ValueConvert;
use crate::dsl::{
    AggregationBuilder, FieldRef, PredicateBuilder, PredicateKind, ProjectionBuilder, SortBuilder,
    SortMode, SortOrder,
};
use crate::field_type::FieldType;
use crate::tree::SchemaTree;
use quarry_core::{Error, Result};

/// The indexes one query targets.
#[derive(Debug, Clone, Default)]
pub struct SearchScope<'a> {
    targets: Vec<(&'a str, &'a SchemaTree)>,
}

impl<'a> SearchScope<'a> {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope over one index.
    pub fn single(index: &'a str, tree: &'a SchemaTree) -> Self {
        Self::new().with(index, tree)
    }

    /// Add an index to the scope.
    pub fn with(mut self, index: &'a str, tree: &'a SchemaTree) -> Self {
        self.targets.push((index, tree));
        self
    }

    /// Names of the targeted indexes.
    pub fn index_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.targets.iter().map(|(name, _)| *name)
    }

    /// Whether exactly one index is targeted.
    pub fn is_single(&self) -> bool {
        self.targets.len() == 1
    }

    /// Resolve `path` in every index that declares it.
    ///
    /// Fails with [`Error::UnknownField`] when no targeted index does.
    pub fn field(&self, path: &str) -> Result<ScopedField<'a>> {
        let mut fields = Vec::with_capacity(self.targets.len());
        for (index, tree) in &self.targets {
            match tree.field(path) {
                Ok(field) => fields.push((*index, field)),
                Err(Error::UnknownField { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        if fields.is_empty() {
            return Err(Error::UnknownField {
                path: path.to_string(),
            });
        }
        Ok(ScopedField { fields })
    }
}

/// A field resolved across a scope.
#[derive(Debug, Clone)]
pub struct ScopedField<'a> {
    fields: Vec<(&'a str, FieldRef<'a>)>,
}

impl<'a> ScopedField<'a> {
    /// Absolute path of the field.
    pub fn path(&self) -> &'a str {
        self.first().path()
    }

    /// Indexes that declare the field.
    pub fn index_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.fields.iter().map(|(index, _)| *index)
    }

    fn first(&self) -> FieldRef<'a> {
        self.fields[0].1
    }

    /// A predicate on the field.
    ///
    /// Wildcard predicates always work on raw values, so only their codecs
    /// and analysis must agree.
    pub fn predicate(&self, kind: PredicateKind, convert: ValueConvert) -> Result<PredicateBuilder<'a>> {
        for (_, field) in &self.fields {
            field.predicate(kind)?;
        }
        self.check("codec", FieldType::has_compatible_codec)?;
        if convert == ValueConvert::Yes && kind != PredicateKind::Wildcard {
            self.check("DSL converter", FieldType::has_compatible_dsl_converter)?;
        }
        if matches!(
            kind,
            PredicateKind::Match | PredicateKind::Phrase | PredicateKind::Wildcard
        ) {
            self.check("analyzer or normalizer", FieldType::has_compatible_analysis)?;
        }
        Ok(self.first().predicate(kind)?.convert(convert))
    }

    /// A sort on the field.
    pub fn sort(
        &self,
        order: SortOrder,
        mode: Option<SortMode>,
        convert: ValueConvert,
    ) -> Result<SortBuilder<'a>> {
        for (_, field) in &self.fields {
            field.sort(order, mode)?;
        }
        self.check("codec", FieldType::has_compatible_codec)?;
        if convert == ValueConvert::Yes {
            self.check("DSL converter", FieldType::has_compatible_dsl_converter)?;
        }
        Ok(self.first().sort(order, mode)?.convert(convert))
    }

    /// A projection of the field.
    pub fn projection(&self, convert: ValueConvert) -> Result<ProjectionBuilder<'a>> {
        for (_, field) in &self.fields {
            field.projection()?;
        }
        self.check("codec", FieldType::has_compatible_codec)?;
        if convert == ValueConvert::Yes {
            self.check(
                "projection converter",
                FieldType::has_compatible_projection_converter,
            )?;
        }
        Ok(self.first().projection()?.convert(convert))
    }

    /// An aggregation on the field.
    pub fn aggregation(&self, convert: ValueConvert) -> Result<AggregationBuilder<'a>> {
        for (_, field) in &self.fields {
            field.aggregation()?;
        }
        self.check("codec", FieldType::has_compatible_codec)?;
        self.check("aggregable", |a, b| {
            a.capabilities().aggregable == b.capabilities().aggregable
        })?;
        if convert == ValueConvert::Yes {
            self.check("DSL converter", FieldType::has_compatible_dsl_converter)?;
            self.check(
                "projection converter",
                FieldType::has_compatible_projection_converter,
            )?;
        }
        Ok(self.first().aggregation()?.convert(convert))
    }

    fn check(&self, what: &str, compatible: impl Fn(&FieldType, &FieldType) -> bool) -> Result<()> {
        let (first_index, first) = self.fields[0];
        for (index, field) in &self.fields[1..] {
            if !compatible(first.field_type(), field.field_type()) {
                return Err(Error::incompatible(
                    first.path(),
                    format!(
                        "attribute '{what}' differs between index '{first_index}' and index '{index}'"
                    ),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
