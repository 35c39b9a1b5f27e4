//! Structured failure reports.
//!
//! Schema validation never stops at the first discrepancy. Each discrepancy is
//! recorded as a [`FailureRecord`] carrying the chain of contexts it was found
//! in (index, free-text step, field path, mapping attribute), and all records
//! of one pass are gathered into a single [`FailureReport`].
//!
//! # Rendering
//!
//! A record renders as its context chain joined with `" > "`, followed by the
//! message:
//!
//! ```text
//! index Index1 > schema validation > field myObject.myField > attribute index: Invalid value. Expected 'true', actual is 'false'
//! ```
//!
//! # Accumulating
//!
//! ```rust
//! use quarry_core::failure::{ContextFrame, FailureCollector, FailureKind};
//!
//! let mut collector = FailureCollector::new();
//! collector.within(ContextFrame::index("Index1"), |c| {
//!     c.within(ContextFrame::field("myField"), |c| {
//!         c.record(FailureKind::missing("property mapping"));
//!     });
//! });
//! let report = collector.finish();
//! assert_eq!(report.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// One frame of a failure's context chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "frame", content = "name", rename_all = "snake_case")]
pub enum ContextFrame {
    /// An index, by the name it was declared with.
    Index(String),
    /// A field, by absolute dot-separated path.
    Field(String),
    /// A mapping attribute (`type`, `index`, `dynamic`, ...).
    Attribute(String),
    /// A free-text step such as "schema validation".
    Literal(String),
}

impl ContextFrame {
    /// Index frame.
    pub fn index(name: impl Into<String>) -> Self {
        Self::Index(name.into())
    }

    /// Field frame.
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    /// Attribute frame.
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }

    /// Literal frame.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }
}

impl fmt::Display for ContextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(name) => write!(f, "index {name}"),
            Self::Field(path) => write!(f, "field {path}"),
            Self::Attribute(name) => write!(f, "attribute {name}"),
            Self::Literal(text) => f.write_str(text),
        }
    }
}

/// What went wrong, independent of where.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// An attribute holds a different value than expected.
    InvalidValue {
        /// Rendered expected value.
        expected: String,
        /// Rendered observed value (`null` when absent).
        actual: String,
    },
    /// Something expected is absent ("property mapping", "type mapping").
    Missing {
        /// What is missing.
        what: String,
    },
    /// Something is present that must not be.
    Unexpected {
        /// What was found.
        what: String,
    },
}

impl FailureKind {
    /// An invalid value failure.
    pub fn invalid_value(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::InvalidValue {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// A missing element failure.
    pub fn missing(what: impl Into<String>) -> Self {
        Self::Missing { what: what.into() }
    }

    /// An unexpected element failure.
    pub fn unexpected(what: impl Into<String>) -> Self {
        Self::Unexpected { what: what.into() }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { expected, actual } => {
                write!(f, "Invalid value. Expected '{expected}', actual is '{actual}'")
            }
            Self::Missing { what } => write!(f, "Missing {what}"),
            Self::Unexpected { what } => write!(f, "Unexpected {what}"),
        }
    }
}

/// A single discrepancy with its full context chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Context frames, outermost first.
    pub context: Vec<ContextFrame>,
    /// The discrepancy.
    pub kind: FailureKind,
}

impl FailureRecord {
    /// The index this record belongs to, if any.
    pub fn index(&self) -> Option<&str> {
        self.context.iter().find_map(|frame| match frame {
            ContextFrame::Index(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// The innermost field path, if any.
    pub fn field(&self) -> Option<&str> {
        self.context.iter().rev().find_map(|frame| match frame {
            ContextFrame::Field(path) => Some(path.as_str()),
            _ => None,
        })
    }

    /// The mapping attribute, if the failure is attribute-level.
    pub fn attribute(&self) -> Option<&str> {
        self.context.iter().rev().find_map(|frame| match frame {
            ContextFrame::Attribute(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// The rendered message, without context.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain: Vec<String> = self.context.iter().map(ToString::to_string).collect();
        if chain.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", chain.join(" > "), self.kind)
        }
    }
}

/// The aggregated outcome of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    records: Vec<FailureRecord>,
}

impl FailureReport {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate reports, preserving the order they are given in.
    ///
    /// Callers pass per-index reports in index declaration order.
    pub fn concat(reports: impl IntoIterator<Item = FailureReport>) -> Self {
        let records = reports.into_iter().flat_map(|r| r.records).collect();
        Self { records }
    }

    /// Append a record.
    pub fn push(&mut self, record: FailureRecord) {
        self.records.push(record);
    }

    /// Whether the pass found no discrepancy.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records in canonical order.
    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    /// Iterate over records.
    pub fn iter(&self) -> std::slice::Iter<'_, FailureRecord> {
        self.records.iter()
    }

    /// Keep only the records matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&FailureRecord) -> bool) {
        self.records.retain(keep);
    }

    /// Convert into `Ok(())` when empty, `Err(Error::Validation)` otherwise.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl IntoIterator for FailureReport {
    type Item = FailureRecord;
    type IntoIter = std::vec::IntoIter<FailureRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a FailureReport {
    type Item = &'a FailureRecord;
    type IntoIter = std::slice::Iter<'a, FailureRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "    {record}")?;
        }
        Ok(())
    }
}

/// Accumulates failures under a stack of context frames.
///
/// Owned by a single validation pass; never shared across tasks.
#[derive(Debug, Default)]
pub struct FailureCollector {
    stack: Vec<ContextFrame>,
    report: FailureReport,
}

impl FailureCollector {
    /// A collector with an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with `frame` pushed onto the context chain.
    pub fn within<R>(&mut self, frame: ContextFrame, f: impl FnOnce(&mut Self) -> R) -> R {
        self.stack.push(frame);
        let result = f(self);
        self.stack.pop();
        result
    }

    /// Record a failure at the current context.
    pub fn record(&mut self, kind: FailureKind) {
        log::debug!("failure at [{}]: {kind}", self.render_stack());
        self.report.push(FailureRecord {
            context: self.stack.clone(),
            kind,
        });
    }

    /// Record a failure for one attribute of the current context.
    pub fn record_attribute(&mut self, attribute: &str, kind: FailureKind) {
        self.within(ContextFrame::attribute(attribute), |c| c.record(kind));
    }

    /// Whether anything has been recorded so far.
    pub fn has_failures(&self) -> bool {
        !self.report.is_empty()
    }

    /// Finish the pass.
    pub fn finish(self) -> FailureReport {
        self.report
    }

    fn render_stack(&self) -> String {
        self.stack
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

// ============================================================================
// Tests
// ============================================================================
