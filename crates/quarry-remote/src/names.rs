//! Index identity and naming.
//!
//! Every managed index is known by a base name. The cluster-side primary
//! index is created as `<base>-000001`; reads and writes go through the
//! `<base>-read` and `<base>-write` aliases, so the primary can later be
//! replaced without touching readers or writers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Suffix of the primary index created for a base name.
pub const PRIMARY_SUFFIX: &str = "-000001";
/// Default write alias suffix.
pub const WRITE_ALIAS_SUFFIX: &str = "-write";
/// Default read alias suffix.
pub const READ_ALIAS_SUFFIX: &str = "-read";
/// Placeholder substituted by the base name in alias templates.
pub const BASE_PLACEHOLDER: &str = "{base}";

static PRIMARY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-\d{6}$").expect("Invalid primary name regex"));

/// Names under which one logical index lives on the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexIdentity {
    base: String,
    primary: String,
    write_alias: String,
    read_alias: String,
    mapped_type_name: String,
}

impl IndexIdentity {
    /// Identity with default primary and alias names.
    pub fn new(base: impl Into<String>, mapped_type_name: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            primary: format!("{base}{PRIMARY_SUFFIX}"),
            write_alias: format!("{base}{WRITE_ALIAS_SUFFIX}"),
            read_alias: format!("{base}{READ_ALIAS_SUFFIX}"),
            mapped_type_name: mapped_type_name.into(),
            base,
        }
    }

    /// Override alias names with templates; `{base}` is replaced by the base
    /// name.
    pub fn with_alias_templates(mut self, read: Option<&str>, write: Option<&str>) -> Self {
        if let Some(read) = read {
            self.read_alias = read.replace(BASE_PLACEHOLDER, &self.base);
        }
        if let Some(write) = write {
            self.write_alias = write.replace(BASE_PLACEHOLDER, &self.base);
        }
        self
    }

    /// Override the primary index name.
    pub fn with_primary(mut self, primary: impl Into<String>) -> Self {
        self.primary = primary.into();
        self
    }

    /// Base name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Primary index name.
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Write alias.
    pub fn write_alias(&self) -> &str {
        &self.write_alias
    }

    /// Read alias.
    pub fn read_alias(&self) -> &str {
        &self.read_alias
    }

    /// Entity type name of the documents stored in this index.
    pub fn mapped_type_name(&self) -> &str {
        &self.mapped_type_name
    }

    /// Every cluster-side name this identity claims.
    pub fn names(&self) -> [&str; 3] {
        [&self.primary, &self.write_alias, &self.read_alias]
    }
}

/// Recover a base name from a primary index name of the `<base>-NNNNNN`
/// shape.
pub fn base_from_primary(primary: &str) -> Option<&str> {
    PRIMARY_NAME
        .captures(primary)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Recover a base name from a default read or write alias.
pub fn base_from_alias(alias: &str) -> Option<&str> {
    alias
        .strip_suffix(WRITE_ALIAS_SUFFIX)
        .or_else(|| alias.strip_suffix(READ_ALIAS_SUFFIX))
        .filter(|base| !base.is_empty())
}
