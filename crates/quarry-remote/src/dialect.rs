//! Protocol dialects.
//!
//! Clusters of different major versions disagree on a handful of protocol
//! details: whether mappings carry a type name, which keyword document URLs
//! use, and whether an index can exist without any mapping. A [`Dialect`]
//! captures those details; every request builder takes one explicitly.

use std::fmt;
use std::sync::Arc;

use quarry_core::{Error, Result};
use quarry_schema::codec::DateFormats;

/// Type keyword used in document URLs by current clusters.
pub const DOC_KEYWORD: &str = "_doc";
/// Hardcoded mapping type name used with 6.x clusters.
pub const LEGACY_TYPE_NAME: &str = "doc";

/// Version-specific protocol details.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// A short name for diagnostics.
    fn name(&self) -> &'static str;

    /// The path segment between index name and document id.
    fn type_keyword_for_non_mapping_api(&self) -> &'static str;

    /// The type name mappings are wrapped in, if any.
    fn type_name_for_mapping_api(&self) -> Option<&'static str>;

    /// Value of the `include_type_name` parameter on index creation and
    /// mapping APIs, if the parameter must be sent.
    fn include_type_name(&self) -> Option<bool>;

    /// Whether an index may exist with no mapping at all.
    fn is_empty_mapping_possible(&self) -> bool;

    /// Default date formats for date mappings.
    fn date_formats(&self) -> DateFormats {
        DateFormats::default()
    }
}

/// 7.x and later.
#[derive(Debug, Clone, Copy, Default)]
pub struct Elastic7Dialect;

impl Dialect for Elastic7Dialect {
    fn name(&self) -> &'static str {
        "7.x"
    }

    fn type_keyword_for_non_mapping_api(&self) -> &'static str {
        DOC_KEYWORD
    }

    fn type_name_for_mapping_api(&self) -> Option<&'static str> {
        None
    }

    // 7.x already defaults to `false`, and 8.x rejects the parameter.
    fn include_type_name(&self) -> Option<bool> {
        None
    }

    fn is_empty_mapping_possible(&self) -> bool {
        false
    }
}

/// 6.7 and later 6.x.
#[derive(Debug, Clone, Copy, Default)]
pub struct Elastic6Dialect;

impl Dialect for Elastic6Dialect {
    fn name(&self) -> &'static str {
        "6.x"
    }

    fn type_keyword_for_non_mapping_api(&self) -> &'static str {
        LEGACY_TYPE_NAME
    }

    fn type_name_for_mapping_api(&self) -> Option<&'static str> {
        Some(LEGACY_TYPE_NAME)
    }

    fn include_type_name(&self) -> Option<bool> {
        Some(true)
    }

    fn is_empty_mapping_possible(&self) -> bool {
        true
    }
}

/// Pick a dialect from a configured version string (`"7"`, `"7.10"`, `"6.8.2"`).
pub fn dialect_for_version(version: &str) -> Result<Arc<dyn Dialect>> {
    let major = version.trim().split('.').next().unwrap_or_default();
    match major.parse::<u32>() {
        Ok(6) => Ok(Arc::new(Elastic6Dialect)),
        Ok(7..) => Ok(Arc::new(Elastic7Dialect)),
        _ => Err(Error::config(format!(
            "Unsupported cluster version '{version}'; expected 6.x or 7.x and later"
        ))),
    }
}
