//! Field path utilities.
//!
//! Absolute field paths are dot-separated sequences of local names. Local
//! names never contain the separator and are never empty.

use crate::error::{Error, Result};

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Check that `name` is usable as a single path segment.
///
/// # Examples
///
/// ```
/// use quarry_core::path::check_segment;
///
/// assert!(check_segment("title").is_ok());
/// assert!(check_segment("author.name").is_err());
/// assert!(check_segment("").is_err());
/// ```
pub fn check_segment(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidFieldName {
            name: name.to_string(),
            reason: "field names must not be empty".to_string(),
        });
    }
    if name.contains(SEPARATOR) {
        return Err(Error::InvalidFieldName {
            name: name.to_string(),
            reason: format!("field names must not contain '{SEPARATOR}'"),
        });
    }
    Ok(())
}

/// Join a parent path and a local name.
///
/// The root is represented by `None`.
///
/// # Examples
///
/// ```
/// use quarry_core::path::join;
///
/// assert_eq!(join(None, "title"), "title");
/// assert_eq!(join(Some("author"), "name"), "author.name");
/// ```
pub fn join(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}{SEPARATOR}{name}"),
        _ => name.to_string(),
    }
}

/// Split an absolute path into its segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR)
}

/// The parent path of `path`, if it is not a root-level field.
///
/// # Examples
///
/// ```
/// use quarry_core::path::parent;
///
/// assert_eq!(parent("a.b.c"), Some("a.b"));
/// assert_eq!(parent("a"), None);
/// ```
pub fn parent(path: &str) -> Option<&str> {
    path.rfind(SEPARATOR).map(|i| &path[..i])
}

/// The last segment of `path`.
pub fn local_name(path: &str) -> &str {
    path.rfind(SEPARATOR).map_or(path, |i| &path[i + 1..])
}
