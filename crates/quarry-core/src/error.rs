//! Error types for Quarry.
//!
//! Every failure condition of the schema core has its own variant; the
//! coarser taxonomy used for reporting and exit codes is available through
//! [`Error::kind`].

use crate::capability::Capability;
use crate::failure::FailureReport;

/// Result type alias for Quarry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown kind, illegal option combination, unknown analyzer name.
    Configuration,
    /// Duplicate field, separator in a segment, unknown field at build time.
    SchemaBuild,
    /// An aggregated schema validation report.
    ValidationReport,
    /// Non-2xx response from the remote backend.
    RemoteProtocol,
    /// I/O or timeout while talking to the remote backend.
    RemoteTransport,
    /// A DSL builder was requested for an incapable or conflicting field.
    QueryTimeIncompatibility,
    /// The embedded engine failed to open, write, or commit an index.
    Engine,
}

/// Errors that can occur in Quarry.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No codec is registered for a logical value type.
    #[error("Unsupported value kind: '{name}'")]
    UnsupportedKind {
        /// The requested logical type.
        name: String,
    },

    /// Generic configuration error.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong.
        message: String,
    },

    /// Two options that cannot be combined were both set.
    #[error("Invalid field type options for '{path}': {message}")]
    IllegalOption {
        /// Field path, or the kind name when the path is not known yet.
        path: String,
        /// What is wrong.
        message: String,
    },

    /// An analyzer or normalizer name is not defined.
    #[error("Unknown {what} '{name}'. Define it through the analysis configuration")]
    UnknownAnalyzer {
        /// "analyzer" or "normalizer".
        what: &'static str,
        /// The undefined name.
        name: String,
    },

    /// A field name is declared twice under the same parent.
    #[error("Duplicate index field definition: '{path}'")]
    DuplicateField {
        /// Absolute path of the duplicate.
        path: String,
    },

    /// A field name is empty or contains the path separator.
    #[error("Invalid field name '{name}': {reason}")]
    InvalidFieldName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A path does not resolve to a field.
    #[error("Unknown field '{path}'")]
    UnknownField {
        /// Absolute path that failed to resolve.
        path: String,
    },

    /// A builder was requested for a capability the field does not have.
    #[error("Field '{path}' is not {capability}. Make sure the field is marked as {capability}.")]
    NotCapable {
        /// Absolute field path.
        path: String,
        /// The missing capability.
        capability: Capability,
    },

    /// A field is unusable for the requested operation, or the indexes of a
    /// scope disagree on its definition.
    #[error("Incompatible field '{path}': {message}")]
    IncompatibleScope {
        /// Absolute field path.
        path: String,
        /// What is incompatible.
        message: String,
    },

    /// A value could not be encoded or decoded.
    #[error("Conversion error: {message}")]
    Conversion {
        /// What failed.
        message: String,
    },

    /// Schema validation found one or more discrepancies.
    #[error("Schema validation failed with {n} failure(s):\n{r}", n = .0.len(), r = .0)]
    Validation(FailureReport),

    /// The backend answered with a non-success status.
    #[error("Request {method} {path} failed with status {status}: {message}")]
    RemoteProtocol {
        /// HTTP method.
        method: String,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Error body or reason.
        message: String,
    },

    /// The backend could not be reached.
    #[error("Transport error: {message}")]
    RemoteTransport {
        /// What failed.
        message: String,
        /// Source error if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The embedded engine reported a failure.
    #[error("Embedded engine error: {message}")]
    Engine {
        /// What failed.
        message: String,
    },

    /// I/O error (configuration and schema files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Map this error onto the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedKind { .. }
            | Error::Configuration { .. }
            | Error::IllegalOption { .. }
            | Error::UnknownAnalyzer { .. }
            | Error::Io(_)
            | Error::Serialization(_) => ErrorKind::Configuration,
            Error::DuplicateField { .. } | Error::InvalidFieldName { .. } => {
                ErrorKind::SchemaBuild
            }
            Error::Validation(_) => ErrorKind::ValidationReport,
            Error::RemoteProtocol { .. } => ErrorKind::RemoteProtocol,
            Error::RemoteTransport { .. } => ErrorKind::RemoteTransport,
            Error::Engine { .. } => ErrorKind::Engine,
            Error::UnknownField { .. }
            | Error::NotCapable { .. }
            | Error::IncompatibleScope { .. }
            | Error::Conversion { .. } => ErrorKind::QueryTimeIncompatibility,
        }
    }

    /// Returns whether this error is retryable.
    ///
    /// Only transport failures are; everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RemoteTransport { .. })
    }

    /// The failure report, for validation errors.
    pub fn report(&self) -> Option<&FailureReport> {
        match self {
            Error::Validation(report) => Some(report),
            _ => None,
        }
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates an illegal option error.
    pub fn illegal_option<P, M>(path: P, message: M) -> Self
    where
        P: Into<String>,
        M: Into<String>,
    {
        Error::IllegalOption {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a conversion error.
    pub fn conversion<S: Into<String>>(message: S) -> Self {
        Error::Conversion {
            message: message.into(),
        }
    }

    /// Creates an embedded engine error.
    pub fn engine<S: Into<String>>(message: S) -> Self {
        Error::Engine {
            message: message.into(),
        }
    }

    /// Creates an incompatibility error.
    pub fn incompatible<P, M>(path: P, message: M) -> Self
    where
        P: Into<String>,
        M: Into<String>,
    {
        Error::IncompatibleScope {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Error::RemoteTransport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport error with a source.
    pub fn transport_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::RemoteTransport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
