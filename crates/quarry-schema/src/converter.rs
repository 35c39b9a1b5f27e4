//! User-declared value converters.
//!
//! A field type carries two converter pairs. The "YES" pair applies the
//! conversions the user declared: DSL values are converted before encoding,
//! and decoded index values are converted before being projected. The "NO"
//! pair passes the raw index representation through untouched.

use std::fmt;
use std::sync::Arc;

use crate::value::FieldValue;
use quarry_core::Result;

/// Which converter pair to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueConvert {
    /// Apply user-declared converters.
    #[default]
    Yes,
    /// Work on raw index values.
    No,
}

/// A conversion between a user-facing value and an index value.
pub trait ValueConverter: Send + Sync {
    /// A stable name identifying the conversion.
    fn name(&self) -> &str;

    /// Convert one value.
    fn convert(&self, value: FieldValue) -> Result<FieldValue>;

    /// Whether `other` performs the same conversion.
    fn is_compatible_with(&self, other: &dyn ValueConverter) -> bool {
        self.name() == other.name()
    }
}

/// A converter slot: either passthrough or a user converter.
#[derive(Clone, Default)]
pub enum Converter {
    /// Values are left as they are.
    #[default]
    Passthrough,
    /// A user-declared converter.
    Custom(Arc<dyn ValueConverter>),
}

impl Converter {
    /// Wrap a user converter.
    pub fn custom(converter: impl ValueConverter + 'static) -> Self {
        Converter::Custom(Arc::new(converter))
    }

    /// A converter backed by a function.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(FieldValue) -> Result<FieldValue> + Send + Sync + 'static,
    {
        Converter::custom(FnConverter {
            name: name.into(),
            f,
        })
    }

    /// Whether this is the passthrough converter.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Converter::Passthrough)
    }

    /// Apply the conversion.
    pub fn convert(&self, value: FieldValue) -> Result<FieldValue> {
        match self {
            Converter::Passthrough => Ok(value),
            Converter::Custom(converter) => converter.convert(value),
        }
    }

    /// Two passthroughs are compatible; two custom converters are when they
    /// say so; a mix never is.
    pub fn is_compatible_with(&self, other: &Converter) -> bool {
        match (self, other) {
            (Converter::Passthrough, Converter::Passthrough) => true,
            (Converter::Custom(a), Converter::Custom(b)) => a.is_compatible_with(b.as_ref()),
            _ => false,
        }
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converter::Passthrough => write!(f, "Passthrough"),
            Converter::Custom(c) => write!(f, "Custom({})", c.name()),
        }
    }
}

struct FnConverter<F> {
    name: String,
    f: F,
}

impl<F> ValueConverter for FnConverter<F>
where
    F: Fn(FieldValue) -> Result<FieldValue> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn convert(&self, value: FieldValue) -> Result<FieldValue> {
        (self.f)(value)
    }
}
