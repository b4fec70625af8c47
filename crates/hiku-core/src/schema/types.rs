//! Declared shapes of complex field values.

use indexmap::IndexMap;
use std::fmt;

/// Shape metadata for a field whose value is itself structured.
///
/// Only consulted by the denormalizer, when a query link targets a field
/// instead of a schema link.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldType {
    /// Opaque value, copied as-is.
    #[default]
    Any,
    /// Object with named, typed members.
    Record(IndexMap<String, FieldType>),
    /// Homogeneous list.
    Sequence(Box<FieldType>),
    /// Value or null.
    Optional(Box<FieldType>),
    /// Named entry of the graph's data types.
    TypeRef(String),
}

impl FieldType {
    pub fn record<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        Self::Record(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn sequence(inner: FieldType) -> Self {
        Self::Sequence(Box::new(inner))
    }

    pub fn optional(inner: FieldType) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn type_ref(name: impl Into<String>) -> Self {
        Self::TypeRef(name.into())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Record(members) => {
                f.write_str("Record{")?;
                for (i, (name, ty)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                f.write_str("}")
            }
            Self::Sequence(inner) => write!(f, "Sequence[{}]", inner),
            Self::Optional(inner) => write!(f, "Optional[{}]", inner),
            Self::TypeRef(name) => write!(f, "TypeRef[{}]", name),
        }
    }
}
