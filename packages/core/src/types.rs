//! Value shapes understood by the marshaller.
//!
//! A [`TypeSpec`] is the schema-level description of a parameter or return
//! value. Rust types describe themselves through [`WireType`], so a schema can
//! be declared with `returns::<Vec<Disk>>()` instead of spelling the shape out
//! by hand.

use std::fmt;

use serde_json::Value;

/// The shape of a value on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    /// No value. Used for endpoints that return nothing.
    Unit,
    Text,
    Integer,
    Float,
    Boolean,
    /// Free-form structured data, accepted without inspection.
    Any,
    /// The inner value or the absent marker (`null`).
    Optional(Box<TypeSpec>),
    /// An ordered sequence; element order is preserved exactly.
    Sequence(Box<TypeSpec>),
    Enum(EnumSpec),
    Record(RecordSpec),
    Union(UnionSpec),
}

impl TypeSpec {
    pub fn optional(inner: TypeSpec) -> Self {
        TypeSpec::Optional(Box::new(inner))
    }

    pub fn sequence(inner: TypeSpec) -> Self {
        TypeSpec::Sequence(Box::new(inner))
    }

    /// `true` for shapes that fit in a single query token: scalars,
    /// enumerations, and optional wrappers around those.
    pub fn is_query_safe(&self) -> bool {
        match self {
            TypeSpec::Text
            | TypeSpec::Integer
            | TypeSpec::Float
            | TypeSpec::Boolean
            | TypeSpec::Enum(_) => true,
            TypeSpec::Optional(inner) => inner.is_query_safe(),
            _ => false,
        }
    }

    /// `true` if a bare (unquoted) query token should be read as a string.
    pub(crate) fn accepts_bare_text(&self) -> bool {
        match self {
            TypeSpec::Text | TypeSpec::Enum(_) => true,
            TypeSpec::Optional(inner) => inner.accepts_bare_text(),
            _ => false,
        }
    }
}

/// Formats the shape the way it is printed in route listings,
/// e.g. `Optional[List[Disk]]`.
impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Unit => write!(f, "None"),
            TypeSpec::Text => write!(f, "str"),
            TypeSpec::Integer => write!(f, "int"),
            TypeSpec::Float => write!(f, "float"),
            TypeSpec::Boolean => write!(f, "bool"),
            TypeSpec::Any => write!(f, "any"),
            TypeSpec::Optional(inner) => write!(f, "Optional[{inner}]"),
            TypeSpec::Sequence(inner) => write!(f, "List[{inner}]"),
            TypeSpec::Enum(e) => write!(f, "{}", e.name),
            TypeSpec::Record(r) => write!(f, "{}", r.name),
            TypeSpec::Union(u) => write!(f, "{}", u.name),
        }
    }
}

/// An enumeration, encoded as one of its declared names.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSpec {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumSpec {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

impl From<EnumSpec> for TypeSpec {
    fn from(spec: EnumSpec) -> Self {
        TypeSpec::Enum(spec)
    }
}

/// One named field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeSpec,
    /// Value used when the field is missing from an incoming record.
    pub default: Option<Value>,
}

/// A named set of typed fields, encoded as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl RecordSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field described by `T`.
    pub fn field<T: WireType>(self, name: impl Into<String>) -> Self {
        self.field_spec(name, T::type_spec(), None)
    }

    /// Add an optional field (`Option<T>`) that defaults to absent.
    pub fn optional<T: WireType>(self, name: impl Into<String>) -> Self {
        self.field_spec(name, TypeSpec::optional(T::type_spec()), Some(Value::Null))
    }

    /// Add a field described by `T` that takes `default` when missing.
    pub fn field_or<T: WireType>(self, name: impl Into<String>, default: Value) -> Self {
        self.field_spec(name, T::type_spec(), Some(default))
    }

    pub fn field_spec(
        mut self,
        name: impl Into<String>,
        ty: TypeSpec,
        default: Option<Value>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            ty,
            default,
        });
        self
    }
}

impl From<RecordSpec> for TypeSpec {
    fn from(spec: RecordSpec) -> Self {
        TypeSpec::Record(spec)
    }
}

/// The default discriminant field for tagged unions.
pub const DEFAULT_TAG: &str = "$type";

/// A tagged union: the discriminant field names which variant's field set
/// follows. Each variant is a record whose name is its discriminant value.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionSpec {
    pub name: String,
    pub tag: String,
    pub variants: Vec<RecordSpec>,
}

impl UnionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: DEFAULT_TAG.to_string(),
            variants: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn variant(mut self, record: RecordSpec) -> Self {
        self.variants.push(record);
        self
    }

    pub fn find(&self, discriminant: &str) -> Option<&RecordSpec> {
        self.variants.iter().find(|v| v.name == discriminant)
    }
}

impl From<UnionSpec> for TypeSpec {
    fn from(spec: UnionSpec) -> Self {
        TypeSpec::Union(spec)
    }
}

// ---------------------------------------------------------------------------
// WireType
// ---------------------------------------------------------------------------

/// A Rust type with a known wire shape.
///
/// Domain records implement this by hand next to their serde derives:
///
/// ```rust,ignore
/// impl WireType for KeyboardSetting {
///     fn type_spec() -> TypeSpec {
///         RecordSpec::new("KeyboardSetting")
///             .field::<String>("layout")
///             .field_or::<String>("variant", json!(""))
///             .into()
///     }
/// }
/// ```
pub trait WireType {
    fn type_spec() -> TypeSpec;
}

impl WireType for () {
    fn type_spec() -> TypeSpec {
        TypeSpec::Unit
    }
}

impl WireType for String {
    fn type_spec() -> TypeSpec {
        TypeSpec::Text
    }
}

impl WireType for bool {
    fn type_spec() -> TypeSpec {
        TypeSpec::Boolean
    }
}

impl WireType for f64 {
    fn type_spec() -> TypeSpec {
        TypeSpec::Float
    }
}

macro_rules! integer_wire_type {
    ($($t:ty),*) => {
        $(impl WireType for $t {
            fn type_spec() -> TypeSpec {
                TypeSpec::Integer
            }
        })*
    };
}

integer_wire_type!(i32, i64, u32, u64, usize);

impl WireType for Value {
    fn type_spec() -> TypeSpec {
        TypeSpec::Any
    }
}

impl<T: WireType> WireType for Option<T> {
    fn type_spec() -> TypeSpec {
        TypeSpec::optional(T::type_spec())
    }
}

impl<T: WireType> WireType for Vec<T> {
    fn type_spec() -> TypeSpec {
        TypeSpec::sequence(T::type_spec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_safety() {
        assert!(String::type_spec().is_query_safe());
        assert!(Option::<bool>::type_spec().is_query_safe());
        assert!(TypeSpec::from(EnumSpec::new("Mode", ["A", "B"])).is_query_safe());
        assert!(!Vec::<String>::type_spec().is_query_safe());
        assert!(!TypeSpec::from(RecordSpec::new("R")).is_query_safe());
        assert!(!TypeSpec::Any.is_query_safe());
    }

    #[test]
    fn display_nests() {
        let spec = Option::<Vec<String>>::type_spec();
        assert_eq!(spec.to_string(), "Optional[List[str]]");
    }
}
