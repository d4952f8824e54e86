use std::fmt::{self, Display, Formatter};

use oxrdf::Term;

use super::value_objects::Resource;
use crate::object::Entity;

/// Dynamic value carried through dispatch chains: method arguments, return
/// values and property elements.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Term(Term),
    Entity(Entity),
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    /// The resource this value denotes, when it denotes one.
    #[must_use]
    pub fn as_resource(&self) -> Option<Resource> {
        match self {
            Self::Entity(entity) => Some(entity.resource().clone()),
            Self::Term(term) => Resource::from_term(term),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::Text(_) => "text",
            Self::Term(_) => "term",
            Self::Entity(_) => "entity",
            Self::List(_) => "list",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Term(term) => write!(f, "{term}"),
            Self::Entity(entity) => write!(f, "{}", entity.resource()),
            Self::List(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Term> for Value {
    fn from(value: Term) -> Self {
        Self::Term(value)
    }
}

impl From<Resource> for Value {
    fn from(value: Resource) -> Self {
        Self::Term(value.to_term())
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Self::Entity(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::List(values)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Declared kind of a parameter, return value or property element.
///
/// `Entity(Some(concept))` narrows to entities implementing the named
/// concept; it is the only kind that participates in covariance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Any,
    Null,
    Bool,
    Integer,
    Double,
    Text,
    Term,
    Resource,
    Entity(Option<String>),
    List(Box<ValueKind>),
}

impl ValueKind {
    /// Shorthand for an entity of the given concept.
    #[must_use]
    pub fn entity(concept: impl Into<String>) -> Self {
        Self::Entity(Some(concept.into()))
    }

    /// Shorthand for a list of the given element kind.
    #[must_use]
    pub fn list(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    /// Primitive kinds never read back as `Null`.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Bool | Self::Integer | Self::Double)
    }

    /// Value read from an empty property of this kind.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Integer => Value::Integer(0),
            Self::Double => Value::Double(0.0),
            _ => Value::Null,
        }
    }

    /// Whether a value may be passed where this kind is declared.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (kind, Value::Null) => !kind.is_primitive(),
            (Self::Bool, Value::Bool(_))
            | (Self::Integer, Value::Integer(_))
            | (Self::Double, Value::Double(_) | Value::Integer(_))
            | (Self::Text, Value::Text(_))
            | (Self::Term, Value::Term(_) | Value::Entity(_))
            | (Self::Entity(None), Value::Entity(_)) => true,
            (Self::Resource, value) => value.as_resource().is_some(),
            (Self::Entity(Some(concept)), Value::Entity(entity)) => entity.is(concept),
            (Self::List(element), Value::List(values)) => {
                values.iter().all(|value| element.accepts(value))
            }
            _ => false,
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Null => f.write_str("null"),
            Self::Bool => f.write_str("bool"),
            Self::Integer => f.write_str("integer"),
            Self::Double => f.write_str("double"),
            Self::Text => f.write_str("text"),
            Self::Term => f.write_str("term"),
            Self::Resource => f.write_str("resource"),
            Self::Entity(None) => f.write_str("entity"),
            Self::Entity(Some(concept)) => write!(f, "{concept}"),
            Self::List(element) => write!(f, "list<{element}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Value, ValueKind};

    #[test]
    fn primitive_kinds_have_zero_values() {
        assert_eq!(ValueKind::Integer.zero_value(), Value::Integer(0));
        assert_eq!(ValueKind::Bool.zero_value(), Value::Bool(false));
        assert_eq!(ValueKind::Text.zero_value(), Value::Null);
    }

    #[test]
    fn kinds_accept_compatible_values() {
        assert!(ValueKind::Double.accepts(&Value::Integer(3)));
        assert!(!ValueKind::Integer.accepts(&Value::Null));
        assert!(ValueKind::Text.accepts(&Value::Null));
        assert!(ValueKind::list(ValueKind::Integer)
            .accepts(&Value::List(vec![Value::Integer(1), Value::Integer(2)])));
        assert!(!ValueKind::list(ValueKind::Integer).accepts(&Value::List(vec![Value::from("x")])));
    }

    #[test]
    fn options_map_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}
