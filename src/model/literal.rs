//! Conversion between RDF literals and [`Value`]s.
//!
//! Converters are keyed by datatype IRI. A literal whose datatype has no
//! converter is handed back untouched as [`Value::Term`]; only properties that
//! *declare* a datatype require a converter, and that requirement is checked
//! when roles are composed.

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use oxrdf::{
    vocab::{rdf, xsd},
    Literal, NamedNode, NamedNodeRef, Term,
};

use super::value::{Value, ValueKind};
use crate::{Error, Result};

type ParseFn = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;
type FormatFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Two-way mapping between the lexical form of one datatype and a [`Value`].
#[derive(Clone)]
pub struct Converter {
    datatype: NamedNode,
    kind: ValueKind,
    parse: ParseFn,
    format: FormatFn,
}

impl Converter {
    pub fn new(
        datatype: NamedNode,
        kind: ValueKind,
        parse: impl Fn(&str) -> Result<Value> + Send + Sync + 'static,
        format: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            datatype,
            kind,
            parse: Arc::new(parse),
            format: Arc::new(format),
        }
    }

    #[must_use]
    pub fn datatype(&self) -> &NamedNode {
        &self.datatype
    }

    #[must_use]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("datatype", &self.datatype)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Registry of literal converters shared by every session of a composer.
#[derive(Debug)]
pub struct LiteralManager {
    converters: DashMap<NamedNode, Converter>,
}

impl Default for LiteralManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LiteralManager {
    /// Creates a manager preloaded with the XML Schema datatypes.
    #[must_use]
    pub fn new() -> Self {
        let manager = Self {
            converters: DashMap::new(),
        };
        for datatype in [xsd::STRING, rdf::LANG_STRING] {
            manager.register(Converter::new(
                datatype.into_owned(),
                ValueKind::Text,
                |lexical| Ok(Value::Text(lexical.to_owned())),
                |value| value.as_text().map(ToOwned::to_owned),
            ));
        }
        manager.register(Converter::new(
            xsd::BOOLEAN.into_owned(),
            ValueKind::Bool,
            parse_bool,
            |value| value.as_bool().map(|value| value.to_string()),
        ));
        for datatype in [
            xsd::INTEGER,
            xsd::INT,
            xsd::LONG,
            xsd::SHORT,
            xsd::BYTE,
            xsd::NON_NEGATIVE_INTEGER,
            xsd::NON_POSITIVE_INTEGER,
            xsd::POSITIVE_INTEGER,
            xsd::NEGATIVE_INTEGER,
            xsd::UNSIGNED_INT,
            xsd::UNSIGNED_SHORT,
            xsd::UNSIGNED_BYTE,
        ] {
            manager.register(Converter::new(
                datatype.into_owned(),
                ValueKind::Integer,
                |lexical| {
                    lexical
                        .trim()
                        .trim_start_matches('+')
                        .parse::<i64>()
                        .map(Value::Integer)
                        .map_err(|_| Error::conversion(lexical, "integer"))
                },
                |value| value.as_integer().map(|value| value.to_string()),
            ));
        }
        for datatype in [xsd::DOUBLE, xsd::FLOAT, xsd::DECIMAL] {
            manager.register(Converter::new(
                datatype.into_owned(),
                ValueKind::Double,
                parse_double,
                |value| value.as_double().map(format_double),
            ));
        }
        manager
    }

    /// Registers or replaces the converter of a datatype.
    pub fn register(&self, converter: Converter) {
        tracing::trace!(datatype = %converter.datatype, "registering literal converter");
        self.converters
            .insert(converter.datatype.clone(), converter);
    }

    #[must_use]
    pub fn has_converter(&self, datatype: NamedNodeRef<'_>) -> bool {
        self.converters.contains_key(&datatype.into_owned())
    }

    /// Fails with a configuration error when no converter exists.
    pub fn require(&self, datatype: &NamedNode) -> Result<()> {
        if self.converters.contains_key(datatype) {
            Ok(())
        } else {
            Err(Error::MissingConverter {
                datatype: datatype.as_str().to_owned(),
            })
        }
    }

    /// Converts a term read from the store into a value.
    pub fn to_value(&self, term: Term) -> Result<Value> {
        let Term::Literal(literal) = term else {
            return Ok(Value::Term(term));
        };
        let converter = self
            .converters
            .get(&literal.datatype().into_owned())
            .map(|entry| entry.value().clone());
        match converter {
            Some(converter) => (converter.parse)(literal.value()),
            None => Ok(Value::Term(Term::Literal(literal))),
        }
    }

    /// Converts a value into a term, using the declared datatype if any.
    pub fn to_term(&self, value: &Value, datatype: Option<&NamedNode>) -> Result<Term> {
        if let Some(datatype) = datatype {
            let converter = self
                .converters
                .get(datatype)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| Error::MissingConverter {
                    datatype: datatype.as_str().to_owned(),
                })?;
            let lexical = (converter.format)(value)
                .ok_or_else(|| Error::conversion(value, datatype.as_str()))?;
            return Ok(Literal::new_typed_literal(lexical, datatype.clone()).into());
        }
        match value {
            Value::Bool(value) => {
                Ok(Literal::new_typed_literal(value.to_string(), xsd::BOOLEAN).into())
            }
            Value::Integer(value) => {
                Ok(Literal::new_typed_literal(value.to_string(), xsd::INTEGER).into())
            }
            Value::Double(value) => {
                Ok(Literal::new_typed_literal(format_double(*value), xsd::DOUBLE).into())
            }
            Value::Text(text) => Ok(Literal::new_simple_literal(text.as_str()).into()),
            Value::Term(term) => Ok(term.clone()),
            Value::Entity(entity) => Ok(entity.resource().to_term()),
            Value::Null | Value::List(_) => Err(Error::conversion(value.type_name(), "term")),
        }
    }
}

fn parse_bool(lexical: &str) -> Result<Value> {
    match lexical.trim() {
        "true" | "1" => Ok(Value::Bool(true)),
        "false" | "0" => Ok(Value::Bool(false)),
        _ => Err(Error::conversion(lexical, "boolean")),
    }
}

fn parse_double(lexical: &str) -> Result<Value> {
    let lexical = lexical.trim();
    let value = match lexical {
        "INF" | "+INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        "NaN" => f64::NAN,
        _ => lexical
            .parse::<f64>()
            .map_err(|_| Error::conversion(lexical, "double"))?,
    };
    Ok(Value::Double(value))
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value == f64::INFINITY {
        "INF".to_owned()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_owned()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use oxrdf::{vocab::xsd, Literal, NamedNode, Term};

    use super::{Converter, LiteralManager};
    use crate::{model::Value, model::ValueKind, Error};

    #[test]
    fn decodes_builtin_datatypes() {
        let literals = LiteralManager::new();
        let term: Term = Literal::new_typed_literal("42", xsd::INT).into();
        assert_eq!(literals.to_value(term).expect("integer"), Value::Integer(42));

        let term: Term = Literal::new_typed_literal("true", xsd::BOOLEAN).into();
        assert_eq!(literals.to_value(term).expect("boolean"), Value::Bool(true));

        let term: Term = Literal::new_simple_literal("plain").into();
        assert_eq!(literals.to_value(term).expect("text"), Value::from("plain"));
    }

    #[test]
    fn unknown_datatypes_pass_through() {
        let literals = LiteralManager::new();
        let datatype = NamedNode::new("urn:test:datatype").expect("iri");
        let term: Term = Literal::new_typed_literal("x", datatype).into();
        assert_eq!(
            literals.to_value(term.clone()).expect("untouched"),
            Value::Term(term)
        );
    }

    #[test]
    fn declared_datatypes_require_a_converter() {
        let literals = LiteralManager::new();
        let datatype = NamedNode::new("urn:test:celsius").expect("iri");
        assert!(matches!(
            literals.require(&datatype),
            Err(Error::MissingConverter { .. })
        ));

        literals.register(Converter::new(
            datatype.clone(),
            ValueKind::Double,
            |lexical| {
                lexical
                    .trim_end_matches('C')
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| Error::conversion(lexical, "celsius"))
            },
            |value| value.as_double().map(|value| format!("{value}C")),
        ));

        let term = literals
            .to_term(&Value::Double(21.5), Some(&datatype))
            .expect("encoded");
        assert_eq!(
            term,
            Term::Literal(Literal::new_typed_literal("21.5C", datatype))
        );
        assert_eq!(literals.to_value(term).expect("decoded"), Value::Double(21.5));
    }

    #[test]
    fn null_has_no_term() {
        let literals = LiteralManager::new();
        assert!(literals.to_term(&Value::Null, None).is_err());
    }
}
