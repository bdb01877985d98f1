//! Scalar coercion between stored representations and typed values.
//!
//! Documents store scalars in one of two shapes: the DOM backend keeps every attribute as text,
//! the map backend keeps boxed [`Value`]s that may have been produced by a JSON decoder and so
//! only loosely match the declared kind (all JSON integers arrive as [`Value::Long`]). The
//! functions here turn both shapes into a [`Value`] of the field's declared [`ScalarKind`], or
//! fail with [`OmeError::Coercion`]. Absence is never an error: `parse(None, kind)` is `Ok(None)`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::error::OmeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Double,
    Long,
    Boolean,
}

impl Display for ScalarKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Long => "long",
            ScalarKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A typed scalar. The variant always agrees with the [`ScalarKind`] it was coerced to.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Value {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Value::String(_) => ScalarKind::String,
            Value::Integer(_) => ScalarKind::Integer,
            Value::Float(_) => ScalarKind::Float,
            Value::Double(_) => ScalarKind::Double,
            Value::Long(_) => ScalarKind::Long,
            Value::Boolean(_) => ScalarKind::Boolean,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format(self))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

/// Parse a stored textual value as `kind`.
///
/// `None` means the attribute or entry was never set and yields `Ok(None)` for every kind.
pub fn parse(raw: Option<&str>, kind: ScalarKind) -> Result<Option<Value>, OmeError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = match kind {
        ScalarKind::String => Value::String(raw.to_string()),
        ScalarKind::Integer => Value::Integer(
            raw.trim()
                .parse::<i32>()
                .map_err(|e| OmeError::coercion(kind, raw, e))?,
        ),
        ScalarKind::Long => Value::Long(
            raw.trim()
                .parse::<i64>()
                .map_err(|e| OmeError::coercion(kind, raw, e))?,
        ),
        ScalarKind::Float => Value::Float(parse_float::<f32>(raw, kind)?),
        ScalarKind::Double => Value::Double(parse_float::<f64>(raw, kind)?),
        ScalarKind::Boolean => match raw.trim() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => {
                return Err(OmeError::coercion(
                    kind,
                    raw,
                    "expected 'true' or 'false'",
                ))
            }
        },
    };
    Ok(Some(value))
}

fn parse_float<F>(raw: &str, kind: ScalarKind) -> Result<F, OmeError>
where
    F: std::str::FromStr,
    F::Err: Display,
{
    // XML Schema spells these INF, -INF and NaN; the std parser accepts them case-insensitively.
    raw.trim()
        .parse::<F>()
        .map_err(|e| OmeError::coercion(kind, raw, e))
}

/// Render a value in the canonical textual form written into DOM attributes.
pub fn format(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(v) => v.to_string(),
        Value::Long(v) => v.to_string(),
        Value::Boolean(v) => v.to_string(),
        Value::Float(v) => format_float(f64::from(*v), v.to_string()),
        Value::Double(v) => format_float(*v, v.to_string()),
    }
}

fn format_float(v: f64, shortest: String) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "INF".to_string()
    } else if v == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        shortest
    }
}

/// Convert a boxed value (as stored by the map backend) to `kind`.
///
/// Text is parsed and any value reads as its formatted text. Integral values widen or narrow when
/// lossless and convert to either floating kind. Everything else is a coercion error.
pub fn coerce(value: Value, kind: ScalarKind) -> Result<Value, OmeError> {
    if value.kind() == kind {
        return Ok(value);
    }
    if let Value::String(s) = &value {
        return parse(Some(s.as_str()), kind)?
            .ok_or_else(|| OmeError::coercion(kind, s, "no value produced"));
    }
    let converted = match (&value, kind) {
        (Value::Integer(v), ScalarKind::Long) => Some(Value::Long(i64::from(*v))),
        (Value::Long(v), ScalarKind::Integer) => i32::try_from(*v).ok().map(Value::Integer),
        (Value::Integer(v), ScalarKind::Double) => Some(Value::Double(f64::from(*v))),
        (Value::Integer(v), ScalarKind::Float) => Some(Value::Float(*v as f32)),
        (Value::Long(v), ScalarKind::Double) => Some(Value::Double(*v as f64)),
        (Value::Long(v), ScalarKind::Float) => Some(Value::Float(*v as f32)),
        (Value::Float(v), ScalarKind::Double) => Some(Value::Double(f64::from(*v))),
        (Value::Double(v), ScalarKind::Float) => Some(Value::Float(*v as f32)),
        (_, ScalarKind::String) => Some(Value::String(format(&value))),
        _ => None,
    };
    converted.ok_or_else(|| {
        OmeError::coercion(
            kind,
            format(&value),
            format!("stored {} is not convertible", value.kind()),
        )
    })
}

/// Rust types that map onto a [`ScalarKind`]. Typed accessors are written against this trait.
pub trait Scalar: Sized {
    const KIND: ScalarKind;

    fn from_value(value: Value) -> Result<Self, OmeError>;

    fn into_value(self) -> Value;
}

macro_rules! impl_scalar {
    ($ty:ty, $kind:ident) => {
        impl Scalar for $ty {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn from_value(value: Value) -> Result<Self, OmeError> {
                match coerce(value, Self::KIND)? {
                    Value::$kind(v) => Ok(v),
                    other => Err(OmeError::coercion(
                        Self::KIND,
                        format(&other),
                        "coercion produced the wrong kind",
                    )),
                }
            }

            fn into_value(self) -> Value {
                Value::$kind(self)
            }
        }
    };
}

impl_scalar!(String, String);
impl_scalar!(i32, Integer);
impl_scalar!(i64, Long);
impl_scalar!(f32, Float);
impl_scalar!(f64, Double);
impl_scalar!(bool, Boolean);

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [ScalarKind; 6] = [
        ScalarKind::String,
        ScalarKind::Integer,
        ScalarKind::Float,
        ScalarKind::Double,
        ScalarKind::Long,
        ScalarKind::Boolean,
    ];

    #[test]
    fn test_absent_is_not_an_error() {
        for kind in ALL_KINDS {
            assert_eq!(parse(None, kind), Ok(None), "kind {kind}");
        }
    }

    #[test]
    fn test_boolean_forms() {
        assert_eq!(
            parse(Some("true"), ScalarKind::Boolean),
            Ok(Some(Value::Boolean(true)))
        );
        assert_eq!(
            parse(Some("false"), ScalarKind::Boolean),
            Ok(Some(Value::Boolean(false)))
        );
        for bad in ["TRUE", "1", "yes", ""] {
            assert!(matches!(
                parse(Some(bad), ScalarKind::Boolean),
                Err(OmeError::Coercion { .. })
            ));
        }
    }

    #[test]
    fn test_numeric_failures_surface() {
        assert!(parse(Some("12.5"), ScalarKind::Integer).is_err());
        assert!(parse(Some("3000000000"), ScalarKind::Integer).is_err());
        assert_eq!(
            parse(Some("3000000000"), ScalarKind::Long),
            Ok(Some(Value::Long(3_000_000_000)))
        );
        assert!(parse(Some("abc"), ScalarKind::Double).is_err());
        assert_eq!(
            parse(Some(" 42 "), ScalarKind::Integer),
            Ok(Some(Value::Integer(42)))
        );
    }

    #[test]
    fn test_format_then_parse_is_stable() {
        let samples: &[(&str, ScalarKind)] = &[
            ("some text", ScalarKind::String),
            ("", ScalarKind::String),
            ("-17", ScalarKind::Integer),
            ("0.1", ScalarKind::Float),
            ("1e-7", ScalarKind::Float),
            ("1.4", ScalarKind::Double),
            ("6.02214076e23", ScalarKind::Double),
            ("INF", ScalarKind::Double),
            ("-INF", ScalarKind::Float),
            ("9223372036854775807", ScalarKind::Long),
            ("true", ScalarKind::Boolean),
            ("false", ScalarKind::Boolean),
        ];
        for (raw, kind) in samples {
            let first = parse(Some(*raw), *kind).unwrap().unwrap();
            let text = format(&first);
            let second = parse(Some(text.as_str()), *kind).unwrap().unwrap();
            assert_eq!(first, second, "{raw} as {kind} formatted to {text}");
        }
    }

    #[test]
    fn test_nan_formats_in_schema_spelling() {
        let nan = parse(Some("NaN"), ScalarKind::Double).unwrap().unwrap();
        assert_eq!(format(&nan), "NaN");
        assert!(matches!(
            parse(Some(format(&nan).as_str()), ScalarKind::Double),
            Ok(Some(Value::Double(v))) if v.is_nan()
        ));
    }

    #[test]
    fn test_coerce_boxed_values() {
        assert_eq!(
            coerce(Value::Long(7), ScalarKind::Integer),
            Ok(Value::Integer(7))
        );
        assert!(coerce(Value::Long(i64::MAX), ScalarKind::Integer).is_err());
        assert_eq!(
            coerce(Value::Long(2), ScalarKind::Double),
            Ok(Value::Double(2.0))
        );
        assert_eq!(
            coerce(Value::String("true".into()), ScalarKind::Boolean),
            Ok(Value::Boolean(true))
        );
        assert!(coerce(Value::Boolean(true), ScalarKind::Integer).is_err());
        assert!(coerce(Value::Double(1.5), ScalarKind::Long).is_err());
    }

    #[test]
    fn test_coerce_any_value_to_text() {
        assert_eq!(
            coerce(Value::Long(7), ScalarKind::String),
            Ok(Value::String("7".into()))
        );
        assert_eq!(
            coerce(Value::Boolean(false), ScalarKind::String),
            Ok(Value::String("false".into()))
        );
        assert_eq!(
            coerce(Value::Double(f64::NEG_INFINITY), ScalarKind::String),
            Ok(Value::String("-INF".into()))
        );
        assert_eq!(String::from_value(Value::Integer(-3)), Ok("-3".to_string()));
    }

    #[test]
    fn test_scalar_trait_round_trip() {
        assert_eq!(i32::from_value(Value::Long(5)), Ok(5));
        assert_eq!(
            String::from_value(Value::String("x".into())),
            Ok("x".to_string())
        );
        assert!(bool::from_value(Value::Integer(1)).is_err());
        assert_eq!(2.5f64.into_value(), Value::Double(2.5));
    }
}
