use std::{fmt, io};

use quick_xml::{events::attributes::AttrError, Error as XmlError};
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

use crate::value::ScalarKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum OmeError {
    /// A stored value does not match the declared kind of the field it backs.
    #[error("Cannot read {value:?} as {kind}: {reason}")]
    Coercion {
        kind: ScalarKind,
        value: String,
        reason: String,
    },
    /// The schema and the code asking for a type disagree. This is a programming error.
    #[error("Type '{0}' is not registered")]
    UnknownType(String),
    #[error("Type '{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },
    #[error("Type '{type_name}' has no relation '{relation}'")]
    UnknownRelation {
        type_name: String,
        relation: String,
    },
    #[error("Expected a record of type '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },
    #[error("Reference '{relation}' -> '{id}' matches {count} elements")]
    AmbiguousReference {
        relation: String,
        id: String,
        count: usize,
    },
    #[error("Reference '{relation}' -> '{id}' matches no element")]
    DanglingReference { relation: String, id: String },
    #[error("Invalid locus: {0}")]
    InvalidLocus(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("File System error: {0}")]
    Io(String),
}

impl OmeError {
    pub(crate) fn coercion<V: fmt::Display, R: fmt::Display>(
        kind: ScalarKind,
        value: V,
        reason: R,
    ) -> OmeError {
        OmeError::Coercion {
            kind,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that indicate a schema/code mismatch rather than bad document data.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            OmeError::UnknownType(_)
                | OmeError::TypeMismatch { .. }
                | OmeError::UnknownField { .. }
                | OmeError::UnknownRelation { .. }
        )
    }
}

impl From<toml::de::Error> for OmeError {
    fn from(src: toml::de::Error) -> OmeError {
        OmeError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for OmeError {
    fn from(src: toml::ser::Error) -> OmeError {
        OmeError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for OmeError {
    fn from(src: JsonError) -> OmeError {
        OmeError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<XmlError> for OmeError {
    fn from(src: XmlError) -> OmeError {
        OmeError::Xml(format!("{src}"))
    }
}

impl From<AttrError> for OmeError {
    fn from(src: AttrError) -> OmeError {
        OmeError::Xml(format!("Malformed attribute: {src}"))
    }
}

impl From<io::Error> for OmeError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => OmeError::NotFound(format!("{x}")),
            _ => OmeError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for OmeError {
    fn from(x: fmt::Error) -> Self {
        OmeError::Serialization(format!("{x}"))
    }
}
