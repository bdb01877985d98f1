//! Declarative type definitions.
//!
//! A [`TypeDef`] is the load-time description of one entity type: its scalar fields, its
//! relations and its place in the type hierarchy. Type definitions are built in code with the
//! builder methods below or deserialized from a TOML schema file:
//!
//! ```toml
//! [[types]]
//! name = "Laser"
//! extends = "LightSource"
//! fields = [
//!     { name = "Wavelength", kind = "integer" },
//!     { name = "FrequencyDoubled", kind = "boolean" },
//! ]
//! relations = [
//!     { name = "Pump", target = "LightSource", kind = { type = "reference", attribute = "Pump" } },
//!     { name = "LaserListByPump", target = "Laser", kind = { type = "referral", attribute = "Pump" } },
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::value::ScalarKind;

/// Attribute holding an element's identifier unless a type says otherwise.
pub const DEFAULT_ID_ATTRIBUTE: &str = "ID";

fn default_id_attribute() -> String {
    DEFAULT_ID_ATTRIBUTE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: ScalarKind,
}

/// How a relation is physically realised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelationKind {
    /// Single related record held by containment.
    Child,
    /// Ordered related records held by containment.
    Children,
    /// Single related record named by an identifier stored in `attribute`.
    Reference { attribute: String },
    /// Every record of the relation's target type whose `attribute` holds this record's
    /// identifier.
    Referral { attribute: String },
}

impl RelationKind {
    pub fn is_list(&self) -> bool {
        matches!(self, RelationKind::Children | RelationKind::Referral { .. })
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, RelationKind::Child | RelationKind::Children)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub target: String,
    pub kind: RelationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl TypeDef {
    pub fn new<S: Into<String>>(name: S) -> Self {
        TypeDef {
            name: name.into(),
            extends: None,
            id_attribute: default_id_attribute(),
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    #[must_use]
    pub fn extends<S: Into<String>>(mut self, parent: S) -> Self {
        self.extends = Some(parent.into());
        self
    }

    #[must_use]
    pub fn id_attribute<S: Into<String>>(mut self, attribute: S) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    #[must_use]
    pub fn field<S: Into<String>>(mut self, name: S, kind: ScalarKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
        });
        self
    }

    #[must_use]
    pub fn child<S: Into<String>, T: Into<String>>(self, name: S, target: T) -> Self {
        self.relation(name, target, RelationKind::Child)
    }

    #[must_use]
    pub fn children<S: Into<String>, T: Into<String>>(self, name: S, target: T) -> Self {
        self.relation(name, target, RelationKind::Children)
    }

    /// An ID-reference whose attribute carries the relation's name, the usual OME layout.
    #[must_use]
    pub fn reference<S: Into<String>, T: Into<String>>(self, name: S, target: T) -> Self {
        let name = name.into();
        let attribute = name.clone();
        self.relation(name, target, RelationKind::Reference { attribute })
    }

    #[must_use]
    pub fn referral<S: Into<String>, T: Into<String>, A: Into<String>>(
        self,
        name: S,
        source_type: T,
        attribute: A,
    ) -> Self {
        self.relation(
            name,
            source_type,
            RelationKind::Referral {
                attribute: attribute.into(),
            },
        )
    }

    #[must_use]
    pub fn relation<S: Into<String>, T: Into<String>>(
        mut self,
        name: S,
        target: T,
        kind: RelationKind,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.into(),
            target: target.into(),
            kind,
        });
        self
    }

    /// Fields and relations declared directly on this type (not inherited).
    pub fn own_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn own_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// On-disk form of a schema: a flat list of types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub types: Vec<TypeDef>,
}
