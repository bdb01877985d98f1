//! Physical storage backends.
//!
//! A [`Record`](crate::record::Record) never touches storage directly. It names a [`Locus`] and
//! goes through the [`Backend`] trait, which both [`MapStore`] (nested maps, the "DTO" form) and
//! [`DomStore`] (an XML element tree, the "Node" form) implement. [`Store`] is the closed set of
//! backends a [`Document`](crate::document::Document) can own.

mod dom;
mod map;
mod xml;

pub use dom::{local_name, Descendants, DomStore, ElementId};
pub use map::{MapEntry, MapId, MapStore};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    error::OmeError,
    registry::TypeRegistry,
    schema::RelationDef,
    value::{ScalarKind, Value},
};

/// The physical storage unit backing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Locus {
    Map(MapId),
    Element(ElementId),
}

impl Display for Locus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Locus::Map(id) => write!(f, "map#{}", id.index()),
            Locus::Element(id) => write!(f, "element#{}", id.index()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    Map,
    Dom,
}

/// Operations every backend offers on a locus.
///
/// Relation lookups here only cover physical containment. Identifier based references and
/// referrals are resolved above this layer because they need the whole document.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    fn contains(&self, locus: Locus) -> bool;

    /// Read `name` on `locus` as `kind`. Never-set values are `Ok(None)`.
    fn scalar(&self, locus: Locus, name: &str, kind: ScalarKind)
        -> Result<Option<Value>, OmeError>;

    /// Write `value` into `name` on `locus` in the backend's native form; `None` clears it.
    fn set_scalar(
        &mut self,
        locus: Locus,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), OmeError>;

    /// The single contained record for `relation`, if any.
    fn child(
        &self,
        locus: Locus,
        relation: &RelationDef,
        types: &TypeRegistry,
    ) -> Result<Option<Locus>, OmeError>;

    /// Contained records for `relation` in document order.
    fn children(
        &self,
        locus: Locus,
        relation: &RelationDef,
        types: &TypeRegistry,
    ) -> Result<Vec<Locus>, OmeError>;

    /// Same as `children(..).len()` without collecting.
    fn count_children(
        &self,
        locus: Locus,
        relation: &RelationDef,
        types: &TypeRegistry,
    ) -> Result<usize, OmeError>;

    fn child_at(
        &self,
        locus: Locus,
        relation: &RelationDef,
        types: &TypeRegistry,
        index: usize,
    ) -> Result<Option<Locus>, OmeError>;
}

/// The backend owned by a document.
#[derive(Debug, Clone)]
pub enum Store {
    Map(MapStore),
    Dom(DomStore),
}

impl Store {
    pub fn backend(&self) -> &dyn Backend {
        match self {
            Store::Map(store) => store,
            Store::Dom(store) => store,
        }
    }

    pub fn backend_mut(&mut self) -> &mut dyn Backend {
        match self {
            Store::Map(store) => store,
            Store::Dom(store) => store,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.backend().kind()
    }

    pub fn as_dom(&self) -> Option<&DomStore> {
        match self {
            Store::Dom(store) => Some(store),
            Store::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapStore> {
        match self {
            Store::Map(store) => Some(store),
            Store::Dom(_) => None,
        }
    }

    pub fn as_dom_mut(&mut self) -> Option<&mut DomStore> {
        match self {
            Store::Dom(store) => Some(store),
            Store::Map(_) => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapStore> {
        match self {
            Store::Map(store) => Some(store),
            Store::Dom(_) => None,
        }
    }
}

impl From<MapStore> for Store {
    fn from(store: MapStore) -> Self {
        Store::Map(store)
    }
}

impl From<DomStore> for Store {
    fn from(store: DomStore) -> Self {
        Store::Dom(store)
    }
}
