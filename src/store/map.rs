//! Nested-map backend.
//!
//! Every map lives in an arena and is addressed by a [`MapId`], which gives records a stable
//! locus identity. An entry holds a boxed scalar, one nested map, or an ordered list of nested
//! maps. The layout is already denormalised: whatever relation a record declares, the related
//! records are physically nested under the relation's name.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::collections::BTreeMap;

use super::{Backend, BackendKind, Locus};
use crate::{
    error::OmeError,
    registry::TypeRegistry,
    schema::RelationDef,
    value::{self, ScalarKind, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(usize);

impl MapId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapEntry {
    Scalar(Value),
    Map(MapId),
    List(Vec<MapId>),
}

#[derive(Debug, Clone, Default)]
struct MapNode {
    entries: BTreeMap<String, MapEntry>,
    parent: Option<MapId>,
}

#[derive(Debug, Clone)]
pub struct MapStore {
    maps: Vec<MapNode>,
    root: MapId,
}

impl Default for MapStore {
    fn default() -> Self {
        MapStore::new()
    }
}

impl MapStore {
    /// A store holding one empty root map.
    pub fn new() -> Self {
        MapStore {
            maps: vec![MapNode::default()],
            root: MapId(0),
        }
    }

    pub fn root(&self) -> MapId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Allocate a detached map, to be placed with [`Self::set_child`] or [`Self::push_child`].
    pub fn create_map(&mut self) -> MapId {
        self.maps.push(MapNode::default());
        MapId(self.maps.len() - 1)
    }

    fn node(&self, map: MapId) -> Result<&MapNode, OmeError> {
        self.maps
            .get(map.0)
            .ok_or_else(|| OmeError::InvalidLocus(format!("map#{} does not exist", map.0)))
    }

    fn node_mut(&mut self, map: MapId) -> Result<&mut MapNode, OmeError> {
        self.maps
            .get_mut(map.0)
            .ok_or_else(|| OmeError::InvalidLocus(format!("map#{} does not exist", map.0)))
    }

    pub fn parent(&self, map: MapId) -> Result<Option<MapId>, OmeError> {
        Ok(self.node(map)?.parent)
    }

    pub fn keys(&self, map: MapId) -> Result<Vec<&str>, OmeError> {
        Ok(self.node(map)?.entries.keys().map(String::as_str).collect())
    }

    pub fn entry(&self, map: MapId, key: &str) -> Result<Option<&MapEntry>, OmeError> {
        Ok(self.node(map)?.entries.get(key))
    }

    pub fn set_scalar<V: Into<Value>>(
        &mut self,
        map: MapId,
        key: &str,
        value: V,
    ) -> Result<(), OmeError> {
        let previous = self
            .node_mut(map)?
            .entries
            .insert(key.to_string(), MapEntry::Scalar(value.into()));
        self.orphan(previous);
        Ok(())
    }

    pub fn remove(&mut self, map: MapId, key: &str) -> Result<Option<MapEntry>, OmeError> {
        let previous = self.node_mut(map)?.entries.remove(key);
        self.orphan(previous.clone());
        Ok(previous)
    }

    fn orphan(&mut self, entry: Option<MapEntry>) {
        let released = match entry {
            Some(MapEntry::Map(child)) => vec![child],
            Some(MapEntry::List(children)) => children,
            _ => Vec::new(),
        };
        for child in released {
            if let Some(node) = self.maps.get_mut(child.0) {
                node.parent = None;
            }
        }
    }

    fn adopt(&mut self, map: MapId, child: MapId) -> Result<(), OmeError> {
        if child == self.root {
            return Err(OmeError::InvalidLocus(
                "the root map cannot be nested".to_string(),
            ));
        }
        let mut ancestor = Some(map);
        while let Some(current) = ancestor {
            if current == child {
                return Err(OmeError::InvalidLocus(format!(
                    "map#{} cannot be nested inside itself",
                    child.0
                )));
            }
            ancestor = self.node(current)?.parent;
        }
        let node = self.node_mut(child)?;
        if node.parent.is_some() {
            return Err(OmeError::InvalidLocus(format!(
                "map#{} is already nested",
                child.0
            )));
        }
        node.parent = Some(map);
        Ok(())
    }

    /// Nest `child` under `key`, replacing whatever was there.
    pub fn set_child(&mut self, map: MapId, key: &str, child: MapId) -> Result<(), OmeError> {
        self.adopt(map, child)?;
        let previous = self
            .node_mut(map)?
            .entries
            .insert(key.to_string(), MapEntry::Map(child));
        self.orphan(previous);
        Ok(())
    }

    /// Append `child` to the list under `key`. A single nested map already under `key` becomes
    /// the first list element.
    pub fn push_child(&mut self, map: MapId, key: &str, child: MapId) -> Result<(), OmeError> {
        if let Some(MapEntry::Scalar(v)) = self.entry(map, key)? {
            return Err(OmeError::coercion(
                ScalarKind::String,
                value::format(v),
                format!("'{key}' holds a scalar, not a list of records"),
            ));
        }
        self.adopt(map, child)?;
        let entries = &mut self.node_mut(map)?.entries;
        let list = match entries.remove(key) {
            Some(MapEntry::List(mut list)) => {
                list.push(child);
                list
            }
            Some(MapEntry::Map(single)) => vec![single, child],
            _ => vec![child],
        };
        entries.insert(key.to_string(), MapEntry::List(list));
        Ok(())
    }

    /// The nested record under `key`.
    ///
    /// A one-element list is read as that element; a longer list is ambiguous.
    pub fn child_map(&self, map: MapId, key: &str) -> Result<Option<MapId>, OmeError> {
        match self.entry(map, key)? {
            None => Ok(None),
            Some(MapEntry::Map(child)) => Ok(Some(*child)),
            Some(MapEntry::List(list)) => match list.as_slice() {
                [] => Ok(None),
                [only] => Ok(Some(*only)),
                _ => Err(OmeError::AmbiguousReference {
                    relation: key.to_string(),
                    id: format!("map#{}", map.0),
                    count: list.len(),
                }),
            },
            Some(MapEntry::Scalar(v)) => Err(OmeError::coercion(
                ScalarKind::String,
                value::format(v),
                format!("'{key}' holds a scalar, not a nested record"),
            )),
        }
    }

    /// The nested records under `key`. A single nested map is read as a one-element list.
    pub fn child_list(&self, map: MapId, key: &str) -> Result<Option<&[MapId]>, OmeError> {
        match self.entry(map, key)? {
            None => Ok(None),
            Some(MapEntry::List(list)) => Ok(Some(list.as_slice())),
            Some(MapEntry::Map(child)) => Ok(Some(std::slice::from_ref(child))),
            Some(MapEntry::Scalar(v)) => Err(OmeError::coercion(
                ScalarKind::String,
                value::format(v),
                format!("'{key}' holds a scalar, not a list of records"),
            )),
        }
    }

    /// Build a store from a JSON object.
    ///
    /// Objects become maps, arrays of objects become lists, `null` entries are dropped and every
    /// other JSON value becomes a boxed scalar.
    pub fn from_json(json: &JsonValue) -> Result<Self, OmeError> {
        let JsonValue::Object(object) = json else {
            return Err(OmeError::Serialization(
                "a map document must be a JSON object".to_string(),
            ));
        };
        let mut store = MapStore::new();
        let root = store.root;
        store.fill_from_json(root, object)?;
        Ok(store)
    }

    pub fn from_json_str(text: &str) -> Result<Self, OmeError> {
        let json: JsonValue = serde_json::from_str(text)?;
        MapStore::from_json(&json)
    }

    fn fill_from_json(
        &mut self,
        map: MapId,
        object: &JsonMap<String, JsonValue>,
    ) -> Result<(), OmeError> {
        for (key, item) in object {
            match item {
                JsonValue::Null => {}
                JsonValue::Object(nested) => {
                    let child = self.create_map();
                    self.fill_from_json(child, nested)?;
                    self.set_child(map, key, child)?;
                }
                JsonValue::Array(items) => {
                    let mut list = Vec::with_capacity(items.len());
                    for element in items {
                        let JsonValue::Object(nested) = element else {
                            return Err(OmeError::Serialization(format!(
                                "'{key}' must be an array of objects, found {element}"
                            )));
                        };
                        let child = self.create_map();
                        self.fill_from_json(child, nested)?;
                        self.adopt(map, child)?;
                        list.push(child);
                    }
                    self.node_mut(map)?
                        .entries
                        .insert(key.clone(), MapEntry::List(list));
                }
                JsonValue::Bool(b) => self.set_scalar(map, key, *b)?,
                JsonValue::String(s) => self.set_scalar(map, key, s.as_str())?,
                JsonValue::Number(n) => self.set_scalar(map, key, json_number(n))?,
            }
        }
        Ok(())
    }

    /// Render `map` and everything nested under it as JSON.
    pub fn to_json(&self, map: MapId) -> Result<JsonValue, OmeError> {
        let mut object = JsonMap::new();
        for (key, entry) in &self.node(map)?.entries {
            let item = match entry {
                MapEntry::Scalar(v) => scalar_json(v),
                MapEntry::Map(child) => self.to_json(*child)?,
                MapEntry::List(list) => JsonValue::Array(
                    list.iter()
                        .map(|child| self.to_json(*child))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
            object.insert(key.clone(), item);
        }
        Ok(JsonValue::Object(object))
    }

    fn map_locus(locus: Locus) -> Result<MapId, OmeError> {
        match locus {
            Locus::Map(id) => Ok(id),
            Locus::Element(_) => Err(OmeError::InvalidLocus(format!(
                "{locus} is not a map locus"
            ))),
        }
    }
}

fn json_number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Long(i)
    } else {
        Value::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn scalar_json(v: &Value) -> JsonValue {
    match v {
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::from(*i),
        Value::Long(i) => JsonValue::from(*i),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Float(f) => float_json(f64::from(*f), v),
        Value::Double(d) => float_json(*d, v),
    }
}

// JSON has no spelling for NaN or the infinities, so those keep their textual form.
fn float_json(f: f64, original: &Value) -> JsonValue {
    Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(value::format(original)))
}

impl Backend for MapStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Map
    }

    fn contains(&self, locus: Locus) -> bool {
        matches!(locus, Locus::Map(id) if id.0 < self.maps.len())
    }

    fn scalar(
        &self,
        locus: Locus,
        name: &str,
        kind: ScalarKind,
    ) -> Result<Option<Value>, OmeError> {
        match self.entry(MapStore::map_locus(locus)?, name)? {
            None => Ok(None),
            Some(MapEntry::Scalar(v)) => value::coerce(v.clone(), kind).map(Some),
            Some(MapEntry::Map(_)) => Err(OmeError::coercion(
                kind,
                "<map>",
                format!("entry '{name}' holds a nested record, not a scalar"),
            )),
            Some(MapEntry::List(items)) => Err(OmeError::coercion(
                kind,
                format!("<list of {}>", items.len()),
                format!("entry '{name}' holds nested records, not a scalar"),
            )),
        }
    }

    fn set_scalar(
        &mut self,
        locus: Locus,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), OmeError> {
        let map = MapStore::map_locus(locus)?;
        match value {
            Some(v) => self.set_scalar(map, name, v.clone()),
            None => self.remove(map, name).map(|_| ()),
        }
    }

    fn child(
        &self,
        locus: Locus,
        relation: &RelationDef,
        _types: &TypeRegistry,
    ) -> Result<Option<Locus>, OmeError> {
        Ok(self
            .child_map(MapStore::map_locus(locus)?, &relation.name)?
            .map(Locus::Map))
    }

    fn children(
        &self,
        locus: Locus,
        relation: &RelationDef,
        _types: &TypeRegistry,
    ) -> Result<Vec<Locus>, OmeError> {
        Ok(self
            .child_list(MapStore::map_locus(locus)?, &relation.name)?
            .map(|list| list.iter().copied().map(Locus::Map).collect())
            .unwrap_or_default())
    }

    fn count_children(
        &self,
        locus: Locus,
        relation: &RelationDef,
        _types: &TypeRegistry,
    ) -> Result<usize, OmeError> {
        Ok(self
            .child_list(MapStore::map_locus(locus)?, &relation.name)?
            .map_or(0, <[MapId]>::len))
    }

    fn child_at(
        &self,
        locus: Locus,
        relation: &RelationDef,
        _types: &TypeRegistry,
        index: usize,
    ) -> Result<Option<Locus>, OmeError> {
        Ok(self
            .child_list(MapStore::map_locus(locus)?, &relation.name)?
            .and_then(|list| list.get(index).copied())
            .map(Locus::Map))
    }
}
