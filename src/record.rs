//! Schema-driven records.
//!
//! A [`Record`] is one instance of a registered type over one locus of a document. Every typed
//! view is a thin wrapper around a record, and every accessor of a typed view comes down to one
//! of the calls below: a field read or write by name, a single-valued relation, or a list-valued
//! relation with its count.
//!
//! Single-valued relations are memoised per record. A memo remembers the document generation it
//! was computed at and is discarded as soon as the document has been written to, so repeated
//! calls on an unchanged document return the identical instance and never a stale one.

use parking_lot::RwLock;
use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::{Arc, Weak},
};

use crate::{
    document::Document,
    entity::Entity,
    error::OmeError,
    resolve,
    schema::{RelationDef, RelationKind, TypeDef},
    store::{local_name, Backend, Locus, Store},
    value::{self, Scalar, ScalarKind, Value},
};

#[derive(Debug)]
struct Memo {
    generation: u64,
    target: Option<Weak<RecordState>>,
}

/// Shared state behind every handle to the same record.
#[derive(Debug)]
pub(crate) struct RecordState {
    definition: Arc<TypeDef>,
    locus: Locus,
    memo: RwLock<HashMap<String, Memo>>,
}

impl RecordState {
    pub(crate) fn new(definition: Arc<TypeDef>, locus: Locus) -> Self {
        RecordState {
            definition,
            locus,
            memo: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn definition(&self) -> &Arc<TypeDef> {
        &self.definition
    }
}

#[derive(Clone)]
pub struct Record {
    document: Document,
    state: Arc<RecordState>,
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Record({} @ {})", self.type_name(), self.locus())
    }
}

/// Records are equal when they stand for the same locus of the same document.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.document.same_document(&other.document) && self.locus() == other.locus()
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.document.id().hash(state);
        self.locus().hash(state);
    }
}

impl Record {
    pub(crate) fn from_state(document: Document, state: Arc<RecordState>) -> Self {
        Record { document, state }
    }

    pub fn type_name(&self) -> &str {
        &self.state.definition.name
    }

    pub fn definition(&self) -> &Arc<TypeDef> {
        &self.state.definition
    }

    pub fn locus(&self) -> Locus {
        self.state.locus
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// True when this record's type is `type_name` or one of its subtypes.
    pub fn is_a(&self, type_name: &str) -> bool {
        self.document.types().is_a(self.type_name(), type_name)
    }

    /// Reference equality: both handles share the same cached instance.
    pub fn same_instance(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn cast<T: Entity>(&self) -> Result<T, OmeError> {
        if self.is_a(T::TYPE_NAME) {
            Ok(T::from_record_unchecked(self.clone()))
        } else {
            Err(OmeError::TypeMismatch {
                expected: T::TYPE_NAME.to_string(),
                found: self.type_name().to_string(),
            })
        }
    }

    /// The identifier stored under the type's identifier attribute.
    pub fn id(&self) -> Result<Option<String>, OmeError> {
        let attribute = &self.state.definition.id_attribute;
        let raw = self.document.read(|store| {
            store
                .backend()
                .scalar(self.locus(), attribute, ScalarKind::String)
        })?;
        Ok(raw.and_then(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        }))
    }

    /// Store `id` under the type's identifier attribute, or remove it with `None`.
    pub fn set_id(&self, id: Option<&str>) -> Result<(), OmeError> {
        let attribute = &self.state.definition.id_attribute;
        let value = id.map(|id| Value::String(id.to_string()));
        self.document.write(|store| {
            store
                .backend_mut()
                .set_scalar(self.locus(), attribute, value.as_ref())
        })
    }

    fn relation_def(&self, name: &str) -> Result<RelationDef, OmeError> {
        self.document.types().relation(self.type_name(), name)
    }

    /// Read `field` as its declared kind. Never-set fields are `Ok(None)`.
    pub fn get(&self, field: &str) -> Result<Option<Value>, OmeError> {
        let def = self.document.types().field(self.type_name(), field)?;
        self.document
            .read(|store| store.backend().scalar(self.locus(), &def.name, def.kind))
    }

    pub fn get_as<T: Scalar>(&self, field: &str) -> Result<Option<T>, OmeError> {
        self.get(field)?.map(T::from_value).transpose()
    }

    /// Coerce `value` to the declared kind of `field` and store it in the backend's native form.
    pub fn set<V: Into<Value>>(&self, field: &str, value: V) -> Result<(), OmeError> {
        let def = self.document.types().field(self.type_name(), field)?;
        let value = value::coerce(value.into(), def.kind)?;
        self.document.write(|store| {
            store
                .backend_mut()
                .set_scalar(self.locus(), &def.name, Some(&value))
        })
    }

    pub fn set_as<T: Scalar>(&self, field: &str, value: T) -> Result<(), OmeError> {
        self.set(field, value.into_value())
    }

    pub fn unset(&self, field: &str) -> Result<(), OmeError> {
        let def = self.document.types().field(self.type_name(), field)?;
        self.document
            .write(|store| store.backend_mut().set_scalar(self.locus(), &def.name, None))
    }

    /// The single record reached through `name`, or `None`.
    pub fn relation(&self, name: &str) -> Result<Option<Record>, OmeError> {
        let relation = self.relation_def(name)?;
        if relation.kind.is_list() {
            return Err(OmeError::Unsupported(format!(
                "'{}.{}' is multi-valued",
                self.type_name(),
                relation.name
            )));
        }

        let generation = self.document.generation();
        if let Some(memo) = self.state.memo.read().get(&relation.name) {
            if memo.generation == generation {
                match &memo.target {
                    None => return Ok(None),
                    Some(weak) => {
                        if let Some(state) = weak.upgrade() {
                            return Ok(Some(Record::from_state(self.document.clone(), state)));
                        }
                    }
                }
            }
        }

        let target = match resolve::resolve(self, &relation)? {
            Some(locus) => Some(self.document.record_at(locus, &relation.target)?),
            None => None,
        };
        tracing::trace!(
            "[Record::relation] {:?}.{} -> {:?}",
            self,
            relation.name,
            target
        );
        self.state.memo.write().insert(
            relation.name.clone(),
            Memo {
                generation,
                target: target.as_ref().map(|r| Arc::downgrade(&r.state)),
            },
        );
        Ok(target)
    }

    fn list_relation_def(&self, name: &str) -> Result<RelationDef, OmeError> {
        let relation = self.relation_def(name)?;
        if !relation.kind.is_list() {
            return Err(OmeError::Unsupported(format!(
                "'{}.{}' is single-valued",
                self.type_name(),
                relation.name
            )));
        }
        Ok(relation)
    }

    /// Every record reached through the list relation `name`, in document order.
    pub fn relation_list(&self, name: &str) -> Result<Vec<Record>, OmeError> {
        let relation = self.list_relation_def(name)?;
        resolve::resolve_list(self, &relation)?
            .into_iter()
            .map(|locus| self.document.record_at(locus, &relation.target))
            .collect()
    }

    /// Size of `relation_list(name)` without building any record.
    pub fn count_relation(&self, name: &str) -> Result<usize, OmeError> {
        let relation = self.list_relation_def(name)?;
        resolve::count_list(self, &relation)
    }

    pub fn relation_at(&self, name: &str, index: usize) -> Result<Option<Record>, OmeError> {
        let relation = self.list_relation_def(name)?;
        match resolve::list_item(self, &relation, index)? {
            Some(locus) => Ok(Some(self.document.record_at(locus, &relation.target)?)),
            None => Ok(None),
        }
    }

    /// Create an empty record of the relation's target type and attach it through `name`.
    ///
    /// Element trees support owned relations only; a single-valued owned relation replaces the
    /// element it held. Map stores nest every relation kind, so any relation can be created.
    pub fn create_child(&self, name: &str) -> Result<Record, OmeError> {
        let relation = self.relation_def(name)?;
        let types = self.document.types().clone();
        let locus = self.locus();
        let created = self.document.write(|store| match store {
            Store::Dom(dom) => {
                if !relation.kind.is_owned() {
                    return Err(OmeError::Unsupported(format!(
                        "'{}' is not held by containment in an element tree",
                        relation.name
                    )));
                }
                let Locus::Element(parent) = locus else {
                    return Err(OmeError::InvalidLocus(format!("{locus} in an element tree")));
                };
                if relation.kind == RelationKind::Child {
                    let accepted = types.subtypes(&relation.target);
                    let existing: Vec<_> = dom
                        .children(parent)?
                        .iter()
                        .copied()
                        .filter(|c| {
                            dom.tag(*c)
                                .is_ok_and(|t| accepted.contains(local_name(t)))
                        })
                        .collect();
                    for old in existing {
                        dom.remove_child(parent, old)?;
                    }
                }
                let el = dom.create_element(relation.target.as_str());
                dom.append_child(parent, el)?;
                Ok(Locus::Element(el))
            }
            Store::Map(map) => {
                let Locus::Map(parent) = locus else {
                    return Err(OmeError::InvalidLocus(format!("{locus} in a map store")));
                };
                let child = map.create_map();
                if relation.kind.is_list() {
                    map.push_child(parent, &relation.name, child)?;
                } else {
                    map.set_child(parent, &relation.name, child)?;
                }
                Ok(Locus::Map(child))
            }
        })?;
        tracing::debug!(
            "[Record::create_child] {:?}.{} created {}",
            self,
            relation.name,
            created
        );
        self.document.record_at(created, &relation.target)
    }

    /// Point the ID-reference `name` at `target`, or clear it with `None`.
    ///
    /// Only element trees store references as identifiers; map stores nest the referenced
    /// record instead, see [`Record::create_child`].
    pub fn link(&self, name: &str, target: Option<&Record>) -> Result<(), OmeError> {
        let relation = self.relation_def(name)?;
        let RelationKind::Reference { attribute } = &relation.kind else {
            return Err(OmeError::Unsupported(format!(
                "'{}' is not an ID-reference",
                relation.name
            )));
        };
        let value = match target {
            None => None,
            Some(target) => {
                if !target.document.same_document(&self.document) {
                    return Err(OmeError::InvalidLocus(format!(
                        "{:?} belongs to another document",
                        target
                    )));
                }
                if !target.is_a(&relation.target) {
                    return Err(OmeError::TypeMismatch {
                        expected: relation.target.clone(),
                        found: target.type_name().to_string(),
                    });
                }
                let id = target.id()?.ok_or_else(|| {
                    OmeError::InvalidLocus(format!("{:?} has no identifier to link to", target))
                })?;
                Some(Value::String(id))
            }
        };
        self.document.write(|store| match store {
            Store::Dom(dom) => dom.set_scalar(self.locus(), attribute, value.as_ref()),
            Store::Map(_) => Err(OmeError::Unsupported(
                "map stores nest referenced records instead of linking them".to_string(),
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ResolverConfig, registry::TypeRegistry, store::MapStore, value::ScalarKind,
    };
    use serde_json::json;

    fn registry() -> TypeRegistry {
        let types = TypeRegistry::new();
        types.register(
            TypeDef::new("Filter")
                .field("LotNumber", ScalarKind::String)
                .field("FilterWheel", ScalarKind::Integer)
                .reference("Instrument", "Instrument")
                .referral("DichroicList", "Dichroic", "Filter"),
        );
        types.register(TypeDef::new("Instrument").field("Model", ScalarKind::String));
        types.register(TypeDef::new("Dichroic"));
        types
    }

    fn filter() -> Record {
        let store = MapStore::from_json(&json!({
            "ID": "Filter:0",
            "LotNumber": "L-1",
            "FilterWheel": 3,
            "Instrument": { "ID": "Instrument:0", "Model": "IX" },
            "DichroicList": [],
        }))
        .unwrap();
        Document::from_map(store, "Filter", registry(), ResolverConfig::default())
            .unwrap()
            .root()
            .unwrap()
    }

    #[test]
    fn test_fields_read_as_declared_kind() {
        let filter = filter();
        assert_eq!(filter.get("FilterWheel").unwrap(), Some(Value::Integer(3)));
        assert_eq!(filter.get_as::<String>("LotNumber").unwrap().as_deref(), Some("L-1"));
        assert_eq!(filter.id().unwrap().as_deref(), Some("Filter:0"));
        assert!(matches!(
            filter.get("Bogus"),
            Err(OmeError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_set_coerces_and_unset_clears() {
        let filter = filter();
        filter.set("FilterWheel", "7").unwrap();
        assert_eq!(filter.get_as::<i32>("FilterWheel").unwrap(), Some(7));
        assert!(filter.set("FilterWheel", "seven").is_err());
        filter.unset("LotNumber").unwrap();
        assert_eq!(filter.get("LotNumber").unwrap(), None);
    }

    #[test]
    fn test_relation_memo_survives_until_write() {
        let filter = filter();
        let first = filter.relation("Instrument").unwrap().unwrap();
        let second = filter.relation("Instrument").unwrap().unwrap();
        assert!(first.same_instance(&second));
        assert_eq!(first.get_as::<String>("Model").unwrap().as_deref(), Some("IX"));

        filter.set("LotNumber", "L-2").unwrap();
        let third = filter.relation("Instrument").unwrap().unwrap();
        assert!(third.same_instance(&first));
    }

    #[test]
    fn test_list_and_single_are_not_interchangeable() {
        let filter = filter();
        assert!(matches!(
            filter.relation("DichroicList"),
            Err(OmeError::Unsupported(_))
        ));
        assert!(matches!(
            filter.count_relation("Instrument"),
            Err(OmeError::Unsupported(_))
        ));
        assert_eq!(filter.count_relation("DichroicList").unwrap(), 0);
        assert!(filter.relation_list("DichroicList").unwrap().is_empty());
    }

    #[test]
    fn test_create_child_in_map_store() {
        let filter = filter();
        let dichroic = filter.create_child("DichroicList").unwrap();
        assert_eq!(dichroic.type_name(), "Dichroic");
        assert_eq!(filter.count_relation("DichroicList").unwrap(), 1);
        let listed = filter.relation_at("DichroicList", 0).unwrap().unwrap();
        assert!(listed.same_instance(&dichroic));
        assert_eq!(filter.relation_at("DichroicList", 1).unwrap(), None);
    }

    #[test]
    fn test_link_is_unsupported_in_map_store() {
        let filter = filter();
        let instrument = filter.relation("Instrument").unwrap().unwrap();
        assert!(matches!(
            filter.link("Instrument", Some(&instrument)),
            Err(OmeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_identifier_set_and_numeric_read() {
        let store = MapStore::from_json(&json!({ "ID": 7, "FilterWheel": 2 })).unwrap();
        let filter = Document::from_map(store, "Filter", registry(), ResolverConfig::default())
            .unwrap()
            .root()
            .unwrap();
        assert_eq!(filter.id().unwrap().as_deref(), Some("7"));

        let dichroic = filter.create_child("DichroicList").unwrap();
        assert_eq!(dichroic.id().unwrap(), None);
        dichroic.set_id(Some("Dichroic:1")).unwrap();
        assert_eq!(dichroic.id().unwrap().as_deref(), Some("Dichroic:1"));
        dichroic.set_id(None).unwrap();
        assert_eq!(dichroic.id().unwrap(), None);
    }

    #[test]
    fn test_equality_is_document_and_locus() {
        let a = filter();
        let b = filter();
        assert_eq!(a, a.document().root().unwrap());
        assert_ne!(a, b);
    }
}
