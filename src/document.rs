//! The document context.
//!
//! A [`Document`] owns exactly one backend together with everything resolution needs: the type
//! registry handle, the resolver policies, the identity cache of records and the referral index.
//! Records carry a clone of their document, so the context is passed explicitly instead of being
//! looked up through global state.
//!
//! Identity: one record instance exists per locus. [`Document::intern`] hands back the cached
//! instance when a locus is wrapped again, which is what lets relation memos and cyclic
//! reference graphs terminate.

use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use uuid::Uuid;

use crate::{
    config::ResolverConfig,
    error::OmeError,
    index::ReferralIndex,
    record::{Record, RecordState},
    registry::TypeRegistry,
    schema::TypeDef,
    store::{local_name, BackendKind, DomStore, ElementId, Locus, MapStore, Store},
};

struct DocumentInner {
    id: Uuid,
    store: RwLock<Store>,
    types: TypeRegistry,
    config: ResolverConfig,
    root_type: String,
    records: RwLock<HashMap<Locus, Arc<RecordState>>>,
    referrals: ReferralIndex,
    generation: AtomicU64,
}

/// Shared handle to one in-memory document. Clones refer to the same document.
#[derive(Clone)]
pub struct Document(Arc<DocumentInner>);

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Document({}, {:?}, root: {})",
            self.0.id,
            self.backend_kind(),
            self.0.root_type
        )
    }
}

impl Document {
    fn new(store: Store, root_type: String, types: TypeRegistry, config: ResolverConfig) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(
            "[Document::new] Document {} over {:?} backend, root type {}",
            id,
            store.kind(),
            root_type
        );
        Document(Arc::new(DocumentInner {
            id,
            store: RwLock::new(store),
            types,
            config,
            root_type,
            records: RwLock::new(HashMap::new()),
            referrals: ReferralIndex::new(),
            generation: AtomicU64::new(0),
        }))
    }

    /// Wrap a nested-map store whose root map is a record of `root_type`.
    pub fn from_map(
        store: MapStore,
        root_type: &str,
        types: TypeRegistry,
        config: ResolverConfig,
    ) -> Result<Self, OmeError> {
        types.get(root_type)?;
        Ok(Document::new(
            store.into(),
            root_type.to_string(),
            types,
            config,
        ))
    }

    /// Wrap an element tree. The root record's type is the root element's local tag name.
    pub fn from_dom(store: DomStore, types: TypeRegistry, config: ResolverConfig) -> Self {
        let root_type = store
            .tag(store.root())
            .map(|tag| local_name(tag).to_string())
            .unwrap_or_default();
        Document::new(store.into(), root_type, types, config)
    }

    pub fn from_xml_str(
        text: &str,
        types: TypeRegistry,
        config: ResolverConfig,
    ) -> Result<Self, OmeError> {
        Ok(Document::from_dom(DomStore::parse_str(text)?, types, config))
    }

    pub fn from_json_str(
        text: &str,
        root_type: &str,
        types: TypeRegistry,
        config: ResolverConfig,
    ) -> Result<Self, OmeError> {
        Document::from_map(MapStore::from_json_str(text)?, root_type, types, config)
    }

    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.0.types
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.0.config
    }

    pub fn referrals(&self) -> &ReferralIndex {
        &self.0.referrals
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.0.store.read().kind()
    }

    pub fn root_type(&self) -> &str {
        &self.0.root_type
    }

    /// True when both handles refer to the same document.
    pub fn same_document(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Mutation counter. Every write through this document moves it forward.
    pub fn generation(&self) -> u64 {
        self.0.generation.load(Ordering::Acquire)
    }

    /// Number of records currently held by the identity cache.
    pub fn cached_records(&self) -> usize {
        self.0.records.read().len()
    }

    pub fn root(&self) -> Result<Record, OmeError> {
        let locus = match &*self.0.store.read() {
            Store::Map(map) => Locus::Map(map.root()),
            Store::Dom(dom) => Locus::Element(dom.root()),
        };
        self.0.types.construct(&self.0.root_type, locus, self)
    }

    /// The record over `locus`.
    ///
    /// Elements are typed by their local tag name. Maps carry no type information of their own,
    /// so they take `declared`, the type the caller reached them through.
    pub fn record_at(&self, locus: Locus, declared: &str) -> Result<Record, OmeError> {
        match locus {
            Locus::Element(el) => self.record_for_element(el),
            Locus::Map(_) => {
                if !self.0.store.read().backend().contains(locus) {
                    return Err(OmeError::InvalidLocus(format!(
                        "{locus} is not part of this document"
                    )));
                }
                self.0.types.construct(declared, locus, self)
            }
        }
    }

    pub fn record_for_element(&self, el: ElementId) -> Result<Record, OmeError> {
        let type_name = {
            let store = self.0.store.read();
            let dom = store.as_dom().ok_or_else(|| {
                OmeError::InvalidLocus(format!("element#{} in a map document", el.index()))
            })?;
            local_name(dom.tag(el)?).to_string()
        };
        self.0.types.construct(&type_name, Locus::Element(el), self)
    }

    /// Every attached element whose type is-a `type_name`, in document order.
    pub fn elements_of(&self, type_name: &str) -> Result<Vec<Record>, OmeError> {
        let accepted = self.0.types.subtypes(type_name);
        if accepted.is_empty() {
            return Err(OmeError::UnknownType(type_name.to_string()));
        }
        let found: Vec<ElementId> = self.with_dom(|dom| {
            dom.iter()
                .filter(|el| {
                    dom.tag(*el)
                        .is_ok_and(|tag| accepted.contains(local_name(tag)))
                })
                .collect()
        })?;
        found
            .into_iter()
            .map(|el| self.record_for_element(el))
            .collect()
    }

    /// Return the cached record for `locus`, creating it on first access.
    ///
    /// An existing entry is kept unless `definition` is a proper subtype of the cached type, in
    /// which case the entry is refined to the more specific type.
    pub(crate) fn intern(&self, locus: Locus, definition: Arc<TypeDef>) -> Record {
        if let Some(state) = self.0.records.read().get(&locus) {
            if !self.refines(state, &definition) {
                return Record::from_state(self.clone(), state.clone());
            }
        }

        let mut records = self.0.records.write();
        if let Some(state) = records.get(&locus) {
            if !self.refines(state, &definition) {
                return Record::from_state(self.clone(), state.clone());
            }
            tracing::debug!(
                "[Document::intern] Refining {} from {} to {}",
                locus,
                state.definition().name,
                definition.name
            );
        }
        let state = Arc::new(RecordState::new(definition, locus));
        records.insert(locus, state.clone());
        Record::from_state(self.clone(), state)
    }

    fn refines(&self, cached: &RecordState, requested: &TypeDef) -> bool {
        cached.definition().name != requested.name
            && self
                .0
                .types
                .is_a(&requested.name, &cached.definition().name)
    }

    /// Run `f` against the store under a shared lock.
    pub fn read<R, F: FnOnce(&Store) -> R>(&self, f: F) -> R {
        f(&self.0.store.read())
    }

    /// Run `f` against the store under an exclusive lock and advance the generation.
    pub fn write<R, F: FnOnce(&mut Store) -> R>(&self, f: F) -> R {
        let result = f(&mut self.0.store.write());
        self.0.generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    pub fn with_dom<R, F: FnOnce(&DomStore) -> R>(&self, f: F) -> Result<R, OmeError> {
        self.read(|store| match store.as_dom() {
            Some(dom) => Ok(f(dom)),
            None => Err(OmeError::Unsupported(
                "document is not backed by an element tree".to_string(),
            )),
        })
    }

    pub fn with_dom_mut<R, F: FnOnce(&mut DomStore) -> R>(&self, f: F) -> Result<R, OmeError> {
        self.write(|store| match store.as_dom_mut() {
            Some(dom) => Ok(f(dom)),
            None => Err(OmeError::Unsupported(
                "document is not backed by an element tree".to_string(),
            )),
        })
    }

    pub fn with_map<R, F: FnOnce(&MapStore) -> R>(&self, f: F) -> Result<R, OmeError> {
        self.read(|store| match store.as_map() {
            Some(map) => Ok(f(map)),
            None => Err(OmeError::Unsupported(
                "document is not backed by nested maps".to_string(),
            )),
        })
    }

    pub fn with_map_mut<R, F: FnOnce(&mut MapStore) -> R>(&self, f: F) -> Result<R, OmeError> {
        self.write(|store| match store.as_map_mut() {
            Some(map) => Ok(f(map)),
            None => Err(OmeError::Unsupported(
                "document is not backed by nested maps".to_string(),
            )),
        })
    }
}
