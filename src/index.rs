//! Reverse-edge index over a DOM document.
//!
//! A [`ReferralIndex`] groups every attached element of a source type by the value of one of its
//! attributes. Generated accessors tend to ask for a count and then for the list, over documents
//! holding thousands of cross-referencing elements, so each (source type, attribute) pair is
//! scanned once and the grouping is shared by every later query.
//!
//! The same grouping keyed on a type's identifier attribute answers forward lookups: "which
//! element of type T has ID x" is `list_referrals(T, "ID", x)`.
//!
//! Entries are stamped with the uid of the scanned tree, the set of tags that were accepted and
//! the sum of those tags' generations. Generations only grow, so any attach, detach or attribute
//! write touching an accepted tag changes the sum and forces a rebuild on the next query.

use parking_lot::RwLock;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use uuid::Uuid;

use crate::{
    registry::TypeRegistry,
    store::{local_name, DomStore, ElementId},
};

/// Attribute value -> elements carrying it, in document order.
pub type ReferralMap = HashMap<String, Vec<ElementId>>;

#[derive(Debug)]
struct IndexEntry {
    store: Uuid,
    tags: BTreeSet<String>,
    stamp: u64,
    map: Arc<ReferralMap>,
}

#[derive(Debug, Default)]
pub struct ReferralIndex {
    entries: RwLock<HashMap<(String, String), IndexEntry>>,
    builds: AtomicUsize,
}

fn stamp(dom: &DomStore, tags: &BTreeSet<String>) -> u64 {
    tags.iter().map(|tag| dom.generation(tag)).sum()
}

impl ReferralIndex {
    pub fn new() -> Self {
        ReferralIndex::default()
    }

    /// The grouping of `source_type` elements (subtypes included) by `attribute`.
    pub fn referrals(
        &self,
        dom: &DomStore,
        types: &TypeRegistry,
        source_type: &str,
        attribute: &str,
    ) -> Arc<ReferralMap> {
        let tags = types.subtypes(source_type);
        let current = stamp(dom, &tags);
        let key = (source_type.to_string(), attribute.to_string());

        if let Some(entry) = self.entries.read().get(&key) {
            if entry.store == dom.uid() && entry.stamp == current && entry.tags == tags {
                return entry.map.clone();
            }
        }

        let map = Arc::new(ReferralIndex::scan(dom, &tags, attribute));
        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "[ReferralIndex::referrals] Built index for {}.{}: {} distinct values",
            source_type,
            attribute,
            map.len()
        );
        self.entries.write().insert(
            key,
            IndexEntry {
                store: dom.uid(),
                tags,
                stamp: current,
                map: map.clone(),
            },
        );
        map
    }

    fn scan(dom: &DomStore, tags: &BTreeSet<String>, attribute: &str) -> ReferralMap {
        let mut map = ReferralMap::new();
        for el in dom.iter() {
            let Ok(tag) = dom.tag(el) else {
                continue;
            };
            if !tags.contains(local_name(tag)) {
                continue;
            }
            if let Ok(Some(value)) = dom.attribute(el, attribute) {
                map.entry(value.to_string()).or_default().push(el);
            }
        }
        map
    }

    /// Elements of `source_type` whose `attribute` equals `value`, in document order.
    pub fn list_referrals(
        &self,
        dom: &DomStore,
        types: &TypeRegistry,
        source_type: &str,
        attribute: &str,
        value: &str,
    ) -> Vec<ElementId> {
        self.referrals(dom, types, source_type, attribute)
            .get(value)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count_referrals(
        &self,
        dom: &DomStore,
        types: &TypeRegistry,
        source_type: &str,
        attribute: &str,
        value: &str,
    ) -> usize {
        self.referrals(dom, types, source_type, attribute)
            .get(value)
            .map_or(0, Vec::len)
    }

    /// Number of scans performed so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::TypeDef, value::ScalarKind};

    fn registry() -> TypeRegistry {
        let types = TypeRegistry::new();
        types.register(TypeDef::new("Group"));
        types.register(TypeDef::new("Experimenter").reference("Group", "Group"));
        types.register(TypeDef::new("LightSource").field("Power", ScalarKind::Float));
        types.register(TypeDef::new("Laser").extends("LightSource"));
        types
    }

    fn people() -> (DomStore, Vec<ElementId>) {
        let mut dom = DomStore::new("OME");
        let mut people = Vec::new();
        for (id, group) in [("E1", "G1"), ("E2", "G1"), ("E3", "G2")] {
            let el = dom.create_element("Experimenter");
            dom.set_attribute(el, "ID", id).unwrap();
            dom.set_attribute(el, "Group", group).unwrap();
            dom.append_child(dom.root(), el).unwrap();
            people.push(el);
        }
        (dom, people)
    }

    #[test]
    fn test_groups_by_attribute_in_document_order() {
        let (dom, people) = people();
        let index = ReferralIndex::new();
        let types = registry();
        assert_eq!(
            index.list_referrals(&dom, &types, "Experimenter", "Group", "G1"),
            vec![people[0], people[1]]
        );
        assert_eq!(index.count_referrals(&dom, &types, "Experimenter", "Group", "G2"), 1);
        assert_eq!(index.count_referrals(&dom, &types, "Experimenter", "Group", "G3"), 0);
        assert_eq!(index.builds(), 1);
    }

    #[test]
    fn test_mutation_invalidates() {
        let (mut dom, people) = people();
        let index = ReferralIndex::new();
        let types = registry();
        assert_eq!(index.count_referrals(&dom, &types, "Experimenter", "Group", "G1"), 2);

        dom.set_attribute(people[2], "Group", "G1").unwrap();
        assert_eq!(index.count_referrals(&dom, &types, "Experimenter", "Group", "G1"), 3);
        assert_eq!(index.builds(), 2);

        dom.remove_child(dom.root(), people[0]).unwrap();
        assert_eq!(index.count_referrals(&dom, &types, "Experimenter", "Group", "G1"), 2);
        assert_eq!(index.builds(), 3);
    }

    #[test]
    fn test_unrelated_mutation_keeps_index() {
        let (mut dom, _) = people();
        let index = ReferralIndex::new();
        let types = registry();
        index.count_referrals(&dom, &types, "Experimenter", "Group", "G1");
        let group = dom.create_element("Group");
        dom.set_attribute(group, "ID", "G1").unwrap();
        dom.append_child(dom.root(), group).unwrap();
        index.count_referrals(&dom, &types, "Experimenter", "Group", "G1");
        assert_eq!(index.builds(), 1);
    }

    #[test]
    fn test_subtypes_are_scanned() {
        let mut dom = DomStore::new("Instrument");
        let laser = dom.create_element("OME:Laser");
        dom.set_attribute(laser, "ID", "LS:1").unwrap();
        dom.append_child(dom.root(), laser).unwrap();
        let index = ReferralIndex::new();
        assert_eq!(
            index.list_referrals(&dom, &registry(), "LightSource", "ID", "LS:1"),
            vec![laser]
        );
    }

    #[test]
    fn test_detached_elements_are_invisible() {
        let mut dom = DomStore::new("OME");
        let loose = dom.create_element("Experimenter");
        dom.set_attribute(loose, "Group", "G1").unwrap();
        let index = ReferralIndex::new();
        assert_eq!(index.count_referrals(&dom, &registry(), "Experimenter", "Group", "G1"), 0);
    }
}
