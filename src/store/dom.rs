//! XML element tree backend.
//!
//! Elements live in an arena addressed by [`ElementId`]; ids stay valid for the life of the
//! store, including after an element is detached. Only elements reachable from the root take
//! part in lookups.
//!
//! Every structural or attribute change bumps a per-tag generation counter. Indices built over
//! the tree (see [`crate::index::ReferralIndex`]) remember the generations of the tags they
//! scanned and rebuild once any of them moves.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::{Backend, BackendKind, Locus};
use crate::{
    error::OmeError,
    registry::TypeRegistry,
    schema::RelationDef,
    value::{self, ScalarKind, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(usize);

impl ElementId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Strip a namespace prefix: `OME:Laser` -> `Laser`.
pub fn local_name(tag: &str) -> &str {
    tag.rsplit_once(':').map_or(tag, |(_, local)| local)
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<ElementId>,
    parent: Option<ElementId>,
    text: Option<String>,
}

impl ElementData {
    fn new(tag: String) -> Self {
        ElementData {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
            text: None,
        }
    }
}

#[derive(Debug)]
pub struct DomStore {
    uid: Uuid,
    elements: Vec<ElementData>,
    root: ElementId,
    generations: HashMap<String, u64>,
}

impl Clone for DomStore {
    /// A clone is a distinct document, so it gets its own uid.
    fn clone(&self) -> Self {
        DomStore {
            uid: Uuid::new_v4(),
            elements: self.elements.clone(),
            root: self.root,
            generations: self.generations.clone(),
        }
    }
}

impl DomStore {
    pub fn new<S: Into<String>>(root_tag: S) -> Self {
        DomStore {
            uid: Uuid::new_v4(),
            elements: vec![ElementData::new(root_tag.into())],
            root: ElementId(0),
            generations: HashMap::new(),
        }
    }

    /// Identity of this tree. Two stores never share a uid, even when one is a clone.
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Number of elements ever created, attached or not.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn node(&self, el: ElementId) -> Result<&ElementData, OmeError> {
        self.elements
            .get(el.0)
            .ok_or_else(|| OmeError::InvalidLocus(format!("element#{} does not exist", el.0)))
    }

    fn node_mut(&mut self, el: ElementId) -> Result<&mut ElementData, OmeError> {
        self.elements
            .get_mut(el.0)
            .ok_or_else(|| OmeError::InvalidLocus(format!("element#{} does not exist", el.0)))
    }

    /// Generation counter for elements whose local tag name is `tag`.
    pub fn generation(&self, tag: &str) -> u64 {
        self.generations.get(tag).copied().unwrap_or(0)
    }

    fn bump(&mut self, tag: &str) {
        *self
            .generations
            .entry(local_name(tag).to_string())
            .or_insert(0) += 1;
    }

    fn bump_subtree(&mut self, top: ElementId) {
        let tags: BTreeSet<String> = self
            .descendants(top)
            .filter_map(|el| self.tag(el).ok().map(|t| local_name(t).to_string()))
            .collect();
        for tag in tags {
            self.bump(&tag);
        }
    }

    /// Create a detached element. It becomes visible once appended under an attached parent.
    pub fn create_element<S: Into<String>>(&mut self, tag: S) -> ElementId {
        self.elements.push(ElementData::new(tag.into()));
        ElementId(self.elements.len() - 1)
    }

    pub fn append_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), OmeError> {
        self.node(parent)?;
        if child == self.root {
            return Err(OmeError::InvalidLocus(
                "the root element cannot be appended".to_string(),
            ));
        }
        if self.node(child)?.parent.is_some() {
            return Err(OmeError::InvalidLocus(format!(
                "element#{} already has a parent",
                child.0
            )));
        }
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(OmeError::InvalidLocus(format!(
                    "element#{} cannot be appended inside itself",
                    child.0
                )));
            }
            ancestor = self.node(current)?.parent;
        }
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        self.bump_subtree(child);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), OmeError> {
        if self.node(child)?.parent != Some(parent) {
            return Err(OmeError::NotFound(format!(
                "element#{} is not a child of element#{}",
                child.0, parent.0
            )));
        }
        self.node_mut(parent)?.children.retain(|c| *c != child);
        self.node_mut(child)?.parent = None;
        self.bump_subtree(child);
        Ok(())
    }

    pub fn tag(&self, el: ElementId) -> Result<&str, OmeError> {
        Ok(&self.node(el)?.tag)
    }

    pub fn attribute(&self, el: ElementId, name: &str) -> Result<Option<&str>, OmeError> {
        Ok(self
            .node(el)?
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, v)| v.as_str()))
    }

    pub fn attributes(&self, el: ElementId) -> Result<&[(String, String)], OmeError> {
        Ok(&self.node(el)?.attributes)
    }

    pub fn set_attribute<K: Into<String>, V: Into<String>>(
        &mut self,
        el: ElementId,
        name: K,
        value: V,
    ) -> Result<(), OmeError> {
        let (name, value) = (name.into(), value.into());
        let node = self.node_mut(el)?;
        match node.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => node.attributes.push((name, value)),
        }
        let tag = node.tag.clone();
        self.bump(&tag);
        Ok(())
    }

    pub fn remove_attribute(
        &mut self,
        el: ElementId,
        name: &str,
    ) -> Result<Option<String>, OmeError> {
        let node = self.node_mut(el)?;
        let Some(pos) = node.attributes.iter().position(|(key, _)| key == name) else {
            return Ok(None);
        };
        let (_, removed) = node.attributes.remove(pos);
        let tag = node.tag.clone();
        self.bump(&tag);
        Ok(Some(removed))
    }

    pub fn children(&self, el: ElementId) -> Result<&[ElementId], OmeError> {
        Ok(&self.node(el)?.children)
    }

    pub fn parent(&self, el: ElementId) -> Result<Option<ElementId>, OmeError> {
        Ok(self.node(el)?.parent)
    }

    pub fn text(&self, el: ElementId) -> Result<Option<&str>, OmeError> {
        Ok(self.node(el)?.text.as_deref())
    }

    pub fn set_text<S: Into<String>>(
        &mut self,
        el: ElementId,
        text: Option<S>,
    ) -> Result<(), OmeError> {
        self.node_mut(el)?.text = text.map(Into::into);
        Ok(())
    }

    /// True when `el` is the root or hangs below it.
    pub fn is_attached(&self, el: ElementId) -> bool {
        let mut current = Some(el);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.elements.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    /// `top` and everything below it, in document order.
    pub fn descendants(&self, top: ElementId) -> Descendants<'_> {
        Descendants {
            store: self,
            stack: if top.0 < self.elements.len() {
                vec![top]
            } else {
                Vec::new()
            },
        }
    }

    /// Every attached element in document order.
    pub fn iter(&self) -> Descendants<'_> {
        self.descendants(self.root)
    }

    fn element_locus(locus: Locus) -> Result<ElementId, OmeError> {
        match locus {
            Locus::Element(id) => Ok(id),
            Locus::Map(_) => Err(OmeError::InvalidLocus(format!(
                "{locus} is not an element locus"
            ))),
        }
    }

    fn matching_children<'a>(
        &'a self,
        locus: Locus,
        relation: &RelationDef,
        types: &TypeRegistry,
    ) -> Result<impl Iterator<Item = ElementId> + 'a, OmeError> {
        let el = DomStore::element_locus(locus)?;
        let accepted = types.subtypes(&relation.target);
        let children = self.children(el)?;
        Ok(children.iter().copied().filter(move |child| {
            self.elements
                .get(child.0)
                .is_some_and(|n| accepted.contains(local_name(&n.tag)))
        }))
    }
}

/// Pre-order walk over a subtree.
pub struct Descendants<'a> {
    store: &'a DomStore,
    stack: Vec<ElementId>,
}

impl Iterator for Descendants<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        let next = self.stack.pop()?;
        if let Some(node) = self.store.elements.get(next.0) {
            self.stack.extend(node.children.iter().rev().copied());
        }
        Some(next)
    }
}

impl Backend for DomStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Dom
    }

    fn contains(&self, locus: Locus) -> bool {
        matches!(locus, Locus::Element(id) if id.0 < self.elements.len())
    }

    fn scalar(
        &self,
        locus: Locus,
        name: &str,
        kind: ScalarKind,
    ) -> Result<Option<Value>, OmeError> {
        let raw = self.attribute(DomStore::element_locus(locus)?, name)?;
        value::parse(raw, kind)
    }

    fn set_scalar(
        &mut self,
        locus: Locus,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), OmeError> {
        let el = DomStore::element_locus(locus)?;
        match value {
            Some(v) => self.set_attribute(el, name, value::format(v)),
            None => self.remove_attribute(el, name).map(|_| ()),
        }
    }

    fn child(
        &self,
        locus: Locus,
        relation: &RelationDef,
        types: &TypeRegistry,
    ) -> Result<Option<Locus>, OmeError> {
        let found: Vec<ElementId> = self.matching_children(locus, relation, types)?.collect();
        match found.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(Locus::Element(*only))),
            _ => Err(OmeError::AmbiguousReference {
                relation: relation.name.clone(),
                id: locus.to_string(),
                count: found.len(),
            }),
        }
    }

    fn children(
        &self,
        locus: Locus,
        relation: &RelationDef,
        types: &TypeRegistry,
    ) -> Result<Vec<Locus>, OmeError> {
        Ok(self
            .matching_children(locus, relation, types)?
            .map(Locus::Element)
            .collect())
    }

    fn count_children(
        &self,
        locus: Locus,
        relation: &RelationDef,
        types: &TypeRegistry,
    ) -> Result<usize, OmeError> {
        Ok(self.matching_children(locus, relation, types)?.count())
    }

    fn child_at(
        &self,
        locus: Locus,
        relation: &RelationDef,
        types: &TypeRegistry,
        index: usize,
    ) -> Result<Option<Locus>, OmeError> {
        Ok(self
            .matching_children(locus, relation, types)?
            .nth(index)
            .map(Locus::Element))
    }
}
