// Relation resolution: turning a record and a relation definition into target loci.
//
// Containment is answered by the backend. Identifier references and referrals over an element
// tree go through the document's ReferralIndex; a forward lookup is the referral grouping of the
// target type keyed on its identifier attribute. Map stores are denormalised, so every relation
// kind is read from the nested entry named after the relation.

use crate::{
    config::{DanglingPolicy, DuplicatePolicy},
    error::OmeError,
    record::Record,
    schema::{RelationDef, RelationKind},
    store::{DomStore, ElementId, Locus, Store},
};

/// Zero-or-one target of a single-valued relation.
pub(crate) fn resolve(record: &Record, relation: &RelationDef) -> Result<Option<Locus>, OmeError> {
    let document = record.document();
    let types = document.types();
    document.read(|store| match (store, &relation.kind) {
        (Store::Dom(dom), RelationKind::Reference { attribute }) => {
            resolve_reference(record, dom, relation, attribute)
        }
        (_, RelationKind::Child | RelationKind::Reference { .. }) => {
            store.backend().child(record.locus(), relation, types)
        }
        (_, RelationKind::Children | RelationKind::Referral { .. }) => Err(OmeError::Unsupported(
            format!("'{}' is multi-valued", relation.name),
        )),
    })
}

fn resolve_reference(
    record: &Record,
    dom: &DomStore,
    relation: &RelationDef,
    attribute: &str,
) -> Result<Option<Locus>, OmeError> {
    let Locus::Element(el) = record.locus() else {
        return Err(OmeError::InvalidLocus(format!(
            "{} in an element tree",
            record.locus()
        )));
    };
    let Some(id) = dom.attribute(el, attribute)? else {
        return Ok(None);
    };
    let document = record.document();
    let types = document.types();
    let target = types.get(&relation.target)?;
    let matches = document.referrals().list_referrals(
        dom,
        types,
        &target.name,
        &target.id_attribute,
        id,
    );

    match matches.as_slice() {
        [] => match document.config().dangling_references {
            DanglingPolicy::Absent => {
                tracing::warn!(
                    "[resolve] {:?}.{} names '{}' but no {} carries that identifier",
                    record,
                    relation.name,
                    id,
                    target.name
                );
                Ok(None)
            }
            DanglingPolicy::Error => Err(OmeError::DanglingReference {
                relation: relation.name.clone(),
                id: id.to_string(),
            }),
        },
        [only] => Ok(Some(Locus::Element(*only))),
        [first, ..] => match document.config().duplicate_identifiers {
            DuplicatePolicy::FirstMatch => {
                tracing::debug!(
                    "[resolve] '{}' matches {} elements, taking the first",
                    id,
                    matches.len()
                );
                Ok(Some(Locus::Element(*first)))
            }
            DuplicatePolicy::Error => Err(OmeError::AmbiguousReference {
                relation: relation.name.clone(),
                id: id.to_string(),
                count: matches.len(),
            }),
        },
    }
}

// The identifier other elements must carry to refer to `record`.
fn own_identifier<'a>(record: &Record, dom: &'a DomStore) -> Result<Option<&'a str>, OmeError> {
    match record.locus() {
        Locus::Element(el) => dom.attribute(el, &record.definition().id_attribute),
        locus => Err(OmeError::InvalidLocus(format!("{locus} in an element tree"))),
    }
}

fn referring_elements(
    record: &Record,
    dom: &DomStore,
    relation: &RelationDef,
    attribute: &str,
) -> Result<Vec<ElementId>, OmeError> {
    let Some(id) = own_identifier(record, dom)? else {
        return Ok(Vec::new());
    };
    let document = record.document();
    Ok(document.referrals().list_referrals(
        dom,
        document.types(),
        &relation.target,
        attribute,
        id,
    ))
}

/// Loci of a list-valued relation, in document order.
pub(crate) fn resolve_list(record: &Record, relation: &RelationDef) -> Result<Vec<Locus>, OmeError> {
    let document = record.document();
    document.read(|store| match (store, &relation.kind) {
        (Store::Dom(dom), RelationKind::Referral { attribute }) => Ok(referring_elements(
            record, dom, relation, attribute,
        )?
        .into_iter()
        .map(Locus::Element)
        .collect()),
        _ => store
            .backend()
            .children(record.locus(), relation, document.types()),
    })
}

/// Length of a list-valued relation without collecting it.
pub(crate) fn count_list(record: &Record, relation: &RelationDef) -> Result<usize, OmeError> {
    let document = record.document();
    document.read(|store| match (store, &relation.kind) {
        (Store::Dom(dom), RelationKind::Referral { attribute }) => {
            let Some(id) = own_identifier(record, dom)? else {
                return Ok(0);
            };
            Ok(document.referrals().count_referrals(
                dom,
                document.types(),
                &relation.target,
                attribute,
                id,
            ))
        }
        _ => store
            .backend()
            .count_children(record.locus(), relation, document.types()),
    })
}

pub(crate) fn list_item(
    record: &Record,
    relation: &RelationDef,
    index: usize,
) -> Result<Option<Locus>, OmeError> {
    let document = record.document();
    document.read(|store| match (store, &relation.kind) {
        (Store::Dom(dom), RelationKind::Referral { attribute }) => Ok(referring_elements(
            record, dom, relation, attribute,
        )?
        .get(index)
        .copied()
        .map(Locus::Element)),
        _ => store
            .backend()
            .child_at(record.locus(), relation, document.types(), index),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ResolverConfig, document::Document, registry::TypeRegistry, schema::TypeDef,
        value::ScalarKind,
    };

    fn registry() -> TypeRegistry {
        let types = TypeRegistry::new();
        types.register(TypeDef::new("OME"));
        types.register(
            TypeDef::new("Group")
                .field("Name", ScalarKind::String)
                .referral("ExperimenterList", "Experimenter", "Group"),
        );
        types.register(TypeDef::new("Experimenter").reference("Group", "Group"));
        types
    }

    fn document(config: ResolverConfig, groups: &[&str], members: &[&str]) -> Document {
        let mut dom = DomStore::new("OME");
        for id in groups {
            let group = dom.create_element("Group");
            dom.set_attribute(group, "ID", *id).unwrap();
            dom.append_child(dom.root(), group).unwrap();
        }
        for (n, group) in members.iter().enumerate() {
            let person = dom.create_element("Experimenter");
            dom.set_attribute(person, "ID", format!("Experimenter:{n}"))
                .unwrap();
            dom.set_attribute(person, "Group", *group).unwrap();
            dom.append_child(dom.root(), person).unwrap();
        }
        Document::from_dom(dom, registry(), config)
    }

    fn experimenter(document: &Document, n: usize) -> Record {
        document.elements_of("Experimenter").unwrap().remove(n)
    }

    #[test]
    fn test_reference_resolves_through_identifier() {
        let document = document(ResolverConfig::default(), &["G1", "G2"], &["G2"]);
        let group = experimenter(&document, 0).relation("Group").unwrap().unwrap();
        assert_eq!(group.id().unwrap().as_deref(), Some("G2"));
    }

    #[test]
    fn test_dangling_policy() {
        let lenient = document(ResolverConfig::default(), &["G1"], &["G9"]);
        assert_eq!(experimenter(&lenient, 0).relation("Group").unwrap(), None);

        let strict = document(ResolverConfig::strict(), &["G1"], &["G9"]);
        assert!(matches!(
            experimenter(&strict, 0).relation("Group"),
            Err(OmeError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_duplicate_policy() {
        let strict = document(ResolverConfig::default(), &["G1", "G1"], &["G1"]);
        assert!(matches!(
            experimenter(&strict, 0).relation("Group"),
            Err(OmeError::AmbiguousReference { count: 2, .. })
        ));

        let config = ResolverConfig {
            duplicate_identifiers: DuplicatePolicy::FirstMatch,
            ..ResolverConfig::default()
        };
        let lenient = document(config, &["G1", "G1"], &["G1"]);
        let group = experimenter(&lenient, 0).relation("Group").unwrap().unwrap();
        let first = lenient.elements_of("Group").unwrap().remove(0);
        assert!(group.same_instance(&first));
    }

    #[test]
    fn test_referrals_follow_identifier() {
        let document = document(ResolverConfig::default(), &["G1", "G2"], &["G1", "G2", "G1"]);
        let groups = document.elements_of("Group").unwrap();
        assert_eq!(groups[0].count_relation("ExperimenterList").unwrap(), 2);
        assert_eq!(groups[1].count_relation("ExperimenterList").unwrap(), 1);
        let members = groups[0].relation_list("ExperimenterList").unwrap();
        assert_eq!(members[1], experimenter(&document, 2));
        assert_eq!(
            groups[0].relation_at("ExperimenterList", 1).unwrap(),
            Some(experimenter(&document, 2))
        );
    }

    #[test]
    fn test_record_without_identifier_has_no_referrals() {
        let document = document(ResolverConfig::default(), &[], &[]);
        let group = document.root().unwrap();
        assert_eq!(group.type_name(), "OME");
        let orphan = document
            .with_dom_mut(|dom| {
                let el = dom.create_element("Group");
                dom.append_child(dom.root(), el).map(|_| el)
            })
            .unwrap()
            .unwrap();
        let orphan = document.record_for_element(orphan).unwrap();
        assert_eq!(orphan.count_relation("ExperimenterList").unwrap(), 0);
        assert!(orphan.relation_list("ExperimenterList").unwrap().is_empty());
    }
}
