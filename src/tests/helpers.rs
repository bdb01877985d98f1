//! Shared test utilities for record and resolution testing

use crate::{
    config::ResolverConfig, document::Document, record::Record, registry::OME_TYPES,
    store::DomStore,
};

pub const OME_SAMPLE: &str = include_str!("../../tests/data/ome_sample.xml");

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// The sample OME document over the built-in types
pub fn sample_document() -> Document {
    init_logging();
    Document::from_xml_str(OME_SAMPLE, OME_TYPES.clone(), ResolverConfig::default())
        .expect("sample document parses")
}

/// The first attached element of `type_name` (subtypes included) whose ID is `id`
pub fn by_id(document: &Document, type_name: &str, id: &str) -> Record {
    document
        .elements_of(type_name)
        .unwrap()
        .into_iter()
        .find(|r| r.id().unwrap().as_deref() == Some(id))
        .unwrap_or_else(|| panic!("no {type_name} with ID {id}"))
}

/// Append a detached element with the given attributes under `parent` and return it
pub fn append(
    document: &Document,
    parent: &Record,
    tag: &str,
    attributes: &[(&str, &str)],
) -> Record {
    let crate::store::Locus::Element(parent) = parent.locus() else {
        panic!("{parent:?} is not an element");
    };
    let el = document
        .with_dom_mut(|dom: &mut DomStore| {
            let el = dom.create_element(tag);
            for (key, value) in attributes {
                dom.set_attribute(el, *key, *value).unwrap();
            }
            dom.append_child(parent, el).unwrap();
            el
        })
        .unwrap();
    document.record_for_element(el).unwrap()
}
