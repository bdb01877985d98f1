//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use ome_model::{
    config::ResolverConfig, document::Document, record::Record, registry::OME_TYPES,
    store::DomStore,
};
use std::path::PathBuf;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Path of a file under `tests/data`.
#[allow(dead_code)]
pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// The sample OME-XML document, parsed with the given policies.
#[allow(dead_code)]
pub fn sample_document(config: ResolverConfig) -> Document {
    let dom = DomStore::from_path(data_path("ome_sample.xml")).unwrap();
    Document::from_dom(dom, OME_TYPES.clone(), config)
}

/// An element tree under an `OME` root built from `(tag, attributes)` pairs, all direct children
/// of the root, in the given order.
#[allow(dead_code)]
pub fn flat_document(elements: &[(&str, &[(&str, &str)])], config: ResolverConfig) -> Document {
    let mut dom = DomStore::new("OME");
    for (tag, attributes) in elements {
        let el = dom.create_element(*tag);
        for (key, value) in attributes.iter() {
            dom.set_attribute(el, *key, *value).unwrap();
        }
        dom.append_child(dom.root(), el).unwrap();
    }
    Document::from_dom(dom, OME_TYPES.clone(), config)
}

/// The attached record of `type_name` (subtypes included) whose ID is `id`.
#[allow(dead_code)]
pub fn by_id(document: &Document, type_name: &str, id: &str) -> Record {
    document
        .elements_of(type_name)
        .unwrap()
        .into_iter()
        .find(|r| r.id().unwrap().as_deref() == Some(id))
        .unwrap_or_else(|| panic!("no {type_name} with ID {id}"))
}
