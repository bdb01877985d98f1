//! # ome-model
//!
//! A schema-driven typed-attribute-graph core for OME microscopy metadata.
//!
//! ## Overview
//!
//! OME metadata describes images, instruments, light sources, filters, experimenters and pixel
//! statistics as a graph of typed entities. Entities point at each other by identifier (an
//! `Objective` names its `Instrument`, a `Laser` names the `LightSource` pumping it) and many
//! questions are asked in reverse ("which lasers does this light source pump?").
//!
//! ome-model implements the layer that typed entity views sit on. Every view is a thin wrapper
//! around a [`record::Record`], and every record reads and writes through one of two
//! interchangeable physical backends:
//!
//! - **[`store::MapStore`]**: nested maps, the transport form. Related records are nested
//!   under the relation's name.
//! - **[`store::DomStore`]**: a live XML element tree. Fields are attributes, containment is
//!   nesting and references are identifier attributes resolved over the whole document.
//!
//! ### Key Features
//!
//! - **Typed scalar access**: stored text or boxed values are coerced lazily to the declared
//!   kind; a bad value is an error, a missing value is `None`
//! - **Forward resolution**: containment and identifier references resolve to zero-or-one
//!   record, memoised per record until the document changes
//! - **Reverse referrals**: a per-document [`index::ReferralIndex`] is built once per
//!   (source type, attribute) and serves every later count and list query
//! - **Stable identity**: one record instance per storage locus, so cyclic graphs terminate and
//!   repeated lookups return the identical instance
//! - **Type hierarchy**: `Laser` extends `LightSource`; field and relation lookups walk the
//!   supertype chain and every type test is an is-a test
//!
//! ## Architecture
//!
//! - **[`value`]**: scalar kinds and coercion between stored and typed values
//! - **[`schema`]**: declarative type definitions, from code or a TOML file
//! - **[`registry`]**: the type table and hierarchy; wraps loci into records
//! - **[`store`]**: the two backends behind the [`store::Backend`] trait
//! - **[`document`]**: the context that owns a backend, the identity cache and the index
//! - **[`record`]**: field access and relation resolution
//! - **[`entity`]**: the [`entity::Entity`] trait and the [`entity!`] macro for typed views
//! - **[`ome`]**: the built-in OME schema and its views
//! - **[`config`]**: resolver policies for dangling and duplicate identifiers
//!
//! ## Quick Start
//!
//! ```rust
//! use ome_model::{
//!     config::ResolverConfig, document::Document, ome::Group, registry::OME_TYPES,
//! };
//!
//! let xml = r#"<OME>
//!   <Group ID="Group:1" Name="Imaging"/>
//!   <Experimenter ID="Experimenter:1" Group="Group:1" LastName="Curie"/>
//!   <Experimenter ID="Experimenter:2" Group="Group:1" LastName="Hooke"/>
//! </OME>"#;
//! let document = Document::from_xml_str(xml, OME_TYPES.clone(), ResolverConfig::default())?;
//! let group: Group = document.elements_of("Group")?.remove(0).cast()?;
//!
//! assert_eq!(group.name()?.as_deref(), Some("Imaging"));
//! assert_eq!(group.count_experimenters()?, 2);
//! for person in group.experimenters()? {
//!     assert_eq!(person.group()?, Some(group.clone()));
//! }
//! # Ok::<(), ome_model::OmeError>(())
//! ```
//!
//! ### Map documents
//!
//! ```rust
//! use ome_model::{
//!     config::ResolverConfig, document::Document, entity::Entity, ome::Filter,
//!     registry::OME_TYPES,
//! };
//!
//! let json = r#"{ "ID": "Filter:0", "LotNumber": "L-7", "DichroicList": [] }"#;
//! let document =
//!     Document::from_json_str(json, "Filter", OME_TYPES.clone(), ResolverConfig::default())?;
//! let filter = Filter::from_record(document.root()?)?;
//! assert_eq!(filter.count_dichroics()?, 0);
//! assert!(filter.dichroics()?.is_empty());
//! # Ok::<(), ome_model::OmeError>(())
//! ```
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `ome-model` command line tool (`clap`, `tracing-subscriber`)

pub mod config;
pub mod document;
pub mod entity;
pub mod error;
pub mod index;
pub mod ome;
pub mod record;
pub mod registry;
mod resolve;
pub mod schema;
pub mod store;
#[cfg(test)]
mod tests;
pub mod value;

pub use error::*;
