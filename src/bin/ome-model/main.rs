//! ome-model CLI tool
//!
//! Command-line interface for inspecting OME-XML documents with ome-model.
//!
//! ## Commands
//!
//! - `summary <path>`: element counts per type
//! - `referrals <path> <SourceType> <Attribute>`: the reverse index for one attribute
//! - `show <path> <ID>`: fields and relations of one element
//!
//! Resolver policies come from `--config <toml>`; a custom type table from `--schema <toml>`.

use clap::{Parser, Subcommand};
use ome_model::{
    config::ResolverConfig,
    document::Document,
    record::Record,
    registry::{TypeRegistry, OME_TYPES},
    store::{local_name, DomStore},
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(name = "ome-model")]
#[command(author, version, about = "Inspect typed OME-XML metadata", long_about = None)]
struct Cli {
    /// Resolver policy file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Type table to use instead of the built-in OME schema (TOML)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count elements per type
    Summary {
        /// Path to the OME-XML document
        path: PathBuf,
    },

    /// Print which elements of a type refer to each identifier through an attribute
    Referrals {
        /// Path to the OME-XML document
        path: PathBuf,

        /// Type whose elements carry the attribute, e.g. Experimenter
        source_type: String,

        /// Attribute holding the referenced identifier, e.g. Group
        attribute: String,
    },

    /// Print the fields and relations of the element with the given ID
    Show {
        /// Path to the OME-XML document
        path: PathBuf,

        /// Identifier of the element
        id: String,
    },
}

fn open(cli: &Cli, path: &Path) -> Result<Document, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(config) => ResolverConfig::from_path(config)?,
        None => ResolverConfig::default(),
    };
    let types = match &cli.schema {
        Some(schema) => TypeRegistry::from_path(schema)?,
        None => OME_TYPES.clone(),
    };
    Ok(Document::from_dom(DomStore::from_path(path)?, types, config))
}

fn describe(record: &Record) -> String {
    match record.id() {
        Ok(Some(id)) => format!("{} {}", record.type_name(), id),
        _ => format!("{} @ {}", record.type_name(), record.locus()),
    }
}

fn summary(document: &Document) -> Result<(), Box<dyn std::error::Error>> {
    let counts = document.with_dom(|dom| {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for el in dom.iter() {
            if let Ok(tag) = dom.tag(el) {
                *counts.entry(local_name(tag).to_string()).or_default() += 1;
            }
        }
        counts
    })?;
    for (tag, count) in &counts {
        let marker = if document.types().contains(tag) { "" } else { "  (unregistered)" };
        println!("{tag:<24} {count:>8}{marker}");
    }
    println!("{:<24} {:>8}", "total", counts.values().sum::<usize>());
    Ok(())
}

fn referrals(
    document: &Document,
    source_type: &str,
    attribute: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    document.types().get(source_type)?;
    let grouped = document.with_dom(|dom| {
        document
            .referrals()
            .referrals(dom, document.types(), source_type, attribute)
    })?;
    let mut ids: Vec<&String> = grouped.keys().collect();
    ids.sort();
    for id in ids {
        let sources = &grouped[id];
        println!("{id} <- {} {source_type}", sources.len());
        for el in sources {
            println!("    {}", describe(&document.record_for_element(*el)?));
        }
    }
    Ok(())
}

fn show(document: &Document, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut found = None;
    'search: for type_name in document.types().list_types() {
        let def = document.types().get(&type_name)?;
        if def.extends.is_some() {
            continue;
        }
        for record in document.elements_of(&type_name)? {
            if record.id()?.as_deref() == Some(id) {
                found = Some(record);
                break 'search;
            }
        }
    }
    let Some(record) = found else {
        return Err(format!("no element carries ID {id}").into());
    };

    println!("{}", describe(&record));
    let types = document.types();
    for field in types.fields(record.type_name())? {
        match record.get(&field.name) {
            Ok(Some(value)) => println!("  {:<24} {}", field.name, value),
            Ok(None) => {}
            Err(e) => println!("  {:<24} <{e}>", field.name),
        }
    }
    for relation in types.relations(record.type_name())? {
        if relation.kind.is_list() {
            let count = record.count_relation(&relation.name)?;
            if count > 0 {
                println!("  {:<24} {count} {}", relation.name, relation.target);
            }
        } else {
            match record.relation(&relation.name) {
                Ok(Some(target)) => println!("  {:<24} -> {}", relation.name, describe(&target)),
                Ok(None) => {}
                Err(e) => println!("  {:<24} <{e}>", relation.name),
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match &cli.command {
        Commands::Summary { path } => summary(&open(&cli, path)?),
        Commands::Referrals {
            path,
            source_type,
            attribute,
        } => referrals(&open(&cli, path)?, source_type, attribute),
        Commands::Show { path, id } => show(&open(&cli, path)?, id),
    }
}
