// Type registry for schema-driven records
//
// The registry is the single place that turns a type name into behaviour. Resolvers never switch
// on type names themselves: they ask the registry for the definition, for the is-a relation
// between two types, or to construct a record over a locus.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use petgraph::{algo::has_path_connecting, graph::NodeIndex, visit::Dfs, Graph};
use std::{
    collections::{BTreeSet, HashMap},
    fs::read_to_string,
    path::Path,
    sync::Arc,
};

use crate::{
    document::Document,
    error::OmeError,
    record::Record,
    schema::{FieldDef, RelationDef, SchemaFile, TypeDef},
    store::Locus,
};

/// Global registry holding the built-in OME schema.
pub static OME_TYPES: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::ome);

#[derive(Debug, Default)]
struct TypeTable {
    defs: HashMap<String, Arc<TypeDef>>,
    // Edges run from a supertype to each type that extends it.
    hierarchy: Graph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl TypeTable {
    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.nodes.get(name) {
            return *idx;
        }
        let idx = self.hierarchy.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Walk `name` and its supertypes, most specific first.
    fn lineage(&self, name: &str) -> Result<Vec<Arc<TypeDef>>, OmeError> {
        let mut lineage = Vec::new();
        let mut current = Some(name.to_string());
        while let Some(type_name) = current {
            let def = self
                .defs
                .get(&type_name)
                .cloned()
                .ok_or_else(|| OmeError::UnknownType(type_name.clone()))?;
            if lineage.iter().any(|d: &Arc<TypeDef>| d.name == def.name) {
                tracing::warn!("[TypeRegistry] Cyclic supertype chain through '{type_name}'");
                break;
            }
            current = def.extends.clone();
            lineage.push(def);
        }
        Ok(lineage)
    }
}

/// Thread-safe registry of type definitions.
///
/// Cloning is cheap and shares the underlying table, so documents built from the same registry
/// see later registrations.
pub struct TypeRegistry(Arc<RwLock<TypeTable>>);

impl Clone for TypeRegistry {
    fn clone(&self) -> Self {
        TypeRegistry(self.0.clone())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistry::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeRegistry({} types)", self.0.read().defs.len())
    }
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        TypeRegistry(Arc::new(RwLock::new(TypeTable::default())))
    }

    /// Create a registry holding the built-in OME types
    pub fn ome() -> Self {
        let registry = TypeRegistry::new();
        registry.register_all(crate::ome::schema());
        registry
    }

    pub fn from_schema(schema: SchemaFile) -> Self {
        let registry = TypeRegistry::new();
        registry.register_all(schema.types);
        registry
    }

    pub fn from_toml_str(text: &str) -> Result<Self, OmeError> {
        let schema: SchemaFile = toml::from_str(text)?;
        Ok(TypeRegistry::from_schema(schema))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, OmeError> {
        tracing::debug!("[TypeRegistry] Reading schema from {:?}", path.as_ref());
        TypeRegistry::from_toml_str(&read_to_string(path)?)
    }

    /// Register a type definition
    ///
    /// If a type with this name already exists, it will be overwritten and a log message emitted.
    pub fn register(&self, definition: TypeDef) {
        let mut writer = self.0.write();

        let name = definition.name.clone();
        let child = writer.node(&name);
        if let Some(previous) = writer.defs.get(&name).cloned() {
            tracing::info!("[TypeRegistry::register] Overwriting existing type: {}", name);
            if let Some(old_parent) = previous.extends.as_deref() {
                let parent = writer.node(old_parent);
                if let Some(edge) = writer.hierarchy.find_edge(parent, child) {
                    writer.hierarchy.remove_edge(edge);
                }
            }
        }
        if let Some(parent_name) = definition.extends.as_deref() {
            let parent = writer.node(parent_name);
            writer.hierarchy.add_edge(parent, child, ());
        }

        writer.defs.insert(name, Arc::new(definition));
    }

    pub fn register_all<I: IntoIterator<Item = TypeDef>>(&self, definitions: I) {
        for definition in definitions {
            self.register(definition);
        }
    }

    /// Retrieve a type definition by name, failing fast when it was never registered.
    pub fn get(&self, type_name: &str) -> Result<Arc<TypeDef>, OmeError> {
        self.0
            .read()
            .defs
            .get(type_name)
            .cloned()
            .ok_or_else(|| OmeError::UnknownType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.0.read().defs.contains_key(type_name)
    }

    /// List all registered type names, sorted
    pub fn list_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.read().defs.keys().cloned().collect();
        names.sort();
        names
    }

    /// True when `type_name` is `ancestor` or (transitively) extends it.
    pub fn is_a(&self, type_name: &str, ancestor: &str) -> bool {
        if type_name == ancestor {
            return true;
        }
        let reader = self.0.read();
        match (reader.nodes.get(ancestor), reader.nodes.get(type_name)) {
            (Some(from), Some(to)) => has_path_connecting(&reader.hierarchy, *from, *to, None),
            _ => false,
        }
    }

    /// The registered type itself plus every registered type that transitively extends it.
    pub fn subtypes(&self, type_name: &str) -> BTreeSet<String> {
        let reader = self.0.read();
        let mut found = BTreeSet::new();
        let Some(start) = reader.nodes.get(type_name) else {
            return found;
        };
        let mut dfs = Dfs::new(&reader.hierarchy, *start);
        while let Some(idx) = dfs.next(&reader.hierarchy) {
            let name = &reader.hierarchy[idx];
            if reader.defs.contains_key(name) {
                found.insert(name.clone());
            }
        }
        found
    }

    /// Look up a field on `type_name` or any of its supertypes.
    pub fn field(&self, type_name: &str, field: &str) -> Result<FieldDef, OmeError> {
        let reader = self.0.read();
        reader
            .lineage(type_name)?
            .iter()
            .find_map(|def| def.own_field(field).cloned())
            .ok_or_else(|| OmeError::UnknownField {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })
    }

    /// Look up a relation on `type_name` or any of its supertypes.
    pub fn relation(&self, type_name: &str, relation: &str) -> Result<RelationDef, OmeError> {
        let reader = self.0.read();
        reader
            .lineage(type_name)?
            .iter()
            .find_map(|def| def.own_relation(relation).cloned())
            .ok_or_else(|| OmeError::UnknownRelation {
                type_name: type_name.to_string(),
                relation: relation.to_string(),
            })
    }

    /// All fields visible on `type_name`, supertype fields first.
    pub fn fields(&self, type_name: &str) -> Result<Vec<FieldDef>, OmeError> {
        let reader = self.0.read();
        Ok(reader
            .lineage(type_name)?
            .iter()
            .rev()
            .flat_map(|def| def.fields.iter().cloned())
            .collect())
    }

    /// All relations visible on `type_name`, supertype relations first.
    pub fn relations(&self, type_name: &str) -> Result<Vec<RelationDef>, OmeError> {
        let reader = self.0.read();
        Ok(reader
            .lineage(type_name)?
            .iter()
            .rev()
            .flat_map(|def| def.relations.iter().cloned())
            .collect())
    }

    /// Wrap `locus` of `document` in a record of `type_name`.
    ///
    /// Records are interned per document, so constructing twice over the same locus hands back
    /// the same instance.
    pub fn construct(
        &self,
        type_name: &str,
        locus: Locus,
        document: &Document,
    ) -> Result<Record, OmeError> {
        let definition = self.get(type_name)?;
        Ok(document.intern(locus, definition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarKind;

    fn light_sources() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDef::new("LightSource")
                .field("Power", ScalarKind::Float)
                .reference("Instrument", "Instrument"),
        );
        registry.register(
            TypeDef::new("Laser")
                .extends("LightSource")
                .field("Wavelength", ScalarKind::Integer),
        );
        registry.register(TypeDef::new("Arc").extends("LightSource"));
        registry.register(TypeDef::new("Instrument"));
        registry
    }

    #[test]
    fn test_unknown_type_fails_fast() {
        let registry = light_sources();
        assert_eq!(
            registry.get("Bogus").unwrap_err(),
            OmeError::UnknownType("Bogus".to_string())
        );
        assert!(registry.get("Laser").is_ok());
    }

    #[test]
    fn test_inherited_lookup() {
        let registry = light_sources();
        assert_eq!(
            registry.field("Laser", "Power").unwrap().kind,
            ScalarKind::Float
        );
        assert_eq!(
            registry.relation("Laser", "Instrument").unwrap().target,
            "Instrument"
        );
        assert!(matches!(
            registry.field("Arc", "Wavelength"),
            Err(OmeError::UnknownField { .. })
        ));
        let names: Vec<String> = registry
            .fields("Laser")
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["Power", "Wavelength"]);
    }

    #[test]
    fn test_hierarchy_queries() {
        let registry = light_sources();
        assert!(registry.is_a("Laser", "LightSource"));
        assert!(registry.is_a("Laser", "Laser"));
        assert!(!registry.is_a("LightSource", "Laser"));
        assert!(!registry.is_a("Instrument", "LightSource"));
        let subtypes: Vec<String> = registry.subtypes("LightSource").into_iter().collect();
        assert_eq!(subtypes, vec!["Arc", "Laser", "LightSource"]);
    }

    #[test]
    fn test_type_overwrite_rewires_hierarchy() {
        let registry = light_sources();
        registry.register(TypeDef::new("Arc"));
        assert!(!registry.is_a("Arc", "LightSource"));
        assert!(!registry.subtypes("LightSource").contains("Arc"));
    }

    #[test]
    fn test_list_types_sorted() {
        let registry = light_sources();
        assert_eq!(
            registry.list_types(),
            vec!["Arc", "Instrument", "Laser", "LightSource"]
        );
    }

    #[test]
    fn test_clone_shares_table() {
        let registry = light_sources();
        let other = registry.clone();
        other.register(TypeDef::new("Filament").extends("LightSource"));
        assert!(registry.is_a("Filament", "LightSource"));
    }

    #[test]
    fn test_global_ome_types() {
        assert!(OME_TYPES.contains("Experimenter"));
        assert!(OME_TYPES.is_a("Laser", "LightSource"));
    }
}
