//! Named schema registry and reference resolution.
//!
//! The store is an arena keyed by name: references are just names, so a
//! reference may be created before its target exists. Whether it resolves is
//! only checked when something actually needs to read through it.

use indexmap::IndexMap;

use crate::error::{Result, SchemaError};
use crate::schema::{Kind, Schema};

/// Append-only mapping from definition name to schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionStore {
    defs: IndexMap<String, Schema>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Total lookup; `None` when absent.
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.defs.get(name)
    }

    /// Position of a definition in insertion order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.defs.get_index_of(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.defs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add one definition; an existing name is never overwritten.
    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) -> Result<()> {
        let name = name.into();
        if self.defs.contains_key(&name) {
            return Err(SchemaError::DuplicateDefinition { name });
        }
        self.defs.insert(name, schema);
        Ok(())
    }

    /// Add a batch atomically: every name is checked against the store and
    /// against the rest of the batch before anything is committed.
    pub fn insert_all(&mut self, batch: Vec<(String, Schema)>) -> Result<()> {
        {
            let mut seen = std::collections::HashSet::with_capacity(batch.len());
            for (name, _) in &batch {
                if self.defs.contains_key(name) || !seen.insert(name.as_str()) {
                    return Err(SchemaError::DuplicateDefinition { name: name.clone() });
                }
            }
        }
        self.defs.extend(batch);
        Ok(())
    }

    /// Follow a chain of plain references from `name` to the first
    /// definition that is not itself a reference.
    pub fn resolve(&self, name: &str) -> Result<&Schema> {
        let mut chain: Vec<&str> = Vec::new();
        let mut current = name;
        loop {
            if chain.contains(&current) {
                let mut chain: Vec<String> = chain.iter().map(|s| s.to_string()).collect();
                chain.push(current.to_string());
                return Err(SchemaError::CyclicReference { chain });
            }
            chain.push(current);
            let schema = self
                .defs
                .get(current)
                .ok_or_else(|| SchemaError::UnknownDefinition { name: current.to_string() })?;
            match schema.kind() {
                Kind::Reference(next) => current = next,
                _ => return Ok(schema),
            }
        }
    }

    /// Resolve `schema` itself if it is a reference, otherwise return it.
    pub fn deref<'a>(&'a self, schema: &'a Schema) -> Result<&'a Schema> {
        match schema.kind() {
            Kind::Reference(name) => self.resolve(name),
            _ => Ok(schema),
        }
    }

    /// Every referenced name (from `extra` roots and from all definitions)
    /// that is missing from the store, in first-seen order.
    pub fn dangling<'a>(&'a self, extra: &'a [&'a Schema]) -> Vec<&'a str> {
        let mut out: Vec<&str> = Vec::new();
        let schemas = extra.iter().copied().chain(self.defs.values());
        for schema in schemas {
            for name in schema.references() {
                if !self.defs.contains_key(name) && !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }
}

impl FromIterator<(String, Schema)> for DefinitionStore {
    fn from_iter<T: IntoIterator<Item = (String, Schema)>>(iter: T) -> Self {
        Self { defs: iter.into_iter().collect() }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StringOptions;

    #[test]
    fn duplicate_insert_leaves_store_unchanged() {
        let mut store = DefinitionStore::new();
        store.insert("a", Schema::boolean()).unwrap();
        let before = store.clone();
        let err = store.insert("a", Schema::null()).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateDefinition { ref name } if name == "a"));
        assert_eq!(store, before);
    }

    #[test]
    fn batch_insert_is_all_or_nothing() {
        let mut store = DefinitionStore::new();
        store.insert("taken", Schema::boolean()).unwrap();
        let batch = vec![
            ("fresh".to_string(), Schema::null()),
            ("taken".to_string(), Schema::null()),
        ];
        assert!(store.insert_all(batch).is_err());
        assert_eq!(store.len(), 1);
        assert!(!store.contains("fresh"));

        let repeated = vec![
            ("x".to_string(), Schema::null()),
            ("x".to_string(), Schema::boolean()),
        ];
        assert!(store.insert_all(repeated).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn resolves_alias_chains_and_reports_missing_or_cyclic() {
        let mut store = DefinitionStore::new();
        store.insert("a", Schema::reference("b")).unwrap();
        store.insert("b", Schema::string(StringOptions::new())).unwrap();
        store.insert("loop1", Schema::reference("loop2")).unwrap();
        store.insert("loop2", Schema::reference("loop1")).unwrap();
        store.insert("broken", Schema::reference("ghost")).unwrap();

        assert_eq!(store.resolve("a").unwrap(), store.get("b").unwrap());
        assert!(matches!(store.resolve("ghost"), Err(SchemaError::UnknownDefinition { .. })));
        assert!(matches!(store.resolve("broken"), Err(SchemaError::UnknownDefinition { ref name }) if name == "ghost"));
        match store.resolve("loop1") {
            Err(SchemaError::CyclicReference { chain }) => {
                assert_eq!(chain, vec!["loop1", "loop2", "loop1"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn dangling_lists_missing_targets_once() {
        let mut store = DefinitionStore::new();
        store.insert("a", Schema::union([Schema::reference("b"), Schema::reference("c")])).unwrap();
        store.insert("b", Schema::null()).unwrap();
        let root = Schema::reference("c");
        assert_eq!(store.dangling(&[&root]), vec!["c"]);
    }
}
