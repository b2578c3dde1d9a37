//! # The schema builder
//!
//! [`SchemaBuilder`] owns a definition store, an optional root and a lazily
//! compiled validator. Mutating calls take `&mut self` and return
//! `Result<&mut Self>` so they chain with `?`; a call that fails leaves the
//! builder exactly as it was.
//!
//! ```
//! use json_schemata::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> json_schemata::Result<()> {
//! let mut b = SchemaBuilder::new();
//! b.add_definition("semver", Schema::regex(r"^\d+\.\d+\.\d+$", StringOptions::new()))?
//!     .add_generated("packageFile", |b| {
//!         Schema::object([("version", b.def_ref("semver"))], ObjectOptions::new())
//!     })?
//!     .set_root("packageFile")?;
//! assert!(b.is_valid(&json!({ "version": "1.2.3" }))?);
//! # Ok(())
//! # }
//! ```
//!
//! The validator cache goes Absent → Compiled on first use (or an explicit
//! [`SchemaBuilder::compile_validator`]) and back to Absent on any change to
//! the store or the root.

use std::cell::RefCell;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::defs::DefinitionStore;
use crate::error::{Result, SchemaError, ValidationErrors};
use crate::json::{self, DEFS_KEY};
use crate::ir::Reflection;
use crate::lower;
use crate::schema::Schema;
use crate::validate::{CompileOptions, CompiledValidator, Diagnostic};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// The entry schema of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Root {
    Definition(String),
    Inline(Schema),
}

/// What `serialize_with_defs` / `reflect` should put at the top.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Target {
    #[default]
    Root,
    Definition(String),
    Schema(Schema),
}

type Generator<'a, T> = Box<dyn FnOnce(&SchemaBuilder) -> Result<T> + 'a>;

/// A single definition: given directly, or produced by a closure that sees
/// the builder (so it can reference other definitions, even ones added
/// later).
pub enum DefinitionSource<'a> {
    Schema(Schema),
    Generator(Generator<'a, Schema>),
}

/// Bulk input for [`SchemaBuilder::add_definitions`].
pub enum Definitions<'a> {
    Direct(IndexMap<String, Schema>),
    Generator(Generator<'a, IndexMap<String, Schema>>),
    /// Copy every definition of another builder.
    FromBuilder(&'a SchemaBuilder),
    Many(Vec<Definitions<'a>>),
}

impl<'a> DefinitionSource<'a> {
    pub fn generated(f: impl FnOnce(&SchemaBuilder) -> Result<Schema> + 'a) -> Self {
        Self::Generator(Box::new(f))
    }
}

impl From<Schema> for DefinitionSource<'_> {
    fn from(schema: Schema) -> Self {
        Self::Schema(schema)
    }
}

impl<'a> Definitions<'a> {
    pub fn direct<K: Into<String>>(defs: impl IntoIterator<Item = (K, Schema)>) -> Self {
        Self::Direct(defs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn generated(
        f: impl FnOnce(&SchemaBuilder) -> Result<IndexMap<String, Schema>> + 'a,
    ) -> Self {
        Self::Generator(Box::new(f))
    }
}

impl<'a> From<&'a SchemaBuilder> for Definitions<'a> {
    fn from(builder: &'a SchemaBuilder) -> Self {
        Self::FromBuilder(builder)
    }
}

impl From<IndexMap<String, Schema>> for Definitions<'_> {
    fn from(defs: IndexMap<String, Schema>) -> Self {
        Self::Direct(defs)
    }
}

impl<'a> From<Vec<Definitions<'a>>> for Definitions<'a> {
    fn from(all: Vec<Definitions<'a>>) -> Self {
        Self::Many(all)
    }
}

/// Definitions, root and validator cache for one schema document.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    defs: DefinitionStore,
    root: Option<Root>,
    cache: OnceCell<CompiledValidator>,
    last_errors: RefCell<Vec<Diagnostic>>,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a copy of another builder's definitions (not its root).
    pub fn with_library(library: &SchemaBuilder) -> Self {
        Self { defs: library.defs.clone(), ..Self::default() }
    }

    /// Merge every library, then run `build` on the result.
    pub fn create<F>(libraries: &[&SchemaBuilder], build: F) -> Result<Self>
    where
        F: FnOnce(&mut SchemaBuilder) -> Result<()>,
    {
        let mut builder = Self::new();
        for lib in libraries {
            builder.add_definitions(*lib)?;
        }
        build(&mut builder)?;
        Ok(builder)
    }

    pub fn definitions(&self) -> &DefinitionStore {
        &self.defs
    }

    pub fn add_definition<'a>(
        &mut self,
        name: impl Into<String>,
        source: impl Into<DefinitionSource<'a>>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if self.defs.contains(&name) {
            return Err(SchemaError::DuplicateDefinition { name });
        }
        let schema = match source.into() {
            DefinitionSource::Schema(schema) => schema,
            DefinitionSource::Generator(f) => f(self)?,
        };
        self.defs.insert(name.clone(), schema)?;
        tracing::debug!(definition = %name, total = self.defs.len(), "added definition");
        self.invalidate();
        Ok(self)
    }

    /// Shorthand for a generated definition.
    pub fn add_generated<F>(&mut self, name: impl Into<String>, f: F) -> Result<&mut Self>
    where
        F: FnOnce(&SchemaBuilder) -> Result<Schema>,
    {
        self.add_definition(name, DefinitionSource::generated(f))
    }

    /// Add many definitions at once, in source order. Either all of them are
    /// added or, on the first duplicate name, none are.
    pub fn add_definitions<'a>(&mut self, defs: impl Into<Definitions<'a>>) -> Result<&mut Self> {
        let mut batch = Vec::new();
        self.collect_batch(defs.into(), &mut batch)?;
        let count = batch.len();
        self.defs.insert_all(batch)?;
        tracing::debug!(added = count, total = self.defs.len(), "added definitions");
        self.invalidate();
        Ok(self)
    }

    fn collect_batch(&self, defs: Definitions<'_>, out: &mut Vec<(String, Schema)>) -> Result<()> {
        match defs {
            Definitions::Direct(map) => out.extend(map),
            Definitions::Generator(f) => out.extend(f(self)?),
            Definitions::FromBuilder(other) => {
                out.extend(other.defs.iter().map(|(k, v)| (k.to_string(), v.clone())));
            }
            Definitions::Many(all) => {
                for d in all {
                    self.collect_batch(d, out)?;
                }
            }
        }
        Ok(())
    }

    /// A reference to `name`. The target does not need to exist yet; it has
    /// to by the time a validator is compiled.
    pub fn def_ref(&self, name: impl Into<String>) -> Schema {
        Schema::reference(name)
    }

    pub fn find_definition(&self, name: &str) -> Option<&Schema> {
        self.defs.get(name)
    }

    pub fn has_definition(&self, name: &str) -> bool {
        self.defs.contains(name)
    }

    pub fn definition_names(&self) -> impl Iterator<Item = &str> {
        self.defs.names()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Run `f` with this builder and hand back whatever it returns.
    pub fn using<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        f(self)
    }

    fn invalidate(&mut self) {
        if self.cache.take().is_some() {
            tracing::debug!("validator cache invalidated");
        }
        self.last_errors.get_mut().clear();
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ROOT
// ————————————————————————————————————————————————————————————————————————————

impl SchemaBuilder {
    pub fn set_root(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        let name = name.into();
        if !self.defs.contains(&name) {
            return Err(SchemaError::UnknownDefinition { name });
        }
        tracing::debug!(root = %name, "root set");
        self.root = Some(Root::Definition(name));
        self.invalidate();
        Ok(self)
    }

    pub fn set_root_schema(&mut self, schema: Schema) -> &mut Self {
        self.root = Some(Root::Inline(schema));
        self.invalidate();
        self
    }

    pub fn root(&self) -> Option<&Root> {
        self.root.as_ref()
    }

    /// The root as an embeddable schema: a reference for definition roots.
    pub fn root_schema(&self) -> Option<Schema> {
        self.root.as_ref().map(|root| match root {
            Root::Definition(name) => Schema::reference(name.clone()),
            Root::Inline(schema) => schema.clone(),
        })
    }

    fn require_root(&self) -> Result<&Root> {
        self.root.as_ref().ok_or(SchemaError::NoRootDefined)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaBuilder {
    /// Compile with explicit options and cache the result, replacing any
    /// previously cached validator.
    pub fn compile_validator(&mut self, options: &CompileOptions) -> Result<&CompiledValidator> {
        let compiled = CompiledValidator::compile(&self.defs, self.require_root()?, options)?;
        self.cache = OnceCell::new();
        self.last_errors.get_mut().clear();
        Ok(self.cache.get_or_init(|| compiled))
    }

    /// The cached validator, compiling it with default options if absent.
    pub fn validator(&self) -> Result<&CompiledValidator> {
        self.cache.get_or_try_init(|| {
            CompiledValidator::compile(&self.defs, self.require_root()?, &CompileOptions::default())
        })
    }

    pub fn is_compiled(&self) -> bool {
        self.cache.get().is_some()
    }

    /// `Err` only when no validator can be compiled; invalid data is
    /// `Ok(false)` with diagnostics available from [`Self::last_errors`].
    pub fn is_valid(&self, data: &Value) -> Result<bool> {
        let diags = self.validator()?.diagnostics(data);
        let ok = diags.is_empty();
        *self.last_errors.borrow_mut() = diags;
        Ok(ok)
    }

    pub fn assert_is_valid(&self, data: Value) -> Result<Value> {
        if self.is_valid(&data)? {
            Ok(data)
        } else {
            Err(SchemaError::Validation(ValidationErrors::new(self.last_errors())))
        }
    }

    /// Validate, then narrow into `T`.
    pub fn assert_is_valid_as<T: DeserializeOwned>(&self, data: &Value) -> Result<T> {
        if !self.is_valid(data)? {
            return Err(SchemaError::Validation(ValidationErrors::new(self.last_errors())));
        }
        crate::path_de::from_value_with_path(data.clone())
    }

    /// Diagnostics of the most recent `is_valid`/`assert_is_valid*` call.
    pub fn last_errors(&self) -> Vec<Diagnostic> {
        self.last_errors.borrow().clone()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENTS
// ————————————————————————————————————————————————————————————————————————————

impl SchemaBuilder {
    fn target_schema(&self, target: &Target) -> Result<Schema> {
        match target {
            Target::Root => match self.require_root()? {
                Root::Definition(name) => self.target_schema(&Target::Definition(name.clone())),
                Root::Inline(schema) => Ok(schema.clone()),
            },
            Target::Definition(name) => self
                .defs
                .get(name)
                .cloned()
                .ok_or_else(|| SchemaError::UnknownDefinition { name: name.clone() }),
            Target::Schema(schema) => Ok(schema.clone()),
        }
    }

    /// A self-contained JSON document: the target schema's own fields plus
    /// every definition under `$defs`.
    pub fn serialize_with_defs(&self, target: Target) -> Result<Value> {
        let body = json::to_json(&self.target_schema(&target)?);
        let mut doc = match body {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("allOf".into(), Value::Array(vec![other]));
                map
            }
        };
        let defs: Map<String, Value> =
            self.defs.iter().map(|(k, v)| (k.to_string(), json::to_json(v))).collect();
        doc.insert(DEFS_KEY.into(), Value::Object(defs));
        Ok(Value::Object(doc))
    }

    /// Rebuild a builder from a serialized document. A top-level schema that
    /// is identical to one of the definitions becomes a definition root.
    pub fn from_document(doc: &Value) -> Result<Self> {
        let Value::Object(map) = doc else {
            return Err(SchemaError::parse("#", "a schema document must be an object"));
        };
        let mut rest = map.clone();
        let mut builder = Self::new();
        if let Some(defs) = rest.shift_remove(DEFS_KEY) {
            let Value::Object(defs) = defs else {
                return Err(SchemaError::parse("#/$defs", "must be an object"));
            };
            let mut batch = Vec::with_capacity(defs.len());
            for (name, value) in &defs {
                let schema = json::from_json(value).map_err(|e| match e {
                    SchemaError::Parse { path, reason } => SchemaError::Parse {
                        path: path.replacen('#', &format!("#/$defs/{name}"), 1),
                        reason,
                    },
                    other => other,
                })?;
                batch.push((name.clone(), schema));
            }
            builder.defs.insert_all(batch)?;
        }
        // Whatever is left is the root, even `{}` (a root accepting anything).
        let body = Value::Object(rest);
        let named = builder
            .defs
            .iter()
            .find(|(_, schema)| json::to_json(schema) == body)
            .map(|(name, _)| name.to_string());
        builder.root = Some(match named {
            Some(name) => Root::Definition(name),
            None => Root::Inline(json::from_json(&body)?),
        });
        Ok(builder)
    }

    /// Static type shape of the target and of every definition.
    pub fn reflect(&self, target: Target) -> Result<Reflection> {
        let root = self.target_schema(&target)?;
        lower::reflect(&self.defs, &root)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Annotate, NumberOptions, ObjectOptions, StringOptions};
    use serde_json::json;

    const SEMVER: &str = r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$";
    const PACKAGE_NAME: &str = r"^(?:@[a-z0-9\-*~][a-z0-9\-*._~]*/)?[a-z0-9\-~][a-z0-9\-._~]*$";

    fn package_builder() -> SchemaBuilder {
        let mut b = SchemaBuilder::new();
        b.add_definition("semver", Schema::regex(SEMVER, StringOptions::new().title("Semver")))
            .unwrap()
            .add_definition(
                "packageName",
                Schema::string(StringOptions::new().min_length(1).max_length(214).pattern(PACKAGE_NAME)),
            )
            .unwrap()
            .add_generated("packageFile", |b| {
                Schema::object(
                    [("name", b.def_ref("packageName")), ("version", b.def_ref("semver"))],
                    ObjectOptions::new(),
                )
            })
            .unwrap()
            .set_root("packageFile")
            .unwrap();
        b
    }

    #[test]
    fn end_to_end_package_file() {
        let b = package_builder();
        assert!(b.is_valid(&json!({"name": "my-pkg", "version": "1.2.3"})).unwrap());
        assert!(b.last_errors().is_empty());

        assert!(!b.is_valid(&json!({"name": "My Pkg!", "version": "1.2.3"})).unwrap());
        let errors = b.last_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path.to_string(), "name");
        assert_eq!(errors[0].keyword, "pattern");
    }

    #[test]
    fn duplicate_definition_leaves_builder_unchanged() {
        let mut b = package_builder();
        let before = b.definitions().clone();
        let err = b.add_definition("semver", Schema::boolean()).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateDefinition { name } if name == "semver"));
        let err = b
            .add_generated("semver", |_| panic!("generator must not run for a taken name"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateDefinition { .. }));
        assert_eq!(b.definitions(), &before);
    }

    #[test]
    fn bulk_add_is_atomic() {
        let mut b = package_builder();
        let err = b
            .add_definitions(Definitions::direct([
                ("fresh", Schema::boolean()),
                ("semver", Schema::null()),
            ]))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateDefinition { name } if name == "semver"));
        assert!(!b.has_definition("fresh"));
        assert!(b.find_definition("fresh").is_none());
        assert_eq!(b.find_definition("semver").map(Schema::kind_name), Some("string"));
        assert_eq!(b.definitions().len(), 3);
    }

    #[test]
    fn forward_reference_resolves_like_direct_one() {
        let mut b = SchemaBuilder::new();
        b.add_generated("a", |b| Ok(b.def_ref("b")))
            .unwrap()
            .add_definition("b", Schema::string(StringOptions::new()))
            .unwrap()
            .set_root("a")
            .unwrap();
        let mut direct = SchemaBuilder::new();
        direct
            .add_definition("b", Schema::string(StringOptions::new()))
            .unwrap()
            .set_root("b")
            .unwrap();
        for data in [json!("x"), json!(1), json!(null), json!({"b": "x"})] {
            assert_eq!(b.is_valid(&data).unwrap(), direct.is_valid(&data).unwrap());
            assert_eq!(b.last_errors(), direct.last_errors());
        }
    }

    #[test]
    fn unresolved_forward_reference_fails_at_compile() {
        let mut b = SchemaBuilder::new();
        b.add_generated("a", |b| Ok(b.def_ref("missing"))).unwrap().set_root("a").unwrap();
        assert!(matches!(b.is_valid(&json!(1)), Err(SchemaError::UnknownDefinition { name }) if name == "missing"));
    }

    #[test]
    fn operations_needing_a_root_fail_without_one() {
        let mut empty = SchemaBuilder::new();
        assert!(matches!(empty.compile_validator(&CompileOptions::default()), Err(SchemaError::NoRootDefined)));
        assert!(matches!(empty.assert_is_valid(json!({})), Err(SchemaError::NoRootDefined)));

        let mut rootless = SchemaBuilder::new();
        rootless.add_definition("a", Schema::boolean()).unwrap();
        assert!(rootless.root().is_none());
        assert!(matches!(rootless.compile_validator(&CompileOptions::default()), Err(SchemaError::NoRootDefined)));
        assert!(matches!(rootless.assert_is_valid(json!(true)), Err(SchemaError::NoRootDefined)));
        assert!(matches!(rootless.serialize_with_defs(Target::Root), Err(SchemaError::NoRootDefined)));
        assert!(rootless.serialize_with_defs(Target::Definition("a".into())).is_ok());
    }

    #[test]
    fn set_root_requires_existing_name() {
        let mut b = SchemaBuilder::new();
        assert!(matches!(b.set_root("nope"), Err(SchemaError::UnknownDefinition { .. })));
        assert!(b.root().is_none());
    }

    #[test]
    fn mutations_invalidate_cached_validator() {
        let mut b = SchemaBuilder::new();
        b.add_definition("strict", Schema::string(StringOptions::new())).unwrap().set_root("strict").unwrap();
        b.compile_validator(&CompileOptions::default()).unwrap();
        assert!(b.is_compiled());
        assert!(!b.is_valid(&json!(5)).unwrap());

        b.add_definition("relaxed", Schema::union([Schema::string(StringOptions::new()), Schema::number(NumberOptions::new())]))
            .unwrap();
        assert!(!b.is_compiled());
        b.set_root("relaxed").unwrap();
        assert!(b.is_valid(&json!(5)).unwrap());
        assert!(b.is_compiled());

        b.set_root_schema(Schema::boolean());
        assert!(!b.is_compiled());
        assert!(!b.is_valid(&json!(5)).unwrap());
    }

    #[test]
    fn explicit_compile_options_stick_until_invalidated() {
        let mut b = SchemaBuilder::new();
        b.add_definition("open", Schema::object([("a", Schema::boolean())], ObjectOptions::new()).unwrap())
            .unwrap()
            .set_root("open")
            .unwrap();
        let data = json!({"a": true, "b": 1});
        assert!(b.is_valid(&data).unwrap());
        b.compile_validator(&CompileOptions::new().deny_additional_properties()).unwrap();
        assert!(!b.is_valid(&data).unwrap());
        b.set_root("open").unwrap();
        assert!(b.is_valid(&data).unwrap());
    }

    #[test]
    fn assert_is_valid_returns_data_or_every_diagnostic() {
        let b = package_builder();
        let ok = json!({"name": "@scope/pkg", "version": "0.1.0-rc.1"});
        assert_eq!(b.assert_is_valid(ok.clone()).unwrap(), ok);

        let err = b.assert_is_valid(json!({"name": "", "version": "one"})).unwrap_err();
        let diags = err.diagnostics().unwrap();
        let paths: Vec<_> = diags.iter().map(|d| (d.path.to_string(), d.keyword)).collect();
        assert_eq!(
            paths,
            vec![
                ("name".to_string(), "minLength"),
                ("name".to_string(), "pattern"),
                ("version".to_string(), "pattern"),
            ]
        );
    }

    #[test]
    fn assert_is_valid_as_narrows_type() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct PackageFile {
            name: String,
            version: String,
        }
        let b = package_builder();
        let pkg: PackageFile = b.assert_is_valid_as(&json!({"name": "a", "version": "1.0.0"})).unwrap();
        assert_eq!(pkg, PackageFile { name: "a".into(), version: "1.0.0".into() });
        assert!(matches!(
            b.assert_is_valid_as::<PackageFile>(&json!({"name": "a"})),
            Err(SchemaError::Validation(_))
        ));
    }

    #[test]
    fn merged_library_is_an_independent_copy() {
        let mut lib = SchemaBuilder::new();
        lib.add_definition("shared", Schema::string(StringOptions::new())).unwrap();

        let mut app = SchemaBuilder::with_library(&lib);
        app.set_root("shared").unwrap();
        lib.add_definition("later", Schema::boolean()).unwrap();

        assert!(!app.has_definition("later"));
        assert!(app.is_valid(&json!("x")).unwrap());

        let mut other = SchemaBuilder::new();
        other.add_definitions(&lib).unwrap();
        assert_eq!(other.definition_names().collect::<Vec<_>>(), vec!["shared", "later"]);
        assert_eq!(other.len(), 2);
        assert!(other.add_definitions(&lib).is_err());
    }

    #[test]
    fn generators_and_many_libraries() {
        let mut semver = SchemaBuilder::new();
        semver.add_definition("semver", Schema::regex(SEMVER, StringOptions::new())).unwrap();

        let b = SchemaBuilder::create(&[&semver], |b| {
            b.add_definitions(Definitions::Many(vec![
                Definitions::direct([("flag", Schema::boolean())]),
                Definitions::generated(|b| {
                    let mut out = IndexMap::new();
                    out.insert("versions".to_string(), Schema::array(b.def_ref("semver"), Default::default()));
                    Ok(out)
                }),
            ]))?
            .set_root("versions")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(b.definitions().names().collect::<Vec<_>>(), vec!["semver", "flag", "versions"]);
        assert!(b.is_valid(&json!(["1.0.0", "2.0.0-beta.1"])).unwrap());
        assert!(!b.is_valid(&json!(["1.0"])).unwrap());
        assert_eq!(b.last_errors()[0].path.to_string(), "[0]");
    }

    #[test]
    fn using_returns_closure_result() {
        let mut b = SchemaBuilder::new();
        let count = b.using(|b| -> Result<usize> {
            b.add_definition("nums", Schema::literal_union([1, 2, 3]))?
                .add_definition("moreNums", Schema::array(Schema::number(NumberOptions::new()), Default::default()))?
                .add_generated("deeper", |b| {
                    Schema::object([("deepArray", Schema::array(b.def_ref("moreNums"), Default::default()))], ObjectOptions::new())
                })?;
            Ok(b.len())
        });
        assert_eq!(count.unwrap(), 3);
    }

    #[test]
    fn serialized_document_is_self_contained() {
        let b = package_builder();
        let doc = b.serialize_with_defs(Target::Root).unwrap();
        assert_eq!(doc["type"], json!("object"));
        assert_eq!(doc["properties"]["name"], json!({"$ref": "#/$defs/packageName"}));
        assert_eq!(doc["$defs"]["semver"]["title"], json!("Semver"));
        let keys: Vec<_> = doc["$defs"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["semver", "packageName", "packageFile"]);

        let back = SchemaBuilder::from_document(&doc).unwrap();
        assert_eq!(back.definitions(), b.definitions());
        assert_eq!(back.root(), Some(&Root::Definition("packageFile".into())));

        let inline = b.serialize_with_defs(Target::Schema(Schema::array(b.def_ref("semver"), Default::default()).title("Versions"))).unwrap();
        let back = SchemaBuilder::from_document(&inline).unwrap();
        assert!(matches!(back.root(), Some(Root::Inline(_))));
        assert!(back.is_valid(&json!(["1.2.3"])).unwrap());
    }

    #[test]
    fn accept_anything_root_survives_reload() {
        let mut b = SchemaBuilder::new();
        b.add_definition("semver", Schema::regex(r"^\d+\.\d+\.\d+$", StringOptions::new())).unwrap();
        b.set_root_schema(Schema::any());
        let doc = b.serialize_with_defs(Target::Root).unwrap();
        assert_eq!(doc.as_object().unwrap().len(), 1);

        let back = SchemaBuilder::from_document(&doc).unwrap();
        assert_eq!(back.root(), Some(&Root::Inline(Schema::any())));
        assert!(back.is_valid(&json!({"anything": [1, "two"]})).unwrap());

        let mut named = SchemaBuilder::new();
        named.add_definition("anything", Schema::any()).unwrap().set_root("anything").unwrap();
        let back = SchemaBuilder::from_document(&named.serialize_with_defs(Target::Root).unwrap()).unwrap();
        assert_eq!(back.root(), Some(&Root::Definition("anything".into())));
    }

    #[test]
    fn recompiling_clears_last_errors() {
        let mut b = package_builder();
        assert!(!b.is_valid(&json!({"name": "a"})).unwrap());
        assert!(!b.last_errors().is_empty());
        b.compile_validator(&CompileOptions::new().strict()).unwrap();
        assert!(b.last_errors().is_empty());
    }

    #[test]
    fn root_schema_embeds_into_another_builder() {
        let store = package_builder();
        let mut config = SchemaBuilder::with_library(&store);
        let embedded = store.root_schema().unwrap();
        config
            .add_definition("config", Schema::intersect([embedded, Schema::object([("private", Schema::optional(Schema::boolean()))], ObjectOptions::new()).unwrap()]))
            .unwrap()
            .set_root("config")
            .unwrap();
        assert!(config.is_valid(&json!({"name": "a", "version": "1.0.0", "private": true})).unwrap());
        assert!(!config.is_valid(&json!({"name": "a", "version": "1.0.0", "private": "yes"})).unwrap());
    }
}
