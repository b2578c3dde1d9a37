//! Schema values: the immutable IR every other module works on.
//!
//! A [`Schema`] is a kind (with its kind-specific constraints) plus an open
//! bag of [`Annotations`]. Nothing here ever mutates a value in place; the
//! constructors and the [`Annotate`] helpers consume and return new values.
//!
//! Constraint sanity (e.g. `min_length > max_length`, an invalid regex) is not
//! checked here. Those are rejected when a validator is compiled.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::keywords;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    kind: Kind,
    annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    String(StringRules),
    Number(NumberRules),
    Integer(NumberRules),
    Boolean,
    Null,
    /// Accepts any JSON value.
    Any,
    Object(ObjectRules),
    Array(ArrayRules),
    /// At least one member must match.
    Union(Vec<Schema>),
    /// Every member must match the same data.
    Intersection(Vec<Schema>),
    /// Exactly one of these JSON literals.
    LiteralUnion(Vec<Value>),
    /// Name of a definition in the owning store.
    Reference(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringRules {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumberRules {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectRules {
    /// Declaration order is kept: error ordering and downstream type
    /// synthesis both depend on it.
    pub properties: IndexMap<String, Property>,
    /// `None` defers to the compile-time default.
    pub additional_properties: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayRules {
    pub items: Box<Schema>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
}

/// An object property: its schema and whether it must be present.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub schema: Schema,
    pub required: bool,
}

/// Metadata that never changes what validates.
///
/// `extra` holds any key the typed fields don't cover, verbatim and in
/// insertion order (presentation hints, editor extensions, ...).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotations {
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub examples: Vec<Value>,
    pub extra: IndexMap<String, Value>,
}

// ————————————————————————————————————————————————————————————————————————————
// OPTIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default)]
pub struct StringOptions {
    pub rules: StringRules,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default)]
pub struct NumberOptions {
    pub rules: NumberRules,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectOptions {
    pub additional_properties: Option<bool>,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default)]
pub struct ArrayOptions {
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub annotations: Annotations,
}

impl StringOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_length(mut self, n: u64) -> Self {
        self.rules.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: u64) -> Self {
        self.rules.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, rx: impl Into<String>) -> Self {
        self.rules.pattern = Some(rx.into());
        self
    }

    pub fn format(mut self, name: impl Into<String>) -> Self {
        self.rules.format = Some(name.into());
        self
    }
}

impl NumberOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minimum(mut self, n: f64) -> Self {
        self.rules.minimum = Some(n);
        self
    }

    pub fn maximum(mut self, n: f64) -> Self {
        self.rules.maximum = Some(n);
        self
    }

    pub fn exclusive_minimum(mut self, n: f64) -> Self {
        self.rules.exclusive_minimum = Some(n);
        self
    }

    pub fn exclusive_maximum(mut self, n: f64) -> Self {
        self.rules.exclusive_maximum = Some(n);
        self
    }

    pub fn multiple_of(mut self, n: f64) -> Self {
        self.rules.multiple_of = Some(n);
        self
    }
}

impl ObjectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = Some(allowed);
        self
    }
}

impl ArrayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_items(mut self, n: u64) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: u64) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn unique_items(mut self) -> Self {
        self.unique_items = true;
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ANNOTATIONS
// ————————————————————————————————————————————————————————————————————————————

/// Fluent annotation setters shared by schemas and every options struct.
pub trait Annotate: Sized {
    fn annotations_mut(&mut self) -> &mut Annotations;

    fn title(mut self, title: impl Into<String>) -> Self {
        self.annotations_mut().title = Some(title.into());
        self
    }

    fn description(mut self, description: impl Into<String>) -> Self {
        self.annotations_mut().description = Some(description.into());
        self
    }

    fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.annotations_mut().default = Some(value.into());
        self
    }

    fn example(mut self, value: impl Into<Value>) -> Self {
        self.annotations_mut().examples.push(value.into());
        self
    }

    /// Attach an arbitrary annotation key. A validation keyword (`minLength`,
    /// `enum`, `$ref`, ...) is dropped with a warning; use [`Annotate::try_with`]
    /// to get the error instead.
    fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Err(error) = self.annotations_mut().insert(key.into(), value.into()) {
            tracing::warn!(%error, "annotation ignored");
        }
        self
    }

    /// Like [`Annotate::with`], but a validation keyword is an error.
    fn try_with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        self.annotations_mut().insert(key.into(), value.into())?;
        Ok(self)
    }
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route well-known keys into their typed slot, everything else into
    /// `extra`. Validation keywords are refused.
    pub fn insert(&mut self, key: String, value: Value) -> Result<()> {
        if keywords::is_reserved(&key) {
            return Err(SchemaError::ReservedAnnotation { key });
        }
        match (key.as_str(), value) {
            ("title", Value::String(s)) => self.title = Some(s),
            ("description", Value::String(s)) => self.description = Some(s),
            ("default", v) => self.default = Some(v),
            ("examples", Value::Array(xs)) => self.examples = xs,
            (_, v) => {
                self.extra.insert(key, v);
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.default.is_none()
            && self.examples.is_empty()
            && self.extra.is_empty()
    }

    /// Every annotation as `(key, value)` pairs, typed slots first.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        if let Some(t) = &self.title {
            out.push(("title".to_string(), Value::from(t.clone())));
        }
        if let Some(d) = &self.description {
            out.push(("description".to_string(), Value::from(d.clone())));
        }
        if let Some(v) = &self.default {
            out.push(("default".to_string(), v.clone()));
        }
        if !self.examples.is_empty() {
            out.push(("examples".to_string(), Value::Array(self.examples.clone())));
        }
        for (k, v) in &self.extra {
            out.push((k.clone(), v.clone()));
        }
        out
    }
}

impl Annotate for Annotations {
    fn annotations_mut(&mut self) -> &mut Annotations {
        self
    }
}

impl Annotate for Schema {
    fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}

impl Annotate for StringOptions {
    fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}

impl Annotate for NumberOptions {
    fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}

impl Annotate for ObjectOptions {
    fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}

impl Annotate for ArrayOptions {
    fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    pub fn new(kind: Kind, annotations: Annotations) -> Self {
        Self { kind, annotations }
    }

    pub fn string(options: StringOptions) -> Self {
        Self::new(Kind::String(options.rules), options.annotations)
    }

    /// A string that must match `pattern`.
    pub fn regex(pattern: impl Into<String>, options: StringOptions) -> Self {
        Self::string(options.pattern(pattern))
    }

    pub fn number(options: NumberOptions) -> Self {
        Self::new(Kind::Number(options.rules), options.annotations)
    }

    pub fn integer(options: NumberOptions) -> Self {
        Self::new(Kind::Integer(options.rules), options.annotations)
    }

    pub fn boolean() -> Self {
        Self::new(Kind::Boolean, Annotations::default())
    }

    pub fn null() -> Self {
        Self::new(Kind::Null, Annotations::default())
    }

    pub fn any() -> Self {
        Self::new(Kind::Any, Annotations::default())
    }

    /// Object with properties in the given order. Plain schemas become
    /// required properties; wrap with [`Schema::optional`] otherwise.
    ///
    /// Fails fast with `DuplicateProperty` when a name repeats.
    pub fn object<K, P, I>(properties: I, options: ObjectOptions) -> Result<Self>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<Property>,
    {
        let mut map = IndexMap::new();
        for (name, prop) in properties {
            let name = name.into();
            if map.contains_key(&name) {
                return Err(SchemaError::DuplicateProperty { name });
            }
            map.insert(name, prop.into());
        }
        let rules = ObjectRules {
            properties: map,
            additional_properties: options.additional_properties,
        };
        Ok(Self::new(Kind::Object(rules), options.annotations))
    }

    pub fn array(items: Schema, options: ArrayOptions) -> Self {
        let rules = ArrayRules {
            items: Box::new(items),
            min_items: options.min_items,
            max_items: options.max_items,
            unique_items: options.unique_items,
        };
        Self::new(Kind::Array(rules), options.annotations)
    }

    pub fn union(members: impl IntoIterator<Item = Schema>) -> Self {
        Self::new(Kind::Union(members.into_iter().collect()), Annotations::default())
    }

    pub fn intersect(members: impl IntoIterator<Item = Schema>) -> Self {
        Self::new(Kind::Intersection(members.into_iter().collect()), Annotations::default())
    }

    pub fn literal_union<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::new(Kind::LiteralUnion(values), Annotations::default())
    }

    /// Mark an object property as not required.
    pub fn optional(schema: Schema) -> Property {
        Property::optional(schema)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(Kind::Reference(name.into()), Annotations::default())
    }

    // -------------------------------- Access -------------------------------- //

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn reference_target(&self) -> Option<&str> {
        match &self.kind {
            Kind::Reference(name) => Some(name),
            _ => None,
        }
    }

    /// Short kind label used in diagnostics and logs.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Names of every definition this schema references, in first-seen
    /// order, without descending into the referenced definitions.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_refs(self, &mut out);
        out
    }
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::String(_) => "string",
            Kind::Number(_) => "number",
            Kind::Integer(_) => "integer",
            Kind::Boolean => "boolean",
            Kind::Null => "null",
            Kind::Any => "any",
            Kind::Object(_) => "object",
            Kind::Array(_) => "array",
            Kind::Union(_) => "union",
            Kind::Intersection(_) => "intersection",
            Kind::LiteralUnion(_) => "literalUnion",
            Kind::Reference(_) => "reference",
        }
    }
}

fn collect_refs<'a>(schema: &'a Schema, out: &mut Vec<&'a str>) {
    match &schema.kind {
        Kind::Reference(name) => {
            if !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        Kind::Object(obj) => {
            for prop in obj.properties.values() {
                collect_refs(&prop.schema, out);
            }
        }
        Kind::Array(arr) => collect_refs(&arr.items, out),
        Kind::Union(members) | Kind::Intersection(members) => {
            for m in members {
                collect_refs(m, out);
            }
        }
        _ => {}
    }
}

impl Property {
    pub fn required(schema: Schema) -> Self {
        Self { schema, required: true }
    }

    pub fn optional(schema: Schema) -> Self {
        Self { schema, required: false }
    }
}

impl From<Schema> for Property {
    fn from(schema: Schema) -> Self {
        Property::required(schema)
    }
}

// ------------------------------- Tests ------------------------------------ //
