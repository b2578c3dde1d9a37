//! # Compiled validation
//!
//! A [`CompiledValidator`] is built from a definition store plus a root. Each
//! definition gets a slot in an arena of nodes; references compile to slot
//! indices, so forward and mutually recursive definitions need nothing
//! special once every name resolves. Compilation is also where malformed
//! constraints, unknown formats/keywords (strict mode) and reference cycles
//! that never consume input are rejected.
//!
//! Validation walks the arena against a `serde_json::Value`, collecting every
//! failure as a [`Diagnostic`] (instance path, keyword, expectation, actual
//! value) rather than stopping at the first one.

use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::builder::Root;
use crate::defs::DefinitionStore;
use crate::error::{Result, SchemaError, ValidationErrors};
use crate::formats::{FormatCheck, FormatRegistry};
use crate::keywords::{self, KeywordRegistry, KeywordValue};
use crate::schema::{Kind, NumberRules, Schema};

// ————————————————————————————————————————————————————————————————————————————
// OPTIONS
// ————————————————————————————————————————————————————————————————————————————

/// Policy for object keys that no property declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdditionalProperties {
    #[default]
    Allow,
    Deny,
}

/// Per-compile configuration. Nothing is registered globally: two builders
/// can compile the same schemas with different keywords and formats.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Applies to objects that don't set `additional_properties` themselves.
    pub additional_properties: AdditionalProperties,
    /// Unknown annotation keywords and unknown formats become errors.
    pub strict: bool,
    pub keywords: KeywordRegistry,
    pub formats: FormatRegistry,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn deny_additional_properties(mut self) -> Self {
        self.additional_properties = AdditionalProperties::Deny;
        self
    }

    pub fn with_keyword(mut self, name: impl Into<String>, value: KeywordValue) -> Self {
        self.keywords = self.keywords.register(name, value);
        self
    }

    pub fn with_format(mut self, name: impl Into<String>, check: FormatCheck) -> Self {
        self.formats = self.formats.register(name, check);
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DIAGNOSTICS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location inside the validated instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstancePath(Vec<PathSegment>);

impl InstancePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// RFC 6901 pointer, e.g. `/stores/0/path`.
    pub fn pointer(&self) -> String {
        let mut out = String::new();
        for seg in &self.0 {
            out.push('/');
            match seg {
                PathSegment::Key(k) => out.push_str(&k.replace('~', "~0").replace('/', "~1")),
                PathSegment::Index(i) => out.push_str(&i.to_string()),
            }
        }
        out
    }

    fn push_key(&mut self, key: &str) {
        self.0.push(PathSegment::Key(key.to_string()));
    }

    fn push_index(&mut self, i: usize) {
        self.0.push(PathSegment::Index(i));
    }

    fn pop(&mut self) {
        self.0.pop();
    }
}

/// Dotted form: `stores[0].path`; empty for the root.
impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                PathSegment::Key(k) if i == 0 => write!(f, "{k}")?,
                PathSegment::Key(k) => write!(f, ".{k}")?,
                PathSegment::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

/// One validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub path: InstancePath,
    /// Keyword that failed (`type`, `pattern`, `required`, `anyOf`, ...).
    pub keyword: &'static str,
    /// Human-readable form of the constraint.
    pub expected: String,
    /// The offending value; `None` when it is missing altogether.
    pub actual: Option<Value>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "(root)")?;
        } else {
            write!(f, "{}", self.path)?;
        }
        write!(f, ": expected {} [{}], found {}", self.expected, self.keyword, describe(self.actual.as_ref()))
    }
}

fn describe(v: Option<&Value>) -> String {
    match v {
        None => "nothing".to_string(),
        Some(Value::Object(m)) => format!("object with {} key(s)", m.len()),
        Some(Value::Array(xs)) => format!("array of {} item(s)", xs.len()),
        Some(other) => other.to_string(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NODES
// ————————————————————————————————————————————————————————————————————————————

type NodeId = usize;

#[derive(Debug, Clone)]
enum Node {
    Any,
    Null,
    Boolean,
    String {
        min_length: Option<u64>,
        max_length: Option<u64>,
        pattern: Option<Regex>,
        format: Option<(String, FormatCheck)>,
    },
    Number {
        integer: bool,
        rules: NumberRules,
    },
    Object {
        properties: Vec<(String, NodeId, bool)>,
        additional: bool,
    },
    Array {
        items: NodeId,
        min_items: Option<u64>,
        max_items: Option<u64>,
        unique: bool,
    },
    Union(Vec<NodeId>),
    Intersection(Vec<NodeId>),
    Literals(Vec<Value>),
    Ref(NodeId),
}

/// Store + root compiled into a reusable validation function.
#[derive(Debug, Clone)]
pub struct CompiledValidator {
    nodes: Vec<Node>,
    /// Definition name → arena slot. Slots `0..defs.len()` are definitions.
    defs: IndexMap<String, NodeId>,
    root: NodeId,
    root_name: Option<String>,
    options: CompileOptions,
}

impl CompiledValidator {
    pub fn compile(store: &DefinitionStore, root: &Root, options: &CompileOptions) -> Result<Self> {
        let root_schema = match root {
            Root::Definition(name) => {
                if !store.contains(name) {
                    return Err(SchemaError::UnknownDefinition { name: name.clone() });
                }
                None
            }
            Root::Inline(schema) => Some(schema),
        };
        let extra: Vec<&Schema> = root_schema.into_iter().collect();
        if let Some(name) = store.dangling(&extra).first() {
            return Err(SchemaError::UnknownDefinition { name: name.to_string() });
        }

        let defs: IndexMap<String, NodeId> =
            store.names().enumerate().map(|(i, n)| (n.to_string(), i)).collect();
        let mut compiler = Compiler {
            nodes: vec![Node::Any; defs.len()],
            defs: &defs,
            options,
        };
        for (slot, (name, schema)) in store.iter().enumerate() {
            let node = compiler.node(schema, &format!("#/$defs/{name}"))?;
            compiler.nodes[slot] = node;
        }
        let (root, root_name) = match root {
            Root::Definition(name) => {
                let slot = defs
                    .get(name)
                    .copied()
                    .ok_or_else(|| SchemaError::UnknownDefinition { name: name.clone() })?;
                (slot, Some(name.clone()))
            }
            Root::Inline(schema) => (compiler.push(schema, "#")?, None),
        };
        let nodes = compiler.nodes;
        check_guarded(&nodes, &defs)?;

        tracing::debug!(
            definitions = defs.len(),
            nodes = nodes.len(),
            root = root_name.as_deref().unwrap_or("<inline>"),
            "compiled validator"
        );
        Ok(Self { nodes, defs, root, root_name, options: options.clone() })
    }

    pub fn root_name(&self) -> Option<&str> {
        self.root_name.as_deref()
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn definition_names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    pub fn is_valid(&self, data: &Value) -> bool {
        self.diagnostics(data).is_empty()
    }

    /// Every failure of `data` against the root, in schema order.
    pub fn diagnostics(&self, data: &Value) -> Vec<Diagnostic> {
        self.run(self.root, data)
    }

    pub fn validate(&self, data: &Value) -> std::result::Result<(), ValidationErrors> {
        into_result(self.diagnostics(data))
    }

    /// Validate against a single definition instead of the root.
    pub fn validate_definition(&self, name: &str, data: &Value) -> Result<()> {
        let slot = *self
            .defs
            .get(name)
            .ok_or_else(|| SchemaError::UnknownDefinition { name: name.to_string() })?;
        into_result(self.run(slot, data)).map_err(SchemaError::Validation)
    }

    fn run(&self, id: NodeId, data: &Value) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        let mut path = InstancePath::root();
        self.check(id, data, &mut path, &mut out);
        out
    }

    fn check(&self, id: NodeId, v: &Value, path: &mut InstancePath, out: &mut Vec<Diagnostic>) {
        let mut fail = |keyword: &'static str, expected: String, path: &InstancePath| {
            out.push(Diagnostic { path: path.clone(), keyword, expected, actual: Some(v.clone()) });
        };
        match &self.nodes[id] {
            Node::Any => {}
            Node::Null => {
                if !v.is_null() {
                    fail("type", "null".into(), path);
                }
            }
            Node::Boolean => {
                if !v.is_boolean() {
                    fail("type", "boolean".into(), path);
                }
            }
            Node::String { min_length, max_length, pattern, format } => {
                let Some(s) = v.as_str() else {
                    return fail("type", "string".into(), path);
                };
                let len = s.chars().count() as u64;
                if let Some(n) = min_length.filter(|n| len < *n) {
                    fail("minLength", format!("at least {n} character(s)"), path);
                }
                if let Some(n) = max_length.filter(|n| len > *n) {
                    fail("maxLength", format!("at most {n} character(s)"), path);
                }
                if let Some(rx) = pattern.as_ref().filter(|rx| !rx.is_match(s)) {
                    fail("pattern", format!("string matching /{}/", rx.as_str()), path);
                }
                if let Some((name, check)) = format {
                    if !check(s) {
                        fail("format", format!("{name} format"), path);
                    }
                }
            }
            Node::Number { integer, rules } => {
                let Some(x) = v.as_f64() else {
                    let ty = if *integer { "integer" } else { "number" };
                    return fail("type", ty.into(), path);
                };
                if *integer && !(v.is_i64() || v.is_u64() || x.fract() == 0.0) {
                    return fail("type", "integer".into(), path);
                }
                check_number(rules, x, v.as_i64(), &mut |kw, expected| fail(kw, expected, path));
            }
            Node::Object { properties, additional } => {
                let Some(map) = v.as_object() else {
                    return fail("type", "object".into(), path);
                };
                for (name, node, required) in properties {
                    path.push_key(name);
                    match map.get(name) {
                        Some(child) => self.check(*node, child, path, out),
                        None if *required => out.push(Diagnostic {
                            path: path.clone(),
                            keyword: "required",
                            expected: "required property".into(),
                            actual: None,
                        }),
                        None => {}
                    }
                    path.pop();
                }
                if !additional {
                    for key in map.keys() {
                        if !properties.iter().any(|(name, ..)| name == key) {
                            path.push_key(key);
                            out.push(Diagnostic {
                                path: path.clone(),
                                keyword: "additionalProperties",
                                expected: "no undeclared properties".into(),
                                actual: Some(map[key].clone()),
                            });
                            path.pop();
                        }
                    }
                }
            }
            Node::Array { items, min_items, max_items, unique } => {
                let Some(xs) = v.as_array() else {
                    return fail("type", "array".into(), path);
                };
                let len = xs.len() as u64;
                if let Some(n) = min_items.filter(|n| len < *n) {
                    fail("minItems", format!("at least {n} item(s)"), path);
                }
                if let Some(n) = max_items.filter(|n| len > *n) {
                    fail("maxItems", format!("at most {n} item(s)"), path);
                }
                if *unique && has_duplicates(xs) {
                    fail("uniqueItems", "unique items".into(), path);
                }
                for (i, x) in xs.iter().enumerate() {
                    path.push_index(i);
                    self.check(*items, x, path, out);
                    path.pop();
                }
            }
            Node::Union(members) => {
                let mut nested = Vec::new();
                for m in members {
                    let before = nested.len();
                    self.check(*m, v, path, &mut nested);
                    if nested.len() == before {
                        return;
                    }
                }
                out.push(Diagnostic {
                    path: path.clone(),
                    keyword: "anyOf",
                    expected: format!("a match for at least one of {} schemas", members.len()),
                    actual: Some(v.clone()),
                });
                out.extend(nested);
            }
            Node::Intersection(members) => {
                for m in members {
                    self.check(*m, v, path, out);
                }
            }
            Node::Literals(values) => {
                if !values.iter().any(|lit| json_eq(lit, v)) {
                    let list = values.iter().map(Value::to_string).collect::<Vec<_>>().join(", ");
                    fail("enum", format!("one of [{list}]"), path);
                }
            }
            Node::Ref(target) => self.check(*target, v, path, out),
        }
    }
}

fn into_result(diags: Vec<Diagnostic>) -> std::result::Result<(), ValidationErrors> {
    if diags.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors::new(diags))
    }
}

fn check_number(rules: &NumberRules, x: f64, exact: Option<i64>, fail: &mut dyn FnMut(&'static str, String)) {
    if let Some(n) = rules.minimum.filter(|n| x < *n) {
        fail("minimum", format!(">= {n}"));
    }
    if let Some(n) = rules.maximum.filter(|n| x > *n) {
        fail("maximum", format!("<= {n}"));
    }
    if let Some(n) = rules.exclusive_minimum.filter(|n| x <= *n) {
        fail("exclusiveMinimum", format!("> {n}"));
    }
    if let Some(n) = rules.exclusive_maximum.filter(|n| x >= *n) {
        fail("exclusiveMaximum", format!("< {n}"));
    }
    if let Some(m) = rules.multiple_of.filter(|m| !is_multiple(x, exact, *m)) {
        fail("multipleOf", format!("a multiple of {m}"));
    }
}

// Exact for integer data and an integral divisor; otherwise the remainder is
// compared against a tolerance scaled to `m`.
fn is_multiple(x: f64, exact: Option<i64>, m: f64) -> bool {
    if m.fract() == 0.0 && m.abs() < 9.0e18 {
        let m = m as i64;
        if let Some(x) = exact {
            return m == 0 || x % m == 0;
        }
        if x.fract() != 0.0 {
            return false;
        }
    }
    let r = (x % m).abs();
    let eps = m.abs() * 1e-9;
    r <= eps || (m.abs() - r) <= eps
}

/// JSON equality where numbers compare by value (`1 == 1.0`).
pub(crate) fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm.iter().all(|(k, x)| ym.get(k).is_some_and(|y| json_eq(x, y)))
        }
        _ => a == b,
    }
}

fn has_duplicates(xs: &[Value]) -> bool {
    xs.iter()
        .enumerate()
        .any(|(i, x)| xs[i + 1..].iter().any(|y| json_eq(x, y)))
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILER
// ————————————————————————————————————————————————————————————————————————————

struct Compiler<'a> {
    nodes: Vec<Node>,
    defs: &'a IndexMap<String, NodeId>,
    options: &'a CompileOptions,
}

impl Compiler<'_> {
    fn push(&mut self, schema: &Schema, path: &str) -> Result<NodeId> {
        let node = self.node(schema, path)?;
        self.nodes.push(node);
        Ok(self.nodes.len() - 1)
    }

    fn node(&mut self, schema: &Schema, path: &str) -> Result<Node> {
        for (key, value) in &schema.annotations().extra {
            if keywords::is_reserved(key) {
                return Err(SchemaError::invalid(path, format!("'{key}' cannot be an annotation")));
            }
            self.options.keywords.check(key, value, self.options.strict)?;
        }

        let node = match schema.kind() {
            Kind::Any => Node::Any,
            Kind::Null => Node::Null,
            Kind::Boolean => Node::Boolean,
            Kind::String(rules) => {
                if let (Some(lo), Some(hi)) = (rules.min_length, rules.max_length) {
                    if lo > hi {
                        return Err(SchemaError::invalid(path, format!("minLength {lo} exceeds maxLength {hi}")));
                    }
                }
                let pattern = match &rules.pattern {
                    Some(rx) => Some(
                        Regex::new(rx)
                            .map_err(|e| SchemaError::invalid(path, format!("bad pattern: {e}")))?,
                    ),
                    None => None,
                };
                let format = match &rules.format {
                    Some(name) => match self.options.formats.get(name) {
                        Some(check) => Some((name.clone(), check)),
                        None if self.options.strict => {
                            return Err(SchemaError::UnknownFormat { format: name.clone() });
                        }
                        None => {
                            tracing::debug!(format = %name, path, "ignoring unknown format");
                            None
                        }
                    },
                    None => None,
                };
                Node::String {
                    min_length: rules.min_length,
                    max_length: rules.max_length,
                    pattern,
                    format,
                }
            }
            Kind::Number(rules) | Kind::Integer(rules) => {
                check_number_rules(rules, path)?;
                Node::Number {
                    integer: matches!(schema.kind(), Kind::Integer(_)),
                    rules: rules.clone(),
                }
            }
            Kind::Object(obj) => {
                let mut properties = Vec::with_capacity(obj.properties.len());
                for (name, prop) in &obj.properties {
                    let id = self.push(&prop.schema, &format!("{path}/properties/{name}"))?;
                    properties.push((name.clone(), id, prop.required));
                }
                let additional = obj.additional_properties.unwrap_or(
                    self.options.additional_properties == AdditionalProperties::Allow,
                );
                Node::Object { properties, additional }
            }
            Kind::Array(arr) => {
                if let (Some(lo), Some(hi)) = (arr.min_items, arr.max_items) {
                    if lo > hi {
                        return Err(SchemaError::invalid(path, format!("minItems {lo} exceeds maxItems {hi}")));
                    }
                }
                let items = self.push(&arr.items, &format!("{path}/items"))?;
                Node::Array {
                    items,
                    min_items: arr.min_items,
                    max_items: arr.max_items,
                    unique: arr.unique_items,
                }
            }
            Kind::Union(members) => Node::Union(self.members(members, &format!("{path}/anyOf"))?),
            Kind::Intersection(members) => {
                Node::Intersection(self.members(members, &format!("{path}/allOf"))?)
            }
            Kind::LiteralUnion(values) => {
                if values.is_empty() {
                    return Err(SchemaError::invalid(path, "literal union has no values"));
                }
                if let Some(bad) = values.iter().find(|v| v.is_array() || v.is_object()) {
                    return Err(SchemaError::invalid(path, format!("literal {bad} is not a primitive")));
                }
                Node::Literals(values.clone())
            }
            Kind::Reference(name) => {
                let slot = self
                    .defs
                    .get(name)
                    .ok_or_else(|| SchemaError::UnknownDefinition { name: name.clone() })?;
                Node::Ref(*slot)
            }
        };
        Ok(node)
    }

    fn members(&mut self, members: &[Schema], path: &str) -> Result<Vec<NodeId>> {
        if members.is_empty() {
            return Err(SchemaError::invalid(path, "needs at least one member"));
        }
        members
            .iter()
            .enumerate()
            .map(|(i, m)| self.push(m, &format!("{path}/{i}")))
            .collect()
    }
}

fn check_number_rules(rules: &NumberRules, path: &str) -> Result<()> {
    if let (Some(lo), Some(hi)) = (rules.minimum, rules.maximum) {
        if lo > hi {
            return Err(SchemaError::invalid(path, format!("minimum {lo} exceeds maximum {hi}")));
        }
    }
    if let Some(m) = rules.multiple_of {
        if !(m.is_finite() && m > 0.0) {
            return Err(SchemaError::invalid(path, format!("multipleOf must be positive, got {m}")));
        }
    }
    Ok(())
}

/// Reject cycles that pass only through references, unions and
/// intersections: validating them would recurse without consuming input.
/// Object properties and array items are guarded edges.
fn check_guarded(nodes: &[Node], defs: &IndexMap<String, NodeId>) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark { Fresh, Active, Done }

    fn visit(
        id: NodeId,
        nodes: &[Node],
        marks: &mut [Mark],
        stack: &mut Vec<NodeId>,
    ) -> std::result::Result<(), Vec<NodeId>> {
        match marks[id] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                let start = stack.iter().position(|n| *n == id).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(id);
                return Err(cycle);
            }
            Mark::Fresh => {}
        }
        marks[id] = Mark::Active;
        stack.push(id);
        let next: &[NodeId] = match &nodes[id] {
            Node::Ref(t) => std::slice::from_ref(t),
            Node::Union(ms) | Node::Intersection(ms) => ms,
            _ => &[],
        };
        for n in next {
            visit(*n, nodes, marks, stack)?;
        }
        stack.pop();
        marks[id] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Fresh; nodes.len()];
    for id in 0..nodes.len() {
        let mut stack = Vec::new();
        if let Err(cycle) = visit(id, nodes, &mut marks, &mut stack) {
            let names: Vec<&str> = defs.keys().map(String::as_str).collect();
            let chain = cycle
                .into_iter()
                .filter_map(|n| names.get(n).map(|s| s.to_string()))
                .collect();
            return Err(SchemaError::CyclicReference { chain });
        }
    }
    Ok(())
}

// ------------------------------- Tests ------------------------------------ //
