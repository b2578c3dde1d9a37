//! JSON-Schema-shaped form of a [`Schema`].
//!
//! Emission mirrors the kind mapping external JSON-Schema tools expect
//! (`anyOf`, `allOf`, `enum`, `$ref: "#/$defs/<name>"`). Parsing accepts the
//! same shape back so a serialized document can be re-read losslessly.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::error::{Result, SchemaError};
use crate::keywords;
use crate::schema::{
    Annotations, ArrayRules, Kind, NumberRules, ObjectRules, Property, Schema, StringRules,
};

/// Where local definitions live in a serialized document.
pub const DEFS_KEY: &str = "$defs";
pub const REF_PREFIX: &str = "#/$defs/";

pub fn ref_pointer(name: &str) -> String {
    format!("{REF_PREFIX}{name}")
}

// ————————————————————————————————————————————————————————————————————————————
// EMISSION
// ————————————————————————————————————————————————————————————————————————————

pub fn to_json(schema: &Schema) -> Value {
    let mut o = match schema.kind() {
        Kind::String(rules) => {
            let mut o = json!({ "type": "string" });
            if let Some(n) = rules.min_length {
                o["minLength"] = Value::from(n);
            }
            if let Some(n) = rules.max_length {
                o["maxLength"] = Value::from(n);
            }
            if let Some(rx) = &rules.pattern {
                o["pattern"] = Value::from(rx.clone());
            }
            if let Some(f) = &rules.format {
                o["format"] = Value::from(f.clone());
            }
            o
        }
        Kind::Number(rules) => number_json("number", rules),
        Kind::Integer(rules) => number_json("integer", rules),
        Kind::Boolean => json!({ "type": "boolean" }),
        Kind::Null => json!({ "type": "null" }),
        Kind::Any => json!({}),
        Kind::Object(obj) => {
            let mut props = Map::new();
            let mut required: Vec<Value> = Vec::new();
            for (name, prop) in &obj.properties {
                props.insert(name.clone(), to_json(&prop.schema));
                if prop.required {
                    required.push(Value::from(name.clone()));
                }
            }
            let mut o = json!({ "type": "object", "properties": props });
            if !required.is_empty() {
                o["required"] = Value::Array(required);
            }
            if let Some(allowed) = obj.additional_properties {
                o["additionalProperties"] = Value::from(allowed);
            }
            o
        }
        Kind::Array(arr) => {
            let mut o = json!({ "type": "array", "items": to_json(&arr.items) });
            if let Some(n) = arr.min_items {
                o["minItems"] = Value::from(n);
            }
            if let Some(n) = arr.max_items {
                o["maxItems"] = Value::from(n);
            }
            if arr.unique_items {
                o["uniqueItems"] = Value::from(true);
            }
            o
        }
        Kind::Union(members) => json!({ "anyOf": members.iter().map(to_json).collect::<Vec<_>>() }),
        Kind::Intersection(members) => {
            json!({ "allOf": members.iter().map(to_json).collect::<Vec<_>>() })
        }
        Kind::LiteralUnion(values) => json!({ "enum": values }),
        Kind::Reference(name) => json!({ "$ref": ref_pointer(name) }),
    };

    // Validation keywords never come from annotations, even ones placed
    // straight into `extra`.
    if let Value::Object(map) = &mut o {
        for (k, v) in schema.annotations().entries() {
            if !keywords::is_reserved(&k) {
                map.entry(k).or_insert(v);
            }
        }
    }
    o
}

fn number_json(ty: &str, rules: &NumberRules) -> Value {
    let mut o = json!({ "type": ty });
    let keys = [
        ("minimum", rules.minimum),
        ("maximum", rules.maximum),
        ("exclusiveMinimum", rules.exclusive_minimum),
        ("exclusiveMaximum", rules.exclusive_maximum),
        ("multipleOf", rules.multiple_of),
    ];
    for (key, n) in keys {
        if let Some(n) = n {
            o[key] = json_num_pref_i64(n);
        }
    }
    o
}

// Helper: prefer emitting integers when exact
fn json_num_pref_i64(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PARSING
// ————————————————————————————————————————————————————————————————————————————

/// Keywords this crate does not model; accepting them as annotations would
/// silently drop their validation meaning.
const UNSUPPORTED: &[&str] = &[
    "oneOf", "not", "if", "then", "else", "prefixItems", "patternProperties",
    "dependentSchemas", "const", "contains", "$id", "$dynamicRef",
];

pub fn from_json(value: &Value) -> Result<Schema> {
    parse_at(value, "#")
}

fn parse_at(value: &Value, path: &str) -> Result<Schema> {
    let map = match value {
        Value::Object(map) => map,
        Value::Bool(true) => return Ok(Schema::any()),
        other => return Err(SchemaError::parse(path, format!("expected an object, found {other}"))),
    };
    let mut rest: IndexMap<String, Value> =
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

    for kw in UNSUPPORTED {
        if rest.contains_key(*kw) {
            return Err(SchemaError::parse(path, format!("unsupported keyword '{kw}'")));
        }
    }
    if rest.contains_key(DEFS_KEY) {
        return Err(SchemaError::parse(path, "nested '$defs' are not supported"));
    }

    let kind = if let Some(target) = rest.shift_remove("$ref") {
        let target = target
            .as_str()
            .ok_or_else(|| SchemaError::parse(path, "'$ref' must be a string"))?;
        let name = target
            .strip_prefix(REF_PREFIX)
            .ok_or_else(|| SchemaError::parse(path, format!("non-local $ref '{target}'")))?;
        Kind::Reference(name.to_string())
    } else if let Some(values) = rest.shift_remove("enum") {
        let Value::Array(values) = values else {
            return Err(SchemaError::parse(path, "'enum' must be an array"));
        };
        // `enum` may sit next to a redundant `type` (e.g. `"type": "string"`).
        rest.shift_remove("type");
        Kind::LiteralUnion(values)
    } else if let Some(members) = rest.shift_remove("anyOf") {
        Kind::Union(parse_members(&members, &format!("{path}/anyOf"))?)
    } else if let Some(members) = rest.shift_remove("allOf") {
        Kind::Intersection(parse_members(&members, &format!("{path}/allOf"))?)
    } else {
        match rest.shift_remove("type") {
            None => Kind::Any,
            Some(Value::String(ty)) => parse_typed(&ty, &mut rest, path)?,
            Some(other) => {
                return Err(SchemaError::parse(path, format!("'type' must be a single string, found {other}")));
            }
        }
    };

    // Whatever validation keyword is left over does not apply to this kind.
    let mut annotations = Annotations::default();
    for (k, v) in rest {
        if keywords::is_reserved(&k) {
            return Err(SchemaError::parse(path, format!("keyword '{k}' does not apply to a {} schema", kind.name())));
        }
        annotations.insert(k, v)?;
    }
    Ok(Schema::new(kind, annotations))
}

fn parse_members(value: &Value, path: &str) -> Result<Vec<Schema>> {
    let Value::Array(xs) = value else {
        return Err(SchemaError::parse(path, "expected an array of schemas"));
    };
    xs.iter()
        .enumerate()
        .map(|(i, x)| parse_at(x, &format!("{path}/{i}")))
        .collect()
}

fn parse_typed(ty: &str, rest: &mut IndexMap<String, Value>, path: &str) -> Result<Kind> {
    let kind = match ty {
        "string" => Kind::String(StringRules {
            min_length: take_u64(rest, "minLength", path)?,
            max_length: take_u64(rest, "maxLength", path)?,
            pattern: take_str(rest, "pattern", path)?,
            format: take_str(rest, "format", path)?,
        }),
        "number" => Kind::Number(take_number_rules(rest, path)?),
        "integer" => Kind::Integer(take_number_rules(rest, path)?),
        "boolean" => Kind::Boolean,
        "null" => Kind::Null,
        "object" => Kind::Object(take_object_rules(rest, path)?),
        "array" => {
            let items = match rest.shift_remove("items") {
                Some(items) => parse_at(&items, &format!("{path}/items"))?,
                None => Schema::any(),
            };
            let unique_items = match rest.shift_remove("uniqueItems") {
                None => false,
                Some(Value::Bool(b)) => b,
                Some(_) => return Err(SchemaError::parse(path, "'uniqueItems' must be a boolean")),
            };
            Kind::Array(ArrayRules {
                items: Box::new(items),
                min_items: take_u64(rest, "minItems", path)?,
                max_items: take_u64(rest, "maxItems", path)?,
                unique_items,
            })
        }
        other => return Err(SchemaError::parse(path, format!("unknown type '{other}'"))),
    };
    Ok(kind)
}

fn take_object_rules(rest: &mut IndexMap<String, Value>, path: &str) -> Result<ObjectRules> {
    let mut properties = IndexMap::new();
    if let Some(props) = rest.shift_remove("properties") {
        let Value::Object(props) = props else {
            return Err(SchemaError::parse(path, "'properties' must be an object"));
        };
        for (name, schema) in &props {
            let schema = parse_at(schema, &format!("{path}/properties/{name}"))?;
            properties.insert(name.clone(), Property::optional(schema));
        }
    }
    if let Some(required) = rest.shift_remove("required") {
        let Value::Array(names) = required else {
            return Err(SchemaError::parse(path, "'required' must be an array"));
        };
        for name in names {
            let name = name
                .as_str()
                .ok_or_else(|| SchemaError::parse(path, "'required' entries must be strings"))?;
            let prop = properties.get_mut(name).ok_or_else(|| {
                SchemaError::parse(path, format!("required property '{name}' is not declared"))
            })?;
            prop.required = true;
        }
    }
    let additional_properties = match rest.shift_remove("additionalProperties") {
        None => None,
        Some(Value::Bool(b)) => Some(b),
        Some(_) => {
            return Err(SchemaError::parse(path, "'additionalProperties' must be a boolean"));
        }
    };
    Ok(ObjectRules { properties, additional_properties })
}

fn take_number_rules(rest: &mut IndexMap<String, Value>, path: &str) -> Result<NumberRules> {
    Ok(NumberRules {
        minimum: take_f64(rest, "minimum", path)?,
        maximum: take_f64(rest, "maximum", path)?,
        exclusive_minimum: take_f64(rest, "exclusiveMinimum", path)?,
        exclusive_maximum: take_f64(rest, "exclusiveMaximum", path)?,
        multiple_of: take_f64(rest, "multipleOf", path)?,
    })
}

fn take_u64(rest: &mut IndexMap<String, Value>, key: &str, path: &str) -> Result<Option<u64>> {
    match rest.shift_remove(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| SchemaError::parse(path, format!("'{key}' must be a non-negative integer"))),
    }
}

fn take_f64(rest: &mut IndexMap<String, Value>, key: &str, path: &str) -> Result<Option<f64>> {
    match rest.shift_remove(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| SchemaError::parse(path, format!("'{key}' must be a number"))),
    }
}

fn take_str(rest: &mut IndexMap<String, Value>, key: &str, path: &str) -> Result<Option<String>> {
    match rest.shift_remove(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(SchemaError::parse(path, format!("'{key}' must be a string"))),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SERDE
// ————————————————————————————————————————————————————————————————————————————

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        from_json(&value).map_err(D::Error::custom)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Annotate, ArrayOptions, NumberOptions, ObjectOptions, StringOptions};

    fn sample() -> Schema {
        let name = Schema::string(
            StringOptions::new()
                .min_length(1)
                .max_length(214)
                .pattern("^[a-z0-9-~][a-z0-9-._~]*$")
                .description("The name of the package.")
                .with("markdownDescription", "The **name**"),
        );
        let store = Schema::object(
            [
                ("path", Property::required(Schema::string(StringOptions::new().format("uri-reference")))),
                ("field", Schema::optional(Schema::reference("fieldName"))),
            ],
            ObjectOptions::new().additional_properties(false),
        )
        .unwrap();
        Schema::object(
            [
                ("name", Property::required(name)),
                ("rating", Property::required(Schema::number(NumberOptions::new().minimum(0.0).maximum(4.5)))),
                ("count", Schema::optional(Schema::integer(NumberOptions::new().multiple_of(2.0)))),
                ("stores", Property::required(Schema::union([
                    store.clone(),
                    Schema::array(store, ArrayOptions::new().min_items(1).unique_items()),
                ]))),
                ("style", Schema::optional(Schema::literal_union(["esm", "commonjs"]))),
                ("both", Schema::optional(Schema::intersect([Schema::any(), Schema::null()]))),
                ("flag", Schema::optional(Schema::boolean().title("Flag"))),
            ],
            ObjectOptions::new().title("Package"),
        )
        .unwrap()
    }

    #[test]
    fn reread_is_structurally_identical() {
        let s = sample();
        let back = from_json(&to_json(&s)).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn serde_round_trip_goes_through_json_form() {
        let s = sample();
        let text = serde_json::to_string(&s).unwrap();
        let back: Schema = serde_json::from_str(&text).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn emits_json_schema_keywords() {
        let v = to_json(&sample());
        assert_eq!(v["properties"]["stores"]["anyOf"][1]["type"], json!("array"));
        assert_eq!(v["properties"]["stores"]["anyOf"][0]["properties"]["field"], json!({"$ref": "#/$defs/fieldName"}));
        assert_eq!(v["properties"]["style"], json!({"enum": ["esm", "commonjs"]}));
        assert_eq!(v["properties"]["rating"]["minimum"], json!(0));
        assert_eq!(v["required"], json!(["name", "rating", "stores"]));
        assert_eq!(v["title"], json!("Package"));
    }

    #[test]
    fn validation_keywords_never_leak_from_annotations() {
        let s = Schema::string(StringOptions::new().with("minLength", 99).with("enum", json!(["x"])));
        let v = to_json(&s);
        assert_eq!(v, json!({"type": "string"}));
        assert_eq!(from_json(&v).unwrap(), s);

        let mut annotations = Annotations::new();
        annotations.extra.insert("minLength".into(), json!(99));
        annotations.extra.insert("x-order".into(), json!(2));
        let s = Schema::new(Kind::String(StringRules::default()), annotations);
        assert_eq!(to_json(&s), json!({"type": "string", "x-order": 2}));
    }

    #[test]
    fn misplaced_keywords_are_parse_errors() {
        let err = from_json(&json!({"type": "number", "minLength": 3})).unwrap_err();
        assert!(matches!(err, SchemaError::Parse { reason, .. } if reason.contains("minLength")));
        assert!(from_json(&json!({"$ref": "#/$defs/a", "items": {}})).is_err());
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(from_json(&json!({"$ref": "https://example.com/other.json"})).is_err());
        assert!(from_json(&json!({"oneOf": [{"type": "string"}]})).is_err());
        assert!(from_json(&json!({"type": ["string", "null"]})).is_err());
        assert!(from_json(&json!({"type": "object", "properties": {}, "required": ["ghost"]})).is_err());
        assert!(from_json(&json!(42)).is_err());
    }

    #[test]
    fn enum_with_redundant_type_reads_as_literal_union() {
        let s = from_json(&json!({"type": "string", "enum": ["a", "b"], "title": "AB"})).unwrap();
        assert_eq!(s.kind(), &Kind::LiteralUnion(vec![json!("a"), json!("b")]));
        assert_eq!(s.annotations().title.as_deref(), Some("AB"));
    }
}
