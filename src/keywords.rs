//! Extension keywords accepted by the compiler.
//!
//! A schema may carry arbitrary annotation keys. A compile run gets a
//! registry of the extension keywords it recognizes together with the shape
//! their value must have; there is no process-wide registration.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Shape a registered keyword's value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordValue {
    Any,
    String,
    Bool,
    StringArray,
    Array,
}

impl KeywordValue {
    fn accepts(self, value: &Value) -> bool {
        match self {
            KeywordValue::Any => true,
            KeywordValue::String => value.is_string(),
            KeywordValue::Bool => value.is_boolean(),
            KeywordValue::StringArray => value
                .as_array()
                .is_some_and(|xs| xs.iter().all(Value::is_string)),
            KeywordValue::Array => value.is_array(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            KeywordValue::Any => "any value",
            KeywordValue::String => "a string",
            KeywordValue::Bool => "a boolean",
            KeywordValue::StringArray => "an array of strings",
            KeywordValue::Array => "an array",
        }
    }
}

/// JSON Schema vocabulary that is never "unknown", even when it only shows
/// up as a pass-through annotation.
const VOCABULARY: &[&str] = &[
    "$schema", "$comment", "type", "title", "description", "default", "examples",
    "deprecated", "readOnly", "writeOnly", "format", "pattern", "minLength",
    "maxLength", "minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum",
    "multipleOf", "properties", "required", "additionalProperties", "items",
    "minItems", "maxItems", "uniqueItems", "enum", "anyOf", "allOf", "$ref",
    "contentMediaType", "contentEncoding",
];

/// Keywords that carry validation meaning (or that this crate refuses to
/// read). They can never be plain annotations.
const RESERVED: &[&str] = &[
    "type", "format", "pattern", "minLength", "maxLength", "minimum", "maximum",
    "exclusiveMinimum", "exclusiveMaximum", "multipleOf", "properties", "required",
    "additionalProperties", "items", "minItems", "maxItems", "uniqueItems", "enum",
    "anyOf", "allOf", "$ref", "$defs", "oneOf", "not", "if", "then", "else",
    "prefixItems", "patternProperties", "dependentSchemas", "const", "contains",
    "$id", "$dynamicRef",
];

pub fn is_reserved(key: &str) -> bool {
    RESERVED.contains(&key)
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRegistry {
    keywords: IndexMap<String, KeywordValue>,
}

impl Default for KeywordRegistry {
    fn default() -> Self {
        Self::editor_extensions()
    }
}

impl KeywordRegistry {
    pub fn empty() -> Self {
        Self { keywords: IndexMap::new() }
    }

    /// The VSCode JSON-schema extensions plus the `kind`/`modifier`
    /// markers older schema libraries leave behind.
    pub fn editor_extensions() -> Self {
        Self::empty()
            .register("kind", KeywordValue::Any)
            .register("modifier", KeywordValue::Any)
            .register("markdownDescription", KeywordValue::String)
            .register("errorMessage", KeywordValue::String)
            .register("patternErrorMessage", KeywordValue::String)
            .register("deprecationMessage", KeywordValue::String)
            .register("markdownDeprecationMessage", KeywordValue::String)
            .register("enumDescriptions", KeywordValue::StringArray)
            .register("markdownEnumDescriptions", KeywordValue::StringArray)
            .register("doNotSuggest", KeywordValue::Bool)
            .register("suggestSortText", KeywordValue::String)
            .register("allowComments", KeywordValue::Bool)
            .register("allowTrailingCommas", KeywordValue::Bool)
            .register("defaultSnippets", KeywordValue::Array)
    }

    pub fn register(mut self, name: impl Into<String>, value: KeywordValue) -> Self {
        self.keywords.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<KeywordValue> {
        self.keywords.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keywords.keys().map(String::as_str)
    }

    /// Registered keywords must carry a well-shaped value; unregistered,
    /// non-vocabulary keywords are only an error in strict mode.
    pub(crate) fn check(&self, key: &str, value: &Value, strict: bool) -> Result<()> {
        match self.get(key) {
            Some(shape) if !shape.accepts(value) => Err(SchemaError::InvalidKeywordValue {
                keyword: key.to_string(),
                expected: shape.describe(),
            }),
            Some(_) => Ok(()),
            None if strict && !VOCABULARY.contains(&key) => {
                Err(SchemaError::UnknownKeyword { keyword: key.to_string() })
            }
            None => Ok(()),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
