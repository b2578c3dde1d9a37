//! Error taxonomy for building, compiling and validating schemas.
//!
//! Every failure is surfaced immediately to the caller; nothing here is
//! retried internally since all operations are deterministic and in-memory
//! (apart from the persistence wrappers, which only add `Io`).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::validate::Diagnostic;

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum SchemaError {
    /// A definition name was added twice to the same store.
    #[error("definition '{name}' already exists")]
    DuplicateDefinition { name: String },

    /// A name was dereferenced (or rooted) while absent from the store.
    #[error("definition '{name}' does not exist")]
    UnknownDefinition { name: String },

    /// An operation that needs a root ran on a builder without one.
    #[error("no root schema has been set")]
    NoRootDefined,

    /// Data did not satisfy the compiled root.
    #[error("validation failed:\n{0}")]
    Validation(ValidationErrors),

    /// The same property name was given twice to one object.
    #[error("property '{name}' is declared more than once")]
    DuplicateProperty { name: String },

    /// A chain of references (through unions/intersections) loops back on
    /// itself without ever reaching a concrete schema.
    #[error("reference cycle never reaches a concrete schema: {}", chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    /// Constraints that cannot be satisfied or compiled.
    #[error("invalid schema at {path}: {reason}")]
    InvalidSchema { path: String, reason: String },

    /// A validation keyword was offered as an annotation key.
    #[error("'{key}' is a validation keyword, not an annotation")]
    ReservedAnnotation { key: String },

    #[error("unknown keyword '{keyword}' (register it or disable strict mode)")]
    UnknownKeyword { keyword: String },

    #[error("keyword '{keyword}' must be {expected}")]
    InvalidKeywordValue { keyword: String, expected: &'static str },

    #[error("unknown string format '{format}'")]
    UnknownFormat { format: String },

    /// A JSON document could not be read back as a schema.
    #[error("not a recognizable schema at {path}: {reason}")]
    Parse { path: String, reason: String },

    /// Valid data could not be narrowed into the requested Rust type.
    #[error("deserialize error {0}")]
    Deserialize(String),

    #[error("io error for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse { path: path.into(), reason: reason.into() }
    }

    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema { path: path.into(), reason: reason.into() }
    }

    /// Diagnostics carried by a `Validation` error, if any.
    pub fn diagnostics(&self) -> Option<&[Diagnostic]> {
        match self {
            Self::Validation(errors) => Some(errors.diagnostics()),
            _ => None,
        }
    }
}

/// Full list of diagnostics from one failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    diagnostics: Vec<Diagnostic>,
}

impl ValidationErrors {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {d}")?;
        }
        Ok(())
    }
}
