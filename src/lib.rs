//! Build libraries of named, cross-referencing JSON schemas, validate data
//! against them and reflect the static shape of what validates.
//!
//! Start with [`SchemaBuilder`]; everything a schema author needs is in the
//! [`prelude`].

pub mod builder;
pub mod defs;
pub mod error;
pub mod formats;
pub mod ir;
pub mod json;
pub mod keywords;
pub mod lower;
pub mod path_de;
pub mod persist;
pub mod schema;
pub mod typed;
pub mod validate;

pub use builder::{DefinitionSource, Definitions, Root, SchemaBuilder, Target};
pub use error::{Result, SchemaError, ValidationErrors};
pub use schema::{Annotate, Kind, Property, Schema};
pub use validate::{CompileOptions, CompiledValidator, Diagnostic};

pub mod prelude {
    pub use crate::builder::{DefinitionSource, Definitions, Root, SchemaBuilder, Target};
    pub use crate::error::{Result, SchemaError};
    pub use crate::schema::{
        Annotate, ArrayOptions, NumberOptions, ObjectOptions, Property, Schema, StringOptions,
    };
    pub use crate::validate::{AdditionalProperties, CompileOptions, Diagnostic};
}
