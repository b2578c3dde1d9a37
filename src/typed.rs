//! A builder paired with the Rust type its root describes.
//!
//! The schema stays the source of truth for what is valid; `T` only decides
//! what a valid document turns into.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::builder::SchemaBuilder;
use crate::error::{Result, SchemaError, ValidationErrors};

pub struct Typed<T> {
    builder: SchemaBuilder,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typed")
            .field("type", &std::any::type_name::<T>())
            .field("builder", &self.builder)
            .finish()
    }
}

impl<T> Clone for Typed<T> {
    fn clone(&self) -> Self {
        Self { builder: self.builder.clone(), _marker: PhantomData }
    }
}

impl SchemaBuilder {
    /// Fix the type that documents valid against this builder's root
    /// deserialize into. Fails if no root is set.
    pub fn typed<T: DeserializeOwned>(self) -> Result<Typed<T>> {
        if self.root().is_none() {
            return Err(SchemaError::NoRootDefined);
        }
        Ok(Typed { builder: self, _marker: PhantomData })
    }
}

impl<T: DeserializeOwned> Typed<T> {
    pub fn builder(&self) -> &SchemaBuilder {
        &self.builder
    }

    pub fn into_inner(self) -> SchemaBuilder {
        self.builder
    }

    pub fn is_valid(&self, data: &Value) -> Result<bool> {
        self.builder.is_valid(data)
    }

    pub fn parse_value(&self, data: &Value) -> Result<T> {
        self.builder.assert_is_valid_as(data)
    }

    pub fn parse_str(&self, text: &str) -> Result<T> {
        let data: Value = serde_json::from_str(text)?;
        self.parse_value(&data)
    }
}

impl<T: DeserializeOwned + Serialize> Typed<T> {
    /// Serialize `value` and check it still satisfies the schema; a Rust
    /// value can hold states the schema forbids (e.g. a pattern mismatch).
    pub fn to_value(&self, value: &T) -> Result<Value> {
        let data = serde_json::to_value(value)?;
        if self.builder.is_valid(&data)? {
            Ok(data)
        } else {
            Err(SchemaError::Validation(ValidationErrors::new(self.builder.last_errors())))
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
