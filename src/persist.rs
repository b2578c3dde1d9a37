//! Reading validated documents from disk and writing schema documents to it.
//!
//! File access goes through [`FileAccess`] so callers can swap in an
//! in-memory or sandboxed implementation.

use std::io;
use std::path::Path;

use serde_json::Value;

use crate::builder::{SchemaBuilder, Target};
use crate::error::{Result, SchemaError};

pub trait FileAccess {
    fn read_text_file(&self, path: &Path) -> io::Result<String>;
    fn write_text_file(&self, path: &Path, content: &str) -> io::Result<()>;
}

/// `std::fs`; writes create missing parent directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileAccess;

impl FileAccess for StdFileAccess {
    fn read_text_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_text_file(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> SchemaError + '_ {
    move |source| SchemaError::Io { path: path.to_path_buf(), source }
}

impl SchemaBuilder {
    /// Parse a JSON file and return it if it satisfies the root.
    pub fn read_and_validate(&self, path: impl AsRef<Path>) -> Result<Value> {
        self.read_and_validate_with(&StdFileAccess, path)
    }

    pub fn read_and_validate_with(&self, fs: &dyn FileAccess, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let text = fs.read_text_file(path).map_err(io_error(path))?;
        let data: Value = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "validating file");
        self.assert_is_valid(data)
    }

    /// Write the root document (with `$defs`) as pretty JSON.
    pub fn write_serialized(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_serialized_with(&StdFileAccess, path)
    }

    pub fn write_serialized_with(&self, fs: &dyn FileAccess, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let doc = self.serialize_with_defs(Target::Root)?;
        let text = serde_json::to_string_pretty(&doc)?;
        fs.write_text_file(path, &text).map_err(io_error(path))?;
        tracing::debug!(path = %path.display(), definitions = self.definitions().len(), "wrote schema document");
        Ok(())
    }

    /// Load a builder from a document written by [`Self::write_serialized`].
    pub fn read_document(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_document_with(&StdFileAccess, path)
    }

    pub fn read_document_with(fs: &dyn FileAccess, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs.read_text_file(path).map_err(io_error(path))?;
        Self::from_document(&serde_json::from_str(&text)?)
    }
}

#[cfg(feature = "tokio")]
impl SchemaBuilder {
    pub async fn read_and_validate_async(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(io_error(path))?;
        self.assert_is_valid(serde_json::from_str(&text)?)
    }

    pub async fn write_serialized_async(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(&self.serialize_with_defs(Target::Root)?)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error(parent))?;
        }
        tokio::fs::write(path, text).await.map_err(io_error(path))
    }
}

// ------------------------------- Tests ------------------------------------ //
