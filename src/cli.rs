//! Minimal CLI: validate JSON files against a serialized schema document
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use json_schemata::{CompileOptions, CompiledValidator, SchemaBuilder, SchemaError, Target};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate JSON documents against a schema document with `$defs`
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate every input against the schema's root (or one definition)
    Validate(ValidateCmd),
    /// print the reflected type shape of the schema
    Reflect(ReflectCmd),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema document written by `write_serialized` (root fields + `$defs`)
    #[arg(long, short)]
    schema: PathBuf,

    /// use this definition instead of the document's root
    #[arg(long)]
    definition: Option<String>,
}

#[derive(clap::Parser, Debug)]
struct ValidateCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// reject unknown annotation keywords and unknown formats
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// treat objects without an explicit `additionalProperties` as closed
    #[arg(long, default_value_t = false)]
    deny_additional: bool,
}

#[derive(clap::Parser, Debug)]
struct ReflectCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,
}

struct Outcome {
    path: PathBuf,
    result: Result<(), SchemaError>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load(&self) -> anyhow::Result<SchemaBuilder> {
        let builder = SchemaBuilder::read_document(&self.schema)
            .with_context(|| format!("failed to load schema document {}", self.schema.display()))?;
        if let Some(name) = &self.definition {
            if !builder.has_definition(name) {
                bail!("schema document has no definition named '{name}'");
            }
        }
        Ok(builder)
    }

    fn target(&self) -> Target {
        match &self.definition {
            Some(name) => Target::Definition(name.clone()),
            None => Target::Root,
        }
    }
}

impl ValidateCmd {
    fn compile_options(&self) -> CompileOptions {
        let mut options = CompileOptions::new();
        if self.strict {
            options = options.strict();
        }
        if self.deny_additional {
            options = options.deny_additional_properties();
        }
        options
    }

    fn check_file(&self, validator: &CompiledValidator, path: &Path) -> Result<(), SchemaError> {
        let source = std::fs::read_to_string(path)
            .map_err(|source| SchemaError::Io { path: path.to_path_buf(), source })?;
        let value = serde_json::from_str::<Value>(&source)?;
        let value = match self.json_pointer.as_deref() {
            None => &value,
            Some(pointer) => value.pointer(pointer).ok_or_else(|| SchemaError::Parse {
                path: pointer.to_string(),
                reason: "JSON pointer selects nothing".to_string(),
            })?,
        };
        match &self.schema_settings.definition {
            Some(name) => validator.validate_definition(name, value),
            None => validator.validate(value).map_err(SchemaError::Validation),
        }
    }

    fn run(&self) -> anyhow::Result<bool> {
        let mut builder = self.schema_settings.load()?;
        let validator = builder
            .compile_validator(&self.compile_options())
            .context("failed to compile schema")?;

        let source_paths = resolve_file_path_patterns(&self.input)?;
        tracing::info!(files = source_paths.len(), "validating");
        let outcomes: Vec<Outcome> = source_paths
            .into_par_iter()
            .map(|path| {
                let result = self.check_file(validator, &path);
                Outcome { path, result }
            })
            .collect();

        let mut failed = 0usize;
        for Outcome { path, result } in &outcomes {
            let shown = path.to_string_lossy();
            match result {
                Ok(()) => println!("{} {shown}", "✔".green()),
                Err(error) => {
                    failed += 1;
                    println!("{} {shown}", "✘".red());
                    match error.diagnostics() {
                        Some(diags) => diags.iter().for_each(|d| println!("    {}", d.to_string().yellow())),
                        None => println!("    {}", error.to_string().yellow()),
                    }
                }
            }
        }
        let summary = format!("{} passed, {failed} failed", outcomes.len() - failed);
        if failed == 0 {
            eprintln!("{}", summary.green().bold());
        } else {
            eprintln!("{}", summary.red().bold());
        }
        Ok(failed == 0)
    }
}

impl ReflectCmd {
    fn run(&self) -> anyhow::Result<bool> {
        let builder = self.schema_settings.load()?;
        let reflection = builder.reflect(self.schema_settings.target())?;
        println!("{reflection:#?}");
        Ok(true)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    /// `Ok(false)` when some input failed validation.
    pub fn run(&self) -> anyhow::Result<bool> {
        match &self.cmd {
            Command::Validate(cmd) => cmd.run(),
            Command::Reflect(cmd) => cmd.run(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
