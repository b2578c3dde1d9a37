mod samples;

use std::process::ExitCode;

use json_schemata::ir::Ty;
use json_schemata::{Result, Target};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct PackageFile {
    name: String,
    version: String,
    bscotch: Option<serde_json::Value>,
}

fn run() -> Result<bool> {
    let config = samples::repo_config()?;
    eprintln!("—— definitions ——");
    for name in config.definitions().names() {
        eprintln!("  {name}");
    }

    eprintln!("—— sample documents ——");
    let mut all_ok = true;
    for (label, doc, expect_valid) in samples::config_documents() {
        let valid = config.is_valid(&doc)?;
        let mark = if valid == expect_valid { "✅" } else { "❌" };
        all_ok &= valid == expect_valid;
        eprintln!("{mark} {label} (valid: {valid})");
        for d in config.last_errors() {
            eprintln!("      {d}");
        }
    }

    eprintln!("—— typed access ——");
    let typed = config.clone().typed::<PackageFile>()?;
    let pkg = typed.parse_str(r#"{"name": "repo", "version": "1.2.3"}"#)?;
    eprintln!("✅ parsed {pkg:?}");

    eprintln!("—— reflected root ——");
    let reflection = config.reflect(Target::Root)?;
    if let Ty::Object { fields, .. } = &reflection.root {
        for f in fields {
            eprintln!("  {}{}", f.name, if f.required { "" } else { "?" });
        }
    }

    if let Some(out) = std::env::args().nth(1) {
        config.write_serialized(&out)?;
        eprintln!("wrote {out}");
    }
    Ok(all_ok)
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(error) => {
            eprintln!("❌ {error}");
            ExitCode::from(2)
        }
    }
}
