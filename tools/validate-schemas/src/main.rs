//! Schema-configuration checker: parses every schema CSV in a config
//! directory and reports per-file problems before a summary run trips over
//! them mid-pipeline.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use silva_core::schema::{TableSchema, LEVEL_PLACEHOLDER};

#[derive(Parser, Debug)]
#[command(
    name = "validate-schemas",
    about = "Validate summary output schema configuration files"
)]
struct Args {
    /// Configuration directory holding the schema CSVs.
    #[arg(short, long, default_value = "data/config")]
    config_dir: PathBuf,
}

fn check(path: &Path) -> Result<usize> {
    let schema = TableSchema::from_path(path)?;
    let first = &schema.columns[0];
    if first.name != LEVEL_PLACEHOLDER {
        bail!("first column must be {LEVEL_PLACEHOLDER}, found {}", first.name);
    }
    Ok(schema.columns.len())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&args.config_dir)
        .with_context(|| format!("reading {}", args.config_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .filter(|p| p.file_name().is_some_and(|n| n != "species_crosswalk.csv"))
        .collect();
    entries.sort();

    if entries.is_empty() {
        bail!("no schema files in {}", args.config_dir.display());
    }

    eprintln!("{:<20} {:>8}  status", "schema", "columns");
    let mut failures = 0usize;
    for path in &entries {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        match check(path) {
            Ok(columns) => eprintln!("{name:<20} {columns:>8}  ok"),
            Err(err) => {
                failures += 1;
                eprintln!("{name:<20} {:>8}  {err}", "-");
            }
        }
    }

    if failures > 0 {
        bail!("{failures} schema file(s) failed validation");
    }
    eprintln!("\nAll {} schema files valid.", entries.len());
    Ok(())
}
