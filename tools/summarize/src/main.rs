//! Survey summary pipeline driver: reads a survey export, builds the
//! intermediate tree/plot tables once, then assembles and writes one
//! snapshot per metric family per hierarchy level.
//!
//! Levels are independent reads of the same immutable intermediates, so the
//! per-level loop fans out across threads unless `--sequential` is given.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use silva_core::builder::{build_plot_table, build_tree_table};
use silva_core::schema::TableSchema;
use silva_core::species::SpeciesCrosswalk;
use silva_core::summaries::{assemble, species_health_crosstab};
use silva_core::{store, Family, Level, SummaryInputs};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "summarize",
    about = "Assemble per-level forest summary snapshots from a survey export"
)]
struct Args {
    /// Directory containing prism_plots.csv, fixed_plots.csv, age_plots.csv.
    #[arg(long, default_value = "data/export")]
    gdb_dir: PathBuf,

    /// Configuration directory: schema CSVs plus species_crosswalk.csv.
    #[arg(long, default_value = "data/config")]
    config_dir: PathBuf,

    /// Output directory for snapshots (created if absent).
    #[arg(short, long, default_value = "data/summaries")]
    output: PathBuf,

    /// Process only this hierarchy level (e.g. SID).
    #[arg(long)]
    level: Option<String>,

    /// Process only this metric family (e.g. health).
    #[arg(long)]
    family: Option<String>,

    /// Disable the per-level parallel fan-out.
    #[arg(long)]
    sequential: bool,

    /// Also write the long-form species × health cross-tabulation per level.
    #[arg(long)]
    crosstab: bool,
}

// ── Run manifest ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Manifest {
    tree_records: usize,
    fixed_records: usize,
    age_records: usize,
    crosswalk_species: usize,
    levels: Vec<String>,
    families: Vec<String>,
    snapshots: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let levels: Vec<Level> = match &args.level {
        Some(name) => match Level::from_name(name) {
            Some(level) => vec![level],
            None => bail!("unknown level {name:?} (expected PID/SID/SITE/UNIT/COMP/POOL)"),
        },
        None => Level::ALL.to_vec(),
    };
    let families: Vec<Family> = match &args.family {
        Some(name) => match Family::from_name(name) {
            Some(family) => vec![family],
            None => bail!("unknown family {name:?}"),
        },
        None => Family::ALL.to_vec(),
    };

    // Configuration loads once per run: crosswalk plus one schema per family.
    let crosswalk = SpeciesCrosswalk::from_path(&args.config_dir.join("species_crosswalk.csv"))
        .context("loading species crosswalk")?;
    let mut schemas: HashMap<Family, TableSchema> = HashMap::new();
    for family in &families {
        let path = args.config_dir.join(format!("{}.csv", family.name()));
        let schema = TableSchema::from_path(&path)
            .with_context(|| format!("loading schema {}", path.display()))?;
        schemas.insert(*family, schema);
    }

    let tree_records = store::read_tree_table(&args.gdb_dir.join(format!("{}.csv", store::PRISM_TABLE)))
        .context("reading prism plot table")?;
    let fixed_records = store::read_fixed_table(&args.gdb_dir.join(format!("{}.csv", store::FIXED_TABLE)))
        .context("reading fixed plot table")?;
    let age_records = store::read_age_table(&args.gdb_dir.join(format!("{}.csv", store::AGE_TABLE)))
        .context("reading age plot table")?;

    info!(
        trees = tree_records.len(),
        fixed = fixed_records.len(),
        age = age_records.len(),
        species = crosswalk.len(),
        "inputs loaded"
    );

    // Build the immutable intermediates once; every level reads them.
    let plots = build_plot_table(&fixed_records, &age_records);
    let trees = build_tree_table(&tree_records, &plots, &crosswalk);
    let inputs = SummaryInputs { trees: &trees, plots: &plots };

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let run_level = |level: &Level| -> Result<Vec<(String, usize)>> {
        let mut written = Vec::new();
        for family in &families {
            let schema = &schemas[family];
            let frame = assemble(&inputs, *level, *family, schema)
                .with_context(|| format!("{} at {}", family.name(), level.column()))?;
            let name = format!("{}_{}.csv", family.name(), level.column().to_lowercase());
            store::write_frame(&args.output.join(&name), &frame)?;
            written.push((name, frame.n_rows()));
        }
        if args.crosstab {
            let frame = species_health_crosstab(&inputs, *level);
            let name = format!("sp_hlth_xtab_{}.csv", level.column().to_lowercase());
            store::write_frame(&args.output.join(&name), &frame)?;
            written.push((name, frame.n_rows()));
        }
        Ok(written)
    };

    let written: Vec<Vec<(String, usize)>> = if args.sequential {
        levels.iter().map(run_level).collect::<Result<_>>()?
    } else {
        levels.par_iter().map(run_level).collect::<Result<_>>()?
    };

    eprintln!("{:<24} {:>6}", "snapshot", "rows");
    let mut snapshots = 0usize;
    for (name, rows) in written.iter().flatten() {
        eprintln!("{name:<24} {rows:>6}");
        snapshots += 1;
    }

    let manifest = Manifest {
        tree_records: tree_records.len(),
        fixed_records: fixed_records.len(),
        age_records: age_records.len(),
        crosswalk_species: crosswalk.len(),
        levels: levels.iter().map(|l| l.column().to_string()).collect(),
        families: families.iter().map(|f| f.name().to_string()).collect(),
        snapshots,
    };
    fs::write(
        args.output.join("manifest.json"),
        serde_json::to_string_pretty(&manifest)?,
    )?;

    eprintln!("\nDone. {} snapshots in {}.", snapshots, args.output.display());
    Ok(())
}
