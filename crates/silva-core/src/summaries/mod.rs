//! Summary table assembler: one wide table per metric family per hierarchy
//! level, outer-joined from aggregator and resolver outputs, then reindexed,
//! filled, and coerced by the table's schema.

pub mod age;
pub mod general;
pub mod health;
pub mod management;
pub mod mast;
pub mod size;
pub mod species;
pub mod vertcomp;

use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::{self, Case, CaseAgg, LevelAgg};
use crate::builder::{PlotRow, TreeRow};
use crate::dominance::DominantRow;
use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::level::{HierarchyKeyed, Level};
use crate::schema::TableSchema;

/// The eight metric families exported per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    General,
    Age,
    Health,
    Mast,
    Size,
    Species,
    VertComp,
    Management,
}

impl Family {
    pub const ALL: [Family; 8] = [
        Family::General,
        Family::Age,
        Family::Health,
        Family::Mast,
        Family::Size,
        Family::Species,
        Family::VertComp,
        Family::Management,
    ];

    /// Snapshot and schema-file base name.
    pub fn name(&self) -> &'static str {
        match self {
            Family::General => "general",
            Family::Age => "age",
            Family::Health => "health",
            Family::Mast => "mast",
            Family::Size => "size",
            Family::Species => "species",
            Family::VertComp => "vertcomp",
            Family::Management => "management",
        }
    }

    pub fn from_name(name: &str) -> Option<Family> {
        Family::ALL
            .into_iter()
            .find(|f| f.name() == name.trim().to_ascii_lowercase())
    }
}

/// The immutable intermediate tables every summary reads.
#[derive(Debug, Clone, Copy)]
pub struct SummaryInputs<'a> {
    pub trees: &'a [TreeRow],
    pub plots: &'a [PlotRow],
}

/// Assemble one family at one level and finalize it against its schema.
/// Configuration and input-shape errors surface here; the aggregation
/// beneath never raises on data quality.
pub fn assemble(
    inputs: &SummaryInputs,
    level: Level,
    family: Family,
    schema: &TableSchema,
) -> Result<Frame> {
    let frame = build(inputs, level, family)?;
    schema.resolve_level(level).finalize(&frame)
}

/// Assemble one family at one level, pre-schema.
pub fn build(inputs: &SummaryInputs, level: Level, family: Family) -> Result<Frame> {
    match family {
        Family::General => general::build(inputs, level),
        Family::Age => age::build(inputs, level),
        Family::Health => health::build(inputs, level),
        Family::Mast => mast::build(inputs, level),
        Family::Size => size::build(inputs, level),
        Family::Species => species::build(inputs, level),
        Family::VertComp => vertcomp::build(inputs, level),
        Family::Management => management::build(inputs, level),
    }
}

/// Long-form species × health cross-tabulation export, schema-free.
pub fn species_health_crosstab(inputs: &SummaryInputs, level: Level) -> Frame {
    let rows = aggregate::aggregate_two_cases(
        inputs.trees,
        inputs.plots,
        level,
        Case::Species,
        Case::Health,
        None,
    );
    let mut f = Frame::new(vec![
        level.column().to_string(),
        "SP".into(),
        "HLTH".into(),
        "TREE_CT".into(),
        "TPA".into(),
        "BA".into(),
    ]);
    for r in rows {
        f.push_row(vec![
            r.value.into(),
            r.case_a.into(),
            r.case_b.into(),
            r.tree_count.into(),
            r.tpa.into(),
            r.ba.into(),
        ]);
    }
    f
}

// ── Shared frame builders ────────────────────────────────────────────────────

/// The base frame every family joins onto: one row per level value in the
/// base population, with the unfiltered plot count.
pub(crate) fn base_frame(inputs: &SummaryInputs, level: Level) -> Frame {
    let counts = aggregate::plot_counts(inputs.plots, level);
    let mut values: BTreeSet<String> = counts.keys().cloned().collect();
    for t in inputs.trees {
        values.insert(t.level_key(level).to_string());
    }

    let mut f = Frame::new(vec![level.column().to_string(), "PLOT_CT".into()]);
    for value in values {
        let ct = counts.get(&value).copied().unwrap_or(0);
        f.push_row(vec![value.into(), ct.into()]);
    }
    f
}

/// Plain rollup columns, optionally prefixed (`LIVE_TPA` and friends).
pub(crate) fn agg_frame(level: Level, aggs: &[LevelAgg], prefix: &str) -> Frame {
    let mut f = Frame::new(vec![
        level.column().to_string(),
        format!("{prefix}TREE_CT"),
        format!("{prefix}TPA"),
        format!("{prefix}BA"),
        format!("{prefix}QMDBH"),
    ]);
    for a in aggs {
        f.push_row(vec![
            a.value.clone().into(),
            a.tree_count.into(),
            a.tpa.into(),
            a.ba.into(),
            a.qm_dbh.into(),
        ]);
    }
    f
}

/// Dominance columns: `DOM_TAG` and `DOM_TAG_PCT`.
pub(crate) fn dominant_frame(level: Level, rows: &[DominantRow], tag: &str) -> Frame {
    let mut f = Frame::new(vec![
        level.column().to_string(),
        format!("DOM_{tag}"),
        format!("DOM_{tag}_PCT"),
    ]);
    for r in rows {
        f.push_row(vec![
            r.value.clone().into(),
            r.case_value.clone().into(),
            Value::from_opt_num(r.pct),
        ]);
    }
    f
}

/// Metrics a case breakout can pivot wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PivotMetric {
    TreeCt,
    Tpa,
    Ba,
    QmDbh,
}

impl PivotMetric {
    fn name(&self) -> &'static str {
        match self {
            PivotMetric::TreeCt => "TREE_CT",
            PivotMetric::Tpa => "TPA",
            PivotMetric::Ba => "BA",
            PivotMetric::QmDbh => "QMDBH",
        }
    }

    fn extract(&self, agg: &CaseAgg) -> Value {
        match self {
            PivotMetric::TreeCt => agg.tree_count.into(),
            PivotMetric::Tpa => agg.tpa.into(),
            PivotMetric::Ba => agg.ba.into(),
            PivotMetric::QmDbh => agg.qm_dbh.into(),
        }
    }

    /// The zero a missing (level, case) combination is filled with.
    fn zero(&self) -> Value {
        match self {
            PivotMetric::TreeCt => Value::Int(0),
            _ => Value::Num(0.0),
        }
    }
}

/// Flatten a long case breakout wide: one `METRIC_TAG_Value` column per
/// metric × case value. Closed vocabularies always emit their full column
/// set; missing combinations are zero, not null.
pub(crate) fn pivot_frame(
    level: Level,
    rows: &[CaseAgg],
    case: Case,
    metrics: &[PivotMetric],
) -> Frame {
    let case_values: Vec<String> = match case.domain() {
        Some(domain) => domain.iter().map(|s| s.to_string()).collect(),
        None => rows
            .iter()
            .map(|r| r.case_value.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let mut columns = vec![level.column().to_string()];
    for m in metrics {
        for v in &case_values {
            columns.push(format!("{}_{}_{}", m.name(), case.column(), v));
        }
    }

    let mut grouped: BTreeMap<&str, BTreeMap<&str, &CaseAgg>> = BTreeMap::new();
    for r in rows {
        grouped
            .entry(r.value.as_str())
            .or_default()
            .insert(r.case_value.as_str(), r);
    }

    let mut f = Frame::new(columns);
    for (value, by_case) in grouped {
        let mut cells = vec![Value::Str(value.to_string())];
        for m in metrics {
            for v in &case_values {
                cells.push(by_case.get(v.as_str()).map_or_else(|| m.zero(), |r| m.extract(r)));
            }
        }
        f.push_row(cells);
    }
    f
}
