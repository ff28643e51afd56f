//! Dominance/prevalence resolver: which case value carries the most
//! trees-per-acre at each level value, and what share of the unfiltered
//! baseline it holds.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::aggregate::{aggregate, aggregate_by_case, Case, CaseAgg, TreeFilter};
use crate::builder::{PlotRow, TreeRow};
use crate::level::Level;
use crate::records::HealthClass;

// ── Tie-breaking ─────────────────────────────────────────────────────────────

/// How equal-TPA candidates are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Keep the lexically first case value. Early-alphabet species codes
    /// systematically win ties under this rule; the convention is kept
    /// because downstream summaries were built against it.
    Lexical,
    /// Keep the lowest health severity rank, so the healthiest class wins a
    /// tie. The inverse of the species convention.
    HealthRank,
}

/// Severity rank of a health case value; the sentinel class ranks below
/// Dead, unknown codes below everything.
fn health_case_rank(case_value: &str) -> u8 {
    if case_value == "NoTree" {
        5
    } else {
        HealthClass::from_code(case_value).map_or(6, |h| h.rank())
    }
}

fn tie_cmp(tie: TieBreak, a: &CaseAgg, b: &CaseAgg) -> Ordering {
    match tie {
        TieBreak::Lexical => a.case_value.cmp(&b.case_value),
        TieBreak::HealthRank => health_case_rank(&a.case_value)
            .cmp(&health_case_rank(&b.case_value))
            .then_with(|| a.case_value.cmp(&b.case_value)),
    }
}

// ── Dominant case ────────────────────────────────────────────────────────────

/// The winning case value for one level value.
#[derive(Debug, Clone, PartialEq)]
pub struct DominantRow {
    pub value: String,
    pub case_value: String,
    /// The winner's trees-per-acre under the given filter.
    pub tpa: f64,
    /// `100 × tpa / unfiltered-baseline-tpa`; `None` when the baseline is
    /// zero rather than a propagated NaN.
    pub pct: Option<f64>,
}

/// Resolve the dominant case value per level value: highest filtered TPA,
/// ties broken per `tie`. Level values with no case rows at all yield no
/// row here; the assembler's fill policy covers them.
pub fn dominant(
    trees: &[TreeRow],
    plots: &[PlotRow],
    level: Level,
    case: Case,
    filter: Option<TreeFilter>,
    tie: TieBreak,
) -> Vec<DominantRow> {
    let by_case = aggregate_by_case(trees, plots, level, case, filter);
    let baseline = aggregate(trees, plots, level, None);
    let overall: HashMap<&str, f64> =
        baseline.iter().map(|a| (a.value.as_str(), a.tpa)).collect();

    let mut grouped: BTreeMap<&str, Vec<&CaseAgg>> = BTreeMap::new();
    for row in &by_case {
        grouped.entry(row.value.as_str()).or_default().push(row);
    }

    grouped
        .into_iter()
        .map(|(value, mut candidates)| {
            candidates.sort_by(|a, b| {
                b.tpa
                    .partial_cmp(&a.tpa)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| tie_cmp(tie, a, b))
            });
            let winner = candidates[0];
            let pct = overall
                .get(value)
                .copied()
                .filter(|&base| base > 0.0)
                .map(|base| 100.0 * winner.tpa / base);
            DominantRow {
                value: value.to_string(),
                case_value: winner.case_value.clone(),
                tpa: winner.tpa,
                pct,
            }
        })
        .collect()
}

// ── Top-5 species ────────────────────────────────────────────────────────────

/// One ranked species for one level value, with its per-species health
/// re-resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TopSpeciesRow {
    pub value: String,
    /// 1-based rank by descending TPA.
    pub rank: u32,
    pub species: String,
    pub tpa: f64,
    /// Share of the unfiltered baseline TPA.
    pub pct: Option<f64>,
    /// Dominant health class among this species' trees alone.
    pub dom_health: Option<String>,
    /// Dead-tree TPA for this species alone.
    pub dead_tpa: f64,
}

/// Rank species per level value by descending TPA (lexical tie-break), keep
/// the top `n`, and for each kept species independently re-resolve its
/// dominant health class and dead-tree TPA scoped to that species alone.
///
/// This re-invokes the resolver once per (level value × rank), which makes
/// it the most expensive call in the engine; callers should compute it once
/// per level and reuse the result.
pub fn top_species(
    trees: &[TreeRow],
    plots: &[PlotRow],
    level: Level,
    n: usize,
    filter: Option<TreeFilter>,
) -> Vec<TopSpeciesRow> {
    let by_sp = aggregate_by_case(trees, plots, level, Case::Species, filter);
    let baseline = aggregate(trees, plots, level, None);
    let overall: HashMap<&str, f64> =
        baseline.iter().map(|a| (a.value.as_str(), a.tpa)).collect();

    let mut grouped: BTreeMap<&str, Vec<&CaseAgg>> = BTreeMap::new();
    for row in &by_sp {
        grouped.entry(row.value.as_str()).or_default().push(row);
    }

    let mut out = Vec::new();
    for (value, mut candidates) in grouped {
        candidates.sort_by(|a, b| {
            b.tpa
                .partial_cmp(&a.tpa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.case_value.cmp(&b.case_value))
        });

        for (i, cand) in candidates.iter().take(n).enumerate() {
            let species = cand.case_value.clone();
            let scoped = |t: &TreeRow| {
                t.species == species && filter.map_or(true, |f| f(t))
            };

            let dom_health = dominant(
                trees,
                plots,
                level,
                Case::Health,
                Some(&scoped),
                TieBreak::HealthRank,
            )
            .into_iter()
            .find(|d| d.value == value)
            .map(|d| d.case_value);

            let dead = |t: &TreeRow| scoped(t) && t.health == Some(HealthClass::Dead);
            let dead_tpa = aggregate(trees, plots, level, Some(&dead))
                .into_iter()
                .find(|a| a.value == value)
                .map_or(0.0, |a| a.tpa);

            out.push(TopSpeciesRow {
                value: value.to_string(),
                rank: (i + 1) as u32,
                species: cand.case_value.clone(),
                tpa: cand.tpa,
                pct: overall
                    .get(value)
                    .copied()
                    .filter(|&base| base > 0.0)
                    .map(|base| 100.0 * cand.tpa / base),
                dom_health,
                dead_tpa,
            });
        }
    }
    out
}
