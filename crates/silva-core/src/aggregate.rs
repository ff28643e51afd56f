//! Hierarchy aggregator: rollups of the tree and plot tables at any of the
//! six nesting levels.
//!
//! Every rollup is driven by the same rule: the denominator for per-acre
//! metrics at a level is the **unfiltered** plot count for that level value.
//! Filters narrow the numerator population only. A level value with zero
//! filtered rows still gets a row, zero-filled.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::builder::{PlotRow, TreeRow};
use crate::level::{HierarchyKeyed, Level};

/// Basal area in ft² of a 1-inch-dbh stem, full-precision form (π / 576),
/// used to back-calculate quadratic mean diameter from BA and TPA. The
/// density expansion uses the truncated tally-sheet form; see
/// [`crate::builder::BA_PER_SQIN`].
pub const BA_PER_SQIN_EXACT: f64 = 0.005454154;

/// Row predicate narrowing the numerator population of a rollup.
pub type TreeFilter<'a> = &'a dyn Fn(&TreeRow) -> bool;

// ── Plain rollup ─────────────────────────────────────────────────────────────

/// One rollup row for a single level value.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelAgg {
    pub value: String,
    /// Unfiltered plot count: the stable per-acre denominator.
    pub plot_count: u32,
    /// Filtered tree count, sentinel rows excluded.
    pub tree_count: u32,
    /// Trees per acre, averaged over the unfiltered plot count.
    pub tpa: f64,
    /// Basal area (ft²/ac), averaged over the unfiltered plot count.
    pub ba: f64,
    /// Quadratic mean dbh, inches; 0 when no filtered trees.
    pub qm_dbh: f64,
}

#[derive(Default)]
struct Acc {
    tree_count: u32,
    tpa_sum: f64,
    ba_sum: f64,
}

impl Acc {
    fn add(&mut self, t: &TreeRow) {
        if !t.is_sentinel() {
            self.tree_count += 1;
        }
        self.tpa_sum += t.density;
        self.ba_sum += t.ba;
    }

    fn finish(self, value: String, plot_count: u32) -> LevelAgg {
        // Plot-less level values (degenerate data) keep their tree sums
        // rather than dividing by zero or being dropped.
        let denom = plot_count.max(1) as f64;
        let tpa = self.tpa_sum / denom;
        let ba = self.ba_sum / denom;
        let qm_dbh = if self.tree_count > 0 && tpa > 0.0 {
            ((ba / tpa) / BA_PER_SQIN_EXACT).sqrt()
        } else {
            0.0
        };
        LevelAgg {
            value,
            plot_count,
            tree_count: self.tree_count,
            tpa,
            ba,
            qm_dbh,
        }
    }
}

/// Count plots per level value over the full, unfiltered plot table.
pub fn plot_counts(plots: &[PlotRow], level: Level) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for p in plots {
        *counts.entry(p.level_key(level).to_string()).or_insert(0) += 1;
    }
    counts
}

/// Roll the tree table up to `level`, optionally narrowing the numerator
/// population with `filter`. Returns one row per distinct level value in the
/// unfiltered base population, in key order.
pub fn aggregate(
    trees: &[TreeRow],
    plots: &[PlotRow],
    level: Level,
    filter: Option<TreeFilter>,
) -> Vec<LevelAgg> {
    let counts = plot_counts(plots, level);

    let mut accs: BTreeMap<String, Acc> = BTreeMap::new();
    for value in counts.keys() {
        accs.entry(value.clone()).or_default();
    }
    for t in trees {
        accs.entry(t.level_key(level).to_string()).or_default();
    }
    for t in trees {
        if filter.is_some_and(|f| !f(t)) {
            continue;
        }
        accs.get_mut(t.level_key(level))
            .expect("seeded above")
            .add(t);
    }

    let orphans = accs.keys().filter(|k| !counts.contains_key(*k)).count();
    if orphans > 0 {
        debug!(orphans, level = level.column(), "level values with no plot rows");
    }

    accs.into_iter()
        .map(|(value, acc)| {
            let plot_count = counts.get(&value).copied().unwrap_or(0);
            acc.finish(value, plot_count)
        })
        .collect()
}

// ── Case breakouts ───────────────────────────────────────────────────────────

/// Categorical column a rollup can be broken out by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Case {
    Species,
    Health,
    Mast,
    SizeClass,
    VertComp,
    SpeciesType,
}

impl Case {
    /// Short column tag used when flattening wide: `METRIC_TAG_Value`.
    pub fn column(&self) -> &'static str {
        match self {
            Case::Species => "SP",
            Case::Health => "HLTH",
            Case::Mast => "MAST",
            Case::SizeClass => "SIZE",
            Case::VertComp => "VERT",
            Case::SpeciesType => "SP_TYPE",
        }
    }

    /// The case value of one tree row. `None` drops the row from the
    /// breakout. Sentinel rows carry the `NoTree` health class so plots with
    /// no tally trees can still resolve a dominant condition.
    pub fn value(&self, t: &TreeRow) -> Option<String> {
        match self {
            Case::Species => {
                if t.is_sentinel() {
                    None
                } else {
                    Some(t.species.clone())
                }
            }
            Case::Health => {
                if t.is_sentinel() {
                    Some("NoTree".to_string())
                } else {
                    t.health.map(|h| h.code().to_string())
                }
            }
            Case::Mast => t.mast.map(|m| m.label().to_string()),
            Case::SizeClass => t.size_class.map(|s| s.label().to_string()),
            Case::VertComp => t.vert_comp.map(|v| v.label().to_string()),
            Case::SpeciesType => t.sp_type.map(|s| s.label().to_string()),
        }
    }

    /// Closed vocabularies pivot to a fixed column set regardless of what
    /// the data happens to contain; the open species vocabulary does not.
    pub fn domain(&self) -> Option<&'static [&'static str]> {
        match self {
            Case::Species => None,
            Case::Health => Some(&["H", "S", "SD", "D", "NoTree"]),
            Case::Mast => Some(&["Hard", "Soft", "Lightseed"]),
            Case::SizeClass => Some(&["Sapling", "Pole", "Saw", "Mature", "OverMature"]),
            Case::VertComp => Some(&["Canopy", "Midstory"]),
            Case::SpeciesType => Some(&["Common", "Uncommon"]),
        }
    }
}

/// One long-form breakout row: a (level value, case value) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseAgg {
    pub value: String,
    pub case_value: String,
    /// Unfiltered plot count of the level value (not of the case).
    pub plot_count: u32,
    pub tree_count: u32,
    pub tpa: f64,
    pub ba: f64,
    pub qm_dbh: f64,
}

/// Roll up by level value and one categorical case, long form. Only
/// observed (level, case) pairs appear; the wide pivot and the assembler's
/// fill policy supply the zeros.
pub fn aggregate_by_case(
    trees: &[TreeRow],
    plots: &[PlotRow],
    level: Level,
    case: Case,
    filter: Option<TreeFilter>,
) -> Vec<CaseAgg> {
    let counts = plot_counts(plots, level);

    let mut accs: BTreeMap<(String, String), Acc> = BTreeMap::new();
    for t in trees {
        if filter.is_some_and(|f| !f(t)) {
            continue;
        }
        let Some(case_value) = case.value(t) else {
            continue;
        };
        accs.entry((t.level_key(level).to_string(), case_value))
            .or_default()
            .add(t);
    }

    accs.into_iter()
        .map(|((value, case_value), acc)| {
            let plot_count = counts.get(&value).copied().unwrap_or(0);
            let agg = acc.finish(value, plot_count);
            CaseAgg {
                value: agg.value,
                case_value,
                plot_count: agg.plot_count,
                tree_count: agg.tree_count,
                tpa: agg.tpa,
                ba: agg.ba,
                qm_dbh: agg.qm_dbh,
            }
        })
        .collect()
}

/// One cross-tabulation row over two cases.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoCaseAgg {
    pub value: String,
    pub case_a: String,
    pub case_b: String,
    pub plot_count: u32,
    pub tree_count: u32,
    pub tpa: f64,
    pub ba: f64,
    pub qm_dbh: f64,
}

/// Roll up by level value and two categorical cases simultaneously, long
/// form. Used for cross-tabulation exports.
pub fn aggregate_two_cases(
    trees: &[TreeRow],
    plots: &[PlotRow],
    level: Level,
    case_a: Case,
    case_b: Case,
    filter: Option<TreeFilter>,
) -> Vec<TwoCaseAgg> {
    let counts = plot_counts(plots, level);

    let mut accs: BTreeMap<(String, String, String), Acc> = BTreeMap::new();
    for t in trees {
        if filter.is_some_and(|f| !f(t)) {
            continue;
        }
        let (Some(a), Some(b)) = (case_a.value(t), case_b.value(t)) else {
            continue;
        };
        accs.entry((t.level_key(level).to_string(), a, b))
            .or_default()
            .add(t);
    }

    accs.into_iter()
        .map(|((value, a, b), acc)| {
            let plot_count = counts.get(&value).copied().unwrap_or(0);
            let agg = acc.finish(value, plot_count);
            TwoCaseAgg {
                value: agg.value,
                case_a: a,
                case_b: b,
                plot_count: agg.plot_count,
                tree_count: agg.tree_count,
                tpa: agg.tpa,
                ba: agg.ba,
                qm_dbh: agg.qm_dbh,
            }
        })
        .collect()
}

// ── Plot-side rollups ────────────────────────────────────────────────────────

/// Mean of one numeric plot attribute per level value.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotMeanRow {
    pub value: String,
    /// Plots with the attribute present.
    pub n: u32,
    pub mean: Option<f64>,
}

pub fn plot_mean(
    plots: &[PlotRow],
    level: Level,
    attr: impl Fn(&PlotRow) -> Option<f64>,
) -> Vec<PlotMeanRow> {
    let mut sums: BTreeMap<String, (u32, f64)> = BTreeMap::new();
    for p in plots {
        let entry = sums.entry(p.level_key(level).to_string()).or_insert((0, 0.0));
        if let Some(v) = attr(p) {
            entry.0 += 1;
            entry.1 += v;
        }
    }
    sums.into_iter()
        .map(|(value, (n, sum))| PlotMeanRow {
            value,
            n,
            mean: (n > 0).then(|| sum / n as f64),
        })
        .collect()
}

/// Earliest and latest collection dates per level value.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRangeRow {
    pub value: String,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

pub fn date_range(plots: &[PlotRow], level: Level) -> Vec<DateRangeRow> {
    let mut ranges: BTreeMap<String, (Option<NaiveDate>, Option<NaiveDate>)> = BTreeMap::new();
    for p in plots {
        let entry = ranges
            .entry(p.level_key(level).to_string())
            .or_insert((None, None));
        if let Some(d) = p.date {
            entry.0 = Some(entry.0.map_or(d, |e| e.min(d)));
            entry.1 = Some(entry.1.map_or(d, |l| l.max(d)));
        }
    }
    ranges
        .into_iter()
        .map(|(value, (earliest, latest))| DateRangeRow { value, earliest, latest })
        .collect()
}

/// Distinct non-sentinel species per level value.
#[derive(Debug, Clone, PartialEq)]
pub struct RichnessRow {
    pub value: String,
    pub count: u32,
}

pub fn species_richness(trees: &[TreeRow], level: Level) -> Vec<RichnessRow> {
    let mut sets: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for t in trees {
        let entry = sets.entry(t.level_key(level).to_string()).or_default();
        if !t.is_sentinel() {
            entry.insert(t.species.as_str());
        }
    }
    sets.into_iter()
        .map(|(value, set)| RichnessRow { value, count: set.len() as u32 })
        .collect()
}

/// Invasive-presence rollup per level value.
#[derive(Debug, Clone, PartialEq)]
pub struct InvasiveRow {
    pub value: String,
    pub plot_count: u32,
    pub invaded: u32,
    /// Percent of plots with an invasive hit; `None` only for a zero plot
    /// count, which cannot happen for rows derived from the plot table.
    pub pct: Option<f64>,
    /// Union of invasive codes seen at this level value, sorted and
    /// comma-joined.
    pub species: String,
}

pub fn invasive_rollup(plots: &[PlotRow], level: Level) -> Vec<InvasiveRow> {
    let mut by_value: BTreeMap<String, (u32, u32, BTreeSet<String>)> = BTreeMap::new();
    for p in plots {
        let entry = by_value
            .entry(p.level_key(level).to_string())
            .or_insert((0, 0, BTreeSet::new()));
        entry.0 += 1;
        if p.inv_present {
            entry.1 += 1;
            for code in p.inv_species.split(',').filter(|s| !s.is_empty()) {
                entry.2.insert(code.to_string());
            }
        }
    }
    by_value
        .into_iter()
        .map(|(value, (plot_count, invaded, set))| InvasiveRow {
            value,
            plot_count,
            invaded,
            pct: (plot_count > 0).then(|| 100.0 * invaded as f64 / plot_count as f64),
            species: set.into_iter().collect::<Vec<_>>().join(","),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::density_contribution;
    use crate::records::{HealthClass, SizeClass};
    use approx::assert_relative_eq;

    fn plot(pid: &str, sid: &str) -> PlotRow {
        PlotRow {
            pid: pid.into(),
            plot: None,
            pool: "P1".into(),
            comp: "C1".into(),
            unit: "U1".into(),
            site: "S1".into(),
            sid: sid.into(),
            ov_clsr: None,
            und_cov: None,
            und_ht: None,
            inv_present: false,
            inv_species: String::new(),
            crew: String::new(),
            date: None,
            age: None,
        }
    }

    fn tree(pid: &str, sid: &str, species: &str, dia: f64, health: Option<HealthClass>) -> TreeRow {
        TreeRow {
            pid: pid.into(),
            sid: sid.into(),
            site: "S1".into(),
            unit: "U1".into(),
            comp: "C1".into(),
            pool: "P1".into(),
            species: species.into(),
            diameter: dia,
            canopy: None,
            health,
            crew: String::new(),
            date: None,
            size_class: SizeClass::from_diameter(dia),
            vert_comp: None,
            large_wildlife: dia >= 30.0,
            ba: if crate::species::is_no_tree(species) { 0.0 } else { 10.0 },
            density: if crate::species::is_no_tree(species) {
                0.0
            } else {
                density_contribution(dia)
            },
            mast: None,
            sp_type: None,
        }
    }

    #[test]
    fn stand_tpa_averages_over_unfiltered_plot_count() {
        // Two plots in one stand: plot 1 carries all the density, plot 2
        // only a sentinel row. The stand TPA is the plot-1 total halved.
        let plots = vec![plot("p1", "St1"), plot("p2", "St1")];
        let trees = vec![
            tree("p1", "St1", "QUAL", 13.54, Some(HealthClass::Healthy)),
            tree("p1", "St1", "QUAL", 13.54, Some(HealthClass::Healthy)),
            tree("p2", "St1", "NoTree", 0.0, None),
        ];

        let per_tree = density_contribution(13.54);
        let aggs = aggregate(&trees, &plots, Level::Sid, None);
        assert_eq!(aggs.len(), 1);
        let st1 = &aggs[0];
        assert_eq!(st1.plot_count, 2);
        assert_eq!(st1.tree_count, 2);
        assert_relative_eq!(st1.tpa, 2.0 * per_tree / 2.0, max_relative = 1e-12);
        assert_relative_eq!(st1.ba, 20.0 / 2.0, max_relative = 1e-12);
    }

    #[test]
    fn filter_excluding_a_plot_keeps_unfiltered_denominator() {
        let plots = vec![plot("p1", "St1"), plot("p2", "St1")];
        let trees = vec![
            tree("p1", "St1", "QUAL", 10.0, Some(HealthClass::Healthy)),
            tree("p2", "St1", "ACSA2", 10.0, Some(HealthClass::Dead)),
        ];

        let live: TreeFilter = &|t: &TreeRow| t.health != Some(HealthClass::Dead);
        let all = aggregate(&trees, &plots, Level::Sid, None);
        let filtered = aggregate(&trees, &plots, Level::Sid, Some(live));

        // The denominator never moves with the filter.
        assert_eq!(all[0].plot_count, filtered[0].plot_count);
        assert_eq!(filtered[0].tree_count, 1);
        assert_relative_eq!(
            filtered[0].tpa,
            density_contribution(10.0) / 2.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn zero_match_level_values_are_present_and_zero_filled() {
        let plots = vec![plot("p1", "St1"), plot("p2", "St2")];
        let trees = vec![tree("p1", "St1", "QUAL", 10.0, Some(HealthClass::Healthy))];

        let none: TreeFilter = &|_| false;
        let aggs = aggregate(&trees, &plots, Level::Sid, Some(none));
        assert_eq!(aggs.len(), 2);
        for agg in &aggs {
            assert_eq!(agg.tree_count, 0);
            assert_relative_eq!(agg.tpa, 0.0);
            assert_relative_eq!(agg.ba, 0.0);
            assert_relative_eq!(agg.qm_dbh, 0.0);
        }
        // And the level values themselves survive.
        let values: Vec<&str> = aggs.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, ["St1", "St2"]);
    }

    #[test]
    fn sentinel_rows_do_not_count_as_trees() {
        let plots = vec![plot("p1", "St1")];
        let trees = vec![
            tree("p1", "St1", "NoTree", 0.0, None),
            tree("p1", "St1", "QUAL", 15.0, Some(HealthClass::Healthy)),
        ];
        let aggs = aggregate(&trees, &plots, Level::Pid, None);
        assert_eq!(aggs[0].tree_count, 1);
    }

    #[test]
    fn single_tree_qm_dbh_recovers_its_diameter() {
        // With one tree, BA/TPA is exactly its stem basal area, so the
        // back-calculated quadratic mean diameter is the diameter itself
        // (up to the truncated/exact constant mismatch).
        let plots = vec![plot("p1", "St1")];
        let trees = vec![tree("p1", "St1", "QUAL", 15.0, Some(HealthClass::Healthy))];
        let aggs = aggregate(&trees, &plots, Level::Pid, None);
        assert_relative_eq!(aggs[0].qm_dbh, 15.0, max_relative = 1e-4);
    }

    #[test]
    fn orphan_tree_rows_keep_their_sums() {
        // A tree whose pid has no plot row: denominator clamps to 1.
        let plots = vec![plot("p1", "St1")];
        let trees = vec![tree("p9", "St9", "QUAL", 10.0, Some(HealthClass::Healthy))];
        let aggs = aggregate(&trees, &plots, Level::Sid, None);

        let orphan = aggs.iter().find(|a| a.value == "St9").unwrap();
        assert_eq!(orphan.plot_count, 0);
        assert_relative_eq!(orphan.tpa, density_contribution(10.0), max_relative = 1e-12);
    }

    #[test]
    fn by_case_keeps_level_denominator_not_case_denominator() {
        let plots = vec![plot("p1", "St1"), plot("p2", "St1")];
        let trees = vec![
            tree("p1", "St1", "QUAL", 10.0, Some(HealthClass::Healthy)),
            tree("p2", "St1", "ACSA2", 10.0, Some(HealthClass::Stressed)),
        ];
        let rows = aggregate_by_case(&trees, &plots, Level::Sid, Case::Species, None);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.plot_count, 2);
            assert_relative_eq!(
                row.tpa,
                density_contribution(10.0) / 2.0,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn health_case_maps_sentinels_to_no_tree() {
        let plots = vec![plot("p1", "St1")];
        let trees = vec![tree("p1", "St1", "NO TREES", 0.0, None)];
        let rows = aggregate_by_case(&trees, &plots, Level::Pid, Case::Health, None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].case_value, "NoTree");
        assert_eq!(rows[0].tree_count, 0);
    }

    #[test]
    fn commonality_case_drops_uncrosswalked_rows() {
        let plots = vec![plot("p1", "St1")];
        let mut common = tree("p1", "St1", "QUAL", 10.0, None);
        common.sp_type = Some(crate::species::SpeciesType::Common);
        // No crosswalk hit: no commonality case value, row dropped from the
        // breakout but not from the base population.
        let unknown = tree("p1", "St1", "XXYY", 10.0, None);

        let rows = aggregate_by_case(
            &[common, unknown],
            &plots,
            Level::Sid,
            Case::SpeciesType,
            None,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].case_value, "Common");
        assert_eq!(rows[0].tree_count, 1);
    }

    #[test]
    fn two_case_cross_tab_stays_long() {
        let plots = vec![plot("p1", "St1")];
        let trees = vec![
            tree("p1", "St1", "QUAL", 10.0, Some(HealthClass::Healthy)),
            tree("p1", "St1", "QUAL", 20.0, Some(HealthClass::Dead)),
        ];
        let rows = aggregate_two_cases(
            &trees,
            &plots,
            Level::Sid,
            Case::Species,
            Case::Health,
            None,
        );
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.case_a == "QUAL"));
        let healths: Vec<&str> = rows.iter().map(|r| r.case_b.as_str()).collect();
        assert_eq!(healths, ["D", "H"]);
    }

    #[test]
    fn plot_mean_skips_missing_values() {
        let mut p1 = plot("p1", "St1");
        p1.ov_clsr = Some(80.0);
        let mut p2 = plot("p2", "St1");
        p2.ov_clsr = None;
        let mut p3 = plot("p3", "St1");
        p3.ov_clsr = Some(60.0);

        let means = plot_mean(&[p1, p2, p3], Level::Sid, |p| p.ov_clsr);
        assert_eq!(means.len(), 1);
        assert_eq!(means[0].n, 2);
        assert_relative_eq!(means[0].mean.unwrap(), 70.0);
    }

    #[test]
    fn richness_counts_distinct_non_sentinel_species() {
        let trees = vec![
            tree("p1", "St1", "QUAL", 10.0, None),
            tree("p1", "St1", "QUAL", 12.0, None),
            tree("p1", "St1", "ACSA2", 8.0, None),
            tree("p1", "St1", "NoTree", 0.0, None),
        ];
        let rows = species_richness(&trees, Level::Sid);
        assert_eq!(rows[0].count, 2);
    }

    #[test]
    fn invasive_rollup_unions_codes() {
        let mut p1 = plot("p1", "St1");
        p1.inv_present = true;
        p1.inv_species = "HUJA,PHAU7".into();
        let mut p2 = plot("p2", "St1");
        p2.inv_present = true;
        p2.inv_species = "PHAR3".into();
        let p3 = plot("p3", "St1");

        let rows = invasive_rollup(&[p1, p2, p3], Level::Sid);
        assert_eq!(rows[0].invaded, 2);
        assert_relative_eq!(rows[0].pct.unwrap(), 200.0 / 3.0, max_relative = 1e-12);
        assert_eq!(rows[0].species, "HUJA,PHAR3,PHAU7");
    }

    #[test]
    fn date_range_tracks_min_and_max() {
        let mut p1 = plot("p1", "St1");
        p1.date = NaiveDate::from_ymd_opt(2023, 6, 14);
        let mut p2 = plot("p2", "St1");
        p2.date = NaiveDate::from_ymd_opt(2023, 5, 2);
        let mut p3 = plot("p3", "St1");
        p3.date = None;

        let rows = date_range(&[p1, p2, p3], Level::Sid);
        assert_eq!(rows[0].earliest, NaiveDate::from_ymd_opt(2023, 5, 2));
        assert_eq!(rows[0].latest, NaiveDate::from_ymd_opt(2023, 6, 14));
    }
}
