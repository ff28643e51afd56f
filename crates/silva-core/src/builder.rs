//! Tree/plot table builder: turns raw survey records into the two canonical
//! intermediate tables every summary is computed from.
//!
//! Both builders are pure functions of their inputs; running them twice on
//! the same records yields identical tables.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::level::{make_pid, HierarchyKeyed, Level};
use crate::records::{AgeRecord, CanopyClass, FixedRecord, HealthClass, SizeClass, TreeRecord, VertComp};
use crate::species::{is_invasive, is_no_tree, MastType, SpeciesCrosswalk, SpeciesType};

// ── Prism constants ──────────────────────────────────────────────────────────

/// Basal-area factor of the prism sweep: every tallied tree represents
/// 10 ft² of basal area per acre.
pub const BAF: f64 = 10.0;

/// Basal area in ft² of a 1-inch-dbh stem as carried on the legacy tally
/// sheets (π / 576 truncated to four significant digits). The quadratic
/// mean diameter back-calculation uses the longer form of the same
/// constant; see [`crate::aggregate::BA_PER_SQIN_EXACT`].
pub const BA_PER_SQIN: f64 = 0.005454;

/// Diameter (inches) at and above which a tree is a large wildlife tree.
pub const LARGE_WILDLIFE_DIA: f64 = 30.0;

/// One tree's contribution to trees-per-acre under the BAF-10 prism model:
/// the 10 ft²/ac a tally represents, divided by the stem's own basal area
/// `0.005454 × dbh²`. Zero for the sentinel diameter.
pub fn density_contribution(diameter: f64) -> f64 {
    if diameter > 0.0 {
        BAF / (BA_PER_SQIN * diameter * diameter)
    } else {
        0.0
    }
}

// ── Derived rows ─────────────────────────────────────────────────────────────

/// One tree-table row: the raw tally plus every derived attribute and the
/// hierarchy keys joined from the plot table.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRow {
    pub pid: String,
    pub sid: String,
    pub site: String,
    pub unit: String,
    pub comp: String,
    pub pool: String,
    pub species: String,
    pub diameter: f64,
    pub canopy: Option<CanopyClass>,
    pub health: Option<HealthClass>,
    pub crew: String,
    pub date: Option<NaiveDate>,
    pub size_class: Option<SizeClass>,
    pub vert_comp: Option<VertComp>,
    /// Diameter at or above [`LARGE_WILDLIFE_DIA`].
    pub large_wildlife: bool,
    /// Basal-area contribution: [`BAF`] for a real tree, 0 for a sentinel row.
    pub ba: f64,
    /// Trees-per-acre contribution, see [`density_contribution`].
    pub density: f64,
    pub mast: Option<MastType>,
    pub sp_type: Option<SpeciesType>,
}

impl TreeRow {
    /// True for "no tree" sentinel rows.
    pub fn is_sentinel(&self) -> bool {
        is_no_tree(&self.species)
    }
}

impl HierarchyKeyed for TreeRow {
    fn level_key(&self, level: Level) -> &str {
        match level {
            Level::Pid => &self.pid,
            Level::Sid => &self.sid,
            Level::Site => &self.site,
            Level::Unit => &self.unit,
            Level::Comp => &self.comp,
            Level::Pool => &self.pool,
        }
    }
}

/// Age-subplot observation carried on a plot row.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeData {
    pub species: String,
    pub diameter: f64,
    pub rings: Option<u32>,
    pub origin: Option<i32>,
    pub growth: String,
}

/// One plot-table row: a fixed-plot observation, its optional age-subplot
/// observation, and the invasive-species scan result.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotRow {
    pub pid: String,
    pub plot: Option<u32>,
    pub pool: String,
    pub comp: String,
    pub unit: String,
    pub site: String,
    pub sid: String,
    pub ov_clsr: Option<f64>,
    pub und_cov: Option<f64>,
    pub und_ht: Option<f64>,
    pub inv_present: bool,
    /// Sorted, deduplicated, comma-joined invasive codes found in this
    /// plot's species slots; empty when none.
    pub inv_species: String,
    pub crew: String,
    pub date: Option<NaiveDate>,
    pub age: Option<AgeData>,
}

impl PlotRow {
    /// The flag as exported: `"Yes"` / `"No"`.
    pub fn inv_present_label(&self) -> &'static str {
        if self.inv_present {
            "Yes"
        } else {
            "No"
        }
    }
}

impl HierarchyKeyed for PlotRow {
    fn level_key(&self, level: Level) -> &str {
        match level {
            Level::Pid => &self.pid,
            Level::Sid => &self.sid,
            Level::Site => &self.site,
            Level::Unit => &self.unit,
            Level::Comp => &self.comp,
            Level::Pool => &self.pool,
        }
    }
}

// ── Tree table ───────────────────────────────────────────────────────────────

/// Build the tree table: join hierarchy keys from the plot table by plot id
/// and derive size class, stratum, contributions, and crosswalk types.
///
/// A species code absent from the crosswalk derives `None` types. A plot id
/// with no plot-table row keeps blank hierarchy keys; the aggregator
/// tolerates those.
pub fn build_tree_table(
    records: &[TreeRecord],
    plots: &[PlotRow],
    crosswalk: &SpeciesCrosswalk,
) -> Vec<TreeRow> {
    let by_pid: HashMap<&str, &PlotRow> =
        plots.iter().map(|p| (p.pid.as_str(), p)).collect();

    let mut unmatched = 0usize;
    let rows = records
        .iter()
        .map(|rec| {
            let pid = rec.pid.trim().to_string();
            let plot = by_pid.get(pid.as_str()).copied();
            if plot.is_none() {
                unmatched += 1;
            }

            let sentinel = is_no_tree(&rec.species);
            // Sentinel rows carry whatever the crew left in the diameter
            // column; force it to the sentinel diameter.
            let diameter = if sentinel { 0.0 } else { rec.diameter };
            let info = if sentinel {
                None
            } else {
                crosswalk.lookup(&rec.species)
            };

            TreeRow {
                pid,
                sid: plot.map_or(String::new(), |p| p.sid.clone()),
                site: plot.map_or(String::new(), |p| p.site.clone()),
                unit: plot.map_or(String::new(), |p| p.unit.clone()),
                comp: plot.map_or(String::new(), |p| p.comp.clone()),
                pool: plot.map_or(String::new(), |p| p.pool.clone()),
                species: rec.species.trim().to_string(),
                diameter,
                canopy: rec.canopy,
                health: rec.health,
                crew: rec.crew.trim().to_string(),
                date: rec.date,
                size_class: SizeClass::from_diameter(diameter),
                vert_comp: rec.canopy.map(VertComp::from_canopy),
                large_wildlife: !sentinel && diameter >= LARGE_WILDLIFE_DIA,
                ba: if sentinel { 0.0 } else { BAF },
                density: density_contribution(diameter),
                mast: info.and_then(|i| i.mast),
                sp_type: info.and_then(|i| i.sp_type),
            }
        })
        .collect();

    if unmatched > 0 {
        warn!(unmatched, "tree records with no matching plot row");
    }
    rows
}

// ── Plot table ───────────────────────────────────────────────────────────────

/// Build the plot table: left-join age subplots onto fixed plots by plot id
/// and run the invasive-species scan over the eight species slots.
pub fn build_plot_table(fixed: &[FixedRecord], age: &[AgeRecord]) -> Vec<PlotRow> {
    let mut age_by_pid: HashMap<String, &AgeRecord> = HashMap::new();
    for rec in age {
        let pid = rec.pid.trim().to_string();
        if pid.is_empty() {
            continue;
        }
        // One age subplot per plot; keep the first row on duplicates.
        age_by_pid.entry(pid).or_insert(rec);
    }

    // First pass: does any slot anywhere match the invasive set? When no row
    // matches, skip the per-row list computation entirely.
    let any_invasive = fixed
        .iter()
        .any(|f| f.species_slots().iter().any(|s| is_invasive(s)));

    let mut rows: Vec<PlotRow> = fixed
        .iter()
        .map(|rec| {
            let mut pid = rec.pid.trim().to_string();
            if pid.is_empty() {
                if let Some(plot) = rec.plot {
                    if !rec.sid.trim().is_empty() {
                        pid = make_pid(&rec.sid, plot);
                    }
                }
            }

            let (inv_present, inv_species) = if any_invasive {
                invasive_scan(rec)
            } else {
                (false, String::new())
            };

            PlotRow {
                pid: pid.clone(),
                plot: rec.plot,
                pool: rec.pool.trim().to_string(),
                comp: rec.comp.trim().to_string(),
                unit: rec.unit.trim().to_string(),
                site: rec.site.trim().to_string(),
                sid: rec.sid.trim().to_string(),
                ov_clsr: rec.ov_clsr,
                und_cov: rec.und_cov,
                und_ht: rec.und_ht,
                inv_present,
                inv_species,
                crew: rec.crew.trim().to_string(),
                date: rec.date,
                age: age_by_pid.get(&pid).map(|a| AgeData {
                    species: a.species.trim().to_string(),
                    diameter: a.diameter,
                    rings: a.rings,
                    origin: a.origin,
                    growth: a.growth.trim().to_string(),
                }),
            }
        })
        .collect();

    let with_age = rows.iter().filter(|r| r.age.is_some()).count();
    debug!(
        plots = rows.len(),
        with_age,
        invasive = rows.iter().filter(|r| r.inv_present).count(),
        "plot table built"
    );

    rows.sort_by(|a, b| a.pid.cmp(&b.pid));
    rows
}

/// Collect the matched invasive codes from one plot's slots: sorted,
/// deduplicated, comma-joined.
fn invasive_scan(rec: &FixedRecord) -> (bool, String) {
    let mut matched: Vec<String> = rec
        .species_slots()
        .iter()
        .filter(|s| is_invasive(s))
        .map(|s| crate::species::normalize_code(s))
        .collect();
    if matched.is_empty() {
        return (false, String::new());
    }
    matched.sort();
    matched.dedup();
    (true, matched.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tree(pid: &str, species: &str, dia: f64) -> TreeRecord {
        TreeRecord {
            pid: pid.into(),
            species: species.into(),
            diameter: dia,
            canopy: Some(CanopyClass::Dominant),
            health: Some(HealthClass::Healthy),
            crew: "AB/CD".into(),
            date: NaiveDate::from_ymd_opt(2023, 6, 1),
        }
    }

    fn fixed(pid: &str, sid: &str) -> FixedRecord {
        FixedRecord {
            pid: pid.into(),
            plot: Some(1),
            pool: "P1".into(),
            comp: "C1".into(),
            unit: "U1".into(),
            site: "S1".into(),
            sid: sid.into(),
            ov_clsr: Some(80.0),
            und_cov: Some(25.0),
            und_ht: Some(4.0),
            grd_sp1: String::new(),
            grd_sp2: String::new(),
            grd_sp3: String::new(),
            grd_sp4: String::new(),
            not_sp1: String::new(),
            not_sp2: String::new(),
            not_sp3: String::new(),
            not_sp4: String::new(),
            crew: "AB/CD".into(),
            date: NaiveDate::from_ymd_opt(2023, 6, 1),
        }
    }

    fn crosswalk() -> SpeciesCrosswalk {
        let mut x = SpeciesCrosswalk::new();
        x.insert(
            "ACSA2",
            crate::species::SpeciesInfo {
                common_name: "sugar maple".into(),
                sp_type: Some(SpeciesType::Common),
                mast: Some(MastType::Lightseed),
            },
        );
        x.insert(
            "QUAL",
            crate::species::SpeciesInfo {
                common_name: "white oak".into(),
                sp_type: Some(SpeciesType::Common),
                mast: Some(MastType::Hard),
            },
        );
        x
    }

    #[test]
    fn ten_inch_maple_derives_pole_canopy_and_contributions() {
        let plots = build_plot_table(&[fixed("St1p0001", "St1")], &[]);
        let rows = build_tree_table(&[tree("St1p0001", "ACSA2", 10.0)], &plots, &crosswalk());

        let t = &rows[0];
        assert_eq!(t.size_class, Some(SizeClass::Pole));
        assert_eq!(t.vert_comp, Some(VertComp::Canopy));
        assert_relative_eq!(t.ba, 10.0);
        assert_relative_eq!(t.density, 10.0 / (0.005454 * 100.0), max_relative = 1e-12);
        assert_relative_eq!(t.density, 18.335, max_relative = 1e-4);
        assert_eq!(t.mast, Some(MastType::Lightseed));
        assert_eq!(t.sid, "St1");
        assert_eq!(t.pool, "P1");
        assert!(!t.large_wildlife);
    }

    #[test]
    fn sentinel_row_zeroes_every_contribution() {
        let plots = build_plot_table(&[fixed("St1p0001", "St1")], &[]);
        // Crews sometimes leave a diameter on the sentinel row.
        let mut rec = tree("St1p0001", "NoTree", 7.0);
        rec.canopy = None;
        rec.health = None;
        let rows = build_tree_table(&[rec], &plots, &crosswalk());

        let t = &rows[0];
        assert!(t.is_sentinel());
        assert_relative_eq!(t.diameter, 0.0);
        assert_relative_eq!(t.ba, 0.0);
        assert_relative_eq!(t.density, 0.0);
        assert_eq!(t.size_class, None);
    }

    #[test]
    fn large_wildlife_flag_at_thirty_inches() {
        let plots = build_plot_table(&[fixed("St1p0001", "St1")], &[]);
        let rows = build_tree_table(
            &[
                tree("St1p0001", "QUAL", 29.9),
                tree("St1p0001", "QUAL", 30.0),
            ],
            &plots,
            &crosswalk(),
        );
        assert!(!rows[0].large_wildlife);
        assert!(rows[1].large_wildlife);
    }

    #[test]
    fn crosswalk_miss_derives_none_types() {
        let plots = build_plot_table(&[fixed("St1p0001", "St1")], &[]);
        let rows = build_tree_table(&[tree("St1p0001", "XXYY", 8.0)], &plots, &crosswalk());
        assert_eq!(rows[0].mast, None);
        assert_eq!(rows[0].sp_type, None);
    }

    #[test]
    fn unmatched_pid_keeps_blank_hierarchy() {
        let plots = build_plot_table(&[fixed("St1p0001", "St1")], &[]);
        let rows = build_tree_table(&[tree("St9p0009", "QUAL", 12.0)], &plots, &crosswalk());
        assert_eq!(rows[0].sid, "");
        assert_eq!(rows[0].pool, "");
    }

    #[test]
    fn age_left_join_keeps_plots_without_age_rows() {
        let age = AgeRecord {
            pid: "St1p0001".into(),
            species: "QUAL".into(),
            diameter: 14.0,
            rings: Some(62),
            origin: Some(1961),
            growth: "M".into(),
            crew: "AB".into(),
            date: NaiveDate::from_ymd_opt(2023, 6, 1),
        };
        let plots = build_plot_table(&[fixed("St1p0001", "St1"), fixed("St1p0002", "St1")], &[age]);

        assert_eq!(plots.len(), 2);
        let aged = plots.iter().find(|p| p.pid == "St1p0001").unwrap();
        assert_eq!(aged.age.as_ref().unwrap().origin, Some(1961));
        assert!(plots.iter().find(|p| p.pid == "St1p0002").unwrap().age.is_none());
    }

    #[test]
    fn invasive_scan_sorts_and_dedups() {
        let mut a = fixed("St1p0001", "St1");
        a.grd_sp2 = "PHAU7".into();
        a.not_sp1 = "huja".into();
        a.not_sp3 = "PHAU7".into();
        let b = fixed("St1p0002", "St1");

        let plots = build_plot_table(&[a, b], &[]);
        let hit = plots.iter().find(|p| p.pid == "St1p0001").unwrap();
        assert!(hit.inv_present);
        assert_eq!(hit.inv_species, "HUJA,PHAU7");
        assert_eq!(hit.inv_present_label(), "Yes");

        let miss = plots.iter().find(|p| p.pid == "St1p0002").unwrap();
        assert!(!miss.inv_present);
        assert_eq!(miss.inv_species, "");
    }

    #[test]
    fn no_invasives_anywhere_short_circuits_to_all_no() {
        let plots = build_plot_table(&[fixed("St1p0001", "St1"), fixed("St1p0002", "St1")], &[]);
        assert!(plots.iter().all(|p| !p.inv_present && p.inv_species.is_empty()));
    }

    #[test]
    fn blank_pid_is_synthesized_from_sid_and_plot() {
        let mut rec = fixed("", "St7");
        rec.plot = Some(23);
        let plots = build_plot_table(&[rec], &[]);
        assert_eq!(plots[0].pid, "St7p0023");
    }

    #[test]
    fn builders_are_idempotent() {
        let mut a = fixed("St1p0001", "St1");
        a.grd_sp1 = "HUJA".into();
        let fixed_recs = vec![a, fixed("St1p0002", "St1")];
        let tree_recs = vec![
            tree("St1p0001", "ACSA2", 10.0),
            tree("St1p0002", "NoTree", 0.0),
        ];

        let p1 = build_plot_table(&fixed_recs, &[]);
        let p2 = build_plot_table(&fixed_recs, &[]);
        assert_eq!(p1, p2);

        let t1 = build_tree_table(&tree_recs, &p1, &crosswalk());
        let t2 = build_tree_table(&tree_recs, &p2, &crosswalk());
        assert_eq!(t1, t2);
    }
}
