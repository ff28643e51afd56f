//! Management family: stocking, regeneration, snags, large wildlife trees,
//! and invasive pressure.

use crate::aggregate::{aggregate, invasive_rollup, LevelAgg};
use crate::builder::TreeRow;
use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::level::Level;
use crate::records::{HealthClass, SizeClass};
use crate::summaries::{base_frame, SummaryInputs};

/// Gingrich (1967) upland-hardwood tree-area coefficients, applied per acre
/// as `TPA × (A + B·Dq + C·Dq²)` with Dq the quadratic mean diameter.
const STOCKING_A: f64 = -0.00507;
const STOCKING_B: f64 = 0.01698;
const STOCKING_C: f64 = 0.00317;

/// Percent stocking for one rollup row.
pub fn stocking_percent(tpa: f64, qm_dbh: f64) -> f64 {
    tpa * (STOCKING_A + STOCKING_B * qm_dbh + STOCKING_C * qm_dbh * qm_dbh)
}

/// Stocking-chart class for one rollup row.
pub fn stocking_class(agg: &LevelAgg) -> &'static str {
    if agg.tree_count == 0 {
        return "Nonstocked";
    }
    let pct = stocking_percent(agg.tpa, agg.qm_dbh);
    if pct >= 100.0 {
        "Overstocked"
    } else if pct >= 60.0 {
        "Fully-Stocked"
    } else if pct >= 35.0 {
        "Moderately-Stocked"
    } else {
        "Understocked"
    }
}

pub fn build(inputs: &SummaryInputs, level: Level) -> Result<Frame> {
    let SummaryInputs { trees, plots } = *inputs;
    let key = level.column();

    let mut frame = base_frame(inputs, level);

    let all = aggregate(trees, plots, level, None);
    let mut stock = Frame::new(vec![
        key.to_string(),
        "STOCK_PCT".into(),
        "STOCK_CLASS".into(),
    ]);
    for a in &all {
        let pct = if a.tree_count == 0 {
            0.0
        } else {
            stocking_percent(a.tpa, a.qm_dbh)
        };
        stock.push_row(vec![
            a.value.clone().into(),
            pct.into(),
            stocking_class(a).into(),
        ]);
    }
    frame = frame.outer_join(&stock, key)?;

    for (column, filter) in [
        (
            "SAP_TPA",
            (&|t: &TreeRow| t.size_class == Some(SizeClass::Sapling)) as &dyn Fn(&TreeRow) -> bool,
        ),
        ("SNAG_TPA", &|t: &TreeRow| t.health == Some(HealthClass::Dead)),
        ("LWT_TPA", &|t: &TreeRow| t.large_wildlife),
    ] {
        let aggs = aggregate(trees, plots, level, Some(filter));
        let mut f = Frame::new(vec![key.to_string(), column.into()]);
        for a in &aggs {
            f.push_row(vec![a.value.clone().into(), a.tpa.into()]);
        }
        frame = frame.outer_join(&f, key)?;
    }

    let mut inv = Frame::new(vec![
        key.to_string(),
        "INV_PLOT_PCT".into(),
        "INV_SP_LIST".into(),
    ]);
    for r in invasive_rollup(plots, level) {
        inv.push_row(vec![
            r.value.into(),
            Value::from_opt_num(r.pct),
            r.species.into(),
        ]);
    }
    frame = frame.outer_join(&inv, key)?;

    Ok(frame)
}
