//! General descriptive family: overall and live-only stand metrics, species
//! richness, invasive presence, structural means, and collection dates.

use crate::aggregate::{aggregate, date_range, invasive_rollup, plot_mean, species_richness};
use crate::builder::TreeRow;
use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::level::Level;
use crate::records::HealthClass;
use crate::summaries::{agg_frame, base_frame, SummaryInputs};

pub fn build(inputs: &SummaryInputs, level: Level) -> Result<Frame> {
    let SummaryInputs { trees, plots } = *inputs;
    let key = level.column();

    let mut frame = base_frame(inputs, level);

    let all = aggregate(trees, plots, level, None);
    frame = frame.outer_join(&agg_frame(level, &all, ""), key)?;

    // Rows with no recorded health count as live; only a definite Dead is
    // excluded.
    let live = aggregate(
        trees,
        plots,
        level,
        Some(&|t: &TreeRow| t.health != Some(HealthClass::Dead)),
    );
    frame = frame.outer_join(&agg_frame(level, &live, "LIVE_"), key)?;

    let mut rich = Frame::new(vec![key.to_string(), "NUM_SP".into()]);
    for r in species_richness(trees, level) {
        rich.push_row(vec![r.value.into(), r.count.into()]);
    }
    frame = frame.outer_join(&rich, key)?;

    let mut inv = Frame::new(vec![
        key.to_string(),
        "INV_PLOT_CT".into(),
        "INV_PLOT_PCT".into(),
    ]);
    for r in invasive_rollup(plots, level) {
        inv.push_row(vec![
            r.value.into(),
            r.invaded.into(),
            Value::from_opt_num(r.pct),
        ]);
    }
    frame = frame.outer_join(&inv, key)?;

    for (column, attr) in [
        ("OV_CLSR_MEAN", (|p| p.ov_clsr) as fn(&crate::builder::PlotRow) -> Option<f64>),
        ("UND_COV_MEAN", |p| p.und_cov),
        ("UND_HT_MEAN", |p| p.und_ht),
    ] {
        let mut means = Frame::new(vec![key.to_string(), column.into()]);
        for r in plot_mean(plots, level, attr) {
            means.push_row(vec![r.value.into(), Value::from_opt_num(r.mean)]);
        }
        frame = frame.outer_join(&means, key)?;
    }

    let mut dates = Frame::new(vec![
        key.to_string(),
        "COL_DATE_MIN".into(),
        "COL_DATE_MAX".into(),
    ]);
    for r in date_range(plots, level) {
        dates.push_row(vec![
            r.value.into(),
            Value::from_opt_str(r.earliest.map(|d| d.to_string())),
            Value::from_opt_str(r.latest.map(|d| d.to_string())),
        ]);
    }
    frame = frame.outer_join(&dates, key)?;

    Ok(frame)
}
