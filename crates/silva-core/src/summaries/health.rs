//! Health family: per-class breakouts, dominant condition, and dead-tree
//! share.

use crate::aggregate::{aggregate, aggregate_by_case, Case};
use crate::builder::TreeRow;
use crate::dominance::{dominant, TieBreak};
use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::level::Level;
use crate::records::HealthClass;
use crate::summaries::{base_frame, dominant_frame, pivot_frame, PivotMetric, SummaryInputs};

pub fn build(inputs: &SummaryInputs, level: Level) -> Result<Frame> {
    let SummaryInputs { trees, plots } = *inputs;
    let key = level.column();

    let mut frame = base_frame(inputs, level);

    let by_health = aggregate_by_case(trees, plots, level, Case::Health, None);
    frame = frame.outer_join(
        &pivot_frame(
            level,
            &by_health,
            Case::Health,
            &[PivotMetric::TreeCt, PivotMetric::Tpa, PivotMetric::Ba],
        ),
        key,
    )?;

    let dom = dominant(trees, plots, level, Case::Health, None, TieBreak::HealthRank);
    frame = frame.outer_join(&dominant_frame(level, &dom, "HLTH"), key)?;

    // Dead share against the same unfiltered baseline the breakout uses.
    let all = aggregate(trees, plots, level, None);
    let dead = aggregate(
        trees,
        plots,
        level,
        Some(&|t: &TreeRow| t.health == Some(HealthClass::Dead)),
    );
    let mut dead_f = Frame::new(vec![key.to_string(), "DEAD_TPA".into(), "DEAD_PCT".into()]);
    for (a, d) in all.iter().zip(&dead) {
        debug_assert_eq!(a.value, d.value);
        let pct = (a.tpa > 0.0).then(|| 100.0 * d.tpa / a.tpa);
        dead_f.push_row(vec![
            d.value.clone().into(),
            d.tpa.into(),
            Value::from_opt_num(pct),
        ]);
    }
    frame = frame.outer_join(&dead_f, key)?;

    Ok(frame)
}
