//! Size-class family: diameter-class breakouts and the stand-level
//! quadratic mean diameter.

use crate::aggregate::{aggregate, aggregate_by_case, Case};
use crate::dominance::{dominant, TieBreak};
use crate::error::Result;
use crate::frame::Frame;
use crate::level::Level;
use crate::summaries::{base_frame, dominant_frame, pivot_frame, PivotMetric, SummaryInputs};

pub fn build(inputs: &SummaryInputs, level: Level) -> Result<Frame> {
    let SummaryInputs { trees, plots } = *inputs;
    let key = level.column();

    let mut frame = base_frame(inputs, level);

    let by_size = aggregate_by_case(trees, plots, level, Case::SizeClass, None);
    frame = frame.outer_join(
        &pivot_frame(level, &by_size, Case::SizeClass, &[PivotMetric::Tpa, PivotMetric::Ba]),
        key,
    )?;

    let dom = dominant(trees, plots, level, Case::SizeClass, None, TieBreak::Lexical);
    frame = frame.outer_join(&dominant_frame(level, &dom, "SIZE"), key)?;

    let all = aggregate(trees, plots, level, None);
    let mut qmd = Frame::new(vec![key.to_string(), "QMDBH".into()]);
    for a in &all {
        qmd.push_row(vec![a.value.clone().into(), a.qm_dbh.into()]);
    }
    frame = frame.outer_join(&qmd, key)?;

    Ok(frame)
}
