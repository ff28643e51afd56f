//! Vertical-composition family: canopy vs. midstory structure.

use crate::aggregate::{aggregate_by_case, Case};
use crate::dominance::{dominant, TieBreak};
use crate::error::Result;
use crate::frame::Frame;
use crate::level::Level;
use crate::summaries::{base_frame, dominant_frame, pivot_frame, PivotMetric, SummaryInputs};

pub fn build(inputs: &SummaryInputs, level: Level) -> Result<Frame> {
    let SummaryInputs { trees, plots } = *inputs;
    let key = level.column();

    let mut frame = base_frame(inputs, level);

    let by_vert = aggregate_by_case(trees, plots, level, Case::VertComp, None);
    frame = frame.outer_join(
        &pivot_frame(
            level,
            &by_vert,
            Case::VertComp,
            &[PivotMetric::Tpa, PivotMetric::Ba, PivotMetric::QmDbh],
        ),
        key,
    )?;

    let dom = dominant(trees, plots, level, Case::VertComp, None, TieBreak::Lexical);
    frame = frame.outer_join(&dominant_frame(level, &dom, "VERT"), key)?;

    Ok(frame)
}
