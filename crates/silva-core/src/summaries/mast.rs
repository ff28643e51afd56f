//! Mast family: wildlife food availability by mast type.

use crate::aggregate::{aggregate, aggregate_by_case, Case};
use crate::builder::TreeRow;
use crate::dominance::{dominant, TieBreak};
use crate::error::Result;
use crate::frame::Frame;
use crate::level::Level;
use crate::species::MastType;
use crate::summaries::{base_frame, dominant_frame, pivot_frame, PivotMetric, SummaryInputs};

pub fn build(inputs: &SummaryInputs, level: Level) -> Result<Frame> {
    let SummaryInputs { trees, plots } = *inputs;
    let key = level.column();

    let mut frame = base_frame(inputs, level);

    let by_mast = aggregate_by_case(trees, plots, level, Case::Mast, None);
    frame = frame.outer_join(
        &pivot_frame(level, &by_mast, Case::Mast, &[PivotMetric::Tpa, PivotMetric::Ba]),
        key,
    )?;

    let dom = dominant(trees, plots, level, Case::Mast, None, TieBreak::Lexical);
    frame = frame.outer_join(&dominant_frame(level, &dom, "MAST"), key)?;

    let hard = aggregate(
        trees,
        plots,
        level,
        Some(&|t: &TreeRow| t.mast == Some(MastType::Hard)),
    );
    let mut hard_f = Frame::new(vec![key.to_string(), "HARD_MAST_TPA".into()]);
    for a in &hard {
        hard_f.push_row(vec![a.value.clone().into(), a.tpa.into()]);
    }
    frame = frame.outer_join(&hard_f, key)?;

    Ok(frame)
}
