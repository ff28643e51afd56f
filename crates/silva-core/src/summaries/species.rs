//! Species family: dominant species, richness, and the ranked top-five
//! block with per-rank health re-resolution.

use std::collections::BTreeMap;

use crate::aggregate::{species_richness, Case};
use crate::dominance::{dominant, top_species, TieBreak, TopSpeciesRow};
use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::level::Level;
use crate::summaries::{base_frame, dominant_frame, SummaryInputs};

/// Ranks carried in the wide top-species block.
pub const TOP_N: usize = 5;

pub fn build(inputs: &SummaryInputs, level: Level) -> Result<Frame> {
    let SummaryInputs { trees, plots } = *inputs;
    let key = level.column();

    let mut frame = base_frame(inputs, level);

    let dom = dominant(trees, plots, level, Case::Species, None, TieBreak::Lexical);
    frame = frame.outer_join(&dominant_frame(level, &dom, "SP"), key)?;

    let mut rich = Frame::new(vec![key.to_string(), "NUM_SP".into()]);
    for r in species_richness(trees, level) {
        rich.push_row(vec![r.value.into(), r.count.into()]);
    }
    frame = frame.outer_join(&rich, key)?;

    let tops = top_species(trees, plots, level, TOP_N, None);
    frame = frame.outer_join(&top_block(level, &tops), key)?;

    Ok(frame)
}

/// Flatten ranked rows wide: `SPn`, `SPn_TPA`, `SPn_PCT`, `SPn_HLTH`,
/// `SPn_DEAD_TPA` for n in 1..=5. Ranks beyond the observed species stay
/// null for the schema fill to resolve.
fn top_block(level: Level, tops: &[TopSpeciesRow]) -> Frame {
    let mut columns = vec![level.column().to_string()];
    for n in 1..=TOP_N {
        columns.push(format!("SP{n}"));
        columns.push(format!("SP{n}_TPA"));
        columns.push(format!("SP{n}_PCT"));
        columns.push(format!("SP{n}_HLTH"));
        columns.push(format!("SP{n}_DEAD_TPA"));
    }

    let mut grouped: BTreeMap<&str, BTreeMap<u32, &TopSpeciesRow>> = BTreeMap::new();
    for r in tops {
        grouped.entry(r.value.as_str()).or_default().insert(r.rank, r);
    }

    let mut f = Frame::new(columns);
    for (value, by_rank) in grouped {
        let mut cells = vec![Value::Str(value.to_string())];
        for n in 1..=TOP_N {
            match by_rank.get(&(n as u32)) {
                Some(r) => {
                    cells.push(r.species.clone().into());
                    cells.push(r.tpa.into());
                    cells.push(Value::from_opt_num(r.pct));
                    cells.push(Value::from_opt_str(r.dom_health.clone()));
                    cells.push(r.dead_tpa.into());
                }
                None => cells.extend([
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                ]),
            }
        }
        f.push_row(cells);
    }
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summaries::fixtures::standard_tables;
    use approx::assert_relative_eq;

    #[test]
    fn dominant_species_and_top_block() {
        let (trees, plots) = standard_tables();
        let inputs = SummaryInputs { trees: &trees, plots: &plots };
        let f = build(&inputs, Level::Sid).unwrap();

        // St1: the 6" maple expands hardest.
        assert_eq!(f.get(0, "DOM_SP"), Some(&Value::Str("ACSA2".into())));
        assert_eq!(f.get(0, "SP1"), Some(&Value::Str("ACSA2".into())));
        assert_eq!(f.get(0, "SP2"), Some(&Value::Str("QUAL".into())));
        assert_eq!(f.get(0, "SP3"), Some(&Value::Str("PRSE2".into())));
        // Only three species present: rank 4 stays null.
        assert_eq!(f.get(0, "SP4"), Some(&Value::Null));

        // The dead cherry's health re-resolves within its own rank.
        assert_eq!(f.get(0, "SP3_HLTH"), Some(&Value::Str("D".into())));
        assert_eq!(f.get(0, "SP1_HLTH"), Some(&Value::Str("S".into())));
    }

    #[test]
    fn pct_shares_sum_to_the_whole_population() {
        let (trees, plots) = standard_tables();
        let inputs = SummaryInputs { trees: &trees, plots: &plots };
        let f = build(&inputs, Level::Sid).unwrap();

        let mut total = 0.0;
        for n in 1..=3 {
            let Some(Value::Num(pct)) = f.get(0, &format!("SP{n}_PCT")) else {
                panic!("SP{n}_PCT should be numeric");
            };
            total += *pct;
        }
        assert_relative_eq!(total, 100.0, max_relative = 1e-9);
    }
}
