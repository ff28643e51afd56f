//! Age family: rollups of the age-subplot observations carried on the plot
//! table. Field age is the collection year minus the estimated origin year.

use std::collections::BTreeMap;

use chrono::Datelike;

use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::level::{HierarchyKeyed, Level};
use crate::summaries::SummaryInputs;

#[derive(Default)]
struct AgeAcc {
    plots: u32,
    origin: (u32, f64),
    rings: (u32, f64),
    dia: (u32, f64),
    age: (u32, f64),
}

fn mean(acc: (u32, f64)) -> Option<f64> {
    (acc.0 > 0).then(|| acc.1 / acc.0 as f64)
}

pub fn build(inputs: &SummaryInputs, level: Level) -> Result<Frame> {
    let mut accs: BTreeMap<String, AgeAcc> = BTreeMap::new();
    for p in inputs.plots {
        let acc = accs.entry(p.level_key(level).to_string()).or_default();
        let Some(age) = &p.age else { continue };
        acc.plots += 1;
        if let Some(origin) = age.origin {
            acc.origin.0 += 1;
            acc.origin.1 += origin as f64;
            if let Some(year) = p.date.map(|d| d.year()) {
                acc.age.0 += 1;
                acc.age.1 += (year - origin) as f64;
            }
        }
        if let Some(rings) = age.rings {
            acc.rings.0 += 1;
            acc.rings.1 += rings as f64;
        }
        if age.diameter > 0.0 {
            acc.dia.0 += 1;
            acc.dia.1 += age.diameter;
        }
    }

    let mut f = Frame::new(vec![
        level.column().to_string(),
        "AGE_PLOT_CT".into(),
        "ORIG_MEAN".into(),
        "RING_MEAN".into(),
        "AGE_DIA_MEAN".into(),
        "AGE_MEAN".into(),
    ]);
    for (value, acc) in accs {
        f.push_row(vec![
            value.into(),
            acc.plots.into(),
            Value::from_opt_num(mean(acc.origin)),
            Value::from_opt_num(mean(acc.rings)),
            Value::from_opt_num(mean(acc.dia)),
            Value::from_opt_num(mean(acc.age)),
        ]);
    }
    Ok(f)
}
