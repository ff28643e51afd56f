//! Flat-table snapshot store.
//!
//! The feature-class layer the survey tables live in is opaque to the
//! engine; this module reads and writes its CSV export form. Readers check
//! required headers before deserializing so a missing column fails as an
//! input-shape error naming the table and column, not a serde error deep in
//! a row. Writers overwrite whole snapshots; there are no append semantics.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::frame::Frame;
use crate::records::{AgeRecord, FixedRecord, TreeRecord};

/// Base names of the three input tables inside a survey export directory.
pub const PRISM_TABLE: &str = "prism_plots";
pub const FIXED_TABLE: &str = "fixed_plots";
pub const AGE_TABLE: &str = "age_plots";

const PRISM_COLUMNS: [&str; 7] = ["PID", "TR_SP", "TR_DIA", "TR_CL", "TR_HLTH", "COL_CREW", "COL_DATE"];
const FIXED_COLUMNS: [&str; 20] = [
    "PID", "PLOT", "POOL", "COMP", "UNIT", "SITE", "SID", "OV_CLSR", "UND_COV", "UND_HT",
    "GRD_SP1", "GRD_SP2", "GRD_SP3", "GRD_SP4", "NOT_SP1", "NOT_SP2", "NOT_SP3", "NOT_SP4",
    "COL_CREW", "COL_DATE",
];
const AGE_COLUMNS: [&str; 8] = [
    "PID", "AGE_SP", "AGE_DIA", "AGE_RING", "AGE_ORIG", "AGE_GRW", "COL_CREW", "COL_DATE",
];

fn read_table<T: DeserializeOwned, R: Read>(
    table: &str,
    required: &[&str],
    reader: R,
) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(EngineError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for row in rdr.deserialize::<T>() {
        rows.push(row?);
    }
    debug!(table, rows = rows.len(), "table read");
    Ok(rows)
}

pub fn read_tree_table(path: &Path) -> Result<Vec<TreeRecord>> {
    read_table(PRISM_TABLE, &PRISM_COLUMNS, File::open(path)?)
}

pub fn read_fixed_table(path: &Path) -> Result<Vec<FixedRecord>> {
    read_table(FIXED_TABLE, &FIXED_COLUMNS, File::open(path)?)
}

pub fn read_age_table(path: &Path) -> Result<Vec<AgeRecord>> {
    read_table(AGE_TABLE, &AGE_COLUMNS, File::open(path)?)
}

/// Write one snapshot, fully replacing anything at `path`.
pub fn write_frame(path: &Path, frame: &Frame) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(frame.columns())?;
    for row in frame.rows() {
        wtr.write_record(row.iter().map(|v| v.render()))?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Value;
    use crate::records::HealthClass;

    const PRISM_CSV: &str = "\
PID,TR_SP,TR_DIA,TR_CL,TR_HLTH,COL_CREW,COL_DATE
St1p0001,QUAL,10.0,D,H,AB/CD,2023-06-14
St1p0002,NoTree,,,,AB/CD,6/15/2023
";

    #[test]
    fn prism_rows_deserialize_with_blanks() {
        let rows: Vec<TreeRecord> =
            read_table(PRISM_TABLE, &PRISM_COLUMNS, PRISM_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].health, Some(HealthClass::Healthy));
        assert_eq!(rows[1].diameter, 0.0);
        assert_eq!(rows[1].canopy, None);
        assert!(rows[1].date.is_some());
    }

    #[test]
    fn missing_column_names_table_and_column() {
        let bad = "PID,TR_SP,TR_DIA\nSt1p0001,QUAL,10\n";
        let err = read_table::<TreeRecord, _>(PRISM_TABLE, &PRISM_COLUMNS, bad.as_bytes())
            .unwrap_err();
        match err {
            EngineError::MissingColumn { table, column } => {
                assert_eq!(table, "prism_plots");
                assert_eq!(column, "TR_CL");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn frames_write_rendered_cells() {
        let mut f = Frame::new(vec!["SID", "TPA", "DOM_SP"]);
        f.push_row(vec!["St1".into(), Value::Num(12.5), Value::Null]);

        let dir = std::env::temp_dir().join("silva-store-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("general_sid.csv");
        write_frame(&path, &f).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "SID,TPA,DOM_SP\nSt1,12.5,\n");
    }
}
