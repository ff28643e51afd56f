//! Output-table schema configuration: ordered column list, per-column fill
//! value, per-column output dtype.
//!
//! Schemas are pure configuration, loaded once per run from CSV files (one
//! row per column: `column,dtype,fill`) and passed into the assembler.
//! The placeholder column name `{LEVEL}` resolves to the key column of
//! whichever hierarchy level a table is assembled for.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::frame::{Frame, Value};
use crate::level::Level;

/// Placeholder column name resolved per level.
pub const LEVEL_PLACEHOLDER: &str = "{LEVEL}";

/// Output dtype of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Text,
    Long,
    Double,
}

impl DType {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "text" | "str" | "string" => Some(Self::Text),
            "long" | "int" | "integer" => Some(Self::Long),
            "double" | "float" => Some(Self::Double),
            _ => None,
        }
    }
}

/// One configured output column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: DType,
    pub fill: Value,
}

#[derive(Debug, Deserialize)]
struct SchemaRow {
    #[serde(rename = "column", default)]
    column: String,
    #[serde(rename = "dtype", default)]
    dtype: String,
    #[serde(rename = "fill", default)]
    fill: String,
}

/// Ordered column schema for one output table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Load a schema CSV. The file stem names the table.
    pub fn from_path(path: &Path) -> Result<Self> {
        let table = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let file = File::open(path)?;
        Self::from_reader(&table, file)
    }

    pub fn from_reader<R: Read>(table: &str, reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        for required in ["column", "dtype", "fill"] {
            if !headers.iter().any(|h| h == required) {
                return Err(EngineError::config(
                    table,
                    format!("schema file missing header {required}"),
                ));
            }
        }

        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        for row in rdr.deserialize::<SchemaRow>() {
            let row = row?;
            let name = row.column.trim().to_string();
            if name.is_empty() {
                return Err(EngineError::config(table, "blank column name"));
            }
            if !seen.insert(name.clone()) {
                return Err(EngineError::config(table, format!("duplicate column {name}")));
            }
            let dtype = DType::from_code(&row.dtype).ok_or_else(|| {
                EngineError::config(table, format!("column {name}: bad dtype {:?}", row.dtype))
            })?;
            let fill = parse_fill(table, &name, dtype, row.fill.trim())?;
            columns.push(ColumnSpec { name, dtype, fill });
        }

        if columns.is_empty() {
            return Err(EngineError::config(table, "schema has no columns"));
        }
        Ok(Self { table: table.to_string(), columns })
    }

    /// Resolve the `{LEVEL}` placeholder to `level`'s key column.
    pub fn resolve_level(&self, level: Level) -> TableSchema {
        let mut out = self.clone();
        for col in &mut out.columns {
            if col.name == LEVEL_PLACEHOLDER {
                col.name = level.column().to_string();
            }
        }
        out
    }

    /// Reindex, fill, and coerce an assembled frame.
    ///
    /// A schema column absent from the frame fails fast as configuration
    /// error; frame columns the schema does not name are dropped. `Null`
    /// and non-finite numeric cells take the column's fill value before
    /// coercion, so no NaN survives into the snapshot.
    pub fn finalize(&self, frame: &Frame) -> Result<Frame> {
        let mut indices = Vec::with_capacity(self.columns.len());
        for spec in &self.columns {
            let idx = frame.col_index(&spec.name).ok_or_else(|| {
                EngineError::config(
                    &self.table,
                    format!("column {} missing from assembled frame", spec.name),
                )
            })?;
            indices.push(idx);
        }

        let mut out = Frame::new(self.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>());
        for row in frame.rows() {
            let mut cells = Vec::with_capacity(self.columns.len());
            for (spec, &idx) in self.columns.iter().zip(&indices) {
                cells.push(coerce(&self.table, spec, &row[idx])?);
            }
            out.push_row(cells);
        }
        Ok(out)
    }
}

fn parse_fill(table: &str, column: &str, dtype: DType, raw: &str) -> Result<Value> {
    match dtype {
        DType::Text => Ok(Value::Str(raw.to_string())),
        DType::Long => {
            if raw.is_empty() {
                return Ok(Value::Int(0));
            }
            raw.parse::<i64>().map(Value::Int).map_err(|_| {
                EngineError::config(table, format!("column {column}: bad long fill {raw:?}"))
            })
        }
        DType::Double => {
            if raw.is_empty() {
                return Ok(Value::Num(0.0));
            }
            raw.parse::<f64>().map(Value::Num).map_err(|_| {
                EngineError::config(table, format!("column {column}: bad double fill {raw:?}"))
            })
        }
    }
}

fn coerce(table: &str, spec: &ColumnSpec, cell: &Value) -> Result<Value> {
    let effective = match cell {
        Value::Null => &spec.fill,
        Value::Num(n) if !n.is_finite() => &spec.fill,
        other => other,
    };
    match (spec.dtype, effective) {
        (DType::Text, Value::Str(_)) => Ok(effective.clone()),
        (DType::Text, v) => Ok(Value::Str(v.render())),
        (DType::Long, Value::Int(_)) => Ok(effective.clone()),
        (DType::Long, Value::Num(n)) => Ok(Value::Int(*n as i64)),
        (DType::Double, Value::Num(_)) => Ok(effective.clone()),
        (DType::Double, Value::Int(i)) => Ok(Value::Num(*i as f64)),
        (dtype, v) => Err(EngineError::config(
            table,
            format!("column {}: cannot coerce {v:?} to {dtype:?}", spec.name),
        )),
    }
}
