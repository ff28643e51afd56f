//! Minimal wide-table model for assembled summary outputs.
//!
//! Typed engine results become `Frame`s only at the assembly boundary, where
//! column order, fill, and dtype are governed by external schema
//! configuration rather than Rust types.

use std::collections::HashMap;

use crate::error::{EngineError, Result};

/// One cell. `Null` marks a value absent after an outer join; the schema
/// fill step replaces it before export.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Num(f64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Cell text as written to a snapshot; `Null` renders empty.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Num(n) => n.to_string(),
        }
    }

    pub fn from_opt_num(v: Option<f64>) -> Value {
        v.map_or(Value::Null, Value::Num)
    }

    pub fn from_opt_str(v: Option<String>) -> Value {
        v.map_or(Value::Null, Value::Str)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

/// An ordered-column table of [`Value`] cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new<S: Into<String>>(columns: Vec<S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row. The row must match the column arity.
    pub fn push_row(&mut self, row: Vec<Value>) {
        assert_eq!(row.len(), self.columns.len(), "row arity mismatch");
        self.rows.push(row);
    }

    /// Cell lookup by row index and column name, for assertions and joins.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.col_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// The rendered key cell of each row in `column`.
    fn key_of(&self, row: &[Value], idx: usize) -> String {
        row[idx].render()
    }

    /// Full outer join on the `on` column, which must exist in both frames.
    ///
    /// Result columns are self's columns followed by the other frame's
    /// (minus its key). Left rows keep their order, with unmatched right
    /// rows appended in their own order; absent cells are `Null`. Keys are
    /// expected unique per frame (aggregate output always is); on duplicates
    /// the first match wins.
    pub fn outer_join(&self, other: &Frame, on: &str) -> Result<Frame> {
        let left_key = self.col_index(on).ok_or_else(|| EngineError::MissingColumn {
            table: "join(left)".into(),
            column: on.into(),
        })?;
        let right_key = other.col_index(on).ok_or_else(|| EngineError::MissingColumn {
            table: "join(right)".into(),
            column: on.into(),
        })?;

        let mut columns = self.columns.clone();
        let right_cols: Vec<usize> = (0..other.columns.len()).filter(|&i| i != right_key).collect();
        for &i in &right_cols {
            columns.push(other.columns[i].clone());
        }

        let mut right_by_key: HashMap<String, usize> = HashMap::new();
        for (i, row) in other.rows.iter().enumerate() {
            right_by_key.entry(other.key_of(row, right_key)).or_insert(i);
        }

        let mut out = Frame::new(columns);
        let mut matched = vec![false; other.rows.len()];

        for row in &self.rows {
            let mut cells = row.clone();
            match right_by_key.get(&self.key_of(row, left_key)) {
                Some(&ri) => {
                    matched[ri] = true;
                    for &ci in &right_cols {
                        cells.push(other.rows[ri][ci].clone());
                    }
                }
                None => cells.extend(std::iter::repeat(Value::Null).take(right_cols.len())),
            }
            out.push_row(cells);
        }

        for (ri, row) in other.rows.iter().enumerate() {
            if matched[ri] {
                continue;
            }
            let mut cells = vec![Value::Null; self.columns.len()];
            cells[left_key] = row[right_key].clone();
            for &ci in &right_cols {
                cells.push(row[ci].clone());
            }
            out.push_row(cells);
        }

        Ok(out)
    }

    /// Sort rows by the rendered key in `column`.
    pub fn sort_by(&mut self, column: &str) {
        if let Some(idx) = self.col_index(column) {
            self.rows.sort_by(|a, b| a[idx].render().cmp(&b[idx].render()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left() -> Frame {
        let mut f = Frame::new(vec!["SID", "TPA"]);
        f.push_row(vec!["St1".into(), 10.0.into()]);
        f.push_row(vec!["St2".into(), 0.0.into()]);
        f
    }

    #[test]
    fn outer_join_matches_and_pads() {
        let mut right = Frame::new(vec!["SID", "DOM_SP"]);
        right.push_row(vec!["St1".into(), "QUAL".into()]);
        right.push_row(vec!["St3".into(), "ACSA2".into()]);

        let joined = left().outer_join(&right, "SID").unwrap();
        assert_eq!(joined.columns(), &["SID", "TPA", "DOM_SP"]);
        assert_eq!(joined.n_rows(), 3);

        assert_eq!(joined.get(0, "DOM_SP"), Some(&Value::Str("QUAL".into())));
        // Left row with no right match pads Null.
        assert_eq!(joined.get(1, "DOM_SP"), Some(&Value::Null));
        // Right-only row keeps its key, pads the left side.
        assert_eq!(joined.get(2, "SID"), Some(&Value::Str("St3".into())));
        assert_eq!(joined.get(2, "TPA"), Some(&Value::Null));
    }

    #[test]
    fn outer_join_missing_key_column_errors() {
        let right = Frame::new(vec!["POOL", "X"]);
        let err = left().outer_join(&right, "SID").unwrap_err();
        assert!(matches!(err, EngineError::MissingColumn { .. }));
    }

    #[test]
    fn sort_by_orders_rendered_keys() {
        let mut f = Frame::new(vec!["SID"]);
        f.push_row(vec!["St2".into()]);
        f.push_row(vec!["St1".into()]);
        f.sort_by("SID");
        assert_eq!(f.get(0, "SID"), Some(&Value::Str("St1".into())));
    }

    #[test]
    fn render_forms() {
        assert_eq!(Value::Null.render(), "");
        assert_eq!(Value::Str("x".into()).render(), "x");
        assert_eq!(Value::Int(7).render(), "7");
        assert_eq!(Value::Num(2.5).render(), "2.5");
    }

    #[test]
    #[should_panic(expected = "row arity mismatch")]
    fn arity_mismatch_panics() {
        let mut f = Frame::new(vec!["A", "B"]);
        f.push_row(vec![Value::Null]);
    }
}
