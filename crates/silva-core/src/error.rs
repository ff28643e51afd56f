use thiserror::Error;

/// Errors raised by the summary engine.
///
/// Data-quality conditions (missing values, "no tree" sentinels, dominance
/// ties) are never errors; they are handled by fill and tie-break policy at
/// the call sites. Only configuration problems and genuine input-shape
/// violations surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A schema or crosswalk configuration entry is missing or malformed.
    #[error("configuration error in {table}: {detail}")]
    Config { table: String, detail: String },

    /// An input table is missing an expected column entirely (distinct from
    /// missing values within a present column).
    #[error("input table {table} is missing required column {column}")]
    MissingColumn { table: String, column: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl EngineError {
    pub fn config(table: impl Into<String>, detail: impl Into<String>) -> Self {
        EngineError::Config { table: table.into(), detail: detail.into() }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
