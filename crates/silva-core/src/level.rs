//! The Pool ⊃ Compartment ⊃ Unit ⊃ Site ⊃ Stand ⊃ Plot nesting.
//!
//! One tagged enum replaces per-level function variants: every aggregation
//! takes a `Level` and extracts its grouping key through [`HierarchyKeyed`].

/// One of the six nesting levels, leaf (plot) to root (pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Pid,
    Sid,
    Site,
    Unit,
    Comp,
    Pool,
}

impl Level {
    /// All levels in leaf-to-root order, the batch-loop order.
    pub const ALL: [Level; 6] = [
        Level::Pid,
        Level::Sid,
        Level::Site,
        Level::Unit,
        Level::Comp,
        Level::Pool,
    ];

    /// Key column name in assembled output tables.
    pub fn column(&self) -> &'static str {
        match self {
            Level::Pid => "PID",
            Level::Sid => "SID",
            Level::Site => "SITE",
            Level::Unit => "UNIT",
            Level::Comp => "COMP",
            Level::Pool => "POOL",
        }
    }

    pub fn from_name(name: &str) -> Option<Level> {
        match name.trim().to_ascii_uppercase().as_str() {
            "PID" | "PLOT" => Some(Level::Pid),
            "SID" | "STAND" => Some(Level::Sid),
            "SITE" => Some(Level::Site),
            "UNIT" => Some(Level::Unit),
            "COMP" | "COMPARTMENT" => Some(Level::Comp),
            "POOL" => Some(Level::Pool),
            _ => None,
        }
    }
}

/// Anything that carries the six hierarchy keys.
pub trait HierarchyKeyed {
    /// The grouping key for `level`. Blank when the upstream spatial join
    /// found no containing polygon; blank keys group together rather than
    /// failing.
    fn level_key(&self, level: Level) -> &str;
}

/// Synthesize a plot id from its stand code and plot number:
/// stand code + `p` + zero-padded four-digit plot number.
pub fn make_pid(sid: &str, plot: u32) -> String {
    format!("{}p{:04}", sid.trim(), plot)
}
