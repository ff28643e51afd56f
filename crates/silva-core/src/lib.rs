//! Field-survey summary engine for forest inventory data.
//!
//! Raw prism-, fixed-, and age-plot tables become two canonical
//! intermediate tables ([`builder`]), which roll up through the
//! Pool ⊃ Compartment ⊃ Unit ⊃ Site ⊃ Stand ⊃ Plot hierarchy
//! ([`aggregate`]), resolve dominant species and conditions
//! ([`dominance`]), and assemble into schema-governed wide snapshots
//! ([`summaries`], [`schema`], [`store`]).
//!
//! The whole pipeline is a one-shot directed acyclic data flow over
//! immutable in-memory tables; nothing here is stateful or concurrent.
//! Callers may fan the per-level assembly out across threads, since every
//! level reads the same immutable intermediates.

pub mod aggregate;
pub mod builder;
pub mod dominance;
pub mod error;
pub mod frame;
pub mod level;
pub mod records;
pub mod schema;
pub mod species;
pub mod store;
pub mod summaries;

pub use error::{EngineError, Result};
pub use level::Level;
pub use summaries::{Family, SummaryInputs};
