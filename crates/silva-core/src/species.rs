//! Species vocabularies: the "no tree" sentinel predicate, the invasive set,
//! and the static species crosswalk.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{EngineError, Result};

// ── Sentinel detection ───────────────────────────────────────────────────────

/// Normalize a species code for comparison: trim, uppercase, collapse runs
/// of internal whitespace to a single space.
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

/// Canonical "no tree" sentinel predicate.
///
/// Legacy datasets spell the sentinel several ways (`NoTree`, `NONE`,
/// `NOTREE`, `NO TREE`, `NO TREES`, blank, whitespace-only). Every call site
/// goes through this predicate so the recognized set lives in one place.
pub fn is_no_tree(species: &str) -> bool {
    matches!(
        normalize_code(species).as_str(),
        "" | "NONE" | "NOTREE" | "NO TREE" | "NO TREES"
    )
}

// ── Invasive set ─────────────────────────────────────────────────────────────

/// Ground/notable species codes flagged as invasive: Japanese hops, reed
/// canarygrass, common reed.
pub const INVASIVE_SPECIES: [&str; 3] = ["HUJA", "PHAR3", "PHAU7"];

pub fn is_invasive(code: &str) -> bool {
    let norm = normalize_code(code);
    INVASIVE_SPECIES.contains(&norm.as_str())
}

// ── Crosswalk vocabularies ───────────────────────────────────────────────────

/// Mast classification used for wildlife-habitat summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MastType {
    Hard,
    Soft,
    Lightseed,
}

impl MastType {
    pub fn from_code(code: &str) -> Option<Self> {
        match normalize_code(code).as_str() {
            "HARD" | "HARD MAST" => Some(Self::Hard),
            "SOFT" | "SOFT MAST" => Some(Self::Soft),
            "LIGHTSEED" | "LIGHT SEED" => Some(Self::Lightseed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Hard => "Hard",
            Self::Soft => "Soft",
            Self::Lightseed => "Lightseed",
        }
    }
}

/// Commonality classification from the crosswalk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeciesType {
    Common,
    Uncommon,
}

impl SpeciesType {
    pub fn from_code(code: &str) -> Option<Self> {
        match normalize_code(code).as_str() {
            "COMMON" => Some(Self::Common),
            "UNCOMMON" => Some(Self::Uncommon),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
        }
    }
}

// ── Crosswalk ────────────────────────────────────────────────────────────────

/// Classification attached to one species code.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesInfo {
    pub common_name: String,
    pub sp_type: Option<SpeciesType>,
    pub mast: Option<MastType>,
}

#[derive(Debug, Deserialize)]
struct CrosswalkRow {
    #[serde(rename = "SP_CODE", default)]
    code: String,
    #[serde(rename = "COMMON_NAME", default)]
    common_name: String,
    #[serde(rename = "SP_TYPE", default)]
    sp_type: String,
    #[serde(rename = "MAST_TYPE", default)]
    mast: String,
}

/// Static species crosswalk, loaded once per run and read-only afterward.
/// A species absent from the crosswalk looks up to `None`, never an error.
#[derive(Debug, Clone, Default)]
pub struct SpeciesCrosswalk {
    map: HashMap<String, SpeciesInfo>,
}

impl SpeciesCrosswalk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one species entry, keyed by normalized code.
    pub fn insert(&mut self, code: &str, info: SpeciesInfo) {
        self.map.insert(normalize_code(code), info);
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader("species_crosswalk", file)
    }

    pub fn from_reader<R: Read>(table: &str, reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        for required in ["SP_CODE", "SP_TYPE", "MAST_TYPE"] {
            if !headers.iter().any(|h| h == required) {
                return Err(EngineError::config(
                    table,
                    format!("missing column {required}"),
                ));
            }
        }

        let mut map = HashMap::new();
        for row in rdr.deserialize::<CrosswalkRow>() {
            let row = row?;
            let key = normalize_code(&row.code);
            if key.is_empty() {
                continue;
            }
            map.insert(
                key,
                SpeciesInfo {
                    common_name: row.common_name.trim().to_string(),
                    sp_type: SpeciesType::from_code(&row.sp_type),
                    mast: MastType::from_code(&row.mast),
                },
            );
        }
        Ok(Self { map })
    }

    pub fn lookup(&self, species: &str) -> Option<&SpeciesInfo> {
        self.map.get(&normalize_code(species))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
