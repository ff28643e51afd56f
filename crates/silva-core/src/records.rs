//! Raw survey records and the closed field-code vocabularies.
//!
//! Field crews record codes, not prose; unknown or blank codes are a
//! data-quality condition and parse to `None`, never an error. Column
//! renaming and QA validation happen upstream of this crate, so record
//! fields use the canonical post-rename column names.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

// ── Field-code vocabularies ──────────────────────────────────────────────────

/// Crown position recorded for each tallied tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanopyClass {
    Dominant,
    CoDominant,
    Intermediate,
    Suppressed,
}

impl CanopyClass {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "D" | "DOM" | "DOMINANT" => Some(Self::Dominant),
            "CD" | "C" | "CODOMINANT" | "CO-DOMINANT" => Some(Self::CoDominant),
            "I" | "INT" | "INTERMEDIATE" => Some(Self::Intermediate),
            "S" | "SUP" | "SUPPRESSED" => Some(Self::Suppressed),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Dominant => "D",
            Self::CoDominant => "CD",
            Self::Intermediate => "I",
            Self::Suppressed => "S",
        }
    }
}

/// Tree health condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthClass {
    Healthy,
    Stressed,
    SignificantDecline,
    Dead,
}

impl HealthClass {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "H" | "HEALTHY" => Some(Self::Healthy),
            "S" | "STRESSED" => Some(Self::Stressed),
            "SD" | "SIGNIFICANT DECLINE" | "SIG DECLINE" => Some(Self::SignificantDecline),
            "D" | "DEAD" => Some(Self::Dead),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Healthy => "H",
            Self::Stressed => "S",
            Self::SignificantDecline => "SD",
            Self::Dead => "D",
        }
    }

    /// Severity rank used for dominance tie-breaking: 1 is healthiest.
    /// The "no tree" sentinel class ranks 5, below Dead.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Healthy => 1,
            Self::Stressed => 2,
            Self::SignificantDecline => 3,
            Self::Dead => 4,
        }
    }
}

/// Diameter size class. Buckets are half-open on the left so every positive
/// diameter lands in exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    Sapling,
    Pole,
    Saw,
    Mature,
    OverMature,
}

impl SizeClass {
    /// Bucket a diameter in inches. Zero (the no-tree sentinel diameter) and
    /// anything non-positive has no size class.
    pub fn from_diameter(dia: f64) -> Option<Self> {
        if dia <= 0.0 {
            None
        } else if dia <= 6.0 {
            Some(Self::Sapling)
        } else if dia <= 12.0 {
            Some(Self::Pole)
        } else if dia <= 18.0 {
            Some(Self::Saw)
        } else if dia <= 24.0 {
            Some(Self::Mature)
        } else {
            Some(Self::OverMature)
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sapling => "Sapling",
            Self::Pole => "Pole",
            Self::Saw => "Saw",
            Self::Mature => "Mature",
            Self::OverMature => "OverMature",
        }
    }
}

/// Vertical stand composition stratum, mapped from crown position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertComp {
    Canopy,
    Midstory,
}

impl VertComp {
    pub fn from_canopy(canopy: CanopyClass) -> Self {
        match canopy {
            CanopyClass::Dominant | CanopyClass::CoDominant => Self::Canopy,
            CanopyClass::Intermediate | CanopyClass::Suppressed => Self::Midstory,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Canopy => "Canopy",
            Self::Midstory => "Midstory",
        }
    }
}

// ── Raw records ──────────────────────────────────────────────────────────────

/// One prism-plot tally row as read from the tabular store. A "no tree"
/// sentinel row (see [`crate::species::is_no_tree`]) marks a plot that was
/// visited but held no tally trees.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeRecord {
    #[serde(rename = "PID", default)]
    pub pid: String,
    #[serde(rename = "TR_SP", default)]
    pub species: String,
    /// Diameter at breast height, inches. Blank and unparsable cells read
    /// as 0, the sentinel diameter.
    #[serde(rename = "TR_DIA", default, deserialize_with = "de_blank_f64")]
    pub diameter: f64,
    #[serde(rename = "TR_CL", default, deserialize_with = "de_canopy")]
    pub canopy: Option<CanopyClass>,
    #[serde(rename = "TR_HLTH", default, deserialize_with = "de_health")]
    pub health: Option<HealthClass>,
    #[serde(rename = "COL_CREW", default)]
    pub crew: String,
    #[serde(rename = "COL_DATE", default, deserialize_with = "de_date")]
    pub date: Option<NaiveDate>,
}

/// One fixed-plot row: structural observations plus the hierarchy keys
/// attached by the upstream spatial join. Hierarchy keys may be blank for
/// plots collected outside the managed boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixedRecord {
    #[serde(rename = "PID", default)]
    pub pid: String,
    #[serde(rename = "PLOT", default, deserialize_with = "de_blank_u32")]
    pub plot: Option<u32>,
    #[serde(rename = "POOL", default)]
    pub pool: String,
    #[serde(rename = "COMP", default)]
    pub comp: String,
    #[serde(rename = "UNIT", default)]
    pub unit: String,
    #[serde(rename = "SITE", default)]
    pub site: String,
    #[serde(rename = "SID", default)]
    pub sid: String,
    /// Overstory canopy closure, percent.
    #[serde(rename = "OV_CLSR", default, deserialize_with = "de_opt_f64")]
    pub ov_clsr: Option<f64>,
    /// Understory cover, percent.
    #[serde(rename = "UND_COV", default, deserialize_with = "de_opt_f64")]
    pub und_cov: Option<f64>,
    /// Understory height, feet.
    #[serde(rename = "UND_HT", default, deserialize_with = "de_opt_f64")]
    pub und_ht: Option<f64>,
    #[serde(rename = "GRD_SP1", default)]
    pub grd_sp1: String,
    #[serde(rename = "GRD_SP2", default)]
    pub grd_sp2: String,
    #[serde(rename = "GRD_SP3", default)]
    pub grd_sp3: String,
    #[serde(rename = "GRD_SP4", default)]
    pub grd_sp4: String,
    #[serde(rename = "NOT_SP1", default)]
    pub not_sp1: String,
    #[serde(rename = "NOT_SP2", default)]
    pub not_sp2: String,
    #[serde(rename = "NOT_SP3", default)]
    pub not_sp3: String,
    #[serde(rename = "NOT_SP4", default)]
    pub not_sp4: String,
    #[serde(rename = "COL_CREW", default)]
    pub crew: String,
    #[serde(rename = "COL_DATE", default, deserialize_with = "de_date")]
    pub date: Option<NaiveDate>,
}

impl FixedRecord {
    /// The eight ground/notable species slots scanned for invasives.
    pub fn species_slots(&self) -> [&str; 8] {
        [
            &self.grd_sp1,
            &self.grd_sp2,
            &self.grd_sp3,
            &self.grd_sp4,
            &self.not_sp1,
            &self.not_sp2,
            &self.not_sp3,
            &self.not_sp4,
        ]
    }
}

/// One age-subplot row: tree-ring and origin-year data for the cored tree.
/// Only a subset of fixed plots carries an age record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgeRecord {
    #[serde(rename = "PID", default)]
    pub pid: String,
    #[serde(rename = "AGE_SP", default)]
    pub species: String,
    #[serde(rename = "AGE_DIA", default, deserialize_with = "de_blank_f64")]
    pub diameter: f64,
    /// Ring count at breast height.
    #[serde(rename = "AGE_RING", default, deserialize_with = "de_blank_u32")]
    pub rings: Option<u32>,
    /// Estimated origin year.
    #[serde(rename = "AGE_ORIG", default, deserialize_with = "de_blank_i32")]
    pub origin: Option<i32>,
    /// Growth-rate class code, carried through untouched.
    #[serde(rename = "AGE_GRW", default)]
    pub growth: String,
    #[serde(rename = "COL_CREW", default)]
    pub crew: String,
    #[serde(rename = "COL_DATE", default, deserialize_with = "de_date")]
    pub date: Option<NaiveDate>,
}

// ── Serde helpers ────────────────────────────────────────────────────────────

fn de_blank_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    Ok(s.and_then(|s| s.trim().parse::<f64>().ok()).unwrap_or(0.0))
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    Ok(s.and_then(|s| s.trim().parse::<f64>().ok()))
}

fn de_blank_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    Ok(s.and_then(|s| s.trim().parse::<u32>().ok()))
}

fn de_blank_i32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    Ok(s.and_then(|s| s.trim().parse::<i32>().ok()))
}

fn de_canopy<'de, D: Deserializer<'de>>(d: D) -> Result<Option<CanopyClass>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    Ok(s.as_deref().and_then(CanopyClass::from_code))
}

fn de_health<'de, D: Deserializer<'de>>(d: D) -> Result<Option<HealthClass>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    Ok(s.as_deref().and_then(HealthClass::from_code))
}

/// Collection dates arrive either ISO or US-style from the field software.
fn de_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    Ok(s.as_deref().and_then(parse_date))
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_class_partitions_positive_diameters() {
        // Every boundary belongs to the class below it; nothing falls through.
        assert_eq!(SizeClass::from_diameter(0.0), None);
        assert_eq!(SizeClass::from_diameter(-3.0), None);
        assert_eq!(SizeClass::from_diameter(0.4), Some(SizeClass::Sapling));
        assert_eq!(SizeClass::from_diameter(6.0), Some(SizeClass::Sapling));
        assert_eq!(SizeClass::from_diameter(6.1), Some(SizeClass::Pole));
        assert_eq!(SizeClass::from_diameter(12.0), Some(SizeClass::Pole));
        assert_eq!(SizeClass::from_diameter(18.0), Some(SizeClass::Saw));
        assert_eq!(SizeClass::from_diameter(24.0), Some(SizeClass::Mature));
        assert_eq!(SizeClass::from_diameter(24.01), Some(SizeClass::OverMature));
        assert_eq!(SizeClass::from_diameter(48.0), Some(SizeClass::OverMature));
    }

    #[test]
    fn size_class_covers_a_dense_sweep() {
        // Walk a fine grid over (0, 40] and confirm exactly one class each.
        let mut dia = 0.01f64;
        while dia <= 40.0 {
            assert!(SizeClass::from_diameter(dia).is_some(), "gap at {dia}");
            dia += 0.01;
        }
    }

    #[test]
    fn vert_comp_maps_crown_positions() {
        assert_eq!(VertComp::from_canopy(CanopyClass::Dominant), VertComp::Canopy);
        assert_eq!(VertComp::from_canopy(CanopyClass::CoDominant), VertComp::Canopy);
        assert_eq!(VertComp::from_canopy(CanopyClass::Intermediate), VertComp::Midstory);
        assert_eq!(VertComp::from_canopy(CanopyClass::Suppressed), VertComp::Midstory);
    }

    #[test]
    fn health_ranks_order_healthiest_first() {
        assert!(HealthClass::Healthy.rank() < HealthClass::Stressed.rank());
        assert!(HealthClass::Stressed.rank() < HealthClass::SignificantDecline.rank());
        assert!(HealthClass::SignificantDecline.rank() < HealthClass::Dead.rank());
    }

    #[test]
    fn codes_round_trip() {
        for h in [
            HealthClass::Healthy,
            HealthClass::Stressed,
            HealthClass::SignificantDecline,
            HealthClass::Dead,
        ] {
            assert_eq!(HealthClass::from_code(h.code()), Some(h));
        }
        for c in [
            CanopyClass::Dominant,
            CanopyClass::CoDominant,
            CanopyClass::Intermediate,
            CanopyClass::Suppressed,
        ] {
            assert_eq!(CanopyClass::from_code(c.code()), Some(c));
        }
    }

    #[test]
    fn unknown_codes_parse_to_none() {
        assert_eq!(CanopyClass::from_code("X"), None);
        assert_eq!(HealthClass::from_code(""), None);
        assert_eq!(HealthClass::from_code("  sd "), Some(HealthClass::SignificantDecline));
    }

    #[test]
    fn dates_parse_both_field_formats() {
        assert_eq!(parse_date("2023-06-14"), NaiveDate::from_ymd_opt(2023, 6, 14));
        assert_eq!(parse_date("6/14/2023"), NaiveDate::from_ymd_opt(2023, 6, 14));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
    }
}
