//! Blood type reference data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a label does not name one of the eight blood types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid blood type: {0}")]
pub struct InvalidBloodType(pub String);

/// One of the eight ABO/Rh blood types.
///
/// Declaration order is the canonical order used for lock acquisition and
/// for listing per-type statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    AbPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodType {
    /// All blood types in canonical order.
    pub const ALL: [BloodType; 8] = [
        BloodType::APos,
        BloodType::ANeg,
        BloodType::BPos,
        BloodType::BNeg,
        BloodType::AbPos,
        BloodType::AbNeg,
        BloodType::OPos,
        BloodType::ONeg,
    ];

    /// Display label, e.g. `"AB-"`.
    pub fn label(&self) -> &'static str {
        match self {
            BloodType::APos => "A+",
            BloodType::ANeg => "A-",
            BloodType::BPos => "B+",
            BloodType::BNeg => "B-",
            BloodType::AbPos => "AB+",
            BloodType::AbNeg => "AB-",
            BloodType::OPos => "O+",
            BloodType::ONeg => "O-",
        }
    }

    /// Human-readable description seeded into the reference table.
    pub fn description(&self) -> &'static str {
        match self {
            BloodType::APos => "A positive",
            BloodType::ANeg => "A negative",
            BloodType::BPos => "B positive",
            BloodType::BNeg => "B negative",
            BloodType::AbPos => "AB positive (universal recipient)",
            BloodType::AbNeg => "AB negative",
            BloodType::OPos => "O positive",
            BloodType::ONeg => "O negative (universal donor)",
        }
    }

    /// Position in [`BloodType::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BloodType {
    type Err = InvalidBloodType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        BloodType::ALL
            .into_iter()
            .find(|t| t.label() == normalized)
            .ok_or_else(|| InvalidBloodType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        for t in BloodType::ALL {
            assert_eq!(t.label().parse::<BloodType>().unwrap(), t);
        }
        assert_eq!(" ab- ".parse::<BloodType>().unwrap(), BloodType::AbNeg);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "C+".parse::<BloodType>().unwrap_err();
        assert_eq!(err, InvalidBloodType("C+".into()));
        assert!("".parse::<BloodType>().is_err());
    }

    #[test]
    fn test_index_matches_canonical_order() {
        for (i, t) in BloodType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&BloodType::ONeg).unwrap();
        assert_eq!(json, r#""O-""#);
        let parsed: BloodType = serde_json::from_str(r#""AB+""#).unwrap();
        assert_eq!(parsed, BloodType::AbPos);
    }
}
