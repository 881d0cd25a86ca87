//! Steel grades and their fixed material properties.

use serde::{Deserialize, Serialize};

/// Material classification governing route and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteelGrade {
    Standard,
    HighClean,
    Decarb,
    TempSensitive,
}

impl SteelGrade {
    pub const ALL: [SteelGrade; 4] = [
        SteelGrade::Standard,
        SteelGrade::HighClean,
        SteelGrade::Decarb,
        SteelGrade::TempSensitive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SteelGrade::Standard => "standard",
            SteelGrade::HighClean => "high_clean",
            SteelGrade::Decarb => "decarb",
            SteelGrade::TempSensitive => "temp_sensitive",
        }
    }

    /// Tapping temperature in °C.
    pub fn initial_temperature(&self) -> f64 {
        match self {
            SteelGrade::HighClean => 1630.0,
            SteelGrade::TempSensitive => 1600.0,
            SteelGrade::Standard | SteelGrade::Decarb => 1650.0,
        }
    }

    /// Linear temperature loss in °C per minute.
    pub fn temperature_loss_rate(&self) -> f64 {
        match self {
            SteelGrade::HighClean => 1.2,
            SteelGrade::TempSensitive => 2.0,
            SteelGrade::Standard | SteelGrade::Decarb => 1.5,
        }
    }

    /// Lowest acceptable temperature at the caster for this grade.
    pub fn min_temperature(&self) -> f64 {
        match self {
            SteelGrade::Standard => 1500.0,
            SteelGrade::HighClean => 1520.0,
            SteelGrade::Decarb => 1510.0,
            SteelGrade::TempSensitive => 1540.0,
        }
    }

    pub fn requires_degasser(&self) -> bool {
        matches!(self, SteelGrade::HighClean | SteelGrade::Decarb)
    }

    /// Slab width range in millimetres, `(min, max)`.
    pub fn width_range(&self) -> (f64, f64) {
        match self {
            SteelGrade::Standard => (900.0, 1900.0),
            SteelGrade::HighClean => (1000.0, 1800.0),
            SteelGrade::Decarb => (900.0, 1700.0),
            SteelGrade::TempSensitive => (1100.0, 1600.0),
        }
    }
}

impl std::fmt::Display for SteelGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
