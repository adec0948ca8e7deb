//! Heating-load calculator. Pure functions, no catalog access.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const KCAL_H_PER_WATT: f64 = 0.859845;
pub const BOILER_SAFETY_FACTOR: f64 = 1.2;
/// Nominal output of one aluminium radiator element, kcal/h.
pub const RADIATOR_MODULE_OUTPUT_KCAL_H: f64 = 185.0;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("invalid value {value} for `{field}`: must be a finite number greater than zero")]
    InvalidInput { field: &'static str, value: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadUnit {
    Watts,
    KcalPerHour,
}

impl LoadUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Watts => "W",
            Self::KcalPerHour => "kcal/h",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatLoad {
    pub value: f64,
    pub unit: LoadUnit,
}

impl HeatLoad {
    pub fn watts(value: f64) -> Self {
        Self { value, unit: LoadUnit::Watts }
    }

    pub fn kcal_per_hour(value: f64) -> Self {
        Self { value, unit: LoadUnit::KcalPerHour }
    }

    pub fn to_watts(self) -> f64 {
        match self.unit {
            LoadUnit::Watts => self.value,
            LoadUnit::KcalPerHour => self.value / KCAL_H_PER_WATT,
        }
    }

    pub fn to_kcal_per_hour(self) -> f64 {
        match self.unit {
            LoadUnit::Watts => self.value * KCAL_H_PER_WATT,
            LoadUnit::KcalPerHour => self.value,
        }
    }
}

impl fmt::Display for HeatLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value.round(), self.unit.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClimateZone {
    North,
    Central,
    South,
}

impl ClimateZone {
    pub fn factor_w_per_m2(self) -> f64 {
        match self {
            Self::North => 80.0,
            Self::Central => 100.0,
            Self::South => 125.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::North => "Norte",
            Self::Central => "Centro",
            Self::South => "Sur",
        }
    }
}

/// Building insulation as asked in the floor heating questionnaire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsulationQuality {
    Good,
    Average,
    Poor,
}

impl InsulationQuality {
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Good => 0.9,
            Self::Average => 1.0,
            Self::Poor => 1.2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Buena",
            Self::Average => "Regular",
            Self::Poor => "Mala",
        }
    }
}

/// Room insulation level used by the volume method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsulationLevel {
    High,
    Medium,
    Low,
}

impl InsulationLevel {
    pub fn factor_kcal_h_per_m3(self) -> f64 {
        match self {
            Self::High => 30.0,
            Self::Medium => 40.0,
            Self::Low => 50.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "Alta",
            Self::Medium => "Media",
            Self::Low => "Baja",
        }
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<f64, LoadError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(LoadError::InvalidInput { field, value })
    }
}

/// Area method, result in watts.
pub fn area_load(
    area_m2: f64,
    zone: ClimateZone,
    insulation: InsulationQuality,
) -> Result<HeatLoad, LoadError> {
    let area = require_positive("area_m2", area_m2)?;
    Ok(HeatLoad::watts((area * zone.factor_w_per_m2() * insulation.multiplier()).round()))
}

/// Volume method, result in kcal/h.
pub fn volume_load(
    length_m: f64,
    width_m: f64,
    height_m: f64,
    insulation: InsulationLevel,
) -> Result<HeatLoad, LoadError> {
    let length = require_positive("length_m", length_m)?;
    let width = require_positive("width_m", width_m)?;
    let height = require_positive("height_m", height_m)?;
    let volume = length * width * height;
    Ok(HeatLoad::kcal_per_hour((volume * insulation.factor_kcal_h_per_m3()).round()))
}

pub fn boiler_required_power(declared_kcal_h: f64) -> Result<HeatLoad, LoadError> {
    let declared = require_positive("declared_kcal_h", declared_kcal_h)?;
    Ok(HeatLoad::kcal_per_hour((declared * BOILER_SAFETY_FACTOR).round()))
}

/// Number of radiator elements needed to cover `load`.
pub fn radiator_modules(load: HeatLoad, module_output_kcal_h: f64) -> Result<u32, LoadError> {
    let output = require_positive("module_output_kcal_h", module_output_kcal_h)?;
    let required = require_positive("load", load.to_kcal_per_hour())?;
    let modules = (required / output).ceil();
    Ok(modules.min(f64::from(u32::MAX)) as u32)
}
