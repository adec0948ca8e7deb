use std::fmt;

use serde::{Deserialize, Serialize};

/// Product families carried by the retailer. The catalog file may use either
/// the English names or the Spanish labels shown in the widget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductFamily {
    #[serde(alias = "Calderas")]
    Boilers,
    #[serde(alias = "Radiadores")]
    Radiators,
    #[serde(alias = "Toalleros")]
    TowelWarmers,
    #[serde(alias = "Calefones")]
    WaterHeaters,
    #[serde(alias = "Termotanques")]
    ThermalTanks,
    #[serde(alias = "Climatizadores")]
    PoolHeaters,
    #[serde(alias = "Termostatos")]
    Thermostats,
}

impl ProductFamily {
    pub const ALL: [ProductFamily; 7] = [
        Self::Boilers,
        Self::Radiators,
        Self::ThermalTanks,
        Self::WaterHeaters,
        Self::TowelWarmers,
        Self::PoolHeaters,
        Self::Thermostats,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Boilers => "Calderas",
            Self::Radiators => "Radiadores",
            Self::TowelWarmers => "Toalleros",
            Self::WaterHeaters => "Calefones",
            Self::ThermalTanks => "Termotanques",
            Self::PoolHeaters => "Climatizadores",
            Self::Thermostats => "Termostatos",
        }
    }

    /// Accepts the Spanish label or the English variant name, ignoring case.
    pub fn parse(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        Self::ALL.into_iter().find(|family| {
            family.label().eq_ignore_ascii_case(needle)
                || format!("{family:?}").eq_ignore_ascii_case(needle)
        })
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub model: String,
    pub family: ProductFamily,
    pub category: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advantages: Vec<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installation: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_w: Option<u32>,
}

impl Product {
    pub fn is_electric(&self) -> bool {
        let category = crate::text::fold(&self.category);
        category.contains("electric")
    }

    pub fn supplies_hot_water(&self) -> bool {
        let description = crate::text::fold(&self.description);
        description.contains("agua caliente") || description.contains("doble servicio")
    }
}
