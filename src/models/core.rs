// src/models/core.rs - Parcel and registry record types handed over by ingestion
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::ReconcileError;

/// Untyped attributes carried alongside a record (khasra/khata numbers,
/// source layer, raw CSV columns). Never read by the matcher.
pub type ExtraAttributes = BTreeMap<String, serde_json::Value>;

fn default_parcel_status() -> String {
    "pending".to_string()
}

/// Spatial land unit sourced from GIS data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub plot_id: Option<String>,
    /// Surveyed area in square meters.
    #[serde(default)]
    pub area_sqm: f64,
    pub village_id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_parcel_status")]
    pub status: String,
    #[serde(default)]
    pub extra: ExtraAttributes,
}

impl Parcel {
    pub fn new(id: &str, village_id: &str, owner_name: &str, plot_id: Option<&str>, area_sqm: f64) -> Self {
        Self {
            id: id.to_string(),
            owner_name: owner_name.to_string(),
            father_name: None,
            plot_id: plot_id.map(str::to_string),
            area_sqm,
            village_id: village_id.to_string(),
            address: None,
            status: default_parcel_status(),
            extra: ExtraAttributes::new(),
        }
    }

    /// Area usable for comparison, `None` when missing or malformed.
    pub fn area(&self) -> Option<f64> {
        usable_area(self.area_sqm)
    }
}

/// Textual land-ownership entry sourced from a registry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    pub id: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub plot_id: Option<String>,
    #[serde(default)]
    pub area_declared: f64,
    #[serde(default)]
    pub area_unit: AreaUnit,
    pub village_id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub extra: ExtraAttributes,
}

impl TextRecord {
    pub fn new(id: &str, village_id: &str, owner_name: &str, plot_id: Option<&str>, area_declared: f64) -> Self {
        Self {
            id: id.to_string(),
            owner_name: owner_name.to_string(),
            father_name: None,
            plot_id: plot_id.map(str::to_string),
            area_declared,
            area_unit: AreaUnit::Sqm,
            village_id: village_id.to_string(),
            address: None,
            extra: ExtraAttributes::new(),
        }
    }

    /// Declared area converted to square meters, `None` when missing or malformed.
    pub fn area_sqm(&self) -> Option<f64> {
        usable_area(self.area_declared).map(|a| a * self.area_unit.sqm_factor())
    }
}

fn usable_area(value: f64) -> Option<f64> {
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Units found in registry documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaUnit {
    #[default]
    #[serde(alias = "m2", alias = "sq_m")]
    Sqm,
    #[serde(alias = "ha", alias = "hectares")]
    Hectare,
    #[serde(alias = "acres")]
    Acre,
    /// Rajasthan bigha.
    Bigha,
    /// 20 biswa = 1 bigha.
    Biswa,
}

impl AreaUnit {
    pub fn sqm_factor(&self) -> f64 {
        match self {
            AreaUnit::Sqm => 1.0,
            AreaUnit::Hectare => 10_000.0,
            AreaUnit::Acre => 4_046.86,
            AreaUnit::Bigha => 2_529.29,
            AreaUnit::Biswa => 126.46,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AreaUnit::Sqm => "sqm",
            AreaUnit::Hectare => "hectare",
            AreaUnit::Acre => "acre",
            AreaUnit::Bigha => "bigha",
            AreaUnit::Biswa => "biswa",
        }
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaUnit {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqm" | "m2" | "sq_m" => Ok(AreaUnit::Sqm),
            "hectare" | "hectares" | "ha" => Ok(AreaUnit::Hectare),
            "acre" | "acres" => Ok(AreaUnit::Acre),
            "bigha" => Ok(AreaUnit::Bigha),
            "biswa" => Ok(AreaUnit::Biswa),
            other => Err(ReconcileError::InvalidInput(format!("unknown area unit '{}'", other))),
        }
    }
}
