//! Run configuration and site constants.
//!
//! Strategy choices that the original engine scattered across boolean
//! flags are fixed here once, at construction, as named enums.

use cropmod_core::errors::{CropError, CropResult};
use cropmod_core::FloatValue;
use serde::{Deserialize, Serialize};

/// Temperature response kernel used by the phenology clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PhenologyTemperatureResponse {
    /// `max(0, min(T, Topt) - Tbase)`, the classic growing-degree-day form.
    #[default]
    ClippedLinear,
    /// Bell-shaped Wang-Engel response on the stage's min/opt/max bounds.
    WangEngel,
}

/// Canopy assimilation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssimilationMode {
    /// Daily radiation-use-efficiency model with a closed-form light
    /// interception integral.
    #[default]
    Daily,
    /// Hourly two-leaf (sunlit/shaded) biochemical canopy model with
    /// per-hour ozone coupling. C3 only.
    HourlyFvcb,
}

/// CO2 response applied to the maximum assimilation rate (daily mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Co2Response {
    /// No CO2 scaling.
    Fixed,
    /// Hoffmann (1995) radiation-dependent saturation response.
    Hoffmann,
    /// Long (1991) / Mitchell (1995) Rubisco kinetics response.
    #[default]
    LongMitchell,
}

/// Temperature response of the maximum carboxylation rate inside the
/// Long/Mitchell CO2 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VcmaxTemperatureResponse {
    /// Bell-shaped Wang-Engel response on the assimilation bounds.
    #[default]
    WangEngel,
    /// Classic Arrhenius response with the species activation energy.
    Arrhenius,
}

/// Gating policy for germination thermal time at stage 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmergenceGate {
    /// Soil temperature above base temperature is sufficient.
    None,
    /// Additionally require topsoil moisture above 20% of capillary water.
    Moisture,
    /// Additionally require no standing surface water.
    Flooding,
    /// Require both the moisture and the flooding condition.
    #[default]
    MoistureAndFlooding,
}

/// Engine configuration, fixed for the lifetime of a crop instance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    pub phenology_temperature_response: PhenologyTemperatureResponse,
    pub assimilation_mode: AssimilationMode,
    pub co2_response: Co2Response,
    pub vcmax_temperature_response: VcmaxTemperatureResponse,
    pub emergence_gate: EmergenceGate,
    /// Apply the nitrogen stress reduction to growth and phenology.
    pub nitrogen_response: OnOff,
    /// Apply the transpiration deficit to growth and phenology.
    pub water_deficit_response: OnOff,
    /// Run the LT50 frost kill model.
    pub frost_kill: OnOff,
    /// Run the heat sterility model.
    pub heat_stress: OnOff,
    /// Couple ozone damage into the hourly assimilation loop.
    pub ozone_response: OnOff,
}

/// Explicit on/off toggle that reads better in TOML than a bare bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnOff {
    On,
    Off,
}

impl Default for OnOff {
    fn default() -> Self {
        OnOff::On
    }
}

impl OnOff {
    pub fn is_on(self) -> bool {
        matches!(self, OnOff::On)
    }
}

impl CropConfig {
    /// Load a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> CropResult<Self> {
        toml::from_str(text).map_err(|e| CropError::Config(e.to_string()))
    }
}

/// Site constants that are neither weather nor soil.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SiteParameters {
    /// Geographic latitude, positive north
    /// unit: degrees
    pub latitude: FloatValue,
    /// Surface albedo used by net radiation
    /// unit: dimensionless
    /// default: 0.23
    pub albedo: FloatValue,
    /// Station height above sea level, used by the FAO-56 atmospheric
    /// pressure term
    /// unit: m
    /// default: 0.0
    pub height_above_sea_level: FloatValue,
    /// Soil-limited depth below which roots take up no water
    /// unit: m
    /// default: 2.0
    pub max_effective_rooting_depth: FloatValue,
}

impl Default for SiteParameters {
    fn default() -> Self {
        Self {
            latitude: 52.5,
            albedo: 0.23,
            height_above_sea_level: 0.0,
            max_effective_rooting_depth: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CropConfig::default();
        assert_eq!(
            config.phenology_temperature_response,
            PhenologyTemperatureResponse::ClippedLinear
        );
        assert_eq!(config.co2_response, Co2Response::LongMitchell);
        assert!(config.nitrogen_response.is_on());
    }

    #[test]
    fn test_config_from_toml() {
        let config = CropConfig::from_toml_str(
            r#"
            assimilation_mode = "HourlyFvcb"
            emergence_gate = "Moisture"
            frost_kill = "off"
            "#,
        )
        .unwrap();
        assert_eq!(config.assimilation_mode, AssimilationMode::HourlyFvcb);
        assert_eq!(config.emergence_gate, EmergenceGate::Moisture);
        assert!(!config.frost_kill.is_on());
        // unspecified fields keep their defaults
        assert_eq!(config.co2_response, Co2Response::LongMitchell);
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = CropConfig::from_toml_str("assimilation_mode = 3").unwrap_err();
        assert!(matches!(err, CropError::Config(_)));
    }
}
