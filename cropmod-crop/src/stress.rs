//! Episodic stress models: oxygen deficiency, heat sterility around
//! flowering, overwinter frost kill and drought impact on fertility.
//!
//! Each model writes one multiplicative reduction factor into the crop
//! state. Heat follows Challinor et al. (2005) with the flowering
//! dynamics of Moriondo et al. (2011); the frost model is the LT50
//! formulation of Fowler et al. (2014).

use std::sync::Arc;

use cropmod_core::soil::SoilColumn;
use cropmod_core::weather::DailyWeather;
use cropmod_core::FloatValue;

use crate::parameters::{CropConfig, ParameterSet};
use crate::state::CropState;

/// Days of anoxia after which the full oxygen deficit applies.
const MAX_ANOXIA_DAYS: FloatValue = 4.0;
/// Layers considered for the air-filled pore volume.
const AERATION_LAYERS: usize = 3;

#[derive(Debug)]
pub struct StressModifiers {
    parameters: Arc<ParameterSet>,
    config: CropConfig,
}

impl StressModifiers {
    pub fn new(parameters: Arc<ParameterSet>, config: CropConfig) -> Self {
        Self { parameters, config }
    }

    pub fn set_parameters(&mut self, parameters: Arc<ParameterSet>) {
        self.parameters = parameters;
    }

    /// Oxygen deficit from the air-filled pore volume of the topsoil.
    ///
    /// Wet days accumulate; the reduction phases in over
    /// [`MAX_ANOXIA_DAYS`] consecutive days of anoxia and resets as soon
    /// as the topsoil drains.
    pub fn oxygen_deficiency(&self, state: &mut CropState, soil: &SoilColumn) {
        let critical = self.parameters.species.critical_oxygen_content[state.stage];
        let layers = soil.layers.iter().take(AERATION_LAYERS);
        let mut air_filled = 0.0;
        let mut count = 0;
        for layer in layers {
            air_filled += layer.saturation - layer.moisture;
            count += 1;
        }
        if count == 0 {
            state.oxygen_deficit = 1.0;
            return;
        }
        let air_filled = (air_filled / count as FloatValue).max(0.0);

        if air_filled < critical {
            state.anoxia_days = (state.anoxia_days + 1.0).min(MAX_ANOXIA_DAYS);
            let max_deficit = air_filled / critical;
            state.oxygen_deficit =
                (1.0 - state.anoxia_days / MAX_ANOXIA_DAYS * (1.0 - max_deficit)).min(1.0);
        } else {
            state.anoxia_days = 0.0;
            state.oxygen_deficit = 1.0;
        }
    }

    /// Heat sterility during the thermal-sum window around flowering.
    ///
    /// Each day's damage is weighted by the share of flowers opening
    /// that day, so a single hot day cannot sterilize the whole crop.
    pub fn heat_stress(&self, state: &mut CropState, weather: &DailyWeather) {
        if !self.config.heat_stress.is_on() {
            return;
        }
        let cultivar = &self.parameters.cultivar;
        let begin = cultivar.begin_sensitive_phase_heat_stress;
        let end = cultivar.end_sensitive_phase_heat_stress;
        if begin == 0.0 && end == 0.0 {
            state.total_heat_impact = 1.0;
            return;
        }

        let mut fraction_open_flowers = 0.0;
        if state.total_thermal_sum >= begin && state.total_thermal_sum < end {
            let photo_temperature = weather.temperature_max
                - (weather.temperature_max - weather.temperature_min) / 4.0;
            let heat_impact = (1.0
                - (photo_temperature - cultivar.critical_temperature_heat_stress)
                    / (cultivar.heat_stress_temperature_limit
                        - cultivar.critical_temperature_heat_stress))
                .clamp(0.0, 1.0);

            let open_at = |days: FloatValue| {
                1.0 / (1.0 + ((1.0 / 0.015) - 1.0) * (-1.4 * days).exp())
            };
            fraction_open_flowers = open_at(state.flowering_heat_days);
            let yesterdays_fraction = if state.flowering_heat_days > 0.0 {
                open_at(state.flowering_heat_days - 1.0)
            } else {
                0.0
            };
            let daily_flowering_rate = fraction_open_flowers - yesterdays_fraction;

            state.total_heat_impact += heat_impact * daily_flowering_rate;
            state.flowering_heat_days += 1.0;
        }

        if state.total_thermal_sum >= end || fraction_open_flowers > 0.999999 {
            if state.total_heat_impact < state.heat_stress_redux {
                state.heat_stress_redux = state.total_heat_impact;
            }
        }
    }

    /// Overwinter LT50 dynamics and frost kill.
    pub fn frost_kill(&self, state: &mut CropState, weather: &DailyWeather, soil: &SoilColumn) {
        if !self.config.frost_kill.is_on() {
            return;
        }
        let species = &self.parameters.species;
        let lt50_cultivar = self.parameters.cultivar.lt50_cultivar;
        let lt50_old = state.lt50;

        let night_temperature = weather.temperature_min
            + (weather.temperature_max - weather.temperature_min) / 4.0;
        // young plants sit close to the soil surface
        let crown_temperature = if state.stage <= 1 {
            let topsoil = soil
                .layers
                .first()
                .map(|layer| layer.temperature)
                .unwrap_or(soil.surface_temperature);
            (3.0 * soil.surface_temperature + 2.0 * topsoil) / 5.0
        } else {
            night_temperature * 0.8
        };

        let induction_threshold = 3.72135 - 0.401124 * lt50_cultivar;

        let hardening = if state.vernalisation_factor < 1.0
            && crown_temperature < induction_threshold
        {
            species.frost_hardening
                * (induction_threshold - crown_temperature)
                * (lt50_old - lt50_cultivar)
        } else {
            0.0
        };

        let dehardening = if (state.vernalisation_factor < 1.0
            && crown_temperature >= induction_threshold)
            || (state.vernalisation_factor >= 1.0 && crown_temperature >= -4.0)
        {
            species.frost_dehardening / (1.0 + (4.35 - 0.28 * crown_temperature).exp())
        } else {
            0.0
        };

        let low_temperature_exposure =
            if crown_temperature < -3.0 && (lt50_old - crown_temperature) > -12.0 {
                (lt50_old - crown_temperature)
                    / (species.low_temperature_exposure * (lt50_old - crown_temperature) - 3.74)
                        .exp()
            } else {
                0.0
            };

        let respiration_factor = ((0.84 + 0.051 * crown_temperature).exp() - 2.0) / 1.85;
        let snow_depth_factor = (soil.snow_depth / 125.0).min(1.0);
        let respiratory_stress =
            species.respiratory_stress * respiration_factor * snow_depth_factor;

        state.lt50 = (lt50_old - hardening
            + dehardening
            + low_temperature_exposure
            + respiratory_stress)
            .min(-3.0);

        if crown_temperature < state.lt50 {
            state.frost_redux *= 0.5;
        }
    }

    /// Fertility loss under severe drought during bloom.
    pub fn drought_impact_on_fertility(&self, state: &mut CropState) {
        let species = &self.parameters.species;
        let threshold = species.drought_impact_on_fertility_factor
            * self.parameters.cultivar.drought_stress_threshold[state.stage];
        let storage_organ = self.parameters.storage_organ();
        let filling_storage = storage_organ
            .map(|organ| self.parameters.cultivar.assimilate_partitioning[[state.stage, organ]] > 0.0)
            .unwrap_or(false);

        let deficit = state.transpiration_deficit.max(0.0);
        if deficit < threshold && filling_storage {
            // waterlogged soil, not drought, is the limiting factor then
            if state.oxygen_deficit < 1.0 {
                state.drought_fertility_redux = 1.0;
            } else {
                let helper = deficit / threshold;
                state.drought_fertility_redux = 1.0 - (1.0 - helper) * (1.0 - helper);
            }
        } else {
            state.drought_fertility_redux = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{CultivarParameters, OnOff, SpeciesParameters};
    use cropmod_core::soil::SoilLayer;

    fn parameters() -> Arc<ParameterSet> {
        Arc::new(ParameterSet {
            species: SpeciesParameters::default(),
            cultivar: CultivarParameters::default(),
        })
    }

    fn engine() -> StressModifiers {
        StressModifiers::new(parameters(), CropConfig::default())
    }

    fn state() -> CropState {
        CropState::at_seeding(&parameters(), 10)
    }

    fn soil_with_moisture(moisture: FloatValue) -> SoilColumn {
        SoilColumn {
            layers: vec![
                SoilLayer {
                    field_capacity: 0.33,
                    wilting_point: 0.13,
                    saturation: 0.45,
                    moisture,
                    temperature: 10.0,
                    no3: 0.002,
                    nh4: 0.0005,
                    clay_fraction: 0.2,
                };
                10
            ],
            layer_thickness: 0.1,
            surface_water_storage: 0.0,
            groundwater_table_layer: None,
            snow_depth: 0.0,
            surface_temperature: 10.0,
        }
    }

    fn mild_weather() -> DailyWeather {
        DailyWeather {
            temperature_mean: 15.0,
            temperature_min: 9.0,
            temperature_max: 21.0,
            global_radiation: Some(15.0),
            sunshine_hours: None,
            relative_humidity: 0.7,
            wind_speed: 2.0,
            wind_speed_height: 2.0,
            co2_concentration: 410.0,
            o3_concentration: 35.0,
            precipitation: 0.0,
            reference_evapotranspiration: None,
        }
    }

    #[test]
    fn test_dry_topsoil_no_oxygen_deficit() {
        let engine = engine();
        let mut state = state();
        engine.oxygen_deficiency(&mut state, &soil_with_moisture(0.25));
        assert_eq!(state.oxygen_deficit, 1.0);
        assert_eq!(state.anoxia_days, 0.0);
    }

    #[test]
    fn test_waterlogging_builds_oxygen_deficit() {
        let engine = engine();
        let mut state = state();
        // nearly saturated topsoil: air-filled porosity 0.01 < 0.08
        let soil = soil_with_moisture(0.44);
        for _ in 0..4 {
            engine.oxygen_deficiency(&mut state, &soil);
        }
        assert!(
            state.oxygen_deficit < 0.2,
            "four days under water nearly saturate the deficit, got {}",
            state.oxygen_deficit
        );
        assert_eq!(state.anoxia_days, 4.0, "anoxia day counter caps at 4");

        engine.oxygen_deficiency(&mut state, &soil_with_moisture(0.25));
        assert_eq!(state.oxygen_deficit, 1.0, "drained soil recovers at once");
        assert_eq!(state.anoxia_days, 0.0);
    }

    #[test]
    fn test_hot_day_during_flowering_reduces_fertility() {
        let engine = engine();
        let mut state = state();
        state.total_thermal_sum = 800.0; // inside the default 720..1000 window
        let mut weather = mild_weather();
        weather.temperature_min = 28.0;
        weather.temperature_max = 42.0;
        // walk through the whole flowering window under heat
        for _ in 0..30 {
            engine.heat_stress(&mut state, &weather);
        }
        assert!(
            state.heat_stress_redux < 0.2,
            "persistent 40 °C days through flowering sterilize, got {}",
            state.heat_stress_redux
        );
    }

    #[test]
    fn test_cool_flowering_window_keeps_fertility() {
        let engine = engine();
        let mut state = state();
        state.total_thermal_sum = 800.0;
        let weather = mild_weather();
        for _ in 0..30 {
            engine.heat_stress(&mut state, &weather);
        }
        assert!(
            state.heat_stress_redux > 0.99,
            "21 °C days are below the 31 °C damage threshold, got {}",
            state.heat_stress_redux
        );
    }

    #[test]
    fn test_heat_stress_toggle_off() {
        let engine = StressModifiers::new(
            parameters(),
            CropConfig {
                heat_stress: OnOff::Off,
                ..CropConfig::default()
            },
        );
        let mut state = state();
        state.total_thermal_sum = 800.0;
        let mut weather = mild_weather();
        weather.temperature_max = 45.0;
        weather.temperature_min = 30.0;
        for _ in 0..30 {
            engine.heat_stress(&mut state, &weather);
        }
        assert_eq!(state.heat_stress_redux, 1.0);
    }

    #[test]
    fn test_cold_unvernalised_crop_hardens() {
        let engine = engine();
        let mut state = state();
        state.vernalisation_factor = 0.3;
        let mut weather = mild_weather();
        weather.temperature_min = -6.0;
        weather.temperature_max = -1.0;
        let mut soil = soil_with_moisture(0.25);
        soil.surface_temperature = -3.0;
        for layer in &mut soil.layers {
            layer.temperature = -1.0;
        }
        let lt50_before = state.lt50;
        for _ in 0..10 {
            engine.frost_kill(&mut state, &weather, &soil);
        }
        assert!(
            state.lt50 < lt50_before,
            "cold days drive the LT50 down (hardening): {} -> {}",
            lt50_before,
            state.lt50
        );
        assert!(state.lt50 >= self_lt50_floor(), "never below the cultivar LT50");
    }

    fn self_lt50_floor() -> FloatValue {
        CultivarParameters::default().lt50_cultivar
    }

    #[test]
    fn test_extreme_cold_below_lt50_halves_the_stand() {
        let engine = engine();
        let mut state = state();
        state.stage = 2; // crown follows air temperature
        state.lt50 = -10.0;
        let mut weather = mild_weather();
        weather.temperature_min = -25.0;
        weather.temperature_max = -15.0;
        let soil = soil_with_moisture(0.25);
        engine.frost_kill(&mut state, &weather, &soil);
        assert!(
            (state.frost_redux - 0.5).abs() < 1e-12,
            "one night below LT50 halves the stand, got {}",
            state.frost_redux
        );
    }

    #[test]
    fn test_lt50_capped_near_zero() {
        let engine = engine();
        let mut state = state();
        state.vernalisation_factor = 1.0;
        let mut weather = mild_weather();
        weather.temperature_min = 15.0;
        weather.temperature_max = 25.0;
        let soil = soil_with_moisture(0.25);
        for _ in 0..50 {
            engine.frost_kill(&mut state, &weather, &soil);
        }
        assert!(
            state.lt50 <= -3.0,
            "dehardening never raises LT50 above -3 °C, got {}",
            state.lt50
        );
    }

    #[test]
    fn test_drought_during_grain_fill_cuts_fertility() {
        let engine = engine();
        let mut state = state();
        state.stage = 3; // storage organ is filling
        state.transpiration_deficit = 0.2;
        engine.drought_impact_on_fertility(&mut state);
        assert!(
            state.drought_fertility_redux < 1.0,
            "severe drought during bloom reduces fertility"
        );
    }

    #[test]
    fn test_no_drought_impact_outside_grain_fill() {
        let engine = engine();
        let mut state = state();
        state.stage = 1; // nothing partitions into storage yet
        state.transpiration_deficit = 0.2;
        engine.drought_impact_on_fertility(&mut state);
        assert_eq!(state.drought_fertility_redux, 1.0);
    }

    #[test]
    fn test_waterlogging_overrides_drought_fertility() {
        let engine = engine();
        let mut state = state();
        state.stage = 3;
        state.transpiration_deficit = 0.2;
        state.oxygen_deficit = 0.5;
        engine.drought_impact_on_fertility(&mut state);
        assert_eq!(state.drought_fertility_redux, 1.0);
    }
}
