//! Crop water balance: FAO-56 Penman-Monteith reference
//! evapotranspiration, canopy interception and root water uptake.
//!
//! Reference evapotranspiration follows Allen et al. (1998), with the
//! surface resistance derived from the photosynthesis of a reference
//! canopy so that stomata respond to CO2. Uptake distributes the
//! potential transpiration over the rooted layers by root density and
//! a water-availability effectivity curve, then redistributes unmet
//! extraction into deeper, wetter layers.

use std::sync::Arc;

use cropmod_core::constants::{LATENT_HEAT_VAPORISATION, STEFAN_BOLTZMANN_DAILY};
use cropmod_core::soil::SoilColumn;
use cropmod_core::weather::DailyWeather;
use cropmod_core::FloatValue;

use crate::parameters::{CropConfig, ParameterSet, SiteParameters};
use crate::radiation::RadiationOutput;
use crate::state::CropState;

/// Upper bound on daily potential evapotranspiration.
/// unit: mm
const MAX_POTENTIAL_EVAPOTRANSPIRATION: FloatValue = 6.5;
/// Interception capacity per metre of crop height at full coverage.
/// unit: mm/m
const INTERCEPTION_CAPACITY: FloatValue = 2.5;
/// Fallback stomatal resistance of a non-assimilating canopy.
/// unit: s/m
const CLOSED_STOMATA_RESISTANCE: FloatValue = 999999.9;

#[derive(Debug)]
pub struct WaterUptake {
    parameters: Arc<ParameterSet>,
    config: CropConfig,
    site: SiteParameters,
}

impl WaterUptake {
    pub fn new(parameters: Arc<ParameterSet>, config: CropConfig, site: &SiteParameters) -> Self {
        Self {
            parameters,
            config,
            site: *site,
        }
    }

    pub fn set_parameters(&mut self, parameters: Arc<ParameterSet>) {
        self.parameters = parameters;
    }

    /// FAO-56 Penman-Monteith reference evapotranspiration.
    /// unit: mm/d
    pub fn reference_evapotranspiration(
        &self,
        state: &CropState,
        weather: &DailyWeather,
        radiation: &RadiationOutput,
    ) -> FloatValue {
        let species = &self.parameters.species;
        let height = self.site.height_above_sea_level;

        let pressure = 101.3 * ((293.0 - 0.0065 * height) / 293.0).powf(5.26);
        let psychrometric = 0.000665 * pressure;

        let svp_max = DailyWeather::saturation_vapour_pressure(weather.temperature_max);
        let svp_min = DailyWeather::saturation_vapour_pressure(weather.temperature_min);
        let saturated = (svp_max + svp_min) / 2.0;
        let actual = if weather.relative_humidity > 0.0 {
            weather.relative_humidity * saturated
        } else {
            // humidity missing; dew point is assumed to track the minimum
            svp_min
        };
        let saturation_deficit = saturated - actual;

        let svp_mean = DailyWeather::saturation_vapour_pressure(weather.temperature_mean);
        let slope = 4098.0 * svp_mean / (weather.temperature_mean + 237.3).powi(2);

        let wind_2m = (weather.wind_speed * 4.87
            / FloatValue::ln(67.8 * weather.wind_speed_height - 5.42))
        .max(0.5);
        let aerodynamic_resistance = 208.0 / wind_2m;

        let stomatal_resistance = if state.reference_photosynthesis_mol > 0.0 {
            weather.co2_concentration * (1.0 + saturation_deficit / species.saturation_beta)
                / (species.stomata_conductance_alpha * state.reference_photosynthesis_mol)
        } else {
            CLOSED_STOMATA_RESISTANCE
        };
        // scale from leaf to the FAO reference surface
        let surface_resistance = stomatal_resistance / 1.44;

        let clear_sky = (0.75 + 2.0e-5 * height) * radiation.extraterrestrial_radiation;
        let relative_shortwave = if clear_sky > 0.0 {
            (radiation.global_radiation / clear_sky).min(1.0)
        } else {
            0.0
        };
        let net_shortwave = (1.0 - self.site.albedo) * radiation.global_radiation;
        let net_radiation = net_shortwave
            - STEFAN_BOLTZMANN_DAILY
                * ((weather.temperature_min + 273.16).powi(4)
                    + (weather.temperature_max + 273.16).powi(4))
                / 2.0
                * (1.35 * relative_shortwave - 0.35)
                * (0.34 - 0.14 * actual.sqrt());

        let reference = (slope * net_radiation / LATENT_HEAT_VAPORISATION
            + psychrometric * 900.0 / (weather.temperature_mean + 273.0)
                * wind_2m
                * saturation_deficit)
            / (slope
                + psychrometric * (1.0 + surface_resistance / aerodynamic_resistance));
        reference.max(0.0)
    }

    /// Interception, interception evaporation and root water uptake.
    pub fn solve(&self, state: &mut CropState, weather: &DailyWeather, soil: &SoilColumn) {
        let num_layers = soil.num_layers();
        let thickness = soil.layer_thickness;
        state.actual_transpiration = 0.0;
        state.potential_transpiration = 0.0;
        for value in state.layer_transpiration.iter_mut() {
            *value = 0.0;
        }

        // interception fills the canopy storage up to its capacity
        let mut interception =
            (INTERCEPTION_CAPACITY * state.crop_height * state.soil_coverage
                - state.interception_storage)
                .max(0.0);
        if weather.precipitation <= 0.0 {
            interception = 0.0;
        }
        if weather.precipitation <= interception {
            interception = weather.precipitation;
            state.net_precipitation = 0.0;
        } else {
            state.net_precipitation = weather.precipitation - interception;
        }
        state.interception_storage += interception;

        state.potential_evapotranspiration = (state.reference_evapotranspiration
            * state.kc_factor)
            .min(MAX_POTENTIAL_EVAPOTRANSPIRATION);
        let mut remaining = state.potential_evapotranspiration;

        // wet foliage evaporates before the crop transpires
        if state.interception_storage > 0.0 {
            if remaining >= state.interception_storage {
                remaining -= state.interception_storage;
                state.intercept_evaporation = state.interception_storage;
                state.interception_storage = 0.0;
            } else {
                state.interception_storage -= remaining;
                state.intercept_evaporation = remaining;
                remaining = 0.0;
            }
        } else {
            state.intercept_evaporation = 0.0;
        }

        let final_stage = self.parameters.num_stages() - 1;
        if state.stage < final_stage {
            self.transpire(state, soil, remaining, num_layers, thickness);
        }

        if self.config.water_deficit_response.is_on() {
            // a shallow groundwater table keeps the crop supplied
            let groundwater = soil
                .groundwater_table_layer
                .unwrap_or(usize::MAX);
            if groundwater <= state.rooting_depth_layers.saturating_add(1) {
                state.transpiration_deficit = 1.0;
            }
        } else {
            state.transpiration_deficit = 1.0;
        }

        state.accumulated_transpiration += state.actual_transpiration;
        state.accumulated_evapotranspiration +=
            state.actual_transpiration + state.intercept_evaporation;
    }

    fn transpire(
        &self,
        state: &mut CropState,
        soil: &SoilColumn,
        remaining_evapotranspiration: FloatValue,
        num_layers: usize,
        thickness: FloatValue,
    ) {
        state.potential_transpiration = remaining_evapotranspiration * state.soil_coverage;
        if state.potential_transpiration <= 0.0 {
            state.transpiration_deficit = 1.0;
            return;
        }

        let groundwater = soil.groundwater_table_layer.unwrap_or(usize::MAX);
        let zone = state.rooting_zone_layers.min(num_layers);
        let mut effectivity = vec![0.0; num_layers];
        let mut redux = vec![0.0; num_layers];
        let mut total_effectivity = 0.0;

        for layer in 0..zone {
            let available = soil.layers[layer].available_water_fraction();
            let (layer_redux, layer_effectivity) = if available < 0.15 {
                (available * 3.0, 0.15 + 0.45 * available / 0.15)
            } else if available < 0.3 {
                (
                    0.45 + 0.25 * (available - 0.15) / 0.15,
                    0.6 + 0.2 * (available - 0.15) / 0.15,
                )
            } else if available < 0.5 {
                (
                    0.7 + 0.275 * (available - 0.3) / 0.2,
                    0.8 + 0.2 * (available - 0.3) / 0.2,
                )
            } else if available < 0.75 {
                (0.975 + 0.025 * (available - 0.5) / 0.25, 1.0)
            } else {
                (1.0, 1.0)
            };
            redux[layer] = layer_redux.max(0.0);
            effectivity[layer] = layer_effectivity.max(0.0);

            if layer == groundwater {
                effectivity[layer] = 0.5;
            }
            if layer > groundwater {
                effectivity[layer] = 0.0;
            }
            if soil.depth_at(layer) >= self.site.max_effective_rooting_depth {
                effectivity[layer] = 0.0;
            }
            total_effectivity += effectivity[layer] * state.root_density[layer];
        }

        let extraction_limit = zone.min(groundwater.saturating_add(1));
        for layer in 0..extraction_limit.min(num_layers) {
            state.layer_transpiration[layer] = if total_effectivity > 0.0 {
                state.potential_transpiration
                    * (effectivity[layer] * state.root_density[layer] / total_effectivity)
                    * state.oxygen_deficit
            } else {
                0.0
            };
        }

        // push unmet extraction into the remaining, deeper layers
        let mut remaining_effectivity = total_effectivity;
        for layer in 0..extraction_limit.min(num_layers) {
            remaining_effectivity -= effectivity[layer] * state.root_density[layer];
            if remaining_effectivity <= 0.0 {
                remaining_effectivity = 0.00001;
            }

            let extractable =
                (soil.layers[layer].moisture - soil.layers[layer].wilting_point) * thickness
                    * 1000.0;
            let supply_deficit = (state.layer_transpiration[layer] - extractable)
                .clamp(0.0, state.layer_transpiration[layer]);
            let stress_deficit = state.layer_transpiration[layer] * (1.0 - redux[layer]);
            let deficit = stress_deficit.max(supply_deficit);

            if deficit > 0.0 {
                for deeper in (layer + 1)..extraction_limit.min(num_layers) {
                    state.layer_transpiration[deeper] += deficit
                        * (effectivity[deeper] * state.root_density[deeper]
                            / remaining_effectivity);
                }
            }
            state.layer_transpiration[layer] =
                (state.layer_transpiration[layer] - deficit).max(0.0);
            state.actual_transpiration += state.layer_transpiration[layer];
        }

        state.transpiration_deficit = if state.potential_transpiration > 0.0 {
            (state.actual_transpiration / state.potential_transpiration).min(1.0)
        } else {
            1.0
        };
    }
}
