//! Assimilate allocation: respiration, organ growth and senescence,
//! canopy geometry and the daily nitrogen demand.
//!
//! The day's gross photosynthesis is first scaled by site condition,
//! frost damage and the transpiration deficit, then maintenance and
//! growth respiration (AGROSIM two-temperature form) are subtracted.
//! What remains is partitioned into the organs along the cultivar's
//! stage-interpolated coefficient matrix. Senesced green matter is
//! partly recycled into the storage organ; dead root matter leaves the
//! plant and is handed to the soil by the orchestrator.

use std::sync::Arc;

use log::debug;

use cropmod_core::constants::CH2O_TO_C;
use cropmod_core::weather::DailyWeather;
use cropmod_core::FloatValue;

use crate::parameters::{CropConfig, ParameterSet};
use crate::phenology::wang_engel_temperature_response;
use crate::radiation::RadiationOutput;
use crate::state::CropState;

/// Conversion from kg ha⁻¹ to kg m⁻².
const KG_HA_TO_KG_M2: FloatValue = 1.0 / 10000.0;

#[derive(Debug)]
pub struct AllocationEngine {
    parameters: Arc<ParameterSet>,
    config: CropConfig,
}

impl AllocationEngine {
    pub fn new(parameters: Arc<ParameterSet>, config: CropConfig) -> Self {
        Self { parameters, config }
    }

    pub fn set_parameters(&mut self, parameters: Arc<ParameterSet>) {
        self.parameters = parameters;
    }

    /// Run the day's allocation. Only called after emergence.
    pub fn solve(
        &self,
        state: &mut CropState,
        weather: &DailyWeather,
        radiation: &RadiationOutput,
    ) {
        if state.stage == 0 {
            return;
        }

        state.aboveground_biomass_old = state.aboveground_biomass(&self.parameters);
        state.belowground_biomass_old = state.belowground_biomass(&self.parameters);
        state.root_biomass_old = state.organ_biomass[self.parameters.species.root_organ];

        let gross_assimilates = self.stressed_assimilates(state);
        let net = self.respiration(state, weather, radiation, gross_assimilates);
        state.net_photosynthesis = net;
        state.total_respired = gross_assimilates - net;

        self.partition_dry_matter(state, weather);
        self.nitrogen_demand(state);

        state.gross_primary_production = gross_assimilates * CH2O_TO_C;
        state.net_primary_production = net * CH2O_TO_C;
    }

    /// Gross photosynthesis scaled by site condition, frost damage and
    /// the transpiration deficit of the previous water uptake.
    fn stressed_assimilates(&self, state: &CropState) -> FloatValue {
        let mut assimilates = state.gross_photosynthesis
            * self.parameters.cultivar.field_condition_modifier
            * state.frost_redux;

        if self.config.water_deficit_response.is_on() {
            let threshold = self.parameters.cultivar.drought_stress_threshold[state.stage];
            if threshold > 0.0 && state.transpiration_deficit < threshold {
                assimilates *= state.transpiration_deficit / threshold;
            }
        }
        assimilates
    }

    /// AGROSIM maintenance and growth respiration, split into a light
    /// and a dark period with their own temperatures.
    ///
    /// Returns the net assimilate pool; maintenance can drive it
    /// negative, growth respiration cannot.
    fn respiration(
        &self,
        state: &CropState,
        weather: &DailyWeather,
        radiation: &RadiationOutput,
        gross_assimilates: FloatValue,
    ) -> FloatValue {
        let species = &self.parameters.species;
        let photo_temperature = weather.temperature_max
            - (weather.temperature_max - weather.temperature_min) / 4.0;
        let night_temperature = weather.temperature_min
            + (weather.temperature_max - weather.temperature_min) / 4.0;
        // 2 at zero day length, 1 at 12 h; weights the dark period
        let normalised_day_length = 2.0 - radiation.photoperiodic_day_length / 12.0;

        let maintenance_base: FloatValue = state
            .organ_green_biomass
            .iter()
            .zip(species.organ_maintenance_respiration.iter())
            .map(|(green, coeff)| green * coeff)
            .sum();

        let p1 = species.maintenance_respiration_param_1;
        let p2 = species.maintenance_respiration_param_2;
        let photo_maintenance = maintenance_base
            * FloatValue::powf(2.0, p1 * (photo_temperature - p2))
            * (2.0 - normalised_day_length);
        let dark_maintenance = maintenance_base
            * FloatValue::powf(2.0, p1 * (night_temperature - p2))
            * normalised_day_length;

        let mut assimilates = gross_assimilates - photo_maintenance - dark_maintenance;

        if assimilates > 0.0 {
            let growth_base: FloatValue = (0..self.parameters.num_organs())
                .map(|organ| {
                    self.parameters.cultivar.assimilate_partitioning[[state.stage, organ]]
                        * assimilates
                        * species.organ_growth_respiration[organ]
                })
                .sum();

            let g1 = species.growth_respiration_param_1;
            let g2 = species.growth_respiration_param_2;
            let photo_growth = (growth_base
                * FloatValue::powf(2.0, g1 * (photo_temperature - g2))
                * (2.0 - normalised_day_length))
                .min(assimilates);
            assimilates -= photo_growth;
            let dark_growth = (growth_base
                * FloatValue::powf(2.0, g1 * (night_temperature - g2))
                * normalised_day_length)
                .min(assimilates);
            assimilates -= dark_growth;
        }

        assimilates
    }

    /// Stage-interpolated partitioning coefficient for one organ. The
    /// storage organ's share shrinks under heat and drought sterility.
    fn partitioning_coefficient(
        &self,
        state: &CropState,
        organ: usize,
        progress: FloatValue,
    ) -> FloatValue {
        let matrix = &self.parameters.cultivar.assimilate_partitioning;
        let mut old = matrix[[state.stage - 1, organ]];
        let mut new = matrix[[state.stage, organ]];
        if self.parameters.species.organ_is_storage[organ] {
            let sterility = state.heat_stress_redux * state.drought_fertility_redux;
            old *= sterility;
            new *= sterility;
        }
        old + (new - old) * progress
    }

    fn partition_dry_matter(&self, state: &mut CropState, weather: &DailyWeather) {
        let species = &self.parameters.species;
        let cultivar = &self.parameters.cultivar;
        let num_organs = self.parameters.num_organs();
        let storage_organ = self.parameters.storage_organ();
        let root_organ = species.root_organ;

        let stage_target = cultivar.stage_temperature_sum[state.stage];
        let progress = if stage_target > 0.0 {
            state.stage_thermal_sum[state.stage] / stage_target
        } else {
            1.0
        };
        let overgrown = progress > 1.0;
        if overgrown && species.perennial {
            state.growth_cycle_ended = true;
        }

        // reserve mobilisation follows the assimilation temperature response
        let kt = wang_engel_temperature_response(
            weather.temperature_mean,
            species.min_temperature_assimilation,
            species.optimum_temperature_assimilation,
            species.max_temperature_assimilation,
        );
        let mobilisation = match storage_organ {
            Some(organ) => {
                state.organ_biomass[organ]
                    * species.stage_mobilisation_from_storage[state.stage]
                    * kt
            }
            None => 0.0,
        };

        let net = state.net_photosynthesis;
        for organ in 0..num_organs {
            let (growth, senescence) = if overgrown {
                (0.0, 0.0)
            } else {
                let growth = if net < 0.0 {
                    // maintenance exceeded supply; leaf and shoot pay
                    if organ == species.leaf_organ || organ == species.shoot_organ {
                        let increment = species.cannibalisation_fraction * net;
                        if increment.abs() <= state.organ_biomass[organ] {
                            increment
                        } else {
                            debug!("organ {} exhausted under negative assimilation", organ);
                            -state.organ_biomass[organ]
                        }
                    } else {
                        0.0
                    }
                } else {
                    let coefficient = self.partitioning_coefficient(state, organ, progress);
                    let mut increment =
                        (net + mobilisation) * coefficient * state.nitrogen_redux;
                    if Some(organ) == storage_organ {
                        increment -= mobilisation * state.nitrogen_redux;
                    }
                    increment
                };

                let rate_old = cultivar.organ_senescence_rate[[state.stage - 1, organ]];
                let rate_new = cultivar.organ_senescence_rate[[state.stage, organ]];
                let mut rate = rate_old + (rate_new - rate_old) * progress;
                if organ == species.leaf_organ && self.config.ozone_response.is_on() {
                    // cumulative ozone uptake accelerates leaf ageing
                    rate *= 2.0 - state.ozone.senescence_factor;
                }
                (growth, state.organ_green_biomass[organ] * rate)
            };
            state.organ_growth_increment[organ] = growth;
            state.organ_senescence_increment[organ] = senescence;
        }

        state.dead_root_increment = 0.0;
        for organ in 0..num_organs {
            let growth = state.organ_growth_increment[organ];
            let senescence = state.organ_senescence_increment[organ];

            if Some(organ) == storage_organ {
                state.organ_biomass[organ] += growth;
                state.organ_dead_biomass[organ] += senescence;
                continue;
            }

            let reallocated = species.assimilate_reallocation * senescence;
            let dead_increment = senescence - reallocated;
            state.organ_biomass[organ] += growth - reallocated;
            state.organ_dead_biomass[organ] += dead_increment;
            if let Some(storage) = storage_organ {
                state.organ_biomass[storage] += reallocated;
            }

            if organ == root_organ {
                // dead root matter leaves the plant for the soil
                state.organ_biomass[organ] -= dead_increment;
                state.organ_dead_biomass[organ] -= dead_increment;
                state.total_n_content -= dead_increment * state.n_concentration_root;
                state.dead_root_increment = dead_increment;
            }
        }

        state.reconcile_green_biomass();
    }

    /// Daily N demand from the gap between the luxury-uptake target and
    /// the current plant N content.
    ///
    /// The result is stored in kg/m² without the root-length capacity
    /// cap; the root system applies that cap once today's root length
    /// is known.
    fn nitrogen_demand(&self, state: &mut CropState) {
        let species = &self.parameters.species;
        let aboveground = state.aboveground_biomass(&self.parameters);
        let belowground = state.belowground_biomass(&self.parameters);
        let root_biomass = state.organ_biomass[species.root_organ];

        let max_root_n = if state.stage > 0 {
            let previous = species.stage_max_root_n_concentration[state.stage - 1];
            let current = species.stage_max_root_n_concentration[state.stage];
            previous - (previous - current) * state.relative_stage_progress(&self.parameters)
        } else {
            species.stage_max_root_n_concentration[0]
        };

        let mut demand = state.target_n_concentration * aboveground
            + root_biomass * max_root_n
            + state.target_n_concentration * belowground
                / self.parameters.cultivar.residue_n_ratio
            - state.total_n_content;

        demand = demand.min(species.max_crop_n_demand).max(0.0);
        state.crop_n_demand = demand * KG_HA_TO_KG_M2;
    }

    /// Canopy geometry of the day: height, diameter, leaf area and soil
    /// coverage. Uses yesterday's leaf increments, so it runs before
    /// photosynthesis.
    pub fn update_canopy(&self, state: &mut CropState) {
        if state.stage == 0 {
            return;
        }
        let species = &self.parameters.species;
        let cultivar = &self.parameters.cultivar;

        let thermal_sum_for = |last_stage: usize| -> FloatValue {
            cultivar
                .stage_temperature_sum
                .iter()
                .take(last_stage + 1)
                .skip(1)
                .sum()
        };

        let height_total = thermal_sum_for(species.stage_at_max_height);
        if height_total > 0.0 {
            let relative = (state.total_thermal_sum / height_total).min(1.0);
            state.crop_height = if relative > 0.0 {
                cultivar.max_crop_height
                    / (1.0
                        + FloatValue::exp(
                            -cultivar.crop_height_p1 * (relative - cultivar.crop_height_p2),
                        ))
            } else {
                0.0
            };
        }

        let diameter_total = thermal_sum_for(species.stage_at_max_diameter);
        if diameter_total > 0.0 {
            let relative = (state.total_thermal_sum / diameter_total).min(1.0);
            state.crop_diameter = species.max_crop_diameter * relative;
        }

        // specific leaf area interpolates through the stage; senesced
        // leaves carry the early-stage value
        let progress = state.relative_stage_progress(&self.parameters);
        let sla_start = cultivar.specific_leaf_area[state.stage - 1];
        let sla_end = cultivar.specific_leaf_area[state.stage];
        let sla = sla_start + (sla_end - sla_start) * progress;
        let sla_early = cultivar.specific_leaf_area[1];

        let leaf = species.leaf_organ;
        state.leaf_area_index += state.organ_growth_increment[leaf] * sla
            - state.organ_senescence_increment[leaf] * sla_early;
        if state.leaf_area_index <= 0.0 {
            state.leaf_area_index = 0.001;
        }

        state.soil_coverage = 1.0 - FloatValue::exp(-0.5 * state.leaf_area_index);
    }
}
