//! Crop nitrogen: the critical dilution curve, the growth reduction
//! under N shortage, and daily uptake from the soil mineral pool.
//!
//! Uptake is mass flow first: nitrate dissolved in the transpiration
//! stream covers the demand where it can. The remainder is supplied by
//! diffusion towards the root surfaces, limited per layer by a floor of
//! mineral N that the crop can never extract.

use std::sync::Arc;

use log::debug;

use cropmod_core::soil::SoilColumn;
use cropmod_core::FloatValue;

use crate::parameters::{CropConfig, ParameterSet};
use crate::state::CropState;

use std::f64::consts::PI;

/// Tortuosity of the diffusion path through the soil pore space.
const TORTUOSITY: FloatValue = 0.002;
/// Dissolved N concentration below which diffusion stops.
/// unit: kg N / m³ water
const MIN_DISSOLVED_N: FloatValue = 0.000014;
/// Share of the daily demand cap a single layer may supply.
const LAYER_DEMAND_SHARE: FloatValue = 0.75;

#[derive(Debug)]
pub struct NitrogenUptake {
    parameters: Arc<ParameterSet>,
    config: CropConfig,
}

impl NitrogenUptake {
    pub fn new(parameters: Arc<ParameterSet>, config: CropConfig) -> Self {
        Self { parameters, config }
    }

    pub fn set_parameters(&mut self, parameters: Arc<ParameterSet>) {
        self.parameters = parameters;
    }

    /// Critical and target N concentrations from the dilution curve, and
    /// the growth reduction factor for today's allocation.
    pub fn update_status(&self, state: &mut CropState) {
        let species = &self.parameters.species;
        let biomass = state.aboveground_biomass(&self.parameters)
            + state.belowground_biomass(&self.parameters);

        // critical dilution curve, biomass in t/ha
        state.critical_n_concentration = species.n_concentration_pn
            * (1.0 + species.n_concentration_b0 * FloatValue::exp(-0.26 * biomass / 1000.0))
            / 100.0;
        state.target_n_concentration =
            state.critical_n_concentration * species.luxury_n_coefficient;

        state.n_concentration_aboveground_old = state.n_concentration_aboveground;

        let critical = state.critical_n_concentration;
        let minimum = species.minimum_n_concentration;
        let concentration = state.n_concentration_aboveground;
        state.nitrogen_redux = if concentration >= critical {
            1.0
        } else if concentration <= minimum {
            0.0
        } else {
            let helper = (concentration - minimum) / (critical - minimum);
            (1.0 - FloatValue::exp(minimum - 5.0 * helper)).max(0.0)
        };

        if !self.config.nitrogen_response.is_on() {
            state.nitrogen_redux = 1.0;
        }
    }

    /// Take up mineral N along the transpiration stream and by
    /// diffusion, fix the shortfall for legumes, and rebalance the
    /// plant-internal N concentrations.
    pub fn solve(&self, state: &mut CropState, soil: &SoilColumn) {
        let species = &self.parameters.species;
        let num_layers = soil.num_layers();
        let thickness = soil.layer_thickness;

        for value in state.layer_n_uptake.iter_mut() {
            *value = 0.0;
        }
        let mut total_uptake = 0.0; // kg/ha
        let mut fixed = 0.0;
        let mut total_input = 0.0;

        let final_stage = self.parameters.num_stages() - 1;
        if state.stage < final_stage && state.crop_n_demand > 0.0 {
            let groundwater = soil.groundwater_table_layer.unwrap_or(usize::MAX);
            let active_layers = state
                .rooting_zone_layers
                .min(groundwater)
                .min(num_layers);

            let mut convective = vec![0.0; num_layers];
            let mut diffusive = vec![0.0; num_layers];
            let mut convective_sum = 0.0;
            let mut diffusive_sum = 0.0;

            for layer in 0..active_layers {
                let moisture = soil.layers[layer].moisture;
                if moisture <= 0.0 {
                    continue;
                }
                let mineral_n = soil.layers[layer].no3; // kg/m³

                convective[layer] =
                    state.layer_transpiration[layer] / 1000.0 * (mineral_n / moisture);
                convective_sum += convective[layer];

                let diffusion_coefficient =
                    0.000214 * (TORTUOSITY * FloatValue::exp(moisture * 10.0)) / moisture;
                diffusive[layer] = (diffusion_coefficient
                    * moisture
                    * 2.0
                    * PI
                    * state.root_diameter[layer]
                    * (mineral_n / 1000.0 / moisture - MIN_DISSOLVED_N)
                    * (PI * state.root_density[layer]).sqrt())
                    * state.root_density[layer]
                    * 1000.0;
                diffusive[layer] = diffusive[layer].max(0.0);
                diffusive_sum += diffusive[layer];
            }

            let demand = state.crop_n_demand; // kg/m²
            for layer in 0..active_layers {
                let mut uptake = if convective_sum >= demand {
                    if convective_sum > 0.0 {
                        demand * convective[layer] / convective_sum
                    } else {
                        0.0
                    }
                } else if demand - convective_sum < diffusive_sum {
                    convective[layer]
                        + (demand - convective_sum) * diffusive[layer] / diffusive_sum
                } else {
                    convective[layer] + diffusive[layer]
                };

                let extractable =
                    soil.layers[layer].no3 * thickness - species.minimum_available_n;
                uptake = uptake
                    .min(extractable)
                    .min(species.max_crop_n_demand / 10000.0 * LAYER_DEMAND_SHARE)
                    .max(0.0);

                state.layer_n_uptake[layer] = uptake;
                total_uptake += uptake * 10000.0;
            }

            // legumes fix what the soil could not supply
            fixed = species.part_biological_n_fixation * demand * 10000.0;
            let shortfall = demand * 10000.0 - total_uptake;
            if shortfall < fixed {
                total_input = demand * 10000.0;
                fixed = shortfall;
            } else {
                total_input = total_uptake + fixed;
            }
            debug!(
                "N uptake {:.3} kg/ha, fixation {:.3} kg/ha",
                total_uptake, fixed
            );
        }

        state.daily_n_uptake = total_uptake;
        state.daily_n_fixation = fixed;
        state.accumulated_n_uptake += total_uptake;
        state.total_n_content += total_input;

        self.rebalance_concentrations(state, total_input);
    }

    /// Distribute the day's N input between root and aboveground pools.
    fn rebalance_concentrations(&self, state: &mut CropState, total_input: FloatValue) {
        let species = &self.parameters.species;
        let root_biomass = state.organ_biomass[species.root_organ];
        let aboveground = state.aboveground_biomass(&self.parameters);
        let belowground = state.belowground_biomass(&self.parameters);
        let residue_ratio = self.parameters.cultivar.residue_n_ratio;

        if root_biomass > state.root_biomass_old && root_biomass > 0.0 {
            let growth = root_biomass - state.root_biomass_old
                + (aboveground - state.aboveground_biomass_old)
                + (belowground - state.belowground_biomass_old);
            if growth > 0.0 {
                let root_share =
                    (root_biomass - state.root_biomass_old) / growth * total_input;
                state.n_concentration_root = (state.root_biomass_old
                    * state.n_concentration_root
                    + root_share)
                    / root_biomass;
            }
            let max_root_n = species.stage_max_root_n_concentration[state.stage];
            state.n_concentration_root = state
                .n_concentration_root
                .clamp(species.minimum_n_concentration, max_root_n);
        }

        let denominator = aboveground + belowground / residue_ratio;
        if denominator > 0.0 {
            state.n_concentration_aboveground = (state.total_n_content
                - root_biomass * state.n_concentration_root)
                / denominator;
        }

        // N mass in the shoot must not drop through mere relabelling;
        // prefer keeping it and recomputing the root pool instead
        if state.n_concentration_aboveground * aboveground
            < state.n_concentration_aboveground_old * state.aboveground_biomass_old
            && aboveground > 0.0
            && root_biomass > 0.0
        {
            let kept_aboveground = state.n_concentration_aboveground_old
                * state.aboveground_biomass_old
                / aboveground;
            let implied_root = (state.total_n_content
                - state.n_concentration_aboveground * aboveground
                - state.n_concentration_aboveground / residue_ratio * belowground)
                / root_biomass;
            if implied_root >= species.minimum_n_concentration {
                state.n_concentration_aboveground = kept_aboveground;
                state.n_concentration_root = implied_root;
            }
        }
    }
}
