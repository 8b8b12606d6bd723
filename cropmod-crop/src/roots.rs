//! Root system: thermal-time depth growth and the per-layer root
//! density distribution, after Pedersen et al. (2010).
//!
//! Depth penetrates at a clay-dependent rate once a thermal lag has
//! passed; the density profile decays exponentially with depth inside
//! the rooted depth and tapers linearly to zero through the wider
//! rooting zone. Water and nitrogen uptake both read the resulting
//! per-layer densities.

use std::sync::Arc;

use cropmod_core::soil::SoilColumn;
use cropmod_core::weather::DailyWeather;
use cropmod_core::FloatValue;

use crate::parameters::{ParameterSet, SiteParameters};
use crate::state::CropState;

/// Span of the root-effective temperature response above the minimum.
const ROOT_TEMPERATURE_SPAN: FloatValue = 20.0;
/// The rooting zone reaches this factor beyond the rooted depth.
const ROOTING_ZONE_FACTOR: FloatValue = 1.3;
/// Daily gain of the depth limit while drought pushes roots deeper.
const DROUGHT_DEEPENING_RATE: FloatValue = 0.005;

#[derive(Debug)]
pub struct RootSystem {
    parameters: Arc<ParameterSet>,
    max_effective_rooting_depth: FloatValue,
}

impl RootSystem {
    pub fn new(parameters: Arc<ParameterSet>, site: &SiteParameters) -> Self {
        Self {
            parameters,
            max_effective_rooting_depth: site.max_effective_rooting_depth,
        }
    }

    pub fn set_parameters(&mut self, parameters: Arc<ParameterSet>) {
        self.parameters = parameters;
    }

    /// Advance rooting depth and rebuild the density profile.
    pub fn solve(&self, state: &mut CropState, weather: &DailyWeather, soil: &SoilColumn) {
        let species = &self.parameters.species;
        let cultivar = &self.parameters.cultivar;
        let num_layers = soil.num_layers();
        let thickness = soil.layer_thickness;

        // sustained drought near the depth limit pushes the limit down
        let final_stage = self.parameters.num_stages() - 1;
        if state.transpiration_deficit
            < 0.95 * cultivar.drought_stress_threshold[state.stage]
            && state.rooting_depth > 0.95 * state.max_rooting_depth
            && state.stage < final_stage
        {
            state.max_rooting_depth += DROUGHT_DEEPENING_RATE;
        }
        let depth_limit = (num_layers.saturating_sub(1)) as FloatValue * thickness;
        state.max_rooting_depth = state.max_rooting_depth.min(depth_limit);

        let daily_temperature = (weather.temperature_mean
            - species.minimum_temperature_root_growth)
            .clamp(0.0, ROOT_TEMPERATURE_SPAN);
        state.root_thermal_sum += daily_temperature;

        let front_layer = state.rooting_depth_layers.min(num_layers.saturating_sub(1));
        let clay = soil.layers[front_layer].clay_fraction;
        let penetration_rate = if clay <= 0.02 {
            0.5 * species.root_penetration_rate
        } else if clay <= 0.08 {
            (1.0 / 3.0 + 0.5 / 0.06 * clay) * species.root_penetration_rate
        } else {
            species.root_penetration_rate
        };

        if state.root_thermal_sum <= species.root_growth_lag {
            state.rooting_depth = species.initial_rooting_depth;
        } else {
            state.rooting_depth += daily_temperature * penetration_rate;
        }
        state.rooting_depth = state
            .rooting_depth
            .max(species.initial_rooting_depth)
            .min(state.max_rooting_depth)
            .min(self.max_effective_rooting_depth);

        state.rooting_depth_layers =
            ((0.5 + state.rooting_depth / thickness).floor() as usize).min(num_layers);
        state.rooting_zone_layers = ((0.5 + ROOTING_ZONE_FACTOR * state.rooting_depth / thickness)
            .floor() as usize)
            .min(num_layers);

        state.total_root_length =
            state.organ_biomass[species.root_organ] * species.specific_root_length;

        self.rebuild_density_profile(state, thickness);

        // the uptake capacity of today's root length caps the N demand
        let max_uptake_per_length = species.max_n_uptake_parameter
            - state.relative_development(&self.parameters);
        state.crop_n_demand = state
            .crop_n_demand
            .min((state.total_root_length * max_uptake_per_length).max(0.0));
    }

    fn rebuild_density_profile(&self, state: &mut CropState, thickness: FloatValue) {
        let species = &self.parameters.species;
        let depth_layers = state.rooting_depth_layers;
        let zone_layers = state.rooting_zone_layers;

        let mut factor_sum = 0.0;
        for layer in 0..state.root_density_factors.len() {
            let decay =
                FloatValue::exp(-species.root_form_factor * layer as FloatValue * thickness);
            state.root_density_factors[layer] = if layer < depth_layers {
                decay
            } else if layer < zone_layers {
                let taper = 1.0
                    - (layer - depth_layers) as FloatValue
                        / (zone_layers - depth_layers) as FloatValue;
                decay * taper
            } else {
                0.0
            };
            factor_sum += state.root_density_factors[layer];
        }

        for layer in 0..state.root_density.len() {
            state.root_density[layer] = if factor_sum > 0.0 && layer < zone_layers {
                state.root_density_factors[layer] / factor_sum * state.total_root_length
            } else {
                0.0
            };

            state.root_diameter[layer] = if layer < zone_layers {
                let storage_belowground = self
                    .parameters
                    .storage_organ()
                    .map(|organ| !species.organ_is_above_ground[organ])
                    .unwrap_or(false);
                if storage_belowground {
                    0.0001
                } else {
                    (0.0002 - (layer as FloatValue + 1.0) * 0.00001).max(0.00001)
                }
            } else {
                0.0
            };
        }
    }

    /// Distribute today's dead root matter over the rooted layers,
    /// proportional to the density factors. The orchestrator hands the
    /// result to the host's organic matter pool.
    pub fn dead_root_distribution(&self, state: &CropState) -> Vec<(usize, FloatValue)> {
        let factor_sum: FloatValue = state.root_density_factors.iter().sum();
        if state.dead_root_increment <= 0.0 || factor_sum <= 0.0 {
            return Vec::new();
        }
        state
            .root_density_factors
            .iter()
            .enumerate()
            .filter(|(_, &factor)| factor > 0.0)
            .map(|(layer, &factor)| {
                (layer, state.dead_root_increment * factor / factor_sum)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{CultivarParameters, SpeciesParameters};
    use cropmod_core::soil::SoilLayer;

    fn default_parameters() -> Arc<ParameterSet> {
        Arc::new(ParameterSet {
            species: SpeciesParameters::default(),
            cultivar: CultivarParameters::default(),
        })
    }

    fn soil_column(clay: FloatValue) -> SoilColumn {
        let layer = SoilLayer {
            field_capacity: 0.33,
            wilting_point: 0.13,
            saturation: 0.45,
            moisture: 0.25,
            temperature: 12.0,
            no3: 0.005,
            nh4: 0.001,
            clay_fraction: clay,
        };
        SoilColumn {
            layers: vec![layer; 20],
            layer_thickness: 0.1,
            surface_water_storage: 0.0,
            groundwater_table_layer: None,
            snow_depth: 0.0,
            surface_temperature: 10.0,
        }
    }

    fn warm_day() -> DailyWeather {
        DailyWeather {
            temperature_mean: 15.0,
            temperature_min: 9.0,
            temperature_max: 21.0,
            global_radiation: Some(18.0),
            sunshine_hours: None,
            relative_humidity: 0.7,
            wind_speed: 2.0,
            wind_speed_height: 2.0,
            co2_concentration: 410.0,
            o3_concentration: 30.0,
            precipitation: 0.0,
            reference_evapotranspiration: None,
        }
    }

    fn rooted_state(parameters: &ParameterSet) -> CropState {
        let mut state = CropState::at_seeding(parameters, 20);
        state.stage = 2;
        state.organ_biomass[0] = 300.0;
        state.crop_n_demand = 4.0e-4;
        state
    }

    #[test]
    fn test_depth_held_during_thermal_lag() {
        let parameters = default_parameters();
        let system = RootSystem::new(Arc::clone(&parameters), &SiteParameters::default());
        let soil = soil_column(0.2);
        let mut state = rooted_state(&parameters);

        system.solve(&mut state, &warm_day(), &soil);
        assert_eq!(
            state.rooting_depth, parameters.species.initial_rooting_depth,
            "no depth growth before the lag sum is reached"
        );
    }

    #[test]
    fn test_depth_grows_after_lag_and_respects_limit() {
        let parameters = default_parameters();
        let system = RootSystem::new(Arc::clone(&parameters), &SiteParameters::default());
        let soil = soil_column(0.2);
        let mut state = rooted_state(&parameters);

        for _ in 0..300 {
            system.solve(&mut state, &warm_day(), &soil);
        }
        assert!(
            state.rooting_depth > parameters.species.initial_rooting_depth,
            "roots must deepen over a long warm period"
        );
        assert!(
            state.rooting_depth <= parameters.cultivar.max_rooting_depth + 1e-9,
            "depth never exceeds the cultivar limit"
        );
        assert!(state.rooting_zone_layers >= state.rooting_depth_layers);
    }

    #[test]
    fn test_sandy_soil_halves_penetration() {
        let parameters = default_parameters();
        let system = RootSystem::new(Arc::clone(&parameters), &SiteParameters::default());

        let mut loam = rooted_state(&parameters);
        let mut sand = rooted_state(&parameters);
        for _ in 0..100 {
            system.solve(&mut loam, &warm_day(), &soil_column(0.2));
            system.solve(&mut sand, &warm_day(), &soil_column(0.01));
        }
        assert!(
            sand.rooting_depth < loam.rooting_depth,
            "low clay content slows root penetration: {} vs {}",
            sand.rooting_depth,
            loam.rooting_depth
        );
    }

    #[test]
    fn test_density_profile_decays_and_conserves_length() {
        let parameters = default_parameters();
        let system = RootSystem::new(Arc::clone(&parameters), &SiteParameters::default());
        let soil = soil_column(0.2);
        let mut state = rooted_state(&parameters);
        for _ in 0..200 {
            system.solve(&mut state, &warm_day(), &soil);
        }

        assert!(state.root_density[0] > state.root_density[1]);
        let density_sum: FloatValue = state.root_density.iter().sum();
        assert!(
            (density_sum - state.total_root_length).abs() < 1e-6 * state.total_root_length,
            "density profile redistributes the total root length"
        );
        for layer in state.rooting_zone_layers..soil.num_layers() {
            assert_eq!(state.root_density[layer], 0.0, "no roots beyond the zone");
        }
    }

    #[test]
    fn test_drought_extends_depth_limit() {
        let parameters = default_parameters();
        let system = RootSystem::new(Arc::clone(&parameters), &SiteParameters::default());
        let soil = soil_column(0.2);
        let mut state = rooted_state(&parameters);
        state.transpiration_deficit = 0.3;
        state.rooting_depth = 0.99 * state.max_rooting_depth;
        let limit_before = state.max_rooting_depth;

        system.solve(&mut state, &warm_day(), &soil);
        assert!(
            state.max_rooting_depth > limit_before,
            "drought near the limit deepens the accessible profile"
        );
    }

    #[test]
    fn test_dead_root_distribution_sums_to_increment() {
        let parameters = default_parameters();
        let system = RootSystem::new(Arc::clone(&parameters), &SiteParameters::default());
        let soil = soil_column(0.2);
        let mut state = rooted_state(&parameters);
        for _ in 0..100 {
            system.solve(&mut state, &warm_day(), &soil);
        }
        state.dead_root_increment = 12.0;

        let distribution = system.dead_root_distribution(&state);
        assert!(!distribution.is_empty());
        let total: FloatValue = distribution.iter().map(|(_, mass)| mass).sum();
        assert!((total - 12.0).abs() < 1e-9, "all dead matter is deposited");
    }

    #[test]
    fn test_n_demand_capped_by_root_length() {
        let parameters = default_parameters();
        let system = RootSystem::new(Arc::clone(&parameters), &SiteParameters::default());
        let soil = soil_column(0.2);
        let mut state = rooted_state(&parameters);
        state.organ_biomass[0] = 1.0e-7;
        state.crop_n_demand = 6.0e-4;

        system.solve(&mut state, &warm_day(), &soil);
        assert!(
            state.crop_n_demand < 6.0e-4,
            "a vanishing root system cannot satisfy the full demand"
        );
    }
}
