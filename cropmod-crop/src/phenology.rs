//! Phenological state machine.
//!
//! Advances the developmental stage on accumulated thermal time, modulated
//! by vernalisation, photoperiod and stress acceleration, and reports the
//! discrete lifecycle events of the day. Stage 0 (germination) runs on
//! soil temperature with configurable moisture/flooding gates; all later
//! stages run on air temperature.

use std::sync::Arc;

use crate::parameters::{CropConfig, EmergenceGate, ParameterSet, PhenologyTemperatureResponse};
use crate::state::CropState;
use cropmod_core::errors::{CropError, CropResult};
use cropmod_core::host::LifecycleEvent;
use cropmod_core::soil::SoilLayer;
use cropmod_core::FloatValue;
use log::debug;

/// Per-day inputs of the phenology step.
#[derive(Debug, Clone, Copy)]
pub struct PhenologyInputs<'a> {
    /// unit: °C
    pub mean_air_temperature: FloatValue,
    /// Topsoil layer, supplying germination temperature and moisture.
    pub top_layer: &'a SoilLayer,
    /// unit: mm
    pub surface_water_storage: FloatValue,
    /// unit: h
    pub effective_day_length: FloatValue,
    /// unit: h
    pub photoperiodic_day_length: FloatValue,
}

/// What happened during one phenology step.
#[derive(Debug, Clone, Default)]
pub struct PhenologyOutcome {
    pub events: Vec<LifecycleEvent>,
    /// Set when a perennial completed its cycle and reset to stage 0;
    /// the orchestrator swaps in the post-transplant parameters.
    pub perennial_reset: bool,
}

/// Bell-shaped Wang-Engel temperature response on [tmin, tmax] with
/// optimum topt, normalized to 1 at the optimum.
pub fn wang_engel_temperature_response(
    t: FloatValue,
    tmin: FloatValue,
    topt: FloatValue,
    tmax: FloatValue,
) -> FloatValue {
    if t <= tmin || t >= tmax || topt <= tmin || tmax <= topt {
        return 0.0;
    }
    let alpha = FloatValue::ln(2.0) / FloatValue::ln((tmax - tmin) / (topt - tmin));
    let term = (t - tmin).powf(alpha);
    let opt_term = (topt - tmin).powf(alpha);
    let response = (2.0 * term * opt_term - term * term) / opt_term.powi(2);
    response.max(0.0)
}

#[derive(Debug)]
pub struct PhenologyEngine {
    parameters: Arc<ParameterSet>,
    config: CropConfig,
}

impl PhenologyEngine {
    pub fn new(parameters: Arc<ParameterSet>, config: CropConfig) -> Self {
        Self { parameters, config }
    }

    /// Swap the active parameter set (perennial cycle reset).
    pub fn set_parameters(&mut self, parameters: Arc<ParameterSet>) {
        self.parameters = parameters;
    }

    /// Photoperiod factor for the current stage, in [0, 1].
    ///
    /// Long-day plants (positive requirement) accelerate with lengthening
    /// photoperiodic days; short-day plants (negative requirement) are
    /// unhindered below their critical day length and slowed above it.
    pub fn daylength_factor(
        &self,
        stage: usize,
        effective_day_length: FloatValue,
        photoperiodic_day_length: FloatValue,
    ) -> FloatValue {
        let requirement = self.parameters.cultivar.daylength_requirement[stage];
        let base = self.parameters.cultivar.base_daylength[stage];

        let factor = if requirement > 0.0 {
            (photoperiodic_day_length - base) / (requirement - base)
        } else if requirement < 0.0 {
            let critical_day_length = -requirement;
            let maximum_day_length = -base;
            if effective_day_length <= critical_day_length {
                1.0
            } else {
                (effective_day_length - maximum_day_length)
                    / (critical_day_length - maximum_day_length)
            }
        } else {
            1.0
        };

        factor.clamp(0.0, 1.0)
    }

    /// Vernalisation factor for the current stage and the updated count
    /// of effective vernalisation days.
    ///
    /// Effective days follow a five-segment piecewise-linear response to
    /// mean temperature, fully effective between 0 and 3 °C, vanishing
    /// below -4 °C and above 18 °C.
    pub fn vernalisation_factor(
        &self,
        stage: usize,
        mean_air_temperature: FloatValue,
        vernalisation_days: FloatValue,
    ) -> (FloatValue, FloatValue) {
        let requirement = self.parameters.cultivar.vernalisation_requirement[stage];
        if requirement == 0.0 {
            return (1.0, vernalisation_days);
        }

        let t = mean_air_temperature;
        let effective = if t > -4.0 && t <= 0.0 {
            (t + 4.0) / 4.0
        } else if t > 0.0 && t <= 3.0 {
            1.0
        } else if t > 3.0 && t <= 7.0 {
            1.0 - 0.2 * (t - 3.0) / 4.0
        } else if t > 7.0 && t <= 9.0 {
            0.8 - 0.4 * (t - 7.0) / 2.0
        } else if t > 9.0 && t <= 18.0 {
            0.4 - 0.4 * (t - 9.0) / 9.0
        } else {
            0.0
        };

        let days = vernalisation_days + effective;
        let threshold = requirement.min(9.0) - 1.0;

        let factor = if threshold >= 1.0 {
            ((days - threshold) / (requirement - threshold)).max(0.0)
        } else {
            1.0
        };

        (factor.min(1.0), days)
    }

    /// Advance the state machine by one day.
    pub fn advance(
        &self,
        state: &mut CropState,
        inputs: PhenologyInputs,
    ) -> CropResult<PhenologyOutcome> {
        let num_stages = self.parameters.num_stages();
        if state.stage >= num_stages {
            return Err(CropError::IrregularStage {
                stage: state.stage,
                num_stages,
            });
        }

        let (vern_factor, vern_days) = self.vernalisation_factor(
            state.stage,
            inputs.mean_air_temperature,
            state.vernalisation_days,
        );
        state.vernalisation_factor = vern_factor;
        state.vernalisation_days = vern_days;
        state.daylength_factor = self.daylength_factor(
            state.stage,
            inputs.effective_day_length,
            inputs.photoperiodic_day_length,
        );

        let mut outcome = PhenologyOutcome::default();
        let old_stage = state.stage;

        if state.stage == 0 {
            self.advance_germination(state, &inputs, &mut outcome);
        } else {
            self.advance_vegetative(state, &inputs, &mut outcome);
        }

        if state.stage != old_stage {
            debug!("developmental stage {} -> {}", old_stage, state.stage);
            self.push_transition_events(old_stage, state.stage, &mut outcome);
        } else if state.initial_stage_event_pending {
            outcome.events.push(LifecycleEvent::StageChanged(state.stage));
        }
        state.initial_stage_event_pending = false;

        Ok(outcome)
    }

    /// Stage 0: germination.
    fn advance_germination(
        &self,
        state: &mut CropState,
        inputs: &PhenologyInputs,
        outcome: &mut PhenologyOutcome,
    ) {
        let base = self.parameters.species.base_temperature[0];
        let optimum = self.parameters.species.optimum_temperature[0];

        if self.parameters.species.perennial {
            // a perennial re-sprouts on air temperature, gated by
            // vernalisation and photoperiod instead of seedbed moisture
            if inputs.mean_air_temperature > base {
                let t = inputs.mean_air_temperature.min(optimum);
                let increment =
                    (t - base) * state.vernalisation_factor * state.daylength_factor;
                state.stage_thermal_sum[0] += increment;
                state.total_thermal_sum += increment;
            }
            self.complete_stage_if_due(state, outcome);
            return;
        }

        let soil_temperature = inputs.top_layer.temperature;
        if soil_temperature <= base {
            return;
        }

        let capillary_water =
            inputs.top_layer.field_capacity - inputs.top_layer.wilting_point;
        let moisture_ok = inputs.top_layer.moisture
            > 0.2 * capillary_water + inputs.top_layer.wilting_point;
        let no_standing_water = inputs.surface_water_storage < 0.001;

        let gate_open = match self.config.emergence_gate {
            EmergenceGate::None => true,
            EmergenceGate::Moisture => moisture_ok,
            EmergenceGate::Flooding => no_standing_water,
            EmergenceGate::MoistureAndFlooding => moisture_ok && no_standing_water,
        };
        if !gate_open {
            return;
        }

        state.stage_thermal_sum[0] += soil_temperature - base;
        self.complete_stage_if_due(state, outcome);
    }

    /// Stages 1 and above: thermal time on air temperature with stress
    /// acceleration once the storage sink dominates partitioning.
    fn advance_vegetative(
        &self,
        state: &mut CropState,
        inputs: &PhenologyInputs,
        outcome: &mut PhenologyOutcome,
    ) {
        let stage = state.stage;
        let acceleration = self.stress_acceleration(state);

        let increment = match self.config.phenology_temperature_response {
            PhenologyTemperatureResponse::WangEngel => {
                let response = wang_engel_temperature_response(
                    inputs.mean_air_temperature,
                    self.parameters.cultivar.min_temperature_development,
                    self.parameters.cultivar.opt_temperature_development,
                    self.parameters.cultivar.max_temperature_development,
                );
                response * inputs.mean_air_temperature.max(0.0)
            }
            PhenologyTemperatureResponse::ClippedLinear => {
                let base = self.parameters.species.base_temperature[stage];
                let optimum = self.parameters.species.optimum_temperature[stage];
                if inputs.mean_air_temperature > base {
                    inputs.mean_air_temperature.min(optimum) - base
                } else {
                    0.0
                }
            }
        };

        let scaled =
            increment * state.vernalisation_factor * state.daylength_factor * acceleration;
        state.stage_thermal_sum[stage] += scaled;
        state.total_thermal_sum += scaled;

        self.complete_stage_if_due(state, outcome);
    }

    /// Development acceleration by nitrogen or water deficit.
    ///
    /// Only active while the storage organ receives more than 90% of the
    /// assimilate; an oxygen-deficient crop does not accelerate on water
    /// stress.
    fn stress_acceleration(&self, state: &CropState) -> FloatValue {
        let storage = match self.parameters.storage_organ() {
            Some(organ) => organ,
            None => return 1.0,
        };
        let sink_share = self.parameters.cultivar.assimilate_partitioning[[state.stage, storage]];
        if sink_share <= 0.9 {
            return 1.0;
        }

        let by_nitrogen = if self.config.nitrogen_response.is_on() {
            1.0 + (1.0 - state.nitrogen_redux).powi(2)
        } else {
            1.0
        };

        let drought_threshold = self.parameters.cultivar.drought_stress_threshold[state.stage];
        let by_water = if state.transpiration_deficit < drought_threshold
            && state.oxygen_deficit >= 1.0
        {
            1.0 + (1.0 - state.transpiration_deficit).powi(2)
        } else {
            1.0
        };

        by_nitrogen.max(by_water)
    }

    /// Stage transition with excess thermal time carried over, and the
    /// perennial cycle reset at the final stage.
    fn complete_stage_if_due(&self, state: &mut CropState, outcome: &mut PhenologyOutcome) {
        let num_stages = self.parameters.num_stages();
        let stage = state.stage;
        let target = self.parameters.cultivar.stage_temperature_sum[stage];

        if state.stage_thermal_sum[stage] < target {
            return;
        }

        if stage < num_stages - 1 {
            let excess = state.stage_thermal_sum[stage] - target;
            state.stage += 1;
            state.stage_thermal_sum[state.stage] += excess;
        } else if self.parameters.species.perennial && state.growth_cycle_ended {
            state.stage = 0;
            state.stage_thermal_sum.iter_mut().for_each(|sum| *sum = 0.0);
            state.total_thermal_sum = 0.0;
            state.growth_cycle_ended = false;
            outcome.perennial_reset = true;
        }
        // a non-perennial crop stays at the final stage indefinitely
    }

    /// Lifecycle events for a stage transition.
    ///
    /// Anthesis and maturity transitions are a lookup keyed by the total
    /// stage count; species with 6 and 7 stages are covered, any other
    /// count never fires them.
    fn push_transition_events(
        &self,
        old_stage: usize,
        new_stage: usize,
        outcome: &mut PhenologyOutcome,
    ) {
        if old_stage == 0 && new_stage == 1 {
            outcome.events.push(LifecycleEvent::Emergence);
        }
        let (anthesis, maturity) = match self.parameters.num_stages() {
            6 => ((2, 3), (4, 5)),
            7 => ((4, 5), (5, 6)),
            _ => ((usize::MAX, usize::MAX), (usize::MAX, usize::MAX)),
        };
        if (old_stage, new_stage) == anthesis {
            outcome.events.push(LifecycleEvent::Anthesis);
        }
        if (old_stage, new_stage) == maturity {
            outcome.events.push(LifecycleEvent::Maturity);
        }
        outcome.events.push(LifecycleEvent::StageChanged(new_stage));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{CultivarParameters, SpeciesParameters};

    fn engine_with(
        mutate: impl FnOnce(&mut ParameterSet),
        config: CropConfig,
    ) -> (PhenologyEngine, Arc<ParameterSet>) {
        let mut parameters = ParameterSet {
            species: SpeciesParameters::default(),
            cultivar: CultivarParameters::default(),
        };
        mutate(&mut parameters);
        let parameters = Arc::new(parameters);
        (
            PhenologyEngine::new(Arc::clone(&parameters), config),
            parameters,
        )
    }

    fn default_engine() -> (PhenologyEngine, Arc<ParameterSet>) {
        engine_with(|_| {}, CropConfig::default())
    }

    fn warm_moist_layer() -> SoilLayer {
        SoilLayer {
            field_capacity: 0.33,
            wilting_point: 0.13,
            saturation: 0.45,
            moisture: 0.30,
            temperature: 12.0,
            no3: 0.005,
            nh4: 0.001,
            clay_fraction: 0.2,
        }
    }

    fn inputs(layer: &SoilLayer) -> PhenologyInputs {
        PhenologyInputs {
            mean_air_temperature: 15.0,
            top_layer: layer,
            surface_water_storage: 0.0,
            effective_day_length: 14.0,
            photoperiodic_day_length: 16.0,
        }
    }

    #[test]
    fn test_germination_accrues_on_warm_moist_soil() {
        let (engine, parameters) = default_engine();
        let mut state = CropState::at_seeding(&parameters, 10);
        engine.advance(&mut state, inputs(&warm_moist_layer())).unwrap();
        assert!(
            state.stage_thermal_sum[0] > 0.0,
            "warm moist seedbed should accumulate germination heat"
        );
    }

    #[test]
    fn test_dry_seedbed_blocks_germination() {
        let (engine, parameters) = default_engine();
        let mut state = CropState::at_seeding(&parameters, 10);
        let mut layer = warm_moist_layer();
        // below 20% of capillary water above wilting point
        layer.moisture = 0.15;
        engine.advance(&mut state, inputs(&layer)).unwrap();
        assert_eq!(
            state.stage_thermal_sum[0], 0.0,
            "thermal sum must not increase while the moisture gate is closed"
        );
    }

    #[test]
    fn test_dry_seedbed_ignored_when_gate_disabled() {
        let (engine, parameters) = engine_with(
            |_| {},
            CropConfig {
                emergence_gate: EmergenceGate::None,
                ..CropConfig::default()
            },
        );
        let mut state = CropState::at_seeding(&parameters, 10);
        let mut layer = warm_moist_layer();
        layer.moisture = 0.15;
        engine.advance(&mut state, inputs(&layer)).unwrap();
        assert!(state.stage_thermal_sum[0] > 0.0);
    }

    #[test]
    fn test_standing_water_blocks_germination() {
        let (engine, parameters) = default_engine();
        let mut state = CropState::at_seeding(&parameters, 10);
        let layer = warm_moist_layer();
        let mut input = inputs(&layer);
        input.surface_water_storage = 5.0;
        engine.advance(&mut state, input).unwrap();
        assert_eq!(state.stage_thermal_sum[0], 0.0);
    }

    #[test]
    fn test_stage_excess_carries_over() {
        let (engine, parameters) = engine_with(
            |p| {
                p.cultivar.stage_temperature_sum[1] = 100.0;
                // neutral modifiers so the increment is exactly T - Tbase
                p.cultivar.vernalisation_requirement = vec![0.0; 6];
                p.cultivar.daylength_requirement = vec![0.0; 6];
            },
            CropConfig::default(),
        );
        let mut state = CropState::at_seeding(&parameters, 10);
        state.stage = 1;
        state.stage_thermal_sum[1] = 95.0;

        let layer = warm_moist_layer();
        let mut input = inputs(&layer);
        // base temperature of stage 1 is 0 °C, so 10 °C adds 10 °Cd
        input.mean_air_temperature = 10.0;
        engine.advance(&mut state, input).unwrap();

        assert_eq!(state.stage, 2, "stage must advance on reaching its target");
        assert!(
            (state.stage_thermal_sum[2] - 5.0).abs() < 1e-9,
            "excess of 5 °Cd must carry into stage 2, got {}",
            state.stage_thermal_sum[2]
        );
    }

    #[test]
    fn test_emergence_event_fired() {
        let (engine, parameters) = default_engine();
        let mut state = CropState::at_seeding(&parameters, 10);
        state.stage_thermal_sum[0] = parameters.cultivar.stage_temperature_sum[0] - 1.0;
        let mut layer = warm_moist_layer();
        layer.temperature = 20.0;
        let outcome = engine.advance(&mut state, inputs(&layer)).unwrap();
        assert_eq!(state.stage, 1);
        assert!(outcome.events.contains(&LifecycleEvent::Emergence));
        assert!(outcome
            .events
            .contains(&LifecycleEvent::StageChanged(1)));
    }

    #[test]
    fn test_anthesis_lookup_for_six_stage_species() {
        let (engine, parameters) = engine_with(
            |p| {
                p.cultivar.vernalisation_requirement = vec![0.0; 6];
                p.cultivar.daylength_requirement = vec![0.0; 6];
            },
            CropConfig::default(),
        );
        let mut state = CropState::at_seeding(&parameters, 10);
        state.stage = 2;
        state.stage_thermal_sum[2] = parameters.cultivar.stage_temperature_sum[2] - 1.0;
        let layer = warm_moist_layer();
        let outcome = engine.advance(&mut state, inputs(&layer)).unwrap();
        assert_eq!(state.stage, 3);
        assert!(outcome.events.contains(&LifecycleEvent::Anthesis));
    }

    #[test]
    fn test_perennial_reset_zeroes_thermal_sums() {
        let (engine, parameters) = engine_with(
            |p| {
                p.species.perennial = true;
                p.cultivar.vernalisation_requirement = vec![0.0; 6];
                p.cultivar.daylength_requirement = vec![0.0; 6];
            },
            CropConfig::default(),
        );
        let mut state = CropState::at_seeding(&parameters, 10);
        state.stage = 5;
        state.stage_thermal_sum[5] = parameters.cultivar.stage_temperature_sum[5] + 50.0;
        state.total_thermal_sum = 1400.0;
        state.growth_cycle_ended = true;

        let layer = warm_moist_layer();
        let outcome = engine.advance(&mut state, inputs(&layer)).unwrap();

        assert!(outcome.perennial_reset);
        assert_eq!(state.stage, 0);
        assert!(state.stage_thermal_sum.iter().all(|&sum| sum == 0.0));
        assert_eq!(state.total_thermal_sum, 0.0);
        assert!(!state.growth_cycle_ended);
    }

    #[test]
    fn test_non_perennial_stays_at_final_stage() {
        let (engine, parameters) = engine_with(
            |p| {
                p.cultivar.vernalisation_requirement = vec![0.0; 6];
                p.cultivar.daylength_requirement = vec![0.0; 6];
            },
            CropConfig::default(),
        );
        let mut state = CropState::at_seeding(&parameters, 10);
        state.stage = 5;
        state.stage_thermal_sum[5] = 1e6;
        let layer = warm_moist_layer();
        engine.advance(&mut state, inputs(&layer)).unwrap();
        assert_eq!(state.stage, 5);
    }

    #[test]
    fn test_irregular_stage_is_fatal() {
        let (engine, parameters) = default_engine();
        let mut state = CropState::at_seeding(&parameters, 10);
        state.stage = 17;
        let layer = warm_moist_layer();
        let err = engine.advance(&mut state, inputs(&layer)).unwrap_err();
        assert!(matches!(err, CropError::IrregularStage { .. }));
    }

    #[test]
    fn test_stress_acceleration_only_in_storage_filling_stages() {
        let (engine, parameters) = default_engine();
        let mut state = CropState::at_seeding(&parameters, 10);
        state.nitrogen_redux = 0.5;

        state.stage = 1; // storage share 0.0
        assert_eq!(engine.stress_acceleration(&state), 1.0);

        state.stage = 4; // storage share 1.0
        let accelerated = engine.stress_acceleration(&state);
        assert!(
            (accelerated - 1.25).abs() < 1e-12,
            "1 + (1 - 0.5)^2 = 1.25, got {}",
            accelerated
        );
    }

    #[test]
    fn test_oxygen_deficit_suppresses_water_acceleration() {
        let (engine, parameters) = default_engine();
        let mut state = CropState::at_seeding(&parameters, 10);
        state.stage = 4;
        state.transpiration_deficit = 0.4;
        state.oxygen_deficit = 0.8;
        assert_eq!(
            engine.stress_acceleration(&state),
            1.0,
            "waterlogged crops do not accelerate on drought"
        );
    }

    #[test]
    fn test_wang_engel_shape() {
        let response_opt = wang_engel_temperature_response(25.0, 0.0, 25.0, 35.0);
        assert!(
            (response_opt - 1.0).abs() < 1e-9,
            "response at the optimum is 1, got {}",
            response_opt
        );
        assert_eq!(wang_engel_temperature_response(-3.0, 0.0, 25.0, 35.0), 0.0);
        assert_eq!(wang_engel_temperature_response(40.0, 0.0, 25.0, 35.0), 0.0);
        let mid = wang_engel_temperature_response(12.0, 0.0, 25.0, 35.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_vernalisation_piecewise_segments() {
        let (engine, _) = default_engine();
        // stage 1 carries the 50-day requirement
        let (_, d1) = engine.vernalisation_factor(1, 1.5, 0.0);
        assert!((d1 - 1.0).abs() < 1e-12, "0-3 °C is fully effective");
        let (_, d2) = engine.vernalisation_factor(1, -2.0, 0.0);
        assert!((d2 - 0.5).abs() < 1e-12, "-2 °C is half effective");
        let (_, d3) = engine.vernalisation_factor(1, 20.0, 0.0);
        assert_eq!(d3, 0.0, "warm days do not vernalise");
        // requirement fulfilled -> factor 1
        let (factor, _) = engine.vernalisation_factor(1, 2.0, 60.0);
        assert_eq!(factor, 1.0);
        // no requirement in stage 2 -> factor 1 regardless
        let (factor, days) = engine.vernalisation_factor(2, 2.0, 3.0);
        assert_eq!(factor, 1.0);
        assert_eq!(days, 3.0);
    }

    #[test]
    fn test_daylength_factor_long_day() {
        let (engine, _) = default_engine();
        // requirement 20 h, base 7 h at stage 1
        let factor = engine.daylength_factor(1, 12.0, 13.5);
        assert!((factor - 0.5).abs() < 1e-12, "expected 0.5, got {}", factor);
        assert_eq!(engine.daylength_factor(1, 20.0, 25.0), 1.0);
        assert_eq!(engine.daylength_factor(1, 4.0, 5.0), 0.0);
    }

    #[test]
    fn test_daylength_factor_short_day() {
        let (engine, parameters) = engine_with(
            |p| {
                p.cultivar.daylength_requirement[1] = -12.0;
                p.cultivar.base_daylength[1] = -16.0;
            },
            CropConfig::default(),
        );
        let _ = parameters;
        assert_eq!(
            engine.daylength_factor(1, 10.0, 11.0),
            1.0,
            "short-day plant unhindered below its critical day length"
        );
        let factor = engine.daylength_factor(1, 14.0, 15.0);
        assert!(
            (factor - 0.5).abs() < 1e-12,
            "halfway between critical (12 h) and maximum (16 h), got {}",
            factor
        );
    }
}
