//! Mutable per-crop state, owned exclusively by `CropModule`.
//!
//! Everything the engine carries between days lives here so that a crop
//! can be serialized, restored and re-run deterministically. Transients
//! that only flow between sub-computations of one day are kept too when
//! reporting reads them after the step.

use crate::parameters::ParameterSet;
use cropmod_core::constants::HOURS_PER_DAY;
use cropmod_core::FloatValue;
use serde::{Deserialize, Serialize};

/// Carry-over scalars of the ozone damage model.
///
/// Held per crop instance; one process may simulate several independent
/// crops, so nothing here is shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzoneState {
    /// Short-term damage factor carried from the previous hour/day, [0, 1].
    pub short_term_damage: FloatValue,
    /// Seasonal cumulative stomatal uptake
    /// unit: µmol/m²
    pub cumulative_uptake: FloatValue,
    /// Long-term senescence factor, [0.5, 1].
    pub senescence_factor: FloatValue,
    /// Senescence-driven carboxylation reduction of the last hour, [0, 1].
    pub senescence_reduction: FloatValue,
    /// Water-stress stomatal closure, computed at hour 0 and held for
    /// the day, [0, 1].
    pub water_stress_closure: FloatValue,
    /// Per-hour short-term damage factors of the current day. Owned per
    /// crop instance so several crops can run in one process.
    pub hourly_damage: Vec<FloatValue>,
    /// Day-start recovery factor blending yesterday's damage with the
    /// leaf-age recovery curve.
    pub day_recovery: FloatValue,
}

impl Default for OzoneState {
    fn default() -> Self {
        Self {
            short_term_damage: 1.0,
            cumulative_uptake: 0.0,
            senescence_factor: 1.0,
            senescence_reduction: 1.0,
            water_stress_closure: 1.0,
            hourly_damage: vec![1.0; HOURS_PER_DAY],
            day_recovery: 1.0,
        }
    }
}

/// Circular moving-average buffer used by the hourly canopy loop.
///
/// A fixed-length window with an explicit cursor, so that the averages of
/// radiation and leaf temperature survive serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingWindow {
    values: Vec<FloatValue>,
    cursor: usize,
    filled: usize,
}

impl MovingWindow {
    pub fn new(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
            cursor: 0,
            filled: 0,
        }
    }

    pub fn push(&mut self, value: FloatValue) {
        self.values[self.cursor] = value;
        self.cursor = (self.cursor + 1) % self.values.len();
        self.filled = (self.filled + 1).min(self.values.len());
    }

    pub fn mean(&self) -> FloatValue {
        if self.filled == 0 {
            return 0.0;
        }
        self.values.iter().take(self.filled).sum::<FloatValue>() / self.filled as FloatValue
    }
}

/// The full mutable state of one crop stand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropState {
    /// Fatal invariant violation, if one occurred. Once set, `step`
    /// refuses to advance this crop any further; the host decides
    /// whether to abort the run.
    pub error_status: Option<String>,

    // --- Phenology ---
    /// Developmental stage, in [0, num_stages).
    pub stage: usize,
    /// Thermal time accumulated within each stage
    /// unit: °Cd
    pub stage_thermal_sum: Vec<FloatValue>,
    /// Thermal time accumulated over the whole cycle
    /// unit: °Cd
    pub total_thermal_sum: FloatValue,
    /// Effective vernalisation days accumulated so far.
    pub vernalisation_days: FloatValue,
    pub vernalisation_factor: FloatValue,
    pub daylength_factor: FloatValue,
    /// Set when a perennial has completed its cycle and should reset to
    /// stage 0 on reaching the final stage.
    pub growth_cycle_ended: bool,
    pub maturity_reached: bool,
    pub anthesis_day: Option<u32>,
    pub maturity_day: Option<u32>,
    /// Days remaining in the post-cutting assimilation suppression window.
    pub cutting_delay_counter: u32,
    /// Persistent derating of the assimilation rate, reduced by cuttings
    /// and fruit harvests, (0, 1].
    pub assimilation_modifier: FloatValue,
    /// True until the first step after seeding has fired its stage event.
    pub initial_stage_event_pending: bool,

    // --- Organs and canopy ---
    /// unit: kg/ha
    pub organ_biomass: Vec<FloatValue>,
    /// unit: kg/ha
    pub organ_dead_biomass: Vec<FloatValue>,
    /// `biomass - dead`, clamped to ≥ 0
    /// unit: kg/ha
    pub organ_green_biomass: Vec<FloatValue>,
    /// Growth increment of the last allocation step, per organ
    /// unit: kg/ha
    pub organ_growth_increment: Vec<FloatValue>,
    /// Senescence increment of the last allocation step, per organ
    /// unit: kg/ha
    pub organ_senescence_increment: Vec<FloatValue>,
    /// Dead root matter produced today, to be deposited into the soil
    /// unit: kg/ha
    pub dead_root_increment: FloatValue,
    /// Aboveground biomass before today's allocation
    /// unit: kg/ha
    pub aboveground_biomass_old: FloatValue,
    /// Non-root belowground biomass before today's allocation
    /// unit: kg/ha
    pub belowground_biomass_old: FloatValue,
    /// Root biomass before today's allocation
    /// unit: kg/ha
    pub root_biomass_old: FloatValue,
    /// Leaf area index, floored at 0.001
    /// unit: m²/m²
    pub leaf_area_index: FloatValue,
    /// unit: m
    pub crop_height: FloatValue,
    /// unit: m
    pub crop_diameter: FloatValue,
    /// Fraction of soil shaded by the canopy, [0, 1].
    pub soil_coverage: FloatValue,
    /// Crop coefficient for the current day.
    pub kc_factor: FloatValue,

    // --- Root system ---
    /// unit: m
    pub rooting_depth: FloatValue,
    /// Texture/impenetrable-layer adjusted depth limit
    /// unit: m
    pub max_rooting_depth: FloatValue,
    pub rooting_depth_layers: usize,
    /// Always ≥ `rooting_depth_layers`.
    pub rooting_zone_layers: usize,
    /// Per-layer root density distribution factors, un-normalized.
    pub root_density_factors: Vec<FloatValue>,
    /// Root length per soil volume
    /// unit: m/m³
    pub root_density: Vec<FloatValue>,
    /// Root diameter per layer, tapering with depth
    /// unit: m
    pub root_diameter: Vec<FloatValue>,
    /// unit: m/m²
    pub total_root_length: FloatValue,
    /// Thermal time driving root penetration
    /// unit: °Cd
    pub root_thermal_sum: FloatValue,

    // --- Stress scalars, all in [0, 1] ---
    pub nitrogen_redux: FloatValue,
    pub transpiration_deficit: FloatValue,
    pub oxygen_deficit: FloatValue,
    pub heat_stress_redux: FloatValue,
    pub frost_redux: FloatValue,
    pub drought_fertility_redux: FloatValue,
    /// Cumulative heat sterility impact over the sensitive window.
    pub total_heat_impact: FloatValue,
    /// Days spent inside the flowering-sensitive heat window.
    pub flowering_heat_days: FloatValue,
    /// Consecutive days of oxygen deficiency, capped.
    pub anoxia_days: FloatValue,
    /// Current cold hardiness
    /// unit: °C
    pub lt50: FloatValue,

    // --- Ozone ---
    pub ozone: OzoneState,

    // --- Hourly canopy diagnostics ---
    pub radiation_window_24h: MovingWindow,
    pub radiation_window_10d: MovingWindow,
    pub leaf_temperature_window_24h: MovingWindow,
    pub leaf_temperature_window_10d: MovingWindow,

    // --- Carbon fluxes of the current day ---
    /// Gross photosynthesis
    /// unit: kg CH2O/ha
    pub gross_photosynthesis: FloatValue,
    /// unit: mol CO2/m²
    pub gross_photosynthesis_mol: FloatValue,
    /// Reference-canopy photosynthesis used by the Penman-Monteith
    /// surface resistance
    /// unit: mol CO2/m²
    pub reference_photosynthesis_mol: FloatValue,
    /// Assimilation rate after temperature/CO2 response, clamped ≥ 0.1
    /// unit: kg CO2 ha⁻¹ leaf d⁻¹
    pub assimilation_rate: FloatValue,
    /// Assimilates left after respiration and stress scaling
    /// unit: kg CH2O/ha
    pub net_photosynthesis: FloatValue,
    /// Maintenance + growth respiration of the day
    /// unit: kg CH2O/ha
    pub total_respired: FloatValue,
    /// unit: kg C/ha
    pub gross_primary_production: FloatValue,
    /// unit: kg C/ha
    pub net_primary_production: FloatValue,

    // --- Water ---
    /// Canopy interception storage carried between days
    /// unit: mm
    pub interception_storage: FloatValue,
    /// Precipitation reaching the soil after interception
    /// unit: mm
    pub net_precipitation: FloatValue,
    /// unit: mm
    pub potential_evapotranspiration: FloatValue,
    /// unit: mm
    pub potential_transpiration: FloatValue,
    /// unit: mm
    pub actual_transpiration: FloatValue,
    /// Per-layer transpiration extraction, applied by the host
    /// unit: mm
    pub layer_transpiration: Vec<FloatValue>,
    /// Evaporation taken from the interception storage
    /// unit: mm
    pub intercept_evaporation: FloatValue,
    /// FAO-56 reference evapotranspiration of the day
    /// unit: mm
    pub reference_evapotranspiration: FloatValue,

    // --- Nitrogen ---
    /// Daily N demand after the uptake-capacity cap
    /// unit: kg N/m²
    pub crop_n_demand: FloatValue,
    /// unit: kg N/ha
    pub daily_n_uptake: FloatValue,
    /// unit: kg N/ha
    pub daily_n_fixation: FloatValue,
    /// Per-layer N uptake of the day
    /// unit: kg N/m²
    pub layer_n_uptake: Vec<FloatValue>,
    /// unit: kg N/ha
    pub total_n_content: FloatValue,
    /// unit: kg N / kg
    pub n_concentration_aboveground: FloatValue,
    /// Aboveground N concentration before today's nitrogen bookkeeping
    /// unit: kg N / kg
    pub n_concentration_aboveground_old: FloatValue,
    /// unit: kg N / kg
    pub n_concentration_root: FloatValue,
    /// unit: kg N / kg
    pub critical_n_concentration: FloatValue,
    /// unit: kg N / kg
    pub target_n_concentration: FloatValue,

    // --- Accumulators ---
    /// unit: kg N/ha
    pub accumulated_n_uptake: FloatValue,
    /// unit: mm
    pub accumulated_transpiration: FloatValue,
    /// unit: mm
    pub accumulated_evapotranspiration: FloatValue,
    /// unit: kg/ha
    pub accumulated_primary_yield: FloatValue,
    /// Dry matter removed from the field by cuttings
    /// unit: kg/ha
    pub exported_cut_biomass: FloatValue,
    /// Dry matter left on the field by cuttings
    /// unit: kg/ha
    pub residue_cut_biomass: FloatValue,
}

impl CropState {
    /// State at seeding: stage 0, initial organ biomass, everything else
    /// at its neutral value.
    pub fn at_seeding(parameters: &ParameterSet, num_soil_layers: usize) -> Self {
        let num_stages = parameters.num_stages();
        let num_organs = parameters.num_organs();
        let organ_biomass = parameters.species.initial_organ_biomass.clone();
        let leaf_biomass = organ_biomass[parameters.species.leaf_organ];
        let root_biomass = organ_biomass[parameters.species.root_organ];
        let aboveground: FloatValue = organ_biomass
            .iter()
            .zip(parameters.species.organ_is_above_ground.iter())
            .filter(|(_, &above)| above)
            .map(|(b, _)| *b)
            .sum();
        let n_concentration_aboveground = 0.06;
        let n_concentration_root = parameters.species.n_concentration_root;

        Self {
            error_status: None,
            stage: 0,
            stage_thermal_sum: vec![0.0; num_stages],
            total_thermal_sum: 0.0,
            vernalisation_days: 0.0,
            vernalisation_factor: 1.0,
            daylength_factor: 1.0,
            growth_cycle_ended: false,
            maturity_reached: false,
            anthesis_day: None,
            maturity_day: None,
            cutting_delay_counter: 0,
            assimilation_modifier: 1.0,
            initial_stage_event_pending: true,
            organ_green_biomass: organ_biomass.clone(),
            organ_dead_biomass: vec![0.0; num_organs],
            organ_growth_increment: vec![0.0; num_organs],
            organ_senescence_increment: vec![0.0; num_organs],
            dead_root_increment: 0.0,
            aboveground_biomass_old: aboveground,
            belowground_biomass_old: 0.0,
            root_biomass_old: root_biomass,
            leaf_area_index: (leaf_biomass * parameters.cultivar.specific_leaf_area[0]).max(0.001),
            organ_biomass,
            crop_height: 0.0,
            crop_diameter: 0.0,
            soil_coverage: 0.0,
            kc_factor: parameters.species.initial_kc_factor,
            rooting_depth: parameters.species.initial_rooting_depth,
            max_rooting_depth: parameters.cultivar.max_rooting_depth,
            rooting_depth_layers: 0,
            rooting_zone_layers: 0,
            root_density_factors: vec![0.0; num_soil_layers],
            root_density: vec![0.0; num_soil_layers],
            root_diameter: vec![0.0; num_soil_layers],
            total_root_length: 0.0,
            root_thermal_sum: 0.0,
            nitrogen_redux: 1.0,
            transpiration_deficit: 1.0,
            oxygen_deficit: 1.0,
            heat_stress_redux: 1.0,
            frost_redux: 1.0,
            drought_fertility_redux: 1.0,
            total_heat_impact: 0.0,
            flowering_heat_days: 0.0,
            anoxia_days: 0.0,
            lt50: -3.0,
            ozone: OzoneState::default(),
            radiation_window_24h: MovingWindow::new(HOURS_PER_DAY),
            radiation_window_10d: MovingWindow::new(10 * HOURS_PER_DAY),
            leaf_temperature_window_24h: MovingWindow::new(HOURS_PER_DAY),
            leaf_temperature_window_10d: MovingWindow::new(10 * HOURS_PER_DAY),
            gross_photosynthesis: 0.0,
            gross_photosynthesis_mol: 0.0,
            reference_photosynthesis_mol: 0.0,
            assimilation_rate: 0.0,
            net_photosynthesis: 0.0,
            total_respired: 0.0,
            gross_primary_production: 0.0,
            net_primary_production: 0.0,
            interception_storage: 0.0,
            net_precipitation: 0.0,
            potential_evapotranspiration: 0.0,
            potential_transpiration: 0.0,
            actual_transpiration: 0.0,
            layer_transpiration: vec![0.0; num_soil_layers],
            intercept_evaporation: 0.0,
            reference_evapotranspiration: 0.0,
            crop_n_demand: 0.0,
            daily_n_uptake: 0.0,
            daily_n_fixation: 0.0,
            layer_n_uptake: vec![0.0; num_soil_layers],
            total_n_content: aboveground * n_concentration_aboveground
                + root_biomass * n_concentration_root,
            n_concentration_aboveground,
            n_concentration_aboveground_old: n_concentration_aboveground,
            n_concentration_root,
            critical_n_concentration: 0.06,
            target_n_concentration: 0.06,
            accumulated_n_uptake: 0.0,
            accumulated_transpiration: 0.0,
            accumulated_evapotranspiration: 0.0,
            accumulated_primary_yield: 0.0,
            exported_cut_biomass: 0.0,
            residue_cut_biomass: 0.0,
        }
    }

    /// Total dry matter across all organs.
    /// unit: kg/ha
    pub fn total_biomass(&self) -> FloatValue {
        self.organ_biomass.iter().sum()
    }

    /// Dry matter of aboveground organs.
    /// unit: kg/ha
    pub fn aboveground_biomass(&self, parameters: &ParameterSet) -> FloatValue {
        self.organ_biomass
            .iter()
            .zip(parameters.species.organ_is_above_ground.iter())
            .filter(|(_, &above)| above)
            .map(|(b, _)| *b)
            .sum()
    }

    /// Dry matter of belowground organs other than the root, such as a
    /// belowground storage organ.
    /// unit: kg/ha
    pub fn belowground_biomass(&self, parameters: &ParameterSet) -> FloatValue {
        self.organ_biomass
            .iter()
            .enumerate()
            .zip(parameters.species.organ_is_above_ground.iter())
            .filter(|((organ, _), &above)| !above && *organ != parameters.species.root_organ)
            .map(|((_, b), _)| *b)
            .sum()
    }

    /// Re-derive green biomass from total and dead, clamping negatives.
    ///
    /// The shortfall of any organ whose dead mass exceeds its total is
    /// transferred into dead mass so `green = biomass - dead` holds.
    pub fn reconcile_green_biomass(&mut self) {
        for organ in 0..self.organ_biomass.len() {
            if self.organ_dead_biomass[organ] > self.organ_biomass[organ] {
                self.organ_dead_biomass[organ] = self.organ_biomass[organ];
            }
            self.organ_green_biomass[organ] =
                (self.organ_biomass[organ] - self.organ_dead_biomass[organ]).max(0.0);
        }
    }

    /// Relative thermal progress within the current stage, [0, 1].
    pub fn relative_stage_progress(&self, parameters: &ParameterSet) -> FloatValue {
        let target = parameters.cultivar.stage_temperature_sum[self.stage];
        if target <= f64::EPSILON {
            return 1.0;
        }
        (self.stage_thermal_sum[self.stage] / target).clamp(0.0, 1.0)
    }

    /// Development of the whole cycle relative to the total thermal-sum
    /// requirement, [0, 1].
    pub fn relative_development(&self, parameters: &ParameterSet) -> FloatValue {
        let total: FloatValue = parameters.cultivar.stage_temperature_sum.iter().sum();
        if total <= f64::EPSILON {
            return 0.0;
        }
        (self.total_thermal_sum / total).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{CultivarParameters, SpeciesParameters};

    fn default_parameters() -> ParameterSet {
        ParameterSet {
            species: SpeciesParameters::default(),
            cultivar: CultivarParameters::default(),
        }
    }

    #[test]
    fn test_seeding_state() {
        let params = default_parameters();
        let state = CropState::at_seeding(&params, 20);
        assert_eq!(state.stage, 0);
        assert!(state.leaf_area_index >= 0.001);
        assert_eq!(state.organ_biomass, params.species.initial_organ_biomass);
        assert!(state.error_status.is_none());
    }

    #[test]
    fn test_reconcile_green_biomass_clamps_negative() {
        let params = default_parameters();
        let mut state = CropState::at_seeding(&params, 20);
        state.organ_biomass[1] = 10.0;
        state.organ_dead_biomass[1] = 15.0;
        state.reconcile_green_biomass();
        assert_eq!(state.organ_green_biomass[1], 0.0);
        assert_eq!(
            state.organ_dead_biomass[1], 10.0,
            "dead biomass clamps to the organ total"
        );
    }

    #[test]
    fn test_moving_window_mean() {
        let mut window = MovingWindow::new(4);
        assert_eq!(window.mean(), 0.0, "empty window averages to zero");
        window.push(2.0);
        window.push(4.0);
        assert!((window.mean() - 3.0).abs() < 1e-12);
        for _ in 0..10 {
            window.push(1.0);
        }
        assert!(
            (window.mean() - 1.0).abs() < 1e-12,
            "old values rotate out of the window"
        );
    }

    #[test]
    fn test_relative_stage_progress_guards_zero_target() {
        let mut params = default_parameters();
        params.cultivar.stage_temperature_sum[0] = 0.0;
        let state = CropState::at_seeding(&params, 5);
        assert_eq!(state.relative_stage_progress(&params), 1.0);
    }
}
