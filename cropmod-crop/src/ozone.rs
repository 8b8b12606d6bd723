//! Tropospheric ozone impact on photosynthesis.
//!
//! Hourly stomatal ozone uptake drives two damage pathways: a short-term
//! reduction of the carboxylation rate that partially recovers overnight
//! in young leaves, and a long-term acceleration of leaf senescence with
//! cumulative seasonal uptake. The carry-over scalars live in
//! [`crate::state::OzoneState`], owned per crop instance.
//!
//! After Ewert and Porter (2000), with the water-stress stomatal closure
//! of Raes et al. (2009).

use std::sync::Arc;

use crate::parameters::ParameterSet;
use crate::state::OzoneState;
use cropmod_core::constants::{NMOL_S_TO_UMOL_H, O3_CO2_DIFFUSIVITY_RATIO};
use cropmod_core::FloatValue;

/// Per-hour inputs of the ozone step.
#[derive(Debug, Clone, Copy)]
pub struct OzoneHourInputs {
    /// Hour of the day, 0..24.
    pub hour: usize,
    /// Ambient ozone concentration
    /// unit: ppb (nmol/mol)
    pub ambient_o3: FloatValue,
    /// Canopy-weighted stomatal conductance for CO2
    /// unit: mol m⁻² s⁻¹
    pub stomatal_conductance: FloatValue,
    /// Development relative to the whole cycle, [0, 1].
    pub relative_development: FloatValue,
    /// Rooted-zone average field capacity, wilting point and moisture
    /// unit: m³/m³
    pub field_capacity: FloatValue,
    pub wilting_point: FloatValue,
    pub soil_moisture: FloatValue,
    /// Reference evapotranspiration of the previous day
    /// unit: mm
    pub reference_et: FloatValue,
}

/// Damage factors returned for one hour.
#[derive(Debug, Clone, Copy)]
pub struct OzoneHourOutput {
    /// Uptake of this hour
    /// unit: nmol m⁻² s⁻¹
    pub hourly_uptake: FloatValue,
    /// Short-term damage multiplier on the carboxylation rate, [0, 1].
    pub short_term_damage: FloatValue,
    /// Senescence-driven reduction of the carboxylation rate, [0, 1].
    pub senescence_reduction: FloatValue,
}

#[derive(Debug)]
pub struct OzoneImpact {
    parameters: Arc<ParameterSet>,
}

impl OzoneImpact {
    pub fn new(parameters: Arc<ParameterSet>) -> Self {
        Self { parameters }
    }

    pub fn set_parameters(&mut self, parameters: Arc<ParameterSet>) {
        self.parameters = parameters;
    }

    /// Advance the ozone damage state by one hour.
    ///
    /// At hour 0 the day-start recovery and the water-stress stomatal
    /// closure are computed once and held for the day.
    pub fn hourly_step(&self, state: &mut OzoneState, inputs: OzoneHourInputs) -> OzoneHourOutput {
        let species = &self.parameters.species;

        if inputs.hour == 0 {
            let leaf_age_recovery = Self::recovery_by_leaf_age(inputs.relative_development);
            state.day_recovery = state.short_term_damage
                + (1.0 - state.short_term_damage) * leaf_age_recovery;
            state.water_stress_closure = Self::water_stress_stomatal_closure(
                species.stomatal_closure_upper_threshold,
                species.stomatal_closure_lower_threshold,
                species.stomatal_closure_shape,
                inputs.field_capacity,
                inputs.wilting_point,
                inputs.soil_moisture,
                inputs.reference_et,
            );
        }

        let hourly_uptake = inputs.ambient_o3
            * inputs.stomatal_conductance
            * state.water_stress_closure
            * O3_CO2_DIFFUSIVITY_RATIO;
        state.cumulative_uptake += hourly_uptake * NMOL_S_TO_UMOL_H;

        let hourly_damage =
            Self::hourly_damage(hourly_uptake, species.ozone_gamma_1, species.ozone_gamma_2);

        // the short-term factor chains the previous hour's factor; the
        // first hour of the day chains the overnight recovery instead
        let previous = if inputs.hour == 0 {
            state.day_recovery
        } else {
            state.hourly_damage[inputs.hour - 1]
        };
        state.hourly_damage[inputs.hour] = hourly_damage;
        state.short_term_damage = (hourly_damage * previous).clamp(0.0, 1.0);

        state.senescence_factor =
            Self::senescence_factor(species.ozone_gamma_3, state.cumulative_uptake);
        let senescence_reduction =
            self.senescence_reduction(state.senescence_factor, inputs.relative_development);
        state.senescence_reduction = senescence_reduction;

        OzoneHourOutput {
            hourly_uptake,
            short_term_damage: state.short_term_damage,
            senescence_reduction,
        }
    }

    /// Piecewise-linear hourly damage from instantaneous uptake.
    fn hourly_damage(
        uptake: FloatValue,
        gamma1: FloatValue,
        gamma2: FloatValue,
    ) -> FloatValue {
        if uptake <= gamma1 / gamma2 {
            1.0
        } else if uptake < (1.0 + gamma1) / gamma2 {
            1.0 + gamma1 - gamma2 * uptake
        } else {
            0.0
        }
    }

    /// Young leaves recover fully overnight; recovery fades linearly
    /// above 20% relative development.
    fn recovery_by_leaf_age(relative_development: FloatValue) -> FloatValue {
        const CRITICAL_RELDEV: FloatValue = 0.2;
        if relative_development <= CRITICAL_RELDEV {
            1.0
        } else {
            (1.0 - (relative_development - CRITICAL_RELDEV) / (1.0 - CRITICAL_RELDEV)).max(0.0)
        }
    }

    /// Long-term senescence factor, floored at 0.5.
    pub fn senescence_factor(gamma3: FloatValue, cumulative_uptake: FloatValue) -> FloatValue {
        (1.0 - gamma3 * cumulative_uptake).max(0.5)
    }

    /// Reduction of the carboxylation rate once senescence has begun.
    ///
    /// Senescence normally starts at flowering; cumulative ozone uptake
    /// moves the onset earlier and compresses the remaining span.
    fn senescence_reduction(
        &self,
        senescence_factor: FloatValue,
        relative_development: FloatValue,
    ) -> FloatValue {
        let thermal_sums = &self.parameters.cultivar.stage_temperature_sum;
        let anthesis_stage = match self.parameters.num_stages() {
            6 => 3,
            7 => 5,
            _ => return 1.0,
        };
        let gdd_maturity: FloatValue = thermal_sums.iter().sum();
        if gdd_maturity <= FloatValue::EPSILON {
            return 1.0;
        }
        let gdd_flowering: FloatValue = thermal_sums.iter().take(anthesis_stage).sum();

        let onset = (gdd_flowering / gdd_maturity) * senescence_factor;
        if relative_development <= onset {
            return 1.0;
        }
        let span = senescence_factor - onset;
        if span <= FloatValue::EPSILON {
            return 0.0;
        }
        (1.0 - (relative_development - onset) / span).max(0.0)
    }

    /// FAO-56 style relative-depletion stomatal closure under drought.
    fn water_stress_stomatal_closure(
        upper_threshold: FloatValue,
        lower_threshold: FloatValue,
        shape: FloatValue,
        field_capacity: FloatValue,
        wilting_point: FloatValue,
        soil_moisture: FloatValue,
        reference_et: FloatValue,
    ) -> FloatValue {
        // hot dry days shift the onset of closure towards wetter soil
        let upper_adjusted = (upper_threshold
            + 0.04 * (5.0 - reference_et) * (10.0 - 9.0 * upper_threshold).log10())
        .clamp(0.0, 1.0);

        let depletion = if soil_moisture >= field_capacity {
            0.0
        } else if soil_moisture <= wilting_point {
            1.0
        } else {
            1.0 - (soil_moisture - wilting_point) / (field_capacity - wilting_point)
        };

        let relative_depletion = if depletion <= upper_adjusted {
            0.0
        } else if depletion >= lower_threshold {
            1.0
        } else {
            (depletion - upper_adjusted) / (lower_threshold - upper_adjusted)
        };

        1.0 - ((relative_depletion * shape).exp() - 1.0) / (shape.exp() - 1.0)
    }
}
