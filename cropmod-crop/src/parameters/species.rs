//! Species-level parameters.
//!
//! Everything that is a property of the species rather than of a bred
//! cultivar: organ layout, respiration coefficients, temperature response
//! bounds, root system constants, nitrogen relations and the ozone damage
//! calibration. Defaults describe a generic 6-stage winter cereal with
//! four organs (root, leaf, shoot, storage).

use cropmod_core::FloatValue;
use serde::{Deserialize, Serialize};

/// Photosynthetic carbon fixation pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarboxylationPathway {
    C3,
    C4,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesParameters {
    /// Whether each organ counts towards aboveground biomass
    /// default: [false, true, true, true] (root, leaf, shoot, storage)
    pub organ_is_above_ground: Vec<bool>,

    /// Index of the root organ
    /// default: 0
    pub root_organ: usize,

    /// Index of the leaf organ (drives LAI)
    /// default: 1
    pub leaf_organ: usize,

    /// Index of the shoot organ
    /// default: 2
    pub shoot_organ: usize,

    /// Whether each organ is the assimilate storage sink
    /// default: [false, false, false, true]
    pub organ_is_storage: Vec<bool>,

    /// Organ dry matter present at seeding
    /// unit: kg/ha
    pub initial_organ_biomass: Vec<FloatValue>,

    /// Maintenance respiration coefficient per organ
    /// unit: kg CH2O per kg dry matter per day
    pub organ_maintenance_respiration: Vec<FloatValue>,

    /// Growth respiration coefficient per organ
    /// unit: kg CH2O per kg dry matter per day
    pub organ_growth_respiration: Vec<FloatValue>,

    /// Exponent slope of the maintenance respiration temperature response
    /// (AGROSIM doubled-exponential form `2^(p1 (T - p2))`)
    /// unit: 1/°C
    /// default: 0.08
    pub maintenance_respiration_param_1: FloatValue,

    /// Reference temperature of the maintenance respiration response
    /// unit: °C
    /// default: 30.0
    pub maintenance_respiration_param_2: FloatValue,

    /// Exponent slope of the growth respiration temperature response
    /// unit: 1/°C
    /// default: 0.1
    pub growth_respiration_param_1: FloatValue,

    /// Reference temperature of the growth respiration response
    /// unit: °C
    /// default: 30.0
    pub growth_respiration_param_2: FloatValue,

    /// Base temperature per developmental stage, below which no thermal
    /// time accrues
    /// unit: °C
    pub base_temperature: Vec<FloatValue>,

    /// Optimum temperature per stage; thermal time saturates here
    /// unit: °C
    pub optimum_temperature: Vec<FloatValue>,

    /// Critical air-filled pore volume per stage below which oxygen
    /// deficiency sets in
    /// unit: m³/m³
    pub critical_oxygen_content: Vec<FloatValue>,

    /// Carbon fixation pathway
    pub carboxylation_pathway: CarboxylationPathway,

    /// Temperature bounds of the assimilation temperature response
    /// unit: °C
    /// defaults: 4.0 / 22.0 / 35.0
    pub min_temperature_assimilation: FloatValue,
    pub optimum_temperature_assimilation: FloatValue,
    pub max_temperature_assimilation: FloatValue,

    /// Floor of the radiation use efficiency under CO2 response scaling
    /// unit: dimensionless
    /// default: 0.5
    pub default_radiation_use_efficiency: FloatValue,

    /// Fraction of incoming radiation reflected by the canopy
    /// unit: dimensionless
    /// default: 0.08
    pub canopy_reflection_coefficient: FloatValue,

    /// Assimilation rate of the reference canopy used by the surface
    /// resistance of the Penman-Monteith reference evapotranspiration
    /// unit: kg CO2 ha⁻¹ leaf d⁻¹
    /// default: 30.0
    pub reference_max_assimilation_rate: FloatValue,

    /// Leaf area index of the reference canopy
    /// unit: m²/m²
    /// default: 1.44
    pub reference_leaf_area_index: FloatValue,

    /// Empirical coefficient relating stomatal conductance to
    /// assimilation in the reference surface resistance
    /// default: 40.0
    pub stomata_conductance_alpha: FloatValue,

    /// Vapour pressure deficit at which stomatal conductance is halved
    /// unit: kPa
    /// default: 2.5
    pub saturation_beta: FloatValue,

    // --- Michaelis-Menten kinetics of the CO2 response (Long 1991) ---
    /// Activation energies of the carboxylation/oxygenation kinetics and
    /// of the maximum carboxylation rate
    /// unit: J/mol
    /// defaults: 59356.0 / 35948.0 / 58520.0
    pub activation_energy_kc: FloatValue,
    pub activation_energy_ko: FloatValue,
    pub activation_energy_vcmax: FloatValue,

    /// Michaelis constant for CO2 at 25 °C
    /// unit: µmol/mol
    /// default: 460.0
    pub kc_25: FloatValue,

    /// Michaelis constant for O2 at 25 °C
    /// unit: mmol/mol
    /// default: 33.0
    pub ko_25: FloatValue,

    /// Maximum carboxylation capacity at 25 °C, used by the hourly
    /// two-leaf canopy model
    /// unit: µmol m⁻² s⁻¹
    /// default: 80.0
    pub vcmax_25: FloatValue,

    /// Crop coefficient applied before emergence
    /// unit: dimensionless
    /// default: 0.4
    pub initial_kc_factor: FloatValue,

    /// Whether the species is perennial (cycles back to stage 0 instead
    /// of dying at maturity)
    pub perennial: bool,

    /// Days after a cutting during which assimilation is suppressed
    /// default: 0
    pub cutting_delay_days: u32,

    /// Developmental stage the crop regresses to after a cutting
    /// default: 1
    pub stage_after_cutting: usize,

    /// Fraction of senesced assimilate recycled into the storage organ
    /// unit: dimensionless
    /// default: 0.2
    pub assimilate_reallocation: FloatValue,

    /// Fraction of storage biomass mobilised per day in each stage and
    /// redistributed through the partitioning coefficients. Zero for
    /// annual crops; perennials use it to refill shoots from reserves.
    /// unit: 1/day
    pub stage_mobilisation_from_storage: Vec<FloatValue>,

    /// Fractional loss of leaf (index 0) and shoot (index 1) biomass per
    /// day of negative net assimilation
    /// unit: 1/day
    /// default: 0.05
    pub cannibalisation_fraction: FloatValue,

    // --- Nitrogen relations ---
    /// Slope parameter of the critical N dilution curve
    /// default: 1.6
    pub n_concentration_pn: FloatValue,

    /// Intercept parameter of the critical N dilution curve
    /// default: 5.4
    pub n_concentration_b0: FloatValue,

    /// Nitrogen concentration of root dry matter
    /// unit: kg N / kg
    /// default: 0.0105
    pub n_concentration_root: FloatValue,

    /// Minimum aboveground N concentration before growth stops
    /// unit: kg N / kg
    /// default: 0.005
    pub minimum_n_concentration: FloatValue,

    /// Luxury uptake multiplier on the critical N concentration
    /// default: 1.3
    pub luxury_n_coefficient: FloatValue,

    /// Fraction of unmet N demand covered by biological fixation
    /// (non-zero for legumes only)
    /// default: 0.0
    pub part_biological_n_fixation: FloatValue,

    /// Scale of the per-root-length N uptake capacity
    /// unit: µg N per m root per day
    /// default: 3.145
    pub max_n_uptake_parameter: FloatValue,

    /// Soil mineral N per layer that uptake can never draw below
    /// unit: kg N / m²
    /// default: 7.5e-5
    pub minimum_available_n: FloatValue,

    /// Hard cap on the daily crop N demand
    /// unit: kg N ha⁻¹ d⁻¹
    /// default: 6.0
    pub max_crop_n_demand: FloatValue,

    /// Upper bound of the root N concentration per stage
    /// unit: kg N / kg
    pub stage_max_root_n_concentration: Vec<FloatValue>,

    // --- Root system ---
    /// Rooting depth at seeding
    /// unit: m
    /// default: 0.1
    pub initial_rooting_depth: FloatValue,

    /// Depth gained per degree-day of root-effective temperature
    /// unit: m / °Cd
    /// default: 0.0011
    pub root_penetration_rate: FloatValue,

    /// Thermal time before depth growth starts
    /// unit: °Cd
    /// default: 30.0
    pub root_growth_lag: FloatValue,

    /// Soil temperature below which roots do not grow
    /// unit: °C
    /// default: 5.0
    pub minimum_temperature_root_growth: FloatValue,

    /// Shape of the exponential root density decay with depth
    /// unit: dimensionless
    /// default: 3.0
    pub root_form_factor: FloatValue,

    /// Root length per unit root dry matter
    /// unit: m/g
    /// default: 300.0
    pub specific_root_length: FloatValue,

    // --- Stress models ---
    /// Strength of drought impact on fertility (0 disables)
    /// default: 0.75
    pub drought_impact_on_fertility_factor: FloatValue,

    /// Frost hardening rate of the LT50 model
    /// unit: 1/day
    /// default: 0.01
    pub frost_hardening: FloatValue,

    /// Frost dehardening rate
    /// unit: 1/day
    /// default: 0.04
    pub frost_dehardening: FloatValue,

    /// Low temperature exposure decay coefficient
    /// default: 0.6
    pub low_temperature_exposure: FloatValue,

    /// Respiratory stress coefficient under snow
    /// default: 0.6
    pub respiratory_stress: FloatValue,

    // --- Ozone damage calibration ---
    /// Hourly uptake threshold below which no short-term damage occurs
    /// unit: µmol m⁻² h⁻¹
    /// default: 0.06
    pub ozone_gamma_1: FloatValue,

    /// Slope of short-term damage above the threshold
    /// unit: per µmol m⁻² h⁻¹
    /// default: 0.0045
    pub ozone_gamma_2: FloatValue,

    /// Slope of long-term senescence with cumulative uptake
    /// unit: per µmol m⁻²
    /// default: 0.0005
    pub ozone_gamma_3: FloatValue,

    /// Relative soil-water depletion at which stomata begin to close
    /// unit: fraction [0, 1]
    /// default: 0.5
    pub stomatal_closure_upper_threshold: FloatValue,

    /// Relative depletion at which stomata are fully closed
    /// unit: fraction [0, 1]
    /// default: 1.0
    pub stomatal_closure_lower_threshold: FloatValue,

    /// Shape of the stomatal closure response between the thresholds
    /// default: 2.5
    pub stomatal_closure_shape: FloatValue,

    // --- Canopy geometry ---
    /// Stage index at which crop height peaks
    /// default: 4
    pub stage_at_max_height: usize,

    /// Stage index at which the ground-cover diameter peaks
    /// default: 4
    pub stage_at_max_diameter: usize,

    /// Maximum crop ground-cover diameter
    /// unit: m
    /// default: 0.005
    pub max_crop_diameter: FloatValue,
}

impl Default for SpeciesParameters {
    fn default() -> Self {
        Self {
            organ_is_above_ground: vec![false, true, true, true],
            root_organ: 0,
            leaf_organ: 1,
            shoot_organ: 2,
            organ_is_storage: vec![false, false, false, true],
            initial_organ_biomass: vec![53.0, 53.0, 0.0, 0.0],
            organ_maintenance_respiration: vec![0.01, 0.03, 0.015, 0.01],
            organ_growth_respiration: vec![0.015, 0.03, 0.015, 0.01],
            maintenance_respiration_param_1: 0.08,
            maintenance_respiration_param_2: 30.0,
            growth_respiration_param_1: 0.1,
            growth_respiration_param_2: 30.0,
            base_temperature: vec![0.0, 0.0, 1.0, 1.0, 9.0, 9.0],
            optimum_temperature: vec![30.0, 30.0, 25.0, 25.0, 30.0, 30.0],
            critical_oxygen_content: vec![0.08; 6],
            carboxylation_pathway: CarboxylationPathway::C3,
            min_temperature_assimilation: 4.0,
            optimum_temperature_assimilation: 22.0,
            max_temperature_assimilation: 35.0,
            default_radiation_use_efficiency: 0.5,
            canopy_reflection_coefficient: 0.08,
            reference_max_assimilation_rate: 30.0,
            reference_leaf_area_index: 1.44,
            stomata_conductance_alpha: 40.0,
            saturation_beta: 2.5,
            activation_energy_kc: 59356.0,
            activation_energy_ko: 35948.0,
            activation_energy_vcmax: 58520.0,
            kc_25: 460.0,
            ko_25: 33.0,
            vcmax_25: 80.0,
            initial_kc_factor: 0.4,
            perennial: false,
            cutting_delay_days: 0,
            stage_after_cutting: 1,
            assimilate_reallocation: 0.2,
            stage_mobilisation_from_storage: vec![0.0; 6],
            cannibalisation_fraction: 0.05,
            n_concentration_pn: 1.6,
            n_concentration_b0: 5.4,
            n_concentration_root: 0.0105,
            minimum_n_concentration: 0.005,
            luxury_n_coefficient: 1.3,
            part_biological_n_fixation: 0.0,
            max_n_uptake_parameter: 3.145,
            minimum_available_n: 7.5e-5,
            max_crop_n_demand: 6.0,
            stage_max_root_n_concentration: vec![0.02, 0.02, 0.012, 0.01, 0.009, 0.0075],
            initial_rooting_depth: 0.1,
            root_penetration_rate: 0.0011,
            root_growth_lag: 30.0,
            minimum_temperature_root_growth: 5.0,
            root_form_factor: 3.0,
            specific_root_length: 300.0,
            drought_impact_on_fertility_factor: 0.75,
            frost_hardening: 0.01,
            frost_dehardening: 0.04,
            low_temperature_exposure: 0.6,
            respiratory_stress: 0.6,
            ozone_gamma_1: 0.06,
            ozone_gamma_2: 0.0045,
            ozone_gamma_3: 0.0005,
            stomatal_closure_upper_threshold: 0.5,
            stomatal_closure_lower_threshold: 1.0,
            stomatal_closure_shape: 2.5,
            stage_at_max_height: 4,
            stage_at_max_diameter: 4,
            max_crop_diameter: 0.005,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_organ_layout() {
        let params = SpeciesParameters::default();
        assert_eq!(params.organ_is_above_ground.len(), 4);
        assert!(!params.organ_is_above_ground[0], "root is belowground");
        assert!(params.organ_is_storage[3], "storage organ is the fourth");
    }

    #[test]
    fn test_default_stage_count_consistent() {
        let params = SpeciesParameters::default();
        assert_eq!(params.base_temperature.len(), 6);
        assert_eq!(params.optimum_temperature.len(), 6);
        assert_eq!(params.critical_oxygen_content.len(), 6);
    }
}
