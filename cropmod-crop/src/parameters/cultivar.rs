//! Cultivar-level parameters.
//!
//! Breeding-dependent constants: the stage thermal-sum schedule, the
//! [stage][organ] partitioning and senescence matrices, canopy geometry
//! and the yield component tables. Defaults continue the generic winter
//! cereal of [`super::SpeciesParameters`].

use cropmod_core::FloatValue;
use ndarray::{array, Array2};
use serde::{Deserialize, Serialize};

/// One entry of a yield component table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldComponent {
    /// Organ index contributing to this yield fraction.
    pub organ: usize,
    /// Share of the organ's biomass that is yield
    /// unit: fraction [0, 1]
    pub yield_percentage: FloatValue,
    /// Dry matter content of the harvested fresh matter
    /// unit: fraction [0, 1]
    pub dry_matter_fraction: FloatValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CultivarParameters {
    /// Thermal time needed to complete each stage
    /// unit: °Cd
    pub stage_temperature_sum: Vec<FloatValue>,

    /// Crop coefficient at the end of each stage (Kc interpolates within
    /// a stage between the previous and the current entry)
    /// unit: dimensionless
    pub stage_kc_factor: Vec<FloatValue>,

    /// Specific leaf area per stage
    /// unit: ha leaf / kg dry matter
    pub specific_leaf_area: Vec<FloatValue>,

    /// Assimilate partitioning coefficients, rows per stage, columns per
    /// organ; each row sums to ≈ 1
    pub assimilate_partitioning: Array2<FloatValue>,

    /// Daily senescence rate of green biomass, rows per stage, columns
    /// per organ
    /// unit: 1/day
    pub organ_senescence_rate: Array2<FloatValue>,

    /// Maximum gross assimilation rate
    /// unit: kg CO2 ha⁻¹ leaf d⁻¹
    /// default: 30.0
    pub max_assimilation_rate: FloatValue,

    /// Effective vernalisation days required per stage before development
    /// continues (0 disables vernalisation in that stage)
    /// unit: days
    pub vernalisation_requirement: Vec<FloatValue>,

    /// Photoperiod requirement per stage; positive for long-day plants,
    /// negative for short-day plants, 0 for neutral stages
    /// unit: h
    pub daylength_requirement: Vec<FloatValue>,

    /// Base day length per stage below which development stalls
    /// unit: h
    pub base_daylength: Vec<FloatValue>,

    /// Bounds of the bell-shaped development temperature response, used
    /// when the Wang-Engel phenology kernel is configured
    /// unit: °C
    /// defaults: 0.0 / 25.0 / 35.0
    pub min_temperature_development: FloatValue,
    pub opt_temperature_development: FloatValue,
    pub max_temperature_development: FloatValue,

    /// Available-water fraction per stage below which transpiration
    /// deficit starts to scale assimilation
    /// unit: fraction [0, 1]
    pub drought_stress_threshold: Vec<FloatValue>,

    /// Maximum crop height
    /// unit: m
    /// default: 0.83
    pub max_crop_height: FloatValue,

    /// Steepness of the logistic height curve
    /// default: 6.0
    pub crop_height_p1: FloatValue,

    /// Relative development at the logistic height inflection
    /// default: 0.5
    pub crop_height_p2: FloatValue,

    /// Maximum rooting depth of the cultivar (possibly texture-adjusted
    /// at initialisation)
    /// unit: m
    /// default: 1.1
    pub max_rooting_depth: FloatValue,

    /// Site-quality multiplier on the assimilation rate
    /// default: 1.0
    pub field_condition_modifier: FloatValue,

    /// Fully hardened cold tolerance of the cultivar
    /// unit: °C
    /// default: -24.0
    pub lt50_cultivar: FloatValue,

    /// Threshold above which photosynthesis-period temperature damages
    /// fertility
    /// unit: °C
    /// default: 31.0
    pub critical_temperature_heat_stress: FloatValue,

    /// Temperature at which heat sterility is complete
    /// unit: °C
    /// default: 40.0
    pub heat_stress_temperature_limit: FloatValue,

    /// Thermal-sum window, relative to cycle start, in which the crop is
    /// heat sensitive
    /// unit: °Cd
    /// defaults: 720.0 / 1000.0
    pub begin_sensitive_phase_heat_stress: FloatValue,
    pub end_sensitive_phase_heat_stress: FloatValue,

    /// Nitrogen concentration of cutting/harvest residues
    /// unit: kg N / kg
    /// default: 0.004
    pub residue_n_concentration: FloatValue,

    /// Ratio scaling down the N target of belowground residue biomass
    /// relative to the aboveground target
    /// default: 10.0
    pub residue_n_ratio: FloatValue,

    /// Yield components making up the primary (marketable) yield.
    pub primary_yield_components: Vec<YieldComponent>,

    /// Yield components making up the secondary yield (straw etc.).
    pub secondary_yield_components: Vec<YieldComponent>,
}

impl Default for CultivarParameters {
    fn default() -> Self {
        Self {
            stage_temperature_sum: vec![148.0, 284.0, 380.0, 180.0, 420.0, 25.0],
            stage_kc_factor: vec![0.4, 0.7, 1.1, 1.1, 0.8, 0.25],
            specific_leaf_area: vec![0.002, 0.0019, 0.0016, 0.0014, 0.0013, 0.0013],
            // rows: stages 0..5, columns: root, leaf, shoot, storage
            assimilate_partitioning: array![
                [0.5, 0.5, 0.0, 0.0],
                [0.2, 0.48, 0.32, 0.0],
                [0.13, 0.3, 0.57, 0.0],
                [0.0, 0.0, 0.05, 0.95],
                [0.0, 0.0, 0.0, 1.0],
                [0.0, 0.0, 0.0, 0.0],
            ],
            organ_senescence_rate: array![
                [0.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
                [0.0, 0.0023, 0.0, 0.0],
                [0.0, 0.0023, 0.0, 0.0],
                [0.0, 0.05, 0.0, 0.0],
            ],
            max_assimilation_rate: 30.0,
            vernalisation_requirement: vec![0.0, 50.0, 0.0, 0.0, 0.0, 0.0],
            daylength_requirement: vec![0.0, 20.0, 20.0, 20.0, 0.0, 0.0],
            base_daylength: vec![0.0, 7.0, 7.0, 7.0, 0.0, 0.0],
            min_temperature_development: 0.0,
            opt_temperature_development: 25.0,
            max_temperature_development: 35.0,
            drought_stress_threshold: vec![1.0, 0.9, 1.0, 1.0, 0.9, 0.7],
            max_crop_height: 0.83,
            crop_height_p1: 6.0,
            crop_height_p2: 0.5,
            max_rooting_depth: 1.1,
            field_condition_modifier: 1.0,
            lt50_cultivar: -24.0,
            critical_temperature_heat_stress: 31.0,
            heat_stress_temperature_limit: 40.0,
            begin_sensitive_phase_heat_stress: 720.0,
            end_sensitive_phase_heat_stress: 1000.0,
            residue_n_concentration: 0.004,
            residue_n_ratio: 10.0,
            primary_yield_components: vec![YieldComponent {
                organ: 3,
                yield_percentage: 0.85,
                dry_matter_fraction: 0.86,
            }],
            secondary_yield_components: vec![YieldComponent {
                organ: 2,
                yield_percentage: 0.9,
                dry_matter_fraction: 0.86,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitioning_rows_sum_to_one_while_growing() {
        let params = CultivarParameters::default();
        for (stage, row) in params.assimilate_partitioning.rows().into_iter().enumerate() {
            let sum: FloatValue = row.sum();
            // final stage partitions nothing
            if stage < 5 {
                assert!(
                    (sum - 1.0).abs() < 1e-9,
                    "partitioning row {} should sum to 1, got {}",
                    stage,
                    sum
                );
            }
        }
    }

    #[test]
    fn test_stage_tables_agree_on_length() {
        let params = CultivarParameters::default();
        let n = params.stage_temperature_sum.len();
        assert_eq!(params.stage_kc_factor.len(), n);
        assert_eq!(params.specific_leaf_area.len(), n);
        assert_eq!(params.assimilate_partitioning.nrows(), n);
        assert_eq!(params.organ_senescence_rate.nrows(), n);
    }
}
