//! Immutable species/cultivar/site constants and the run configuration.
//!
//! A [`ParameterSet`] is supplied once at crop construction and shared by
//! reference (`Arc`) between the process engines. A perennial crop that
//! cycles back to stage 0 swaps in a second, post-transplant `ParameterSet`
//! by replacing the `Arc`, never by copying fields.

mod config;
mod cultivar;
mod species;

pub use config::{
    AssimilationMode, Co2Response, CropConfig, EmergenceGate, OnOff,
    PhenologyTemperatureResponse, SiteParameters, VcmaxTemperatureResponse,
};
pub use cultivar::{CultivarParameters, YieldComponent};
pub use species::{CarboxylationPathway, SpeciesParameters};

use cropmod_core::errors::{CropError, CropResult};
use serde::{Deserialize, Serialize};

/// Species plus cultivar constants for one crop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSet {
    pub species: SpeciesParameters,
    pub cultivar: CultivarParameters,
}

impl ParameterSet {
    pub fn num_stages(&self) -> usize {
        self.cultivar.stage_temperature_sum.len()
    }

    pub fn num_organs(&self) -> usize {
        self.species.organ_is_above_ground.len()
    }

    /// Index of the storage organ, if the species has one.
    pub fn storage_organ(&self) -> Option<usize> {
        self.species.organ_is_storage.iter().position(|&s| s)
    }

    /// Reject inconsistent parameter sets before any simulation starts.
    ///
    /// Every per-stage and per-organ array must agree on its length, the
    /// partitioning and senescence matrices must be [stage][organ] shaped,
    /// and yield components must reference existing organs.
    pub fn validate(&self) -> CropResult<()> {
        let num_stages = self.num_stages();
        let num_organs = self.num_organs();

        if num_stages == 0 {
            return Err(CropError::Parameter("stage table is empty".into()));
        }
        if num_organs == 0 {
            return Err(CropError::Parameter("organ table is empty".into()));
        }

        let stage_arrays: [(&str, usize); 10] = [
            (
                "stage_mobilisation_from_storage",
                self.species.stage_mobilisation_from_storage.len(),
            ),
            (
                "stage_max_root_n_concentration",
                self.species.stage_max_root_n_concentration.len(),
            ),
            (
                "vernalisation_requirement",
                self.cultivar.vernalisation_requirement.len(),
            ),
            (
                "daylength_requirement",
                self.cultivar.daylength_requirement.len(),
            ),
            ("base_daylength", self.cultivar.base_daylength.len()),
            ("base_temperature", self.species.base_temperature.len()),
            ("optimum_temperature", self.species.optimum_temperature.len()),
            (
                "critical_oxygen_content",
                self.species.critical_oxygen_content.len(),
            ),
            ("stage_kc_factor", self.cultivar.stage_kc_factor.len()),
            ("specific_leaf_area", self.cultivar.specific_leaf_area.len()),
        ];
        for (name, len) in stage_arrays {
            if len != num_stages {
                return Err(CropError::Parameter(format!(
                    "per-stage array {} has length {}, expected {}",
                    name, len, num_stages
                )));
            }
        }
        if self.cultivar.drought_stress_threshold.len() != num_stages {
            return Err(CropError::Parameter(format!(
                "drought_stress_threshold has length {}, expected {}",
                self.cultivar.drought_stress_threshold.len(),
                num_stages
            )));
        }

        let organ_arrays: [(&str, usize); 4] = [
            ("organ_is_storage", self.species.organ_is_storage.len()),
            (
                "initial_organ_biomass",
                self.species.initial_organ_biomass.len(),
            ),
            (
                "organ_maintenance_respiration",
                self.species.organ_maintenance_respiration.len(),
            ),
            (
                "organ_growth_respiration",
                self.species.organ_growth_respiration.len(),
            ),
        ];
        for (name, len) in organ_arrays {
            if len != num_organs {
                return Err(CropError::Parameter(format!(
                    "per-organ array {} has length {}, expected {}",
                    name, len, num_organs
                )));
            }
        }

        if self.species.stage_after_cutting >= num_stages {
            return Err(CropError::Parameter(format!(
                "stage_after_cutting {} out of range (crop has {} stages)",
                self.species.stage_after_cutting, num_stages
            )));
        }

        for (name, organ) in [
            ("root_organ", self.species.root_organ),
            ("leaf_organ", self.species.leaf_organ),
            ("shoot_organ", self.species.shoot_organ),
        ] {
            if organ >= num_organs {
                return Err(CropError::Parameter(format!(
                    "{} index {} out of range (crop has {} organs)",
                    name, organ, num_organs
                )));
            }
        }

        for (name, matrix) in [
            ("assimilate_partitioning", &self.cultivar.assimilate_partitioning),
            ("organ_senescence_rate", &self.cultivar.organ_senescence_rate),
        ] {
            if matrix.shape() != [num_stages, num_organs] {
                return Err(CropError::Parameter(format!(
                    "{} matrix has shape {:?}, expected [{}, {}]",
                    name,
                    matrix.shape(),
                    num_stages,
                    num_organs
                )));
            }
        }

        for component in self
            .cultivar
            .primary_yield_components
            .iter()
            .chain(self.cultivar.secondary_yield_components.iter())
        {
            if component.organ >= num_organs {
                return Err(CropError::UnknownOrgan {
                    organ: component.organ,
                    num_organs,
                });
            }
        }

        Ok(())
    }
}
