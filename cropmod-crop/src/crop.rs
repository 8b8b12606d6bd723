//! The per-crop orchestrator.
//!
//! `CropModule` owns the crop state and all process engines and advances
//! them once per simulated day in fixed causal order: radiation, oxygen
//! deficiency, phenology, crop coefficient, canopy geometry, gross
//! photosynthesis, episodic stress, nitrogen status, allocation, root
//! growth, reference evapotranspiration, water uptake, nitrogen uptake.
//! Management operations (cutting, fruit harvest, stage/biomass
//! overrides, frost write-off) and the yield accessor surface live here
//! as well.

use std::sync::Arc;

use log::{debug, error};

use cropmod_core::errors::{CropError, CropResult};
use cropmod_core::host::{CropHost, LifecycleEvent};
use cropmod_core::soil::SoilColumn;
use cropmod_core::weather::DailyWeather;
use cropmod_core::FloatValue;

use crate::allocation::AllocationEngine;
use crate::nitrogen::NitrogenUptake;
use crate::parameters::{CropConfig, ParameterSet, SiteParameters, YieldComponent};
use crate::phenology::{PhenologyEngine, PhenologyInputs};
use crate::photosynthesis::CanopyPhotosynthesis;
use crate::radiation::Radiation;
use crate::roots::RootSystem;
use crate::state::CropState;
use crate::stress::StressModifiers;
use crate::water::WaterUptake;

/// Average N concentration of raw protein.
const PROTEIN_PER_N: FloatValue = 6.25;

/// How much of an organ a cutting takes, and in which unit.
#[derive(Debug, Clone, Copy)]
pub enum CutAmount {
    /// Remove this much dry matter
    /// unit: kg/ha
    CutBiomass(FloatValue),
    /// Leave this much dry matter standing
    /// unit: kg/ha
    LeaveBiomass(FloatValue),
    /// Remove this fraction of the organ's dry matter, [0, 1].
    CutFraction(FloatValue),
    /// Leave this fraction of the organ's dry matter standing, [0, 1].
    LeaveFraction(FloatValue),
    /// Leave green biomass equivalent to this leaf area index; the
    /// organ's dead biomass is cut entirely. Intended for the leaf organ.
    LeaveLeafAreaIndex(FloatValue),
}

/// One organ's cutting specification.
#[derive(Debug, Clone, Copy)]
pub struct OrganCut {
    pub organ: usize,
    pub amount: CutAmount,
    /// Share of the cut biomass leaving the field; the rest stays as
    /// residue and is deposited into the topsoil, [0, 1].
    pub export_fraction: FloatValue,
}

#[derive(Debug)]
pub struct CropModule {
    parameters: Arc<ParameterSet>,
    /// Parameter set swapped in when a perennial completes its cycle.
    next_cycle_parameters: Option<Arc<ParameterSet>>,
    state: CropState,
    radiation: Radiation,
    phenology: PhenologyEngine,
    photosynthesis: CanopyPhotosynthesis,
    stress: StressModifiers,
    allocation: AllocationEngine,
    roots: RootSystem,
    water: WaterUptake,
    nitrogen: NitrogenUptake,
}

impl CropModule {
    pub fn new(
        parameters: Arc<ParameterSet>,
        config: CropConfig,
        site: SiteParameters,
        num_soil_layers: usize,
    ) -> CropResult<Self> {
        parameters.validate()?;
        let state = CropState::at_seeding(&parameters, num_soil_layers);
        Ok(Self {
            radiation: Radiation::new(&site),
            phenology: PhenologyEngine::new(Arc::clone(&parameters), config),
            photosynthesis: CanopyPhotosynthesis::new(Arc::clone(&parameters), config, &site),
            stress: StressModifiers::new(Arc::clone(&parameters), config),
            allocation: AllocationEngine::new(Arc::clone(&parameters), config),
            roots: RootSystem::new(Arc::clone(&parameters), &site),
            water: WaterUptake::new(Arc::clone(&parameters), config, &site),
            nitrogen: NitrogenUptake::new(Arc::clone(&parameters), config),
            parameters,
            next_cycle_parameters: None,
            state,
        })
    }

    /// Provide the parameter set a perennial switches to when its first
    /// cycle completes.
    pub fn with_next_cycle_parameters(
        mut self,
        parameters: Arc<ParameterSet>,
    ) -> CropResult<Self> {
        parameters.validate()?;
        self.next_cycle_parameters = Some(parameters);
        Ok(self)
    }

    pub fn state(&self) -> &CropState {
        &self.state
    }

    /// Restore a previously serialized state, resuming a run.
    pub fn restore_state(&mut self, state: CropState) {
        self.state = state;
    }

    pub fn parameters(&self) -> &Arc<ParameterSet> {
        &self.parameters
    }

    /// Advance the crop by one day.
    ///
    /// A fatal invariant violation latches on the state; every later call
    /// returns the stored error without advancing.
    pub fn step(
        &mut self,
        day_of_year: u32,
        weather: &DailyWeather,
        soil: &SoilColumn,
        host: &mut dyn CropHost,
    ) -> CropResult<()> {
        if let Some(message) = &self.state.error_status {
            return Err(CropError::Error(message.clone()));
        }
        let top_layer = soil
            .layers
            .first()
            .ok_or_else(|| CropError::Error("soil column has no layers".into()))?;

        if self.state.cutting_delay_counter > 0 {
            self.state.cutting_delay_counter -= 1;
        }

        let radiation = self.radiation.solve(day_of_year, weather);
        self.stress.oxygen_deficiency(&mut self.state, soil);

        let inputs = PhenologyInputs {
            mean_air_temperature: weather.temperature_mean,
            top_layer,
            surface_water_storage: soil.surface_water_storage,
            effective_day_length: radiation.effective_day_length,
            photoperiodic_day_length: radiation.photoperiodic_day_length,
        };
        let outcome = match self.phenology.advance(&mut self.state, inputs) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("crop stopped: {}", err);
                self.state.error_status = Some(err.to_string());
                return Err(err);
            }
        };
        for event in &outcome.events {
            match event {
                LifecycleEvent::Anthesis => self.state.anthesis_day = Some(day_of_year),
                LifecycleEvent::Maturity => {
                    self.state.maturity_day = Some(day_of_year);
                    self.state.maturity_reached = true;
                }
                _ => {}
            }
            host.fire_event(*event);
        }
        if outcome.perennial_reset {
            if let Some(next) = self.next_cycle_parameters.clone() {
                debug!("perennial cycle complete, switching parameter set");
                self.swap_parameters(next);
            }
        }

        self.update_kc_factor();
        if self.state.stage == 0 {
            return Ok(());
        }

        self.allocation.update_canopy(&mut self.state);
        self.photosynthesis
            .solve(&mut self.state, weather, &radiation, soil);
        self.stress.heat_stress(&mut self.state, weather);
        self.stress.frost_kill(&mut self.state, weather, soil);
        self.stress.drought_impact_on_fertility(&mut self.state);
        self.nitrogen.update_status(&mut self.state);
        self.allocation.solve(&mut self.state, weather, &radiation);
        self.roots.solve(&mut self.state, weather, soil);

        let dead_roots = self.roots.dead_root_distribution(&self.state);
        if !dead_roots.is_empty() {
            host.add_organic_matter(&dead_roots, self.state.n_concentration_root);
        }

        self.state.reference_evapotranspiration = match weather.reference_evapotranspiration {
            Some(measured) => measured,
            None => self
                .water
                .reference_evapotranspiration(&self.state, weather, &radiation),
        };
        self.water.solve(&mut self.state, weather, soil);
        self.nitrogen.solve(&mut self.state, soil);

        Ok(())
    }

    fn swap_parameters(&mut self, parameters: Arc<ParameterSet>) {
        self.phenology.set_parameters(Arc::clone(&parameters));
        self.photosynthesis.set_parameters(Arc::clone(&parameters));
        self.stress.set_parameters(Arc::clone(&parameters));
        self.allocation.set_parameters(Arc::clone(&parameters));
        self.roots.set_parameters(Arc::clone(&parameters));
        self.water.set_parameters(Arc::clone(&parameters));
        self.nitrogen.set_parameters(Arc::clone(&parameters));
        self.parameters = parameters;
    }

    /// Crop coefficient of the day, interpolated within the stage.
    fn update_kc_factor(&mut self) {
        let cultivar = &self.parameters.cultivar;
        let stage = self.state.stage;
        let progress = self.state.relative_stage_progress(&self.parameters);

        self.state.kc_factor = if stage == 0 {
            let initial = self.parameters.species.initial_kc_factor;
            initial + (cultivar.stage_kc_factor[0] - initial) * progress
        } else {
            let previous = cultivar.stage_kc_factor[stage - 1];
            previous + (cultivar.stage_kc_factor[stage] - previous) * progress
        };
    }

    // --- Management operations ---

    /// Cut the given organs, export part of the cut mass and leave the
    /// rest as residue on the field.
    ///
    /// The crop regresses to the species' post-cutting stage and, for
    /// the configured delay window, assimilates at the floor rate; the
    /// partitioning table is left untouched. `assimilation_fraction`
    /// permanently derates the assimilation rate (1.0 for none).
    pub fn apply_cutting(
        &mut self,
        cuts: &[OrganCut],
        assimilation_fraction: FloatValue,
        host: &mut dyn CropHost,
    ) -> CropResult<()> {
        let num_organs = self.parameters.num_organs();
        let leaf_organ = self.parameters.species.leaf_organ;
        let old_aboveground = self.state.aboveground_biomass(&self.parameters);
        let old_aboveground_n = old_aboveground * self.state.n_concentration_aboveground;
        let green_leaf = self.state.organ_green_biomass[leaf_organ];
        let current_sla = if green_leaf > 0.0 {
            self.state.leaf_area_index / green_leaf
        } else {
            self.parameters.cultivar.specific_leaf_area[self.state.stage]
        };

        let mut sum_cut = 0.0;
        let mut sum_residue = 0.0;
        for cut in cuts {
            if cut.organ >= num_organs {
                return Err(CropError::UnknownOrgan {
                    organ: cut.organ,
                    num_organs,
                });
            }
            let old_biomass = self.state.organ_biomass[cut.organ];
            let old_dead = self.state.organ_dead_biomass[cut.organ];

            let (new_biomass, cut_biomass) = match cut.amount {
                CutAmount::CutBiomass(mass) => {
                    let cut_mass = mass.min(old_biomass);
                    (old_biomass - cut_mass, cut_mass)
                }
                CutAmount::LeaveBiomass(mass) => {
                    let left = mass.min(old_biomass);
                    (left, old_biomass - left)
                }
                CutAmount::CutFraction(fraction) => {
                    let cut_mass = fraction.clamp(0.0, 1.0) * old_biomass;
                    (old_biomass - cut_mass, cut_mass)
                }
                CutAmount::LeaveFraction(fraction) => {
                    let left = fraction.clamp(0.0, 1.0) * old_biomass;
                    (left, old_biomass - left)
                }
                CutAmount::LeaveLeafAreaIndex(lai) => {
                    let old_green = (old_biomass - old_dead).max(0.0);
                    if lai > self.state.leaf_area_index {
                        (old_green, old_dead)
                    } else {
                        let left = (lai / current_sla).min(old_green);
                        (left, old_biomass - left)
                    }
                }
            };

            // dead biomass keeps its share of the remaining organ; an
            // LAI cut takes all of it
            self.state.organ_dead_biomass[cut.organ] = match cut.amount {
                CutAmount::LeaveLeafAreaIndex(_) => 0.0,
                _ if old_biomass > 0.0 => {
                    new_biomass * (old_dead / old_biomass).min(1.0)
                }
                _ => 0.0,
            };

            let export_fraction = cut.export_fraction.clamp(0.0, 1.0);
            debug!(
                "cutting organ {}: {:.1} -> {:.1} kg/ha, exporting {:.0}%",
                cut.organ,
                old_biomass,
                new_biomass,
                export_fraction * 100.0
            );
            sum_cut += cut_biomass;
            sum_residue += cut_biomass * (1.0 - export_fraction);
            self.state.organ_biomass[cut.organ] = new_biomass;
        }
        self.state.reconcile_green_biomass();

        let exported = sum_cut - sum_residue;
        self.state.exported_cut_biomass += exported;
        self.state.residue_cut_biomass += sum_residue;
        self.state.accumulated_primary_yield += exported;

        if sum_residue > 0.0 {
            host.add_organic_matter(
                &[(0, sum_residue)],
                self.state.n_concentration_aboveground,
            );
        }

        let green_leaf = self.state.organ_green_biomass[leaf_organ];
        if green_leaf > 0.0 {
            self.state.leaf_area_index = (green_leaf * current_sla).max(0.001);
        }

        self.set_stage(self.parameters.species.stage_after_cutting)?;
        self.state.cutting_delay_counter = self.parameters.species.cutting_delay_days;
        self.state.assimilation_modifier *= assimilation_fraction.clamp(0.0, 1.0);

        if old_aboveground > 0.0 {
            let new_aboveground = self.state.aboveground_biomass(&self.parameters);
            self.state.total_n_content -=
                (1.0 - new_aboveground / old_aboveground) * old_aboveground_n;
        }
        Ok(())
    }

    /// Harvest the given share of the storage organ and restart the
    /// growth cycle at stage 0, with a permanent 10% assimilation-rate
    /// derating. Unharvested fruit stays on the plant.
    pub fn apply_fruit_harvest(&mut self, yield_fraction: FloatValue) -> CropResult<()> {
        let storage = self.parameters.storage_organ().ok_or_else(|| {
            CropError::Error("fruit harvest on a species without a storage organ".into())
        })?;
        let fraction = yield_fraction.clamp(0.0, 1.0);
        let harvested = self.state.organ_biomass[storage] * fraction;

        self.state.organ_biomass[storage] -= harvested;
        self.state.organ_dead_biomass[storage] *= 1.0 - fraction;
        self.state.reconcile_green_biomass();
        self.state.accumulated_primary_yield += harvested;
        self.state.total_n_content = (self.state.total_n_content
            - harvested * self.state.n_concentration_aboveground)
            .max(0.0);
        debug!("fruit harvest removed {:.1} kg/ha", harvested);

        self.set_stage(0)?;
        self.state.assimilation_modifier *= 0.9;
        Ok(())
    }

    /// Write off part of a winter-killed stand: the killed share of each
    /// aboveground organ is deposited into the topsoil as residue.
    pub fn apply_frost_kill(
        &mut self,
        surviving_fraction: FloatValue,
        host: &mut dyn CropHost,
    ) {
        let fraction = surviving_fraction.clamp(0.0, 1.0);
        let mut killed = 0.0;
        for organ in 0..self.parameters.num_organs() {
            if !self.parameters.species.organ_is_above_ground[organ] {
                continue;
            }
            killed += self.state.organ_biomass[organ] * (1.0 - fraction);
            self.state.organ_biomass[organ] *= fraction;
            self.state.organ_dead_biomass[organ] *= fraction;
        }
        self.state.reconcile_green_biomass();
        let leaf = self.parameters.species.leaf_organ;
        self.state.leaf_area_index = (self.state.leaf_area_index
            * if self.state.organ_green_biomass[leaf] > 0.0 {
                fraction
            } else {
                0.0
            })
        .max(0.001);

        if killed > 0.0 {
            self.state.total_n_content = (self.state.total_n_content
                - killed * self.state.n_concentration_aboveground)
                .max(0.0);
            host.add_organic_matter(
                &[(0, killed)],
                self.parameters.cultivar.residue_n_concentration,
            );
        }
    }

    /// Move the crop to a stage: thermal sums of the new and all later
    /// stages are cleared, the total reflects the completed stages.
    pub fn set_stage(&mut self, new_stage: usize) -> CropResult<()> {
        let num_stages = self.parameters.num_stages();
        if new_stage >= num_stages {
            return Err(CropError::IrregularStage {
                stage: new_stage,
                num_stages,
            });
        }
        let mut total = 0.0;
        for stage in 0..num_stages {
            if stage < new_stage {
                total += self.state.stage_thermal_sum[stage];
            } else {
                self.state.stage_thermal_sum[stage] = 0.0;
            }
        }
        self.state.total_thermal_sum = total;
        self.state.stage = new_stage;
        Ok(())
    }

    /// Overwrite one organ's dry matter (transplanting, measured resets).
    pub fn set_organ_biomass(&mut self, organ: usize, biomass: FloatValue) -> CropResult<()> {
        let num_organs = self.parameters.num_organs();
        if organ >= num_organs {
            return Err(CropError::UnknownOrgan { organ, num_organs });
        }
        self.state.organ_biomass[organ] = biomass.max(0.0);
        self.state.reconcile_green_biomass();
        Ok(())
    }

    // --- Yield accounting ---

    fn yield_from(&self, components: &[YieldComponent], fresh: bool) -> FloatValue {
        components
            .iter()
            .map(|component| {
                let dry = self.state.organ_biomass[component.organ] * component.yield_percentage;
                if fresh {
                    dry / component.dry_matter_fraction
                } else {
                    dry
                }
            })
            .sum()
    }

    /// Marketable yield dry matter
    /// unit: kg/ha
    pub fn primary_yield(&self) -> FloatValue {
        self.yield_from(&self.parameters.cultivar.primary_yield_components, false)
    }

    /// Secondary yield (straw etc.) dry matter
    /// unit: kg/ha
    pub fn secondary_yield(&self) -> FloatValue {
        self.yield_from(&self.parameters.cultivar.secondary_yield_components, false)
    }

    /// unit: kg/ha
    pub fn fresh_primary_yield(&self) -> FloatValue {
        self.yield_from(&self.parameters.cultivar.primary_yield_components, true)
    }

    /// unit: kg/ha
    pub fn fresh_secondary_yield(&self) -> FloatValue {
        self.yield_from(&self.parameters.cultivar.secondary_yield_components, true)
    }

    /// Non-root biomass that is neither primary nor, optionally,
    /// secondary yield
    /// unit: kg/ha
    pub fn residue_biomass(&self, include_secondary: bool) -> FloatValue {
        let root = self.state.organ_biomass[self.parameters.species.root_organ];
        let secondary = if include_secondary {
            self.secondary_yield()
        } else {
            0.0
        };
        self.state.total_biomass() - root - self.primary_yield() - secondary
    }

    /// N concentration of the harvest residues
    /// unit: kg N / kg
    pub fn residues_n_concentration(&self) -> FloatValue {
        let root = self.state.organ_biomass[self.parameters.species.root_organ];
        let shoot_n = self.state.total_n_content - root * self.state.n_concentration_root;
        let denominator = self.primary_yield() / self.parameters.cultivar.residue_n_ratio
            + (self.state.total_biomass() - root - self.primary_yield());
        if denominator > 0.0 {
            shoot_n / denominator
        } else {
            0.0
        }
    }

    /// N concentration of the primary yield
    /// unit: kg N / kg
    pub fn primary_yield_n_concentration(&self) -> FloatValue {
        let root = self.state.organ_biomass[self.parameters.species.root_organ];
        let shoot_n = self.state.total_n_content - root * self.state.n_concentration_root;
        let denominator = self.primary_yield()
            + self.parameters.cultivar.residue_n_ratio
                * (self.state.total_biomass() - root - self.primary_yield());
        if denominator > 0.0 {
            shoot_n / denominator
        } else {
            0.0
        }
    }

    /// unit: kg N/ha
    pub fn primary_yield_n_content(&self) -> FloatValue {
        self.primary_yield() * self.primary_yield_n_concentration()
    }

    /// unit: kg N/ha
    pub fn residues_n_content(&self, include_secondary: bool) -> FloatValue {
        self.residue_biomass(include_secondary) * self.residues_n_concentration()
    }

    /// Raw protein share of the primary yield
    /// unit: kg / kg
    pub fn raw_protein_concentration(&self) -> FloatValue {
        self.primary_yield_n_concentration() * PROTEIN_PER_N
    }
}
