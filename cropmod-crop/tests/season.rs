//! Whole-season integration tests for the crop engine.
//!
//! These drive `CropModule` day by day with synthetic weather and a
//! static soil column and check the properties that hold across any
//! season: stress scalars stay bounded, accounting identities hold,
//! stressed seasons yield less than benign ones, and the state is
//! serializable without perturbing the simulation.

use std::sync::Arc;

use is_close::is_close;

use cropmod_core::host::{LifecycleEvent, NullHost, RecordingHost};
use cropmod_core::soil::{SoilColumn, SoilLayer};
use cropmod_core::weather::DailyWeather;
use cropmod_crop::crop::CropModule;
use cropmod_crop::parameters::{
    CropConfig, CultivarParameters, ParameterSet, SiteParameters, SpeciesParameters,
};
use cropmod_crop::state::CropState;

/// A cultivar without vernalisation and photoperiod requirements, so a
/// constant-weather season runs through all stages.
fn free_running_parameters() -> Arc<ParameterSet> {
    let mut set = ParameterSet {
        species: SpeciesParameters::default(),
        cultivar: CultivarParameters::default(),
    };
    set.cultivar.vernalisation_requirement = vec![0.0; 6];
    set.cultivar.daylength_requirement = vec![0.0; 6];
    Arc::new(set)
}

fn module(parameters: Arc<ParameterSet>) -> CropModule {
    CropModule::new(
        parameters,
        CropConfig::default(),
        SiteParameters::default(),
        20,
    )
    .expect("default parameter set must construct")
}

fn soil_column(moisture: f64, no3: f64) -> SoilColumn {
    let layer = SoilLayer {
        field_capacity: 0.33,
        wilting_point: 0.13,
        saturation: 0.45,
        moisture,
        temperature: 12.0,
        no3,
        nh4: 0.001,
        clay_fraction: 0.2,
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

fn mild_weather() -> DailyWeather {
    DailyWeather {
        temperature_mean: 16.0,
        temperature_min: 10.0,
        temperature_max: 22.0,
        global_radiation: Some(18.0),
        sunshine_hours: None,
        relative_humidity: 0.7,
        wind_speed: 2.0,
        wind_speed_height: 2.0,
        co2_concentration: 410.0,
        o3_concentration: 35.0,
        precipitation: 2.0,
        reference_evapotranspiration: None,
    }
}

fn day_of_year(day: u32) -> u32 {
    (90 + day) % 365 + 1
}

mod invariants {
    use super::*;

    #[test]
    fn test_bounds_hold_through_a_full_season() {
        let mut module = module(free_running_parameters());
        let soil = soil_column(0.30, 0.01);
        let weather = mild_weather();
        let mut host = NullHost;
        let mut last_stage = 0;
        let mut last_total_thermal = 0.0;

        for day in 0..200 {
            module
                .step(day_of_year(day), &weather, &soil, &mut host)
                .unwrap();
            let state = module.state();

            for (name, value) in [
                ("nitrogen_redux", state.nitrogen_redux),
                ("transpiration_deficit", state.transpiration_deficit),
                ("oxygen_deficit", state.oxygen_deficit),
                ("heat_stress_redux", state.heat_stress_redux),
                ("frost_redux", state.frost_redux),
                ("drought_fertility_redux", state.drought_fertility_redux),
                ("ozone short-term damage", state.ozone.short_term_damage),
            ] {
                assert!(
                    (0.0..=1.0).contains(&value),
                    "day {}: {} left [0, 1]: {}",
                    day,
                    name,
                    value
                );
            }
            assert!(
                state.ozone.senescence_factor >= 0.5,
                "ozone senescence factor floors at 0.5, got {}",
                state.ozone.senescence_factor
            );
            assert!(
                state.leaf_area_index >= 0.001,
                "day {}: leaf area index fell below its floor: {}",
                day,
                state.leaf_area_index
            );
            for organ in 0..state.organ_biomass.len() {
                assert!(
                    state.organ_green_biomass[organ] >= 0.0,
                    "day {}: organ {} green biomass negative",
                    day,
                    organ
                );
                assert!(
                    state.organ_dead_biomass[organ]
                        <= state.organ_biomass[organ] + 1e-9,
                    "day {}: organ {} dead biomass exceeds the total",
                    day,
                    organ
                );
            }
            assert!(
                state.rooting_zone_layers >= state.rooting_depth_layers,
                "the rooting zone contains the rooted depth"
            );
            assert!(state.rooting_zone_layers <= soil.num_layers());
            assert!(
                state.stage >= last_stage,
                "day {}: stage regressed without a cutting",
                day
            );
            assert!(
                state.total_thermal_sum >= last_total_thermal - 1e-9,
                "day {}: total thermal sum decreased",
                day
            );
            last_stage = state.stage;
            last_total_thermal = state.total_thermal_sum;
        }
    }

    #[test]
    fn test_root_length_distributes_over_the_profile() {
        let mut module = module(free_running_parameters());
        let soil = soil_column(0.30, 0.01);
        let weather = mild_weather();
        let mut host = NullHost;
        for day in 0..80 {
            module
                .step(day_of_year(day), &weather, &soil, &mut host)
                .unwrap();
        }
        let state = module.state();
        assert!(state.total_root_length > 0.0);
        let distributed: f64 = state.root_density.iter().sum();
        assert!(
            is_close!(distributed, state.total_root_length, rel_tol = 1e-6),
            "per-layer root density must sum to the total root length: {} vs {}",
            distributed,
            state.total_root_length
        );
        for layer in state.rooting_zone_layers..soil.num_layers() {
            assert_eq!(
                state.root_density[layer], 0.0,
                "no roots below the rooting zone"
            );
        }
    }

    #[test]
    fn test_dry_seedbed_postpones_emergence() {
        let mut module = module(free_running_parameters());
        // just below the 20% capillary-water germination gate
        let dry = soil_column(0.15, 0.01);
        let weather = mild_weather();
        let mut host = RecordingHost::default();
        for day in 0..30 {
            module.step(day_of_year(day), &weather, &dry, &mut host).unwrap();
        }
        assert_eq!(module.state().stage, 0);
        assert_eq!(module.state().stage_thermal_sum[0], 0.0);
        assert!(!host.events.contains(&LifecycleEvent::Emergence));
    }
}

mod stressed_seasons {
    use super::*;

    fn aboveground_after(
        days: u32,
        soil: &SoilColumn,
        parameters: &Arc<ParameterSet>,
    ) -> f64 {
        let mut module = module(Arc::clone(parameters));
        let weather = mild_weather();
        let mut host = NullHost;
        for day in 0..days {
            module.step(day_of_year(day), &weather, soil, &mut host).unwrap();
        }
        module.state().aboveground_biomass(parameters)
    }

    #[test]
    fn test_drought_costs_biomass() {
        let parameters = free_running_parameters();
        let moist = aboveground_after(150, &soil_column(0.30, 0.01), &parameters);
        let dry = aboveground_after(150, &soil_column(0.145, 0.01), &parameters);
        assert!(
            dry < moist,
            "a droughted season must yield less aboveground biomass: {} vs {}",
            dry,
            moist
        );
    }

    #[test]
    fn test_nitrogen_starvation_costs_biomass() {
        let parameters = free_running_parameters();
        let fertile = aboveground_after(150, &soil_column(0.30, 0.01), &parameters);
        let starved = aboveground_after(150, &soil_column(0.30, 1.0e-4), &parameters);
        assert!(
            starved < fertile,
            "an N-starved season must yield less aboveground biomass: {} vs {}",
            starved,
            fertile
        );
    }
}

mod determinism {
    use super::*;

    #[test]
    fn test_state_round_trip_preserves_the_run() {
        let parameters = free_running_parameters();
        let soil = soil_column(0.30, 0.01);
        let weather = mild_weather();
        let mut host = NullHost;

        let mut original = module(Arc::clone(&parameters));
        for day in 0..40 {
            original
                .step(day_of_year(day), &weather, &soil, &mut host)
                .unwrap();
        }

        let serialized =
            serde_json::to_string(original.state()).expect("state must serialize");
        let restored: CropState =
            serde_json::from_str(&serialized).expect("state must deserialize");
        let mut resumed = module(Arc::clone(&parameters));
        resumed.restore_state(restored);

        original
            .step(day_of_year(40), &weather, &soil, &mut host)
            .unwrap();
        resumed
            .step(day_of_year(40), &weather, &soil, &mut host)
            .unwrap();

        assert_eq!(original.state().stage, resumed.state().stage);
        for organ in 0..original.state().organ_biomass.len() {
            assert_eq!(
                original.state().organ_biomass[organ],
                resumed.state().organ_biomass[organ],
                "organ {} biomass must be bit-identical after the round trip",
                organ
            );
        }
        assert_eq!(
            original.state().total_n_content,
            resumed.state().total_n_content
        );
        assert_eq!(
            original.state().leaf_area_index,
            resumed.state().leaf_area_index
        );
    }
}
