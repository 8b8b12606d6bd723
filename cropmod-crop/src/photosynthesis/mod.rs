//! Canopy gross photosynthesis.
//!
//! The daily mode combines a temperature/CO2 assimilation rate with a
//! closed-form canopy light-interception integral evaluated for a clear
//! and an overcast sky, weighted by the day's overcast fraction. The
//! hourly mode replaces the integral with the two-leaf biochemical model
//! of [`hourly`] and couples stomatal ozone uptake into each hour.
//!
//! A second, fixed reference canopy is always evaluated with the daily
//! model; its molar assimilation feeds the surface resistance of the
//! reference evapotranspiration.

mod hourly;

pub use hourly::{
    canopy_hourly_c3, hourly_radiation, hourly_temperature, hourly_vapour_pressure_deficit,
    CanopyHourInputs, CanopyHourOutput, LeafFraction,
};

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use cropmod_core::constants::{
    CO2_TO_CH2O, DEG_TO_RAD, MOLAR_MASS_CO2, MOLAR_VOLUME_STP, SECONDS_PER_HOUR,
};
use cropmod_core::soil::SoilColumn;
use cropmod_core::weather::DailyWeather;
use cropmod_core::FloatValue;

use crate::ozone::{OzoneHourInputs, OzoneImpact};
use crate::parameters::{
    AssimilationMode, CarboxylationPathway, Co2Response, CropConfig, ParameterSet, SiteParameters,
    VcmaxTemperatureResponse,
};
use crate::phenology::wang_engel_temperature_response;
use crate::radiation::{Radiation, RadiationOutput};
use crate::state::CropState;

const TK25: FloatValue = 298.15;
const R_GAS: FloatValue = 8.314;
/// Floor of the assimilation rate, kg CO2 ha⁻¹ leaf d⁻¹. Keeps the
/// light integral and downstream divisions away from zero.
const MIN_ASSIMILATION_RATE: FloatValue = 0.1;

/// Converts kg CO2 ha⁻¹ d⁻¹ into mol CO2 m⁻² s⁻¹.
const KG_HA_DAY_TO_MOL_M2_S: FloatValue =
    MOLAR_VOLUME_STP / (10.0 * SECONDS_PER_HOUR * 24.0 * MOLAR_MASS_CO2);

/// Assimilation rates and radiation use efficiencies of one day, for
/// the crop canopy and for the fixed reference canopy.
#[derive(Debug, Clone, Copy)]
struct AssimilationRates {
    rate: FloatValue,
    reference_rate: FloatValue,
    rue: FloatValue,
    reference_rue: FloatValue,
}

#[derive(Debug)]
pub struct CanopyPhotosynthesis {
    parameters: Arc<ParameterSet>,
    config: CropConfig,
    latitude_rad: FloatValue,
    ozone: OzoneImpact,
}

impl CanopyPhotosynthesis {
    pub fn new(parameters: Arc<ParameterSet>, config: CropConfig, site: &SiteParameters) -> Self {
        Self {
            ozone: OzoneImpact::new(parameters.clone()),
            parameters,
            config,
            latitude_rad: site.latitude * DEG_TO_RAD,
        }
    }

    pub fn set_parameters(&mut self, parameters: Arc<ParameterSet>) {
        self.ozone.set_parameters(parameters.clone());
        self.parameters = parameters;
    }

    /// Compute the day's gross photosynthesis and write the carbon flux
    /// fields of `state`.
    pub fn solve(
        &self,
        state: &mut CropState,
        weather: &DailyWeather,
        radiation: &RadiationOutput,
        soil: &SoilColumn,
    ) {
        let species = &self.parameters.species;
        let rates = self.assimilation_rates(weather, radiation);

        let mut rate = rates.rate * state.assimilation_modifier;
        if state.cutting_delay_counter > 0 {
            rate = MIN_ASSIMILATION_RATE;
        }
        let rate = rate.max(MIN_ASSIMILATION_RATE);
        let reference_rate = rates.reference_rate.max(MIN_ASSIMILATION_RATE);
        state.assimilation_rate = rate;

        let overcast_fraction = Self::overcast_fraction(radiation);
        let mut gross_co2 = self.canopy_integral(
            rate,
            rates.rue,
            state.leaf_area_index,
            radiation,
            overcast_fraction,
        );
        let gross_co2_reference = self.canopy_integral(
            reference_rate,
            rates.reference_rue,
            species.reference_leaf_area_index,
            radiation,
            overcast_fraction,
        );

        if self.config.assimilation_mode == AssimilationMode::HourlyFvcb
            && species.carboxylation_pathway == CarboxylationPathway::C3
        {
            gross_co2 = self.hourly_canopy(state, weather, radiation, soil);
        }

        state.gross_photosynthesis = gross_co2 * CO2_TO_CH2O;
        state.gross_photosynthesis_mol = gross_co2 * KG_HA_DAY_TO_MOL_M2_S;
        state.reference_photosynthesis_mol = gross_co2_reference * KG_HA_DAY_TO_MOL_M2_S;
    }

    /// Temperature and CO2 response of the maximum assimilation rate.
    fn assimilation_rates(
        &self,
        weather: &DailyWeather,
        radiation: &RadiationOutput,
    ) -> AssimilationRates {
        let species = &self.parameters.species;
        let amax = self.parameters.cultivar.max_assimilation_rate;
        let reference_amax = species.reference_max_assimilation_rate;
        let default_rue = species.default_radiation_use_efficiency;

        let t_response = wang_engel_temperature_response(
            weather.temperature_mean,
            species.min_temperature_assimilation,
            species.optimum_temperature_assimilation,
            species.max_temperature_assimilation,
        );

        match species.carboxylation_pathway {
            CarboxylationPathway::C4 => AssimilationRates {
                rate: amax * t_response,
                reference_rate: reference_amax * t_response,
                rue: default_rue,
                reference_rue: default_rue,
            },
            CarboxylationPathway::C3 => match self.config.co2_response {
                Co2Response::Fixed => AssimilationRates {
                    rate: amax * t_response,
                    reference_rate: reference_amax * t_response,
                    rue: default_rue,
                    reference_rue: default_rue,
                },
                Co2Response::Hoffmann => {
                    let kco2 = Self::hoffmann_co2_factor(
                        weather.co2_concentration,
                        radiation.global_radiation,
                    );
                    AssimilationRates {
                        rate: amax * t_response * kco2,
                        reference_rate: reference_amax * t_response * kco2,
                        rue: default_rue,
                        reference_rue: default_rue,
                    }
                }
                Co2Response::LongMitchell => self.long_mitchell_rates(weather, t_response),
            },
        }
    }

    /// Hoffmann (1995) saturation response, normalized to 350 ppm.
    fn hoffmann_co2_factor(co2: FloatValue, global_radiation: FloatValue) -> FloatValue {
        let radiation_w = global_radiation * 86400.0 / 1e6;
        let k1 = 220.0 + 0.158 * radiation_w;
        let c0 = 80.0 - 0.036 * radiation_w;
        ((co2 - c0) / (k1 + co2 - c0)) / ((350.0 - c0) / (k1 + 350.0 - c0))
    }

    /// Rubisco kinetics CO2/temperature response after Long (1991) and
    /// Mitchell et al. (1995).
    fn long_mitchell_rates(
        &self,
        weather: &DailyWeather,
        t_response: FloatValue,
    ) -> AssimilationRates {
        let species = &self.parameters.species;
        let t = weather.temperature_mean;
        let tk = t + 273.15;
        let term1 = (tk - TK25) / (TK25 * tk * R_GAS);
        let term2 = (tk / TK25).sqrt();

        let mkc = species.kc_25 * (species.activation_energy_kc * term1).exp() * term2;
        let mko = species.ko_25 * (species.activation_energy_ko * term1).exp() * term2;

        let kt_vcmax = match self.config.vcmax_temperature_response {
            VcmaxTemperatureResponse::WangEngel => t_response.max(1e-5),
            VcmaxTemperatureResponse::Arrhenius => {
                (species.activation_energy_vcmax * term1).exp() * term2
            }
        };

        let amax_factor = self.parameters.cultivar.max_assimilation_rate / 34.668;
        let reference_amax_factor = species.reference_max_assimilation_rate / 34.668;
        let vcmax = 98.0 * amax_factor * kt_vcmax;
        let vcmax_reference = 98.0 * reference_amax_factor * kt_vcmax;

        // intercellular O2 and CO2, polynomial solubility corrections
        let oi = 210.0 * (0.047 - 0.0013087 * t + 0.000025603 * t * t
            - 0.00000021441 * t * t * t)
            / 0.026934;
        let ci = weather.co2_concentration
            * 0.7
            * (1.674 - 0.061294 * t + 0.0011688 * t * t - 0.0000088741 * t * t * t)
            / 0.73547;

        let compensation_point = 0.5 * 0.21 * vcmax * mkc * oi / (vcmax * mko);
        let compensation_point_reference =
            0.5 * 0.21 * vcmax_reference * mkc * oi / (vcmax_reference * mko);

        let mut rue = (0.77 / 2.1 * (ci - compensation_point)
            / (4.5 * ci + 10.5 * compensation_point)
            * 8.3769)
            .min(0.5);
        let mut reference_rue = (0.77 / 2.1 * (ci - compensation_point_reference)
            / (4.5 * ci + 10.5 * compensation_point_reference)
            * 8.3769)
            .min(0.5);
        if rue < 0.0 {
            rue = 0.0;
            reference_rue = 0.0;
        }

        let mut rate =
            (ci - compensation_point) * vcmax / (ci + mkc * (1.0 + oi / mko)) * 1.656;
        let mut reference_rate = (ci - compensation_point_reference) * vcmax_reference
            / (ci + mkc * (1.0 + oi / mko))
            * 1.656;
        if t < species.min_temperature_assimilation {
            rate = 0.0;
            reference_rate = 0.0;
        }

        AssimilationRates {
            rate,
            reference_rate,
            rue,
            reference_rue,
        }
    }

    /// Time fraction of the day with an overcast sky, from the gap
    /// between measured and clear-day radiation.
    fn overcast_fraction(radiation: &RadiationOutput) -> FloatValue {
        if radiation.clear_day_radiation <= 0.0 {
            return 0.0;
        }
        ((radiation.clear_day_radiation - 1e6 * radiation.global_radiation * 0.5)
            / (0.8 * radiation.clear_day_radiation))
            .clamp(0.0, 1.0)
    }

    /// Daily canopy light-interception integral.
    ///
    /// Closed-form Goudriaan-style integral over leaf angle and day
    /// time, evaluated for a clear and an overcast sky and weighted by
    /// the overcast fraction. Below a leaf area index of 5 a sparse
    /// canopy correction takes over.
    /// unit: kg CO2 ha⁻¹ d⁻¹
    fn canopy_integral(
        &self,
        rate: FloatValue,
        rue: FloatValue,
        leaf_area_index: FloatValue,
        radiation: &RadiationOutput,
        overcast_fraction: FloatValue,
    ) -> FloatValue {
        let effective_day_length = radiation.effective_day_length;
        if leaf_area_index <= 0.0
            || effective_day_length <= 0.0
            || radiation.clear_day_radiation <= 0.0
        {
            return 0.0;
        }

        let net_rue = (1.0 - self.parameters.species.canopy_reflection_coefficient) * rue;
        let sslae = (FRAC_PI_2 + radiation.declination - self.latitude_rad).sin();
        let day_length_s = effective_day_length * SECONDS_PER_HOUR;
        let clear = radiation.clear_day_radiation;
        let overcast = radiation.overcast_day_radiation;

        let x = (1.0 + 0.45 * clear / day_length_s * net_rue / (sslae * rate)).ln();
        let phch1 = sslae * rate * effective_day_length * x / (1.0 + x);
        let y = (1.0 + 0.55 * clear / day_length_s * net_rue / ((5.0 - sslae) * rate)).ln();
        let phch2 = (5.0 - sslae) * rate * effective_day_length * y / (1.0 + y);
        let phch = 0.95 * (phch1 + phch2) + 20.5;

        let closed_canopy = 1.0 - (-0.8 * leaf_area_index).exp();
        let phc3 = phch * closed_canopy;
        let phc4 = radiation.astronomic_day_length * leaf_area_index * rate;
        let phcl = Self::smooth_minimum(phc3, phc4);

        let z = overcast / day_length_s * net_rue / (5.0 * rate);
        let phoh1 = 5.0 * rate * effective_day_length * z / (1.0 + z);
        let phoh = 0.9935 * phoh1 + 1.1;
        let pho3 = phoh * closed_canopy;
        let phol = Self::smooth_minimum(pho3, phc4);

        let (clear_day, overcast_day) = if leaf_area_index < 5.0 {
            (phcl, phol)
        } else {
            (phch, phoh)
        };

        overcast_fraction * overcast_day + (1.0 - overcast_fraction) * clear_day
    }

    /// Smooth minimum of the radiation-limited and the leaf-area-limited
    /// assimilation.
    fn smooth_minimum(a: FloatValue, b: FloatValue) -> FloatValue {
        if a <= 0.0 || b <= 0.0 {
            return 0.0;
        }
        if a < b {
            a * (1.0 - (-b / a).exp())
        } else {
            b * (1.0 - (-a / b).exp())
        }
    }

    /// Hourly two-leaf canopy loop with per-hour ozone coupling.
    /// unit: kg CO2 ha⁻¹ d⁻¹
    fn hourly_canopy(
        &self,
        state: &mut CropState,
        weather: &DailyWeather,
        radiation: &RadiationOutput,
        soil: &SoilColumn,
    ) -> FloatValue {
        let species = &self.parameters.species;
        let relative_development = state.relative_development(&self.parameters);

        let mut hourly_global = [0.0; 24];
        let mut hourly_extraterrestrial = [0.0; 24];
        let mut sunrise_hour = 0;
        for hour in 0..24 {
            let global = hourly_radiation(
                radiation.global_radiation,
                radiation.sin_lat_sin_dec,
                radiation.cos_lat_cos_dec,
                hour,
            );
            if global > 0.0 && sunrise_hour == 0 {
                sunrise_hour = hour;
            }
            hourly_global[hour] = global;
            hourly_extraterrestrial[hour] = hourly_radiation(
                radiation.extraterrestrial_radiation,
                radiation.sin_lat_sin_dec,
                radiation.cos_lat_cos_dec,
                hour,
            );
        }

        let mut daily_gross = 0.0;
        for hour in 0..24 {
            let leaf_temperature = hourly_temperature(
                weather.temperature_min,
                weather.temperature_max,
                hour,
                sunrise_hour,
            );

            let ozone_damage = if self.config.ozone_response.is_on() {
                state.ozone.short_term_damage * state.ozone.senescence_reduction
            } else {
                1.0
            };

            let sin_elevation = Radiation::sin_solar_elevation(
                radiation.sin_lat_sin_dec,
                radiation.cos_lat_cos_dec,
                hour as FloatValue,
            );
            let result = canopy_hourly_c3(&CanopyHourInputs {
                leaf_temperature,
                global_radiation: hourly_global[hour],
                extraterrestrial_radiation: hourly_extraterrestrial[hour],
                leaf_area_index: state.leaf_area_index,
                solar_elevation: sin_elevation.clamp(-1.0, 1.0).asin(),
                vapour_pressure_deficit: hourly_vapour_pressure_deficit(
                    leaf_temperature,
                    weather.temperature_min,
                ),
                co2_concentration: weather.co2_concentration,
                vcmax_25: species.vcmax_25 * ozone_damage,
            });

            // µmol CO2 m⁻² h⁻¹ -> kg CO2 ha⁻¹
            daily_gross += result.canopy_gross_photosynthesis * MOLAR_MASS_CO2 / 100.0 / 1000.0;

            if self.config.ozone_response.is_on() && state.rooting_depth_layers >= 1 {
                self.couple_ozone_hour(state, weather, soil, hour, relative_development, &result);
            }

            // moving averages for the volatile-emission interface
            let radiation_w_m2 = hourly_global[hour] * 1e6 / SECONDS_PER_HOUR;
            state.radiation_window_24h.push(radiation_w_m2);
            state.radiation_window_10d.push(radiation_w_m2);
            state.leaf_temperature_window_24h.push(leaf_temperature);
            state.leaf_temperature_window_10d.push(leaf_temperature);
        }
        daily_gross
    }

    /// One hour of stomatal ozone uptake, fed with the rooted-zone
    /// average water status and the leaf-area weighted conductance.
    fn couple_ozone_hour(
        &self,
        state: &mut CropState,
        weather: &DailyWeather,
        soil: &SoilColumn,
        hour: usize,
        relative_development: FloatValue,
        canopy: &CanopyHourOutput,
    ) {
        let rooted_layers = state.rooting_depth_layers.min(soil.num_layers());
        if rooted_layers == 0 {
            return;
        }

        let total_lai = canopy.sunlit.leaf_area_index + canopy.shaded.leaf_area_index;
        if total_lai <= 0.0 {
            return;
        }
        let per_leaf = |fraction: &LeafFraction| {
            if fraction.leaf_area_index > 0.0 {
                fraction.stomatal_conductance / fraction.leaf_area_index
            } else {
                0.0
            }
        };
        let sunlit_weight = canopy.sunlit.leaf_area_index / total_lai;
        let average_leaf_conductance = (1.0 - sunlit_weight) * per_leaf(&canopy.shaded)
            + sunlit_weight * per_leaf(&canopy.sunlit);

        let mut field_capacity = 0.0;
        let mut wilting_point = 0.0;
        let mut moisture = 0.0;
        for layer in soil.layers.iter().take(rooted_layers) {
            field_capacity += layer.field_capacity;
            wilting_point += layer.wilting_point;
            moisture += layer.moisture;
        }
        let n = rooted_layers as FloatValue;

        self.ozone.hourly_step(
            &mut state.ozone,
            OzoneHourInputs {
                hour,
                ambient_o3: weather.o3_concentration,
                stomatal_conductance: average_leaf_conductance,
                relative_development,
                field_capacity: field_capacity / n,
                wilting_point: wilting_point / n,
                soil_moisture: moisture / n,
                reference_et: state.reference_evapotranspiration,
            },
        );
    }
}
