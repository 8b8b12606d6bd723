//! Hourly weather synthesis and the two-leaf biochemical canopy model.
//!
//! The daily driver only supplies min/mean/max temperature and a daily
//! radiation total, so the hourly assimilation loop first spreads those
//! over the 24 hours, then splits the canopy into a sunlit and a shaded
//! big leaf and evaluates a Farquhar-von Caemmerer-Berry leaf model per
//! fraction. Temperature kinetics follow Bernacchi et al. (2001), the
//! sunlit/shaded partitioning follows de Pury and Farquhar (1997).

use cropmod_core::constants::SECONDS_PER_HOUR;
use cropmod_core::weather::DailyWeather;
use cropmod_core::FloatValue;

use crate::radiation::Radiation;

const TK25: FloatValue = 298.15;
const R_GAS: FloatValue = 8.314;

/// Bernacchi activation energies, J/mol.
const EA_VCMAX: FloatValue = 65_330.0;
const EA_JMAX: FloatValue = 43_540.0;
const EA_KC: FloatValue = 79_430.0;
const EA_KO: FloatValue = 36_380.0;
const EA_GAMMA_STAR: FloatValue = 37_830.0;

/// Bernacchi values at 25 °C.
const KC_25: FloatValue = 404.9; // µmol/mol
const KO_25: FloatValue = 278.4; // mmol/mol
const GAMMA_STAR_25: FloatValue = 42.75; // µmol/mol

/// Intercellular oxygen, mmol/mol.
const OI: FloatValue = 210.0;
/// Jmax to Vcmax ratio at 25 °C.
const JMAX_RATIO: FloatValue = 1.9;
/// Effective quantum yield of electron transport, mol e⁻ / mol photons.
const ALPHA: FloatValue = 0.24;
/// Curvature of the light response of electron transport.
const THETA: FloatValue = 0.7;
/// Dark respiration as a fraction of Vcmax.
const RD_RATIO: FloatValue = 0.011;
/// Leaf scattering coefficient for PAR.
const LEAF_SCATTERING: FloatValue = 0.15;
/// Extinction coefficient of diffuse radiation.
const KDIF: FloatValue = 0.78;
/// Residual stomatal conductance per unit leaf area, mol m⁻² s⁻¹.
const GS_RESIDUAL: FloatValue = 0.01;
/// Vapour pressure deficit halving the stomatal opening, kPa.
const VPD_HALF: FloatValue = 1.5;
/// Energy to photon conversion for PAR, µmol photons per J.
const PAR_UMOL_PER_J: FloatValue = 4.56;

/// Share of a daily radiation total falling into one hour, distributed
/// proportionally to the sine of the solar elevation.
/// unit: MJ m⁻² h⁻¹
pub fn hourly_radiation(
    daily_total: FloatValue,
    sin_lat_sin_dec: FloatValue,
    cos_lat_cos_dec: FloatValue,
    hour: usize,
) -> FloatValue {
    let weight_at = |h: usize| {
        Radiation::sin_solar_elevation(sin_lat_sin_dec, cos_lat_cos_dec, h as FloatValue).max(0.0)
    };
    let total_weight: FloatValue = (0..24).map(weight_at).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    daily_total * weight_at(hour) / total_weight
}

/// Diurnal temperature course: a sine rise from the minimum at sunrise
/// to the maximum at 14:00, then a linear decay through the night back
/// to the next morning's minimum.
pub fn hourly_temperature(
    temperature_min: FloatValue,
    temperature_max: FloatValue,
    hour: usize,
    sunrise_hour: usize,
) -> FloatValue {
    const PEAK_HOUR: usize = 14;
    let amplitude = temperature_max - temperature_min;
    let sunrise = sunrise_hour.min(PEAK_HOUR - 1);

    if hour >= sunrise && hour <= PEAK_HOUR {
        let phase = (hour - sunrise) as FloatValue / (PEAK_HOUR - sunrise) as FloatValue;
        temperature_min + amplitude * (std::f64::consts::FRAC_PI_2 * phase).sin()
    } else {
        // hours elapsed since the afternoon peak, wrapping past midnight
        let since_peak = if hour > PEAK_HOUR {
            hour - PEAK_HOUR
        } else {
            hour + 24 - PEAK_HOUR
        };
        let night_length = (sunrise + 24 - PEAK_HOUR).max(1);
        temperature_max - amplitude * (since_peak as FloatValue / night_length as FloatValue).min(1.0)
    }
}

/// Hourly vapour pressure deficit, taking the daily minimum temperature
/// as a proxy for the dew point.
/// unit: kPa
pub fn hourly_vapour_pressure_deficit(
    hourly_temperature: FloatValue,
    temperature_min: FloatValue,
) -> FloatValue {
    (DailyWeather::saturation_vapour_pressure(hourly_temperature)
        - DailyWeather::saturation_vapour_pressure(temperature_min))
    .max(0.0)
}

/// Inputs of one hour of the canopy model.
#[derive(Debug, Clone, Copy)]
pub struct CanopyHourInputs {
    /// unit: °C
    pub leaf_temperature: FloatValue,
    /// unit: MJ m⁻² h⁻¹
    pub global_radiation: FloatValue,
    /// unit: MJ m⁻² h⁻¹
    pub extraterrestrial_radiation: FloatValue,
    /// unit: m²/m²
    pub leaf_area_index: FloatValue,
    /// unit: rad
    pub solar_elevation: FloatValue,
    /// unit: kPa
    pub vapour_pressure_deficit: FloatValue,
    /// unit: µmol/mol
    pub co2_concentration: FloatValue,
    /// Maximum carboxylation capacity at 25 °C, after ozone damage
    /// unit: µmol m⁻² s⁻¹
    pub vcmax_25: FloatValue,
}

/// One big-leaf fraction of the canopy, fluxes per unit ground area.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafFraction {
    /// unit: m²/m²
    pub leaf_area_index: FloatValue,
    /// Gross assimilation
    /// unit: µmol CO2 m⁻² s⁻¹
    pub gross_assimilation: FloatValue,
    /// Stomatal conductance for CO2
    /// unit: mol m⁻² s⁻¹
    pub stomatal_conductance: FloatValue,
    /// Absorbed photosynthetically active radiation
    /// unit: µmol photons m⁻² s⁻¹
    pub absorbed_par: FloatValue,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CanopyHourOutput {
    pub sunlit: LeafFraction,
    pub shaded: LeafFraction,
    /// Canopy gross photosynthesis of the hour
    /// unit: µmol CO2 m⁻² h⁻¹
    pub canopy_gross_photosynthesis: FloatValue,
}

/// Bernacchi relative temperature response, 1.0 at 25 °C.
fn bernacchi(activation_energy: FloatValue, temperature: FloatValue) -> FloatValue {
    let tk = temperature + 273.15;
    (activation_energy * (tk - TK25) / (TK25 * R_GAS * tk)).exp()
}

/// Spitters (1986) diffuse fraction from atmospheric transmissivity.
fn diffuse_fraction(transmissivity: FloatValue) -> FloatValue {
    if transmissivity <= 0.22 {
        1.0
    } else if transmissivity <= 0.35 {
        1.0 - 6.4 * (transmissivity - 0.22) * (transmissivity - 0.22)
    } else {
        (1.47 - 1.66 * transmissivity).max(0.15)
    }
}

/// Gross assimilation of one leaf, µmol CO2 m⁻² leaf s⁻¹.
fn leaf_gross_assimilation(
    absorbed_par: FloatValue,
    temperature: FloatValue,
    ci: FloatValue,
    vcmax_25: FloatValue,
) -> FloatValue {
    let vcmax = vcmax_25 * bernacchi(EA_VCMAX, temperature);
    let jmax = JMAX_RATIO * vcmax_25 * bernacchi(EA_JMAX, temperature);
    let kc = KC_25 * bernacchi(EA_KC, temperature);
    let ko = KO_25 * bernacchi(EA_KO, temperature);
    let gamma_star = GAMMA_STAR_25 * bernacchi(EA_GAMMA_STAR, temperature);

    let rubisco_limited = vcmax * (ci - gamma_star) / (ci + kc * (1.0 + OI / ko));

    let i2 = ALPHA * absorbed_par;
    let discriminant = ((i2 + jmax) * (i2 + jmax) - 4.0 * THETA * i2 * jmax).max(0.0);
    let j = (i2 + jmax - discriminant.sqrt()) / (2.0 * THETA);
    let light_limited = j / 4.0 * (ci - gamma_star) / (ci + 2.0 * gamma_star);

    rubisco_limited.min(light_limited).max(0.0)
}

/// Evaluate the sunlit/shaded canopy for one hour (C3 biochemistry).
pub fn canopy_hourly_c3(inputs: &CanopyHourInputs) -> CanopyHourOutput {
    let lai = inputs.leaf_area_index;
    let sin_elevation = inputs.solar_elevation.sin();

    if lai <= 0.0 || sin_elevation <= 0.01 || inputs.global_radiation <= 0.0 {
        return CanopyHourOutput {
            shaded: LeafFraction {
                leaf_area_index: lai.max(0.0),
                ..LeafFraction::default()
            },
            ..CanopyHourOutput::default()
        };
    }

    // PAR in µmol photons m⁻² ground s⁻¹
    let par_total =
        inputs.global_radiation * 0.5 * 1e6 / SECONDS_PER_HOUR * PAR_UMOL_PER_J;
    let transmissivity = if inputs.extraterrestrial_radiation > 0.0 {
        (inputs.global_radiation / inputs.extraterrestrial_radiation).clamp(0.0, 1.0)
    } else {
        0.5
    };
    let fraction_diffuse = diffuse_fraction(transmissivity);

    let k_beam = (0.5 / sin_elevation).min(50.0);
    let lai_sunlit = (1.0 - (-k_beam * lai).exp()) / k_beam;
    let lai_shaded = (lai - lai_sunlit).max(0.0);

    let par_beam = (1.0 - fraction_diffuse) * par_total;
    let par_diffuse = fraction_diffuse * par_total;
    let absorbed_diffuse = (1.0 - LEAF_SCATTERING) * par_diffuse * (1.0 - (-KDIF * lai).exp());
    let sunlit_share = lai_sunlit / lai;
    let absorbed_sunlit = (1.0 - LEAF_SCATTERING) * par_beam * (1.0 - (-k_beam * lai).exp())
        + absorbed_diffuse * sunlit_share;
    let absorbed_shaded = absorbed_diffuse * (1.0 - sunlit_share);

    let ci = 0.7 * inputs.co2_concentration;
    let vpd_closure = 1.0 / (1.0 + inputs.vapour_pressure_deficit / VPD_HALF);
    let rd = RD_RATIO * inputs.vcmax_25 * bernacchi(EA_VCMAX, inputs.leaf_temperature);
    let ca_gradient = (inputs.co2_concentration - ci).max(1.0);

    let evaluate = |fraction_lai: FloatValue, absorbed: FloatValue| -> LeafFraction {
        if fraction_lai <= 0.0 {
            return LeafFraction::default();
        }
        let per_leaf_par = absorbed / fraction_lai;
        let per_leaf_gross = leaf_gross_assimilation(
            per_leaf_par,
            inputs.leaf_temperature,
            ci,
            inputs.vcmax_25,
        );
        let per_leaf_net = (per_leaf_gross - rd).max(0.0);
        // diffusion-consistent conductance: A/(Ca - Ci) in mol m⁻² s⁻¹,
        // scaled down as the vapour pressure deficit closes the stomata
        let per_leaf_gs = GS_RESIDUAL + per_leaf_net / ca_gradient * vpd_closure;
        LeafFraction {
            leaf_area_index: fraction_lai,
            gross_assimilation: per_leaf_gross * fraction_lai,
            stomatal_conductance: per_leaf_gs * fraction_lai,
            absorbed_par: absorbed,
        }
    };

    let sunlit = evaluate(lai_sunlit, absorbed_sunlit);
    let shaded = evaluate(lai_shaded, absorbed_shaded);
    let canopy_gross_photosynthesis =
        (sunlit.gross_assimilation + shaded.gross_assimilation) * SECONDS_PER_HOUR;

    CanopyHourOutput {
        sunlit,
        shaded,
        canopy_gross_photosynthesis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::SiteParameters;
    use crate::radiation::Radiation;
    use cropmod_core::weather::DailyWeather;

    fn summer_geometry() -> (FloatValue, FloatValue) {
        let weather = DailyWeather {
            temperature_mean: 18.0,
            temperature_min: 11.0,
            temperature_max: 25.0,
            global_radiation: Some(22.0),
            sunshine_hours: None,
            relative_humidity: 0.65,
            wind_speed: 2.0,
            wind_speed_height: 2.0,
            co2_concentration: 410.0,
            o3_concentration: 40.0,
            precipitation: 0.0,
            reference_evapotranspiration: None,
        };
        let day = Radiation::new(&SiteParameters::default()).solve(172, &weather);
        (day.sin_lat_sin_dec, day.cos_lat_cos_dec)
    }

    fn daylight_inputs() -> CanopyHourInputs {
        CanopyHourInputs {
            leaf_temperature: 22.0,
            global_radiation: 2.5,
            extraterrestrial_radiation: 3.8,
            leaf_area_index: 4.0,
            solar_elevation: 0.9,
            vapour_pressure_deficit: 1.0,
            co2_concentration: 410.0,
            vcmax_25: 80.0,
        }
    }

    #[test]
    fn test_hourly_radiation_sums_to_daily_total() {
        let (sin_prod, cos_prod) = summer_geometry();
        let total: FloatValue = (0..24)
            .map(|h| hourly_radiation(22.0, sin_prod, cos_prod, h))
            .sum();
        assert!(
            (total - 22.0).abs() < 1e-9,
            "hourly shares must add up to the daily total, got {}",
            total
        );
    }

    #[test]
    fn test_hourly_radiation_dark_at_midnight() {
        let (sin_prod, cos_prod) = summer_geometry();
        assert_eq!(hourly_radiation(22.0, sin_prod, cos_prod, 0), 0.0);
        assert!(hourly_radiation(22.0, sin_prod, cos_prod, 12) > 0.0);
    }

    #[test]
    fn test_hourly_temperature_hits_extremes() {
        let at_sunrise = hourly_temperature(10.0, 24.0, 5, 5);
        let at_peak = hourly_temperature(10.0, 24.0, 14, 5);
        assert!((at_sunrise - 10.0).abs() < 1e-9);
        assert!((at_peak - 24.0).abs() < 1e-9);
        let evening = hourly_temperature(10.0, 24.0, 20, 5);
        assert!(evening < at_peak && evening > at_sunrise);
    }

    #[test]
    fn test_vapour_pressure_deficit_zero_at_minimum_temperature() {
        assert_eq!(hourly_vapour_pressure_deficit(10.0, 10.0), 0.0);
        assert!(hourly_vapour_pressure_deficit(25.0, 10.0) > 1.0);
    }

    #[test]
    fn test_canopy_dark_hour_is_inert() {
        let mut inputs = daylight_inputs();
        inputs.global_radiation = 0.0;
        inputs.solar_elevation = -0.2;
        let out = canopy_hourly_c3(&inputs);
        assert_eq!(out.canopy_gross_photosynthesis, 0.0);
        assert_eq!(out.sunlit.leaf_area_index, 0.0);
        assert_eq!(
            out.shaded.leaf_area_index, 4.0,
            "the whole canopy is shaded at night"
        );
    }

    #[test]
    fn test_canopy_fractions_partition_leaf_area() {
        let out = canopy_hourly_c3(&daylight_inputs());
        assert!(
            (out.sunlit.leaf_area_index + out.shaded.leaf_area_index - 4.0).abs() < 1e-9,
            "sunlit and shaded fractions partition the canopy"
        );
        assert!(out.sunlit.leaf_area_index > 0.0);
        assert!(out.shaded.leaf_area_index > 0.0);
    }

    #[test]
    fn test_assimilation_increases_with_light() {
        let dim = {
            let mut inputs = daylight_inputs();
            inputs.global_radiation = 0.3;
            canopy_hourly_c3(&inputs)
        };
        let bright = canopy_hourly_c3(&daylight_inputs());
        assert!(
            bright.canopy_gross_photosynthesis > dim.canopy_gross_photosynthesis,
            "more light, more photosynthesis: {} vs {}",
            bright.canopy_gross_photosynthesis,
            dim.canopy_gross_photosynthesis
        );
    }

    #[test]
    fn test_vcmax_damage_reduces_assimilation() {
        let healthy = canopy_hourly_c3(&daylight_inputs());
        let mut inputs = daylight_inputs();
        inputs.vcmax_25 *= 0.5;
        let damaged = canopy_hourly_c3(&inputs);
        assert!(
            damaged.canopy_gross_photosynthesis < healthy.canopy_gross_photosynthesis,
            "halving Vcmax must reduce canopy assimilation"
        );
    }

    #[test]
    fn test_sunlit_leaves_conduct_more_per_leaf_area() {
        let out = canopy_hourly_c3(&daylight_inputs());
        let per_leaf_sun = out.sunlit.stomatal_conductance / out.sunlit.leaf_area_index;
        let per_leaf_shade = out.shaded.stomatal_conductance / out.shaded.leaf_area_index;
        assert!(
            per_leaf_sun >= per_leaf_shade,
            "sunlit leaves at least as open as shaded ones: {} vs {}",
            per_leaf_sun,
            per_leaf_shade
        );
    }
}
