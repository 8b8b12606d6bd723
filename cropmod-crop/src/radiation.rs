//! Solar geometry and radiation terms for one day.
//!
//! Computes declination, the three day lengths (astronomic, effective,
//! photoperiodic), photosynthetically active radiation and the clear/
//! overcast radiation integrals that the daily light-interception model
//! needs. When global radiation was not measured it is back-filled from
//! sunshine hours with the Angstrom formula.

use crate::parameters::SiteParameters;
use cropmod_core::constants::{DEG_TO_RAD, SECONDS_PER_HOUR, SOLAR_CONSTANT};
use cropmod_core::weather::DailyWeather;
use cropmod_core::FloatValue;

use std::f64::consts::PI;

/// Radiation terms consumed by phenology, photosynthesis and reference ET.
#[derive(Debug, Clone, Default)]
pub struct RadiationOutput {
    /// Solar declination
    /// unit: rad
    pub declination: FloatValue,
    /// Sine/cosine products of latitude and declination, reused by the
    /// hourly solar elevation.
    pub sin_lat_sin_dec: FloatValue,
    pub cos_lat_cos_dec: FloatValue,
    /// Astronomic day length
    /// unit: h
    pub astronomic_day_length: FloatValue,
    /// Day length effective for assimilation (sun more than ~8° up)
    /// unit: h
    pub effective_day_length: FloatValue,
    /// Day length effective for photoperiodism (includes civil twilight)
    /// unit: h
    pub photoperiodic_day_length: FloatValue,
    /// Global radiation, measured or back-filled
    /// unit: MJ m⁻² d⁻¹
    pub global_radiation: FloatValue,
    /// Photosynthetically active radiation
    /// unit: MJ m⁻² d⁻¹
    pub par: FloatValue,
    /// Extraterrestrial radiation
    /// unit: MJ m⁻² d⁻¹
    pub extraterrestrial_radiation: FloatValue,
    /// Radiation integral of a perfectly clear day
    /// unit: J m⁻² d⁻¹
    pub clear_day_radiation: FloatValue,
    /// Radiation integral of a fully overcast day
    /// unit: J m⁻² d⁻¹
    pub overcast_day_radiation: FloatValue,
}

/// Pure solver for the day's solar geometry.
#[derive(Debug, Clone)]
pub struct Radiation {
    latitude_rad: FloatValue,
}

impl Radiation {
    pub fn new(site: &SiteParameters) -> Self {
        Self {
            latitude_rad: site.latitude * DEG_TO_RAD,
        }
    }

    pub fn solve(&self, day_of_year: u32, weather: &DailyWeather) -> RadiationOutput {
        let declination =
            -23.4 * DEG_TO_RAD * ((2.0 * PI * (day_of_year as FloatValue + 10.0)) / 365.0).cos();

        let sin_lat_sin_dec = self.latitude_rad.sin() * declination.sin();
        let cos_lat_cos_dec = self.latitude_rad.cos() * declination.cos();

        let astronomic_day_length = Self::day_length(sin_lat_sin_dec, cos_lat_cos_dec, 0.0);
        // sun higher than ~8 degrees contributes to assimilation
        let effective_day_length =
            Self::day_length(sin_lat_sin_dec, cos_lat_cos_dec, (8.0 * DEG_TO_RAD).sin());
        // civil twilight (-6 degrees) still counts for photoperiodism
        let photoperiodic_day_length =
            Self::day_length(sin_lat_sin_dec, cos_lat_cos_dec, (-6.0 * DEG_TO_RAD).sin());

        // daily integral of the sine of solar elevation, in seconds
        let ratio = (sin_lat_sin_dec / cos_lat_cos_dec).clamp(-1.0, 1.0);
        let sin_elevation_integral = SECONDS_PER_HOUR
            * (astronomic_day_length * sin_lat_sin_dec
                + (24.0 / PI) * cos_lat_cos_dec * (1.0 - ratio * ratio).sqrt());

        let extraterrestrial_radiation = Self::extraterrestrial(
            day_of_year,
            sin_lat_sin_dec,
            cos_lat_cos_dec,
        );

        let global_radiation = match weather.global_radiation {
            Some(measured) => measured,
            None => {
                // Angstrom back-fill from relative sunshine duration
                let sunshine = weather.sunshine_hours.unwrap_or(0.0);
                let relative = if astronomic_day_length > 0.0 {
                    (sunshine / astronomic_day_length).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                extraterrestrial_radiation * (0.19 + 0.55 * relative)
            }
        };

        let clear_day_radiation = if astronomic_day_length > 0.0 {
            0.5 * 1300.0
                * sin_elevation_integral
                * (-0.14
                    / (sin_elevation_integral / (astronomic_day_length * SECONDS_PER_HOUR)))
                .exp()
        } else {
            0.0
        };
        let overcast_day_radiation = 0.2 * clear_day_radiation;

        RadiationOutput {
            declination,
            sin_lat_sin_dec,
            cos_lat_cos_dec,
            astronomic_day_length,
            effective_day_length,
            photoperiodic_day_length,
            global_radiation,
            par: 0.5 * global_radiation,
            extraterrestrial_radiation,
            clear_day_radiation,
            overcast_day_radiation,
        }
    }

    /// Hours the sun spends above a given sine-of-elevation threshold.
    fn day_length(
        sin_lat_sin_dec: FloatValue,
        cos_lat_cos_dec: FloatValue,
        sin_threshold: FloatValue,
    ) -> FloatValue {
        let cos_hour_angle = (sin_threshold - sin_lat_sin_dec) / cos_lat_cos_dec;
        if cos_hour_angle <= -1.0 {
            return 24.0;
        }
        if cos_hour_angle >= 1.0 {
            return 0.0;
        }
        24.0 * cos_hour_angle.acos() / PI
    }

    /// FAO-56 daily extraterrestrial radiation.
    /// unit: MJ m⁻² d⁻¹
    fn extraterrestrial(
        day_of_year: u32,
        sin_lat_sin_dec: FloatValue,
        cos_lat_cos_dec: FloatValue,
    ) -> FloatValue {
        let inverse_distance =
            1.0 + 0.033 * ((2.0 * PI / 365.0) * day_of_year as FloatValue).cos();
        let cos_sunset = (-sin_lat_sin_dec / cos_lat_cos_dec).clamp(-1.0, 1.0);
        let sunset_hour_angle = cos_sunset.acos();
        (24.0 * 60.0 / PI)
            * SOLAR_CONSTANT
            * inverse_distance
            * (sunset_hour_angle * sin_lat_sin_dec + cos_lat_cos_dec * sunset_hour_angle.sin())
    }

    /// Sine of the solar elevation at a given hour of the day.
    pub fn sin_solar_elevation(
        sin_lat_sin_dec: FloatValue,
        cos_lat_cos_dec: FloatValue,
        hour: FloatValue,
    ) -> FloatValue {
        sin_lat_sin_dec + cos_lat_cos_dec * ((PI / 12.0) * (hour - 12.0)).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_weather() -> DailyWeather {
        DailyWeather {
            temperature_mean: 15.0,
            temperature_min: 8.0,
            temperature_max: 22.0,
            global_radiation: Some(18.0),
            sunshine_hours: None,
            relative_humidity: 0.7,
            wind_speed: 2.5,
            wind_speed_height: 2.0,
            co2_concentration: 410.0,
            o3_concentration: 35.0,
            precipitation: 0.0,
            reference_evapotranspiration: None,
        }
    }

    fn solver() -> Radiation {
        Radiation::new(&SiteParameters::default())
    }

    #[test]
    fn test_summer_days_longer_than_winter_days() {
        let radiation = solver();
        let summer = radiation.solve(172, &default_weather());
        let winter = radiation.solve(355, &default_weather());
        assert!(
            summer.astronomic_day_length > winter.astronomic_day_length,
            "day length at solstice: summer {} h vs winter {} h",
            summer.astronomic_day_length,
            winter.astronomic_day_length
        );
        assert!(summer.astronomic_day_length > 15.0);
        assert!(winter.astronomic_day_length < 9.0);
    }

    #[test]
    fn test_day_length_ordering() {
        let radiation = solver();
        let day = radiation.solve(120, &default_weather());
        assert!(
            day.photoperiodic_day_length >= day.astronomic_day_length,
            "twilight extends the photoperiodic day"
        );
        assert!(
            day.effective_day_length <= day.astronomic_day_length,
            "the effective day is a subset of the astronomic day"
        );
    }

    #[test]
    fn test_par_is_half_of_global() {
        let radiation = solver();
        let day = radiation.solve(120, &default_weather());
        assert!((day.par - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_angstrom_backfill() {
        let radiation = solver();
        let mut weather = default_weather();
        weather.global_radiation = None;
        weather.sunshine_hours = Some(8.0);
        let day = radiation.solve(172, &weather);
        assert!(
            day.global_radiation > 0.0 && day.global_radiation < day.extraterrestrial_radiation,
            "back-filled radiation must sit below the extraterrestrial bound, got {} vs {}",
            day.global_radiation,
            day.extraterrestrial_radiation
        );
    }

    #[test]
    fn test_clear_day_exceeds_overcast_day() {
        let radiation = solver();
        let day = radiation.solve(172, &default_weather());
        assert!(day.clear_day_radiation > day.overcast_day_radiation);
        assert!(day.overcast_day_radiation > 0.0);
    }

    #[test]
    fn test_solar_elevation_peaks_at_noon() {
        let radiation = solver();
        let day = radiation.solve(172, &default_weather());
        let noon =
            Radiation::sin_solar_elevation(day.sin_lat_sin_dec, day.cos_lat_cos_dec, 12.0);
        let morning =
            Radiation::sin_solar_elevation(day.sin_lat_sin_dec, day.cos_lat_cos_dec, 8.0);
        let midnight =
            Radiation::sin_solar_elevation(day.sin_lat_sin_dec, day.cos_lat_cos_dec, 0.0);
        assert!(noon > morning, "noon sun higher than morning sun");
        assert!(midnight < 0.0, "sun below the horizon at midnight at 52.5°N");
    }
}
