//! Daily weather record consumed by the engine.

use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// One day of resolved weather, passed into every `step` call.
///
/// All values are already quality-controlled by the host; the engine does
/// no gap filling beyond deriving global radiation from sunshine hours
/// when the former is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyWeather {
    /// Mean air temperature
    /// unit: °C
    pub temperature_mean: FloatValue,
    /// Minimum air temperature
    /// unit: °C
    pub temperature_min: FloatValue,
    /// Maximum air temperature
    /// unit: °C
    pub temperature_max: FloatValue,
    /// Global radiation sum; `None` when only sunshine hours were measured
    /// unit: MJ m⁻² d⁻¹
    pub global_radiation: Option<FloatValue>,
    /// Sunshine duration, used to back-fill missing global radiation
    /// unit: h
    pub sunshine_hours: Option<FloatValue>,
    /// Relative humidity
    /// unit: fraction [0, 1]
    pub relative_humidity: FloatValue,
    /// Wind speed at `wind_speed_height`
    /// unit: m/s
    pub wind_speed: FloatValue,
    /// Height of the wind speed measurement
    /// unit: m
    pub wind_speed_height: FloatValue,
    /// Atmospheric CO2 concentration
    /// unit: ppm
    pub co2_concentration: FloatValue,
    /// Ambient ozone concentration
    /// unit: ppb
    pub o3_concentration: FloatValue,
    /// Gross precipitation
    /// unit: mm
    pub precipitation: FloatValue,
    /// Externally supplied reference evapotranspiration, if the host
    /// measures it; otherwise the engine computes FAO-56 Penman-Monteith
    /// unit: mm
    pub reference_evapotranspiration: Option<FloatValue>,
}

impl DailyWeather {
    /// Saturation vapour pressure at a given air temperature (Magnus form).
    ///
    /// unit: kPa
    pub fn saturation_vapour_pressure(temperature: FloatValue) -> FloatValue {
        0.6108 * ((17.27 * temperature) / (237.3 + temperature)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturation_vapour_pressure_reference_points() {
        // FAO-56 table values
        let e20 = DailyWeather::saturation_vapour_pressure(20.0);
        assert!(
            (e20 - 2.338).abs() < 0.01,
            "es(20°C) should be ~2.34 kPa, got {}",
            e20
        );
    }

    #[test]
    fn test_saturation_vapour_pressure_increases_with_temperature() {
        assert!(
            DailyWeather::saturation_vapour_pressure(30.0)
                > DailyWeather::saturation_vapour_pressure(10.0)
        );
    }
}
