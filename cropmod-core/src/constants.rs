//! Unit-bearing constants shared across the engine.
//!
//! Every conversion factor that appears in more than one equation lives
//! here under a name that states its units, so that a unit mismatch is
//! visible at the call site instead of hiding inside a magic number.

use crate::FloatValue;

/// Mass conversion from CO2 to carbohydrate (CH2O).
/// unit: kg CH2O per kg CO2 (30/44, molar mass ratio)
pub const CO2_TO_CH2O: FloatValue = 30.0 / 44.0;

/// Mass conversion from carbohydrate (CH2O) to carbon.
/// unit: kg C per kg CH2O (12/30, molar mass ratio)
pub const CH2O_TO_C: FloatValue = 12.0 / 30.0;

/// Molar volume of an ideal gas at standard temperature and pressure.
/// unit: mL/mol
pub const MOLAR_VOLUME_STP: FloatValue = 22414.0;

/// Molar mass of CO2.
/// unit: g/mol
pub const MOLAR_MASS_CO2: FloatValue = 44.0;

/// Conversion from a flux in nmol m⁻² s⁻¹ to µmol m⁻² h⁻¹.
/// unit: (µmol h⁻¹) / (nmol s⁻¹) = 3600 / 1000
pub const NMOL_S_TO_UMOL_H: FloatValue = 3.6;

/// Ratio of the molecular diffusivities of O3 and CO2 in air.
/// Scales stomatal conductance for CO2 to a conductance for ozone.
/// unit: dimensionless
pub const O3_CO2_DIFFUSIVITY_RATIO: FloatValue = 0.93;

/// Stefan-Boltzmann constant on a daily time base.
/// unit: MJ K⁻⁴ m⁻² d⁻¹
pub const STEFAN_BOLTZMANN_DAILY: FloatValue = 4.903e-9;

/// Solar constant.
/// unit: MJ m⁻² min⁻¹
pub const SOLAR_CONSTANT: FloatValue = 0.082;

/// Latent heat of vaporisation of water.
/// unit: MJ/kg
pub const LATENT_HEAT_VAPORISATION: FloatValue = 2.45;

/// Seconds in one hour.
pub const SECONDS_PER_HOUR: FloatValue = 3600.0;

/// Hours in one day.
pub const HOURS_PER_DAY: usize = 24;

/// Degrees to radians.
pub const DEG_TO_RAD: FloatValue = std::f64::consts::PI / 180.0;
