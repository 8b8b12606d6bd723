pub mod constants;
pub mod errors;
pub mod host;
pub mod soil;
pub mod weather;

/// Floating point type used throughout the engine.
pub type FloatValue = f64;
