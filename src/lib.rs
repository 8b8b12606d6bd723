//! Crop physiological growth engine.
//!
//! The facade crate re-exports the two workspace members:
//!
//! - [`core`]: shared data contracts (weather, soil column view, host
//!   callbacks), error taxonomy and unit constants.
//! - [`crop`]: the engine itself, entered through [`crop::CropModule`].

pub use cropmod_core as core;
pub use cropmod_crop as crop;
