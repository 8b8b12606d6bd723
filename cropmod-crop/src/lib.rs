//! Day-by-day (optionally hour-by-hour) physiological simulation of a
//! single crop stand growing in a soil column.
//!
//! The entry point is [`crop::CropModule`], a stateful object that is
//! constructed once per crop from an immutable [`parameters::ParameterSet`]
//! and advanced once per simulated day with that day's weather and a view
//! of the soil column. Everything else in this crate is a process engine
//! invoked by `CropModule::step` in fixed causal order.

pub mod allocation;
pub mod crop;
pub mod nitrogen;
pub mod ozone;
pub mod parameters;
pub mod phenology;
pub mod photosynthesis;
pub mod radiation;
pub mod roots;
pub mod state;
pub mod stress;
pub mod water;

pub use crop::CropModule;
pub use parameters::{CropConfig, CultivarParameters, ParameterSet, SiteParameters, SpeciesParameters};
pub use state::CropState;
