//! Callback surface through which the engine talks back to its host.

use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// Discrete lifecycle events fired by the phenology state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Seedling breaks the soil surface (stage 0 -> 1).
    Emergence,
    /// Flowering begins; transition pair depends on the stage count.
    Anthesis,
    /// Physiological maturity reached.
    Maturity,
    /// Generic stage change, carrying the new stage index.
    StageChanged(usize),
}

/// Host-side collaborator notified of lifecycle events and receiving
/// dead organic matter.
///
/// `add_organic_matter` is the single write channel from the crop into
/// the soil: dead root mass and cutting residues are deposited with their
/// nitrogen concentration so the soil organic matter turnover can pick
/// them up. Both calls are synchronous; the engine never queues them.
pub trait CropHost {
    fn fire_event(&mut self, event: LifecycleEvent);

    /// Deposit dead biomass into soil layers.
    ///
    /// `layer_masses` maps layer index to dry matter in kg/ha;
    /// `n_concentration` is kg N per kg dry matter.
    fn add_organic_matter(&mut self, layer_masses: &[(usize, FloatValue)], n_concentration: FloatValue);
}

/// Host that discards everything, for tests and standalone runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl CropHost for NullHost {
    fn fire_event(&mut self, _event: LifecycleEvent) {}

    fn add_organic_matter(&mut self, _layer_masses: &[(usize, FloatValue)], _n_concentration: FloatValue) {}
}

/// Host that records calls, for assertions in tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    pub events: Vec<LifecycleEvent>,
    pub organic_matter: Vec<(Vec<(usize, FloatValue)>, FloatValue)>,
}

impl CropHost for RecordingHost {
    fn fire_event(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }

    fn add_organic_matter(&mut self, layer_masses: &[(usize, FloatValue)], n_concentration: FloatValue) {
        self.organic_matter
            .push((layer_masses.to_vec(), n_concentration));
    }
}
