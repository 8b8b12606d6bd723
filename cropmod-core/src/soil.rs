//! Read-mostly view into the soil column.
//!
//! The soil physics (moisture and heat transport, nitrogen turnover) is an
//! external collaborator. The engine only reads the per-layer state each
//! day and writes back through two narrow channels: the per-layer
//! transpiration it computed, and dead organic matter deposited via the
//! host callback.

use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// One soil layer as seen by the crop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilLayer {
    /// Field capacity
    /// unit: m³/m³
    pub field_capacity: FloatValue,
    /// Permanent wilting point
    /// unit: m³/m³
    pub wilting_point: FloatValue,
    /// Pore volume at saturation
    /// unit: m³/m³
    pub saturation: FloatValue,
    /// Current volumetric moisture content
    /// unit: m³/m³
    pub moisture: FloatValue,
    /// Soil temperature
    /// unit: °C
    pub temperature: FloatValue,
    /// Soluble nitrate content
    /// unit: kg N / m³
    pub no3: FloatValue,
    /// Ammonium content
    /// unit: kg N / m³
    pub nh4: FloatValue,
    /// Clay content
    /// unit: fraction [0, 1]
    pub clay_fraction: FloatValue,
}

impl SoilLayer {
    /// Plant-available water capacity (field capacity minus wilting point).
    pub fn available_water_capacity(&self) -> FloatValue {
        (self.field_capacity - self.wilting_point).max(0.0)
    }

    /// Fraction of plant-available water currently held, clamped to [0, 1].
    pub fn available_water_fraction(&self) -> FloatValue {
        let capacity = self.available_water_capacity();
        if capacity <= 0.0 {
            return 0.0;
        }
        ((self.moisture - self.wilting_point) / capacity).clamp(0.0, 1.0)
    }
}

/// The soil column handed to the engine each step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilColumn {
    pub layers: Vec<SoilLayer>,
    /// Uniform layer thickness
    /// unit: m
    pub layer_thickness: FloatValue,
    /// Standing water on the surface
    /// unit: mm
    pub surface_water_storage: FloatValue,
    /// Index of the uppermost groundwater-saturated layer, if any
    pub groundwater_table_layer: Option<usize>,
    /// Snow depth
    /// unit: mm
    pub snow_depth: FloatValue,
    /// Soil surface temperature
    /// unit: °C
    pub surface_temperature: FloatValue,
}

impl SoilColumn {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Depth of the bottom of layer `index`.
    /// unit: m
    pub fn depth_at(&self, index: usize) -> FloatValue {
        (index as FloatValue + 1.0) * self.layer_thickness
    }
}
