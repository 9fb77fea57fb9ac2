/// Non-destructive edit state for one image
///
/// A snapshot of everything that changes the rendered result: crop, filter
/// and tone adjustments. Snapshots are immutable and are the unit of
/// undo/redo. They serialize to JSON for handing across screens.

use serde::{Deserialize, Serialize};

use crate::color::{color_matrix_for, Adjustments, ColorMatrix, FilterId};
use crate::geometry::CropRect;

/// Composite edit snapshot
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct EditState {
    /// Crop in natural image pixels. `None` = full image.
    pub crop: Option<CropRect>,

    /// Active color filter
    pub filter: FilterId,

    /// Brightness/contrast/saturation applied after the filter
    #[serde(default)]
    pub adjustments: Adjustments,
}

impl EditState {
    /// The identity state: no crop, no filter
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crop(self, crop: Option<CropRect>) -> Self {
        Self { crop, ..self }
    }

    pub fn with_filter(self, filter: FilterId) -> Self {
        Self { filter, ..self }
    }

    pub fn with_adjustments(self, adjustments: Adjustments) -> Self {
        Self { adjustments, ..self }
    }

    /// Color matrix that both preview and export apply
    pub fn color_matrix(&self) -> ColorMatrix {
        color_matrix_for(self.filter, &self.adjustments)
    }

    /// Check if this represents an unedited image
    pub fn is_unedited(&self) -> bool {
        *self == Self::default()
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
