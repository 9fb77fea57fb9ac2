/// Shared data structures for the editing session
///
/// These structs flow between the decode layer, the render thread and the
/// history/state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decode::Orientation;
use crate::geometry::Size;

/// Opaque reference to source pixel data (content URI, path, gallery id...)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Dimensions of a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width as stored in the file, before orientation
    pub source_width: u32,
    /// Height as stored in the file, before orientation
    pub source_height: u32,
    /// Orientation read from metadata
    pub orientation: Orientation,
    /// Power-of-two downsample factor applied to the working raster
    pub sample_factor: u32,
}

impl ImageInfo {
    /// Full-resolution size after orientation correction
    pub fn natural_size(&self) -> (u32, u32) {
        self.orientation.natural_size(self.source_width, self.source_height)
    }

    pub fn natural(&self) -> Size {
        let (w, h) = self.natural_size();
        Size::from_pixels(w, h)
    }

    /// Size of the downsampled, oriented working raster
    pub fn working_size(&self) -> (u32, u32) {
        let f = self.sample_factor.max(1);
        let (w, h) = self.natural_size();
        ((w / f).max(1), (h / f).max(1))
    }
}
