/// EXIF orientation handling
///
/// Reads the orientation tag and rotates/mirrors the working raster so that
/// every downstream consumer sees the natural (display-correct) layout.

use image::DynamicImage;
use std::io::Cursor;

/// The eight EXIF orientations (tag 0x0112)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    /// Rotate 90° clockwise, then mirror horizontally
    Transpose,
    /// Rotate 90° clockwise
    Rotate90,
    /// Rotate 270° clockwise, then mirror horizontally
    Transverse,
    /// Rotate 270° clockwise
    Rotate270,
}

impl Orientation {
    /// Map the raw tag value; unknown values mean "no correction"
    pub fn from_exif(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    /// Clockwise rotation in degrees (mirroring ignored)
    pub fn rotation_degrees(&self) -> u32 {
        match self {
            Orientation::Normal | Orientation::FlipHorizontal => 0,
            Orientation::Rotate180 | Orientation::FlipVertical => 180,
            Orientation::Rotate90 | Orientation::Transpose => 90,
            Orientation::Rotate270 | Orientation::Transverse => 270,
        }
    }

    /// 90° and 270° orientations swap width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self.rotation_degrees(), 90 | 270)
    }

    /// Stored size -> natural size
    pub fn natural_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Rotate/mirror the raster so its buffer size equals the natural size
    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Normal => img,
            Orientation::FlipHorizontal => img.fliph(),
            Orientation::Rotate180 => img.rotate180(),
            Orientation::FlipVertical => img.flipv(),
            Orientation::Transpose => img.rotate90().fliph(),
            Orientation::Rotate90 => img.rotate90(),
            Orientation::Transverse => img.rotate270().fliph(),
            Orientation::Rotate270 => img.rotate270(),
        }
    }
}

/// Read the orientation tag from an encoded image.
/// Formats without EXIF, or a missing tag, yield `Normal`.
pub fn read_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(_) => return Orientation::Normal,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .map(Orientation::from_exif)
        .unwrap_or_default()
}
