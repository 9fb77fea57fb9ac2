/// Filter engine: color matrices shared by GPU preview and CPU export
///
/// Every filter and tone adjustment is a 4x5 color matrix (4x4 linear part
/// plus an offset column) over normalized RGBA in [0, 1]:
///
///   out = clamp(linear × rgba + offset, 0, 1)
///
/// The GPU shader receives the composed matrix as a uniform and the CPU bake
/// applies the very same matrix per pixel, so preview and export are derived
/// from one set of constants.

use cgmath::{Matrix4, SquareMatrix, Vector4};
use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rec. 601 luma weights used by the grayscale filter
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Luma weights used by the saturation adjustment
pub const SATURATION_WEIGHTS: [f32; 3] = [0.213, 0.715, 0.072];

/// Warm filter boost for (R, G, B), in 8-bit code values
pub const WARM_BOOST: [f32; 3] = [25.0, 12.0, 0.0];

/// Cool filter boost for (R, G, B), in 8-bit code values
pub const COOL_BOOST: [f32; 3] = [0.0, 0.0, 25.0];

/// Valid range for every tone adjustment (1.0 = unchanged)
pub const ADJUSTMENT_RANGE: (f32, f32) = (0.0, 2.0);

/// Named color filter. The integer codes are the external filter codes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum FilterId {
    #[default]
    None = 0,
    Grayscale = 1,
    Warm = 2,
    Cool = 3,
}

impl FilterId {
    pub const ALL: [FilterId; 4] = [
        FilterId::None,
        FilterId::Grayscale,
        FilterId::Warm,
        FilterId::Cool,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Color matrix for this filter alone
    pub fn color_matrix(self) -> ColorMatrix {
        match self {
            FilterId::None => ColorMatrix::identity(),
            FilterId::Grayscale => {
                let [r, g, b] = LUMA_WEIGHTS;
                ColorMatrix::from_rows(
                    [
                        [r, g, b, 0.0],
                        [r, g, b, 0.0],
                        [r, g, b, 0.0],
                        [0.0, 0.0, 0.0, 1.0],
                    ],
                    [0.0; 4],
                )
            }
            FilterId::Warm => ColorMatrix::offset_code_values(WARM_BOOST),
            FilterId::Cool => ColorMatrix::offset_code_values(COOL_BOOST),
        }
    }
}

impl TryFrom<u8> for FilterId {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        FilterId::from_code(code).ok_or_else(|| format!("unknown filter code {}", code))
    }
}

impl From<FilterId> for u8 {
    fn from(id: FilterId) -> Self {
        id.code()
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterId::None => "none",
            FilterId::Grayscale => "grayscale",
            FilterId::Warm => "warm",
            FilterId::Cool => "cool",
        };
        f.write_str(name)
    }
}

/// Tone adjustments applied after the filter.
/// 1.0 leaves the image unchanged; values are clamped to [0, 2].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Adjustments {
    /// Multiplies RGB
    pub brightness: f32,
    /// Scales distance from mid-grey
    pub contrast: f32,
    /// 0 = grayscale, 1 = original, 2 = doubled
    pub saturation: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}

impl Adjustments {
    pub fn new(brightness: f32, contrast: f32, saturation: f32) -> Self {
        let (lo, hi) = ADJUSTMENT_RANGE;
        let clamp = |v: f32| if v.is_finite() { v.clamp(lo, hi) } else { 1.0 };
        Self {
            brightness: clamp(brightness),
            contrast: clamp(contrast),
            saturation: clamp(saturation),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Brightness, then contrast, then saturation
    pub fn color_matrix(&self) -> ColorMatrix {
        let b = self.brightness;
        let brightness = ColorMatrix::from_rows(
            [
                [b, 0.0, 0.0, 0.0],
                [0.0, b, 0.0, 0.0],
                [0.0, 0.0, b, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            [0.0; 4],
        );

        let c = self.contrast;
        let shift = 0.5 * (1.0 - c);
        let contrast = ColorMatrix::from_rows(
            [
                [c, 0.0, 0.0, 0.0],
                [0.0, c, 0.0, 0.0],
                [0.0, 0.0, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            [shift, shift, shift, 0.0],
        );

        let s = self.saturation;
        let inv = 1.0 - s;
        let [wr, wg, wb] = SATURATION_WEIGHTS;
        let (r, g, bl) = (wr * inv, wg * inv, wb * inv);
        let saturation = ColorMatrix::from_rows(
            [
                [r + s, g, bl, 0.0],
                [r, g + s, bl, 0.0],
                [r, g, bl + s, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            [0.0; 4],
        );

        brightness.then(&contrast).then(&saturation)
    }
}

/// 4x5 color matrix over normalized RGBA
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix {
    pub linear: Matrix4<f32>,
    pub offset: Vector4<f32>,
}

impl ColorMatrix {
    pub fn identity() -> Self {
        Self {
            linear: Matrix4::identity(),
            offset: Vector4::new(0.0, 0.0, 0.0, 0.0),
        }
    }

    /// Build from row-major coefficients (cgmath stores columns)
    pub fn from_rows(rows: [[f32; 4]; 4], offset: [f32; 4]) -> Self {
        let col = |j: usize| Vector4::new(rows[0][j], rows[1][j], rows[2][j], rows[3][j]);
        Self {
            linear: Matrix4::from_cols(col(0), col(1), col(2), col(3)),
            offset: Vector4::from(offset),
        }
    }

    /// Pure additive offset given in 8-bit code values
    fn offset_code_values(boost: [f32; 3]) -> Self {
        let mut m = Self::identity();
        m.offset = Vector4::new(boost[0] / 255.0, boost[1] / 255.0, boost[2] / 255.0, 0.0);
        m
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Apply `self` first, then `next`
    pub fn then(&self, next: &ColorMatrix) -> ColorMatrix {
        ColorMatrix {
            linear: next.linear * self.linear,
            offset: next.linear * self.offset + next.offset,
        }
    }

    /// Transform one normalized RGBA value, clamped to [0, 1]
    pub fn apply(&self, rgba: Vector4<f32>) -> Vector4<f32> {
        let out = self.linear * rgba + self.offset;
        Vector4::new(
            out.x.clamp(0.0, 1.0),
            out.y.clamp(0.0, 1.0),
            out.z.clamp(0.0, 1.0),
            out.w.clamp(0.0, 1.0),
        )
    }

    /// Transform one 8-bit pixel (round to nearest, like a unorm target)
    pub fn apply_rgba8(&self, px: [u8; 4]) -> [u8; 4] {
        let v = Vector4::new(
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
            px[3] as f32 / 255.0,
        );
        let out = self.apply(v);
        [
            (out.x * 255.0).round() as u8,
            (out.y * 255.0).round() as u8,
            (out.z * 255.0).round() as u8,
            (out.w * 255.0).round() as u8,
        ]
    }

    /// Column-major linear part for the GPU uniform
    pub fn gpu_columns(&self) -> [[f32; 4]; 4] {
        self.linear.into()
    }

    pub fn gpu_offset(&self) -> [f32; 4] {
        self.offset.into()
    }
}

/// Composed matrix for a filter followed by tone adjustments
pub fn color_matrix_for(filter: FilterId, adjustments: &Adjustments) -> ColorMatrix {
    filter.color_matrix().then(&adjustments.color_matrix())
}

/// CPU path: apply a filter to a raster.
///
/// `FilterId::None` returns the input untouched without allocating.
pub fn apply(image: RgbaImage, filter: FilterId) -> RgbaImage {
    apply_with_adjustments(image, filter, &Adjustments::default())
}

/// CPU path: apply filter plus adjustments in place and hand the buffer back
pub fn apply_with_adjustments(
    mut image: RgbaImage,
    filter: FilterId,
    adjustments: &Adjustments,
) -> RgbaImage {
    if filter == FilterId::None && adjustments.is_identity() {
        return image;
    }

    let matrix = color_matrix_for(filter, adjustments);
    let row_len = image.width() as usize * 4;
    if row_len == 0 || image.height() == 0 {
        return image;
    }

    image.par_chunks_mut(row_len).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            let out = matrix.apply_rgba8([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&out);
        }
    });

    image
}
