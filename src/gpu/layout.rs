/// Per-frame placement math
///
/// Everything the vertex shader needs to place the textured quad: the
/// base-fit scale for the visible content (full image or crop window), the
/// user's pan/zoom, and the texture window to sample. Kept on the CPU side
/// so it can be tested without a device.

use cgmath::Vector2;
use serde::{Deserialize, Serialize};

use crate::geometry::{base_fit_scale, ClipRect, Rect, Size};

/// User pan/zoom in clip-space units. Not part of edit history.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub scale: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform {
        scale: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    pub fn new(scale: f32, translate_x: f32, translate_y: f32) -> Self {
        Self { scale, translate_x, translate_y }
    }

    /// Scale pulled into `[min, max]`; translation untouched
    pub fn clamped(self, min: f32, max: f32) -> Self {
        let scale = if self.scale.is_finite() { self.scale.clamp(min, max) } else { 1.0 };
        Self { scale, ..self }
    }

    pub fn zoom_by(self, factor: f32, min: f32, max: f32) -> Self {
        Self { scale: self.scale * factor, ..self }.clamped(min, max)
    }

    pub fn pan_by(self, delta: Vector2<f32>) -> Self {
        Self {
            translate_x: self.translate_x + delta.x,
            translate_y: self.translate_y + delta.y,
            ..self
        }
    }

    pub fn translate(&self) -> Vector2<f32> {
        Vector2::new(self.translate_x, self.translate_y)
    }
}

/// Quad placement for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    /// Half width/height of the quad in clip units
    pub half_extent: Vector2<f32>,
    /// Quad center in clip units
    pub translate: Vector2<f32>,
    /// Texture window, normalized, V=0 at the image top
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

impl FrameLayout {
    /// Compose base-fit scale x user transform x crop window.
    ///
    /// `crop` is a normalized texture rect. `None` when the image or the
    /// viewport has no area.
    pub fn compute(
        image: Size,
        crop: Option<&Rect>,
        viewport: Size,
        view: &ViewTransform,
    ) -> Option<FrameLayout> {
        let window = crop.copied().unwrap_or(Rect::new(0.0, 0.0, 1.0, 1.0));
        let content = Size::new(image.width * window.width(), image.height * window.height());
        let base = base_fit_scale(content, viewport)?;

        Some(FrameLayout {
            half_extent: base * view.scale,
            translate: view.translate(),
            uv_min: [window.left, window.top],
            uv_max: [window.right, window.bottom],
        })
    }

    /// Where the quad lands in clip space
    pub fn clip_rect(&self) -> ClipRect {
        ClipRect {
            left: self.translate.x - self.half_extent.x,
            top: self.translate.y + self.half_extent.y,
            right: self.translate.x + self.half_extent.x,
            bottom: self.translate.y - self.half_extent.y,
        }
    }

    /// Texture coordinate sampled at a quad corner in [-1, 1]^2.
    /// Mirrors the vertex shader: clip top (+1) samples the window top.
    pub fn uv_at(&self, corner: Vector2<f32>) -> Vector2<f32> {
        let tx = corner.x * 0.5 + 0.5;
        let ty = 0.5 - corner.y * 0.5;
        Vector2::new(
            self.uv_min[0] + (self.uv_max[0] - self.uv_min[0]) * tx,
            self.uv_min[1] + (self.uv_max[1] - self.uv_min[1]) * ty,
        )
    }
}
