/// Coordinate-space conversions for the render and crop pipeline
///
/// Three spaces are in play:
/// - pixel space (image or display surface, origin top-left, Y down)
/// - normalized texture space ([0,1] relative to image size, V=0 at top)
/// - clip space ([-1,1], Y up)
///
/// Everything here is pure and allocation-free.

use cgmath::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width/height pair in pixels (or any consistent unit)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size { width: 0.0, height: 0.0 };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }

    /// True when either dimension is zero, negative or NaN
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Width divided by height
    pub fn ratio(&self) -> f32 {
        self.width / self.height
    }
}

/// Axis-aligned rectangle, edges stored explicitly
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Crop rectangle. Display-surface space while interacting,
/// natural image pixels in history and across screens.
pub type CropRect = Rect;

impl Rect {
    pub const ZERO: Rect = Rect { left: 0.0, top: 0.0, right: 0.0, bottom: 0.0 };

    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn from_origin_size(origin: Point2<f32>, size: Size) -> Self {
        Self::new(origin.x, origin.y, origin.x + size.width, origin.y + size.height)
    }

    /// Rectangle covering `(0, 0)` to `size`
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// `left < right` and `top < bottom`
    pub fn is_valid(&self) -> bool {
        self.left < self.right && self.top < self.bottom
    }

    pub fn top_left(&self) -> Point2<f32> {
        Point2::new(self.left, self.top)
    }

    pub fn top_right(&self) -> Point2<f32> {
        Point2::new(self.right, self.top)
    }

    pub fn bottom_left(&self) -> Point2<f32> {
        Point2::new(self.left, self.bottom)
    }

    pub fn bottom_right(&self) -> Point2<f32> {
        Point2::new(self.right, self.bottom)
    }

    /// Half-open containment: left/top edges inside, right/bottom outside
    pub fn contains(&self, point: Point2<f32>) -> bool {
        point.x >= self.left && point.x < self.right && point.y >= self.top && point.y < self.bottom
    }

    /// True if `other` lies entirely within `self` (edges may touch)
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    pub fn translate(&self, delta: Vector2<f32>) -> Rect {
        Rect::new(
            self.left + delta.x,
            self.top + delta.y,
            self.right + delta.x,
            self.bottom + delta.y,
        )
    }

    /// Multiply every edge by `factor` (space conversion about the origin)
    pub fn scale(&self, factor: f32) -> Rect {
        Rect::new(
            self.left * factor,
            self.top * factor,
            self.right * factor,
            self.bottom * factor,
        )
    }

    /// Overlap of two rectangles, `None` when they do not overlap
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        r.is_valid().then_some(r)
    }

    /// Translate `self` by `delta`, limiting the motion so the result
    /// stays inside `bounds`. An axis where `self` is larger than `bounds`
    /// gets the low limit only.
    pub fn translate_within(&self, delta: Vector2<f32>, bounds: &Rect) -> Rect {
        let limit = |d: f32, low: f32, high: f32| d.min(high).max(low);
        let dx = limit(delta.x, bounds.left - self.left, bounds.right - self.right);
        let dy = limit(delta.y, bounds.top - self.top, bounds.bottom - self.bottom);
        self.translate(Vector2::new(dx, dy))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.1}, {:.1}, {:.1}, {:.1}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Result of a center-fit: displayed size and the offset that centers it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub display_width: f32,
    pub display_height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Fit {
    /// Whole-pixel layout: sizes truncated, offsets centered on the
    /// truncated sizes with integer division.
    pub fn to_pixels(&self, container: Size) -> (u32, u32, u32, u32) {
        let display_w = self.display_width as u32;
        let display_h = self.display_height as u32;
        let container_w = container.width as u32;
        let container_h = container.height as u32;
        (
            display_w,
            display_h,
            container_w.saturating_sub(display_w) / 2,
            container_h.saturating_sub(display_h) / 2,
        )
    }
}

/// Center-fit `content` into `container`.
///
/// Wider content fills the width and shrinks in height; otherwise height
/// fills and width shrinks. Returns `None` when either size is empty.
pub fn aspect_fit(content: Size, container: Size) -> Option<Fit> {
    if content.is_empty() || container.is_empty() {
        return None;
    }

    let content_ratio = content.ratio();
    let container_ratio = container.ratio();

    let (display_width, display_height) = if content_ratio > container_ratio {
        (container.width, container.width / content_ratio)
    } else {
        (container.height * content_ratio, container.height)
    };

    Some(Fit {
        display_width,
        display_height,
        offset_x: (container.width - display_width) / 2.0,
        offset_y: (container.height - display_height) / 2.0,
    })
}

/// Base-fit scale in clip units: the half-extents of a quad that shows
/// `content` undistorted and centered in a `viewport`.
pub fn base_fit_scale(content: Size, viewport: Size) -> Option<Vector2<f32>> {
    if content.is_empty() || viewport.is_empty() {
        return None;
    }

    let viewport_ratio = viewport.ratio();
    let content_ratio = content.ratio();

    Some(if content_ratio > viewport_ratio {
        Vector2::new(1.0, viewport_ratio / content_ratio)
    } else {
        Vector2::new(content_ratio / viewport_ratio, 1.0)
    })
}

/// Divide each edge by the image dimension: pixel rect -> texture rect
pub fn pixel_rect_to_normalized(rect: &Rect, image: Size) -> Rect {
    Rect::new(
        rect.left / image.width,
        rect.top / image.height,
        rect.right / image.width,
        rect.bottom / image.height,
    )
}

/// Rectangle in clip space. `top > bottom` because clip Y points up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Map a texture-space rect to clip space.
///
/// U maps 0..1 to -1..1. V is flipped: texture top (V=0) becomes clip
/// top (Y=+1).
pub fn normalized_rect_to_clip(rect: &Rect) -> ClipRect {
    ClipRect {
        left: rect.left * 2.0 - 1.0,
        top: 1.0 - rect.top * 2.0,
        right: rect.right * 2.0 - 1.0,
        bottom: 1.0 - rect.bottom * 2.0,
    }
}

/// Named crop ratio chosen in the ratio selector
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    /// Unconstrained
    #[default]
    Free,
    /// Same ratio as the image's natural size
    Original,
    /// Fixed `width:height`
    Fixed(u32, u32),
}

impl AspectRatio {
    /// Presets offered by the ratio selector, in display order
    pub const PRESETS: [AspectRatio; 7] = [
        AspectRatio::Free,
        AspectRatio::Original,
        AspectRatio::Fixed(1, 1),
        AspectRatio::Fixed(3, 4),
        AspectRatio::Fixed(4, 3),
        AspectRatio::Fixed(9, 16),
        AspectRatio::Fixed(16, 9),
    ];

    /// Width/height ratio, `None` when unconstrained.
    /// `Original` needs a known image size.
    pub fn ratio(&self, image: Size) -> Option<f32> {
        match self {
            AspectRatio::Free => None,
            AspectRatio::Original => (!image.is_empty()).then(|| image.ratio()),
            AspectRatio::Fixed(w, h) if *w > 0 && *h > 0 => Some(*w as f32 / *h as f32),
            AspectRatio::Fixed(..) => None,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AspectRatio::Free => write!(f, "free"),
            AspectRatio::Original => write!(f, "original"),
            AspectRatio::Fixed(w, h) => write!(f, "{}:{}", w, h),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" | "" => Ok(AspectRatio::Free),
            "original" => Ok(AspectRatio::Original),
            other => {
                let (w, h) = other
                    .split_once(':')
                    .ok_or_else(|| format!("unknown aspect ratio '{}'", s))?;
                let w: u32 = w.parse().map_err(|_| format!("bad ratio width in '{}'", s))?;
                let h: u32 = h.parse().map_err(|_| format!("bad ratio height in '{}'", s))?;
                if w == 0 || h == 0 {
                    return Err(format!("degenerate aspect ratio '{}'", s));
                }
                Ok(AspectRatio::Fixed(w, h))
            }
        }
    }
}

/// Map a ratio token ("free", "original", "1:1", "16:9", ...) to a
/// width/height ratio. Unknown tokens are treated as free-form.
pub fn aspect_ratio_for(name: &str, image: Size) -> Option<f32> {
    name.parse::<AspectRatio>().ok().and_then(|r| r.ratio(image))
}

/// Largest rectangle of `ratio` centered in `bounds`
pub fn centered_rect_with_ratio(bounds: &Rect, ratio: f32) -> Rect {
    let bounds_w = bounds.width();
    let bounds_h = bounds.height();

    let (w, h) = if ratio > bounds_w / bounds_h {
        (bounds_w, bounds_w / ratio)
    } else {
        (bounds_h * ratio, bounds_h)
    };

    let left = bounds.left + (bounds_w - w) / 2.0;
    let top = bounds.top + (bounds_h - h) / 2.0;
    Rect::new(left, top, left + w, top + h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_aspect_fit_landscape_into_square() {
        let container = Size::new(1000.0, 1000.0);
        let fit = aspect_fit(Size::new(1920.0, 1080.0), container).unwrap();
        assert_eq!(fit.to_pixels(container), (1000, 562, 0, 219));
    }

    #[test]
    fn test_aspect_fit_portrait_fills_height() {
        let fit = aspect_fit(Size::new(1080.0, 1920.0), Size::new(1000.0, 1000.0)).unwrap();
        assert!(approx(fit.display_height, 1000.0));
        assert!(approx(fit.display_width, 562.5));
        assert!(approx(fit.offset_x, 218.75));
        assert!(approx(fit.offset_y, 0.0));
    }

    #[test]
    fn test_aspect_fit_rejects_empty() {
        assert!(aspect_fit(Size::ZERO, Size::new(10.0, 10.0)).is_none());
        assert!(aspect_fit(Size::new(10.0, 10.0), Size::new(0.0, 10.0)).is_none());
    }

    #[test]
    fn test_base_fit_scale() {
        let wide = base_fit_scale(Size::new(200.0, 100.0), Size::new(100.0, 100.0)).unwrap();
        assert!(approx(wide.x, 1.0) && approx(wide.y, 0.5));

        let tall = base_fit_scale(Size::new(100.0, 400.0), Size::new(200.0, 200.0)).unwrap();
        assert!(approx(tall.x, 0.25) && approx(tall.y, 1.0));
    }

    #[test]
    fn test_pixel_rect_to_normalized() {
        let n = pixel_rect_to_normalized(
            &Rect::new(100.0, 50.0, 300.0, 150.0),
            Size::new(400.0, 200.0),
        );
        assert_eq!(n, Rect::new(0.25, 0.25, 0.75, 0.75));
    }

    #[test]
    fn test_normalized_to_clip_flips_v() {
        let clip = normalized_rect_to_clip(&Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(clip.left, -1.0);
        assert_eq!(clip.right, 1.0);
        // texture top is clip top
        assert_eq!(clip.top, 1.0);
        assert_eq!(clip.bottom, -1.0);

        // a crop of the upper half must land in the upper half of clip space
        let upper = normalized_rect_to_clip(&Rect::new(0.0, 0.0, 1.0, 0.5));
        assert_eq!(upper.top, 1.0);
        assert_eq!(upper.bottom, 0.0);
        assert!(upper.top > upper.bottom);
    }

    #[test]
    fn test_aspect_ratio_tokens() {
        let image = Size::new(4000.0, 3000.0);
        assert_eq!(aspect_ratio_for("free", image), None);
        assert_eq!(aspect_ratio_for("1:1", image), Some(1.0));
        assert_eq!(aspect_ratio_for("16:9", image), Some(16.0 / 9.0));
        assert_eq!(aspect_ratio_for("3:4", image), Some(0.75));
        assert!(approx(aspect_ratio_for("original", image).unwrap(), 4.0 / 3.0));
        assert_eq!(aspect_ratio_for("original", Size::ZERO), None);
        assert_eq!(aspect_ratio_for("bogus", image), None);
    }

    #[test]
    fn test_aspect_ratio_display_round_trips_presets() {
        for preset in AspectRatio::PRESETS {
            assert_eq!(preset.to_string().parse::<AspectRatio>(), Ok(preset));
        }
    }

    #[test]
    fn test_intersect_and_translate_within() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let r = Rect::new(10.0, 10.0, 30.0, 30.0);

        assert_eq!(r.intersect(&Rect::new(200.0, 0.0, 300.0, 10.0)), None);
        assert_eq!(
            r.intersect(&Rect::new(20.0, 0.0, 300.0, 20.0)),
            Some(Rect::new(20.0, 10.0, 30.0, 20.0))
        );

        let moved = r.translate_within(Vector2::new(-50.0, 500.0), &bounds);
        assert_eq!(moved, Rect::new(0.0, 80.0, 20.0, 100.0));
        assert!(bounds.contains_rect(&moved));
    }

    #[test]
    fn test_translate_within_oversized_rect_does_not_panic() {
        let bounds = Rect::new(0.0, 0.0, 200.0, 400.0);
        let oversized = Rect::new(0.0, 0.0, 400.0, 800.0);
        let moved = oversized.translate_within(Vector2::new(30.0, -30.0), &bounds);
        assert_eq!(moved, oversized);
    }

    #[test]
    fn test_centered_rect_with_ratio() {
        let bounds = Rect::new(0.0, 0.0, 400.0, 300.0);
        let square = centered_rect_with_ratio(&bounds, 1.0);
        assert_eq!(square, Rect::new(50.0, 0.0, 350.0, 300.0));

        let wide = centered_rect_with_ratio(&bounds, 16.0 / 9.0);
        assert!(approx(wide.width(), 400.0));
        assert!(approx(wide.top, (300.0 - 225.0) / 2.0));
    }
}
