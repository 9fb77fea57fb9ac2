/// Interactive crop rectangle
///
/// The rectangle lives in display space while the user drags it around and
/// is converted to natural image pixels only on confirm. Display bounds
/// always start at the origin: the overlay is laid out exactly over the
/// fitted image.

use cgmath::{InnerSpace, Point2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::data::ImageRef;
use crate::color::FilterId;
use crate::config::EngineConfig;
use crate::geometry::{centered_rect_with_ratio, AspectRatio, CropRect, Rect, Size};

/// What enters the crop screen
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CropRequest {
    pub image: ImageRef,
    /// Currently committed crop, natural pixels
    pub initial_crop: Option<CropRect>,
    /// Filter to preview while cropping
    pub filter: FilterId,
}

/// Grab zone picked at gesture start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragHandle {
    #[default]
    None,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Body,
}

impl DragHandle {
    pub fn is_corner(self) -> bool {
        !matches!(self, DragHandle::None | DragHandle::Body)
    }
}

/// Crop rectangle state machine with its own undo/redo stacks
#[derive(Debug, Clone)]
pub struct CropEditor {
    natural: Size,
    initial_crop: Option<CropRect>,
    bounds: Option<Rect>,
    rect: Rect,
    ratio: AspectRatio,
    handle: DragHandle,
    gesture_origin: Option<Rect>,
    interacted: bool,
    undo_stack: Vec<Rect>,
    redo_stack: Vec<Rect>,
    touch_tolerance: f32,
    min_size: f32,
}

impl CropEditor {
    /// `natural` is the oriented full-resolution size, `initial_crop` the
    /// committed crop in the same space
    pub fn new(natural: Size, initial_crop: Option<CropRect>, config: &EngineConfig) -> Self {
        Self {
            natural,
            initial_crop,
            bounds: None,
            rect: Rect::ZERO,
            ratio: AspectRatio::Free,
            handle: DragHandle::None,
            gesture_origin: None,
            interacted: false,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            touch_tolerance: config.touch_tolerance,
            min_size: config.min_crop_size,
        }
    }

    pub fn from_request(request: &CropRequest, natural: Size, config: &EngineConfig) -> Self {
        Self::new(natural, request.initial_crop, config)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn handle(&self) -> DragHandle {
        self.handle
    }

    pub fn ratio(&self) -> AspectRatio {
        self.ratio
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// The fitted image size on screen became known or changed.
    ///
    /// The first call initializes the rectangle (from the initial crop, or
    /// the full bounds). Later calls leave an interacted or in-flight
    /// rectangle alone, only pulling it back inside if the bounds shrank.
    /// Saved undo/redo rectangles are pulled inside too.
    pub fn set_display_size(&mut self, size: Size) {
        if size.is_empty() {
            return;
        }
        let bounds = Rect::from_size(size);
        let first = self.bounds.is_none();
        self.bounds = Some(bounds);

        let dragging = self.gesture_origin.is_some();
        if first || !(self.interacted || dragging) {
            self.rect = self.initial_rect(&bounds);
        } else {
            self.rect = fit_inside(self.rect, &bounds);
        }
        let saved_rects = self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut());
        for saved in saved_rects.chain(self.gesture_origin.as_mut()) {
            *saved = fit_inside(*saved, &bounds);
        }
    }

    /// Drop all interaction and start again from the full bounds
    pub fn reset(&mut self) {
        self.initial_crop = None;
        self.ratio = AspectRatio::Free;
        self.handle = DragHandle::None;
        self.gesture_origin = None;
        self.interacted = false;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.rect = self.bounds.unwrap_or(Rect::ZERO);
    }

    fn initial_rect(&self, bounds: &Rect) -> Rect {
        let Some(crop) = self.initial_crop else {
            return *bounds;
        };
        if self.natural.is_empty() {
            return *bounds;
        }
        let display = crop.scale(bounds.width() / self.natural.width);
        match display.intersect(bounds) {
            Some(r) => r,
            None => {
                debug!(crop = %crop, "initial crop outside image, using full bounds");
                *bounds
            }
        }
    }

    /// Hit-test a pointer-down. Corners win over the body.
    pub fn gesture_start(&mut self, position: Point2<f32>) -> DragHandle {
        if self.bounds.is_none() {
            return DragHandle::None;
        }
        let reach = self.touch_tolerance * self.touch_tolerance;
        let near = |corner: Point2<f32>| (position - corner).magnitude2() < reach;

        self.handle = if near(self.rect.top_left()) {
            DragHandle::TopLeft
        } else if near(self.rect.top_right()) {
            DragHandle::TopRight
        } else if near(self.rect.bottom_left()) {
            DragHandle::BottomLeft
        } else if near(self.rect.bottom_right()) {
            DragHandle::BottomRight
        } else if self.rect.contains(position) {
            DragHandle::Body
        } else {
            DragHandle::None
        };

        self.gesture_origin = Some(self.rect);
        self.handle
    }

    /// Apply a drag delta to the grabbed zone
    pub fn gesture_move(&mut self, delta: Vector2<f32>) {
        let Some(bounds) = self.bounds else {
            return;
        };
        if !delta.x.is_finite() || !delta.y.is_finite() {
            debug!(?delta, "ignoring non-finite drag");
            return;
        }

        let candidate = match self.handle {
            DragHandle::None => return,
            DragHandle::Body => Some(self.rect.translate_within(delta, &bounds)),
            corner => match self.ratio.ratio(self.natural) {
                None => Some(self.resize_free(corner, delta, &bounds)),
                Some(ratio) => self.resize_fixed(corner, delta, ratio, &bounds),
            },
        };

        match candidate {
            Some(rect) if rect.is_valid() => self.rect = rect,
            Some(rect) => debug!(rect = %rect, "rejecting collapsed crop"),
            None => {}
        }
    }

    fn resize_free(&self, corner: DragHandle, delta: Vector2<f32>, bounds: &Rect) -> Rect {
        let r = self.rect;
        let min = self.min_size;
        let left = || clamp_edge(r.left + delta.x, bounds.left, r.right - min);
        let right = || clamp_edge(r.right + delta.x, r.left + min, bounds.right);
        let top = || clamp_edge(r.top + delta.y, bounds.top, r.bottom - min);
        let bottom = || clamp_edge(r.bottom + delta.y, r.top + min, bounds.bottom);

        match corner {
            DragHandle::TopLeft => Rect { left: left(), top: top(), ..r },
            DragHandle::TopRight => Rect { right: right(), top: top(), ..r },
            DragHandle::BottomLeft => Rect { left: left(), bottom: bottom(), ..r },
            DragHandle::BottomRight => Rect { right: right(), bottom: bottom(), ..r },
            DragHandle::None | DragHandle::Body => r,
        }
    }

    /// Width follows the horizontal drag, height follows the ratio. The
    /// horizontal bound is checked first, then the vertical one. `None`
    /// when the result would be smaller than the minimum.
    fn resize_fixed(
        &self,
        corner: DragHandle,
        delta: Vector2<f32>,
        ratio: f32,
        bounds: &Rect,
    ) -> Option<Rect> {
        let r = self.rect;
        let grows_right = matches!(corner, DragHandle::TopRight | DragHandle::BottomRight);
        let grows_down = matches!(corner, DragHandle::BottomLeft | DragHandle::BottomRight);

        let mut width = if grows_right { r.width() + delta.x } else { r.width() - delta.x };
        let mut height = width / ratio;

        let room_x = if grows_right { bounds.right - r.left } else { r.right - bounds.left };
        if width > room_x {
            width = room_x;
            height = width / ratio;
        }

        let room_y = if grows_down { bounds.bottom - r.top } else { r.bottom - bounds.top };
        if height > room_y {
            height = room_y;
            width = height * ratio;
        }

        if width < self.min_size || height < self.min_size {
            return None;
        }

        let (left, right) = if grows_right { (r.left, r.left + width) } else { (r.right - width, r.right) };
        let (top, bottom) = if grows_down { (r.top, r.top + height) } else { (r.bottom - height, r.bottom) };
        Some(Rect::new(left, top, right, bottom))
    }

    /// Finish the gesture, recording the pre-gesture rect if anything moved
    pub fn gesture_end(&mut self) {
        if let Some(origin) = self.gesture_origin.take() {
            if self.handle != DragHandle::None && origin != self.rect {
                self.record(origin);
            }
        }
        self.handle = DragHandle::None;
    }

    /// Switch aspect ratio and recenter the largest fitting rectangle.
    /// Re-selecting the active ratio does nothing.
    pub fn select_ratio(&mut self, ratio: AspectRatio) {
        if ratio == self.ratio {
            return;
        }
        self.record(self.rect);
        self.ratio = ratio;

        if let (Some(target), Some(bounds)) = (ratio.ratio(self.natural), self.bounds) {
            self.rect = centered_rect_with_ratio(&bounds, target);
        }
    }

    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(previous) => {
                self.redo_stack.push(self.rect);
                self.rect = self.within_bounds(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.redo_stack.pop() {
            Some(next) => {
                self.undo_stack.push(self.rect);
                self.rect = self.within_bounds(next);
                true
            }
            None => false,
        }
    }

    fn within_bounds(&self, rect: Rect) -> Rect {
        match self.bounds {
            Some(bounds) => fit_inside(rect, &bounds),
            None => rect,
        }
    }

    fn record(&mut self, previous: Rect) {
        self.undo_stack.push(previous);
        self.redo_stack.clear();
        self.interacted = true;
    }

    /// Current rectangle in natural image pixels, `None` before the display
    /// bounds are known
    pub fn confirm(&self) -> Option<CropRect> {
        let bounds = self.bounds?;
        let scale = if bounds.width() > 0.0 {
            self.natural.width / bounds.width()
        } else {
            1.0
        };
        Some(self.rect.scale(scale))
    }
}

/// `rect` pulled inside `bounds`, or all of `bounds` when they do not overlap
fn fit_inside(rect: Rect, bounds: &Rect) -> Rect {
    if bounds.contains_rect(&rect) {
        rect
    } else {
        rect.intersect(bounds).unwrap_or(*bounds)
    }
}

/// Clamp without panicking when the limits cross
fn clamp_edge(value: f32, low: f32, high: f32) -> f32 {
    value.max(low).min(high)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(width: f32, height: f32) -> CropEditor {
        let mut editor = CropEditor::new(Size::new(width, height), None, &EngineConfig::default());
        editor.set_display_size(Size::new(width, height));
        editor
    }

    fn drag(editor: &mut CropEditor, from: (f32, f32), by: (f32, f32)) {
        editor.gesture_start(Point2::new(from.0, from.1));
        editor.gesture_move(Vector2::new(by.0, by.1));
        editor.gesture_end();
    }

    #[test]
    fn test_initializes_to_full_bounds() {
        let editor = editor(400.0, 800.0);
        assert_eq!(editor.rect(), Rect::new(0.0, 0.0, 400.0, 800.0));
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_resize_does_not_reset_interacted_rect() {
        let mut editor = editor(400.0, 800.0);
        drag(&mut editor, (200.0, 400.0), (0.0, 0.0));
        drag(&mut editor, (0.0, 0.0), (50.0, 50.0));
        let moved = editor.rect();
        assert_eq!(moved, Rect::new(50.0, 50.0, 400.0, 800.0));

        editor.set_display_size(Size::new(400.0, 800.0));
        assert_eq!(editor.rect(), moved);

        editor.reset();
        assert_eq!(editor.rect(), Rect::new(0.0, 0.0, 400.0, 800.0));
    }

    #[test]
    fn test_hit_test_prefers_corners() {
        let mut editor = editor(400.0, 800.0);
        editor.rect = Rect::new(100.0, 100.0, 200.0, 200.0);

        assert_eq!(editor.gesture_start(Point2::new(105.0, 102.0)), DragHandle::TopLeft);
        assert_eq!(editor.gesture_start(Point2::new(195.0, 230.0)), DragHandle::BottomRight);
        assert_eq!(editor.gesture_start(Point2::new(150.0, 150.0)), DragHandle::Body);
        assert_eq!(editor.gesture_start(Point2::new(10.0, 700.0)), DragHandle::None);
    }

    #[test]
    fn test_body_drag_stays_in_bounds() {
        let mut editor = editor(400.0, 800.0);
        editor.rect = Rect::new(100.0, 100.0, 200.0, 200.0);
        drag(&mut editor, (150.0, 150.0), (1000.0, -1000.0));
        assert_eq!(editor.rect(), Rect::new(300.0, 0.0, 400.0, 100.0));
    }

    #[test]
    fn test_free_corner_respects_min_size() {
        let mut editor = editor(400.0, 800.0);
        editor.rect = Rect::new(100.0, 100.0, 200.0, 200.0);
        drag(&mut editor, (100.0, 100.0), (1000.0, 1000.0));
        assert_eq!(editor.rect(), Rect::new(176.0, 176.0, 200.0, 200.0));

        editor.rect = Rect::new(100.0, 100.0, 200.0, 200.0);
        drag(&mut editor, (200.0, 200.0), (-1000.0, 5000.0));
        assert_eq!(editor.rect(), Rect::new(100.0, 100.0, 124.0, 800.0));
    }

    #[test]
    fn test_fixed_ratio_clamps_to_right_edge() {
        let mut editor = editor(400.0, 800.0);
        editor.select_ratio(AspectRatio::Fixed(1, 1));
        editor.rect = Rect::new(100.0, 100.0, 200.0, 200.0);

        drag(&mut editor, (200.0, 200.0), (500.0, 0.0));
        assert_eq!(editor.rect(), Rect::new(100.0, 100.0, 400.0, 400.0));
    }

    #[test]
    fn test_fixed_ratio_clamps_to_bottom_after_right() {
        let mut editor = editor(800.0, 300.0);
        editor.select_ratio(AspectRatio::Fixed(1, 1));
        editor.rect = Rect::new(100.0, 100.0, 200.0, 200.0);

        drag(&mut editor, (200.0, 200.0), (300.0, 0.0));
        let rect = editor.rect();
        assert_eq!(rect, Rect::new(100.0, 100.0, 300.0, 300.0));
        assert_eq!(rect.bottom, 300.0);
        assert_eq!(rect.width(), rect.height());
    }

    #[test]
    fn test_fixed_ratio_rejects_when_bottom_clamp_goes_below_minimum() {
        let config = EngineConfig {
            min_crop_size: 100.0,
            ..EngineConfig::default()
        };
        let mut editor = CropEditor::new(Size::new(800.0, 400.0), None, &config);
        editor.set_display_size(Size::new(800.0, 400.0));
        editor.select_ratio(AspectRatio::Fixed(1, 2));
        editor.rect = Rect::new(100.0, 250.0, 250.0, 400.0);

        assert_eq!(editor.gesture_start(Point2::new(250.0, 400.0)), DragHandle::BottomRight);
        editor.gesture_move(Vector2::new(10.0, 0.0));
        editor.gesture_end();
        assert_eq!(editor.rect(), Rect::new(100.0, 250.0, 250.0, 400.0));
    }

    #[test]
    fn test_shrunk_bounds_keep_undo_rects_inside() {
        let mut editor = editor(400.0, 800.0);
        drag(&mut editor, (400.0, 800.0), (-100.0, -100.0));
        assert_eq!(editor.rect(), Rect::new(0.0, 0.0, 300.0, 700.0));

        editor.set_display_size(Size::new(200.0, 400.0));
        let bounds = Rect::new(0.0, 0.0, 200.0, 400.0);
        assert!(bounds.contains_rect(&editor.rect()));

        assert!(editor.undo());
        assert!(bounds.contains_rect(&editor.rect()));

        drag(&mut editor, (100.0, 200.0), (50.0, 50.0));
        assert!(bounds.contains_rect(&editor.rect()));

        assert!(editor.redo());
        assert!(bounds.contains_rect(&editor.rect()));
    }

    #[test]
    fn test_fixed_ratio_rejects_below_minimum() {
        let mut editor = editor(400.0, 800.0);
        editor.select_ratio(AspectRatio::Fixed(1, 1));
        editor.rect = Rect::new(100.0, 100.0, 200.0, 200.0);

        drag(&mut editor, (100.0, 100.0), (90.0, 0.0));
        assert_eq!(editor.rect(), Rect::new(100.0, 100.0, 200.0, 200.0));
    }

    #[test]
    fn test_fixed_ratio_top_left_grows_up_and_left() {
        let mut editor = editor(400.0, 800.0);
        editor.select_ratio(AspectRatio::Fixed(1, 1));
        editor.rect = Rect::new(100.0, 100.0, 200.0, 200.0);

        drag(&mut editor, (100.0, 100.0), (-50.0, 0.0));
        assert_eq!(editor.rect(), Rect::new(50.0, 50.0, 200.0, 200.0));
    }

    #[test]
    fn test_select_ratio_centers_rect() {
        let mut editor = editor(400.0, 800.0);
        editor.select_ratio(AspectRatio::Fixed(16, 9));
        assert_eq!(editor.rect(), Rect::new(0.0, 287.5, 400.0, 512.5));
        assert!(editor.can_undo());

        editor.select_ratio(AspectRatio::Fixed(16, 9));
        editor.undo();
        assert_eq!(editor.rect(), Rect::new(0.0, 0.0, 400.0, 800.0));
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_gesture_undo_redo() {
        let mut editor = editor(400.0, 800.0);
        drag(&mut editor, (400.0, 800.0), (-100.0, -100.0));
        let after = editor.rect();
        assert_eq!(after, Rect::new(0.0, 0.0, 300.0, 700.0));

        assert!(editor.undo());
        assert_eq!(editor.rect(), Rect::new(0.0, 0.0, 400.0, 800.0));
        assert!(editor.can_redo());

        assert!(editor.redo());
        assert_eq!(editor.rect(), after);
        assert!(!editor.redo());
    }

    #[test]
    fn test_unchanged_gesture_is_not_recorded() {
        let mut editor = editor(400.0, 800.0);
        drag(&mut editor, (200.0, 400.0), (0.0, 0.0));
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_new_gesture_clears_redo() {
        let mut editor = editor(400.0, 800.0);
        drag(&mut editor, (0.0, 0.0), (10.0, 10.0));
        editor.undo();
        drag(&mut editor, (400.0, 800.0), (-10.0, -10.0));
        assert!(!editor.can_redo());
    }

    #[test]
    fn test_confirm_scales_to_natural() {
        let mut editor = CropEditor::new(Size::new(4000.0, 8000.0), None, &EngineConfig::default());
        assert_eq!(editor.confirm(), None);

        editor.set_display_size(Size::new(400.0, 800.0));
        editor.rect = Rect::new(10.0, 20.0, 110.0, 220.0);
        assert_eq!(editor.confirm(), Some(Rect::new(100.0, 200.0, 1100.0, 2200.0)));
    }

    #[test]
    fn test_initial_crop_maps_into_display() {
        let request = CropRequest {
            image: ImageRef::from("img"),
            initial_crop: Some(Rect::new(1000.0, 2000.0, 3000.0, 6000.0)),
            filter: FilterId::Warm,
        };
        let mut editor =
            CropEditor::from_request(&request, Size::new(4000.0, 8000.0), &EngineConfig::default());
        editor.set_display_size(Size::new(400.0, 800.0));

        assert_eq!(editor.rect(), Rect::new(100.0, 200.0, 300.0, 600.0));
        assert_eq!(editor.confirm(), request.initial_crop);
    }
}
