use cgmath::Vector2;
use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Program};
use iced::{touch, Point, Rectangle, Renderer, Theme};

use super::pixel_delta_to_ndc;
use crate::state::session::EditorSession;

/// Pan/zoom gestures over the preview, in clip-space units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewGesture {
    /// Multiply the current scale
    Zoom(f32),
    /// Translate by a clip-space delta
    Pan(Vector2<f32>),
}

impl ViewGesture {
    /// Feed the gesture into the session (which clamps the scale)
    pub fn apply_to(self, session: &mut EditorSession) {
        match self {
            ViewGesture::Zoom(factor) => session.zoom_by(factor),
            ViewGesture::Pan(delta) => session.pan_by(delta),
        }
    }
}

/// Input layer laid over the GPU preview.
/// The render thread draws the image itself, this canvas only reads input.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportCanvas;

impl Program<ViewGesture> for ViewportCanvas {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        _renderer: &Renderer,
        _theme: &Theme,
        _bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        vec![]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<ViewGesture>) {
        match event {
            // Mouse wheel zooms
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if cursor.position_in(bounds).is_none() {
                    return (canvas::event::Status::Ignored, None);
                }
                let step = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y * 0.1,
                    mouse::ScrollDelta::Pixels { y, .. } => y * 0.01,
                };
                return (
                    canvas::event::Status::Captured,
                    Some(ViewGesture::Zoom((1.0 + step).max(0.01))),
                );
            }

            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_in(bounds) {
                    state.start(pos);
                    return (canvas::event::Status::Captured, None);
                }
            }
            canvas::Event::Touch(touch::Event::FingerPressed { position, .. }) => {
                if bounds.contains(position) {
                    state.start(Point::new(position.x - bounds.x, position.y - bounds.y));
                    return (canvas::event::Status::Captured, None);
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left))
            | canvas::Event::Touch(touch::Event::FingerLifted { .. })
            | canvas::Event::Touch(touch::Event::FingerLost { .. }) => {
                if state.is_dragging {
                    state.stop();
                    return (canvas::event::Status::Captured, None);
                }
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if let Some(pos) = cursor.position_in(bounds) {
                    if let Some(delta) = state.move_to(pos) {
                        let ndc = pixel_delta_to_ndc(delta, bounds.size());
                        return (canvas::event::Status::Captured, Some(ViewGesture::Pan(ndc)));
                    }
                }
            }
            canvas::Event::Touch(touch::Event::FingerMoved { position, .. }) => {
                let pos = Point::new(position.x - bounds.x, position.y - bounds.y);
                if let Some(delta) = state.move_to(pos) {
                    let ndc = pixel_delta_to_ndc(delta, bounds.size());
                    return (canvas::event::Status::Captured, Some(ViewGesture::Pan(ndc)));
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }
}

/// State for drag interactions
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub is_dragging: bool,
    pub last_position: Option<Point>,
}

impl DragState {
    fn start(&mut self, position: Point) {
        self.is_dragging = true;
        self.last_position = Some(position);
    }

    fn stop(&mut self) {
        self.is_dragging = false;
        self.last_position = None;
    }

    /// Pixel delta since the last position while dragging
    fn move_to(&mut self, position: Point) -> Option<Vector2<f32>> {
        if !self.is_dragging {
            return None;
        }
        let last = self.last_position.replace(position)?;
        Some(Vector2::new(position.x - last.x, position.y - last.y))
    }
}
