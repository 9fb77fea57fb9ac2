use cgmath::{Point2, Vector2};
use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Frame, Path, Program, Stroke};
use iced::{touch, Color, Point, Rectangle, Renderer, Size, Theme};

use crate::geometry::{self, Rect};
use crate::state::crop::CropEditor;

const HANDLE_COLOR: Color = Color::WHITE;
const OUTSIDE_COLOR: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 0.5 };
const GRID_COLOR: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 0.4 };

/// Pointer input for the crop state machine, in display pixels
#[derive(Debug, Clone, PartialEq)]
pub enum CropGesture {
    /// The canvas was laid out at a new size, along with any pointer input
    /// carried by the same event
    Resized(geometry::Size, Option<Box<CropGesture>>),
    Start(Point2<f32>),
    Move(Vector2<f32>),
    End,
}

impl CropGesture {
    /// Feed the gesture into the editor
    pub fn apply_to(self, editor: &mut CropEditor) {
        match self {
            CropGesture::Resized(size, then) => {
                editor.set_display_size(size);
                if let Some(gesture) = then {
                    gesture.apply_to(editor);
                }
            }
            CropGesture::Start(position) => {
                editor.gesture_start(position);
            }
            CropGesture::Move(delta) => editor.gesture_move(delta),
            CropGesture::End => editor.gesture_end(),
        }
    }
}

/// Canvas program drawing the crop rectangle over the fitted image.
/// The canvas must be sized exactly to the displayed image.
#[derive(Debug, Clone, Copy)]
pub struct CropOverlay {
    pub rect: Rect,
    pub handle_radius: f32,
}

impl CropOverlay {
    pub fn new(editor: &CropEditor, handle_radius: f32) -> Self {
        Self {
            rect: editor.rect(),
            handle_radius,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    size: Option<Size>,
    last_position: Option<Point>,
}

impl Program<CropGesture> for CropOverlay {
    type State = OverlayState;

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<CropGesture>) {
        let resized = (state.size != Some(bounds.size())).then(|| {
            state.size = Some(bounds.size());
            geometry::Size::new(bounds.width, bounds.height)
        });

        let (status, input) = pointer_input(state, event, bounds, cursor);
        match resized {
            Some(size) => (status, Some(CropGesture::Resized(size, input.map(Box::new)))),
            None => (status, input),
        }
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let r = self.rect;
        if !r.is_valid() {
            return vec![frame.into_geometry()];
        }

        // Darken everything outside the crop
        let full_w = bounds.width;
        let full_h = bounds.height;
        frame.fill_rectangle(Point::ORIGIN, Size::new(full_w, r.top), OUTSIDE_COLOR);
        frame.fill_rectangle(
            Point::new(0.0, r.bottom),
            Size::new(full_w, (full_h - r.bottom).max(0.0)),
            OUTSIDE_COLOR,
        );
        frame.fill_rectangle(Point::new(0.0, r.top), Size::new(r.left, r.height()), OUTSIDE_COLOR);
        frame.fill_rectangle(
            Point::new(r.right, r.top),
            Size::new((full_w - r.right).max(0.0), r.height()),
            OUTSIDE_COLOR,
        );

        let outline = Path::rectangle(Point::new(r.left, r.top), Size::new(r.width(), r.height()));
        frame.stroke(&outline, Stroke::default().with_width(2.0).with_color(HANDLE_COLOR));

        // Rule-of-thirds grid
        for i in 1..3 {
            let x = r.left + r.width() * i as f32 / 3.0;
            let y = r.top + r.height() * i as f32 / 3.0;
            let grid = Stroke::default().with_width(1.0).with_color(GRID_COLOR);
            frame.stroke(&Path::line(Point::new(x, r.top), Point::new(x, r.bottom)), grid.clone());
            frame.stroke(&Path::line(Point::new(r.left, y), Point::new(r.right, y)), grid);
        }

        for corner in [r.top_left(), r.top_right(), r.bottom_left(), r.bottom_right()] {
            let handle = Path::circle(Point::new(corner.x, corner.y), self.handle_radius / 2.0);
            frame.fill(&handle, HANDLE_COLOR);
        }

        vec![frame.into_geometry()]
    }
}

/// Press, drag and release relative to the canvas origin
fn pointer_input(
    state: &mut OverlayState,
    event: canvas::Event,
    bounds: Rectangle,
    cursor: Cursor,
) -> (canvas::event::Status, Option<CropGesture>) {
    let local = |p: Point| Point::new(p.x - bounds.x, p.y - bounds.y);

    let pressed = match event {
        canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
            cursor.position_in(bounds)
        }
        canvas::Event::Touch(touch::Event::FingerPressed { position, .. }) => {
            bounds.contains(position).then(|| local(position))
        }
        _ => None,
    };
    if let Some(pos) = pressed {
        state.last_position = Some(pos);
        return (
            canvas::event::Status::Captured,
            Some(CropGesture::Start(Point2::new(pos.x, pos.y))),
        );
    }

    match event {
        canvas::Event::Mouse(mouse::Event::CursorMoved { position })
        | canvas::Event::Touch(touch::Event::FingerMoved { position, .. }) => {
            if let Some(last) = state.last_position {
                let pos = local(position);
                state.last_position = Some(pos);
                let delta = Vector2::new(pos.x - last.x, pos.y - last.y);
                return (canvas::event::Status::Captured, Some(CropGesture::Move(delta)));
            }
        }
        canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left))
        | canvas::Event::Mouse(mouse::Event::CursorLeft)
        | canvas::Event::Touch(touch::Event::FingerLifted { .. })
        | canvas::Event::Touch(touch::Event::FingerLost { .. }) => {
            if state.last_position.take().is_some() {
                return (canvas::event::Status::Captured, Some(CropGesture::End));
            }
        }
        _ => {}
    }

    (canvas::event::Status::Ignored, None)
}
