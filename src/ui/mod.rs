/// iced canvas programs that turn pointer input into editing gestures
///
/// - `canvas.rs` - pan/zoom over the GPU preview
/// - `crop_overlay.rs` - crop rectangle, handles and drag input

pub mod canvas;
pub mod crop_overlay;

pub use canvas::{ViewGesture, ViewportCanvas};
pub use crop_overlay::{CropGesture, CropOverlay};

use cgmath::Vector2;

/// Pixel delta on a widget of `size` -> clip-space delta (Y up)
pub fn pixel_delta_to_ndc(delta: Vector2<f32>, size: iced::Size) -> Vector2<f32> {
    if size.width <= 0.0 || size.height <= 0.0 {
        return Vector2::new(0.0, 0.0);
    }
    Vector2::new(2.0 * delta.x / size.width, -2.0 * delta.y / size.height)
}
