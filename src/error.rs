/// Error taxonomy for the rendering and edit pipeline
///
/// Every failure that crosses a boundary (decode, GPU upload, export sink)
/// is represented here. Boundary callers log these and fall back to a safe
/// state instead of ending the editing session.

use thiserror::Error;

/// Errors produced by the pipeline
#[derive(Debug, Error)]
pub enum EditorError {
    /// Source stream unreadable or pixel data corrupt
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Decode succeeded but the GPU rejected the texture
    #[error("texture upload failed: {0}")]
    TextureUpload(String),

    /// Export sink unavailable or the write failed
    #[error("export failed: {0}")]
    ExportIo(String),

    /// A computed rectangle collapsed to zero or negative size
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// No usable adapter or device
    #[error("GPU unavailable: {0}")]
    GpuUnavailable(String),

    /// The render thread has shut down
    #[error("render thread is no longer running")]
    RenderThreadClosed,

    /// Engine configuration failed validation or parsing
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<image::ImageError> for EditorError {
    fn from(e: image::ImageError) -> Self {
        EditorError::Decode(e.to_string())
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Config(e.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EditorError>;
