//! On-device photo rendering and non-destructive editing pipeline.
//!
//! An image reference goes in and is decoded at a bounded working resolution.
//! A render thread shows it with live pan/zoom, crop window and colour
//! filter. Crop, filter and tone edits form a linear undo/redo history.
//! Export re-renders that history at full resolution on the CPU.

pub mod color;
pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod geometry;
pub mod gpu;
pub mod state;
pub mod ui;

pub use color::{Adjustments, ColorMatrix, FilterId};
pub use config::EngineConfig;
pub use error::{EditorError, Result};
pub use export::{ExportArtifact, ExportOutcome, ExportSink, FsExportSink};
pub use geometry::{AspectRatio, CropRect, Rect, Size};
pub use gpu::{GpuContext, RenderHandle, RenderTarget, ViewTransform};
pub use state::{CropEditor, CropRequest, EditHistory, EditState, EditorSession, ImageRef};
