/// State management module
///
/// This module handles all editing state, including:
/// - Shared data structures (data.rs)
/// - Edit snapshots and non-destructive editing (edit.rs)
/// - Edit history and undo/redo (history.rs)
/// - The interactive crop rectangle (crop.rs)
/// - The session that replays state into the renderer (session.rs)

pub mod crop;
pub mod data;
pub mod edit;
pub mod history;
pub mod session;

pub use crop::{CropEditor, CropRequest, DragHandle};
pub use data::{ImageInfo, ImageRef};
pub use edit::EditState;
pub use history::EditHistory;
pub use session::EditorSession;
