/// GPU-accelerated preview rendering module
///
/// Real-time, non-destructive preview of the current edit using wgpu and a
/// WGSL shader.
///
/// Architecture:
/// - `context.rs` - adapter, device and queue
/// - `shaders.rs` - WGSL shader source code
/// - `layout.rs` - view transform and per-frame quad placement
/// - `pipeline.rs` - wgpu render pipeline, texture upload, capture
/// - `worker.rs` - render thread and the handle the UI side holds

pub mod context;
pub mod layout;
pub mod pipeline;
pub mod shaders;
pub mod worker;

pub use context::GpuContext;
pub use layout::{FrameLayout, ViewTransform};
pub use pipeline::RenderEngine;
pub use worker::{RenderCommand, RenderHandle, RenderTarget};
