/// wgpu device and queue for the render thread
///
/// Created once and moved onto the render thread, which is the only owner
/// of GPU objects afterwards.

// Use wgpu from iced to avoid dependency conflicts
use iced_wgpu::wgpu;
use tracing::{info, warn};

use crate::error::{EditorError, Result};

/// Instance, device and queue plus a few adapter facts
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
    /// Largest texture edge this device accepts
    pub max_texture_dim: u32,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter_name", &self.adapter_name)
            .field("max_texture_dim", &self.max_texture_dim)
            .finish_non_exhaustive()
    }
}

impl GpuContext {
    /// Hardware adapter first, then the software fallback
    pub fn new() -> Result<Self> {
        if let Some(ctx) = pollster::block_on(Self::new_async(false)) {
            return Ok(ctx);
        }
        warn!("hardware adapter unavailable, trying software fallback");
        pollster::block_on(Self::new_async(true))
            .ok_or_else(|| EditorError::GpuUnavailable("no suitable adapter".into()))
    }

    async fn new_async(force_fallback: bool) -> Option<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: force_fallback,
            })
            .await?;

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Photo Edit Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .ok()?;

        info!(adapter = %adapter_name, fallback = force_fallback, "GPU device ready");

        Some(Self {
            instance,
            device,
            queue,
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
        })
    }

    /// Check if a texture of the given dimensions can be created
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }
}
