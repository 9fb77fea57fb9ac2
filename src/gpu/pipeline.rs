/// wgpu render pipeline for the live preview
///
/// This module manages all the wgpu boilerplate:
/// - Texture creation and uploads (deferred to the next frame)
/// - Uniform buffer for the colour matrix and frame layout
/// - Render pipeline state (one for the screen, one for capture)
/// - Draw commands and off-screen readback

// Use wgpu from iced to avoid dependency conflicts
use iced_wgpu::wgpu;
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::layout::{FrameLayout, ViewTransform};
use crate::color::{color_matrix_for, Adjustments, FilterId};
use crate::decode::DecodedImage;
use crate::error::{EditorError, Result};
use crate::geometry::{Rect, Size};
use crate::state::data::ImageRef;

/// Format of the off-screen capture target. Not sRGB so the shader output
/// bytes match the CPU bake.
const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Frame uniforms in a GPU-friendly layout.
/// Must match the WGSL `Uniforms` struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuUniforms {
    color_matrix: [[f32; 4]; 4], // column-major, like WGSL mat4x4
    color_offset: [f32; 4],
    half_extent: [f32; 2],
    translate: [f32; 2],
    uv_min: [f32; 2],
    uv_max: [f32; 2],
}

impl GpuUniforms {
    fn new(filter: FilterId, adjustments: &Adjustments, layout: &FrameLayout) -> Self {
        let matrix = color_matrix_for(filter, adjustments);
        Self {
            color_matrix: matrix.gpu_columns(),
            color_offset: matrix.gpu_offset(),
            half_extent: layout.half_extent.into(),
            translate: layout.translate.into(),
            uv_min: layout.uv_min,
            uv_max: layout.uv_max,
        }
    }
}

/// Uploaded image texture and the bind group that samples it
struct LoadedTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: Size,
}

/// Owns every GPU object of the preview. Lives on the render thread.
pub struct RenderEngine {
    ctx: GpuContext,
    screen_pipeline: wgpu::RenderPipeline,
    capture_pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    loaded: Option<LoadedTexture>,
    pending: Option<Arc<DecodedImage>>,
    image: Option<ImageRef>,
    view: ViewTransform,
    filter: FilterId,
    adjustments: Adjustments,
    crop: Option<Rect>,
    viewport: (u32, u32),
}

// Manual Debug implementation (wgpu types don't implement Debug)
impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("image", &self.image)
            .field("view", &self.view)
            .field("filter", &self.filter)
            .field("crop", &self.crop)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

impl RenderEngine {
    /// Build pipelines for `screen_format` (on-screen) and the capture target
    pub fn new(ctx: GpuContext, screen_format: wgpu::TextureFormat) -> Self {
        let device = &ctx.device;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Image Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let identity = GpuUniforms::new(
            FilterId::None,
            &Adjustments::default(),
            &FrameLayout {
                half_extent: cgmath::Vector2::new(1.0, 1.0),
                translate: cgmath::Vector2::new(0.0, 0.0),
                uv_min: [0.0, 0.0],
                uv_max: [1.0, 1.0],
            },
        );
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniform Buffer"),
            contents: bytemuck::cast_slice(&[identity]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bind Group Layout"),
            entries: &[
                // Image texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Uniforms are read by both stages
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Preview Shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::get_shader().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let screen_pipeline = create_pipeline(device, &pipeline_layout, &shader, screen_format);
        let capture_pipeline = create_pipeline(device, &pipeline_layout, &shader, CAPTURE_FORMAT);

        Self {
            ctx,
            screen_pipeline,
            capture_pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            loaded: None,
            pending: None,
            image: None,
            view: ViewTransform::IDENTITY,
            filter: FilterId::None,
            adjustments: Adjustments::default(),
            crop: None,
            viewport: (0, 0),
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn view_transform(&self) -> ViewTransform {
        self.view
    }

    pub fn crop_preview(&self) -> Option<Rect> {
        self.crop
    }

    pub fn filter(&self) -> FilterId {
        self.filter
    }

    /// Whether a texture is bound for drawing
    pub fn has_image(&self) -> bool {
        self.loaded.is_some()
    }

    /// Stage a new image. A different reference resets the view transform and
    /// the crop window. `None` drops the current texture (decode failed).
    pub fn load_image(&mut self, image: ImageRef, decoded: Option<Arc<DecodedImage>>) {
        if self.image.as_ref() != Some(&image) {
            self.view = ViewTransform::IDENTITY;
            self.crop = None;
            self.image = Some(image);
        }
        match decoded {
            Some(decoded) => self.pending = Some(decoded),
            None => {
                self.pending = None;
                self.loaded = None;
            }
        }
    }

    /// Live pan/zoom. The caller clamps the scale.
    pub fn set_view_transform(&mut self, view: ViewTransform) {
        self.view = view;
    }

    /// Returns false if the filter was already active
    pub fn set_filter(&mut self, filter: FilterId) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }

    pub fn set_adjustments(&mut self, adjustments: Adjustments) -> bool {
        if self.adjustments == adjustments {
            return false;
        }
        self.adjustments = adjustments;
        true
    }

    /// Texture-space window to sample; the base fit follows its aspect
    pub fn set_crop_preview(&mut self, crop: Option<Rect>) {
        self.crop = crop.filter(|c| c.is_valid());
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    /// Upload a staged image. On failure the previous texture stays bound.
    fn upload_pending(&mut self) {
        let Some(decoded) = self.pending.take() else {
            return;
        };
        match self.upload(&decoded) {
            Ok(loaded) => {
                debug!(size = ?decoded.pixels.dimensions(), "texture uploaded");
                self.loaded = Some(loaded);
            }
            Err(e) => warn!(error = %e, "keeping previous texture"),
        }
    }

    fn upload(&self, decoded: &DecodedImage) -> Result<LoadedTexture> {
        let (width, height) = decoded.pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(EditorError::TextureUpload("image has zero size".into()));
        }
        if !self.ctx.supports_size(width, height) {
            return Err(EditorError::TextureUpload(format!(
                "{}x{} exceeds device limit {}",
                width, height, self.ctx.max_texture_dim
            )));
        }

        let device = &self.ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let texture_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Image Texture"),
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            decoded.pixels.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            texture_size,
        );

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Image Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(EditorError::TextureUpload(error.to_string()));
        }

        Ok(LoadedTexture {
            _texture: texture,
            bind_group,
            size: Size::from_pixels(width, height),
        })
    }

    /// Layout for the current state, `None` when there is nothing to draw
    fn frame_layout(&self, viewport: (u32, u32)) -> Option<FrameLayout> {
        let loaded = self.loaded.as_ref()?;
        FrameLayout::compute(
            loaded.size,
            self.crop.as_ref(),
            Size::from_pixels(viewport.0, viewport.1),
            &self.view,
        )
    }

    /// Record one frame into `encoder`, targeting a view in the screen
    /// format. Returns false when the frame was skipped (zero-sized
    /// viewport or no image).
    pub fn render_frame(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        viewport: (u32, u32),
    ) -> bool {
        self.viewport = viewport;
        self.upload_pending();
        self.encode(encoder, target, viewport, false)
    }

    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        viewport: (u32, u32),
        capture: bool,
    ) -> bool {
        let (Some(layout), Some(loaded)) = (self.frame_layout(viewport), self.loaded.as_ref()) else {
            return false;
        };

        let uniforms = GpuUniforms::new(self.filter, &self.adjustments, &layout);
        self.ctx
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Preview Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_viewport(0.0, 0.0, viewport.0 as f32, viewport.1 as f32, 0.0, 1.0);
        render_pass.set_pipeline(if capture { &self.capture_pipeline } else { &self.screen_pipeline });
        render_pass.set_bind_group(0, &loaded.bind_group, &[]);
        render_pass.draw(0..4, 0..1);
        true
    }

    /// Render the current state off-screen at viewport size and read it back
    pub fn capture_frame(&mut self) -> Result<RgbaImage> {
        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            return Err(EditorError::InvalidGeometry("viewport has zero size".into()));
        }
        self.upload_pending();

        let device = &self.ctx.device;
        let output_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Capture Encoder"),
        });
        if !self.encode(&mut encoder, &output_view, (width, height), true) {
            return Err(EditorError::TextureUpload("no image loaded".into()));
        }

        // Rows are padded to 256 bytes for the copy
        let bytes_per_row = width * 4;
        let padded_bytes_per_row = (bytes_per_row + 255) & !255;
        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &output_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.ctx.queue.submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| EditorError::TextureUpload(format!("readback dropped: {}", e)))?
            .map_err(|e| EditorError::TextureUpload(format!("readback failed: {}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let mut output = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            let start = (y * padded_bytes_per_row) as usize;
            let end = start + bytes_per_row as usize;
            output.extend_from_slice(&data[start..end]);
        }
        drop(data);
        output_buffer.unmap();

        RgbaImage::from_raw(width, height, output)
            .ok_or_else(|| EditorError::TextureUpload("readback size mismatch".into()))
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Preview Render Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
