/// Dedicated render thread
///
/// The render thread owns the `RenderEngine` and every GPU object. The UI
/// side talks to it through a cheap, cloneable `RenderHandle`: commands go
/// over an unbounded channel, the pan/zoom transform goes through a watch
/// channel (latest value wins), and captures reply on a oneshot.

use iced_wgpu::wgpu;
use image::RgbaImage;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::context::GpuContext;
use super::layout::ViewTransform;
use super::pipeline::RenderEngine;
use crate::color::{Adjustments, FilterId};
use crate::decode::DecodedImage;
use crate::error::{EditorError, Result};
use crate::geometry::Rect;
use crate::state::data::ImageRef;

/// Messages for the render thread
#[derive(Debug)]
pub enum RenderCommand {
    /// New image (or `None` for the empty state)
    LoadImage {
        image: ImageRef,
        decoded: Option<Arc<DecodedImage>>,
    },
    SetFilter(FilterId),
    SetAdjustments(Adjustments),
    /// Normalized crop window, `None` for the full image
    SetCropPreview(Option<Rect>),
    Resize(u32, u32),
    RequestRender,
    Capture(oneshot::Sender<Result<RgbaImage>>),
    Shutdown,
}

/// Where on-screen frames go
pub enum RenderTarget {
    /// No window: frames are only produced on capture
    Headless,
    /// A window surface created from the context's instance
    Surface {
        surface: wgpu::Surface<'static>,
        format: wgpu::TextureFormat,
    },
}

/// Sending side of the render thread
#[derive(Debug, Clone)]
pub struct RenderHandle {
    commands: mpsc::UnboundedSender<RenderCommand>,
    view: Arc<watch::Sender<ViewTransform>>,
}

impl RenderHandle {
    /// Start the render thread. The engine is built on the thread itself.
    pub fn spawn(ctx: GpuContext, target: RenderTarget) -> Result<(Self, JoinHandle<()>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(ViewTransform::IDENTITY);

        let join = thread::Builder::new()
            .name("render".into())
            .spawn(move || run(ctx, target, rx, view_rx))
            .map_err(|e| EditorError::GpuUnavailable(format!("cannot spawn render thread: {}", e)))?;

        Ok((
            Self {
                commands: tx,
                view: Arc::new(view_tx),
            },
            join,
        ))
    }

    /// A handle with no thread behind it; the receivers see what was sent
    #[cfg(test)]
    pub(crate) fn detached() -> (
        Self,
        mpsc::UnboundedReceiver<RenderCommand>,
        watch::Receiver<ViewTransform>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(ViewTransform::IDENTITY);
        (
            Self {
                commands: tx,
                view: Arc::new(view_tx),
            },
            rx,
            view_rx,
        )
    }

    fn send(&self, command: RenderCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| EditorError::RenderThreadClosed)
    }

    pub fn load_image(&self, image: ImageRef, decoded: Option<Arc<DecodedImage>>) -> Result<()> {
        self.send(RenderCommand::LoadImage { image, decoded })?;
        self.request_render()
    }

    pub fn set_filter(&self, filter: FilterId) -> Result<()> {
        self.send(RenderCommand::SetFilter(filter))
    }

    pub fn set_adjustments(&self, adjustments: Adjustments) -> Result<()> {
        self.send(RenderCommand::SetAdjustments(adjustments))
    }

    pub fn set_crop_preview(&self, crop: Option<Rect>) -> Result<()> {
        self.send(RenderCommand::SetCropPreview(crop))
    }

    pub fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.send(RenderCommand::Resize(width, height))?;
        self.request_render()
    }

    /// Publish the latest pan/zoom and ask for a frame
    pub fn set_view_transform(&self, view: ViewTransform) -> Result<()> {
        self.view.send_replace(view);
        self.request_render()
    }

    pub fn request_render(&self) -> Result<()> {
        self.send(RenderCommand::RequestRender)
    }

    /// Off-screen render of the current state at viewport size
    pub async fn capture(&self) -> Result<RgbaImage> {
        let (tx, rx) = oneshot::channel();
        self.send(RenderCommand::Capture(tx))?;
        rx.await.map_err(|_| EditorError::RenderThreadClosed)?
    }

    pub fn shutdown(&self) {
        let _ = self.send(RenderCommand::Shutdown);
    }
}

struct Screen {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

fn run(
    ctx: GpuContext,
    target: RenderTarget,
    mut commands: mpsc::UnboundedReceiver<RenderCommand>,
    mut view: watch::Receiver<ViewTransform>,
) {
    let (format, mut screen) = match target {
        RenderTarget::Headless => (wgpu::TextureFormat::Rgba8Unorm, None),
        RenderTarget::Surface { surface, format } => {
            let config = wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format,
                width: 0,
                height: 0,
                present_mode: wgpu::PresentMode::Fifo,
                desired_maximum_frame_latency: 2,
                alpha_mode: wgpu::CompositeAlphaMode::Auto,
                view_formats: vec![],
            };
            (format, Some(Screen { surface, config }))
        }
    };

    let mut engine = RenderEngine::new(ctx, format);
    info!("render thread started");

    while let Some(first) = commands.blocking_recv() {
        // Coalesce everything already queued into one frame
        let mut batch = vec![first];
        while let Ok(next) = commands.try_recv() {
            batch.push(next);
        }

        let mut wants_frame = false;
        for command in batch {
            match command {
                RenderCommand::LoadImage { image, decoded } => engine.load_image(image, decoded),
                RenderCommand::SetFilter(filter) => wants_frame |= engine.set_filter(filter),
                RenderCommand::SetAdjustments(adj) => wants_frame |= engine.set_adjustments(adj),
                RenderCommand::SetCropPreview(crop) => {
                    engine.set_crop_preview(crop);
                    wants_frame = true;
                }
                RenderCommand::Resize(width, height) => {
                    engine.resize(width, height);
                    if let Some(screen) = screen.as_mut() {
                        configure(&engine, screen, width, height);
                    }
                }
                RenderCommand::RequestRender => wants_frame = true,
                RenderCommand::Capture(reply) => {
                    sync_view(&mut engine, &mut view);
                    let _ = reply.send(engine.capture_frame());
                }
                RenderCommand::Shutdown => {
                    info!("render thread stopping");
                    return;
                }
            }
        }

        sync_view(&mut engine, &mut view);
        if wants_frame {
            if let Some(screen) = screen.as_ref() {
                present(&mut engine, screen);
            }
        }
    }
    debug!("all render handles dropped");
}

fn sync_view(engine: &mut RenderEngine, view: &mut watch::Receiver<ViewTransform>) {
    if view.has_changed().unwrap_or(false) {
        engine.set_view_transform(*view.borrow_and_update());
    }
}

fn configure(engine: &RenderEngine, screen: &mut Screen, width: u32, height: u32) {
    if width == 0 || height == 0 {
        return;
    }
    screen.config.width = width;
    screen.config.height = height;
    screen.surface.configure(&engine.context().device, &screen.config);
}

fn present(engine: &mut RenderEngine, screen: &Screen) {
    let viewport = (screen.config.width, screen.config.height);
    if viewport.0 == 0 || viewport.1 == 0 {
        return;
    }

    let frame = match screen.surface.get_current_texture() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "skipping frame");
            return;
        }
    };
    let target = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = engine
        .context()
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
    engine.render_frame(&mut encoder, &target, viewport);
    engine.context().queue.submit(Some(encoder.finish()));
    frame.present();
}
