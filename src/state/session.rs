/// Editing session for one image at a time
///
/// Binds the edit history (what should be shown) to the render thread (what
/// is shown). Every history movement is replayed into the render handle.
/// Decode and export run off the event loop.

use cgmath::Vector2;
use image::RgbaImage;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::crop::CropRequest;
use super::data::{ImageInfo, ImageRef};
use super::edit::EditState;
use super::history::EditHistory;
use crate::color::{Adjustments, FilterId};
use crate::config::EngineConfig;
use crate::decode::{load_or_none, ImageSource};
use crate::error::{EditorError, Result};
use crate::export::{spawn_export, ExportOutcome, ExportSink};
use crate::geometry::{pixel_rect_to_normalized, CropRect, Rect};
use crate::gpu::{RenderHandle, ViewTransform};

pub struct EditorSession {
    config: EngineConfig,
    source: Arc<dyn ImageSource>,
    sink: Arc<dyn ExportSink>,
    render: RenderHandle,
    history: EditHistory,
    image: Option<ImageRef>,
    info: Option<ImageInfo>,
    view: ViewTransform,
}

impl EditorSession {
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn ImageSource>,
        sink: Arc<dyn ExportSink>,
        render: RenderHandle,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            render,
            history: EditHistory::new(),
            image: None,
            info: None,
            view: ViewTransform::IDENTITY,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    /// Natural size and orientation of the open image
    pub fn image_info(&self) -> Option<&ImageInfo> {
        self.info.as_ref()
    }

    pub fn current(&self) -> EditState {
        self.history.current()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn view_transform(&self) -> ViewTransform {
        self.view
    }

    /// Edit state after every commit, undo and redo
    pub fn subscribe(&self) -> watch::Receiver<EditState> {
        self.history.subscribe()
    }

    /// Decode `image` off the event loop and show it.
    ///
    /// A decode failure leaves the session in the empty state and returns
    /// false. History starts over either way.
    pub async fn open_image(&mut self, image: ImageRef) -> bool {
        let decoded = load_or_none(
            Arc::clone(&self.source),
            image.clone(),
            self.config.max_working_dimension,
        )
        .await;

        self.history.reset();
        self.view = ViewTransform::IDENTITY;
        self.image = Some(image.clone());
        self.info = decoded.as_ref().map(|d| d.info);

        let loaded = decoded.is_some();
        self.dispatch(self.render.set_view_transform(self.view));
        self.dispatch(self.render.load_image(image.clone(), decoded.map(Arc::new)));
        self.replay();

        info!(image = %image, loaded, "image opened");
        loaded
    }

    /// Commit a crop in natural pixels. The crop is clamped to the image;
    /// a rect that collapses, or any crop while no image is loaded, is
    /// rejected and the prior crop kept.
    pub fn commit_crop(&mut self, crop: Option<CropRect>) -> bool {
        let crop = match crop {
            Some(rect) => match self.clamp_crop(&rect) {
                Ok(rect) => Some(rect),
                Err(e) => {
                    debug!(error = %e, "crop rejected");
                    return false;
                }
            },
            None => None,
        };

        if !self.history.commit_crop(crop) {
            return false;
        }
        self.view = ViewTransform::IDENTITY;
        self.dispatch(self.render.set_view_transform(self.view));
        self.replay();
        true
    }

    fn clamp_crop(&self, rect: &Rect) -> Result<Rect> {
        if !rect.is_valid() {
            return Err(EditorError::InvalidGeometry(format!("{} has no area", rect)));
        }
        let Some(info) = self.info.as_ref() else {
            return Err(EditorError::InvalidGeometry("no image is loaded".into()));
        };
        let natural = info.natural();
        Rect::new(0.0, 0.0, natural.width, natural.height)
            .intersect(rect)
            .ok_or_else(|| EditorError::InvalidGeometry(format!("{} lies outside the image", rect)))
    }

    pub fn commit_filter(&mut self, filter: FilterId) -> bool {
        if !self.history.commit_filter(filter) {
            return false;
        }
        self.replay();
        true
    }

    pub fn commit_adjustments(&mut self, adjustments: Adjustments) -> bool {
        if !self.history.commit_adjustments(adjustments) {
            return false;
        }
        self.replay();
        true
    }

    pub fn undo(&mut self) -> bool {
        if !self.history.undo() {
            return false;
        }
        self.replay();
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.redo() {
            return false;
        }
        self.replay();
        true
    }

    /// Live pan/zoom from gestures; the scale is clamped here, not in the
    /// engine
    pub fn set_view_transform(&mut self, view: ViewTransform) {
        self.view = view.clamped(self.config.min_scale, self.config.max_scale);
        self.dispatch(self.render.set_view_transform(self.view));
    }

    pub fn zoom_by(&mut self, factor: f32) {
        let view = ViewTransform {
            scale: self.view.scale * factor,
            ..self.view
        };
        self.set_view_transform(view);
    }

    pub fn pan_by(&mut self, delta: Vector2<f32>) {
        self.set_view_transform(self.view.pan_by(delta));
    }

    /// Inputs for the crop screen
    pub fn crop_request(&self) -> Option<CropRequest> {
        let current = self.history.current();
        Some(CropRequest {
            image: self.image.clone()?,
            initial_crop: current.crop,
            filter: current.filter,
        })
    }

    /// Result of the crop screen: a natural-space rect, or `None` on cancel
    pub fn apply_crop_result(&mut self, result: Option<CropRect>) -> bool {
        match result {
            Some(crop) => self.commit_crop(Some(crop)),
            None => false,
        }
    }

    /// Bake the current state at full resolution in the background
    pub fn export(&self) -> Option<JoinHandle<ExportOutcome>> {
        let image = self.image.clone()?;
        Some(spawn_export(
            Arc::clone(&self.source),
            Arc::clone(&self.sink),
            image,
            self.history.current(),
            self.config.clone(),
        ))
    }

    /// The on-screen composition at viewport size
    pub async fn capture_preview(&self) -> Result<RgbaImage> {
        self.render.capture().await
    }

    /// Push the current history state into the renderer
    fn replay(&self) {
        let state = self.history.current();
        let window = match (state.crop, self.info.as_ref()) {
            (Some(crop), Some(info)) => Some(pixel_rect_to_normalized(&crop, info.natural())),
            _ => None,
        };

        self.dispatch(self.render.set_filter(state.filter));
        self.dispatch(self.render.set_adjustments(state.adjustments));
        self.dispatch(self.render.set_crop_preview(window));
        self.dispatch(self.render.request_render());
    }

    fn dispatch(&self, result: Result<()>) {
        if let Err(e) = result {
            warn!(error = %e, "render update dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::loader::tests::png_bytes;
    use crate::decode::MemoryImageSource;
    use crate::export::tests::MemorySink;
    use crate::gpu::RenderCommand;
    use tokio::sync::mpsc;

    struct Fixture {
        session: EditorSession,
        commands: mpsc::UnboundedReceiver<RenderCommand>,
        view: watch::Receiver<ViewTransform>,
        sink: Arc<MemorySink>,
    }

    fn fixture() -> Fixture {
        let source = MemoryImageSource::new();
        source.insert(ImageRef::from("photo"), png_bytes(400, 200));
        let sink = Arc::new(MemorySink::default());
        let (render, commands, view) = RenderHandle::detached();
        let session = EditorSession::new(EngineConfig::default(), Arc::new(source), sink.clone(), render);
        Fixture {
            session,
            commands,
            view,
            sink,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<RenderCommand>) -> Vec<RenderCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    #[tokio::test]
    async fn test_open_image_loads_texture() {
        let mut f = fixture();
        assert!(f.session.open_image(ImageRef::from("photo")).await);
        assert_eq!(f.session.image_info().map(|i| i.natural_size()), Some((400, 200)));

        let commands = drain(&mut f.commands);
        assert!(commands.iter().any(|c| matches!(
            c,
            RenderCommand::LoadImage { decoded: Some(_), .. }
        )));
    }

    #[tokio::test]
    async fn test_open_missing_image_is_empty_state() {
        let mut f = fixture();
        assert!(!f.session.open_image(ImageRef::from("missing")).await);
        assert!(f.session.image_info().is_none());

        let commands = drain(&mut f.commands);
        assert!(commands.iter().any(|c| matches!(
            c,
            RenderCommand::LoadImage { decoded: None, .. }
        )));
    }

    #[tokio::test]
    async fn test_commit_crop_sends_normalized_window_and_resets_view() {
        let mut f = fixture();
        f.session.open_image(ImageRef::from("photo")).await;
        f.session.set_view_transform(ViewTransform::new(3.0, 0.2, 0.1));
        drain(&mut f.commands);

        assert!(f.session.commit_crop(Some(Rect::new(100.0, 50.0, 300.0, 150.0))));
        assert_eq!(*f.view.borrow(), ViewTransform::IDENTITY);

        let window = drain(&mut f.commands).into_iter().find_map(|c| match c {
            RenderCommand::SetCropPreview(w) => Some(w),
            _ => None,
        });
        assert_eq!(window, Some(Some(Rect::new(0.25, 0.25, 0.75, 0.75))));
    }

    #[tokio::test]
    async fn test_collapsed_crop_is_rejected() {
        let mut f = fixture();
        f.session.open_image(ImageRef::from("photo")).await;

        assert!(!f.session.commit_crop(Some(Rect::new(10.0, 10.0, 10.0, 50.0))));
        assert!(!f.session.commit_crop(Some(Rect::new(500.0, 500.0, 600.0, 600.0))));
        assert_eq!(f.session.current().crop, None);
        assert!(!f.session.can_undo());
    }

    #[tokio::test]
    async fn test_crop_without_image_is_rejected() {
        let mut f = fixture();
        assert!(!f.session.commit_crop(Some(Rect::new(0.0, 0.0, 100.0, 100.0))));

        f.session.open_image(ImageRef::from("missing")).await;
        assert!(!f.session.commit_crop(Some(Rect::new(0.0, 0.0, 100.0, 100.0))));
        assert!(!f.session.apply_crop_result(Some(Rect::new(0.0, 0.0, 100.0, 100.0))));
        assert_eq!(f.session.current().crop, None);
        assert!(!f.session.can_undo());
    }

    #[tokio::test]
    async fn test_undo_replays_filter() {
        let mut f = fixture();
        f.session.open_image(ImageRef::from("photo")).await;
        f.session.commit_filter(FilterId::Grayscale);
        f.session.commit_filter(FilterId::Warm);
        drain(&mut f.commands);

        assert!(f.session.undo());
        let filters: Vec<FilterId> = drain(&mut f.commands)
            .into_iter()
            .filter_map(|c| match c {
                RenderCommand::SetFilter(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(filters, vec![FilterId::Grayscale]);
        assert!(f.session.redo());
        assert_eq!(f.session.current().filter, FilterId::Warm);
    }

    #[tokio::test]
    async fn test_view_transform_is_clamped() {
        let mut f = fixture();
        f.session.set_view_transform(ViewTransform::new(12.0, 0.0, 0.0));
        assert_eq!(f.view.borrow().scale, 5.0);

        f.session.zoom_by(0.01);
        assert_eq!(f.session.view_transform().scale, 0.5);

        f.session.pan_by(Vector2::new(0.1, 0.2));
        assert_eq!(f.view.borrow().translate_y, 0.2);
    }

    #[tokio::test]
    async fn test_crop_round_trip_through_request() {
        let mut f = fixture();
        assert!(f.session.crop_request().is_none());

        f.session.open_image(ImageRef::from("photo")).await;
        f.session.commit_filter(FilterId::Cool);
        let request = f.session.crop_request().unwrap();
        assert_eq!(request.filter, FilterId::Cool);
        assert_eq!(request.initial_crop, None);

        assert!(!f.session.apply_crop_result(None));
        assert!(f.session.apply_crop_result(Some(Rect::new(0.0, 0.0, 200.0, 100.0))));
        assert_eq!(f.session.crop_request().unwrap().initial_crop, Some(Rect::new(0.0, 0.0, 200.0, 100.0)));
    }

    #[tokio::test]
    async fn test_subscribe_sees_commits() {
        let mut f = fixture();
        let mut rx = f.session.subscribe();
        f.session.open_image(ImageRef::from("photo")).await;
        f.session.commit_adjustments(Adjustments::new(1.5, 1.0, 1.0));
        assert_eq!(rx.borrow_and_update().adjustments.brightness, 1.5);
    }

    #[tokio::test]
    async fn test_export_bakes_current_state() {
        let mut f = fixture();
        assert!(f.session.export().is_none());

        f.session.open_image(ImageRef::from("photo")).await;
        f.session.commit_crop(Some(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let outcome = f.session.export().unwrap().await.unwrap();
        assert!(outcome.success);

        let saved = f.sink.saved.lock().unwrap();
        let decoded = image::load_from_memory(&saved[0].2).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 100));
    }
}
