/// Export: bake the current edit at full resolution and hand it to a sink
///
/// The bake bypasses the GPU preview. It decodes without the working
/// resolution cap, slices the natural-space crop, and runs the CPU colour
/// matrix. Writing the result somewhere is the sink's job.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{self, JoinHandle};
use tracing::{error, info};

use crate::color::apply_with_adjustments;
use crate::config::EngineConfig;
use crate::decode::loader::{crop_pixels, load_image_blocking};
use crate::decode::ImageSource;
use crate::error::{EditorError, Result};
use crate::state::data::ImageRef;
use crate::state::edit::EditState;

pub const EXPORT_MIME_TYPE: &str = "image/jpeg";

/// Finished raster plus the name and type it should be stored under
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub image: RgbaImage,
    pub file_name: String,
    pub mime_type: &'static str,
}

impl ExportArtifact {
    /// Name the artifact `<prefix><unix millis>.jpg`
    pub fn new(image: RgbaImage, prefix: &str) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self {
            image,
            file_name: format!("{}{}.jpg", prefix, millis),
            mime_type: EXPORT_MIME_TYPE,
        }
    }

    /// JPEG bytes at `quality` (1-100). Alpha is dropped.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(self.image.clone()).to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|e| EditorError::ExportIo(e.to_string()))?;
        Ok(bytes)
    }
}

/// Stores encoded artifacts (platform media store, filesystem, ...)
pub trait ExportSink: Send + Sync {
    fn save(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes artifacts into a directory
#[derive(Debug, Clone)]
pub struct FsExportSink {
    dir: PathBuf,
}

impl FsExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink for the configured (or default pictures) directory
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config
            .resolved_export_dir()
            .map(Self::new)
            .ok_or_else(|| EditorError::ExportIo("no export directory available".into()))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl ExportSink for FsExportSink {
    fn save(&self, file_name: &str, _mime_type: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| EditorError::ExportIo(format!("{}: {}", self.dir.display(), e)))?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes).map_err(|e| EditorError::ExportIo(format!("{}: {}", path.display(), e)))
    }
}

/// What the UI shows after an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub success: bool,
    pub reason: String,
    pub file_name: Option<String>,
}

impl ExportOutcome {
    pub fn saved(file_name: String) -> Self {
        Self {
            success: true,
            reason: format!("saved {}", file_name),
            file_name: Some(file_name),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
            file_name: None,
        }
    }
}

/// Full-resolution decode, crop, colour matrix
pub fn bake(source: &dyn ImageSource, image: &ImageRef, state: &EditState) -> Result<RgbaImage> {
    let decoded = load_image_blocking(source, image, None)?;
    let pixels = match state.crop {
        Some(crop) => crop_pixels(&decoded.pixels, &crop),
        None => decoded.pixels,
    };
    Ok(apply_with_adjustments(pixels, state.filter, &state.adjustments))
}

/// Bake, encode and save; blocking
pub fn export_blocking(
    source: &dyn ImageSource,
    sink: &dyn ExportSink,
    image: &ImageRef,
    state: &EditState,
    config: &EngineConfig,
) -> Result<String> {
    let baked = bake(source, image, state)?;
    let artifact = ExportArtifact::new(baked, &config.export_prefix);
    let bytes = artifact.encode_jpeg(config.export_quality)?;
    sink.save(&artifact.file_name, artifact.mime_type, &bytes)?;
    Ok(artifact.file_name)
}

/// Run the export on the blocking pool and report the outcome
pub async fn export(
    source: Arc<dyn ImageSource>,
    sink: Arc<dyn ExportSink>,
    image: ImageRef,
    state: EditState,
    config: EngineConfig,
) -> ExportOutcome {
    let label = image.clone();
    let result = task::spawn_blocking(move || {
        export_blocking(source.as_ref(), sink.as_ref(), &image, &state, &config)
    })
    .await;

    match result {
        Ok(Ok(file_name)) => {
            info!(image = %label, file = %file_name, "export finished");
            ExportOutcome::saved(file_name)
        }
        Ok(Err(e)) => {
            error!(image = %label, error = %e, "export failed");
            ExportOutcome::failed(e.to_string())
        }
        Err(e) => {
            error!(image = %label, error = %e, "export task aborted");
            ExportOutcome::failed(format!("export task aborted: {}", e))
        }
    }
}

/// Fire-and-forget export; await the handle only to learn the outcome
pub fn spawn_export(
    source: Arc<dyn ImageSource>,
    sink: Arc<dyn ExportSink>,
    image: ImageRef,
    state: EditState,
    config: EngineConfig,
) -> JoinHandle<ExportOutcome> {
    tokio::spawn(export(source, sink, image, state, config))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::color::FilterId;
    use crate::decode::loader::tests::png_bytes;
    use crate::decode::MemoryImageSource;
    use crate::geometry::Rect;
    use std::sync::Mutex;

    /// Keeps saved artifacts in memory
    #[derive(Default)]
    pub(crate) struct MemorySink {
        pub(crate) saved: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    impl ExportSink for MemorySink {
        fn save(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> Result<()> {
            if let Ok(mut saved) = self.saved.lock() {
                saved.push((file_name.to_string(), mime_type.to_string(), bytes.to_vec()));
            }
            Ok(())
        }
    }

    struct FailingSink;

    impl ExportSink for FailingSink {
        fn save(&self, _: &str, _: &str, _: &[u8]) -> Result<()> {
            Err(EditorError::ExportIo("storage full".into()))
        }
    }

    fn source_with(name: &str, width: u32, height: u32) -> MemoryImageSource {
        let source = MemoryImageSource::new();
        source.insert(ImageRef::from(name), png_bytes(width, height));
        source
    }

    #[test]
    fn test_artifact_name_and_type() {
        let artifact = ExportArtifact::new(RgbaImage::new(2, 2), "Edit_");
        assert!(artifact.file_name.starts_with("Edit_"));
        assert!(artifact.file_name.ends_with(".jpg"));
        let millis = &artifact.file_name["Edit_".len()..artifact.file_name.len() - 4];
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(artifact.mime_type, "image/jpeg");
    }

    #[test]
    fn test_encode_jpeg_decodes_back() {
        let artifact = ExportArtifact::new(RgbaImage::from_pixel(16, 8, image::Rgba([10, 20, 30, 255])), "x");
        let bytes = artifact.encode_jpeg(100).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_bake_uses_full_resolution_crop() {
        let source = source_with("big", 4000, 30);
        let state = EditState::new().with_crop(Some(Rect::new(100.0, 5.0, 3100.0, 25.0)));
        let baked = bake(&source, &ImageRef::from("big"), &state).unwrap();
        assert_eq!(baked.dimensions(), (3000, 20));
    }

    #[test]
    fn test_bake_matches_cpu_filter() {
        let source = source_with("img", 8, 8);
        let state = EditState::new().with_filter(FilterId::Grayscale);
        let baked = bake(&source, &ImageRef::from("img"), &state).unwrap();
        let px = baked.get_pixel(3, 3).0;
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }

    #[test]
    fn test_bake_out_of_range_crop_falls_back() {
        let source = source_with("img", 10, 10);
        let state = EditState::new().with_crop(Some(Rect::new(50.0, 50.0, 80.0, 80.0)));
        let baked = bake(&source, &ImageRef::from("img"), &state).unwrap();
        assert_eq!(baked.dimensions(), (10, 10));
    }

    #[tokio::test]
    async fn test_export_reports_success() {
        let source: Arc<dyn ImageSource> = Arc::new(source_with("img", 12, 6));
        let sink = Arc::new(MemorySink::default());

        let outcome = spawn_export(
            source,
            sink.clone(),
            ImageRef::from("img"),
            EditState::new().with_filter(FilterId::Warm),
            EngineConfig::default(),
        )
        .await
        .unwrap();

        assert!(outcome.success);
        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(Some(saved[0].0.clone()), outcome.file_name);
        assert_eq!(saved[0].1, "image/jpeg");
    }

    #[tokio::test]
    async fn test_export_reports_sink_failure() {
        let source: Arc<dyn ImageSource> = Arc::new(source_with("img", 4, 4));
        let outcome = export(
            source,
            Arc::new(FailingSink),
            ImageRef::from("img"),
            EditState::new(),
            EngineConfig::default(),
        )
        .await;

        assert!(!outcome.success);
        assert!(outcome.reason.contains("storage full"));
    }

    #[tokio::test]
    async fn test_export_missing_image_fails_cleanly() {
        let source: Arc<dyn ImageSource> = Arc::new(MemoryImageSource::new());
        let outcome = export(
            source,
            Arc::new(MemorySink::default()),
            ImageRef::from("gone"),
            EditState::new(),
            EngineConfig::default(),
        )
        .await;
        assert!(!outcome.success);
    }

    #[test]
    fn test_fs_sink_writes_file() {
        let dir = std::env::temp_dir().join(format!("photo-edit-test-{}", std::process::id()));
        let sink = FsExportSink::new(&dir);
        sink.save("a.jpg", EXPORT_MIME_TYPE, b"jpeg").unwrap();
        assert_eq!(fs::read(dir.join("a.jpg")).unwrap(), b"jpeg");
        let _ = fs::remove_dir_all(&dir);
    }
}
