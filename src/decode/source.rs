/// Image byte sources
///
/// The gallery/storage layer resolves an [`ImageRef`] into a byte stream.
/// The pipeline never knows how the reference was obtained.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::error::{EditorError, Result};
use crate::state::data::ImageRef;

/// Supplies a fresh byte stream for an image reference on request
pub trait ImageSource: Send + Sync {
    fn open(&self, image: &ImageRef) -> io::Result<Box<dyn Read + Send>>;
}

/// Read the whole stream for `image` into memory
pub fn read_all(source: &dyn ImageSource, image: &ImageRef) -> Result<Vec<u8>> {
    let mut stream = source
        .open(image)
        .map_err(|e| EditorError::Decode(format!("cannot open {}: {}", image, e)))?;

    let mut buffer = Vec::new();
    stream
        .read_to_end(&mut buffer)
        .map_err(|e| EditorError::Decode(format!("cannot read {}: {}", image, e)))?;
    Ok(buffer)
}

/// Resolves references as paths relative to a root directory
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSource for FsImageSource {
    fn open(&self, image: &ImageRef) -> io::Result<Box<dyn Read + Send>> {
        let path = self.root.join(image.as_str());
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            ));
        }
        Ok(Box::new(File::open(path)?))
    }
}

/// In-memory source keyed by reference
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: Arc<RwLock<HashMap<ImageRef, Arc<Vec<u8>>>>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, image: ImageRef, bytes: Vec<u8>) {
        if let Ok(mut images) = self.images.write() {
            images.insert(image, Arc::new(bytes));
        }
    }
}

/// Reader over shared bytes so opening does not copy the buffer
struct SharedBytes(Cursor<Arc<Vec<u8>>>);

impl Read for SharedBytes {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.0.position() as usize;
        let data = self.0.get_ref();
        let remaining = data.len().saturating_sub(pos);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        self.0.set_position((pos + n) as u64);
        Ok(n)
    }
}

impl ImageSource for MemoryImageSource {
    fn open(&self, image: &ImageRef) -> io::Result<Box<dyn Read + Send>> {
        let images = self
            .images
            .read()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "image map poisoned"))?;

        match images.get(image) {
            Some(bytes) => Ok(Box::new(SharedBytes(Cursor::new(Arc::clone(bytes))))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no image registered for {}", image),
            )),
        }
    }
}
