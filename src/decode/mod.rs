/// Image decoding module
///
/// This module handles:
/// - Resolving image references into byte streams (source.rs)
/// - Reading and applying EXIF orientation (orientation.rs)
/// - Bounded-resolution decode and crop slicing (loader.rs)

pub mod loader;
pub mod orientation;
pub mod source;

pub use loader::{decode, load_image, load_or_none, DecodedImage};
pub use orientation::Orientation;
pub use source::{FsImageSource, ImageSource, MemoryImageSource};
