// imgpress/src/processors/loader.rs
use super::BackendError;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::path::Path;

/// Largest edge, in pixels, the loader accepts.
const MAX_DIMENSION: u32 = 100_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct Loader;

impl Loader {
    pub fn new() -> Self {
        Self
    }

    /// Decode the file at `path`, sniffing the container format from its bytes.
    pub fn load(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        log::debug!("Loading image from: {}", path.display());

        let image = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let (width, height) = image.dimensions();
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(BackendError::ProcessingFailed(format!(
                "Image dimensions {}x{} exceed maximum {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        log::debug!(
            "Loaded image: {}x{} pixels, color: {:?}",
            width,
            height,
            image.color()
        );

        Ok(image)
    }
}
