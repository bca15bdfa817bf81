// imgpress/src/processors/resizer.rs
use super::BackendError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Downscaling filter. Lanczos3 avoids the aliasing box and bilinear filters
/// leave on reduction.
const FILTER: FilterType = FilterType::Lanczos3;

#[derive(Debug, Clone, Copy, Default)]
pub struct Resizer;

impl Resizer {
    pub fn new() -> Self {
        Self
    }

    /// Resample to exactly `width` x `height`. The caller has already fixed
    /// the aspect ratio.
    pub fn resize_exact(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Cannot resize to {}x{}",
                width, height
            )));
        }

        if (width, height) == image.dimensions() {
            log::debug!("Image dimensions unchanged, skipping resize");
            return Ok(image.clone());
        }

        log::debug!(
            "Resizing image from {}x{} to {}x{} ({:?})",
            image.width(),
            image.height(),
            width,
            height,
            FILTER
        );

        Ok(image.resize_exact(width, height, FILTER))
    }
}
