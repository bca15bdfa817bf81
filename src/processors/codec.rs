// imgpress/src/processors/codec.rs
use super::{BackendError, CodecBackend, Compressor, Loader, Quantizer, Resizer};
use crate::core::policy::EncodeParams;
use image::DynamicImage;
use std::path::Path;

/// Production backend: image-rs decoding and resampling, the octree
/// quantizer, and mozjpeg / libwebp / oxipng for encoding.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    loader: Loader,
    resizer: Resizer,
    quantizer: Quantizer,
    compressor: Compressor,
}

impl ImageCodec {
    pub fn new() -> Self {
        Self {
            loader: Loader::new(),
            resizer: Resizer::new(),
            quantizer: Quantizer::new(),
            compressor: Compressor::new(),
        }
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecBackend for ImageCodec {
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        self.loader.load(path)
    }

    fn resample(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, BackendError> {
        self.resizer.resize_exact(image, width, height)
    }

    fn quantize(&self, image: &DynamicImage, colors: u16) -> Result<DynamicImage, BackendError> {
        self.quantizer.quantize(image, colors)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        params: &EncodeParams,
        output: &Path,
    ) -> Result<u64, BackendError> {
        self.compressor.save(image, params, output)
    }
}
