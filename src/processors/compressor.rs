// imgpress/src/processors/compressor.rs
use super::BackendError;
use crate::core::policy::{EncodeParams, JpegParams, PngParams, WebpParams};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;
use oxipng::{optimize_from_memory, Options, StripChunks};
use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Turns a raster into encoded bytes under a fixed parameter set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor;

impl Compressor {
    pub fn new() -> Self {
        Self
    }

    /// Encode and write to `path`, replacing any existing file. Returns the
    /// number of bytes written.
    pub fn save(
        &self,
        image: &DynamicImage,
        params: &EncodeParams,
        path: &Path,
    ) -> Result<u64, BackendError> {
        log::debug!(
            "Saving image to {} with {:?}",
            path.display(),
            params
        );

        let data = self.compress_to_bytes(image, params)?;

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&data)?;
        writer.flush()?;

        self.log_save_result(path, data.len() as u64);
        Ok(data.len() as u64)
    }

    pub fn compress_to_bytes(
        &self,
        image: &DynamicImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError> {
        match params {
            EncodeParams::Jpeg(jpeg) => self.encode_jpeg(image, jpeg),
            EncodeParams::WebP(webp) => self.encode_webp(image, webp),
            EncodeParams::Png(png) => self.encode_png(image, png),
        }
    }

    /// mozjpeg reports libjpeg errors by unwinding, so the encode runs under
    /// `catch_unwind`.
    fn encode_jpeg(&self, image: &DynamicImage, params: &JpegParams) -> Result<Vec<u8>, BackendError> {
        let (width, height) = (image.width(), image.height());
        // JPEG has no alpha or palette: flatten those to 3-channel RGB.
        // Single-channel sources stay grayscale.
        let grayscale = is_grayscale(image);
        let (pixels, color_space) = if grayscale {
            (image.to_luma8().into_raw(), mozjpeg::ColorSpace::JCS_GRAYSCALE)
        } else {
            (image.to_rgb8().into_raw(), mozjpeg::ColorSpace::JCS_RGB)
        };

        let encoded = panic::catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
            let mut comp = mozjpeg::Compress::new(color_space);
            comp.set_size(width as usize, height as usize);
            comp.set_quality(params.quality as f32);
            if params.progressive {
                comp.set_progressive_mode();
            }
            comp.set_optimize_coding(params.optimize_coding);
            // Subsampling applies to the two chroma components, which grayscale lacks.
            if !grayscale {
                let block = params.subsampling.pixel_sizes();
                comp.set_chroma_sampling_pixel_sizes(block, block);
            }

            let mut started = comp.start_compress(Vec::new())?;
            started.write_scanlines(&pixels)?;
            started.finish()
        }));

        match encoded {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(e)) => Err(BackendError::ProcessingFailed(format!(
                "JPEG encode failed: {}",
                e
            ))),
            Err(_) => Err(BackendError::ProcessingFailed(
                "JPEG encoder aborted".to_string(),
            )),
        }
    }

    fn encode_webp(&self, image: &DynamicImage, params: &WebpParams) -> Result<Vec<u8>, BackendError> {
        let (width, height) = (image.width(), image.height());

        let mut config = webp::WebPConfig::new().map_err(|_| {
            BackendError::ProcessingFailed("Failed to create WebP config".to_string())
        })?;
        config.lossless = 0;
        config.quality = params.quality as f32;
        config.method = params.method;

        let encoded = if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            let memory = webp::Encoder::from_rgba(rgba.as_raw(), width, height)
                .encode_advanced(&config);
            memory
        } else {
            let rgb = image.to_rgb8();
            let memory = webp::Encoder::from_rgb(rgb.as_raw(), width, height)
                .encode_advanced(&config);
            memory
        };

        encoded
            .map(|memory| memory.to_vec())
            .map_err(|e| BackendError::ProcessingFailed(format!("WebP encode failed: {:?}", e)))
    }

    fn encode_png(&self, image: &DynamicImage, _params: &PngParams) -> Result<Vec<u8>, BackendError> {
        let mut buffer = Cursor::new(Vec::new());
        // oxipng recompresses everything, so the first pass only needs to be fast.
        let encoder = PngEncoder::new_with_quality(&mut buffer, CompressionType::Fast, FilterType::Adaptive);
        image
            .write_with_encoder(encoder)
            .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {}", e)))?;

        let mut options = Options::default();
        options.strip = StripChunks::Safe;
        optimize_from_memory(&buffer.into_inner(), &options)
            .map_err(|e| BackendError::ProcessingFailed(format!("PNG optimization failed: {}", e)))
    }

    fn log_save_result(&self, path: &Path, bytes: u64) {
        log::info!("Saved image: {} ({} bytes)", path.display(), bytes);
    }
}

fn is_grayscale(image: &DynamicImage) -> bool {
    let color = image.color();
    !color.has_color() && !color.has_alpha()
}
