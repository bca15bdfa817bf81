// imgpress/src/core/pipeline.rs
use super::policy::EncodeParams;
use super::{CompressError, CompressionRequest, CompressionResult, OutputFormat, Quality, Resolution, Result};
use crate::processors::{CodecBackend, ImageCodec};
use image::DynamicImage;
use std::path::Path;

/// The encoder pipeline: validate, decode, resize, encode, then enforce that
/// the output is never larger than the source.
///
/// Holds no state between calls; one instance can serve concurrent requests.
pub struct ImagePipeline<B: CodecBackend = ImageCodec> {
    backend: B,
}

impl ImagePipeline<ImageCodec> {
    pub fn new() -> Self {
        Self {
            backend: ImageCodec::new(),
        }
    }
}

impl Default for ImagePipeline<ImageCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CodecBackend> ImagePipeline<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn compress(&self, request: &CompressionRequest) -> Result<CompressionResult> {
        let input = request.input_path.as_path();
        let output = request.output_path.as_path();

        if !input.is_file() {
            return Err(CompressError::NotFound(input.to_path_buf()));
        }
        request.validate()?;

        let original_bytes = self.backend.file_byte_size(input)?;
        // Encoding in place destroys the source, so keep its bytes for the copy fallback.
        let source_snapshot = if is_same_file(input, output) {
            log::debug!("Compressing {} in place", input.display());
            Some(self.backend.read_file(input)?)
        } else {
            None
        };
        let raster = self.backend.decode(input)?;
        let original_resolution = Resolution::new(raster.width(), raster.height());

        let raster = if request.resize_ratio < 1.0 {
            let target = original_resolution.scaled(request.resize_ratio);
            if target.width == 0 || target.height == 0 {
                return Err(CompressError::ProcessingFailed(format!(
                    "Resize ratio {} reduces {} to nothing",
                    request.resize_ratio, original_resolution
                )));
            }
            log::debug!("Resizing {} -> {}", original_resolution, target);
            self.backend.resample(&raster, target.width, target.height)?
        } else {
            raster
        };
        let final_resolution = Resolution::new(raster.width(), raster.height());

        let params = EncodeParams::select(request.format, request.quality);
        log::debug!("Primary encode of {} with {:?}", input.display(), params);

        // Quantization is destructive; `raster` stays untouched for the retry tier.
        match params.palette_colors() {
            Some(colors) => {
                let quantized = self.backend.quantize(&raster, colors)?;
                self.backend.encode(&quantized, &params, output)?;
            }
            None => {
                self.backend.encode(&raster, &params, output)?;
            }
        }

        let source = match &source_snapshot {
            Some(bytes) => Source::Snapshot(bytes),
            None => Source::File(input),
        };
        let compressed_bytes =
            self.enforce_size_guarantee(&raster, request.format, source, output, original_bytes)?;

        Ok(CompressionResult::new(
            original_bytes,
            compressed_bytes,
            original_resolution,
            final_resolution,
            output.to_path_buf(),
        ))
    }

    /// Returns the final byte size of `output`, which is never above
    /// `original_bytes`.
    fn enforce_size_guarantee(
        &self,
        pristine: &DynamicImage,
        format: OutputFormat,
        source: Source<'_>,
        output: &Path,
        original_bytes: u64,
    ) -> Result<u64> {
        let written = self.backend.file_byte_size(output)?;
        if written <= original_bytes {
            return Ok(written);
        }
        log::debug!(
            "{} output grew to {} bytes (source {} bytes)",
            format,
            written,
            original_bytes
        );

        if let Some(retry) = EncodeParams::retry(format) {
            self.backend.encode(pristine, &retry, output)?;
            let written = self.backend.file_byte_size(output)?;
            if written <= original_bytes {
                log::debug!("Retry with {:?} fits in {} bytes", retry, written);
                return Ok(written);
            }
            log::debug!("Retry still {} bytes, keeping the source bytes", written);
        }

        match source {
            Source::File(input) => self.backend.copy_file(input, output)?,
            Source::Snapshot(bytes) => self.backend.write_file(output, bytes)?,
        };
        Ok(original_bytes)
    }
}

/// Compress one image with the default codec backend.
///
/// `format` is matched case-insensitively against JPEG/JPG, PNG and WEBP.
/// Checks run in order: input existence, format, quality range.
pub fn compress_image(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    quality: u32,
    format: &str,
    resize_ratio: f64,
) -> Result<CompressionResult> {
    let input_path = input_path.as_ref();
    if !input_path.is_file() {
        return Err(CompressError::NotFound(input_path.to_path_buf()));
    }
    let format: OutputFormat = format.parse()?;
    let quality = Quality::try_new(quality)?;

    let request = CompressionRequest::new(
        input_path,
        output_path.as_ref(),
        quality,
        format,
        resize_ratio,
    );
    ImagePipeline::new().compress(&request)
}

/// Where the copy fallback takes the original bytes from.
#[derive(Clone, Copy)]
enum Source<'a> {
    File(&'a Path),
    Snapshot(&'a [u8]),
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::{ChromaSubsampling, JpegParams, PngParams, WebpParams};
    use crate::processors::backend::tests::{MockBackend, RecordedOp};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SOURCE_BYTES: u64 = 1000;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("source.img");
        std::fs::write(&input, vec![7u8; SOURCE_BYTES as usize]).unwrap();
        let output = tmp.path().join("out.img");
        (tmp, input, output)
    }

    fn request(input: &Path, output: &Path, quality: u8, format: OutputFormat, ratio: f64) -> CompressionRequest {
        CompressionRequest::new(input, output, Quality::new(quality), format, ratio)
    }

    fn copies(backend: &MockBackend) -> usize {
        backend
            .get_operations()
            .iter()
            .filter(|op| matches!(op, RecordedOp::Copy { .. }))
            .count()
    }

    #[test]
    fn smaller_primary_output_stands() {
        let (_tmp, input, output) = setup();
        let pipeline = ImagePipeline::with_backend(MockBackend::new(40, 30).with_encode_sizes(&[400]));

        let result = pipeline
            .compress(&request(&input, &output, 85, OutputFormat::Jpeg, 1.0))
            .unwrap();

        assert_eq!(result.compressed_bytes, 400);
        assert_eq!(result.compression_ratio, 60.0);
        assert_eq!(result.output_path, output);
        assert_eq!(pipeline.backend().encodes().len(), 1);
        assert_eq!(copies(pipeline.backend()), 0);
    }

    #[test]
    fn equal_size_primary_output_stands() {
        let (_tmp, input, output) = setup();
        let pipeline =
            ImagePipeline::with_backend(MockBackend::new(8, 8).with_encode_sizes(&[SOURCE_BYTES]));

        let result = pipeline
            .compress(&request(&input, &output, 85, OutputFormat::Png, 1.0))
            .unwrap();

        assert_eq!(result.compressed_bytes, SOURCE_BYTES);
        assert_eq!(result.compression_ratio, 0.0);
        assert_eq!(copies(pipeline.backend()), 0);
    }

    #[test]
    fn jpeg_retry_recovers_oversized_output() {
        let (_tmp, input, output) = setup();
        let pipeline =
            ImagePipeline::with_backend(MockBackend::new(40, 30).with_encode_sizes(&[1500, 900]));

        let result = pipeline
            .compress(&request(&input, &output, 97, OutputFormat::Jpeg, 1.0))
            .unwrap();

        assert_eq!(result.compressed_bytes, 900);
        let encodes = pipeline.backend().encodes();
        assert_eq!(encodes.len(), 2);
        assert_eq!(
            encodes[0],
            EncodeParams::Jpeg(JpegParams {
                quality: 97,
                progressive: true,
                optimize_coding: true,
                subsampling: ChromaSubsampling::Full,
            })
        );
        assert_eq!(encodes[1], EncodeParams::retry(OutputFormat::Jpeg).unwrap());
        assert_eq!(copies(pipeline.backend()), 0);
    }

    #[test]
    fn jpeg_falls_back_to_source_bytes() {
        let (_tmp, input, output) = setup();
        let pipeline =
            ImagePipeline::with_backend(MockBackend::new(40, 30).with_encode_sizes(&[1500, 1200]));

        let result = pipeline
            .compress(&request(&input, &output, 85, OutputFormat::Jpeg, 1.0))
            .unwrap();

        assert_eq!(result.compressed_bytes, SOURCE_BYTES);
        assert_eq!(result.compressed_size_mb, result.original_size_mb);
        assert_eq!(result.compression_ratio, 0.0);
        assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());
        assert_eq!(pipeline.backend().encodes().len(), 2);
        assert_eq!(copies(pipeline.backend()), 1);
    }

    #[test]
    fn webp_two_tier_fallback() {
        let (_tmp, input, output) = setup();
        let pipeline =
            ImagePipeline::with_backend(MockBackend::new(40, 30).with_encode_sizes(&[2000, 1001]));

        let result = pipeline
            .compress(&request(&input, &output, 90, OutputFormat::WebP, 1.0))
            .unwrap();

        let encodes = pipeline.backend().encodes();
        assert_eq!(
            encodes,
            vec![
                EncodeParams::WebP(WebpParams { quality: 90, method: 6 }),
                EncodeParams::WebP(WebpParams { quality: 75, method: 6 }),
            ]
        );
        assert_eq!(result.compressed_bytes, SOURCE_BYTES);
        assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());
    }

    #[test]
    fn png_skips_retry_and_copies() {
        let (_tmp, input, output) = setup();
        let pipeline =
            ImagePipeline::with_backend(MockBackend::new(40, 30).with_encode_sizes(&[5000]));

        let result = pipeline
            .compress(&request(&input, &output, 100, OutputFormat::Png, 1.0))
            .unwrap();

        assert_eq!(pipeline.backend().encodes().len(), 1);
        assert_eq!(copies(pipeline.backend()), 1);
        assert_eq!(result.compression_ratio, 0.0);
        assert_eq!(std::fs::metadata(&output).unwrap().len(), SOURCE_BYTES);
    }

    #[test]
    fn png_full_quality_never_quantizes() {
        let (_tmp, input, output) = setup();
        let pipeline = ImagePipeline::with_backend(MockBackend::new(40, 30));

        pipeline
            .compress(&request(&input, &output, 100, OutputFormat::Png, 1.0))
            .unwrap();

        assert!(!pipeline
            .backend()
            .get_operations()
            .iter()
            .any(|op| matches!(op, RecordedOp::Quantize { .. })));
        assert_eq!(
            pipeline.backend().encodes(),
            vec![EncodeParams::Png(PngParams {
                palette_colors: None,
            })]
        );
    }

    #[test]
    fn png_below_full_quality_quantizes_before_encode() {
        let (_tmp, input, output) = setup();
        let pipeline = ImagePipeline::with_backend(MockBackend::new(40, 30));

        pipeline
            .compress(&request(&input, &output, 50, OutputFormat::Png, 1.0))
            .unwrap();

        let ops = pipeline.backend().get_operations();
        let quantize_at = ops
            .iter()
            .position(|op| *op == RecordedOp::Quantize { colors: 128 })
            .expect("quantize recorded");
        let encode_at = ops
            .iter()
            .position(|op| matches!(op, RecordedOp::Encode { .. }))
            .expect("encode recorded");
        assert!(quantize_at < encode_at);
    }

    #[test]
    fn downscale_floors_dimensions() {
        let (_tmp, input, output) = setup();
        let pipeline = ImagePipeline::with_backend(MockBackend::new(333, 101));

        let result = pipeline
            .compress(&request(&input, &output, 85, OutputFormat::Jpeg, 0.3))
            .unwrap();

        assert_eq!(result.original_resolution, Resolution::new(333, 101));
        assert_eq!(result.final_resolution, Resolution::new(99, 30));
        assert!(pipeline
            .backend()
            .get_operations()
            .contains(&RecordedOp::Resample { width: 99, height: 30 }));
    }

    #[test]
    fn ratio_at_or_above_one_never_resamples() {
        for ratio in [1.0, 1.5, 3.0] {
            let (_tmp, input, output) = setup();
            let pipeline = ImagePipeline::with_backend(MockBackend::new(64, 48));

            let result = pipeline
                .compress(&request(&input, &output, 85, OutputFormat::WebP, ratio))
                .unwrap();

            assert_eq!(result.final_resolution, result.original_resolution);
            assert!(!pipeline
                .backend()
                .get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::Resample { .. })));
        }
    }

    #[test]
    fn missing_input_fails_before_any_codec_call() {
        let tmp = TempDir::new().unwrap();
        let pipeline = ImagePipeline::with_backend(MockBackend::new(4, 4));

        let err = pipeline
            .compress(&request(
                &tmp.path().join("missing.jpg"),
                &tmp.path().join("out.jpg"),
                85,
                OutputFormat::Jpeg,
                1.0,
            ))
            .unwrap_err();

        assert!(matches!(err, CompressError::NotFound(_)));
        assert!(pipeline.backend().get_operations().is_empty());
    }

    #[test]
    fn decode_failure_is_processing_failed() {
        let (_tmp, input, output) = setup();
        let pipeline = ImagePipeline::with_backend(MockBackend::new(4, 4).failing_decode());

        let err = pipeline
            .compress(&request(&input, &output, 85, OutputFormat::Jpeg, 1.0))
            .unwrap_err();

        match err {
            CompressError::ProcessingFailed(cause) => assert!(cause.contains("corrupt image data")),
            other => panic!("expected ProcessingFailed, got {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn ratio_collapsing_an_edge_is_processing_failure() {
        let (_tmp, input, output) = setup();
        let pipeline = ImagePipeline::with_backend(MockBackend::new(100, 3));

        let err = pipeline
            .compress(&request(&input, &output, 85, OutputFormat::Jpeg, 0.2))
            .unwrap_err();

        assert!(matches!(err, CompressError::ProcessingFailed(_)));
        assert!(pipeline.backend().encodes().is_empty());
        assert!(!output.exists());
    }

    #[test]
    fn in_place_output_keeps_smaller_encode() {
        let (_tmp, input, _output) = setup();
        let pipeline =
            ImagePipeline::with_backend(MockBackend::new(4, 4).with_encode_sizes(&[400]));

        let result = pipeline
            .compress(&request(&input, &input, 85, OutputFormat::Jpeg, 1.0))
            .unwrap();

        assert_eq!(result.compressed_bytes, 400);
        assert_eq!(result.output_path, input);
        assert_eq!(std::fs::metadata(&input).unwrap().len(), 400);
    }

    #[test]
    fn in_place_fallback_restores_source_bytes() {
        let (_tmp, input, _output) = setup();
        let pipeline =
            ImagePipeline::with_backend(MockBackend::new(4, 4).with_encode_sizes(&[1500, 1200]));

        let result = pipeline
            .compress(&request(&input, &input, 85, OutputFormat::Jpeg, 1.0))
            .unwrap();

        assert_eq!(result.compressed_bytes, SOURCE_BYTES);
        assert_eq!(std::fs::read(&input).unwrap(), vec![7u8; SOURCE_BYTES as usize]);
        let ops = pipeline.backend().get_operations();
        assert_eq!(copies(pipeline.backend()), 0);
        assert!(ops.contains(&RecordedOp::Write {
            dst: input.to_string_lossy().to_string(),
            bytes: SOURCE_BYTES,
        }));
    }

    #[test]
    fn compress_image_rejects_gif_without_writing() {
        let (_tmp, input, output) = setup();

        let err = compress_image(&input, &output, 85, "GIF", 1.0).unwrap_err();

        assert!(matches!(err, CompressError::UnsupportedFormat(ref f) if f == "GIF"));
        assert!(!output.exists());
    }

    #[test]
    fn compress_image_checks_existence_before_format() {
        let tmp = TempDir::new().unwrap();
        let err = compress_image(tmp.path().join("nope.png"), tmp.path().join("o.gif"), 85, "GIF", 1.0)
            .unwrap_err();
        assert!(matches!(err, CompressError::NotFound(_)));
    }

    #[test]
    fn compress_image_rejects_out_of_range_quality() {
        let (_tmp, input, output) = setup();
        let err = compress_image(&input, &output, 0, "JPEG", 1.0).unwrap_err();
        assert!(matches!(err, CompressError::InvalidParameter(_)));
        let err = compress_image(&input, &output, 101, "JPEG", 1.0).unwrap_err();
        assert!(matches!(err, CompressError::InvalidParameter(_)));
    }
}
