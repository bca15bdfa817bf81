// imgpress/src/processors/backend.rs
//! Codec backend trait.
//!
//! The pipeline depends on decode, resample, quantize and encode, plus the
//! raw file operations behind the size guarantee (measure, copy, read,
//! write). [`CodecBackend`] names them so the size-guarantee logic can be
//! driven by a recording mock in tests. The production implementation is [`ImageCodec`](super::ImageCodec).

use crate::core::policy::EncodeParams;
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    ProcessingFailed(String),
}

pub trait CodecBackend: Sync {
    /// Decode an image file into an owned raster.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Resample to exactly `width` x `height` with a high-quality filter.
    fn resample(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, BackendError>;

    /// Reduce the raster to at most `colors` distinct colours.
    fn quantize(&self, image: &DynamicImage, colors: u16) -> Result<DynamicImage, BackendError>;

    /// Encode `image` under `params` and write it to `output`, replacing any
    /// existing file. Returns the number of bytes written.
    fn encode(
        &self,
        image: &DynamicImage,
        params: &EncodeParams,
        output: &Path,
    ) -> Result<u64, BackendError>;

    fn file_byte_size(&self, path: &Path) -> Result<u64, BackendError> {
        Ok(std::fs::metadata(path)?.len())
    }

    /// Copy `src` byte-for-byte over `dst`. Returns the number of bytes copied.
    fn copy_file(&self, src: &Path, dst: &Path) -> Result<u64, BackendError> {
        Ok(std::fs::copy(src, dst)?)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, BackendError> {
        Ok(std::fs::read(path)?)
    }

    /// Replace `dst` with `data`. Returns the number of bytes written.
    fn write_file(&self, dst: &Path, data: &[u8]) -> Result<u64, BackendError> {
        std::fs::write(dst, data)?;
        Ok(data.len() as u64)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::Mutex;

    /// Mock backend that records every call. Encodes write a file of the next
    /// queued size (or `default_encode_size`) so the pipeline can measure it.
    pub struct MockBackend {
        pub decoded: DynamicImage,
        pub encode_sizes: Mutex<Vec<u64>>,
        pub default_encode_size: u64,
        pub fail_decode: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode(String),
        Resample { width: u32, height: u32 },
        Quantize { colors: u16 },
        Encode { params: EncodeParams, output: String, bytes: u64 },
        Copy { src: String, dst: String },
        Write { dst: String, bytes: u64 },
    }

    impl MockBackend {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                decoded: DynamicImage::ImageRgb8(RgbImage::new(width, height)),
                encode_sizes: Mutex::new(Vec::new()),
                default_encode_size: 1,
                fail_decode: false,
                operations: Mutex::new(Vec::new()),
            }
        }

        /// Queue the byte counts the next encodes will produce, in order.
        pub fn with_encode_sizes(self, sizes: &[u64]) -> Self {
            let mut queued = sizes.to_vec();
            queued.reverse();
            Self {
                encode_sizes: Mutex::new(queued),
                ..self
            }
        }

        pub fn failing_decode(self) -> Self {
            Self {
                fail_decode: true,
                ..self
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encodes(&self) -> Vec<EncodeParams> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Encode { params, .. } => Some(params),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }
    }

    impl CodecBackend for MockBackend {
        fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
            self.record(RecordedOp::Decode(path.to_string_lossy().to_string()));
            if self.fail_decode {
                return Err(BackendError::ProcessingFailed(
                    "corrupt image data".to_string(),
                ));
            }
            Ok(self.decoded.clone())
        }

        fn resample(
            &self,
            _image: &DynamicImage,
            width: u32,
            height: u32,
        ) -> Result<DynamicImage, BackendError> {
            self.record(RecordedOp::Resample { width, height });
            Ok(DynamicImage::ImageRgb8(RgbImage::new(width, height)))
        }

        fn quantize(
            &self,
            image: &DynamicImage,
            colors: u16,
        ) -> Result<DynamicImage, BackendError> {
            self.record(RecordedOp::Quantize { colors });
            Ok(image.clone())
        }

        fn encode(
            &self,
            _image: &DynamicImage,
            params: &EncodeParams,
            output: &Path,
        ) -> Result<u64, BackendError> {
            let bytes = self
                .encode_sizes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(self.default_encode_size);
            std::fs::write(output, vec![0xAB; bytes as usize])?;
            self.record(RecordedOp::Encode {
                params: *params,
                output: output.to_string_lossy().to_string(),
                bytes,
            });
            Ok(bytes)
        }

        fn copy_file(&self, src: &Path, dst: &Path) -> Result<u64, BackendError> {
            self.record(RecordedOp::Copy {
                src: src.to_string_lossy().to_string(),
                dst: dst.to_string_lossy().to_string(),
            });
            Ok(std::fs::copy(src, dst)?)
        }

        fn write_file(&self, dst: &Path, data: &[u8]) -> Result<u64, BackendError> {
            self.record(RecordedOp::Write {
                dst: dst.to_string_lossy().to_string(),
                bytes: data.len() as u64,
            });
            std::fs::write(dst, data)?;
            Ok(data.len() as u64)
        }
    }

    #[test]
    fn mock_encodes_queued_sizes_in_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out.bin");
        let backend = MockBackend::new(4, 4).with_encode_sizes(&[10, 20]);
        let image = backend.decode(Path::new("/in.png")).unwrap();
        let params = EncodeParams::select(
            crate::core::OutputFormat::WebP,
            crate::core::Quality::default(),
        );

        assert_eq!(backend.encode(&image, &params, &out).unwrap(), 10);
        assert_eq!(backend.file_byte_size(&out).unwrap(), 10);
        assert_eq!(backend.encode(&image, &params, &out).unwrap(), 20);
        assert_eq!(backend.encode(&image, &params, &out).unwrap(), 1);
        assert_eq!(backend.encodes().len(), 3);
    }

    #[test]
    fn mock_decode_failure() {
        let backend = MockBackend::new(4, 4).failing_decode();
        assert!(backend.decode(Path::new("/in.png")).is_err());
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Decode("/in.png".to_string())]
        );
    }
}
