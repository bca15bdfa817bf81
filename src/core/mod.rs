// imgpress/src/core/mod.rs
pub mod pipeline;
pub mod policy;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::processors::BackendError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Target encodings the pipeline knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    /// Lossy formats get a second, conservative encode before the raw-copy floor.
    pub fn is_lossy(self) -> bool {
        match self {
            OutputFormat::Jpeg | OutputFormat::WebP => true,
            OutputFormat::Png => false,
        }
    }

    /// Infer the format from a file extension. `jpg` and `jpeg` are both JPEG.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                CompressError::UnsupportedFormat(format!(
                    "no file extension on {}",
                    path.display()
                ))
            })?;
        ext.parse()
    }
}

impl FromStr for OutputFormat {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => Ok(OutputFormat::Jpeg),
            "PNG" => Ok(OutputFormat::Png),
            "WEBP" => Ok(OutputFormat::WebP),
            _ => Err(CompressError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::WebP => "WEBP",
        };
        f.write_str(name)
    }
}

/// Encoding quality in the range 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: Quality = Quality(100);

    /// Clamps into range.
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Rejects values outside 1..=100.
    pub fn try_new(value: u32) -> Result<Self> {
        if (1..=100).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(CompressError::InvalidParameter(format!(
                "Quality must be between 1 and 100, got {}",
                value
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Floors both edges by `ratio`. Ratios at or above 1.0 never upscale.
    pub fn scaled(self, ratio: f64) -> Self {
        if ratio >= 1.0 {
            return self;
        }
        Self {
            width: (self.width as f64 * ratio).floor() as u32,
            height: (self.height as f64 * ratio).floor() as u32,
        }
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub quality: Quality,
    pub format: OutputFormat,
    pub resize_ratio: f64,
}

impl Default for CompressionRequest {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_path: PathBuf::new(),
            quality: Quality::default(),
            format: OutputFormat::Jpeg,
            resize_ratio: 1.0,
        }
    }
}

impl CompressionRequest {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        quality: Quality,
        format: OutputFormat,
        resize_ratio: f64,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            quality,
            format,
            resize_ratio,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.resize_ratio.is_finite() || self.resize_ratio <= 0.0 {
            return Err(CompressError::InvalidParameter(format!(
                "Resize ratio must be a positive number, got {}",
                self.resize_ratio
            )));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(CompressError::InvalidParameter(
                "Output path is empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Outcome of one successful pipeline call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub original_size_mb: f64,
    pub compressed_size_mb: f64,
    pub compression_ratio: f64,
    pub original_resolution: Resolution,
    pub final_resolution: Resolution,
    pub output_path: PathBuf,
}

impl CompressionResult {
    pub fn new(
        original_bytes: u64,
        compressed_bytes: u64,
        original_resolution: Resolution,
        final_resolution: Resolution,
        output_path: PathBuf,
    ) -> Self {
        Self {
            original_bytes,
            compressed_bytes,
            original_size_mb: bytes_to_mb(original_bytes),
            compressed_size_mb: bytes_to_mb(compressed_bytes),
            compression_ratio: savings_percent(original_bytes, compressed_bytes),
            original_resolution,
            final_resolution,
            output_path,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{:.2}MB -> {:.2}MB (-{:.1}%)",
            self.original_size_mb, self.compressed_size_mb, self.compression_ratio
        )
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

pub fn savings_percent(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - compressed as f64) / original as f64 * 100.0
}

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl From<BackendError> for CompressError {
    fn from(err: BackendError) -> Self {
        CompressError::ProcessingFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;
