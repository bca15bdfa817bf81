// imgpress/src/lib.rs
//! Size-guaranteed image re-encoding.
//!
//! [`compress_image`] converts one file to JPEG, PNG or WebP with an optional
//! downscale, and never leaves an output larger than its source: an encode
//! that grows is retried under a cheaper parameter set, and if that still
//! grows the source bytes are copied through unchanged.

mod cli;
mod core;
mod processors;
mod utils;
mod worker;

pub use crate::cli::{Cli, Commands};
pub use crate::core::pipeline::{compress_image, ImagePipeline};
pub use crate::core::policy;
pub use crate::core::{
    bytes_to_mb, savings_percent, CompressError, CompressionRequest, CompressionResult,
    OutputFormat, Quality, Resolution, Result,
};
pub use crate::processors::{
    BackendError, BatchProcessor, BatchReport, CodecBackend, Compressor, ImageCodec, Loader,
    Quantizer, Resizer,
};
pub use crate::utils::{
    format_file_size, generate_output_path, infer_output_format, is_supported_input,
};
pub use crate::worker::CompressionWorker;

pub mod prelude {
    pub use crate::{
        compress_image, BatchProcessor, CompressionRequest, CompressionResult, CompressionWorker,
        ImagePipeline, OutputFormat, Quality,
    };
}

pub use image::DynamicImage;
