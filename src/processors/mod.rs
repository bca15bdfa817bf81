// imgpress/src/processors/mod.rs
pub mod backend;
mod batch;
mod codec;
mod compressor;
mod loader;
mod quantizer;
mod resizer;

pub use backend::{BackendError, CodecBackend};
pub use batch::{BatchProcessor, BatchReport};
pub use codec::ImageCodec;
pub use compressor::Compressor;
pub use loader::Loader;
pub use quantizer::Quantizer;
pub use resizer::Resizer;

