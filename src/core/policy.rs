// imgpress/src/core/policy.rs
//! Per-format encoder parameter selection.
//!
//! | Format | Always | Quality-dependent |
//! |---|---|---|
//! | JPEG | progressive, optimized Huffman coding, alpha/palette flattened to RGB, grayscale kept single-channel | 4:4:4 at quality >= 95, else 4:2:0 |
//! | WEBP | method 6 | quality passed through |
//! | PNG | lossless, oxipng optimization | palette of `max(2, 256 * q / 100)` colours when q < 100 |
//!
//! The retry tier used when the primary encode grows the file is also
//! decided here, so the pipeline never matches on formats itself.

use super::{OutputFormat, Quality};

/// Quality at or above which JPEG keeps full-resolution chroma.
pub const JPEG_FULL_CHROMA_THRESHOLD: u8 = 95;
/// Fixed quality of the JPEG retry encode, independent of the request.
pub const JPEG_RETRY_QUALITY: u8 = 85;
/// Most exhaustive libwebp method tier.
pub const WEBP_METHOD: i32 = 6;
/// Fixed quality of the WebP retry encode, independent of the request.
pub const WEBP_RETRY_QUALITY: u8 = 75;
pub const PNG_MIN_COLORS: u16 = 2;
pub const PNG_MAX_COLORS: u16 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSubsampling {
    /// 4:4:4, no subsampling.
    Full,
    /// 4:2:0, chroma halved in both directions.
    Quarter,
}

impl ChromaSubsampling {
    /// Cb/Cr pixel block sizes as expected by libjpeg.
    pub fn pixel_sizes(self) -> (u8, u8) {
        match self {
            ChromaSubsampling::Full => (1, 1),
            ChromaSubsampling::Quarter => (2, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegParams {
    pub quality: u8,
    pub progressive: bool,
    pub optimize_coding: bool,
    pub subsampling: ChromaSubsampling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebpParams {
    pub quality: u8,
    pub method: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngParams {
    /// Palette size to quantize to before encoding; `None` keeps every colour.
    pub palette_colors: Option<u16>,
}

/// Everything the codec backend needs to encode one raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeParams {
    Jpeg(JpegParams),
    WebP(WebpParams),
    Png(PngParams),
}

impl EncodeParams {
    /// Parameters for the primary attempt.
    pub fn select(format: OutputFormat, quality: Quality) -> Self {
        let q = quality.value();
        match format {
            OutputFormat::Jpeg => EncodeParams::Jpeg(JpegParams {
                quality: q,
                progressive: true,
                optimize_coding: true,
                subsampling: if q >= JPEG_FULL_CHROMA_THRESHOLD {
                    ChromaSubsampling::Full
                } else {
                    ChromaSubsampling::Quarter
                },
            }),
            OutputFormat::WebP => EncodeParams::WebP(WebpParams {
                quality: q,
                method: WEBP_METHOD,
            }),
            OutputFormat::Png => EncodeParams::Png(PngParams {
                palette_colors: (quality < Quality::MAX).then(|| palette_size(quality)),
            }),
        }
    }

    /// Parameters for the single conservative retry, or `None` when the
    /// format goes straight to the raw-copy fallback.
    pub fn retry(format: OutputFormat) -> Option<Self> {
        match format {
            OutputFormat::Jpeg => Some(EncodeParams::Jpeg(JpegParams {
                quality: JPEG_RETRY_QUALITY,
                progressive: true,
                optimize_coding: true,
                subsampling: ChromaSubsampling::Quarter,
            })),
            OutputFormat::WebP => Some(EncodeParams::WebP(WebpParams {
                quality: WEBP_RETRY_QUALITY,
                method: WEBP_METHOD,
            })),
            OutputFormat::Png => None,
        }
    }

    /// Colour count for the destructive quantization step, if any.
    pub fn palette_colors(&self) -> Option<u16> {
        match self {
            EncodeParams::Png(png) => png.palette_colors,
            EncodeParams::Jpeg(_) | EncodeParams::WebP(_) => None,
        }
    }
}

/// `max(2, floor(256 * quality / 100))`
pub fn palette_size(quality: Quality) -> u16 {
    let colors = PNG_MAX_COLORS as u32 * quality.value() as u32 / 100;
    (colors as u16).clamp(PNG_MIN_COLORS, PNG_MAX_COLORS)
}
