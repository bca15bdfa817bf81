// imgpress/src/utils/mod.rs
use crate::core::{OutputFormat, Result};
use std::path::{Path, PathBuf};

/// Extensions the decoder is expected to handle as batch inputs.
pub const SUPPORTED_INPUT_EXTENSIONS: [&str; 8] =
    ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

/// Use `output` when given, otherwise `<stem>_compressed.<ext>` next to the
/// input, with the extension following `format`.
pub fn generate_output_path(
    input_path: &Path,
    output: Option<&Path>,
    format: OutputFormat,
) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => {
            let stem = input_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");

            input_path.with_file_name(format!("{}_compressed.{}", stem, format.extension()))
        }
    }
}

/// Pick the target format: an explicit name wins, then the output path's
/// extension, then the input's own extension (so a PNG stays PNG), and JPEG
/// when none of them names a supported format.
pub fn infer_output_format(
    format: Option<&str>,
    output: Option<&Path>,
    input: &Path,
) -> Result<OutputFormat> {
    match (format, output) {
        (Some(name), _) => name.parse(),
        (None, Some(path)) => OutputFormat::from_path(path),
        (None, None) => Ok(OutputFormat::from_path(input).unwrap_or(OutputFormat::Jpeg)),
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base = 1024_f64;
    let bytes_f64 = bytes as f64;
    let exponent = ((bytes_f64.ln() / base.ln()).floor() as usize).min(UNITS.len() - 1);
    let size = bytes_f64 / base.powi(exponent as i32);

    format!("{:.2} {}", size, UNITS[exponent])
}

pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_INPUT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
