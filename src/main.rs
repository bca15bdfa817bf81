// imgpress/src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use imgpress::{
    compress_image, format_file_size, generate_output_path, infer_output_format, BatchProcessor,
    Cli, Commands, OutputFormat, Quality,
};
use log::LevelFilter;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Compress {
            input,
            output,
            quality,
            resize,
            format,
        } => process_compress(&input, output, quality, resize, format.as_deref()),
        Commands::Batch {
            input,
            output,
            quality,
            resize,
            format,
            threads,
            recursive,
        } => process_batch(&input, &output, quality, resize, &format, threads, recursive),
    }
}

fn process_compress(
    input: &Path,
    output: Option<PathBuf>,
    quality: u32,
    resize_percent: f64,
    format: Option<&str>,
) -> Result<()> {
    let format = infer_output_format(format, output.as_deref(), input)
        .context("Cannot determine the output format")?;
    let output_path = generate_output_path(input, output.as_deref(), format);

    let result = compress_image(
        input,
        &output_path,
        quality,
        &format.to_string(),
        resize_percent / 100.0,
    )
    .with_context(|| format!("Failed to compress {}", input.display()))?;

    println!("{}", result.summary());
    println!(
        "{} -> {} ({})",
        result.original_resolution,
        result.final_resolution,
        output_path.display()
    );

    Ok(())
}

fn process_batch(
    input: &Path,
    output: &Path,
    quality: u32,
    resize_percent: f64,
    format: &str,
    threads: usize,
    recursive: bool,
) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    let quality = Quality::try_new(quality)?;

    let processor = BatchProcessor::new(quality, format, resize_percent / 100.0, threads)?;
    let report = processor
        .process_directory(input, output, recursive)
        .with_context(|| format!("Batch run over {} failed", input.display()))?;

    for (path, error) in &report.errors {
        eprintln!("  {}: {}", path.display(), error);
    }

    println!(
        "Compressed {} images to {}: {} -> {} (-{:.1}%), {} failed",
        report.processed_count(),
        output.display(),
        format_file_size(report.total_before),
        format_file_size(report.total_after),
        report.savings(),
        report.errors.len()
    );

    Ok(())
}
