// imgpress/src/processors/batch.rs
use crate::core::pipeline::ImagePipeline;
use crate::core::{
    savings_percent, CompressError, CompressionRequest, CompressionResult, OutputFormat, Quality,
    Result,
};
use crate::utils::is_supported_input;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Aggregate outcome of a directory run. Per-file failures do not abort the
/// batch; they are collected in `errors`.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<CompressionResult>,
    pub errors: Vec<(PathBuf, String)>,
    pub total_before: u64,
    pub total_after: u64,
}

impl BatchReport {
    pub fn processed_count(&self) -> usize {
        self.results.len()
    }

    pub fn savings(&self) -> f64 {
        savings_percent(self.total_before, self.total_after)
    }
}

pub struct BatchProcessor {
    pipeline: ImagePipeline,
    quality: Quality,
    format: OutputFormat,
    resize_ratio: f64,
    show_progress: bool,
    thread_pool: Option<rayon::ThreadPool>,
}

impl BatchProcessor {
    /// `max_threads == 0` uses rayon's global pool.
    pub fn new(
        quality: Quality,
        format: OutputFormat,
        resize_ratio: f64,
        max_threads: usize,
    ) -> Result<Self> {
        let thread_pool = if max_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(max_threads)
                .build()
                .map_err(|e| {
                    CompressError::ProcessingFailed(format!("Failed to create thread pool: {}", e))
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            pipeline: ImagePipeline::new(),
            quality,
            format,
            resize_ratio,
            show_progress: true,
            thread_pool,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        recursive: bool,
    ) -> Result<BatchReport> {
        self.validate_paths(input_dir, output_dir)?;

        let image_paths = self.collect_image_paths(input_dir, recursive);

        if image_paths.is_empty() {
            log::warn!("No image files found in {}", input_dir.display());
            return Ok(BatchReport::default());
        }

        log::info!(
            "Compressing {} images from {} to {}",
            image_paths.len(),
            input_dir.display(),
            self.format
        );

        std::fs::create_dir_all(output_dir).map_err(|e| {
            CompressError::ProcessingFailed(format!(
                "Failed to create {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        let jobs = self.plan_outputs(&image_paths, input_dir, output_dir);
        let pb = self.create_progress_bar(jobs.len());

        let run = || -> Vec<(PathBuf, Result<CompressionResult>)> {
            jobs.par_iter()
                .progress_with(pb.clone())
                .map(|(input_path, output_path)| {
                    let result = match output_path {
                        Ok(output_path) => self.process_single_image(input_path, output_path),
                        Err(e) => Err(CompressError::ProcessingFailed(e.clone())),
                    };
                    (input_path.clone(), result)
                })
                .collect()
        };

        let outcomes = match &self.thread_pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let mut report = BatchReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    report.total_before += result.original_bytes;
                    report.total_after += result.compressed_bytes;
                    report.results.push(result);
                }
                Err(e) => {
                    log::warn!("Failed to compress {}: {}", path.display(), e);
                    report.errors.push((path, e.to_string()));
                }
            }
        }

        pb.finish_with_message(format!(
            "Compressed {} images ({:.1}% size reduction)",
            report.processed_count(),
            report.savings()
        ));

        Ok(report)
    }

    fn process_single_image(&self, input_path: &Path, output_path: &Path) -> Result<CompressionResult> {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CompressError::ProcessingFailed(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let request = CompressionRequest::new(
            input_path,
            output_path,
            self.quality,
            self.format,
            self.resize_ratio,
        );
        self.pipeline.compress(&request)
    }

    /// Assigns every input a distinct output path before any work starts.
    /// Inputs sharing a stem (`a.png`, `a.bmp`) would land on the same file,
    /// so later ones get a numeric suffix: `a.jpg`, `a_1.jpg`, ...
    fn plan_outputs(
        &self,
        image_paths: &[PathBuf],
        input_dir: &Path,
        output_dir: &Path,
    ) -> Vec<(PathBuf, std::result::Result<PathBuf, String>)> {
        let mut claimed = HashSet::new();
        image_paths
            .iter()
            .map(|input_path| {
                let output = self
                    .output_path_for(input_path, input_dir, output_dir, 0)
                    .map(|first| {
                        let mut candidate = first;
                        let mut suffix = 0;
                        while claimed.contains(&candidate) {
                            suffix += 1;
                            if let Some(next) =
                                self.output_path_for(input_path, input_dir, output_dir, suffix)
                            {
                                candidate = next;
                            }
                        }
                        if suffix > 0 {
                            log::warn!(
                                "{} shares its name with another input, writing {}",
                                input_path.display(),
                                candidate.display()
                            );
                        }
                        claimed.insert(candidate.clone());
                        candidate
                    })
                    .ok_or_else(|| format!("Invalid file name: {}", input_path.display()));
                (input_path.clone(), output)
            })
            .collect()
    }

    /// Mirrors the input's position under `input_dir` and swaps the extension
    /// for the target format's. A non-zero `suffix` is appended to the stem.
    fn output_path_for(
        &self,
        input_path: &Path,
        input_dir: &Path,
        output_dir: &Path,
        suffix: usize,
    ) -> Option<PathBuf> {
        let stem = input_path.file_stem()?;

        let relative_parent = input_path
            .parent()
            .and_then(|parent| parent.strip_prefix(input_dir).ok())
            .unwrap_or_else(|| Path::new(""));

        let mut file_name = stem.to_os_string();
        if suffix > 0 {
            file_name.push(format!("_{}", suffix));
        }
        file_name.push(".");
        file_name.push(self.format.extension());
        Some(output_dir.join(relative_parent).join(file_name))
    }

    fn collect_image_paths(&self, input_dir: &Path, recursive: bool) -> Vec<PathBuf> {
        let walker = if recursive {
            WalkDir::new(input_dir)
        } else {
            WalkDir::new(input_dir).max_depth(1)
        };

        let mut paths: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_supported_input(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();
        paths
    }

    fn create_progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    pub fn validate_paths(&self, input_dir: &Path, output_dir: &Path) -> Result<()> {
        if !input_dir.exists() {
            return Err(CompressError::NotFound(input_dir.to_path_buf()));
        }

        if !input_dir.is_dir() {
            return Err(CompressError::InvalidParameter(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }

        if output_dir.exists() && !output_dir.is_dir() {
            return Err(CompressError::InvalidParameter(format!(
                "Output path exists but is not a directory: {}",
                output_dir.display()
            )));
        }

        let same_dir = match (input_dir.canonicalize(), output_dir.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => input_dir == output_dir,
        };
        if same_dir {
            return Err(CompressError::InvalidParameter(
                "Input and output directories cannot be the same".to_string(),
            ));
        }

        Ok(())
    }
}
