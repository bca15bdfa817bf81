// imgpress/src/cli.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imgpress")]
#[command(about = "Re-encode images to JPEG, PNG or WebP without ever growing the file")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compress a single image
    Compress {
        /// Input image
        input: PathBuf,

        /// Output file (defaults to <name>_compressed.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Quality (1-100)
        #[arg(short, long, default_value_t = 85)]
        quality: u32,

        /// Resize to this percentage of the original dimensions
        #[arg(short, long, default_value_t = 100.0)]
        resize: f64,

        /// Output format: jpeg, png or webp (inferred from the output extension when omitted)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Compress every image in a directory
    Batch {
        /// Input directory
        input: PathBuf,

        /// Output directory
        output: PathBuf,

        /// Quality (1-100)
        #[arg(short, long, default_value_t = 85)]
        quality: u32,

        /// Resize to this percentage of the original dimensions
        #[arg(short, long, default_value_t = 100.0)]
        resize: f64,

        /// Output format: jpeg, png or webp
        #[arg(short, long, default_value = "jpeg")]
        format: String,

        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,

        /// Descend into subdirectories
        #[arg(short = 'R', long)]
        recursive: bool,
    },
}
