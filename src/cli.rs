//! Command-line interface

use clap::{Args, Parser, Subcommand};
use image_folder_packer::config::{Background, Settings, KIB};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "image-folder-packer")]
#[command(about = "Convert, compress and zip folders of images", long_about = None)]
pub struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process folders and write a zip archive
    Process(ProcessArgs),

    /// Show how inputs would be grouped, without processing
    List {
        /// Folders or files (each folder becomes a group)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Leave a group out (can be specified multiple times)
        #[arg(long, value_name = "GROUP")]
        exclude: Vec<String>,
    },
}

#[derive(Args)]
pub struct ProcessArgs {
    /// Folders or files (each folder becomes a group)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output archive (default: processed_folders.zip, or processed_files.zip for one folder)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Leave a group out (can be specified multiple times)
    #[arg(long, value_name = "GROUP")]
    pub exclude: Vec<String>,

    /// TOML settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Size budget in KiB; smaller images are left alone
    #[arg(long)]
    pub budget_kb: Option<u64>,

    /// Longest side in pixels for compressed images
    #[arg(long)]
    pub max_dimension: Option<u32>,

    /// Fill for transparent pixels when writing JPEG (#rrggbb)
    #[arg(long)]
    pub background: Option<Background>,

    /// Don't show progress or the processing log
    #[arg(short, long)]
    pub quiet: bool,

    /// Open the archive when done
    #[arg(long)]
    pub open: bool,
}

impl ProcessArgs {
    /// Defaults, then the config file, then flags.
    pub fn settings(&self) -> image_folder_packer::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(kb) = self.budget_kb {
            settings.size_budget = kb * KIB;
        }
        if let Some(px) = self.max_dimension {
            settings.max_dimension = px;
        }
        if let Some(background) = self.background {
            settings.background = background;
        }

        Ok(settings)
    }
}
