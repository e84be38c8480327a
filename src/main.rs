//! Folder image packer: convert, compress and zip selected folders

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ProcessArgs};
use image_folder_packer::archive::{archive_name, write_archive_to_path};
use image_folder_packer::batch::{format_size, process_in_background, ProgressEvent};
use image_folder_packer::{BatchDriver, Normalizer, RasterCodec, Selection, Session};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Process(args) => process(args).await,
        Commands::List { inputs, exclude } => list(&inputs, &exclude),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn process(args: ProcessArgs) -> Result<()> {
    let settings = args.settings().context("failed to load settings")?;

    let mut selection = Selection::read(&args.inputs).context("failed to read inputs")?;
    exclude_groups(&mut selection, &args.exclude);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(archive_name(selection.groups().len())));

    if !args.quiet {
        println!("Packing {} files from {} folders", selection.file_count(), selection.groups().len());
        println!("  Size budget: {}", format_size(settings.size_budget));
        println!("  Max dimension: {} px", settings.max_dimension);
        println!("  Transparent fill: {}", settings.background);
        println!();
    }

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(selection.file_count() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let driver = Arc::new(BatchDriver::new(Normalizer::new(
        RasterCodec::new(settings.background),
        settings,
    )));

    let pb_clone = pb.clone();
    let (session, batch) = process_in_background(driver, Session::new(selection), move |event| match event {
        ProgressEvent::GroupStarted { group, .. } => pb_clone.set_message(format!("{}/", group)),
        ProgressEvent::FileStarted { name, .. } => pb_clone.set_message(name.to_string()),
        ProgressEvent::FileFinished { .. } => pb_clone.inc(1),
    })
    .await?;
    pb.finish_with_message("Complete");

    if !args.quiet {
        println!();
        for entry in session.log().entries() {
            println!("  {}", entry);
        }
    }

    let original = batch.original_size();
    let packed = batch.final_size();
    let files = batch.file_count();
    let compressed = batch.compressed_count();
    let degraded: Vec<String> = batch
        .degraded()
        .map(|f| format!("{}/{}: {}", f.group, f.name, f.degradation.as_ref().map(|d| d.to_string()).unwrap_or_default()))
        .collect();

    let archive_path = output.clone();
    let archive_size = tokio::task::spawn_blocking(move || write_archive_to_path(&batch, &archive_path))
        .await?
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!();
    println!("Archive written: {}", output.display());
    println!("  Files: {} ({} compressed)", files, compressed);
    println!("  Original size: {}", format_size(original));
    println!("  Processed size: {}", format_size(packed));
    println!("  Archive size: {}", format_size(archive_size));
    if !degraded.is_empty() {
        println!("  Best-effort results ({}):", degraded.len());
        for line in &degraded {
            println!("    {}", line);
        }
    }

    if args.open {
        if let Err(e) = open::that(&output) {
            tracing::warn!("could not open {}: {}", output.display(), e);
        }
    }

    Ok(())
}

fn list(inputs: &[PathBuf], exclude: &[String]) -> Result<()> {
    let mut selection = Selection::read(inputs).context("failed to read inputs")?;
    exclude_groups(&mut selection, exclude);

    for group in selection.groups() {
        println!(
            "{} ({} files, {})",
            group.name,
            group.files.len(),
            format_size(group.total_size())
        );
        for file in &group.files {
            println!("  {} [{}] {}", file.name, file.media_type, format_size(file.size()));
        }
    }

    println!();
    println!("Default output: {}", archive_name(selection.groups().len()));
    Ok(())
}

fn exclude_groups(selection: &mut Selection, exclude: &[String]) {
    for name in exclude {
        if selection.remove_group(name).is_none() {
            tracing::warn!("no group named {:?} in the selection", name);
        }
    }
}
