//! Zip packaging of a processed batch
//!
//! Layout: one directory per group, each holding that group's files by
//! final name.

use crate::batch::ProcessedBatch;
use crate::error::Result;
use crate::normalize::NormalizedFile;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const FOLDERS_ARCHIVE: &str = "processed_folders.zip";
pub const FILES_ARCHIVE: &str = "processed_files.zip";

/// Default output name: the single-folder variant gets its own name.
pub fn archive_name(group_count: usize) -> &'static str {
    if group_count == 1 {
        FILES_ARCHIVE
    } else {
        FOLDERS_ARCHIVE
    }
}

pub fn write_archive<W: Write + Seek>(batch: &ProcessedBatch, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);

    for group in &batch.groups {
        zip.add_directory(format!("{}/", group.name), SimpleFileOptions::default())?;

        let mut used = HashSet::new();
        for file in &group.files {
            let name = unique_name(&file.name, &mut used);
            zip.start_file(format!("{}/{}", group.name, name), entry_options(file))?;
            zip.write_all(&file.data)?;
        }
    }

    Ok(zip.finish()?)
}

/// Write the archive to disk, returning its size in bytes.
pub fn write_archive_to_path(batch: &ProcessedBatch, path: &Path) -> Result<u64> {
    let file = File::create(path)?;
    let mut writer = write_archive(batch, BufWriter::new(file))?;
    writer.flush()?;
    Ok(path.metadata()?.len())
}

fn entry_options(file: &NormalizedFile) -> SimpleFileOptions {
    // Image payloads are already compressed
    let method = if file.media_type.is_image() {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    };
    SimpleFileOptions::default().compression_method(method)
}

/// Files from nested folders are flattened, so names can collide.
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1;
    loop {
        let candidate = match &ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
