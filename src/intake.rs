//! Reading the selection and grouping it by folder

use crate::error::{Error, Result};
use crate::media::MediaType;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Group name for files selected on their own, outside any folder.
pub const DEFAULT_GROUP: &str = "ungrouped";

/// A selected file, read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    /// Path relative to the selection, `/`-separated, starting with the
    /// selected folder's name.
    pub relative_path: Option<String>,
    pub media_type: MediaType,
    pub data: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            media_type: MediaType::from_name(&name),
            name,
            relative_path: None,
            data,
        }
    }

    pub fn with_relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// First segment of the relative path, if the file came from a folder.
    pub fn group_name(&self) -> &str {
        self.relative_path
            .as_deref()
            .and_then(|path| path.split_once('/'))
            .map(|(first, _)| first)
            .filter(|first| !first.is_empty())
            .unwrap_or(DEFAULT_GROUP)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub files: Vec<RawFile>,
}

impl Group {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(RawFile::size).sum()
    }
}

/// Partition files by group name, keeping first-seen group order and input
/// order inside each group.
pub fn group(files: impl IntoIterator<Item = RawFile>) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();

    for file in files {
        let name = file.group_name().to_string();
        match groups.iter_mut().find(|g| g.name == name) {
            Some(existing) => existing.files.push(file),
            None => groups.push(Group {
                name,
                files: vec![file],
            }),
        }
    }

    groups
}

/// The pending, grouped selection for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    groups: Vec<Group>,
}

impl Selection {
    pub fn from_files(files: impl IntoIterator<Item = RawFile>) -> Self {
        Self {
            groups: group(files),
        }
    }

    pub fn read(inputs: &[PathBuf]) -> Result<Self> {
        Ok(Self::from_files(read_selection(inputs)?))
    }

    /// Add more files; they join existing groups of the same name.
    pub fn extend(&mut self, files: impl IntoIterator<Item = RawFile>) {
        let existing = std::mem::take(&mut self.groups);
        let all = existing.into_iter().flat_map(|g| g.files).chain(files);
        self.groups = group(all);
    }

    /// Drop a whole group before processing. Returns it if it existed.
    pub fn remove_group(&mut self, name: &str) -> Option<Group> {
        let index = self.groups.iter().position(|g| g.name == name)?;
        Some(self.groups.remove(index))
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }

    pub fn into_groups(self) -> Vec<Group> {
        self.groups
    }
}

/// Read the selected inputs into memory.
///
/// Folders are walked recursively in file-name order and every file inside
/// is tagged `<folder>/<path inside folder>`. Plain files carry no path and
/// land in [`DEFAULT_GROUP`].
pub fn read_selection(inputs: &[PathBuf]) -> Result<Vec<RawFile>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            files.push(read_file(input, None)?);
        } else if input.is_dir() {
            read_folder(input, &mut files)?;
        } else {
            return Err(Error::MissingInput(input.clone()));
        }
    }

    Ok(files)
}

fn read_folder(root: &Path, files: &mut Vec<RawFile>) -> Result<()> {
    let root_name = folder_name(root);

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let inner = entry
            .path()
            .strip_prefix(root)
            .unwrap_or_else(|_| entry.path());
        let inner: Vec<String> = inner
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let relative = format!("{}/{}", root_name, inner.join("/"));

        files.push(read_file(entry.path(), Some(relative))?);
    }

    Ok(())
}

fn read_file(path: &Path, relative_path: Option<String>) -> Result<RawFile> {
    let data = fs::read(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    tracing::debug!(file = %path.display(), size = data.len(), "read input");

    let mut file = RawFile::new(name, data);
    file.relative_path = relative_path;
    Ok(file)
}

/// Name of a selected folder, resolving `.` and friends.
fn folder_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            root.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| DEFAULT_GROUP.to_string())
}
