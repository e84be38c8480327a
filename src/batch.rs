//! Sequential batch processing over a session
//!
//! Groups run in selection order and files in group order, one at a time.
//! Log entries and results come out in exactly that order.

use crate::codec::ImageCodec;
use crate::error::Result;
use crate::intake::Selection;
use crate::normalize::{NormalizedFile, Normalizer};
use std::sync::Arc;

/// Append-only, human-readable run log. Cleared when a new run starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingLog {
    entries: Vec<String>,
}

impl ProcessingLog {
    fn push(&mut self, entry: String) {
        tracing::info!("{}", entry);
        self.entries.push(entry);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// State for one interactive run: what is pending and what has been logged.
#[derive(Debug, Default)]
pub struct Session {
    selection: Selection,
    log: ProcessingLog,
}

impl Session {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            log: ProcessingLog::default(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn log(&self) -> &ProcessingLog {
        &self.log
    }
}

#[derive(Debug)]
pub enum ProgressEvent<'a> {
    GroupStarted {
        group: &'a str,
        files: usize,
    },
    FileStarted {
        name: &'a str,
        index: usize,
        total: usize,
    },
    FileFinished {
        file: &'a NormalizedFile,
        index: usize,
        total: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupResult {
    pub name: String,
    pub files: Vec<NormalizedFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedBatch {
    pub groups: Vec<GroupResult>,
}

impl ProcessedBatch {
    pub fn files(&self) -> impl Iterator<Item = &NormalizedFile> {
        self.groups.iter().flat_map(|g| g.files.iter())
    }

    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }

    pub fn original_size(&self) -> u64 {
        self.files().map(|f| f.original_size).sum()
    }

    pub fn final_size(&self) -> u64 {
        self.files().map(|f| f.compressed_size).sum()
    }

    pub fn compressed_count(&self) -> usize {
        self.files().filter(|f| f.is_compressed).count()
    }

    pub fn degraded(&self) -> impl Iterator<Item = &NormalizedFile> {
        self.files().filter(|f| f.is_degraded())
    }
}

pub struct BatchDriver<C> {
    normalizer: Normalizer<C>,
}

impl<C: ImageCodec> BatchDriver<C> {
    pub fn new(normalizer: Normalizer<C>) -> Self {
        Self { normalizer }
    }

    /// Normalize every pending file. The selection is handed over to the
    /// normalizer, so the session's selection is empty afterwards.
    pub fn run<F>(&self, session: &mut Session, mut observer: F) -> ProcessedBatch
    where
        F: FnMut(&ProgressEvent<'_>),
    {
        session.log.clear();

        let selection = std::mem::take(&mut session.selection);
        let total = selection.file_count();
        let mut index = 0;
        let mut groups = Vec::new();

        for group in selection.into_groups() {
            session.log.push(format!("Processing folder: {}", group.name));
            observer(&ProgressEvent::GroupStarted {
                group: &group.name,
                files: group.files.len(),
            });

            let mut files = Vec::with_capacity(group.files.len());
            for raw in group.files {
                index += 1;
                session.log.push(format!("Processing {}...", raw.name));
                observer(&ProgressEvent::FileStarted {
                    name: &raw.name,
                    index,
                    total,
                });

                let normalized = self.normalizer.normalize(raw);
                session.log.push(finished_entry(&normalized));
                observer(&ProgressEvent::FileFinished {
                    file: &normalized,
                    index,
                    total,
                });
                files.push(normalized);
            }

            groups.push(GroupResult {
                name: group.name,
                files,
            });
        }

        ProcessedBatch { groups }
    }
}

/// Run the batch on the blocking pool so async callers are not stalled.
pub async fn process_in_background<C, F>(
    driver: Arc<BatchDriver<C>>,
    mut session: Session,
    observer: F,
) -> Result<(Session, ProcessedBatch)>
where
    C: ImageCodec + Send + Sync + 'static,
    F: FnMut(&ProgressEvent<'_>) + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let batch = driver.run(&mut session, observer);
        (session, batch)
    })
    .await?;

    Ok(result)
}

fn finished_entry(file: &NormalizedFile) -> String {
    let mut entry = if file.is_compressed {
        format!(
            "Finished {} ({} → {})",
            file.name,
            format_size(file.original_size),
            format_size(file.compressed_size)
        )
    } else {
        format!("Finished {} ({})", file.name, format_size(file.compressed_size))
    };
    if let Some(degradation) = &file.degradation {
        entry.push_str(&format!(" [{}]", degradation));
    }
    entry
}

pub fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{} KB", bytes / 1024)
    }
}
