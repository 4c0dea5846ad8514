use fxhash::FxHashSet;
use std::path::Path;

use super::catalog::{PeriodKey, RemoteEntry};

/// The files to fetch in one cycle, newest period first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadSet {
    entries: Vec<RemoteEntry>,
}

impl DownloadSet {
    pub fn entries(&self) -> &[RemoteEntry] {
        &self.entries
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.filename.as_str())
    }

    pub fn periods(&self) -> Vec<PeriodKey> {
        self.entries.iter().map(|e| e.period).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decides which remote files are missing locally.
///
/// The newest period is always fetched, since the instrument keeps appending rows to it. Older
/// periods are walked newest to oldest and fetched until one that already exists locally is
/// reached; that one is fetched a final time to pick up rows written before the month rolled
/// over, and nothing older is considered.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    prefix: String,
}

impl SelectionPolicy {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    /// Compute the DownloadSet for a raw listing.
    ///
    /// Returns None if no listed file follows the naming convention. This is not "nothing to do":
    /// the remote directory is wrong or empty, and the caller should treat it as an error.
    ///
    /// When several names share a period the first one in listing order is used.
    pub fn select(
        &self,
        listing: &[String],
        local_files: &FxHashSet<String>,
    ) -> Option<DownloadSet> {
        let candidates: Vec<RemoteEntry> = listing
            .iter()
            .filter_map(|line| RemoteEntry::from_listing_line(line, &self.prefix))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let mut periods: Vec<PeriodKey> = candidates.iter().map(|e| e.period).collect();
        periods.sort_unstable_by(|a, b| b.cmp(a));
        periods.dedup();

        let mut entries = Vec::new();
        for period in periods {
            // Every period came from some candidate, so a match always exists
            if let Some(entry) = candidates.iter().find(|e| e.period == period) {
                entries.push(entry.clone());
                if local_files.contains(&entry.filename) {
                    break;
                }
            }
        }
        Some(DownloadSet { entries })
    }
}

/// Names of the regular files currently in `dir`, including symlinks to regular files
pub fn local_files(dir: &Path) -> std::io::Result<FxHashSet<String>> {
    let mut names = FxHashSet::default();
    for item in dir.read_dir()? {
        let item = item?;
        if item.path().is_file() {
            names.insert(item.file_name().to_string_lossy().to_string());
        }
    }
    Ok(names)
}
