//! Stale cache cleanup.
//!
//! Removes the debris an interrupted download leaves behind: `*.lock`
//! files, `*.incomplete` blobs under `hub/`, and dataset repos that were
//! mistakenly materialized under `hub/` instead of `datasets/`.

use crate::cache::layout::CacheLayout;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// What a cleanup pass removed (or would remove, for a dry run)
#[derive(Debug, Default)]
pub struct CleanReport {
    pub locks: Vec<PathBuf>,
    pub incomplete: Vec<PathBuf>,
    pub misplaced_datasets: Vec<PathBuf>,
}

impl CleanReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.locks.len() + self.incomplete.len() + self.misplaced_datasets.len()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

/// Remove stale lock files and orphaned incomplete downloads.
///
/// With `dry_run` set, nothing is deleted; the report lists what a real
/// run would remove.
pub fn clean(layout: &CacheLayout, dry_run: bool) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    collect_by_extension(layout.root(), "lock", &mut report.locks);
    collect_by_extension(&layout.hub(), "incomplete", &mut report.incomplete);

    if let Ok(entries) = fs::read_dir(layout.hub()) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("datasets--") && entry.path().is_dir() {
                report.misplaced_datasets.push(entry.path());
            }
        }
    }
    report.misplaced_datasets.sort();

    if !dry_run {
        for file in report.locks.iter().chain(&report.incomplete) {
            fs::remove_file(file)?;
        }
        for dir in &report.misplaced_datasets {
            fs::remove_dir_all(dir)?;
        }
    }

    Ok(report)
}

fn collect_by_extension(dir: &Path, ext: &str, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_by_extension(&path, ext, out);
        } else if path.extension().and_then(|e| e.to_str()) == Some(ext) {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout() -> (TempDir, CacheLayout) {
        let temp = TempDir::new().unwrap();
        let layout = CacheLayout::new(temp.path());
        layout.ensure().unwrap();
        (temp, layout)
    }

    #[test]
    fn test_clean_empty_cache() {
        let (_t, layout) = layout();
        let report = clean(&layout, false).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_clean_removes_locks_and_incomplete() {
        let (_t, layout) = layout();

        let locks = layout.model_repo_dir("org/model").join(".locks");
        fs::create_dir_all(&locks).unwrap();
        let lock_file = locks.join("abc.lock");
        fs::write(&lock_file, "").unwrap();

        let blobs = layout.model_repo_dir("org/model").join("blobs");
        fs::create_dir_all(&blobs).unwrap();
        let partial = blobs.join("deadbeef.incomplete");
        fs::write(&partial, "half a blob").unwrap();

        let report = clean(&layout, false).unwrap();
        assert_eq!(report.locks, vec![lock_file.clone()]);
        assert_eq!(report.incomplete, vec![partial.clone()]);
        assert!(!lock_file.exists());
        assert!(!partial.exists());
    }

    #[test]
    fn test_clean_removes_misplaced_datasets() {
        let (_t, layout) = layout();

        let misplaced = layout.hub().join("datasets--cais--mmlu");
        fs::create_dir_all(misplaced.join("snapshots")).unwrap();

        let report = clean(&layout, false).unwrap();
        assert_eq!(report.misplaced_datasets, vec![misplaced.clone()]);
        assert!(!misplaced.exists());
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let (_t, layout) = layout();

        let lock_file = layout.hub().join("x.lock");
        fs::write(&lock_file, "").unwrap();

        let report = clean(&layout, true).unwrap();
        assert_eq!(report.total(), 1);
        assert!(lock_file.exists());
    }
}
