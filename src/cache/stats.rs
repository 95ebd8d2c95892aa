//! Cache status reporting.
//!
//! Enumerates a cache layout and reports per-subdirectory counts and
//! sizes, plus per-artifact listings. Pure filesystem inspection; no
//! manifest involved.

use crate::cache::layout::CacheLayout;
use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One cached artifact with its on-disk size
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStats {
    pub name: String,
    pub size_bytes: u64,
}

/// Full cache status snapshot
#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub root: PathBuf,
    pub hub_size: u64,
    pub datasets_size: u64,
    pub assets_size: u64,
    pub xet_size: u64,
    pub models: Vec<ArtifactStats>,
    pub datasets: Vec<ArtifactStats>,
    /// Stale `*.lock` files anywhere under the root
    pub stale_locks: usize,
}

impl CacheReport {
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.hub_size + self.datasets_size + self.assets_size + self.xet_size
    }

    /// Build a report by scanning the layout
    pub fn scan(layout: &CacheLayout) -> Result<Self> {
        let mut models = Vec::new();
        if let Ok(entries) = fs::read_dir(layout.hub()) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if let Some(id) = name.strip_prefix("models--") {
                    models.push(ArtifactStats {
                        name: id.replacen("--", "/", 1),
                        size_bytes: dir_size(&entry.path()),
                    });
                }
            }
        }
        models.sort_by(|a, b| a.name.cmp(&b.name));

        let mut datasets = Vec::new();
        if let Ok(entries) = fs::read_dir(layout.datasets()) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if !entry.path().is_dir() || name.starts_with('.') {
                    continue;
                }
                let id = match name.strip_prefix("datasets--") {
                    Some(rest) => rest.replacen("--", "/", 1),
                    None => name.replace("___", "/"),
                };
                datasets.push(ArtifactStats {
                    name: id,
                    size_bytes: dir_size(&entry.path()),
                });
            }
        }
        datasets.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            root: layout.root().to_path_buf(),
            hub_size: dir_size(&layout.hub()),
            datasets_size: dir_size(&layout.datasets()),
            assets_size: dir_size(&layout.assets()),
            xet_size: dir_size(&layout.xet()),
            models,
            datasets,
            stale_locks: count_locks(layout.root()),
        })
    }
}

/// Recursively calculate directory size
pub fn dir_size(path: &Path) -> u64 {
    let mut size = 0;

    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                size += dir_size(&path);
            } else if let Ok(metadata) = fs::metadata(&path) {
                size += metadata.len();
            }
        }
    }

    size
}

fn count_locks(dir: &Path) -> usize {
    let mut count = 0;
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                count += count_locks(&path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("lock") {
                count += 1;
            }
        }
    }
    count
}

/// Find model directories (containing safetensors) under `root`.
///
/// Useful for discovering fine-tuned checkpoints whose paths can be fed
/// to downstream tooling directly.
#[must_use]
pub fn find_local_models(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    collect_safetensor_dirs(root, &mut found);
    found.sort();
    found.dedup();
    found
}

fn collect_safetensor_dirs(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_safetensor_dirs(&path, found);
        } else if path.extension().and_then(|e| e.to_str()) == Some("safetensors") {
            if let Some(parent) = path.parent() {
                found.push(parent.to_path_buf());
            }
        }
    }
}

/// Format bytes as human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
        assert_eq!(format_bytes(1_572_864), "1.50 MB");
        assert_eq!(format_bytes(1_073_741_824), "1.00 GB");
        assert_eq!(format_bytes(1_610_612_736), "1.50 GB");
    }

    #[test]
    fn test_dir_size_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(dir_size(temp_dir.path()), 0);
    }

    #[test]
    fn test_dir_size_nested_dirs() {
        let temp_dir = TempDir::new().unwrap();

        let subdir = temp_dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("file1.txt"), "abc").unwrap();
        fs::write(temp_dir.path().join("file2.txt"), "defgh").unwrap();

        assert_eq!(dir_size(temp_dir.path()), 8); // 3 + 5 bytes
    }

    #[test]
    fn test_scan_lists_models_and_datasets() {
        let temp = TempDir::new().unwrap();
        let layout = CacheLayout::new(temp.path());
        layout.ensure().unwrap();

        let snap = layout.model_repo_dir("org/model").join("snapshots/r1");
        fs::create_dir_all(&snap).unwrap();
        fs::write(snap.join("model.safetensors"), "12345").unwrap();

        let ds = layout.dataset_dir("trl-lib/Capybara");
        fs::create_dir_all(&ds).unwrap();
        fs::write(ds.join("data.arrow"), "123").unwrap();

        let report = CacheReport::scan(&layout).unwrap();
        assert_eq!(report.models.len(), 1);
        assert_eq!(report.models[0].name, "org/model");
        assert_eq!(report.models[0].size_bytes, 5);
        assert_eq!(report.datasets.len(), 1);
        assert_eq!(report.datasets[0].name, "trl-lib/Capybara");
        assert_eq!(report.hub_size, 5);
        assert_eq!(report.datasets_size, 3);
        assert_eq!(report.total_size(), 8);
        assert_eq!(report.stale_locks, 0);
    }

    #[test]
    fn test_scan_counts_stale_locks() {
        let temp = TempDir::new().unwrap();
        let layout = CacheLayout::new(temp.path());
        layout.ensure().unwrap();

        fs::write(layout.hub().join("x.lock"), "").unwrap();
        fs::write(layout.datasets().join("y.lock"), "").unwrap();

        let report = CacheReport::scan(&layout).unwrap();
        assert_eq!(report.stale_locks, 2);
    }

    #[test]
    fn test_scan_serializes_to_json() {
        let temp = TempDir::new().unwrap();
        let layout = CacheLayout::new(temp.path());
        layout.ensure().unwrap();

        let report = CacheReport::scan(&layout).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"hub_size\""));
        assert!(json.contains("\"stale_locks\""));
    }

    #[test]
    fn test_find_local_models() {
        let temp = TempDir::new().unwrap();
        let run1 = temp.path().join("ckpt/run1");
        let run2 = temp.path().join("ckpt/run2");
        fs::create_dir_all(&run1).unwrap();
        fs::create_dir_all(&run2).unwrap();
        fs::write(run1.join("model.safetensors"), "w").unwrap();
        fs::write(run1.join("model-00002.safetensors"), "w").unwrap();
        fs::write(run2.join("notes.txt"), "no weights here").unwrap();

        let found = find_local_models(temp.path());
        assert_eq!(found, vec![run1]);
    }
}
