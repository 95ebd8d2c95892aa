//! Cache inspection.
//!
//! Answers, from filesystem metadata only (no network), whether a model
//! or dataset is fully cached, partially cached (interrupted download),
//! or absent. Cheap enough to run offline and repeatedly; the acquisition
//! side leaves `.lock` / `.incomplete` markers behind while a download is
//! in flight, so an interrupted identifier is always classified as
//! partial and never as falsely present.

use crate::cache::layout::CacheLayout;
use crate::manifest::ManifestEntry;
use std::fs;
use std::path::{Path, PathBuf};

/// Presence of an artifact in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// A complete snapshot exists with no in-progress markers
    Present,
    /// Some files exist but the artifact is incomplete
    Partial,
    /// Nothing cached for this identifier
    Absent,
}

/// Outcome of a `verify` check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady { reason: String },
}

impl Readiness {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }
}

/// Read-only view over a cache layout
pub struct CacheInspector<'a> {
    layout: &'a CacheLayout,
}

impl<'a> CacheInspector<'a> {
    #[must_use]
    pub fn new(layout: &'a CacheLayout) -> Self {
        Self { layout }
    }

    /// Classify a manifest entry against the cache
    #[must_use]
    pub fn state(&self, entry: &ManifestEntry) -> CacheState {
        match entry {
            ManifestEntry::Model { identifier } => self.model_state(identifier),
            ManifestEntry::Dataset {
                identifier,
                config,
                split,
            } => self.dataset_state(identifier, config.as_deref(), split.as_deref()),
        }
    }

    /// Classify a model repo: present iff at least one snapshot revision
    /// exists under `hub/models--{org}--{name}` with no partial markers.
    #[must_use]
    pub fn model_state(&self, identifier: &str) -> CacheState {
        let repo_dir = self.layout.model_repo_dir(identifier);
        if !repo_dir.exists() {
            return CacheState::Absent;
        }

        if has_partial_markers(&repo_dir) {
            return CacheState::Partial;
        }

        if has_snapshot(&repo_dir) {
            CacheState::Present
        } else {
            // Repo dir exists but nothing was materialized yet
            CacheState::Partial
        }
    }

    /// Classify a dataset, optionally narrowed to a config and split.
    ///
    /// Both the Arrow cache naming (`{org}___{name}`, written by the
    /// `datasets` library) and the hub snapshot naming
    /// (`datasets--{org}--{name}`) are recognized. With config or split
    /// unspecified, any cached variant counts as present.
    #[must_use]
    pub fn dataset_state(
        &self,
        identifier: &str,
        config: Option<&str>,
        split: Option<&str>,
    ) -> CacheState {
        let candidates = [
            self.layout.dataset_dir(identifier),
            self.layout.dataset_repo_dir(identifier),
        ];
        let Some(dir) = candidates.iter().find(|d| d.exists()) else {
            return CacheState::Absent;
        };

        if has_partial_markers(dir) {
            return CacheState::Partial;
        }

        if fs::read_dir(dir).map(|mut e| e.next().is_none()).unwrap_or(true) {
            return CacheState::Partial;
        }

        if let Some(config) = config {
            if !has_descendant_dir(dir, config) {
                return CacheState::Partial;
            }
        }

        if let Some(split) = split {
            if !has_split_file(dir, split) {
                return CacheState::Partial;
            }
        }

        CacheState::Present
    }

    /// Check whether a model id (or a local checkpoint directory) can be
    /// loaded offline, with a human-readable reason when it cannot.
    #[must_use]
    pub fn verify_model(&self, name: &str) -> Readiness {
        // A path that exists on disk is a local fine-tuned model
        let local = Path::new(name);
        if local.exists() {
            if has_file_with_extension(local, "safetensors")
                || has_file_with_extension(local, "bin")
            {
                return Readiness::Ready;
            }
            return Readiness::not_ready(format!(
                "local path exists but contains no model weights: {name}"
            ));
        }

        match self.model_state(name) {
            CacheState::Present => Readiness::Ready,
            CacheState::Partial => {
                Readiness::not_ready("partial snapshot (interrupted download?)")
            }
            CacheState::Absent => Readiness::not_ready("not found in hub cache"),
        }
    }

    /// Check whether a dataset can be loaded offline
    #[must_use]
    pub fn verify_dataset(&self, identifier: &str) -> Readiness {
        match self.dataset_state(identifier, None, None) {
            CacheState::Present => Readiness::Ready,
            CacheState::Partial => {
                Readiness::not_ready("partial dataset cache (interrupted download?)")
            }
            CacheState::Absent => Readiness::not_ready("not found in datasets cache"),
        }
    }
}

/// At least one non-empty snapshot revision under `{repo}/snapshots/`
fn has_snapshot(repo_dir: &Path) -> bool {
    let snapshots = repo_dir.join("snapshots");
    let Ok(entries) = fs::read_dir(&snapshots) else {
        return false;
    };
    for entry in entries.flatten() {
        if let Ok(mut contents) = fs::read_dir(entry.path()) {
            if contents.next().is_some() {
                return true;
            }
        }
    }
    false
}

/// Any `.lock` or `.incomplete` file below `dir`
fn has_partial_markers(dir: &Path) -> bool {
    walk_any(dir, &mut |path| {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("lock" | "incomplete")
        )
    })
}

fn has_file_with_extension(dir: &Path, ext: &str) -> bool {
    walk_any(dir, &mut |path| {
        path.extension().and_then(|e| e.to_str()) == Some(ext)
    })
}

/// A descendant directory named exactly `name` (a dataset config subset)
fn has_descendant_dir(dir: &Path, name: &str) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().and_then(|n| n.to_str()) == Some(name)
                || has_descendant_dir(&path, name)
            {
                return true;
            }
        }
    }
    false
}

/// A materialized data file for `split`: an Arrow file like
/// `capybara-train.arrow` or a parquet shard like `train-00000-of-00001.parquet`
fn has_split_file(dir: &Path, split: &str) -> bool {
    walk_any(dir, &mut |path| {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return false;
        };
        let data_file = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("arrow" | "parquet" | "json" | "jsonl" | "csv")
        );
        data_file && stem_names_split(stem, split)
    })
}

/// The split must be a whole `-`/`.`-delimited segment of the stem,
/// anchored at the start (parquet shards: `train-00000-of-00001`) or end
/// (Arrow cache files: `capybara-train`). A bare substring like
/// `pre-trained` never counts.
fn stem_names_split(stem: &str, split: &str) -> bool {
    if stem == split {
        return true;
    }
    let mut segments = stem.split(['-', '.']);
    let first = segments.next();
    let last = segments.last();
    first == Some(split) || last == Some(split)
}

/// Depth-first search for any file matching `pred`
fn walk_any(dir: &Path, pred: &mut dyn FnMut(&PathBuf) -> bool) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if walk_any(&path, pred) {
                return true;
            }
        } else if pred(&path) {
            return true;
        }
    }
    false
}
