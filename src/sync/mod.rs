//! Manifest-driven cache synchronization.
//!
//! Drives the batch flow: parse the manifest (all parse errors surface
//! before any network activity), skip entries the inspector reports as
//! present, and acquire the rest through the configured [`Fetcher`] with
//! a bounded number of concurrent workers. One entry's failure never
//! aborts the batch; every input entry reaches exactly one terminal
//! state in the returned summary.

pub mod fetcher;

pub use fetcher::{Fetcher, HubFetcher};

use crate::cache::inspect::{CacheInspector, CacheState};
use crate::cache::layout::CacheLayout;
use crate::cache::stats::format_bytes;
use crate::config::schema::SyncConfig;
use crate::error::{CacheError, Result};
use crate::manifest::{self, ManifestEntry};
use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default git revision for single-entry fetches
pub const DEFAULT_REVISION: &str = "main";

/// Terminal state of one manifest entry after a synchronization pass
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Skipped: the inspector found a complete snapshot
    AlreadyCached,
    /// Fetched during this pass
    Acquired,
    /// Acquisition failed; the cause is preserved for diagnosis
    Failed(Arc<CacheError>),
}

/// Per-entry terminal states for a whole batch, in manifest order
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub outcomes: Vec<(ManifestEntry, Outcome)>,
}

impl SyncSummary {
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Acquired))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::AlreadyCached))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Orchestrates manifest parsing, cache inspection, and acquisition
pub struct Synchronizer<F> {
    layout: CacheLayout,
    fetcher: F,
    workers: usize,
    timeout: Duration,
    min_free_mb: u64,
    progress: bool,
}

impl<F: Fetcher> Synchronizer<F> {
    #[must_use]
    pub fn new(config: &SyncConfig, layout: CacheLayout, fetcher: F) -> Self {
        Self {
            layout,
            fetcher,
            workers: config.workers.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
            min_free_mb: config.min_free_mb,
            progress: false,
        }
    }

    /// Show an indicatif progress bar over queued acquisitions
    #[must_use]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Parse manifest text and synchronize the cache against it.
    ///
    /// Aborts with the aggregated `Manifest` error before any fetch if
    /// any line is malformed.
    pub async fn sync_text(&self, text: &str) -> Result<SyncSummary> {
        let entries = manifest::parse(text)?;
        self.sync_entries(entries).await
    }

    /// Synchronize already-parsed entries, preserving their order.
    ///
    /// Re-running against a populated cache performs zero redundant
    /// acquisitions: present entries are reported as already cached.
    pub async fn sync_entries(&self, entries: Vec<ManifestEntry>) -> Result<SyncSummary> {
        self.layout.ensure()?;
        check_disk_space(&self.layout, self.min_free_mb)?;

        enum Slot {
            Cached,
            Fetch(String),
        }

        let inspector = CacheInspector::new(&self.layout);
        let mut slots = Vec::with_capacity(entries.len());
        // Unique identities to acquire, grouped by repo directory in
        // first-seen manifest order. Groups run concurrently; entries
        // within a group run one after another, so two workers never
        // write into the same repo path (two configs of one dataset
        // share its metadata files).
        let mut queue: Vec<(String, Vec<(String, ManifestEntry)>)> = Vec::new();

        for entry in &entries {
            match inspector.state(entry) {
                CacheState::Present => {
                    tracing::info!(%entry, "Already cached, skipping");
                    slots.push(Slot::Cached);
                }
                state => {
                    if state == CacheState::Partial {
                        tracing::warn!(%entry, "Partial cache entry, re-fetching");
                    }
                    let key = entry.identity();
                    let repo = entry.repo_key();
                    if let Some((_, group)) = queue.iter_mut().find(|(r, _)| r == &repo) {
                        if !group.iter().any(|(k, _)| k == &key) {
                            group.push((key.clone(), entry.clone()));
                        }
                    } else {
                        queue.push((repo, vec![(key.clone(), entry.clone())]));
                    }
                    slots.push(Slot::Fetch(key));
                }
            }
        }

        let queued: u64 = queue.iter().map(|(_, g)| g.len() as u64).sum();
        let bar = if self.progress && queued > 0 {
            let bar = ProgressBar::new(queued);
            bar.set_style(
                ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let groups: Vec<Vec<(String, Outcome)>> = stream::iter(queue)
            .map(|(_, group)| {
                let bar = bar.clone();
                async move {
                    let mut done = Vec::with_capacity(group.len());
                    for (key, entry) in group {
                        bar.set_message(entry.identifier().to_string());
                        let outcome = match self.acquire(&entry, DEFAULT_REVISION).await {
                            Ok(()) => {
                                tracing::info!(%entry, "Acquired");
                                Outcome::Acquired
                            }
                            Err(e) => {
                                tracing::error!(%entry, error = %e, "Acquisition failed");
                                Outcome::Failed(Arc::new(e))
                            }
                        };
                        bar.inc(1);
                        done.push((key, outcome));
                    }
                    done
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;
        bar.finish_and_clear();
        let results: HashMap<String, Outcome> = groups.into_iter().flatten().collect();

        let mut outcomes = Vec::with_capacity(entries.len());
        for (entry, slot) in entries.into_iter().zip(slots) {
            let outcome = match slot {
                Slot::Cached => Outcome::AlreadyCached,
                Slot::Fetch(key) => results
                    .get(&key)
                    .cloned()
                    .expect("every queued identity has a result"),
            };
            outcomes.push((entry, outcome));
        }

        Ok(SyncSummary { outcomes })
    }

    /// Synchronize a single entry, honoring an explicit model revision.
    ///
    /// The inspector short-circuit only applies at the default revision;
    /// pinned revisions are always handed to the fetcher, which is
    /// idempotent anyway. Acquisition failures surface as
    /// [`Outcome::Failed`], same as the batch path; `Err` is reserved for
    /// cache setup problems.
    pub async fn sync_one(&self, entry: &ManifestEntry, revision: &str) -> Result<Outcome> {
        self.layout.ensure()?;
        check_disk_space(&self.layout, self.min_free_mb)?;

        if revision == DEFAULT_REVISION
            && CacheInspector::new(&self.layout).state(entry) == CacheState::Present
        {
            tracing::info!(%entry, "Already cached, skipping");
            return Ok(Outcome::AlreadyCached);
        }

        match self.acquire(entry, revision).await {
            Ok(()) => Ok(Outcome::Acquired),
            Err(e) => {
                tracing::error!(%entry, error = %e, "Acquisition failed");
                Ok(Outcome::Failed(Arc::new(e)))
            }
        }
    }

    async fn acquire(
        &self,
        entry: &ManifestEntry,
        revision: &str,
    ) -> std::result::Result<(), CacheError> {
        let fetch = async {
            match entry {
                ManifestEntry::Model { identifier } => {
                    self.fetcher.fetch_model(identifier, revision).await
                }
                ManifestEntry::Dataset {
                    identifier,
                    config,
                    split,
                } => {
                    self.fetcher
                        .fetch_dataset(identifier, config.as_deref(), split.as_deref())
                        .await
                }
            }
        };

        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(cause)) => Err(CacheError::Acquisition {
                identifier: entry.identifier().to_string(),
                cause,
            }),
            Err(_) => Err(CacheError::Acquisition {
                identifier: entry.identifier().to_string(),
                cause: anyhow::anyhow!("timed out after {}s", self.timeout.as_secs()),
            }),
        }
    }
}

/// Ensure enough disk space is available before a batch starts
fn check_disk_space(layout: &CacheLayout, min_free_mb: u64) -> Result<()> {
    let stats = nix::sys::statvfs::statvfs(layout.root()).map_err(|e| {
        CacheError::CacheUnavailable {
            path: layout.root().to_path_buf(),
            reason: format!("failed to check disk space: {e}"),
        }
    })?;

    let available_bytes = stats.blocks_available() * stats.block_size();
    let required_bytes = min_free_mb * 1_024 * 1_024;

    if available_bytes < required_bytes {
        return Err(CacheError::CacheUnavailable {
            path: layout.root().to_path_buf(),
            reason: format!(
                "not enough disk space: {} available, {} required",
                format_bytes(available_bytes),
                format_bytes(required_bytes)
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_summary_counts() {
        let entry = |id: &str| ManifestEntry::Model {
            identifier: id.to_string(),
        };
        let summary = SyncSummary {
            outcomes: vec![
                (entry("a/one"), Outcome::Acquired),
                (entry("b/two"), Outcome::AlreadyCached),
                (
                    entry("c/three"),
                    Outcome::Failed(Arc::new(CacheError::Acquisition {
                        identifier: "c/three".to_string(),
                        cause: anyhow::anyhow!("boom"),
                    })),
                ),
            ],
        };

        assert_eq!(summary.acquired(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_check_disk_space_passes_with_zero_requirement() {
        let temp = TempDir::new().unwrap();
        let layout = CacheLayout::new(temp.path());
        layout.ensure().unwrap();
        check_disk_space(&layout, 0).unwrap();
    }

    #[test]
    fn test_check_disk_space_absurd_requirement_fails() {
        let temp = TempDir::new().unwrap();
        let layout = CacheLayout::new(temp.path());
        layout.ensure().unwrap();
        // An exabyte of free space is not happening
        let err = check_disk_space(&layout, 1_024 * 1_024 * 1_024 * 1_024).unwrap_err();
        assert!(matches!(err, CacheError::CacheUnavailable { .. }));
    }
}
