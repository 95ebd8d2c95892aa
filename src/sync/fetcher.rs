//! Acquisition backends.
//!
//! The synchronizer talks to the outside world only through the
//! [`Fetcher`] trait: "fetch this identifier into the cache root; on
//! success make it visible to a subsequent inspector query." Production
//! uses [`HubFetcher`] (hf-hub); tests substitute a fake.

use crate::cache::layout::CacheLayout;
use crate::error::{CacheError, Result};
use anyhow::Context;
use async_trait::async_trait;
use hf_hub::api::tokio::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};

/// Unified interface for artifact acquisition
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a model snapshot into the hub cache.
    ///
    /// Must be idempotent and safely retryable.
    async fn fetch_model(&self, identifier: &str, revision: &str) -> anyhow::Result<()>;

    /// Fetch a dataset into the datasets cache, optionally narrowed to
    /// a single config and split.
    async fn fetch_dataset(
        &self,
        identifier: &str,
        config: Option<&str>,
        split: Option<&str>,
    ) -> anyhow::Result<()>;

    /// Get fetcher name for logging/debugging
    fn name(&self) -> &str;
}

/// HuggingFace Hub fetcher backed by hf-hub
pub struct HubFetcher {
    hub_api: Api,
    datasets_api: Api,
    ignore_patterns: Vec<String>,
}

impl HubFetcher {
    /// Create a fetcher writing into the given layout.
    ///
    /// Models land under `hub/`, dataset snapshots under `datasets/`,
    /// matching what `setup --offline` exports for the compute nodes.
    pub fn new(layout: &CacheLayout, token: Option<String>) -> Result<Self> {
        let build = |cache_dir| {
            ApiBuilder::new()
                .with_cache_dir(cache_dir)
                .with_token(token.clone())
                .with_progress(false)
                .build()
                .map_err(|e| {
                    CacheError::Config(format!("Failed to initialize HuggingFace API: {e}"))
                })
        };

        Ok(Self {
            hub_api: build(layout.hub())?,
            datasets_api: build(layout.datasets())?,
            ignore_patterns: Vec::new(),
        })
    }

    /// Skip files matching these patterns (`*.bin`-style suffix globs or
    /// exact file names)
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    fn ignored(&self, filename: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| {
            match pattern.strip_prefix("*") {
                Some(suffix) => filename.ends_with(suffix),
                None => filename == pattern.as_str(),
            }
        })
    }
}

#[async_trait]
impl Fetcher for HubFetcher {
    async fn fetch_model(&self, identifier: &str, revision: &str) -> anyhow::Result<()> {
        tracing::info!(model = %identifier, revision = %revision, "Fetching model snapshot");

        let repo = self.hub_api.repo(Repo::with_revision(
            identifier.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let info = repo
            .info()
            .await
            .with_context(|| format!("failed to query repo metadata for {identifier}"))?;

        for sibling in &info.siblings {
            if self.ignored(&sibling.rfilename) {
                tracing::debug!(file = %sibling.rfilename, "Skipping ignored file");
                continue;
            }
            tracing::debug!(file = %sibling.rfilename, "Downloading file");
            repo.get(&sibling.rfilename)
                .await
                .with_context(|| format!("failed to download {}", sibling.rfilename))?;
        }

        Ok(())
    }

    async fn fetch_dataset(
        &self,
        identifier: &str,
        config: Option<&str>,
        split: Option<&str>,
    ) -> anyhow::Result<()> {
        tracing::info!(dataset = %identifier, ?config, ?split, "Fetching dataset snapshot");

        let repo = self
            .datasets_api
            .repo(Repo::new(identifier.to_string(), RepoType::Dataset));

        let info = repo
            .info()
            .await
            .with_context(|| format!("failed to query dataset metadata for {identifier}"))?;

        for sibling in &info.siblings {
            if self.ignored(&sibling.rfilename)
                || !dataset_file_wanted(&sibling.rfilename, config, split)
            {
                continue;
            }
            tracing::debug!(file = %sibling.rfilename, "Downloading file");
            repo.get(&sibling.rfilename)
                .await
                .with_context(|| format!("failed to download {}", sibling.rfilename))?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "huggingface-hub"
    }
}

/// Decide whether a dataset repo file belongs to the requested subset.
///
/// Metadata files (top level, non-data) are always kept so the cached
/// snapshot stays loadable. Data shards are filtered: a config narrows
/// to files under that config's directory, a split to shards whose name
/// carries the split.
fn dataset_file_wanted(filename: &str, config: Option<&str>, split: Option<&str>) -> bool {
    let is_data = ["parquet", "arrow", "json", "jsonl", "csv"]
        .iter()
        .any(|ext| {
            std::path::Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                == Some(ext)
        });

    if !is_data {
        return true;
    }

    if let Some(config) = config {
        let in_config = filename.starts_with(&format!("{config}/"));
        let top_level = !filename.contains('/');
        if !in_config && !top_level {
            return false;
        }
    }

    if let Some(split) = split {
        let base = filename.rsplit('/').next().unwrap_or(filename);
        return base.starts_with(&format!("{split}-"))
            || base.contains(&format!("-{split}"))
            || base.starts_with(&format!("{split}."));
    }

    true
}
