//! Cache directory layout.
//!
//! Mirrors the standard HuggingFace `HF_HOME` structure so everything
//! cached here is directly usable by `from_pretrained()` / `load_dataset()`
//! on offline compute nodes:
//!
//! ```text
//! <root>/
//! ├── hub/       model snapshots   (HF_HUB_CACHE)
//! ├── datasets/  dataset snapshots (HF_DATASETS_CACHE)
//! ├── assets/    HF assets
//! └── xet/       xet cache
//! ```

use crate::error::{CacheError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A cache root with its four fixed subdirectories
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn hub(&self) -> PathBuf {
        self.root.join("hub")
    }

    #[must_use]
    pub fn datasets(&self) -> PathBuf {
        self.root.join("datasets")
    }

    #[must_use]
    pub fn assets(&self) -> PathBuf {
        self.root.join("assets")
    }

    #[must_use]
    pub fn xet(&self) -> PathBuf {
        self.root.join("xet")
    }

    /// Create the root and all four subdirectories. Idempotent.
    ///
    /// Fails with `CacheUnavailable` if anything cannot be created, since
    /// nothing downstream can proceed without a writable cache.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.hub(),
            self.datasets(),
            self.assets(),
            self.xet(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| CacheError::CacheUnavailable {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Hub directory for a model repo: `hub/models--{org}--{name}`
    #[must_use]
    pub fn model_repo_dir(&self, identifier: &str) -> PathBuf {
        self.hub()
            .join(format!("models--{}", identifier.replace('/', "--")))
    }

    /// Arrow-cache directory for a dataset: `datasets/{org}___{name}`
    ///
    /// This is the naming the `datasets` library uses; hub-style snapshot
    /// layouts (`datasets--{org}--{name}`) also live under `datasets/` and
    /// are recognized by the inspector.
    #[must_use]
    pub fn dataset_dir(&self, identifier: &str) -> PathBuf {
        self.datasets().join(identifier.replace('/', "___"))
    }

    /// Hub-style snapshot directory for a dataset repo:
    /// `datasets/datasets--{org}--{name}`
    #[must_use]
    pub fn dataset_repo_dir(&self, identifier: &str) -> PathBuf {
        self.datasets()
            .join(format!("datasets--{}", identifier.replace('/', "--")))
    }

    /// Shell-exportable environment variables this layout implies.
    ///
    /// Covers the current HF_* variables plus the legacy spellings some
    /// libraries still read. `offline` adds the `*_OFFLINE=1` trio for
    /// compute nodes without internet access.
    #[must_use]
    pub fn environment(&self, offline: bool) -> Vec<(String, String)> {
        let path = |p: PathBuf| p.display().to_string();

        let mut env = vec![
            ("HF_HOME".to_string(), path(self.root.clone())),
            ("HF_HUB_CACHE".to_string(), path(self.hub())),
            ("HF_DATASETS_CACHE".to_string(), path(self.datasets())),
            ("HF_ASSETS_CACHE".to_string(), path(self.assets())),
            ("HF_XET_CACHE".to_string(), path(self.xet())),
            ("HUGGINGFACE_HUB_CACHE".to_string(), path(self.hub())),
            ("HUGGINGFACE_ASSETS_CACHE".to_string(), path(self.assets())),
            ("TRANSFORMERS_CACHE".to_string(), path(self.hub())),
            ("HF_HUB_DISABLE_PROGRESS_BARS".to_string(), "1".to_string()),
            (
                "HF_DATASETS_DISABLE_PROGRESS_BARS".to_string(),
                "1".to_string(),
            ),
        ];

        if offline {
            env.push(("HF_HUB_OFFLINE".to_string(), "1".to_string()));
            env.push(("HF_DATASETS_OFFLINE".to_string(), "1".to_string()));
            env.push(("TRANSFORMERS_OFFLINE".to_string(), "1".to_string()));
        }

        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_subdirectory_paths() {
        let layout = CacheLayout::new("/data/hf");
        assert_eq!(layout.hub(), PathBuf::from("/data/hf/hub"));
        assert_eq!(layout.datasets(), PathBuf::from("/data/hf/datasets"));
        assert_eq!(layout.assets(), PathBuf::from("/data/hf/assets"));
        assert_eq!(layout.xet(), PathBuf::from("/data/hf/xet"));
    }

    #[test]
    fn test_model_repo_dir_mangling() {
        let layout = CacheLayout::new("/data/hf");
        assert_eq!(
            layout.model_repo_dir("BAAI/bge-small-en-v1.5"),
            PathBuf::from("/data/hf/hub/models--BAAI--bge-small-en-v1.5")
        );
    }

    #[test]
    fn test_dataset_dir_mangling() {
        let layout = CacheLayout::new("/data/hf");
        assert_eq!(
            layout.dataset_dir("trl-lib/Capybara"),
            PathBuf::from("/data/hf/datasets/trl-lib___Capybara")
        );
        // Non-namespaced datasets keep their plain name
        assert_eq!(
            layout.dataset_dir("hellaswag"),
            PathBuf::from("/data/hf/datasets/hellaswag")
        );
        assert_eq!(
            layout.dataset_repo_dir("cais/mmlu"),
            PathBuf::from("/data/hf/datasets/datasets--cais--mmlu")
        );
    }

    #[test]
    fn test_ensure_creates_all_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let layout = CacheLayout::new(temp.path().join("hf_data"));

        layout.ensure().unwrap();
        assert!(layout.hub().is_dir());
        assert!(layout.datasets().is_dir());
        assert!(layout.assets().is_dir());
        assert!(layout.xet().is_dir());

        // Second run is a no-op, not an error
        layout.ensure().unwrap();
    }

    #[test]
    fn test_ensure_unwritable_root_fails() {
        // A root under a path component that is a file cannot be created
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "not a dir").unwrap();

        let layout = CacheLayout::new(blocker.join("hf_data"));
        let err = layout.ensure().unwrap_err();
        assert!(matches!(err, CacheError::CacheUnavailable { .. }));
    }

    #[test]
    fn test_environment_offline_flags() {
        let layout = CacheLayout::new("/data/hf");

        let online = layout.environment(false);
        assert!(online.iter().any(|(k, _)| k == "HF_HOME"));
        assert!(!online.iter().any(|(k, _)| k == "HF_HUB_OFFLINE"));

        let offline = layout.environment(true);
        assert!(offline
            .iter()
            .any(|(k, v)| k == "HF_HUB_OFFLINE" && v == "1"));
        assert!(offline
            .iter()
            .any(|(k, v)| k == "HF_DATASETS_OFFLINE" && v == "1"));
    }
}
