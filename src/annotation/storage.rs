//! Annotation persistence

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::error::AnnotationError;
use super::export::{AnnotationExport, EXPORT_VERSION};
use crate::config::Config;

/// Saved annotation sets, one per article
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationStore {
    /// Latest export per article (article_id -> export)
    pub articles: BTreeMap<String, AnnotationExport>,
}

impl AnnotationStore {
    /// Load the store from the data directory
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::store_path()?)
    }

    /// Save the store to the data directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::store_path()?)
    }

    /// Load a store file, or an empty store if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read annotations from {:?}", path))?;
        let store: AnnotationStore = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse annotations file {:?}", path))?;

        if let Some(export) = store.articles.values().find(|e| e.version > EXPORT_VERSION) {
            return Err(AnnotationError::UnsupportedVersion {
                found: export.version,
                supported: EXPORT_VERSION,
            })
            .with_context(|| format!("Annotations file {:?} was written by a newer version", path));
        }

        Ok(store)
    }

    /// Write the store file, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize annotations")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write annotations to {:?}", path))?;

        tracing::debug!(path = ?path, articles = self.articles.len(), "Annotations saved");
        Ok(())
    }

    /// Get path to annotations.json
    pub fn store_path() -> Result<PathBuf> {
        Ok(Config::data_dir()?.join("annotations.json"))
    }

    /// Saved annotations of an article
    pub fn get(&self, article_id: &str) -> Option<&AnnotationExport> {
        self.articles.get(article_id)
    }

    /// Replace the saved annotations of the export's article
    pub fn put(&mut self, export: AnnotationExport) {
        self.articles.insert(export.article_id.clone(), export);
    }

    /// Forget an article; `false` if nothing was saved for it
    pub fn remove(&mut self, article_id: &str) -> bool {
        self.articles.remove(article_id).is_some()
    }

    /// Ids of all articles with saved annotations
    pub fn article_ids(&self) -> impl Iterator<Item = &str> {
        self.articles.keys().map(String::as_str)
    }

    /// Count annotations across all articles
    pub fn total_annotations(&self) -> usize {
        self.articles.values().map(|e| e.annotations.len()).sum()
    }
}
