//! JSON document repositories
//!
//! Every persisted document (feeds, registries, health state) goes through
//! a [`JsonStore`]: load falls back to the default structure when the file
//! is absent or malformed, save is write-temp-then-atomic-rename so a
//! concurrent invocation never observes a torn document.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, falling back to `T::default()` when the file is
    /// missing or fails to parse. A malformed registry must never crash a
    /// stage run.
    pub fn load(&self) -> T {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!(
                        "[STORE] Malformed document {}, starting empty: {}",
                        self.path.display(),
                        e
                    );
                    T::default()
                }
            },
            Err(_) => T::default(),
        }
    }

    /// Save the document atomically: serialize to a temp file in the same
    /// directory, then rename over the target.
    pub fn save(&self, value: &T) -> Result<()> {
        let parent = self
            .path
            .parent()
            .context("Store path has no parent directory")?;
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;

        let content =
            serde_json::to_vec_pretty(value).context("Failed to serialize document")?;

        let tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
        fs::write(tmp.path(), &content)
            .with_context(|| format!("Failed to write temp file for {}", self.path.display()))?;
        tmp.persist(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to replace {}: {}", self.path.display(), e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Doc {
        counter: u32,
        entries: BTreeMap<String, String>,
    }

    #[test]
    fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("doc.json"));
        assert_eq!(store.load(), Doc::default());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("doc.json"));

        let mut doc = Doc::default();
        doc.counter = 7;
        doc.entries.insert("a".into(), "b".into());
        store.save(&doc).unwrap();

        assert_eq!(store.load(), doc);
    }

    #[test]
    fn test_malformed_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{ not json ]").unwrap();

        let store: JsonStore<Doc> = JsonStore::new(&path);
        assert_eq!(store.load(), Doc::default());
    }

    #[test]
    fn test_save_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("doc.json"));

        let mut doc = Doc::default();
        doc.counter = 1;
        store.save(&doc).unwrap();
        doc.counter = 2;
        store.save(&doc).unwrap();

        assert_eq!(store.load().counter, 2);
    }
}
