//! On-disk home of the extraction script.
//!
//! Single writer by convention: only the session worker thread touches the
//! store. Saves go through temp-file + rename so a concurrent load never
//! observes a half-written script.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::DEFAULT_LOGIC;
use crate::config::write_atomic;

const LOGIC_FILE: &str = "describe.rhai";

#[derive(Debug, Clone)]
pub struct CodeStore {
    path: PathBuf,
}

impl CodeStore {
    /// Open the store inside `workdir`, creating the directory and seeding
    /// the default script if nothing is there yet. After this, `load` cannot
    /// fail with "missing file" until someone deletes it out from under us.
    pub fn open(workdir: &Path) -> Result<Self> {
        fs::create_dir_all(workdir)
            .with_context(|| format!("failed to create work dir {}", workdir.display()))?;
        let store = Self {
            path: workdir.join(LOGIC_FILE),
        };
        if !store.path.exists() {
            store.reset()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current script source.
    pub fn load(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .with_context(|| format!("failed to load logic from {}", self.path.display()))
    }

    /// Overwrite the stored script.
    pub fn save(&self, text: &str) -> Result<()> {
        write_atomic(&self.path, text)
            .with_context(|| format!("failed to save logic to {}", self.path.display()))
    }

    /// Restore the fixed default script.
    pub fn reset(&self) -> Result<()> {
        self.save(DEFAULT_LOGIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_seeds_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::open(dir.path()).unwrap();
        assert_eq!(store.load().unwrap(), DEFAULT_LOGIC);
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::open(dir.path()).unwrap();
        store.save("fn describe(path) { #{ path: path, x: 1 } }").unwrap();
        assert_eq!(
            store.load().unwrap(),
            "fn describe(path) { #{ path: path, x: 1 } }"
        );
    }

    #[test]
    fn test_reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::open(dir.path()).unwrap();
        store.save("garbage that is not even a script").unwrap();
        store.reset().unwrap();
        assert_eq!(store.load().unwrap(), DEFAULT_LOGIC);
        store.reset().unwrap();
        assert_eq!(store.load().unwrap(), DEFAULT_LOGIC);
    }

    #[test]
    fn test_open_preserves_existing_script() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodeStore::open(dir.path()).unwrap();
        store.save("fn describe(path) { #{ path: path } }").unwrap();
        let reopened = CodeStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.load().unwrap(),
            "fn describe(path) { #{ path: path } }"
        );
    }
}
