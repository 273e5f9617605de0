//! Durable local cache for collection contents.
//!
//! A process-local key-value slot that survives restarts: each slot is one
//! JSON file holding the ordered list of cached [`Project`] records. Absence
//! of a slot file is equivalent to an empty list; a malformed file is
//! treated as empty, never as an error.
//!
//! Writes are atomic: the new contents land in a temp file in the same
//! directory which is then persisted over the slot file, so a reload
//! immediately after a mutation observes that mutation and a crash mid-write
//! never corrupts the slot.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::models::Project;

/// Slot key for the cart collection.
pub const CART_ITEMS_KEY: &str = "cartItems";
/// Slot key for the wishlist collection.
pub const WISHLIST_ITEMS_KEY: &str = "wishlistItems";

/// Directory-backed durable cache.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    /// Open (creating if needed) a cache directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Load the contents of a slot.
    ///
    /// A missing slot yields an empty list. A slot that cannot be read or
    /// parsed also yields an empty list, with a warning; cache corruption is
    /// never allowed to escalate.
    #[must_use]
    pub fn load(&self, key: &str) -> Vec<Project> {
        let path = self.slot_path(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read cache slot, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt cache slot, treating as empty");
                Vec::new()
            }
        }
    }

    /// Replace the contents of a slot.
    ///
    /// The write is durable before this returns.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if serialization or the atomic write fails.
    pub fn store(&self, key: &str, items: &[Project]) -> std::io::Result<()> {
        let json = serde_json::to_vec(items).map_err(std::io::Error::other)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.slot_path(key))
            .map_err(|e| e.error)?;
        Ok(())
    }

    /// Remove a slot entirely.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the slot file exists but cannot be removed.
    pub fn purge(&self, key: &str) -> std::io::Result<()> {
        match std::fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Path to the slot file for a key.
    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// The backing directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
