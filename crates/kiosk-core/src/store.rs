//! Best-effort JSON document persistence
//!
//! Each store owns one flat JSON file. Writes go to a temporary file in the
//! same directory which is then renamed over the target, so a crash leaves
//! either the old or the new document, never a truncated one. There is no
//! fsync: an update can still be lost on power failure.

use std::{
    fs,
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Typed handle on one JSON document
#[derive(Debug, Clone)]
pub struct JsonFile<T> {
    path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a handle; nothing is touched on disk until `load`/`save`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    /// Location of the document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the document
    ///
    /// A missing file yields `None` silently. An unreadable or malformed
    /// file is logged and also yields `None`, so callers start from their
    /// defaults instead of aborting.
    pub fn load(&self) -> Option<T> {
        match self.try_load() {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!(
                    target: "kiosk::store",
                    path = %self.path.display(),
                    error = %e,
                    "Failed to load state file, falling back to defaults"
                );
                None
            }
        }
    }

    /// Read and decode the document, surfacing failures
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn try_load(&self) -> Result<Option<T>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Io(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Parse(format!("{}: {e}", self.path.display())))
    }

    /// Encode and atomically replace the document
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the
    /// temporary file cannot be written or renamed.
    pub fn save(&self, doc: &T) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Io(format!("Failed to create {}: {e}", dir.display())))?;

        let json = serde_json::to_string_pretty(doc)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| {
            Error::Io(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }

    /// Save, logging instead of returning the failure
    ///
    /// The in-memory state has already changed when this runs; the
    /// caller's logical result does not depend on the write.
    pub fn save_or_log(&self, doc: &T) {
        if let Err(e) = self.save(doc) {
            tracing::error!(
                target: "kiosk::store",
                path = %self.path.display(),
                error = %e,
                "Failed to persist state file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(dir.path().join("absent.json"));
        assert!(file.load().is_none());
        assert!(file.try_load().unwrap().is_none());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("nested/data/state.json"));
        let mut doc = BTreeMap::new();
        doc.insert("1".to_string(), true);

        file.save(&doc).unwrap();

        assert_eq!(file.load(), Some(doc));
    }

    #[test]
    fn malformed_file_falls_back_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let file: JsonFile<BTreeMap<String, bool>> = JsonFile::new(&path);

        assert!(file.load().is_none());
        assert!(matches!(file.try_load(), Err(Error::Parse(_))));
    }

    #[test]
    fn save_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("codes.json"));

        file.save(&vec![1, 2, 3]).unwrap();
        file.save(&vec![4]).unwrap();

        assert_eq!(file.load(), Some(vec![4]));
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn save_into_unwritable_location_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let file = JsonFile::new(blocker.join("state.json"));

        assert!(matches!(file.save(&vec![1]), Err(Error::Io(_))));
        file.save_or_log(&vec![1]);
    }
}
