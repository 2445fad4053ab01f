// src/utils/debug.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::error::StorageError;

/// Writes intermediate pipeline artifacts (raw text, sections, unparseable
/// model responses) to a per-document debug directory.
///
/// A disabled dump accepts every call and writes nothing, so callers never
/// have to branch on the debug flag themselves.
#[derive(Debug, Clone)]
pub struct DebugDump {
    dir: Option<PathBuf>,
}

impl DebugDump {
    pub fn enabled<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::debug!("Debug artifacts will be written to {}", dir.display());
        Ok(Self { dir: Some(dir) })
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Saves `contents` as `<dir>/<name>`. Failures are logged, not returned:
    /// a debug artifact must never abort a run.
    pub fn save(&self, name: &str, contents: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let path = dir.join(name);
        match fs::write(&path, contents) {
            Ok(()) => {
                tracing::debug!("Saved debug artifact {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Failed to save debug artifact {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Saves a numbered artifact such as `section_01.txt`.
    pub fn save_numbered(&self, prefix: &str, number: usize, contents: &str) -> Option<PathBuf> {
        self.save(&format!("{}_{:02}.txt", prefix, number), contents)
    }
}
