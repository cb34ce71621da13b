use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::errors::StoreError;
use crate::domain::ports::SessionStore;

/// On-disk record
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    session_id: String,
    saved_at: DateTime<Utc>,
}

/// JSON file holding the active session id
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash never leaves a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store backed by `path`; the parent directory is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session_id: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let record = SessionRecord {
            session_id: session_id.to_string(),
            saved_at: Utc::now(),
        };
        let temp = self.temp_path();
        fs::write(&temp, serde_json::to_vec_pretty(&record)?)?;
        fs::rename(&temp, &self.path)?;

        debug!(path = %self.path.display(), session_id, "session id persisted");
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let record: SessionRecord = serde_json::from_str(&contents)?;
        let session_id = record.session_id.trim();
        if session_id.is_empty() {
            return Ok(None);
        }
        Ok(Some(session_id.to_string()))
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "session id cleared");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
