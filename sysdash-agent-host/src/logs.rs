//! Log sources exposed by the local node
//!
//! Only tracks which files are available; reading and tailing them belongs
//! to the presentation side.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LogSourceError {
    #[error("log file {0} does not exist")]
    NotFound(PathBuf),
    #[error("log path {0} is not a regular file")]
    NotAFile(PathBuf),
}

/// Set of log files known to the local node
#[derive(Debug, Default, Clone)]
pub struct LogSources {
    available: BTreeSet<PathBuf>,
}

impl LogSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a single file. Returns `false` if it was already tracked.
    pub fn add(&mut self, path: impl AsRef<Path>) -> Result<bool, LogSourceError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|_| LogSourceError::NotFound(path.to_path_buf()))?;
        if !meta.is_file() {
            return Err(LogSourceError::NotAFile(path.to_path_buf()));
        }
        Ok(self.available.insert(path.to_path_buf()))
    }

    /// Track every usable path; unusable ones are logged and skipped.
    /// Returns how many new files were added.
    pub fn add_patterns<S: AsRef<str>>(&mut self, patterns: &[S]) -> usize {
        let mut added = 0;
        for pattern in patterns {
            match self.add(pattern.as_ref()) {
                Ok(true) => {
                    debug!("Tracking log file {}", pattern.as_ref());
                    added += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Skipping log source: {}", e),
            }
        }
        added
    }

    pub fn available(&self) -> Vec<PathBuf> {
        self.available.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reloading_patterns_is_idempotent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let patterns = vec![file.path().to_string_lossy().to_string()];

        let mut logs = LogSources::new();
        assert_eq!(logs.add_patterns(&patterns), 1);
        let before = logs.len();
        assert_eq!(logs.add_patterns(&patterns), 0);
        assert_eq!(logs.len(), before);
    }

    #[test]
    fn test_missing_and_directory_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut logs = LogSources::new();

        assert!(matches!(logs.add(dir.path()), Err(LogSourceError::NotAFile(_))));
        assert!(matches!(
            logs.add(dir.path().join("missing.log")),
            Err(LogSourceError::NotFound(_))
        ));
        assert!(logs.is_empty());
    }
}
