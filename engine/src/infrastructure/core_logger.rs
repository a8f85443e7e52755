//! Durable writer for captured engine output
//!
//! Lines are appended to the access or error file according to their
//! classification. Unlike the live tail, this writer never drops lines.

use crate::domain::value_objects::LogKind;
use crate::domain::{DomainError, Result};
use crate::domain::entities::LogFiles;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug)]
pub struct CoreLogger {
    access: Mutex<Option<File>>,
    error: Mutex<Option<File>>,
    echo: bool,
}

impl CoreLogger {
    /// Open (creating parent directories) the configured files in append mode.
    /// With `echo`, every line is also emitted through tracing under target `xray`.
    pub fn open(files: &LogFiles, echo: bool) -> Result<Self> {
        let access = files
            .access
            .as_deref()
            .map(open_append)
            .transpose()
            .map_err(|e| DomainError::Io(format!("failed to open access log: {}", e)))?;
        let error = files
            .error
            .as_deref()
            .map(open_append)
            .transpose()
            .map_err(|e| DomainError::Io(format!("failed to open error log: {}", e)))?;
        Ok(Self {
            access: Mutex::new(access),
            error: Mutex::new(error),
            echo,
        })
    }

    /// Classify and persist one line
    pub fn log(&self, line: &str) {
        let kind = LogKind::classify(line);
        let target = match kind {
            LogKind::Access => &self.access,
            LogKind::Error => &self.error,
        };

        let mut guard = target.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(file) = guard.as_mut() {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!(error = %e, kind = ?kind, "Failed to write engine log line");
            }
        }
        drop(guard);

        if self.echo {
            info!(target: "xray", "{}", line);
        }
    }

    /// Release both files; later lines are discarded
    pub fn close(&self) {
        for slot in [&self.access, &self.error] {
            let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(mut file) = guard.take() {
                let _ = file.flush();
            }
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lines_routed_by_kind() {
        let dir = TempDir::new().unwrap();
        let files = LogFiles {
            access: Some(dir.path().join("nested/access.log")),
            error: Some(dir.path().join("error.log")),
        };
        let logger = CoreLogger::open(&files, false).unwrap();

        logger.log("from 1.2.3.4:5 accepted tcp:example.com:443 [X -> Y] email: a@b");
        logger.log("[Error] failed to connect");
        logger.log("no recognizable pattern");
        logger.close();
        logger.log("[Error] after close");

        let access = std::fs::read_to_string(dir.path().join("nested/access.log")).unwrap();
        let error = std::fs::read_to_string(dir.path().join("error.log")).unwrap();
        assert_eq!(access.lines().count(), 1);
        assert!(access.contains("email: a@b"));
        assert_eq!(
            error.lines().collect::<Vec<_>>(),
            vec!["[Error] failed to connect", "no recognizable pattern"]
        );
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error.log");
        std::fs::write(&path, "previous\n").unwrap();

        let files = LogFiles {
            access: None,
            error: Some(path.clone()),
        };
        let logger = CoreLogger::open(&files, false).unwrap();
        logger.log("next");
        logger.close();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous\nnext\n");
    }
}
