//! The manual log: one operator-curated reference document.

use crate::error::Result;
use crate::store::atomic_write;
use std::path::PathBuf;
use std::sync::RwLock;

/// Free-text background document injected verbatim into every instruction
/// when non-empty. Overwritten wholesale on update, no versioning, no merge.
pub struct ManualLog {
    text: RwLock<String>,
    path: PathBuf,
}

impl ManualLog {
    /// Load the manual from its configured file. Missing file means an empty
    /// manual; a read failure is logged and treated the same way.
    pub fn load(path: PathBuf) -> Self {
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to read manual log");
                String::new()
            }
        };
        Self {
            text: RwLock::new(text),
            path,
        }
    }

    /// Current manual text. Empty when no manual has been set.
    pub fn get(&self) -> String {
        self.text.read().expect("manual lock poisoned").clone()
    }

    /// Replace the manual wholesale and persist it.
    pub fn set(&self, text: &str) -> Result<()> {
        atomic_write(&self.path, text.as_bytes())?;
        *self.text.write().expect("manual lock poisoned") = text.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ManualLog;

    #[test]
    fn missing_file_is_empty_manual() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manual = ManualLog::load(dir.path().join("manual.txt"));
        assert_eq!(manual.get(), "");
    }

    #[test]
    fn set_overwrites_wholesale_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manual.txt");

        let manual = ManualLog::load(path.clone());
        manual.set("first edition").expect("set");
        manual.set("second edition").expect("set again");
        assert_eq!(manual.get(), "second edition");

        let reloaded = ManualLog::load(path);
        assert_eq!(reloaded.get(), "second edition");
    }
}
