//! JSON settings blob persisted on local disk.
//!
//! The engine never interprets the blob; it is loaded once and forwarded
//! as the start payload.  A missing file reads as an empty object.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::SettingsError;

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the blob.  Returns `{}` when the file does not exist yet.
    pub fn load(&self) -> Result<Value, SettingsError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Value::Object(Default::default()));
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the blob as pretty JSON via a sibling temp file and rename.
    pub fn save(&self, settings: &Value) -> Result<(), SettingsError> {
        let body = serde_json::to_string_pretty(settings).map_err(SettingsError::Serialize)?;

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;

        tracing::debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn missing_file_loads_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));

        assert_eq!(store.load().unwrap(), serde_json::json!({}));
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let settings = serde_json::json!({"steps": 30, "model": "sdxl"});

        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap(), settings);
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        assert_matches!(SettingsStore::new(path).load(), Err(SettingsError::Parse { .. }));
    }

    #[test]
    fn unwritable_location_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("missing-dir").join("settings.json"));

        assert_matches!(
            store.save(&serde_json::json!({})),
            Err(SettingsError::Io { .. })
        );
    }
}
