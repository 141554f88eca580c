use std::path::Path;

use log::debug;
use serde_json::Value;
use tokio::fs;

use crate::engine::models::TagField;

/// Local record of the installed release.
///
/// The file holds the release document exactly as the endpoint returned it;
/// only the tag field is ever interpreted.
#[derive(Clone, Copy, Debug)]
pub struct VersionStore {
    field: TagField,
}

impl VersionStore {
    pub fn new(field: TagField) -> Self {
        Self { field }
    }

    /// Installed tag, or `None` when the file is absent or unusable.
    pub async fn read(&self, path: &Path) -> Option<String> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!("version store: cannot read {}: {err}", path.display());
                return None;
            }
        };
        let doc: Value = match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(err) => {
                debug!("version store: {} is not valid JSON: {err}", path.display());
                return None;
            }
        };
        self.field.extract(&doc)
    }

    pub async fn write(&self, path: &Path, raw_json: &str) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("unable to create version dir: {e}"))?;
        }
        fs::write(path, raw_json.as_bytes())
            .await
            .map_err(|e| format!("unable to persist version: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(TagField::TagName);
        assert_eq!(store.read(&dir.path().join("version.json")).await, None);
    }

    #[tokio::test]
    async fn malformed_file_reads_as_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.json");
        std::fs::write(&path, "v1.0.0").unwrap();
        let store = VersionStore::new(TagField::TagName);
        assert_eq!(store.read(&path).await, None);

        std::fs::write(&path, r#"{"versionName": "v1.0.0"}"#).unwrap();
        assert_eq!(store.read(&path).await, None);
    }

    #[tokio::test]
    async fn write_then_read_uses_configured_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("version.json");
        let store = VersionStore::new(TagField::VersionName);
        let raw = r#"{"versionName": "0.9.1", "assets": []}"#;

        store.write(&path, raw).await.unwrap();

        assert_eq!(store.read(&path).await.as_deref(), Some("0.9.1"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), raw);
    }

    #[tokio::test]
    async fn write_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.json");
        let store = VersionStore::new(TagField::TagName);

        store.write(&path, r#"{"tag_name": "v1"}"#).await.unwrap();
        store.write(&path, r#"{"tag_name": "v2"}"#).await.unwrap();

        assert_eq!(store.read(&path).await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // The target path is an existing directory.
        let store = VersionStore::new(TagField::TagName);
        let err = store.write(dir.path(), "{}").await.unwrap_err();
        assert!(err.starts_with("unable to persist version"));
    }
}
