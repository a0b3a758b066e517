//! Multi-file credential persistence under the auth folder.
//!
//! Layout: `creds.json` holds the primary credentials, every other
//! `<key>.json` file holds one signal key entry. Contents are opaque.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const CREDS_FILE: &str = "creds.json";

/// Opaque state needed to resume a session without re-pairing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialBundle {
    #[serde(default)]
    pub creds: Value,
    #[serde(default)]
    pub keys: BTreeMap<String, Value>,
}

impl CredentialBundle {
    /// True until the library has written any credentials.
    pub fn is_fresh(&self) -> bool {
        self.creds.is_null()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("auth folder {path} is not usable: {source}")]
    Folder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt credential file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Map a key name onto a safe file stem. Reversed by [`decode_key`].
fn encode_key(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '%' => stem.push_str("%25"),
            '/' => stem.push_str("%2F"),
            ':' => stem.push_str("%3A"),
            other => stem.push(other),
        }
    }
    stem
}

fn decode_key(stem: &str) -> String {
    let mut key = String::with_capacity(stem.len());
    let mut rest = stem;
    while let Some(pos) = rest.find('%') {
        key.push_str(&rest[..pos]);
        let escape = &rest[pos..];
        let decoded = match escape.get(..3) {
            Some("%25") => Some('%'),
            Some("%2F") => Some('/'),
            Some("%3A") => Some(':'),
            _ => None,
        };
        match decoded {
            Some(c) => {
                key.push(c);
                rest = &escape[3..];
            }
            None => {
                key.push('%');
                rest = &escape[1..];
            }
        }
    }
    key.push_str(rest);
    key
}

fn key_file_name(key: &str) -> String {
    format!("{}.json", encode_key(key))
}

#[derive(Debug, Clone)]
pub struct AuthStore {
    folder: PathBuf,
}

impl AuthStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    async fn ensure_folder(&self) -> Result<(), StorageError> {
        let folder_err = |source| StorageError::Folder {
            path: self.folder.clone(),
            source,
        };

        match fs::metadata(&self.folder).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(folder_err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "exists and is not a directory",
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.folder).await.map_err(folder_err)
            }
            Err(e) => Err(folder_err(e)),
        }
    }

    /// Load the persisted bundle, or a fresh one if nothing was saved yet.
    #[tracing::instrument(skip(self), fields(folder = %self.folder.display()))]
    pub async fn load(&self) -> Result<CredentialBundle, StorageError> {
        self.ensure_folder().await?;

        let mut bundle = CredentialBundle::default();
        let mut entries = fs::read_dir(&self.folder)
            .await
            .map_err(|source| StorageError::Read {
                path: self.folder.clone(),
                source,
            })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StorageError::Read {
                path: self.folder.clone(),
                source,
            })?
        {
            let path = entry.path();
            let Some(stem) = path
                .extension()
                .filter(|ext| *ext == "json")
                .and_then(|_| path.file_stem())
                .and_then(|s| s.to_str())
                .map(str::to_string)
            else {
                continue;
            };

            let raw = fs::read(&path).await.map_err(|source| StorageError::Read {
                path: path.clone(),
                source,
            })?;
            let value: Value =
                serde_json::from_slice(&raw).map_err(|source| StorageError::Corrupt {
                    path: path.clone(),
                    source,
                })?;

            if stem == "creds" {
                bundle.creds = value;
            } else {
                bundle.keys.insert(decode_key(&stem), value);
            }
        }

        tracing::debug!(
            fresh = bundle.is_fresh(),
            keys = bundle.keys.len(),
            "credentials loaded"
        );
        Ok(bundle)
    }

    /// Persist every part of the bundle. A `null` key entry deletes that key.
    pub async fn save(&self, bundle: &CredentialBundle) -> Result<(), StorageError> {
        self.ensure_folder().await?;

        if !bundle.creds.is_null() {
            self.write_json(CREDS_FILE, &bundle.creds).await?;
        }
        for (key, value) in &bundle.keys {
            let file_name = key_file_name(key);
            if value.is_null() {
                self.remove(&file_name).await?;
            } else {
                self.write_json(&file_name, value).await?;
            }
        }

        tracing::debug!(keys = bundle.keys.len(), "credentials saved");
        Ok(())
    }

    async fn remove(&self, file_name: &str) -> Result<(), StorageError> {
        let path = self.folder.join(file_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write { path, source }),
        }
    }

    /// Write through a sibling temp file so readers never see half a file.
    async fn write_json(&self, file_name: &str, value: &Value) -> Result<(), StorageError> {
        let path = self.folder.join(file_name);
        let tmp = self.folder.join(format!(".{file_name}.tmp"));
        let write_err = |source| StorageError::Write {
            path: path.clone(),
            source,
        };

        let data = serde_json::to_vec(value).map_err(|e| write_err(e.into()))?;
        fs::write(&tmp, data).await.map_err(write_err)?;
        fs::rename(&tmp, &path).await.map_err(write_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_names_are_made_filesystem_safe() {
        assert_eq!(key_file_name("pre-key/12"), "pre-key%2F12.json");
        assert_eq!(
            key_file_name("session:123@s.whatsapp.net"),
            "session%3A123@s.whatsapp.net.json"
        );
    }

    #[test]
    fn key_names_decode_back() {
        for key in [
            "pre-key/12",
            "session:919876543210.0@s.whatsapp.net",
            "odd%2Fname",
            "100%",
            "plain-key",
        ] {
            assert_eq!(decode_key(&encode_key(key)), key);
        }
        assert_eq!(decode_key("stray%zz"), "stray%zz");
    }

    #[tokio::test]
    async fn load_creates_folder_and_returns_fresh_bundle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let folder = dir.path().join("auth_info");
        let store = AuthStore::new(&folder);

        let bundle = store.load().await.expect("load");

        assert!(bundle.is_fresh());
        assert!(bundle.keys.is_empty());
        assert!(folder.is_dir());
    }

    #[tokio::test]
    async fn saved_bundle_loads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AuthStore::new(dir.path());
        let mut bundle = CredentialBundle {
            creds: json!({ "me": { "id": "123@s.whatsapp.net" }, "registered": true }),
            ..Default::default()
        };
        bundle
            .keys
            .insert("pre-key-1".to_string(), json!({ "public": "abc" }));

        store.save(&bundle).await.expect("save");
        let loaded = store.load().await.expect("load");

        assert_eq!(loaded, bundle);
        assert!(dir.path().join("creds.json").is_file());
        assert!(dir.path().join("pre-key-1.json").is_file());
    }

    #[tokio::test]
    async fn keys_with_separators_survive_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AuthStore::new(dir.path());
        let mut bundle = CredentialBundle {
            creds: json!({ "registered": true }),
            ..Default::default()
        };
        bundle
            .keys
            .insert("pre-key/12".to_string(), json!({ "public": "abc" }));
        bundle.keys.insert(
            "session:919876543210.0@s.whatsapp.net".to_string(),
            json!({ "chain": 1 }),
        );

        store.save(&bundle).await.expect("save");
        let loaded = store.load().await.expect("load");

        assert_eq!(loaded, bundle);
    }

    #[tokio::test]
    async fn null_key_entry_deletes_key_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AuthStore::new(dir.path());
        let mut bundle = CredentialBundle {
            creds: json!({ "registered": true }),
            ..Default::default()
        };
        bundle
            .keys
            .insert("pre-key:7".to_string(), json!({ "public": "abc" }));
        store.save(&bundle).await.expect("first save");
        assert!(dir.path().join("pre-key%3A7.json").is_file());

        bundle.keys.insert("pre-key:7".to_string(), Value::Null);
        bundle
            .keys
            .insert("never-written".to_string(), Value::Null);
        store.save(&bundle).await.expect("second save");

        assert!(!dir.path().join("pre-key%3A7.json").exists());
        assert!(!dir.path().join("never-written.json").exists());
        let loaded = store.load().await.expect("load");
        assert!(loaded.keys.is_empty());
    }

    #[tokio::test]
    async fn later_save_overwrites_creds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AuthStore::new(dir.path());

        store
            .save(&CredentialBundle {
                creds: json!({ "rev": 1 }),
                ..Default::default()
            })
            .await
            .expect("first save");
        store
            .save(&CredentialBundle {
                creds: json!({ "rev": 2 }),
                ..Default::default()
            })
            .await
            .expect("second save");

        let loaded = store.load().await.expect("load");
        assert_eq!(loaded.creds, json!({ "rev": 2 }));
    }

    #[tokio::test]
    async fn folder_that_is_a_file_fails_to_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("auth_info");
        std::fs::write(&path, b"not a dir").expect("write");

        let err = AuthStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Folder { .. }));
    }

    #[tokio::test]
    async fn corrupt_creds_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("creds.json"), b"{ nope").expect("write");

        let err = AuthStore::new(dir.path()).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
