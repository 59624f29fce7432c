//! Publish ledger: SHA-256 digests of what was last published per ebook.
//!
//! Persists a [`PublishLedger`] JSON document at
//! `<state_root>/hashes/<url_safe>.json`.
//! Writes use the atomic `.tmp` + rename pattern.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use deploy_core::{layout, EbookIdentifier};

use crate::error::{io_err, PublishError};

/// Digest key for the cover raster + vector sources.
pub const IMAGES_KEY: &str = "images";
/// Digest key for the `src/` tree listing.
pub const SOURCES_KEY: &str = "sources";

/// Maps a concern key to its last published SHA-256 hex digest.
pub type DigestMap = HashMap<String, String>;

/// On-disk ledger payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishLedger {
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub digests: DigestMap,
}

impl PublishLedger {
    pub fn empty() -> Self {
        Self {
            published_at: Utc::now(),
            digests: DigestMap::new(),
        }
    }

    pub fn digest(&self, key: &str) -> Option<&str> {
        self.digests.get(key).map(String::as_str)
    }
}

/// SHA-256 over `parts`, each length-prefixed so part boundaries matter.
pub fn digest_parts(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Load the ledger for `identifier`; `None` if nothing was recorded yet.
pub fn load_at(
    state_root: &Path,
    identifier: &EbookIdentifier,
) -> Result<Option<PublishLedger>, PublishError> {
    let path = layout::ledger_path(state_root, identifier);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save the ledger for `identifier` atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(
    state_root: &Path,
    identifier: &EbookIdentifier,
    ledger: &PublishLedger,
) -> Result<(), PublishError> {
    let path = layout::ledger_path(state_root, identifier);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid ledger path")));
    };

    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(ledger)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// Merge freshly published digests into the stored ledger.
///
/// Only keys present in `published` are replaced; a concern that was not
/// rebuilt keeps its previous digest.
pub fn record_at(
    state_root: &Path,
    identifier: &EbookIdentifier,
    published: &DigestMap,
) -> Result<PublishLedger, PublishError> {
    let mut ledger = load_at(state_root, identifier)?.unwrap_or_else(PublishLedger::empty);
    ledger.published_at = Utc::now();
    for (key, digest) in published {
        ledger.digests.insert(key.clone(), digest.clone());
    }
    save_at(state_root, identifier, &ledger)?;
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id() -> EbookIdentifier {
        EbookIdentifier::new("jane-austen/emma").unwrap()
    }

    #[test]
    fn none_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(load_at(tmp.path(), &id()).unwrap().is_none());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut ledger = PublishLedger::empty();
        ledger
            .digests
            .insert(IMAGES_KEY.to_string(), "deadbeef".to_string());
        save_at(tmp.path(), &id(), &ledger).unwrap();

        let loaded = load_at(tmp.path(), &id()).unwrap().expect("ledger");
        assert_eq!(loaded, ledger);
        assert!(tmp.path().join("hashes/jane-austen_emma.json").exists());
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &id(), &PublishLedger::empty()).unwrap();
        let tmp_path = layout::ledger_path(tmp.path(), &id()).with_extension("json.tmp");
        assert!(
            !tmp_path.exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn record_keeps_digests_of_concerns_not_republished() {
        let tmp = TempDir::new().unwrap();
        let mut first = DigestMap::new();
        first.insert(IMAGES_KEY.to_string(), "img-1".to_string());
        first.insert(SOURCES_KEY.to_string(), "src-1".to_string());
        record_at(tmp.path(), &id(), &first).unwrap();

        let mut second = DigestMap::new();
        second.insert(SOURCES_KEY.to_string(), "src-2".to_string());
        let ledger = record_at(tmp.path(), &id(), &second).unwrap();

        assert_eq!(ledger.digest(IMAGES_KEY), Some("img-1"));
        assert_eq!(ledger.digest(SOURCES_KEY), Some("src-2"));
    }

    #[test]
    fn digest_respects_part_boundaries() {
        assert_ne!(digest_parts(&[b"ab", b"c"]), digest_parts(&[b"a", b"bc"]));
        assert_eq!(digest_parts(&[b"x"]), digest_parts(&[b"x"]));
        assert_eq!(digest_parts(&[b"x"]).len(), 64);
    }
}
