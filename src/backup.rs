//! Backup and restore of pre-mutation tag state
//!
//! Before the engine dispatches any action, the tag state of every matched
//! resource is written to a timestamped JSON file. Restoring replays that
//! file: each listed resource's live tag set is overwritten with the
//! captured map, a full replace rather than a merge. Restore shares the
//! dispatcher's non-transactional contract - the first failure aborts the
//! run and earlier restores stand.

use crate::cloud::TagClient;
use crate::engine::Matched;
use crate::error::Error;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Captured tag state of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub id: String,
    /// Written as an empty object for untagged resources; `null` is
    /// accepted on read
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: HashMap<String, String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Snapshot every matched resource's tags into a new backup file
///
/// The file lands in `directory` (the system temp dir when `None`) and the
/// path is returned so the caller can hand it to [`TagRestorer`] later.
pub fn backup_matched(
    matched: &BTreeMap<String, Matched>,
    directory: Option<&Path>,
) -> Result<PathBuf, Error> {
    let entries: Vec<BackupEntry> = matched
        .iter()
        .map(|(id, m)| BackupEntry {
            id: id.clone(),
            tags: m.resource.tags.clone(),
        })
        .collect();

    let directory = directory
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    let filename = format!(
        "tagwarden-backup-{}.json",
        Utc::now().format("%Y%m%dT%H%M%S%3f")
    );
    let path = directory.join(filename);

    let wrap = |source| Error::BackupWrite {
        path: path.display().to_string(),
        source,
    };
    let contents = serde_json::to_vec_pretty(&entries)
        .map_err(|e| wrap(std::io::Error::other(e)))?;
    std::fs::write(&path, contents).map_err(wrap)?;

    info!(path = %path.display(), entries = entries.len(), "Backup written");
    Ok(path)
}

/// Replays a backup file against the live tag state
pub struct TagRestorer {
    client: Arc<dyn TagClient>,
    backup: Vec<BackupEntry>,
}

impl TagRestorer {
    pub fn from_file(path: impl AsRef<Path>, client: Arc<dyn TagClient>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::BackupRead {
            path: path.display().to_string(),
            source,
        })?;
        let backup = serde_json::from_str(&contents).map_err(|source| Error::BackupParse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { client, backup })
    }

    pub fn entries(&self) -> &[BackupEntry] {
        &self.backup
    }

    /// Overwrite each backed-up resource's tags with the captured map
    ///
    /// Returns the number of resources restored. The read before the write
    /// validates that the resource still exists; the write itself replaces
    /// the whole tag set unconditionally.
    pub async fn restore(&self) -> Result<usize, Error> {
        for entry in &self.backup {
            info!(resource = %entry.id, "Restoring tags");
            let wrap = |source| Error::Restore {
                resource: entry.id.clone(),
                source,
            };
            self.client.read_tags(&entry.id).await.map_err(wrap)?;
            self.client
                .write_tags(&entry.id, entry.tags.clone())
                .await
                .map_err(wrap)?;
        }
        Ok(self.backup.len())
    }
}
