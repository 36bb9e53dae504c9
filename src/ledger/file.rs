// src/ledger/file.rs
//! On-disk ledger: one small JSON file per entity.
//!
//! Files are named by the SHA-256 of the entity id, so arbitrary ids map to
//! safe file names and distinct entities never share a file (no cross-key
//! locking). A write goes to its own temp file which is then renamed over the
//! target; a reader sees either the old or the new record, never half of one,
//! and overlapping writers of one entity never share a temp file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt};

use super::{SeenItemsLedger, SeenRecord};
use crate::error::PersistenceError;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    entity_id: String,
    #[serde(flatten)]
    record: SeenRecord,
}

#[derive(Debug, Clone)]
pub struct FileLedger {
    dir: PathBuf,
}

impl FileLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, entity_id: &str) -> PathBuf {
        let digest = Sha256::digest(entity_id.as_bytes());
        self.dir.join(format!("{digest:x}.json"))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating ledger dir {}", self.dir.display()))?;

        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
        let written = async {
            let mut f = fs::File::create(&tmp)
                .await
                .with_context(|| format!("creating {}", tmp.display()))?;
            f.write_all(bytes).await.context("writing record")?;
            f.sync_all().await.context("syncing record")?;
            drop(f);
            fs::rename(&tmp, path)
                .await
                .with_context(|| format!("renaming into {}", path.display()))
        }
        .await;
        if written.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        written
    }
}

#[async_trait::async_trait]
impl SeenItemsLedger for FileLedger {
    async fn get(&self, entity_id: &str) -> SeenRecord {
        let path = self.path_for(entity_id);
        let raw = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SeenRecord::default(),
            // The entity may well have a stored record we cannot see right now.
            // Treat it as polled before so its current items get notified
            // (duplicates) instead of silently recorded (loss).
            Err(e) => {
                tracing::warn!(
                    entity = entity_id,
                    error = %e,
                    "ledger read failed; treating as polled with no seen ids"
                );
                return SeenRecord::from_ids(Vec::<String>::new());
            }
        };

        match serde_json::from_str::<StoredRecord>(&raw) {
            Ok(stored) if stored.entity_id == entity_id => stored.record,
            Ok(stored) => {
                tracing::warn!(
                    entity = entity_id,
                    stored = %stored.entity_id,
                    "ledger file belongs to another entity; treating as empty"
                );
                SeenRecord::default()
            }
            Err(e) => {
                tracing::warn!(entity = entity_id, error = %e, "corrupt ledger record; treating as empty");
                SeenRecord::default()
            }
        }
    }

    async fn put(&self, entity_id: &str, record: SeenRecord) -> Result<(), PersistenceError> {
        let stored = StoredRecord {
            entity_id: entity_id.to_string(),
            record,
        };
        let bytes = serde_json::to_vec(&stored)
            .map_err(|e| PersistenceError::new(entity_id, e))?;
        let path = self.path_for(entity_id);
        self.write_atomic(&path, &bytes)
            .await
            .map_err(|e| PersistenceError::new(entity_id, e))
    }
}
