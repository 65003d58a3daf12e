//! services/api/src/adapters/blob_fs.rs
//!
//! Stores each deck's original PDF as `{data_dir}/{deck_id}.pdf`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use slide_search_core::domain::blob_name;
use slide_search_core::ports::{BlobStore, PortError, PortResult};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates the store, creating `root` if it does not exist yet.
    pub async fn open(root: impl Into<PathBuf>) -> PortResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            PortError::Unexpected(format!("cannot create {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, deck_id: Uuid) -> PathBuf {
        self.root.join(blob_name(deck_id))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, deck_id: Uuid, data: Bytes) -> PortResult<()> {
        let target = self.path_for(deck_id);
        let staging = self.root.join(format!(".{}.{}.tmp", blob_name(deck_id), Uuid::new_v4()));

        tokio::fs::write(&staging, &data)
            .await
            .map_err(|e| PortError::Unexpected(format!("cannot write {}: {}", staging.display(), e)))?;
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(PortError::Unexpected(format!(
                "cannot move PDF into {}: {}",
                target.display(),
                e
            )));
        }
        Ok(())
    }

    async fn get(&self, deck_id: Uuid) -> PortResult<Bytes> {
        let path = self.path_for(deck_id);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PortError::NotFound(format!("PDF for deck {deck_id}")))
            }
            Err(e) => Err(PortError::Unexpected(format!("cannot read {}: {}", path.display(), e))),
        }
    }

    async fn delete(&self, deck_id: Uuid) -> PortResult<()> {
        let path = self.path_for(deck_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(format!("cannot delete {}: {}", path.display(), e))),
        }
    }
}
