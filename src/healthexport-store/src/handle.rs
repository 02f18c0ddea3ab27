use std::path::PathBuf;

use crate::{BlobStore, DatabaseStore, FileStore, MemoryStore, StoreError};

/// A store chosen at runtime from a location string.
#[derive(Clone)]
pub enum StoreHandle {
    Memory(MemoryStore),
    File(FileStore),
    Database(DatabaseStore),
}

impl StoreHandle {
    /// Opens a store from a location:
    ///
    /// * `memory:` - a fresh in-memory store
    /// * `sqlite:...`, `postgres://...`, `postgresql://...` - a database
    /// * `file://<dir>` or a bare path - a directory
    pub async fn open(location: &str) -> Result<Self, StoreError> {
        if location == "memory:" {
            return Ok(Self::Memory(MemoryStore::new()));
        }

        if ["sqlite:", "postgres://", "postgresql://"]
            .iter()
            .any(|scheme| location.starts_with(scheme))
        {
            return Ok(Self::Database(DatabaseStore::connect(location).await?));
        }

        let path = location.strip_prefix("file://").unwrap_or(location);
        if path.is_empty() || path.contains("://") {
            return Err(StoreError::UnsupportedLocation(location.to_owned()));
        }

        Ok(Self::File(FileStore::new(PathBuf::from(path))))
    }

    /// Releases connections held by the store.
    pub async fn close(self) -> Result<(), StoreError> {
        match self {
            StoreHandle::Database(store) => store.close().await,
            StoreHandle::Memory(_) | StoreHandle::File(_) => Ok(()),
        }
    }
}

impl BlobStore for StoreHandle {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        match self {
            StoreHandle::Memory(store) => store.get(key).await,
            StoreHandle::File(store) => store.get(key).await,
            StoreHandle::Database(store) => store.get(key).await,
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        match self {
            StoreHandle::Memory(store) => store.put(key, bytes).await,
            StoreHandle::File(store) => store.put(key, bytes).await,
            StoreHandle::Database(store) => store.put(key, bytes).await,
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self {
            StoreHandle::Memory(store) => store.exists(key).await,
            StoreHandle::File(store) => store.exists(key).await,
            StoreHandle::Database(store) => store.exists(key).await,
        }
    }
}
