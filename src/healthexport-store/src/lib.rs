#[macro_use]
extern crate log;

mod error;
pub use error::StoreError;

mod memory;
pub use memory::MemoryStore;

mod file;
pub use file::FileStore;

mod db;
pub use db::DatabaseStore;

mod handle;
pub use handle::StoreHandle;

use std::future::Future;

/// Opaque key to bytes storage.
///
/// A `put` replaces the whole value at once: readers see either the previous
/// value or the new one, never a partial write.
pub trait BlobStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, StoreError>> + Send;

    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;
}
