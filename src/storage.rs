//! Capability surface each disk exposes to the manifest I/O layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Metadata of a volume (one bucket directory on a disk).
#[derive(Debug, Clone, PartialEq)]
pub struct VolInfo {
    pub name: String,
    pub created: DateTime<Utc>,
}

/// Metadata of a file on a disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub volume: String,
    pub name: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
}

/// Primitive per-disk I/O. Implementations map their failures onto the
/// canonical [`crate::error::StorageError`] taxonomy; the manifest layer
/// never sees implementation-specific errors.
#[async_trait]
pub trait StorageAPI: Send + Sync + std::fmt::Debug {
    async fn make_volume(&self, volume: &str) -> Result<()>;

    async fn stat_volume(&self, volume: &str) -> Result<VolInfo>;

    async fn list_volumes(&self) -> Result<Vec<VolInfo>>;

    async fn delete_volume(&self, volume: &str) -> Result<()>;

    /// Appends `buf` to `path` within `volume`, creating the file and any
    /// missing parents.
    async fn append_file(&self, volume: &str, path: &str, buf: &[u8]) -> Result<()>;

    /// Reads from `offset` into `buf`, returning the number of bytes read
    /// (short only at end of file).
    async fn read_file(&self, volume: &str, path: &str, offset: u64, buf: &mut [u8])
        -> Result<u64>;

    async fn rename_file(
        &self,
        src_volume: &str,
        src_path: &str,
        dst_volume: &str,
        dst_path: &str,
    ) -> Result<()>;

    /// Deletes `path` and prunes now-empty parents up to the volume root.
    async fn delete_file(&self, volume: &str, path: &str) -> Result<()>;

    async fn stat_file(&self, volume: &str, path: &str) -> Result<FileInfo>;
}
