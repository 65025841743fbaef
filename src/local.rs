//! Posix-backed realization of [`StorageAPI`]: one root directory per disk,
//! one subdirectory per volume.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Result, StorageError};
use crate::fsops;
use crate::path::check_path_length;
use crate::storage::{FileInfo, StorageAPI, VolInfo};

/// A single local disk rooted at a directory.
#[derive(Debug)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    /// Binds a disk to `root`. A missing root is a missing disk, not an
    /// empty one.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => Ok(Self { root }),
            Ok(_) => Err(StorageError::DiskNotFound),
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Err(StorageError::DiskNotFound),
                ErrorKind::PermissionDenied => Err(StorageError::DiskAccessDenied),
                kind => Err(StorageError::Io(kind)),
            },
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn volume_path(&self, volume: &str) -> PathBuf {
        self.root.join(volume)
    }

    fn file_path(&self, volume: &str, path: &str) -> PathBuf {
        self.root.join(volume).join(path)
    }

    async fn check_volume(&self, volume: &str) -> Result<()> {
        fsops::stat_dir(self.volume_path(volume)).await.map(|_| ())
    }
}

#[async_trait]
impl StorageAPI for LocalDisk {
    async fn make_volume(&self, volume: &str) -> Result<()> {
        let volume_path = self.volume_path(volume);
        check_path_length(&volume_path)?;
        if fsops::stat_dir(&volume_path).await.is_ok() {
            return Err(StorageError::VolumeExists);
        }
        fsops::mkdir(&volume_path).await
    }

    async fn stat_volume(&self, volume: &str) -> Result<VolInfo> {
        let stat = fsops::stat_dir(self.volume_path(volume)).await?;
        Ok(VolInfo { name: volume.to_string(), created: stat.mod_time })
    }

    async fn list_volumes(&self) -> Result<Vec<VolInfo>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => StorageError::DiskNotFound,
            ErrorKind::PermissionDenied => StorageError::DiskAccessDenied,
            kind => StorageError::Io(kind),
        })?;
        let mut volumes = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(meta) = entry.metadata().await else { continue };
            if !meta.is_dir() {
                continue;
            }
            let created = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .map_err(|err| StorageError::Io(err.kind()))?;
            volumes.push(VolInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                created,
            });
        }
        Ok(volumes)
    }

    async fn delete_volume(&self, volume: &str) -> Result<()> {
        fsops::remove_dir(self.volume_path(volume)).await
    }

    async fn append_file(&self, volume: &str, path: &str, buf: &[u8]) -> Result<()> {
        self.check_volume(volume).await?;
        let file_path = self.file_path(volume, path);
        check_path_length(&file_path)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| match err.kind() {
                    ErrorKind::PermissionDenied => StorageError::FileAccessDenied,
                    kind => StorageError::Io(kind),
                })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound | ErrorKind::NotADirectory => StorageError::FileNotFound,
                ErrorKind::PermissionDenied => StorageError::FileAccessDenied,
                ErrorKind::IsADirectory => StorageError::IsNotRegular,
                ErrorKind::StorageFull => StorageError::DiskFull,
                kind => StorageError::Io(kind),
            })?;
        file.write_all(buf).await.map_err(|err| match err.kind() {
            ErrorKind::StorageFull => StorageError::DiskFull,
            kind => StorageError::Io(kind),
        })?;
        file.flush().await.map_err(|err| StorageError::Io(err.kind()))
    }

    async fn read_file(
        &self,
        volume: &str,
        path: &str,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<u64> {
        self.check_volume(volume).await?;
        let (mut file, _) = fsops::open_file(self.file_path(volume, path), offset).await?;
        let mut read = 0;
        while read < buf.len() {
            let n = file
                .read(&mut buf[read..])
                .await
                .map_err(|err| StorageError::Io(err.kind()))?;
            if n == 0 {
                break;
            }
            read += n;
        }
        Ok(read as u64)
    }

    async fn rename_file(
        &self,
        src_volume: &str,
        src_path: &str,
        dst_volume: &str,
        dst_path: &str,
    ) -> Result<()> {
        self.check_volume(src_volume).await?;
        self.check_volume(dst_volume).await?;
        fsops::rename_file(
            self.file_path(src_volume, src_path),
            self.file_path(dst_volume, dst_path),
        )
        .await
    }

    async fn delete_file(&self, volume: &str, path: &str) -> Result<()> {
        self.check_volume(volume).await?;
        fsops::delete_file(self.volume_path(volume), self.file_path(volume, path)).await
    }

    async fn stat_file(&self, volume: &str, path: &str) -> Result<FileInfo> {
        self.check_volume(volume).await?;
        let stat = fsops::stat_file(self.file_path(volume, path)).await?;
        Ok(FileInfo {
            volume: volume.to_string(),
            name: path.to_string(),
            size: stat.size,
            mod_time: stat.mod_time,
        })
    }
}
