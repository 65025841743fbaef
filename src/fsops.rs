//! Primitive disk I/O wrappers used by the per-disk storage layer.
//!
//! Every operation validates path-component lengths first and maps OS errors
//! onto the canonical taxonomy of [`crate::error::StorageError`]. Files and
//! directories are disjoint namespaces here: statting a directory through
//! [`stat_file`] is an access error, and vice versa.

use std::io::{ErrorKind, SeekFrom};
use std::path::Path;

use chrono::{DateTime, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::{Result, StorageError};
use crate::path::{check_path_length, temp_path};

/// Fallback copy buffer size when the caller supplies no scratch buffer.
const COPY_BUF_SIZE: usize = 32 * 1024;

/// Size and modification time reported by [`stat_file`] and [`stat_dir`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FsStat {
    pub size: u64,
    pub mod_time: DateTime<Utc>,
}

fn file_err(kind: ErrorKind) -> StorageError {
    match kind {
        // A missing parent component surfaces as NotADirectory.
        ErrorKind::NotFound | ErrorKind::NotADirectory => StorageError::FileNotFound,
        ErrorKind::PermissionDenied => StorageError::FileAccessDenied,
        ErrorKind::IsADirectory => StorageError::IsNotRegular,
        ErrorKind::StorageFull => StorageError::DiskFull,
        kind => StorageError::Io(kind),
    }
}

fn dir_err(kind: ErrorKind) -> StorageError {
    match kind {
        ErrorKind::NotFound | ErrorKind::NotADirectory => StorageError::VolumeNotFound,
        ErrorKind::PermissionDenied => StorageError::VolumeAccessDenied,
        ErrorKind::DirectoryNotEmpty => StorageError::VolumeNotEmpty,
        ErrorKind::StorageFull => StorageError::DiskFull,
        kind => StorageError::Io(kind),
    }
}

fn fs_stat(meta: &std::fs::Metadata) -> Result<FsStat> {
    let mod_time = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .map_err(|err| StorageError::Io(err.kind()))?;
    Ok(FsStat { size: meta.len(), mod_time })
}

/// Creates `dir_path` and all missing parents. An existing directory is
/// success; an existing regular file in its place is [`StorageError::VolumeExists`].
pub async fn mkdir(dir_path: impl AsRef<Path>) -> Result<()> {
    let dir_path = dir_path.as_ref();
    check_path_length(dir_path)?;
    match fs::create_dir_all(dir_path).await {
        Ok(()) => Ok(()),
        Err(err) => match err.kind() {
            ErrorKind::AlreadyExists | ErrorKind::NotADirectory => Err(StorageError::VolumeExists),
            ErrorKind::PermissionDenied => Err(StorageError::DiskAccessDenied),
            kind => Err(StorageError::Io(kind)),
        },
    }
}

/// Stats a regular file.
pub async fn stat_file(stat_path: impl AsRef<Path>) -> Result<FsStat> {
    let stat_path = stat_path.as_ref();
    check_path_length(stat_path)?;
    let meta = fs::metadata(stat_path)
        .await
        .map_err(|err| file_err(err.kind()))?;
    if meta.is_dir() {
        return Err(StorageError::FileAccessDenied);
    }
    fs_stat(&meta)
}

/// Stats a directory; the dual of [`stat_file`].
pub async fn stat_dir(stat_path: impl AsRef<Path>) -> Result<FsStat> {
    let stat_path = stat_path.as_ref();
    check_path_length(stat_path)?;
    let meta = fs::metadata(stat_path)
        .await
        .map_err(|err| dir_err(err.kind()))?;
    if !meta.is_dir() {
        return Err(StorageError::VolumeAccessDenied);
    }
    fs_stat(&meta)
}

/// Streams `reader` into a freshly created file, creating missing parents.
///
/// A caller-supplied `scratch` buffer (length >= 1) is reused across reads to
/// avoid per-read allocations. With `declared_size` of `Some(n)` exactly `n`
/// bytes are consumed and an early end of stream is an error; with `None` the
/// stream is drained to its end. Returns the number of bytes written.
pub async fn create_file<R>(
    file_path: impl AsRef<Path>,
    reader: &mut R,
    scratch: Option<&mut [u8]>,
    declared_size: Option<u64>,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let file_path = file_path.as_ref();
    check_path_length(file_path)?;
    if let Some(parent) = file_path.parent() {
        mkdir(parent).await?;
    }
    let mut writer = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)
        .await
        .map_err(|err| file_err(err.kind()))?;

    let mut fallback;
    let buf: &mut [u8] = match scratch {
        Some(scratch) if !scratch.is_empty() => scratch,
        _ => {
            fallback = vec![0u8; COPY_BUF_SIZE];
            &mut fallback
        }
    };

    let mut written: u64 = 0;
    match declared_size {
        Some(size) => {
            let mut remaining = size;
            while remaining > 0 {
                let want = remaining.min(buf.len() as u64) as usize;
                let n = reader
                    .read(&mut buf[..want])
                    .await
                    .map_err(|err| StorageError::Io(err.kind()))?;
                if n == 0 {
                    return Err(StorageError::Io(ErrorKind::UnexpectedEof));
                }
                writer
                    .write_all(&buf[..n])
                    .await
                    .map_err(|err| file_err(err.kind()))?;
                written += n as u64;
                remaining -= n as u64;
            }
        }
        None => loop {
            let n = reader
                .read(buf)
                .await
                .map_err(|err| StorageError::Io(err.kind()))?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(|err| file_err(err.kind()))?;
            written += n as u64;
        },
    }
    writer.flush().await.map_err(|err| file_err(err.kind()))?;
    Ok(written)
}

/// Opens a regular file for reading, positioned at `offset`.
/// Returns the reader and the current file size.
pub async fn open_file(read_path: impl AsRef<Path>, offset: u64) -> Result<(File, u64)> {
    let read_path = read_path.as_ref();
    check_path_length(read_path)?;
    let mut file = File::open(read_path)
        .await
        .map_err(|err| file_err(err.kind()))?;
    let meta = file
        .metadata()
        .await
        .map_err(|err| file_err(err.kind()))?;
    if !meta.is_file() {
        return Err(StorageError::IsNotRegular);
    }
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|err| StorageError::Io(err.kind()))?;
    }
    Ok((file, meta.len()))
}

/// Filesystem rename, creating missing parents of `dst_path`.
pub async fn rename_file(src_path: impl AsRef<Path>, dst_path: impl AsRef<Path>) -> Result<()> {
    let src_path = src_path.as_ref();
    let dst_path = dst_path.as_ref();
    check_path_length(src_path)?;
    check_path_length(dst_path)?;
    if let Some(parent) = dst_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| dir_err(err.kind()))?;
    }
    fs::rename(src_path, dst_path)
        .await
        .map_err(|err| file_err(err.kind()))
}

async fn is_dir_empty(dir_path: &Path) -> bool {
    match fs::read_dir(dir_path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

/// Deletes `delete_path`, then lazily prunes now-empty parent directories up
/// to (but not including) `base_path`. Pruning stops silently at the first
/// non-empty ancestor.
pub async fn delete_file(
    base_path: impl AsRef<Path>,
    delete_path: impl AsRef<Path>,
) -> Result<()> {
    let base_path = base_path.as_ref();
    check_path_length(base_path)?;
    let mut current = delete_path.as_ref().to_path_buf();
    loop {
        check_path_length(&current)?;
        if current.as_path() == base_path {
            return Ok(());
        }
        let meta = fs::metadata(&current)
            .await
            .map_err(|err| file_err(err.kind()))?;
        if meta.is_dir() {
            if !is_dir_empty(&current).await {
                return Ok(());
            }
            fs::remove_dir(&current)
                .await
                .map_err(|err| dir_err(err.kind()))?;
        } else {
            fs::remove_file(&current)
                .await
                .map_err(|err| file_err(err.kind()))?;
        }
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent.to_path_buf(),
            _ => return Ok(()),
        }
    }
}

/// Deletes exactly one file.
pub async fn remove_file(delete_path: impl AsRef<Path>) -> Result<()> {
    let delete_path = delete_path.as_ref();
    check_path_length(delete_path)?;
    fs::remove_file(delete_path)
        .await
        .map_err(|err| file_err(err.kind()))
}

/// Removes exactly one empty directory.
pub async fn remove_dir(delete_path: impl AsRef<Path>) -> Result<()> {
    let delete_path = delete_path.as_ref();
    check_path_length(delete_path)?;
    fs::remove_dir(delete_path)
        .await
        .map_err(|err| dir_err(err.kind()))
}

/// Removes a file or a directory tree recursively. A missing path is success.
pub async fn remove_all(delete_path: impl AsRef<Path>) -> Result<()> {
    let delete_path = delete_path.as_ref();
    check_path_length(delete_path)?;
    let meta = match fs::metadata(delete_path).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(file_err(err.kind())),
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(delete_path).await
    } else {
        fs::remove_file(delete_path).await
    };
    removed.map_err(|err| match err.kind() {
        ErrorKind::NotFound => StorageError::FileNotFound,
        ErrorKind::PermissionDenied => StorageError::FileAccessDenied,
        kind => StorageError::Io(kind),
    })
}

/// Quarantine delete: renames `delete_path` to a unique leaf under
/// `tmp_root`, prunes its now-empty parents from the live tree, then removes
/// the quarantined file. The rename makes the removal non-visible from the
/// live tree atomically and keeps the recursive unlink latency out of the
/// caller's critical section.
pub async fn remove_meta(
    base_path: impl AsRef<Path>,
    delete_path: impl AsRef<Path>,
    tmp_root: impl AsRef<Path>,
) -> Result<()> {
    let delete_path = delete_path.as_ref();
    let tmp = temp_path(tmp_root.as_ref());
    rename_file(delete_path, &tmp).await?;
    if let Some(parent) = delete_path.parent() {
        // The leaf is already gone; pruning failures leave stray empty
        // directories at worst.
        let _ = delete_file(base_path.as_ref(), parent).await;
    }
    remove_all(&tmp).await
}
