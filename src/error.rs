//! Canonical error taxonomy shared by the file helpers, the disk capability
//! and the manifest I/O layer.
//!
//! Every kind is a unit value so the quorum reducers can bucket per-disk
//! outcomes by plain equality; OS errors that have no canonical name are
//! carried as [`StorageError::Io`] with their [`std::io::ErrorKind`] so the
//! root kind stays comparable without unwrapping anything.

use std::io;

/// Result of storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by the file helpers, [`crate::storage::StorageAPI`]
/// implementations and manifest operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// An empty path or an otherwise unusable argument was supplied.
    #[error("invalid argument")]
    InvalidArgument,
    /// The file does not exist.
    #[error("file not found")]
    FileNotFound,
    /// The file exists but cannot be used as requested, or the path
    /// denotes a directory where a file was expected.
    #[error("file access denied")]
    FileAccessDenied,
    /// A path component exceeds the 255-byte limit.
    #[error("file name too long")]
    FileNameTooLong,
    /// The path denotes something other than a regular file.
    #[error("not of regular file type")]
    IsNotRegular,
    /// The volume (bucket directory) already exists.
    #[error("volume already exists")]
    VolumeExists,
    /// The volume does not exist.
    #[error("volume not found")]
    VolumeNotFound,
    /// The volume still holds entries and cannot be removed.
    #[error("volume is not empty")]
    VolumeNotEmpty,
    /// The path denotes something other than a directory where a volume
    /// was expected.
    #[error("volume access denied")]
    VolumeAccessDenied,
    /// The disk (its root directory) is missing from this node.
    #[error("disk not found")]
    DiskNotFound,
    /// The disk root is present but cannot be accessed.
    #[error("disk access denied")]
    DiskAccessDenied,
    /// The disk has no space left.
    #[error("disk path full")]
    DiskFull,
    /// The disk misbehaved in a way that is neither absence nor a clean
    /// OS error, e.g. an I/O task died mid-operation.
    #[error("disk is faulty")]
    FaultyDisk,
    /// A manifest was present but could not be decoded.
    #[error("format is corrupted")]
    CorruptedFormat,
    /// No replica carried a valid manifest for the requested instant.
    #[error("no valid xl.json present")]
    NoValidManifest,
    /// An object offset beyond the sum of its part sizes.
    #[error("requested range is not satisfiable")]
    InvalidRange,
    /// Fewer replicas answered a read than the configured read quorum.
    #[error("read quorum cannot be met")]
    ReadQuorum,
    /// Fewer replicas accepted a write than the configured write quorum.
    #[error("write quorum cannot be met")]
    WriteQuorum,
    /// Fewer shards survive than are needed to reconstruct the object.
    #[error("insufficient replicas to reconstruct object")]
    InsufficientReplicas,
    /// Any other OS-level failure, preserved by kind.
    #[error("i/o failure: {0:?}")]
    Io(io::ErrorKind),
}
