//! Error-ignore taxonomy and read/write quorum reducers.
//!
//! A fan-out never aborts on an error from the ignored sets; every per-disk
//! outcome is collected and the reducers turn the whole slice into a single
//! operation result. Success (`None`) participates in the bucketing, so a
//! clean majority of successful disks reduces to success.

use chrono::{DateTime, Utc};

use crate::error::StorageError;

/// Errors ignored by every disk fan-out.
pub const BASE_IGNORED_ERRS: [StorageError; 3] = [
    StorageError::DiskNotFound,
    StorageError::DiskAccessDenied,
    StorageError::FaultyDisk,
];

/// Errors ignored by object write operations.
pub const OBJECT_OP_IGNORED_ERRS: [StorageError; 4] = [
    StorageError::DiskNotFound,
    StorageError::DiskAccessDenied,
    StorageError::FaultyDisk,
    StorageError::DiskFull,
];

/// Errors ignored by metadata read operations: any reason a single replica
/// might be unavailable or unreadable while the others still answer.
pub const META_OP_IGNORED_ERRS: [StorageError; 8] = [
    StorageError::DiskNotFound,
    StorageError::DiskAccessDenied,
    StorageError::FaultyDisk,
    StorageError::DiskFull,
    StorageError::VolumeNotFound,
    StorageError::FileNotFound,
    StorageError::FileAccessDenied,
    StorageError::CorruptedFormat,
];

/// Whether `err` belongs to `ignored`.
pub fn is_err_ignored(err: StorageError, ignored: &[StorageError]) -> bool {
    ignored.contains(&err)
}

/// Buckets per-disk outcomes by equality, skipping ignored errors, and
/// returns the most common outcome with its count. Ties resolve to the
/// outcome seen first.
pub fn reduce_errs(
    errs: &[Option<StorageError>],
    ignored: &[StorageError],
) -> (usize, Option<StorageError>) {
    let mut buckets: Vec<(Option<StorageError>, usize)> = Vec::new();
    for outcome in errs {
        if let Some(err) = outcome {
            if is_err_ignored(*err, ignored) {
                continue;
            }
        }
        match buckets.iter_mut().find(|(bucketed, _)| bucketed == outcome) {
            Some((_, count)) => *count += 1,
            None => buckets.push((*outcome, 1)),
        }
    }
    let mut max_count = 0;
    let mut max_outcome = None;
    for (outcome, count) in buckets {
        if count > max_count {
            max_count = count;
            max_outcome = outcome;
        }
    }
    (max_count, max_outcome)
}

fn reduce_quorum_errs(
    errs: &[Option<StorageError>],
    ignored: &[StorageError],
    quorum: usize,
    quorum_err: StorageError,
) -> Result<(), StorageError> {
    let (max_count, max_outcome) = reduce_errs(errs, ignored);
    if max_count >= quorum {
        return match max_outcome {
            None => Ok(()),
            Some(err) => Err(err),
        };
    }
    Err(quorum_err)
}

/// Reduces read fan-out outcomes: the most common outcome wins when it meets
/// the read quorum, anything weaker is [`StorageError::ReadQuorum`].
pub fn reduce_read_quorum_errs(
    errs: &[Option<StorageError>],
    ignored: &[StorageError],
    read_quorum: usize,
) -> Result<(), StorageError> {
    reduce_quorum_errs(errs, ignored, read_quorum, StorageError::ReadQuorum)
}

/// Reduces write fan-out outcomes against the write quorum; the default
/// surfaced error is [`StorageError::WriteQuorum`].
pub fn reduce_write_quorum_errs(
    errs: &[Option<StorageError>],
    ignored: &[StorageError],
    write_quorum: usize,
) -> Result<(), StorageError> {
    reduce_quorum_errs(errs, ignored, write_quorum, StorageError::WriteQuorum)
}

/// Statistical mode of the per-replica manifest mod times; `None` slots
/// (unreadable replicas) do not vote. Used to decide which manifest content
/// is authoritative before picking one replica.
pub fn common_mod_time(mod_times: &[Option<DateTime<Utc>>]) -> Option<DateTime<Utc>> {
    let mut max_count = 0;
    let mut mode = None;
    for candidate in mod_times.iter().flatten() {
        let count = mod_times
            .iter()
            .flatten()
            .filter(|time| *time == candidate)
            .count();
        if count > max_count {
            max_count = count;
            mode = Some(*candidate);
        }
    }
    mode
}
