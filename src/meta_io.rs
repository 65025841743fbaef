//! Parallel manifest I/O across the disk set.
//!
//! Every operation fans out one task per disk index; each task writes only
//! its own pre-allocated error slot and the join loop is the barrier before
//! the quorum reducers run. Completion order across disks is arbitrary; all
//! correctness comes from quorum cardinality.

use std::collections::HashMap;

use crate::disks::{eval_disks, load_balanced_disks, Disk, DiskSet};
use crate::error::{Result, StorageError};
use crate::manifest::{pick_valid_xl_meta, ObjectPartInfo, StatInfo, XlMetaV1, XL_META_FILE};
use crate::path::path_join;
use crate::quorum::{
    common_mod_time, is_err_ignored, reduce_read_quorum_errs, reduce_write_quorum_errs,
    META_OP_IGNORED_ERRS, OBJECT_OP_IGNORED_ERRS,
};
use crate::storage::StorageAPI;

/// Reads the whole of `volume/path` from one disk.
async fn read_full(disk: &dyn StorageAPI, volume: &str, path: &str) -> Result<Vec<u8>> {
    let info = disk.stat_file(volume, path).await?;
    let mut buf = vec![0u8; info.size as usize];
    let n = disk.read_file(volume, path, 0, &mut buf).await?;
    buf.truncate(n as usize);
    Ok(buf)
}

/// Reads and decodes `xl.json` for an object from one disk. A manifest that
/// is present but undecodable is corruption, not absence.
pub async fn read_xl_meta(disk: &dyn StorageAPI, bucket: &str, object: &str) -> Result<XlMetaV1> {
    let data = read_full(disk, bucket, &path_join(&[object, XL_META_FILE])).await?;
    serde_json::from_slice(&data).map_err(|err| {
        tracing::warn!(bucket, object, %err, "undecodable xl.json");
        StorageError::CorruptedFormat
    })
}

/// Writes `xl.json` for an object to one disk.
pub async fn write_xl_metadata(
    disk: &dyn StorageAPI,
    bucket: &str,
    prefix: &str,
    meta: &XlMetaV1,
) -> Result<()> {
    let json_file = path_join(&[prefix, XL_META_FILE]);
    let data = serde_json::to_vec(meta).map_err(|err| {
        tracing::error!(bucket, prefix, %err, "unable to marshal xl.json");
        StorageError::CorruptedFormat
    })?;
    disk.append_file(bucket, &json_file, &data).await
}

/// Deletes `xl.json` for an object on one disk.
pub async fn delete_xl_metadata(disk: &dyn StorageAPI, bucket: &str, prefix: &str) -> Result<()> {
    disk.delete_file(bucket, &path_join(&[prefix, XL_META_FILE])).await
}

/// Unwind of a failed quorum write: deletes `xl.json` from every disk whose
/// write slot carries no error, in parallel, best effort. Unwind errors are
/// swallowed; the operation already failed.
pub async fn delete_all_xl_metadata(
    disks: &[Option<Disk>],
    bucket: &str,
    prefix: &str,
    errs: &[Option<StorageError>],
) {
    let mut handles = Vec::new();
    for (index, disk) in disks.iter().enumerate() {
        let Some(disk) = disk else { continue };
        if errs[index].is_some() {
            continue;
        }
        let disk = disk.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        handles.push(tokio::spawn(async move {
            if let Err(err) = delete_xl_metadata(disk.as_ref(), &bucket, &prefix).await {
                tracing::warn!(index, %err, "unwind delete of xl.json failed");
            }
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }
}

async fn join_into_slots(
    handles: Vec<(usize, tokio::task::JoinHandle<Result<()>>)>,
    errs: &mut [Option<StorageError>],
) {
    for (index, handle) in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => errs[index] = Some(err),
            // A task that died mid-write left the disk in an unknown state.
            Err(_) => errs[index] = Some(StorageError::FaultyDisk),
        }
    }
}

/// Writes one distinct manifest per disk in parallel, stamping each with its
/// 1-based shard index. On a failed write quorum every partial write is
/// unwound and the operation fails; on success the surviving disk view is
/// returned.
pub async fn write_unique_xl_metadata(
    disks: &[Option<Disk>],
    bucket: &str,
    prefix: &str,
    metas: &[XlMetaV1],
    write_quorum: usize,
) -> Result<DiskSet> {
    if metas.len() != disks.len() {
        return Err(StorageError::InvalidArgument);
    }
    let mut errs: Vec<Option<StorageError>> = vec![None; disks.len()];
    let mut handles = Vec::with_capacity(disks.len());
    for (index, disk) in disks.iter().enumerate() {
        match disk {
            None => errs[index] = Some(StorageError::DiskNotFound),
            Some(disk) => {
                let disk = disk.clone();
                let mut meta = metas[index].clone();
                let bucket = bucket.to_string();
                let prefix = prefix.to_string();
                handles.push((
                    index,
                    tokio::spawn(async move {
                        meta.erasure.index = index + 1;
                        write_xl_metadata(disk.as_ref(), &bucket, &prefix, &meta).await
                    }),
                ));
            }
        }
    }
    join_into_slots(handles, &mut errs).await;

    match reduce_write_quorum_errs(&errs, &OBJECT_OP_IGNORED_ERRS, write_quorum) {
        Ok(()) => Ok(eval_disks(disks, &errs)),
        Err(StorageError::WriteQuorum) => {
            delete_all_xl_metadata(disks, bucket, prefix, &errs).await;
            Err(StorageError::WriteQuorum)
        }
        Err(err) => Err(err),
    }
}

/// Writes the same manifest value to every disk in parallel; each copy still
/// gets its own shard index. Quorum and unwind behave as in
/// [`write_unique_xl_metadata`].
pub async fn write_same_xl_metadata(
    disks: &[Option<Disk>],
    bucket: &str,
    prefix: &str,
    meta: &XlMetaV1,
    write_quorum: usize,
) -> Result<DiskSet> {
    let metas = vec![meta.clone(); disks.len()];
    write_unique_xl_metadata(disks, bucket, prefix, &metas, write_quorum).await
}

/// Generic parallel rename across disks with write-quorum semantics. On a
/// failed quorum the successful renames are undone best effort.
pub async fn rename_on_disks(
    disks: &[Option<Disk>],
    src_bucket: &str,
    src_path: &str,
    dst_bucket: &str,
    dst_path: &str,
    write_quorum: usize,
) -> Result<DiskSet> {
    let mut errs: Vec<Option<StorageError>> = vec![None; disks.len()];
    let mut handles = Vec::with_capacity(disks.len());
    for (index, disk) in disks.iter().enumerate() {
        match disk {
            None => errs[index] = Some(StorageError::DiskNotFound),
            Some(disk) => {
                let disk = disk.clone();
                let src_bucket = src_bucket.to_string();
                let src_path = src_path.to_string();
                let dst_bucket = dst_bucket.to_string();
                let dst_path = dst_path.to_string();
                handles.push((
                    index,
                    tokio::spawn(async move {
                        disk.rename_file(&src_bucket, &src_path, &dst_bucket, &dst_path).await
                    }),
                ));
            }
        }
    }
    join_into_slots(handles, &mut errs).await;

    match reduce_write_quorum_errs(&errs, &OBJECT_OP_IGNORED_ERRS, write_quorum) {
        Ok(()) => Ok(eval_disks(disks, &errs)),
        Err(StorageError::WriteQuorum) => {
            undo_rename(disks, src_bucket, src_path, dst_bucket, dst_path, &errs).await;
            Err(StorageError::WriteQuorum)
        }
        Err(err) => Err(err),
    }
}

/// Renames the renamed files back, in parallel, best effort.
async fn undo_rename(
    disks: &[Option<Disk>],
    src_bucket: &str,
    src_path: &str,
    dst_bucket: &str,
    dst_path: &str,
    errs: &[Option<StorageError>],
) {
    let mut handles = Vec::new();
    for (index, disk) in disks.iter().enumerate() {
        let Some(disk) = disk else { continue };
        if errs[index].is_some() {
            continue;
        }
        let disk = disk.clone();
        let src_bucket = src_bucket.to_string();
        let src_path = src_path.to_string();
        let dst_bucket = dst_bucket.to_string();
        let dst_path = dst_path.to_string();
        handles.push(tokio::spawn(async move {
            if let Err(err) = disk
                .rename_file(&dst_bucket, &dst_path, &src_bucket, &src_path)
                .await
            {
                tracing::warn!(index, %err, "undo of rename failed");
            }
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }
}

/// Renames `xl.json` from one object entry to another on every disk.
pub async fn rename_xl_metadata(
    disks: &[Option<Disk>],
    src_bucket: &str,
    src_entry: &str,
    dst_bucket: &str,
    dst_entry: &str,
    write_quorum: usize,
) -> Result<DiskSet> {
    rename_on_disks(
        disks,
        src_bucket,
        &path_join(&[src_entry, XL_META_FILE]),
        dst_bucket,
        &path_join(&[dst_entry, XL_META_FILE]),
        write_quorum,
    )
    .await
}

// One load-balanced read attempt per disk; the first readable manifest wins.
// Only errors from the metadata ignored set keep the scan going.
async fn read_xl_meta_any(
    disks: &[Option<Disk>],
    bucket: &str,
    object: &str,
    read_quorum: usize,
) -> Result<XlMetaV1> {
    let mut ignored_errs: Vec<Option<StorageError>> = Vec::new();
    for disk in load_balanced_disks(disks) {
        let Some(disk) = disk else {
            ignored_errs.push(Some(StorageError::DiskNotFound));
            continue;
        };
        match read_xl_meta(disk.as_ref(), bucket, object).await {
            Ok(meta) => return Ok(meta),
            Err(err) if is_err_ignored(err, &META_OP_IGNORED_ERRS) => {
                ignored_errs.push(Some(err));
            }
            Err(err) => return Err(err),
        }
    }
    // Every reply was ignorable; collapse them through the read quorum.
    match reduce_read_quorum_errs(&ignored_errs, &[], read_quorum) {
        Ok(()) => Err(StorageError::ReadQuorum),
        Err(err) => Err(err),
    }
}

/// Part list of an object, from whichever disk answers first.
pub async fn read_xl_meta_parts(
    disks: &[Option<Disk>],
    bucket: &str,
    object: &str,
    read_quorum: usize,
) -> Result<Vec<ObjectPartInfo>> {
    let meta = read_xl_meta_any(disks, bucket, object, read_quorum).await?;
    Ok(meta.parts)
}

/// Stat and user metadata of an object, from whichever disk answers first.
pub async fn read_xl_meta_stat(
    disks: &[Option<Disk>],
    bucket: &str,
    object: &str,
    read_quorum: usize,
) -> Result<(StatInfo, HashMap<String, String>)> {
    let meta = read_xl_meta_any(disks, bucket, object, read_quorum).await?;
    Ok((meta.stat, meta.meta))
}

/// Reads the manifest from every disk in parallel, returning per-disk
/// manifests and error slots of equal length.
pub async fn read_all_xl_metadata(
    disks: &[Option<Disk>],
    bucket: &str,
    object: &str,
) -> (Vec<Option<XlMetaV1>>, Vec<Option<StorageError>>) {
    let mut metas: Vec<Option<XlMetaV1>> = vec![None; disks.len()];
    let mut errs: Vec<Option<StorageError>> = vec![None; disks.len()];
    let mut handles = Vec::with_capacity(disks.len());
    for (index, disk) in disks.iter().enumerate() {
        match disk {
            None => errs[index] = Some(StorageError::DiskNotFound),
            Some(disk) => {
                let disk = disk.clone();
                let bucket = bucket.to_string();
                let object = object.to_string();
                handles.push((
                    index,
                    tokio::spawn(async move {
                        read_xl_meta(disk.as_ref(), &bucket, &object).await
                    }),
                ));
            }
        }
    }
    for (index, handle) in handles {
        match handle.await {
            Ok(Ok(meta)) => metas[index] = Some(meta),
            Ok(Err(err)) => errs[index] = Some(err),
            Err(_) => errs[index] = Some(StorageError::FaultyDisk),
        }
    }
    (metas, errs)
}

/// Reads all replicas and returns the authoritative manifest: the first
/// valid one carrying the modal mod time across the set.
pub async fn read_latest_xl_meta(
    disks: &[Option<Disk>],
    bucket: &str,
    object: &str,
    read_quorum: usize,
) -> Result<XlMetaV1> {
    let (metas, errs) = read_all_xl_metadata(disks, bucket, object).await;
    reduce_read_quorum_errs(&errs, &META_OP_IGNORED_ERRS, read_quorum)?;
    let mod_times: Vec<_> = metas
        .iter()
        .map(|meta| meta.as_ref().map(|meta| meta.stat.mod_time))
        .collect();
    let mod_time = common_mod_time(&mod_times).ok_or(StorageError::NoValidManifest)?;
    pick_valid_xl_meta(&metas, mod_time).cloned()
}
