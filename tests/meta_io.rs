//! Quorum behavior of the parallel manifest I/O, against real local disks
//! plus deliberately failing ones.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use xlstore::config::CoreContext;
use xlstore::credential::Credential;
use xlstore::disks::{Disk, DiskSet};
use xlstore::local::LocalDisk;
use xlstore::manifest::{StatInfo, XlMetaV1};
use xlstore::storage::{FileInfo, VolInfo};
use xlstore::{meta_io, Result, StorageAPI, StorageError};

const BUCKET: &str = "bucket";
const OBJECT: &str = "pictures/cat.jpg";

/// A disk that fails every operation with a fixed error.
#[derive(Debug)]
struct BrokenDisk(StorageError);

#[async_trait]
impl StorageAPI for BrokenDisk {
    async fn make_volume(&self, _volume: &str) -> Result<()> {
        Err(self.0)
    }
    async fn stat_volume(&self, _volume: &str) -> Result<VolInfo> {
        Err(self.0)
    }
    async fn list_volumes(&self) -> Result<Vec<VolInfo>> {
        Err(self.0)
    }
    async fn delete_volume(&self, _volume: &str) -> Result<()> {
        Err(self.0)
    }
    async fn append_file(&self, _volume: &str, _path: &str, _buf: &[u8]) -> Result<()> {
        Err(self.0)
    }
    async fn read_file(
        &self,
        _volume: &str,
        _path: &str,
        _offset: u64,
        _buf: &mut [u8],
    ) -> Result<u64> {
        Err(self.0)
    }
    async fn rename_file(
        &self,
        _src_volume: &str,
        _src_path: &str,
        _dst_volume: &str,
        _dst_path: &str,
    ) -> Result<()> {
        Err(self.0)
    }
    async fn delete_file(&self, _volume: &str, _path: &str) -> Result<()> {
        Err(self.0)
    }
    async fn stat_file(&self, _volume: &str, _path: &str) -> Result<FileInfo> {
        Err(self.0)
    }
}

struct TestSet {
    _dirs: Vec<TempDir>,
    disks: DiskSet,
}

async fn local_disks(count: usize) -> TestSet {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let mut dirs = Vec::new();
    let mut disks: DiskSet = Vec::new();
    for _ in 0..count {
        let dir = TempDir::new().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        disk.make_volume(BUCKET).await.unwrap();
        disks.push(Some(Arc::new(disk) as Disk));
        dirs.push(dir);
    }
    TestSet { _dirs: dirs, disks }
}

fn test_meta() -> XlMetaV1 {
    let ctx = CoreContext::new(Credential::new("accesskey", "verysecretkey").unwrap());
    let mut meta = XlMetaV1::new(OBJECT, 2, 2, &ctx);
    meta.stat = StatInfo {
        size: 1024,
        mod_time: Utc.with_ymd_and_hms(2017, 3, 27, 19, 36, 42).unwrap(),
    };
    meta.add_object_part(1, "part.1", "etag1", 1024);
    meta
}

#[tokio::test]
async fn write_unique_stamps_shard_indexes() {
    let set = local_disks(4).await;
    let metas = vec![test_meta(); 4];

    let survivors = meta_io::write_unique_xl_metadata(&set.disks, BUCKET, OBJECT, &metas, 3)
        .await
        .unwrap();
    assert!(survivors.iter().all(Option::is_some));

    for (index, disk) in set.disks.iter().enumerate() {
        let meta = meta_io::read_xl_meta(disk.as_ref().unwrap().as_ref(), BUCKET, OBJECT)
            .await
            .unwrap();
        assert_eq!(meta.erasure.index, index + 1);
        assert_eq!(meta.parts, metas[index].parts);
        assert!(meta.is_valid());
    }
}

#[tokio::test]
async fn write_quorum_failure_unwinds_partial_writes() {
    // Disks 0 and 1 accept the write, 2 and 3 are full; quorum 3 cannot be
    // met and the two successful manifests must be rolled back.
    let set = local_disks(2).await;
    let mut disks = set.disks.clone();
    disks.push(Some(Arc::new(BrokenDisk(StorageError::DiskFull)) as Disk));
    disks.push(Some(Arc::new(BrokenDisk(StorageError::DiskFull)) as Disk));

    let metas = vec![test_meta(); 4];
    let err = meta_io::write_unique_xl_metadata(&disks, BUCKET, OBJECT, &metas, 3)
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::WriteQuorum);

    for disk in set.disks.iter().flatten() {
        assert_eq!(
            meta_io::read_xl_meta(disk.as_ref(), BUCKET, OBJECT).await,
            Err(StorageError::FileNotFound)
        );
    }
}

#[tokio::test]
async fn missing_disks_count_against_quorum() {
    let set = local_disks(2).await;
    let mut disks = set.disks.clone();
    disks.push(None);
    disks.push(None);

    let metas = vec![test_meta(); 4];
    // Two successes out of four meet quorum 2.
    let survivors = meta_io::write_unique_xl_metadata(&disks, BUCKET, OBJECT, &metas, 2)
        .await
        .unwrap();
    assert_eq!(survivors.iter().filter(|disk| disk.is_some()).count(), 2);
    assert!(survivors[2].is_none());
    assert!(survivors[3].is_none());

    // But not quorum 3.
    assert!(matches!(
        meta_io::write_unique_xl_metadata(&disks, BUCKET, "other/object", &metas, 3).await,
        Err(StorageError::WriteQuorum)
    ));
}

#[tokio::test]
async fn write_same_replicates_one_value() {
    let set = local_disks(3).await;
    let meta = test_meta();

    meta_io::write_same_xl_metadata(&set.disks, BUCKET, OBJECT, &meta, 2)
        .await
        .unwrap();

    for (index, disk) in set.disks.iter().enumerate() {
        let read = meta_io::read_xl_meta(disk.as_ref().unwrap().as_ref(), BUCKET, OBJECT)
            .await
            .unwrap();
        // Identical content apart from the per-disk shard index.
        assert_eq!(read.erasure.index, index + 1);
        assert_eq!(read.stat, meta.stat);
        assert_eq!(read.parts, meta.parts);
    }
}

#[tokio::test]
async fn rename_moves_manifests_across_prefixes() {
    let set = local_disks(4).await;
    let metas = vec![test_meta(); 4];
    meta_io::write_unique_xl_metadata(&set.disks, BUCKET, "tmp/upload", &metas, 3)
        .await
        .unwrap();

    meta_io::rename_xl_metadata(&set.disks, BUCKET, "tmp/upload", BUCKET, OBJECT, 3)
        .await
        .unwrap();

    for disk in set.disks.iter().flatten() {
        meta_io::read_xl_meta(disk.as_ref(), BUCKET, OBJECT).await.unwrap();
        assert_eq!(
            meta_io::read_xl_meta(disk.as_ref(), BUCKET, "tmp/upload").await,
            Err(StorageError::FileNotFound)
        );
    }
}

#[tokio::test]
async fn rename_quorum_failure_restores_sources() {
    let set = local_disks(2).await;
    let mut disks = set.disks.clone();
    disks.push(Some(Arc::new(BrokenDisk(StorageError::FaultyDisk)) as Disk));
    disks.push(Some(Arc::new(BrokenDisk(StorageError::FaultyDisk)) as Disk));

    let metas = vec![test_meta(); 2];
    meta_io::write_unique_xl_metadata(&set.disks, BUCKET, "tmp/upload", &metas, 2)
        .await
        .unwrap();

    assert!(matches!(
        meta_io::rename_xl_metadata(&disks, BUCKET, "tmp/upload", BUCKET, OBJECT, 3).await,
        Err(StorageError::WriteQuorum)
    ));

    // The two real disks got their source manifests back.
    for disk in set.disks.iter().flatten() {
        meta_io::read_xl_meta(disk.as_ref(), BUCKET, "tmp/upload").await.unwrap();
        assert_eq!(
            meta_io::read_xl_meta(disk.as_ref(), BUCKET, OBJECT).await,
            Err(StorageError::FileNotFound)
        );
    }
}

#[tokio::test]
async fn reads_survive_broken_replicas() {
    let set = local_disks(4).await;
    let metas = vec![test_meta(); 4];
    meta_io::write_unique_xl_metadata(&set.disks, BUCKET, OBJECT, &metas, 3)
        .await
        .unwrap();

    // Break two replicas: one loses the manifest, one holds garbage.
    let disk0 = set.disks[0].as_ref().unwrap();
    meta_io::delete_xl_metadata(disk0.as_ref(), BUCKET, OBJECT).await.unwrap();
    let disk1 = set.disks[1].as_ref().unwrap();
    disk1.delete_file(BUCKET, "pictures/cat.jpg/xl.json").await.unwrap();
    disk1
        .append_file(BUCKET, "pictures/cat.jpg/xl.json", b"not json")
        .await
        .unwrap();

    let parts = meta_io::read_xl_meta_parts(&set.disks, BUCKET, OBJECT, 2).await.unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].number, 1);

    let (stat, _user_meta) = meta_io::read_xl_meta_stat(&set.disks, BUCKET, OBJECT, 2)
        .await
        .unwrap();
    assert_eq!(stat.size, 1024);
}

#[tokio::test]
async fn all_replicas_missing_reduces_over_read_quorum() {
    let set = local_disks(4).await;

    // No manifest was ever written; every reply is FileNotFound, which
    // dominates and meets the read quorum.
    assert_eq!(
        meta_io::read_xl_meta_parts(&set.disks, BUCKET, OBJECT, 3).await,
        Err(StorageError::FileNotFound)
    );

    // With all disks missing entirely nothing dominates over quorum.
    let gone: DiskSet = vec![None, None, None, None];
    assert_eq!(
        meta_io::read_xl_meta_parts(&gone, BUCKET, OBJECT, 5).await,
        Err(StorageError::ReadQuorum)
    );
}

#[tokio::test]
async fn read_latest_picks_modal_mod_time() {
    let set = local_disks(4).await;
    let fresh = test_meta();

    let mut stale = fresh.clone();
    stale.stat.mod_time = fresh.stat.mod_time - chrono::Duration::seconds(60);
    stale.add_object_part(2, "part.2", "stale-etag", 10);

    // Three fresh replicas, one stale survivor of an earlier write.
    let metas = vec![fresh.clone(), fresh.clone(), fresh.clone(), stale];
    meta_io::write_unique_xl_metadata(&set.disks, BUCKET, OBJECT, &metas, 3)
        .await
        .unwrap();

    let latest = meta_io::read_latest_xl_meta(&set.disks, BUCKET, OBJECT, 3)
        .await
        .unwrap();
    assert_eq!(latest.stat.mod_time, fresh.stat.mod_time);
    assert_eq!(latest.parts.len(), 1);

    let (metas, errs) = meta_io::read_all_xl_metadata(&set.disks, BUCKET, OBJECT).await;
    assert_eq!(metas.iter().flatten().count(), 4);
    assert!(errs.iter().all(Option::is_none));
}
