//! Per-path shared-read-lock registry.
//!
//! In-flight shard reads must never observe a manifest rewrite torn in the
//! middle, so every reader of a file registers here and every rewriter takes
//! the exclusive side of the same lock. The registry is the only mutable
//! shared state in the core; one mutex guards the refcount table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Process-wide mapping from path to a reference-counted read/write lock.
#[derive(Default)]
pub struct IoPool {
    slots: Mutex<HashMap<PathBuf, PoolSlot>>,
}

struct PoolSlot {
    lock: Arc<RwLock<()>>,
    refs: usize,
}

/// Shared-read lease returned by [`IoPool::open`]. Concurrent readers of the
/// same path coexist; dropping the lease releases the reader registration.
pub struct ReadLease<'a> {
    pool: &'a IoPool,
    path: PathBuf,
    _guard: OwnedRwLockReadGuard<()>,
}

/// Exclusive lease returned by [`IoPool::lock_write`]. Held while a file is
/// rewritten; blocks out every reader of the same path.
pub struct WriteLease<'a> {
    pool: &'a IoPool,
    path: PathBuf,
    _guard: OwnedRwLockWriteGuard<()>,
}

impl IoPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, path: &Path) -> Arc<RwLock<()>> {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(path.to_path_buf()).or_insert_with(|| PoolSlot {
            lock: Arc::new(RwLock::new(())),
            refs: 0,
        });
        slot.refs += 1;
        slot.lock.clone()
    }

    fn release(&self, path: &Path) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(path) {
            slot.refs -= 1;
            if slot.refs == 0 {
                slots.remove(path);
            }
        }
    }

    /// Registers a reader of `path`, creating the entry on first open, and
    /// waits for any in-flight rewriter to finish.
    pub async fn open(&self, path: impl AsRef<Path>) -> ReadLease<'_> {
        let path = path.as_ref().to_path_buf();
        let lock = self.acquire(&path);
        let guard = lock.read_owned().await;
        ReadLease { pool: self, path, _guard: guard }
    }

    /// Takes the exclusive side for `path`, waiting out all current readers.
    pub async fn lock_write(&self, path: impl AsRef<Path>) -> WriteLease<'_> {
        let path = path.as_ref().to_path_buf();
        let lock = self.acquire(&path);
        let guard = lock.write_owned().await;
        WriteLease { pool: self, path, _guard: guard }
    }

    /// Number of outstanding leases for `path`.
    pub fn lease_count(&self, path: impl AsRef<Path>) -> usize {
        let slots = self.slots.lock().unwrap();
        slots.get(path.as_ref()).map_or(0, |slot| slot.refs)
    }
}

impl Drop for ReadLease<'_> {
    fn drop(&mut self) {
        self.pool.release(&self.path);
    }
}

impl Drop for WriteLease<'_> {
    fn drop(&mut self) {
        self.pool.release(&self.path);
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn readers_share_and_refcount() {
        let pool = IoPool::new();

        let first = pool.open("vol/obj/xl.json").await;
        let second = pool.open("vol/obj/xl.json").await;
        assert_eq!(pool.lease_count("vol/obj/xl.json"), 2);

        drop(first);
        assert_eq!(pool.lease_count("vol/obj/xl.json"), 1);

        // Entry disappears once the last lease is dropped.
        drop(second);
        assert_eq!(pool.lease_count("vol/obj/xl.json"), 0);
    }

    #[tokio::test]
    async fn writer_waits_for_readers() {
        let pool = Arc::new(IoPool::new());

        let lease = pool.open("vol/obj/xl.json").await;

        let writer = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let _write = pool.lock_write("vol/obj/xl.json").await;
            })
        };

        // The writer cannot make progress while the read lease is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());

        drop(lease);
        writer.await.unwrap();
        assert_eq!(pool.lease_count("vol/obj/xl.json"), 0);
    }

    #[tokio::test]
    async fn distinct_paths_do_not_contend() {
        let pool = IoPool::new();
        let _read = pool.open("vol/a/xl.json").await;
        let _write = pool.lock_write("vol/b/xl.json").await;
        assert_eq!(pool.lease_count("vol/a/xl.json"), 1);
        assert_eq!(pool.lease_count("vol/b/xl.json"), 1);
    }
}
