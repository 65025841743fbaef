//! Views over the ordered disk set.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::error::StorageError;
use crate::storage::StorageAPI;

/// A shared handle to one disk.
pub type Disk = Arc<dyn StorageAPI>;

/// The ordered disk set. `None` marks a known-missing disk; position `i`
/// corresponds to `distribution[i]` in every manifest of an object, and the
/// ordering is stable for the object's lifetime.
pub type DiskSet = Vec<Option<Disk>>;

/// A fresh random permutation of the disk set, used to spread idempotent
/// reads. Never returns a view stable across calls; null slots are preserved
/// and handled by the consumer as missing disks.
pub fn load_balanced_disks(disks: &[Option<Disk>]) -> DiskSet {
    let mut shuffled: DiskSet = disks.to_vec();
    shuffled.shuffle(&mut thread_rng());
    shuffled
}

/// The post-operation disk view: slots whose error slot is non-empty are
/// nulled out.
pub fn eval_disks(disks: &[Option<Disk>], errs: &[Option<StorageError>]) -> DiskSet {
    debug_assert_eq!(disks.len(), errs.len());
    disks
        .iter()
        .zip(errs)
        .map(|(disk, err)| if err.is_none() { disk.clone() } else { None })
        .collect()
}
