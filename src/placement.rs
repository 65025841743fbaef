//! Deterministic shard-to-disk placement.

/// Returns the order in which an object's shards are laid out across `count`
/// disks: a cyclic rotation of `[1..=count]` starting at the CRC32 of the
/// object name modulo `count`.
///
/// The permutation is a wire-level property recorded in every manifest, so
/// two independent writers of the same object name must derive the identical
/// sequence; the hash function is not substitutable.
pub fn hash_order(object: &str, count: usize) -> Vec<usize> {
    if count == 0 {
        return Vec::new();
    }
    let start = crc32fast::hash(object.as_bytes()) as usize % count;
    (0..count).map(|shift| ((start + shift) % count) + 1).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_is_deterministic() {
        let first = hash_order("pictures/cat.jpg", 16);
        let second = hash_order("pictures/cat.jpg", 16);
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
    }

    #[test]
    fn order_is_a_rotation_of_one_to_n() {
        let order = hash_order("pictures/cat.jpg", 16);
        let start = crc32fast::hash(b"pictures/cat.jpg") as usize % 16;
        let expected: Vec<usize> = (0..16).map(|i| ((start + i) % 16) + 1).collect();
        assert_eq!(order, expected);

        // Every disk position appears exactly once.
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=16).collect::<Vec<_>>());
    }

    #[test]
    fn single_disk_layout() {
        assert_eq!(hash_order("any/object", 1), vec![1]);
    }
}
