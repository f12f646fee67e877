//! Key-group partition assignment
//!
//! Keys are hashed into `max_buckets` key groups and the key groups are
//! split into contiguous ranges, one per worker. The scheme matches the
//! keyed shuffle used by the stream engine in front of the writers:
//!
//! 1. polynomial string hash (multiplier 31) over UTF-16 code units,
//! 2. one murmur3 mixing round, made non-negative,
//! 3. modulo `max_buckets` gives the key group,
//! 4. `key_group * total_workers / max_buckets` gives the worker.
//!
//! Rescaling between `total_workers` values only moves whole key groups,
//! so ownership computed here stays consistent with how live traffic is
//! routed after the job is scaled.

use std::ops::RangeInclusive;

/// Polynomial string hash over UTF-16 code units with 32-bit wrapping.
pub fn key_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// One murmur3 round over a 32-bit hash code, folded into `0..=i32::MAX`.
pub fn murmur_mix(code: i32) -> i32 {
    let mut h = code as u32;
    h = h.wrapping_mul(0xcc9e_2d51);
    h = h.rotate_left(15);
    h = h.wrapping_mul(0x1b87_3593);
    h = h.rotate_left(13);
    h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    h ^= 4;
    h = fmix32(h);

    let signed = h as i32;
    if signed >= 0 {
        signed
    } else if signed == i32::MIN {
        0
    } else {
        -signed
    }
}

const fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Key group a key hashes into.
///
/// `max_buckets` must be non-zero.
pub fn key_group_for(key: &str, max_buckets: u32) -> u32 {
    debug_assert!(max_buckets > 0, "max_buckets must be positive");
    murmur_mix(key_hash(key)) as u32 % max_buckets.max(1)
}

/// Worker owning a key group.
///
/// Requires `0 < total_workers <= max_buckets` and `key_group < max_buckets`.
pub fn worker_for_key_group(key_group: u32, max_buckets: u32, total_workers: u32) -> u32 {
    debug_assert!(key_group < max_buckets, "key group out of range");
    (u64::from(key_group) * u64::from(total_workers) / u64::from(max_buckets.max(1))) as u32
}

/// Worker a key is routed to.
pub fn assign_to_worker(key: &str, max_buckets: u32, total_workers: u32) -> u32 {
    worker_for_key_group(key_group_for(key, max_buckets), max_buckets, total_workers)
}

/// Whether `worker_index` owns the file group.
///
/// For fixed `max_buckets` and `total_workers`, exactly one worker in
/// `0..total_workers` returns true for any file group id.
pub fn owns(file_group_id: &str, max_buckets: u32, total_workers: u32, worker_index: u32) -> bool {
    assign_to_worker(file_group_id, max_buckets, total_workers) == worker_index
}

/// Contiguous key groups owned by a worker, inclusive on both ends.
pub fn key_group_range(
    worker_index: u32,
    max_buckets: u32,
    total_workers: u32,
) -> RangeInclusive<u32> {
    let max = u64::from(max_buckets);
    let total = u64::from(total_workers.max(1));
    let worker = u64::from(worker_index);

    let start = (worker * max).div_ceil(total);
    let end = ((worker + 1) * max - 1) / total;
    (start as u32)..=(end as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_hash_matches_reference_values() {
        assert_eq!(key_hash(""), 0);
        assert_eq!(key_hash("a"), 97);
        assert_eq!(key_hash("hello"), 99_162_322);
        assert_eq!(key_hash("file-group-0001"), -1_887_084_672);
    }

    #[test]
    fn test_murmur_mix_reference_values() {
        assert_eq!(murmur_mix(0), 593_689_054);
        assert_eq!(murmur_mix(97), 1_455_541_201);
        assert_eq!(murmur_mix(99_162_322), 1_715_862_179);
    }

    #[test]
    fn test_key_group_and_worker_reference_values() {
        assert_eq!(key_group_for("hello", 128), 35);
        assert_eq!(assign_to_worker("hello", 128, 4), 1);
        assert_eq!(key_group_for("fg-1", 128), 11);
        assert_eq!(assign_to_worker("fg-1", 128, 4), 0);
        assert_eq!(assign_to_worker("", 128, 4), 2);
    }

    #[test]
    fn test_single_worker_owns_everything() {
        for id in ["a", "b", "fg-1", "file-group-0001"] {
            assert!(owns(id, 128, 1, 0));
        }
    }

    #[test]
    fn test_key_group_ranges_tile_all_groups() {
        let ranges: Vec<_> = (0..3).map(|w| key_group_range(w, 128, 3)).collect();
        assert_eq!(*ranges[0].start(), 0);
        assert_eq!(*ranges[2].end(), 127);
        for pair in ranges.windows(2) {
            assert_eq!(*pair[0].end() + 1, *pair[1].start());
        }
    }

    proptest! {
        /// Every file group is owned by exactly one worker
        #[test]
        fn file_group_owned_exactly_once(
            id in "[a-z0-9-]{1,40}",
            total_workers in 1u32..64,
            extra_buckets in 0u32..512,
        ) {
            let max_buckets = total_workers + extra_buckets;
            let owners = (0..total_workers)
                .filter(|&w| owns(&id, max_buckets, total_workers, w))
                .count();
            prop_assert_eq!(owners, 1);
        }
    }

    proptest! {
        /// Ownership never depends on anything but the inputs
        #[test]
        fn ownership_is_deterministic(
            id in "\\PC{0,32}",
            total_workers in 1u32..32,
            extra_buckets in 0u32..256,
        ) {
            let max_buckets = total_workers + extra_buckets;
            let first = assign_to_worker(&id, max_buckets, total_workers);
            let second = assign_to_worker(&id, max_buckets, total_workers);
            prop_assert_eq!(first, second);
            prop_assert!(first < total_workers);
        }
    }

    proptest! {
        /// A worker's key group range contains exactly the groups routed to it
        #[test]
        fn key_group_range_matches_routing(
            total_workers in 1u32..64,
            extra_buckets in 0u32..512,
        ) {
            let max_buckets = total_workers + extra_buckets;
            for worker in 0..total_workers {
                let range = key_group_range(worker, max_buckets, total_workers);
                for group in range {
                    prop_assert_eq!(worker_for_key_group(group, max_buckets, total_workers), worker);
                }
            }
        }
    }
}
