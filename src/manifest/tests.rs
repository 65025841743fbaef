use chrono::{TimeZone, Utc};

use super::*;
use crate::bitrot::{default_bitrot_algo, HashAlgo};
use crate::config::CoreContext;
use crate::credential::Credential;
use crate::error::StorageError;
use crate::placement::hash_order;

fn test_context() -> CoreContext {
    CoreContext::new(Credential::new("accesskey", "verysecretkey").unwrap())
}

fn test_meta() -> XlMetaV1 {
    XlMetaV1::new("bucket/object", 4, 2, &test_context())
}

#[test]
fn new_manifest_is_valid() {
    let meta = test_meta();
    assert!(meta.is_valid());
    assert_eq!(meta.erasure.algorithm, ERASURE_ALGORITHM);
    assert_eq!(meta.erasure.data_blocks, 4);
    assert_eq!(meta.erasure.parity_blocks, 2);
    assert_eq!(meta.erasure.distribution, hash_order("bucket/object", 6));
}

#[test]
fn validity_matrix() {
    assert!(is_xl_meta_valid("1.0.1", "xl"));
    assert!(is_xl_meta_valid("1.0.0", "xl"));
    assert!(!is_xl_meta_valid("1.0.2", "xl"));
    assert!(!is_xl_meta_valid("1.0.1", "fs"));
    assert!(!is_xl_meta_valid("", ""));
}

#[test]
fn parts_stay_sorted_and_unique() {
    let mut meta = test_meta();
    meta.add_object_part(2, "part.2", "e2", 10);
    meta.add_object_part(1, "part.1", "e1", 20);
    // Re-adding part 2 overwrites in place instead of appending.
    meta.add_object_part(2, "part.2b", "e2b", 15);

    let numbers: Vec<usize> = meta.parts.iter().map(|part| part.number).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert_eq!(meta.parts[0].name, "part.1");
    assert_eq!(meta.parts[0].size, 20);
    assert_eq!(meta.parts[1].name, "part.2b");
    assert_eq!(meta.parts[1].etag, "e2b");
    assert_eq!(meta.parts[1].size, 15);

    assert_eq!(object_part_index(&meta.parts, 2), Some(1));
    assert_eq!(object_part_index(&meta.parts, 3), None);
}

#[test]
fn offset_zero_always_maps_to_origin() {
    let meta = test_meta();
    assert_eq!(meta.object_to_part_offset(0).unwrap(), (0, 0));
}

#[test]
fn offsets_map_into_parts() {
    let mut meta = test_meta();
    meta.add_object_part(1, "part.1", "e1", 20);
    meta.add_object_part(2, "part.2", "e2", 10);
    meta.add_object_part(3, "part.3", "e3", 5);

    // Every offset below the object size lands in the part whose cumulative
    // range covers it, with the remainder as the in-part offset.
    let sizes = [20u64, 10, 5];
    for offset in 0..35u64 {
        let (idx, within) = meta.object_to_part_offset(offset).unwrap();
        let consumed: u64 = sizes[..idx].iter().sum();
        assert_eq!(consumed + within, offset, "offset {offset}");
        assert!(within < sizes[idx], "offset {offset}");
    }

    assert_eq!(meta.object_to_part_offset(35), Err(StorageError::InvalidRange));
    assert_eq!(meta.object_to_part_offset(100), Err(StorageError::InvalidRange));
}

#[test]
fn checksum_add_replaces_by_name() {
    let mut meta = test_meta();
    meta.erasure.add_checksum(CheckSumInfo {
        name: "part.1".to_string(),
        algorithm: HashAlgo::Blake2b,
        hash: "aa".to_string(),
    });
    meta.erasure.add_checksum(CheckSumInfo {
        name: "part.1".to_string(),
        algorithm: HashAlgo::Sha256,
        hash: "bb".to_string(),
    });
    assert_eq!(meta.erasure.checksum.len(), 1);

    let info = meta.erasure.checksum_info("part.1");
    assert_eq!(info.algorithm, HashAlgo::Sha256);
    assert_eq!(info.hash, "bb");

    // Unknown parts come back with the default algorithm and an empty hash,
    // telling the caller to compute one.
    let fresh = meta.erasure.checksum_info("part.9");
    assert_eq!(fresh.algorithm, default_bitrot_algo());
    assert!(fresh.name.is_empty());
    assert!(fresh.hash.is_empty());
}

#[test]
fn manifest_round_trips_through_json() {
    let mut meta = test_meta();
    meta.stat = StatInfo {
        size: 1024,
        mod_time: Utc.with_ymd_and_hms(2017, 3, 27, 19, 36, 42).unwrap(),
    };
    meta.add_object_part(1, "part.1", "etag1", 1024);
    meta.meta.insert("content-type".to_string(), "image/png".to_string());
    meta.erasure.add_checksum(CheckSumInfo {
        name: "part.1".to_string(),
        algorithm: HashAlgo::Blake2b,
        hash: "cafe".to_string(),
    });

    let data = serde_json::to_vec(&meta).unwrap();
    let decoded: XlMetaV1 = serde_json::from_slice(&data).unwrap();
    assert_eq!(decoded, meta);
    assert!(decoded.is_valid());

    // Wire names stay compatible with the original manifest schema.
    let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
    assert_eq!(value["erasure"]["data"], 4);
    assert_eq!(value["erasure"]["parity"], 2);
    assert!(value["erasure"]["blockSize"].is_u64());
    assert!(value["stat"]["modTime"].is_string());
}

#[test]
fn object_info_projection_strips_etag_keys() {
    let mut meta = test_meta();
    meta.stat = StatInfo {
        size: 7,
        mod_time: Utc.with_ymd_and_hms(2017, 3, 27, 19, 36, 42).unwrap(),
    };
    meta.meta.insert("content-type".to_string(), "text/plain".to_string());
    meta.meta.insert("content-encoding".to_string(), "gzip".to_string());
    meta.meta.insert("md5Sum".to_string(), "deadbeef".to_string());
    meta.meta.insert("x-amz-meta-color".to_string(), "red".to_string());

    let info = meta.to_object_info("bucket", "object");
    assert_eq!(info.bucket, "bucket");
    assert_eq!(info.name, "object");
    assert_eq!(info.size, 7);
    assert_eq!(info.content_type, "text/plain");
    assert_eq!(info.content_encoding, "gzip");
    assert_eq!(info.etag, "deadbeef");
    assert!(!info.user_defined.contains_key("md5Sum"));
    assert!(!info.user_defined.contains_key("etag"));
    assert_eq!(info.user_defined.get("x-amz-meta-color").unwrap(), "red");

    // "etag" wins over "md5Sum" when both are present.
    meta.meta.insert("etag".to_string(), "feedface".to_string());
    assert_eq!(meta.to_object_info("bucket", "object").etag, "feedface");
}

#[test]
fn pick_valid_requires_matching_mod_time() {
    let mod_time = Utc.with_ymd_and_hms(2017, 3, 27, 19, 36, 42).unwrap();
    let mut good = test_meta();
    good.stat.mod_time = mod_time;

    let mut stale = test_meta();
    stale.stat.mod_time = mod_time - chrono::Duration::seconds(5);

    let mut invalid = good.clone();
    invalid.format = "fs".to_string();

    let metas = vec![None, Some(invalid), Some(stale.clone()), Some(good.clone())];
    let picked = pick_valid_xl_meta(&metas, mod_time).unwrap();
    assert_eq!(*picked, good);

    let metas = vec![None, Some(stale)];
    assert!(matches!(
        pick_valid_xl_meta(&metas, mod_time),
        Err(StorageError::NoValidManifest)
    ));
}
