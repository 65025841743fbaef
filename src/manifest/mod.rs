//! The `xl.json` manifest data model.
//!
//! One manifest accompanies each object's shards on every disk, recording the
//! erasure layout, the shard distribution for the object name, per-shard
//! bitrot checksums, the multipart part list and user metadata. Only valid
//! manifests (known version, `xl` format) participate in quorum resolution.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bitrot::{default_bitrot_algo, HashAlgo};
use crate::config::CoreContext;
use crate::error::{Result, StorageError};
use crate::placement::hash_order;

/// Current manifest version.
pub const XL_META_VERSION: &str = "1.0.1";

/// Previous manifest version, still accepted on read.
pub const XL_META_VERSION_100: &str = "1.0.0";

/// Manifest format literal.
pub const XL_META_FORMAT: &str = "xl";

/// Name of the manifest file kept next to each object's shards.
pub const XL_META_FILE: &str = "xl.json";

/// Identifies the erasure codec whose shards a manifest describes.
pub const ERASURE_ALGORITHM: &str = "klauspost/reedsolomon/vandermonde";

/// Erasure block size for newly written objects.
pub const BLOCK_SIZE_V1: u64 = 10 * 1024 * 1024;

/// One part of a (possibly multipart) object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPartInfo {
    pub number: usize,
    pub name: String,
    pub etag: String,
    pub size: u64,
}

/// Bitrot checksum of one locally held shard file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSumInfo {
    pub name: String,
    pub algorithm: HashAlgo,
    pub hash: String,
}

/// Erasure layout, shard distribution and checksums for one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErasureInfo {
    pub algorithm: String,
    #[serde(rename = "data")]
    pub data_blocks: usize,
    #[serde(rename = "parity")]
    pub parity_blocks: usize,
    #[serde(rename = "blockSize")]
    pub block_size: u64,
    /// 1-based position of the holding disk within the shard order,
    /// stamped per disk at write time.
    pub index: usize,
    /// Permutation of `1..=N` derived from the object name.
    pub distribution: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checksum: Vec<CheckSumInfo>,
}

impl ErasureInfo {
    /// Adds the checksum of a shard, replacing any entry of the same name.
    pub fn add_checksum(&mut self, info: CheckSumInfo) {
        for sum in &mut self.checksum {
            if sum.name == info.name {
                *sum = info;
                return;
            }
        }
        self.checksum.push(info);
    }

    /// Checksum recorded for `part_name`. An absent entry comes back with
    /// the default algorithm and empty name/hash; callers treat an empty
    /// hash as "compute fresh".
    pub fn checksum_info(&self, part_name: &str) -> CheckSumInfo {
        for sum in &self.checksum {
            if sum.name == part_name {
                return sum.clone();
            }
        }
        CheckSumInfo {
            name: String::new(),
            algorithm: default_bitrot_algo(),
            hash: String::new(),
        }
    }
}

/// Stat information of the object.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatInfo {
    pub size: u64,
    #[serde(rename = "modTime")]
    pub mod_time: DateTime<Utc>,
}

/// The `xl.json` manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XlMetaV1 {
    pub version: String,
    pub format: String,
    pub stat: StatInfo,
    pub erasure: ErasureInfo,
    /// Build identifier of the writer.
    pub release: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ObjectPartInfo>,
}

/// The subset of a manifest projected into API responses.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub bucket: String,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub content_type: String,
    pub content_encoding: String,
    pub etag: String,
    pub user_defined: HashMap<String, String>,
}

/// Whether the version/format pair denotes a manifest this build can read.
pub fn is_xl_meta_valid(version: &str, format: &str) -> bool {
    (version == XL_META_VERSION || version == XL_META_VERSION_100) && format == XL_META_FORMAT
}

// The etag travels under either of these keys depending on the writer
// generation; both are stripped before metadata is exposed.
const ETAG_KEYS: [&str; 2] = ["etag", "md5Sum"];

fn extract_etag(meta: &HashMap<String, String>) -> String {
    for key in ETAG_KEYS {
        if let Some(etag) = meta.get(key) {
            return etag.clone();
        }
    }
    String::new()
}

fn clean_meta_etag(meta: &HashMap<String, String>) -> HashMap<String, String> {
    let mut cleaned = meta.clone();
    for key in ETAG_KEYS {
        cleaned.remove(key);
    }
    cleaned
}

impl XlMetaV1 {
    /// Initializes a fresh manifest for `object`: current version and format,
    /// the caller's release tag and an erasure descriptor whose distribution
    /// is derived from the object name.
    pub fn new(object: &str, data_blocks: usize, parity_blocks: usize, ctx: &CoreContext) -> Self {
        Self {
            version: XL_META_VERSION.to_string(),
            format: XL_META_FORMAT.to_string(),
            stat: StatInfo { size: 0, mod_time: DateTime::<Utc>::UNIX_EPOCH },
            erasure: ErasureInfo {
                algorithm: ERASURE_ALGORITHM.to_string(),
                data_blocks,
                parity_blocks,
                block_size: BLOCK_SIZE_V1,
                index: 0,
                distribution: hash_order(object, data_blocks + parity_blocks),
                checksum: Vec::new(),
            },
            release: ctx.release.clone(),
            meta: HashMap::new(),
            parts: Vec::new(),
        }
    }

    /// Whether this manifest participates in quorum resolution.
    pub fn is_valid(&self) -> bool {
        is_xl_meta_valid(&self.version, &self.format)
    }

    /// Adds a part in order: an existing part number is replaced in place,
    /// otherwise the part is appended and the list re-sorted by number.
    pub fn add_object_part(&mut self, number: usize, name: &str, etag: &str, size: u64) {
        let part = ObjectPartInfo {
            number,
            name: name.to_string(),
            etag: etag.to_string(),
            size,
        };
        for existing in &mut self.parts {
            if existing.number == number {
                *existing = part;
                return;
            }
        }
        self.parts.push(part);
        self.parts.sort_by_key(|part| part.number);
    }

    /// Translates an object offset into `(part_index, offset_within_part)`.
    /// Offset 0 is always `(0, 0)`, even for an empty part list; an offset
    /// beyond the object is [`StorageError::InvalidRange`].
    pub fn object_to_part_offset(&self, offset: u64) -> Result<(usize, u64)> {
        if offset == 0 {
            return Ok((0, 0));
        }
        let mut part_offset = offset;
        for (part_index, part) in self.parts.iter().enumerate() {
            if part_offset < part.size {
                return Ok((part_index, part_offset));
            }
            part_offset -= part.size;
        }
        Err(StorageError::InvalidRange)
    }

    /// Projects the manifest into the response view, extracting the etag and
    /// stripping it from the user-defined metadata.
    pub fn to_object_info(&self, bucket: &str, object: &str) -> ObjectInfo {
        ObjectInfo {
            bucket: bucket.to_string(),
            name: object.to_string(),
            is_dir: false,
            size: self.stat.size,
            mod_time: self.stat.mod_time,
            content_type: self.meta.get("content-type").cloned().unwrap_or_default(),
            content_encoding: self.meta.get("content-encoding").cloned().unwrap_or_default(),
            etag: extract_etag(&self.meta),
            user_defined: clean_meta_etag(&self.meta),
        }
    }
}

/// Index of the part with `number` within `parts`.
pub fn object_part_index(parts: &[ObjectPartInfo], number: usize) -> Option<usize> {
    parts.iter().position(|part| part.number == number)
}

/// Picks the first valid manifest whose mod time matches `mod_time` (the
/// caller usually supplies the statistical mode across all replicas).
pub fn pick_valid_xl_meta(
    metas: &[Option<XlMetaV1>],
    mod_time: DateTime<Utc>,
) -> Result<&XlMetaV1> {
    for meta in metas.iter().flatten() {
        if meta.is_valid() && meta.stat.mod_time == mod_time {
            return Ok(meta);
        }
    }
    Err(StorageError::NoValidManifest)
}
