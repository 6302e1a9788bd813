//! Block-pointer descriptors.
//!
//! A descriptor is the small record that stands in for a large byte leaf:
//! a repeated list of `(algorithm identifier, digest)` pairs, plus (only
//! on stream frames) the offset path of the length prefixes above the
//! pointer. Wire shape:
//!
//! ```text
//! Descriptor { repeated HashEntry hashes = 1;
//!              repeated uint64 previous_lengths_position = 2; }
//! HashEntry  { bytes algorithm = 1; bytes digest = 2; }
//! ```

use crate::env::DigestAlgorithm;
use crate::errors::BeeError;
use crate::utils::num;
use crate::wire::tag::{self, WireType};
use crate::wire::varint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    pub algorithm: Vec<u8>,
    pub digest: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Descriptor {
    pub hashes: Vec<HashEntry>,
    pub previous_lengths_position: Vec<u64>,
}

impl Descriptor {
    /// The minimal descriptor for a digest under `algorithm`: one hash
    /// entry, no positions. This is the exact form embedded in messages,
    /// so its encoded length is `descriptor_len(algorithm)`.
    #[must_use]
    pub fn for_digest(algorithm: DigestAlgorithm, digest: &[u8]) -> Self {
        Self {
            hashes: vec![HashEntry { algorithm: algorithm.id(), digest: digest.to_vec() }],
            previous_lengths_position: Vec::new(),
        }
    }

    /// The digest registered for `algorithm`, if any.
    #[must_use]
    pub fn digest_for(&self, algorithm: DigestAlgorithm) -> Option<&[u8]> {
        let id = algorithm.id();
        self.hashes.iter().find(|h| h.algorithm == id).map(|h| h.digest.as_slice())
    }

    /// Hex form of the digest for `algorithm`.
    ///
    /// # Errors
    /// Returns `MalformedEncoding` if the descriptor carries no hash for
    /// the active algorithm.
    pub fn hex_for(&self, algorithm: DigestAlgorithm) -> Result<String, BeeError> {
        self.digest_for(algorithm).map(hex::encode).ok_or_else(|| {
            BeeError::MalformedEncoding(format!(
                "descriptor carries no {} hash",
                algorithm.name()
            ))
        })
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let mut len = 0usize;
        for hash in &self.hashes {
            let inner = hash_entry_len(hash);
            len += tag::width(1, WireType::LengthDelimited)
                + varint::width(num::usize_to_u64(inner))
                + inner;
        }
        for position in &self.previous_lengths_position {
            len += tag::width(2, WireType::Varint) + varint::width(*position);
        }
        len
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        for hash in &self.hashes {
            varint::encode_into(tag::pack(1, WireType::LengthDelimited), out);
            varint::encode_into(num::usize_to_u64(hash_entry_len(hash)), out);
            encode_hash_entry(hash, out);
        }
        for position in &self.previous_lengths_position {
            varint::encode_into(tag::pack(2, WireType::Varint), out);
            varint::encode_into(*position, out);
        }
    }

    #[must_use]
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Strict decode: only the two declared fields are accepted, so that
    /// arbitrary user bytes rarely parse as a descriptor.
    ///
    /// # Errors
    /// Returns `MalformedEncoding` on any deviation from the wire shape.
    pub fn decode(buf: &[u8]) -> Result<Self, BeeError> {
        let mut descriptor = Self::default();
        let mut pos = 0usize;
        while pos < buf.len() {
            let (raw_tag, tag_width) = varint::decode_with_width(buf, pos)?;
            let (number, wire_type) = tag::unpack(raw_tag)?;
            pos += tag_width;
            match (number, wire_type) {
                (1, WireType::LengthDelimited) => {
                    let (len, w) = varint::decode_with_width(buf, pos)?;
                    pos += w;
                    let len = num::u64_to_usize(len).ok_or_else(|| {
                        BeeError::MalformedEncoding("hash entry length too large".to_string())
                    })?;
                    let end = pos.checked_add(len).filter(|&e| e <= buf.len()).ok_or_else(
                        || BeeError::MalformedEncoding("hash entry exceeds the buffer".to_string()),
                    )?;
                    descriptor.hashes.push(decode_hash_entry(&buf[pos..end])?);
                    pos = end;
                }
                (2, WireType::Varint) => {
                    let (position, w) = varint::decode_with_width(buf, pos)?;
                    pos += w;
                    descriptor.previous_lengths_position.push(position);
                }
                (number, _) => {
                    return Err(BeeError::MalformedEncoding(format!(
                        "unexpected descriptor field {number}"
                    )));
                }
            }
        }
        Ok(descriptor)
    }
}

fn hash_entry_len(hash: &HashEntry) -> usize {
    tag::width(1, WireType::LengthDelimited)
        + varint::width(num::usize_to_u64(hash.algorithm.len()))
        + hash.algorithm.len()
        + tag::width(2, WireType::LengthDelimited)
        + varint::width(num::usize_to_u64(hash.digest.len()))
        + hash.digest.len()
}

fn encode_hash_entry(hash: &HashEntry, out: &mut Vec<u8>) {
    varint::encode_into(tag::pack(1, WireType::LengthDelimited), out);
    varint::encode_into(num::usize_to_u64(hash.algorithm.len()), out);
    out.extend_from_slice(&hash.algorithm);
    varint::encode_into(tag::pack(2, WireType::LengthDelimited), out);
    varint::encode_into(num::usize_to_u64(hash.digest.len()), out);
    out.extend_from_slice(&hash.digest);
}

fn decode_hash_entry(buf: &[u8]) -> Result<HashEntry, BeeError> {
    let mut algorithm = None;
    let mut digest = None;
    let mut pos = 0usize;
    while pos < buf.len() {
        let (raw_tag, tag_width) = varint::decode_with_width(buf, pos)?;
        let (number, wire_type) = tag::unpack(raw_tag)?;
        pos += tag_width;
        if wire_type != WireType::LengthDelimited || !(number == 1 || number == 2) {
            return Err(BeeError::MalformedEncoding(format!(
                "unexpected hash entry field {number}"
            )));
        }
        let (len, w) = varint::decode_with_width(buf, pos)?;
        pos += w;
        let len = num::u64_to_usize(len)
            .ok_or_else(|| BeeError::MalformedEncoding("hash field length too large".to_string()))?;
        let end = pos
            .checked_add(len)
            .filter(|&e| e <= buf.len())
            .ok_or_else(|| BeeError::MalformedEncoding("hash field exceeds the buffer".to_string()))?;
        let value = buf[pos..end].to_vec();
        pos = end;
        match number {
            1 => algorithm = Some(value),
            _ => digest = Some(value),
        }
    }
    Ok(HashEntry { algorithm: algorithm.unwrap_or_default(), digest: digest.unwrap_or_default() })
}

/// Fixed encoded length of a minimal descriptor under `algorithm`: the
/// pruned size of every block-pointer leaf.
#[must_use]
pub fn descriptor_len(algorithm: DigestAlgorithm) -> usize {
    let id_len = algorithm.id().len();
    let digest_len = algorithm.digest_len();
    let inner = tag::width(1, WireType::LengthDelimited)
        + varint::width(num::usize_to_u64(id_len))
        + id_len
        + tag::width(2, WireType::LengthDelimited)
        + varint::width(num::usize_to_u64(digest_len))
        + digest_len;
    tag::width(1, WireType::LengthDelimited) + varint::width(num::usize_to_u64(inner)) + inner
}
