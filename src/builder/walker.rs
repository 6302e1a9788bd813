//! Pointer walking: locate every block-pointer leaf in a message.
//!
//! Two walks share one traversal shape. `search_message` runs in pruned
//! coordinates (offsets into the serialisation with descriptors inline)
//! and feeds the lengths tree. `search_message_real` runs the pruned and
//! real coordinate systems side by side, producing the reference paths
//! written into the manifest; those address length prefixes in the
//! concatenated segments-plus-blocks byte stream.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::builder::lengths::LengthRecord;
use crate::env::DigestAlgorithm;
use crate::errors::BeeError;
use crate::message::{Descriptor, FieldRef, Reflect};
use crate::utils::num;
use crate::wire::tag::{self, WireType};
use crate::wire::varint;

/// Does `bytes` parse as a block-pointer descriptor whose digest for the
/// active algorithm is allow-listed? Returns the digest hex when so.
#[must_use]
pub fn is_block(
    bytes: &[u8],
    allow: &HashSet<Vec<u8>>,
    algorithm: DigestAlgorithm,
) -> Option<String> {
    let descriptor = Descriptor::decode(bytes).ok()?;
    if descriptor.hashes.is_empty() {
        return None;
    }
    let digest = descriptor.digest_for(algorithm)?;
    allow.contains(digest).then(|| hex::encode(digest))
}

/// Map every allow-listed pointer leaf to its offset paths, in pruned
/// coordinates. Duplicate digests keep every path.
#[must_use]
pub fn search_message(
    message: &dyn Reflect,
    allow: &HashSet<Vec<u8>>,
    algorithm: DigestAlgorithm,
) -> HashMap<String, Vec<Vec<u64>>> {
    let mut container = HashMap::new();
    walk(message, &[], 0, allow, algorithm, &mut container);
    container
}

fn walk(
    message: &dyn Reflect,
    pointers: &[u64],
    initial_position: u64,
    allow: &HashSet<Vec<u8>>,
    algorithm: DigestAlgorithm,
    container: &mut HashMap<String, Vec<Vec<u64>>>,
) {
    let mut position = initial_position;
    for field in message.fields() {
        let t = num::usize_to_u64(tag::width(field.number, WireType::LengthDelimited));
        match field.value {
            FieldRef::Repeated(elements) => {
                for element in elements {
                    let len = num::usize_to_u64(element.encoded_len());
                    let mut path = pointers.to_vec();
                    path.push(position + t);
                    let body = position + t + num::usize_to_u64(varint::width(len));
                    walk(element, &path, body, allow, algorithm, container);
                    position += t + num::usize_to_u64(varint::width(len)) + len;
                }
            }
            FieldRef::Message(element) => {
                let len = num::usize_to_u64(element.encoded_len());
                let mut path = pointers.to_vec();
                path.push(position + t);
                let body = position + t + num::usize_to_u64(varint::width(len));
                walk(element, &path, body, allow, algorithm, container);
                position += t + num::usize_to_u64(varint::width(len)) + len;
            }
            FieldRef::Bytes(bytes) => {
                let len = num::usize_to_u64(bytes.len());
                if let Some(digest_hex) = is_block(bytes, allow, algorithm) {
                    let mut path = pointers.to_vec();
                    path.push(position + t);
                    container.entry(digest_hex).or_default().push(path);
                }
                position += t + num::usize_to_u64(varint::width(len)) + len;
            }
            FieldRef::Scalar { encoded_len } => {
                position += num::usize_to_u64(encoded_len);
            }
        }
    }
}

/// Re-walk the message tracking pruned and real positions in parallel,
/// yielding `(digest_hex, real_path)` records in buffer order.
///
/// `lengths` is the solver output keyed by pruned offsets; subtrees with
/// no entry hold no pointers and advance both coordinates identically.
///
/// # Errors
/// Returns `InconsistentLengths` if a pointer leaf has no solver record.
pub fn search_message_real(
    message: &dyn Reflect,
    allow: &HashSet<Vec<u8>>,
    algorithm: DigestAlgorithm,
    lengths: &BTreeMap<u64, LengthRecord>,
) -> Result<Vec<(String, Vec<u64>)>, BeeError> {
    let mut container = Vec::new();
    walk_real(message, &[], 0, 0, allow, algorithm, lengths, &mut container)?;
    Ok(container)
}

#[allow(clippy::too_many_arguments)]
fn walk_real(
    message: &dyn Reflect,
    pointers: &[u64],
    initial_position: u64,
    real_initial_position: u64,
    allow: &HashSet<Vec<u8>>,
    algorithm: DigestAlgorithm,
    lengths: &BTreeMap<u64, LengthRecord>,
    container: &mut Vec<(String, Vec<u64>)>,
) -> Result<(), BeeError> {
    let mut position = initial_position;
    let mut real_position = real_initial_position;
    for field in message.fields() {
        let t = num::usize_to_u64(tag::width(field.number, WireType::LengthDelimited));
        match field.value {
            FieldRef::Repeated(elements) => {
                for element in elements {
                    descend(
                        element,
                        t,
                        pointers,
                        &mut position,
                        &mut real_position,
                        allow,
                        algorithm,
                        lengths,
                        container,
                    )?;
                }
            }
            FieldRef::Message(element) => {
                descend(
                    element,
                    t,
                    pointers,
                    &mut position,
                    &mut real_position,
                    allow,
                    algorithm,
                    lengths,
                    container,
                )?;
            }
            FieldRef::Bytes(bytes) => {
                let len = num::usize_to_u64(bytes.len());
                if let Some(digest_hex) = is_block(bytes, allow, algorithm) {
                    let prefix = position + t;
                    let record = lengths.get(&prefix).ok_or_else(|| {
                        BeeError::InconsistentLengths(format!(
                            "no length record for pointer at offset {prefix}"
                        ))
                    })?;
                    let mut path = pointers.to_vec();
                    path.push(real_position + t);
                    container.push((digest_hex, path));
                    position = prefix + num::usize_to_u64(varint::width(len)) + len;
                    real_position +=
                        t + num::usize_to_u64(varint::width(record.real)) + record.real;
                } else {
                    let step = t + num::usize_to_u64(varint::width(len)) + len;
                    position += step;
                    real_position += step;
                }
            }
            FieldRef::Scalar { encoded_len } => {
                position += num::usize_to_u64(encoded_len);
                real_position += num::usize_to_u64(encoded_len);
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn descend(
    element: &dyn Reflect,
    t: u64,
    pointers: &[u64],
    position: &mut u64,
    real_position: &mut u64,
    allow: &HashSet<Vec<u8>>,
    algorithm: DigestAlgorithm,
    lengths: &BTreeMap<u64, LengthRecord>,
    container: &mut Vec<(String, Vec<u64>)>,
) -> Result<(), BeeError> {
    let len = num::usize_to_u64(element.encoded_len());
    let prefix = *position + t;
    if let Some(record) = lengths.get(&prefix) {
        let mut path = pointers.to_vec();
        path.push(*real_position + t);
        walk_real(
            element,
            &path,
            prefix + num::usize_to_u64(varint::width(len)),
            *real_position + t + num::usize_to_u64(varint::width(record.real)),
            allow,
            algorithm,
            lengths,
            container,
        )?;
        *position = prefix + num::usize_to_u64(varint::width(len)) + len;
        *real_position += t + num::usize_to_u64(varint::width(record.real)) + record.real;
    } else {
        let step = t + num::usize_to_u64(varint::width(len)) + len;
        *position += step;
        *real_position += step;
    }
    Ok(())
}
