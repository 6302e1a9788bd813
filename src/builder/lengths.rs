//! The real-length solver.
//!
//! For every offset in the lengths tree, derive what the length prefix at
//! that offset would hold if every block pointer beneath it were replaced
//! by its referenced content. A leaf's real length is its block's size; an
//! interior's is its as-written (pruned) length plus the growth of every
//! child, where a child's footprint inside the body is its length plus
//! the length prefix's own width plus the tag byte.

use std::collections::BTreeMap;

use crate::builder::tree::LengthsNode;
use crate::env::DigestAlgorithm;
use crate::errors::BeeError;
use crate::message::descriptor_len;
use crate::store::BlockStore;
use crate::utils::num;
use crate::wire::varint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthRecord {
    pub real: u64,
    pub pruned: u64,
    pub leaf: bool,
}

/// Solve the tree against the pruned buffer, returning a record per
/// offset, ascending.
///
/// # Errors
/// Returns `UnknownBlock` for a missing leaf block and
/// `InconsistentLengths` when an as-written length is smaller than the
/// pruned footprint of its children (manifest/buffer drift).
pub fn compute_real_lengths(
    tree: &BTreeMap<u64, LengthsNode>,
    buffer: &[u8],
    store: &BlockStore,
    algorithm: DigestAlgorithm,
) -> Result<BTreeMap<u64, LengthRecord>, BeeError> {
    let mut records = BTreeMap::new();
    traverse(tree, buffer, store, algorithm, &mut records)?;
    Ok(records)
}

/// Returns the subtree's total (real, pruned) body contributions.
fn traverse(
    level: &BTreeMap<u64, LengthsNode>,
    buffer: &[u8],
    store: &BlockStore,
    algorithm: DigestAlgorithm,
    records: &mut BTreeMap<u64, LengthRecord>,
) -> Result<(u64, u64), BeeError> {
    let mut real_total = 0u64;
    let mut pruned_total = 0u64;
    for (&offset, node) in level {
        let record = match node {
            LengthsNode::Leaf(digest_hex) => {
                let pruned = num::usize_to_u64(descriptor_len(algorithm));
                let real = store.size(digest_hex)?;
                LengthRecord { real, pruned, leaf: true }
            }
            LengthsNode::Interior(children) => {
                let offset_index = num::u64_to_usize(offset).ok_or_else(|| {
                    BeeError::MalformedEncoding(format!("offset {offset} exceeds address space"))
                })?;
                let pruned = varint::decode_at(buffer, offset_index)?;
                let (real_body, pruned_body) =
                    traverse(children, buffer, store, algorithm, records)?;
                if pruned < pruned_body {
                    return Err(BeeError::InconsistentLengths(format!(
                        "length {pruned} at offset {offset} is smaller than its children's {pruned_body}"
                    )));
                }
                LengthRecord { real: real_body + (pruned - pruned_body), pruned, leaf: false }
            }
        };
        records.insert(offset, record);
        real_total += record.real + num::usize_to_u64(varint::width(record.real)) + 1;
        pruned_total += record.pruned + num::usize_to_u64(varint::width(record.pruned)) + 1;
    }
    Ok((real_total, pruned_total))
}
