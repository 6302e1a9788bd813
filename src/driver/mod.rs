//! The wbp reconstructor.
//!
//! A segmented directory's byte stream (segments concatenated with block
//! contents) carries *real* lengths in every prefix. This module
//! collapses such a directory back into `wbp.bin`: the contiguous pruned
//! serialisation, with every prefix rewritten to the size it has when
//! descriptors stand in for block contents.

use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;

use crate::builder::tree::{LengthsNode, create_lengths_tree};
use crate::env::Environment;
use crate::errors::BeeError;
use crate::message::{Descriptor, descriptor_len};
use crate::store::BlockStore;
use crate::store::manifest::{Manifest, ManifestEntry, WITHOUT_BLOCK_POINTERS_FILE_NAME};
use crate::utils::num;
use crate::wire::varint;

use std::collections::BTreeMap;

/// A length-measuring view over the directory: literal segments in memory,
/// referenced blocks by size only.
enum Piece {
    Bytes(Vec<u8>),
    Block { digest_hex: String, size: u64 },
}

impl Piece {
    fn len(&self) -> u64 {
        match self {
            Piece::Bytes(b) => num::usize_to_u64(b.len()),
            Piece::Block { size, .. } => *size,
        }
    }
}

/// Write `dir/wbp.bin` from the directory's manifest, overwriting any
/// previous file.
///
/// # Errors
/// Returns `UnknownBlock` for a reference missing from the store,
/// `InconsistentLengths` when an offset or length does not add up, or the
/// underlying I/O error.
pub fn generate_wbp_file(dir: &Path, env: &Environment) -> Result<(), BeeError> {
    let store = BlockStore::open(env)?;
    let manifest = Manifest::load(dir)?;

    let mut pieces = Vec::with_capacity(manifest.entries.len());
    let mut references = Vec::with_capacity(manifest.reference_count());
    for entry in &manifest.entries {
        match entry {
            ManifestEntry::Segment(i) => {
                pieces.push(Piece::Bytes(std::fs::read(dir.join(i.to_string()))?));
            }
            ManifestEntry::Reference(digest_hex, path) => {
                let size = store.size(digest_hex)?;
                pieces.push(Piece::Block { digest_hex: digest_hex.clone(), size });
                references.push((digest_hex.clone(), path.clone()));
            }
        }
    }

    let tree = create_lengths_tree(
        references.iter().map(|(hex, path)| (hex.as_str(), path.as_slice())),
    )?;
    let mut pruned = BTreeMap::new();
    compute_wbp_lengths(&tree, &pieces, env, &mut pruned)?;

    // Descending offset order: shrinking a varint moves everything after
    // it, so later offsets must be rewritten first.
    for (&offset, &value) in pruned.iter().rev() {
        set_varint_at(&mut pieces, offset, value)?;
    }

    let out = std::fs::File::create(dir.join(WITHOUT_BLOCK_POINTERS_FILE_NAME))?;
    let mut out = BufWriter::new(out);
    for piece in &pieces {
        match piece {
            Piece::Bytes(b) => out.write_all(b)?,
            Piece::Block { digest_hex, .. } => {
                let digest = hex::decode(digest_hex).map_err(|e| {
                    BeeError::MalformedEncoding(format!("manifest digest {digest_hex}: {e}"))
                })?;
                out.write_all(&Descriptor::for_digest(env.algorithm, &digest).encode_to_vec())?;
            }
        }
    }
    out.flush()?;
    debug!("wbp.bin written for {}", dir.display());
    Ok(())
}

/// Bottom-up pruned lengths. At a leaf the pruned value is the fixed
/// descriptor size; at an interior offset it is the stored real length
/// minus the growth of every child subtree, each child's growth being
/// `(real + width(real)) - (pruned + width(pruned))` (the tag byte
/// cancels). Returns the level's total growth.
fn compute_wbp_lengths(
    level: &BTreeMap<u64, LengthsNode>,
    pieces: &[Piece],
    env: &Environment,
    out: &mut BTreeMap<u64, u64>,
) -> Result<u64, BeeError> {
    let mut growth = 0u64;
    for (&offset, node) in level {
        let real = read_varint_at(pieces, offset)?;
        let pruned = match node {
            LengthsNode::Leaf(_) => num::usize_to_u64(descriptor_len(env.algorithm)),
            LengthsNode::Interior(children) => {
                let child_growth = compute_wbp_lengths(children, pieces, env, out)?;
                real.checked_sub(child_growth).ok_or_else(|| {
                    BeeError::InconsistentLengths(format!(
                        "real length {real} at offset {offset} smaller than child growth {child_growth}"
                    ))
                })?
            }
        };
        out.insert(offset, pruned);
        growth += (real + num::usize_to_u64(varint::width(real)))
            .checked_sub(pruned + num::usize_to_u64(varint::width(pruned)))
            .ok_or_else(|| {
                BeeError::InconsistentLengths(format!(
                    "pruned length {pruned} exceeds real length {real} at offset {offset}"
                ))
            })?;
    }
    Ok(growth)
}

/// Locate the literal segment containing `offset` and decode the varint
/// there. Offsets inside block pieces are manifest drift.
fn locate(pieces: &[Piece], offset: u64) -> Result<(usize, usize), BeeError> {
    let mut base = 0u64;
    for (index, piece) in pieces.iter().enumerate() {
        let len = piece.len();
        if offset < base + len {
            return match piece {
                Piece::Bytes(_) => Ok((
                    index,
                    num::u64_to_usize(offset - base).ok_or_else(|| {
                        BeeError::MalformedEncoding("offset exceeds address space".to_string())
                    })?,
                )),
                Piece::Block { digest_hex, .. } => Err(BeeError::InconsistentLengths(format!(
                    "offset {offset} falls inside block {digest_hex}"
                ))),
            };
        }
        base += len;
    }
    Err(BeeError::InconsistentLengths(format!("offset {offset} outside the buffer")))
}

fn read_varint_at(pieces: &[Piece], offset: u64) -> Result<u64, BeeError> {
    let (index, rel) = locate(pieces, offset)?;
    match &pieces[index] {
        Piece::Bytes(bytes) => varint::decode_at(bytes, rel),
        Piece::Block { .. } => Err(BeeError::InconsistentLengths(format!(
            "offset {offset} falls inside a block"
        ))),
    }
}

/// Overwrite the varint at `offset` with `value`. The encoding may only
/// keep or shrink its width; the segment buffer contracts in place.
fn set_varint_at(pieces: &mut [Piece], offset: u64, value: u64) -> Result<(), BeeError> {
    let (index, rel) = locate(pieces, offset)?;
    let Piece::Bytes(bytes) = &mut pieces[index] else {
        return Err(BeeError::InconsistentLengths(format!(
            "offset {offset} falls inside a block"
        )));
    };
    let old_width = varint::encoded_width_at(bytes, rel)?;
    let replacement = varint::encode(value);
    if replacement.len() > old_width {
        return Err(BeeError::InconsistentLengths(format!(
            "pruned varint at offset {offset} wider than the real one"
        )));
    }
    bytes.splice(rel..rel + old_width, replacement);
    Ok(())
}
