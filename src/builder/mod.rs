//! The multiblock builder.
//!
//! Takes a fully-materialised message whose large leaves already hold
//! block-pointer descriptors, and emits the segmented on-disk form:
//! literal segments interleaved with block references, a manifest, the
//! pruned single-file serialisation, and the message's real content
//! identifier.

pub mod lengths;
pub mod tree;
pub mod walker;

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use log::debug;

use crate::env::Environment;
use crate::errors::BeeError;
use crate::message::Reflect;
use crate::store::BlockStore;
use crate::store::manifest::{Manifest, WITHOUT_BLOCK_POINTERS_FILE_NAME};
use crate::utils::{fsutil, num};
use crate::wire::varint;
pub use lengths::{LengthRecord, compute_real_lengths};
pub use tree::{LengthsNode, create_lengths_tree};
pub use walker::{is_block, search_message, search_message_real};

use std::collections::BTreeMap;

/// Build the segmented representation of `message` in a fresh cache
/// directory and return `(content_id, directory)`.
///
/// `allow` is the set of digests (raw bytes, active algorithm) that leaf
/// descriptors may point at; descriptors outside the set are treated as
/// ordinary bytes.
///
/// # Errors
/// Returns `UnknownBlock` if a pointer references a digest missing from
/// the store, `InconsistentLengths` on manifest/buffer drift, or the
/// underlying I/O error. Partial output directories are removed.
pub fn build_multiblock(
    message: &dyn Reflect,
    allow: &HashSet<Vec<u8>>,
    env: &Environment,
) -> Result<(Vec<u8>, PathBuf), BeeError> {
    let store = BlockStore::open(env)?;
    let container = walker::search_message(message, allow, env.algorithm);
    debug!("multiblock build: {} distinct pointer digests", container.len());
    let tree = tree::create_lengths_tree(
        container.iter().flat_map(|(hex, paths)| paths.iter().map(move |p| (hex.as_str(), p.as_slice()))),
    )?;
    let buffer = message.encode_to_vec();
    let records = lengths::compute_real_lengths(&tree, &buffer, &store, env.algorithm)?;
    let segments = generate_segments(&buffer, &records)?;
    let references = walker::search_message_real(message, allow, env.algorithm, &records)?;
    if references.len() + 1 != segments.len() {
        return Err(BeeError::InconsistentLengths(format!(
            "{} references for {} segments",
            references.len(),
            segments.len()
        )));
    }
    let content_id = generate_id(&segments, references.iter().map(|(hex, _)| hex.as_str()), &store, env)?;

    let dir = fsutil::generate_random_dir(&env.cache_dir)?;
    let result = write_directory(&dir, &segments, &references, &buffer);
    match result {
        Ok(()) => {
            debug!(
                "multiblock build: {} segments, {} references at {}",
                segments.len(),
                references.len(),
                dir.display()
            );
            Ok((content_id, dir))
        }
        Err(e) => {
            fsutil::remove_dir_best_effort(&dir);
            Err(e)
        }
    }
}

/// Split the pruned buffer at each solved offset, rewriting every length
/// prefix to its real value and cutting a segment boundary after each
/// leaf's descriptor bytes.
fn generate_segments(
    buffer: &[u8],
    records: &BTreeMap<u64, LengthRecord>,
) -> Result<Vec<Vec<u8>>, BeeError> {
    let mut segments = Vec::with_capacity(records.values().filter(|r| r.leaf).count() + 1);
    let mut current = Vec::new();
    let mut cursor = 0usize;
    for (&offset, record) in records {
        let offset = num::u64_to_usize(offset).ok_or_else(|| {
            BeeError::MalformedEncoding(format!("offset {offset} exceeds address space"))
        })?;
        if offset < cursor || offset > buffer.len() {
            return Err(BeeError::InconsistentLengths(format!(
                "offset {offset} outside the pruned buffer"
            )));
        }
        current.extend_from_slice(&buffer[cursor..offset]);
        varint::encode_into(record.real, &mut current);
        cursor = offset + varint::width(record.pruned);
        if record.leaf {
            cursor += num::u64_to_usize(record.pruned).unwrap_or(usize::MAX);
            if cursor > buffer.len() {
                return Err(BeeError::InconsistentLengths(format!(
                    "descriptor at offset {offset} overruns the pruned buffer"
                )));
            }
            segments.push(std::mem::take(&mut current));
        }
    }
    current.extend_from_slice(&buffer[cursor..]);
    segments.push(current);
    Ok(segments)
}

/// The real content identifier: digest the segments in order, streaming
/// each referenced block's (recursively expanded) content after the
/// segment that precedes its reference slot.
fn generate_id<'a>(
    segments: &[Vec<u8>],
    references: impl Iterator<Item = &'a str>,
    store: &BlockStore,
    env: &Environment,
) -> Result<Vec<u8>, BeeError> {
    let mut hasher = env.algorithm.hasher();
    let mut references = references;
    for segment in segments {
        hasher.update(segment);
        if let Some(digest_hex) = references.next() {
            for chunk in store.open_stream(digest_hex)? {
                hasher.update(&chunk?);
            }
        }
    }
    Ok(hasher.finalize())
}

fn write_directory(
    dir: &std::path::Path,
    segments: &[Vec<u8>],
    references: &[(String, Vec<u64>)],
    buffer: &[u8],
) -> Result<(), BeeError> {
    let mut manifest = Manifest::new();
    for (i, segment) in segments.iter().enumerate() {
        let index = u32::try_from(i + 1).map_err(|_| {
            BeeError::InconsistentLengths("segment count exceeds u32".to_string())
        })?;
        std::fs::write(dir.join(index.to_string()), segment)?;
        manifest.push_segment(index);
        if let Some((digest_hex, path)) = references.get(i) {
            manifest.push_reference(digest_hex.clone(), path.clone());
        }
    }
    manifest.store(dir)?;
    let mut wbp = std::fs::File::create(dir.join(WITHOUT_BLOCK_POINTERS_FILE_NAME))?;
    wbp.write_all(buffer)?;
    Ok(())
}
