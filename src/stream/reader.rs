//! The registry reader: stream a flat file or a segmented directory as
//! frames.
//!
//! Segments become chunk frames; each reference becomes an opening block
//! frame (descriptor plus the reference's offset path), the block's
//! content, and a closing block frame with the same descriptor. Nested
//! multiblock blocks stream their own block boundaries recursively.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::errors::BeeError;
use crate::message::Descriptor;
use crate::store::BlockStore;
use crate::store::manifest::{Manifest, ManifestEntry};
use crate::stream::frame::Frame;

enum Layer {
    File(File),
    Dir { dir: PathBuf, entries: std::vec::IntoIter<ManifestEntry> },
    Emit(Box<Frame>),
}

pub struct RegistryReader {
    store: BlockStore,
    chunk_size: usize,
    algorithm: crate::env::DigestAlgorithm,
    stack: Vec<Layer>,
}

impl RegistryReader {
    /// Open `path` for frame streaming. A directory must hold a valid
    /// manifest; anything else is read as a flat chunk stream.
    ///
    /// # Errors
    /// Returns I/O and manifest errors.
    pub fn open(path: &Path, env: &Environment) -> Result<Self, BeeError> {
        let store = BlockStore::open(env)?;
        let mut reader = Self {
            store,
            chunk_size: env.chunk_size,
            algorithm: env.algorithm,
            stack: Vec::new(),
        };
        if path.is_dir() {
            let manifest = Manifest::load(path)?;
            reader.stack.push(Layer::Dir {
                dir: path.to_path_buf(),
                entries: manifest.entries.into_iter(),
            });
        } else {
            reader.stack.push(Layer::File(File::open(path)?));
        }
        Ok(reader)
    }

    fn push_reference(&mut self, digest_hex: &str, path: &[u64]) -> Result<(), BeeError> {
        let digest = hex::decode(digest_hex).map_err(|e| {
            BeeError::MalformedEncoding(format!("manifest digest {digest_hex}: {e}"))
        })?;
        let mut descriptor = Descriptor::for_digest(self.algorithm, &digest);
        descriptor.previous_lengths_position = path.to_vec();
        let boundary = Frame::block(descriptor);
        // LIFO: closing frame first, then the content, then the opener.
        self.stack.push(Layer::Emit(Box::new(boundary.clone())));
        let block_path = self.store.block_path(digest_hex);
        if block_path.is_file() {
            self.stack.push(Layer::File(File::open(block_path)?));
        } else if block_path.is_dir() {
            let manifest = Manifest::load(&block_path)?;
            self.stack
                .push(Layer::Dir { dir: block_path, entries: manifest.entries.into_iter() });
        } else {
            return Err(BeeError::UnknownBlock(digest_hex.to_string()));
        }
        self.stack.push(Layer::Emit(Box::new(boundary)));
        Ok(())
    }

    fn step(&mut self) -> Result<Option<Frame>, BeeError> {
        loop {
            let Some(layer) = self.stack.last_mut() else {
                return Ok(None);
            };
            match layer {
                Layer::Emit(_) => {
                    let Some(Layer::Emit(frame)) = self.stack.pop() else { continue };
                    return Ok(Some(*frame));
                }
                Layer::File(file) => {
                    let mut buf = vec![0u8; self.chunk_size];
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        self.stack.pop();
                        continue;
                    }
                    buf.truncate(n);
                    return Ok(Some(Frame::chunk(buf)));
                }
                Layer::Dir { dir, entries } => match entries.next() {
                    None => {
                        self.stack.pop();
                    }
                    Some(ManifestEntry::Segment(i)) => {
                        let path = dir.join(i.to_string());
                        self.stack.push(Layer::File(File::open(path)?));
                    }
                    Some(ManifestEntry::Reference(digest_hex, path)) => {
                        self.push_reference(&digest_hex, &path)?;
                    }
                },
            }
        }
    }
}

impl Iterator for RegistryReader {
    type Item = Result<Frame, BeeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.stack.clear();
                Some(Err(e))
            }
        }
    }
}

/// Convenience wrapper matching the registry naming of the block store:
/// stream `path` (file or segmented directory) as frames.
///
/// # Errors
/// Returns I/O and manifest errors from opening the path.
pub fn read_from_registry(path: &Path, env: &Environment) -> Result<RegistryReader, BeeError> {
    RegistryReader::open(path, env)
}
