//! Chunked, recursive block reading.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::errors::BeeError;
use crate::store::BlockStore;
use crate::store::manifest::{Manifest, ManifestEntry};

enum Layer {
    File(File),
    Dir { dir: PathBuf, entries: std::vec::IntoIter<ManifestEntry> },
}

/// Iterator over a block's bytes in chunks of at most the store's chunk
/// size, expanding multiblock directories depth-first in manifest order.
pub struct BlockStream {
    store_dir: PathBuf,
    chunk_size: usize,
    stack: Vec<Layer>,
}

impl BlockStream {
    pub(crate) fn open(store: &BlockStore, digest_hex: &str) -> Result<Self, BeeError> {
        let mut stream = Self {
            store_dir: store.dir_path().to_path_buf(),
            chunk_size: store.chunk_size(),
            stack: Vec::new(),
        };
        stream.push_block(digest_hex)?;
        Ok(stream)
    }

    fn push_block(&mut self, digest_hex: &str) -> Result<(), BeeError> {
        let path = self.store_dir.join(digest_hex);
        if path.is_file() {
            self.stack.push(Layer::File(File::open(path)?));
            return Ok(());
        }
        if path.is_dir() {
            let manifest = Manifest::load(&path)?;
            self.stack.push(Layer::Dir { dir: path, entries: manifest.entries.into_iter() });
            return Ok(());
        }
        Err(BeeError::UnknownBlock(digest_hex.to_string()))
    }

    fn step(&mut self) -> Result<Option<Vec<u8>>, BeeError> {
        loop {
            let Some(layer) = self.stack.last_mut() else {
                return Ok(None);
            };
            match layer {
                Layer::File(file) => {
                    let mut buf = vec![0u8; self.chunk_size];
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        self.stack.pop();
                        continue;
                    }
                    buf.truncate(n);
                    return Ok(Some(buf));
                }
                Layer::Dir { dir, entries } => match entries.next() {
                    None => {
                        self.stack.pop();
                    }
                    Some(ManifestEntry::Segment(i)) => {
                        let path = dir.join(i.to_string());
                        self.stack.push(Layer::File(File::open(path)?));
                    }
                    Some(ManifestEntry::Reference(hex, _)) => {
                        let hex = hex.clone();
                        self.push_block(&hex)?;
                    }
                },
            }
        }
    }
}

impl Iterator for BlockStream {
    type Item = Result<Vec<u8>, BeeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => {
                self.stack.clear();
                Some(Err(e))
            }
        }
    }
}
