//! Content-addressed block store.
//!
//! Flat directory keyed by the lowercase hex of each block's digest. A
//! block is either a single file (the common case) or a segmented
//! directory (`_.json` + numbered segments) when the block is itself
//! multiblock. Blocks are immutable once ingested; writers stage under a
//! temporary name and rename in, so concurrent ingests of the same
//! content both succeed.

pub mod manifest;
pub mod stream;

use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;

use crate::env::Environment;
use crate::errors::BeeError;
use crate::message::Descriptor;
use crate::utils::fsutil;
use manifest::{Manifest, ManifestEntry};
pub use stream::BlockStream;

const ALGORITHM_MARKER: &str = ".algorithm";

pub struct BlockStore {
    dir: PathBuf,
    chunk_size: usize,
    algorithm: crate::env::DigestAlgorithm,
}

impl BlockStore {
    /// Open (creating if needed) the store at `env.block_dir`.
    ///
    /// The directory remembers the digest algorithm it was created with;
    /// opening it under a different active algorithm is refused, because a
    /// digest change invalidates every key in the store.
    ///
    /// # Errors
    /// Returns `Environment` on an algorithm mismatch, otherwise I/O
    /// errors.
    pub fn open(env: &Environment) -> Result<Self, BeeError> {
        std::fs::create_dir_all(&env.block_dir)?;
        let marker = env.block_dir.join(ALGORITHM_MARKER);
        let active = hex::encode(env.algorithm.id());
        match std::fs::read_to_string(&marker) {
            Ok(recorded) => {
                if recorded.trim() != active {
                    return Err(BeeError::Environment(format!(
                        "block store {} was created under a different digest algorithm",
                        env.block_dir.display()
                    )));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::write(&marker, &active)?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Self { dir: env.block_dir.clone(), chunk_size: env.chunk_size, algorithm: env.algorithm })
    }

    #[must_use]
    pub fn block_path(&self, digest_hex: &str) -> PathBuf {
        self.dir.join(digest_hex)
    }

    #[must_use]
    pub fn exists(&self, digest_hex: &str) -> bool {
        let path = self.block_path(digest_hex);
        path.is_file() || path.is_dir()
    }

    #[must_use]
    pub fn is_multiblock(&self, digest_hex: &str) -> bool {
        self.block_path(digest_hex).is_dir()
    }

    /// Total byte size of a block: the file size, or for a multiblock
    /// block the sum of its segments and (recursively) its referenced
    /// blocks.
    ///
    /// # Errors
    /// Returns `UnknownBlock` if the digest is not in the store.
    pub fn size(&self, digest_hex: &str) -> Result<u64, BeeError> {
        let path = self.block_path(digest_hex);
        if path.is_file() {
            return Ok(std::fs::metadata(&path)?.len());
        }
        if path.is_dir() {
            let manifest = Manifest::load(&path)?;
            let mut total = 0u64;
            for entry in &manifest.entries {
                match entry {
                    ManifestEntry::Segment(i) => {
                        total += std::fs::metadata(path.join(i.to_string()))?.len();
                    }
                    ManifestEntry::Reference(hex, _) => total += self.size(hex)?,
                }
            }
            return Ok(total);
        }
        Err(BeeError::UnknownBlock(digest_hex.to_string()))
    }

    /// Move a file into the store under `digest_hex`. Falls back to
    /// copy-and-unlink when rename crosses devices. Idempotent: an
    /// existing block wins and the source is discarded.
    ///
    /// # Errors
    /// Returns I/O errors from the rename/copy.
    pub fn ingest_by_move(&self, source: &Path, digest_hex: &str) -> Result<(), BeeError> {
        let target = self.block_path(digest_hex);
        if self.exists(digest_hex) {
            std::fs::remove_file(source)?;
            return Ok(());
        }
        if std::fs::rename(source, &target).is_err() {
            std::fs::copy(source, &target)?;
            std::fs::remove_file(source)?;
        }
        debug!("ingested block {digest_hex}");
        Ok(())
    }

    /// Copy a file into the store under `digest_hex`, preserving the
    /// source. Idempotent like [`Self::ingest_by_move`].
    ///
    /// # Errors
    /// Returns I/O errors from the copy.
    pub fn ingest_by_copy(&self, source: &Path, digest_hex: &str) -> Result<(), BeeError> {
        if self.exists(digest_hex) {
            return Ok(());
        }
        std::fs::copy(source, self.block_path(digest_hex))?;
        debug!("ingested block {digest_hex} (copy)");
        Ok(())
    }

    /// Move a staged segmented directory into the store as a multiblock
    /// block. Idempotent: an existing block wins and the staging
    /// directory is discarded.
    ///
    /// # Errors
    /// Returns I/O errors from the rename.
    pub fn ingest_dir_by_move(&self, staged: &Path, digest_hex: &str) -> Result<(), BeeError> {
        if self.exists(digest_hex) {
            fsutil::remove_dir_best_effort(staged);
            return Ok(());
        }
        std::fs::rename(staged, self.block_path(digest_hex))?;
        debug!("ingested multiblock block {digest_hex}");
        Ok(())
    }

    /// Read a block as a lazy sequence of byte chunks, expanding nested
    /// multiblock blocks in manifest order.
    ///
    /// # Errors
    /// Returns `UnknownBlock` if the digest is not in the store.
    pub fn open_stream(&self, digest_hex: &str) -> Result<BlockStream, BeeError> {
        BlockStream::open(self, digest_hex)
    }

    /// Streaming digest of an arbitrary file under the active algorithm.
    ///
    /// # Errors
    /// Returns I/O errors from reading the file.
    pub fn hash_file(&self, path: &Path) -> Result<Vec<u8>, BeeError> {
        let mut hasher = self.algorithm.hasher();
        let mut file = std::fs::File::open(path)?;
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Ingest `path` as a block and return its digest together with the
    /// minimal descriptor that stands in for it inside messages.
    ///
    /// # Errors
    /// Returns I/O errors from hashing or ingestion.
    pub fn create_block(&self, path: &Path, copy: bool) -> Result<(Vec<u8>, Descriptor), BeeError> {
        let digest = self.hash_file(path)?;
        let digest_hex = hex::encode(&digest);
        if copy {
            self.ingest_by_copy(path, &digest_hex)?;
        } else {
            self.ingest_by_move(path, &digest_hex)?;
        }
        let descriptor = Descriptor::for_digest(self.algorithm, &digest);
        Ok((digest, descriptor))
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn dir_path(&self) -> &Path {
        &self.dir
    }
}
