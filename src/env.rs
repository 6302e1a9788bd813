//! Process-wide settings: cache directory, block store directory, digest
//! algorithm, recursion depth, chunk size, and the memory-scope factory.
//!
//! Core APIs take an [`Environment`] explicitly so independent operations
//! (and tests) can run against isolated directories. A once-initialised
//! global is available for embedders that want a single settings table.

use std::fmt;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use sha2::Digest;

use crate::errors::BeeError;
use crate::memory::{self, MemScope, ScopeFactory};

/// Default read-side chunk size: 1 MiB.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Default maximum recursion into nested multiblock blocks during parse.
pub const BLOCK_DEPTH: usize = 1;

/// The digest algorithm addressing the block store.
///
/// Chosen once at process start; an algorithm is identified on the wire by
/// its digest of the empty input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha3_256,
    Sha256,
}

impl DigestAlgorithm {
    /// The 32-byte identifier carried in descriptor hash entries.
    #[must_use]
    pub fn id(&self) -> Vec<u8> {
        match self {
            Self::Sha3_256 => sha3::Sha3_256::digest(b"").to_vec(),
            Self::Sha256 => sha2::Sha256::digest(b"").to_vec(),
        }
    }

    /// Output width in bytes.
    #[must_use]
    pub const fn digest_len(&self) -> usize {
        32
    }

    #[must_use]
    pub fn hasher(&self) -> Hasher {
        match self {
            Self::Sha3_256 => Hasher::Sha3(sha3::Sha3_256::new()),
            Self::Sha256 => Hasher::Sha2(sha2::Sha256::new()),
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha3-256" | "sha3_256" => Some(Self::Sha3_256),
            "sha-256" | "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha3_256 => "sha3-256",
            Self::Sha256 => "sha256",
        }
    }
}

/// Incremental hashing over the active algorithm.
pub enum Hasher {
    Sha3(sha3::Sha3_256),
    Sha2(sha2::Sha256),
}

impl Hasher {
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha3(h) => h.update(bytes),
            Self::Sha2(h) => h.update(bytes),
        }
    }

    #[must_use]
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha3(h) => h.finalize().to_vec(),
            Self::Sha2(h) => h.finalize().to_vec(),
        }
    }
}

#[derive(Clone)]
pub struct Environment {
    pub cache_dir: PathBuf,
    pub block_dir: PathBuf,
    pub block_depth: usize,
    pub chunk_size: usize,
    pub algorithm: DigestAlgorithm,
    pub mem_scope: ScopeFactory,
}

impl Environment {
    /// Build an environment with the default depth, chunk size, algorithm
    /// and a no-op memory scope.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>, block_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            block_dir: block_dir.into(),
            block_depth: BLOCK_DEPTH,
            chunk_size: CHUNK_SIZE,
            algorithm: DigestAlgorithm::Sha3_256,
            mem_scope: memory::noop_factory(),
        }
    }

    /// Build the default environment, honouring `BEEBUF_CACHE_DIR`,
    /// `BEEBUF_BLOCK_DIR`, `BEEBUF_BLOCK_DEPTH`, `BEEBUF_CHUNK_SIZE` and
    /// `BEEBUF_HASH` when set.
    #[must_use]
    pub fn from_env() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let cache_dir = std::env::var("BEEBUF_CACHE_DIR")
            .map_or_else(|_| cwd.join("__cache__").join("beebuf"), PathBuf::from);
        let block_dir = std::env::var("BEEBUF_BLOCK_DIR")
            .map_or_else(|_| cwd.join("__block__"), PathBuf::from);
        let mut env = Self::new(cache_dir, block_dir);
        if let Some(depth) =
            std::env::var("BEEBUF_BLOCK_DEPTH").ok().and_then(|s| s.parse::<usize>().ok())
        {
            env.block_depth = depth;
        }
        if let Some(chunk) =
            std::env::var("BEEBUF_CHUNK_SIZE").ok().and_then(|s| s.parse::<usize>().ok())
        {
            env.chunk_size = chunk.max(1);
        }
        if let Some(algo) =
            std::env::var("BEEBUF_HASH").ok().and_then(|s| DigestAlgorithm::from_name(&s))
        {
            env.algorithm = algo;
        }
        env
    }

    /// Open a memory-accounting scope for an anticipated byte count.
    #[must_use]
    pub fn scope(&self, len: usize) -> Box<dyn MemScope> {
        (self.mem_scope)(len)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("cache_dir", &self.cache_dir)
            .field("block_dir", &self.block_dir)
            .field("block_depth", &self.block_depth)
            .field("chunk_size", &self.chunk_size)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

static GLOBAL: OnceCell<Environment> = OnceCell::new();

/// Install the process-wide environment. May be called at most once, before
/// any use of [`global`].
///
/// # Errors
/// Returns `BeeError::Environment` if the environment was already
/// initialised.
pub fn configure(env: Environment) -> Result<(), BeeError> {
    GLOBAL
        .set(env)
        .map_err(|_| BeeError::Environment("environment already initialised".to_string()))
}

/// The process-wide environment, initialised from process environment
/// variables on first use.
#[must_use]
pub fn global() -> Environment {
    GLOBAL.get_or_init(Environment::from_env).clone()
}
