use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;

/// Upper bound (inclusive) for the numeric nonce naming cache entries.
pub const MAX_DIR: u32 = 999_999_999;

/// Create a file with restrictive permissions where supported.
///
/// On Unix, this maps to 0o600. On Windows, the default inherits ACLs; we just avoid world-writable flags.
///
/// # Errors
/// Returns an error if the file cannot be created/opened.
pub fn create_secure(path: &Path) -> io::Result<File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
    }
    #[cfg(not(unix))]
    {
        OpenOptions::new().write(true).create(true).truncate(true).open(path)
    }
}

/// Create a fresh, uniquely named subdirectory of `base`.
///
/// Names are random numbers in `1..=MAX_DIR`; collisions are retried. The
/// base directory is created if missing.
///
/// # Errors
/// Returns an error if the base directory cannot be created or a new
/// subdirectory cannot be made for reasons other than a name collision.
pub fn generate_random_dir(base: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(base)?;
    let mut rng = rand::rng();
    loop {
        let candidate = base.join(rng.random_range(1..=MAX_DIR).to_string());
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
}

/// Reserve a fresh, uniquely named file path under `base` and create it empty.
///
/// # Errors
/// Returns an error if the base directory or the file cannot be created.
pub fn generate_random_file(base: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(base)?;
    let mut rng = rand::rng();
    loop {
        let candidate = base.join(rng.random_range(1..=MAX_DIR).to_string());
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
}

/// Remove a directory tree, ignoring errors. Used on failure paths where the
/// original error is the one worth reporting.
pub fn remove_dir_best_effort(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        log::warn!("failed to remove partial directory {}: {e}", path.display());
    }
}
