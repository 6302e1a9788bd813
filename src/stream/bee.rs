//! The `.bee` container: a complete frame stream persisted to one file.
//!
//! A sequence of records, each a 4-byte big-endian length followed by the
//! encoded frame. EOF at a record boundary ends the stream; EOF inside a
//! record is a format error.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::env::Environment;
use crate::errors::BeeError;
use crate::stream::frame::Frame;
use crate::stream::parse::{DeliveryMode, ItemStream, parse_from_frames};
use crate::stream::serialize::{OutboundItem, serialize_to_frames};
use crate::stream::signal::Signal;
use crate::utils::fsutil;

pub const BEE_EXTENSION: &str = "bee";

/// Serialise `items` and persist the frame stream to
/// `{path}/{file_name}.bee`, returning the full output path.
///
/// # Errors
/// Returns serialisation and I/O errors; a partial output file is
/// removed.
pub fn write_bee_file(
    path: &Path,
    file_name: &str,
    items: Vec<OutboundItem>,
    env: &Environment,
) -> Result<PathBuf, BeeError> {
    std::fs::create_dir_all(path)?;
    let output = path.join(format!("{file_name}.{BEE_EXTENSION}"));
    let result = (|| -> Result<(), BeeError> {
        let file = fsutil::create_secure(&output)?;
        let mut writer = BufWriter::new(file);
        let signal = Arc::new(Signal::new());
        for frame in serialize_to_frames(items, signal, env) {
            let encoded = frame?.encode_to_vec();
            let len = u32::try_from(encoded.len()).map_err(|_| {
                BeeError::MalformedEncoding("frame exceeds the 4-byte record length".to_string())
            })?;
            writer.write_all(&len.to_be_bytes())?;
            writer.write_all(&encoded)?;
        }
        writer.flush()?;
        Ok(())
    })();
    match result {
        Ok(()) => Ok(output),
        Err(e) => {
            let _ = std::fs::remove_file(&output);
            Err(e)
        }
    }
}

/// Frame-by-frame reader over a `.bee` file.
pub struct BeeReader {
    reader: BufReader<File>,
    done: bool,
}

/// # Errors
/// Returns an error if the file cannot be opened.
pub fn read_bee_file(path: &Path) -> Result<BeeReader, BeeError> {
    Ok(BeeReader { reader: BufReader::new(File::open(path)?), done: false })
}

impl BeeReader {
    fn read_record(&mut self) -> Result<Option<Frame>, BeeError> {
        let mut len_bytes = [0u8; 4];
        let mut filled = 0usize;
        while filled < len_bytes.len() {
            let n = self.reader.read(&mut len_bytes[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(BeeError::MalformedEncoding(
                    "bee file truncated inside a record length".to_string(),
                ));
            }
            filled += n;
        }
        let len = u32::from_be_bytes(len_bytes) as usize;
        let mut body = vec![0u8; len];
        self.reader.read_exact(&mut body).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                BeeError::MalformedEncoding("bee file truncated inside a record".to_string())
            } else {
                BeeError::Io(e)
            }
        })?;
        Ok(Some(Frame::decode(&body)?))
    }
}

impl Iterator for BeeReader {
    type Item = Result<Frame, BeeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Parse a `.bee` file back into items.
///
/// # Errors
/// Returns an error if the file or the block store cannot be opened.
pub fn read_from_file(
    path: &Path,
    indices: HashMap<u64, DeliveryMode>,
    env: &Environment,
) -> Result<ItemStream<BeeReader>, BeeError> {
    parse_from_frames(read_bee_file(path)?, indices, Arc::new(Signal::new()), env)
}
