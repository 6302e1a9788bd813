//! The inbound half of the streaming codec.
//!
//! Pulls frames one at a time and reassembles logical messages, either
//! into memory (message mode) or onto disk as segmented directories
//! (directory mode). Blocks already present in the local store are not
//! re-transferred: the parser substitutes the stored bytes and discards
//! the incoming body. Partial directories are removed on any failure.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::driver::generate_wbp_file;
use crate::env::Environment;
use crate::errors::BeeError;
use crate::message::DynMessage;
use crate::store::BlockStore;
use crate::store::manifest::Manifest;
use crate::stream::frame::Frame;
use crate::stream::signal::Signal;
use crate::utils::fsutil;

/// How the payload of an index is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Accumulate in memory and parse into a structured message (raw
    /// bytes for index 0).
    Memory,
    /// Write to a segmented cache directory; single-segment payloads are
    /// promoted to a flat file.
    Disk,
    /// Like `Memory`, but an empty payload yields an explicit sentinel
    /// instead of being skipped.
    Empty,
}

/// One reassembled inbound item.
#[derive(Debug, PartialEq)]
pub enum InboundItem {
    Message { index: u64, message: DynMessage },
    Bytes { index: u64, bytes: Vec<u8> },
    Directory { index: u64, path: PathBuf },
    File { index: u64, path: PathBuf },
    Empty { index: u64 },
}

/// Lazy item sequence over an inbound frame stream.
pub struct ItemStream<I> {
    frames: I,
    indices: HashMap<u64, DeliveryMode>,
    signal: Arc<Signal>,
    env: Environment,
    store: BlockStore,
    done: bool,
}

/// Parse `frames` according to `indices`, sharing `signal` with this
/// peer's serialiser so remote flow-control frames reach it.
///
/// Index 0 (raw bytes) is implicitly declared in `Memory` mode unless
/// overridden.
///
/// # Errors
/// Returns an error if the block store cannot be opened.
pub fn parse_from_frames<I>(
    frames: I,
    indices: HashMap<u64, DeliveryMode>,
    signal: Arc<Signal>,
    env: &Environment,
) -> Result<ItemStream<I::IntoIter>, BeeError>
where
    I: IntoIterator<Item = Result<Frame, BeeError>>,
{
    let store = BlockStore::open(env)?;
    Ok(ItemStream {
        frames: frames.into_iter(),
        indices,
        signal,
        env: env.clone(),
        store,
        done: false,
    })
}

impl<I> ItemStream<I>
where
    I: Iterator<Item = Result<Frame, BeeError>>,
{
    fn apply_signal(&self, frame: &Frame) {
        match frame.signal {
            Some(true) => self.signal.raise(),
            Some(false) => self.signal.lower(),
            None => {}
        }
    }

    fn pull(&mut self) -> Result<Frame, BeeError> {
        match self.frames.next() {
            None => Err(BeeError::AbortedIteration),
            Some(Err(e)) => Err(e),
            Some(Ok(frame)) => {
                self.apply_signal(&frame);
                Ok(frame)
            }
        }
    }

    /// Accumulate one logical message into memory. Known blocks are
    /// substituted from the store (pausing the writer while the store is
    /// read) and their streamed bodies discarded.
    fn parse_message(&mut self, first: Frame) -> Result<Vec<u8>, BeeError> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut skip: Option<(String, Vec<String>)> = None;
        let mut frame = first;
        loop {
            if let Some(descriptor) = &frame.block {
                let digest_hex = descriptor.hex_for(self.env.algorithm)?;
                if let Some((target, nested)) = &mut skip {
                    if nested.last() == Some(&digest_hex) {
                        nested.pop();
                    } else if digest_hex == *target && nested.is_empty() {
                        skip = None;
                    } else if digest_hex == *target {
                        return Err(BeeError::Intersection(digest_hex));
                    } else {
                        nested.push(digest_hex);
                    }
                } else if self.store.exists(&digest_hex) {
                    debug!("substituting local block {digest_hex}");
                    self.signal.raise();
                    let result: Result<(), BeeError> = (|| {
                        for chunk in self.store.open_stream(&digest_hex)? {
                            buffer.extend_from_slice(&chunk?);
                        }
                        Ok(())
                    })();
                    self.signal.lower();
                    result?;
                    skip = Some((digest_hex, Vec::new()));
                }
                // Unknown block: its body arrives inline as chunks.
            }
            if let Some(chunk) = &frame.chunk {
                if skip.is_none() {
                    buffer.extend_from_slice(chunk);
                }
            }
            if frame.separator == Some(true) {
                if skip.is_some() {
                    return Err(BeeError::MalformedEncoding(
                        "separator inside a block body".to_string(),
                    ));
                }
                break;
            }
            frame = self.pull()?;
        }
        if buffer.is_empty() {
            return Err(BeeError::EmptyBuffer);
        }
        Ok(buffer)
    }

    /// Discard frames up to the closing boundary of `target`.
    fn drain_block(&mut self, target: &str) -> Result<(), BeeError> {
        let mut nested: Vec<String> = Vec::new();
        loop {
            let frame = self.pull()?;
            if let Some(descriptor) = &frame.block {
                let digest_hex = descriptor.hex_for(self.env.algorithm)?;
                if nested.last() == Some(&digest_hex) {
                    nested.pop();
                } else if digest_hex == target && nested.is_empty() {
                    return Ok(());
                } else if digest_hex == target {
                    return Err(BeeError::Intersection(digest_hex));
                } else {
                    nested.push(digest_hex);
                }
            }
            if frame.separator == Some(true) {
                return Err(BeeError::MalformedEncoding(
                    "separator inside a block body".to_string(),
                ));
            }
        }
    }

    /// Receive one block body into the store. `open` holds the digests of
    /// every enclosing block; its depth is bounded by the environment.
    fn save_block(
        &mut self,
        digest_hex: &str,
        prev: Option<Vec<u8>>,
        open: &mut Vec<String>,
    ) -> Result<(), BeeError> {
        if open.len() >= self.env.block_depth {
            return Err(BeeError::DepthExceeded(self.env.block_depth));
        }
        if open.iter().any(|h| h == digest_hex) {
            return Err(BeeError::Intersection(digest_hex.to_string()));
        }
        open.push(digest_hex.to_string());
        let stage = fsutil::generate_random_dir(&self.env.cache_dir)?;
        let result = self.save_block_inner(&stage, digest_hex, prev, open);
        open.pop();
        if let Err(e) = result {
            fsutil::remove_dir_best_effort(&stage);
            return Err(e);
        }
        Ok(())
    }

    fn save_block_inner(
        &mut self,
        stage: &Path,
        digest_hex: &str,
        prev: Option<Vec<u8>>,
        open: &mut Vec<String>,
    ) -> Result<(), BeeError> {
        let mut manifest = Manifest::new();
        let mut segment = 1u32;
        manifest.push_segment(segment);
        let mut file = fs::File::create(stage.join(segment.to_string()))?;
        if let Some(prev) = prev {
            file.write_all(&prev)?;
        }
        loop {
            let frame = self.pull()?;
            let Frame { chunk, block, separator, .. } = frame;
            if let Some(descriptor) = block {
                let inner_hex = descriptor.hex_for(self.env.algorithm)?;
                if inner_hex == digest_hex {
                    break;
                }
                manifest
                    .push_reference(inner_hex.clone(), descriptor.previous_lengths_position);
                if self.store.exists(&inner_hex) {
                    self.drain_block(&inner_hex)?;
                } else {
                    self.save_block(&inner_hex, chunk, open)?;
                }
                segment += 1;
                manifest.push_segment(segment);
                file = fs::File::create(stage.join(segment.to_string()))?;
                continue;
            }
            if let Some(chunk) = chunk {
                file.write_all(&chunk)?;
            }
            if separator == Some(true) {
                return Err(BeeError::MalformedEncoding(
                    "separator inside a block body".to_string(),
                ));
            }
        }
        file.sync_all()?;
        drop(file);
        if segment == 1 && manifest.reference_count() == 0 {
            self.store.ingest_by_move(&stage.join("1"), digest_hex)?;
            fs::remove_dir_all(stage)?;
        } else {
            manifest.store(stage)?;
            self.store.ingest_dir_by_move(stage, digest_hex)?;
        }
        debug!("received block {digest_hex}");
        Ok(())
    }

    /// Write one logical message into a fresh segmented cache directory.
    fn save_to_dir(&mut self, index: u64, first: Frame) -> Result<InboundItem, BeeError> {
        let dir = fsutil::generate_random_dir(&self.env.cache_dir)?;
        match self.save_to_dir_inner(&dir, first) {
            Ok(Some(promoted)) => Ok(InboundItem::File { index, path: promoted }),
            Ok(None) => Ok(InboundItem::Directory { index, path: dir }),
            Err(e) => {
                fsutil::remove_dir_best_effort(&dir);
                Err(e)
            }
        }
    }

    /// Returns the promoted flat-file path when the payload collapsed to a
    /// single segment with no references.
    fn save_to_dir_inner(&mut self, dir: &Path, first: Frame) -> Result<Option<PathBuf>, BeeError> {
        let mut manifest = Manifest::new();
        let mut segment = 1u32;
        manifest.push_segment(segment);
        let mut file = fs::File::create(dir.join(segment.to_string()))?;
        let mut frame = first;
        loop {
            let Frame { chunk, block, separator, .. } = frame;
            if let Some(descriptor) = block {
                let digest_hex = descriptor.hex_for(self.env.algorithm)?;
                manifest
                    .push_reference(digest_hex.clone(), descriptor.previous_lengths_position);
                if self.store.exists(&digest_hex) {
                    self.drain_block(&digest_hex)?;
                } else {
                    let mut open = Vec::new();
                    self.save_block(&digest_hex, chunk, &mut open)?;
                }
                segment += 1;
                manifest.push_segment(segment);
                file = fs::File::create(dir.join(segment.to_string()))?;
            } else {
                if let Some(chunk) = chunk {
                    file.write_all(&chunk)?;
                }
                if separator == Some(true) {
                    break;
                }
            }
            frame = self.pull()?;
        }
        file.sync_all()?;
        drop(file);
        if segment == 1 && manifest.reference_count() == 0 {
            let target = fsutil::generate_random_file(&self.env.cache_dir)?;
            fs::rename(dir.join("1"), &target)?;
            fs::remove_dir_all(dir)?;
            debug!("promoted single-segment payload to {}", target.display());
            return Ok(Some(target));
        }
        manifest.store(dir)?;
        generate_wbp_file(dir, &self.env)?;
        debug!("saved segmented payload at {}", dir.display());
        Ok(None)
    }
}

impl<I> Iterator for ItemStream<I>
where
    I: Iterator<Item = Result<Frame, BeeError>>,
{
    type Item = Result<InboundItem, BeeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let frame = match self.frames.next() {
                None => return None,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(frame)) => frame,
            };
            self.apply_signal(&frame);
            if frame.head.is_none()
                && frame.chunk.is_none()
                && frame.block.is_none()
                && frame.separator.is_none()
            {
                continue;
            }
            let index = match frame.head {
                Some(index) => {
                    if index != 0 && !self.indices.contains_key(&index) {
                        self.done = true;
                        return Some(Err(BeeError::UnknownIndex(index)));
                    }
                    index
                }
                None if self.indices.contains_key(&1) => 1,
                None => 0,
            };
            let mode = self.indices.get(&index).copied().unwrap_or(DeliveryMode::Memory);
            let result = match mode {
                DeliveryMode::Disk => self.save_to_dir(index, frame),
                DeliveryMode::Memory | DeliveryMode::Empty => match self.parse_message(frame) {
                    Err(BeeError::EmptyBuffer) => {
                        if mode == DeliveryMode::Empty {
                            return Some(Ok(InboundItem::Empty { index }));
                        }
                        continue;
                    }
                    Err(e) => Err(e),
                    Ok(bytes) if index == 0 => Ok(InboundItem::Bytes { index, bytes }),
                    Ok(bytes) => DynMessage::decode(&bytes)
                        .map(|message| InboundItem::Message { index, message }),
                },
            };
            match result {
                Ok(item) => return Some(Ok(item)),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
