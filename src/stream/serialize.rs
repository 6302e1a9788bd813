//! The outbound half of the streaming codec.
//!
//! Items become lazy frame sequences: small pointer-free messages travel
//! as one self-contained frame; larger ones spill to a temporary file
//! under memory accounting and stream as chunks; segmented directories
//! stream through the registry reader, block boundaries included. The
//! serialiser polls the flow-control signal before every chunk.

use std::collections::VecDeque;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::env::Environment;
use crate::errors::BeeError;
use crate::message::{Descriptor, DynMessage, FieldRef, Reflect};
use crate::stream::frame::Frame;
use crate::stream::reader::RegistryReader;
use crate::stream::signal::Signal;

/// One outbound item: a structured message, a segmented directory on
/// disk, or raw bytes (always routed by index 0).
pub enum OutboundItem {
    Message { index: u64, message: DynMessage },
    Directory { index: u64, path: PathBuf },
    Bytes(Vec<u8>),
}

/// Does any byte leaf of `message` parse as a block-pointer descriptor?
#[must_use]
pub fn contains_blocks(message: &dyn Reflect) -> bool {
    message.fields().iter().any(|field| match &field.value {
        FieldRef::Message(m) => contains_blocks(*m),
        FieldRef::Repeated(elements) => elements.iter().any(|m| contains_blocks(*m)),
        FieldRef::Bytes(bytes) => {
            Descriptor::decode(bytes).is_ok_and(|d| !d.hashes.is_empty())
        }
        FieldRef::Scalar { .. } => false,
    })
}

enum Source {
    File(fs::File),
    Registry(RegistryReader),
}

impl Source {
    fn next_frame(&mut self, chunk_size: usize) -> Result<Option<Frame>, BeeError> {
        match self {
            Self::File(file) => {
                let mut buf = vec![0u8; chunk_size];
                let n = file.read(&mut buf)?;
                if n == 0 {
                    return Ok(None);
                }
                buf.truncate(n);
                Ok(Some(Frame::chunk(buf)))
            }
            Self::Registry(reader) => reader.next().transpose(),
        }
    }
}

enum State {
    Idle,
    Frames { queue: VecDeque<Frame>, then: Option<Source> },
    Streaming { source: Source },
    Done,
}

/// Lazy frame sequence over a sequence of outbound items.
pub struct FrameStream<I> {
    items: I,
    env: Environment,
    signal: Arc<Signal>,
    state: State,
}

/// Serialise `items` into a frame stream sharing `signal` with the
/// parser on the same peer.
pub fn serialize_to_frames<I>(
    items: I,
    signal: Arc<Signal>,
    env: &Environment,
) -> FrameStream<I::IntoIter>
where
    I: IntoIterator<Item = OutboundItem>,
{
    FrameStream { items: items.into_iter(), env: env.clone(), signal, state: State::Idle }
}

impl<I> FrameStream<I>
where
    I: Iterator<Item = OutboundItem>,
{
    fn plan(&mut self, item: OutboundItem) -> Result<State, BeeError> {
        match item {
            OutboundItem::Bytes(bytes) => self.plan_bytes(0, bytes, false),
            OutboundItem::Message { index, message } => {
                let blocks = contains_blocks(&message);
                let bytes = message.encode_to_vec();
                self.plan_bytes(index, bytes, blocks)
            }
            OutboundItem::Directory { index, path } => {
                debug!("streaming directory {} on index {index}", path.display());
                let reader = RegistryReader::open(&path, &self.env)?;
                Ok(State::Frames {
                    queue: VecDeque::from([Frame::head(index)]),
                    then: Some(Source::Registry(reader)),
                })
            }
        }
    }

    fn plan_bytes(
        &mut self,
        index: u64,
        bytes: Vec<u8>,
        has_blocks: bool,
    ) -> Result<State, BeeError> {
        if bytes.len() < self.env.chunk_size && !has_blocks {
            return Ok(State::Frames {
                queue: VecDeque::from([Frame::inline(index, bytes)]),
                then: None,
            });
        }
        // Spill to an anonymous temporary file so the frame stream never
        // holds the whole serialisation.
        fs::create_dir_all(&self.env.cache_dir)?;
        let mut file = tempfile::tempfile_in(&self.env.cache_dir)?;
        {
            let _scope = self.env.scope(bytes.len());
            file.write_all(&bytes)?;
        }
        file.seek(SeekFrom::Start(0))?;
        Ok(State::Frames {
            queue: VecDeque::from([Frame::head(index)]),
            then: Some(Source::File(file)),
        })
    }
}

impl<I> Iterator for FrameStream<I>
where
    I: Iterator<Item = OutboundItem>,
{
    type Item = Result<Frame, BeeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.state {
                State::Done => return None,
                State::Idle => match self.items.next() {
                    None => {
                        self.state = State::Done;
                        return None;
                    }
                    Some(item) => match self.plan(item) {
                        Ok(state) => self.state = state,
                        Err(e) => {
                            self.state = State::Done;
                            return Some(Err(e));
                        }
                    },
                },
                State::Frames { queue, then } => {
                    if let Some(frame) = queue.pop_front() {
                        if frame.chunk.is_some() {
                            self.signal.wait_while_raised();
                        }
                        return Some(Ok(frame));
                    }
                    self.state = match then.take() {
                        Some(source) => State::Streaming { source },
                        None => State::Idle,
                    };
                }
                State::Streaming { source } => match source.next_frame(self.env.chunk_size) {
                    Ok(Some(frame)) => {
                        if frame.chunk.is_some() {
                            self.signal.wait_while_raised();
                        }
                        return Some(Ok(frame));
                    }
                    Ok(None) => {
                        self.state = State::Frames {
                            queue: VecDeque::from([Frame::separator()]),
                            then: None,
                        };
                    }
                    Err(e) => {
                        self.state = State::Done;
                        return Some(Err(e));
                    }
                },
            }
        }
    }
}
