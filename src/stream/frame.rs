//! The transport frame.
//!
//! One frame is one unit on the stream; every field is optional and any
//! combination is legal. Wire shape:
//!
//! ```text
//! Frame { Head head = 1; bytes chunk = 2; Descriptor block = 3;
//!         bool signal = 4; bool separator = 5; }
//! Head  { uint64 index = 1; }
//! ```

use crate::errors::BeeError;
use crate::message::Descriptor;
use crate::utils::num;
use crate::wire::tag::{self, WireType};
use crate::wire::varint;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub head: Option<u64>,
    pub chunk: Option<Vec<u8>>,
    pub block: Option<Descriptor>,
    pub signal: Option<bool>,
    pub separator: Option<bool>,
}

impl Frame {
    #[must_use]
    pub fn head(index: u64) -> Self {
        Self { head: Some(index), ..Self::default() }
    }

    #[must_use]
    pub fn chunk(bytes: impl Into<Vec<u8>>) -> Self {
        Self { chunk: Some(bytes.into()), ..Self::default() }
    }

    #[must_use]
    pub fn block(descriptor: Descriptor) -> Self {
        Self { block: Some(descriptor), ..Self::default() }
    }

    #[must_use]
    pub fn signal(raise: bool) -> Self {
        Self { signal: Some(raise), ..Self::default() }
    }

    #[must_use]
    pub fn separator() -> Self {
        Self { separator: Some(true), ..Self::default() }
    }

    /// A self-contained small message: head, chunk and separator in one
    /// frame.
    #[must_use]
    pub fn inline(index: u64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            head: Some(index),
            chunk: Some(bytes.into()),
            separator: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(index) = self.head {
            let inner = tag::width(1, WireType::Varint) + varint::width(index);
            varint::encode_into(tag::pack(1, WireType::LengthDelimited), &mut out);
            varint::encode_into(num::usize_to_u64(inner), &mut out);
            varint::encode_into(tag::pack(1, WireType::Varint), &mut out);
            varint::encode_into(index, &mut out);
        }
        if let Some(chunk) = &self.chunk {
            varint::encode_into(tag::pack(2, WireType::LengthDelimited), &mut out);
            varint::encode_into(num::usize_to_u64(chunk.len()), &mut out);
            out.extend_from_slice(chunk);
        }
        if let Some(block) = &self.block {
            varint::encode_into(tag::pack(3, WireType::LengthDelimited), &mut out);
            varint::encode_into(num::usize_to_u64(block.encoded_len()), &mut out);
            block.encode_into(&mut out);
        }
        if let Some(signal) = self.signal {
            varint::encode_into(tag::pack(4, WireType::Varint), &mut out);
            varint::encode_into(u64::from(signal), &mut out);
        }
        if let Some(separator) = self.separator {
            varint::encode_into(tag::pack(5, WireType::Varint), &mut out);
            varint::encode_into(u64::from(separator), &mut out);
        }
        out
    }

    /// # Errors
    /// Returns `MalformedEncoding` on truncation, an unknown field, or a
    /// wire type mismatch.
    pub fn decode(buf: &[u8]) -> Result<Self, BeeError> {
        let mut frame = Self::default();
        let mut pos = 0usize;
        while pos < buf.len() {
            let (raw_tag, tag_width) = varint::decode_with_width(buf, pos)?;
            let (number, wire_type) = tag::unpack(raw_tag)?;
            pos += tag_width;
            match (number, wire_type) {
                (1, WireType::LengthDelimited) => {
                    let body = read_delimited(buf, &mut pos)?;
                    frame.head = Some(decode_head(body)?);
                }
                (2, WireType::LengthDelimited) => {
                    let body = read_delimited(buf, &mut pos)?;
                    frame.chunk = Some(body.to_vec());
                }
                (3, WireType::LengthDelimited) => {
                    let body = read_delimited(buf, &mut pos)?;
                    frame.block = Some(Descriptor::decode(body)?);
                }
                (4, WireType::Varint) => {
                    let (value, w) = varint::decode_with_width(buf, pos)?;
                    pos += w;
                    frame.signal = Some(value != 0);
                }
                (5, WireType::Varint) => {
                    let (value, w) = varint::decode_with_width(buf, pos)?;
                    pos += w;
                    frame.separator = Some(value != 0);
                }
                (number, _) => {
                    return Err(BeeError::MalformedEncoding(format!(
                        "unexpected frame field {number}"
                    )));
                }
            }
        }
        Ok(frame)
    }
}

fn read_delimited<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8], BeeError> {
    let (len, w) = varint::decode_with_width(buf, *pos)?;
    *pos += w;
    let len = num::u64_to_usize(len)
        .ok_or_else(|| BeeError::MalformedEncoding("frame field length too large".to_string()))?;
    let end = pos
        .checked_add(len)
        .filter(|&e| e <= buf.len())
        .ok_or_else(|| BeeError::MalformedEncoding("frame field exceeds the buffer".to_string()))?;
    let body = &buf[*pos..end];
    *pos = end;
    Ok(body)
}

fn decode_head(buf: &[u8]) -> Result<u64, BeeError> {
    let mut index = 0u64;
    let mut pos = 0usize;
    while pos < buf.len() {
        let (raw_tag, tag_width) = varint::decode_with_width(buf, pos)?;
        let (number, wire_type) = tag::unpack(raw_tag)?;
        pos += tag_width;
        if number != 1 || wire_type != WireType::Varint {
            return Err(BeeError::MalformedEncoding(format!("unexpected head field {number}")));
        }
        let (value, w) = varint::decode_with_width(buf, pos)?;
        pos += w;
        index = value;
    }
    Ok(index)
}
