//! A schema-less structured message.
//!
//! `DynMessage` holds fields in declaration (insertion) order and encodes
//! them with the standard length-delimited wire format. Decoding is
//! schema-blind: every length-delimited field comes back as bytes, which
//! re-encode to the identical byte stream.

use crate::errors::BeeError;
use crate::message::reflect::{Field, FieldRef, Reflect};
use crate::utils::num;
use crate::wire::tag::{self, WireType};
use crate::wire::varint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Message(DynMessage),
    Repeated(Vec<DynMessage>),
    Bytes(Vec<u8>),
    Str(String),
    UInt(u64),
    Fixed64(u64),
    Fixed32(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DynMessage {
    fields: Vec<(u32, Value)>,
}

impl DynMessage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_message(&mut self, number: u32, message: DynMessage) {
        self.fields.push((number, Value::Message(message)));
    }

    pub fn push_repeated(&mut self, number: u32, elements: Vec<DynMessage>) {
        self.fields.push((number, Value::Repeated(elements)));
    }

    pub fn push_bytes(&mut self, number: u32, bytes: impl Into<Vec<u8>>) {
        self.fields.push((number, Value::Bytes(bytes.into())));
    }

    pub fn push_str(&mut self, number: u32, value: impl Into<String>) {
        self.fields.push((number, Value::Str(value.into())));
    }

    pub fn push_uint(&mut self, number: u32, value: u64) {
        self.fields.push((number, Value::UInt(value)));
    }

    pub fn push_fixed64(&mut self, number: u32, value: u64) {
        self.fields.push((number, Value::Fixed64(value)));
    }

    pub fn push_fixed32(&mut self, number: u32, value: u32) {
        self.fields.push((number, Value::Fixed32(value)));
    }

    /// First value stored under `number`, if any.
    #[must_use]
    pub fn get(&self, number: u32) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| *n == number).map(|(_, v)| v)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decode a wire-format body. Length-delimited fields come back as
    /// [`Value::Bytes`]; varint and fixed fields keep their width class.
    ///
    /// # Errors
    /// Returns `MalformedEncoding` on truncation or an unsupported wire
    /// type.
    pub fn decode(buf: &[u8]) -> Result<Self, BeeError> {
        let mut fields = Vec::new();
        let mut pos = 0usize;
        while pos < buf.len() {
            let (raw_tag, tag_width) = varint::decode_with_width(buf, pos)?;
            let (number, wire_type) = tag::unpack(raw_tag)?;
            pos += tag_width;
            match wire_type {
                WireType::Varint => {
                    let (value, w) = varint::decode_with_width(buf, pos)?;
                    pos += w;
                    fields.push((number, Value::UInt(value)));
                }
                WireType::LengthDelimited => {
                    let (len, w) = varint::decode_with_width(buf, pos)?;
                    pos += w;
                    let len = num::u64_to_usize(len).ok_or_else(|| {
                        BeeError::MalformedEncoding(format!("field {number} length {len} too large"))
                    })?;
                    let end = pos.checked_add(len).filter(|&e| e <= buf.len()).ok_or_else(
                        || {
                            BeeError::MalformedEncoding(format!(
                                "field {number} body exceeds the buffer"
                            ))
                        },
                    )?;
                    fields.push((number, Value::Bytes(buf[pos..end].to_vec())));
                    pos = end;
                }
                WireType::Fixed64 => {
                    let end = pos.checked_add(8).filter(|&e| e <= buf.len()).ok_or_else(|| {
                        BeeError::MalformedEncoding(format!("fixed64 field {number} truncated"))
                    })?;
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(&buf[pos..end]);
                    fields.push((number, Value::Fixed64(u64::from_le_bytes(raw))));
                    pos = end;
                }
                WireType::Fixed32 => {
                    let end = pos.checked_add(4).filter(|&e| e <= buf.len()).ok_or_else(|| {
                        BeeError::MalformedEncoding(format!("fixed32 field {number} truncated"))
                    })?;
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(&buf[pos..end]);
                    fields.push((number, Value::Fixed32(u32::from_le_bytes(raw))));
                    pos = end;
                }
            }
        }
        Ok(Self { fields })
    }
}

fn value_encoded_len(number: u32, value: &Value) -> usize {
    match value {
        Value::Message(m) => {
            let inner = m.encoded_len();
            tag::width(number, WireType::LengthDelimited) + varint::width(num::usize_to_u64(inner)) + inner
        }
        Value::Repeated(elements) => elements
            .iter()
            .map(|m| {
                let inner = m.encoded_len();
                tag::width(number, WireType::LengthDelimited)
                    + varint::width(num::usize_to_u64(inner))
                    + inner
            })
            .sum(),
        Value::Bytes(b) => {
            tag::width(number, WireType::LengthDelimited) + varint::width(num::usize_to_u64(b.len())) + b.len()
        }
        Value::Str(s) => {
            tag::width(number, WireType::LengthDelimited)
                + varint::width(num::usize_to_u64(s.len()))
                + s.len()
        }
        Value::UInt(n) => tag::width(number, WireType::Varint) + varint::width(*n),
        Value::Fixed64(_) => tag::width(number, WireType::Fixed64) + 8,
        Value::Fixed32(_) => tag::width(number, WireType::Fixed32) + 4,
    }
}

fn encode_value(number: u32, value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Message(m) => {
            varint::encode_into(tag::pack(number, WireType::LengthDelimited), out);
            varint::encode_into(num::usize_to_u64(m.encoded_len()), out);
            m.encode_into(out);
        }
        Value::Repeated(elements) => {
            for m in elements {
                varint::encode_into(tag::pack(number, WireType::LengthDelimited), out);
                varint::encode_into(num::usize_to_u64(m.encoded_len()), out);
                m.encode_into(out);
            }
        }
        Value::Bytes(b) => {
            varint::encode_into(tag::pack(number, WireType::LengthDelimited), out);
            varint::encode_into(num::usize_to_u64(b.len()), out);
            out.extend_from_slice(b);
        }
        Value::Str(s) => {
            varint::encode_into(tag::pack(number, WireType::LengthDelimited), out);
            varint::encode_into(num::usize_to_u64(s.len()), out);
            out.extend_from_slice(s.as_bytes());
        }
        Value::UInt(n) => {
            varint::encode_into(tag::pack(number, WireType::Varint), out);
            varint::encode_into(*n, out);
        }
        Value::Fixed64(n) => {
            varint::encode_into(tag::pack(number, WireType::Fixed64), out);
            out.extend_from_slice(&n.to_le_bytes());
        }
        Value::Fixed32(n) => {
            varint::encode_into(tag::pack(number, WireType::Fixed32), out);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

impl Reflect for DynMessage {
    fn fields(&self) -> Vec<Field<'_>> {
        self.fields
            .iter()
            .map(|(number, value)| {
                let value = match value {
                    Value::Message(m) => FieldRef::Message(m),
                    Value::Repeated(elements) => {
                        FieldRef::Repeated(elements.iter().map(|m| m as &dyn Reflect).collect())
                    }
                    Value::Bytes(b) => FieldRef::Bytes(b),
                    Value::Str(s) => FieldRef::Bytes(s.as_bytes()),
                    scalar => FieldRef::Scalar { encoded_len: value_encoded_len(*number, scalar) },
                };
                Field { number: *number, value }
            })
            .collect()
    }

    fn encoded_len(&self) -> usize {
        self.fields.iter().map(|(number, value)| value_encoded_len(*number, value)).sum()
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        for (number, value) in &self.fields {
            encode_value(*number, value, out);
        }
    }
}
