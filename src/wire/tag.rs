//! Field tags: `(field_number << 3) | wire_type`, varint-encoded.

use crate::errors::BeeError;
use crate::wire::varint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    /// # Errors
    /// Returns `MalformedEncoding` for the deprecated group wire types and
    /// any out-of-range value.
    pub fn from_raw(raw: u64) -> Result<Self, BeeError> {
        match raw {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => {
                Err(BeeError::MalformedEncoding(format!("unsupported wire type {other}")))
            }
        }
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        match self {
            Self::Varint => 0,
            Self::Fixed64 => 1,
            Self::LengthDelimited => 2,
            Self::Fixed32 => 5,
        }
    }
}

#[must_use]
pub const fn pack(field_number: u32, wire_type: WireType) -> u64 {
    ((field_number as u64) << 3) | wire_type.raw()
}

/// # Errors
/// Returns `MalformedEncoding` if the wire type bits are invalid.
pub fn unpack(tag: u64) -> Result<(u32, WireType), BeeError> {
    let wire_type = WireType::from_raw(tag & 0x07)?;
    let field_number = u32::try_from(tag >> 3)
        .map_err(|_| BeeError::MalformedEncoding(format!("field number in tag {tag} too large")))?;
    Ok((field_number, wire_type))
}

/// Encoded width of the tag for `field_number`/`wire_type`. One byte for
/// field numbers up to 15.
#[must_use]
pub const fn width(field_number: u32, wire_type: WireType) -> usize {
    varint::width(pack(field_number, wire_type))
}
