//! The schema-reflection capability.
//!
//! The multiblock machinery never interprets message schemas itself: it
//! walks whatever a message exposes through [`Reflect`]. Generated or
//! hand-built message types implement this trait; the crate ships
//! [`crate::message::DynMessage`] as a schema-less implementation.

/// One present field, in declaration order.
pub struct Field<'a> {
    pub number: u32,
    pub value: FieldRef<'a>,
}

/// A view of a field's value, shaped the way the pointer walker needs it.
pub enum FieldRef<'a> {
    /// A single embedded sub-message.
    Message(&'a dyn Reflect),
    /// A repeated sub-message container; elements in order.
    Repeated(Vec<&'a dyn Reflect>),
    /// Raw bytes or string content.
    Bytes(&'a [u8]),
    /// Any other scalar; only its full encoded footprint (tag included)
    /// matters to the walker.
    Scalar { encoded_len: usize },
}

/// Capability exposed by structured message types: iterate present fields
/// in declaration order and produce the length-prefixed wire encoding.
pub trait Reflect {
    fn fields(&self) -> Vec<Field<'_>>;

    /// Encoded size of the whole message body.
    fn encoded_len(&self) -> usize;

    fn encode_into(&self, out: &mut Vec<u8>);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }
}
