#![forbid(unsafe_code)]

//! beebuf transports and persists structured messages far larger than a
//! comfortable RPC payload. Large opaque byte leaves are replaced by
//! small content-addressed descriptors; the leaf bytes live in an on-disk
//! block store, so a peer that already holds a block by digest never
//! receives it twice.
//!
//! The crate splits into:
//! - [`wire`] / [`message`]: the varint/tag codec, the schema-reflection
//!   capability, and block-pointer descriptors;
//! - [`store`]: the content-addressed block store;
//! - [`builder`]: the multiblock encoder, emitting segmented directories
//!   and real content identifiers;
//! - [`driver`]: the reconstructor collapsing a segmented directory back
//!   into a contiguous pruned serialisation (`wbp.bin`);
//! - [`stream`]: the frame codec, serialiser, parser, flow-control
//!   signal, and the `.bee` container;
//! - [`env`]: process-wide settings.

pub mod builder;
pub mod driver;
pub mod env;
pub mod errors;
pub mod logger;
pub mod memory;
pub mod message;
pub mod store;
pub mod stream;
pub mod utils;
pub mod wire;

pub use builder::build_multiblock;
pub use driver::generate_wbp_file;
pub use env::{DigestAlgorithm, Environment};
pub use errors::BeeError;
pub use message::{Descriptor, DynMessage, Reflect, descriptor_len};
pub use store::BlockStore;
pub use store::manifest::{Manifest, ManifestEntry};
pub use stream::{
    DeliveryMode, Frame, InboundItem, OutboundItem, Signal, parse_from_frames, read_bee_file,
    read_from_file, serialize_to_frames, write_bee_file,
};
