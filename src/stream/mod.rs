//! The streaming transport codec: frames, flow control, serialisation,
//! reassembly, and the `.bee` container.

pub mod bee;
pub mod frame;
pub mod parse;
pub mod reader;
pub mod serialize;
pub mod signal;

pub use bee::{BEE_EXTENSION, BeeReader, read_bee_file, read_from_file, write_bee_file};
pub use frame::Frame;
pub use parse::{DeliveryMode, InboundItem, ItemStream, parse_from_frames};
pub use reader::{RegistryReader, read_from_registry};
pub use serialize::{FrameStream, OutboundItem, contains_blocks, serialize_to_frames};
pub use signal::Signal;
