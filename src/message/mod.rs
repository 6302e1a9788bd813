pub mod descriptor;
pub mod dynamic;
pub mod reflect;

pub use descriptor::{Descriptor, HashEntry, descriptor_len};
pub use dynamic::{DynMessage, Value};
pub use reflect::{Field, FieldRef, Reflect};
