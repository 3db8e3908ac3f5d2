//! Common Industrial Protocol: path addressing, typed values, the object
//! registry, message framing, and the service processor (§3, §4).

pub mod epath;
pub mod message;
pub mod registry;
pub mod service;
pub mod status;
pub mod value;

pub use epath::EpathSegment;
pub use message::{CipReply, CipRequest};
pub use registry::{Attribute, RegistryError, TagRegistry};
pub use value::{CipType, Primitive};
