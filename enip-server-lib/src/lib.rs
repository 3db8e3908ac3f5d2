#![forbid(unsafe_code)]

pub mod cip;
pub mod config;
pub mod control;
pub mod encap;
pub mod error;
pub mod server;
pub mod session;
pub mod telemetry;

pub use cip::{CipReply, CipRequest, CipType, EpathSegment, Primitive, TagRegistry};
pub use config::{DelaySpec, ServerConfig, TagSpec};
pub use error::{EnipError, Result};
pub use server::run;
pub use telemetry::init_tracing;
