//! Configuration layer (§6, §10.2): tag-spec grammar, delay spec, and the
//! validated server configuration lowered from the CLI.

pub mod delay;
pub mod server;
pub mod tags;

pub use delay::DelaySpec;
pub use server::{validate, ServerConfig};
pub use tags::TagSpec;
