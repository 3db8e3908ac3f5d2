//! ENIP encapsulation framing: header codec, byte source, and the
//! SendRRData/CPF payload structures carried inside it (§3, §4.A, §4.B).

pub mod bytesource;
pub mod cpf;
pub mod frame;
pub mod sendrrdata;

pub use bytesource::ByteSource;
pub use frame::{Command, EnipFrame, ParseOutcome};
