use thiserror::Error;

/// Errors that can occur while configuring or running the server.
///
/// CIP and encapsulation statuses are wire data, not exceptions: they never
/// flow through this type. This enum exists for stratum-3 failures (transport
/// and process level) — configuration, bind, and transport I/O, the things
/// that end a session or abort startup rather than being reported inside a
/// reply.
#[derive(Error, Debug)]
pub enum EnipError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bind failed: {0}")]
    Bind(std::io::Error),
}

pub type Result<T> = std::result::Result<T, EnipError>;
