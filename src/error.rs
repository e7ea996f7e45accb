//! Library error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompanionError>;

#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("output port not found: {0}")]
    PortNotFound(String),

    #[error("virtual ports are not supported on this platform")]
    VirtualPortUnsupported,

    #[error("no network adapter with an IPv4 address")]
    NoNetwork,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<midir::InitError> for CompanionError {
    fn from(e: midir::InitError) -> Self {
        CompanionError::Midi(e.to_string())
    }
}

impl<T> From<midir::ConnectError<T>> for CompanionError {
    fn from(e: midir::ConnectError<T>) -> Self {
        CompanionError::Midi(e.kind().to_string())
    }
}
