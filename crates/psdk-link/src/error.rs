//! Errors returned by the link layer.

use psdk_proto::AddressError;

use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, LinkError>;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// Part of the taxonomy only; flow-buffer overflow is silent.
    #[error("resource exhausted")]
    ResourceExhausted,
    #[error("lower layer failure: {0}")]
    Unknown(String),
}

impl From<AddressError> for LinkError {
    fn from(e: AddressError) -> Self {
        LinkError::InvalidArgument(e.to_string())
    }
}

impl From<TransportError> for LinkError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unavailable => LinkError::InvalidState("transport unavailable"),
            other => LinkError::Unknown(other.to_string()),
        }
    }
}
