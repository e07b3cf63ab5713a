//! Errors raised while talking to the address-management tool.

use std::io;

/// Failures reported by [`AmClient`](super::AmClient) operations.
#[derive(Debug, thiserror::Error)]
pub enum AmError {
    /// The tool rejected the configured credentials.
    #[error("User is not authorized for address management: {0}")]
    Unauthorized(String),

    /// An address block, subnet, interface or scope could not be reserved.
    #[error("Unable to reserve: {0}")]
    UnableToReserve(String),

    /// An address, interface, subnet or block could not be found.
    #[error("Unable to find: {0}")]
    UnableToFind(String),

    #[error("Not enough consecutive addresses in {subnet} for a range of {size}")]
    NoCongruentRange { subnet: String, size: usize },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to run command: {0}")]
    Io(#[from] io::Error),
}

impl AmError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AmError::Unauthorized(_))
    }
}

pub type AmResult<T> = Result<T, AmError>;
