//! Core error type for all acquisition operations
//!
//! Session-level variants abort the operation they occur in. Everything that
//! concerns a single sector, block, page group or probe is recovered by the
//! caller and stored as data in the dump or report instead.

use crate::apdu::StatusWord;
use crate::tag::{Technology, TechnologySet};
use crate::transport::TransportError;

/// Result type for acquisition operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    //
    // Session errors
    //
    /// A session is already holding the channel
    #[error("Session busy: {active} session already open")]
    SessionBusy {
        /// Technology currently claimed
        active: Technology,
    },

    /// The tag left the field
    #[error("Tag lost")]
    TagLost,

    /// The session was closed before the operation
    #[error("Session already closed")]
    SessionClosed,

    /// The caller aborted the operation
    #[error("Operation aborted")]
    Aborted,

    /// Transport failure while exchanging a frame
    #[error("Transceive error: {0}")]
    Transceive(TransportError),

    //
    // Protocol errors
    //
    /// Response shorter than a status word
    #[error("Malformed response of {0} bytes")]
    MalformedResponse(usize),

    /// Non-success status word
    #[error("Status error {0}: {desc}", desc = .0.description())]
    Status(StatusWord),

    /// Response payload of unexpected length
    #[error("Unexpected payload length: expected {expected}, got {actual}")]
    UnexpectedLength {
        /// Expected byte count
        expected: usize,
        /// Received byte count
        actual: usize,
    },

    /// Every key of the ring failed on both slots
    #[error("Failed to authenticate sector {sector}")]
    AuthFailed {
        /// Sector index
        sector: u8,
    },

    //
    // Dispatch errors
    //
    /// No supported technology advertised
    #[error("Unsupported card type: {0}")]
    UnsupportedTechnology(TechnologySet),

    /// The operation is not available for this technology
    #[error("{operation} not supported for {technology}")]
    UnsupportedOperation {
        /// Operation name
        operation: &'static str,
        /// Negotiated technology
        technology: Technology,
    },

    /// Dump does not fit the target tag
    #[error("Dump mismatch: {0}")]
    DumpMismatch(String),

    //
    // Input errors
    //
    /// Tag discovered without an identifier
    #[error("Unable to read card ID")]
    MissingIdentifier,

    /// Malformed MIFARE key string
    #[error("Invalid key: {0}")]
    InvalidKey(&'static str),

    /// Malformed application identifier string
    #[error("Invalid AID: {0}")]
    InvalidAid(&'static str),

    /// Record (de)serialization failure
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error ends the whole operation rather than one unit
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SessionBusy { .. } | Self::TagLost | Self::SessionClosed | Self::Aborted
        )
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::TagLost => Self::TagLost,
            other => Self::Transceive(other),
        }
    }
}
