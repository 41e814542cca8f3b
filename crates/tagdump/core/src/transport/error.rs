//! Error types specific to tag transports

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection error
    #[error("Failed to connect to tag")]
    Connection,

    /// Transmission error
    #[error("Failed to transmit data")]
    Transmission,

    /// The tag left the field
    #[error("Tag left the field")]
    TagLost,

    /// The reader cannot claim the requested technology
    #[error("Technology not available on this tag")]
    TechnologyUnavailable,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Driver error (with code)
    #[error("Driver error code: {0}")]
    Driver(i32),
}
