//! Transport traits for frame exchange with a tag
//!
//! A transport owns the physical link to one tag. It knows nothing about
//! sectors, keys or probes; MIFARE operations reach it as PC/SC storage-card
//! pseudo-APDUs and IsoDep probes as plain APDUs.

pub mod error;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

use crate::tag::Technology;

/// Trait for tag transports
pub trait TagTransport: Send + fmt::Debug {
    /// Claim technology-specific access to the tag in the field
    fn connect(&mut self, technology: Technology) -> Result<(), TransportError>;

    /// Send one frame and block until the response or a hardware timeout
    fn transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        trace!(frame = %hex::encode_upper(frame), "Transceiving frame");
        let result = self.do_transceive(frame);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "Received response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transceive");
            }
        }
        result
    }

    /// Internal implementation of transceive
    /// This is the method that concrete implementations should override
    fn do_transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError>;

    /// Release the technology claim; best effort and idempotent
    fn close(&mut self);
}
