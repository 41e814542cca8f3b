//! Error types for PC/SC transport

use std::fmt;

use tagdump_core::TransportError;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    NoReadersAvailable,

    /// Reader not found
    ReaderNotFound(String),

    /// No card present in reader
    NoCard(String),

    /// The ATR does not describe a contactless tag
    UnknownAtr(Vec<u8>),
}

impl fmt::Display for PcscError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcsc(e) => write!(f, "PC/SC error: {e}"),
            Self::NoReadersAvailable => write!(f, "No readers available"),
            Self::ReaderNotFound(r) => write!(f, "Reader not found: {r}"),
            Self::NoCard(r) => write!(f, "No card present in reader: {r}"),
            Self::UnknownAtr(atr) => write!(f, "Not a contactless tag ATR: {}", hex::encode_upper(atr)),
        }
    }
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::Pcsc(e) => match e {
                pcsc::Error::RemovedCard | pcsc::Error::NoSmartcard => Self::TagLost,
                pcsc::Error::Timeout => Self::Timeout,
                pcsc::Error::UnsupportedCard | pcsc::Error::UnpoweredCard => {
                    Self::TechnologyUnavailable
                }
                pcsc::Error::ResetCard => Self::Connection,
                other => Self::Driver(other as i32),
            },
            PcscError::NoCard(_) => Self::TagLost,
            PcscError::NoReadersAvailable | PcscError::ReaderNotFound(_) => Self::Connection,
            PcscError::UnknownAtr(_) => Self::TechnologyUnavailable,
        }
    }
}

impl From<PcscError> for tagdump_core::Error {
    fn from(error: PcscError) -> Self {
        TransportError::from(error).into()
    }
}
