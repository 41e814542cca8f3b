//! PC/SC transport implementation

use std::{ffi::CString, fmt};

use bytes::Bytes;
use pcsc::{Card, Context, Disposition, MAX_BUFFER_SIZE};
use tagdump_core::commands::storage;
use tagdump_core::{Response, Tag, TagTransport, Technology, TechnologySet, TransportError};
use tracing::{debug, warn};

use crate::atr::{self, AtrInfo};
use crate::{config::PcscConfig, error::PcscError};

/// Transport implementation using PC/SC
pub struct PcscTransport {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Configuration
    config: PcscConfig,
    /// Technologies found at discovery
    technologies: Option<TechnologySet>,
    /// Technology of the open session
    claimed: Option<Technology>,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .field("claimed", &self.claimed)
            .finish()
    }
}

impl PcscTransport {
    /// Create a new PC/SC transport for the specified reader
    pub(crate) fn new(
        context: Context,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<Self, PcscError> {
        let mut transport = Self {
            context,
            card: None,
            reader_name: reader_name.to_string(),
            config,
            technologies: None,
            claimed: None,
        };

        transport.connect_card()?;
        Ok(transport)
    }

    /// Try to connect to the card
    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader_cstr = CString::new(self.reader_name.clone())
            .map_err(|_| PcscError::ReaderNotFound(self.reader_name.clone()))?;

        match self.context.connect(
            &reader_cstr,
            self.config.share_mode.into(),
            self.config.protocols,
        ) {
            Ok(card) => {
                self.card = Some(card);
                Ok(())
            }
            Err(pcsc::Error::NoSmartcard) => Err(PcscError::NoCard(self.reader_name.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the ATR of the current card
    pub fn atr(&self) -> Result<Vec<u8>, PcscError> {
        self.card.as_ref().map_or_else(
            || Err(PcscError::NoCard(self.reader_name.clone())),
            |card| {
                card.get_attribute_owned(pcsc::Attribute::AtrString)
                    .map_err(Into::into)
            },
        )
    }

    /// Check if the transport is connected to a card
    pub const fn has_card(&self) -> bool {
        self.card.is_some()
    }

    /// Build the discovery event for the tag in the field
    ///
    /// Technologies come from the ATR, the identifier from GET DATA.
    pub fn discover(&mut self) -> tagdump_core::Result<Tag> {
        let answer = self.atr()?;
        let AtrInfo {
            technologies,
            metadata,
        } = atr::parse(&answer).ok_or(PcscError::UnknownAtr(answer))?;

        let raw = self.transmit_command(&storage::get_uid().to_bytes())?;
        let uid = Response::from_bytes(&raw)?.into_payload()?;
        debug!(
            reader = %self.reader_name,
            uid = %hex::encode_upper(&uid),
            %technologies,
            "Tag discovered"
        );

        self.technologies = Some(technologies.clone());
        Ok(Tag::new(uid.to_vec(), technologies)?.with_metadata(metadata))
    }

    /// Transmit a command to the card
    ///
    /// With `auto_reconnect`, a card reset is answered by one reconnect and
    /// one retransmission; a second reset is returned as an error.
    fn transmit_command(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        let auto_reconnect = self.config.auto_reconnect;
        retry_after_reset(self, auto_reconnect, |transport| {
            transport.transmit_once(command)
        })
    }

    fn transmit_once(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        self.connect_card()?;

        let card = self
            .card
            .as_mut()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.clone()))?;

        let mut response_buffer = [0u8; MAX_BUFFER_SIZE];

        match card.transmit(command, &mut response_buffer) {
            Ok(response) => Ok(Bytes::copy_from_slice(response)),
            Err(e) => {
                // If card was reset or removed, clear our reference
                if matches!(e, pcsc::Error::ResetCard | pcsc::Error::RemovedCard) {
                    self.card = None;
                }
                Err(e.into())
            }
        }
    }
}

/// Connection that can be re-established after a card reset
trait Reconnect {
    fn reconnect(&mut self) -> bool;
    fn name(&self) -> &str;
}

impl Reconnect for PcscTransport {
    fn reconnect(&mut self) -> bool {
        self.connect_card().is_ok()
    }

    fn name(&self) -> &str {
        &self.reader_name
    }
}

/// Run `transmit`, and run it once more after a successful reconnect if the
/// card was reset
fn retry_after_reset<C: Reconnect>(
    conn: &mut C,
    auto_reconnect: bool,
    mut transmit: impl FnMut(&mut C) -> Result<Bytes, PcscError>,
) -> Result<Bytes, PcscError> {
    let result = transmit(conn);
    if auto_reconnect
        && matches!(result, Err(PcscError::Pcsc(pcsc::Error::ResetCard)))
        && conn.reconnect()
    {
        warn!(reader = %conn.name(), "Card reset; retrying on new connection");
        return transmit(conn);
    }
    result
}

impl TagTransport for PcscTransport {
    fn connect(&mut self, technology: Technology) -> Result<(), TransportError> {
        self.connect_card()?;
        if let Some(technologies) = &self.technologies
            && !technologies.contains(technology)
        {
            return Err(TransportError::TechnologyUnavailable);
        }
        self.claimed = Some(technology);
        Ok(())
    }

    fn do_transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        self.transmit_command(frame).map_err(TransportError::from)
    }

    fn close(&mut self) {
        // drop the reader's Crypto1 state between sessions
        if self.claimed.take() == Some(Technology::MifareClassic)
            && let Some(card) = self.card.as_mut()
            && let Err(e) = card.reconnect(
                self.config.share_mode.into(),
                self.config.protocols,
                Disposition::LeaveCard,
            )
        {
            debug!(error = %e, "Reconnect after Classic session failed");
            self.card = None;
        }
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
