//! Device manager for PC/SC operations

use std::time::Duration;

use pcsc::{Context, ReaderState, Scope, State};
use tracing::debug;

use crate::config::{ConnectStrategy, PcscConfig};
use crate::error::PcscError;
use crate::reader::PcscReader;
use crate::transport::PcscTransport;

/// Manager for PC/SC device operations
#[allow(missing_debug_implementations)]
pub struct PcscDeviceManager {
    /// PC/SC context
    context: Context,
}

impl PcscDeviceManager {
    /// Create a new PC/SC device manager
    pub fn new() -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let readers = self.context.list_readers_owned()?;
        if readers.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        let mut reader_states: Vec<ReaderState> = readers
            .into_iter()
            .map(|name| ReaderState::new(name, State::UNAWARE))
            .collect();

        match self.context.get_status_change(None, &mut reader_states) {
            Ok(()) => Ok(reader_states
                .iter()
                .map(PcscReader::from_reader_state)
                .collect()),
            Err(e) => {
                // If we can't get status, assume no card
                debug!(error = %e, "Reader status unavailable");
                Ok(reader_states
                    .iter()
                    .map(|rs| PcscReader::new(rs.name().to_string_lossy().into_owned(), false, None))
                    .collect())
            }
        }
    }

    /// Open a connection to a specific reader with custom configuration
    pub fn open_reader_with_config(
        &self,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        PcscTransport::new(self.context.clone(), reader_name, config)
    }

    /// Connect to a reader using the specified strategy
    pub fn connect_strategy(
        &self,
        strategy: ConnectStrategy,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        match strategy {
            ConnectStrategy::Reader(name) => {
                let known = self.list_readers()?.iter().any(|r| r.name() == name);
                if !known {
                    return Err(PcscError::ReaderNotFound(name));
                }
                self.open_reader_with_config(&name, config)
            }
            ConnectStrategy::AnyCard => {
                let reader = self
                    .list_readers()?
                    .into_iter()
                    .find(PcscReader::has_tag)
                    .ok_or_else(|| PcscError::NoCard("No reader with a tag found".to_string()))?;
                self.open_reader_with_config(reader.name(), config)
            }
        }
    }

    /// Block until a tag enters the field of `reader_name` or `timeout` elapses
    pub fn wait_for_card(&self, reader_name: &str, timeout: Duration) -> Result<PcscReader, PcscError> {
        let mut reader_states = vec![ReaderState::new(
            std::ffi::CString::new(reader_name)
                .map_err(|_| PcscError::ReaderNotFound(reader_name.to_string()))?,
            State::UNAWARE,
        )];

        loop {
            self.context.get_status_change(Some(timeout), &mut reader_states)?;
            let reader = PcscReader::from_reader_state(&reader_states[0]);
            if reader.has_card() {
                return Ok(reader);
            }
            for rs in &mut reader_states {
                rs.sync_current_state();
            }
        }
    }
}
