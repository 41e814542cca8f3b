//! Exclusive technology sessions over one transport
//!
//! A [`Channel`] owns the transport for one physical tag. Opening a
//! [`Session`] claims it for a single technology until the session is closed
//! or dropped; a second claim fails with [`Error::SessionBusy`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::apdu::{Command, Response};
use crate::tag::Technology;
use crate::transport::TagTransport;
use crate::{Error, Result};

/// Cancellation flag shared between the caller and a running operation
///
/// The engine checks it before every hardware interaction. Once raised, the
/// current session is closed and the operation returns [`Error::Aborted`].
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Request cancellation
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous request so the channel can be reused
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.is_aborted() {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
struct ChannelState<T> {
    transport: T,
    active: Option<Technology>,
}

/// Owner of the transport to one tag
pub struct Channel<T: TagTransport> {
    state: Arc<Mutex<ChannelState<T>>>,
    abort: AbortHandle,
}

impl<T: TagTransport> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("active", &self.active())
            .field("aborted", &self.abort.is_aborted())
            .finish()
    }
}

impl<T: TagTransport> Channel<T> {
    /// Wrap a transport
    pub fn new(transport: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState {
                transport,
                active: None,
            })),
            abort: AbortHandle::default(),
        }
    }

    /// Handle used to cancel operations running on this channel
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Technology currently claimed, if any
    pub fn active(&self) -> Option<Technology> {
        self.state.lock().active
    }

    /// Claim the channel for one technology
    #[instrument(level = "debug", skip(self))]
    pub fn open(&self, technology: Technology) -> Result<Session<T>> {
        let mut state = self.state.lock();
        if let Some(active) = state.active {
            warn!(%active, requested = %technology, "Channel already claimed");
            return Err(Error::SessionBusy { active });
        }
        self.abort.check()?;

        state.transport.connect(technology)?;
        state.active = Some(technology);
        debug!(%technology, "Session opened");

        Ok(Session {
            state: Arc::clone(&self.state),
            abort: self.abort.clone(),
            technology,
            open: true,
        })
    }

    /// Run a closure against the transport while no session is open
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut state = self.state.lock();
        if let Some(active) = state.active {
            return Err(Error::SessionBusy { active });
        }
        Ok(f(&mut state.transport))
    }
}

/// Claim on the channel for one technology
pub struct Session<T: TagTransport> {
    state: Arc<Mutex<ChannelState<T>>>,
    abort: AbortHandle,
    technology: Technology,
    open: bool,
}

impl<T: TagTransport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("technology", &self.technology)
            .field("open", &self.open)
            .finish()
    }
}

impl<T: TagTransport> Session<T> {
    /// Negotiated technology of this session
    pub const fn technology(&self) -> Technology {
        self.technology
    }

    /// Whether the session still holds the channel
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Exchange one raw frame
    ///
    /// A failed exchange leaves the session open; the caller may retry or close.
    pub fn transceive(&mut self, frame: &[u8]) -> Result<Bytes> {
        if !self.open {
            return Err(Error::SessionClosed);
        }
        if let Err(e) = self.abort.check() {
            self.close();
            return Err(e);
        }

        let result = self.state.lock().transport.transceive(frame);
        if self.abort.is_aborted() {
            self.close();
            return Err(Error::Aborted);
        }
        Ok(result?)
    }

    /// Exchange a command and parse the response
    pub fn execute(&mut self, command: &Command) -> Result<Response> {
        let raw = self.transceive(&command.to_bytes())?;
        Response::from_bytes(&raw)
    }

    /// Release the channel; idempotent and never fails
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        let mut state = self.state.lock();
        state.transport.close();
        state.active = None;
        debug!(technology = %self.technology, "Session closed");
    }
}

impl<T: TagTransport> Drop for Session<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use crate::transport::mock::SimulatedTag;

    #[test]
    fn test_second_open_is_busy() {
        let channel = Channel::new(SimulatedTag::classic_1k());
        let session = channel.open(Technology::MifareClassic).unwrap();
        let err = channel.open(Technology::IsoDep).unwrap_err();
        assert!(matches!(
            err,
            Error::SessionBusy {
                active: Technology::MifareClassic
            }
        ));
        drop(session);
        assert!(channel.open(Technology::IsoDep).is_ok());
    }

    #[test]
    fn test_close_is_idempotent() {
        let channel = Channel::new(SimulatedTag::classic_1k());
        let mut session = channel.open(Technology::MifareClassic).unwrap();
        session.close();
        session.close();
        assert!(channel.active().is_none());
        assert!(matches!(session.transceive(&[0xFF]), Err(Error::SessionClosed)));
    }

    #[test]
    fn test_tag_lost_on_open() {
        let mut tag = SimulatedTag::classic_1k();
        tag.remove();
        let channel = Channel::new(tag);
        assert!(matches!(
            channel.open(Technology::MifareClassic),
            Err(Error::TagLost)
        ));
        assert!(channel.active().is_none());
    }

    #[test]
    fn test_failed_transceive_keeps_session() {
        let mut tag = SimulatedTag::classic_1k();
        tag.fail_next(TransportError::Timeout);
        let channel = Channel::new(tag);
        let mut session = channel.open(Technology::MifareClassic).unwrap();

        let frame = crate::commands::storage::get_uid().to_bytes();
        assert!(matches!(
            session.transceive(&frame),
            Err(Error::Transceive(TransportError::Timeout))
        ));
        assert!(session.is_open());
        assert!(session.transceive(&frame).is_ok());
    }

    #[test]
    fn test_abort_releases_channel() {
        let channel = Channel::new(SimulatedTag::classic_1k());
        let abort = channel.abort_handle();
        let mut session = channel.open(Technology::MifareClassic).unwrap();

        abort.abort();
        let frame = crate::commands::storage::get_uid().to_bytes();
        assert!(matches!(session.transceive(&frame), Err(Error::Aborted)));
        assert!(!session.is_open());
        assert!(channel.active().is_none());
        assert!(matches!(
            channel.open(Technology::MifareClassic),
            Err(Error::Aborted)
        ));

        abort.reset();
        assert!(channel.open(Technology::MifareClassic).is_ok());
    }
}
