//! MIFARE Classic sector authentication with key fallback

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::commands::storage::{self, READER_KEY_NUMBER};
use crate::keys::{Key, KeyRing, KeySlot};
use crate::session::Session;
use crate::topology::sector_to_block;
use crate::transport::TagTransport;
use crate::{Error, Result};

/// Authentication state of a sector
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// Not attempted
    #[default]
    #[display("unauthenticated")]
    Unauthenticated,
    /// Opened with key A
    #[display("authenticated-A")]
    AuthenticatedA,
    /// Opened with key B
    #[display("authenticated-B")]
    AuthenticatedB,
    /// Every key failed
    #[display("failed")]
    Failed,
}

impl AuthState {
    /// Whether the sector is open for reads and writes
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::AuthenticatedA | Self::AuthenticatedB)
    }
}

/// Outcome of authenticating one sector against a key ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    /// A key opened the sector
    Authenticated {
        /// Slot the key was accepted in
        slot: KeySlot,
        /// Position of the key in the ring
        key_index: usize,
    },
    /// The ring was exhausted
    Failed {
        /// Sector index
        sector: u8,
    },
}

impl AuthResult {
    /// Sector state this result leaves behind
    pub const fn state(&self) -> AuthState {
        match self {
            Self::Authenticated {
                slot: KeySlot::A, ..
            } => AuthState::AuthenticatedA,
            Self::Authenticated {
                slot: KeySlot::B, ..
            } => AuthState::AuthenticatedB,
            Self::Failed { .. } => AuthState::Failed,
        }
    }

    /// Convert a failed result into [`Error::AuthFailed`]
    pub const fn into_result(self) -> Result<(KeySlot, usize)> {
        match self {
            Self::Authenticated { slot, key_index } => Ok((slot, key_index)),
            Self::Failed { sector } => Err(Error::AuthFailed { sector }),
        }
    }
}

/// Per-sector authenticator
///
/// For each key of the ring, slot A is tried before slot B; the first
/// acceptance wins. A transport error on one attempt only fails that attempt,
/// but a lost tag or an abort ends the whole operation.
#[derive(Debug, Clone)]
pub struct Authenticator<'a> {
    ring: &'a KeyRing,
}

impl<'a> Authenticator<'a> {
    /// Create an authenticator over a key ring
    pub const fn new(ring: &'a KeyRing) -> Self {
        Self { ring }
    }

    /// Authenticate one sector
    #[instrument(level = "debug", skip(self, session))]
    pub fn authenticate<T: TagTransport>(
        &self,
        session: &mut Session<T>,
        sector: u8,
    ) -> Result<AuthResult> {
        let block = sector_to_block(sector);

        for (key_index, key) in self.ring.keys().iter().enumerate() {
            if !load_key(session, key)? {
                continue;
            }
            for slot in KeySlot::ORDER {
                if attempt(session, block, slot)? {
                    debug!(sector, %slot, key_index, "Sector authenticated");
                    return Ok(AuthResult::Authenticated { slot, key_index });
                }
            }
        }

        debug!(sector, keys = self.ring.len(), "Key ring exhausted");
        Ok(AuthResult::Failed { sector })
    }
}

/// Load a key into the reader; `false` when the reader refused it
fn load_key<T: TagTransport>(session: &mut Session<T>, key: &Key) -> Result<bool> {
    let command = storage::load_key(key, READER_KEY_NUMBER);
    settle(session.execute(&command).map(|r| r.is_success()))
}

fn attempt<T: TagTransport>(session: &mut Session<T>, block: u8, slot: KeySlot) -> Result<bool> {
    let command = storage::authenticate(block, slot, READER_KEY_NUMBER);
    let accepted = settle(session.execute(&command).map(|r| r.is_success()))?;
    trace!(block, %slot, accepted, "Authentication attempt");
    Ok(accepted)
}

/// Fold per-attempt failures into `false`, keeping fatal errors
fn settle(result: Result<bool>) -> Result<bool> {
    match result {
        Ok(accepted) => Ok(accepted),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            debug!(error = %e, "Authentication attempt failed");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{FACTORY_KEY, NDEF_KEY};
    use crate::session::Channel;
    use crate::tag::Technology;
    use crate::transport::TransportError;
    use crate::transport::mock::SimulatedTag;

    const USER: [u8; 6] = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5];
    const OTHER: [u8; 6] = [0x11; 6];

    fn ring() -> KeyRing {
        KeyRing::new(Some(Key::new(USER)), &[FACTORY_KEY, NDEF_KEY])
    }

    /// (key type, key) for every authentication frame in the log
    fn attempts(tag: &SimulatedTag) -> Vec<(u8, [u8; 6])> {
        let mut loaded = [0u8; 6];
        let mut seen = Vec::new();
        for frame in tag.frames() {
            match frame[1] {
                0x82 => loaded.copy_from_slice(&frame[5..11]),
                0x86 => seen.push((frame[8], loaded)),
                _ => {}
            }
        }
        seen
    }

    #[test]
    fn test_slot_b_of_last_default() {
        let mut tag = SimulatedTag::classic_1k();
        tag.set_sector_keys(3, OTHER, *NDEF_KEY.as_bytes());
        let channel = Channel::new(tag);
        let ring = ring();
        let auth = Authenticator::new(&ring);

        let mut session = channel.open(Technology::MifareClassic).unwrap();
        let result = auth.authenticate(&mut session, 3).unwrap();
        assert_eq!(
            result,
            AuthResult::Authenticated {
                slot: KeySlot::B,
                key_index: 2
            }
        );
        assert_eq!(result.state(), AuthState::AuthenticatedB);

        // neighbours open with the factory key on slot A
        for sector in [2, 4] {
            let result = auth.authenticate(&mut session, sector).unwrap();
            assert_eq!(
                result,
                AuthResult::Authenticated {
                    slot: KeySlot::A,
                    key_index: 1
                }
            );
        }
    }

    #[test]
    fn test_attempt_order() {
        let mut tag = SimulatedTag::classic_1k();
        tag.set_sector_keys(1, OTHER, OTHER);
        let channel = Channel::new(tag);
        let ring = ring();

        let mut session = channel.open(Technology::MifareClassic).unwrap();
        let result = Authenticator::new(&ring)
            .authenticate(&mut session, 1)
            .unwrap();
        assert_eq!(result, AuthResult::Failed { sector: 1 });
        assert!(matches!(
            result.into_result(),
            Err(Error::AuthFailed { sector: 1 })
        ));
        drop(session);

        let seen = channel.with_transport(|t| attempts(t)).unwrap();
        assert_eq!(
            seen,
            vec![
                (0x60, USER),
                (0x61, USER),
                (0x60, *FACTORY_KEY.as_bytes()),
                (0x61, *FACTORY_KEY.as_bytes()),
                (0x60, *NDEF_KEY.as_bytes()),
                (0x61, *NDEF_KEY.as_bytes()),
            ]
        );
    }

    #[test]
    fn test_timeout_advances_to_next_key() {
        let mut tag = SimulatedTag::classic_1k();
        // loading the user key times out
        tag.fail_next(TransportError::Timeout);
        let channel = Channel::new(tag);
        let ring = ring();

        let mut session = channel.open(Technology::MifareClassic).unwrap();
        let result = Authenticator::new(&ring)
            .authenticate(&mut session, 0)
            .unwrap();
        assert_eq!(
            result,
            AuthResult::Authenticated {
                slot: KeySlot::A,
                key_index: 1
            }
        );
    }

    #[test]
    fn test_tag_lost_is_fatal() {
        let mut tag = SimulatedTag::classic_1k();
        tag.fail_next(TransportError::TagLost);
        let channel = Channel::new(tag);
        let ring = ring();

        let mut session = channel.open(Technology::MifareClassic).unwrap();
        let err = Authenticator::new(&ring)
            .authenticate(&mut session, 0)
            .unwrap_err();
        assert!(matches!(err, Error::TagLost));
    }
}
