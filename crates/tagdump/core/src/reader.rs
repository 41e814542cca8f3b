//! Memory reader
//!
//! Walks the topology unit by unit. Anything that goes wrong with a single
//! block or page group becomes a failure entry; only session-level errors
//! stop the walk.

use tracing::{debug, instrument, warn};

use crate::apdu::Command;
use crate::auth::{AuthResult, AuthState, Authenticator};
use crate::commands::storage::{self, CLASSIC_BLOCK_SIZE, PAGES_PER_READ, ULTRALIGHT_PAGE_SIZE};
use crate::dump::{BlockDump, CardDump, DumpUnit, MetadataDump, Outcome, PageGroupDump, SectorDump};
use crate::keys::KeyRing;
use crate::session::Session;
use crate::status::{Phase, Status, StatusSink};
use crate::tag::{ClassicSize, Tag};
use crate::topology::{Topology, block_count_in_sector, page_groups, sector_to_block};
use crate::transport::TagTransport;
use crate::{Error, Result};

/// Bytes returned by one Ultralight READ
pub(crate) const PAGE_GROUP_SIZE: usize = PAGES_PER_READ as usize * ULTRALIGHT_PAGE_SIZE;

/// Reads a full dump over an open session
#[derive(Debug, Clone)]
pub struct MemoryReader<'a> {
    ring: &'a KeyRing,
}

impl<'a> MemoryReader<'a> {
    /// Create a reader using `ring` for Classic sectors
    pub const fn new(ring: &'a KeyRing) -> Self {
        Self { ring }
    }

    /// Read every unit of `topology`
    ///
    /// Classic reads report sectors no key opens, and the switch from
    /// authenticating to reading blocks, to `sink` as they happen.
    pub fn read<T: TagTransport>(
        &self,
        session: &mut Session<T>,
        tag: &Tag,
        topology: Topology,
        sink: &mut dyn StatusSink,
    ) -> Result<CardDump> {
        let units = match topology {
            Topology::Classic { size } => self.read_classic(session, size, sink)?,
            Topology::Ultralight { pages } => read_ultralight(session, pages)?,
            Topology::Metadata => vec![read_metadata(tag)],
        };

        let dump = CardDump {
            technology: session.technology(),
            topology,
            units,
        };
        debug!(
            units = dump.units.len(),
            failures = dump.failure_count(),
            "Dump assembled"
        );
        Ok(dump)
    }

    /// Read every sector of a Classic card
    #[instrument(level = "debug", skip(self, session, sink))]
    pub fn read_classic<T: TagTransport>(
        &self,
        session: &mut Session<T>,
        size: ClassicSize,
        sink: &mut dyn StatusSink,
    ) -> Result<Vec<DumpUnit>> {
        let authenticator = Authenticator::new(self.ring);
        let mut units = Vec::with_capacity(usize::from(size.sector_count()));
        let mut reading = false;

        for sector in 0..size.sector_count() {
            let result = authenticator.authenticate(session, sector)?;
            let blocks = sector_blocks(sector);

            let blocks = match result {
                AuthResult::Authenticated { .. } => {
                    if !reading {
                        reading = true;
                        sink.report(Status::new(Phase::Reading, "Reading card memory"));
                    }
                    let mut dumps = Vec::with_capacity(blocks.len());
                    for block in blocks {
                        let outcome = read_unit(
                            session,
                            &storage::read_binary(block, CLASSIC_BLOCK_SIZE as u8),
                            CLASSIC_BLOCK_SIZE,
                        )?;
                        if let Outcome::Failure { reason } = &outcome {
                            warn!(sector, block, %reason, "Block read failed");
                        }
                        dumps.push(BlockDump { block, outcome });
                    }
                    dumps
                }
                AuthResult::Failed { .. } => {
                    let reason = Error::AuthFailed { sector }.to_string();
                    warn!(sector, "Sector skipped: authentication failed");
                    sink.report(Status::new(Phase::Authenticating, reason.as_str()));
                    blocks
                        .map(|block| BlockDump {
                            block,
                            outcome: Outcome::failure(&reason),
                        })
                        .collect()
                }
            };

            units.push(DumpUnit::Sector(SectorDump {
                sector,
                auth: result.state(),
                blocks,
            }));
        }

        Ok(units)
    }
}

/// Read an Ultralight-family tag four pages at a time
#[instrument(level = "debug", skip(session))]
pub fn read_ultralight<T: TagTransport>(
    session: &mut Session<T>,
    pages: u16,
) -> Result<Vec<DumpUnit>> {
    let mut units = Vec::new();
    for page in page_groups(pages) {
        let outcome = read_unit(
            session,
            &storage::read_binary(page, PAGE_GROUP_SIZE as u8),
            PAGE_GROUP_SIZE,
        )?;
        if let Outcome::Failure { reason } = &outcome {
            warn!(page, %reason, "Page group read failed");
        }
        units.push(DumpUnit::Pages(PageGroupDump { page, outcome }));
    }
    Ok(units)
}

/// Single metadata record for an NfcA tag
pub fn read_metadata(tag: &Tag) -> DumpUnit {
    DumpUnit::Metadata(MetadataDump {
        uid: tag.id().to_vec(),
        atqa: tag.metadata().atqa.clone(),
        sak: tag.metadata().sak,
        exhaustive: false,
    })
}

/// Absolute block numbers of a sector
pub(crate) fn sector_blocks(sector: u8) -> impl ExactSizeIterator<Item = u8> {
    let first = sector_to_block(sector);
    (0..block_count_in_sector(sector)).map(move |offset| first + offset)
}

/// Execute one read and fold per-unit failures into an [`Outcome`]
fn read_unit<T: TagTransport>(
    session: &mut Session<T>,
    command: &Command,
    expected: usize,
) -> Result<Outcome> {
    let payload = match session.execute(command).and_then(|r| r.into_payload()) {
        Ok(payload) => payload,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => return Ok(Outcome::failure(e)),
    };

    if payload.len() != expected {
        let e = Error::UnexpectedLength {
            expected,
            actual: payload.len(),
        };
        return Ok(Outcome::failure(e));
    }
    Ok(Outcome::success(payload.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{FACTORY_KEY, NDEF_KEY};
    use crate::session::Channel;
    use crate::tag::Technology;
    use crate::transport::TransportError;
    use crate::transport::mock::SimulatedTag;

    fn read(tag: SimulatedTag, technology: Technology) -> Result<CardDump> {
        let discovered = tag.tag();
        let channel = Channel::new(tag);
        let ring = KeyRing::default();
        let topology = Topology::for_tag(&discovered, technology, 64).unwrap();
        let mut session = channel.open(technology)?;
        MemoryReader::new(&ring).read(&mut session, &discovered, topology, &mut |_: Status| {})
    }

    fn sector(dump: &CardDump, index: usize) -> &SectorDump {
        match &dump.units[index] {
            DumpUnit::Sector(sector) => sector,
            other => panic!("expected sector, got {other:?}"),
        }
    }

    #[test]
    fn test_classic_dump() {
        let dump = read(SimulatedTag::classic_1k(), Technology::MifareClassic).unwrap();
        assert_eq!(dump.units.len(), 16);
        assert!(dump.is_complete());
        assert_eq!(dump.failure_count(), 0);

        let first = sector(&dump, 1);
        assert_eq!(first.auth, AuthState::AuthenticatedA);
        assert_eq!(first.blocks.len(), 4);
        assert_eq!(first.blocks[0].block, 4);
        assert_eq!(first.blocks[0].outcome.data(), Some(&[4u8; 16][..]));
    }

    #[test]
    fn test_failed_sector_keeps_topology() {
        let mut tag = SimulatedTag::classic_1k();
        tag.set_sector_keys(5, [0x11; 6], [0x22; 6]);
        tag.set_sector_keys(3, [0x11; 6], *NDEF_KEY.as_bytes());

        let dump = read(tag, Technology::MifareClassic).unwrap();
        assert_eq!(dump.units.len(), 16);
        assert_eq!(dump.failure_count(), 4);

        let failed = sector(&dump, 5);
        assert_eq!(failed.auth, AuthState::Failed);
        assert!(failed.blocks.iter().all(|b| b.outcome
            == Outcome::failure("Failed to authenticate sector 5")));

        assert_eq!(sector(&dump, 3).auth, AuthState::AuthenticatedB);
        assert_eq!(sector(&dump, 4).auth, AuthState::AuthenticatedA);
        assert_eq!(sector(&dump, 6).auth, AuthState::AuthenticatedA);
    }

    #[test]
    fn test_block_failure_is_isolated() {
        let mut tag = SimulatedTag::classic_1k();
        tag.make_unreadable(9);
        tag.fail_apdu(&storage::read_binary(10, 0x10).to_bytes());

        let dump = read(tag, Technology::MifareClassic).unwrap();
        assert_eq!(dump.failure_count(), 2);
        let blocks = &sector(&dump, 2).blocks;
        assert!(blocks[0].outcome.data().is_some());
        assert!(blocks[1].outcome.is_failure());
        assert!(blocks[2].outcome.is_failure());
        assert!(blocks[3].outcome.data().is_some());
    }

    #[test]
    fn test_classic_statuses_follow_the_walk() {
        let mut tag = SimulatedTag::classic(ClassicSize::Mini);
        tag.set_sector_keys(2, [0x11; 6], [0x22; 6]);
        let discovered = tag.tag();
        let channel = Channel::new(tag);
        let ring = KeyRing::default();
        let topology = Topology::for_tag(&discovered, Technology::MifareClassic, 64).unwrap();
        let mut session = channel.open(Technology::MifareClassic).unwrap();

        let mut statuses = Vec::new();
        MemoryReader::new(&ring)
            .read(&mut session, &discovered, topology, &mut |s: Status| {
                statuses.push(s)
            })
            .unwrap();

        assert_eq!(
            statuses,
            vec![
                Status::new(Phase::Reading, "Reading card memory"),
                Status::new(Phase::Authenticating, "Failed to authenticate sector 2"),
            ]
        );
    }

    #[test]
    fn test_4k_layout() {
        let dump = read(
            SimulatedTag::classic(ClassicSize::FourK),
            Technology::MifareClassic,
        )
        .unwrap();
        assert_eq!(dump.units.len(), 40);
        let last = sector(&dump, 39);
        assert_eq!(last.blocks.len(), 16);
        assert_eq!(last.blocks[15].block, 255);
        assert_eq!(last.blocks[15].outcome.data().map(<[u8]>::len), Some(16));
        // trailer carries key A, access bits and key B
        assert_eq!(
            &last.blocks[15].outcome.data().unwrap()[..6],
            FACTORY_KEY.as_bytes()
        );
    }

    #[test]
    fn test_ultralight_dump() {
        let mut tag = SimulatedTag::ultralight(48);
        tag.make_unreadable(8);

        let dump = read(tag, Technology::MifareUltralight).unwrap();
        // 64 configured pages on a 48-page tag: the last four groups fail
        assert_eq!(dump.units.len(), 16);
        assert_eq!(dump.failure_count(), 5);

        let DumpUnit::Pages(group) = &dump.units[1] else {
            panic!("expected pages");
        };
        assert_eq!(group.page, 4);
        let expected: Vec<u8> = [4u8, 5, 6, 7].iter().flat_map(|p| [*p; 4]).collect();
        assert_eq!(group.outcome.data(), Some(expected.as_slice()));
    }

    #[test]
    fn test_nfca_metadata() {
        let dump = read(SimulatedTag::nfca(), Technology::NfcA).unwrap();
        assert_eq!(dump.units.len(), 1);
        let DumpUnit::Metadata(meta) = &dump.units[0] else {
            panic!("expected metadata");
        };
        assert_eq!(meta.uid, vec![0x08, 0x12, 0x34, 0x56]);
        assert_eq!(meta.sak, Some(0x09));
        assert!(!meta.exhaustive);
    }

    #[test]
    fn test_tag_lost_aborts_read() {
        let mut tag = SimulatedTag::classic_1k();
        tag.fail_next(TransportError::TagLost);
        let err = read(tag, Technology::MifareClassic).unwrap_err();
        assert!(matches!(err, Error::TagLost));
    }
}
