//! Memory writer
//!
//! Mirrors a captured [`CardDump`] onto a tag of the same technology and
//! layout. Sector trailers are never written, so access conditions and keys
//! of the target card stay intact. Ultralight lock and OTP pages are left
//! alone too: their bits can only be set, never cleared.
//!
//! Write addresses come from the target layout, never from the dump.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::auth::{AuthResult, Authenticator};
use crate::commands::storage::{self, CLASSIC_BLOCK_SIZE, ULTRALIGHT_PAGE_SIZE};
use crate::dump::{CardDump, DumpUnit, Outcome, PageGroupDump, SectorDump};
use crate::keys::KeyRing;
use crate::reader::{PAGE_GROUP_SIZE, sector_blocks};
use crate::session::Session;
use crate::tag::Technology;
use crate::topology::{Topology, page_groups};
use crate::transport::TagTransport;
use crate::{Error, Result};

/// Why a unit was not written
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Sector trailer holding keys and access bits
    #[display("sector trailer")]
    Trailer,
    /// The dump holds a failure entry for this unit
    #[display("no data in dump")]
    NoData,
    /// Ultralight lock bytes (page 2) or OTP (page 3); one-way bits
    #[display("lock or OTP page")]
    OneWay,
}

/// Ultralight pages holding lock bytes and the one-time-programmable area
pub const ONE_WAY_PAGES: [u8; 2] = [2, 3];

/// Result of writing one block or page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Accepted by the tag
    Written,
    /// Deliberately left untouched
    Skipped {
        /// Cause
        reason: SkipReason,
    },
    /// Rejected by the tag or lost in transport
    Failed {
        /// Cause
        reason: String,
    },
}

/// One write attempt, addressed by Classic block or Ultralight page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEntry {
    /// Block or page number
    pub address: u8,
    /// Outcome
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

/// Per-address results of a write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    /// Entries in write order
    pub entries: Vec<WriteEntry>,
}

impl WriteReport {
    fn push(&mut self, address: u8, outcome: WriteOutcome) {
        self.entries.push(WriteEntry { address, outcome });
    }

    /// Addresses that were written
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, WriteOutcome::Written))
    }

    /// Addresses skipped for `reason`
    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.count(|o| matches!(o, WriteOutcome::Skipped { reason: r } if *r == reason))
    }

    /// Addresses the tag rejected
    pub fn failure_count(&self) -> usize {
        self.count(|o| matches!(o, WriteOutcome::Failed { .. }))
    }

    fn count(&self, f: impl Fn(&WriteOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| f(&e.outcome)).count()
    }
}

/// Writes a dump over an open session
#[derive(Debug, Clone)]
pub struct MemoryWriter<'a> {
    ring: &'a KeyRing,
}

impl<'a> MemoryWriter<'a> {
    /// Create a writer re-authenticating Classic sectors with `ring`
    pub const fn new(ring: &'a KeyRing) -> Self {
        Self { ring }
    }

    /// Write `dump` onto a tag whose layout is `target`
    #[instrument(level = "debug", skip_all, fields(technology = %session.technology()))]
    pub fn write<T: TagTransport>(
        &self,
        session: &mut Session<T>,
        dump: &CardDump,
        target: Topology,
    ) -> Result<WriteReport> {
        let technology = session.technology();
        match technology {
            Technology::MifareClassic | Technology::MifareUltralight => {}
            _ => {
                return Err(Error::UnsupportedOperation {
                    operation: "write",
                    technology,
                });
            }
        }
        validate(dump, technology, target)?;

        let mut report = WriteReport::default();
        match target {
            Topology::Classic { .. } => {
                for unit in &dump.units {
                    if let DumpUnit::Sector(sector) = unit {
                        self.write_sector(session, sector, &mut report)?;
                    }
                }
            }
            Topology::Ultralight { pages } => {
                for (first, unit) in page_groups(pages).zip(&dump.units) {
                    if let DumpUnit::Pages(group) = unit {
                        write_page_group(session, first, group, &mut report)?;
                    }
                }
            }
            Topology::Metadata => {}
        }

        debug!(
            written = report.written(),
            failed = report.failure_count(),
            "Write finished"
        );
        Ok(report)
    }

    fn write_sector<T: TagTransport>(
        &self,
        session: &mut Session<T>,
        sector: &SectorDump,
        report: &mut WriteReport,
    ) -> Result<()> {
        let result = Authenticator::new(self.ring).authenticate(session, sector.sector)?;
        let addresses = sector_blocks(sector.sector);
        let trailer_index = addresses.len() - 1;

        for (index, (address, block)) in addresses.zip(&sector.blocks).enumerate() {
            if index == trailer_index {
                report.push(address, WriteOutcome::Skipped {
                    reason: SkipReason::Trailer,
                });
                continue;
            }
            let outcome = match (&result, &block.outcome) {
                (AuthResult::Failed { sector }, _) => WriteOutcome::Failed {
                    reason: Error::AuthFailed { sector: *sector }.to_string(),
                },
                (_, Outcome::Failure { .. }) => WriteOutcome::Skipped {
                    reason: SkipReason::NoData,
                },
                (AuthResult::Authenticated { .. }, Outcome::Success { data }) => {
                    write_unit(session, address, data)?
                }
            };
            if let WriteOutcome::Failed { reason } = &outcome {
                warn!(sector = sector.sector, block = address, %reason, "Block write failed");
            }
            report.push(address, outcome);
        }
        Ok(())
    }
}

/// Write the four pages of a successful group one page at a time
fn write_page_group<T: TagTransport>(
    session: &mut Session<T>,
    first: u8,
    group: &PageGroupDump,
    report: &mut WriteReport,
) -> Result<()> {
    let Outcome::Success { data } = &group.outcome else {
        report.push(first, WriteOutcome::Skipped {
            reason: SkipReason::NoData,
        });
        return Ok(());
    };

    for (offset, chunk) in data.chunks_exact(ULTRALIGHT_PAGE_SIZE).enumerate() {
        let page = first + offset as u8;
        if ONE_WAY_PAGES.contains(&page) {
            report.push(page, WriteOutcome::Skipped {
                reason: SkipReason::OneWay,
            });
            continue;
        }
        let outcome = write_unit(session, page, chunk)?;
        if let WriteOutcome::Failed { reason } = &outcome {
            warn!(page, %reason, "Page write failed");
        }
        report.push(page, outcome);
    }
    Ok(())
}

fn write_unit<T: TagTransport>(
    session: &mut Session<T>,
    address: u8,
    data: &[u8],
) -> Result<WriteOutcome> {
    let result = session
        .execute(&storage::update_binary(address, data))
        .and_then(|r| r.into_payload());
    match result {
        Ok(_) => Ok(WriteOutcome::Written),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => Ok(WriteOutcome::Failed {
            reason: e.to_string(),
        }),
    }
}

/// Check that a dump fits the open session and the target layout
fn validate(dump: &CardDump, technology: Technology, target: Topology) -> Result<()> {
    if dump.technology != technology {
        return Err(Error::DumpMismatch(format!(
            "dump was read as {}, tag is open as {technology}",
            dump.technology
        )));
    }
    if dump.units.len() != target.unit_count() {
        return Err(Error::DumpMismatch(format!(
            "dump has {} units, tag layout has {}",
            dump.units.len(),
            target.unit_count()
        )));
    }

    for (index, unit) in dump.units.iter().enumerate() {
        let fits = match (unit, target) {
            (DumpUnit::Sector(sector), Topology::Classic { .. }) => {
                usize::from(sector.sector) == index
                    && sector
                        .blocks
                        .iter()
                        .map(|b| b.block)
                        .eq(sector_blocks(sector.sector))
                    && sector
                        .blocks
                        .iter()
                        .all(|b| payload_fits(&b.outcome, CLASSIC_BLOCK_SIZE))
            }
            (DumpUnit::Pages(group), Topology::Ultralight { .. }) => {
                usize::from(group.page) == index * 4
                    && payload_fits(&group.outcome, PAGE_GROUP_SIZE)
            }
            (DumpUnit::Metadata(_), Topology::Metadata) => true,
            _ => false,
        };
        if !fits {
            return Err(Error::DumpMismatch(format!("unit {index} does not match the tag layout")));
        }
    }
    Ok(())
}

/// Failure entries carry no payload; successful ones must fill the unit exactly
fn payload_fits(outcome: &Outcome, size: usize) -> bool {
    outcome.data().is_none_or(|data| data.len() == size)
}
