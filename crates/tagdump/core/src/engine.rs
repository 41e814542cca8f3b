//! Acquisition engine
//!
//! Ties the pieces together for one discovered tag: negotiation, the
//! technology session, reading, writing and probing. Every operation reports
//! its phase transitions to a [`StatusSink`] and ends with a terminal status.

use tracing::{Level, debug, error, info, instrument, warn};

use crate::commands::application::{self, Aid, NCMC_AID};
use crate::config::EngineConfig;
use crate::dump::{CardDump, Outcome};
use crate::info::CardInfo;
use crate::negotiate::negotiate;
use crate::probe::{ProbeReport, ProbeRunner};
use crate::reader::MemoryReader;
use crate::record::{Capture, DumpRecord};
use crate::session::{AbortHandle, Channel};
use crate::status::{Phase, Status, StatusSink};
use crate::tag::{Tag, Technology};
use crate::topology::Topology;
use crate::transport::TagTransport;
use crate::writer::{MemoryWriter, WriteReport};
use crate::{Error, Result};

/// Message reported when a DESFire write is requested
pub const DESFIRE_WRITE_MESSAGE: &str =
    "DMRC DESFire writing requires specific AID and AES keys; contact DMRC for details";

/// Message reported after reading a plain NfcA tag
pub const NFCA_LIMITED_MESSAGE: &str = "NfcA data limited; try IsoDep for DMRC card reading";

/// Acquisition engine bound to one discovered tag
#[derive(Debug)]
pub struct Engine<T: TagTransport> {
    channel: Channel<T>,
    tag: Tag,
    config: EngineConfig,
}

impl<T: TagTransport> Engine<T> {
    /// Bind a transport to the tag it discovered
    pub fn new(transport: T, tag: Tag, config: EngineConfig) -> Self {
        Self {
            channel: Channel::new(transport),
            tag,
            config,
        }
    }

    /// The discovered tag
    pub const fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Engine configuration
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Channel to the tag
    pub const fn channel(&self) -> &Channel<T> {
        &self.channel
    }

    /// Handle to abort a running operation from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        self.channel.abort_handle()
    }

    /// Dispatch technology for the tag
    pub fn negotiate(&self) -> Result<Technology> {
        negotiate(self.tag.technologies())
    }

    /// Collect identification data, selecting the NCMC application on IsoDep tags
    #[instrument(level = "debug", skip(self), fields(id = %self.tag.id_hex()))]
    pub fn inspect(&self) -> Result<CardInfo> {
        let mut info = CardInfo::from_tag(&self.tag);

        if self.tag.technologies().contains(Technology::IsoDep) {
            let mut session = self.channel.open(Technology::IsoDep)?;
            let select = application::select(&Aid::new(NCMC_AID.to_vec())).to_bytes();
            let outcome = match session.transceive(&select) {
                Ok(response) => Outcome::success(response.to_vec()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => Outcome::failure(e),
            };
            session.close();
            info.ncmc_select = Some(outcome);
        }

        Ok(info)
    }

    /// Read the tag through its negotiated technology
    ///
    /// Classic, Ultralight and NfcA tags produce a memory dump, IsoDep tags a
    /// probe report.
    pub fn read(&self, sink: &mut impl StatusSink) -> Result<Capture> {
        reported(sink, |sink| self.do_read(sink))
    }

    /// Mirror a previously captured dump onto the tag
    pub fn write(&self, dump: &CardDump, sink: &mut impl StatusSink) -> Result<WriteReport> {
        reported(sink, |sink| self.do_write(dump, sink))
    }

    /// Run the IsoDep probes regardless of the negotiated technology
    pub fn probe(&self, sink: &mut impl StatusSink) -> Result<ProbeReport> {
        reported(sink, |sink| {
            self.detect(sink)?;
            if !self.tag.technologies().contains(Technology::IsoDep) {
                return Err(Error::UnsupportedOperation {
                    operation: "probe",
                    technology: self.negotiate()?,
                });
            }
            let report = self.run_probes(sink)?;
            sink.report(Status::done("Probes finished", report.failure_count()));
            Ok(report)
        })
    }

    /// Wrap a capture into a persistable record
    pub fn record(&self, capture: Capture) -> DumpRecord {
        DumpRecord::new(capture.technology(), capture, self.config.card_family.clone())
    }

    #[instrument(level = "info", skip_all, fields(id = %self.tag.id_hex()))]
    fn do_read(&self, sink: &mut dyn StatusSink) -> Result<Capture> {
        let technology = self.detect(sink)?;

        if technology == Technology::IsoDep {
            let report = self.run_probes(sink)?;
            sink.report(Status::done("Card read successfully", report.failure_count()));
            return Ok(Capture::Probes(report));
        }

        let topology = self.topology(technology, "read")?;
        let ring = self.config.key_ring();
        let mut session = self.channel.open(technology)?;

        // Classic reads announce the reading phase once a sector opens
        if technology == Technology::MifareClassic {
            sink.report(Status::new(Phase::Authenticating, "Authenticating sectors"));
        } else {
            sink.report(Status::new(Phase::Reading, "Reading card memory"));
        }

        let dump = MemoryReader::new(&ring).read(&mut session, &self.tag, topology, sink)?;
        session.close();

        let failures = dump.failure_count();
        info!(units = dump.units.len(), failures, "Card read");
        let message = if technology == Technology::NfcA {
            NFCA_LIMITED_MESSAGE
        } else {
            "Card read successfully"
        };
        sink.report(Status::done(message, failures));
        Ok(Capture::Dump(dump))
    }

    #[instrument(level = "info", skip_all, fields(id = %self.tag.id_hex()))]
    fn do_write(&self, dump: &CardDump, sink: &mut dyn StatusSink) -> Result<WriteReport> {
        let technology = self.detect(sink)?;

        if technology == Technology::IsoDep {
            warn!("{DESFIRE_WRITE_MESSAGE}");
            sink.report(Status::new(Phase::Writing, DESFIRE_WRITE_MESSAGE));
            return Err(Error::UnsupportedOperation {
                operation: "write",
                technology,
            });
        }

        let target = self.topology(technology, "write")?;
        let ring = self.config.key_ring();
        let mut session = self.channel.open(technology)?;
        sink.report(Status::new(Phase::Writing, "Writing card memory"));

        let report = MemoryWriter::new(&ring).write(&mut session, dump, target)?;
        session.close();

        info!(
            written = report.written(),
            failures = report.failure_count(),
            "Card written"
        );
        sink.report(Status::done("Card written successfully", report.failure_count()));
        Ok(report)
    }

    /// Report the tag and negotiate its technology
    fn detect(&self, sink: &mut dyn StatusSink) -> Result<Technology> {
        sink.report(Status::new(
            Phase::Detecting,
            format!("Card detected: {}", self.tag.id_hex()),
        ));
        let technology = self.negotiate()?;
        sink.report(Status::new(Phase::Detecting, detected_message(technology)));
        Ok(technology)
    }

    fn topology(&self, technology: Technology, operation: &'static str) -> Result<Topology> {
        Topology::for_tag(&self.tag, technology, self.config.ultralight_pages).ok_or(
            Error::UnsupportedOperation {
                operation,
                technology,
            },
        )
    }

    fn run_probes(&self, sink: &mut dyn StatusSink) -> Result<ProbeReport> {
        let runner = ProbeRunner::new(self.config.aid().as_ref());
        let mut session = self.channel.open(Technology::IsoDep)?;
        sink.report(Status::new(Phase::Reading, "Running APDU probes"));

        let report = runner.run(&mut session)?;
        session.close();

        for probe in &report.probes {
            let Some(status) = probe.status() else {
                continue;
            };
            let level = status.tracing_level();
            if level == Level::DEBUG {
                debug!(label = %probe.label, %status, "{}", status.description());
            } else if level == Level::INFO {
                info!(label = %probe.label, %status, "{}", status.description());
            } else {
                warn!(label = %probe.label, %status, "{}", status.description());
            }
        }
        Ok(report)
    }
}

/// Status line announcing the negotiated technology
pub const fn detected_message(technology: Technology) -> &'static str {
    match technology {
        Technology::MifareClassic => "MIFARE Classic card confirmed",
        Technology::MifareUltralight => "MIFARE Ultralight card detected",
        Technology::IsoDep => "IsoDep (likely DESFire/NCMC) card detected",
        Technology::NfcA => "NfcA card detected",
        Technology::NdefFormatable => "NDEF formatable card detected",
    }
}

/// Run an operation, turning a session-level failure into a terminal error status
fn reported<R>(
    sink: &mut impl StatusSink,
    f: impl FnOnce(&mut dyn StatusSink) -> Result<R>,
) -> Result<R> {
    let result = f(&mut *sink);
    if let Err(e) = &result {
        error!(error = %e, "Operation failed");
        sink.report(Status::new(Phase::Error, e.to_string()));
    }
    result
}
