//! IsoDep APDU probes
//!
//! A fixed, ordered list of commands sent to an ISO 14443-4 tag. Every probe
//! runs whatever happened to the previous ones; each records either the raw
//! response or the failure reason.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::apdu::{Command, StatusWord};
use crate::commands::application::{self, Aid, NCMC_AID, NDEF_AID};
use crate::dump::Outcome;
use crate::session::Session;
use crate::transport::TagTransport;
use crate::Result;

/// A labelled command to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    /// Label recorded in the report
    pub label: String,
    /// Command sent
    pub command: Command,
}

impl ProbeSpec {
    /// Create a probe specification
    pub fn new(label: impl Into<String>, command: Command) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

/// Probe plan: GET_VERSION, SELECT NCMC, SELECT NDEF, the caller AID when
/// given, then GET_APPLICATION_IDS
pub fn plan(custom_aid: Option<&Aid>) -> Vec<ProbeSpec> {
    let ncmc = Aid::new(NCMC_AID.to_vec());
    let ndef = Aid::new(NDEF_AID.to_vec());

    let mut probes = vec![
        ProbeSpec::new("GET_VERSION", application::get_version()),
        ProbeSpec::new("SELECT_NCMC_AID_A000000397", application::select(&ncmc)),
        ProbeSpec::new("SELECT_NDEF_AID_D2760000850101", application::select(&ndef)),
    ];
    if let Some(aid) = custom_aid {
        probes.push(ProbeSpec::new(
            format!("SELECT_CUSTOM_AID_{aid}"),
            application::select(aid),
        ));
    }
    probes.push(ProbeSpec::new(
        "GET_APPLICATION_IDS",
        application::get_application_ids(),
    ));
    probes
}

/// Parse a caller AID string, ignoring blank or malformed input
pub fn custom_aid(input: Option<&str>) -> Option<Aid> {
    let input = input.filter(|s| !s.trim().is_empty())?;
    match Aid::from_hex(input) {
        Ok(aid) => Some(aid),
        Err(e) => {
            warn!(error = %e, "Ignoring caller AID");
            None
        }
    }
}

/// One executed probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// Label from the plan
    pub label: String,
    /// Raw command bytes
    #[serde(with = "hex::serde")]
    pub command: Vec<u8>,
    /// Raw response (status word included) or failure reason
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Probe {
    /// Trailing status word of a captured response
    pub fn status(&self) -> Option<StatusWord> {
        let data = self.outcome.data()?;
        match data {
            [.., sw1, sw2] => Some(StatusWord::new(*sw1, *sw2)),
            _ => None,
        }
    }
}

/// Ordered probes of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbeReport {
    /// Probes in execution order
    pub probes: Vec<Probe>,
}

impl ProbeReport {
    /// Probes that produced no response
    pub fn failure_count(&self) -> usize {
        self.probes.iter().filter(|p| p.outcome.is_failure()).count()
    }
}

/// Runs a probe plan over an IsoDep session
#[derive(Debug, Clone, Default)]
pub struct ProbeRunner {
    plan: Vec<ProbeSpec>,
}

impl ProbeRunner {
    /// Runner for the standard plan plus an optional caller AID
    pub fn new(custom_aid: Option<&Aid>) -> Self {
        Self::with_plan(plan(custom_aid))
    }

    /// Runner for an explicit plan
    pub const fn with_plan(plan: Vec<ProbeSpec>) -> Self {
        Self { plan }
    }

    /// Probes that will be sent, in order
    pub fn plan(&self) -> &[ProbeSpec] {
        &self.plan
    }

    /// Send every probe
    ///
    /// A response counts as captured even when its status word reports an
    /// error. Only session-level failures stop the run.
    #[instrument(level = "debug", skip_all, fields(probes = self.plan.len()))]
    pub fn run<T: TagTransport>(&self, session: &mut Session<T>) -> Result<ProbeReport> {
        let mut report = ProbeReport::default();

        for spec in &self.plan {
            let command = spec.command.to_bytes();
            let outcome = match session.transceive(&command) {
                Ok(response) => {
                    debug!(label = %spec.label, response = %hex::encode_upper(&response), "Probe answered");
                    Outcome::success(response.to_vec())
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(label = %spec.label, error = %e, "Probe failed");
                    Outcome::failure(e)
                }
            };
            report.probes.push(Probe {
                label: spec.label.clone(),
                command: command.to_vec(),
                outcome,
            });
        }

        Ok(report)
    }
}
