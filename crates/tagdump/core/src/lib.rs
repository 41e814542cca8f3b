//! Acquisition engine for contactless tags
//!
//! This crate detects which low-level technology a proximity tag supports,
//! authenticates against protected MIFARE Classic sectors, and extracts or
//! mirrors raw memory. IsoDep tags are interrogated with a fixed sequence of
//! APDU probes instead.
//!
//! ## Overview
//!
//! - [`Tag`] is what a discovery layer reports: identifier, advertised
//!   technologies and anti-collision metadata.
//! - [`TagTransport`] is the seam to hardware. MIFARE memory is addressed
//!   through PC/SC storage-card pseudo-APDUs, so one `transceive` serves
//!   every technology.
//! - [`Channel`] and [`Session`] enforce a single active technology at a time
//!   and carry the [`AbortHandle`].
//! - [`Engine`] runs inspect, read, write and probe for one tag, reporting
//!   each phase to a [`StatusSink`].
//!
//! Per-unit failures (a sector no key opens, a block the tag refuses, a probe
//! that times out) are data inside the [`CardDump`] or [`ProbeReport`]. Only
//! session-level failures end an operation with an [`Error`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod apdu;
pub mod auth;
pub mod commands;
pub mod config;
pub mod dump;
pub mod engine;
pub mod error;
pub mod info;
pub mod keys;
pub mod negotiate;
pub mod probe;
pub mod reader;
pub mod record;
pub mod session;
pub mod status;
pub mod tag;
pub mod topology;
pub mod transport;
pub mod writer;

pub use apdu::{Command, Response, StatusWord};
pub use auth::{AuthResult, AuthState, Authenticator};
pub use commands::Aid;
pub use config::EngineConfig;
pub use dump::{BlockDump, CardDump, DumpUnit, MetadataDump, Outcome, PageGroupDump, SectorDump};
pub use engine::Engine;
pub use error::{Error, Result};
pub use info::CardInfo;
pub use keys::{Key, KeyRing, KeySlot};
pub use negotiate::negotiate;
pub use probe::{Probe, ProbeReport, ProbeRunner, ProbeSpec};
pub use reader::MemoryReader;
pub use record::{Capture, DumpRecord};
pub use session::{AbortHandle, Channel, Session};
pub use status::{LogSink, Phase, Status, StatusSink};
pub use tag::{ClassicSize, Tag, TagMetadata, Technology, TechnologySet};
pub use topology::Topology;
pub use transport::{TagTransport, TransportError};
pub use writer::{MemoryWriter, SkipReason, WriteOutcome, WriteReport};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        AbortHandle, Capture, CardDump, DumpRecord, Engine, EngineConfig, Error, Phase, Result,
        Status, StatusSink, Tag, TagTransport, Technology, TransportError,
    };
}
