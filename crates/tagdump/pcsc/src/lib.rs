//! PC/SC transport for the tagdump acquisition engine
//!
//! Contactless readers such as the ACR122U expose the tag in their field as a
//! card with a synthesized ATR. This crate turns that ATR into the tag's
//! advertised technologies, reads its identifier, and implements
//! `TagTransport` so the engine can exchange storage-card pseudo-APDUs and
//! ISO 7816 APDUs through the reader.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use tagdump_core::{Engine, EngineConfig, LogSink};
//! use tagdump_transport_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager};
//!
//! let manager = PcscDeviceManager::new()?;
//! let mut transport = manager.connect_strategy(ConnectStrategy::AnyCard, PcscConfig::default())?;
//! let tag = transport.discover()?;
//!
//! let engine = Engine::new(transport, tag, EngineConfig::default());
//! let capture = engine.read(&mut LogSink)?;
//! println!("{}", engine.record(capture).to_json_pretty()?);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

pub mod atr;
mod config;
mod error;
mod manager;
mod reader;
mod transport;
mod util;

pub use config::{ConnectStrategy, PcscConfig, ShareMode};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols};
