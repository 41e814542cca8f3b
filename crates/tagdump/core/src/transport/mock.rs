//! Simulated tag for tests
//!
//! Understands the storage-card pseudo-APDUs for MIFARE Classic and
//! Ultralight memory and answers IsoDep APDUs from a lookup table. Every frame
//! is logged so tests can assert on ordering.

use std::collections::{HashMap, HashSet, VecDeque};

use bytes::Bytes;

use super::{TagTransport, TransportError};
use crate::tag::{ClassicSize, Tag, TagMetadata, Technology, TechnologySet};
use crate::topology::{block_count_in_sector, sector_to_block};

const OK: [u8; 2] = [0x90, 0x00];
const AUTH_FAILED: [u8; 2] = [0x63, 0x00];
const SECURITY_NOT_SATISFIED: [u8; 2] = [0x69, 0x82];
const NOT_ALLOWED: [u8; 2] = [0x69, 0x86];
const WRONG_LENGTH: [u8; 2] = [0x67, 0x00];
const WRONG_P1P2: [u8; 2] = [0x6B, 0x00];
const CLA_NOT_SUPPORTED: [u8; 2] = [0x6E, 0x00];
const INS_NOT_SUPPORTED: [u8; 2] = [0x6D, 0x00];

pub(crate) const FACTORY: [u8; 6] = [0xFF; 6];
const ACCESS_BITS: [u8; 4] = [0xFF, 0x07, 0x80, 0x69];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Classic(ClassicSize),
    Ultralight,
    IsoDep,
    NfcA,
}

#[derive(Debug, Clone)]
pub(crate) struct SimulatedTag {
    kind: Kind,
    uid: Vec<u8>,
    /// Classic blocks (16 bytes) or Ultralight pages (4 bytes)
    memory: Vec<Vec<u8>>,
    sector_keys: Vec<([u8; 6], [u8; 6])>,
    loaded_key: Option<[u8; 6]>,
    authenticated: Option<u8>,
    present: bool,
    connected: Option<Technology>,
    frames: Vec<Bytes>,
    failures: VecDeque<TransportError>,
    unreadable: HashSet<u8>,
    read_only: HashSet<u8>,
    responses: HashMap<Vec<u8>, Vec<u8>>,
    failing: HashSet<Vec<u8>>,
}

impl SimulatedTag {
    fn new(kind: Kind, uid: Vec<u8>, memory: Vec<Vec<u8>>) -> Self {
        Self {
            kind,
            uid,
            memory,
            sector_keys: Vec::new(),
            loaded_key: None,
            authenticated: None,
            present: true,
            connected: None,
            frames: Vec::new(),
            failures: VecDeque::new(),
            unreadable: HashSet::new(),
            read_only: HashSet::new(),
            responses: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    /// Classic card of the given size; every sector opens with the factory key
    pub(crate) fn classic(size: ClassicSize) -> Self {
        let sectors = size.sector_count();
        let mut memory = Vec::new();
        for sector in 0..sectors {
            let blocks = block_count_in_sector(sector);
            for offset in 0..blocks {
                let block = sector_to_block(sector) + offset;
                if offset == blocks - 1 {
                    memory.push(trailer(&FACTORY, &FACTORY));
                } else {
                    memory.push(vec![block; 16]);
                }
            }
        }
        let mut tag = Self::new(Kind::Classic(size), vec![0xDE, 0xAD, 0xBE, 0xEF], memory);
        tag.sector_keys = vec![(FACTORY, FACTORY); usize::from(sectors)];
        tag.read_only.insert(0);
        tag
    }

    pub(crate) fn classic_1k() -> Self {
        Self::classic(ClassicSize::OneK)
    }

    /// Ultralight-family tag with `pages` pages of memory
    pub(crate) fn ultralight(pages: u8) -> Self {
        let memory = (0..pages).map(|page| vec![page; 4]).collect();
        let mut tag = Self::new(
            Kind::Ultralight,
            vec![0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            memory,
        );
        tag.read_only.extend([0, 1]);
        tag
    }

    /// ISO 14443-4 tag answering the DESFire probes
    pub(crate) fn desfire() -> Self {
        let mut tag = Self::new(Kind::IsoDep, vec![0x04, 0x5A, 0x6B, 0x7C, 0x8D, 0x9E, 0xAF], Vec::new());
        tag.respond(&[0x90, 0x60, 0x00, 0x00, 0x00], &[0x04, 0x01, 0x01, 0x01, 0x00, 0x18, 0x05, 0x91, 0xAF]);
        tag.respond(&[0x90, 0x6A, 0x00, 0x00, 0x00], &[0x01, 0x00, 0x00, 0x91, 0x00]);
        tag.respond(
            &[0x00, 0xA4, 0x04, 0x00, 0x07, 0xA0, 0x00, 0x00, 0x03, 0x97, 0x00, 0x00],
            &[0x6A, 0x82],
        );
        tag.respond(
            &[0x00, 0xA4, 0x04, 0x00, 0x07, 0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01],
            &OK,
        );
        tag
    }

    /// Plain NfcA tag
    pub(crate) fn nfca() -> Self {
        Self::new(Kind::NfcA, vec![0x08, 0x12, 0x34, 0x56], Vec::new())
    }

    /// The discovery event this tag produces
    pub(crate) fn tag(&self) -> Tag {
        let (technologies, metadata) = match self.kind {
            Kind::Classic(size) => (
                vec![Technology::NfcA, Technology::MifareClassic, Technology::NdefFormatable],
                TagMetadata {
                    atqa: Some(vec![0x00, 0x04]),
                    sak: Some(0x08),
                    classic_size: Some(size),
                    ..Default::default()
                },
            ),
            Kind::Ultralight => (
                vec![Technology::NfcA, Technology::MifareUltralight],
                TagMetadata {
                    atqa: Some(vec![0x00, 0x44]),
                    sak: Some(0x00),
                    ..Default::default()
                },
            ),
            Kind::IsoDep => (
                vec![Technology::NfcA, Technology::IsoDep],
                TagMetadata {
                    atqa: Some(vec![0x03, 0x44]),
                    sak: Some(0x20),
                    historical_bytes: Some(vec![0x80]),
                    ..Default::default()
                },
            ),
            Kind::NfcA => (
                vec![Technology::NfcA],
                TagMetadata {
                    atqa: Some(vec![0x00, 0x04]),
                    sak: Some(0x09),
                    ..Default::default()
                },
            ),
        };
        Tag::new(self.uid.clone(), TechnologySet::new(technologies))
            .expect("simulated tags have identifiers")
            .with_metadata(metadata)
    }

    pub(crate) fn set_sector_keys(&mut self, sector: u8, key_a: [u8; 6], key_b: [u8; 6]) {
        self.sector_keys[usize::from(sector)] = (key_a, key_b);
        let trailer_index = usize::from(sector_to_block(sector) + block_count_in_sector(sector) - 1);
        self.memory[trailer_index] = trailer(&key_a, &key_b);
    }

    pub(crate) fn make_unreadable(&mut self, address: u8) {
        self.unreadable.insert(address);
    }

    /// Fill every non-trailer block (or every writable page) with zeroes
    pub(crate) fn blank(&mut self) {
        let kind = self.kind;
        for (index, unit) in self.memory.iter_mut().enumerate() {
            let address = index as u8;
            let is_trailer = matches!(kind, Kind::Classic(_)) && is_trailer_block(address);
            if !is_trailer && !self.read_only.contains(&address) {
                unit.fill(0);
            }
        }
    }

    pub(crate) fn fail_next(&mut self, error: TransportError) {
        self.failures.push_back(error);
    }

    pub(crate) fn fail_apdu(&mut self, frame: &[u8]) {
        self.failing.insert(frame.to_vec());
    }

    pub(crate) fn respond(&mut self, frame: &[u8], response: &[u8]) {
        self.responses.insert(frame.to_vec(), response.to_vec());
    }

    pub(crate) fn remove(&mut self) {
        self.present = false;
    }

    pub(crate) fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    pub(crate) fn memory(&self, address: u8) -> &[u8] {
        &self.memory[usize::from(address)]
    }

    fn handle_storage(&mut self, frame: &[u8]) -> Vec<u8> {
        if frame.len() < 5 {
            return WRONG_P1P2.to_vec();
        }
        let (ins, p2) = (frame[1], frame[3]);
        match (ins, self.kind) {
            (0xCA, _) => with_status(&self.uid),
            (0x82, _) => {
                let Some(bytes) = frame.get(5..11) else {
                    return WRONG_LENGTH.to_vec();
                };
                let mut key = [0u8; 6];
                key.copy_from_slice(bytes);
                self.loaded_key = Some(key);
                OK.to_vec()
            }
            (0x86, Kind::Classic(_)) => {
                let (Some(&block), Some(&key_type)) = (frame.get(7), frame.get(8)) else {
                    return WRONG_LENGTH.to_vec();
                };
                let sector = block_to_sector(block);
                let Some((key_a, key_b)) = self.sector_keys.get(usize::from(sector)) else {
                    return WRONG_P1P2.to_vec();
                };
                let expected = if key_type == 0x60 { key_a } else { key_b };
                if self.loaded_key.as_ref() == Some(expected) {
                    self.authenticated = Some(sector);
                    OK.to_vec()
                } else {
                    self.authenticated = None;
                    AUTH_FAILED.to_vec()
                }
            }
            (0xB0, Kind::Classic(_)) => {
                if self.authenticated != Some(block_to_sector(p2)) || self.unreadable.contains(&p2) {
                    return SECURITY_NOT_SATISFIED.to_vec();
                }
                match self.memory.get(usize::from(p2)) {
                    Some(block) => with_status(block),
                    None => WRONG_P1P2.to_vec(),
                }
            }
            (0xB0, Kind::Ultralight) => {
                let start = usize::from(p2);
                if self.unreadable.contains(&p2) || start + 4 > self.memory.len() {
                    return WRONG_P1P2.to_vec();
                }
                let data: Vec<u8> = self.memory[start..start + 4].concat();
                with_status(&data)
            }
            (0xD6, Kind::Classic(_)) => {
                if self.authenticated != Some(block_to_sector(p2)) {
                    return SECURITY_NOT_SATISFIED.to_vec();
                }
                if self.read_only.contains(&p2) || frame.len() != 5 + 16 {
                    return NOT_ALLOWED.to_vec();
                }
                self.memory[usize::from(p2)] = frame[5..].to_vec();
                OK.to_vec()
            }
            (0xD6, Kind::Ultralight) => {
                if self.read_only.contains(&p2) || frame.len() != 5 + 4 {
                    return NOT_ALLOWED.to_vec();
                }
                match self.memory.get_mut(usize::from(p2)) {
                    Some(page) => {
                        page.copy_from_slice(&frame[5..]);
                        OK.to_vec()
                    }
                    None => WRONG_P1P2.to_vec(),
                }
            }
            _ => INS_NOT_SUPPORTED.to_vec(),
        }
    }
}

impl TagTransport for SimulatedTag {
    fn connect(&mut self, technology: Technology) -> Result<(), TransportError> {
        if !self.present {
            return Err(TransportError::TagLost);
        }
        let supported = match self.kind {
            Kind::Classic(_) => matches!(technology, Technology::MifareClassic | Technology::NfcA),
            Kind::Ultralight => matches!(technology, Technology::MifareUltralight | Technology::NfcA),
            Kind::IsoDep => matches!(technology, Technology::IsoDep | Technology::NfcA),
            Kind::NfcA => technology == Technology::NfcA,
        };
        if !supported {
            return Err(TransportError::TechnologyUnavailable);
        }
        self.connected = Some(technology);
        Ok(())
    }

    fn do_transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        self.frames.push(Bytes::copy_from_slice(frame));
        if let Some(error) = self.failures.pop_front() {
            return Err(error);
        }
        if !self.present {
            return Err(TransportError::TagLost);
        }
        if self.failing.contains(frame) {
            return Err(TransportError::Transmission);
        }

        let response = if frame.first() == Some(&0xFF) {
            if self.connected == Some(Technology::IsoDep) {
                CLA_NOT_SUPPORTED.to_vec()
            } else {
                self.handle_storage(frame)
            }
        } else {
            self.responses
                .get(frame)
                .cloned()
                .unwrap_or_else(|| INS_NOT_SUPPORTED.to_vec())
        };
        Ok(Bytes::from(response))
    }

    fn close(&mut self) {
        self.connected = None;
        self.authenticated = None;
        self.loaded_key = None;
    }
}

fn with_status(payload: &[u8]) -> Vec<u8> {
    let mut response = payload.to_vec();
    response.extend_from_slice(&OK);
    response
}

fn trailer(key_a: &[u8; 6], key_b: &[u8; 6]) -> Vec<u8> {
    let mut block = key_a.to_vec();
    block.extend_from_slice(&ACCESS_BITS);
    block.extend_from_slice(key_b);
    block
}

const fn block_to_sector(block: u8) -> u8 {
    if block < 128 {
        block / 4
    } else {
        32 + (block - 128) / 16
    }
}

const fn is_trailer_block(block: u8) -> bool {
    if block < 128 {
        block % 4 == 3
    } else {
        (block - 128) % 16 == 15
    }
}
