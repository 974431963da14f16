//! Scripted PC/SC double for exercising the protocol and monitor without
//! hardware.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use encoding_rs::WINDOWS_874;
use thaiid_card::protocol::{fields, FieldLocation};
use thaiid_card::{CardContext, CardError, CardSession, MonitorConfig, RetryPolicy};

pub const READER: &str = "Simulated Reader 00 00";

const SW_SUCCESS: [u8; 2] = [0x90, 0x00];
const SW_FILE_NOT_FOUND: [u8; 2] = [0x6A, 0x82];
const SW_WRONG_INS: [u8; 2] = [0x6D, 0x00];
const SW_NO_DATA: [u8; 2] = [0x6F, 0x00];

/// What the simulated card answers
#[derive(Debug, Clone, Default)]
pub struct SimCard {
    /// Status words returned to successive SELECTs, then 9000
    pub select_statuses: VecDeque<[u8; 2]>,
    /// Field contents keyed by READ BINARY P1/P2
    pub files: HashMap<(u8, u8), Vec<u8>>,
    /// Answer READ BINARY with 61xx and serve data through GET RESPONSE
    pub chained: bool,
    /// READ BINARY P1/P2 pairs whose transmit fails at the transport level
    pub broken_reads: HashSet<(u8, u8)>,
    /// SELECT fails at the transport level
    pub broken_select: bool,
    /// Resetting the card fails
    pub broken_reconnect: bool,
}

impl SimCard {
    pub fn with_file(mut self, location: FieldLocation, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert((location.p1, location.p2), data.into());
        self
    }

    pub fn with_select_statuses(mut self, statuses: &[[u8; 2]]) -> Self {
        self.select_statuses = statuses.iter().copied().collect();
        self
    }

    pub fn chained(mut self) -> Self {
        self.chained = true;
        self
    }

    pub fn with_broken_read(mut self, location: FieldLocation) -> Self {
        self.broken_reads.insert((location.p1, location.p2));
        self
    }

    pub fn with_broken_select(mut self) -> Self {
        self.broken_select = true;
        self
    }

    pub fn with_broken_reconnect(mut self) -> Self {
        self.broken_reconnect = true;
        self
    }

    /// A card holding a complete, valid data set
    pub fn thai_id() -> Self {
        SimCard::default()
            .with_file(fields::CITIZEN_ID, "1103700012345")
            .with_file(fields::THAI_NAME, padded(&tis620("สมชาย#ใจดี"), 0x64))
            .with_file(fields::ENGLISH_NAME, padded(b"SOMCHAI#JAIDEE", 0x64))
            .with_file(fields::DATE_OF_BIRTH, "25300115")
            .with_file(fields::GENDER, "1")
            .with_file(fields::ISSUE_DATE, "25650301")
            .with_file(fields::EXPIRY_DATE, "25740114")
            .with_file(
                fields::ADDRESS,
                padded(
                    &tis620("28/70#ซอยสุขขุมวิท 70 แยก 5-1#แขวงจอมทอง#เขตจอมทอง#จังหวัดกรุงเทพมหานคร"),
                    0xC8,
                ),
            )
            .with_file(fields::PHOTO_CHUNKS[0], vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
            .with_file(fields::PHOTO_CHUNKS[1], vec![0x4A, 0x46, 0x49, 0x46])
            .with_file(fields::PHOTO_CHUNKS[2], vec![0x00, 0xFF, 0xD9, 0x20, 0x20])
    }
}

/// Encode text as TIS-620
pub fn tis620(text: &str) -> Vec<u8> {
    let (bytes, _, had_errors) = WINDOWS_874.encode(text);
    assert!(!had_errors, "text not representable in TIS-620");
    bytes.into_owned()
}

/// Pad a field with trailing NULs the way the card does
pub fn padded(data: &[u8], len: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    out.resize(len.max(data.len()), 0x00);
    out
}

#[derive(Debug, Default)]
pub struct SimState {
    /// `None` makes listing fail
    pub readers: Option<Vec<String>>,
    /// Presence seen by successive connects, then the last value repeats
    pub presence: VecDeque<bool>,
    pub last_presence: bool,
    pub card: SimCard,
    pub connects: usize,
    pub reconnects: usize,
    pub releases: usize,
    pub selects: usize,
    pub sent: Vec<Vec<u8>>,
}

/// Shared handle onto a simulated reader
#[derive(Clone, Default)]
pub struct SimContext {
    state: Arc<Mutex<SimState>>,
}

impl SimContext {
    /// One reader whose card presence follows `presence`
    pub fn new(card: SimCard, presence: &[bool]) -> Self {
        let ctx = SimContext::default();
        {
            let mut state = ctx.state();
            state.readers = Some(vec![READER.to_string()]);
            state.presence = presence.iter().copied().collect();
            state.card = card;
        }
        ctx
    }

    pub fn without_readers() -> Self {
        let ctx = SimContext::default();
        ctx.state().readers = Some(Vec::new());
        ctx
    }

    pub fn failing_listing() -> Self {
        SimContext::default()
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }
}

impl CardContext for SimContext {
    type Session = SimSession;

    fn list_readers(&self) -> Result<Vec<String>, CardError> {
        self.state()
            .readers
            .clone()
            .ok_or(CardError::Pcsc(pcsc::Error::NoService))
    }

    fn connect(&self, _reader: &str) -> Result<SimSession, CardError> {
        let mut state = self.state();
        let present = match state.presence.pop_front() {
            Some(present) => {
                state.last_presence = present;
                present
            }
            None => state.last_presence,
        };

        if !present {
            return Err(CardError::Pcsc(pcsc::Error::NoSmartcard));
        }

        state.connects += 1;
        Ok(SimSession {
            state: Arc::clone(&self.state),
            pending: None,
        })
    }
}

pub struct SimSession {
    state: Arc<Mutex<SimState>>,
    pending: Option<Vec<u8>>,
}

impl CardSession for SimSession {
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>, CardError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(apdu.to_vec());

        let broken = match apdu[1] {
            0xA4 => state.card.broken_select,
            0xB0 => state.card.broken_reads.contains(&(apdu[2], apdu[3])),
            _ => false,
        };
        if broken {
            return Err(CardError::Pcsc(pcsc::Error::RemovedCard));
        }

        let response = match apdu[1] {
            0xA4 => {
                state.selects += 1;
                let sw = state.card.select_statuses.pop_front().unwrap_or(SW_SUCCESS);
                if sw[0] == 0x61 {
                    // FCI bytes waiting for GET RESPONSE
                    self.pending = Some(vec![0x6F; sw[1] as usize]);
                }
                sw.to_vec()
            }
            0xB0 => match state.card.files.get(&(apdu[2], apdu[3])) {
                Some(data) if state.card.chained => {
                    self.pending = Some(data.clone());
                    vec![0x61, data.len() as u8]
                }
                Some(data) => [data.as_slice(), &SW_SUCCESS].concat(),
                None => SW_FILE_NOT_FOUND.to_vec(),
            },
            0xC0 => match self.pending.take() {
                Some(data) => [data.as_slice(), &SW_SUCCESS].concat(),
                None => SW_NO_DATA.to_vec(),
            },
            _ => SW_WRONG_INS.to_vec(),
        };

        Ok(response)
    }

    fn reconnect(&mut self) -> Result<(), CardError> {
        self.pending = None;
        let mut state = self.state.lock().unwrap();
        state.reconnects += 1;
        if state.card.broken_reconnect {
            return Err(CardError::Pcsc(pcsc::Error::ResetCard));
        }
        Ok(())
    }

    fn release(self) -> Result<(), CardError> {
        self.state.lock().unwrap().releases += 1;
        Ok(())
    }
}

/// Monitor timing without sleeps
pub fn instant_config() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::ZERO,
        reader_backoff: Duration::ZERO,
        retry: instant_retry(),
    }
}

pub fn instant_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        retry_delay: Duration::ZERO,
        settle_delay: Duration::ZERO,
    }
}
