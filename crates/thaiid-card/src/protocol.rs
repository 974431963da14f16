//! Thai ID card protocol implementation
//!
//! A read is one application selection followed by fixed-offset READ BINARY
//! commands. Only selection can fail the read; an unreadable field is left
//! empty.

use std::thread;
use std::time::Duration;

use thaiid_common::{
    assemble_photo, decode_date, decode_latin, decode_thai, parse_address, split_name,
    CardRecord, ErrorCode, Gender,
};
use tracing::{debug, info, warn};

use crate::apdu::{commands, status, ApduResponse};
use crate::reader::{CardError, CardSession};

/// Thai ID Application Identifier
pub mod aids {
    pub const THAI_ID: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x54, 0x48, 0x00, 0x01];
}

/// Location of a field on the card, as READ BINARY parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLocation {
    pub p1: u8,
    pub p2: u8,
    pub le: u8,
}

const fn field(p1: u8, p2: u8, le: u8) -> FieldLocation {
    FieldLocation { p1, p2, le }
}

/// Fixed field locations inside the Thai ID applet
pub mod fields {
    use super::{field, FieldLocation};

    pub const CITIZEN_ID: FieldLocation = field(0x00, 0x04, 0x0D);
    pub const THAI_NAME: FieldLocation = field(0x00, 0x11, 0x64);
    pub const ENGLISH_NAME: FieldLocation = field(0x00, 0x75, 0x64);
    pub const DATE_OF_BIRTH: FieldLocation = field(0x00, 0xD9, 0x08);
    pub const GENDER: FieldLocation = field(0x00, 0xE1, 0x01);
    pub const ISSUE_DATE: FieldLocation = field(0x01, 0x67, 0x08);
    pub const EXPIRY_DATE: FieldLocation = field(0x01, 0x6F, 0x08);
    pub const ADDRESS: FieldLocation = field(0x15, 0x79, 0x64);

    /// The photo is stored in 20 chunks of up to 255 bytes
    pub const PHOTO_CHUNKS: [FieldLocation; 20] = [
        field(0x01, 0x7B, 0xFF),
        field(0x02, 0x7A, 0xFF),
        field(0x03, 0x79, 0xFF),
        field(0x04, 0x78, 0xFF),
        field(0x05, 0x77, 0xFF),
        field(0x06, 0x76, 0xFF),
        field(0x07, 0x75, 0xFF),
        field(0x08, 0x74, 0xFF),
        field(0x09, 0x73, 0xFF),
        field(0x0A, 0x72, 0xFF),
        field(0x0B, 0x71, 0xFF),
        field(0x0C, 0x70, 0xFF),
        field(0x0D, 0x6F, 0xFF),
        field(0x0E, 0x6E, 0xFF),
        field(0x0F, 0x6D, 0xFF),
        field(0x10, 0x6C, 0xFF),
        field(0x11, 0x6B, 0xFF),
        field(0x12, 0x6A, 0xFF),
        field(0x13, 0x69, 0xFF),
        field(0x14, 0x68, 0xFF),
    ];
}

/// Why application selection failed
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    /// 6A82, usually cleared by resetting the card
    #[error("applet not found (SW=6A82)")]
    AppletMissing,
    #[error("select applet failed: SW={0:04X}")]
    Rejected(u16),
    #[error(transparent)]
    Card(#[from] CardError),
}

/// Why a field could not be read
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("read binary failed: SW={0}")]
    Status(String),
    #[error(transparent)]
    Card(#[from] CardError),
}

/// A failed card read, classified for subscribers
#[derive(Debug, thiserror::Error)]
pub enum ReadFailure {
    #[error("unsupported card: {0}")]
    UnsupportedCard(SelectError),
    #[error("failed to read card: {0}")]
    Transport(#[from] CardError),
}

impl ReadFailure {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ReadFailure::UnsupportedCard(_) => ErrorCode::UnsupportedCard,
            ReadFailure::Transport(_) => ErrorCode::ReadFailed,
        }
    }
}

impl From<SelectError> for ReadFailure {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::Card(err) => ReadFailure::Transport(err),
            other => ReadFailure::UnsupportedCard(other),
        }
    }
}

/// How hard to try application selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total selection attempts, only applet-missing is retried
    pub attempts: u32,
    /// Pause after resetting the card
    pub retry_delay: Duration,
    /// Pause before each selection attempt
    pub settle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_millis(200),
            settle_delay: Duration::from_millis(50),
        }
    }
}

/// Thai ID card interface over one session
pub struct ThaiIdCard<'a, S: CardSession> {
    session: &'a mut S,
}

impl<'a, S: CardSession> ThaiIdCard<'a, S> {
    /// Create a new Thai ID card interface
    pub fn new(session: &'a mut S) -> Self {
        Self { session }
    }

    /// Select the Thai ID applet
    pub fn select_applet(&mut self) -> Result<ApduResponse, SelectError> {
        let response =
            commands::select(aids::THAI_ID).send_with_continuation(&mut *self.session)?;

        match response.status_word() {
            status::SUCCESS | status::SELECT_ACCEPTED => Ok(response),
            status::FILE_NOT_FOUND => Err(SelectError::AppletMissing),
            sw => Err(SelectError::Rejected(sw)),
        }
    }

    /// Select the applet, resetting the card between applet-missing attempts
    pub fn select_with_retry(&mut self, policy: &RetryPolicy) -> Result<(), ReadFailure> {
        let attempts = policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            thread::sleep(policy.settle_delay);

            match self.select_applet() {
                Ok(response) => {
                    debug!(attempt, sw = %response.status_string(), "Applet selected");
                    return Ok(());
                }
                Err(SelectError::AppletMissing) if attempt < attempts => {
                    warn!(attempt, "Applet not found, resetting card");
                    self.session.reconnect()?;
                    thread::sleep(policy.retry_delay);
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Read one field, following a `61xx` continuation
    pub fn read_binary(&mut self, location: FieldLocation) -> Result<Vec<u8>, FieldError> {
        let response = commands::read_binary(location.p1, location.p2, location.le)
            .send_with_continuation(&mut *self.session)?;

        if !response.is_success() {
            return Err(FieldError::Status(response.status_string()));
        }

        Ok(response.data)
    }

    /// Read one field, logging and swallowing failures
    fn read_field(&mut self, name: &str, location: FieldLocation) -> Option<Vec<u8>> {
        match self.read_binary(location) {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(field = name, error = %err, "Failed to read field");
                None
            }
        }
    }

    /// Read and reassemble the photo.
    ///
    /// Stops at the first chunk that cannot be read. Empty means no photo.
    pub fn read_photo(&mut self) -> Vec<u8> {
        let mut chunks = Vec::with_capacity(fields::PHOTO_CHUNKS.len());

        for (index, location) in fields::PHOTO_CHUNKS.iter().enumerate() {
            match self.read_binary(*location) {
                Ok(data) => chunks.push(data),
                Err(err) => {
                    debug!(chunk = index + 1, error = %err, "Photo ended early");
                    break;
                }
            }
        }

        assemble_photo(chunks)
    }

    /// Read every field of an already selected applet
    pub fn read_fields(&mut self) -> CardRecord {
        let mut record = CardRecord::default();

        if let Some(data) = self.read_field("citizen_id", fields::CITIZEN_ID) {
            record.citizen_id = decode_latin(&data);
        }

        if let Some(data) = self.read_field("thai_name", fields::THAI_NAME) {
            (record.first_name_th, record.last_name_th) = split_name(&decode_thai(&data));
        }

        if let Some(data) = self.read_field("english_name", fields::ENGLISH_NAME) {
            (record.first_name_en, record.last_name_en) = split_name(&decode_latin(&data));
        }

        if let Some(data) = self.read_field("date_of_birth", fields::DATE_OF_BIRTH) {
            record.date_of_birth = decode_date(&data);
        }

        if let Some(data) = self.read_field("gender", fields::GENDER) {
            record.gender = Gender::from_code(&data);
        }

        if let Some(data) = self.read_field("issue_date", fields::ISSUE_DATE) {
            record.issue_date = decode_date(&data);
        }

        if let Some(data) = self.read_field("expiry_date", fields::EXPIRY_DATE) {
            record.expiry_date = decode_date(&data);
        }

        if let Some(data) = self.read_field("address", fields::ADDRESS) {
            record.address = parse_address(&decode_thai(&data));
        }

        record.photo = self.read_photo();
        record
    }

    /// Read all card data (application selection + fields)
    pub fn read_card(&mut self, policy: &RetryPolicy) -> Result<CardRecord, ReadFailure> {
        self.select_with_retry(policy)?;
        let record = self.read_fields();
        info!(photo_bytes = record.photo.len(), "Card data read");
        Ok(record)
    }
}
