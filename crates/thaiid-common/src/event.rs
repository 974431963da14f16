//! Events published to subscribers
//!
//! Wire format: `{"type": "...", "payload": ...}` where the payload is the
//! card record, `null`, or `{"code": ..., "message": ...}`.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::record::CardRecord;

/// Error codes surfaced to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ReaderNotFound,
    /// Reserved, the monitor does not emit it
    CardNotDetected,
    ReadFailed,
    UnsupportedCard,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        match self {
            ErrorCode::ReaderNotFound => 1001,
            ErrorCode::CardNotDetected => 1002,
            ErrorCode::ReadFailed => 1003,
            ErrorCode::UnsupportedCard => 1004,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ReaderNotFound => "No smart card reader found.",
            ErrorCode::CardNotDetected => "No smart card detected in the reader.",
            ErrorCode::ReadFailed => "Failed to read data from the smart card.",
            ErrorCode::UnsupportedCard => "The inserted card is not a supported Thai ID card.",
        }
    }
}

/// Something that happened at the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CardInserted(Box<CardRecord>),
    CardRemoved,
    Error(ErrorCode),
}

impl Event {
    /// Value of the envelope's `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Event::CardInserted(_) => "CARD_INSERTED",
            Event::CardRemoved => "CARD_REMOVED",
            Event::Error(_) => "ERROR",
        }
    }
}

impl From<CardRecord> for Event {
    fn from(record: CardRecord) -> Self {
        Event::CardInserted(Box::new(record))
    }
}

impl From<ErrorCode> for Event {
    fn from(code: ErrorCode) -> Self {
        Event::Error(code)
    }
}

struct ErrorPayload(ErrorCode);

impl Serialize for ErrorPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut payload = serializer.serialize_struct("ErrorPayload", 2)?;
        payload.serialize_field("code", &self.0.code())?;
        payload.serialize_field("message", self.0.message())?;
        payload.end()
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut envelope = serializer.serialize_struct("Event", 2)?;
        envelope.serialize_field("type", self.kind())?;
        match self {
            Event::CardInserted(record) => envelope.serialize_field("payload", record)?,
            Event::CardRemoved => envelope.serialize_field("payload", &Option::<()>::None)?,
            Event::Error(code) => envelope.serialize_field("payload", &ErrorPayload(*code))?,
        }
        envelope.end()
    }
}
