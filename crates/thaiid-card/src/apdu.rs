//! Command and response APDUs
//!
//! The Thai ID applet speaks short APDUs only, so lengths are single bytes.

use tracing::{debug, trace};

use crate::reader::{CardError, CardSession};

/// Status words the Thai ID protocol cares about
pub mod status {
    /// Normal processing
    pub const SUCCESS: u16 = 0x9000;
    /// Returned by some card revisions on a successful SELECT
    pub const SELECT_ACCEPTED: u16 = 0x9710;
    /// File or application not found
    pub const FILE_NOT_FOUND: u16 = 0x6A82;
    /// SW1 announcing response bytes waiting for GET RESPONSE
    pub const MORE_DATA: u8 = 0x61;
}

/// A response APDU split into payload and trailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub sw1: u8,
    pub sw2: u8,
}

impl ApduResponse {
    /// Split a raw response into data and status word
    pub fn from_bytes(rapdu: &[u8]) -> Result<Self, CardError> {
        if rapdu.len() < 2 {
            return Err(CardError::MalformedResponse(rapdu.len()));
        }

        let (data, trailer) = rapdu.split_at(rapdu.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            sw1: trailer[0],
            sw2: trailer[1],
        })
    }

    /// `9000`
    pub fn is_success(&self) -> bool {
        self.status_word() == status::SUCCESS
    }

    /// Number of bytes the card holds for GET RESPONSE, if SW1 is 61
    pub fn bytes_available(&self) -> Option<u8> {
        (self.sw1 == status::MORE_DATA).then_some(self.sw2)
    }

    pub fn status_word(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    /// Status word as four hex digits, for logs and errors
    pub fn status_string(&self) -> String {
        format!("{:04X}", self.status_word())
    }
}

/// Transmit raw command bytes and parse the reply
pub fn send_apdu<S>(session: &mut S, apdu: &[u8]) -> Result<ApduResponse, CardError>
where
    S: CardSession + ?Sized,
{
    trace!(apdu = %hex::encode_upper(apdu), "C-APDU");
    let rapdu = session.transmit(apdu)?;
    trace!(rapdu = %hex::encode_upper(&rapdu), "R-APDU");

    ApduResponse::from_bytes(&rapdu)
}

/// A short command APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    header: [u8; 4],
    body: Vec<u8>,
    expected: Option<u8>,
}

impl ApduCommand {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            header: [cla, ins, p1, p2],
            body: Vec::new(),
            expected: None,
        }
    }

    /// Command data, sent with an Lc byte
    pub fn data(self, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..self
        }
    }

    /// Le byte
    pub fn le(self, expected: u8) -> Self {
        Self {
            expected: Some(expected),
            ..self
        }
    }

    /// Encode as `CLA INS P1 P2 [Lc data] [Le]`
    pub fn build(&self) -> Vec<u8> {
        let mut apdu = Vec::with_capacity(6 + self.body.len());
        apdu.extend_from_slice(&self.header);

        if !self.body.is_empty() {
            apdu.push(self.body.len() as u8);
            apdu.extend_from_slice(&self.body);
        }
        apdu.extend(self.expected);

        apdu
    }

    /// Transmit once, returning whatever status the card gave
    pub fn send<S>(&self, session: &mut S) -> Result<ApduResponse, CardError>
    where
        S: CardSession + ?Sized,
    {
        send_apdu(session, &self.build())
    }

    /// Send this command and fetch buffered data if the card answers `61xx`.
    ///
    /// The returned status word is the one from GET RESPONSE in that case.
    pub fn send_with_continuation<S>(&self, session: &mut S) -> Result<ApduResponse, CardError>
    where
        S: CardSession + ?Sized,
    {
        let response = self.send(session)?;
        match response.bytes_available() {
            Some(len) => {
                debug!(len, "Fetching buffered response");
                commands::get_response(len).send(session)
            }
            None => Ok(response),
        }
    }
}

/// Commands used by the Thai ID applet
pub mod commands {
    use super::ApduCommand;

    /// SELECT by AID
    pub fn select(aid: &[u8]) -> ApduCommand {
        ApduCommand::new(0x00, 0xA4, 0x04, 0x00).data(aid)
    }

    /// Proprietary READ BINARY: offset in P1/P2, length in the data field
    pub fn read_binary(p1: u8, p2: u8, le: u8) -> ApduCommand {
        ApduCommand::new(0x80, 0xB0, p1, p2).data([0x00, le])
    }

    /// GET RESPONSE for `len` buffered bytes
    pub fn get_response(len: u8) -> ApduCommand {
        ApduCommand::new(0x00, 0xC0, 0x00, 0x00).le(len)
    }
}
