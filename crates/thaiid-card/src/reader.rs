//! PC/SC card reader management
//!
//! [`CardContext`] and [`CardSession`] are the seams between the monitor and
//! the hardware. [`CardReader`] implements them on top of a PC/SC context;
//! tests substitute a scripted double.

use std::ffi::CString;

use pcsc::{Card, Context, Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

/// Errors talking to a reader or card
#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),
    #[error("malformed response: {0} bytes, expected at least a status word")]
    MalformedResponse(usize),
    #[error("invalid reader name: {0:?}")]
    InvalidReaderName(String),
}

/// An exclusive connection to the card in one reader slot
pub trait CardSession {
    /// Send raw command bytes, returning the raw response including SW1 SW2
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>, CardError>;

    /// Reset the card and re-establish the connection
    fn reconnect(&mut self) -> Result<(), CardError>;

    /// End the session, leaving the card powered
    fn release(self) -> Result<(), CardError>
    where
        Self: Sized;
}

/// Access to the reader slots attached to this machine
pub trait CardContext {
    type Session: CardSession;

    /// Names of all visible readers. No reader attached is an empty list.
    fn list_readers(&self) -> Result<Vec<String>, CardError>;

    /// Open an exclusive session with the card in `reader`
    fn connect(&self, reader: &str) -> Result<Self::Session, CardError>;
}

/// Card reader wrapper for managing PC/SC connections
pub struct CardReader {
    context: Context,
}

impl CardReader {
    /// Create a new CardReader by establishing a PC/SC context
    pub fn new() -> Result<Self, CardError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// Connect to the first available reader
    pub fn connect_first(&self) -> Result<(PcscSession, String), CardError> {
        let reader = self
            .list_readers()?
            .into_iter()
            .next()
            .ok_or(pcsc::Error::NoReadersAvailable)?;
        let session = self.connect(&reader)?;
        Ok((session, reader))
    }
}

impl CardContext for CardReader {
    type Session = PcscSession;

    fn list_readers(&self) -> Result<Vec<String>, CardError> {
        reader_names(self.context.list_readers_owned())
    }

    fn connect(&self, reader: &str) -> Result<PcscSession, CardError> {
        let name =
            CString::new(reader).map_err(|_| CardError::InvalidReaderName(reader.to_string()))?;
        let card = self
            .context
            .connect(&name, ShareMode::Exclusive, Protocols::ANY)?;
        Ok(PcscSession { card })
    }
}

/// Convert a PC/SC listing. "No readers available" is an empty list.
fn reader_names(listing: Result<Vec<CString>, pcsc::Error>) -> Result<Vec<String>, CardError> {
    match listing {
        Ok(readers) => Ok(readers
            .into_iter()
            .map(|r| r.to_string_lossy().into_owned())
            .collect()),
        Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// A PC/SC card connection
pub struct PcscSession {
    card: Card,
}

impl CardSession for PcscSession {
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>, CardError> {
        let mut rapdu_buf = [0; MAX_BUFFER_SIZE];
        let rapdu = self.card.transmit(apdu, &mut rapdu_buf)?;
        Ok(rapdu.to_vec())
    }

    fn reconnect(&mut self) -> Result<(), CardError> {
        self.card
            .reconnect(ShareMode::Exclusive, Protocols::ANY, Disposition::ResetCard)?;
        Ok(())
    }

    fn release(self) -> Result<(), CardError> {
        self.card
            .disconnect(Disposition::LeaveCard)
            .map_err(|(_, err)| CardError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_readers_is_empty_list() {
        let names = reader_names(Err(pcsc::Error::NoReadersAvailable)).unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_listing_error_propagates() {
        assert!(matches!(
            reader_names(Err(pcsc::Error::NoService)),
            Err(CardError::Pcsc(pcsc::Error::NoService))
        ));
    }

    #[test]
    fn test_long_listing_kept_whole() {
        // Well past what a fixed 2 KiB name buffer could hold
        let readers: Vec<CString> = (0..64)
            .map(|i| CString::new(format!("ACS ACR1252 Dual Reader [ACR1252U PICC] {i:02} 00")).unwrap())
            .collect();
        let total: usize = readers.iter().map(|r| r.as_bytes_with_nul().len()).sum();
        assert!(total > 2048);

        let names = reader_names(Ok(readers)).unwrap();
        assert_eq!(names.len(), 64);
        assert_eq!(names[63], "ACS ACR1252 Dual Reader [ACR1252U PICC] 63 00");
    }
}
