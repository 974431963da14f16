//! Thai ID Card - Smart card reading and Thai ID protocol implementation
//!
//! This crate talks to Thai national ID cards via PC/SC readers: it watches
//! reader slots for insertion and removal, selects the Thai ID applet and
//! reads the public data fields into a [`CardRecord`].

pub mod apdu;
pub mod monitor;
pub mod protocol;
pub mod reader;

pub use monitor::{CardMonitor, MonitorConfig, MonitorError, Poller, ReaderPresence, ReaderService};
pub use protocol::{ReadFailure, RetryPolicy, SelectError, ThaiIdCard};
pub use reader::{CardContext, CardError, CardReader, CardSession, PcscSession};

/// Re-export commonly used types
pub use thaiid_common::{CardRecord, ErrorCode, Event};
