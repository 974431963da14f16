//! Thai ID Common - Shared data structures and field decoders for Thai ID cards
//!
//! Everything in this crate is pure: raw byte fields read from the card go in,
//! typed values come out. No I/O, no state.

pub mod address;
pub mod date;
pub mod event;
pub mod photo;
pub mod record;
pub mod text;

pub use address::{parse_address, DistrictPrefix, SubdistrictPrefix};
pub use date::decode_date;
pub use event::{ErrorCode, Event};
pub use photo::{assemble_photo, trim_photo};
pub use record::{AddressRecord, CardRecord, Gender};
pub use text::{decode_latin, decode_thai, split_name, trim_nulls};
