//! Thai address tokenizer
//!
//! The card stores the registered address as `#`-separated segments: house
//! number first, province last, and prefixed segments (moo, soi, subdistrict,
//! district) in between. Segments without a recognised prefix are taken as
//! the street name.

use crate::record::AddressRecord;

/// Separator between address segments
pub const SEGMENT_SEPARATOR: char = '#';

pub const MOO: &str = "หมู่ที่";
pub const SOI: &str = "ซอย";
pub const TAMBON: &str = "ตำบล";
pub const KHWAENG: &str = "แขวง";
pub const AMPHOE: &str = "อำเภอ";
pub const KHET: &str = "เขต";
pub const PROVINCE: &str = "จังหวัด";

/// Subdistrict marker: `ตำบล` in the provinces, `แขวง` in Bangkok
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubdistrictPrefix {
    #[default]
    Tambon,
    Khwaeng,
}

impl SubdistrictPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            SubdistrictPrefix::Tambon => TAMBON,
            SubdistrictPrefix::Khwaeng => KHWAENG,
        }
    }
}

/// District marker: `อำเภอ` in the provinces, `เขต` in Bangkok
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistrictPrefix {
    #[default]
    Amphoe,
    Khet,
}

impl DistrictPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            DistrictPrefix::Amphoe => AMPHOE,
            DistrictPrefix::Khet => KHET,
        }
    }
}

/// Classification of one interior segment, first match wins
enum Segment<'a> {
    Moo(&'a str),
    Soi(&'a str),
    Subdistrict(SubdistrictPrefix, &'a str),
    District(DistrictPrefix, &'a str),
    Province(&'a str),
    Unprefixed(&'a str),
}

impl<'a> Segment<'a> {
    fn classify(part: &'a str) -> Self {
        if let Some(rest) = part.strip_prefix(MOO) {
            Segment::Moo(rest.trim())
        } else if let Some(rest) = part.strip_prefix(SOI) {
            Segment::Soi(rest.trim())
        } else if let Some(rest) = part.strip_prefix(TAMBON) {
            Segment::Subdistrict(SubdistrictPrefix::Tambon, rest.trim())
        } else if let Some(rest) = part.strip_prefix(KHWAENG) {
            Segment::Subdistrict(SubdistrictPrefix::Khwaeng, rest.trim())
        } else if let Some(rest) = part.strip_prefix(AMPHOE) {
            Segment::District(DistrictPrefix::Amphoe, rest.trim())
        } else if let Some(rest) = part.strip_prefix(KHET) {
            Segment::District(DistrictPrefix::Khet, rest.trim())
        } else if let Some(rest) = part.strip_prefix(PROVINCE) {
            Segment::Province(rest.trim())
        } else {
            Segment::Unprefixed(part)
        }
    }
}

/// Parse a decoded address field.
///
/// Returns `None` for an empty field.
pub fn parse_address(raw: &str) -> Option<AddressRecord> {
    if raw.is_empty() {
        return None;
    }

    let parts: Vec<&str> = raw.split(SEGMENT_SEPARATOR).collect();
    let mut addr = AddressRecord {
        house_no: parts[0].trim().to_string(),
        ..Default::default()
    };

    if parts.len() > 1 {
        let last = parts[parts.len() - 1].trim();
        addr.province = last.strip_prefix(PROVINCE).unwrap_or(last).trim().to_string();
    }

    let interior: &[&str] = if parts.len() > 2 {
        &parts[1..parts.len() - 1]
    } else {
        &[]
    };

    for part in interior.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        match Segment::classify(part) {
            Segment::Moo(value) => addr.moo = value.to_string(),
            Segment::Soi(value) => addr.soi = value.to_string(),
            Segment::Subdistrict(prefix, value) => {
                addr.subdistrict_prefix = prefix;
                addr.subdistrict = value.to_string();
            }
            Segment::District(prefix, value) => {
                addr.district_prefix = prefix;
                addr.district = value.to_string();
            }
            Segment::Province(value) => addr.province = value.to_string(),
            Segment::Unprefixed(value) => {
                if addr.street.is_empty() {
                    addr.street = value.to_string();
                }
            }
        }
    }

    addr.full_address = full_address(&addr);
    Some(addr)
}

/// Rebuild the one-line address from the structured fields
pub fn full_address(addr: &AddressRecord) -> String {
    let mut tokens = Vec::with_capacity(7);

    if !addr.house_no.is_empty() {
        tokens.push(addr.house_no.clone());
    }
    if !addr.moo.is_empty() {
        tokens.push(format!("{MOO} {}", addr.moo));
    }
    if !addr.soi.is_empty() {
        tokens.push(format!("{SOI}{}", addr.soi));
    }
    if !addr.street.is_empty() {
        tokens.push(addr.street.clone());
    }
    if !addr.subdistrict.is_empty() {
        tokens.push(format!("{}{}", addr.subdistrict_prefix.as_str(), addr.subdistrict));
    }
    if !addr.district.is_empty() {
        tokens.push(format!("{}{}", addr.district_prefix.as_str(), addr.district));
    }
    if !addr.province.is_empty() {
        tokens.push(format!("{PROVINCE}{}", addr.province));
    }

    tokens.join(" ")
}
