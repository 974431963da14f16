//! Buddhist Era date conversion

use crate::text::trim_nulls;

/// Offset between Buddhist Era and Gregorian years
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Convert a `YYYYMMDD` Buddhist Era field to a Gregorian `YYYY-MM-DD` string.
///
/// Fields shorter than eight characters, or whose first eight characters are
/// not all digits, yield an empty string.
pub fn decode_date(raw: impl AsRef<[u8]>) -> String {
    let raw = trim_nulls(raw.as_ref());
    if raw.len() < 8 || !raw[..8].iter().all(u8::is_ascii_digit) {
        return String::new();
    }

    let Ok(text) = std::str::from_utf8(&raw[..8]) else {
        return String::new();
    };
    let Ok(buddhist_year) = text[0..4].parse::<i32>() else {
        return String::new();
    };

    format!(
        "{:04}-{}-{}",
        buddhist_year - BUDDHIST_ERA_OFFSET,
        &text[4..6],
        &text[6..8]
    )
}
