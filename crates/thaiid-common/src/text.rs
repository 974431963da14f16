//! Text decoding for raw card fields

use encoding_rs::WINDOWS_874;

/// Separator between name segments on the card
pub const NAME_SEPARATOR: char = '#';

/// Strip leading and trailing NUL bytes from a raw field
pub fn trim_nulls(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|&b| b != 0).unwrap_or(data.len());
    let end = data.iter().rposition(|&b| b != 0).map_or(start, |i| i + 1);
    &data[start..end]
}

/// Decode a TIS-620 (Windows-874) field.
///
/// A byte outside the codepage becomes U+FFFD on its own; the rest of the
/// field still decodes, so a bad byte never blocks the read.
pub fn decode_thai(data: &[u8]) -> String {
    let (text, _had_errors) = WINDOWS_874.decode_without_bom_handling(trim_nulls(data));
    text.into_owned()
}

/// Decode an ASCII field (citizen ID, English name)
pub fn decode_latin(data: &[u8]) -> String {
    String::from_utf8_lossy(trim_nulls(data)).into_owned()
}

/// Split a `given#family` name field.
///
/// Returns two empty strings when the field has fewer than two segments.
pub fn split_name(text: &str) -> (String, String) {
    let mut parts = text.split(NAME_SEPARATOR);
    match (parts.next(), parts.next()) {
        (Some(given), Some(family)) => (clean(given), clean(family)),
        _ => (String::new(), String::new()),
    }
}

fn clean(segment: &str) -> String {
    segment.trim_matches(|c| c == ' ' || c == '\0').to_string()
}
