//! Photo reassembly

/// JPEG end-of-image marker
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Padding byte the card uses to fill the last photo chunk
pub const PADDING: u8 = 0x20;

/// Concatenate photo chunks in order and trim the result
pub fn assemble_photo<I>(chunks: I) -> Vec<u8>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut photo = Vec::new();
    for chunk in chunks {
        photo.extend_from_slice(chunk.as_ref());
    }
    trim_photo(photo)
}

/// Cut the photo right after the first JPEG end-of-image marker.
///
/// Without a marker only trailing padding is removed.
pub fn trim_photo(mut data: Vec<u8>) -> Vec<u8> {
    if let Some(pos) = data.windows(2).position(|w| w == JPEG_EOI) {
        data.truncate(pos + JPEG_EOI.len());
    } else {
        let end = data.iter().rposition(|&b| b != PADDING).map_or(0, |i| i + 1);
        data.truncate(end);
    }
    data
}
