//! Gzip validation and line decoding.

use flate2::read::MultiGzDecoder;
use std::io::{self, BufRead, BufReader, Cursor, Lines, Read};

/// Decoded text lines of one gzip blob. A zero-byte blob has no lines.
pub struct GzipLines(Option<Lines<BufReader<MultiGzDecoder<Cursor<Vec<u8>>>>>>);

impl Iterator for GzipLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.as_mut()?.next()
    }
}

/// True iff `bytes` decompress completely into UTF-8 text.
///
/// The whole payload is inflated, so a correct header over a truncated or
/// corrupted body is rejected, as is any other container format. A zero-byte
/// blob is empty text and counts as valid. No error escapes: every failure
/// is `false`.
pub fn is_valid_gzip(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return true;
    }
    let mut decoder = MultiGzDecoder::new(bytes);
    let mut text = String::new();
    decoder.read_to_string(&mut text).is_ok()
}

/// Line reader over a gzip payload. Takes ownership of the bytes.
pub fn open_gzip_lines(bytes: Vec<u8>) -> GzipLines {
    if bytes.is_empty() {
        return GzipLines(None);
    }
    GzipLines(Some(
        BufReader::new(MultiGzDecoder::new(Cursor::new(bytes))).lines(),
    ))
}
