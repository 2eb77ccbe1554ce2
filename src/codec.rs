//! Gzip and base64 codecs used to prepare file payloads for the wire.
//!
//! Both directions operate on in-memory buffers; the request processor and
//! client operations are responsible for staging intermediate `.gz`/`.b64`
//! files on disk the way the original implementation did, using these
//! functions as the actual transform.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Default base64 line-wrap width, matching `BASE64_DEF_LINE_SIZE`.
pub const DEFAULT_LINE_WRAP: usize = 72;
/// Minimum accepted line-wrap width.
pub const MIN_LINE_WRAP: usize = 4;

/// Gzip-compresses `data` at the best-compression level, matching the
/// original's `gz_pack_file` strategy.
pub fn gzip_pack(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| Error::Compress(e.to_string()))?;
    encoder.finish().map_err(|e| Error::Compress(e.to_string()))
}

/// Gzip-decompresses `data`.
pub fn gzip_unpack(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompress(e.to_string()))?;
    Ok(out)
}

/// Base64-encodes `data` with CRLF line wrapping every `line_len` characters
/// (rounded down to a multiple of 4, floor [`MIN_LINE_WRAP`]), matching
/// `base64_encode_file`'s output shape.
#[must_use]
pub fn base64_encode(data: &[u8], line_len: usize) -> Vec<u8> {
    let encoded = BASE64_STANDARD.encode(data);
    let wrap = (line_len.max(MIN_LINE_WRAP) / 4) * 4;
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / wrap.max(1) * 2 + 2);
    for chunk in encoded.as_bytes().chunks(wrap.max(1)) {
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Base64-decodes `data`, skipping whitespace and any byte outside the
/// standard alphabet, matching `base64_decode_file`'s lenient scanning.
pub fn base64_decode(data: &[u8]) -> Result<Vec<u8>> {
    let filtered: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| is_base64_alphabet(*b))
        .collect();
    BASE64_STANDARD
        .decode(filtered)
        .map_err(|e| Error::Decode(e.to_string()))
}

fn is_base64_alphabet(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let packed = gzip_pack(&data).unwrap();
        let unpacked = gzip_unpack(&packed).unwrap();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn base64_round_trips() {
        let data = b"arbitrary \x00\x01\xffbytes".to_vec();
        let encoded = base64_encode(&data, DEFAULT_LINE_WRAP);
        let decoded = base64_decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn base64_wraps_lines() {
        let data = vec![b'a'; 200];
        let encoded = base64_encode(&data, 16);
        for line in encoded.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            assert!(line.len() <= 16);
        }
    }

    #[test]
    fn base64_decode_skips_whitespace_and_newlines() {
        let data = b"hello world, quickft!".to_vec();
        let mut encoded = base64_encode(&data, 8);
        encoded.extend_from_slice(b"   \n\t");
        let decoded = base64_decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn pipeline_round_trips_like_a_send_receive() {
        let data = b"quickft end-to-end payload".to_vec();
        let packed = gzip_pack(&data).unwrap();
        let encoded = base64_encode(&packed, DEFAULT_LINE_WRAP);
        let decoded = base64_decode(&encoded).unwrap();
        let unpacked = gzip_unpack(&decoded).unwrap();
        assert_eq!(unpacked, data);
    }
}
