//! Gzip framing for cached snapshots.

use std::io::{self, Read, Write};

use bytes::Bytes;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};

pub fn gzip(raw: &[u8]) -> io::Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 4 + 32), Compression::default());
    encoder.write_all(raw)?;
    encoder.finish().map(Bytes::from)
}

pub fn gunzip(compressed: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut raw = Vec::with_capacity(compressed.len() * 4);
    decoder.read_to_end(&mut raw)?;
    Ok(raw)
}
