//! Streaming digest engine.
//!
//! [`DigestReader`] tees every byte flowing through it into an incremental
//! SHA-1 state and counts the bytes seen. After the underlying stream has
//! been consumed to EOF, [`DigestReader::finish`] yields the content
//! identifier and the authoritative payload length.
//!
//! The digest is only valid if the whole stream was read exactly once,
//! forward; the wrapper therefore exposes no seeking or rewinding.

use std::io::Read;

use sha1::{Digest, Sha1};

use crate::types::RecordId;

/// Forward-only reader that hashes and counts everything it passes through.
pub struct DigestReader<R> {
    inner: R,
    hasher: Sha1,
    count: u64,
}

impl<R: Read> DigestReader<R> {
    /// Wraps a stream. Nothing is read until the caller reads.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha1::new(),
            count: 0,
        }
    }

    /// Bytes observed so far.
    pub fn bytes_read(&self) -> u64 {
        self.count
    }

    /// Consumes the wrapper and yields `(identifier, length)`.
    ///
    /// Only meaningful once the stream has been fully drained; the caller
    /// is responsible for having read to EOF.
    pub fn finish(self) -> (RecordId, u64) {
        let digest: [u8; crate::types::DIGEST_LEN] = self.hasher.finalize().into();
        (RecordId::from_digest(digest), self.count)
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(mut reader: impl Read) {
        std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
    }

    #[test]
    fn hello_vector() {
        let mut tee = DigestReader::new(&b"hello"[..]);
        drain(&mut tee);
        let (id, length) = tee.finish();
        assert_eq!(id.to_string(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert_eq!(length, 5);
    }

    #[test]
    fn empty_stream() {
        let mut tee = DigestReader::new(std::io::empty());
        drain(&mut tee);
        let (id, length) = tee.finish();
        assert_eq!(id.to_string(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(length, 0);
    }

    #[test]
    fn chunked_reads_match_single_read() {
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let mut whole = DigestReader::new(payload.as_slice());
        drain(&mut whole);

        let mut chunked = DigestReader::new(payload.as_slice());
        let mut buf = [0u8; 7];
        loop {
            let n = chunked.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
        }

        let (id_a, len_a) = whole.finish();
        let (id_b, len_b) = chunked.finish();
        assert_eq!(id_a, id_b);
        assert_eq!(len_a, len_b);
        assert_eq!(len_a, payload.len() as u64);
    }

    #[test]
    fn counts_while_reading() {
        let mut tee = DigestReader::new(&b"abcdef"[..]);
        let mut buf = [0u8; 4];
        tee.read(&mut buf).unwrap();
        assert_eq!(tee.bytes_read(), 4);
        drain(&mut tee);
        assert_eq!(tee.bytes_read(), 6);
    }
}
