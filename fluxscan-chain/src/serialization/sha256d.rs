//! Compute a double SHA-256 hash.

use std::io;

use sha2::{Digest, Sha256};

/// A type that lets you write out SHA-256d (double SHA-256) hashes.
#[derive(Default)]
pub struct Writer {
    hash: Sha256,
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.hash.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}

impl Writer {
    /// Consume the Writer and produce the hash result.
    pub fn finish(self) -> [u8; 32] {
        let result1 = self.hash.finalize();
        let result2 = Sha256::digest(result1);
        let mut buffer = [0u8; 32];
        buffer[0..32].copy_from_slice(&result2[0..32]);
        buffer
    }
}

/// Hash a byte slice with SHA-256d in one call.
pub fn digest(data: &[u8]) -> [u8; 32] {
    let mut buffer = [0u8; 32];
    buffer.copy_from_slice(&Sha256::digest(Sha256::digest(data))[0..32]);
    buffer
}

/// A 4-byte checksum using truncated double-SHA256 (two rounds of SHA256).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Checksum(pub [u8; 4]);

impl<'a> From<&'a [u8]> for Checksum {
    fn from(bytes: &'a [u8]) -> Self {
        let hash = digest(bytes);
        let mut checksum = [0u8; 4];
        checksum[0..4].copy_from_slice(&hash[0..4]);
        Self(checksum)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn double_hash_matches_streaming_writer() {
        let data = b"flux test vector";

        let mut writer = Writer::default();
        writer.write_all(data).unwrap();

        assert_eq!(writer.finish(), digest(data));
    }

    #[test]
    fn checksum_is_hash_prefix() {
        let data = b"checksum";
        let hash = digest(data);

        assert_eq!(Checksum::from(&data[..]).0, hash[0..4]);
    }
}
