use std::{fmt, str::FromStr};

use crate::serialization::{sha256d, ParseError};

/// A transaction hash (txid).
///
/// Stored in internal little-endian order; displayed byte-reversed,
/// following the u256 convention set by Bitcoin and zcashd.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The double-SHA256 hash of a raw transaction byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        Hash(sha256d::digest(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.write_str(&hex::encode(reversed_bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.debug_tuple("transaction::Hash")
            .field(&hex::encode(reversed_bytes))
            .finish()
    }
}

impl FromStr for Hash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        if hex::decode_to_slice(s, &mut bytes[..]).is_err() {
            Err(ParseError::Malformed {
                field: "txid",
                position: 0,
                reason: "expected 64 hex characters",
            })
        } else {
            bytes.reverse();
            Ok(Hash(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_string_roundtrip() {
        let hash = Hash([0xAB; 32]);
        let parsed: Hash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn display_reverses_bytes() {
        let mut bytes = [0u8; 32];
        bytes[31] = 0x42;
        assert!(Hash(bytes).to_string().starts_with("42"));
    }
}
