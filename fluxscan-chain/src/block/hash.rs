use std::{fmt, str::FromStr};

use crate::serialization::{sha256d, ParseError};

/// A block hash, used to identify blocks and link them into a chain.
///
/// Stored in internal little-endian order; displayed byte-reversed,
/// following the u256 convention set by Bitcoin and zcashd.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The double-SHA256 hash of a serialized block header.
    pub fn of(header_bytes: &[u8]) -> Self {
        Hash(sha256d::digest(header_bytes))
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
        f.debug_tuple("block::Hash")
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
                field: "block hash",
                position: 0,
                reason: "expected 64 hex characters",
            })
        } else {
            bytes.reverse();
            Ok(Hash(bytes))
        }
    }
}
