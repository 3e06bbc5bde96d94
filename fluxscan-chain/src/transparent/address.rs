//! Transparent address types.

use std::{fmt, str::FromStr};

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::parameters::Network;
use crate::serialization::ParseError;

use super::Script;

/// Two-byte version prefixes for base58check address encoding.
///
/// Flux inherits the Zcash transparent prefixes: mainnet addresses render
/// as `t1…` (pay-to-public-key-hash) and `t3…` (pay-to-script-hash).
mod magics {
    pub mod p2pkh {
        pub const MAINNET: [u8; 2] = [0x1C, 0xB8];
        pub const TESTNET: [u8; 2] = [0x1D, 0x25];
    }

    pub mod p2sh {
        pub const MAINNET: [u8; 2] = [0x1C, 0xBD];
        pub const TESTNET: [u8; 2] = [0x1C, 0xBA];
    }
}

/// A transparent address.
///
/// A version prefix is prepended to the 20-byte payload hash, and the
/// result is Base58Check encoded.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub enum Address {
    PayToPublicKeyHash {
        network: Network,
        /// RIPEMD-160 hash of the SHA-256 hash of the public key encoding.
        pub_key_hash: [u8; 20],
    },
    PayToScriptHash {
        network: Network,
        /// RIPEMD-160 hash of the SHA-256 hash of the redeem script.
        script_hash: [u8; 20],
    },
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut debug_struct = f.debug_struct("Address");
        match self {
            Address::PayToPublicKeyHash {
                network,
                pub_key_hash,
            } => debug_struct
                .field("network", network)
                .field("pub_key_hash", &hex::encode(pub_key_hash))
                .finish(),
            Address::PayToScriptHash {
                network,
                script_hash,
            } => debug_struct
                .field("network", network)
                .field("script_hash", &hex::encode(script_hash))
                .finish(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut bytes = Vec::with_capacity(22);
        bytes.extend_from_slice(&self.magic());
        bytes.extend_from_slice(self.payload());

        f.write_str(&bs58::encode(bytes).with_check().into_string())
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| ParseError::Malformed {
            field: "address",
            position: 0,
            reason,
        };

        let bytes = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|_| malformed("base58check decoding error"))?;
        if bytes.len() != 22 {
            return Err(malformed("unexpected payload length"));
        }

        let mut payload = [0u8; 20];
        payload.copy_from_slice(&bytes[2..22]);
        let magic = [bytes[0], bytes[1]];

        match magic {
            magics::p2pkh::MAINNET => Ok(Address::PayToPublicKeyHash {
                network: Network::Mainnet,
                pub_key_hash: payload,
            }),
            magics::p2pkh::TESTNET => Ok(Address::PayToPublicKeyHash {
                network: Network::Testnet,
                pub_key_hash: payload,
            }),
            magics::p2sh::MAINNET => Ok(Address::PayToScriptHash {
                network: Network::Mainnet,
                script_hash: payload,
            }),
            magics::p2sh::TESTNET => Ok(Address::PayToScriptHash {
                network: Network::Testnet,
                script_hash: payload,
            }),
            _ => Err(malformed("unknown address version prefix")),
        }
    }
}

impl Address {
    fn magic(&self) -> [u8; 2] {
        match self {
            Address::PayToPublicKeyHash { network, .. } => match network {
                Network::Mainnet => magics::p2pkh::MAINNET,
                Network::Testnet => magics::p2pkh::TESTNET,
            },
            Address::PayToScriptHash { network, .. } => match network {
                Network::Mainnet => magics::p2sh::MAINNET,
                Network::Testnet => magics::p2sh::TESTNET,
            },
        }
    }

    fn payload(&self) -> &[u8; 20] {
        match self {
            Address::PayToPublicKeyHash { pub_key_hash, .. } => pub_key_hash,
            Address::PayToScriptHash { script_hash, .. } => script_hash,
        }
    }

    /// Regenerate the lock script this address stands for.
    ///
    /// Only the two hash-based standard forms are regenerable, which is
    /// what lets the store keep an empty script column for them.
    pub fn to_lock_script(&self) -> Script {
        match self {
            Address::PayToPublicKeyHash { pub_key_hash, .. } => {
                let mut bytes = vec![0x76, 0xA9, 0x14];
                bytes.extend_from_slice(pub_key_hash);
                bytes.extend_from_slice(&[0x88, 0xAC]);
                Script(bytes)
            }
            Address::PayToScriptHash { script_hash, .. } => {
                let mut bytes = vec![0xA9, 0x14];
                bytes.extend_from_slice(script_hash);
                bytes.push(0x87);
                Script(bytes)
            }
        }
    }

    /// The 20-byte address payload hash: RIPEMD-160 of SHA-256.
    pub(super) fn hash_payload(bytes: &[u8]) -> [u8; 20] {
        let sha_hash = Sha256::digest(bytes);
        let ripe_hash = Ripemd160::digest(sha_hash);
        let mut payload = [0u8; 20];
        payload.copy_from_slice(&ripe_hash);
        payload
    }
}
