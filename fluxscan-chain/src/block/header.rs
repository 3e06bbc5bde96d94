use std::io;

use chrono::{DateTime, Utc};

use crate::{
    parameters::{NetworkParams, PON_MIN_BLOCK_VERSION},
    serialization::{ByteCursor, FluxSerialize, ParseError},
    transparent::OutPoint,
};

use super::{Hash, Height};

/// A block header.
///
/// Two shapes share a 108-byte common prefix: proof-of-work headers carry
/// a mined nonce and an Equihash solution, proof-of-node headers (version
/// 100 and up) carry the producing node's collateral reference and its
/// signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub version: u32,

    /// The hash of the previous block, linking this block into the chain.
    pub previous_block_hash: Hash,

    /// The root of the transaction Merkle tree.
    pub merkle_root: [u8; 32],

    /// The Sapling note commitment tree root, or reserved bytes before
    /// Sapling activation.
    pub final_sapling_root: [u8; 32],

    /// Unix epoch seconds when the producer built the header.
    pub time: u32,

    /// The difficulty target in compact nBits form.
    pub bits: u32,

    pub auth: HeaderAuth,
}

/// The version-selected tail of a block header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HeaderAuth {
    /// A mined header with an Equihash solution.
    Pow { nonce: [u8; 32], solution: Vec<u8> },
    /// A proof-of-node header naming the producer's collateral.
    Pon {
        collateral: OutPoint,
        signature: Vec<u8>,
    },
}

impl Header {
    /// The length of the fixed fields shared by both header shapes.
    pub const BASE_LEN: usize = 108;

    pub(super) fn parse(
        cursor: &mut ByteCursor<'_>,
        params: &NetworkParams,
        expected_height: Option<Height>,
    ) -> Result<Self, ParseError> {
        let version = cursor.read_u32_le("header version")?;
        let previous_block_hash = Hash(cursor.read_array::<32>("previous block hash")?);
        let merkle_root = cursor.read_array::<32>("merkle root")?;
        let final_sapling_root = cursor.read_array::<32>("final sapling root")?;
        let time = cursor.read_u32_le("header time")?;
        let bits = cursor.read_u32_le("header bits")?;

        let auth = if version >= PON_MIN_BLOCK_VERSION {
            let collateral = OutPoint::parse(cursor)?;
            let signature = cursor.read_var_bytes("header signature")?.to_vec();
            HeaderAuth::Pon {
                collateral,
                signature,
            }
        } else {
            let nonce = cursor.read_array::<32>("header nonce")?;
            let solution_position = cursor.position();
            let solution = cursor.read_var_bytes("equihash solution")?.to_vec();
            let max_len = params.max_solution_len(expected_height.map(|h| h.0));
            if solution.len() > max_len {
                return Err(ParseError::SanityCap {
                    field: "equihash solution",
                    position: solution_position,
                    limit: max_len as u64,
                    actual: solution.len() as u64,
                });
            }
            HeaderAuth::Pow { nonce, solution }
        };

        Ok(Header {
            version,
            previous_block_hash,
            merkle_root,
            final_sapling_root,
            time,
            bits,
            auth,
        })
    }

    pub fn is_pon(&self) -> bool {
        matches!(self.auth, HeaderAuth::Pon { .. })
    }

    /// The producing node's collateral outpoint, for proof-of-node headers.
    pub fn producer(&self) -> Option<OutPoint> {
        match &self.auth {
            HeaderAuth::Pon { collateral, .. } => Some(*collateral),
            HeaderAuth::Pow { .. } => None,
        }
    }

    pub fn time_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.time as i64, 0).expect("u32 epoch seconds are in range")
    }

    /// The block difficulty implied by the compact `bits` target, relative
    /// to the chain's proof-of-work limit.
    pub fn difficulty(&self) -> f64 {
        // powLimit on this chain is 0x1f07ffff.
        const LIMIT_EXPONENT: i32 = 0x1F;
        const LIMIT_MANTISSA: f64 = 0x07FFFF as f64;

        let exponent = (self.bits >> 24) as i32;
        let mantissa = (self.bits & 0x00FF_FFFF) as f64;
        if mantissa == 0.0 {
            return 0.0;
        }

        (LIMIT_MANTISSA / mantissa) * 256f64.powi(LIMIT_EXPONENT - exponent)
    }
}

impl FluxSerialize for Header {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.version.flux_serialize(&mut writer)?;
        self.previous_block_hash.0.flux_serialize(&mut writer)?;
        self.merkle_root.flux_serialize(&mut writer)?;
        self.final_sapling_root.flux_serialize(&mut writer)?;
        self.time.flux_serialize(&mut writer)?;
        self.bits.flux_serialize(&mut writer)?;
        match &self.auth {
            HeaderAuth::Pow { nonce, solution } => {
                nonce.flux_serialize(&mut writer)?;
                solution.flux_serialize(&mut writer)
            }
            HeaderAuth::Pon {
                collateral,
                signature,
            } => {
                collateral.flux_serialize(&mut writer)?;
                signature.flux_serialize(&mut writer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pow_header(solution_len: usize) -> Header {
        Header {
            version: 4,
            previous_block_hash: Hash([0x01; 32]),
            merkle_root: [0x02; 32],
            final_sapling_root: [0x00; 32],
            time: 1_600_000_000,
            bits: 0x1F07_FFFF,
            auth: HeaderAuth::Pow {
                nonce: [0x03; 32],
                solution: vec![0u8; solution_len],
            },
        }
    }

    #[test]
    fn pow_header_roundtrip() {
        let header = pow_header(52);
        let data = header.flux_serialize_to_vec();

        let mut cursor = ByteCursor::new(&data);
        let parsed = Header::parse(
            &mut cursor,
            &NetworkParams::mainnet(),
            Some(Height(400_000)),
        )
        .unwrap();

        assert!(cursor.is_empty());
        assert_eq!(parsed, header);
        assert!(!parsed.is_pon());
        assert_eq!(parsed.producer(), None);
    }

    #[test]
    fn pon_header_roundtrip() {
        let header = Header {
            version: 101,
            auth: HeaderAuth::Pon {
                collateral: OutPoint {
                    hash: crate::transaction::Hash([0x07; 32]),
                    index: 0,
                },
                signature: vec![0x30; 65],
            },
            ..pow_header(0)
        };
        let data = header.flux_serialize_to_vec();

        let mut cursor = ByteCursor::new(&data);
        let parsed = Header::parse(
            &mut cursor,
            &NetworkParams::mainnet(),
            Some(Height(2_100_000)),
        )
        .unwrap();

        assert!(cursor.is_empty());
        assert_eq!(parsed, header);
        assert!(parsed.is_pon());
        assert!(parsed.producer().is_some());
    }

    #[test]
    fn oversized_solution_for_regime_is_rejected() {
        // A 1344-byte solution is fine at genesis but not after the
        // final parameter switch.
        let header = pow_header(1344);
        let data = header.flux_serialize_to_vec();

        let mut cursor = ByteCursor::new(&data);
        assert!(Header::parse(&mut cursor, &NetworkParams::mainnet(), Some(Height(0))).is_ok());

        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            Header::parse(
                &mut cursor,
                &NetworkParams::mainnet(),
                Some(Height(400_000)),
            ),
            Err(ParseError::SanityCap {
                field: "equihash solution",
                ..
            })
        ));
    }

    #[test]
    fn difficulty_at_pow_limit_is_one() {
        let header = pow_header(0);
        assert!((header.difficulty() - 1.0).abs() < 1e-9);
    }
}
