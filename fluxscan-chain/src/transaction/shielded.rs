//! Shielded transaction components: Sprout JoinSplits and Sapling
//! spend/output descriptions.

use crate::amount::Amount;
use crate::serialization::{ByteCursor, ParseError};

/// Groth16 proof size, used by Sapling spend and output descriptions.
pub const GROTH16_PROOF_LEN: usize = 192;

/// PHGR13 proof size, used by the JoinSplit description on this chain.
pub const PHGR13_PROOF_LEN: usize = 296;

/// JoinSplit note ciphertext size in version 2 (Sprout) transactions.
pub const SPROUT_CIPHERTEXT_LEN: usize = 601;

/// JoinSplit note ciphertext size in version 4 (Sapling-era) transactions.
///
/// 52 bytes smaller than the reference chain's 601; a decoder using the
/// reference size over-reads every Sapling-era JoinSplit by 104 bytes.
pub const SAPLING_ERA_CIPHERTEXT_LEN: usize = 549;

/// Sapling enc_ciphertext size.
pub const SAPLING_ENC_CIPHERTEXT_LEN: usize = 580;

/// Sapling out_ciphertext size.
pub const SAPLING_OUT_CIPHERTEXT_LEN: usize = 80;

/// Total serialized size of a Sapling spend description.
pub const SAPLING_SPEND_LEN: usize = 384;

/// Total serialized size of a Sapling output description.
pub const SAPLING_OUTPUT_LEN: usize = 948;

/// Total serialized size of a version 2 JoinSplit description.
pub const SPROUT_JOINSPLIT_LEN: usize = 1802;

/// Total serialized size of a version 4 JoinSplit description.
pub const SAPLING_ERA_JOINSPLIT_LEN: usize = 1698;

/// A Sprout-style JoinSplit description.
///
/// Bundles two shielded inputs and two shielded outputs with the two
/// transparent-flow scalars. The proof region keeps the PHGR13 length in
/// both transaction versions; only the ciphertexts shrink at version 4.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinSplit {
    /// Funds entering the shielded pool from the transparent value pool.
    pub vpub_old: Amount,
    /// Funds leaving the shielded pool into the transparent value pool.
    pub vpub_new: Amount,
    pub anchor: [u8; 32],
    pub nullifiers: [[u8; 32]; 2],
    pub commitments: [[u8; 32]; 2],
    pub ephemeral_key: [u8; 32],
    pub random_seed: [u8; 32],
    pub macs: [[u8; 32]; 2],
    pub proof: Vec<u8>,
    pub ciphertexts: [Vec<u8>; 2],
}

impl JoinSplit {
    pub(crate) fn parse(
        cursor: &mut ByteCursor<'_>,
        ciphertext_len: usize,
    ) -> Result<Self, ParseError> {
        Ok(JoinSplit {
            vpub_old: Amount::from_units(cursor.read_i64_le("joinsplit vpub_old")?),
            vpub_new: Amount::from_units(cursor.read_i64_le("joinsplit vpub_new")?),
            anchor: cursor.read_array::<32>("joinsplit anchor")?,
            nullifiers: [
                cursor.read_array::<32>("joinsplit nullifier")?,
                cursor.read_array::<32>("joinsplit nullifier")?,
            ],
            commitments: [
                cursor.read_array::<32>("joinsplit commitment")?,
                cursor.read_array::<32>("joinsplit commitment")?,
            ],
            ephemeral_key: cursor.read_array::<32>("joinsplit ephemeral key")?,
            random_seed: cursor.read_array::<32>("joinsplit random seed")?,
            macs: [
                cursor.read_array::<32>("joinsplit mac")?,
                cursor.read_array::<32>("joinsplit mac")?,
            ],
            proof: cursor
                .read_bytes(PHGR13_PROOF_LEN, "joinsplit proof")?
                .to_vec(),
            ciphertexts: [
                cursor
                    .read_bytes(ciphertext_len, "joinsplit ciphertext")?
                    .to_vec(),
                cursor
                    .read_bytes(ciphertext_len, "joinsplit ciphertext")?
                    .to_vec(),
            ],
        })
    }
}

/// A Sapling spend description.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShieldedSpend {
    pub cv: [u8; 32],
    pub anchor: [u8; 32],
    pub nullifier: [u8; 32],
    pub rk: [u8; 32],
    pub zkproof: Vec<u8>,
    pub spend_auth_sig: [u8; 64],
}

impl ShieldedSpend {
    pub(crate) fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ParseError> {
        Ok(ShieldedSpend {
            cv: cursor.read_array::<32>("sapling spend cv")?,
            anchor: cursor.read_array::<32>("sapling spend anchor")?,
            nullifier: cursor.read_array::<32>("sapling spend nullifier")?,
            rk: cursor.read_array::<32>("sapling spend rk")?,
            zkproof: cursor
                .read_bytes(GROTH16_PROOF_LEN, "sapling spend proof")?
                .to_vec(),
            spend_auth_sig: cursor.read_array::<64>("sapling spend auth sig")?,
        })
    }
}

/// A Sapling output description.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShieldedOutput {
    pub cv: [u8; 32],
    pub cmu: [u8; 32],
    pub ephemeral_key: [u8; 32],
    pub zkproof: Vec<u8>,
    pub enc_ciphertext: Vec<u8>,
    pub out_ciphertext: Vec<u8>,
}

impl ShieldedOutput {
    pub(crate) fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ParseError> {
        Ok(ShieldedOutput {
            cv: cursor.read_array::<32>("sapling output cv")?,
            cmu: cursor.read_array::<32>("sapling output cmu")?,
            ephemeral_key: cursor.read_array::<32>("sapling output ephemeral key")?,
            zkproof: cursor
                .read_bytes(GROTH16_PROOF_LEN, "sapling output proof")?
                .to_vec(),
            enc_ciphertext: cursor
                .read_bytes(SAPLING_ENC_CIPHERTEXT_LEN, "sapling output enc ciphertext")?
                .to_vec(),
            out_ciphertext: cursor
                .read_bytes(SAPLING_OUT_CIPHERTEXT_LEN, "sapling output out ciphertext")?
                .to_vec(),
        })
    }
}

/// The transparent-visible flow scalars of a shielded transaction.
///
/// Sign conventions follow the chain: `vpub_old` moves transparent funds
/// into the pool, `vpub_new` moves pool funds out, and a positive
/// `value_balance` moves Sapling pool funds out.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ShieldedFlow {
    pub vpub_old: Amount,
    pub vpub_new: Amount,
    pub value_balance: Amount,
}

impl ShieldedFlow {
    /// Net flow out of the shielded pool, in smallest units.
    ///
    /// Positive means funds left the pool for transparent outputs, which
    /// raises the apparent fee of the transaction.
    pub fn from_pool(&self) -> i64 {
        self.vpub_new.units() - self.vpub_old.units() + self.value_balance.units()
    }

    /// Net flow into the shielded pool, in smallest units.
    pub fn into_pool(&self) -> i64 {
        -self.from_pool()
    }

    /// Whether every scalar is within the plausible-supply ceiling.
    pub fn is_plausible(&self) -> bool {
        self.vpub_old.is_plausible()
            && self.vpub_new.is_plausible()
            && self.value_balance.is_plausible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joinsplit_sizes_match_constants() {
        // Fixed region + two ciphertexts must add up to the wire totals.
        let fixed = 8 + 8 + 32 * 9 + PHGR13_PROOF_LEN;
        assert_eq!(fixed + 2 * SPROUT_CIPHERTEXT_LEN, SPROUT_JOINSPLIT_LEN);
        assert_eq!(
            fixed + 2 * SAPLING_ERA_CIPHERTEXT_LEN,
            SAPLING_ERA_JOINSPLIT_LEN
        );

        let mut data = vec![0u8; SAPLING_ERA_JOINSPLIT_LEN];
        data[0] = 1; // vpub_old = 1
        let mut cursor = ByteCursor::new(&data);
        let joinsplit = JoinSplit::parse(&mut cursor, SAPLING_ERA_CIPHERTEXT_LEN).unwrap();

        assert!(cursor.is_empty());
        assert_eq!(joinsplit.vpub_old, Amount::from_units(1));
        assert_eq!(joinsplit.ciphertexts[0].len(), SAPLING_ERA_CIPHERTEXT_LEN);
    }

    #[test]
    fn sapling_description_sizes_match_constants() {
        let spend_data = vec![0u8; SAPLING_SPEND_LEN];
        let mut cursor = ByteCursor::new(&spend_data);
        ShieldedSpend::parse(&mut cursor).unwrap();
        assert!(cursor.is_empty());

        let output_data = vec![0u8; SAPLING_OUTPUT_LEN];
        let mut cursor = ByteCursor::new(&output_data);
        ShieldedOutput::parse(&mut cursor).unwrap();
        assert!(cursor.is_empty());
    }

    #[test]
    fn flow_sign_conventions() {
        // 9 coins enter the Sapling pool: value_balance is negative.
        let flow = ShieldedFlow {
            vpub_old: Amount::ZERO,
            vpub_new: Amount::ZERO,
            value_balance: Amount::from_coins(-9),
        };
        assert_eq!(flow.from_pool(), Amount::from_coins(-9).units());
        assert_eq!(flow.into_pool(), Amount::from_coins(9).units());

        // Sprout deshielding: vpub_new pays out of the pool.
        let flow = ShieldedFlow {
            vpub_old: Amount::ZERO,
            vpub_new: Amount::from_coins(5),
            value_balance: Amount::ZERO,
        };
        assert_eq!(flow.from_pool(), Amount::from_coins(5).units());
    }
}
