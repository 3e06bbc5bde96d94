//! Deterministic raw-block construction for tests.
//!
//! Builders emit wire-format bytes, so every test that uses them also
//! exercises the real decoders.

use crate::{
    amount::Amount,
    fluxnode::{self, Start},
    serialization::{write_compact_size, FluxSerialize},
    transaction::{Hash as TxHash, SAPLING_OUTPUT_LEN, SAPLING_VERSION_GROUP_ID},
    transparent::{Input, OutPoint, Output, Script},
};

use super::{Hash, Header, HeaderAuth};

/// A deterministic pay-to-public-key-hash script; each `tag` is a
/// distinct address.
pub fn p2pkh_script(tag: u8) -> Script {
    let mut bytes = vec![0x76, 0xA9, 0x14];
    bytes.extend_from_slice(&[tag; 20]);
    bytes.extend_from_slice(&[0x88, 0xAC]);
    Script(bytes)
}

fn outputs_bytes(outputs: &[(Amount, Script)]) -> Vec<u8> {
    let mut data = Vec::new();
    write_compact_size(&mut data, outputs.len() as u64).unwrap();
    for (value, script) in outputs {
        Output {
            value: *value,
            lock_script: script.clone(),
        }
        .flux_serialize(&mut data)
        .unwrap();
    }
    data
}

/// A version 1 coinbase transaction paying `outputs`.
///
/// `height_tag` varies the coinbase data so different heights produce
/// different txids.
pub fn coinbase_tx(height_tag: u32, outputs: &[(Amount, Script)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_le_bytes());
    write_compact_size(&mut data, 1).unwrap();
    Input::Coinbase {
        data: height_tag.to_le_bytes().to_vec(),
        sequence: u32::MAX,
    }
    .flux_serialize(&mut data)
    .unwrap();
    data.extend_from_slice(&outputs_bytes(outputs));
    data.extend_from_slice(&0u32.to_le_bytes());
    data
}

/// A version 1 transfer spending `inputs` into `outputs`.
pub fn transfer_tx(inputs: &[OutPoint], outputs: &[(Amount, Script)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_le_bytes());
    write_compact_size(&mut data, inputs.len() as u64).unwrap();
    for outpoint in inputs {
        Input::PrevOut {
            outpoint: *outpoint,
            unlock_script: Script(vec![0x00; 2]),
            sequence: u32::MAX,
        }
        .flux_serialize(&mut data)
        .unwrap();
    }
    data.extend_from_slice(&outputs_bytes(outputs));
    data.extend_from_slice(&0u32.to_le_bytes());
    data
}

/// A version 4 transaction with transparent `inputs` and `outputs` and a
/// Sapling value balance. A nonzero balance adds one shielded output
/// description (and the binding signature that comes with it).
pub fn sapling_tx(
    inputs: &[OutPoint],
    outputs: &[(Amount, Script)],
    value_balance: Amount,
) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&(4u32 | 1 << 31).to_le_bytes());
    data.extend_from_slice(&SAPLING_VERSION_GROUP_ID.to_le_bytes());
    write_compact_size(&mut data, inputs.len() as u64).unwrap();
    for outpoint in inputs {
        Input::PrevOut {
            outpoint: *outpoint,
            unlock_script: Script(vec![0x00; 2]),
            sequence: u32::MAX,
        }
        .flux_serialize(&mut data)
        .unwrap();
    }
    data.extend_from_slice(&outputs_bytes(outputs));
    data.extend_from_slice(&0u32.to_le_bytes()); // lock time
    data.extend_from_slice(&0u32.to_le_bytes()); // expiry height
    data.extend_from_slice(&value_balance.units().to_le_bytes());
    write_compact_size(&mut data, 0).unwrap(); // shielded spends
    if value_balance == Amount::ZERO {
        write_compact_size(&mut data, 0).unwrap(); // shielded outputs
        write_compact_size(&mut data, 0).unwrap(); // joinsplits
    } else {
        write_compact_size(&mut data, 1).unwrap();
        data.extend_from_slice(&vec![0u8; SAPLING_OUTPUT_LEN]);
        write_compact_size(&mut data, 0).unwrap(); // joinsplits
        data.extend_from_slice(&[0x0C; 64]); // binding signature
    }
    data
}

/// A version 5 fluxnode START transaction.
pub fn fluxnode_start_tx(collateral: OutPoint, sig_time: u32) -> Vec<u8> {
    let start = Start {
        version: 5,
        feature_flags: None,
        collateral,
        collateral_pubkey: Some(vec![0x02; 33]),
        redeem_script: None,
        node_pubkey: vec![0x03; 33],
        sig_time,
        signature: vec![0x30; 71],
        delegate_keys: Vec::new(),
    };

    let mut data = Vec::new();
    data.extend_from_slice(&5u32.to_le_bytes());
    fluxnode::serialize_start_body(&start, &mut data).unwrap();
    data
}

/// Assemble a raw proof-of-work block at `version` 4 from serialized
/// transactions. `nonce_tag` varies the header so competing blocks at the
/// same height get distinct hashes.
pub fn pow_block(prev_hash: Hash, time: u32, nonce_tag: u8, txs: &[Vec<u8>]) -> Vec<u8> {
    let header = Header {
        version: 4,
        previous_block_hash: prev_hash,
        merkle_root: [0x4D; 32],
        final_sapling_root: [0x00; 32],
        time,
        bits: 0x1F07_FFFF,
        auth: HeaderAuth::Pow {
            nonce: [nonce_tag; 32],
            solution: vec![0u8; 52],
        },
    };
    assemble(header, txs)
}

/// Assemble a raw proof-of-node block naming `producer` as the collateral.
pub fn pon_block(prev_hash: Hash, time: u32, producer: OutPoint, txs: &[Vec<u8>]) -> Vec<u8> {
    let header = Header {
        version: 101,
        previous_block_hash: prev_hash,
        merkle_root: [0x4D; 32],
        final_sapling_root: [0x00; 32],
        time,
        bits: 0x1F07_FFFF,
        auth: HeaderAuth::Pon {
            collateral: producer,
            signature: vec![0x30; 65],
        },
    };
    assemble(header, txs)
}

fn assemble(header: Header, txs: &[Vec<u8>]) -> Vec<u8> {
    let mut data = header.flux_serialize_to_vec();
    write_compact_size(&mut data, txs.len() as u64).unwrap();
    for tx in txs {
        data.extend_from_slice(tx);
    }
    data
}

/// The outpoint of output `index` of a serialized transaction.
pub fn outpoint_of(tx_bytes: &[u8], index: u32) -> OutPoint {
    OutPoint {
        hash: TxHash::of(tx_bytes),
        index,
    }
}
