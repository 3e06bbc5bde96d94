//! Row shapes for the append-only analytics tables.
//!
//! Every table merges by primary key with the newest `row_version`
//! winning; logical deletion is an `is_valid = 0` flip or a superseding
//! row, never a physical DELETE. Hash and txid columns hold canonical
//! display hex (big-endian).

use serde::{Deserialize, Serialize};

/// A monotonically increasing row version: milliseconds since epoch.
pub fn row_version_now() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// One row per indexed block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockRow {
    pub height: u32,
    pub hash: String,
    pub prev_hash: String,
    pub merkle_root: String,
    pub timestamp: u32,
    pub block_version: u32,
    pub size: u64,
    pub tx_count: u32,
    /// The producing fluxnode's collateral outpoint, for PoN blocks.
    pub producer: Option<String>,
    pub producer_reward: Option<i64>,
    pub difficulty: f64,
    pub chainwork: String,
    pub is_valid: u8,
    pub row_version: u64,
}

/// One row per indexed transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRow {
    pub txid: String,
    pub block_height: u32,
    /// Position within the block.
    pub tx_index: u32,
    pub timestamp: u32,
    pub tx_version: u32,
    pub locktime: u32,
    pub size: u64,
    pub vsize: u64,
    pub input_count: u32,
    pub output_count: u32,
    pub input_total: i64,
    pub output_total: i64,
    pub fee: i64,
    pub is_coinbase: u8,
    pub is_fluxnode_tx: u8,
    /// 2 for START, 4 for CONFIRMATION, null otherwise.
    pub fluxnode_type: Option<u8>,
    pub is_shielded: u8,
    pub is_valid: u8,
    pub row_version: u64,
}

/// The address a UTXO row carries when the output pays no transparent
/// address.
pub const NO_ADDRESS: &str = "(nonstandard)";

/// The script type marker a superseding row carries when a reorg removes
/// a UTXO; readers treat these rows as nonexistent.
pub const REORG_REMOVED: &str = "(reorged)";

/// One row per transaction output; spends and reorg removals supersede by
/// primary key `(txid, vout)` with a newer `row_version`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UtxoRow {
    pub txid: String,
    pub vout: u32,
    pub address: String,
    pub value: i64,
    /// Empty for reconstructible standard script types; the address plus
    /// `script_type` regenerates the script hex on read.
    pub script_pubkey: String,
    pub script_type: String,
    pub block_height: u32,
    pub spent: u8,
    pub spent_txid: Option<String>,
    pub spent_block_height: Option<u32>,
    pub row_version: u64,
}

/// One row per (address, transaction) pairing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddressTxRow {
    pub address: String,
    pub block_height: u32,
    pub tx_index: u32,
    pub txid: String,
    pub block_hash: String,
    /// `received` when received_value >= sent_value, else `sent`.
    pub direction: String,
    pub received_value: i64,
    pub sent_value: i64,
    pub is_coinbase: u8,
    pub is_valid: u8,
    pub row_version: u64,
}

/// An address-summary delta; a summing merge reconciles the per-batch
/// inserts into the running totals.
///
/// Keyed by `(address, batch_start_height)` so a replayed batch replaces
/// its own delta instead of double-counting it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddressDeltaRow {
    pub address: String,
    /// The first height of the batch that produced this delta.
    pub batch_start_height: u32,
    pub balance_delta: i64,
    pub tx_count_delta: u64,
    pub received_delta: i64,
    pub sent_delta: i64,
    pub unspent_delta: i64,
    pub first_seen: u32,
    pub last_activity: u32,
    pub row_version: u64,
}

/// One row per block height tracking the supply pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupplyStatRow {
    pub block_height: u32,
    pub timestamp: u32,
    pub transparent_supply: i64,
    pub shielded_pool: i64,
    pub total_supply: i64,
    pub is_valid: u8,
    pub row_version: u64,
}

/// One row per fluxnode operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FluxnodeRow {
    pub txid: String,
    pub block_height: u32,
    pub tx_index: u32,
    pub timestamp: u32,
    /// `start` or `confirm`.
    pub kind: String,
    pub collateral_txid: String,
    pub collateral_index: u32,
    /// Collateral or benchmark tier name, when recognized.
    pub tier: Option<String>,
    pub ip: Option<String>,
    pub sig_time: u32,
    pub update_type: Option<i8>,
    pub benchmark_tier: Option<i8>,
    pub is_valid: u8,
    pub row_version: u64,
}

/// A per-block producer delta; a summing merge accumulates the totals.
///
/// Keyed by `(fluxnode, first_block)`, one row per produced block, so a
/// replayed batch replaces its own rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProducerDeltaRow {
    /// The producing node's collateral outpoint in display form.
    pub fluxnode: String,
    pub blocks_delta: u64,
    pub first_block: u32,
    pub last_block: u32,
    pub rewards_delta: i64,
    pub row_version: u64,
}

/// The singleton sync-progress row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncStateRow {
    /// Always 1; the merge key that keeps this a single row.
    pub id: u8,
    pub current_height: u32,
    pub chain_height: u32,
    pub sync_percentage: f64,
    pub last_block_hash: String,
    pub is_syncing: u8,
    pub blocks_per_second: f64,
    pub row_version: u64,
}

/// One append-only row per handled reorganization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReorgRow {
    pub id: u64,
    pub from_height: u32,
    pub to_height: u32,
    pub common_ancestor: u32,
    pub old_hash: String,
    pub new_hash: String,
    pub blocks_affected: u32,
    pub occurred_at: u32,
    pub row_version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_serialize_to_flat_json_objects() {
        let row = UtxoRow {
            txid: "ab".repeat(32),
            vout: 0,
            address: "t1abc".into(),
            value: 150_000_000,
            script_pubkey: String::new(),
            script_type: "pubkeyhash".into(),
            block_height: 7,
            spent: 0,
            spent_txid: None,
            spent_block_height: None,
            row_version: 1,
        };

        let value = serde_json::to_value(&row).unwrap();
        assert!(value.is_object());
        assert_eq!(value["vout"], 0);
        assert_eq!(value["spent_txid"], serde_json::Value::Null);

        let back: UtxoRow = serde_json::from_value(value).unwrap();
        assert_eq!(back.txid, row.txid);
    }

    #[test]
    fn row_version_is_millisecond_scale() {
        let version = row_version_now();
        // 2020-01-01 in milliseconds.
        assert!(version > 1_577_836_800_000);
    }
}
