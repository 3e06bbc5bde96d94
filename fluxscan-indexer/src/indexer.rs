//! The stateful batch indexer.
//!
//! Consumes prepared `(parsed block, raw hex)` pairs in strictly
//! increasing height order and emits the five record streams. All
//! cross-batch state — the UTXO cache and the supply pair — lives on
//! [`BatchIndexer`] and is owned by the single sync worker; re-running a
//! batch from the same start height converges to the same visible store
//! state because every row merges by primary key and version.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use fluxscan_chain::{
    block::{Block, Height},
    parameters::{NetworkParams, Tier},
    transaction::{self, Transaction},
    transparent::{OutPoint, Output},
};
use fluxscan_store::{
    row_version_now, AddressDeltaRow, AddressTxRow, BlockRow, FluxnodeRow, IndexStore, InsertMode,
    ProducerDeltaRow, SupplyStatRow, TransactionRow, UtxoRow, NO_ADDRESS,
};
use tracing::{debug, warn};

use crate::{
    error::IndexError,
    supply::{SupplyDelta, SupplyTracker},
    utxo_cache::{UtxoCache, UtxoEntry},
};

/// A block ready for indexing: parsed form, raw bytes, and the
/// daemon-reported fields the parser cannot derive.
#[derive(Clone, Debug)]
pub struct PreparedBlock {
    pub height: Height,
    pub block: Block,
    pub raw: Vec<u8>,
    pub chainwork: String,
    pub difficulty: f64,
}

/// What one `index_batch` call produced.
#[derive(Clone, Debug)]
pub struct BatchOutcome {
    pub blocks_indexed: usize,
    pub last_height: u32,
    /// Display hex of the last block's hash.
    pub last_hash: String,
    /// Total time spent in store inserts, for backpressure decisions.
    pub insert_time: Duration,
    pub missing_utxos: u64,
}

/// The stateful core of the ingestion pipeline.
pub struct BatchIndexer<S> {
    store: S,
    params: NetworkParams,
    cache: UtxoCache,
    supply: SupplyTracker,
}

/// Per-transaction accumulation while walking a block.
#[derive(Default)]
struct AddressActivity {
    received: i64,
    sent: i64,
}

impl<S: IndexStore> BatchIndexer<S> {
    pub fn new(store: S, params: NetworkParams) -> Self {
        BatchIndexer {
            store,
            params,
            cache: UtxoCache::new(),
            supply: SupplyTracker::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &UtxoCache {
        &self.cache
    }

    /// Drop all cross-batch state. Required after a reorg.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.supply.reset();
    }

    /// Index a batch of consecutive blocks.
    ///
    /// Returns the number of blocks written. Idempotent on retry from the
    /// same start height: the store merges by primary key and version.
    pub async fn index_batch(
        &mut self,
        blocks: &[PreparedBlock],
        mode: InsertMode,
    ) -> Result<BatchOutcome, IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(BatchOutcome {
                blocks_indexed: 0,
                last_height: 0,
                last_hash: String::new(),
                insert_time: Duration::ZERO,
                missing_utxos: 0,
            });
        };

        let version = row_version_now();
        let batch_start = blocks[0].height.0;

        // Per-batch output map, checked before the cache and the store so
        // same-block and same-batch create-and-spend resolve locally.
        let batch_map = self.build_output_map(blocks);

        // Resolve every non-coinbase input, and opportunistically the
        // START collaterals so their tier can be recognized.
        let (resolved, missing_utxos) = self.resolve_inputs(blocks, &batch_map).await?;

        let mut block_rows = Vec::with_capacity(blocks.len());
        let mut tx_rows = Vec::new();
        let mut fluxnode_rows = Vec::new();
        let mut utxo_creations = Vec::new();
        let mut utxo_spends = Vec::new();
        let mut address_tx_rows = Vec::new();
        let mut supply_rows = Vec::with_capacity(blocks.len());
        let mut producer_rows = Vec::new();

        // Batch-wide address aggregation for the summary deltas.
        let mut deltas: HashMap<String, AddressDeltaRow> = HashMap::new();
        let mut spent_outpoints: Vec<OutPoint> = Vec::new();

        for prepared in blocks {
            let height = prepared.height.0;
            let block = &prepared.block;
            let block_hash = block.hash.to_string();
            let timestamp = block.header.time;

            let mut total_fees: i64 = 0;
            let mut shielded_change: i64 = 0;
            let mut coinbase_outputs: i64 = 0;
            let mut coinbase_row: Option<usize> = None;

            for (tx_index, parsed) in block.transactions.iter().enumerate() {
                let tx = &parsed.transaction;
                let txid = parsed.txid.to_string();
                let is_coinbase = tx.is_coinbase();

                let output_total = tx.output_total().units();
                let mut input_total: i64 = 0;
                let mut activity: HashMap<String, AddressActivity> = HashMap::new();

                // Outputs: credit the paying address, create UTXO rows.
                for (vout, output) in tx.outputs().iter().enumerate() {
                    let entry = self.utxo_entry(output, height);
                    if entry.address != NO_ADDRESS {
                        activity.entry(entry.address.clone()).or_default().received +=
                            entry.value;
                    }
                    utxo_creations.push(UtxoRow {
                        txid: txid.clone(),
                        vout: vout as u32,
                        address: entry.address,
                        value: entry.value,
                        script_pubkey: entry.script_pubkey,
                        script_type: entry.script_type,
                        block_height: height,
                        spent: 0,
                        spent_txid: None,
                        spent_block_height: None,
                        row_version: version,
                    });
                }

                // Inputs: debit the owning address, supersede the UTXO row.
                for input in tx.inputs() {
                    let Some(outpoint) = input.outpoint() else {
                        continue;
                    };
                    let Some(entry) = resolved.get(&outpoint) else {
                        continue;
                    };
                    input_total += entry.value;
                    if entry.address != NO_ADDRESS {
                        activity.entry(entry.address.clone()).or_default().sent += entry.value;
                    }
                    utxo_spends.push(UtxoRow {
                        txid: outpoint.hash.to_string(),
                        vout: outpoint.index,
                        address: entry.address.clone(),
                        value: entry.value,
                        script_pubkey: entry.script_pubkey.clone(),
                        script_type: entry.script_type.clone(),
                        block_height: entry.block_height,
                        spent: 1,
                        spent_txid: Some(txid.clone()),
                        spent_block_height: Some(height),
                        row_version: version,
                    });
                    spent_outpoints.push(outpoint);
                }

                // Fee: inputs minus outputs, corrected by the net flow out
                // of the shielded pool, clamped at zero.
                let flow = tx.shielded_flow();
                let from_pool = flow.map(|flow| flow.from_pool()).unwrap_or(0);
                let fee = if is_coinbase {
                    coinbase_outputs = output_total;
                    0
                } else {
                    let fee = (input_total - output_total + from_pool).max(0);
                    total_fees += fee;
                    fee
                };
                shielded_change += flow.map(|flow| flow.into_pool()).unwrap_or(0);

                // Address rows and summary deltas.
                for (address, entry) in &activity {
                    let direction = if entry.received >= entry.sent {
                        "received"
                    } else {
                        "sent"
                    };
                    address_tx_rows.push(AddressTxRow {
                        address: address.clone(),
                        block_height: height,
                        tx_index: tx_index as u32,
                        txid: txid.clone(),
                        block_hash: block_hash.clone(),
                        direction: direction.to_string(),
                        received_value: entry.received,
                        sent_value: entry.sent,
                        is_coinbase: u8::from(is_coinbase),
                        is_valid: 1,
                        row_version: version,
                    });

                    let delta = deltas
                        .entry(address.clone())
                        .or_insert_with(|| AddressDeltaRow {
                            address: address.clone(),
                            batch_start_height: batch_start,
                            balance_delta: 0,
                            tx_count_delta: 0,
                            received_delta: 0,
                            sent_delta: 0,
                            unspent_delta: 0,
                            first_seen: timestamp,
                            last_activity: timestamp,
                            row_version: version,
                        });
                    delta.balance_delta += entry.received - entry.sent;
                    delta.received_delta += entry.received;
                    delta.sent_delta += entry.sent;
                    delta.tx_count_delta += 1;
                    delta.first_seen = delta.first_seen.min(timestamp);
                    delta.last_activity = delta.last_activity.max(timestamp);
                }

                if let Some(row) = self.fluxnode_row(
                    tx,
                    &txid,
                    height,
                    tx_index as u32,
                    timestamp,
                    &resolved,
                    version,
                ) {
                    fluxnode_rows.push(row);
                }

                tx_rows.push(TransactionRow {
                    txid,
                    block_height: height,
                    tx_index: tx_index as u32,
                    timestamp,
                    tx_version: parsed.version,
                    locktime: tx.lock_time().unwrap_or(0),
                    size: parsed.len as u64,
                    vsize: parsed.len as u64,
                    input_count: tx.inputs().len() as u32,
                    output_count: tx.outputs().len() as u32,
                    input_total,
                    output_total,
                    fee,
                    is_coinbase: u8::from(is_coinbase),
                    is_fluxnode_tx: u8::from(parsed.node_op.is_some()),
                    fluxnode_type: parsed.node_op.map(|kind| kind.n_type()),
                    is_shielded: u8::from(tx.is_shielded()),
                    is_valid: 1,
                    row_version: version,
                });
                if is_coinbase {
                    coinbase_row = Some(tx_rows.len() - 1);
                }
            }

            // The coinbase transaction's fee records the sum of the other
            // fees in its block.
            if let Some(index) = coinbase_row {
                tx_rows[index].fee = total_fees;
            }

            // UTXO count deltas for the summary table.
            for row in utxo_creations
                .iter()
                .filter(|row| row.block_height == height && row.address != NO_ADDRESS)
            {
                if let Some(delta) = deltas.get_mut(&row.address) {
                    delta.unspent_delta += 1;
                }
            }
            for row in utxo_spends
                .iter()
                .filter(|row| row.spent_block_height == Some(height) && row.address != NO_ADDRESS)
            {
                if let Some(delta) = deltas.get_mut(&row.address) {
                    delta.unspent_delta -= 1;
                }
            }

            let snapshot = self
                .supply
                .advance(
                    &self.store,
                    height,
                    SupplyDelta {
                        coinbase_outputs,
                        total_fees,
                        shielded_change,
                    },
                )
                .await?;
            supply_rows.push(SupplyStatRow {
                block_height: height,
                timestamp,
                transparent_supply: snapshot.transparent,
                shielded_pool: snapshot.shielded,
                total_supply: snapshot.total(),
                is_valid: 1,
                row_version: version,
            });

            let producer = block.header.producer().map(display_outpoint);
            let producer_reward = match (&producer, block.coinbase()) {
                (Some(_), Some(coinbase)) => coinbase
                    .transaction
                    .outputs()
                    .first()
                    .map(|output: &Output| output.value.units()),
                _ => None,
            };
            if let Some(fluxnode) = &producer {
                producer_rows.push(ProducerDeltaRow {
                    fluxnode: fluxnode.clone(),
                    blocks_delta: 1,
                    first_block: height,
                    last_block: height,
                    rewards_delta: producer_reward.unwrap_or(0),
                    row_version: version,
                });
            }

            block_rows.push(BlockRow {
                height,
                hash: block_hash,
                prev_hash: block.header.previous_block_hash.to_string(),
                merkle_root: fluxscan_chain::serialization::hex_display(&block.header.merkle_root),
                timestamp,
                block_version: block.header.version,
                size: prepared.raw.len() as u64,
                tx_count: block.transactions.len() as u32,
                producer,
                producer_reward,
                difficulty: prepared.difficulty,
                chainwork: prepared.chainwork.clone(),
                is_valid: 1,
                row_version: version,
            });

            metrics::counter!("indexer.committed.block.count", 1);
            metrics::gauge!("indexer.committed.block.height", height as f64);
        }

        // Write the streams in dashboard-consistent order: creations land
        // before the spends that reference them.
        let mut insert_time = Duration::ZERO;
        insert_time += self.store.insert_blocks(&block_rows, mode).await?.elapsed;
        insert_time += self.store.insert_transactions(&tx_rows, mode).await?.elapsed;
        insert_time += self.store.insert_fluxnodes(&fluxnode_rows, mode).await?.elapsed;
        insert_time += self.store.insert_utxos(&utxo_creations, mode).await?.elapsed;
        insert_time += self.store.insert_utxos(&utxo_spends, mode).await?.elapsed;
        insert_time += self
            .store
            .insert_address_txs(&address_tx_rows, mode)
            .await?
            .elapsed;
        let delta_rows: Vec<AddressDeltaRow> = deltas.into_values().collect();
        insert_time += self
            .store
            .insert_address_deltas(&delta_rows, mode)
            .await?
            .elapsed;
        insert_time += self.store.insert_supply_stats(&supply_rows, mode).await?.elapsed;
        insert_time += self
            .store
            .insert_producer_deltas(&producer_rows, mode)
            .await?
            .elapsed;

        // Spent entries leave the cache now that their spends are written.
        for outpoint in &spent_outpoints {
            self.cache.remove(outpoint);
        }

        debug!(
            blocks = blocks.len(),
            transactions = tx_rows.len(),
            utxos = utxo_creations.len(),
            spends = utxo_spends.len(),
            ?insert_time,
            "batch indexed"
        );

        Ok(BatchOutcome {
            blocks_indexed: blocks.len(),
            last_height: last.height.0,
            last_hash: last.block.hash.to_string(),
            insert_time,
            missing_utxos,
        })
    }

    /// Build the per-batch output map and accumulate the entries into the
    /// cross-batch cache.
    fn build_output_map(&mut self, blocks: &[PreparedBlock]) -> HashMap<OutPoint, UtxoEntry> {
        let mut map = HashMap::new();
        for prepared in blocks {
            for parsed in &prepared.block.transactions {
                for (vout, output) in parsed.transaction.outputs().iter().enumerate() {
                    let outpoint = OutPoint {
                        hash: parsed.txid,
                        index: vout as u32,
                    };
                    let entry = self.utxo_entry(output, prepared.height.0);
                    self.cache.insert(outpoint, entry.clone());
                    map.insert(outpoint, entry);
                }
            }
        }
        map
    }

    /// Resolve all referenced outpoints with the strict precedence:
    /// current batch, then cross-batch cache, then the store. Unresolved
    /// outpoints are counted and logged, never fatal; the downstream
    /// consistency check detects the damage and schedules a rebuild.
    async fn resolve_inputs(
        &mut self,
        blocks: &[PreparedBlock],
        batch_map: &HashMap<OutPoint, UtxoEntry>,
    ) -> Result<(HashMap<OutPoint, UtxoEntry>, u64), IndexError> {
        let mut needed: Vec<OutPoint> = Vec::new();
        let mut seen: HashSet<OutPoint> = HashSet::new();

        for prepared in blocks {
            for parsed in &prepared.block.transactions {
                for input in parsed.transaction.inputs() {
                    if let Some(outpoint) = input.outpoint() {
                        if seen.insert(outpoint) {
                            needed.push(outpoint);
                        }
                    }
                }
                // START collaterals resolve through the same path so the
                // tier can be recognized from the collateral value.
                if let Transaction::NodeStart(start) = &parsed.transaction {
                    if seen.insert(start.collateral) {
                        needed.push(start.collateral);
                    }
                }
            }
        }

        let mut resolved: HashMap<OutPoint, UtxoEntry> = HashMap::new();
        let mut store_lookups: Vec<OutPoint> = Vec::new();

        for outpoint in needed {
            if let Some(entry) = batch_map.get(&outpoint) {
                resolved.insert(outpoint, entry.clone());
            } else if let Some(entry) = self.cache.get(&outpoint) {
                resolved.insert(outpoint, entry);
            } else {
                store_lookups.push(outpoint);
            }
        }

        if !store_lookups.is_empty() {
            let keys: Vec<(String, u32)> = store_lookups
                .iter()
                .map(|outpoint| (outpoint.hash.to_string(), outpoint.index))
                .collect();
            let rows = self.store.lookup_utxos(&keys).await?;
            for row in rows {
                let Ok(hash) = row.txid.parse::<transaction::Hash>() else {
                    continue;
                };
                resolved.insert(
                    OutPoint {
                        hash,
                        index: row.vout,
                    },
                    UtxoEntry {
                        address: row.address,
                        value: row.value,
                        script_pubkey: row.script_pubkey,
                        script_type: row.script_type,
                        block_height: row.block_height,
                    },
                );
            }
        }

        let missing = store_lookups
            .iter()
            .filter(|outpoint| !resolved.contains_key(outpoint))
            .count() as u64;
        if missing > 0 {
            warn!(
                missing,
                "inputs referenced UTXOs that could not be resolved; \
                 address summaries will be reconciled by the consistency check"
            );
            metrics::counter!("indexer.missing_utxos", missing);
        }

        Ok((resolved, missing))
    }

    /// The store-facing attributes of one transaction output.
    fn utxo_entry(&self, output: &Output, height: u32) -> UtxoEntry {
        let script_type = output.lock_script.script_type();
        let address = output
            .lock_script
            .address(self.params.network)
            .map(|address| address.to_string())
            .unwrap_or_else(|| NO_ADDRESS.to_string());
        // Reconstructible scripts store empty hex; address + type
        // regenerate them on read.
        let script_pubkey = if script_type.is_reconstructible() {
            String::new()
        } else {
            hex::encode(&output.lock_script.0)
        };
        UtxoEntry {
            address,
            value: output.value.units(),
            script_pubkey,
            script_type: script_type.as_str().to_string(),
            block_height: height,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fluxnode_row(
        &self,
        tx: &Transaction,
        txid: &str,
        height: u32,
        tx_index: u32,
        timestamp: u32,
        resolved: &HashMap<OutPoint, UtxoEntry>,
        version: u64,
    ) -> Option<FluxnodeRow> {
        match tx {
            Transaction::NodeStart(start) => {
                // Tier from the collateral value, when the collateral
                // UTXO resolved.
                let tier = resolved
                    .get(&start.collateral)
                    .and_then(|entry| {
                        Tier::from_collateral(fluxscan_chain::Amount::from_units(entry.value))
                    })
                    .map(|tier| tier.as_str().to_string());
                Some(FluxnodeRow {
                    txid: txid.to_string(),
                    block_height: height,
                    tx_index,
                    timestamp,
                    kind: "start".to_string(),
                    collateral_txid: start.collateral.hash.to_string(),
                    collateral_index: start.collateral.index,
                    tier,
                    ip: None,
                    sig_time: start.sig_time,
                    update_type: None,
                    benchmark_tier: None,
                    is_valid: 1,
                    row_version: version,
                })
            }
            Transaction::NodeConfirm(confirm) => Some(FluxnodeRow {
                txid: txid.to_string(),
                block_height: height,
                tx_index,
                timestamp,
                kind: "confirm".to_string(),
                collateral_txid: confirm.collateral.hash.to_string(),
                collateral_index: confirm.collateral.index,
                tier: Tier::from_benchmark_code(confirm.benchmark_tier)
                    .map(|tier| tier.as_str().to_string()),
                ip: Some(confirm.ip.clone()),
                sig_time: confirm.sig_time,
                update_type: Some(confirm.update_type),
                benchmark_tier: Some(confirm.benchmark_tier),
                is_valid: 1,
                row_version: version,
            }),
            _ => None,
        }
    }
}

/// Render an outpoint as `txid:index` display hex.
pub fn display_outpoint(outpoint: OutPoint) -> String {
    format!("{}:{}", outpoint.hash, outpoint.index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_outpoint_is_txid_colon_index() {
        let outpoint = OutPoint {
            hash: fluxscan_chain::transaction::Hash([0u8; 32]),
            index: 3,
        };
        let display = display_outpoint(outpoint);
        assert!(display.ends_with(":3"));
        assert_eq!(display.len(), 64 + 2);
    }
}
