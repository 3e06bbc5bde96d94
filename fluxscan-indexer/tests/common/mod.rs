//! An in-memory store and chain fixture for indexer scenario tests.
//!
//! `MemoryStore` reproduces the analytics store's visible semantics:
//! append-only inserts, newest-version-wins merge per primary key (with
//! insertion order breaking ties, the way the real store's replacing
//! merge does), summing address deltas, and bulk `is_valid` flips.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fluxscan_indexer::{sync::ChainView, IndexError};
use fluxscan_store::{
    AddressDeltaRow, AddressTxRow, BlockRow, FluxnodeRow, IndexStore, InsertMode, InsertStats,
    ProducerDeltaRow, ReorgRow, StoreError, SupplyStatRow, SyncStateRow, TransactionRow, UtxoRow,
    REORG_REMOVED,
};

#[derive(Default)]
struct Inner {
    blocks: Vec<BlockRow>,
    transactions: Vec<TransactionRow>,
    fluxnodes: Vec<FluxnodeRow>,
    utxos: Vec<UtxoRow>,
    address_txs: Vec<AddressTxRow>,
    address_deltas: Vec<AddressDeltaRow>,
    supply: Vec<SupplyStatRow>,
    producers: Vec<ProducerDeltaRow>,
    reorgs: Vec<ReorgRow>,
    sync_state: Option<SyncStateRow>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn stats(rows: usize) -> InsertStats {
    InsertStats {
        rows,
        elapsed: std::time::Duration::ZERO,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The merged (newest version wins) UTXO view.
    pub fn merged_utxos(&self) -> HashMap<(String, u32), UtxoRow> {
        let inner = self.inner.lock().unwrap();
        let mut merged: HashMap<(String, u32), UtxoRow> = HashMap::new();
        for row in &inner.utxos {
            let key = (row.txid.clone(), row.vout);
            match merged.get(&key) {
                Some(existing) if existing.row_version > row.row_version => {}
                _ => {
                    merged.insert(key, row.clone());
                }
            }
        }
        merged
    }

    /// The reconciled view of an address's summary deltas:
    /// (balance, received, sent, tx_count, unspent_count).
    ///
    /// Deltas first merge by `(address, batch_start_height)` with the
    /// newest version winning (so a replayed batch counts once), then
    /// sum.
    pub fn address_summary(&self, address: &str) -> (i64, i64, i64, u64, i64) {
        let inner = self.inner.lock().unwrap();
        let mut merged: HashMap<u32, &AddressDeltaRow> = HashMap::new();
        for delta in inner
            .address_deltas
            .iter()
            .filter(|delta| delta.address == address)
        {
            match merged.get(&delta.batch_start_height) {
                Some(existing) if existing.row_version > delta.row_version => {}
                _ => {
                    merged.insert(delta.batch_start_height, delta);
                }
            }
        }

        let mut summary = (0i64, 0i64, 0i64, 0u64, 0i64);
        for delta in merged.values() {
            summary.0 += delta.balance_delta;
            summary.1 += delta.received_delta;
            summary.2 += delta.sent_delta;
            summary.3 += delta.tx_count_delta;
            summary.4 += delta.unspent_delta;
        }
        summary
    }

    /// The latest valid supply snapshot at `height`.
    pub fn supply(&self, height: u32) -> Option<SupplyStatRow> {
        let inner = self.inner.lock().unwrap();
        inner
            .supply
            .iter()
            .filter(|row| row.block_height == height && row.is_valid == 1)
            .max_by_key(|row| row.row_version)
            .cloned()
    }

    pub fn tx(&self, txid: &str) -> Option<TransactionRow> {
        let inner = self.inner.lock().unwrap();
        inner
            .transactions
            .iter()
            .filter(|row| row.txid == txid)
            .max_by_key(|row| row.row_version)
            .cloned()
    }

    /// Count of valid transaction rows at `height` in the merged view.
    pub fn valid_tx_count(&self, height: u32) -> usize {
        let inner = self.inner.lock().unwrap();
        let mut merged: HashMap<String, &TransactionRow> = HashMap::new();
        for row in inner
            .transactions
            .iter()
            .filter(|row| row.block_height == height)
        {
            match merged.get(row.txid.as_str()) {
                Some(existing) if existing.row_version > row.row_version => {}
                _ => {
                    merged.insert(row.txid.clone(), row);
                }
            }
        }
        merged.values().filter(|row| row.is_valid == 1).count()
    }

    pub fn reorgs(&self) -> Vec<ReorgRow> {
        self.inner.lock().unwrap().reorgs.clone()
    }

    pub fn sync_state(&self) -> Option<SyncStateRow> {
        self.inner.lock().unwrap().sync_state.clone()
    }

    pub fn fluxnode_rows(&self) -> Vec<FluxnodeRow> {
        self.inner.lock().unwrap().fluxnodes.clone()
    }

    pub fn producer_rows(&self) -> Vec<ProducerDeltaRow> {
        self.inner.lock().unwrap().producers.clone()
    }

    pub fn block_at(&self, height: u32) -> Option<BlockRow> {
        let inner = self.inner.lock().unwrap();
        inner
            .blocks
            .iter()
            .filter(|row| row.height == height)
            .max_by_key(|row| row.row_version)
            .cloned()
    }
}

impl IndexStore for MemoryStore {
    async fn insert_blocks(
        &self,
        rows: &[BlockRow],
        _mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.inner.lock().unwrap().blocks.extend_from_slice(rows);
        Ok(stats(rows.len()))
    }

    async fn insert_transactions(
        &self,
        rows: &[TransactionRow],
        _mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .extend_from_slice(rows);
        Ok(stats(rows.len()))
    }

    async fn insert_fluxnodes(
        &self,
        rows: &[FluxnodeRow],
        _mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.inner.lock().unwrap().fluxnodes.extend_from_slice(rows);
        Ok(stats(rows.len()))
    }

    async fn insert_utxos(
        &self,
        rows: &[UtxoRow],
        _mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.inner.lock().unwrap().utxos.extend_from_slice(rows);
        Ok(stats(rows.len()))
    }

    async fn insert_address_txs(
        &self,
        rows: &[AddressTxRow],
        _mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .address_txs
            .extend_from_slice(rows);
        Ok(stats(rows.len()))
    }

    async fn insert_address_deltas(
        &self,
        rows: &[AddressDeltaRow],
        _mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .address_deltas
            .extend_from_slice(rows);
        Ok(stats(rows.len()))
    }

    async fn insert_supply_stats(
        &self,
        rows: &[SupplyStatRow],
        _mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.inner.lock().unwrap().supply.extend_from_slice(rows);
        Ok(stats(rows.len()))
    }

    async fn insert_producer_deltas(
        &self,
        rows: &[ProducerDeltaRow],
        _mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.inner.lock().unwrap().producers.extend_from_slice(rows);
        Ok(stats(rows.len()))
    }

    async fn insert_reorg(&self, row: &ReorgRow) -> Result<(), StoreError> {
        self.inner.lock().unwrap().reorgs.push(row.clone());
        Ok(())
    }

    async fn write_sync_state(&self, row: &SyncStateRow) -> Result<(), StoreError> {
        self.inner.lock().unwrap().sync_state = Some(row.clone());
        Ok(())
    }

    async fn read_sync_state(&self) -> Result<Option<SyncStateRow>, StoreError> {
        Ok(self.inner.lock().unwrap().sync_state.clone())
    }

    async fn lookup_utxos(
        &self,
        outpoints: &[(String, u32)],
    ) -> Result<Vec<UtxoRow>, StoreError> {
        let merged = self.merged_utxos();
        Ok(outpoints
            .iter()
            .filter_map(|key| merged.get(key))
            .filter(|row| row.script_type != REORG_REMOVED)
            .cloned()
            .collect())
    }

    async fn supply_at(&self, height: u32) -> Result<Option<SupplyStatRow>, StoreError> {
        Ok(self.supply(height))
    }

    async fn block_hash_at(&self, height: u32) -> Result<Option<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .blocks
            .iter()
            .filter(|row| row.height == height && row.is_valid == 1)
            .max_by_key(|row| row.row_version)
            .map(|row| row.hash.clone()))
    }

    async fn utxos_created_from(&self, height: u32) -> Result<Vec<UtxoRow>, StoreError> {
        Ok(self
            .merged_utxos()
            .into_values()
            .filter(|row| row.block_height >= height && row.script_type != REORG_REMOVED)
            .collect())
    }

    async fn utxos_spent_from(&self, height: u32) -> Result<Vec<UtxoRow>, StoreError> {
        Ok(self
            .merged_utxos()
            .into_values()
            .filter(|row| {
                row.spent == 1
                    && row.spent_block_height.map(|h| h >= height).unwrap_or(false)
                    && row.script_type != REORG_REMOVED
            })
            .collect())
    }

    async fn invalidate_from(&self, height: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for row in inner.blocks.iter_mut().filter(|row| row.height >= height) {
            row.is_valid = 0;
        }
        for row in inner
            .transactions
            .iter_mut()
            .filter(|row| row.block_height >= height)
        {
            row.is_valid = 0;
        }
        for row in inner
            .address_txs
            .iter_mut()
            .filter(|row| row.block_height >= height)
        {
            row.is_valid = 0;
        }
        for row in inner
            .fluxnodes
            .iter_mut()
            .filter(|row| row.block_height >= height)
        {
            row.is_valid = 0;
        }
        for row in inner
            .supply
            .iter_mut()
            .filter(|row| row.block_height >= height)
        {
            row.is_valid = 0;
        }
        Ok(())
    }
}

/// A scripted live chain for reorg tests.
#[derive(Clone, Default)]
pub struct MockChain {
    hashes: Arc<Mutex<HashMap<u32, String>>>,
    height: Arc<Mutex<u32>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hash(&self, height: u32, hash: String) {
        self.hashes.lock().unwrap().insert(height, hash);
        let mut tip = self.height.lock().unwrap();
        *tip = (*tip).max(height);
    }
}

impl ChainView for MockChain {
    async fn block_hash(&self, height: u32) -> Result<String, IndexError> {
        Ok(self
            .hashes
            .lock()
            .unwrap()
            .get(&height)
            .unwrap_or_else(|| panic!("test chain has no hash at height {height}"))
            .clone())
    }

    async fn chain_height(&self) -> Result<u32, IndexError> {
        Ok(*self.height.lock().unwrap())
    }
}
