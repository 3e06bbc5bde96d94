//! Writer adapters for the five record streams.
//!
//! [`IndexStore`] is the full store surface the batch indexer and reorg
//! controller drive: per-stream inserts in two visibility modes, the read
//! paths used for input resolution and recovery, and the bulk `is_valid`
//! flips. [`HttpStore`] implements it against the real store; tests
//! substitute an in-memory implementation.

use crate::{
    client::{InsertMode, InsertStats, StoreClient, StoreError},
    ddl::tables,
    rows::{
        AddressDeltaRow, AddressTxRow, BlockRow, FluxnodeRow, ProducerDeltaRow, ReorgRow,
        SupplyStatRow, SyncStateRow, TransactionRow, UtxoRow,
    },
};

/// The store surface the ingestion pipeline drives.
///
/// Writes are additive: superseding rows and `is_valid` flips stand in
/// for deletion, so replaying a batch is harmless. Within a batch the
/// caller writes UTXO creations before spends, so a reader that catches
/// the writes mid-batch never sees a spend of a missing output.
#[allow(async_fn_in_trait)]
pub trait IndexStore {
    async fn insert_blocks(
        &self,
        rows: &[BlockRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError>;

    async fn insert_transactions(
        &self,
        rows: &[TransactionRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError>;

    async fn insert_fluxnodes(
        &self,
        rows: &[FluxnodeRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError>;

    /// UTXO creations, and the superseding rows for spends, restores and
    /// reorg removals.
    async fn insert_utxos(
        &self,
        rows: &[UtxoRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError>;

    async fn insert_address_txs(
        &self,
        rows: &[AddressTxRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError>;

    async fn insert_address_deltas(
        &self,
        rows: &[AddressDeltaRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError>;

    async fn insert_supply_stats(
        &self,
        rows: &[SupplyStatRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError>;

    async fn insert_producer_deltas(
        &self,
        rows: &[ProducerDeltaRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError>;

    async fn insert_reorg(&self, row: &ReorgRow) -> Result<(), StoreError>;

    /// Replace the singleton sync-state row.
    async fn write_sync_state(&self, row: &SyncStateRow) -> Result<(), StoreError>;

    async fn read_sync_state(&self) -> Result<Option<SyncStateRow>, StoreError>;

    /// Resolve outpoints against the store; the last stop after the
    /// per-batch map and the cross-batch cache. Display-hex txids.
    async fn lookup_utxos(
        &self,
        outpoints: &[(String, u32)],
    ) -> Result<Vec<UtxoRow>, StoreError>;

    /// The supply snapshot at exactly `height`, if present and valid.
    async fn supply_at(&self, height: u32) -> Result<Option<SupplyStatRow>, StoreError>;

    /// The stored block hash at `height`, for divergence checks.
    async fn block_hash_at(&self, height: u32) -> Result<Option<String>, StoreError>;

    /// Unspent UTXO rows created at or above `height` (reorg removal set).
    async fn utxos_created_from(&self, height: u32) -> Result<Vec<UtxoRow>, StoreError>;

    /// UTXO rows spent at or above `height` (reorg restore set).
    async fn utxos_spent_from(&self, height: u32) -> Result<Vec<UtxoRow>, StoreError>;

    /// Flip `is_valid = 0` on every row at or above `height` in the
    /// height-keyed tables, waiting for the mutations to apply.
    async fn invalidate_from(&self, height: u32) -> Result<(), StoreError>;
}

/// The production [`IndexStore`] backed by the columnar store's HTTP
/// interface.
#[derive(Clone, Debug)]
pub struct HttpStore {
    client: StoreClient,
}

impl HttpStore {
    pub fn new(client: StoreClient) -> Self {
        HttpStore { client }
    }

    pub fn client(&self) -> &StoreClient {
        &self.client
    }

    /// Create the database and every table.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for sql in crate::ddl::all(self.client.database()) {
            self.client.execute(&sql).await?;
        }
        Ok(())
    }
}

impl IndexStore for HttpStore {
    async fn insert_blocks(
        &self,
        rows: &[BlockRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.client.insert_rows(tables::BLOCKS, rows, mode).await
    }

    async fn insert_transactions(
        &self,
        rows: &[TransactionRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.client
            .insert_rows(tables::TRANSACTIONS, rows, mode)
            .await
    }

    async fn insert_fluxnodes(
        &self,
        rows: &[FluxnodeRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.client.insert_rows(tables::FLUXNODES, rows, mode).await
    }

    async fn insert_utxos(
        &self,
        rows: &[UtxoRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.client.insert_rows(tables::UTXOS, rows, mode).await
    }

    async fn insert_address_txs(
        &self,
        rows: &[AddressTxRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.client
            .insert_rows(tables::ADDRESS_TRANSACTIONS, rows, mode)
            .await
    }

    async fn insert_address_deltas(
        &self,
        rows: &[AddressDeltaRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.client
            .insert_rows(tables::ADDRESS_SUMMARY, rows, mode)
            .await
    }

    async fn insert_supply_stats(
        &self,
        rows: &[SupplyStatRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.client
            .insert_rows(tables::SUPPLY_STATS, rows, mode)
            .await
    }

    async fn insert_producer_deltas(
        &self,
        rows: &[ProducerDeltaRow],
        mode: InsertMode,
    ) -> Result<InsertStats, StoreError> {
        self.client.insert_rows(tables::PRODUCERS, rows, mode).await
    }

    async fn insert_reorg(&self, row: &ReorgRow) -> Result<(), StoreError> {
        self.client
            .insert_rows(tables::REORGS, std::slice::from_ref(row), InsertMode::Sync)
            .await?;
        Ok(())
    }

    async fn write_sync_state(&self, row: &SyncStateRow) -> Result<(), StoreError> {
        self.client
            .insert_rows(
                tables::SYNC_STATE,
                std::slice::from_ref(row),
                InsertMode::Sync,
            )
            .await?;
        Ok(())
    }

    async fn read_sync_state(&self) -> Result<Option<SyncStateRow>, StoreError> {
        let db = self.client.database();
        let rows: Vec<SyncStateRow> = self
            .client
            .query_json(&format!(
                "SELECT * FROM {db}.sync_state FINAL WHERE id = 1 LIMIT 1"
            ))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn lookup_utxos(
        &self,
        outpoints: &[(String, u32)],
    ) -> Result<Vec<UtxoRow>, StoreError> {
        if outpoints.is_empty() {
            return Ok(Vec::new());
        }

        let db = self.client.database();
        let tuples = outpoints
            .iter()
            .map(|(txid, vout)| format!("('{txid}', {vout})"))
            .collect::<Vec<_>>()
            .join(", ");

        self.client
            .query_json(&format!(
                "SELECT * FROM {db}.utxos FINAL WHERE (txid, vout) IN ({tuples})"
            ))
            .await
    }

    async fn supply_at(&self, height: u32) -> Result<Option<SupplyStatRow>, StoreError> {
        let db = self.client.database();
        let rows: Vec<SupplyStatRow> = self
            .client
            .query_json(&format!(
                "SELECT * FROM {db}.supply_stats FINAL \
                 WHERE block_height = {height} AND is_valid = 1 LIMIT 1"
            ))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn block_hash_at(&self, height: u32) -> Result<Option<String>, StoreError> {
        #[derive(serde::Deserialize)]
        struct HashRow {
            hash: String,
        }

        let db = self.client.database();
        let rows: Vec<HashRow> = self
            .client
            .query_json(&format!(
                "SELECT hash FROM {db}.blocks FINAL \
                 WHERE height = {height} AND is_valid = 1 LIMIT 1"
            ))
            .await?;
        Ok(rows.into_iter().next().map(|row| row.hash))
    }

    async fn utxos_created_from(&self, height: u32) -> Result<Vec<UtxoRow>, StoreError> {
        let db = self.client.database();
        self.client
            .query_json(&format!(
                "SELECT * FROM {db}.utxos FINAL WHERE block_height >= {height}"
            ))
            .await
    }

    async fn utxos_spent_from(&self, height: u32) -> Result<Vec<UtxoRow>, StoreError> {
        let db = self.client.database();
        self.client
            .query_json(&format!(
                "SELECT * FROM {db}.utxos FINAL \
                 WHERE spent = 1 AND spent_block_height >= {height}"
            ))
            .await
    }

    async fn invalidate_from(&self, height: u32) -> Result<(), StoreError> {
        let db = self.client.database();

        self.client
            .execute_mutation(&format!(
                "ALTER TABLE {db}.blocks UPDATE is_valid = 0 WHERE height >= {height}"
            ))
            .await?;

        for table in [
            tables::TRANSACTIONS,
            tables::ADDRESS_TRANSACTIONS,
            tables::FLUXNODES,
            tables::SUPPLY_STATS,
        ] {
            self.client
                .execute_mutation(&format!(
                    "ALTER TABLE {db}.{table} UPDATE is_valid = 0 \
                     WHERE block_height >= {height}"
                ))
                .await?;
        }

        Ok(())
    }
}
