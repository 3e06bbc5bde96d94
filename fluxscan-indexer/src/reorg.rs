//! Chain reorganization handling.
//!
//! A reorg is not an error: the controller walks back to the common
//! ancestor, logs the event, logically invalidates everything above it,
//! repairs the UTXO set with superseding rows, and rewinds the sync
//! state so the loop re-ingests the canonical chain. Only a divergence
//! deeper than the configured bound halts ingestion.

use fluxscan_chain::parameters::NetworkParams;
use fluxscan_store::{
    row_version_now, IndexStore, ReorgRow, SyncStateRow, UtxoRow, REORG_REMOVED,
};
use tracing::{info, warn};

use crate::{error::IndexError, sync::ChainView};

/// What a handled reorg affected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReorgOutcome {
    pub common_ancestor: u32,
    /// First invalidated height.
    pub to_height: u32,
    /// The tip before the reorg.
    pub from_height: u32,
    pub blocks_affected: u32,
    /// Display hash of the common ancestor, the new sync anchor.
    pub ancestor_hash: String,
}

/// Exclusive owner of `is_valid` flips and UTXO restore rows.
pub struct ReorgController<S> {
    store: S,
    params: NetworkParams,
}

impl<S: IndexStore> ReorgController<S> {
    pub fn new(store: S, params: NetworkParams) -> Self {
        ReorgController { store, params }
    }

    /// Walk back from `current_height` until the stored chain and the
    /// live chain agree, then invalidate and repair everything above the
    /// agreement point.
    ///
    /// The caller must clear the indexer's cross-batch state afterwards;
    /// cached UTXOs above the fork would resurrect invalidated outputs.
    pub async fn handle<C: ChainView>(
        &self,
        chain: &C,
        current_height: u32,
    ) -> Result<ReorgOutcome, IndexError> {
        let max_depth = self.params.max_reorg_depth(current_height);

        let old_hash = self
            .store
            .block_hash_at(current_height)
            .await?
            .unwrap_or_default();
        let new_hash = chain.block_hash(current_height).await?;

        // Find the common ancestor.
        let mut height = current_height;
        let (ancestor, ancestor_hash) = loop {
            if current_height - height > max_depth {
                warn!(
                    from_height = current_height,
                    max_depth, "reorg walk-back exceeded the safety bound"
                );
                return Err(IndexError::ReorgTooDeep {
                    from_height: current_height,
                    max_depth,
                });
            }

            let live = chain.block_hash(height).await?;
            match self.store.block_hash_at(height).await? {
                Some(stored) if stored == live => break (height, live),
                _ if height == 0 => {
                    return Err(IndexError::ReorgTooDeep {
                        from_height: current_height,
                        max_depth,
                    })
                }
                _ => height -= 1,
            }
        };

        let to_height = ancestor + 1;
        let blocks_affected = current_height - ancestor;
        info!(
            common_ancestor = ancestor,
            to_height,
            from_height = current_height,
            blocks_affected,
            "handling chain reorganization"
        );
        metrics::counter!("indexer.reorgs", 1);

        let version = row_version_now();
        let now = chrono::Utc::now().timestamp() as u32;

        // Record the event first so a crash mid-repair is diagnosable.
        self.store
            .insert_reorg(&ReorgRow {
                id: version,
                from_height: current_height,
                to_height,
                common_ancestor: ancestor,
                old_hash,
                new_hash,
                blocks_affected,
                occurred_at: now,
                row_version: version,
            })
            .await?;

        self.store.invalidate_from(to_height).await?;
        self.repair_utxos(to_height, version).await?;

        // Rewind the sync anchor; the loop resumes from ancestor + 1.
        let chain_height = chain.chain_height().await?;
        self.store
            .write_sync_state(&SyncStateRow {
                id: 1,
                current_height: ancestor,
                chain_height,
                sync_percentage: progress(ancestor, chain_height),
                last_block_hash: ancestor_hash.clone(),
                is_syncing: 1,
                blocks_per_second: 0.0,
                row_version: version,
            })
            .await?;

        Ok(ReorgOutcome {
            common_ancestor: ancestor,
            to_height,
            from_height: current_height,
            blocks_affected,
            ancestor_hash,
        })
    }

    /// Remove UTXOs created above the fork and restore the ones spent
    /// above it.
    async fn repair_utxos(&self, to_height: u32, version: u64) -> Result<(), IndexError> {
        // Created above the fork: supersede with a zero-value marker row.
        let created = self.store.utxos_created_from(to_height).await?;
        let removals: Vec<UtxoRow> = created
            .into_iter()
            .map(|row| UtxoRow {
                value: 0,
                script_pubkey: String::new(),
                script_type: REORG_REMOVED.to_string(),
                spent: 0,
                spent_txid: None,
                spent_block_height: None,
                row_version: version,
                ..row
            })
            .collect();

        // Spent above the fork but created below it: restore as unspent
        // with the original attributes. Outputs both created and spent
        // above the fork already got a removal row.
        let spent = self.store.utxos_spent_from(to_height).await?;
        let restores: Vec<UtxoRow> = spent
            .into_iter()
            .filter(|row| row.block_height < to_height)
            .map(|row| UtxoRow {
                spent: 0,
                spent_txid: None,
                spent_block_height: None,
                row_version: version,
                ..row
            })
            .collect();

        info!(
            removed = removals.len(),
            restored = restores.len(),
            "repairing utxo set after reorg"
        );

        self.store
            .insert_utxos(&removals, fluxscan_store::InsertMode::Sync)
            .await?;
        self.store
            .insert_utxos(&restores, fluxscan_store::InsertMode::Sync)
            .await?;
        Ok(())
    }
}

/// Sync percentage for the state row.
pub(crate) fn progress(current: u32, chain: u32) -> f64 {
    if chain == 0 {
        return 0.0;
    }
    (current as f64 / chain as f64) * 100.0
}
