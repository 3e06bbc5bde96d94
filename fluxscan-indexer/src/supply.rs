//! The running transparent-supply / shielded-pool pair.

use fluxscan_store::{IndexStore, StoreError};
use tracing::{error, info, warn};

/// One block's supply movement.
#[derive(Copy, Clone, Debug, Default)]
pub struct SupplyDelta {
    /// Total value of the coinbase transaction's outputs.
    pub coinbase_outputs: i64,
    /// Sum of non-coinbase fees in the block.
    pub total_fees: i64,
    /// Net value entering the shielded pool (negative when the pool pays
    /// out).
    pub shielded_change: i64,
}

/// The supply pair after applying one block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SupplySnapshot {
    pub height: u32,
    pub transparent: i64,
    pub shielded: i64,
}

impl SupplySnapshot {
    pub fn total(&self) -> i64 {
        self.transparent.saturating_add(self.shielded)
    }
}

/// Tracks `(last_supply_height, last_transparent, last_shielded)` across
/// batches.
///
/// The scalars live in memory and only fall back to a store read when the
/// expected previous height doesn't match: at start of run, after a gap,
/// or after a reorg reset.
#[derive(Debug, Default)]
pub struct SupplyTracker {
    state: Option<SupplySnapshot>,
}

impl SupplyTracker {
    pub fn new() -> Self {
        SupplyTracker { state: None }
    }

    /// Forget the in-memory pair, forcing a store re-read on next use.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Apply one block's delta and return the new pair.
    ///
    /// The transparent side moves by the coinbase outputs minus the fees
    /// they recirculate, minus whatever entered the shielded pool; the
    /// pool moves by the shielded change alone.
    pub async fn advance<S: IndexStore>(
        &mut self,
        store: &S,
        height: u32,
        delta: SupplyDelta,
    ) -> Result<SupplySnapshot, StoreError> {
        let previous = self.previous_for(store, height).await?;

        let transparent_delta = delta
            .coinbase_outputs
            .saturating_sub(delta.total_fees)
            .saturating_sub(delta.shielded_change);

        let transparent = match previous.transparent.checked_add(transparent_delta) {
            Some(value) => value,
            None => {
                error!(height, "transparent supply overflow, clamping");
                metrics::counter!("indexer.supply.overflow", 1);
                i64::MAX
            }
        };

        let shielded = match previous.shielded.checked_add(delta.shielded_change) {
            Some(value) if value >= 0 => value,
            Some(value) => {
                warn!(height, shielded = value, "shielded pool went negative, clamping to zero");
                0
            }
            None => {
                error!(height, "shielded pool overflow, clamping");
                metrics::counter!("indexer.supply.overflow", 1);
                i64::MAX
            }
        };

        let snapshot = SupplySnapshot {
            height,
            transparent,
            shielded,
        };
        self.state = Some(snapshot);
        Ok(snapshot)
    }

    /// The supply pair for `height - 1`, from memory when contiguous.
    async fn previous_for<S: IndexStore>(
        &mut self,
        store: &S,
        height: u32,
    ) -> Result<SupplySnapshot, StoreError> {
        if let Some(state) = self.state {
            if Some(state.height) == height.checked_sub(1) {
                return Ok(state);
            }
        }

        let previous_height = match height.checked_sub(1) {
            Some(previous_height) => previous_height,
            // Genesis builds on an empty ledger.
            None => {
                return Ok(SupplySnapshot {
                    height: 0,
                    transparent: 0,
                    shielded: 0,
                })
            }
        };

        info!(height, "re-reading supply state from store");
        let row = store.supply_at(previous_height).await?;
        Ok(match row {
            Some(row) => SupplySnapshot {
                height: row.block_height,
                transparent: row.transparent_supply,
                shielded: row.shielded_pool,
            },
            None => {
                // No snapshot below us: resyncing from genesis.
                warn!(
                    height,
                    "no supply snapshot at previous height, starting from zero"
                );
                SupplySnapshot {
                    height: previous_height,
                    transparent: 0,
                    shielded: 0,
                }
            }
        })
    }
}
