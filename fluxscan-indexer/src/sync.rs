//! The sync loop: a single cooperative worker driving the batch indexer
//! by block range.
//!
//! Each tick asks the daemon for the next range, prepares the blocks with
//! bounded-parallel fetches, checks the chain tail for divergence, feeds
//! the batch to the indexer, and advances the sync state. The sync-state
//! write is the last write of a tick, so readers can use it as the
//! high-water mark.

use std::time::{Duration, Instant};

use fluxscan_chain::{
    block::{Block, BlockParseError, Height},
    parameters::NetworkParams,
    serialization::ParseError,
};
use fluxscan_rpc::RpcClient;
use fluxscan_store::{row_version_now, IndexStore, InsertMode, SyncStateRow};
use futures::{StreamExt, TryStreamExt};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    error::IndexError,
    indexer::{BatchIndexer, BatchOutcome, PreparedBlock},
    reorg::{progress, ReorgController, ReorgOutcome},
};

/// A source of live-chain hashes; implemented by the RPC client and by
/// test fixtures.
#[allow(async_fn_in_trait)]
pub trait ChainView {
    async fn block_hash(&self, height: u32) -> Result<String, IndexError>;
    async fn chain_height(&self) -> Result<u32, IndexError>;
}

impl ChainView for RpcClient {
    async fn block_hash(&self, height: u32) -> Result<String, IndexError> {
        Ok(self.get_block_hash(height).await?)
    }

    async fn chain_height(&self) -> Result<u32, IndexError> {
        Ok(self.get_block_count().await? as u32)
    }
}

/// Sync loop settings.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Target blocks per batch; backpressure shrinks below this.
    pub batch_size: usize,
    /// Concurrent block fetches while preparing a batch.
    pub fetch_concurrency: usize,
    /// Switch to synchronous inserts within this many blocks of the tip.
    pub sync_mode_threshold: u32,
    /// Resync override: begin at this height instead of the stored state.
    pub start_height: Option<u32>,
    /// Idle wait once caught up with the chain tip.
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            batch_size: 100,
            fetch_concurrency: 15,
            sync_mode_threshold: 10,
            start_height: None,
            poll_interval: Duration::from_secs(15),
        }
    }
}

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing new; the loop should idle for a poll interval.
    CaughtUp { chain_height: u32 },
    Indexed(BatchOutcome),
    /// A divergence was handled; the next tick resumes above the fork.
    Reorged(ReorgOutcome),
}

/// The single worker that owns the indexer and its cross-batch state.
pub struct SyncLoop<S> {
    rpc: RpcClient,
    indexer: BatchIndexer<S>,
    reorg: ReorgController<S>,
    params: NetworkParams,
    config: SyncConfig,

    /// Highest fully indexed height, if any.
    current_height: Option<u32>,
    /// Display hash of the block at `current_height`.
    last_block_hash: String,
    /// Backpressure-adjusted batch target.
    target_batch: usize,
    blocks_per_second: f64,
    blocks_since_profile: u64,
}

/// A batch slower than this per store insert halves the next target.
const SLOW_INSERT: Duration = Duration::from_secs(10);

impl<S: IndexStore + Clone> SyncLoop<S> {
    /// Build a loop, restoring progress from the stored sync state unless
    /// a start-height override asks for a resync.
    pub async fn new(
        rpc: RpcClient,
        store: S,
        params: NetworkParams,
        config: SyncConfig,
    ) -> Result<Self, IndexError> {
        let indexer = BatchIndexer::new(store.clone(), params.clone());
        let reorg = ReorgController::new(store.clone(), params.clone());

        let (current_height, last_block_hash) = match config.start_height {
            Some(start) => match start.checked_sub(1) {
                Some(anchor) => {
                    let hash = rpc.get_block_hash(anchor).await?;
                    info!(start, "resyncing from configured start height");
                    (Some(anchor), hash)
                }
                None => (None, String::new()),
            },
            None => match store.read_sync_state().await? {
                Some(state) => {
                    info!(
                        current_height = state.current_height,
                        "resuming from stored sync state"
                    );
                    (Some(state.current_height), state.last_block_hash)
                }
                None => (None, String::new()),
            },
        };

        let target_batch = config.batch_size.max(1);
        Ok(SyncLoop {
            rpc,
            indexer,
            reorg,
            params,
            config,
            current_height,
            last_block_hash,
            target_batch,
            blocks_per_second: 0.0,
            blocks_since_profile: 0,
        })
    }

    pub fn current_height(&self) -> Option<u32> {
        self.current_height
    }

    /// Run until shutdown is signalled or a fatal error occurs.
    ///
    /// Transient failures back off and retry the same range (the store's
    /// merge semantics make the replay harmless); a persistent run of
    /// store failures is promoted to fatal.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), IndexError> {
        const MAX_CONSECUTIVE_FAILURES: u32 = 5;
        let mut consecutive_failures = 0u32;

        loop {
            if *shutdown.borrow() {
                info!("sync loop shutting down");
                return Ok(());
            }

            let outcome = tokio::select! {
                outcome = self.tick() => outcome,
                _ = shutdown.changed() => continue,
            };

            match outcome {
                Ok(TickOutcome::CaughtUp { chain_height }) => {
                    consecutive_failures = 0;
                    debug!(chain_height, "caught up with chain tip");
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Ok(TickOutcome::Indexed(outcome)) => {
                    consecutive_failures = 0;
                    debug!(
                        last_height = outcome.last_height,
                        blocks = outcome.blocks_indexed,
                        "batch complete"
                    );
                }
                Ok(TickOutcome::Reorged(outcome)) => {
                    consecutive_failures = 0;
                    info!(?outcome, "reorg handled, resuming above the fork");
                }
                Err(error) if error.is_fatal() => {
                    error!(%error, "fatal ingestion error, halting");
                    return Err(error);
                }
                Err(error) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        error!(%error, consecutive_failures, "persistent ingestion failure, halting");
                        return Err(error);
                    }
                    warn!(%error, consecutive_failures, "transient ingestion error, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
    }

    /// One loop iteration: fetch, divergence-check, index, advance.
    pub async fn tick(&mut self) -> Result<TickOutcome, IndexError> {
        let chain_height = self.rpc.chain_height().await?;
        let next = self.current_height.map(|h| h + 1).unwrap_or(0);

        if next > chain_height {
            self.write_sync_state(chain_height).await?;
            return Ok(TickOutcome::CaughtUp { chain_height });
        }

        let end = chain_height.min(next + self.target_batch as u32 - 1);
        let blocks = self.prepare_range(next, end).await?;

        // Divergence check before ingesting anything: the first new
        // block must extend the block we indexed last.
        if let Some(current) = self.current_height {
            let first = &blocks[0];
            let prev = first.block.header.previous_block_hash.to_string();
            if !self.last_block_hash.is_empty() && prev != self.last_block_hash {
                warn!(
                    height = first.height.0,
                    expected = %self.last_block_hash,
                    found = %prev,
                    "chain divergence detected"
                );
                let outcome = self.reorg.handle(&self.rpc, current).await?;
                self.indexer.reset();
                self.current_height = Some(outcome.common_ancestor);
                self.last_block_hash = outcome.ancestor_hash.clone();
                return Ok(TickOutcome::Reorged(outcome));
            }
        }

        let mode = if chain_height.saturating_sub(next) < self.config.sync_mode_threshold {
            InsertMode::Sync
        } else {
            InsertMode::Async
        };

        let started = Instant::now();
        let outcome = self.indexer.index_batch(&blocks, mode).await?;
        let elapsed = started.elapsed();

        self.current_height = Some(outcome.last_height);
        self.last_block_hash = outcome.last_hash.clone();
        self.adjust_rate(outcome.blocks_indexed, elapsed);
        self.adjust_backpressure(&outcome);
        self.profile(outcome.blocks_indexed);
        self.write_sync_state(chain_height).await?;

        Ok(TickOutcome::Indexed(outcome))
    }

    /// Fetch and parse a height range with bounded parallelism.
    ///
    /// Each block costs three daemon calls (hash, verbose form, raw hex);
    /// the RPC client retries transient failures internally.
    async fn prepare_range(&self, start: u32, end: u32) -> Result<Vec<PreparedBlock>, IndexError> {
        let heights: Vec<u32> = (start..=end).collect();
        futures::stream::iter(heights)
            .map(|height| self.prepare_block(height))
            .buffered(self.config.fetch_concurrency.max(1))
            .try_collect()
            .await
    }

    async fn prepare_block(&self, height: u32) -> Result<PreparedBlock, IndexError> {
        let hash = self.rpc.get_block_hash(height).await?;
        let verbose = self.rpc.get_block_verbose(&hash).await?;
        let raw_hex = self.rpc.get_block_raw(&hash).await?;

        let raw = hex::decode(&raw_hex).map_err(|_| {
            IndexError::Parse(BlockParseError {
                height: Some(Height(height)),
                source: ParseError::Malformed {
                    field: "block hex",
                    position: 0,
                    reason: "daemon returned non-hex block data",
                },
            })
        })?;

        let block = Block::parse(&raw, &self.params, Some(Height(height)))?;

        // The parsed hash must agree with the daemon before anything is
        // written under it.
        let parsed_hash = block.hash.to_string();
        if parsed_hash != hash {
            return Err(IndexError::HashMismatch {
                height,
                expected: hash,
                actual: parsed_hash,
            });
        }

        Ok(PreparedBlock {
            height: Height(height),
            block,
            raw,
            chainwork: verbose.chainwork,
            difficulty: verbose.difficulty,
        })
    }

    fn adjust_rate(&mut self, blocks: usize, elapsed: Duration) {
        if elapsed.is_zero() {
            return;
        }
        let instant_rate = blocks as f64 / elapsed.as_secs_f64();
        self.blocks_per_second = if self.blocks_per_second == 0.0 {
            instant_rate
        } else {
            self.blocks_per_second * 0.8 + instant_rate * 0.2
        };
    }

    /// Shrink the batch target when the store pushes back; recover
    /// gradually while it keeps up.
    fn adjust_backpressure(&mut self, outcome: &BatchOutcome) {
        if outcome.insert_time > SLOW_INSERT {
            let shrunk = (self.target_batch / 2).max(1);
            if shrunk < self.target_batch {
                warn!(
                    insert_time = ?outcome.insert_time,
                    target = shrunk,
                    "store is slow, shrinking batch target"
                );
                self.target_batch = shrunk;
            }
        } else if self.target_batch < self.config.batch_size {
            self.target_batch = (self.target_batch + self.target_batch / 10 + 1)
                .min(self.config.batch_size);
        }
    }

    /// Periodic memory and cache profile.
    fn profile(&mut self, blocks: usize) {
        self.blocks_since_profile += blocks as u64;
        if self.blocks_since_profile >= 100 {
            self.blocks_since_profile = 0;
            let cache = self.indexer.cache();
            info!(
                cache_entries = cache.len(),
                cache_hit_rate = format!("{:.1}%", cache.hit_rate() * 100.0),
                blocks_per_second = format!("{:.2}", self.blocks_per_second),
                "ingestion profile"
            );
            cache.record_metrics();
        }
    }

    /// The tick's final write: readers treat this row as the high-water
    /// mark.
    async fn write_sync_state(&self, chain_height: u32) -> Result<(), IndexError> {
        let current = match self.current_height {
            Some(current) => current,
            None => return Ok(()),
        };

        let is_syncing = current + 1 < chain_height;
        self.indexer
            .store()
            .write_sync_state(&SyncStateRow {
                id: 1,
                current_height: current,
                chain_height,
                sync_percentage: progress(current, chain_height),
                last_block_hash: self.last_block_hash.clone(),
                is_syncing: u8::from(is_syncing),
                blocks_per_second: self.blocks_per_second,
                row_version: row_version_now(),
            })
            .await?;
        Ok(())
    }
}
