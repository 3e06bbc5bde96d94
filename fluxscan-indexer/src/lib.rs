//! The stateful ingestion pipeline: batch indexer, cross-batch UTXO
//! cache, supply tracking, reorg handling, and the sync loop that drives
//! them.
//!
//! All mutable state — the UTXO cache, the supply pair, the sync anchor —
//! lives on the structs in this crate and is owned by the single sync
//! worker; there are no process-wide singletons.

pub mod error;
pub mod indexer;
pub mod reorg;
pub mod supply;
pub mod sync;
pub mod utxo_cache;

pub use error::IndexError;
pub use indexer::{BatchIndexer, BatchOutcome, PreparedBlock};
pub use reorg::{ReorgController, ReorgOutcome};
pub use supply::{SupplyDelta, SupplySnapshot, SupplyTracker};
pub use sync::{ChainView, SyncConfig, SyncLoop, TickOutcome};
pub use utxo_cache::{UtxoCache, UtxoEntry};
