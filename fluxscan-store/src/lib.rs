//! Row shapes, table definitions, and writer adapters for the columnar
//! analytics store.
//!
//! The store's merge semantics de-duplicate by primary key using the
//! monotonically increasing `row_version` column, which makes every
//! ingest path replayable: re-inserting a batch converges to the same
//! visible state.

pub mod client;
pub mod ddl;
pub mod rows;
pub mod writer;

pub use client::{InsertMode, InsertStats, StoreClient, StoreConfig, StoreError};
pub use rows::{
    row_version_now, AddressDeltaRow, AddressTxRow, BlockRow, FluxnodeRow, ProducerDeltaRow,
    ReorgRow, SupplyStatRow, SyncStateRow, TransactionRow, UtxoRow, NO_ADDRESS, REORG_REMOVED,
};
pub use writer::{HttpStore, IndexStore};
