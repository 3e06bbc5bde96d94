//! Table definitions for the analytics store.
//!
//! All tables are logically append-only. The replacing tables merge by
//! primary key with the newest `row_version` winning; the summing tables
//! accumulate per-batch deltas into running totals.

/// Table names, shared between the DDL and the writer adapters.
pub mod tables {
    pub const BLOCKS: &str = "blocks";
    pub const TRANSACTIONS: &str = "transactions";
    pub const UTXOS: &str = "utxos";
    pub const ADDRESS_TRANSACTIONS: &str = "address_transactions";
    pub const ADDRESS_SUMMARY: &str = "address_summary";
    pub const SUPPLY_STATS: &str = "supply_stats";
    pub const FLUXNODES: &str = "fluxnodes";
    pub const PRODUCERS: &str = "producers";
    pub const SYNC_STATE: &str = "sync_state";
    pub const REORGS: &str = "reorgs";
}

/// Every CREATE statement for `database`, creation-order safe.
pub fn all(database: &str) -> Vec<String> {
    vec![
        format!("CREATE DATABASE IF NOT EXISTS {database}"),
        blocks(database),
        transactions(database),
        utxos(database),
        address_transactions(database),
        address_summary(database),
        supply_stats(database),
        fluxnodes(database),
        producers(database),
        sync_state(database),
        reorgs(database),
    ]
}

fn blocks(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.blocks (
            height UInt32,
            hash FixedString(64),
            prev_hash FixedString(64),
            merkle_root FixedString(64),
            timestamp UInt32,
            block_version UInt32,
            size UInt64,
            tx_count UInt32,
            producer Nullable(String),
            producer_reward Nullable(Int64),
            difficulty Float64,
            chainwork String,
            is_valid UInt8,
            row_version UInt64
        )
        ENGINE = ReplacingMergeTree(row_version)
        PARTITION BY intDiv(height, 100000)
        ORDER BY height"
    )
}

fn transactions(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.transactions (
            txid FixedString(64),
            block_height UInt32,
            tx_index UInt32,
            timestamp UInt32,
            tx_version UInt32,
            locktime UInt32,
            size UInt64,
            vsize UInt64,
            input_count UInt32,
            output_count UInt32,
            input_total Int64,
            output_total Int64,
            fee Int64,
            is_coinbase UInt8,
            is_fluxnode_tx UInt8,
            fluxnode_type Nullable(UInt8),
            is_shielded UInt8,
            is_valid UInt8,
            row_version UInt64
        )
        ENGINE = ReplacingMergeTree(row_version)
        PARTITION BY intDiv(block_height, 100000)
        ORDER BY (block_height, tx_index, txid)"
    )
}

fn utxos(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.utxos (
            txid FixedString(64),
            vout UInt32,
            address String,
            value Int64,
            script_pubkey String,
            script_type LowCardinality(String),
            block_height UInt32,
            spent UInt8,
            spent_txid Nullable(FixedString(64)),
            spent_block_height Nullable(UInt32),
            row_version UInt64
        )
        ENGINE = ReplacingMergeTree(row_version)
        PARTITION BY intDiv(block_height, 100000)
        ORDER BY (txid, vout)"
    )
}

fn address_transactions(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.address_transactions (
            address String,
            block_height UInt32,
            tx_index UInt32,
            txid FixedString(64),
            block_hash FixedString(64),
            direction LowCardinality(String),
            received_value Int64,
            sent_value Int64,
            is_coinbase UInt8,
            is_valid UInt8,
            row_version UInt64
        )
        ENGINE = ReplacingMergeTree(row_version)
        PARTITION BY intDiv(block_height, 100000)
        ORDER BY (address, block_height DESC, tx_index, txid)"
    )
}

fn address_summary(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.address_summary (
            address String,
            batch_start_height UInt32,
            balance_delta Int64,
            tx_count_delta UInt64,
            received_delta Int64,
            sent_delta Int64,
            unspent_delta Int64,
            first_seen UInt32,
            last_activity UInt32,
            row_version UInt64
        )
        ENGINE = ReplacingMergeTree(row_version)
        ORDER BY (address, batch_start_height)"
    )
}

fn supply_stats(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.supply_stats (
            block_height UInt32,
            timestamp UInt32,
            transparent_supply Int64,
            shielded_pool Int64,
            total_supply Int64,
            is_valid UInt8,
            row_version UInt64
        )
        ENGINE = ReplacingMergeTree(row_version)
        PARTITION BY intDiv(block_height, 100000)
        ORDER BY block_height"
    )
}

fn fluxnodes(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.fluxnodes (
            txid FixedString(64),
            block_height UInt32,
            tx_index UInt32,
            timestamp UInt32,
            kind LowCardinality(String),
            collateral_txid FixedString(64),
            collateral_index UInt32,
            tier Nullable(String),
            ip Nullable(String),
            sig_time UInt32,
            update_type Nullable(Int8),
            benchmark_tier Nullable(Int8),
            is_valid UInt8,
            row_version UInt64
        )
        ENGINE = ReplacingMergeTree(row_version)
        PARTITION BY intDiv(block_height, 100000)
        ORDER BY (block_height, tx_index, txid)"
    )
}

fn producers(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.producers (
            fluxnode String,
            blocks_delta UInt64,
            first_block UInt32,
            last_block UInt32,
            rewards_delta Int64,
            row_version UInt64
        )
        ENGINE = ReplacingMergeTree(row_version)
        ORDER BY (fluxnode, first_block)"
    )
}

fn sync_state(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.sync_state (
            id UInt8,
            current_height UInt32,
            chain_height UInt32,
            sync_percentage Float64,
            last_block_hash FixedString(64),
            is_syncing UInt8,
            blocks_per_second Float64,
            row_version UInt64
        )
        ENGINE = ReplacingMergeTree(row_version)
        ORDER BY id"
    )
}

fn reorgs(db: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {db}.reorgs (
            id UInt64,
            from_height UInt32,
            to_height UInt32,
            common_ancestor UInt32,
            old_hash FixedString(64),
            new_hash FixedString(64),
            blocks_affected UInt32,
            occurred_at UInt32,
            row_version UInt64
        )
        ENGINE = MergeTree
        ORDER BY id"
    )
}
