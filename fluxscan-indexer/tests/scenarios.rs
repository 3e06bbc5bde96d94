//! End-to-end indexer scenarios over an in-memory store.

mod common;

use common::{MemoryStore, MockChain};

use fluxscan_chain::{
    amount::{Amount, COIN},
    block::{generate, Block, Height},
    parameters::NetworkParams,
    transaction::Hash as TxHash,
    transparent::OutPoint,
};
use fluxscan_indexer::{BatchIndexer, PreparedBlock, ReorgController};
use fluxscan_store::InsertMode;

fn params() -> NetworkParams {
    NetworkParams::mainnet()
}

fn prepare(height: u32, raw: Vec<u8>) -> PreparedBlock {
    let block = Block::parse(&raw, &params(), Some(Height(height))).unwrap();
    PreparedBlock {
        height: Height(height),
        block,
        raw,
        chainwork: "00".repeat(32),
        difficulty: 1.0,
    }
}

fn address_of(tag: u8) -> String {
    generate::p2pkh_script(tag)
        .address(fluxscan_chain::parameters::Network::Mainnet)
        .unwrap()
        .to_string()
}

fn indexer(store: &MemoryStore) -> BatchIndexer<MemoryStore> {
    BatchIndexer::new(store.clone(), params())
}

/// A block at height `h` with one coinbase paying address A value V:
/// supply moves by V, A's balance is V, and the coinbase UTXO is unspent.
#[tokio::test]
async fn single_coinbase_block() {
    fluxscan_test::init();

    let store = MemoryStore::new();
    let mut indexer = indexer(&store);

    let value = Amount::from_coins(150);
    let coinbase = generate::coinbase_tx(0, &[(value, generate::p2pkh_script(0xA1))]);
    let coinbase_txid = TxHash::of(&coinbase).to_string();
    let raw = generate::pow_block(fluxscan_chain::block::Hash([0; 32]), 1_600_000_000, 1, &[coinbase]);

    let outcome = indexer
        .index_batch(&[prepare(0, raw)], InsertMode::Sync)
        .await
        .unwrap();

    assert_eq!(outcome.blocks_indexed, 1);
    assert_eq!(outcome.missing_utxos, 0);

    let supply = store.supply(0).unwrap();
    assert_eq!(supply.transparent_supply, value.units());
    assert_eq!(supply.shielded_pool, 0);
    assert_eq!(supply.total_supply, value.units());

    let address = address_of(0xA1);
    let (balance, received, sent, tx_count, unspent) = store.address_summary(&address);
    assert_eq!(balance, value.units());
    assert_eq!(received, value.units());
    assert_eq!(sent, 0);
    assert_eq!(tx_count, 1);
    assert_eq!(unspent, 1);

    let utxos = store.merged_utxos();
    let row = &utxos[&(coinbase_txid.clone(), 0)];
    assert_eq!(row.value, value.units());
    assert_eq!(row.spent, 0);
    assert_eq!(row.address, address);
    // Reconstructible script types store an empty script.
    assert!(row.script_pubkey.is_empty());

    let coinbase_row = store.tx(&coinbase_txid).unwrap();
    assert_eq!(coinbase_row.is_coinbase, 1);
    assert_eq!(coinbase_row.fee, 0);
}

/// Same-batch create-and-spend: T1 pays A in one block, T2 spends
/// (T1, 0) to B in the next block of the same batch.
#[tokio::test]
async fn same_batch_create_and_spend() {
    fluxscan_test::init();

    let store = MemoryStore::new();
    let mut indexer = indexer(&store);

    // Batch one: a funding coinbase for X.
    let cb0 = generate::coinbase_tx(0, &[(Amount::from_coins(100), generate::p2pkh_script(0x10))]);
    let b0 = generate::pow_block(fluxscan_chain::block::Hash([0; 32]), 1_600_000_000, 1, &[cb0.clone()]);
    let h0 = Block::parse(&b0, &params(), Some(Height(0))).unwrap().hash;
    indexer
        .index_batch(&[prepare(0, b0)], InsertMode::Sync)
        .await
        .unwrap();

    // Batch two: T1 creates (T1, 0) at height 1, T2 spends it at height 2.
    let cb1 = generate::coinbase_tx(1, &[(Amount::from_coins(10), generate::p2pkh_script(0x20))]);
    let t1 = generate::transfer_tx(
        &[generate::outpoint_of(&cb0, 0)],
        &[(Amount::from_coins(100), generate::p2pkh_script(0xA1))],
    );
    let b1 = generate::pow_block(h0, 1_600_000_060, 2, &[cb1, t1.clone()]);
    let h1 = Block::parse(&b1, &params(), Some(Height(1))).unwrap().hash;

    let cb2 = generate::coinbase_tx(2, &[(Amount::from_coins(10), generate::p2pkh_script(0x21))]);
    let t2 = generate::transfer_tx(
        &[generate::outpoint_of(&t1, 0)],
        &[(Amount::from_coins(99), generate::p2pkh_script(0xB1))],
    );
    let t2_txid = TxHash::of(&t2).to_string();
    let b2 = generate::pow_block(h1, 1_600_000_120, 3, &[cb2, t2]);

    let outcome = indexer
        .index_batch(&[prepare(1, b1), prepare(2, b2)], InsertMode::Sync)
        .await
        .unwrap();
    assert_eq!(outcome.missing_utxos, 0);

    // A received and spent the full value in the batch.
    let (balance_a, received_a, sent_a, _, unspent_a) = store.address_summary(&address_of(0xA1));
    assert_eq!(balance_a, 0);
    assert_eq!(received_a, 100 * COIN);
    assert_eq!(sent_a, 100 * COIN);
    assert_eq!(unspent_a, 0);

    let (balance_b, ..) = store.address_summary(&address_of(0xB1));
    assert_eq!(balance_b, 99 * COIN);

    // (T1, 0) is superseded by a spend row pointing at T2.
    let t1_txid = TxHash::of(&t1).to_string();
    let row = &store.merged_utxos()[&(t1_txid, 0)];
    assert_eq!(row.spent, 1);
    assert_eq!(row.spent_block_height, Some(2));
    assert_eq!(row.spent_txid.as_deref(), Some(t2_txid.as_str()));

    // Fee accounting: T2 paid 1 coin, recorded on T2 and on block 2's
    // coinbase row.
    assert_eq!(store.tx(&t2_txid).unwrap().fee, COIN);

    // transparent_supply(2) = transparent_supply(1) - F + coinbase_outputs(2).
    let supply1 = store.supply(1).unwrap();
    let supply2 = store.supply(2).unwrap();
    assert_eq!(supply1.transparent_supply, 110 * COIN);
    assert_eq!(
        supply2.transparent_supply,
        supply1.transparent_supply - COIN + 10 * COIN
    );

    // The transparent supply equals the sum of all unspent values.
    let unspent_total: i64 = store
        .merged_utxos()
        .values()
        .filter(|row| row.spent == 0)
        .map(|row| row.value)
        .sum();
    assert_eq!(unspent_total, supply2.transparent_supply);
}

/// Shielded-flow fee: one transparent input of 100, one output of 90,
/// and 9 coins entering the Sapling pool give fee 1 and move both supply
/// components.
#[tokio::test]
async fn shielded_flow_fee_and_supply() {
    fluxscan_test::init();

    let store = MemoryStore::new();
    let mut indexer = indexer(&store);

    let cb0 = generate::coinbase_tx(0, &[(Amount::from_coins(100), generate::p2pkh_script(0x10))]);
    let b0 = generate::pow_block(fluxscan_chain::block::Hash([0; 32]), 1_600_000_000, 1, &[cb0.clone()]);
    let h0 = Block::parse(&b0, &params(), Some(Height(0))).unwrap().hash;

    let cb1 = generate::coinbase_tx(1, &[(Amount::from_coins(10), generate::p2pkh_script(0x20))]);
    let shielding = generate::sapling_tx(
        &[generate::outpoint_of(&cb0, 0)],
        &[(Amount::from_coins(90), generate::p2pkh_script(0xC1))],
        Amount::from_coins(-9),
    );
    let shielding_txid = TxHash::of(&shielding).to_string();
    let b1 = generate::pow_block(h0, 1_600_000_060, 2, &[cb1, shielding]);

    indexer
        .index_batch(&[prepare(0, b0), prepare(1, b1)], InsertMode::Sync)
        .await
        .unwrap();

    let row = store.tx(&shielding_txid).unwrap();
    assert_eq!(row.fee, COIN); // 100 - 90 + (-9) = 1
    assert_eq!(row.is_shielded, 1);

    let supply0 = store.supply(0).unwrap();
    let supply1 = store.supply(1).unwrap();

    // 9 coins entered the pool at height 1.
    assert_eq!(supply1.shielded_pool - supply0.shielded_pool, 9 * COIN);
    // Pure-transparent accounting would add coinbase minus fee (9); the
    // pool flow lowers it by a further 9.
    assert_eq!(
        supply1.transparent_supply - supply0.transparent_supply,
        10 * COIN - COIN - 9 * COIN
    );
    assert_eq!(
        supply1.total_supply,
        supply1.transparent_supply + supply1.shielded_pool
    );
}

/// A fluxnode START whose collateral resolves to the 40,000-coin tier,
/// indexed as both a transaction row and a fluxnode operation row.
#[tokio::test]
async fn fluxnode_start_with_recognized_tier() {
    fluxscan_test::init();

    let store = MemoryStore::new();
    let mut indexer = indexer(&store);

    let cb0 = generate::coinbase_tx(
        0,
        &[(Amount::from_coins(40_000), generate::p2pkh_script(0x77))],
    );
    let b0 = generate::pow_block(fluxscan_chain::block::Hash([0; 32]), 1_600_000_000, 1, &[cb0.clone()]);
    let h0 = Block::parse(&b0, &params(), Some(Height(0))).unwrap().hash;

    let cb1 = generate::coinbase_tx(1, &[(Amount::from_coins(10), generate::p2pkh_script(0x20))]);
    let start = generate::fluxnode_start_tx(generate::outpoint_of(&cb0, 0), 1_650_000_000);
    let b1 = generate::pow_block(h0, 1_600_000_060, 2, &[cb1, start]);

    indexer
        .index_batch(&[prepare(0, b0), prepare(1, b1)], InsertMode::Sync)
        .await
        .unwrap();

    let rows = store.fluxnode_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, "start");
    assert_eq!(rows[0].tier.as_deref(), Some("STRATUS"));

    let tx_row = store.tx(&rows[0].txid).unwrap();
    assert_eq!(tx_row.is_fluxnode_tx, 1);
    assert_eq!(tx_row.fluxnode_type, Some(2));
    assert_eq!(tx_row.input_count, 0);
    assert_eq!(tx_row.output_count, 0);
    assert_eq!(tx_row.fee, 0);
}

/// A proof-of-node block credits its producer.
#[tokio::test]
async fn pon_block_credits_producer() {
    fluxscan_test::init();

    let store = MemoryStore::new();
    let mut indexer = indexer(&store);

    let producer = OutPoint {
        hash: TxHash([0x55; 32]),
        index: 0,
    };
    let cb0 = generate::coinbase_tx(0, &[(Amount::from_coins(37), generate::p2pkh_script(0x30))]);
    let raw = generate::pon_block(fluxscan_chain::block::Hash([0; 32]), 1_700_000_000, producer, &[cb0]);

    indexer
        .index_batch(&[prepare(0, raw)], InsertMode::Sync)
        .await
        .unwrap();

    let block = store.block_at(0).unwrap();
    let expected = format!("{}:{}", producer.hash, producer.index);
    assert_eq!(block.producer.as_deref(), Some(expected.as_str()));
    assert_eq!(block.producer_reward, Some(37 * COIN));

    let producers = store.producer_rows();
    assert_eq!(producers.len(), 1);
    assert_eq!(producers[0].fluxnode, expected);
    assert_eq!(producers[0].blocks_delta, 1);
    assert_eq!(producers[0].rewards_delta, 37 * COIN);
}

/// Inputs that resolve nowhere are counted and logged, never fatal.
#[tokio::test]
async fn missing_utxo_is_counted_not_fatal() {
    fluxscan_test::init();

    let store = MemoryStore::new();
    let mut indexer = indexer(&store);

    let cb0 = generate::coinbase_tx(0, &[(Amount::from_coins(10), generate::p2pkh_script(0x10))]);
    let orphan_spend = generate::transfer_tx(
        &[OutPoint {
            hash: TxHash([0xEE; 32]),
            index: 5,
        }],
        &[(Amount::from_coins(1), generate::p2pkh_script(0x11))],
    );
    let raw = generate::pow_block(
        fluxscan_chain::block::Hash([0; 32]),
        1_600_000_000,
        1,
        &[cb0, orphan_spend.clone()],
    );

    let outcome = indexer
        .index_batch(&[prepare(0, raw)], InsertMode::Sync)
        .await
        .unwrap();

    assert_eq!(outcome.missing_utxos, 1);
    // The unresolved input contributes nothing, so the fee clamps at zero.
    let row = store.tx(&TxHash::of(&orphan_spend).to_string()).unwrap();
    assert_eq!(row.input_total, 0);
    assert_eq!(row.fee, 0);
}

/// Replaying a height range converges to the same visible state.
#[tokio::test]
async fn index_batch_is_idempotent() {
    fluxscan_test::init();

    let store = MemoryStore::new();
    let mut indexer = indexer(&store);

    let cb0 = generate::coinbase_tx(0, &[(Amount::from_coins(100), generate::p2pkh_script(0x10))]);
    let b0 = generate::pow_block(fluxscan_chain::block::Hash([0; 32]), 1_600_000_000, 1, &[cb0.clone()]);
    let h0 = Block::parse(&b0, &params(), Some(Height(0))).unwrap().hash;
    let cb1 = generate::coinbase_tx(1, &[(Amount::from_coins(10), generate::p2pkh_script(0x20))]);
    let t1 = generate::transfer_tx(
        &[generate::outpoint_of(&cb0, 0)],
        &[(Amount::from_coins(99), generate::p2pkh_script(0xA1))],
    );
    let b1 = generate::pow_block(h0, 1_600_000_060, 2, &[cb1, t1]);

    let batch = [prepare(0, b0), prepare(1, b1)];
    indexer.index_batch(&batch, InsertMode::Sync).await.unwrap();

    let supply_before = store.supply(1).unwrap();
    let summary_before = store.address_summary(&address_of(0xA1));
    let utxos_before = store.merged_utxos();

    // Retry the same range, as the loop would after a partial write.
    indexer.index_batch(&batch, InsertMode::Sync).await.unwrap();

    let supply_after = store.supply(1).unwrap();
    assert_eq!(supply_after.transparent_supply, supply_before.transparent_supply);
    assert_eq!(supply_after.shielded_pool, supply_before.shielded_pool);

    assert_eq!(store.address_summary(&address_of(0xA1)), summary_before);

    let utxos_after = store.merged_utxos();
    assert_eq!(utxos_after.len(), utxos_before.len());
    for (key, row) in &utxos_before {
        let after = &utxos_after[key];
        assert_eq!(after.value, row.value);
        assert_eq!(after.spent, row.spent);
        assert_eq!(after.address, row.address);
    }
}

/// Reorg of depth 2: the store follows the new chain, the Reorg log
/// records the divergence, spent outputs below the fork are restored,
/// and re-ingestion produces exactly the new blocks' rows.
#[tokio::test]
async fn reorg_invalidates_and_reingests() {
    fluxscan_test::init();

    let store = MemoryStore::new();
    let chain = MockChain::new();
    let mut indexer = indexer(&store);
    let controller = ReorgController::new(store.clone(), params());

    // Heights 0..=3: height 1 funds an address, height 3 spends it.
    let cb0 = generate::coinbase_tx(0, &[(Amount::from_coins(50), generate::p2pkh_script(0x01))]);
    let b0 = generate::pow_block(fluxscan_chain::block::Hash([0; 32]), 1_600_000_000, 0, &[cb0]);
    let b0_hash = Block::parse(&b0, &params(), Some(Height(0))).unwrap().hash;

    let cb1 = generate::coinbase_tx(1, &[(Amount::from_coins(50), generate::p2pkh_script(0x02))]);
    let b1 = generate::pow_block(b0_hash, 1_600_000_060, 0, &[cb1.clone()]);
    let b1_hash = Block::parse(&b1, &params(), Some(Height(1))).unwrap().hash;

    let cb2 = generate::coinbase_tx(2, &[(Amount::from_coins(50), generate::p2pkh_script(0x03))]);
    let b2 = generate::pow_block(b1_hash, 1_600_000_120, 0, &[cb2]);
    let b2_hash = Block::parse(&b2, &params(), Some(Height(2))).unwrap().hash;

    let cb3 = generate::coinbase_tx(3, &[(Amount::from_coins(50), generate::p2pkh_script(0x04))]);
    let spend = generate::transfer_tx(
        &[generate::outpoint_of(&cb1, 0)],
        &[(Amount::from_coins(49), generate::p2pkh_script(0x05))],
    );
    let b3 = generate::pow_block(b2_hash, 1_600_000_180, 0, &[cb3, spend]);

    indexer
        .index_batch(
            &[
                prepare(0, b0),
                prepare(1, b1),
                prepare(2, b2.clone()),
                prepare(3, b3),
            ],
            InsertMode::Sync,
        )
        .await
        .unwrap();

    // The live chain diverges at height 2: new blocks with other nonces.
    let cb2_new = generate::coinbase_tx(2, &[(Amount::from_coins(50), generate::p2pkh_script(0x13))]);
    let b2_new = generate::pow_block(b1_hash, 1_600_000_125, 9, &[cb2_new]);
    let b2_new_hash = Block::parse(&b2_new, &params(), Some(Height(2))).unwrap().hash;
    let cb3_new = generate::coinbase_tx(3, &[(Amount::from_coins(50), generate::p2pkh_script(0x14))]);
    let b3_new = generate::pow_block(b2_new_hash, 1_600_000_185, 9, &[cb3_new]);
    let b3_new_hash = Block::parse(&b3_new, &params(), Some(Height(3))).unwrap().hash;

    chain.set_hash(0, b0_hash.to_string());
    chain.set_hash(1, b1_hash.to_string());
    chain.set_hash(2, b2_new_hash.to_string());
    chain.set_hash(3, b3_new_hash.to_string());

    let outcome = controller.handle(&chain, 3).await.unwrap();
    indexer.reset();

    assert_eq!(outcome.common_ancestor, 1);
    assert_eq!(outcome.to_height, 2);
    assert_eq!(outcome.from_height, 3);
    assert_eq!(outcome.blocks_affected, 2);
    assert_eq!(outcome.ancestor_hash, b1_hash.to_string());

    let reorgs = store.reorgs();
    assert_eq!(reorgs.len(), 1);
    assert_eq!(reorgs[0].common_ancestor, 1);
    assert_eq!(reorgs[0].to_height, 2);
    assert_eq!(reorgs[0].from_height, 3);
    assert_eq!(reorgs[0].blocks_affected, 2);

    // Old rows above the fork are invalid; heights 0-1 survive.
    assert_eq!(store.valid_tx_count(2), 0);
    assert_eq!(store.valid_tx_count(3), 0);
    assert_eq!(store.valid_tx_count(1), 1);

    // The output spent by the orphaned block is unspent again.
    let cb1_txid = fluxscan_chain::transaction::Hash::of(&cb1).to_string();
    let restored = &store.merged_utxos()[&(cb1_txid, 0)];
    assert_eq!(restored.spent, 0);
    assert_eq!(restored.spent_txid, None);
    assert_eq!(restored.value, 50 * COIN);

    // The indexer's cross-batch state is gone.
    assert_eq!(indexer.cache().len(), 0);

    // Sync state rewound to the ancestor.
    let state = store.sync_state().unwrap();
    assert_eq!(state.current_height, 1);
    assert_eq!(state.last_block_hash, b1_hash.to_string());

    // Re-ingest the canonical chain from above the fork.
    indexer
        .index_batch(
            &[prepare(2, b2_new), prepare(3, b3_new)],
            InsertMode::Sync,
        )
        .await
        .unwrap();

    assert_eq!(store.valid_tx_count(2), 1);
    assert_eq!(store.valid_tx_count(3), 1);
    assert_eq!(
        store.block_at(2).unwrap().hash,
        b2_new_hash.to_string()
    );

    // Supply above the fork reflects the new chain and stays contiguous.
    let supply1 = store.supply(1).unwrap();
    let supply2 = store.supply(2).unwrap();
    assert_eq!(
        supply2.transparent_supply,
        supply1.transparent_supply + 50 * COIN
    );
}

/// The deepest allowed reorg is a hard bound; beyond it ingestion halts.
#[tokio::test]
async fn reorg_depth_bound_is_fatal() {
    fluxscan_test::init();

    let store = MemoryStore::new();
    let chain = MockChain::new();
    let controller = ReorgController::new(store.clone(), params());

    // A live chain that never matches anything stored.
    for height in 0..=200u32 {
        chain.set_hash(height, format!("{:064x}", height + 1));
    }

    let error = controller.handle(&chain, 200).await.unwrap_err();
    assert!(matches!(
        error,
        fluxscan_indexer::IndexError::ReorgTooDeep { .. }
    ));
    assert!(error.is_fatal());
}
