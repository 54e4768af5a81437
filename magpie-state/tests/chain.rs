//! Store-level scenarios driven by real Bitcoin headers.
//!
//! The fork vectors (block_1_a, block_2_aa, …) are alternate low-difficulty
//! headers mined against the real early chain for exactly these tests:
//! `block_HEIGHT_PATH`, where block_1_a is the parent of block_2_aa.

use std::str::FromStr;
use std::sync::Arc;

use magpie_chain::block::{self, Header};
use magpie_chain::parameters::Coin;
use magpie_chain::transaction::Transaction;
use magpie_chain::{WireDeserialize, WireDeserializeInto};
use magpie_state::{BlockError, BlockStore, ChainDb, TransactionError, TxnStore, UtxoStore};

const BLOCK_1_INVALID_TARGET: &str = "01000000000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26fd4e1732e44abdc5199c755a22eaf95b32c27af28396b7066e8e5db6352c3ae8d61bc6649ffff001d2a00000000";

// Mainchain headers 1..9 (80 bytes each, suffixed with a varint txn count).
const BLOCK_1: &str = "010000006fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000982051fd1e4ba744bbbe680e1fee14677ba1a3c3540bf7b1cdb606e857233e0e61bc6649ffff001d01e3629901";
const BLOCK_2: &str = "010000004860eb18bf1b1620e37e9490fc8a427514416fd75159ab86688e9a8300000000d5fdcc541e25de1c7a5addedf24858b8bb665c9f36ef744ee42c316022c90f9bb0bc6649ffff001d08d2bd6101";
const BLOCK_3: &str = "01000000bddd99ccfda39da1b108ce1a5d70038d0a967bacb68b6b63065f626a0000000044f672226090d85db9a9f2fbfe5f0f9609b387af7be5b7fbb7a1767c831c9e995dbe6649ffff001d05e0ed6d01";
const BLOCK_4: &str = "010000004944469562ae1c2c74d9a535e00b6f3e40ffbad4f2fda3895501b582000000007a06ea98cd40ba2e3288262b28638cec5337c1456aaf5eedc8e9e5a20f062bdf8cc16649ffff001d2bfee0a901";
const BLOCK_5: &str = "0100000085144a84488ea88d221c8bd6c059da090e88f8a2c99690ee55dbba4e00000000e11c48fecdd9e72510ca84f023370c9a38bf91ac5cae88019bee94d24528526344c36649ffff001d1d03e47701";
const BLOCK_6: &str = "01000000fc33f596f822a0a1951ffdbf2a897b095636ad871707bf5d3162729b00000000379dfb96a5ea8c81700ea4ac6b97ae9a9312b2d4301a29580e924ee6761a2520adc46649ffff001d189c4c9701";

// Fork headers.
const BLOCK_1_A: &str = "010000006fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d61900000000000090b6fe0de6d49a30fe6efb003c5ca82cf91c8515c5fa7f46526566eed0f4bbb2026749ffff001d8f316be500";
const BLOCK_2_AA: &str = "01000000541366d25ac71b75f218615d003f882909a9463c976162965ea0f92600000000eb48f9bc278e2f682116a878be4acaeba88dd895e1ad90b5ed3ca6bbce769dd009056749ffff001d4ad59e9200";
const BLOCK_3_AAA: &str = "01000000dbc4e7fc50f53ef3a80c5c4ac9119b83cb53b6a0a4e8da7084c4f320000000001084640903ca51050fe8902fb323fade18c417116c42e1a6c45d531d7b7403ef6d076749ffff001d816aa6b700";
const BLOCK_4_AAAA: &str = "0100000015e08e6fd14f70fc63e002863a54bc31370e054b2e82854ab126ece40000000056db6ea6b70b637c40c5ae289df4b99e009e9c3eb9ebc89dfc9ba1debb499177eb096749ffff001d3a5e830500";
const BLOCK_5_AAAAA: &str = "010000005af95ad58d2cd9492385996159d0cf4b0d9e450b48ff85465cb3ae6000000000c479338d2750a2cd4256577afed6f137786b85425b74ec5e4b36d16838ac16882b0c6749ffff001d1085371800";

/// The coinbase transaction of Bitcoin block 1 (the block's whole body).
const BLOCK_1_COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff0704ffff001d0104ffffffff0100f2052a01000000434104\
96b538e853519c726a2c91e61ec11600ae1390813a627c66fb8be7947be63c52da7589379515d4e0a604f8141781e62294721166bf621e73a82cbf2342c858eeac00000000";

fn header(hex_block: &str) -> Header {
    let raw = hex::decode(hex_block).unwrap();
    Header::wire_deserialize(&raw[..80]).unwrap()
}

fn open_store(dir: &std::path::Path) -> Arc<ChainDb> {
    Arc::new(ChainDb::open(dir, Coin::bitcoin()).unwrap())
}

#[test]
fn genesis_only_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();

    let tip = store.tip().unwrap();
    assert_eq!(tip.height, 0);
    assert_eq!(tip.blockid, 1);
    assert_eq!(
        hex::encode(tip.hash.0),
        "6fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000"
    );
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn linear_chain() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();

    for raw in [BLOCK_1, BLOCK_2, BLOCK_3, BLOCK_4, BLOCK_5] {
        assert!(store.add_header(&header(raw)).unwrap());
    }

    assert_eq!(store.len().unwrap(), 6);
    let tip = store.tip().unwrap();
    assert_eq!(tip.hash, header(BLOCK_5).hash());
    for height in 1..=5 {
        assert!(store.by_height(height).unwrap().unwrap().mainchain);
    }

    // Adding a known header again is a no-op.
    assert!(!store.add_header(&header(BLOCK_3)).unwrap());
    assert_eq!(store.len().unwrap(), 6);
}

#[test]
fn first_seen_wins_ties() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();

    assert!(store.add_header(&header(BLOCK_1)).unwrap());
    assert!(store.add_header(&header(BLOCK_1_A)).unwrap());

    let tip = store.tip().unwrap();
    assert_eq!(tip.hash, header(BLOCK_1).hash());

    let sibling = store.get(&header(BLOCK_1_A).hash(), true).unwrap().unwrap();
    assert!(!sibling.mainchain);
    // The sibling is invisible without the orphans flag.
    assert!(store.get(&header(BLOCK_1_A).hash(), false).unwrap().is_none());
}

#[test]
fn late_fork_overtakes_and_reorganizes() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();

    let fork = [
        BLOCK_1_A,
        BLOCK_2_AA,
        BLOCK_3_AAA,
        BLOCK_4_AAAA,
        BLOCK_5_AAAAA,
    ];
    for raw in fork {
        assert!(store.add_header(&header(raw)).unwrap());
    }
    // The fork chain is currently main.
    assert_eq!(store.tip().unwrap().hash, header(BLOCK_5_AAAAA).hash());

    // The real chain arrives late; at equal height (5) the first-seen
    // fork keeps the tip, and block 6 finally overtakes it.
    for raw in [BLOCK_1, BLOCK_2, BLOCK_3, BLOCK_4] {
        assert!(store.add_header(&header(raw)).unwrap());
        assert!(!store
            .get(&header(raw).hash(), true)
            .unwrap()
            .unwrap()
            .mainchain);
    }
    assert!(store.add_header(&header(BLOCK_5)).unwrap());
    assert_eq!(store.tip().unwrap().hash, header(BLOCK_5_AAAAA).hash());

    assert!(store.add_header(&header(BLOCK_6)).unwrap());

    let tip = store.tip().unwrap();
    assert_eq!(tip.hash, header(BLOCK_6).hash());
    assert_eq!(tip.height, 6);

    for raw in fork {
        let stored = store.get(&header(raw).hash(), true).unwrap().unwrap();
        assert!(!stored.mainchain, "fork block must be demoted");
    }
    for raw in [BLOCK_1, BLOCK_2, BLOCK_3, BLOCK_4, BLOCK_5, BLOCK_6] {
        let stored = store.get(&header(raw).hash(), true).unwrap().unwrap();
        assert!(stored.mainchain, "real chain must be promoted");
        assert_eq!(
            store.by_height(stored.height as u32).unwrap().unwrap().hash,
            stored.hash
        );
    }
}

#[test]
fn reorg_is_order_independent() {
    // Any topologically valid arrival order must converge on the same
    // main-chain flags and the same tip.
    let orders: [&[&str]; 3] = [
        // Real chain first, fork later.
        &[
            BLOCK_1, BLOCK_2, BLOCK_3, BLOCK_1_A, BLOCK_2_AA, BLOCK_3_AAA, BLOCK_4_AAAA,
        ],
        // Fork first, real chain later.
        &[
            BLOCK_1_A, BLOCK_2_AA, BLOCK_3_AAA, BLOCK_4_AAAA, BLOCK_1, BLOCK_2, BLOCK_3,
        ],
        // Interleaved.
        &[
            BLOCK_1, BLOCK_1_A, BLOCK_2_AA, BLOCK_2, BLOCK_3, BLOCK_3_AAA, BLOCK_4_AAAA,
        ],
    ];

    let mut outcomes = Vec::new();
    for order in orders {
        let dir = tempfile::tempdir().unwrap();
        let db = open_store(dir.path());
        let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();
        for raw in order {
            store.add_header(&header(raw)).unwrap();
        }

        let tip = store.tip().unwrap().hash;
        let mut flags: Vec<(String, bool)> = order
            .iter()
            .map(|raw| {
                let stored = store.get(&header(raw).hash(), true).unwrap().unwrap();
                (stored.hash.to_string(), stored.mainchain)
            })
            .collect();
        flags.sort();
        outcomes.push((tip, flags));
    }

    // The 4-deep fork wins everywhere (height 4 beats height 3).
    assert_eq!(outcomes[0].0, header(BLOCK_4_AAAA).hash());
    assert!(outcomes.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn proof_of_work_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();

    let result = store.add_header(&header(BLOCK_1_INVALID_TARGET));
    assert!(matches!(result, Err(BlockError::Work)));
    // No state change.
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn orphan_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();

    // Block 2's parent (block 1) is unknown.
    let result = store.add_header(&header(BLOCK_2));
    assert!(matches!(result, Err(BlockError::Orphan)));
}

#[test]
fn locator_hashes_walk_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();

    for raw in [BLOCK_1, BLOCK_2, BLOCK_3, BLOCK_4, BLOCK_5] {
        store.add_header(&header(raw)).unwrap();
    }

    let locator = store.block_locator_hashes().unwrap();
    assert_eq!(locator.first().unwrap(), &header(BLOCK_5).hash());
    assert_eq!(
        locator.last().unwrap(),
        &Coin::bitcoin().genesis.hash
    );
    // Heights 5..1 plus genesis.
    assert_eq!(locator.len(), 6);
}

#[test]
fn locate_blocks_from_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();

    for raw in [BLOCK_1, BLOCK_2, BLOCK_3, BLOCK_4, BLOCK_5] {
        store.add_header(&header(raw)).unwrap();
    }

    // Anchor at block 3: successors are 4 and 5.
    let found = store
        .locate_blocks(&[header(BLOCK_3).hash()], 500, None)
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].hash, header(BLOCK_4).hash());
    assert_eq!(found[1].hash, header(BLOCK_5).hash());

    // An unknown anchor followed by a known one: the first match wins.
    let found = store
        .locate_blocks(
            &[block::Hash::from_bytes_exact([0xee; 32]), header(BLOCK_4).hash()],
            500,
            None,
        )
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].hash, header(BLOCK_5).hash());

    // The stop hash is included, then iteration ends.
    let found = store
        .locate_blocks(&[header(BLOCK_1).hash()], 500, Some(header(BLOCK_3).hash()))
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found.last().unwrap().hash, header(BLOCK_3).hash());

    // No locator match: empty (the peer layer answers notfound).
    let found = store
        .locate_blocks(&[block::Hash::from_bytes_exact([0xee; 32])], 500, None)
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn incomplete_blocks_queue() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();

    for raw in [BLOCK_1, BLOCK_2, BLOCK_3] {
        store.add_header(&header(raw)).unwrap();
    }

    // Genesis and the three headers all lack bodies; the sentinel is
    // excluded.
    let incomplete = store.incomplete_blocks(None, 1000).unwrap();
    assert_eq!(incomplete.len(), 4);
    assert_eq!(incomplete[0].height, 0);
    assert_eq!(store.incomplete_block_count().unwrap(), 4);

    // The cursor trims already-queued blocks.
    let rest = store
        .incomplete_blocks(Some(incomplete[1].blockid), 1000)
        .unwrap();
    assert_eq!(rest.len(), 2);

    let capped = store.incomplete_blocks(None, 2).unwrap();
    assert_eq!(capped.len(), 2);
}

#[test]
fn transaction_store_round_trip_and_utxo_update() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_store(dir.path());
    let store = BlockStore::new(db.clone(), Coin::bitcoin()).unwrap();
    let txns = TxnStore::open(dir.path().to_path_buf(), Coin::bitcoin(), 1 << 30).unwrap();
    let utxo = UtxoStore::new(db.clone(), Coin::bitcoin(), Some(2)).unwrap();

    store.add_header(&header(BLOCK_1)).unwrap();
    let stored = store.get(&header(BLOCK_1).hash(), false).unwrap().unwrap();
    assert_eq!(stored.blockid, 2);

    let coinbase: Arc<Transaction> = hex::decode(BLOCK_1_COINBASE)
        .unwrap()
        .as_slice()
        .wire_deserialize_into()
        .map(Arc::new)
        .unwrap();
    let txid = coinbase.hash();

    // A transaction list that doesn't merkle-ize to the header is
    // rejected before anything is written.
    let decoy = Arc::new(Transaction::new(
        1,
        vec![magpie_chain::transparent::coinbase_input(vec![0x51])],
        vec![magpie_chain::transparent::Output {
            value: magpie_chain::Amount::from_sat(1),
            pk_script: magpie_chain::transparent::Script(vec![0x51]),
        }],
        0,
    ));
    assert!(matches!(
        txns.add(&stored, &[decoy], &store),
        Err(BlockError::Merkle)
    ));

    txns.add(&stored, &[coinbase.clone()], &store).unwrap();

    // The block is now complete.
    let stored = store.get(&header(BLOCK_1).hash(), false).unwrap().unwrap();
    assert_eq!(stored.txn_count, 1);
    assert!(store.incomplete_blocks(None, 1000).unwrap().iter().all(|b| b.hash != stored.hash));

    // Lookup by txid goes through the hint index.
    let (txck, found) = txns.get(&txid).unwrap().unwrap();
    assert_eq!(found.hash(), txid);
    assert_eq!(magpie_state::keys::txck_blockid(txck), 2);
    assert_eq!(magpie_state::keys::txck_index(txck), 0);

    // An unknown txid misses.
    let missing =
        magpie_chain::transaction::Hash::from_str(
            "00000000000000000000000000000000000000000000000000000000000000aa",
        )
        .unwrap();
    assert!(txns.get(&missing).unwrap().is_none());

    // Range query recovers the block body in order.
    let body = txns.transactions_for_block(2).unwrap();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0].1.hash(), txid);

    // Apply the block to the UTXO set.
    assert_eq!(utxo.last_valid_block().unwrap(), 1);
    utxo.update(&stored, &txns).unwrap();
    assert_eq!(utxo.last_valid_block().unwrap(), 2);

    let uock = magpie_state::keys::uock(txck, 0).unwrap();
    assert!(utxo.contains(uock).unwrap());

    // Re-applying is non-consecutive.
    assert!(matches!(
        utxo.update(&stored, &txns),
        Err(TransactionError::NonConsecutive)
    ));

    // The new output is findable through its address hint.
    let hash = magpie_script::output_pubkey_hash(&coinbase.outputs[0].pk_script).unwrap();
    let hint = magpie_state::keys::address_hint(Some(&hash));
    assert_eq!(utxo.unspent_by_address_hint(hint).unwrap(), vec![uock]);
}

#[test]
fn schema_version_guard() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = open_store(dir.path());
        db.set_meta(1, 99).unwrap();
        db.flush().unwrap();
    }
    assert!(matches!(
        ChainDb::open(dir.path(), Coin::bitcoin()),
        Err(magpie_state::StorageError::VersionMismatch { found: 99, .. })
    ));
}
