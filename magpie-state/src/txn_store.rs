//! The partitioned transaction store.
//!
//! One database file would grow without bound, so raw transactions are
//! sharded across `<coin>-txns-NNN-III` databases: NNN is the partition
//! level (a power of two, at least 4) and III the shard index within it.
//! A transaction shards by `q = u32_be(txid[..4])` into `(N, q mod N)`.
//! When the largest shard of the current level passes the target size the
//! level doubles and new writes go to the new level; old levels stay
//! readable forever, so lookups walk levels downward.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use byteorder::ByteOrder;
use rand::Rng;
use tracing::{debug, info};

use magpie_chain::block::merkle;
use magpie_chain::parameters::Coin;
use magpie_chain::transaction::{self, Transaction};
use magpie_chain::{WireDeserializeInto, WireSerialize};

use crate::block_store::{BlockStore, StoredBlock};
use crate::db::u64_key;
use crate::error::{BlockError, StorageError};
use crate::keys;

/// The smallest partition level.
const MINIMUM_N: u32 = 4;

/// Shard trees: `txns` maps txck → raw transaction; `hints` maps
/// (txid_hint ‖ txck) → () as a non-unique secondary index.
struct Shard {
    db: sled::Db,
    txns: sled::Tree,
    hints: sled::Tree,
}

/// Raw transaction storage, sharded by txid.
pub struct TxnStore {
    data_dir: PathBuf,
    coin: &'static Coin,
    /// Open shards, keyed by (level, index).
    shards: RefCell<HashMap<(u32, u32), Arc<Shard>>>,
    /// The current (largest) partition level.
    level: Cell<u32>,
    target_size: u64,
}

impl TxnStore {
    pub fn open(
        data_dir: PathBuf,
        coin: &'static Coin,
        target_size: u64,
    ) -> Result<TxnStore, StorageError> {
        let store = TxnStore {
            data_dir,
            coin,
            shards: RefCell::new(HashMap::new()),
            level: Cell::new(MINIMUM_N),
            target_size,
        };

        // The highest level on disk is the current one; every level below
        // it stays open for lookups.
        let level = store.load_level();
        store.level.set(level);
        let mut n = level;
        while n >= MINIMUM_N {
            store.open_level(n)?;
            n /= 2;
        }
        info!(coin = coin.name, level, "opened transaction store");

        Ok(store)
    }

    /// Determine the highest partition level present on disk.
    fn load_level(&self) -> u32 {
        let mut n = MINIMUM_N;
        while self.shard_path(n * 2, 0).exists() {
            n *= 2;
        }
        n
    }

    fn shard_path(&self, level: u32, index: u32) -> PathBuf {
        self.data_dir
            .join(format!("{}-txns-{:03}-{:03}", self.coin.name, level, index))
    }

    /// Open (creating if needed) every shard of a level.
    fn open_level(&self, level: u32) -> Result<(), StorageError> {
        for index in 0..level {
            self.shard(level, index)?;
        }
        Ok(())
    }

    fn shard(&self, level: u32, q: u32) -> Result<Arc<Shard>, StorageError> {
        let key = (level, q % level);
        if let Some(shard) = self.shards.borrow().get(&key) {
            return Ok(shard.clone());
        }

        let db = sled::open(self.shard_path(key.0, key.1))?;
        let shard = Arc::new(Shard {
            txns: db.open_tree(b"txns")?,
            hints: db.open_tree(b"hints")?,
            db,
        });
        self.shards.borrow_mut().insert(key, shard.clone());
        Ok(shard)
    }

    /// Spot-check one shard of the current level; double the level when
    /// it has outgrown the target size.
    fn check_size(&self) -> Result<(), StorageError> {
        let level = self.level.get();
        let probe = rand::thread_rng().gen_range(0..level);
        let shard = self.shard(level, probe)?;
        if shard.db.size_on_disk()? > self.target_size {
            let doubled = level * 2;
            info!(level = doubled, "transaction store partition level doubling");
            self.level.set(doubled);
            self.open_level(doubled)?;
        }
        Ok(())
    }

    /// Store a block's transactions and mark the block complete.
    ///
    /// The transaction list must merkle-ize to the block's recorded root.
    /// Duplicate composite keys are silently skipped (a block re-sent by
    /// another peer is not an error).
    pub fn add(
        &self,
        block: &StoredBlock,
        transactions: &[Arc<Transaction>],
        blocks: &BlockStore,
    ) -> Result<(), BlockError> {
        self.check_size().map_err(BlockError::Storage)?;

        let hashes: Vec<transaction::Hash> =
            transactions.iter().map(|txn| txn.hash()).collect();
        if merkle::Root::from_hashes(&hashes) != Some(block.merkle_root) {
            return Err(BlockError::Merkle);
        }

        let level = self.level.get();
        for (txn_index, (txn, txid)) in transactions.iter().zip(&hashes).enumerate() {
            let q = keys::shard_q(txid);
            let shard = self.shard(level, q).map_err(BlockError::Storage)?;

            let txck = keys::txck(block.blockid, txn_index as u32)
                .map_err(BlockError::Storage)?;
            let key = u64_key(txck);

            if shard.txns.contains_key(key)? {
                continue;
            }
            let raw = txn
                .wire_serialize_to_vec()
                .map_err(|e| BlockError::Storage(StorageError::Io(e)))?;
            shard.txns.insert(key, raw)?;
            shard
                .hints
                .insert(hint_key(keys::txid_hint(txid), txck), &[][..])?;
        }

        // Shard writes flush independently; the txn_count flip is the
        // commit point that marks the block complete.
        for shard in self.shards.borrow().values() {
            shard.db.flush().map_err(StorageError::Engine)?;
        }
        blocks
            .set_txn_count(block.blockid, transactions.len() as u32)
            .map_err(BlockError::Storage)?;

        debug!(hash = %block.hash, count = transactions.len(), "stored block transactions");
        Ok(())
    }

    /// Look up a transaction by txid.
    ///
    /// Checks `(N, q mod N)` for each level from the current one down to
    /// the minimum; within a shard the 47-bit hint prunes candidates,
    /// which are then confirmed by rehashing.
    pub fn get(
        &self,
        txid: &transaction::Hash,
    ) -> Result<Option<(u64, Arc<Transaction>)>, StorageError> {
        let hint = keys::txid_hint(txid);
        let q = keys::shard_q(txid);

        let mut level = self.level.get();
        while level >= MINIMUM_N {
            let shard = self.shard(level, q)?;
            for entry in shard.hints.scan_prefix(&u64_key(hint)[..]) {
                let (key, _) = entry?;
                let txck = hint_key_txck(&key)?;
                if let Some(raw) = shard.txns.get(u64_key(txck))? {
                    let txn: Transaction = (&raw[..])
                        .wire_deserialize_into()
                        .map_err(|_| StorageError::Corruption("undecodable stored transaction"))?;
                    // The hint is non-unique; confirm against the real txid.
                    if txn.hash() == *txid {
                        return Ok(Some((txck, Arc::new(txn))));
                    }
                }
            }
            level /= 2;
        }

        // Another process may have grown the store under us; reload the
        // level and retry once.
        let disk_level = self.load_level();
        if disk_level != self.level.get() {
            self.level.set(disk_level);
            self.open_level(disk_level)?;
            return self.get(txid);
        }

        Ok(None)
    }

    /// All transactions of a block, ordered by transaction index.
    pub fn transactions_for_block(
        &self,
        blockid: u32,
    ) -> Result<Vec<(u64, Arc<Transaction>)>, StorageError> {
        let lo = keys::txck(blockid, 0)?;
        let hi = keys::txck(blockid + 1, 0)?;

        let mut found = Vec::new();
        for shard in self.shards.borrow().values() {
            for entry in shard.txns.range(u64_key(lo)..u64_key(hi)) {
                let (key, raw) = entry?;
                let txck = byteorder::BigEndian::read_u64(&key);
                let txn: Transaction = (&raw[..])
                    .wire_deserialize_into()
                    .map_err(|_| StorageError::Corruption("undecodable stored transaction"))?;
                found.push((txck, Arc::new(txn)));
            }
        }

        // All keys share the blockid, so this orders by transaction index.
        found.sort_by_key(|(txck, _)| *txck);
        Ok(found)
    }
}

fn hint_key(hint: u64, txck: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    byteorder::BigEndian::write_u64(&mut key[..8], hint);
    byteorder::BigEndian::write_u64(&mut key[8..], txck);
    key
}

fn hint_key_txck(key: &[u8]) -> Result<u64, StorageError> {
    if key.len() != 16 {
        return Err(StorageError::Corruption("hint index key has wrong length"));
    }
    Ok(byteorder::BigEndian::read_u64(&key[8..]))
}
