//! The block-header store with fork-aware main-chain tracking.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use sled::transaction::ConflictableTransactionError;
use sled::Transactional;
use tracing::{debug, info};

use magpie_chain::block::{self, merkle, Header, Height};
use magpie_chain::parameters::Coin;
use magpie_chain::work::CompactDifficulty;
use magpie_chain::WireSerialize;

use crate::db::{index_hash_key, index_height_key, u32_key, ChainDb, INDEX_TIP_KEY};
use crate::error::{BlockError, StorageError};

/// The pre-genesis sentinel's blockid; its `previous_blockid` is itself.
pub const PREGENESIS_BLOCKID: u32 = 0;
/// The genesis block's id.
pub const GENESIS_BLOCKID: u32 = 1;

/// A block header as stored, with its chain position.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredBlock {
    /// Dense, monotone row id. Fits in 23 bits (composite-key invariant).
    pub blockid: u32,
    pub previous_blockid: u32,
    pub hash: block::Hash,
    pub version: u32,
    pub merkle_root: merkle::Root,
    pub timestamp: u32,
    pub bits: CompactDifficulty,
    pub nonce: u32,
    /// Genesis is 0; the pre-genesis sentinel is −1.
    pub height: i32,
    /// 0 until the block's transactions arrive.
    pub txn_count: u32,
    pub mainchain: bool,
}

/// Serialized record length (the blockid is the key, not part of the value).
const RECORD_LEN: usize = 4 + 32 + 4 + 32 + 4 + 4 + 4 + 4 + 4 + 1;

impl StoredBlock {
    pub fn height(&self) -> Height {
        Height(self.height.max(0) as u32)
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; RECORD_LEN];
        LittleEndian::write_u32(&mut out[0..4], self.previous_blockid);
        out[4..36].copy_from_slice(&self.hash.0);
        LittleEndian::write_u32(&mut out[36..40], self.version);
        out[40..72].copy_from_slice(&self.merkle_root.0);
        LittleEndian::write_u32(&mut out[72..76], self.timestamp);
        LittleEndian::write_u32(&mut out[76..80], self.bits.0);
        LittleEndian::write_u32(&mut out[80..84], self.nonce);
        LittleEndian::write_i32(&mut out[84..88], self.height);
        LittleEndian::write_u32(&mut out[88..92], self.txn_count);
        out[92] = self.mainchain as u8;
        out
    }

    fn decode(blockid: u32, bytes: &[u8]) -> Result<StoredBlock, StorageError> {
        if bytes.len() != RECORD_LEN {
            return Err(StorageError::Corruption("block record has wrong length"));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[4..36]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&bytes[40..72]);
        Ok(StoredBlock {
            blockid,
            previous_blockid: LittleEndian::read_u32(&bytes[0..4]),
            hash: block::Hash(hash),
            version: LittleEndian::read_u32(&bytes[36..40]),
            merkle_root: merkle::Root(merkle_root),
            timestamp: LittleEndian::read_u32(&bytes[72..76]),
            bits: CompactDifficulty(LittleEndian::read_u32(&bytes[76..80])),
            nonce: LittleEndian::read_u32(&bytes[80..84]),
            height: LittleEndian::read_i32(&bytes[84..88]),
            txn_count: LittleEndian::read_u32(&bytes[88..92]),
            mainchain: bytes[92] != 0,
        })
    }
}

/// Fork-aware block header storage.
///
/// Invariant: the main-chain flags always form one path from genesis to
/// the unique highest-height first-seen block; `add_header` maintains it
/// transactionally.
pub struct BlockStore {
    db: Arc<ChainDb>,
    coin: &'static Coin,
}

impl BlockStore {
    /// Open the store, seeding the pre-genesis sentinel and the coin's
    /// genesis block on first use.
    pub fn new(db: Arc<ChainDb>, coin: &'static Coin) -> Result<BlockStore, StorageError> {
        let store = BlockStore { db, coin };

        if store.db.blocks.first()?.is_none() {
            let sentinel = StoredBlock {
                blockid: PREGENESIS_BLOCKID,
                previous_blockid: PREGENESIS_BLOCKID,
                hash: block::Hash::zero(),
                version: 1,
                merkle_root: merkle::Root([0u8; 32]),
                timestamp: 0,
                bits: CompactDifficulty(0),
                nonce: 0,
                height: -1,
                txn_count: 0,
                mainchain: true,
            };
            let genesis = &coin.genesis;
            let genesis_block = StoredBlock {
                blockid: GENESIS_BLOCKID,
                previous_blockid: PREGENESIS_BLOCKID,
                hash: genesis.hash,
                version: genesis.version,
                merkle_root: genesis.merkle_root,
                timestamp: genesis.timestamp,
                bits: genesis.bits,
                nonce: genesis.nonce,
                height: 0,
                txn_count: 0,
                mainchain: true,
            };

            store.put_block(&sentinel)?;
            store.put_block(&genesis_block)?;
            store
                .db
                .chain_index
                .insert(&index_height_key(0)[..], &u32_key(GENESIS_BLOCKID)[..])?;
            store
                .db
                .chain_index
                .insert(INDEX_TIP_KEY, &u32_key(GENESIS_BLOCKID)[..])?;
            info!(coin = coin.name, genesis = %genesis.hash, "seeded new block store");
        }

        Ok(store)
    }

    fn put_block(&self, stored: &StoredBlock) -> Result<(), StorageError> {
        self.db
            .blocks
            .insert(u32_key(stored.blockid), stored.encode())?;
        self.db
            .chain_index
            .insert(&index_hash_key(&stored.hash.0)[..], &u32_key(stored.blockid)[..])?;
        Ok(())
    }

    /// Add a block header. Returns `false` (and changes nothing) when the
    /// header is already present, on either chain.
    ///
    /// If the new block extends a side chain past the current tip, the
    /// main-chain flags are reorganized: the side branch back to the fork
    /// point becomes main, and the old main branch above the fork becomes
    /// side. Ties keep the first-seen chain.
    pub fn add_header(&self, header: &Header) -> Result<bool, BlockError> {
        let block_hash = header.hash();

        if self.get(&block_hash, true)?.is_some() {
            return Ok(false);
        }

        let raw_header = header
            .wire_serialize_to_vec()
            .map_err(|e| BlockError::Storage(StorageError::Io(e)))?;
        if !self.coin.proof_of_work.meets_target(&raw_header, header.bits) {
            return Err(BlockError::Work);
        }

        let previous = self
            .get(&header.previous_block_hash, true)?
            .ok_or(BlockError::Orphan)?;

        let template = StoredBlock {
            blockid: self.next_blockid()?,
            previous_blockid: previous.blockid,
            hash: block_hash,
            version: header.version,
            merkle_root: header.merkle_root,
            timestamp: header.time.timestamp().max(0) as u32,
            bits: header.bits,
            nonce: header.nonce,
            height: previous.height + 1,
            txn_count: 0,
            mainchain: false, // decided inside the transaction
        };

        let previous_mainchain = previous.mainchain;
        let previous_blockid = previous.blockid;
        let template = &template;

        let result = (&self.db.blocks, &self.db.chain_index).transaction(
            |(blocks, index): &(
                sled::transaction::TransactionalTree,
                sled::transaction::TransactionalTree,
            )| {
                let get_block = |blockid: u32| -> Result<
                    StoredBlock,
                    ConflictableTransactionError<BlockError>,
                > {
                    let bytes = blocks
                        .get(u32_key(blockid))?
                        .ok_or_else(|| abort_corruption("missing block row"))?;
                    StoredBlock::decode(blockid, &bytes)
                        .map_err(|e| ConflictableTransactionError::Abort(BlockError::Storage(e)))
                };

                let tip_id = index
                    .get(INDEX_TIP_KEY)?
                    .map(|v| BigEndian::read_u32(&v))
                    .ok_or_else(|| abort_corruption("missing chain tip"))?;
                let top_block = get_block(tip_id)?;

                let mut new_block = template.clone();
                new_block.mainchain = new_block.height > top_block.height;

                // Building off a side chain that just became the longest?
                if new_block.mainchain && !previous_mainchain {
                    // Walk the side branch down to the fork point.
                    let mut promote = Vec::new();
                    let mut cursor = get_block(previous_blockid)?;
                    while !cursor.mainchain {
                        let parent = cursor.previous_blockid;
                        promote.push(cursor);
                        cursor = get_block(parent)?;
                    }
                    let forked_at = cursor.hash;

                    // Demote the old main branch above the fork...
                    let mut cursor = top_block;
                    while cursor.hash != forked_at {
                        let mut demoted = cursor.clone();
                        demoted.mainchain = false;
                        blocks.insert(&u32_key(demoted.blockid)[..], demoted.encode())?;
                        index.remove(&index_height_key(demoted.height as u32)[..])?;
                        cursor = get_block(cursor.previous_blockid)?;
                    }

                    // ...then promote the new branch.
                    for stored in promote.iter_mut() {
                        stored.mainchain = true;
                        blocks.insert(&u32_key(stored.blockid)[..], stored.encode())?;
                        index.insert(
                            &index_height_key(stored.height as u32)[..],
                            &u32_key(stored.blockid)[..],
                        )?;
                    }
                }

                blocks.insert(&u32_key(new_block.blockid)[..], new_block.encode())?;
                index.insert(
                    &index_hash_key(&new_block.hash.0)[..],
                    &u32_key(new_block.blockid)[..],
                )?;
                if new_block.mainchain {
                    index.insert(
                        &index_height_key(new_block.height as u32)[..],
                        &u32_key(new_block.blockid)[..],
                    )?;
                    index.insert(INDEX_TIP_KEY, &u32_key(new_block.blockid)[..])?;
                }

                Ok(new_block.mainchain)
            },
        );

        match result {
            Ok(mainchain) => {
                debug!(hash = %block_hash, height = template.height, mainchain, "stored header");
                Ok(true)
            }
            Err(sled::transaction::TransactionError::Abort(e)) => Err(e),
            Err(sled::transaction::TransactionError::Storage(e)) => {
                Err(BlockError::Storage(StorageError::Engine(e)))
            }
        }
    }

    /// The next dense blockid.
    fn next_blockid(&self) -> Result<u32, StorageError> {
        match self.db.blocks.last()? {
            Some((key, _)) => Ok(BigEndian::read_u32(&key) + 1),
            None => Ok(0),
        }
    }

    /// Fetch a block by hash. Side-chain blocks are only visible with
    /// `orphans` set.
    pub fn get(
        &self,
        hash: &block::Hash,
        orphans: bool,
    ) -> Result<Option<StoredBlock>, StorageError> {
        let blockid = match self.db.chain_index.get(&index_hash_key(&hash.0)[..])? {
            Some(id) => BigEndian::read_u32(&id),
            None => return Ok(None),
        };
        let stored = self.get_by_id(blockid)?;
        match stored {
            Some(ref block) if !orphans && !block.mainchain => Ok(None),
            other => Ok(other),
        }
    }

    pub fn get_by_id(&self, blockid: u32) -> Result<Option<StoredBlock>, StorageError> {
        match self.db.blocks.get(u32_key(blockid))? {
            Some(bytes) => Ok(Some(StoredBlock::decode(blockid, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch the main-chain block at `height`.
    pub fn by_height(&self, height: u32) -> Result<Option<StoredBlock>, StorageError> {
        match self.db.chain_index.get(&index_height_key(height)[..])? {
            Some(id) => self.get_by_id(BigEndian::read_u32(&id)),
            None => Ok(None),
        }
    }

    /// The current main-chain tip.
    pub fn tip(&self) -> Result<StoredBlock, StorageError> {
        let tip_id = self
            .db
            .chain_index
            .get(INDEX_TIP_KEY)?
            .map(|v| BigEndian::read_u32(&v))
            .ok_or(StorageError::Corruption("missing chain tip"))?;
        self.get_by_id(tip_id)?
            .ok_or(StorageError::Corruption("tip points at a missing block"))
    }

    /// The chain length: tip height + 1.
    pub fn len(&self) -> Result<u32, StorageError> {
        Ok((self.tip()?.height + 1) as u32)
    }

    /// A block locator: the top ten main-chain hashes, then geometrically
    /// sparser hashes down the chain, ending with the genesis hash.
    pub fn block_locator_hashes(&self) -> Result<Vec<block::Hash>, StorageError> {
        let mut hashes = Vec::new();

        // First 10, descending, not including genesis...
        let tip_height = self.tip()?.height;
        let mut offset: i64 = 0;
        let mut height = tip_height;
        while height > 0 && hashes.len() < 10 {
            if let Some(block) = self.by_height(height as u32)? {
                hashes.push(block.hash);
                offset = block.height as i64;
            }
            height -= 1;
        }
        offset -= 1;

        // ...then step down by doubling intervals...
        if offset > 0 {
            let mut step = 1i64;
            while offset > 1 {
                if let Some(block) = self.by_height(offset as u32)? {
                    hashes.push(block.hash);
                }
                offset -= step;
                step <<= 1;
            }
        }

        // ...finally the genesis hash.
        hashes.push(self.coin.genesis.hash);

        Ok(hashes)
    }

    /// Answer a locator query: find the first locator hash that names a
    /// main-chain block, and return up to `count` of its successors in
    /// height order, stopping after `hash_stop` if it is encountered.
    ///
    /// An unmatched locator returns an empty list; following the
    /// reference, the caller answers `notfound` rather than walking from
    /// genesis.
    pub fn locate_blocks(
        &self,
        locator: &[block::Hash],
        count: usize,
        hash_stop: Option<block::Hash>,
    ) -> Result<Vec<StoredBlock>, StorageError> {
        let mut anchor = None;
        for hash in locator {
            if let Some(block) = self.get(hash, false)? {
                anchor = Some(block);
                break;
            }
        }
        let anchor = match anchor {
            Some(block) => block,
            None => return Ok(Vec::new()),
        };

        let mut blocks = Vec::new();
        let mut height = anchor.height + 1;
        while blocks.len() < count {
            let block = match self.by_height(height as u32)? {
                Some(block) => block,
                None => break,
            };
            let hash = block.hash;
            blocks.push(block);
            if hash_stop == Some(hash) {
                break;
            }
            height += 1;
        }
        Ok(blocks)
    }

    /// Main-chain blocks still missing their transactions, in blockid
    /// order: the work queue for block body download.
    pub fn incomplete_blocks(
        &self,
        from_blockid: Option<u32>,
        max_count: usize,
    ) -> Result<Vec<StoredBlock>, StorageError> {
        let start = from_blockid.map(|id| id + 1).unwrap_or(0);
        let mut result = Vec::new();
        for entry in self.db.blocks.range(u32_key(start)..) {
            let (key, bytes) = entry?;
            let blockid = BigEndian::read_u32(&key);
            let stored = StoredBlock::decode(blockid, &bytes)?;
            if stored.height >= 0 && stored.mainchain && stored.txn_count == 0 {
                result.push(stored);
                if result.len() >= max_count {
                    break;
                }
            }
        }
        Ok(result)
    }

    /// How many main-chain blocks still lack transactions.
    pub fn incomplete_block_count(&self) -> Result<usize, StorageError> {
        let mut count = 0;
        for entry in self.db.blocks.iter() {
            let (key, bytes) = entry?;
            let blockid = BigEndian::read_u32(&key);
            let stored = StoredBlock::decode(blockid, &bytes)?;
            if stored.height >= 0 && stored.mainchain && stored.txn_count == 0 {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Record that a block's transactions have been stored.
    pub(crate) fn set_txn_count(&self, blockid: u32, txn_count: u32) -> Result<(), StorageError> {
        let mut stored = self.get_by_id(blockid)?.ok_or(StorageError::Corruption(
            "txn_count update for missing block",
        ))?;
        stored.txn_count = txn_count;
        self.db.blocks.insert(u32_key(blockid), stored.encode())?;
        Ok(())
    }
}

fn abort_corruption(message: &'static str) -> ConflictableTransactionError<BlockError> {
    ConflictableTransactionError::Abort(BlockError::Storage(StorageError::Corruption(message)))
}
