//! The main chain database: shared handle, trees, and key layouts.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use magpie_chain::parameters::Coin;

use crate::error::StorageError;

/// Enumerated metadata keys.
pub const META_KEY_VERSION: u32 = 1;
pub const META_KEY_LAST_VALID_BLOCK: u32 = 2;

/// Bump on any non-backwards-compatible schema change; opening an
/// obsolete database fails rather than corrupting it.
pub const SCHEMA_VERSION: u64 = 1;

/// The `<coin>-chain` database.
///
/// Four trees: `blocks` (blockid → record), `chain_index` (hash → id,
/// main-chain height → id, and the tip pointer, under prefixed keys),
/// `utxo` (unspent rows and their address index, under prefixed keys) and
/// `meta`. Related rows share a tree so each consensus write is a
/// two-tree sled transaction.
pub struct ChainDb {
    pub(crate) db: sled::Db,
    pub(crate) blocks: sled::Tree,
    pub(crate) chain_index: sled::Tree,
    pub(crate) utxo: sled::Tree,
    pub(crate) meta: sled::Tree,
}

impl ChainDb {
    pub fn open(data_dir: &Path, coin: &Coin) -> Result<ChainDb, StorageError> {
        let path = data_dir.join(format!("{}-chain", coin.name));
        let db = sled::open(path)?;

        let chain = ChainDb {
            blocks: db.open_tree(b"blocks")?,
            chain_index: db.open_tree(b"chain_index")?,
            utxo: db.open_tree(b"utxo")?,
            meta: db.open_tree(b"meta")?,
            db,
        };

        match chain.get_meta(META_KEY_VERSION)? {
            None => chain.set_meta(META_KEY_VERSION, SCHEMA_VERSION)?,
            Some(SCHEMA_VERSION) => {}
            Some(found) => {
                return Err(StorageError::VersionMismatch {
                    found,
                    expected: SCHEMA_VERSION,
                })
            }
        }

        Ok(chain)
    }

    pub fn get_meta(&self, key: u32) -> Result<Option<u64>, StorageError> {
        Ok(self
            .meta
            .get(meta_key(key))?
            .map(|value| LittleEndian::read_u64(&value)))
    }

    pub fn set_meta(&self, key: u32, value: u64) -> Result<(), StorageError> {
        self.meta.insert(meta_key(key), &meta_value(value)[..])?;
        Ok(())
    }

    /// Flush everything to disk; called on shutdown.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

pub(crate) fn meta_key(key: u32) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    BigEndian::write_u32(&mut bytes, key);
    bytes
}

pub(crate) fn meta_value(value: u64) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    LittleEndian::write_u64(&mut bytes, value);
    bytes
}

pub(crate) fn u32_key(value: u32) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    BigEndian::write_u32(&mut bytes, value);
    bytes
}

pub(crate) fn u64_key(value: u64) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    BigEndian::write_u64(&mut bytes, value);
    bytes
}

// chain_index key layouts
pub(crate) const INDEX_TIP_KEY: &[u8] = b"T";

pub(crate) fn index_hash_key(hash: &[u8; 32]) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = b'h';
    key[1..].copy_from_slice(hash);
    key
}

pub(crate) fn index_height_key(height: u32) -> [u8; 5] {
    let mut key = [0u8; 5];
    key[0] = b'm';
    BigEndian::write_u32(&mut key[1..], height);
    key
}

// utxo tree key layouts
pub(crate) fn utxo_key(uock: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = b'u';
    BigEndian::write_u64(&mut key[1..], uock);
    key
}

pub(crate) fn utxo_addr_key(address_hint: u64, uock: u64) -> [u8; 17] {
    let mut key = [0u8; 17];
    key[0] = b'a';
    BigEndian::write_u64(&mut key[1..9], address_hint);
    BigEndian::write_u64(&mut key[9..], uock);
    key
}
