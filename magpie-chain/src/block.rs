//! Blocks and block-related structures (heights, headers, merkle trees).

mod hash;
mod header;
mod height;

pub mod merkle;

use std::{fmt, sync::Arc};

use crate::compactint::CompactInt;
use crate::transaction::Transaction;
use crate::{SerializationError, WireDeserialize, WireSerialize};

pub use hash::Hash;
pub use header::{CountedHeader, Header};
pub use height::Height;

/// The maximum serialized size of a block, used to bound parsing.
pub const MAX_BLOCK_BYTES: u64 = 2_000_000;

/// A block: a header and the transactions it commits to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Block {
    /// The block header, containing block metadata.
    pub header: Header,
    /// The block transactions, coinbase first.
    pub transactions: Vec<Arc<Transaction>>,
}

impl Block {
    /// Compute (or fetch the cached) identity hash of this block.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("hash", &self.hash())
            .field("transactions", &self.transactions.len())
            .finish()
    }
}

impl WireSerialize for Block {
    fn wire_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.header.wire_serialize(&mut target)?;
        self.transactions.wire_serialize(&mut target)
    }
}

impl WireDeserialize for Block {
    fn wire_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        let mut src = reader.take(MAX_BLOCK_BYTES);
        let header = Header::wire_deserialize(&mut src)?;

        let txn_count = CompactInt::wire_deserialize(&mut src)?.value();
        // Every transaction needs at least one 36-byte outpoint, so a claim
        // beyond this is a DoS attempt, not a block.
        if txn_count > MAX_BLOCK_BYTES / 36 {
            return Err(SerializationError::BadFormat {
                field: "txn_count",
                reason: "more transactions than could fit in a block",
            });
        }

        let mut transactions = Vec::with_capacity(std::cmp::min(txn_count as usize, 1024));
        for _ in 0..txn_count {
            transactions.push(<Arc<Transaction>>::wire_deserialize(&mut src)?);
        }

        Ok(Block {
            header,
            transactions,
        })
    }
}

impl<'a> From<&'a Block> for Hash {
    fn from(block: &'a Block) -> Hash {
        (&block.header).into()
    }
}
