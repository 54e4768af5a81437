//! Inventory items.
//!
//! An "inventory vector" on the wire is just a typed hash: a u32 object
//! type followed by a 32-byte hash.

use std::io::{Read, Write};

use magpie_chain::{block, transaction, SerializationError, WireDeserialize, WireSerialize};

/// An inventory hash which refers to some advertised or requested data.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InventoryHash {
    /// Data of this type may be ignored.
    Error,
    /// A hash of a transaction.
    Tx(transaction::Hash),
    /// A hash of a block.
    Block(block::Hash),
    /// A hash of a block header, requesting a filtered block reply. This
    /// node never requests these but must parse them.
    FilteredBlock(block::Hash),
}

impl From<transaction::Hash> for InventoryHash {
    fn from(tx: transaction::Hash) -> InventoryHash {
        InventoryHash::Tx(tx)
    }
}

impl From<block::Hash> for InventoryHash {
    fn from(hash: block::Hash) -> InventoryHash {
        InventoryHash::Block(hash)
    }
}

impl WireSerialize for InventoryHash {
    fn wire_serialize<W: Write>(&self, mut writer: W) -> Result<(), std::io::Error> {
        let (code, bytes) = match *self {
            InventoryHash::Error => (0u32, [0; 32]),
            InventoryHash::Tx(hash) => (1, hash.0),
            InventoryHash::Block(hash) => (2, hash.0),
            InventoryHash::FilteredBlock(hash) => (3, hash.0),
        };
        code.wire_serialize(&mut writer)?;
        bytes.wire_serialize(&mut writer)
    }
}

impl WireDeserialize for InventoryHash {
    fn wire_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let code = u32::wire_deserialize(&mut reader)?;
        let bytes = <[u8; 32]>::wire_deserialize(&mut reader)?;
        match code {
            0 => Ok(InventoryHash::Error),
            1 => Ok(InventoryHash::Tx(transaction::Hash(bytes))),
            2 => Ok(InventoryHash::Block(block::Hash(bytes))),
            3 => Ok(InventoryHash::FilteredBlock(block::Hash(bytes))),
            _ => Err(SerializationError::BadFormat {
                field: "inventory type",
                reason: "unknown object type",
            }),
        }
    }
}
