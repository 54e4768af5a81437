use std::io::{Cursor, Read, Write};

use chrono::{DateTime, Utc};

use crate::cached::Cached;
use crate::compactint::CompactInt;
use crate::serialization::sha256d;
use crate::work::CompactDifficulty;
use crate::{SerializationError, WireDeserialize, WireSerialize};

use super::{merkle, Hash};

/// A block header, containing metadata about a block.
///
/// Blocks are chained together by the backwards reference (previous header
/// hash) in each header, all the way back to the genesis block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    /// The block's version field.
    pub version: u32,

    /// The hash of the previous block. This ensures no previous block can
    /// be changed without also changing this block's header.
    pub previous_block_hash: Hash,

    /// The root of the transaction Merkle tree, binding the header to the
    /// transactions in the block.
    pub merkle_root: merkle::Root,

    /// When the miner started hashing the header (according to the miner).
    pub time: DateTime<Utc>,

    /// The difficulty threshold this header's proof-of-work hash must meet,
    /// in compact nBits form.
    pub bits: CompactDifficulty,

    /// Freely chosen by the miner to vary the header hash.
    pub nonce: u32,

    /// The identity hash, cached at deserialization time. Not part of the
    /// consensus serialization.
    hash: Cached<Hash>,
}

impl Header {
    /// Length of the serialized header in bytes.
    pub const fn len() -> usize {
        80
    }

    pub fn new(
        version: u32,
        previous_block_hash: Hash,
        merkle_root: merkle::Root,
        time: DateTime<Utc>,
        bits: CompactDifficulty,
        nonce: u32,
    ) -> Header {
        Header {
            version,
            previous_block_hash,
            merkle_root,
            time,
            bits,
            nonce,
            hash: Cached::new(),
        }
    }

    /// The identity hash of this header.
    pub fn hash(&self) -> Hash {
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        Hash::from(self)
    }
}

impl WireSerialize for Header {
    fn wire_serialize<W: Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.version.wire_serialize(&mut target)?;
        self.previous_block_hash.wire_serialize(&mut target)?;
        self.merkle_root.wire_serialize(&mut target)?;
        self.time.wire_serialize(&mut target)?;
        self.bits.wire_serialize(&mut target)?;
        self.nonce.wire_serialize(&mut target)
    }
}

/// Deserializes a header, hashing the 80 raw bytes once so the identity
/// hash comes for free.
impl WireDeserialize for Header {
    fn wire_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let mut raw = [0u8; Header::len()];
        reader.read_exact(&mut raw)?;
        let own_hash = Hash(sha256d::hash(&raw));

        let mut src = Cursor::new(&raw[..]);
        Ok(Header {
            version: u32::wire_deserialize(&mut src)?,
            previous_block_hash: Hash::wire_deserialize(&mut src)?,
            merkle_root: merkle::Root::wire_deserialize(&mut src)?,
            time: <DateTime<Utc>>::wire_deserialize(&mut src)?,
            bits: CompactDifficulty::wire_deserialize(&mut src)?,
            nonce: u32::wire_deserialize(&mut src)?,
            hash: Cached::from(own_hash),
        })
    }
}

/// A header with a count of the number of transactions in its block.
///
/// The `headers` message carries these: each 80-byte header is suffixed
/// with a varint transaction count (always zero in practice, since headers
/// are sent without bodies).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountedHeader {
    pub header: Header,
    pub transaction_count: u64,
}

impl WireSerialize for CountedHeader {
    fn wire_serialize<W: Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.header.wire_serialize(&mut target)?;
        CompactInt::from(self.transaction_count as usize).wire_serialize(&mut target)
    }
}

impl WireDeserialize for CountedHeader {
    fn wire_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(CountedHeader {
            header: Header::wire_deserialize(&mut reader)?,
            transaction_count: CompactInt::wire_deserialize(&mut reader)?.value(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    /// Bitcoin block 1, header only.
    const BLOCK_1: &str = "010000006fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d619000000\
                           0000982051fd1e4ba744bbbe680e1fee14677ba1a3c3540bf7b1cdb606e857233e\
                           0e61bc6649ffff001d01e36299";

    #[test]
    fn parse_caches_the_hash() {
        let raw = hex::decode(BLOCK_1).unwrap();
        let header = Header::wire_deserialize(&raw[..]).unwrap();
        assert_eq!(
            header.hash(),
            Hash::from_str("00000000839a8e6886ab5951d76f411475428afc90947ee320161bbf18eb6048")
                .unwrap(),
        );
        assert_eq!(
            header.previous_block_hash,
            Hash::from_str("000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f")
                .unwrap(),
        );
        assert_eq!(header.bits, CompactDifficulty(486604799));
    }

    #[test]
    fn round_trip_preserves_raw_bytes() {
        let raw = hex::decode(BLOCK_1).unwrap();
        let header = Header::wire_deserialize(&raw[..]).unwrap();
        assert_eq!(header.wire_serialize_to_vec().unwrap(), raw);
    }

    #[test]
    fn short_header_is_rejected() {
        let raw = hex::decode(BLOCK_1).unwrap();
        assert!(Header::wire_deserialize(&raw[..79]).is_err());
    }
}
