use std::{fmt, io};

use crate::serialization::{sha256d, SerializationError, WireDeserialize, WireSerialize};

use super::Header;

/// A hash of a block, used to identify blocks and link them into a chain.
///
/// Technically this is the SHA-256d hash of the block *header*, but since
/// the header commits to the Merkle root of the transactions, it binds the
/// entire block.
///
/// Displayed in big-endian byte order, following the convention set by the
/// original client; stored and transmitted in little-endian order.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn from_bytes_exact(bytes: [u8; 32]) -> Hash {
        Hash(bytes)
    }

    /// The all-zero hash, used as the pre-genesis parent and the "no stop
    /// hash" sentinel in locator messages.
    pub fn zero() -> Hash {
        Hash([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.write_str(&hex::encode(reversed_bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.debug_tuple("block::Hash")
            .field(&hex::encode(reversed_bytes))
            .finish()
    }
}

impl WireSerialize for Hash {
    fn wire_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.0.wire_serialize(target)
    }
}

impl WireDeserialize for Hash {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Hash(<[u8; 32]>::wire_deserialize(&mut reader)?))
    }
}

impl<'a> From<&'a Header> for Hash {
    fn from(header: &'a Header) -> Self {
        let mut hash_writer = sha256d::Writer::default();
        header
            .wire_serialize(&mut hash_writer)
            .expect("hash writer is infallible");
        Self(hash_writer.finish())
    }
}

impl std::str::FromStr for Hash {
    type Err = SerializationError;

    /// Parse a big-endian (display order) hex hash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        if hex::decode_to_slice(s, &mut bytes[..]).is_err() {
            Err(SerializationError::Parse("hex decoding error"))
        } else {
            bytes.reverse();
            Ok(Hash(bytes))
        }
    }
}
