use std::fmt;

use crate::serialization::{sha256d, SerializationError, WireDeserialize, WireSerialize};

use super::Transaction;

/// A transaction hash (txid): the SHA-256d of the serialized transaction.
///
/// Displayed in big-endian byte order, stored little-endian, like block
/// hashes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; 32]);

impl<'a> From<&'a Transaction> for Hash {
    fn from(transaction: &'a Transaction) -> Self {
        let mut hash_writer = sha256d::Writer::default();
        transaction
            .wire_serialize(&mut hash_writer)
            .expect("hash writer is infallible");
        Self(hash_writer.finish())
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
        f.debug_tuple("transaction::Hash")
            .field(&hex::encode(reversed_bytes))
            .finish()
    }
}

impl WireSerialize for Hash {
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.wire_serialize(target)
    }
}

impl WireDeserialize for Hash {
    fn wire_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Hash(<[u8; 32]>::wire_deserialize(&mut reader)?))
    }
}

impl std::str::FromStr for Hash {
    type Err = SerializationError;

    /// Parse a big-endian (display order) hex txid.
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
