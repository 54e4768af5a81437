//! Newtype wrappers for primitive protocol types.

use std::fmt;

use magpie_chain::parameters::Coin;
use magpie_chain::{SerializationError, WireDeserialize, WireSerialize};

/// A nonce used in the networking layer to identify messages.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Nonce(pub u64);

impl Nonce {
    pub fn random() -> Nonce {
        use rand::Rng;
        Nonce(rand::thread_rng().gen())
    }
}

impl WireSerialize for Nonce {
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.wire_serialize(target)
    }
}

impl WireDeserialize for Nonce {
    fn wire_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Nonce(u64::wire_deserialize(reader)?))
    }
}

/// A protocol version number.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct ProtocolVersion(pub u32);

impl WireSerialize for ProtocolVersion {
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.wire_serialize(target)
    }
}

impl WireDeserialize for ProtocolVersion {
    fn wire_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(ProtocolVersion(u32::wire_deserialize(reader)?))
    }
}

/// The four magic bytes that open every message frame.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Magic(pub [u8; 4]);

impl From<&Coin> for Magic {
    fn from(coin: &Coin) -> Self {
        Magic(coin.magic)
    }
}

impl fmt::Debug for Magic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Magic").field(&hex::encode(self.0)).finish()
    }
}

bitflags::bitflags! {
    /// The service bits a node advertises.
    pub struct PeerServices: u64 {
        /// The node can serve full blocks.
        const NODE_NETWORK = 1;
    }
}

impl WireSerialize for PeerServices {
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.bits().wire_serialize(target)
    }
}

impl WireDeserialize for PeerServices {
    fn wire_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        // Unknown service bits are ignored rather than rejected.
        Ok(PeerServices::from_bits_truncate(u64::wire_deserialize(
            reader,
        )?))
    }
}
