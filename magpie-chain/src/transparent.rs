//! Transparent (Bitcoin-inherited) inputs, outputs and scripts.

use std::io::{Read, Write};

use magpie_serde_derive::{WireDeserialize, WireSerialize};

use crate::amount::Amount;
use crate::compactint::CompactInt;
use crate::{
    transaction, SerializationError, WireDeserialize, WireSerialize,
};

/// The sequence number a coinbase input carries.
const COINBASE_SEQUENCE: u32 = u32::MAX;

/// An encoding of a script, opaque at this layer.
///
/// The script virtual machine interprets these bytes; everything else
/// treats them as a length-prefixed blob.
#[derive(Clone, Default, Eq, PartialEq, Hash)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn serialized_size(&self) -> usize {
        CompactInt::size(self.0.len()) + self.0.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("Script").field(&hex::encode(&self.0)).finish()
    }
}

impl WireSerialize for Script {
    fn wire_serialize<W: Write>(&self, mut writer: W) -> Result<(), std::io::Error> {
        CompactInt::from(self.0.len()).wire_serialize(&mut writer)?;
        writer.write_all(&self.0[..])
    }
}

impl WireDeserialize for Script {
    fn wire_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = CompactInt::wire_deserialize(&mut reader)?.value();
        let mut bytes = Vec::with_capacity(std::cmp::min(len, 1024) as usize);
        (&mut reader).take(len).read_to_end(&mut bytes)?;
        if (bytes.len() as u64) < len {
            return Err(SerializationError::BadFormat {
                field: "script",
                reason: "script shorter than its declared length",
            });
        }
        Ok(Script(bytes))
    }
}

/// A reference to a particular output of a previous transaction.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, WireSerialize, WireDeserialize)]
pub struct OutPoint {
    /// The transaction containing the output being spent.
    pub hash: transaction::Hash,
    /// Which output of that transaction is referenced; the first is 0.
    pub index: u32,
}

impl OutPoint {
    #[inline]
    pub const fn len() -> usize {
        36
    }

    /// The placeholder outpoint a coinbase input carries: a zero hash and
    /// an all-ones index.
    pub fn null() -> OutPoint {
        OutPoint {
            hash: transaction::Hash([0u8; 32]),
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.hash.0 == [0u8; 32] && self.index == u32::MAX
    }
}

/// Arbitrary data inserted by miners into a coinbase input's script slot.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct CoinbaseData(pub Vec<u8>);

impl AsRef<[u8]> for CoinbaseData {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for CoinbaseData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CoinbaseData")
            .field(&hex::encode(&self.0))
            .finish()
    }
}

/// A transparent input to a transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Input {
    /// A spend of an output of a previous transaction.
    PrevOut {
        /// The previous output being spent.
        outpoint: OutPoint,
        /// The script that authorizes spending `outpoint`.
        signature_script: Script,
        /// The sequence number for the input.
        sequence: u32,
    },
    /// New coins created by the block reward. The wire form is an input
    /// with a null outpoint whose script slot holds free-form miner data;
    /// it is never script-verified.
    Coinbase {
        /// Free data inserted by the miner.
        data: CoinbaseData,
        /// The sequence number for the input.
        sequence: u32,
    },
}

impl Input {
    /// The outpoint this input spends, if it spends one.
    pub fn outpoint(&self) -> Option<OutPoint> {
        match self {
            Input::PrevOut { outpoint, .. } => Some(*outpoint),
            Input::Coinbase { .. } => None,
        }
    }

    pub fn sequence(&self) -> u32 {
        match self {
            Input::PrevOut { sequence, .. } | Input::Coinbase { sequence, .. } => *sequence,
        }
    }
}

impl WireSerialize for Input {
    fn wire_serialize<W: Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        match self {
            Input::PrevOut {
                outpoint,
                signature_script,
                sequence,
            } => {
                outpoint.wire_serialize(&mut target)?;
                signature_script.wire_serialize(&mut target)?;
                sequence.wire_serialize(&mut target)
            }
            Input::Coinbase { data, sequence } => {
                OutPoint::null().wire_serialize(&mut target)?;
                CompactInt::from(data.0.len()).wire_serialize(&mut target)?;
                target.write_all(&data.0)?;
                sequence.wire_serialize(&mut target)
            }
        }
    }
}

impl WireDeserialize for Input {
    fn wire_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let outpoint = OutPoint::wire_deserialize(&mut reader)?;
        let script = Script::wire_deserialize(&mut reader)?;
        let sequence = u32::wire_deserialize(&mut reader)?;
        if outpoint.is_null() {
            Ok(Input::Coinbase {
                data: CoinbaseData(script.0),
                sequence,
            })
        } else {
            Ok(Input::PrevOut {
                outpoint,
                signature_script: script,
                sequence,
            })
        }
    }
}

/// A transparent output from a transaction.
///
/// The UTXO set is exactly the set of unspent `Output`s; each is an
/// indivisible unit of value consumed in its entirety by a later input.
#[derive(Clone, Debug, Eq, PartialEq, Hash, WireSerialize, WireDeserialize)]
pub struct Output {
    /// The output value in satoshis.
    pub value: Amount,
    /// The script that must be satisfied to spend this output.
    pub pk_script: Script,
}

/// Build a coinbase input for tests and round trips.
pub fn coinbase_input(data: Vec<u8>) -> Input {
    Input::Coinbase {
        data: CoinbaseData(data),
        sequence: COINBASE_SEQUENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coinbase_round_trip() {
        let input = coinbase_input(b"magpie".to_vec());
        let bytes = input.wire_serialize_to_vec().unwrap();
        // null hash + index + varint + data + sequence
        assert_eq!(bytes.len(), 32 + 4 + 1 + 6 + 4);
        let parsed = Input::wire_deserialize(&bytes[..]).unwrap();
        assert_eq!(parsed, input);
    }

    #[test]
    fn prevout_round_trip() {
        let input = Input::PrevOut {
            outpoint: OutPoint {
                hash: transaction::Hash([0xab; 32]),
                index: 3,
            },
            signature_script: Script(vec![0x51]),
            sequence: 0xffff_fffe,
        };
        let bytes = input.wire_serialize_to_vec().unwrap();
        assert_eq!(Input::wire_deserialize(&bytes[..]).unwrap(), input);
    }
}
