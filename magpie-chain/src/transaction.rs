//! Transactions and transaction-related structures.

mod hash;

pub use hash::Hash;

use crate::cached::Cached;
use crate::transparent;
use crate::{SerializationError, WireDeserialize, WireSerialize};

/// The maximum serialized size of a transaction, used to bound parsing.
pub const MAX_TX_SIZE: u64 = 1_000_000;

/// A transaction: an encoded transfer of value between outputs.
///
/// SegWit and later extensions are not supported; the serialization is the
/// original four-field form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// The transaction version.
    pub version: u32,
    /// The transaction inputs. Consensus requires at least one.
    pub inputs: Vec<transparent::Input>,
    /// The transaction outputs. Consensus requires at least one.
    pub outputs: Vec<transparent::Output>,
    /// Earliest time or block height at which the transaction may be mined.
    pub lock_time: u32,
    hash: Cached<Hash>,
}

impl Transaction {
    pub fn new(
        version: u32,
        inputs: Vec<transparent::Input>,
        outputs: Vec<transparent::Output>,
        lock_time: u32,
    ) -> Transaction {
        Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            hash: Cached::new(),
        }
    }

    /// The txid: the SHA-256d hash of the serialized transaction.
    pub fn hash(&self) -> Hash {
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        Hash::from(self)
    }

    /// Returns `true` if this transaction is a coinbase transaction.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && matches!(
                self.inputs.get(0),
                Some(transparent::Input::Coinbase { .. })
            )
    }

    /// Checked sum of all output values.
    pub fn output_sum(&self) -> Option<crate::Amount> {
        crate::Amount::sum(self.outputs.iter().map(|o| o.value))
    }
}

impl WireSerialize for Transaction {
    fn wire_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.version.wire_serialize(&mut target)?;
        self.inputs.wire_serialize(&mut target)?;
        self.outputs.wire_serialize(&mut target)?;
        self.lock_time.wire_serialize(&mut target)
    }
}

/// Deserializes a transaction, calculating and caching its txid.
impl WireDeserialize for Transaction {
    fn wire_deserialize<R: std::io::Read>(src: R) -> Result<Self, SerializationError> {
        let mut src = src.take(MAX_TX_SIZE);
        let version = u32::wire_deserialize(&mut src)?;
        let inputs = <Vec<transparent::Input>>::wire_deserialize(&mut src)?;
        let outputs = <Vec<transparent::Output>>::wire_deserialize(&mut src)?;
        let lock_time = u32::wire_deserialize(&mut src)?;

        if inputs.is_empty() {
            return Err(SerializationError::BadFormat {
                field: "tx_in",
                reason: "transaction has no inputs",
            });
        }
        if outputs.is_empty() {
            return Err(SerializationError::BadFormat {
                field: "tx_out",
                reason: "transaction has no outputs",
            });
        }

        let mut tx = Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            hash: Cached::new(),
        };
        let own_hash = tx.hash();
        tx.hash = Cached::from(own_hash);
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    /// The coinbase transaction of Bitcoin block 1.
    const BLOCK_1_COINBASE: &str =
        "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff\
         0704ffff001d0104ffffffff0100f2052a0100000043410496b538e853519c726a2c91e61ec1160\
         0ae1390813a627c66fb8be7947be63c52da7589379515d4e0a604f8141781e62294721166bf621e\
         73a82cbf2342c858eeac00000000";

    #[test]
    fn parse_block_1_coinbase() {
        let raw = hex::decode(BLOCK_1_COINBASE).unwrap();
        let tx = Transaction::wire_deserialize(&raw[..]).unwrap();
        assert!(tx.is_coinbase());
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, crate::Amount::from_sat(50 * 100_000_000));
        assert_eq!(
            tx.hash(),
            Hash::from_str("0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098")
                .unwrap(),
        );
        // Round trip back to the original bytes.
        assert_eq!(tx.wire_serialize_to_vec().unwrap(), raw);
    }

    #[test]
    fn inputless_transaction_is_rejected() {
        // version 1, zero inputs, one zero-value empty-script output,
        // lock_time 0
        let raw = hex::decode("0100000000010000000000000000000000000000").unwrap();
        assert!(Transaction::wire_deserialize(&raw[..]).is_err());
    }
}
