use magpie_chain::{block, SerializationError, WireDeserialize, WireSerialize};

/// A `getblocks` message body (after the leading protocol version, which
/// the codec handles).
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct GetBlocks {
    /// The sender's best known block hashes, newest first.
    pub block_locator_hashes: Vec<block::Hash>,
    /// The last block to send, or `None` (the all-zero hash on the wire)
    /// for "as many as allowed".
    pub stop_hash: Option<block::Hash>,
}

impl WireDeserialize for GetBlocks {
    fn wire_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let block_locator_hashes = Vec::wire_deserialize(&mut reader)?;
        let raw_stop_hash = block::Hash::wire_deserialize(&mut reader)?;
        let stop_hash = if raw_stop_hash.is_zero() {
            None
        } else {
            Some(raw_stop_hash)
        };
        Ok(GetBlocks {
            block_locator_hashes,
            stop_hash,
        })
    }
}

impl WireSerialize for GetBlocks {
    fn wire_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.block_locator_hashes.wire_serialize(&mut target)?;
        self.stop_hash
            .unwrap_or_else(block::Hash::zero)
            .wire_serialize(&mut target)
    }
}
