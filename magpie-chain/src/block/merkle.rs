//! The Bitcoin-inherited transaction Merkle tree.

use std::io;

use crate::serialization::{sha256d, SerializationError, WireDeserialize, WireSerialize};
use crate::transaction;

/// The root of a transaction Merkle tree.
///
/// Note that because of a design flaw inherited from Bitcoin
/// (CVE-2012-2459), the duplicate-last-entry rule below means distinct
/// transaction lists can merkle-ize to the same root; the stores treat a
/// matching root as necessary, not sufficient, for block identity.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Root(pub [u8; 32]);

impl Root {
    /// Compute the Merkle root of an ordered transaction hash list.
    ///
    /// Levels with an odd count duplicate their final entry; pairs are
    /// combined with SHA-256d until a single root remains. The empty list
    /// has no root.
    pub fn from_hashes(hashes: &[transaction::Hash]) -> Option<Root> {
        if hashes.is_empty() {
            return None;
        }

        let mut level: Vec<[u8; 32]> = hashes.iter().map(|h| h.0).collect();
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(*level.last().expect("level is non-empty"));
            }
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut concat = [0u8; 64];
                    concat[..32].copy_from_slice(&pair[0]);
                    concat[32..].copy_from_slice(&pair[1]);
                    sha256d::hash(&concat)
                })
                .collect();
        }
        Some(Root(level[0]))
    }

    pub fn from_bytes_exact(bytes: [u8; 32]) -> Root {
        Root(bytes)
    }
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.debug_tuple("merkle::Root")
            .field(&hex::encode(reversed_bytes))
            .finish()
    }
}

impl WireSerialize for Root {
    fn wire_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.0.wire_serialize(target)
    }
}

impl WireDeserialize for Root {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Root(<[u8; 32]>::wire_deserialize(&mut reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx_hash(byte: u8) -> transaction::Hash {
        transaction::Hash([byte; 32])
    }

    #[test]
    fn single_transaction_root_is_its_hash() {
        let root = Root::from_hashes(&[tx_hash(7)]).unwrap();
        assert_eq!(root.0, [7u8; 32]);
    }

    #[test]
    fn empty_list_has_no_root() {
        assert_eq!(Root::from_hashes(&[]), None);
    }

    #[test]
    fn odd_levels_duplicate_the_last_hash() {
        // With three leaves, the last is paired with itself.
        let root3 = Root::from_hashes(&[tx_hash(1), tx_hash(2), tx_hash(3)]).unwrap();
        let root4 =
            Root::from_hashes(&[tx_hash(1), tx_hash(2), tx_hash(3), tx_hash(3)]).unwrap();
        assert_eq!(root3, root4);
    }

    #[test]
    fn order_changes_the_root() {
        let forward = Root::from_hashes(&[tx_hash(1), tx_hash(2)]).unwrap();
        let reverse = Root::from_hashes(&[tx_hash(2), tx_hash(1)]).unwrap();
        assert_ne!(forward, reverse);
    }
}
