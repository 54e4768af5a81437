//! Proof-of-work: compact difficulty targets and the hash-function
//! selector that lets scrypt coins share the Bitcoin header format.

use crate::serialization::sha256d;
use crate::{SerializationError, WireDeserialize, WireSerialize};

/// An nBits-encoded difficulty threshold, as found in block headers.
///
/// The compact form is a base-256 floating point number: the high byte is
/// an exponent (a byte length) and the low three bytes are the mantissa.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CompactDifficulty(pub u32);

impl CompactDifficulty {
    /// Expand to a 256-bit big-endian target.
    ///
    /// Exponents larger than 32 bytes cannot be represented; they saturate
    /// to the all-ones target, which every hash satisfies, matching the
    /// arbitrary-precision behavior of the reference client lineage.
    pub fn to_target(self) -> [u8; 32] {
        let exponent = (self.0 >> 24) as usize;
        let mantissa = self.0 & 0x007f_ffff;

        let mut target = [0u8; 32];
        if exponent > 32 {
            return [0xff; 32];
        }
        let bytes = [
            (mantissa >> 16) as u8,
            (mantissa >> 8) as u8,
            mantissa as u8,
        ];
        for (i, byte) in bytes.iter().enumerate() {
            // byte i of the mantissa has significance exponent - 1 - i
            let significance = exponent as isize - 1 - i as isize;
            if significance < 0 {
                continue;
            }
            let position = 31 - significance as usize;
            target[position] = *byte;
        }
        target
    }
}

impl WireSerialize for CompactDifficulty {
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.wire_serialize(target)
    }
}

impl WireDeserialize for CompactDifficulty {
    fn wire_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(CompactDifficulty(u32::wire_deserialize(reader)?))
    }
}

/// The proof-of-work function a coin mines with.
///
/// The block identity hash is always SHA-256d; only the difficulty check
/// uses this function.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProofOfWork {
    Sha256d,
    /// scrypt(N=1024, r=1, p=1) with the header as its own salt, as used by
    /// the Litecoin family.
    Scrypt,
}

impl ProofOfWork {
    pub fn hash(&self, header: &[u8]) -> [u8; 32] {
        match self {
            ProofOfWork::Sha256d => sha256d::hash(header),
            ProofOfWork::Scrypt => {
                let params = scrypt::Params::new(10, 1, 1, 32)
                    .expect("fixed scrypt parameters are valid");
                let mut output = [0u8; 32];
                scrypt::scrypt(header, header, &params, &mut output)
                    .expect("32-byte output length is valid");
                output
            }
        }
    }

    /// Check the proof-of-work of an 80-byte header against its own nBits.
    pub fn meets_target(&self, header: &[u8], bits: CompactDifficulty) -> bool {
        let mut digest = self.hash(header);
        digest.reverse();
        digest <= bits.to_target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_one_target() {
        // 0x1d00ffff is the Bitcoin genesis difficulty.
        let target = CompactDifficulty(0x1d00ffff).to_target();
        let mut expected = [0u8; 32];
        expected[3] = 0xff;
        expected[4] = 0xff;
        assert_eq!(target, expected);
    }

    #[test]
    fn small_exponent_shifts_mantissa_out() {
        let target = CompactDifficulty(0x01_00_30_00).to_target();
        // Exponent 1 keeps only the mantissa's most significant byte.
        let mut expected = [0u8; 32];
        expected[31] = 0x00;
        assert_eq!(target, expected);

        let target = CompactDifficulty(0x02_12_34_00).to_target();
        let mut expected = [0u8; 32];
        expected[30] = 0x12;
        expected[31] = 0x34;
        assert_eq!(target, expected);
    }

    #[test]
    fn genesis_header_meets_target() {
        let header = hex::decode(
            "0100000000000000000000000000000000000000000000000000000000000000\
             000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa\
             4b1e5e4a29ab5f49ffff001d1dac2b7c",
        )
        .unwrap();
        assert!(ProofOfWork::Sha256d.meets_target(&header, CompactDifficulty(486604799)));
        // Corrupt the nonce; the hash no longer meets the target.
        let mut bad = header;
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        assert!(!ProofOfWork::Sha256d.meets_target(&bad, CompactDifficulty(486604799)));
    }
}
