//! SHA-256d (double SHA-256), the identity hash of the Bitcoin family.

use std::io;

use sha2::{Digest, Sha256};

/// Compute the double SHA-256 of `data`.
pub fn hash(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// The first four bytes of a SHA-256d digest, used as the frame checksum.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Checksum(pub [u8; 4]);

impl<'a> From<&'a [u8]> for Checksum {
    fn from(bytes: &'a [u8]) -> Self {
        let digest = hash(bytes);
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&digest[0..4]);
        Self(checksum)
    }
}

/// An incremental writer that SHA-256d-hashes everything written into it.
///
/// Lets callers hash a structure directly through its `WireSerialize` impl
/// without materializing the serialized bytes.
#[derive(Default)]
pub struct Writer {
    hash: Sha256,
}

impl Writer {
    /// Consume the writer, returning the double hash of all bytes written.
    pub fn finish(self) -> [u8; 32] {
        let first = self.hash.finalize();
        let second = Sha256::digest(first);
        second.into()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hash.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn checksum_of_empty_payload() {
        // sha256d("") starts with 5d f6 e0 e2.
        assert_eq!(Checksum::from(&b""[..]), Checksum([0x5d, 0xf6, 0xe0, 0xe2]));
    }

    #[test]
    fn writer_matches_one_shot() {
        let data = b"the quick brown fox";
        let mut writer = Writer::default();
        writer.write_all(&data[..5]).unwrap();
        writer.write_all(&data[5..]).unwrap();
        assert_eq!(writer.finish(), hash(data));
    }
}
