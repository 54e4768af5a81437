//! The Bitcoin variable-length integer ("varint").

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{SerializationError, WireDeserialize, WireSerialize};

/// A variable-length integer: lengths below 0xfd are a single byte, larger
/// values get a marker byte followed by a 2, 4 or 8 byte little-endian
/// integer.
///
/// The shortest encoding is always produced on write; non-canonical
/// encodings are accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactInt(u64);

impl CompactInt {
    pub fn from(value: usize) -> CompactInt {
        CompactInt(value as u64)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The encoded size, in bytes, of `value`.
    pub fn size(value: usize) -> usize {
        if value < 0xfd {
            1
        } else if value <= u16::MAX as usize {
            3
        } else if value <= u32::MAX as usize {
            5
        } else {
            9
        }
    }
}

impl WireSerialize for CompactInt {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        if self.0 < 0xfd {
            target.write_all(&[self.0 as u8])
        } else if self.0 <= u16::MAX as u64 {
            target.write_all(&[0xfd])?;
            target.write_u16::<LittleEndian>(self.0 as u16)
        } else if self.0 <= u32::MAX as u64 {
            target.write_all(&[0xfe])?;
            target.write_u32::<LittleEndian>(self.0 as u32)
        } else {
            target.write_all(&[0xff])?;
            target.write_u64::<LittleEndian>(self.0)
        }
    }
}

impl WireDeserialize for CompactInt {
    fn wire_deserialize<R: std::io::Read>(mut reader: R) -> Result<CompactInt, SerializationError> {
        let first = u8::wire_deserialize(&mut reader)?;
        match first {
            0xfd => Ok(CompactInt(u16::wire_deserialize(&mut reader)? as u64)),
            0xfe => Ok(CompactInt(u32::wire_deserialize(&mut reader)? as u64)),
            0xff => Ok(CompactInt(u64::wire_deserialize(&mut reader)?)),
            small => Ok(CompactInt(small as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn boundary_encodings() {
        let cases: [(u64, &[u8]); 6] = [
            (0, &[0x00]),
            (0xfc, &[0xfc]),
            (0xfd, &[0xfd, 0xfd, 0x00]),
            (0xffff, &[0xfd, 0xff, 0xff]),
            (0x10000, &[0xfe, 0x00, 0x00, 0x01, 0x00]),
            (
                0x1_0000_0000,
                &[0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
            ),
        ];
        for (value, encoding) in cases.iter() {
            let got = CompactInt(*value).wire_serialize_to_vec().unwrap();
            assert_eq!(&got[..], *encoding, "encoding of {}", value);
            assert_eq!(got.len(), CompactInt::size(*value as usize));
        }
    }

    #[test]
    fn non_canonical_read_accepted() {
        // 5 encoded with the u16 form still reads back as 5.
        let parsed = CompactInt::wire_deserialize(Cursor::new(&[0xfd, 0x05, 0x00])).unwrap();
        assert_eq!(parsed.value(), 5);
    }

    proptest! {
        #[test]
        fn round_trip(value in any::<u64>()) {
            let bytes = CompactInt(value).wire_serialize_to_vec().unwrap();
            let parsed = CompactInt::wire_deserialize(Cursor::new(&bytes)).unwrap();
            prop_assert_eq!(parsed.value(), value);
        }
    }
}
