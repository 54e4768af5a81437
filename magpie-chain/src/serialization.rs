//! Consensus-critical wire serialization.
//!
//! Two traits mirror Serde's split: [`WireSerialize`] and
//! [`WireDeserialize`], but for the Bitcoin-inherited binary formats where
//! every byte is consensus-relevant. All multi-byte integers are
//! little-endian except socket ports, which the protocol transmits
//! big-endian.

mod deserialize;
mod error;

pub mod sha256d;

use std::net::IpAddr;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use chrono::{DateTime, Utc};

pub use deserialize::{WireDeserialize, WireDeserializeInto};
pub use error::SerializationError;

use crate::compactint::CompactInt;

pub trait WireSerialize {
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error>;

    fn wire_serialize_to_vec(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut data = Vec::new();
        self.wire_serialize(&mut data)?;
        Ok(data)
    }
}

impl WireSerialize for bool {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(&[*self as u8])
    }
}

impl WireSerialize for u16 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u16::<LittleEndian>(*self)
    }
}

impl WireSerialize for u32 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u32::<LittleEndian>(*self)
    }
}

impl WireSerialize for u64 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u64::<LittleEndian>(*self)
    }
}

impl WireSerialize for i32 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i32::<LittleEndian>(*self)
    }
}

impl WireSerialize for i64 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i64::<LittleEndian>(*self)
    }
}

impl WireSerialize for DateTime<Utc> {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        // Protocol timestamps are u32 seconds; clamp rather than wrap so a
        // far-future clock cannot produce an ancient timestamp.
        let seconds = self.timestamp();
        let seconds = if seconds < 0 {
            0
        } else if seconds > u32::MAX as i64 {
            u32::MAX
        } else {
            seconds as u32
        };
        target.write_u32::<LittleEndian>(seconds)
    }
}

impl WireSerialize for std::net::Ipv6Addr {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(&self.octets())
    }
}

impl WireSerialize for std::net::IpAddr {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        match self {
            IpAddr::V4(addr) => addr.to_ipv6_mapped().wire_serialize(&mut target),
            IpAddr::V6(addr) => addr.wire_serialize(&mut target),
        }
    }
}

impl WireSerialize for std::net::SocketAddr {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        self.ip().wire_serialize(&mut target)?;
        target.write_u16::<BigEndian>(self.port())
    }
}

impl WireSerialize for &[u8] {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WireSerialize for [u8; 4] {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WireSerialize for [u8; 8] {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WireSerialize for [u8; 12] {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WireSerialize for [u8; 32] {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

/// Byte strings serialize as a varint length followed by the raw bytes.
impl WireSerialize for Vec<u8> {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).wire_serialize(&mut target)?;
        target.write_all(self)
    }
}

impl<T> WireSerialize for Vec<T>
where
    T: WireSerialize,
{
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).wire_serialize(&mut target)?;
        for item in self.iter() {
            item.wire_serialize(&mut target)?;
        }
        Ok(())
    }
}

impl WireSerialize for String {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).wire_serialize(&mut target)?;
        target.write_all(self.as_bytes())
    }
}

impl<T, U> WireSerialize for (T, U)
where
    T: WireSerialize,
    U: WireSerialize,
{
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        self.0.wire_serialize(&mut target)?;
        self.1.wire_serialize(&mut target)
    }
}

impl<T: WireSerialize> WireSerialize for std::sync::Arc<T> {
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        T::wire_serialize(self, target)
    }
}
