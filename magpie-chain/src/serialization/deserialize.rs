use std::net::{Ipv6Addr, SocketAddr};
use std::{
    io,
    io::Read,
    net::IpAddr::{V4, V6},
};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use chrono::{DateTime, TimeZone, Utc};

use super::{CompactInt, SerializationError};

type Result<R> = std::result::Result<R, SerializationError>;

pub trait WireDeserialize {
    fn wire_deserialize<R: io::Read>(reader: R) -> Result<Self>
    where
        Self: Sized;
}

/// Helper for deserializing more succinctly via type inference.
pub trait WireDeserializeInto {
    fn wire_deserialize_into<T>(self) -> Result<T>
    where
        T: WireDeserialize;
}

impl<R: io::Read> WireDeserializeInto for R {
    fn wire_deserialize_into<T>(self) -> Result<T>
    where
        T: WireDeserialize,
    {
        T::wire_deserialize(self)
    }
}

impl WireDeserialize for bool {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<bool> {
        match reader.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerializationError::Parse("invalid bool")),
        }
    }
}

impl WireDeserialize for u8 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<u8> {
        Ok(reader.read_u8()?)
    }
}

impl WireDeserialize for u16 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<u16> {
        Ok(reader.read_u16::<LittleEndian>()?)
    }
}

impl WireDeserialize for u32 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<u32> {
        Ok(reader.read_u32::<LittleEndian>()?)
    }
}

impl WireDeserialize for u64 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<u64> {
        Ok(reader.read_u64::<LittleEndian>()?)
    }
}

impl WireDeserialize for i32 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<i32> {
        Ok(reader.read_i32::<LittleEndian>()?)
    }
}

impl WireDeserialize for i64 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<i64> {
        Ok(reader.read_i64::<LittleEndian>()?)
    }
}

impl WireDeserialize for DateTime<Utc> {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<DateTime<Utc>> {
        let seconds = reader.read_u32::<LittleEndian>()?;
        Utc.timestamp_opt(seconds as i64, 0)
            .single()
            .ok_or(SerializationError::Parse("invalid timestamp"))
    }
}

impl<T> WireDeserialize for Vec<T>
where
    T: WireDeserialize,
{
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Vec<T>> {
        let len = CompactInt::wire_deserialize(&mut reader)?.value() as usize;
        // Blind preallocation from a length claim is a DoS vector, so cap
        // the reservation and let the vec grow if the data really arrives.
        let mut result: Vec<T> = Vec::with_capacity(std::cmp::min(len, 1024));
        for _ in 0..len {
            result.push(T::wire_deserialize(&mut reader)?);
        }
        Ok(result)
    }
}

impl WireDeserialize for String {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<String> {
        let len = CompactInt::wire_deserialize(&mut reader)?.value();
        let mut buf = Vec::with_capacity(std::cmp::min(len, 1024) as usize);
        (&mut reader).take(len).read_to_end(&mut buf)?;
        if (buf.len() as u64) < len {
            return Err(SerializationError::Parse("string shorter than its length"));
        }
        String::from_utf8(buf).map_err(|_| SerializationError::Parse("invalid utf-8"))
    }
}

impl WireDeserialize for SocketAddr {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<SocketAddr> {
        let octets = <[u8; 16]>::wire_deserialize(&mut reader)?;
        let v6_addr = Ipv6Addr::from(octets);

        let addr = match v6_addr.to_ipv4() {
            Some(v4_addr) => V4(v4_addr),
            None => V6(v6_addr),
        };
        Ok(SocketAddr::from((addr, reader.read_u16::<BigEndian>()?)))
    }
}

impl<T, U> WireDeserialize for (T, U)
where
    T: WireDeserialize,
    U: WireDeserialize,
{
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<(T, U)> {
        Ok((
            T::wire_deserialize(&mut reader)?,
            U::wire_deserialize(&mut reader)?,
        ))
    }
}

impl<T: WireDeserialize> WireDeserialize for std::sync::Arc<T> {
    fn wire_deserialize<R: io::Read>(reader: R) -> Result<Self> {
        Ok(std::sync::Arc::new(T::wire_deserialize(reader)?))
    }
}

macro_rules! impl_wire_deserialize_byte_array {
    ($size:expr) => {
        impl WireDeserialize for [u8; $size] {
            fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<[u8; $size]> {
                let mut result = [0u8; $size];
                reader.read_exact(&mut result)?;
                Ok(result)
            }
        }
    };
}

impl_wire_deserialize_byte_array!(4);
impl_wire_deserialize_byte_array!(8);
impl_wire_deserialize_byte_array!(12);
impl_wire_deserialize_byte_array!(16);
impl_wire_deserialize_byte_array!(32);
