use std::io::{Read, Write};
use std::net::SocketAddr;

use byteorder::{ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};

use magpie_chain::block;
use magpie_chain::{SerializationError, WireDeserialize, WireSerialize};

use super::super::types::{Nonce, PeerServices, ProtocolVersion};

/// A `version` message.
///
/// Despite the name, this is really a `ClientHello`: it opens the
/// handshake and carries the sender's capabilities, not just a number.
/// The embedded addresses use the timestampless network-address form, and
/// the timestamp field is a full 64-bit count of seconds.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Version {
    /// The network version number supported by the sender.
    pub version: ProtocolVersion,

    /// The network services advertised by the sender.
    pub services: PeerServices,

    /// When the version message was sent.
    pub timestamp: DateTime<Utc>,

    /// The address the sender believes the receiver has, with the
    /// receiver's advertised services.
    pub address_recv: (PeerServices, SocketAddr),

    /// The sender's own address and services.
    pub address_from: (PeerServices, SocketAddr),

    /// Random per-connection nonce, used to detect self-connections.
    pub nonce: Nonce,

    /// The user agent advertised by the sender.
    pub user_agent: String,

    /// The height of the best block known to the sender.
    pub start_height: block::Height,

    /// Whether the receiver should relay transactions to the sender.
    pub relay: bool,
}

impl Version {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: ProtocolVersion,
        their_addr: SocketAddr,
        their_services: PeerServices,
        our_services: PeerServices,
        our_addr: SocketAddr,
        nonce: Nonce,
        user_agent: String,
        start_height: block::Height,
        relay: bool,
    ) -> Version {
        Version {
            version,
            services: our_services,
            timestamp: Utc::now(),
            address_recv: (their_services, their_addr),
            address_from: (our_services, our_addr),
            nonce,
            user_agent,
            start_height,
            relay,
        }
    }
}

impl WireSerialize for Version {
    fn wire_serialize<W: Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.version.wire_serialize(&mut target)?;
        self.services.wire_serialize(&mut target)?;
        target.write_i64::<byteorder::LittleEndian>(self.timestamp.timestamp())?;
        self.address_recv.wire_serialize(&mut target)?;
        self.address_from.wire_serialize(&mut target)?;
        self.nonce.wire_serialize(&mut target)?;
        self.user_agent.wire_serialize(&mut target)?;
        self.start_height.wire_serialize(&mut target)?;
        target.write_all(&[self.relay as u8])
    }
}

impl WireDeserialize for Version {
    fn wire_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let version = ProtocolVersion::wire_deserialize(&mut reader)?;
        let services = PeerServices::wire_deserialize(&mut reader)?;
        let timestamp = reader.read_i64::<byteorder::LittleEndian>()?;
        let timestamp = Utc
            .timestamp_opt(timestamp, 0)
            .single()
            .ok_or(SerializationError::BadFormat {
                field: "timestamp",
                reason: "out of range",
            })?;
        let address_recv = <(PeerServices, SocketAddr)>::wire_deserialize(&mut reader)?;
        let address_from = <(PeerServices, SocketAddr)>::wire_deserialize(&mut reader)?;
        let nonce = Nonce::wire_deserialize(&mut reader)?;
        let user_agent = String::wire_deserialize(&mut reader)?;
        let start_height = block::Height::wire_deserialize(&mut reader)?;
        // The relay flag is optional; old peers omit it, meaning "relay".
        let relay = match reader.read_u8() {
            Ok(byte) => byte != 0,
            Err(_) => true,
        };

        Ok(Version {
            version,
            services,
            timestamp,
            address_recv,
            address_from,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }
}
