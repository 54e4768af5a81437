//! Address-book entries and their wire form.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use magpie_serde_derive::{WireDeserialize, WireSerialize};

use magpie_chain::{SerializationError, WireDeserialize, WireSerialize};

use crate::protocol::external::types::PeerServices;

/// An address of a peer, together with when it was last seen and the
/// services it advertised. This is the element type of `addr` messages:
/// (timestamp:u32, services:u64, ip:16B, port:u16be). The `version`
/// handshake embeds the same structure without the leading timestamp.
#[derive(Copy, Clone, Debug, Eq, PartialEq, WireSerialize, WireDeserialize)]
pub struct MetaAddr {
    pub last_seen: DateTime<Utc>,
    pub services: PeerServices,
    pub addr: SocketAddr,
}

impl MetaAddr {
    pub fn new(addr: SocketAddr, services: PeerServices, last_seen: DateTime<Utc>) -> MetaAddr {
        MetaAddr {
            last_seen,
            services,
            addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn ipv4_maps_into_ipv6_on_the_wire() {
        let entry = MetaAddr::new(
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 6)), 8333),
            PeerServices::NODE_NETWORK,
            Utc.timestamp_opt(1_400_000_000, 0).single().unwrap(),
        );
        let bytes = entry.wire_serialize_to_vec().unwrap();
        assert_eq!(bytes.len(), 4 + 8 + 16 + 2);
        // 10 zero bytes, two 0xff bytes, then the v4 address.
        assert_eq!(&bytes[12..22], &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[22..24], &[0xff, 0xff]);
        assert_eq!(&bytes[24..28], &[203, 0, 113, 6]);
        // Port is big-endian.
        assert_eq!(&bytes[28..30], &[0x20, 0x8d]);

        let parsed = MetaAddr::wire_deserialize(&bytes[..]).unwrap();
        assert_eq!(parsed, entry);
    }
}
