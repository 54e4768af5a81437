//! The address book: peers we have seen or been told about.

use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use crate::constants::MAX_ADDRESSES;
use crate::meta_addr::MetaAddr;
use crate::protocol::external::types::PeerServices;

/// A bounded map of peer addresses with last-seen times and services.
/// Entries beyond the cap are silently dropped.
#[derive(Default)]
pub struct AddressBook {
    entries: HashMap<SocketAddr, (DateTime<Utc>, PeerServices)>,
}

impl AddressBook {
    pub fn new() -> AddressBook {
        AddressBook::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an address. Updates an existing entry in place; new entries
    /// past the cap are dropped.
    pub fn insert(&mut self, addr: SocketAddr, last_seen: DateTime<Utc>, services: PeerServices) {
        if !self.entries.contains_key(&addr) && self.entries.len() >= MAX_ADDRESSES {
            return;
        }
        self.entries.insert(addr, (last_seen, services));
    }

    /// Fold a received `addr` list into the book.
    pub fn extend<I: IntoIterator<Item = MetaAddr>>(&mut self, addrs: I) {
        for meta in addrs {
            self.insert(meta.addr, meta.last_seen, meta.services);
        }
    }

    pub fn remove(&mut self, addr: &SocketAddr) {
        self.entries.remove(addr);
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.entries.contains_key(addr)
    }

    /// Addresses for a `getaddr` answer: most recently seen first, capped
    /// at `limit`.
    pub fn most_recent(&self, limit: usize) -> Vec<MetaAddr> {
        let mut entries: Vec<MetaAddr> = self
            .entries
            .iter()
            .map(|(addr, (last_seen, services))| MetaAddr::new(*addr, *services, *last_seen))
            .collect();
        entries.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        entries.truncate(limit);
        entries
    }

    /// Some address not in `active`, for making a new outbound connection.
    pub fn pick_unconnected(&self, active: &[SocketAddr]) -> Option<SocketAddr> {
        self.entries
            .keys()
            .find(|addr| !active.contains(addr))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(last_octet: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)), 8333)
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).single().unwrap()
    }

    #[test]
    fn capped_at_maximum() {
        let mut book = AddressBook::new();
        for i in 0..(MAX_ADDRESSES + 10) {
            let addr = SocketAddr::new(
                IpAddr::V4(Ipv4Addr::new(10, (i >> 8) as u8, (i & 0xff) as u8, 1)),
                8333,
            );
            book.insert(addr, at(i as i64), PeerServices::NODE_NETWORK);
        }
        assert_eq!(book.len(), MAX_ADDRESSES);
    }

    #[test]
    fn most_recent_orders_by_last_seen() {
        let mut book = AddressBook::new();
        book.insert(addr(1), at(100), PeerServices::NODE_NETWORK);
        book.insert(addr(2), at(300), PeerServices::NODE_NETWORK);
        book.insert(addr(3), at(200), PeerServices::NODE_NETWORK);

        let recent = book.most_recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].addr, addr(2));
        assert_eq!(recent[1].addr, addr(3));
    }

    #[test]
    fn pick_skips_active_connections() {
        let mut book = AddressBook::new();
        book.insert(addr(1), at(100), PeerServices::NODE_NETWORK);
        let picked = book.pick_unconnected(&[addr(1)]);
        assert_eq!(picked, None);
        book.insert(addr(2), at(100), PeerServices::NODE_NETWORK);
        assert_eq!(book.pick_unconnected(&[addr(1)]), Some(addr(2)));
    }
}
