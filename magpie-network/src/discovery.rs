//! Peer discovery: resolving a coin's DNS seeds into bootstrap addresses.

use std::collections::VecDeque;
use std::net::SocketAddr;

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use magpie_chain::parameters::Coin;

/// A shuffled pool of bootstrap addresses, refilled from DNS seeds.
pub struct DnsSeeder {
    seeds: &'static [(&'static str, u16)],
    pool: VecDeque<SocketAddr>,
}

impl DnsSeeder {
    pub fn new(coin: &Coin) -> DnsSeeder {
        DnsSeeder {
            seeds: coin.dns_seeds,
            pool: VecDeque::new(),
        }
    }

    /// Resolve every seed, shuffle the results, and refill the pool.
    pub async fn refill(&mut self) {
        let mut found: Vec<SocketAddr> = Vec::new();
        for (host, port) in self.seeds {
            match tokio::net::lookup_host((*host, *port)).await {
                Ok(addrs) => {
                    let addrs: Vec<SocketAddr> = addrs.collect();
                    debug!(seed = host, count = addrs.len(), "resolved dns seed");
                    found.extend(addrs);
                }
                Err(error) => {
                    warn!(seed = host, %error, "dns seed lookup failed");
                }
            }
        }
        found.shuffle(&mut rand::thread_rng());
        self.pool = found.into();
    }

    /// Take the next bootstrap address, if any remain.
    pub fn pop(&mut self) -> Option<SocketAddr> {
        self.pool.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
