//! Network configuration.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Configuration for the peer-to-peer layer.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// The address to listen on for inbound peers. `None` disables the
    /// listener (outbound connections still work).
    pub listen_addr: Option<SocketAddr>,

    /// How many outbound peer connections to maintain.
    pub seek_peers: usize,

    /// The hard cap on simultaneous connections.
    pub max_peers: usize,

    /// Whether to bootstrap from the coin's DNS seeds.
    pub bootstrap: bool,

    /// Override the advertised user agent; `None` derives one from the
    /// crate version and coin name.
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: None,
            seek_peers: 16,
            max_peers: 125,
            bootstrap: true,
            user_agent: None,
        }
    }
}
