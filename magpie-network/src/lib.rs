//! The magpie peer-to-peer layer.
//!
//! [`protocol`] defines the message catalog and the framing codec;
//! [`peer`] pumps one TCP conversation; [`Node`] is the orchestrator that
//! owns the stores, the peer map, the address book and the sync cursors,
//! and drives everything from a single task with a ten-second heartbeat.

pub mod address_book;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod mempool;
pub mod meta_addr;
pub mod node;
pub mod peer;
pub mod protocol;

pub use config::Config;
pub use meta_addr::MetaAddr;
pub use node::{Node, NodeError};
pub use protocol::external::{Codec, InventoryHash, Message};
