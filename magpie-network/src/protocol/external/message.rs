//! Definitions of network messages.

use std::{fmt, sync::Arc};

use magpie_chain::block::{self, Block};
use magpie_chain::transaction::Transaction;

use super::command::Command;
use super::inv::InventoryHash;
use super::types::Nonce;
use crate::meta_addr::MetaAddr;

mod alert;
pub use alert::{Alert, AlertPayload};

mod get_blocks;
pub use get_blocks::GetBlocks;

mod get_headers;
pub use get_headers::GetHeaders;

mod version;
pub use version::Version;

/// A network message.
///
/// The wire identifies messages by a twelve-byte ASCII command string; we
/// consider that a serialization detail and use the enum discriminant,
/// translating only inside the codec. This also gives message validation
/// one well-defined boundary.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Message {
    /// A `version` message: the first half of the connection handshake.
    Version(Version),

    /// A `verack` message, acknowledging a received `version`.
    Verack,

    /// An `addr` message: up to 1000 known peer addresses.
    Addr(Vec<MetaAddr>),

    /// An `inv` message, advertising knowledge of objects.
    Inv(Vec<InventoryHash>),

    /// A `getdata` message, requesting objects by typed hash.
    GetData(Vec<InventoryHash>),

    /// A `notfound` message: the subset of a `getdata` the sender could
    /// not supply.
    NotFound(Vec<InventoryHash>),

    /// A `getblocks` message: a locator asking for an `inv` of successor
    /// block hashes.
    GetBlocks(GetBlocks),

    /// A `getheaders` message: a locator asking for a `headers` reply.
    GetHeaders(GetHeaders),

    /// A `headers` message: 80-byte headers each suffixed with a varint
    /// transaction count.
    Headers(Vec<block::CountedHeader>),

    /// A `tx` message carrying one transaction.
    Tx(Arc<Transaction>),

    /// A `block` message carrying one full block.
    Block(Arc<Block>),

    /// A `getaddr` message, requesting an `addr` reply.
    GetAddr,

    /// A `mempool` message, requesting an `inv` of mempool transactions.
    Mempool,

    /// A `ping` message.
    Ping(Nonce),

    /// A `pong` message echoing a ping's nonce.
    Pong(Nonce),

    /// A `reject` message, describing why a previous message was
    /// rejected.
    Reject {
        /// The command of the message being rejected.
        message: String,
        /// The machine-readable rejection code.
        ccode: RejectReason,
        /// A human-readable reason.
        reason: String,
        /// For block and transaction rejections, the hash of the
        /// rejected object.
        data: Option<[u8; 32]>,
    },

    /// An `alert` message: a signed payload, decoded only after its
    /// signature checks out.
    Alert(Alert),
}

/// Reject ccodes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum RejectReason {
    Malformed = 0x01,
    Invalid = 0x10,
    Obsolete = 0x11,
    Duplicate = 0x12,
    Nonstandard = 0x40,
    Dust = 0x41,
    InsufficientFee = 0x42,
    Checkpoint = 0x43,
    Other = 0x50,
}

impl RejectReason {
    pub fn from_code(code: u8) -> Option<RejectReason> {
        match code {
            0x01 => Some(RejectReason::Malformed),
            0x10 => Some(RejectReason::Invalid),
            0x11 => Some(RejectReason::Obsolete),
            0x12 => Some(RejectReason::Duplicate),
            0x40 => Some(RejectReason::Nonstandard),
            0x41 => Some(RejectReason::Dust),
            0x42 => Some(RejectReason::InsufficientFee),
            0x43 => Some(RejectReason::Checkpoint),
            0x50 => Some(RejectReason::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.command().name())
    }
}

impl Message {
    pub fn command(&self) -> Command {
        match self {
            Message::Version { .. } => Command::Version,
            Message::Verack => Command::Verack,
            Message::Addr { .. } => Command::Addr,
            Message::Inv { .. } => Command::Inv,
            Message::GetData { .. } => Command::GetData,
            Message::NotFound { .. } => Command::NotFound,
            Message::GetBlocks { .. } => Command::GetBlocks,
            Message::GetHeaders { .. } => Command::GetHeaders,
            Message::Headers { .. } => Command::Headers,
            Message::Tx { .. } => Command::Tx,
            Message::Block { .. } => Command::Block,
            Message::GetAddr => Command::GetAddr,
            Message::Mempool => Command::MemPool,
            Message::Ping { .. } => Command::Ping,
            Message::Pong { .. } => Command::Pong,
            Message::Reject { .. } => Command::Reject,
            Message::Alert { .. } => Command::Alert,
        }
    }
}
