//! Protocol and orchestration constants.

use std::time::Duration;

/// The protocol version this node speaks.
pub const CURRENT_VERSION: u32 = 70002;

/// Read chunk size for peer sockets.
pub const BLOCK_SIZE: usize = 8192;

/// Frames with a declared body larger than this are refused outright.
pub const MAX_PROTOCOL_MESSAGE_LEN: usize = 32 * 1024 * 1024;

/// Maximum entries in an `addr` message.
pub const MAX_ADDR_PER_MESSAGE: usize = 1000;

/// Maximum entries in `inv`, `getdata` and `notfound` messages.
pub const MAX_INV_PER_MESSAGE: usize = 50_000;

/// Maximum addresses kept in the address book.
pub const MAX_ADDRESSES: usize = 2500;

/// Mempool ring capacity.
pub const MEMPOOL_CAPACITY: usize = 30_000;

/// Maximum archived alerts.
pub const MAX_ALERTS: usize = 256;

/// Ban-score threshold; above this a peer is disconnected and banned.
pub const MAX_BAN_SCORE: u32 = 5;

/// How long a banned address stays banned.
pub const BAN_DURATION: Duration = Duration::from_secs(3600);

/// Heartbeat period.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Send a ping when nothing has been sent for this long.
pub const PING_AFTER_TX_IDLE: Duration = Duration::from_secs(30 * 60);

/// Minimum spacing between pings.
pub const PING_SPACING: Duration = Duration::from_secs(5 * 60);

/// Close a connection after this long without receiving anything.
pub const RX_IDLE_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

/// Minimum interval between unsolicited `getheaders` rounds.
pub const GET_HEADERS_INTERVAL: Duration = Duration::from_secs(30);

/// Re-request a block body if it has been outstanding this long.
pub const BLOCK_REREQUEST_AFTER: Duration = Duration::from_secs(5 * 60);

/// Maximum block bodies outstanding per peer.
pub const MAX_INCOMPLETE_INFLIGHT: usize = 10_000;

/// Maximum incomplete blocks tracked at a time.
pub const MAX_INCOMPLETE_BLOCKS: usize = 50_000;

/// Maximum incomplete blocks pulled from the store per top-up.
pub const MAX_INCOMPLETE_FETCH: usize = 10_000;

/// Maximum relay requests per peer before throttling.
pub const MAX_RELAY_COUNT: f64 = 100.0;

/// Relay-counter decay per second.
pub const RELAY_COUNT_DECAY: f64 = 10.0;

/// How many headers we serve per `getheaders`.
pub const MAX_HEADERS_PER_MESSAGE: usize = 2000;

/// How many block hashes we serve per `getblocks`.
pub const MAX_BLOCKS_PER_MESSAGE: usize = 500;
