//! One TCP conversation with a remote node.
//!
//! A peer is two pump tasks (frame reader, frame writer) plus the state
//! the orchestrator tracks for it. The pumps own the socket halves; the
//! orchestrator owns the state and talks to the pumps through channels,
//! so all bookkeeping stays on the single reactor task.

use std::net::SocketAddr;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace};

use magpie_chain::parameters::Coin;
use magpie_chain::SerializationError;

use crate::constants::BLOCK_SIZE;
use crate::protocol::external::types::PeerServices;
use crate::protocol::external::{Codec, Message, Version};

pub type PeerId = u64;

/// Everything the orchestrator reacts to.
#[derive(Debug)]
pub enum Event {
    /// An accepted inbound connection.
    Inbound(TcpStream, SocketAddr),
    /// A completed outbound connection.
    Outbound(TcpStream, SocketAddr),
    /// An outbound connection attempt failed.
    ConnectFailed(SocketAddr),
    /// A decoded message from a live peer.
    Message(PeerId, Message),
    /// The peer sent bytes that did not frame or parse; the connection
    /// is closed (without a penalty).
    FrameError(PeerId, SerializationError),
    /// The connection ended (either side closed, or an io error).
    Disconnected(PeerId),
    /// Freshly resolved bootstrap addresses.
    Discovered(Vec<SocketAddr>),
}

/// Per-connection state, owned by the orchestrator.
pub struct Peer {
    pub id: PeerId,
    pub addr: SocketAddr,
    pub inbound: bool,

    /// The peer's `version` handshake message, once received.
    pub version: Option<Version>,
    /// Whether the peer has acknowledged our version.
    pub verack: bool,

    pub ban_score: u32,
    pub last_rx: Instant,
    pub last_tx: Instant,
    pub last_ping: Instant,
    pub in_flight_blocks: usize,

    sender: mpsc::UnboundedSender<Message>,
    reader: tokio::task::AbortHandle,
}

impl Peer {
    /// Queue a message for the writer pump. Send failures mean the
    /// writer is gone; the disconnect event is already on its way.
    pub fn send(&mut self, message: Message) {
        trace!(peer = self.id, %message, "queueing message");
        if self.sender.send(message).is_ok() {
            self.last_tx = Instant::now();
        }
    }

    pub fn services(&self) -> Option<PeerServices> {
        self.version.as_ref().map(|v| v.services)
    }

    /// The peer's view of our external address: its vote in the
    /// external-IP tally.
    pub fn external_address(&self) -> Option<SocketAddr> {
        self.version.as_ref().map(|v| v.address_recv.1)
    }

    pub fn add_ban_score(&mut self, penalty: u32) {
        self.ban_score += penalty;
    }

    pub fn reduce_ban_score(&mut self, penalty: u32) {
        self.ban_score = self.ban_score.saturating_sub(penalty);
    }

    /// Tear down the connection tasks.
    pub fn close(&self) {
        self.reader.abort();
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Spawn the reader and writer pumps for an established connection and
/// return the orchestrator-side peer state.
pub fn spawn(
    id: PeerId,
    stream: TcpStream,
    addr: SocketAddr,
    inbound: bool,
    coin: &'static Coin,
    events: mpsc::UnboundedSender<Event>,
) -> Peer {
    let (read_half, write_half) = stream.into_split();

    let (sender, mut outbox) = mpsc::unbounded_channel::<Message>();

    let writer_events = events.clone();
    tokio::spawn(async move {
        let mut framed = FramedWrite::new(write_half, Codec::builder().for_coin(coin).finish());
        while let Some(message) = outbox.recv().await {
            if let Err(error) = framed.send(message).await {
                debug!(peer = id, %error, "write failed");
                let _ = writer_events.send(Event::Disconnected(id));
                return;
            }
        }
        // The orchestrator dropped the sender: orderly close.
    });

    let reader = tokio::spawn(async move {
        let mut framed = FramedRead::with_capacity(
            read_half,
            Codec::builder().for_coin(coin).finish(),
            BLOCK_SIZE,
        );
        loop {
            match framed.next().await {
                Some(Ok(message)) => {
                    if events.send(Event::Message(id, message)).is_err() {
                        return;
                    }
                }
                Some(Err(error)) => {
                    let _ = events.send(Event::FrameError(id, error));
                    return;
                }
                None => {
                    let _ = events.send(Event::Disconnected(id));
                    return;
                }
            }
        }
    })
    .abort_handle();

    let now = Instant::now();
    Peer {
        id,
        addr,
        inbound,
        version: None,
        verack: false,
        ban_score: 0,
        last_rx: now,
        last_tx: now,
        last_ping: now,
        in_flight_blocks: 0,
        sender,
        reader,
    }
}
