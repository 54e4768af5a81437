//! The orchestrator: peer pool, sync state, and message handling.
//!
//! One task owns every piece of mutable node state. Suspension points are
//! socket readiness (delivered as [`Event`]s) and a ten-second heartbeat;
//! there are no locks in this module.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use magpie_chain::block::{self, Block, CountedHeader, Header};
use magpie_chain::parameters::{Coin, VENDOR_ALERT_KEY};
use magpie_chain::transaction::Transaction;
use magpie_state::{
    BlockError, BlockStore, ChainDb, StorageError, StoredBlock, TransactionError, TxnStore,
    UtxoStore,
};

use crate::address_book::AddressBook;
use crate::config::Config;
use crate::constants::*;
use crate::discovery::DnsSeeder;
use crate::mempool::Mempool;
use crate::meta_addr::MetaAddr;
use crate::peer::{self, Event, Peer, PeerId};
use crate::protocol::external::types::{Nonce, PeerServices, ProtocolVersion};
use crate::protocol::external::{
    Alert, AlertPayload, GetBlocks, GetHeaders, InventoryHash, Message, Version,
};

/// A fatal node error; everything recoverable is handled internally.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("listen address already in use")]
    AddressInUse,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("network io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a block or header was rejected: consensus failures penalize the
/// peer, storage failures abort the node.
enum Rejection {
    Consensus(&'static str),
    Fatal(StorageError),
}

impl From<BlockError> for Rejection {
    fn from(e: BlockError) -> Rejection {
        match e {
            BlockError::Work => Rejection::Consensus("block proof-of-work is greater than target"),
            BlockError::Orphan => Rejection::Consensus("previous block does not exist"),
            BlockError::Merkle => Rejection::Consensus("merkle root mismatch"),
            BlockError::Storage(e) => Rejection::Fatal(e),
        }
    }
}

impl From<TransactionError> for Rejection {
    fn from(e: TransactionError) -> Rejection {
        match e {
            TransactionError::Storage(e) => Rejection::Fatal(e),
            TransactionError::Script { .. } => Rejection::Consensus("invalid input script"),
            TransactionError::Fee { .. } => Rejection::Consensus("inputs afford less than outputs"),
            TransactionError::Coinbase => Rejection::Consensus("invalid coinbase fee"),
            TransactionError::NonConsecutive => Rejection::Consensus("non-consecutive block"),
            TransactionError::MissingPrevout { .. } => {
                Rejection::Consensus("missing previous output")
            }
            TransactionError::RollbackUnavailable => {
                Rejection::Consensus("rollback is unavailable")
            }
        }
    }
}

/// A full-node orchestrator for one coin.
pub struct Node {
    coin: &'static Coin,
    config: Config,
    user_agent: String,

    db: Arc<ChainDb>,
    blocks: BlockStore,
    txns: TxnStore,
    utxo: UtxoStore,

    mempool: Mempool,
    address_book: AddressBook,
    alerts: Vec<(DateTime<Utc>, AlertPayload)>,
    banned: HashMap<IpAddr, Instant>,

    peers: HashMap<PeerId, Peer>,
    next_peer_id: PeerId,
    connecting: HashSet<SocketAddr>,

    /// Per-peer relay counters. Aged by the heartbeat; forwarding itself
    /// is disabled pending checkpoint support.
    relay_counts: HashMap<PeerId, f64>,
    last_relay_decay: Instant,

    last_get_headers: Option<Instant>,
    /// Blockhash → when we last requested its body.
    incomplete_blocks: HashMap<block::Hash, Option<Instant>>,
    last_incomplete_blockid: Option<u32>,

    discovered: VecDeque<SocketAddr>,
    resolving: bool,

    /// Our best guess at our own external IP: the plurality of peer
    /// votes, or the bound address before any peer reports.
    guessed_external_ip: IpAddr,

    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl Node {
    pub fn new(
        coin: &'static Coin,
        config: Config,
        state_config: magpie_state::Config,
    ) -> Result<Node, NodeError> {
        let db = Arc::new(ChainDb::open(&state_config.data_dir, coin)?);
        let blocks = BlockStore::new(db.clone(), coin)?;
        let txns = TxnStore::open(
            state_config.data_dir.clone(),
            coin,
            state_config.shard_target_bytes,
        )?;
        let utxo = UtxoStore::new(db.clone(), coin, state_config.verification_workers)?;

        let user_agent = config.user_agent.clone().unwrap_or_else(|| {
            format!("/magpie:{}({})/", env!("CARGO_PKG_VERSION"), coin.name)
        });

        let guessed_external_ip = config
            .listen_addr
            .map(|addr| addr.ip())
            .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]));

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Node {
            coin,
            config,
            user_agent,
            db,
            blocks,
            txns,
            utxo,
            mempool: Mempool::new(),
            address_book: AddressBook::new(),
            alerts: Vec::new(),
            banned: HashMap::new(),
            peers: HashMap::new(),
            next_peer_id: 0,
            connecting: HashSet::new(),
            relay_counts: HashMap::new(),
            last_relay_decay: Instant::now(),
            last_get_headers: None,
            incomplete_blocks: HashMap::new(),
            last_incomplete_blockid: None,
            discovered: VecDeque::new(),
            resolving: false,
            guessed_external_ip,
            events_tx,
            events_rx,
        })
    }

    /// The height of our best chain, advertised in handshakes.
    pub fn blockchain_height(&self) -> Result<u32, StorageError> {
        Ok(self.blocks.tip()?.height.max(0) as u32)
    }

    /// Archived alerts, oldest first.
    pub fn alerts(&self) -> &[(DateTime<Utc>, AlertPayload)] {
        &self.alerts
    }

    /// Run the node until a fatal error or shutdown signal.
    pub async fn serve_forever(mut self) -> Result<(), NodeError> {
        let listener = match self.config.listen_addr {
            Some(addr) => {
                let listener = TcpListener::bind(addr).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::AddrInUse {
                        NodeError::AddressInUse
                    } else {
                        NodeError::Io(e)
                    }
                })?;
                info!(%addr, coin = self.coin.name, "listening for peers");
                Some(listener)
            }
            None => None,
        };

        if self.config.bootstrap {
            self.spawn_seed_resolution();
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                accepted = listener.as_ref().expect("guard checks presence").accept(),
                    if listener.is_some() =>
                {
                    match accepted {
                        Ok((stream, addr)) => {
                            if let Err(fatal) = self.handle_event(Event::Inbound(stream, addr)) {
                                break Err(fatal);
                            }
                        }
                        Err(error) => debug!(%error, "accept failed"),
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    if let Err(fatal) = self.handle_event(event) {
                        break Err(fatal);
                    }
                }
                _ = heartbeat.tick() => {
                    if let Err(fatal) = self.heartbeat() {
                        break Err(fatal);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    break Ok(());
                }
            }
        };

        // Flush whatever we have before exiting, fatal or not.
        if let Err(error) = self.db.flush() {
            error!(%error, "final flush failed");
        }
        result
    }

    // ---- connection management ----

    fn handle_inbound(&mut self, stream: TcpStream, addr: SocketAddr) {
        // A fresh ban refuses the connection; an expired one is lifted.
        if let Some(banned_at) = self.banned.get(&addr.ip()) {
            if banned_at.elapsed() < BAN_DURATION {
                debug!(%addr, "refusing banned peer");
                return;
            }
            self.banned.remove(&addr.ip());
        }

        if self.peers.len() >= self.config.max_peers {
            debug!(%addr, "at max_peers, dropping inbound connection");
            return;
        }

        self.add_connection(stream, addr, true);
    }

    /// Start an outbound connection attempt, deduplicating against live
    /// and in-progress connections.
    fn add_peer(&mut self, addr: SocketAddr) {
        if self.peers.len() >= self.config.max_peers {
            return;
        }
        if self.connecting.contains(&addr) || self.peers.values().any(|p| p.addr == addr) {
            return;
        }
        self.connecting.insert(addr);

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let attempt = tokio::time::timeout(
                std::time::Duration::from_secs(10),
                TcpStream::connect(addr),
            )
            .await;
            let event = match attempt {
                Ok(Ok(stream)) => Event::Outbound(stream, addr),
                _ => Event::ConnectFailed(addr),
            };
            let _ = events.send(event);
        });
    }

    fn add_connection(&mut self, stream: TcpStream, addr: SocketAddr, inbound: bool) {
        let id = self.next_peer_id;
        self.next_peer_id += 1;

        let mut peer = peer::spawn(id, stream, addr, inbound, self.coin, self.events_tx.clone());

        // Communication bootstraps with our version message.
        let start_height = self.blocks.tip().map(|b| b.height.max(0) as u32).unwrap_or(0);
        let our_addr = SocketAddr::new(
            self.guessed_external_ip,
            self.config.listen_addr.map(|a| a.port()).unwrap_or(self.coin.port),
        );
        peer.send(Message::Version(Version::new(
            ProtocolVersion(self.coin.protocol_version),
            addr,
            PeerServices::NODE_NETWORK,
            PeerServices::NODE_NETWORK,
            our_addr,
            Nonce::random(),
            self.user_agent.clone(),
            block::Height(start_height),
            false,
        )));

        debug!(peer = id, %addr, inbound, "connection opened");
        self.peers.insert(id, peer);
    }

    fn close_peer(&mut self, id: PeerId) {
        if let Some(peer) = self.peers.remove(&id) {
            debug!(peer = id, addr = %peer.addr, "connection closed");
            self.address_book.remove(&peer.addr);
            self.relay_counts.remove(&id);
            // The peer's in-flight quota dies with its entry; the next
            // heartbeat re-requests anything it was fetching.
        }
    }

    /// Increment a peer's ban score; past the threshold, disconnect and
    /// ban its address for an hour.
    fn punish(&mut self, id: PeerId, reason: &str) {
        let (score, addr) = match self.peers.get_mut(&id) {
            Some(peer) => {
                peer.add_ban_score(1);
                (peer.ban_score, peer.addr)
            }
            None => return,
        };
        warn!(peer = id, %addr, score, reason, "peer misbehaved");
        if score > MAX_BAN_SCORE {
            self.banned.insert(addr.ip(), Instant::now());
            self.close_peer(id);
        }
    }

    fn send(&mut self, id: PeerId, message: Message) {
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.send(message);
        }
    }

    // ---- event dispatch ----

    fn handle_event(&mut self, event: Event) -> Result<(), NodeError> {
        match event {
            Event::Inbound(stream, addr) => self.handle_inbound(stream, addr),
            Event::Outbound(stream, addr) => {
                self.connecting.remove(&addr);
                if self.peers.len() < self.config.max_peers {
                    self.add_connection(stream, addr, false);
                }
            }
            Event::ConnectFailed(addr) => {
                self.connecting.remove(&addr);
                debug!(%addr, "outbound connection failed");
            }
            Event::Discovered(addrs) => {
                self.resolving = false;
                debug!(count = addrs.len(), "bootstrap addresses resolved");
                self.discovered.extend(addrs);
            }
            Event::Message(id, message) => return self.handle_message(id, message),
            Event::FrameError(id, error) => {
                // Malformed framing is contained here: close, no ban.
                debug!(peer = id, %error, "invalid frame");
                self.close_peer(id);
            }
            Event::Disconnected(id) => self.close_peer(id),
        }
        Ok(())
    }

    fn handle_message(&mut self, id: PeerId, message: Message) -> Result<(), NodeError> {
        match self.peers.get_mut(&id) {
            Some(peer) => peer.last_rx = Instant::now(),
            None => return Ok(()), // raced with a close
        }
        trace!(peer = id, %message, "dispatching");

        match message {
            Message::Version(version) => self.on_version(id, version),
            Message::Verack => self.on_verack(id)?,
            Message::Addr(addrs) => self.on_addr(addrs),
            Message::Inv(_) => {
                // Advertisement-driven block fetch is deferred; sync is
                // locator-driven.
            }
            Message::GetData(items) => self.on_getdata(id, items)?,
            Message::NotFound(items) => self.on_notfound(id, items),
            Message::GetBlocks(get_blocks) => self.on_getblocks(id, get_blocks)?,
            Message::GetHeaders(get_headers) => self.on_getheaders(id, get_headers)?,
            Message::Headers(headers) => self.on_headers(id, headers)?,
            Message::Tx(transaction) => self.on_tx(id, transaction),
            Message::Block(block) => self.on_block(id, block)?,
            Message::GetAddr => self.on_getaddr(id),
            Message::Mempool => self.on_mempool(id),
            Message::Ping(nonce) => self.send(id, Message::Pong(nonce)),
            Message::Pong(_) => {}
            Message::Reject {
                message,
                ccode,
                reason,
                ..
            } => {
                debug!(peer = id, %message, ?ccode, %reason, "peer rejected our message");
                if message == "block" {
                    self.release_in_flight(id, 1);
                }
            }
            Message::Alert(alert) => self.on_alert(id, alert),
        }
        Ok(())
    }

    // ---- handshake ----

    fn on_version(&mut self, id: PeerId, version: Version) {
        if let Some(peer) = self.peers.get_mut(&id) {
            debug!(
                peer = id,
                version = version.version.0,
                user_agent = %version.user_agent,
                start_height = version.start_height.0,
                "received version"
            );
            peer.version = Some(version);
            peer.send(Message::Verack);
        }
        self.check_external_ip();
    }

    fn on_verack(&mut self, id: PeerId) -> Result<(), NodeError> {
        let (addr, services) = match self.peers.get_mut(&id) {
            Some(peer) => {
                peer.verack = true;
                (
                    peer.addr,
                    peer.services().unwrap_or(PeerServices::NODE_NETWORK),
                )
            }
            None => return Ok(()),
        };
        self.address_book.insert(addr, Utc::now(), services);

        // Possibly our first usable peer; try to make progress.
        self.sync_blockchain_headers(false)?;
        self.sync_blockchain_blocks()?;
        Ok(())
    }

    /// Every peer's `version.addr_recv` is a vote on what our external
    /// address is; adopt the plurality.
    fn check_external_ip(&mut self) {
        let mut tally: HashMap<IpAddr, usize> = HashMap::new();
        for peer in self.peers.values() {
            if let Some(addr) = peer.external_address() {
                *tally.entry(addr.ip()).or_insert(0) += 1;
            }
        }
        if let Some((ip, _)) = tally.into_iter().max_by_key(|(_, count)| *count) {
            self.guessed_external_ip = ip;
        }
    }

    // ---- address gossip ----

    fn on_addr(&mut self, addrs: Vec<MetaAddr>) {
        self.address_book.extend(addrs);
    }

    fn on_getaddr(&mut self, id: PeerId) {
        let addrs = self.address_book.most_recent(MAX_ADDR_PER_MESSAGE);
        self.send(id, Message::Addr(addrs));
    }

    // ---- transactions and the mempool ----

    fn on_tx(&mut self, id: PeerId, transaction: Arc<Transaction>) {
        self.mempool.push(transaction.clone());
        self.relay(&Message::Tx(transaction), id);
    }

    fn on_mempool(&mut self, id: PeerId) {
        let inventory: Vec<InventoryHash> = self
            .mempool
            .txids()
            .into_iter()
            .map(InventoryHash::Tx)
            .collect();
        self.send(id, Message::Inv(inventory));
    }

    /// Relay a message on behalf of a peer, within its quota.
    ///
    /// Forwarding is intentionally short-circuited (it waits on
    /// checkpoint support, as in the reference implementation); only the
    /// quota bookkeeping runs.
    fn relay(&mut self, _message: &Message, id: PeerId) {
        let count = self.relay_counts.entry(id).or_insert(0.0);
        *count += 1.0;
        if *count > MAX_RELAY_COUNT {
            return;
        }
        // forwarding disabled
    }

    /// Age the relay counters so throttled peers recover.
    fn decay_relay(&mut self) {
        let dt = self.last_relay_decay.elapsed().as_secs_f64();
        self.relay_counts.retain(|_, count| {
            *count -= dt * RELAY_COUNT_DECAY;
            *count > 0.0
        });
        self.last_relay_decay = Instant::now();
    }

    // ---- serving chain data ----

    /// Rebuild the wire header for a stored block.
    fn stored_header(&self, stored: &StoredBlock) -> Result<Header, StorageError> {
        use chrono::TimeZone;
        let previous = self
            .blocks
            .get_by_id(stored.previous_blockid)?
            .ok_or(StorageError::Corruption("missing parent block"))?;
        Ok(Header::new(
            stored.version,
            previous.hash,
            stored.merkle_root,
            chrono::Utc
                .timestamp_opt(stored.timestamp as i64, 0)
                .single()
                .ok_or(StorageError::Corruption("stored timestamp out of range"))?,
            stored.bits,
            stored.nonce,
        ))
    }

    fn on_getheaders(&mut self, id: PeerId, request: GetHeaders) -> Result<(), NodeError> {
        let found = self.blocks.locate_blocks(
            &request.block_locator_hashes,
            MAX_HEADERS_PER_MESSAGE,
            request.stop_hash,
        )?;
        let mut headers = Vec::with_capacity(found.len());
        for stored in &found {
            headers.push(CountedHeader {
                header: self.stored_header(stored)?,
                transaction_count: 0,
            });
        }
        self.send(id, Message::Headers(headers));
        Ok(())
    }

    fn on_getblocks(&mut self, id: PeerId, request: GetBlocks) -> Result<(), NodeError> {
        let found = self.blocks.locate_blocks(
            &request.block_locator_hashes,
            MAX_BLOCKS_PER_MESSAGE,
            request.stop_hash,
        )?;
        let reply = if found.is_empty() {
            // No common point found; following the reference, answer
            // notfound with the locator itself rather than walking from
            // genesis.
            Message::NotFound(
                request
                    .block_locator_hashes
                    .into_iter()
                    .map(InventoryHash::Block)
                    .collect(),
            )
        } else {
            Message::Inv(found.into_iter().map(|b| InventoryHash::Block(b.hash)).collect())
        };
        self.send(id, reply);
        Ok(())
    }

    fn on_getdata(&mut self, id: PeerId, items: Vec<InventoryHash>) -> Result<(), NodeError> {
        let mut notfound = Vec::new();
        for item in items {
            match item {
                InventoryHash::Block(hash) => {
                    let stored = self.blocks.get(&hash, false)?;
                    let complete = stored.as_ref().map(|s| s.txn_count > 0).unwrap_or(false);
                    match stored {
                        Some(stored) if complete => {
                            let transactions = self
                                .txns
                                .transactions_for_block(stored.blockid)?
                                .into_iter()
                                .map(|(_, txn)| txn)
                                .collect();
                            let block = Block {
                                header: self.stored_header(&stored)?,
                                transactions,
                            };
                            self.send(id, Message::Block(Arc::new(block)));
                        }
                        _ => notfound.push(item),
                    }
                }
                InventoryHash::Tx(txid) => {
                    let found = match self.mempool.get(&txid) {
                        Some(txn) => Some(txn),
                        None => self.txns.get(&txid)?.map(|(_, txn)| txn),
                    };
                    match found {
                        Some(txn) => self.send(id, Message::Tx(txn)),
                        None => notfound.push(item),
                    }
                }
                // Other object types are not served.
                InventoryHash::Error | InventoryHash::FilteredBlock(_) => {}
            }
        }
        if !notfound.is_empty() {
            self.send(id, Message::NotFound(notfound));
        }
        Ok(())
    }

    // ---- header sync ----

    fn on_headers(
        &mut self,
        id: PeerId,
        headers: Vec<CountedHeader>,
    ) -> Result<(), NodeError> {
        if headers.is_empty() {
            return Ok(());
        }

        let mut new_headers = false;
        for counted in &headers {
            match self.blocks.add_header(&counted.header) {
                Ok(true) => new_headers = true,
                Ok(false) => {}
                Err(e) => match Rejection::from(e) {
                    Rejection::Consensus(reason) => self.punish(id, reason),
                    Rejection::Fatal(e) => return Err(e.into()),
                },
            }
        }

        // More headers may be waiting behind these.
        self.sync_blockchain_headers(new_headers)?;
        Ok(())
    }

    fn sync_blockchain_headers(&mut self, new_headers: bool) -> Result<(), NodeError> {
        // Give an outstanding getheaders time to answer, unless it just
        // did (new_headers) and we can immediately ask for more.
        if !new_headers {
            if let Some(last) = self.last_get_headers {
                if last.elapsed() < GET_HEADERS_INTERVAL {
                    return Ok(());
                }
            }
        }

        let ready: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| p.verack)
            .map(|p| p.id)
            .collect();
        let target = match ready.choose(&mut rand::thread_rng()) {
            Some(id) => *id,
            None => return Ok(()),
        };
        self.last_get_headers = Some(Instant::now());

        let locator = self.blocks.block_locator_hashes()?;
        self.send(
            target,
            Message::GetHeaders(GetHeaders {
                block_locator_hashes: locator,
                stop_hash: None,
            }),
        );
        Ok(())
    }

    // ---- block sync ----

    fn on_block(&mut self, id: PeerId, block: Arc<Block>) -> Result<(), NodeError> {
        let hash = block.hash();

        match self.accept_block(&block) {
            Ok(()) => {
                for txn in &block.transactions {
                    self.mempool.push(txn.clone());
                }
                self.incomplete_blocks.remove(&hash);
            }
            Err(Rejection::Consensus(reason)) => self.punish(id, reason),
            Err(Rejection::Fatal(e)) => return Err(e.into()),
        }

        // Either way the request slot is free again.
        self.release_in_flight(id, 1);
        Ok(())
    }

    /// Store a received block body and advance the UTXO set over every
    /// newly completed block.
    fn accept_block(&mut self, block: &Block) -> Result<(), Rejection> {
        let stored = self
            .blocks
            .get(&block.hash(), false)
            .map_err(Rejection::Fatal)?
            .ok_or(Rejection::Consensus("block header not found"))?;

        self.txns
            .add(&stored, &block.transactions, &self.blocks)
            .map_err(Rejection::from)?;

        // Apply every main-chain block that is now complete and
        // consecutive. A failure leaves `last_valid_block` untouched, so
        // validation resumes here after the cause is resolved.
        loop {
            let last_valid = self.utxo.last_valid_block().map_err(Rejection::Fatal)?;
            let current = self
                .blocks
                .get_by_id(last_valid)
                .map_err(Rejection::Fatal)?
                .ok_or_else(|| {
                    Rejection::Fatal(StorageError::Corruption("last valid block missing"))
                })?;
            let next = match self
                .blocks
                .by_height((current.height + 1) as u32)
                .map_err(Rejection::Fatal)?
            {
                Some(next) if next.previous_blockid == last_valid && next.txn_count > 0 => next,
                _ => break,
            };
            self.utxo.update(&next, &self.txns).map_err(Rejection::from)?;
        }

        Ok(())
    }

    fn on_notfound(&mut self, id: PeerId, items: Vec<InventoryHash>) {
        let block_count = items
            .iter()
            .filter(|item| matches!(item, InventoryHash::Block(_)))
            .count();
        // The peer cannot serve these; free its quota so another peer is
        // asked after the re-request interval.
        self.release_in_flight(id, block_count);
    }

    fn release_in_flight(&mut self, id: PeerId, count: usize) {
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.in_flight_blocks = peer.in_flight_blocks.saturating_sub(count);
        }
    }

    fn sync_blockchain_blocks(&mut self) -> Result<(), NodeError> {
        // Top up the working set from the store.
        if self.incomplete_blocks.len() < MAX_INCOMPLETE_BLOCKS {
            let incomplete = self
                .blocks
                .incomplete_blocks(self.last_incomplete_blockid, MAX_INCOMPLETE_FETCH)?;
            if let Some(last) = incomplete.last() {
                self.last_incomplete_blockid = Some(last.blockid);
            }
            for stored in incomplete {
                self.incomplete_blocks.entry(stored.hash).or_insert(None);
            }
        }

        if self.incomplete_blocks.is_empty() {
            return Ok(());
        }

        let now = Instant::now();
        let mut ready: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| p.verack)
            .map(|p| p.id)
            .collect();
        ready.shuffle(&mut rand::thread_rng());

        for peer_id in ready {
            let in_flight = match self.peers.get(&peer_id) {
                Some(peer) if peer.in_flight_blocks < MAX_INCOMPLETE_INFLIGHT => {
                    peer.in_flight_blocks
                }
                _ => continue,
            };

            // Pick hashes that aren't awaiting a recent request.
            let mut getdata = Vec::new();
            for (hash, last_request) in self.incomplete_blocks.iter_mut() {
                let stale = match last_request {
                    None => true,
                    Some(at) => now.duration_since(*at) >= BLOCK_REREQUEST_AFTER,
                };
                if !stale {
                    continue;
                }
                *last_request = Some(now);
                getdata.push(InventoryHash::Block(*hash));
                if getdata.len() + in_flight >= MAX_INCOMPLETE_INFLIGHT {
                    break;
                }
            }

            if getdata.is_empty() {
                break;
            }

            let count = getdata.len();
            if let Some(peer) = self.peers.get_mut(&peer_id) {
                trace!(peer = peer_id, count, "requesting block bodies");
                peer.send(Message::GetData(getdata));
                peer.in_flight_blocks += count;
            }
        }
        Ok(())
    }

    // ---- alerts ----

    fn on_alert(&mut self, id: PeerId, alert: Alert) {
        if !alert.verify(self.coin.alert_public_key) && !alert.verify(VENDOR_ALERT_KEY) {
            info!(peer = id, "ignored alert with invalid signature");
            return;
        }
        match alert.decode_payload() {
            Ok(payload) => {
                info!(id = payload.id, status = %payload.status_bar, "alert archived");
                if self.alerts.len() >= MAX_ALERTS {
                    self.alerts.remove(0);
                }
                self.alerts.push((Utc::now(), payload));
            }
            Err(error) => {
                // Signed by a trusted key yet unparseable; note and drop.
                warn!(peer = id, %error, "alert payload did not parse");
            }
        }
    }

    // ---- maintenance ----

    fn spawn_seed_resolution(&mut self) {
        if self.resolving {
            return;
        }
        self.resolving = true;
        let mut seeder = DnsSeeder::new(self.coin);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            seeder.refill().await;
            let mut addrs = Vec::new();
            while let Some(addr) = seeder.pop() {
                addrs.push(addr);
            }
            let _ = events.send(Event::Discovered(addrs));
        });
    }

    /// Add one outbound connection, biased occasionally toward discovery
    /// even when the address book has entries.
    fn add_any_peer(&mut self) {
        let use_discovery =
            self.address_book.is_empty() || rand::thread_rng().gen_range(0..6) == 1;

        if use_discovery {
            if !self.config.bootstrap {
                return;
            }
            match self.discovered.pop_front() {
                Some(addr) => self.add_peer(addr),
                None => self.spawn_seed_resolution(),
            }
        } else {
            let active: Vec<SocketAddr> = self.peers.values().map(|p| p.addr).collect();
            if let Some(addr) = self.address_book.pick_unconnected(&active) {
                self.add_peer(addr);
            }
        }
    }

    #[cfg(test)]
    fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    /// Periodic maintenance, roughly every ten seconds.
    fn heartbeat(&mut self) -> Result<(), NodeError> {
        // Seek more peers, up to five attempts per beat.
        let deficit = self.config.seek_peers.saturating_sub(self.peers.len());
        for _ in 0..deficit.min(5) {
            self.add_any_peer();
        }

        // A thin address book asks a random ready peer for more.
        if self.address_book.len() < 50 {
            let ready: Vec<PeerId> = self
                .peers
                .values()
                .filter(|p| p.verack)
                .map(|p| p.id)
                .collect();
            if let Some(id) = ready.choose(&mut rand::thread_rng()) {
                self.send(*id, Message::GetAddr);
            }
        }

        // Liveness: ping quiet peers, drop silent ones.
        let now = Instant::now();
        let mut to_ping = Vec::new();
        let mut to_close = Vec::new();
        for peer in self.peers.values_mut() {
            // Forgive one point of misbehavior per beat.
            peer.reduce_ban_score(1);

            if now.duration_since(peer.last_rx) > RX_IDLE_TIMEOUT {
                to_close.push(peer.id);
            } else if now.duration_since(peer.last_tx) > PING_AFTER_TX_IDLE
                && now.duration_since(peer.last_ping) > PING_SPACING
            {
                to_ping.push(peer.id);
            }
        }
        for id in to_close {
            debug!(peer = id, "receive idle timeout");
            self.close_peer(id);
        }
        for id in to_ping {
            if let Some(peer) = self.peers.get_mut(&id) {
                peer.last_ping = Instant::now();
                peer.send(Message::Ping(Nonce::random()));
            }
        }

        // Expired bans are forgotten.
        self.banned.retain(|_, at| at.elapsed() < BAN_DURATION);

        self.decay_relay();

        if !self.peers.is_empty() {
            self.sync_blockchain_headers(false)?;
            self.sync_blockchain_blocks()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(dir: &std::path::Path) -> Node {
        let config = Config {
            listen_addr: None,
            seek_peers: 0,
            max_peers: 8,
            bootstrap: false,
            user_agent: None,
        };
        let state_config = magpie_state::Config {
            data_dir: dir.to_path_buf(),
            verification_workers: Some(1),
            ..Default::default()
        };
        Node::new(Coin::bitcoin(), config, state_config).unwrap()
    }

    async fn connected_pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, peer_addr) = listener.accept().await.unwrap();
        (server, client, peer_addr)
    }

    #[tokio::test]
    async fn ban_score_threshold_disconnects_and_bans() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = test_node(dir.path());

        let (server, _client, peer_addr) = connected_pair().await;
        node.handle_event(Event::Inbound(server, peer_addr)).unwrap();
        let id = node.peer_ids()[0];

        // Five offenses keep the peer connected...
        for _ in 0..5 {
            node.punish(id, "test offense");
        }
        assert!(node.peers.contains_key(&id));
        assert!(node.banned.is_empty());

        // ...the sixth crosses the threshold.
        node.punish(id, "test offense");
        assert!(!node.peers.contains_key(&id));
        assert!(node.banned.contains_key(&peer_addr.ip()));

        // A banned address is refused on reconnect.
        let (server, _client2, peer_addr) = connected_pair().await;
        node.handle_event(Event::Inbound(server, peer_addr)).unwrap();
        assert!(node.peers.is_empty());
    }

    #[tokio::test]
    async fn heartbeat_decays_ban_scores() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = test_node(dir.path());

        let (server, _client, peer_addr) = connected_pair().await;
        node.handle_event(Event::Inbound(server, peer_addr)).unwrap();
        let id = node.peer_ids()[0];

        node.punish(id, "test offense");
        node.punish(id, "test offense");
        assert_eq!(node.peers[&id].ban_score, 2);

        node.heartbeat().unwrap();
        assert_eq!(node.peers[&id].ban_score, 1);
        node.heartbeat().unwrap();
        node.heartbeat().unwrap();
        // The floor is zero.
        assert_eq!(node.peers[&id].ban_score, 0);
    }

    #[tokio::test]
    async fn relay_quota_accumulates_and_decays() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = test_node(dir.path());

        for _ in 0..3 {
            node.relay(&Message::GetAddr, 7);
        }
        assert_eq!(node.relay_counts[&7], 3.0);

        // Ten messages per second decay: pretend a second passed.
        node.last_relay_decay = Instant::now() - std::time::Duration::from_secs(1);
        node.decay_relay();
        assert!(!node.relay_counts.contains_key(&7));
    }

    #[tokio::test]
    async fn external_ip_follows_the_plurality() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = test_node(dir.path());
        let vote = |ip: [u8; 4]| {
            Version::new(
                ProtocolVersion(70002),
                SocketAddr::new(IpAddr::from(ip), 8333),
                PeerServices::NODE_NETWORK,
                PeerServices::NODE_NETWORK,
                SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8333),
                Nonce(1),
                "/test/".to_owned(),
                block::Height(0),
                false,
            )
        };

        // Keep the client halves alive for the duration.
        let mut clients = Vec::new();
        for ip in [[9, 9, 9, 9], [8, 8, 8, 8], [9, 9, 9, 9]] {
            let (server, client, peer_addr) = connected_pair().await;
            clients.push(client);
            node.handle_event(Event::Inbound(server, peer_addr)).unwrap();
            let id = node.next_peer_id - 1;
            node.on_version(id, vote(ip));
        }

        assert_eq!(node.guessed_external_ip, IpAddr::from([9, 9, 9, 9]));
    }
}
