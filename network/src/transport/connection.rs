use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::reassembler::{Assembly, Reassembler};
use super::shard::{peek_magic, Shard, ShardCodec};
use super::Magic;
use crate::errors::TransportError;
use crate::protowire::{Message, MessageKind};

const RECV_BUFFER_SIZE: usize = 65_536;
const INBOUND_QUEUE: usize = 64;

/// A decoded message and the address its last shard came from.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub message: Message,
    pub from: SocketAddr,
    /// Set when this is a resent copy of a shard set already delivered.
    pub repeat: bool,
}

/// Anything shard datagrams can be pushed into.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    /// Best-effort send; returns the number of datagrams written.
    async fn send_shards(&self, shards: &[Vec<u8>]) -> usize;

    fn codec(&self) -> &ShardCodec;

    /// Seals and shards `payload`, then sends every shard.
    async fn send_message(&self, payload: &[u8], magic: Magic) -> Result<Vec<Vec<u8>>, TransportError> {
        let shards = self.codec().create_shards(payload, magic)?;
        self.send_shards(&shards).await;
        Ok(shards)
    }
}

/// One bound UDP socket plus the destinations its sends go to.
pub struct Connection {
    socket: Arc<UdpSocket>,
    codec: Arc<ShardCodec>,
    destinations: RwLock<Vec<SocketAddr>>,
}

impl Connection {
    /// Binds `listen`. A multicast listen address binds the wildcard address
    /// on its port and joins the group.
    pub async fn bind(listen: SocketAddr, destinations: Vec<SocketAddr>, codec: Arc<ShardCodec>) -> Result<Self, TransportError> {
        let socket = match listen.ip() {
            IpAddr::V4(group) if group.is_multicast() => {
                let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, listen.port()))).await?;
                socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)?;
                socket
            }
            _ => UdpSocket::bind(listen).await?,
        };
        if listen.is_ipv4() {
            socket.set_multicast_loop_v4(true)?;
        }
        debug!("shard transport bound on {}", socket.local_addr()?);

        Ok(Self { socket: Arc::new(socket), codec, destinations: RwLock::new(destinations) })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn destinations(&self) -> Vec<SocketAddr> {
        self.destinations.read().clone()
    }

    pub fn set_destinations(&self, destinations: Vec<SocketAddr>) {
        *self.destinations.write() = destinations;
    }

    /// Spawns the receive loop for this socket. Only shards whose marker
    /// belongs to one of `kinds` are reassembled; everything that fails to
    /// reconstruct, authenticate or decode is dropped.
    pub fn listen(&self, kinds: &[MessageKind], cancel: CancellationToken) -> mpsc::Receiver<Inbound> {
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
        let socket = self.socket.clone();
        let codec = self.codec.clone();
        let kinds = kinds.to_vec();

        tokio::spawn(async move {
            let mut reassembler = Reassembler::default();
            let mut buf = vec![0u8; RECV_BUFFER_SIZE];
            loop {
                let (len, from) = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = socket.recv_from(&mut buf) => match received {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("receive failed: {}", e);
                            continue;
                        }
                    },
                };

                let datagram = &buf[..len];
                let Some(kind) = peek_magic(datagram).and_then(|m| MessageKind::from_magic(&m)) else {
                    trace!("dropping datagram with unknown marker from {}", from);
                    continue;
                };
                if !kinds.contains(&kind) {
                    continue;
                }
                if let Some((message, repeat)) = accept_datagram(&codec, &mut reassembler, datagram, kind) {
                    if tx.send(Inbound { message, from, repeat }).await.is_err() {
                        break;
                    }
                }
            }
            debug!("listener stopped");
        });
        rx
    }
}

/// Runs one datagram through parsing, reassembly, opening and decoding.
fn accept_datagram(codec: &ShardCodec, reassembler: &mut Reassembler, datagram: &[u8], kind: MessageKind) -> Option<(Message, bool)> {
    let shard = match Shard::parse(datagram) {
        Ok(shard) => shard,
        Err(e) => {
            trace!("dropping shard: {}", e);
            return None;
        }
    };

    let now = Instant::now();
    let nonce = shard.nonce;
    let (payload, repeat) = match reassembler.insert(shard, now) {
        Assembly::Incomplete => return None,
        Assembly::Repeated(payload) => (payload, true),
        Assembly::Ready(set) => match codec.open(&set.shards) {
            Ok(payload) => {
                reassembler.mark_decoded(&set, payload.clone(), now);
                (payload, false)
            }
            Err(TransportError::Authentication) => {
                debug!("shard set {} failed authentication", hex::encode(nonce));
                reassembler.reject(nonce);
                return None;
            }
            Err(e) => {
                trace!("shard set {} not yet recoverable: {}", hex::encode(nonce), e);
                reassembler.restore(set);
                return None;
            }
        },
    };

    match kind.decode(payload) {
        Ok(message) => Some((message, repeat)),
        Err(e) => {
            debug!("dropping malformed {} container: {}", kind, e);
            None
        }
    }
}

#[async_trait]
impl DatagramSink for Connection {
    async fn send_shards(&self, shards: &[Vec<u8>]) -> usize {
        let destinations = self.destinations();
        let mut sent = 0;
        for addr in &destinations {
            for shard in shards {
                match self.socket.send_to(shard, addr).await {
                    Ok(_) => sent += 1,
                    Err(e) => warn!("failed to send shard to {}: {}", addr, e),
                }
            }
        }
        sent
    }

    fn codec(&self) -> &ShardCodec {
        &self.codec
    }
}
