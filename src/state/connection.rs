//! Connection management.
//!
//! Owns the socket to the game server. The connection is the only thing that
//! writes to the wire; the session hands it typed packets and receives typed
//! packets back.
//!
//! There is no reconnection. Once the socket closes the connection stays
//! `Closed` and sends are dropped.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::state::protocol::{FindGameParams, InboundPacket, OutboundPacket};

/// Socket errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("socket is closed")]
    Closed,

    #[error("socket I/O failed: {0}")]
    Io(String),
}

/// A bidirectional text-frame socket.
///
/// Implementations must not block in `try_recv`: return `Ok(None)` when no
/// frame is waiting.
pub trait Transport {
    fn open(&mut self, url: &str) -> Result<(), TransportError>;

    fn send_text(&mut self, frame: String) -> Result<(), TransportError>;

    /// Next pending frame, if any. `Err` means the socket is gone.
    fn try_recv(&mut self) -> Result<Option<String>, TransportError>;

    fn is_open(&self) -> bool;

    fn close(&mut self);
}

/// Connection status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Never opened
    Idle,

    /// Socket open
    Open { since: Instant },

    /// Closed for good
    Closed { since: Instant },
}

impl ConnectionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Open { .. } => "open",
            Self::Closed { .. } => "closed",
        }
    }
}

/// Connection to the game server.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    transport: T,

    /// Current connection status
    pub status: ConnectionStatus,

    /// Server URL, set on `connect`
    pub url: Option<String>,

    /// Frames written to the socket
    pub sent_count: u64,

    /// Frames read from the socket, including dropped ones
    pub received_count: u64,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            status: ConnectionStatus::Idle,
            url: None,
            sent_count: 0,
            received_count: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open() && self.transport.is_open()
    }

    /// Open the socket and immediately ask for a game.
    pub fn connect(&mut self, url: &str, find_game: FindGameParams) -> Result<(), TransportError> {
        info!("Connecting to {}", url);
        self.url = Some(url.to_string());

        if let Err(e) = self.transport.open(url) {
            self.mark_closed();
            return Err(e);
        }
        self.status = ConnectionStatus::Open {
            since: Instant::now(),
        };

        self.send(&OutboundPacket::FindGame(find_game));
        Ok(())
    }

    /// Serialize and send a packet.
    ///
    /// Fails silently (returns `false`) when the socket is not open. Nothing
    /// is queued for later.
    pub fn send(&mut self, packet: &OutboundPacket) -> bool {
        if !self.is_open() {
            debug!("Dropping {:?}: socket not open", packet.opcode());
            return false;
        }

        let frame = match packet.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode packet: {}", e);
                return false;
            }
        };

        match self.transport.send_text(frame) {
            Ok(()) => {
                self.sent_count += 1;
                debug!("Sent {:?}", packet.opcode());
                true
            }
            Err(e) => {
                warn!("Send failed, closing connection: {}", e);
                self.mark_closed();
                false
            }
        }
    }

    /// Decode one text frame for the session.
    ///
    /// Unknown opcodes and malformed frames are logged and dropped.
    pub fn receive(&mut self, frame: &str) -> Option<InboundPacket> {
        self.received_count += 1;
        match InboundPacket::decode(frame) {
            Ok(Some(packet)) => Some(packet),
            Ok(None) => {
                debug!("Ignoring frame with unknown opcode: {}", frame);
                None
            }
            Err(e) => {
                warn!("Ignoring malformed frame: {}", e);
                None
            }
        }
    }

    /// Drain every frame waiting on the socket, in delivery order.
    pub fn poll(&mut self) -> Vec<InboundPacket> {
        let mut packets = Vec::new();
        if !self.status.is_open() {
            return packets;
        }

        loop {
            match self.transport.try_recv() {
                Ok(Some(frame)) => packets.extend(self.receive(&frame)),
                Ok(None) => break,
                Err(e) => {
                    warn!("Connection lost: {}", e);
                    self.mark_closed();
                    break;
                }
            }
        }
        packets
    }

    pub fn close(&mut self) {
        if self.status.is_open() {
            self.transport.close();
        }
        self.mark_closed();
    }

    /// Time since the socket opened, if it is open.
    pub fn uptime(&self) -> Option<Duration> {
        match self.status {
            ConnectionStatus::Open { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    fn mark_closed(&mut self) {
        if !self.status.is_closed() {
            self.status = ConnectionStatus::Closed {
                since: Instant::now(),
            };
        }
    }
}

/// In-memory transport.
///
/// Frames queued with [`MemoryTransport::push_inbound`] are handed out by
/// `try_recv`; sent frames are recorded in `sent`. Useful for tests and for
/// driving a session from something other than a socket.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<String>,
    /// Every frame sent, oldest first
    pub sent: Vec<String>,
    open: bool,
    /// Make the next `open` call fail
    pub refuse_open: bool,
    /// Report the socket as dropped once the inbound queue is drained
    pub drop_when_drained: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_inbound(&mut self, frame: impl Into<String>) {
        self.inbound.push_back(frame.into());
    }

    /// Decode the recorded outbound frames.
    pub fn sent_packets(&self) -> Vec<OutboundPacket> {
        self.sent
            .iter()
            .filter_map(|frame| OutboundPacket::decode(frame).ok().flatten())
            .collect()
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self, url: &str) -> Result<(), TransportError> {
        if self.refuse_open {
            return Err(TransportError::Open {
                url: url.to_string(),
                reason: "refused".to_string(),
            });
        }
        self.open = true;
        Ok(())
    }

    fn send_text(&mut self, frame: String) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.sent.push(frame);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<String>, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        match self.inbound.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None if self.drop_when_drained => {
                self.open = false;
                Err(TransportError::Closed)
            }
            None => Ok(None),
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }
}
