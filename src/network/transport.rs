//! In-Process Transport
//!
//! Simulation code never talks to sockets. It queues [`ServerMessage`]s in an
//! [`Outbox`]; the driver hands the outbox to a transport after each tick.
//! [`LoopbackTransport`] wires a server to in-process clients over tokio
//! channels, with every message going through the binary wire codec.

use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::core::tick::SimulationTick;
use crate::game::clock::ConnectionId;
use crate::game::input::InputFrame;
use crate::game::state::TeamType;
use crate::network::protocol::{ClientMessage, ServerMessage};

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer's channel is closed or unknown.
    #[error("connection {0} is not connected")]
    Disconnected(ConnectionId),

    /// A frame could not be encoded or decoded.
    #[error("wire codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Who a queued message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected client
    All,
    /// One client
    Connection(ConnectionId),
}

/// Messages produced during a tick, waiting for delivery.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<(Recipient, ServerMessage)>,
}

impl Outbox {
    /// Queue a message for every client.
    pub fn broadcast(&mut self, message: ServerMessage) {
        self.messages.push((Recipient::All, message));
    }

    /// Queue a message for one client.
    pub fn send(&mut self, connection: ConnectionId, message: ServerMessage) {
        self.messages.push((Recipient::Connection(connection), message));
    }

    /// Remove and yield queued messages in order.
    pub fn drain(&mut self) -> impl Iterator<Item = (Recipient, ServerMessage)> + '_ {
        self.messages.drain(..)
    }

    /// Nothing queued.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

/// Client side of a loopback connection.
#[derive(Debug)]
pub struct ClientEndpoint {
    connection: ConnectionId,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<(ConnectionId, Vec<u8>)>,
}

impl ClientEndpoint {
    /// Connection this endpoint belongs to.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Send a message to the server.
    pub fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        let frame = message.to_bytes()?;
        self.outbound
            .send((self.connection, frame))
            .map_err(|_| TransportError::Disconnected(self.connection))
    }

    /// Ask to join on `team`.
    pub fn request_team(&self, team: TeamType) -> Result<(), TransportError> {
        self.send(&ClientMessage::TeamRequest { team })
    }

    /// Send input for `tick`.
    pub fn send_input(&self, tick: SimulationTick, frame: InputFrame) -> Result<(), TransportError> {
        self.send(&ClientMessage::Input { tick, frame })
    }

    /// Next delivered message, if any, without waiting.
    pub fn try_recv(&mut self) -> Result<Option<ServerMessage>, TransportError> {
        match self.inbound.try_recv() {
            Ok(frame) => Ok(Some(ServerMessage::from_bytes(&frame)?)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(TransportError::Disconnected(self.connection))
            }
        }
    }

    /// Every message delivered so far.
    pub fn drain(&mut self) -> Result<Vec<ServerMessage>, TransportError> {
        let mut messages = Vec::new();
        while let Some(message) = self.try_recv()? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Wait for the next message. `None` once the server dropped the link.
    pub async fn recv(&mut self) -> Result<Option<ServerMessage>, TransportError> {
        match self.inbound.recv().await {
            Some(frame) => Ok(Some(ServerMessage::from_bytes(&frame)?)),
            None => Ok(None),
        }
    }
}

/// Server side of the in-process transport.
#[derive(Debug)]
pub struct LoopbackTransport {
    clients: BTreeMap<ConnectionId, mpsc::UnboundedSender<Vec<u8>>>,
    inbound_tx: mpsc::UnboundedSender<(ConnectionId, Vec<u8>)>,
    inbound_rx: mpsc::UnboundedReceiver<(ConnectionId, Vec<u8>)>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// Transport with no clients.
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            clients: BTreeMap::new(),
            inbound_tx,
            inbound_rx,
        }
    }

    /// Attach a client.
    pub fn connect(&mut self, connection: ConnectionId) -> ClientEndpoint {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.clients.insert(connection, tx).is_some() {
            warn!(%connection, "replacing existing connection");
        }
        debug!(%connection, "client connected");
        ClientEndpoint {
            connection,
            inbound: rx,
            outbound: self.inbound_tx.clone(),
        }
    }

    /// Detach a client. Its endpoint sees the channel close.
    pub fn disconnect(&mut self, connection: ConnectionId) -> bool {
        let removed = self.clients.remove(&connection).is_some();
        if removed {
            debug!(%connection, "client disconnected");
        }
        removed
    }

    /// Connected clients.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.clients.keys().copied()
    }

    /// Deliver everything in `outbox`. Returns the number of frames sent.
    ///
    /// Broadcasts skip clients whose endpoint is gone; a direct message to
    /// such a client is an error.
    pub fn deliver(&mut self, outbox: &mut Outbox) -> Result<usize, TransportError> {
        let mut sent = 0;
        for (recipient, message) in outbox.drain() {
            let frame = message.to_bytes()?;
            match recipient {
                Recipient::All => {
                    for (connection, client) in &self.clients {
                        if client.send(frame.clone()).is_ok() {
                            sent += 1;
                        } else {
                            warn!(%connection, kind = message.kind(), "dropping broadcast to closed endpoint");
                        }
                    }
                }
                Recipient::Connection(connection) => {
                    let client = self
                        .clients
                        .get(&connection)
                        .ok_or(TransportError::Disconnected(connection))?;
                    client
                        .send(frame)
                        .map_err(|_| TransportError::Disconnected(connection))?;
                    sent += 1;
                }
            }
            trace!(kind = message.kind(), "delivered");
        }
        Ok(sent)
    }

    /// Client messages received so far, in arrival order.
    ///
    /// Frames that fail to decode are logged and skipped.
    pub fn poll_client_messages(&mut self) -> Vec<(ConnectionId, ClientMessage)> {
        let mut messages = Vec::new();
        while let Ok((connection, frame)) = self.inbound_rx.try_recv() {
            match ClientMessage::from_bytes(&frame) {
                Ok(message) => messages.push((connection, message)),
                Err(err) => warn!(%connection, error = %err, "discarding malformed client frame"),
            }
        }
        messages
    }
}
