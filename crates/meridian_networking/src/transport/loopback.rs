//! In-process star network.
//!
//! One host endpoint and any number of client endpoints exchange events
//! over bounded channels. Used to run a whole session inside one process,
//! e.g. in tests. Both delivery classes arrive in order; nothing is lost
//! unless a queue is full.

use super::{ConnectionId, Delivery, SendTarget, Transport, TransportEvent, TransportStats};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The connection handle a client uses for the host.
pub const HOST_CONNECTION: ConnectionId = ConnectionId(0);

/// Events each endpoint can queue before sends are dropped.
const QUEUE_CAPACITY: usize = 4096;

struct Hub {
    next_connection: u32,
    host_inbox: Sender<TransportEvent>,
    clients: BTreeMap<ConnectionId, Sender<TransportEvent>>,
}

/// Handle for attaching clients to a loopback host.
#[derive(Clone)]
pub struct LoopbackNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackNetwork {
    /// Creates a network and returns it with the host endpoint.
    #[must_use]
    pub fn new() -> (Self, LoopbackTransport) {
        let (host_inbox, inbox) = bounded(QUEUE_CAPACITY);
        let hub = Arc::new(Mutex::new(Hub {
            next_connection: HOST_CONNECTION.0 + 1,
            host_inbox,
            clients: BTreeMap::new(),
        }));

        let host = LoopbackTransport {
            role: Role::Host,
            hub: Arc::clone(&hub),
            inbox,
            stats: TransportStats::default(),
        };
        (Self { hub }, host)
    }

    /// Connects a new client endpoint.
    ///
    /// The host sees `Connected(id)` and the client sees
    /// `Connected(HOST_CONNECTION)` on their next poll.
    #[must_use]
    pub fn connect(&self) -> LoopbackTransport {
        let (client_inbox, inbox) = bounded(QUEUE_CAPACITY);
        let mut hub = self.hub.lock();

        let id = ConnectionId(hub.next_connection);
        hub.next_connection += 1;

        // Both queues are empty at this point, so neither send can fail
        let _ = client_inbox.try_send(TransportEvent::Connected(HOST_CONNECTION));
        let _ = hub.host_inbox.try_send(TransportEvent::Connected(id));
        hub.clients.insert(id, client_inbox);
        drop(hub);

        tracing::debug!("Loopback client connected: {}", id);
        LoopbackTransport {
            role: Role::Client {
                id,
                connected: true,
            },
            hub: Arc::clone(&self.hub),
            inbox,
            stats: TransportStats::default(),
        }
    }

    /// Number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.hub.lock().clients.len()
    }
}

enum Role {
    Host,
    Client { id: ConnectionId, connected: bool },
}

/// One endpoint of a [`LoopbackNetwork`].
pub struct LoopbackTransport {
    role: Role,
    hub: Arc<Mutex<Hub>>,
    inbox: Receiver<TransportEvent>,
    stats: TransportStats,
}

impl LoopbackTransport {
    /// The host's handle for this client, `None` on the host.
    #[must_use]
    pub const fn connection_id(&self) -> Option<ConnectionId> {
        match self.role {
            Role::Host => None,
            Role::Client { id, .. } => Some(id),
        }
    }

    /// Returns true while a client is attached; always true on the host.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        match self.role {
            Role::Host => true,
            Role::Client { connected, .. } => connected,
        }
    }

    /// Detaches a client. The host sees `Disconnected` on its next poll.
    pub fn disconnect(&mut self) {
        let Role::Client { id, connected } = &mut self.role else {
            return;
        };
        if !*connected {
            return;
        }
        *connected = false;

        let id = *id;
        let mut hub = self.hub.lock();
        hub.clients.remove(&id);
        if hub.host_inbox.try_send(TransportEvent::Disconnected(id)).is_err() {
            tracing::warn!("Host queue full, disconnect of {} not reported", id);
        }
        drop(hub);
        tracing::debug!("Loopback client disconnected: {}", id);
    }

    fn deliver(&mut self, queue: &Sender<TransportEvent>, event: TransportEvent, len: usize) {
        match queue.try_send(event) {
            Ok(()) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += len as u64;
            }
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.stats.send_errors += 1;
            }
        }
    }
}

impl Transport for LoopbackTransport {
    fn is_host(&self) -> bool {
        matches!(self.role, Role::Host)
    }

    fn send(&mut self, target: SendTarget, bytes: &[u8], delivery: Delivery) {
        tracing::trace!("Loopback send {:?} {:?}, {} bytes", target, delivery, bytes.len());

        match self.role {
            Role::Host => {
                let queues: Vec<(ConnectionId, Sender<TransportEvent>)> = {
                    let hub = self.hub.lock();
                    hub.clients
                        .iter()
                        .filter(|(id, _)| match target {
                            SendTarget::Connection(to) => **id == to,
                            SendTarget::Broadcast => true,
                            SendTarget::BroadcastExcept(skip) => **id != skip,
                        })
                        .map(|(id, queue)| (*id, queue.clone()))
                        .collect()
                };

                if queues.is_empty() {
                    if let SendTarget::Connection(_) = target {
                        self.stats.send_errors += 1;
                    }
                }
                for (_, queue) in queues {
                    let event = TransportEvent::Message {
                        connection: HOST_CONNECTION,
                        bytes: bytes.to_vec(),
                    };
                    self.deliver(&queue, event, bytes.len());
                }
            }
            Role::Client { id, connected } => {
                let reaches_host = match target {
                    SendTarget::Connection(to) => to == HOST_CONNECTION,
                    SendTarget::Broadcast => true,
                    SendTarget::BroadcastExcept(skip) => skip != HOST_CONNECTION,
                };
                if !connected || !reaches_host {
                    self.stats.send_errors += 1;
                    return;
                }

                let queue = self.hub.lock().host_inbox.clone();
                let event = TransportEvent::Message {
                    connection: id,
                    bytes: bytes.to_vec(),
                };
                self.deliver(&queue, event, bytes.len());
            }
        }
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        if !self.is_connected() {
            return None;
        }
        let event = self.inbox.try_recv().ok()?;
        if let TransportEvent::Message { bytes, .. } = &event {
            self.stats.packets_received += 1;
            self.stats.bytes_received += bytes.len() as u64;
        }
        Some(event)
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
