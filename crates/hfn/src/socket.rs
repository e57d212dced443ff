//! The connection state machine.
//!
//! A [`Socket`] owns the transport lifecycle: it dials, buffers writes,
//! watches the heartbeat, and reconnects with exponential backoff. It runs
//! as one task; the rest of the client talks to it through a
//! [`SocketHandle`] and listens on a [`SocketEvent`] channel.
//!
//! ```text
//! CONNECTING ──OPEN packet──→ CONNECTED ──error/close/dead──→ DISCONNECTED
//!     ↑                                                            │
//!     └────────────────── backoff timer ──────────────────────────┘
//! ```
//!
//! Reconnection replaces the transport wholesale. Transport events are
//! stamped with a generation number; events from a replaced transport are
//! discarded so a dying connection cannot poison its successor.

use std::time::Duration;

use hfn_protocol::{MessagePayload, Packet};
use hfn_transport::{
    ConnectParams, Connector, Transport, TransportEvent, TransportEventKind,
};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::util;

/// Ping interval assumed until the server's OPEN packet says otherwise.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 25;
/// Ping timeout assumed until the server's OPEN packet says otherwise.
pub const DEFAULT_PING_TIMEOUT_SECS: u64 = 20;
/// Reconnection attempts are abandoned once the retry counter passes
/// this ceiling.
pub const MAX_RETRIES: u32 = 10;

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Application id.
    pub app_id: String,
    /// Persistent client id.
    pub client_id: String,
    /// Static endpoint, used verbatim when present.
    pub runway: Option<String>,
    /// Endpoint candidates, tried round-robin when no runway is set.
    pub towers: Vec<String>,
}

/// What the socket reports upward.
#[derive(Debug)]
pub enum SocketEvent {
    /// The server acknowledged the connection with an OPEN packet.
    Open,
    /// An inbound application message, addressed by package.
    Message {
        /// The package the message belongs to.
        package_id: u32,
        /// The decoded message.
        payload: MessagePayload,
    },
    /// The connection dropped; a reconnect is scheduled unless the retry
    /// ceiling was hit.
    Disconnected {
        /// Why the connection dropped.
        reason: String,
    },
    /// The retry ceiling was exceeded; the socket task has stopped.
    GaveUp,
}

enum Command {
    Send {
        package_id: u32,
        headers: Vec<(String, String)>,
        payload: Vec<u8>,
    },
    Close,
}

/// Cheap handle for talking to a running socket task.
#[derive(Clone)]
pub struct SocketHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SocketHandle {
    /// Queues an application message. Buffered until the connection is
    /// open and writable; silently dropped if the socket task has
    /// stopped.
    pub fn send(
        &self,
        package_id: u32,
        headers: Vec<(String, String)>,
        message: &MessagePayload,
    ) {
        let payload = message.encode();
        if self
            .commands
            .send(Command::Send {
                package_id,
                headers,
                payload,
            })
            .is_err()
        {
            tracing::debug!("send on a stopped socket");
        }
    }

    /// Shuts the socket down. Buffered packets are dropped.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// Spawns the socket task. Events are delivered on `events`; the returned
/// handle feeds it commands.
pub fn spawn<C: Connector>(
    connector: C,
    config: SocketConfig,
    events: mpsc::UnboundedSender<SocketEvent>,
) -> SocketHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();

    let socket = Socket {
        connector,
        config,
        commands: cmd_rx,
        events_out: events,
        transport_tx,
        transport_rx,
        transport: None,
        generation: 0,
        state: ReadyState::Connecting,
        writable: false,
        write_buffer: Vec::new(),
        ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
        ping_timeout: Duration::from_secs(DEFAULT_PING_TIMEOUT_SECS),
        last_inbound: Instant::now(),
        watchdog_at: None,
        reconnect_at: None,
        retries: 0,
        session_id: util::unique_id(),
        next_tower: 0,
        redirect_target: None,
    };
    tokio::spawn(socket.run());

    SocketHandle { commands: cmd_tx }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadyState {
    Connecting,
    Connected,
    Disconnected,
}

enum Flow {
    Continue,
    Stop,
}

struct Socket<C: Connector> {
    connector: C,
    config: SocketConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    events_out: mpsc::UnboundedSender<SocketEvent>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    transport: Option<C::Transport>,
    /// Bumped on every dial; events stamped with an older generation are
    /// stale and ignored.
    generation: u64,
    state: ReadyState,
    writable: bool,
    write_buffer: Vec<Packet>,
    ping_interval: Duration,
    ping_timeout: Duration,
    last_inbound: Instant,
    watchdog_at: Option<Instant>,
    reconnect_at: Option<Instant>,
    retries: u32,
    session_id: String,
    next_tower: usize,
    redirect_target: Option<String>,
}

impl<C: Connector> Socket<C> {
    async fn run(mut self) {
        if let Flow::Stop = self.connect().await {
            return;
        }

        loop {
            let watchdog_at =
                self.watchdog_at.unwrap_or_else(Instant::now);
            let reconnect_at =
                self.reconnect_at.unwrap_or_else(Instant::now);

            let flow = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Send { package_id, headers, payload }) => {
                        self.write_buffer.push(Packet::Message {
                            id: 0,
                            package_id,
                            headers,
                            payload,
                        });
                        self.flush();
                        Flow::Continue
                    }
                    Some(Command::Close) | None => {
                        self.teardown().await;
                        Flow::Stop
                    }
                },
                Some(event) = self.transport_rx.recv() => {
                    if event.generation == self.generation {
                        self.on_transport_event(event.kind)
                    } else {
                        tracing::trace!(
                            generation = event.generation,
                            "ignoring event from replaced transport"
                        );
                        Flow::Continue
                    }
                }
                _ = sleep_until(watchdog_at), if self.watchdog_at.is_some() => {
                    self.on_watchdog()
                }
                _ = sleep_until(reconnect_at), if self.reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.connect().await
                }
            };

            if let Flow::Stop = flow {
                tracing::debug!("socket task stopped");
                return;
            }
        }
    }

    async fn connect(&mut self) -> Flow {
        let Some(url) = self.resolve_endpoint() else {
            tracing::error!("no runway and no towers to connect to");
            self.emit(SocketEvent::Disconnected {
                reason: "no endpoint".into(),
            });
            self.emit(SocketEvent::GaveUp);
            return Flow::Stop;
        };

        self.state = ReadyState::Connecting;
        self.writable = false;
        self.generation += 1;

        let params = ConnectParams {
            url,
            app_id: self.config.app_id.clone(),
            client_id: self.config.client_id.clone(),
            session_id: self.session_id.clone(),
            timestamp_ms: util::now_ms(),
        };
        tracing::debug!(
            generation = self.generation,
            url = %params.url,
            "dialing"
        );

        match self
            .connector
            .connect(&params, self.generation, self.transport_tx.clone())
            .await
        {
            Ok(transport) => {
                self.transport = Some(transport);
                self.last_inbound = Instant::now();
                Flow::Continue
            }
            Err(error) => {
                tracing::warn!(%error, "dial failed");
                self.on_close(error.to_string())
            }
        }
    }

    fn resolve_endpoint(&mut self) -> Option<String> {
        if let Some(target) = self.redirect_target.take() {
            return Some(target);
        }
        if let Some(runway) = &self.config.runway {
            return Some(runway.clone());
        }
        if self.config.towers.is_empty() {
            return None;
        }
        let tower =
            self.config.towers[self.next_tower % self.config.towers.len()]
                .clone();
        self.next_tower += 1;
        Some(tower)
    }

    fn on_transport_event(&mut self, kind: TransportEventKind) -> Flow {
        match kind {
            TransportEventKind::Opened => {
                // Physically open, but not CONNECTED until the server's
                // OPEN packet arrives.
                self.writable = true;
                Flow::Continue
            }
            TransportEventKind::Drain => {
                self.writable = true;
                self.flush();
                Flow::Continue
            }
            TransportEventKind::Packets(packets) => self.on_packets(packets),
            TransportEventKind::Error(reason) => self.on_close(reason),
            TransportEventKind::Closed => {
                self.on_close("transport closed".into())
            }
        }
    }

    fn on_packets(&mut self, packets: Vec<Packet>) -> Flow {
        if self.state == ReadyState::Disconnected {
            return Flow::Continue;
        }
        self.last_inbound = Instant::now();

        for packet in packets {
            match packet {
                Packet::Open {
                    ping_interval,
                    ping_timeout,
                } => self.on_open(ping_interval, ping_timeout),
                Packet::Ping => {
                    self.write_buffer.push(Packet::Pong);
                    self.flush();
                }
                Packet::Message {
                    package_id,
                    payload,
                    ..
                } => match MessagePayload::decode(&payload) {
                    Ok(message) => self.emit(SocketEvent::Message {
                        package_id,
                        payload: message,
                    }),
                    // Malformed payload: drop the message, keep the
                    // connection.
                    Err(error) => {
                        tracing::warn!(%error, "discarding malformed message");
                    }
                },
                Packet::Retry { delay } => {
                    let delay = delay.unwrap_or(0);
                    tracing::info!(delay, "server asked for a reconnect");
                    return self.server_reconnect(delay, false);
                }
                Packet::Reset { delay } => {
                    let delay = delay.unwrap_or(0);
                    tracing::info!(delay, "server asked for a session reset");
                    return self.server_reconnect(delay, true);
                }
                Packet::Redirect { delay, target } => {
                    let delay = delay.unwrap_or(0);
                    tracing::info!(delay, %target, "server redirected us");
                    self.redirect_target = Some(target);
                    return self.server_reconnect(delay, false);
                }
                Packet::Close { reason } => {
                    let reason =
                        reason.unwrap_or_else(|| "server close".into());
                    tracing::info!(%reason, "server closed the connection");
                    self.state = ReadyState::Disconnected;
                    self.watchdog_at = None;
                    self.emit(SocketEvent::Disconnected { reason });
                    return Flow::Stop;
                }
                Packet::Pong | Packet::Ack { .. } => {
                    // Liveness already recorded above.
                }
            }
        }
        Flow::Continue
    }

    fn on_open(&mut self, ping_interval: Option<u64>, ping_timeout: Option<u64>) {
        self.state = ReadyState::Connected;
        self.ping_interval = Duration::from_secs(
            ping_interval.unwrap_or(DEFAULT_PING_INTERVAL_SECS),
        );
        self.ping_timeout = Duration::from_secs(
            ping_timeout.unwrap_or(DEFAULT_PING_TIMEOUT_SECS),
        );
        self.retries = 0;
        self.watchdog_at = Some(Instant::now() + self.ping_interval);
        tracing::info!(
            generation = self.generation,
            ping_interval_secs = self.ping_interval.as_secs(),
            ping_timeout_secs = self.ping_timeout.as_secs(),
            "connected"
        );
        self.emit(SocketEvent::Open);
        self.flush();
    }

    fn on_watchdog(&mut self) -> Flow {
        let silent_for = self.last_inbound.elapsed();
        if silent_for > self.ping_timeout + self.ping_interval {
            tracing::warn!(
                silent_secs = silent_for.as_secs(),
                "no inbound traffic, connection presumed dead"
            );
            // The transport never reported an error; drop it and go
            // through the normal close path.
            self.transport = None;
            self.on_close("heartbeat timeout".into())
        } else {
            self.watchdog_at = Some(Instant::now() + self.ping_interval);
            Flow::Continue
        }
    }

    /// Server-directed reconnect: tears the transport down and redials
    /// after `delay` seconds without touching the retry counter.
    fn server_reconnect(&mut self, delay: u64, new_session: bool) -> Flow {
        if new_session {
            self.session_id = util::unique_id();
        }
        self.transport = None;
        self.state = ReadyState::Disconnected;
        self.writable = false;
        self.watchdog_at = None;
        self.reconnect_at =
            Some(Instant::now() + Duration::from_secs(delay));
        self.emit(SocketEvent::Disconnected {
            reason: "server reconnect".into(),
        });
        Flow::Continue
    }

    fn on_close(&mut self, reason: String) -> Flow {
        if self.state == ReadyState::Disconnected
            && self.reconnect_at.is_some()
        {
            // Already tearing down; a second error from the same corpse
            // changes nothing.
            return Flow::Continue;
        }
        self.transport = None;
        self.state = ReadyState::Disconnected;
        self.writable = false;
        self.watchdog_at = None;
        self.emit(SocketEvent::Disconnected {
            reason: reason.clone(),
        });

        if self.retries > MAX_RETRIES {
            tracing::error!(%reason, retries = self.retries, "giving up");
            self.emit(SocketEvent::GaveUp);
            return Flow::Stop;
        }

        let delay = Duration::from_secs(1 << self.retries.min(31));
        tracing::info!(
            %reason,
            retry = self.retries,
            delay_secs = delay.as_secs(),
            "reconnecting after backoff"
        );
        self.reconnect_at = Some(Instant::now() + delay);
        self.retries += 1;
        Flow::Continue
    }

    fn flush(&mut self) {
        if self.state != ReadyState::Connected
            || !self.writable
            || self.write_buffer.is_empty()
        {
            return;
        }
        if let Some(transport) = &mut self.transport {
            let batch = std::mem::take(&mut self.write_buffer);
            self.writable = false;
            transport.write(batch);
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.state = ReadyState::Disconnected;
        self.watchdog_at = None;
        self.reconnect_at = None;
    }

    fn emit(&self, event: SocketEvent) {
        if self.events_out.send(event).is_err() {
            tracing::trace!("socket event listener dropped");
        }
    }
}
