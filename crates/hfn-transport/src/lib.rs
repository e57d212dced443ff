//! Transport layer for the HyperFunction client.
//!
//! A [`Transport`] owns one physical connection and moves decoded
//! [`Packet`]s in both directions. Inbound activity surfaces as
//! [`TransportEvent`]s on a channel owned by the connection state machine;
//! each event is stamped with the generation of the transport that produced
//! it, so events from a torn-down connection can be discarded instead of
//! leaking into its replacement.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
mod polling;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use polling::PollingConnector;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};

use std::future::Future;

use hfn_protocol::Packet;
use tokio::sync::mpsc;

/// Protocol version sent as the `ver` query parameter on every connection.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything needed to dial one connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Endpoint URL, without query string.
    pub url: String,
    /// Application id (`aid`).
    pub app_id: String,
    /// Client id, persisted across sessions (`cid`).
    pub client_id: String,
    /// Session id, regenerated per connection (`sid`).
    pub session_id: String,
    /// Connection timestamp in milliseconds (`ts`).
    pub timestamp_ms: u64,
}

impl ConnectParams {
    /// The full dial target: endpoint URL plus identifying query string.
    ///
    /// Ids come from the URL-safe id alphabet and need no escaping. A URL
    /// with no path after the authority gets a `/` so the query never
    /// produces an empty HTTP request-target.
    pub fn target(&self) -> String {
        let after_scheme =
            self.url.find("://").map_or(0, |i| i + "://".len());
        let slash = if self.url[after_scheme..].contains('/') {
            ""
        } else {
            "/"
        };
        format!(
            "{}{}?aid={}&cid={}&sid={}&ver={}&ts={}",
            self.url,
            slash,
            self.app_id,
            self.client_id,
            self.session_id,
            PROTOCOL_VERSION,
            self.timestamp_ms,
        )
    }
}

/// What a transport reported, stamped with its generation.
#[derive(Debug)]
pub struct TransportEvent {
    /// Generation of the transport instance that produced this event.
    pub generation: u64,
    /// The event itself.
    pub kind: TransportEventKind,
}

/// Lifecycle and traffic notifications from a transport.
#[derive(Debug)]
pub enum TransportEventKind {
    /// The physical connection is established and the transport is
    /// writable.
    Opened,
    /// One inbound physical message, decoded. Packets are in arrival
    /// order.
    Packets(Vec<Packet>),
    /// A previously written batch has been fully handed to the wire; the
    /// transport is writable again.
    Drain,
    /// The connection failed.
    Error(String),
    /// The connection closed.
    Closed,
}

/// An established connection.
///
/// `write` only queues: each packet becomes one physical binary message,
/// and a [`TransportEventKind::Drain`] event follows once the whole batch
/// has been handed off. The caller must treat the transport as unwritable
/// between a `write` and the matching drain. Dropping a transport aborts
/// its I/O tasks and abandons any queued writes.
pub trait Transport: Send + 'static {
    /// Queues a batch of packets for transmission.
    fn write(&mut self, packets: Vec<Packet>);

    /// Closes the connection. Queued but untransmitted packets are
    /// dropped.
    ///
    /// The future is `Send`: the connection state machine awaits it from
    /// a spawned task.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Dials connections. One connector produces many transports over the
/// lifetime of a socket, one per (re)connection attempt.
pub trait Connector: Send + Sync + 'static {
    /// The transport type produced by this connector.
    type Transport: Transport;

    /// Opens a connection to `params.target()`. Events are delivered on
    /// `events`, stamped with `generation`.
    ///
    /// The future is `Send`, like [`Transport::close`].
    fn connect(
        &self,
        params: &ConnectParams,
        generation: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}
