#![allow(dead_code)]

//! Shared test support: a scriptable in-memory connector.
//!
//! Tests drive the socket by injecting transport events through the
//! recorded per-attempt channels and asserting on the packets the socket
//! wrote.

use std::sync::{Arc, Mutex};

use hfn_protocol::Packet;
use hfn_transport::{
    ConnectParams, Connector, Transport, TransportError, TransportEvent,
    TransportEventKind,
};
use tokio::sync::mpsc;

/// A connector whose every dial is recorded and test-controlled.
#[derive(Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    fail_attempts: usize,
    attempts: Vec<Attempt>,
}

/// One recorded dial: the params the socket used plus handles for
/// injecting events and reading written packets.
#[derive(Clone)]
pub struct Attempt {
    pub generation: u64,
    pub params: ConnectParams,
    events: mpsc::UnboundedSender<TransportEvent>,
    written: Arc<Mutex<Vec<Vec<Packet>>>>,
}

impl Attempt {
    /// Injects a transport event stamped with this attempt's generation.
    pub fn emit(&self, kind: TransportEventKind) {
        let _ = self.events.send(TransportEvent {
            generation: self.generation,
            kind,
        });
    }

    /// Completes the handshake: physical open, then the server's OPEN
    /// packet with the given heartbeat timing.
    pub fn open(&self, ping_interval: u64, ping_timeout: u64) {
        self.emit(TransportEventKind::Opened);
        self.emit(TransportEventKind::Packets(vec![Packet::Open {
            ping_interval: Some(ping_interval),
            ping_timeout: Some(ping_timeout),
        }]));
    }

    /// Injects one inbound packet batch.
    pub fn packets(&self, packets: Vec<Packet>) {
        self.emit(TransportEventKind::Packets(packets));
    }

    /// All batches the socket has written so far.
    pub fn written(&self) -> Vec<Vec<Packet>> {
        self.written.lock().unwrap().clone()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector that refuses every dial.
    pub fn failing() -> Self {
        let connector = Self::default();
        connector.inner.lock().unwrap().fail_attempts = usize::MAX;
        connector
    }

    pub fn attempt_count(&self) -> usize {
        self.inner.lock().unwrap().attempts.len()
    }

    pub fn attempt(&self, index: usize) -> Attempt {
        self.inner.lock().unwrap().attempts[index].clone()
    }

    pub fn last_attempt(&self) -> Attempt {
        let inner = self.inner.lock().unwrap();
        inner.attempts.last().expect("no attempts recorded").clone()
    }
}

/// A transport that records writes and immediately reports a drain, the
/// way the WebSocket transport drains after each batch.
pub struct MockTransport {
    generation: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
    written: Arc<Mutex<Vec<Vec<Packet>>>>,
}

impl Transport for MockTransport {
    fn write(&mut self, packets: Vec<Packet>) {
        self.written.lock().unwrap().push(packets);
        let _ = self.events.send(TransportEvent {
            generation: self.generation,
            kind: TransportEventKind::Drain,
        });
    }

    async fn close(&mut self) {}
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(
        &self,
        params: &ConnectParams,
        generation: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self::Transport, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        let written = Arc::new(Mutex::new(Vec::new()));
        inner.attempts.push(Attempt {
            generation,
            params: params.clone(),
            events: events.clone(),
            written: written.clone(),
        });
        if inner.fail_attempts > 0 {
            inner.fail_attempts -= 1;
            return Err(TransportError::ConnectFailed("mock refusal".into()));
        }
        Ok(MockTransport {
            generation,
            events,
            written,
        })
    }
}

/// Lets every runnable task make progress without advancing virtual
/// time.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
