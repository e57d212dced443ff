//! RPC request/response correlation.
//!
//! Every outbound RPC request carries a fresh acknowledgement id; the
//! response echoes it back. Correlation is by acknowledgement id alone —
//! the same RPC may be in flight multiple times concurrently, so the RPC
//! id cannot identify a call. Ids are never reused within a connection's
//! lifetime.

use std::collections::HashMap;

use tokio::sync::oneshot;

/// The pending-call table plus the monotonic acknowledgement id counter.
///
/// Deadlines are not tracked here: the caller races the receiver against
/// its own timeout and calls [`RpcCorrelator::forget`] when it gives up.
#[derive(Debug, Default)]
pub struct RpcCorrelator {
    next_ack_id: u32,
    pending: HashMap<u32, oneshot::Sender<Option<Vec<u8>>>>,
}

impl RpcCorrelator {
    /// Creates an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next acknowledgement id and registers a pending
    /// entry for it. The receiver resolves with the response payload.
    pub fn register(&mut self) -> (u32, oneshot::Receiver<Option<Vec<u8>>>) {
        let ack_id = self.next_ack_id;
        self.next_ack_id += 1;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(ack_id, tx);
        (ack_id, rx)
    }

    /// Delivers a response to the matching pending call. Returns `false`
    /// if no entry exists — a late response after a timeout, which is
    /// silently dropped.
    pub fn resolve(&mut self, ack_id: u32, payload: Option<Vec<u8>>) -> bool {
        match self.pending.remove(&ack_id) {
            Some(tx) => tx.send(payload).is_ok(),
            None => {
                tracing::debug!(ack_id, "dropping response with no pending call");
                false
            }
        }
    }

    /// Removes a pending entry without resolving it, after the caller's
    /// own deadline elapsed.
    pub fn forget(&mut self, ack_id: u32) {
        self.pending.remove(&ack_id);
    }

    /// Number of calls still awaiting a response.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no calls are outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
