//! Long-polling transport placeholder.
//!
//! The protocol reserves a polling variant for environments without
//! WebSocket support. Only the WebSocket transport is implemented; dialing
//! through this connector always fails.

use tokio::sync::mpsc;

use crate::{ConnectParams, Connector, Transport, TransportError, TransportEvent};

/// A connector for the long-polling transport variant. Not implemented.
#[derive(Debug, Default)]
pub struct PollingConnector;

/// Uninhabited: no polling transport can be constructed.
#[derive(Debug)]
pub enum PollingTransport {}

impl Transport for PollingTransport {
    fn write(&mut self, _packets: Vec<hfn_protocol::Packet>) {
        match *self {}
    }

    async fn close(&mut self) {
        match *self {}
    }
}

impl Connector for PollingConnector {
    type Transport = PollingTransport;

    async fn connect(
        &self,
        _params: &ConnectParams,
        _generation: u64,
        _events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self::Transport, TransportError> {
        Err(TransportError::Unsupported("polling"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_polling_connect_is_unsupported() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let params = ConnectParams {
            url: "https://tower.example.com/hfn".into(),
            app_id: "app".into(),
            client_id: "c".into(),
            session_id: "s".into(),
            timestamp_ms: 0,
        };
        let result = PollingConnector.connect(&params, 1, tx).await;
        assert!(matches!(result, Err(TransportError::Unsupported("polling"))));
    }
}
