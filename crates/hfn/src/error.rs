use std::time::Duration;

use hfn_protocol::ProtocolError;
use hfn_schema::SchemaError;
use hfn_transport::TransportError;

/// Errors surfaced by the client facade.
#[derive(Debug, thiserror::Error)]
pub enum HfnError {
    /// The configuration payload or a schema operation failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Packet or message (de)serialization failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport layer failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No remote function with this name exists in the schema index.
    #[error("hfn {0:?} not found")]
    HfnNotFound(String),

    /// No RPC with this name exists in the schema index.
    #[error("rpc {0:?} not found")]
    RpcNotFound(String),

    /// No model with this name exists in the schema index.
    #[error("model {0:?} not found")]
    ModelNotFound(String),

    /// The RPC's deadline elapsed before a response arrived. Only the
    /// local pending entry is cancelled; a late response is dropped.
    #[error("rpc timed out after {0:?}")]
    RpcTimeout(Duration),

    /// The connection was shut down while the call was outstanding.
    #[error("connection closed")]
    ConnectionClosed,
}
