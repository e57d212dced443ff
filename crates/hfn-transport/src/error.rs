/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Establishing the connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The requested transport variant is not implemented.
    #[error("transport variant {0:?} is not supported")]
    Unsupported(&'static str),
}
