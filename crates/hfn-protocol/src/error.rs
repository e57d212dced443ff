use hfn_wire::WireError;

/// Errors that can occur while framing or unframing packets and message
/// payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The underlying buffer is not valid wire format. The whole frame is
    /// discarded by the caller; the connection stays up.
    #[error("wire decode failed: {0}")]
    Wire(#[from] WireError),

    /// A known packet tag was seen but the sequence ended before all of the
    /// tag's fixed slots.
    #[error("truncated packet (tag {tag})")]
    Truncated {
        /// The packet tag whose slots ran out.
        tag: u8,
    },

    /// A packet slot held the wrong kind of value.
    #[error("invalid packet field: {0}")]
    InvalidField(&'static str),

    /// A message payload slot held the wrong kind of value.
    #[error("invalid message payload: {0}")]
    InvalidMessage(&'static str),

    /// The first element of a MESSAGE payload was not a known message tag.
    #[error("unknown message tag {0}")]
    UnknownMessageTag(i64),
}
