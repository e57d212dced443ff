/// Errors produced while decoding wire bytes.
///
/// Any of these means the frame is structurally malformed. Callers are
/// expected to discard the whole frame, log it, and continue — a decode
/// failure is never grounds for tearing down the connection.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A tag byte that no known encoding uses.
    #[error("unknown tag {tag:#04x} at offset {offset}")]
    UnknownTag {
        /// The offending tag byte.
        tag: u8,
        /// Byte offset of the tag within the buffer.
        offset: usize,
    },

    /// The reserved tag 0xc1. It is never emitted by any encoder, so seeing
    /// it means the buffer is not this wire format at all.
    #[error("reserved tag 0xc1 at offset {0}")]
    Reserved(usize),

    /// A claimed length runs past the end of the buffer.
    #[error("unexpected end of buffer at offset {0}")]
    UnexpectedEof(usize),

    /// A map key that is neither a string nor an integer.
    #[error("map key at offset {0} is not a string")]
    InvalidKey(usize),

    /// A string value that is not valid UTF-8.
    #[error("invalid utf-8 in string at offset {0}")]
    InvalidUtf8(usize),
}
