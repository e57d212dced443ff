//! Packet framing and application message payloads for HyperFunction.
//!
//! This crate defines the two tagged unions that travel between client and
//! server, both flattened positionally through the wire codec's sequence
//! mode:
//!
//! - [`Packet`] — the transport-level control/data frame. One physical
//!   message may carry several packets back-to-back.
//! - [`MessagePayload`] — the application-level content of a MESSAGE
//!   packet's payload bytes.
//!
//! ```text
//! Transport (bytes) → Packet (framing) → MessagePayload (application)
//! ```
//!
//! The tag assignments are fixed protocol constants; changing one breaks
//! interoperability with every deployed server.

mod error;
mod message;
mod packet;

pub use error::ProtocolError;
pub use message::MessagePayload;
pub use packet::{decode_packets, encode_packet, Packet};
