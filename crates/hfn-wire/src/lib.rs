//! Compact binary value codec for the HyperFunction wire format.
//!
//! This crate implements the lowest layer of the protocol stack: a closed
//! value model ([`Value`]) and its byte representation. Every packet, every
//! model field, and every RPC payload that travels between a HyperFunction
//! client and server is ultimately a tree of these values.
//!
//! The format is a restricted MessagePack dialect. It is *not* a
//! general-purpose serialization library — the value model is closed (no
//! extension types, no custom tags) and both peers must agree on it exactly,
//! byte for byte.
//!
//! # Sequence mode
//!
//! Besides encoding a single value, the codec supports a *sequence* form:
//! [`encode_seq`] serializes each element of a slice as an independent
//! top-level value, concatenated in order, and [`decode_seq`] consumes a
//! buffer until it is exhausted. This lets one binary buffer carry a
//! fixed-arity tuple (packet fields, model field/value pairs) without a
//! length prefix around the whole tuple.
//!
//! ```
//! use hfn_wire::{encode_seq, decode_seq, Value};
//!
//! let buf = encode_seq(&[Value::Int(8), Value::Str("hi".into())]);
//! let back = decode_seq(&buf).unwrap();
//! assert_eq!(back, vec![Value::Int(8), Value::Str("hi".into())]);
//! ```

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_seq};
pub use encode::{encode, encode_seq};
pub use error::WireError;
pub use value::Value;
