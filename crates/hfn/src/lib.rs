//! HyperFunction client runtime.
//!
//! HyperFunction is a remote-procedure and live-state-sync protocol: an
//! application ships a schema describing its packages, modules, remote
//! functions, and RPCs, and the client talks to a server over a compact
//! binary protocol. This crate ties the protocol engine together:
//!
//! - [`HfnClient`] — the facade: call remote functions, issue RPCs,
//!   subscribe to pushed state, read and persist cookies.
//! - [`socket`] — the connection state machine: write buffering,
//!   heartbeat liveness, exponential-backoff reconnection.
//! - [`RpcCorrelator`] — matches RPC responses to in-flight requests by
//!   acknowledgement id.
//!
//! The wire codec, packet framing, schema index, and transports live in
//! the `hfn-wire`, `hfn-protocol`, `hfn-schema`, and `hfn-transport`
//! crates; the common types are re-exported here.
//!
//! ```no_run
//! use hfn::{ClientOptions, HfnClient};
//! use hfn_wire::Value;
//!
//! # async fn demo(config_json: &str) -> Result<(), hfn::HfnError> {
//! let client = HfnClient::connect(config_json, ClientOptions::default())?;
//! client.ready().await?;
//!
//! let obj = Value::Map(vec![("text".into(), Value::Str("hi".into()))]);
//! client.hfn("chat.room.send", Some(&obj)).await?;
//!
//! let reply = client.rpc("chat.history", None).await?;
//! println!("{:?}", reply.to_object());
//! # Ok(())
//! # }
//! ```

mod client;
mod cookie;
mod error;
mod rpc;
pub mod socket;
mod storage;
pub mod util;

pub use client::{ClientOptions, HfnClient, StateChange};
pub use cookie::{CookieItem, CookieJar, GLOBAL_PACKAGE};
pub use error::HfnError;
pub use rpc::RpcCorrelator;
pub use socket::{SocketConfig, SocketEvent, SocketHandle};
pub use storage::{MemoryStorage, Storage};

pub use hfn_protocol::{MessagePayload, Packet};
pub use hfn_schema::{Model, SchemaIndex};
pub use hfn_wire::Value;
