//! Schema index and schema-driven model codec for HyperFunction.
//!
//! A HyperFunction application ships a compact configuration payload
//! describing its packages, modules, remote functions, RPCs, and record
//! schemas. This crate parses that payload into an in-memory
//! [`SchemaIndex`] and provides [`Model`], a schema-bound record that
//! encodes and decodes itself through the wire codec without any host
//! reflection.
//!
//! ```text
//! config JSON → SchemaIndex ──lookup──→ Schema ──binds──→ Model ⇄ bytes
//! ```

mod config;
mod error;
mod index;
mod model;

pub use config::ConfigPayload;
pub use error::SchemaError;
pub use index::{
    Field, FieldType, HfnDescriptor, ModelDescriptor, RpcDescriptor, Schema,
    SchemaIndex, SchemaKey,
};
pub use model::{FieldValue, Model};
