use hfn_wire::WireError;

use crate::SchemaKey;

/// Errors from schema index construction and model (de)serialization.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The configuration payload is not valid JSON or has the wrong shape.
    #[error("config parse failed: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration names neither a runway nor any towers, so no
    /// connection target can ever be resolved.
    #[error("config has no runway and no towers")]
    MissingEndpoint,

    /// Two fields in one schema share an id.
    #[error("duplicate field id {id} in schema {schema:?}")]
    DuplicateField {
        /// The colliding field id.
        id: u32,
        /// The schema the collision occurred in.
        schema: SchemaKey,
    },

    /// A field type tag that is neither a scalar tag nor a schema reference.
    #[error("invalid field type tag {0:?}")]
    InvalidTypeTag(String),

    /// A model, hfn, rpc, or record field references a schema that does not
    /// exist in the index.
    #[error("unknown schema reference {0:?}")]
    UnknownSchemaRef(SchemaKey),

    /// A model buffer referenced a field id absent from the schema.
    /// Decoding of the remaining sequence is aborted; fields decoded before
    /// the unknown id are retained.
    #[error("unknown field id {0}")]
    UnknownField(i64),

    /// Model decoding was handed an empty buffer.
    #[error("empty model buffer")]
    EmptyBuffer,

    /// The model buffer held a non-integer field-id slot, or a field id
    /// with no value slot after it.
    #[error("malformed model sequence")]
    MalformedSequence,

    /// `from_object` was handed something other than a map.
    #[error("expected an object value")]
    NotAnObject,

    /// The underlying buffer is not valid wire format.
    #[error("wire decode failed: {0}")]
    Wire(#[from] WireError),
}
